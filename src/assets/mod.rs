//! Built-in puppet skeletons and the named video registry.

pub mod provider;
