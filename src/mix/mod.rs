//! Session orchestration: pose input, puppets, display surfaces and the mix managers.

pub mod display;
pub mod events;
pub mod manager;
pub(crate) mod puppet;
pub mod stereo;
pub mod tracking;
