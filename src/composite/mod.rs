//! Blend styles and the compositor that mixes scene and video images.

pub mod blend;
pub mod compositor;
