//! Off-screen rendering of the puppet stage.

pub mod draw;
pub mod framing;
pub mod renderer;
pub mod stereo;
