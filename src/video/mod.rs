//! Video side of the pipeline: decoded frames, sources, the frame tap and the player clock.

pub mod frame;
pub mod player;
pub mod source;
pub mod tap;
