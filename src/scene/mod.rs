//! Puppet scene model: skeleton assets, posed entities, the camera and the stage holding them.

pub mod camera;
pub mod entity;
pub mod skeleton;
pub mod stage;
