use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use crate::{
    foundation::core::{Bounds3, Mat4, Vec3},
    scene::skeleton::{JointIndex, Pose, PosedSkeleton, SkeletonAsset},
};

/// Stable identity of an entity on a stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

impl EntityId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A posed skeleton placed in the world.
#[derive(Clone, Debug)]
pub struct Entity {
    id: EntityId,
    /// Display name.
    pub name: String,
    /// World-from-entity transform.
    pub transform: Mat4,
    /// Disabled entities are neither drawn nor framed.
    pub enabled: bool,
    skeleton: Arc<SkeletonAsset>,
    pose: Pose,
    effectors: Vec<(JointIndex, Vec3)>,
}

impl Entity {
    /// Entity at the origin in the skeleton's rest pose.
    pub fn new(name: impl Into<String>, skeleton: Arc<SkeletonAsset>) -> Self {
        let pose = skeleton.rest_pose();
        Self {
            id: EntityId::next(),
            name: name.into(),
            transform: Mat4::IDENTITY,
            enabled: true,
            skeleton,
            pose,
            effectors: Vec::new(),
        }
    }

    /// Identity.
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Skeleton asset.
    pub fn skeleton(&self) -> &Arc<SkeletonAsset> {
        &self.skeleton
    }

    /// Current pose.
    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    /// Mutable pose.
    pub fn pose_mut(&mut self) -> &mut Pose {
        &mut self.pose
    }

    /// Pin a joint to a world-space position, replacing any previous pin of that joint.
    pub fn set_effector(&mut self, joint: JointIndex, world: Vec3) {
        let local = self.transform.inverse().transform_point3(world);
        match self.effectors.iter_mut().find(|(j, _)| *j == joint) {
            Some(slot) => slot.1 = local,
            None => self.effectors.push((joint, local)),
        }
    }

    /// Release a pinned joint.
    pub fn clear_effector(&mut self, joint: JointIndex) {
        self.effectors.retain(|(j, _)| *j != joint);
    }

    /// World-space joint geometry.
    pub fn world_geometry(&self) -> PosedSkeleton {
        self.skeleton
            .evaluate(&self.pose, &self.effectors)
            .transformed(&self.transform)
    }

    /// Union of the joint spheres in world space; `None` when disabled or jointless.
    pub fn visual_bounds(&self) -> Option<Bounds3> {
        if !self.enabled {
            return None;
        }
        let geo = self.world_geometry();
        let scale = max_axis_scale(&self.transform);
        geo.points
            .iter()
            .zip(&geo.radii)
            .fold(None, |acc, (p, r)| {
                Bounds3::merge(acc, Bounds3::from_sphere(*p, r * scale))
            })
    }
}

pub(crate) fn max_axis_scale(m: &Mat4) -> f32 {
    m.x_axis
        .truncate()
        .length()
        .max(m.y_axis.truncate().length())
        .max(m.z_axis.truncate().length())
}

#[cfg(test)]
#[path = "../../tests/unit/scene/entity.rs"]
mod tests;
