use std::collections::HashMap;

use crate::{
    config::JointBinding,
    foundation::{
        core::{Mat4, Rgba8, Vec3},
        error::{ShadowError, ShadowResult},
    },
};

/// Index of a joint inside its [`SkeletonAsset`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JointIndex(pub usize);

/// One joint of a skeleton asset.
#[derive(Clone, Debug, PartialEq)]
pub struct JointDef {
    /// Slash-separated path from the root, e.g. `Wrist/ThumbKnuckle`.
    pub path: String,
    /// Parent joint; always earlier in the joint list.
    pub parent: Option<JointIndex>,
    /// Rest transform relative to the parent (or to the entity for roots).
    pub rest: Mat4,
    /// Display radius in world units.
    pub radius: f32,
    /// Material color.
    pub color: Rgba8,
}

/// Immutable joint hierarchy of a puppet.
#[derive(Clone, Debug, PartialEq)]
pub struct SkeletonAsset {
    name: String,
    joints: Vec<JointDef>,
    by_path: HashMap<String, JointIndex>,
}

impl SkeletonAsset {
    /// Build from joints listed parents-first; parents are inferred from the path prefix.
    pub fn from_paths(
        name: impl Into<String>,
        joints: impl IntoIterator<Item = (String, Mat4, f32, Rgba8)>,
    ) -> ShadowResult<Self> {
        let name = name.into();
        let mut out = Vec::new();
        let mut by_path: HashMap<String, JointIndex> = HashMap::new();
        for (path, rest, radius, color) in joints {
            if path.is_empty() {
                return Err(ShadowError::validation(format!(
                    "skeleton '{name}' has an empty joint path"
                )));
            }
            let parent = match path.rsplit_once('/') {
                Some((parent_path, _)) => Some(*by_path.get(parent_path).ok_or_else(|| {
                    ShadowError::validation(format!(
                        "skeleton '{name}': joint '{path}' listed before its parent"
                    ))
                })?),
                None => None,
            };
            let idx = JointIndex(out.len());
            if by_path.insert(path.clone(), idx).is_some() {
                return Err(ShadowError::validation(format!(
                    "skeleton '{name}': duplicate joint '{path}'"
                )));
            }
            out.push(JointDef {
                path,
                parent,
                rest,
                radius,
                color,
            });
        }
        Ok(Self {
            name,
            joints: out,
            by_path,
        })
    }

    /// Asset name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Joints, parents first.
    pub fn joints(&self) -> &[JointDef] {
        &self.joints
    }

    /// Look up a joint by path.
    pub fn joint_index(&self, path: &str) -> Option<JointIndex> {
        self.by_path.get(path).copied()
    }

    /// Rest pose.
    pub fn rest_pose(&self) -> Pose {
        Pose {
            local: self.joints.iter().map(|j| j.rest).collect(),
        }
    }

    /// Forward kinematics: entity-space joint positions, then effector overrides.
    pub fn evaluate(&self, pose: &Pose, effectors: &[(JointIndex, Vec3)]) -> PosedSkeleton {
        let mut model: Vec<Mat4> = Vec::with_capacity(self.joints.len());
        for (i, joint) in self.joints.iter().enumerate() {
            let local = pose.local.get(i).copied().unwrap_or(joint.rest);
            let m = match joint.parent {
                Some(JointIndex(p)) => model[p] * local,
                None => local,
            };
            model.push(m);
        }
        let mut points: Vec<Vec3> = model.iter().map(|m| m.w_axis.truncate()).collect();
        for &(JointIndex(i), at) in effectors {
            if let Some(p) = points.get_mut(i) {
                *p = at;
            }
        }
        PosedSkeleton {
            points,
            radii: self.joints.iter().map(|j| j.radius).collect(),
            colors: self.joints.iter().map(|j| j.color).collect(),
            bones: self
                .joints
                .iter()
                .enumerate()
                .filter_map(|(i, j)| j.parent.map(|JointIndex(p)| (p, i)))
                .collect(),
        }
    }
}

/// Per-joint parent-relative transforms.
#[derive(Clone, Debug, PartialEq)]
pub struct Pose {
    local: Vec<Mat4>,
}

impl Pose {
    /// Override one joint's parent-relative transform.
    pub fn set_local(&mut self, joint: JointIndex, m: Mat4) {
        if let Some(slot) = self.local.get_mut(joint.0) {
            *slot = m;
        }
    }

    /// Parent-relative transform of a joint.
    pub fn local(&self, joint: JointIndex) -> Option<Mat4> {
        self.local.get(joint.0).copied()
    }
}

/// Evaluated skeleton geometry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PosedSkeleton {
    /// Joint centers.
    pub points: Vec<Vec3>,
    /// Joint radii.
    pub radii: Vec<f32>,
    /// Joint colors.
    pub colors: Vec<Rgba8>,
    /// `(parent, child)` joint pairs.
    pub bones: Vec<(usize, usize)>,
}

impl PosedSkeleton {
    /// Map every point through `m`.
    pub fn transformed(mut self, m: &Mat4) -> Self {
        for p in &mut self.points {
            *p = m.transform_point3(*p);
        }
        self
    }
}

/// Tracked joint name to skeleton joint, resolved once when a skeleton is loaded.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JointTable {
    entries: HashMap<String, JointIndex>,
    unmapped: Vec<String>,
}

impl JointTable {
    /// Resolve `bindings` against `asset`. Bindings naming a missing joint are skipped.
    pub fn build(asset: &SkeletonAsset, bindings: &[JointBinding]) -> Self {
        let mut entries = HashMap::with_capacity(bindings.len());
        let mut unmapped = Vec::new();
        for b in bindings {
            match asset.joint_index(&b.joint) {
                Some(idx) => {
                    entries.insert(b.tracked.clone(), idx);
                }
                None => unmapped.push(b.tracked.clone()),
            }
        }
        if !unmapped.is_empty() {
            tracing::warn!(
                skeleton = asset.name(),
                unmapped = ?unmapped,
                "joint bindings reference joints missing from the skeleton"
            );
        }
        Self { entries, unmapped }
    }

    /// Joint bound to a tracked name.
    pub fn get(&self, tracked: &str) -> Option<JointIndex> {
        self.entries.get(tracked).copied()
    }

    /// Number of resolved bindings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing resolved.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tracked names whose joint was not found.
    pub fn unmapped(&self) -> &[String] {
        &self.unmapped
    }

    /// Write tracked parent-relative transforms into `pose`; returns how many applied.
    pub fn apply(&self, pose: &mut Pose, joints: &[(String, Mat4)]) -> usize {
        let mut applied = 0;
        for (name, m) in joints {
            if let Some(idx) = self.get(name) {
                pose.set_local(idx, *m);
                applied += 1;
            }
        }
        applied
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/skeleton.rs"]
mod tests;
