use std::sync::Arc;

use crate::{
    assets::provider::AssetProvider,
    config::{BodyRigConfig, JointBinding},
    foundation::{
        core::{Mat4, Vec3},
        error::ShadowResult,
    },
    mix::tracking::{AnchorEventKind, Chirality, PoseEvent, SubjectKind, finite_transform},
    scene::{
        entity::{Entity, EntityId},
        skeleton::{JointIndex, JointTable},
        stage::Stage,
    },
};

/// Where the body puppet stands.
const BODY_ORIGIN: Vec3 = Vec3::new(0.0, 0.7, -0.5);

/// The tracked subject on stage.
pub(crate) enum Puppet {
    Hands(HandPair),
    Body(BodyPuppet),
}

impl Puppet {
    /// Load the subject's skeletons onto `stage`.
    pub(crate) fn load(
        kind: SubjectKind,
        stage: &mut Stage,
        assets: &dyn AssetProvider,
        hand_bindings: &[JointBinding],
        body_rig: &BodyRigConfig,
    ) -> ShadowResult<Self> {
        Ok(match kind {
            SubjectKind::Hand => Self::Hands(HandPair::load(stage, assets, hand_bindings)?),
            SubjectKind::Body => Self::Body(BodyPuppet::load(stage, assets, body_rig)?),
        })
    }

    /// Apply one tracking event. Returns whether anything on stage changed.
    pub(crate) fn apply(&self, stage: &mut Stage, event: &PoseEvent) -> ShadowResult<bool> {
        finite_transform(&event.transform)?;
        match self {
            Self::Hands(h) => Ok(h.apply(stage, event)),
            Self::Body(b) => Ok(b.apply(stage, event)),
        }
    }

    /// Take every puppet entity off the stage.
    pub(crate) fn unload(&self, stage: &mut Stage) {
        let ids: Vec<EntityId> = match self {
            Self::Hands(h) => vec![h.left.entity, h.right.entity],
            Self::Body(b) => vec![b.entity],
        };
        for id in ids {
            stage.remove_entity(id);
        }
    }
}

pub(crate) struct TrackedHand {
    entity: EntityId,
    table: JointTable,
}

/// Left and right hand entities, hidden until their first tracked update.
pub(crate) struct HandPair {
    left: TrackedHand,
    right: TrackedHand,
}

impl HandPair {
    fn load(
        stage: &mut Stage,
        assets: &dyn AssetProvider,
        bindings: &[JointBinding],
    ) -> ShadowResult<Self> {
        let mut side = |chirality: Chirality, name: &str| -> ShadowResult<TrackedHand> {
            let skeleton = assets.hand_skeleton(chirality)?;
            let table = JointTable::build(&skeleton, bindings);
            let mut entity = Entity::new(name, skeleton);
            entity.enabled = false;
            Ok(TrackedHand {
                entity: stage.add_entity(entity),
                table,
            })
        };
        Ok(Self {
            left: side(Chirality::Left, "leftHand")?,
            right: side(Chirality::Right, "rightHand")?,
        })
    }

    fn apply(&self, stage: &mut Stage, event: &PoseEvent) -> bool {
        let hand = match event.chirality {
            Chirality::Left => &self.left,
            Chirality::Right => &self.right,
        };
        let Some(entity) = stage.entity_mut(hand.entity) else {
            return false;
        };
        if event.kind == AnchorEventKind::Removed {
            entity.enabled = false;
            return true;
        }
        entity.enabled = event.tracked;
        entity.transform = event.transform;
        let applied = hand.table.apply(entity.pose_mut(), &event.joints);
        tracing::trace!(side = ?event.chirality, applied, "hand pose updated");
        true
    }
}

/// Body whose hands follow the tracked hands and whose head leans toward the device.
pub(crate) struct BodyPuppet {
    entity: EntityId,
    left_hand: Option<JointIndex>,
    right_hand: Option<JointIndex>,
    head: Option<(JointIndex, JointIndex, f32)>,
    look_ahead: f32,
}

impl BodyPuppet {
    fn load(
        stage: &mut Stage,
        assets: &dyn AssetProvider,
        rig: &BodyRigConfig,
    ) -> ShadowResult<Self> {
        let skeleton = assets.body_skeleton()?;
        let lookup = |path: &str| {
            let idx = skeleton.joint_index(path);
            if idx.is_none() {
                tracing::warn!(skeleton = skeleton.name(), joint = path, "rig joint not found");
            }
            idx
        };
        let left_hand = lookup(&rig.left_hand_joint);
        let right_hand = lookup(&rig.right_hand_joint);
        let head = lookup(&rig.head_joint).and_then(|h| {
            let def = &skeleton.joints()[h.0];
            def.parent
                .map(|p| (h, p, def.rest.w_axis.truncate().length()))
        });

        let mut entity = Entity::new("body", Arc::clone(&skeleton));
        entity.transform = Mat4::from_translation(BODY_ORIGIN);
        Ok(Self {
            entity: stage.add_entity(entity),
            left_hand,
            right_hand,
            head,
            look_ahead: rig.look_ahead,
        })
    }

    fn apply(&self, stage: &mut Stage, event: &PoseEvent) -> bool {
        let Some(entity) = stage.entity_mut(self.entity) else {
            return false;
        };
        let hand = match event.chirality {
            Chirality::Left => self.left_hand,
            Chirality::Right => self.right_hand,
        };
        if let Some(joint) = hand {
            if event.kind == AnchorEventKind::Removed || !event.tracked {
                entity.clear_effector(joint);
            } else {
                entity.set_effector(joint, event.position());
            }
        }

        if let (Some(device), Some((head, neck, length))) = (event.device_transform, self.head) {
            let device_pos = device.w_axis.truncate();
            let device_z = device.z_axis.truncate();
            let target = device_pos - device_z * self.look_ahead;
            let posed = entity.skeleton().evaluate(entity.pose(), &[]);
            let neck_world = entity.transform.transform_point3(posed.points[neck.0]);
            let dir = (target - neck_world).normalize_or_zero();
            if dir != Vec3::ZERO {
                entity.set_effector(head, neck_world + dir * length);
            }
        }
        true
    }
}

#[cfg(test)]
#[path = "../../tests/unit/mix/puppet.rs"]
mod tests;
