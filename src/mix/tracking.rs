use std::sync::Arc;

use crate::{
    config::JointBinding,
    foundation::{
        core::{Mat4, Vec3},
        error::{ShadowError, ShadowResult},
    },
    scene::skeleton::SkeletonAsset,
};

/// Which hand an anchor belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chirality {
    /// Left hand.
    Left,
    /// Right hand.
    Right,
}

/// Lifecycle classification of a pose event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnchorEventKind {
    /// First sighting of an anchor.
    Added,
    /// New pose of a known anchor.
    Updated,
    /// The anchor is no longer tracked.
    Removed,
}

/// What the puppet on stage represents.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    /// A pair of hands driven joint by joint.
    #[default]
    Hand,
    /// A body whose hands and head follow the tracked hands and device.
    Body,
}

impl std::str::FromStr for SubjectKind {
    type Err = ShadowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hand" => Ok(Self::Hand),
            "body" => Ok(Self::Body),
            _ => Err(ShadowError::validation(format!(
                "unknown subject kind '{s}', expected hand or body"
            ))),
        }
    }
}

/// One tracking update.
#[derive(Clone, Debug, PartialEq)]
pub struct PoseEvent {
    /// Stable anchor identity.
    pub anchor_id: u64,
    /// Hand side.
    pub chirality: Chirality,
    /// Added, updated or removed.
    pub kind: AnchorEventKind,
    /// World-from-anchor transform.
    pub transform: Mat4,
    /// Whether the tracker currently sees the anchor.
    pub tracked: bool,
    /// Seconds since tracking started.
    pub timestamp: f64,
    /// Parent-relative transforms keyed by tracked joint name.
    pub joints: Vec<(String, Mat4)>,
    /// World-from-device transform, when known.
    pub device_transform: Option<Mat4>,
}

impl PoseEvent {
    /// World position of the anchor.
    pub fn position(&self) -> Vec3 {
        self.transform.w_axis.truncate()
    }
}

/// Deterministic hand motion: both hands bob and flex their fingers.
pub struct SyntheticHands {
    left: Arc<SkeletonAsset>,
    right: Arc<SkeletonAsset>,
    bindings: Vec<JointBinding>,
    fps: f64,
    frame: u64,
    /// World position midway between the hands.
    pub center: Vec3,
}

impl SyntheticHands {
    /// Motion for the given hand skeletons, sampled at `fps`.
    pub fn new(
        left: Arc<SkeletonAsset>,
        right: Arc<SkeletonAsset>,
        bindings: Vec<JointBinding>,
        fps: f64,
    ) -> Self {
        Self {
            left,
            right,
            bindings,
            fps: if fps > 0.0 { fps } else { 30.0 },
            frame: 0,
            center: Vec3::new(0.0, 1.4, -0.2),
        }
    }

    /// Frames produced so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Events of the next frame, one per hand. The first frame reports both hands as added.
    pub fn next_events(&mut self) -> Vec<PoseEvent> {
        let kind = if self.frame == 0 {
            AnchorEventKind::Added
        } else {
            AnchorEventKind::Updated
        };
        let t = self.frame as f64 / self.fps;
        self.frame += 1;
        [Chirality::Left, Chirality::Right]
            .into_iter()
            .map(|side| self.event(side, kind, t))
            .collect()
    }

    /// Events reporting both hands as lost.
    pub fn removed_events(&self) -> Vec<PoseEvent> {
        let t = self.frame as f64 / self.fps;
        [Chirality::Left, Chirality::Right]
            .into_iter()
            .map(|side| PoseEvent {
                tracked: false,
                joints: Vec::new(),
                ..self.event(side, AnchorEventKind::Removed, t)
            })
            .collect()
    }

    fn event(&self, side: Chirality, kind: AnchorEventKind, t: f64) -> PoseEvent {
        let (skeleton, dx, anchor_id) = match side {
            Chirality::Left => (&self.left, -0.12, 1),
            Chirality::Right => (&self.right, 0.12, 2),
        };
        let phase = (t * std::f64::consts::TAU * 0.5).sin() as f32;
        let bob = 0.03 * phase;
        let transform = Mat4::from_translation(self.center + Vec3::new(dx, bob, 0.0));
        let curl = 0.35 * (phase + 1.0);

        let joints = self
            .bindings
            .iter()
            .filter_map(|b| {
                let idx = skeleton.joint_index(&b.joint)?;
                let rest = skeleton.joints()[idx.0].rest;
                // Metacarpals stay rigid; the other segments flex.
                let angle = if b.tracked.ends_with("Metacarpal") { 0.0 } else { curl };
                Some((b.tracked.clone(), rest * Mat4::from_rotation_x(-angle)))
            })
            .collect();

        PoseEvent {
            anchor_id,
            chirality: side,
            kind,
            transform,
            tracked: true,
            timestamp: t,
            joints,
            device_transform: Some(Mat4::from_translation(Vec3::new(0.0, 1.6, 0.3))),
        }
    }
}

/// Check a tracking-supplied transform before it reaches the stage.
pub(crate) fn finite_transform(m: &Mat4) -> ShadowResult<()> {
    if m.is_finite() {
        Ok(())
    } else {
        Err(ShadowError::validation("pose transform is not finite"))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/mix/tracking.rs"]
mod tests;
