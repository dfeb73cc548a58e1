use std::path::Path;

use crate::{
    composite::blend::{BlendStyle, StereoStyle},
    foundation::error::{ShadowError, ShadowResult},
};

/// Session configuration. Every field has a default, so a partial JSON file is valid.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MixConfig {
    /// Render the scene every N pose updates.
    pub render_every_n_updates: u32,
    /// Auto-frame invocations allowed before the first success.
    pub auto_frame_max_attempts: u32,
    /// Distance of the camera from the framed center along +z.
    pub camera_distance: f32,
    /// Orthographic scale for hand sessions (smaller draws the subject larger).
    pub hand_ortho_scale: f32,
    /// Orthographic scale for body sessions.
    pub body_ortho_scale: f32,
    /// Near clip plane.
    pub near: f32,
    /// Far clip plane.
    pub far: f32,
    /// Whether the camera carries a directional light.
    pub default_light: bool,
    /// Initial blend style.
    pub blend_style: BlendStyle,
    /// Initial stereo output selection.
    pub stereo_style: StereoStyle,
    /// GrayAdd threshold levels.
    pub gray_add: GrayAddParams,
    /// Joint tables for puppet skeletons.
    pub skeletons: SkeletonConfig,
    /// CPU backend tuning.
    pub cpu: CpuBackendOpts,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            render_every_n_updates: 5,
            auto_frame_max_attempts: 5,
            camera_distance: 20.0,
            hand_ortho_scale: 0.5,
            body_ortho_scale: 1.0,
            near: 0.1,
            far: 100.0,
            default_light: true,
            blend_style: BlendStyle::GrayAdd,
            stereo_style: StereoStyle::Stereo,
            gray_add: GrayAddParams::default(),
            skeletons: SkeletonConfig::default(),
            cpu: CpuBackendOpts::default(),
        }
    }
}

impl MixConfig {
    /// Load and validate a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> ShadowResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ShadowError::validation(format!("read config '{}': {e}", path.display()))
        })?;
        Self::from_json(&text)
    }

    /// Parse and validate JSON text.
    pub fn from_json(text: &str) -> ShadowResult<Self> {
        let cfg: Self = serde_json::from_str(text)
            .map_err(|e| ShadowError::validation(format!("parse config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check ranges and joint tables.
    pub fn validate(&self) -> ShadowResult<()> {
        if self.render_every_n_updates == 0 {
            return Err(ShadowError::validation(
                "render_every_n_updates must be >= 1",
            ));
        }
        for (name, v) in [
            ("camera_distance", self.camera_distance),
            ("hand_ortho_scale", self.hand_ortho_scale),
            ("body_ortho_scale", self.body_ortho_scale),
            ("near", self.near),
        ] {
            if !v.is_finite() || v <= 0.0 {
                return Err(ShadowError::validation(format!(
                    "{name} must be finite and > 0, got {v}"
                )));
            }
        }
        if !self.far.is_finite() || self.far <= self.near {
            return Err(ShadowError::validation(format!(
                "far ({}) must be greater than near ({})",
                self.far, self.near
            )));
        }
        self.gray_add.validate()?;
        self.skeletons.validate()
    }
}

/// Threshold levels of the GrayAdd blend, normalized to `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GrayAddParams {
    /// Scene luminance above this becomes `scene_max`.
    pub scene_threshold: f32,
    /// Output level of lit scene pixels.
    pub scene_max: f32,
    /// Video luminance at or below this becomes 0.
    pub video_threshold: f32,
}

impl Default for GrayAddParams {
    fn default() -> Self {
        Self {
            scene_threshold: 0.0,
            scene_max: 0.8,
            video_threshold: 0.0,
        }
    }
}

impl GrayAddParams {
    fn validate(&self) -> ShadowResult<()> {
        for (name, v) in [
            ("gray_add.scene_threshold", self.scene_threshold),
            ("gray_add.scene_max", self.scene_max),
            ("gray_add.video_threshold", self.video_threshold),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(ShadowError::validation(format!(
                    "{name} must be within [0, 1], got {v}"
                )));
            }
        }
        Ok(())
    }
}

/// CPU backend tuning.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CpuBackendOpts {
    /// Split per-pixel work across the rayon pool.
    pub parallel_rows: bool,
}

impl Default for CpuBackendOpts {
    fn default() -> Self {
        Self {
            parallel_rows: true,
        }
    }
}

/// Maps a tracked joint name onto a joint path of a puppet skeleton.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct JointBinding {
    /// Joint name as reported by the tracking source.
    pub tracked: String,
    /// Slash-separated joint path inside the skeleton asset.
    pub joint: String,
}

/// Joint tables consumed when skeletons are loaded.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SkeletonConfig {
    /// Tracked hand joints driving the hand puppet.
    pub hand: Vec<JointBinding>,
    /// Effector joints of the body puppet.
    pub body: BodyRigConfig,
}

impl Default for SkeletonConfig {
    fn default() -> Self {
        Self {
            hand: default_hand_bindings(),
            body: BodyRigConfig::default(),
        }
    }
}

impl SkeletonConfig {
    fn validate(&self) -> ShadowResult<()> {
        let mut seen = std::collections::HashSet::new();
        for b in &self.hand {
            if b.tracked.is_empty() || b.joint.is_empty() {
                return Err(ShadowError::validation(
                    "hand joint bindings need non-empty names",
                ));
            }
            if !seen.insert(b.tracked.as_str()) {
                return Err(ShadowError::validation(format!(
                    "tracked joint '{}' is bound twice",
                    b.tracked
                )));
            }
        }
        Ok(())
    }
}

/// Body puppet effectors.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BodyRigConfig {
    /// Joint placed at the tracked left hand.
    pub left_hand_joint: String,
    /// Joint placed at the tracked right hand.
    pub right_hand_joint: String,
    /// Joint that turns toward the look-at target.
    pub head_joint: String,
    /// Look-at target distance in front of the device.
    pub look_ahead: f32,
}

impl Default for BodyRigConfig {
    fn default() -> Self {
        Self {
            left_hand_joint: "Hips/Spine/LeftShoulder/LeftElbow/LeftHand".to_owned(),
            right_hand_joint: "Hips/Spine/RightShoulder/RightElbow/RightHand".to_owned(),
            head_joint: "Hips/Spine/Neck/Head".to_owned(),
            look_ahead: 0.2,
        }
    }
}

const FINGERS: [(&str, &str, &[&str]); 5] = [
    (
        "thumb",
        "Thumb",
        &["Knuckle", "IntermediateBase", "IntermediateTip", "Tip"],
    ),
    (
        "indexFinger",
        "IndexFinger",
        &["Metacarpal", "Knuckle", "IntermediateBase", "IntermediateTip", "Tip"],
    ),
    (
        "middleFinger",
        "MiddleFinger",
        &["Metacarpal", "Knuckle", "IntermediateBase", "IntermediateTip", "Tip"],
    ),
    (
        "ringFinger",
        "RingFinger",
        &["Metacarpal", "Knuckle", "IntermediateBase", "IntermediateTip", "Tip"],
    ),
    (
        "littleFinger",
        "LittleFinger",
        &["Metacarpal", "Knuckle", "IntermediateBase", "IntermediateTip", "Tip"],
    ),
];

/// Tracked finger joints bound to the `Wrist/...` paths of the hand skeleton.
pub fn default_hand_bindings() -> Vec<JointBinding> {
    let mut out = Vec::new();
    for (tracked_prefix, joint_prefix, segments) in FINGERS {
        let mut path = "Wrist".to_owned();
        for seg in segments {
            path.push('/');
            path.push_str(joint_prefix);
            path.push_str(seg);
            out.push(JointBinding {
                tracked: format!("{tracked_prefix}{seg}"),
                joint: path.clone(),
            });
        }
    }
    out
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
