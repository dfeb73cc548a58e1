use std::{collections::HashMap, path::Path, sync::Arc};

use parking_lot::RwLock;

use crate::{
    foundation::{
        core::{Mat4, Rgba8, Size2, Vec3},
        error::{ShadowError, ShadowResult},
    },
    mix::tracking::Chirality,
    scene::skeleton::SkeletonAsset,
    video::source::{FfmpegVideoSource, SyntheticVideo, VideoSource},
};

/// Source of the videos and puppet skeletons a session loads.
pub trait AssetProvider: Send + Sync {
    /// Video by name.
    fn video(&self, name: &str) -> ShadowResult<Arc<dyn VideoSource>>;

    /// Hand skeleton of one side.
    fn hand_skeleton(&self, chirality: Chirality) -> ShadowResult<Arc<SkeletonAsset>>;

    /// Full-body skeleton.
    fn body_skeleton(&self) -> ShadowResult<Arc<SkeletonAsset>>;
}

/// Name of the synthetic video registered by [`BuiltinAssets::new`].
pub const SYNTHETIC_VIDEO: &str = "synthetic";

/// Procedural skeletons plus a registry of named videos.
///
/// Names not in the registry are opened as video files.
pub struct BuiltinAssets {
    videos: RwLock<HashMap<String, Arc<dyn VideoSource>>>,
}

impl Default for BuiltinAssets {
    fn default() -> Self {
        Self::new()
    }
}

impl BuiltinAssets {
    /// Registry holding a 640x360 gradient video named [`SYNTHETIC_VIDEO`].
    pub fn new() -> Self {
        let assets = Self::empty();
        if let Ok(size) = Size2::new(640, 360) {
            assets.register_video(
                SYNTHETIC_VIDEO,
                Arc::new(SyntheticVideo::new(SYNTHETIC_VIDEO, size, 30.0, 90)),
            );
        }
        assets
    }

    /// Registry without any video.
    pub fn empty() -> Self {
        Self {
            videos: RwLock::new(HashMap::new()),
        }
    }

    /// Register `source` under `name`, replacing any previous entry.
    pub fn register_video(&self, name: impl Into<String>, source: Arc<dyn VideoSource>) {
        self.videos.write().insert(name.into(), source);
    }
}

impl AssetProvider for BuiltinAssets {
    fn video(&self, name: &str) -> ShadowResult<Arc<dyn VideoSource>> {
        if let Some(v) = self.videos.read().get(name) {
            return Ok(Arc::clone(v));
        }
        let source = FfmpegVideoSource::open(Path::new(name))
            .map_err(|e| ShadowError::setup(format!("video '{name}' unavailable: {e}")))?;
        Ok(Arc::new(source))
    }

    fn hand_skeleton(&self, chirality: Chirality) -> ShadowResult<Arc<SkeletonAsset>> {
        hand_skeleton(chirality).map(Arc::new)
    }

    fn body_skeleton(&self) -> ShadowResult<Arc<SkeletonAsset>> {
        body_skeleton().map(Arc::new)
    }
}

// Finger base on the palm (x, y), then one bone offset per segment.
const HAND: [(&str, (f32, f32), &[(&str, f32, f32)]); 5] = [
    (
        "Thumb",
        (0.025, 0.02),
        &[
            ("IntermediateBase", 0.02, 0.03),
            ("IntermediateTip", 0.012, 0.03),
            ("Tip", 0.008, 0.025),
        ],
    ),
    (
        "IndexFinger",
        (0.02, 0.03),
        &[
            ("Knuckle", 0.003, 0.06),
            ("IntermediateBase", 0.0, 0.04),
            ("IntermediateTip", 0.0, 0.025),
            ("Tip", 0.0, 0.022),
        ],
    ),
    (
        "MiddleFinger",
        (0.0, 0.032),
        &[
            ("Knuckle", 0.0, 0.062),
            ("IntermediateBase", 0.0, 0.045),
            ("IntermediateTip", 0.0, 0.028),
            ("Tip", 0.0, 0.024),
        ],
    ),
    (
        "RingFinger",
        (-0.018, 0.03),
        &[
            ("Knuckle", -0.002, 0.056),
            ("IntermediateBase", 0.0, 0.04),
            ("IntermediateTip", 0.0, 0.026),
            ("Tip", 0.0, 0.022),
        ],
    ),
    (
        "LittleFinger",
        (-0.034, 0.025),
        &[
            ("Knuckle", -0.006, 0.048),
            ("IntermediateBase", 0.0, 0.03),
            ("IntermediateTip", 0.0, 0.02),
            ("Tip", 0.0, 0.018),
        ],
    ),
];

const FINGER_COLORS: [Rgba8; 5] = [
    Rgba8::opaque(0, 0, 255),
    Rgba8::opaque(0, 255, 0),
    Rgba8::opaque(0, 0, 128),
    Rgba8::opaque(0, 128, 0),
    Rgba8::opaque(255, 0, 0),
];

/// Wrist-rooted hand with the `Wrist/<Finger><Segment>/...` joint paths. The left hand mirrors x.
pub fn hand_skeleton(chirality: Chirality) -> ShadowResult<SkeletonAsset> {
    let mirror = match chirality {
        Chirality::Left => -1.0,
        Chirality::Right => 1.0,
    };
    let offset = |x: f32, y: f32| Mat4::from_translation(Vec3::new(mirror * x, y, 0.0));

    let mut joints = vec![(
        "Wrist".to_owned(),
        Mat4::IDENTITY,
        0.016,
        Rgba8::opaque(128, 0, 0),
    )];
    for ((finger, (bx, by), segments), color) in HAND.iter().zip(FINGER_COLORS) {
        // The thumb has no metacarpal joint; its knuckle sits at the base.
        let first = if *finger == "Thumb" { "Knuckle" } else { "Metacarpal" };
        let mut path = format!("Wrist/{finger}{first}");
        joints.push((path.clone(), offset(*bx, *by), 0.01, color));
        for (segment, dx, dy) in segments.iter() {
            path = format!("{path}/{finger}{segment}");
            let radius = if *segment == "Tip" { 0.007 } else { 0.009 };
            joints.push((path.clone(), offset(*dx, *dy), radius, color));
        }
    }
    let name = match chirality {
        Chirality::Left => "LeftHand",
        Chirality::Right => "RightHand",
    };
    SkeletonAsset::from_paths(name, joints)
}

/// Stick-figure body rooted at `Hips`, about 0.9 units tall, standing on y = 0.
pub fn body_skeleton() -> ShadowResult<SkeletonAsset> {
    let t = |x: f32, y: f32| Mat4::from_translation(Vec3::new(x, y, 0.0));
    let torso = Rgba8::opaque(200, 200, 200);
    let limb = Rgba8::opaque(160, 160, 160);
    let joints = [
        ("Hips", t(0.0, 0.45), 0.04, torso),
        ("Hips/Spine", t(0.0, 0.15), 0.035, torso),
        ("Hips/Spine/Neck", t(0.0, 0.15), 0.025, torso),
        ("Hips/Spine/Neck/Head", t(0.0, 0.08), 0.06, torso),
        ("Hips/Spine/LeftShoulder", t(0.09, 0.12), 0.025, limb),
        ("Hips/Spine/LeftShoulder/LeftElbow", t(0.02, -0.14), 0.02, limb),
        ("Hips/Spine/LeftShoulder/LeftElbow/LeftHand", t(0.0, -0.13), 0.025, limb),
        ("Hips/Spine/RightShoulder", t(-0.09, 0.12), 0.025, limb),
        ("Hips/Spine/RightShoulder/RightElbow", t(-0.02, -0.14), 0.02, limb),
        ("Hips/Spine/RightShoulder/RightElbow/RightHand", t(0.0, -0.13), 0.025, limb),
        ("Hips/LeftUpLeg", t(0.06, -0.02), 0.03, limb),
        ("Hips/LeftUpLeg/LeftLeg", t(0.0, -0.21), 0.025, limb),
        ("Hips/LeftUpLeg/LeftLeg/LeftFoot", t(0.0, -0.21), 0.025, limb),
        ("Hips/RightUpLeg", t(-0.06, -0.02), 0.03, limb),
        ("Hips/RightUpLeg/RightLeg", t(0.0, -0.21), 0.025, limb),
        ("Hips/RightUpLeg/RightLeg/RightFoot", t(0.0, -0.21), 0.025, limb),
    ];
    SkeletonAsset::from_paths(
        "Body",
        joints
            .into_iter()
            .map(|(p, m, r, c)| (p.to_owned(), m, r, c)),
    )
}

#[cfg(test)]
#[path = "../../tests/unit/assets/provider.rs"]
mod tests;
