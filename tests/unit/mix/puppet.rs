use super::*;
use crate::{
    assets::provider::BuiltinAssets,
    config::{SkeletonConfig, default_hand_bindings},
    mix::tracking::SyntheticHands,
    scene::camera::Camera,
};

fn load(kind: SubjectKind) -> (Stage, Puppet, BuiltinAssets) {
    let assets = BuiltinAssets::new();
    let mut stage = Stage::new(Camera::default());
    let cfg = SkeletonConfig::default();
    let puppet = Puppet::load(kind, &mut stage, &assets, &cfg.hand, &cfg.body).unwrap();
    (stage, puppet, assets)
}

fn synthetic(assets: &BuiltinAssets) -> SyntheticHands {
    SyntheticHands::new(
        assets.hand_skeleton(Chirality::Left).unwrap(),
        assets.hand_skeleton(Chirality::Right).unwrap(),
        default_hand_bindings(),
        30.0,
    )
}

#[test]
fn hands_stay_hidden_until_tracked() {
    let (mut stage, puppet, assets) = load(SubjectKind::Hand);
    assert_eq!(stage.entities().len(), 2);
    assert!(stage.visual_bounds().is_none());

    let mut hands = synthetic(&assets);
    for ev in hands.next_events() {
        assert!(puppet.apply(&mut stage, &ev).unwrap());
    }
    let bounds = stage.visual_bounds().unwrap();
    assert!((bounds.center().y - hands.center.y).abs() < 0.15);
}

#[test]
fn removed_hand_is_disabled() {
    let (mut stage, puppet, assets) = load(SubjectKind::Hand);
    let mut hands = synthetic(&assets);
    for ev in hands.next_events() {
        puppet.apply(&mut stage, &ev).unwrap();
    }
    for ev in hands.removed_events() {
        puppet.apply(&mut stage, &ev).unwrap();
    }
    assert!(stage.entities().iter().all(|e| !e.enabled));
}

#[test]
fn untracked_update_hides_hand() {
    let (mut stage, puppet, assets) = load(SubjectKind::Hand);
    let mut hands = synthetic(&assets);
    let mut ev = hands.next_events().remove(0);
    ev.tracked = false;
    puppet.apply(&mut stage, &ev).unwrap();
    assert!(stage.visual_bounds().is_none());
}

#[test]
fn hand_joints_follow_tracking() {
    let (mut stage, puppet, assets) = load(SubjectKind::Hand);
    let mut hands = synthetic(&assets);
    hands.next_events();
    let ev = hands
        .next_events()
        .into_iter()
        .find(|e| e.chirality == Chirality::Right)
        .unwrap();
    puppet.apply(&mut stage, &ev).unwrap();
    let right = &stage.entities()[1];
    let skel = right.skeleton();
    let idx = skel
        .joint_index("Wrist/IndexFingerMetacarpal/IndexFingerKnuckle")
        .unwrap();
    let tracked = &ev.joints.iter().find(|(n, _)| n == "indexFingerKnuckle").unwrap().1;
    assert_eq!(right.pose().local(idx), Some(*tracked));
}

#[test]
fn body_hands_pin_to_tracked_positions() {
    let (mut stage, puppet, assets) = load(SubjectKind::Body);
    assert!(stage.visual_bounds().is_some());
    let mut hands = synthetic(&assets);
    let events = hands.next_events();
    for ev in &events {
        puppet.apply(&mut stage, ev).unwrap();
    }
    let body = &stage.entities()[0];
    let rig = BodyRigConfig::default();
    let left = body.skeleton().joint_index(&rig.left_hand_joint).unwrap();
    let geo = body.world_geometry();
    let want = events[0].position();
    assert!((geo.points[left.0] - want).length() < 1e-4);

    for ev in hands.removed_events() {
        puppet.apply(&mut stage, &ev).unwrap();
    }
    let geo = stage.entities()[0].world_geometry();
    assert!((geo.points[left.0] - want).length() > 1e-3);
}

#[test]
fn body_head_leans_toward_device() {
    let (mut stage, puppet, assets) = load(SubjectKind::Body);
    let mut hands = synthetic(&assets);
    let mut ev = hands.next_events().remove(0);
    ev.device_transform = Some(Mat4::from_translation(Vec3::new(5.0, 1.45, -0.5)));
    puppet.apply(&mut stage, &ev).unwrap();

    let body = &stage.entities()[0];
    let head = body
        .skeleton()
        .joint_index(&BodyRigConfig::default().head_joint)
        .unwrap();
    let rest = body
        .skeleton()
        .evaluate(&body.skeleton().rest_pose(), &[])
        .transformed(&body.transform);
    let geo = body.world_geometry();
    assert!(geo.points[head.0].x > rest.points[head.0].x + 0.01);
}

#[test]
fn unload_clears_stage() {
    let (mut stage, puppet, _assets) = load(SubjectKind::Hand);
    puppet.unload(&mut stage);
    assert!(stage.entities().is_empty());
}
