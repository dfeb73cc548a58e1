use super::*;
use crate::{
    assets::provider::hand_skeleton, config::default_hand_bindings,
    scene::skeleton::JointTable,
};

fn hands() -> SyntheticHands {
    SyntheticHands::new(
        Arc::new(hand_skeleton(Chirality::Left).unwrap()),
        Arc::new(hand_skeleton(Chirality::Right).unwrap()),
        default_hand_bindings(),
        30.0,
    )
}

#[test]
fn first_frame_adds_both_hands() {
    let mut h = hands();
    let first = h.next_events();
    assert_eq!(first.len(), 2);
    assert!(first.iter().all(|e| e.kind == AnchorEventKind::Added && e.tracked));
    assert_eq!(first[0].chirality, Chirality::Left);
    assert!(first[0].position().x < first[1].position().x);

    let second = h.next_events();
    assert!(second.iter().all(|e| e.kind == AnchorEventKind::Updated));
    assert_eq!(h.frame(), 2);
}

#[test]
fn joints_cover_the_binding_table() {
    let mut h = hands();
    let ev = &h.next_events()[1];
    assert_eq!(ev.joints.len(), 24);
    let skel = hand_skeleton(Chirality::Right).unwrap();
    let table = JointTable::build(&skel, &default_hand_bindings());
    let mut pose = skel.rest_pose();
    assert_eq!(table.apply(&mut pose, &ev.joints), 24);
}

#[test]
fn motion_is_deterministic() {
    let (mut a, mut b) = (hands(), hands());
    for _ in 0..5 {
        assert_eq!(a.next_events(), b.next_events());
    }
}

#[test]
fn removed_events_are_untracked() {
    let h = hands();
    let gone = h.removed_events();
    assert!(gone
        .iter()
        .all(|e| e.kind == AnchorEventKind::Removed && !e.tracked && e.joints.is_empty()));
}

#[test]
fn subject_kind_parses() {
    assert_eq!("Body".parse::<SubjectKind>().unwrap(), SubjectKind::Body);
    assert!("tail".parse::<SubjectKind>().is_err());
}

#[test]
fn non_finite_transforms_are_rejected() {
    assert!(finite_transform(&Mat4::IDENTITY).is_ok());
    let mut m = Mat4::IDENTITY;
    m.w_axis.x = f32::NAN;
    assert!(finite_transform(&m).is_err());
}
