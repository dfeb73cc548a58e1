use super::*;

fn chain() -> SkeletonAsset {
    let t = |y: f32| Mat4::from_translation(Vec3::new(0.0, y, 0.0));
    SkeletonAsset::from_paths(
        "chain",
        vec![
            ("Root".to_owned(), t(0.0), 0.1, Rgba8::WHITE),
            ("Root/A".to_owned(), t(1.0), 0.1, Rgba8::WHITE),
            ("Root/A/B".to_owned(), t(1.0), 0.1, Rgba8::WHITE),
        ],
    )
    .unwrap()
}

#[test]
fn parents_come_from_paths() {
    let s = chain();
    assert_eq!(s.joints()[0].parent, None);
    assert_eq!(s.joints()[2].parent, Some(JointIndex(1)));
    assert_eq!(s.joint_index("Root/A/B"), Some(JointIndex(2)));
}

#[test]
fn child_before_parent_is_rejected() {
    let err = SkeletonAsset::from_paths(
        "bad",
        vec![("Root/A".to_owned(), Mat4::IDENTITY, 0.1, Rgba8::WHITE)],
    )
    .unwrap_err();
    assert!(matches!(err, ShadowError::Validation(_)));
}

#[test]
fn forward_kinematics_accumulates() {
    let s = chain();
    let posed = s.evaluate(&s.rest_pose(), &[]);
    assert_eq!(posed.points[2], Vec3::new(0.0, 2.0, 0.0));
    assert_eq!(posed.bones, vec![(0, 1), (1, 2)]);
}

#[test]
fn effectors_override_positions() {
    let s = chain();
    let at = Vec3::new(5.0, 0.0, 0.0);
    let posed = s.evaluate(&s.rest_pose(), &[(JointIndex(2), at)]);
    assert_eq!(posed.points[2], at);
}

#[test]
fn joint_table_skips_unmapped_and_applies_known() {
    let s = chain();
    let bindings = vec![
        JointBinding {
            tracked: "a".to_owned(),
            joint: "Root/A".to_owned(),
        },
        JointBinding {
            tracked: "ghost".to_owned(),
            joint: "Root/Nope".to_owned(),
        },
    ];
    let table = JointTable::build(&s, &bindings);
    assert_eq!(table.len(), 1);
    assert_eq!(table.unmapped(), &["ghost".to_owned()]);

    let mut pose = s.rest_pose();
    let bent = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));
    let applied = table.apply(
        &mut pose,
        &[("a".to_owned(), bent), ("unknown".to_owned(), Mat4::IDENTITY)],
    );
    assert_eq!(applied, 1);
    let posed = s.evaluate(&pose, &[]);
    assert_eq!(posed.points[1], Vec3::new(1.0, 0.0, 0.0));
    assert_eq!(posed.points[2], Vec3::new(1.0, 1.0, 0.0));
}
