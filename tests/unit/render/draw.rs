use std::sync::Arc;

use super::*;
use crate::{
    foundation::core::{Rgba8, Vec3},
    scene::{entity::Entity, skeleton::SkeletonAsset},
};

fn stick() -> Entity {
    let s = SkeletonAsset::from_paths(
        "stick",
        vec![
            ("A".to_owned(), Mat4::IDENTITY, 0.1, Rgba8::WHITE),
            (
                "A/B".to_owned(),
                Mat4::from_translation(Vec3::new(0.0, 0.5, 0.0)),
                0.1,
                Rgba8::WHITE,
            ),
        ],
    )
    .unwrap();
    Entity::new("stick", Arc::new(s))
}

fn camera() -> Camera {
    let mut cam = Camera::default();
    cam.look_at(Vec3::ZERO, Vec3::new(0.0, 0.0, 20.0), None);
    cam
}

#[test]
fn joints_and_bones_become_primitives() {
    let mut stage = Stage::default();
    stage.add_entity(stick());
    let list = build_draw_list(&stage, &camera(), Size2::new(64, 64).unwrap());
    let discs = list
        .items()
        .iter()
        .filter(|i| matches!(i.shape, Primitive::Disc { .. }))
        .count();
    assert_eq!(discs, 2);
    assert_eq!(list.len(), 3);
    // Bone first, joints drawn over it.
    assert!(matches!(list.items()[0].shape, Primitive::Capsule { .. }));
}

#[test]
fn disabled_entities_are_skipped() {
    let mut stage = Stage::default();
    let id = stage.add_entity(stick());
    stage.entity_mut(id).unwrap().enabled = false;
    assert!(build_draw_list(&stage, &camera(), Size2::new(8, 8).unwrap()).is_empty());
}

#[test]
fn offset_camera_moves_along_local_x() {
    let cam = camera();
    let right = offset_camera(&cam, 0.05);
    assert!((right.position() - cam.position() - Vec3::new(0.05, 0.0, 0.0)).length() < 1e-5);
}
