use futures::FutureExt as _;

use super::*;
use crate::{
    config::CpuBackendOpts,
    gpu::{cpu::CpuBackend, deferred::DeferredBackend},
    scene::skeleton::SkeletonAsset,
};

fn dot_entity(at: Vec3) -> Entity {
    let s = SkeletonAsset::from_paths(
        "dot",
        vec![("J".to_owned(), Mat4::IDENTITY, 0.2, Rgba8::WHITE)],
    )
    .unwrap();
    let mut e = Entity::new("dot", Arc::new(s));
    e.transform = Mat4::from_translation(at);
    e
}

fn ortho(scale: f32) -> Camera {
    Camera {
        projection: Projection::Orthographic { scale },
        ..Camera::default()
    }
}

#[test]
fn render_draws_into_color_image_and_emits() {
    let backend: Arc<dyn GpuBackend> = Arc::new(CpuBackend::new(CpuBackendOpts::default()).unwrap());
    let events = EventBus::new();
    let (_id, rx) = events.subscribe_channel();
    let mut r = SceneRenderer::new(
        Arc::clone(&backend),
        Size2::new(32, 32).unwrap(),
        ortho(1.0),
        events,
    )
    .unwrap();
    r.add_entity(dot_entity(Vec3::new(3.0, 3.0, 0.0)));
    assert!(r.auto_frame());

    let outcome = pollster::block_on(r.render_async()).unwrap();
    assert_eq!(outcome, RenderOutcome::Rendered);
    assert_eq!(
        rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap(),
        PipelineEvent::RenderUpdated
    );
    assert!(!r.is_rendering());

    let px = backend.read_rgba8(r.color_image()).unwrap();
    let center = ((16 * 32 + 16) * 4) as usize;
    assert_eq!(&px[center..center + 4], &[255, 255, 255, 255]);
    assert_eq!(&px[0..4], &[0, 0, 0, 255]);
}

#[test]
fn second_render_is_busy_while_first_is_outstanding() {
    let backend = Arc::new(DeferredBackend::new().unwrap());
    let r = SceneRenderer::new(
        backend.clone(),
        Size2::new(8, 8).unwrap(),
        ortho(1.0),
        EventBus::new(),
    )
    .unwrap();

    let mut first = Box::pin(r.render_async());
    assert!((&mut first).now_or_never().is_none());
    assert!(r.is_rendering());
    assert_eq!(
        pollster::block_on(r.render_async()).unwrap(),
        RenderOutcome::Busy
    );
    assert_eq!(backend.submit_count(), 1);

    backend.release_all();
    assert_eq!(pollster::block_on(first).unwrap(), RenderOutcome::Rendered);
    assert!(!r.is_rendering());
}

#[test]
fn target_without_render_usage_fails_without_a_frame() {
    let backend: Arc<dyn GpuBackend> = Arc::new(DeferredBackend::new().unwrap());
    let target = backend
        .create_image(ImageDesc::new(
            Size2::new(4, 4).unwrap(),
            PixelFormat::Rgba8Unorm,
            ImageUsage::SHADER_READ,
        ))
        .unwrap();
    let r = SceneRenderer::with_target(Arc::clone(&backend), target, Camera::default(), EventBus::new());
    let err = pollster::block_on(r.render_async()).unwrap_err();
    assert!(matches!(err, ShadowError::Render(_)), "{err}");
    assert!(!r.is_rendering());
}

#[test]
fn refused_submit_releases_guard() {
    let backend = Arc::new(DeferredBackend::new().unwrap());
    let r = SceneRenderer::new(
        backend.clone(),
        Size2::new(4, 4).unwrap(),
        Camera::default(),
        EventBus::new(),
    )
    .unwrap();
    backend.fail_next_submits(1);
    assert!(pollster::block_on(r.render_async()).is_err());
    assert!(!r.is_rendering());
}

#[test]
fn auto_frame_centers_camera_at_distance() {
    let backend: Arc<dyn GpuBackend> = Arc::new(DeferredBackend::new().unwrap());
    let mut r = SceneRenderer::new(backend, Size2::new(4, 4).unwrap(), Camera::default(), EventBus::new())
        .unwrap();
    assert!(!r.auto_frame());
    r.add_entity(dot_entity(Vec3::new(0.0, 1.4, -0.2)));
    r.add_entity(dot_entity(Vec3::new(2.0, 1.4, -0.2)));
    r.set_camera_distance(20.0);
    assert!(r.auto_frame());
    let pos = r.stage().camera().transform.w_axis.truncate();
    assert!((pos - Vec3::new(1.0, 1.4, 19.8)).length() < 1e-4);
}

#[test]
fn remove_all_entities_keeps_camera_usable() {
    let backend: Arc<dyn GpuBackend> = Arc::new(DeferredBackend::new().unwrap());
    let mut r = SceneRenderer::new(backend, Size2::new(4, 4).unwrap(), ortho(0.5), EventBus::new())
        .unwrap();
    let id = r.add_entity(dot_entity(Vec3::ZERO));
    r.remove_all_entities();
    assert!(r.remove_entity(id).is_none());
    assert_eq!(
        r.stage().camera().projection,
        Projection::Orthographic { scale: 0.5 }
    );
}

#[test]
fn default_light_toggles() {
    let backend: Arc<dyn GpuBackend> = Arc::new(DeferredBackend::new().unwrap());
    let mut r = SceneRenderer::new(backend, Size2::new(4, 4).unwrap(), Camera::default(), EventBus::new())
        .unwrap();
    r.set_default_light(false);
    assert!(r.stage().camera().light.is_none());
    r.set_default_light(true);
    assert!(r.stage().camera().light.is_some());
}
