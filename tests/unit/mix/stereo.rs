use std::time::Duration;

use crossbeam_channel::Receiver;

use super::*;
use crate::{
    foundation::core::{Mat4, Rgba8},
    gpu::cpu::CpuBackend,
    scene::skeleton::SkeletonAsset,
};

fn mix(events: EventBus<PipelineEvent>) -> StereoMix {
    let backend: Arc<dyn GpuBackend> = Arc::new(CpuBackend::new(Default::default()).unwrap());
    let config = MixConfig {
        blend_style: crate::composite::blend::BlendStyle::ColorAdd,
        ..MixConfig::default()
    };
    let mut m = StereoMix::new(
        backend,
        Size2::new(16, 16).unwrap(),
        Camera::default(),
        &config,
        events,
    )
    .unwrap();
    let dot = SkeletonAsset::from_paths(
        "dot",
        vec![("J".to_owned(), Mat4::IDENTITY, 0.3, Rgba8::WHITE)],
    )
    .unwrap();
    m.add_entity(Entity::new("dot", Arc::new(dot))).unwrap();
    assert!(m.auto_frame().unwrap());
    m
}

fn wait_composite(rx: &Receiver<PipelineEvent>) {
    loop {
        let ev = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("composite did not complete");
        if matches!(ev, PipelineEvent::CompositeCompleted { .. }) {
            return;
        }
    }
}

fn lit(handle: &DisplayHandle) -> bool {
    handle
        .read_rgba8()
        .unwrap()
        .chunks_exact(4)
        .any(|p| p[0] > 0)
}

#[test]
fn render_composites_both_eyes() {
    let events = EventBus::new();
    let (_id, rx) = events.subscribe_channel();
    let m = mix(events);
    assert_eq!(
        pollster::block_on(m.render_and_composite()).unwrap(),
        RenderOutcome::Rendered
    );
    wait_composite(&rx);
    assert!(lit(&m.output(Eye::Left)));
    assert!(lit(&m.output(Eye::Right)));
}

#[test]
fn style_change_recomposites_immediately() {
    let events = EventBus::new();
    let (_id, rx) = events.subscribe_channel();
    let m = mix(events);
    pollster::block_on(m.render_and_composite()).unwrap();
    wait_composite(&rx);
    while m.compositor().is_in_flight() {
        std::thread::yield_now();
    }

    assert_eq!(
        m.set_stereo_style(StereoStyle::Left).unwrap(),
        CompositeOutcome::Submitted
    );
    wait_composite(&rx);
    assert_eq!(m.stereo_style(), StereoStyle::Left);
    assert_eq!(
        m.output(Eye::Left).read_rgba8().unwrap(),
        m.output(Eye::Right).read_rgba8().unwrap()
    );
}

#[test]
fn clean_unwires_and_is_repeatable() {
    let events = EventBus::new();
    let mut m = mix(events.clone());
    assert_eq!(events.handler_count(), 1);
    m.clean();
    m.clean();
    assert!(m.is_torn_down());
    assert_eq!(events.handler_count(), 0);
    assert!(m.renderer().stage().entities().is_empty());
    assert!(matches!(m.composite(), Err(ShadowError::TornDown)));
    assert!(matches!(
        pollster::block_on(m.render_and_composite()),
        Err(ShadowError::TornDown)
    ));
}
