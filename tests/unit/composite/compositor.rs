use std::time::Duration;

use super::*;
use crate::{
    config::CpuBackendOpts,
    foundation::core::Size2,
    gpu::{cpu::CpuBackend, deferred::DeferredBackend, image::solid_bytes},
};

fn image(
    backend: &dyn GpuBackend,
    w: u32,
    h: u32,
    format: PixelFormat,
    usage: ImageUsage,
    bytes: &[u8],
) -> GpuImage {
    let img = backend
        .create_image(ImageDesc::new(Size2::new(w, h).unwrap(), format, usage))
        .unwrap();
    backend.upload(&img, bytes).unwrap();
    img
}

fn solid(backend: &dyn GpuBackend, format: PixelFormat, rgba: [u8; 4]) -> GpuImage {
    image(
        backend,
        4,
        4,
        format,
        ImageUsage::SHADER_READ | ImageUsage::RENDER_TARGET,
        &solid_bytes(format, 4, 4, rgba),
    )
}

fn output(backend: Arc<dyn GpuBackend>, w: u32, h: u32) -> MutableImage {
    MutableImage::new(
        backend,
        ImageDesc::new(
            Size2::new(w, h).unwrap(),
            PixelFormat::Bgra8Unorm,
            ImageUsage::SHADER_READ | ImageUsage::SHADER_WRITE,
        ),
    )
    .unwrap()
}

fn deferred() -> (Arc<DeferredBackend>, Arc<dyn GpuBackend>) {
    let d = Arc::new(DeferredBackend::new().unwrap());
    let b: Arc<dyn GpuBackend> = d.clone();
    (d, b)
}

fn compositor(backend: &Arc<dyn GpuBackend>, style: BlendStyle) -> Compositor {
    Compositor::new(
        Arc::clone(backend),
        style,
        GrayAddParams::default(),
        EventBus::new(),
    )
}

/// Run one pass to completion and return the first output pixel as RGBA.
fn run(style: BlendStyle, scene: [u8; 4], video: Option<[u8; 4]>) -> [u8; 4] {
    let (d, b) = deferred();
    let c = compositor(&b, style);
    let scene = solid(b.as_ref(), PixelFormat::Rgba8Unorm, scene);
    let video = video.map(|v| solid(b.as_ref(), PixelFormat::Bgra8Unorm, v));
    let out = output(Arc::clone(&b), 4, 4);
    assert_eq!(
        c.composite(&scene, video.as_ref(), &out),
        CompositeOutcome::Submitted
    );
    assert_eq!(d.release_all(), 1);
    assert_eq!(out.generation(), 1);
    let px = out.display_handle().read_rgba8().unwrap();
    [px[0], px[1], px[2], px[3]]
}

#[test]
fn only_one_pass_in_flight() {
    let (d, b) = deferred();
    let c = compositor(&b, BlendStyle::ColorAdd);
    let scene = solid(b.as_ref(), PixelFormat::Rgba8Unorm, [1, 2, 3, 255]);
    let out = output(Arc::clone(&b), 4, 4);

    assert_eq!(c.composite(&scene, None, &out), CompositeOutcome::Submitted);
    assert!(c.is_in_flight());
    for _ in 0..10 {
        assert_eq!(c.composite(&scene, None, &out), CompositeOutcome::Dropped);
    }
    assert_eq!(d.submit_count(), 1);
    assert_eq!(out.generation(), 0);

    d.release_all();
    assert!(!c.is_in_flight());
    assert_eq!(out.generation(), 1);
    assert_eq!(c.composite(&scene, None, &out), CompositeOutcome::Submitted);
    assert_eq!(d.submit_count(), 2);
}

#[test]
fn color_add_saturates_every_channel_value() {
    let b: Arc<dyn GpuBackend> = Arc::new(CpuBackend::new(CpuBackendOpts::default()).unwrap());
    let c = compositor(&b, BlendStyle::ColorAdd);
    let (mut sb, mut vb) = (Vec::new(), Vec::new());
    for y in 0..=255u8 {
        for x in 0..=255u8 {
            sb.extend_from_slice(&[x, y, x, 255 - y]);
            vb.extend_from_slice(&[y, x, 255 - x, y]);
        }
    }
    let usage = ImageUsage::SHADER_READ;
    let scene = image(b.as_ref(), 256, 256, PixelFormat::Rgba8Unorm, usage, &sb);
    let video = image(b.as_ref(), 256, 256, PixelFormat::Rgba8Unorm, usage, &vb);
    let out = output(Arc::clone(&b), 256, 256);
    let (_id, rx) = c.events.subscribe_channel();

    assert_eq!(
        c.composite(&scene, Some(&video), &out),
        CompositeOutcome::Submitted
    );
    match rx.recv_timeout(Duration::from_secs(10)).unwrap() {
        PipelineEvent::CompositeCompleted { style, .. } => assert_eq!(style, BlendStyle::ColorAdd),
        other => panic!("unexpected event {other:?}"),
    }
    let got = out.display_handle().read_rgba8().unwrap();
    for (i, px) in got.chunks_exact(4).enumerate() {
        for ch in 0..4 {
            let want = sb[i * 4 + ch].saturating_add(vb[i * 4 + ch]);
            assert_eq!(px[ch], want, "pixel {i} channel {ch}");
        }
    }
}

#[test]
fn gray_add_white_and_black() {
    assert_eq!(
        run(BlendStyle::GrayAdd, [255; 4], Some([255; 4])),
        [255, 255, 255, 255]
    );
    assert_eq!(
        run(BlendStyle::GrayAdd, [0, 0, 0, 255], Some([0, 0, 0, 255])),
        [0, 0, 0, 255]
    );
    assert_eq!(
        run(BlendStyle::GrayAdd, [255; 4], Some([0, 0, 0, 255])),
        [204, 204, 204, 255]
    );
}

#[test]
fn gray_mix_red_tints_lit_scene() {
    assert_eq!(
        run(BlendStyle::GrayMixRed, [255; 4], Some([0, 0, 0, 255])),
        [255, 0, 0, 255]
    );
    assert_eq!(
        run(BlendStyle::GrayMixRed, [0, 0, 0, 255], Some([255; 4])),
        [255, 255, 255, 255]
    );
}

#[test]
fn missing_video_falls_back_for_every_style() {
    let scene = [200, 100, 50, 255];
    assert_eq!(run(BlendStyle::ColorAdd, scene, None), scene);
    assert_eq!(run(BlendStyle::GrayMixRed, scene, None), scene);
    assert_eq!(run(BlendStyle::GrayAdd, scene, None), [204, 204, 204, 255]);
    assert_eq!(
        run(BlendStyle::GrayAdd, [0, 0, 0, 255], None),
        [0, 0, 0, 255]
    );
}

#[test]
fn gray_mix_red_without_kernel_copies_scene() {
    let (d, b) = deferred();
    d.set_kernel_support(false);
    let c = compositor(&b, BlendStyle::GrayMixRed);
    let scene = solid(b.as_ref(), PixelFormat::Rgba8Unorm, [9, 8, 7, 255]);
    let video = solid(b.as_ref(), PixelFormat::Bgra8Unorm, [255; 4]);
    let out = output(Arc::clone(&b), 4, 4);
    assert_eq!(
        c.composite(&scene, Some(&video), &out),
        CompositeOutcome::Submitted
    );
    d.release_all();
    assert_eq!(&out.display_handle().read_rgba8().unwrap()[..4], &[9, 8, 7, 255]);
}

#[test]
fn temp_allocation_failure_degrades_to_copy() {
    let (d, b) = deferred();
    let c = compositor(&b, BlendStyle::GrayAdd);
    let scene = solid(b.as_ref(), PixelFormat::Rgba8Unorm, [9, 8, 7, 255]);
    let video = solid(b.as_ref(), PixelFormat::Bgra8Unorm, [255; 4]);
    let out = output(Arc::clone(&b), 4, 4);
    // Only the output back store can be allocated.
    d.limit_allocations(Some(1));
    assert_eq!(
        c.composite(&scene, Some(&video), &out),
        CompositeOutcome::Submitted
    );
    d.release_all();
    assert_eq!(&out.display_handle().read_rgba8().unwrap()[..4], &[9, 8, 7, 255]);
}

#[test]
fn gray_add_without_video_temp_keeps_the_thresholded_scene() {
    let (d, b) = deferred();
    let c = compositor(&b, BlendStyle::GrayAdd);
    let scene = solid(b.as_ref(), PixelFormat::Rgba8Unorm, [100, 100, 100, 255]);
    let video = solid(b.as_ref(), PixelFormat::Bgra8Unorm, [255; 4]);
    let out = output(Arc::clone(&b), 4, 4);
    // The output back store and the scene temporary fit; the video temporary does not.
    d.limit_allocations(Some(2));
    assert_eq!(
        c.composite(&scene, Some(&video), &out),
        CompositeOutcome::Submitted
    );
    assert_eq!(d.release_all(), 1);
    assert_eq!(&out.display_handle().read_rgba8().unwrap()[..4], &[204, 204, 204, 255]);
}

#[test]
fn refused_submits_abandon_and_release() {
    let (d, b) = deferred();
    let c = compositor(&b, BlendStyle::ColorAdd);
    let scene = solid(b.as_ref(), PixelFormat::Rgba8Unorm, [1, 1, 1, 255]);
    let out = output(Arc::clone(&b), 4, 4);
    d.fail_next_submits(2);
    assert_eq!(c.composite(&scene, None, &out), CompositeOutcome::Abandoned);
    assert!(!c.is_in_flight());
    assert_eq!(out.generation(), 0);
    assert_eq!(c.composite(&scene, None, &out), CompositeOutcome::Submitted);
}

#[test]
fn first_refusal_is_retried_as_copy() {
    let (d, b) = deferred();
    let c = compositor(&b, BlendStyle::ColorAdd);
    let scene = solid(b.as_ref(), PixelFormat::Rgba8Unorm, [1, 2, 3, 255]);
    let video = solid(b.as_ref(), PixelFormat::Bgra8Unorm, [100, 100, 100, 255]);
    let out = output(Arc::clone(&b), 4, 4);
    d.fail_next_submits(1);
    assert_eq!(
        c.composite(&scene, Some(&video), &out),
        CompositeOutcome::Submitted
    );
    d.release_all();
    assert_eq!(&out.display_handle().read_rgba8().unwrap()[..4], &[1, 2, 3, 255]);
}

#[test]
fn mismatched_video_size_degrades_to_copy() {
    let (d, b) = deferred();
    let c = compositor(&b, BlendStyle::ColorAdd);
    let scene = solid(b.as_ref(), PixelFormat::Rgba8Unorm, [5, 6, 7, 255]);
    let video = image(
        b.as_ref(),
        2,
        2,
        PixelFormat::Bgra8Unorm,
        ImageUsage::SHADER_READ,
        &[0; 16],
    );
    let out = output(Arc::clone(&b), 4, 4);
    assert_eq!(
        c.composite(&scene, Some(&video), &out),
        CompositeOutcome::Submitted
    );
    d.release_all();
    assert_eq!(&out.display_handle().read_rgba8().unwrap()[..4], &[5, 6, 7, 255]);
}

#[test]
fn style_changes_apply_to_next_pass() {
    let (_d, b) = deferred();
    let c = compositor(&b, BlendStyle::GrayAdd);
    c.set_style(BlendStyle::ColorAdd);
    assert_eq!(c.style(), BlendStyle::ColorAdd);
}

#[test]
fn stereo_routes_eyes_by_style() {
    let (d, b) = deferred();
    let c = compositor(&b, BlendStyle::GrayAdd);
    let left = solid(b.as_ref(), PixelFormat::Rgba8Unorm, [255, 0, 0, 255]);
    let right = solid(b.as_ref(), PixelFormat::Rgba8Unorm, [0, 0, 255, 255]);
    let (ol, or) = (output(Arc::clone(&b), 4, 4), output(Arc::clone(&b), 4, 4));
    let first = |o: &MutableImage| {
        let px = o.display_handle().read_rgba8().unwrap();
        [px[0], px[1], px[2], px[3]]
    };

    for (style, want_l, want_r) in [
        (StereoStyle::Stereo, [255, 0, 0, 255], [0, 0, 255, 255]),
        (StereoStyle::Left, [255, 0, 0, 255], [255, 0, 0, 255]),
        (StereoStyle::Right, [0, 0, 255, 255], [0, 0, 255, 255]),
    ] {
        assert_eq!(
            c.composite_stereo(&left, &right, &ol, &or, style),
            CompositeOutcome::Submitted
        );
        assert_eq!(
            c.composite(&left, None, &ol),
            CompositeOutcome::Dropped,
            "stereo shares the guard"
        );
        d.release_all();
        assert_eq!(first(&ol), want_l);
        assert_eq!(first(&or), want_r);
    }
}
