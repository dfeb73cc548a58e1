use super::*;
use crate::gpu::image::{ImageDesc, PixelFormat};

fn img(w: u32, h: u32, usage: ImageUsage) -> GpuImage {
    GpuImage::new_cpu(ImageDesc {
        width: w,
        height: h,
        format: PixelFormat::Rgba8Unorm,
        usage,
    })
    .unwrap()
}

fn rw() -> ImageUsage {
    ImageUsage::SHADER_READ | ImageUsage::SHADER_WRITE
}

#[test]
fn empty_batch_is_rejected() {
    assert!(CommandBatch::new("empty").validate().is_err());
}

#[test]
fn raster_requires_render_target_usage() {
    let target = img(4, 4, ImageUsage::SHADER_READ);
    let cmd = Command::Rasterize {
        target,
        clear: Rgba8::opaque(0, 0, 0),
        draw: Arc::new(DrawList::default()),
    };
    assert!(matches!(cmd.validate(), Err(ShadowError::Render(_))));
}

#[test]
fn size_mismatch_is_rejected() {
    let cmd = Command::Add {
        a: img(4, 4, rw()),
        b: img(4, 5, rw()),
        dst: img(4, 4, rw()),
    };
    let err = cmd.validate().unwrap_err().to_string();
    assert!(err.contains("4x5"), "{err}");
}

#[test]
fn aliased_destination_is_rejected() {
    let a = img(2, 2, rw());
    let cmd = Command::ThresholdToZero {
        src: a.clone(),
        dst: a,
        threshold: 0.0,
    };
    assert!(cmd.validate().is_err());
}

#[test]
fn copy_needs_write_usage_on_destination() {
    let cmd = Command::Copy {
        src: img(2, 2, rw()),
        dst: img(2, 2, ImageUsage::SHADER_READ),
    };
    assert!(cmd.validate().is_err());
}

#[test]
fn valid_batch_passes() {
    let mut batch = CommandBatch::new("ok");
    batch.push(Command::Copy {
        src: img(2, 2, rw()),
        dst: img(2, 2, rw()),
    });
    assert_eq!(batch.len(), 1);
    batch.validate().unwrap();
}

#[test]
fn timing_duration_never_negative() {
    let now = Instant::now();
    let t = BatchTiming {
        start: now + Duration::from_millis(5),
        end: now,
    };
    assert_eq!(t.duration(), Duration::ZERO);
}
