use std::time::Duration;

use super::*;
use crate::gpu::image::{ImageUsage, PixelFormat, solid_bytes};

fn backend() -> CpuBackend {
    CpuBackend::new(CpuBackendOpts::default()).unwrap()
}

fn image(b: &CpuBackend, format: PixelFormat, rgba: [u8; 4]) -> GpuImage {
    let img = b
        .create_image(ImageDesc {
            width: 3,
            height: 2,
            format,
            usage: ImageUsage::SHADER_READ | ImageUsage::SHADER_WRITE,
        })
        .unwrap();
    b.upload(&img, &solid_bytes(format, 3, 2, rgba)).unwrap();
    img
}

#[test]
fn copy_converts_bgra_to_rgba() {
    let b = backend();
    let src = image(&b, PixelFormat::Bgra8Unorm, [10, 20, 30, 255]);
    let dst = image(&b, PixelFormat::Rgba8Unorm, [0, 0, 0, 0]);
    let mut batch = CommandBatch::new("copy");
    batch.push(Command::Copy {
        src,
        dst: dst.clone(),
    });
    b.execute_batch(&batch).unwrap();
    assert_eq!(&b.read_rgba8(&dst).unwrap()[0..4], &[10, 20, 30, 255]);
    assert_eq!(&dst.cpu_bytes().unwrap().read()[0..4], &[10, 20, 30, 255]);
}

#[test]
fn submit_completes_on_queue_thread_in_order() {
    let b = backend();
    let (tx, rx) = crossbeam_channel::unbounded();
    for i in 0..4u32 {
        let mut batch = CommandBatch::new("order");
        batch.push(Command::Add {
            a: image(&b, PixelFormat::Rgba8Unorm, [1, 1, 1, 1]),
            b: image(&b, PixelFormat::Rgba8Unorm, [2, 2, 2, 2]),
            dst: image(&b, PixelFormat::Rgba8Unorm, [0, 0, 0, 0]),
        });
        let tx = tx.clone();
        b.submit(
            batch,
            Box::new(move |res| {
                let name = std::thread::current().name().map(str::to_owned);
                let _ = tx.send((i, res.is_ok(), name));
            }),
        )
        .unwrap();
    }
    for want in 0..4u32 {
        let (i, ok, name) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(i, want);
        assert!(ok);
        assert_eq!(name.as_deref(), Some("shadowmix-cpu-queue"));
    }
}

#[test]
fn invalid_batch_is_rejected_before_enqueue() {
    let b = backend();
    let src = image(&b, PixelFormat::Rgba8Unorm, [0, 0, 0, 0]);
    let mut batch = CommandBatch::new("alias");
    batch.push(Command::ThresholdToZero {
        src: src.clone(),
        dst: src,
        threshold: 0.0,
    });
    let err = b.submit(batch, Box::new(|_| panic!("must not run")));
    assert!(matches!(err, Err(ShadowError::Render(_))));
}

#[test]
fn upload_checks_length() {
    let b = backend();
    let img = image(&b, PixelFormat::Rgba8Unorm, [0, 0, 0, 0]);
    assert!(b.upload(&img, &[0u8; 4]).is_err());
}

#[test]
fn gray_mix_red_kernel_is_supported() {
    assert!(backend().supports_kernel(KernelKind::GrayMixRed));
}
