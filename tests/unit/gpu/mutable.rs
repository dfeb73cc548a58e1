use super::*;
use crate::{
    config::CpuBackendOpts,
    gpu::{
        cpu::CpuBackend,
        image::{ImageUsage, PixelFormat, solid_bytes},
    },
};

fn output() -> (Arc<dyn GpuBackend>, MutableImage) {
    let backend: Arc<dyn GpuBackend> = Arc::new(CpuBackend::new(CpuBackendOpts::default()).unwrap());
    let desc = ImageDesc {
        width: 2,
        height: 2,
        format: PixelFormat::Bgra8Unorm,
        usage: ImageUsage::SHADER_WRITE | ImageUsage::SHADER_READ,
    };
    let out = MutableImage::new(Arc::clone(&backend), desc).unwrap();
    (backend, out)
}

#[test]
fn readers_see_old_store_until_commit() {
    let (backend, out) = output();
    let display = out.display_handle();
    let before = display.current();

    let pending = out.replace().unwrap();
    assert!(!pending.target().ptr_eq(&before));
    backend
        .upload(pending.target(), &solid_bytes(PixelFormat::Bgra8Unorm, 2, 2, [9, 8, 7, 255]))
        .unwrap();
    assert!(display.current().ptr_eq(&before));
    assert_eq!(display.generation(), 0);

    out.commit(pending);
    assert!(!display.current().ptr_eq(&before));
    assert_eq!(display.generation(), 1);
    assert_eq!(&display.read_rgba8().unwrap()[0..4], &[9, 8, 7, 255]);
}

#[test]
fn unshared_spare_is_recycled() {
    let (_backend, out) = output();
    let first_front = out.display_handle().current().id();
    let p = out.replace().unwrap();
    out.commit(p);
    // The old front is now the spare and nobody else holds it.
    let p = out.replace().unwrap();
    assert_eq!(p.target().id(), first_front);
}

#[test]
fn spare_held_by_reader_is_not_recycled() {
    let (_backend, out) = output();
    let held = out.display_handle().current();
    let p = out.replace().unwrap();
    out.commit(p);
    let p = out.replace().unwrap();
    assert_ne!(p.target().id(), held.id());
}

#[test]
fn abandoned_store_is_not_published() {
    let (_backend, out) = output();
    let front = out.display_handle().current().id();
    let p = out.replace().unwrap();
    let abandoned = p.target().id();
    out.abandon(p);
    assert_eq!(out.display_handle().current().id(), front);
    assert_eq!(out.generation(), 0);
    assert_eq!(out.replace().unwrap().target().id(), abandoned);
}

#[test]
fn upload_and_commit_publishes_bytes() {
    let (_backend, out) = output();
    let display = out.display_handle();
    out.upload_and_commit(&solid_bytes(PixelFormat::Bgra8Unorm, 2, 2, [1, 2, 3, 255]))
        .unwrap();
    assert_eq!(display.generation(), 1);
    assert_eq!(&display.read_rgba8().unwrap()[..4], &[1, 2, 3, 255]);
}

#[test]
fn failed_upload_keeps_front_store() {
    let (_backend, out) = output();
    assert!(out.upload_and_commit(&[0; 3]).is_err());
    assert_eq!(out.generation(), 0);
}
