use super::*;

fn desc(w: u32, h: u32) -> ImageDesc {
    ImageDesc {
        width: w,
        height: h,
        format: PixelFormat::Rgba8Unorm,
        usage: ImageUsage::SHADER_READ,
    }
}

#[test]
fn zero_sized_images_are_rejected() {
    let err = GpuImage::new_cpu(desc(0, 4)).unwrap_err();
    assert!(matches!(err, ShadowError::Setup(_)));
    assert!(GpuImage::new_cpu(desc(4, 0)).is_err());
}

#[test]
fn empty_usage_is_rejected() {
    let mut d = desc(2, 2);
    d.usage = ImageUsage::empty();
    assert!(d.validate().is_err());
}

#[test]
fn single_mip_and_layer() {
    let d = desc(3, 2);
    assert_eq!(d.mip_level_count(), 1);
    assert_eq!(d.array_length(), 1);
    assert_eq!(d.byte_len(), 24);
}

#[test]
fn handles_share_storage_and_count() {
    let a = GpuImage::new_cpu(desc(2, 2)).unwrap();
    assert_eq!(a.handle_count(), 1);
    let b = a.clone();
    assert!(a.ptr_eq(&b));
    assert_eq!(a.handle_count(), 2);
    drop(b);
    assert_eq!(a.handle_count(), 1);
}

#[test]
fn ids_are_unique() {
    let a = GpuImage::new_cpu(desc(1, 1)).unwrap();
    let b = GpuImage::new_cpu(desc(1, 1)).unwrap();
    assert_ne!(a.id(), b.id());
}

#[test]
fn bgra_swizzle_round_trips_a_pixel() {
    let px = [10, 20, 30, 40];
    let stored = PixelFormat::Bgra8Unorm.store_rgba(px);
    assert_eq!(stored, [30, 20, 10, 40]);
    assert_eq!(PixelFormat::Bgra8Unorm.to_rgba(stored), px);
    assert_eq!(to_rgba_bytes(PixelFormat::Bgra8Unorm, &stored), px.to_vec());
}

#[test]
fn require_reports_missing_usage() {
    let img = GpuImage::new_cpu(desc(1, 1)).unwrap();
    assert!(img.require(ImageUsage::SHADER_READ, "src").is_ok());
    let err = img.require(ImageUsage::RENDER_TARGET, "target").unwrap_err();
    assert!(matches!(err, ShadowError::Render(_)));
}
