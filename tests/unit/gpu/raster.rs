use super::*;

fn disc(x: f64, y: f64, r: f64, color: Rgba8, depth: f32) -> DrawItem {
    DrawItem {
        shape: Primitive::Disc {
            center: Point::new(x, y),
            radius: r,
        },
        color,
        depth,
    }
}

fn pixel(buf: &[u8], w: u32, x: u32, y: u32) -> [u8; 4] {
    let i = ((y * w + x) * 4) as usize;
    [buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]
}

#[test]
fn sort_draws_far_items_first() {
    let mut list = DrawList::default();
    list.push(disc(0.0, 0.0, 1.0, Rgba8::WHITE, 1.0));
    list.push(disc(0.0, 0.0, 1.0, Rgba8::WHITE, 5.0));
    list.push(disc(0.0, 0.0, 1.0, Rgba8::WHITE, 3.0));
    list.sort_by_depth();
    let depths: Vec<f32> = list.items().iter().map(|i| i.depth).collect();
    assert_eq!(depths, vec![5.0, 3.0, 1.0]);
}

#[test]
fn degenerate_capsule_is_a_disc() {
    let a = Point::new(3.0, 3.0);
    let cap = Primitive::Capsule { a, b: a, radius: 2.0 }.to_path();
    let d = Primitive::Disc { center: a, radius: 2.0 }.to_path();
    assert_eq!(cap.elements().len(), d.elements().len());
}

#[test]
fn cpu_raster_clears_and_fills() {
    let (w, h) = (16u32, 16u32);
    let mut out = vec![0u8; (w * h * 4) as usize];
    let mut list = DrawList::default();
    list.push(disc(8.0, 8.0, 4.0, Rgba8::WHITE, 1.0));
    rasterize_cpu(w, h, Rgba8::opaque(0, 0, 0), &list, PixelFormat::Rgba8Unorm, &mut out).unwrap();
    assert_eq!(pixel(&out, w, 0, 0), [0, 0, 0, 255]);
    assert_eq!(pixel(&out, w, 8, 8), [255, 255, 255, 255]);
}

#[test]
fn near_item_covers_far_item() {
    let (w, h) = (16u32, 16u32);
    let mut out = vec![0u8; (w * h * 4) as usize];
    let mut list = DrawList::default();
    list.push(disc(8.0, 8.0, 5.0, Rgba8::opaque(255, 0, 0), 1.0));
    list.push(disc(8.0, 8.0, 5.0, Rgba8::opaque(0, 0, 255), 9.0));
    list.sort_by_depth();
    rasterize_cpu(w, h, Rgba8::opaque(0, 0, 0), &list, PixelFormat::Bgra8Unorm, &mut out).unwrap();
    // Stored as BGRA, red on top.
    assert_eq!(pixel(&out, w, 8, 8), [0, 0, 255, 255]);
}

#[test]
fn storage_size_mismatch_is_an_error() {
    let mut out = vec![0u8; 8];
    let err = rasterize_cpu(4, 4, Rgba8::WHITE, &DrawList::default(), PixelFormat::Rgba8Unorm, &mut out);
    assert!(err.is_err());
}

#[test]
fn unpremultiply_restores_color() {
    assert_eq!(unpremultiply([64, 0, 0, 128]), [128, 0, 0, 128]);
    assert_eq!(unpremultiply([0, 0, 0, 0]), [0, 0, 0, 0]);
}
