//! Per-pixel operations shared by the CPU backend and the reference tests.
//!
//! All buffers are tightly packed logical RGBA8 of equal length.

use rayon::prelude::*;

use crate::foundation::error::{ShadowError, ShadowResult};

/// Rows processed per rayon task.
const ROWS_PER_TASK: usize = 16;

/// Rec. 601 luminance in fixed point.
#[inline]
pub fn luma(px: [u8; 4]) -> u8 {
    let y = 77 * u32::from(px[0]) + 150 * u32::from(px[1]) + 29 * u32::from(px[2]) + 128;
    (y >> 8).min(255) as u8
}

/// Normalized level to an 8-bit value.
#[inline]
pub fn unit_to_u8(v: f32) -> u8 {
    ((v.clamp(0.0, 1.0) * 255.0).round() as i32).clamp(0, 255) as u8
}

#[inline]
fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

#[inline]
fn px(bytes: &[u8]) -> [u8; 4] {
    [bytes[0], bytes[1], bytes[2], bytes[3]]
}

/// Saturating add of every channel, alpha included.
#[inline]
pub fn add_px(a: [u8; 4], b: [u8; 4]) -> [u8; 4] {
    [
        a[0].saturating_add(b[0]),
        a[1].saturating_add(b[1]),
        a[2].saturating_add(b[2]),
        a[3].saturating_add(b[3]),
    ]
}

/// Luminance above `threshold` becomes `max`, else 0. Alpha is preserved.
#[inline]
pub fn threshold_binary_px(src: [u8; 4], threshold: u8, max: u8) -> [u8; 4] {
    let v = if luma(src) > threshold { max } else { 0 };
    [v, v, v, src[3]]
}

/// Luminance above `threshold` is kept, else 0. Alpha is preserved.
#[inline]
pub fn threshold_to_zero_px(src: [u8; 4], threshold: u8) -> [u8; 4] {
    let l = luma(src);
    let v = if l > threshold { l } else { 0 };
    [v, v, v, src[3]]
}

/// Grayscale video tinted toward red where the scene is bright.
#[inline]
pub fn gray_mix_red_px(video: [u8; 4], scene: [u8; 4]) -> [u8; 4] {
    let g = u16::from(luma(video));
    let m = u16::from(luma(scene));
    let r = (g as u8).saturating_add(mul_div255(255 - g, m));
    let rest = mul_div255(g, 255 - m);
    [r, rest, rest, 255]
}

fn check_len(what: &str, dst: &[u8], srcs: &[&[u8]]) -> ShadowResult<()> {
    if !dst.len().is_multiple_of(4) || srcs.iter().any(|s| s.len() != dst.len()) {
        return Err(ShadowError::render(format!(
            "{what} expects equal-length rgba8 buffers"
        )));
    }
    Ok(())
}

fn for_each_row<F>(dst: &mut [u8], row_bytes: usize, parallel: bool, f: F)
where
    F: Fn(usize, &mut [u8]) + Sync + Send,
{
    let row_bytes = row_bytes.max(4);
    if parallel {
        dst.par_chunks_mut(row_bytes * ROWS_PER_TASK)
            .enumerate()
            .for_each(|(chunk, rows)| f(chunk * row_bytes * ROWS_PER_TASK, rows));
    } else {
        f(0, dst);
    }
}

/// `dst = a + b` per channel with saturation.
pub fn add_saturating(
    a: &[u8],
    b: &[u8],
    dst: &mut [u8],
    row_bytes: usize,
    parallel: bool,
) -> ShadowResult<()> {
    check_len("add", dst, &[a, b])?;
    for_each_row(dst, row_bytes, parallel, |offset, rows| {
        for (i, out) in rows.chunks_exact_mut(4).enumerate() {
            let at = offset + i * 4;
            out.copy_from_slice(&add_px(px(&a[at..]), px(&b[at..])));
        }
    });
    Ok(())
}

/// Binary luminance threshold of `src` into `dst`.
pub fn threshold_binary(
    src: &[u8],
    dst: &mut [u8],
    threshold: f32,
    max: f32,
    row_bytes: usize,
    parallel: bool,
) -> ShadowResult<()> {
    check_len("threshold_binary", dst, &[src])?;
    let (thr, max) = (unit_to_u8(threshold), unit_to_u8(max));
    for_each_row(dst, row_bytes, parallel, |offset, rows| {
        for (i, out) in rows.chunks_exact_mut(4).enumerate() {
            let at = offset + i * 4;
            out.copy_from_slice(&threshold_binary_px(px(&src[at..]), thr, max));
        }
    });
    Ok(())
}

/// Threshold-to-zero luminance of `src` into `dst`.
pub fn threshold_to_zero(
    src: &[u8],
    dst: &mut [u8],
    threshold: f32,
    row_bytes: usize,
    parallel: bool,
) -> ShadowResult<()> {
    check_len("threshold_to_zero", dst, &[src])?;
    let thr = unit_to_u8(threshold);
    for_each_row(dst, row_bytes, parallel, |offset, rows| {
        for (i, out) in rows.chunks_exact_mut(4).enumerate() {
            let at = offset + i * 4;
            out.copy_from_slice(&threshold_to_zero_px(px(&src[at..]), thr));
        }
    });
    Ok(())
}

/// Gray-mix-red of `video` and `scene` into `dst`.
pub fn gray_mix_red(
    video: &[u8],
    scene: &[u8],
    dst: &mut [u8],
    row_bytes: usize,
    parallel: bool,
) -> ShadowResult<()> {
    check_len("gray_mix_red", dst, &[video, scene])?;
    for_each_row(dst, row_bytes, parallel, |offset, rows| {
        for (i, out) in rows.chunks_exact_mut(4).enumerate() {
            let at = offset + i * 4;
            out.copy_from_slice(&gray_mix_red_px(px(&video[at..]), px(&scene[at..])));
        }
    });
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/gpu/kernels.rs"]
mod tests;
