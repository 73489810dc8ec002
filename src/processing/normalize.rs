//! Working-resolution contracts for the blend pipeline.
//!
//! The blend and gradient math requires pixel-exact dimension equality
//! between all operands, so everything is resampled up front: content is
//! downscaled to fit the working bounding box, style inputs go to the
//! fixed square the transfer backend consumes, and the finished composite
//! is restored to the content's source resolution at the very end.

use anyhow::{Context, Result};
use fast_image_resize as fir;
use image::RgbaImage;

/// Aspect-preserving downscale so the image fits within `max_dim` on both
/// sides. Images already inside the box are returned as-is; this never
/// upscales.
pub fn fit_within(source: &RgbaImage, max_dim: u32) -> Result<RgbaImage> {
    anyhow::ensure!(max_dim > 0, "working bounding box must be positive");
    let (w, h) = source.dimensions();
    if w <= max_dim && h <= max_dim {
        return Ok(source.clone());
    }
    let scale = (max_dim as f32 / w as f32).min(max_dim as f32 / h as f32);
    let target_w = ((w as f32 * scale).round() as u32).clamp(1, max_dim);
    let target_h = ((h as f32 * scale).round() as u32).clamp(1, max_dim);
    resize_rgba(source, target_w, target_h)
}

/// Resamples a style input to the fixed square edge the transfer backend
/// expects.
pub fn style_square(source: &RgbaImage, edge: u32) -> Result<RgbaImage> {
    anyhow::ensure!(edge > 0, "style square edge must be positive");
    resize_rgba(source, edge, edge)
}

/// Upscales the final composite back to the original content resolution.
pub fn restore(source: &RgbaImage, target_w: u32, target_h: u32) -> Result<RgbaImage> {
    resize_rgba(source, target_w, target_h)
}

fn resize_rgba(source: &RgbaImage, target_w: u32, target_h: u32) -> Result<RgbaImage> {
    if target_w == 0 || target_h == 0 {
        anyhow::bail!("resize dimensions must be positive");
    }
    if source.width() == target_w && source.height() == target_h {
        return Ok(source.clone());
    }

    let src_view = fir::images::ImageRef::new(
        source.width(),
        source.height(),
        source.as_raw(),
        fir::PixelType::U8x4,
    )
    .context("failed to create source view for resample")?;
    let mut dst_image = fir::images::Image::new(target_w, target_h, fir::PixelType::U8x4);
    // Convolution filter rather than nearest-neighbor: the blend math
    // downstream amplifies any aliasing introduced here.
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::CatmullRom));
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_view, &mut dst_image, Some(&options))
        .context("resample failed")?;
    let buffer = dst_image.into_vec();
    RgbaImage::from_raw(target_w, target_h, buffer)
        .ok_or_else(|| anyhow::anyhow!("failed to construct resampled RGBA image"))
}
