use anyhow::{Result, ensure};
use image::RgbaImage;
use rayon::prelude::*;
use tracing::debug;

/// Boundary to the style-transfer inference backend.
///
/// Input is a normalized content image plus a style image; output must
/// keep the content's spatial dimensions. A failing call means "this
/// style variant is unavailable" — callers skip the variant and keep the
/// rest of the batch alive.
pub trait StyleTransfer: Send + Sync {
    fn stylize(&self, content: &RgbaImage, style: &RgbaImage) -> Result<RgbaImage>;
}

/// Built-in backend: per-channel color-moment matching.
///
/// Shifts the content's RGB distribution to the style's mean and spread,
/// channel by channel. Deliberately simple — it stands in for the opaque
/// neural inference service while honoring the same contract (content
/// resolution in, content resolution out, fallible).
#[derive(Debug, Default, Clone, Copy)]
pub struct MomentTransfer;

#[derive(Debug, Clone, Copy)]
struct ChannelMoments {
    mean: [f32; 3],
    stddev: [f32; 3],
}

impl StyleTransfer for MomentTransfer {
    fn stylize(&self, content: &RgbaImage, style: &RgbaImage) -> Result<RgbaImage> {
        let content_moments = channel_moments(content)?;
        let style_moments = channel_moments(style)?;
        debug!(
            content_mean = ?content_moments.mean,
            style_mean = ?style_moments.mean,
            "matching color moments"
        );

        let (width, height) = content.dimensions();
        let mut out = content.as_raw().clone();
        out.par_chunks_exact_mut(4).for_each(|px| {
            for c in 0..3 {
                let spread = if content_moments.stddev[c] > f32::EPSILON {
                    style_moments.stddev[c] / content_moments.stddev[c]
                } else {
                    0.0
                };
                let v = (f32::from(px[c]) - content_moments.mean[c]) * spread
                    + style_moments.mean[c];
                px[c] = v.round().clamp(0.0, 255.0) as u8;
            }
        });

        RgbaImage::from_raw(width, height, out)
            .ok_or_else(|| anyhow::anyhow!("failed to construct stylized image"))
    }
}

fn channel_moments(img: &RgbaImage) -> Result<ChannelMoments> {
    let mut sum = [0f64; 3];
    let mut total = 0f64;
    for pixel in img.pixels() {
        if pixel[3] == 0 {
            continue;
        }
        total += 1.0;
        for c in 0..3 {
            sum[c] += pixel[c] as f64;
        }
    }
    ensure!(total > 0.0, "image has no visible pixels");

    let mean = [sum[0] / total, sum[1] / total, sum[2] / total];
    let mut var = [0f64; 3];
    for pixel in img.pixels() {
        if pixel[3] == 0 {
            continue;
        }
        for c in 0..3 {
            let d = pixel[c] as f64 - mean[c];
            var[c] += d * d;
        }
    }

    Ok(ChannelMoments {
        mean: [mean[0] as f32, mean[1] as f32, mean[2] as f32],
        stddev: [
            (var[0] / total).sqrt() as f32,
            (var[1] / total).sqrt() as f32,
            (var[2] / total).sqrt() as f32,
        ],
    })
}
