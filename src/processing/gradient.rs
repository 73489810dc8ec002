use rayon::prelude::*;

use crate::processing::buffer::{BYTES_PER_PIXEL, PixelBuffer};

/// Endpoint pair for one gradient axis, both in `[0,1]`.
///
/// Horizontal reads as (left, right), vertical as (top, bottom), radial
/// as (center, edge).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Axis {
    pub start: f32,
    pub end: f32,
}

impl Axis {
    pub fn new(start: f32, end: f32) -> Self {
        Self {
            start: start.clamp(0.0, 1.0),
            end: end.clamp(0.0, 1.0),
        }
    }

    fn at(&self, position: f32) -> f32 {
        self.start + (self.end - self.start) * position
    }
}

/// Up to three independently enabled gradient axes. Enabled axes multiply,
/// so every additional axis further attenuates the stylized result — the
/// masks act as stacked alpha mattes, not as an average.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GradientSpec {
    pub horizontal: Option<Axis>,
    pub vertical: Option<Axis>,
    pub radial: Option<Axis>,
}

impl GradientSpec {
    pub fn any_enabled(&self) -> bool {
        self.horizontal.is_some() || self.vertical.is_some() || self.radial.is_some()
    }

    /// Scalar mask value at a pixel. Position is normalized over the last
    /// pixel index so the mask converges to the exact endpoint values at
    /// the image borders.
    fn mask_at(&self, x: u32, y: u32, width: u32, height: u32) -> f32 {
        let mut mask = 1.0f32;
        let max_x = (width.saturating_sub(1)).max(1) as f32;
        let max_y = (height.saturating_sub(1)).max(1) as f32;
        if let Some(axis) = &self.horizontal {
            mask *= axis.at(x as f32 / max_x);
        }
        if let Some(axis) = &self.vertical {
            mask *= axis.at(y as f32 / max_y);
        }
        if let Some(axis) = &self.radial {
            let cx = max_x / 2.0;
            let cy = max_y / 2.0;
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            // Center to farthest corner; with a centered origin every
            // corner is equidistant.
            let max_dist = (cx * cx + cy * cy).sqrt().max(f32::EPSILON);
            let dist = (dx * dx + dy * dy).sqrt();
            mask *= axis.at((dist / max_dist).min(1.0));
        }
        mask.clamp(0.0, 1.0)
    }
}

/// Interpolates per pixel between the original content and a blended
/// image using the combined axis mask: mask 0 reproduces the original
/// exactly, mask 1 the full blended result. Alpha comes from the
/// original. With no axis enabled the blended image passes through
/// untouched.
///
/// One-shot by contract: feeding the output back in as the "blended"
/// operand applies the mask a second time and is not idempotent.
///
/// `None` when the operands disagree on dimensions.
pub fn apply_gradient(
    original: &PixelBuffer,
    blended: &PixelBuffer,
    spec: &GradientSpec,
) -> Option<PixelBuffer> {
    if !original.same_dimensions(blended) {
        return None;
    }
    if !spec.any_enabled() {
        return Some(blended.clone());
    }

    let width = original.width();
    let height = original.height();
    let mut out = original.blank_like();
    out.par_chunks_exact_mut(BYTES_PER_PIXEL)
        .enumerate()
        .for_each(|(idx, px)| {
            let x = (idx as u32) % width;
            let y = (idx as u32) / width;
            let mask = spec.mask_at(x, y, width, height);
            let base = &original.data()[idx * BYTES_PER_PIXEL..];
            let over = &blended.data()[idx * BYTES_PER_PIXEL..];
            for c in 0..3 {
                let v = f32::from(base[c]) * (1.0 - mask) + f32::from(over[c]) * mask;
                px[c] = v.round().clamp(0.0, 255.0) as u8;
            }
            px[3] = base[3];
        });

    PixelBuffer::from_raw(width, height, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> PixelBuffer {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        PixelBuffer::from_raw(width, height, data).unwrap()
    }

    fn pixel(buf: &PixelBuffer, x: u32, y: u32) -> &[u8] {
        let idx = (y * buf.width() + x) as usize * 4;
        &buf.data()[idx..idx + 4]
    }

    #[test]
    fn no_axis_is_identity_on_blended() {
        let original = solid(8, 8, [0, 0, 0, 255]);
        let blended = solid(8, 8, [200, 100, 50, 255]);
        let out = apply_gradient(&original, &blended, &GradientSpec::default()).unwrap();
        assert_eq!(out, blended);
    }

    #[test]
    fn rejects_dimension_mismatch() {
        let original = solid(8, 8, [0, 0, 0, 255]);
        let blended = solid(8, 9, [200, 100, 50, 255]);
        let spec = GradientSpec {
            horizontal: Some(Axis::new(0.0, 1.0)),
            ..Default::default()
        };
        assert!(apply_gradient(&original, &blended, &spec).is_none());
    }

    #[test]
    fn horizontal_axis_converges_at_borders() {
        let original = solid(16, 4, [0, 0, 0, 255]);
        let blended = solid(16, 4, [255, 255, 255, 255]);
        let spec = GradientSpec {
            horizontal: Some(Axis::new(0.0, 1.0)),
            ..Default::default()
        };
        let out = apply_gradient(&original, &blended, &spec).unwrap();
        assert_eq!(pixel(&out, 0, 2), &[0, 0, 0, 255]);
        assert_eq!(pixel(&out, 15, 2), &[255, 255, 255, 255]);
    }

    #[test]
    fn vertical_axis_is_constant_along_x() {
        let original = solid(9, 9, [0, 0, 0, 255]);
        let blended = solid(9, 9, [200, 200, 200, 255]);
        let spec = GradientSpec {
            vertical: Some(Axis::new(0.2, 0.9)),
            ..Default::default()
        };
        let out = apply_gradient(&original, &blended, &spec).unwrap();
        for y in 0..9 {
            let reference = pixel(&out, 0, y).to_vec();
            for x in 1..9 {
                assert_eq!(pixel(&out, x, y), reference.as_slice());
            }
        }
    }

    #[test]
    fn radial_axis_hits_endpoints_at_center_and_corner() {
        let original = solid(11, 11, [0, 0, 0, 255]);
        let blended = solid(11, 11, [255, 255, 255, 255]);
        let spec = GradientSpec {
            radial: Some(Axis::new(0.0, 1.0)),
            ..Default::default()
        };
        let out = apply_gradient(&original, &blended, &spec).unwrap();
        assert_eq!(pixel(&out, 5, 5), &[0, 0, 0, 255]);
        assert_eq!(pixel(&out, 0, 0), &[255, 255, 255, 255]);
        assert_eq!(pixel(&out, 10, 10), &[255, 255, 255, 255]);
    }

    #[test]
    fn enabled_axes_multiply_rather_than_average() {
        let original = solid(5, 5, [0, 0, 0, 255]);
        let blended = solid(5, 5, [200, 200, 200, 255]);
        let spec = GradientSpec {
            horizontal: Some(Axis::new(0.5, 0.5)),
            vertical: Some(Axis::new(0.5, 0.5)),
            ..Default::default()
        };
        let out = apply_gradient(&original, &blended, &spec).unwrap();
        // 0.5 * 0.5 = 0.25 mask everywhere, not (0.5 + 0.5) / 2.
        for px in out.data().chunks_exact(4) {
            assert_eq!(px, &[50, 50, 50, 255]);
        }
    }

    #[test]
    fn reapplying_the_same_spec_is_not_idempotent() {
        // One-shot usage contract: the mask attenuates again on the
        // second pass.
        let original = solid(7, 7, [0, 0, 0, 255]);
        let blended = solid(7, 7, [240, 240, 240, 255]);
        let spec = GradientSpec {
            horizontal: Some(Axis::new(0.1, 0.9)),
            ..Default::default()
        };
        let once = apply_gradient(&original, &blended, &spec).unwrap();
        let twice = apply_gradient(&original, &once, &spec).unwrap();
        assert_ne!(once, twice);
    }

    #[test]
    fn alpha_always_comes_from_the_original() {
        let original = solid(4, 4, [0, 0, 0, 128]);
        let blended = solid(4, 4, [255, 255, 255, 255]);
        let spec = GradientSpec {
            horizontal: Some(Axis::new(0.0, 1.0)),
            ..Default::default()
        };
        let out = apply_gradient(&original, &blended, &spec).unwrap();
        for px in out.data().chunks_exact(4) {
            assert_eq!(px[3], 128);
        }
    }
}
