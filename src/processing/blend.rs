use rayon::prelude::*;
use tracing::debug;

use crate::processing::buffer::{BYTES_PER_PIXEL, PixelBuffer};

/// Linear per-pixel interpolation between an original and one stylized
/// image at a scalar strength. Strength 0 reproduces the original,
/// strength 1 the stylized image; alpha is taken from the original.
///
/// Returns `None` when the operands disagree on dimensions.
pub fn interpolate(
    original: &PixelBuffer,
    stylized: &PixelBuffer,
    strength: f32,
) -> Option<PixelBuffer> {
    if !original.same_dimensions(stylized) {
        return None;
    }
    let strength = strength.clamp(0.0, 1.0);
    let mut out = original.blank_like();
    mix_into(&mut out, original.data(), stylized.data(), strength);
    PixelBuffer::from_raw(original.width(), original.height(), out)
}

/// Weighted multi-style blend over a content image.
///
/// Two stages: first each active variant (weight > 0) is interpolated
/// against the content at its own weight, yielding one intermediate per
/// style; then the intermediates are folded together left to right with
/// weights normalized to sum to one, each fold using the incoming
/// intermediate's share of the strength accumulated so far. The raw
/// weight keeps its meaning per style while relative contributions stay
/// normalized when several styles are dialed up at once.
///
/// Zero active weights is not an error: the content comes back unchanged.
/// `None` on length mismatch, an empty variant list, or any operand whose
/// dimensions differ from the content (no implicit resize here).
pub fn blend_weighted(
    content: &PixelBuffer,
    variants: &[&PixelBuffer],
    weights: &[f32],
) -> Option<PixelBuffer> {
    if variants.is_empty() || variants.len() != weights.len() {
        return None;
    }
    if variants.iter().any(|v| !v.same_dimensions(content)) {
        return None;
    }

    let active: Vec<(&PixelBuffer, f32)> = variants
        .iter()
        .zip(weights.iter())
        .filter(|(_, w)| **w > 0.0)
        .map(|(v, w)| (*v, *w))
        .collect();

    if active.is_empty() {
        return Some(content.clone());
    }

    debug!(
        total = variants.len(),
        active = active.len(),
        "blending stylized variants"
    );

    // Stage 1: one intermediate per active style, each independently
    // reflecting how much of that style shows through over the original.
    let intermediates: Vec<Vec<u8>> = active
        .iter()
        .map(|(variant, weight)| {
            let mut out = content.blank_like();
            mix_into(&mut out, content.data(), variant.data(), *weight);
            out
        })
        .collect();

    // Stage 2: sequential relative-weight fold. Folding intermediate k in
    // uses w'_k / (w'_1 + .. + w'_k); rounding to u8 happens at each fold,
    // so the result is order dependent by contract.
    let total: f32 = active.iter().map(|(_, w)| *w).sum();
    let mut iter = intermediates.into_iter().zip(active.iter());
    let (mut acc, (_, first_weight)) = iter.next()?;
    let mut accumulated = first_weight / total;
    for (next, (_, weight)) in iter {
        let share = weight / total;
        let t = share / (accumulated + share);
        fold_into(&mut acc, &next, t);
        accumulated += share;
    }

    PixelBuffer::from_raw(content.width(), content.height(), acc)
}

fn mix_channel(a: u8, b: u8, t: f32) -> u8 {
    let v = f32::from(a) * (1.0 - t) + f32::from(b) * t;
    v.round().clamp(0.0, 255.0) as u8
}

// Per-pixel work is independent across indices, so both loops are flat
// parallel iterations over fixed-stride RGBA chunks.
fn mix_into(out: &mut [u8], base: &[u8], overlay: &[u8], t: f32) {
    out.par_chunks_exact_mut(BYTES_PER_PIXEL)
        .zip(base.par_chunks_exact(BYTES_PER_PIXEL))
        .zip(overlay.par_chunks_exact(BYTES_PER_PIXEL))
        .for_each(|((out, base), overlay)| {
            for c in 0..3 {
                out[c] = mix_channel(base[c], overlay[c], t);
            }
            out[3] = base[3];
        });
}

fn fold_into(acc: &mut [u8], next: &[u8], t: f32) {
    acc.par_chunks_exact_mut(BYTES_PER_PIXEL)
        .zip(next.par_chunks_exact(BYTES_PER_PIXEL))
        .for_each(|(acc, next)| {
            for c in 0..3 {
                acc[c] = mix_channel(acc[c], next[c], t);
            }
        });
}
