/// fitness = sum over all pixels of the Euclidean distance between source
/// and rendered RGB triples, each distance truncated to an integer before
/// accumulation. alpha never participates. lower is better, 0 is a perfect
/// match.
use thiserror::Error;

use crate::render::Canvas;
use crate::target::TargetImage;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FitnessError {
    #[error("dimension mismatch: target is {target_w}x{target_h}, canvas is {canvas_w}x{canvas_h}")]
    DimensionMismatch {
        target_w: u32,
        target_h: u32,
        canvas_w: u32,
        canvas_h: u32,
    },
}

/// per-pixel distance, truncated. maximum is trunc(sqrt(3 * 255^2)) = 441.
#[inline]
fn pixel_distance(t: &[u8], c: &[u8]) -> u64 {
    let dr = t[0] as i32 - c[0] as i32;
    let dg = t[1] as i32 - c[1] as i32;
    let db = t[2] as i32 - c[2] as i32;
    (((dr * dr + dg * dg + db * db) as f64).sqrt()) as u64
}

/// score a rendered canvas against the target in one full pass.
/// dimensions must match; with a fixed render size for the whole run this
/// never fails in practice.
pub fn score(target: &TargetImage, canvas: &Canvas) -> Result<u64, FitnessError> {
    profiling::scope!("fitness_score");
    if target.width != canvas.width || target.height != canvas.height {
        return Err(FitnessError::DimensionMismatch {
            target_w: target.width,
            target_h: target.height,
            canvas_w: canvas.width,
            canvas_h: canvas.height,
        });
    }

    let total = target
        .rgba
        .chunks_exact(4)
        .zip(canvas.rgba.chunks_exact(4))
        .map(|(t, c)| pixel_distance(t, c))
        .sum();
    Ok(total)
}
