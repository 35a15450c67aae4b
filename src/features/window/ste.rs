//! Short-time energy and hard-limiting helpers
//!
//! STE gives a block-resolution energy curve of a cardiac window. Both the raw
//! audio and the STE curve can be hard-limited: anything at or below a fraction
//! of the mean magnitude is zeroed, which removes the low-level murmur floor
//! before peak search.

/// Arithmetic mean, 0 for an empty slice
pub fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|&v| v as f64).sum::<f64>() as f32 / values.len() as f32
}

/// Mean of absolute values, 0 for an empty slice
pub fn mean_abs(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|&v| v.abs() as f64).sum::<f64>() as f32 / values.len() as f32
}

/// Zero every value whose magnitude is at or below `mean(|values|) * factor`
///
/// Returns the limit that was applied.
pub fn hard_limit(values: &mut [f32], factor: f32) -> f32 {
    let limit = mean_abs(values) * factor;
    for v in values.iter_mut() {
        if v.abs() <= limit {
            *v = 0.0;
        }
    }
    limit
}

/// Short-time energy over non-overlapping blocks
///
/// `ste[k] = Σ x²` over samples `[k*block_size, (k+1)*block_size)`. A trailing
/// partial block is discarded, so the output has `len / block_size` entries.
///
/// # Arguments
///
/// * `window` - Audio samples
/// * `block_size` - Samples per STE block (must be > 0)
/// * `out` - Cleared and filled with the STE series
pub fn compute_ste_into(window: &[f32], block_size: usize, out: &mut Vec<f32>) {
    out.clear();
    if block_size == 0 {
        return;
    }
    out.extend(
        window
            .chunks_exact(block_size)
            .map(|block| block.iter().map(|&x| x * x).sum::<f32>()),
    );
}

/// Allocating variant of [`compute_ste_into`]
pub fn compute_ste(window: &[f32], block_size: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(window.len() / block_size.max(1));
    compute_ste_into(window, block_size, &mut out);
    out
}
