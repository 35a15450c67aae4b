//! Positional S1/S2 labeling and audio remapping
//!
//! Inside one cardiac window S1 sits near the start and S2 follows at a
//! roughly fixed fraction of the cycle. Among the de-clustered candidates the
//! pair whose gap best matches that fraction wins.

use super::{WindowPeak, WindowPeakLabel};

/// Pairing rules, all expressed as fractions of the STE window length
#[derive(Debug, Clone, Copy)]
pub struct PairingRules {
    /// S1 may not sit after `reject_r * len`
    pub reject_r: f32,
    /// Expected S1-S2 gap
    pub gap_r: f32,
    /// Accepted gap range is `(gap_r ± gap_tol) * len`, inclusive
    pub gap_tol: f32,
}

/// Label the best S1/S2 pair among candidates
///
/// Every ordered candidate pair `(m, n)` with `m` earlier than `n` is scored
/// by `|gap - gap_r*len|` when the gap lies inside the tolerance band and `m`
/// is not past the reject line. The first lowest score wins: `m` becomes S1,
/// `n` S2 and the remaining candidates `Other`. With fewer than two
/// candidates or no admissible pair every candidate becomes `Other`.
///
/// Peaks must be sorted by `ste_index`. Returns `(s1, s2)` positions in
/// `peaks` when a pair was found.
pub fn label_s1_s2(
    peaks: &mut [WindowPeak],
    ste_len: usize,
    rules: &PairingRules,
) -> Option<(usize, usize)> {
    let candidates: Vec<usize> = peaks
        .iter()
        .enumerate()
        .filter(|(_, p)| p.label == WindowPeakLabel::Candidate)
        .map(|(i, _)| i)
        .collect();

    let len = ste_len as f32;
    let target_gap = rules.gap_r * len;
    let allowed_min = (rules.gap_r - rules.gap_tol) * len;
    let allowed_max = (rules.gap_r + rules.gap_tol) * len;
    let reject_line = rules.reject_r * len;

    let mut best: Option<(usize, usize)> = None;
    let mut best_dist = f32::INFINITY;

    if candidates.len() >= 2 {
        for (m, &first) in candidates.iter().enumerate() {
            if peaks[first].ste_index as f32 > reject_line {
                continue;
            }
            for &second in &candidates[m + 1..] {
                let gap = (peaks[second].ste_index - peaks[first].ste_index) as f32;
                if gap < allowed_min || gap > allowed_max {
                    continue;
                }
                let dist = (gap - target_gap).abs();
                if dist < best_dist {
                    best_dist = dist;
                    best = Some((first, second));
                }
            }
        }
    }

    for &i in &candidates {
        peaks[i].label = match best {
            Some((s1, _)) if i == s1 => WindowPeakLabel::S1,
            Some((_, s2)) if i == s2 => WindowPeakLabel::S2,
            _ => WindowPeakLabel::Other,
        };
    }

    match best {
        Some((s1, s2)) => log::debug!(
            "Window labeled S1 at block {}, S2 at block {} ({} candidates)",
            peaks[s1].ste_index,
            peaks[s2].ste_index,
            candidates.len()
        ),
        None => log::debug!(
            "No S1/S2 pair among {} candidates over {} blocks",
            candidates.len(),
            ste_len
        ),
    }

    best
}

/// Index of max |x| inside STE block `ste_index`
///
/// The block is clipped to the audio. A block entirely past the end falls
/// back to the last sample. An all-zero block returns its first sample.
pub fn remap_to_audio(audio: &[f32], ste_index: usize, block_size: usize) -> usize {
    if audio.is_empty() {
        return 0;
    }
    let start = ste_index.saturating_mul(block_size);
    if start >= audio.len() {
        return audio.len() - 1;
    }
    let end = start.saturating_add(block_size).min(audio.len());

    let mut max_val = 0.0f32;
    let mut max_idx = start;
    for (i, &x) in audio[start..end].iter().enumerate() {
        if x.abs() > max_val {
            max_val = x.abs();
            max_idx = start + i;
        }
    }
    max_idx
}
