//! Peak picking on the STE series
//!
//! Two passes:
//! 1. Greedy left-to-right local-maximum search with a refractory gap
//! 2. Cluster suppression: peaks closer than a fraction of the window keep
//!    only their tallest member as a [`WindowPeakLabel::Candidate`]

use super::{WindowPeak, WindowPeakLabel};

/// Find local maxima of an STE series
///
/// A sample `i` (never the first or last) is accepted when
/// `ste[i] > threshold`, it is strictly greater than both neighbours and at
/// least `min_distance` indices passed since the last accepted peak.
/// Acceptance always moves the refractory anchor, so the search is greedy.
///
/// # Arguments
///
/// * `ste` - STE series, usually hard-limited
/// * `threshold` - Absolute acceptance threshold
/// * `min_distance` - Minimum index gap between accepted peaks
/// * `max_peaks` - Stop after this many peaks
/// * `out` - Cleared and filled with peaks in index order
pub fn find_peaks_window(
    ste: &[f32],
    threshold: f32,
    min_distance: usize,
    max_peaks: usize,
    out: &mut Vec<WindowPeak>,
) {
    out.clear();
    if ste.len() < 3 {
        return;
    }

    // first peak may sit anywhere
    let mut last_peak: Option<usize> = None;

    for i in 1..(ste.len() - 1) {
        let value = ste[i];
        if value <= threshold || value <= ste[i - 1] || value <= ste[i + 1] {
            continue;
        }
        if let Some(last) = last_peak {
            if i - last < min_distance {
                continue;
            }
        }
        if out.len() >= max_peaks {
            log::warn!(
                "STE peak limit {} reached at index {}, dropping the rest",
                max_peaks,
                i
            );
            break;
        }
        out.push(WindowPeak::new(i, value));
        last_peak = Some(i);
    }

    log::debug!(
        "Found {} STE peaks over {} blocks (threshold={:.6})",
        out.len(),
        ste.len(),
        threshold
    );
}

/// Mark the tallest peak of every proximity cluster as a candidate
///
/// Peaks must be sorted by `ste_index`. A cluster starts at the first
/// unassigned peak and extends while the next peak is less than `min_gap`
/// indices from the cluster start. Ties keep the earliest peak. Other members
/// keep their label.
///
/// Returns the number of candidates.
pub fn remove_close_peaks(peaks: &mut [WindowPeak], min_gap: usize) -> usize {
    let n = peaks.len();
    let mut candidates = 0;
    let mut start = 0;

    while start < n {
        let mut end = start;
        while end + 1 < n && peaks[end + 1].ste_index - peaks[start].ste_index < min_gap {
            end += 1;
        }

        let mut best = start;
        for j in (start + 1)..=end {
            if peaks[j].value > peaks[best].value {
                best = j;
            }
        }
        peaks[best].label = WindowPeakLabel::Candidate;
        candidates += 1;

        start = end + 1;
    }

    candidates
}
