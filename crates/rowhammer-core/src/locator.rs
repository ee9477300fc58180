//! Contiguous-region locator (huge-page mode): find a virtual span whose
//! physical frames are contiguous across a 2 MiB boundary, using only
//! timing. Grounded on
//! `original_source/3.TCHP Rowhammer/thrh.c::findContiguousRegion` and the
//! equivalent routine in `original_source/TCHP Rowhammer/hprh.c`.

use crate::config::{HammerConfig, PAGE_SIZE};

/// Strides (relative to a candidate base) that must all look same-bank
/// with the base for the base to be accepted — the Sandy Bridge
/// fingerprint for a physically contiguous 2 MiB span. Kept as the literal
/// constants from the original tool, not re-derived.
const FINGERPRINT_MULTIPLES: [usize; 6] = [1, 2, 4, 5, 6, 7];
const FINGERPRINT_STRIDE: usize = 0x22000;
const FINGERPRINT_EXTRA_OFFSET: usize = 7 * 0x22000 + 0xee000;

/// Candidate bases are stepped by this many pages to avoid probing the
/// same cache set twice in a row.
const CANDIDATE_STEP_PAGES: usize = 7;

/// A near-neighbour offset (same cache set, different row) used to derive
/// the baseline timing.
const BASELINE_NEIGHBOUR_OFFSET: usize = PAGE_SIZE;

/// Offset used for the optional one-page alignment refinement.
const ALIGNMENT_OFFSET: usize = 0x23000;

/// Locate a contiguous region inside `[buf, buf+len)` using the real
/// timing primitive. Returns the aligned base on success.
///
/// # Safety
///
/// Every address the search touches, up to `buf + len +
/// FINGERPRINT_EXTRA_OFFSET`, must be valid and readable.
pub unsafe fn find_contiguous_region(buf: usize, len: usize, cfg: &HammerConfig) -> Option<usize> {
    find_contiguous_region_with_sampler(buf, len, cfg, |a, b| unsafe {
        crate::timing::sample(a, b, cfg)
    })
}

/// Locate a contiguous region using an injected sampler.
///
/// Separated from [`find_contiguous_region`] so the fingerprint-matching
/// logic can be driven by a synthetic timing oracle in tests.
pub fn find_contiguous_region_with_sampler<F>(
    buf: usize,
    len: usize,
    cfg: &HammerConfig,
    sample_fn: F,
) -> Option<usize>
where
    F: Fn(usize, usize) -> u64,
{
    let required_span = FINGERPRINT_EXTRA_OFFSET + PAGE_SIZE;
    if len < required_span {
        return None;
    }

    let baseline = sample_fn(buf, buf + BASELINE_NEIGHBOUR_OFFSET);
    let threshold = (baseline as f64 * cfg.threshold_mult) as u64;

    let step = CANDIDATE_STEP_PAGES * PAGE_SIZE;
    let mut candidate = buf;
    while candidate + required_span <= buf + len {
        let all_match = FINGERPRINT_MULTIPLES
            .iter()
            .map(|&k| candidate + k * FINGERPRINT_STRIDE)
            .chain(std::iter::once(candidate + FINGERPRINT_EXTRA_OFFSET))
            .all(|probe| sample_fn(candidate, probe) > threshold);

        if all_match {
            let shifted = candidate + ALIGNMENT_OFFSET;
            return Some(if sample_fn(candidate, shifted) < threshold {
                candidate - PAGE_SIZE
            } else {
                candidate
            });
        }

        candidate += step;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HammerMode;

    fn cfg() -> HammerConfig {
        HammerConfig::sbdr_defaults(HammerMode::HugePage)
    }

    // --- fingerprint match -----------------------------------------------------

    #[test]
    fn fingerprint_match_returns_candidate_base() {
        let buf = 0x10_0000usize;
        let len = FINGERPRINT_EXTRA_OFFSET + PAGE_SIZE + 4 * PAGE_SIZE;

        let sampler = |base: usize, probe: usize| -> u64 {
            if base != buf {
                return 100; // only the true base's fingerprint is same-bank
            }
            let fingerprint_offsets: Vec<usize> = FINGERPRINT_MULTIPLES
                .iter()
                .map(|&k| base + k * FINGERPRINT_STRIDE)
                .chain(std::iter::once(base + FINGERPRINT_EXTRA_OFFSET))
                .collect();
            if fingerprint_offsets.contains(&probe) {
                300
            } else if probe == base + ALIGNMENT_OFFSET {
                // keep the alignment refinement a no-op: above threshold
                300
            } else {
                100
            }
        };

        let found = find_contiguous_region_with_sampler(buf, len, &cfg(), sampler);
        assert_eq!(found, Some(buf));
    }

    #[test]
    fn returns_none_when_no_candidate_matches() {
        let buf = 0x10_0000usize;
        let len = FINGERPRINT_EXTRA_OFFSET + PAGE_SIZE + 4 * PAGE_SIZE;
        let found = find_contiguous_region_with_sampler(buf, len, &cfg(), |_, _| 100);
        assert_eq!(found, None);
    }

    #[test]
    fn returns_none_when_buffer_too_small() {
        let buf = 0x10_0000usize;
        let found = find_contiguous_region_with_sampler(buf, PAGE_SIZE, &cfg(), |_, _| 9999);
        assert_eq!(found, None);
    }

    #[test]
    fn alignment_refinement_shifts_base_back_one_page() {
        let buf = 0x10_0000usize;
        let len = FINGERPRINT_EXTRA_OFFSET + PAGE_SIZE + 4 * PAGE_SIZE;

        let sampler = |base: usize, probe: usize| -> u64 {
            if base != buf {
                return 100;
            }
            let fingerprint_offsets: Vec<usize> = FINGERPRINT_MULTIPLES
                .iter()
                .map(|&k| base + k * FINGERPRINT_STRIDE)
                .chain(std::iter::once(base + FINGERPRINT_EXTRA_OFFSET))
                .collect();
            if fingerprint_offsets.contains(&probe) {
                300
            } else if probe == base + ALIGNMENT_OFFSET {
                10 // below threshold: triggers the one-page shift-back
            } else {
                100
            }
        };

        let found = find_contiguous_region_with_sampler(buf, len, &cfg(), sampler);
        assert_eq!(found, Some(buf - PAGE_SIZE));
    }
}
