//! Same-Bank-Different-Row profiler: discover addresses that share an
//! origin's DRAM bank using only timing, grounded on
//! `original_source/2.TC Rowhammer/tcrh.c::main`'s calibration + sweep.

use crate::config::HammerConfig;
use crate::error::{Result, RowhammerError};

/// Candidate bank counts the estimator checks, in order.
const BANK_CANDIDATES: [u8; 4] = [8, 16, 32, 64];

/// Output of one profiling pass.
#[derive(Debug, Clone)]
pub struct SbdrResult {
    /// Addresses found to share `origin`'s bank, in sweep order.
    pub addrs: Vec<usize>,
    pub baseline: u64,
    pub threshold: u64,
    /// `Some(B)` if a bank count in [`BANK_CANDIDATES`] matches the
    /// observed cluster size within 15%; `None` otherwise (logged by the
    /// caller, not treated as fatal).
    pub estimated_banks: Option<u8>,
}

/// Profile `[buf, buf+len)` at `step` stride against `origin`, using the
/// real timing primitive.
///
/// # Safety
///
/// `origin` and every `step`-aligned address in `[buf, buf+len)` must be
/// valid, readable addresses for the duration of the call.
pub unsafe fn sbdr(
    origin: usize,
    buf: usize,
    len: usize,
    step: usize,
    cfg: &HammerConfig,
) -> Result<SbdrResult> {
    sbdr_with_sampler(origin, buf, len, step, cfg, |a, b| unsafe {
        crate::timing::sample(a, b, cfg)
    })
}

/// Profile `[buf, buf+len)` against `origin` using an injected sampler.
///
/// Split out from [`sbdr`] so the calibration/sweep/bank-count logic can be
/// exercised with a synthetic timing oracle in place of real DRAM access —
/// there is no deterministic way to drive actual row-buffer conflicts in a
/// test environment.
pub fn sbdr_with_sampler<F>(
    origin: usize,
    buf: usize,
    len: usize,
    step: usize,
    cfg: &HammerConfig,
    sample_fn: F,
) -> Result<SbdrResult>
where
    F: Fn(usize, usize) -> u64,
{
    if step == 0 || len == 0 {
        return Err(RowhammerError::Configuration(
            "sbdr requires non-zero step and length".into(),
        ));
    }

    // 1. Calibration: CALIBRATION_RUNS probes spaced by `step` from the
    // buffer start; the median of their timings against `origin` is the
    // baseline. Most probes land in a different bank than `origin`, so the
    // handful of co-bank outliers do not move the median.
    let mut calibration: Vec<u64> = (0..cfg.calibration_runs)
        .map(|k| sample_fn(origin, buf + k * step))
        .collect();
    calibration.sort_unstable();
    let baseline = calibration[calibration.len() / 2];

    // 2. Threshold.
    let threshold = (baseline as f64 * cfg.threshold_mult) as u64;

    // 3. Sweep.
    let mut addrs = Vec::new();
    let mut addr = buf;
    while addr < buf + len {
        if sample_fn(origin, addr) > threshold {
            addrs.push(addr);
        }
        addr += step;
    }

    let n = len / step;
    let estimated_banks = estimate_bank_count(n, addrs.len());
    if estimated_banks.is_none() {
        log::warn!(
            "sbdr: no candidate bank count in {BANK_CANDIDATES:?} matches the observed cluster \
             of {} addresses out of {n} probes; consider re-running with a different threshold",
            addrs.len(),
        );
    }

    Ok(SbdrResult { addrs, baseline, threshold, estimated_banks })
}

/// Pick the first bank count `B` in [`BANK_CANDIDATES`] whose expected
/// co-bank count `N/B` lies within 15% of the observed cluster size.
///
/// Returns `Some(B)` iff `0.85 * N/B <= observed <= 1.15 * N/B`.
pub fn estimate_bank_count(n: usize, observed: usize) -> Option<u8> {
    for &b in &BANK_CANDIDATES {
        let expected = n as f64 / b as f64;
        let observed = observed as f64;
        if 0.85 * expected <= observed && observed <= 1.15 * expected {
            return Some(b);
        }
    }
    None
}
