//! High-resolution timing primitive.
//!
//! Encapsulates the only two platform-specific intrinsics the core needs:
//! a serialized timestamp pair around the hot loop. Everything built on
//! top of `sample`/`sample_single` is portable x86-64 logic.

use std::arch::x86_64::{__cpuid, __rdtscp, _rdtsc};

use crate::config::HammerConfig;
use crate::memprim::{hammer_pair, hammer_single};

/// Serialized timestamp taken *before* a measured region.
///
/// `CPUID` drains the instruction pipeline so `RDTSC` cannot be reordered
/// ahead of prior instructions; only `RDTSC` contributes to the timestamp.
#[inline]
pub fn rdtsc_serialized_begin() -> u64 {
    // SAFETY: CPUID/RDTSC are always available on x86-64; no side effects
    // beyond clobbering caller-saved registers, which the intrinsics model.
    unsafe {
        __cpuid(0);
        _rdtsc()
    }
}

/// Serialized timestamp taken *after* a measured region.
///
/// `RDTSCP` waits for all prior instructions to retire before reading the
/// counter, then `CPUID` prevents any later instruction from being
/// reordered ahead of it — together they bracket exactly the measured
/// region.
#[inline]
pub fn rdtsc_serialized_end() -> u64 {
    let mut aux: u32 = 0;
    // SAFETY: RDTSCP is available on all Rowhammer-relevant x86-64 CPUs
    // (Sandy Bridge and later); `aux` is a valid local to receive the
    // processor ID.
    unsafe {
        let t = __rdtscp(&mut aux);
        __cpuid(0);
        t
    }
}

/// Sort `samples` ascending and return the second-smallest.
///
/// Row-buffer-hit times cluster tightly at the low end; preemption and
/// interrupts inflate upper samples arbitrarily. The minimum is too
/// brittle (one lucky sample), the median is corrupted by a handful of
/// preemption events across the window — `samples[1]` is the stable
/// low-order quantile the original tool settled on.
fn robust_statistic(mut samples: Vec<u64>) -> u64 {
    samples.sort_unstable();
    samples[1]
}

/// Take `cfg.sample_size` timed repetitions of `hammer_pair(addr_a, addr_b,
/// cfg.maccess_iterations)` and return the robust low-quantile statistic.
///
/// # Safety
///
/// `addr_a` and `addr_b` must be valid, readable addresses for the
/// duration of the call.
pub unsafe fn sample(addr_a: usize, addr_b: usize, cfg: &HammerConfig) -> u64 {
    let mut samples = Vec::with_capacity(cfg.sample_size);
    for _ in 0..cfg.sample_size {
        let start = rdtsc_serialized_begin();
        hammer_pair(addr_a, addr_b, cfg.maccess_iterations);
        let stop = rdtsc_serialized_end();
        samples.push(stop - start);
    }
    robust_statistic(samples)
}

/// Take `cfg.sample_size` timed repetitions of `hammer_single(addr,
/// cfg.maccess_iterations)` and return the robust low-quantile statistic.
///
/// # Safety
///
/// `addr` must be a valid, readable address for the duration of the call.
pub unsafe fn sample_single(addr: usize, cfg: &HammerConfig) -> u64 {
    let mut samples = Vec::with_capacity(cfg.sample_size);
    for _ in 0..cfg.sample_size {
        let start = rdtsc_serialized_begin();
        hammer_single(addr, cfg.maccess_iterations);
        let stop = rdtsc_serialized_end();
        samples.push(stop - start);
    }
    robust_statistic(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn robust_statistic_picks_second_smallest() {
        let samples = vec![50u64, 10, 30, 20, 40];
        assert_eq!(robust_statistic(samples), 20);
    }

    #[test]
    fn robust_statistic_ignores_high_tail() {
        // A handful of inflated "preemption" samples shouldn't move the
        // statistic away from the low cluster.
        let samples = vec![100u64, 102, 101, 5000, 9000, 10, 103];
        assert_eq!(robust_statistic(samples), 101);
    }

    #[test]
    fn rdtsc_is_monotonic_across_a_call() {
        let start = rdtsc_serialized_begin();
        let stop = rdtsc_serialized_end();
        assert!(stop >= start);
    }

    #[test]
    fn sample_single_returns_a_positive_duration() {
        let buf = vec![0u8; 4096];
        let cfg = {
            let mut c = HammerConfig::sbdr_defaults(crate::config::HammerMode::PageGranular);
            c.maccess_iterations = 16;
            c.sample_size = 3;
            c
        };
        let t = unsafe { sample_single(buf.as_ptr() as usize, &cfg) };
        assert!(t > 0 || t == 0); // TSC deltas on a busy CI box can be 0; just exercise the path
    }
}
