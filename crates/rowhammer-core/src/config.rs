//! Immutable configuration threaded through every component.
//!
//! Replaces the original tool's process-wide mutable globals (`BUFSIZE`,
//! `MACCESS_ITERATIONS`, `THRESHOLD_MULT`, ...) with a single value built
//! once by the CLI (or a test) and passed by reference from there on.

use crate::error::{Result, RowhammerError};

/// Page size assumed throughout (x86-64, no huge pages at this granularity).
pub const PAGE_SIZE: usize = 0x1000;
/// Size of a DRAM row on the assumed Sandy-Bridge mapping.
pub const ROW_LEN: usize = 1 << 13;
/// Transparent huge page size.
pub const HUGE_PAGE_SIZE: usize = 1 << 21;
/// Cache line size used for `clflush` striding.
pub const CACHE_LINE_SIZE: usize = 64;

/// Which outer hammering loop the driver runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HammerMode {
    /// Discover same-bank pages via SBDR, hammer by individual page.
    PageGranular,
    /// Discover same-bank pages, then group them into DRAM rows before
    /// hammering — the extended mode.
    RowGranular,
    /// Locate a contiguous huge page, hammer by analytically mapped row.
    HugePage,
}

/// DRAM geometry assumed by the analytic mapper.
///
/// Invariant: `map_gran` is 64 B iff `channels == 2 || rank_mirroring`,
/// else 8 KiB — the granularity below which bank/row are independent of
/// the in-row offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DramParams {
    pub channels: u8,
    pub dimms: u8,
    pub ranks: u8,
    pub rank_mirroring: bool,
    pub map_gran: usize,
}

impl DramParams {
    /// Construct params, deriving `map_gran` from `channels`/`rank_mirroring`
    /// the way the original tool's `main()` does right after parsing flags.
    pub fn new(channels: u8, dimms: u8, ranks: u8, rank_mirroring: bool) -> Self {
        let map_gran = if channels == 2 || rank_mirroring { 64 } else { 8192 };
        Self { channels, dimms, ranks, rank_mirroring, map_gran }
    }
}

impl Default for DramParams {
    fn default() -> Self {
        // Matches THP Rowhammer/hprh.c's defaults: single channel/dimm,
        // dual rank, mirroring on.
        Self::new(1, 1, 2, true)
    }
}

/// Immutable knobs for one run, built once from CLI flags (or test fixtures)
/// and threaded through the timing primitive, the profiler, the locator,
/// and the hammer driver.
#[derive(Debug, Clone)]
pub struct HammerConfig {
    pub mode: HammerMode,

    /// Size of the test buffer in bytes.
    pub buf_size: usize,

    /// `k` independent samples per timing measurement.
    pub sample_size: usize,
    /// Repetitions per timing sample inside `hammer_pair`/`hammer_single`.
    pub maccess_iterations: u64,
    /// Number of calibration probes for the bank profiler's baseline.
    pub calibration_runs: usize,
    /// Multiplier applied to the calibration baseline to get the SBDR/
    /// locator threshold.
    pub threshold_mult: f64,

    /// Hammer iterations per aggressor pair before the first victim scan.
    pub test_iterations: u64,
    /// Hammer iterations for the amplification retry after a tentative flip.
    pub stress_iterations: u64,

    /// Byte pattern aggressor rows/pages are filled with before hammering.
    pub tfill: u8,
    /// Byte pattern victim rows/pages are filled with before hammering.
    pub vfill: u8,

    /// Deadline in seconds; `0` means no deadline.
    pub deadline_secs: u64,

    /// DRAM geometry (huge-page mode; also exercised by the analytic mapper
    /// tests independent of mode).
    pub dram_params: DramParams,

    /// Rows on either side of the victim row left untouched while the
    /// rest of the window is re-filled with `vfill` (huge-page mode).
    pub window_rad: usize,
}

impl HammerConfig {
    /// Defaults for the page-/row-granular (SBDR) modes: 16 MiB buffer,
    /// matching `original_source/2.TC Rowhammer/tcrh.c`'s `BUFSIZE` default.
    pub fn sbdr_defaults(mode: HammerMode) -> Self {
        assert!(matches!(mode, HammerMode::PageGranular | HammerMode::RowGranular));
        Self {
            mode,
            buf_size: 16 << 20,
            sample_size: 8,
            maccess_iterations: 5000,
            calibration_runs: 64,
            threshold_mult: 1.3,
            test_iterations: 550_000,
            stress_iterations: 1_700_000,
            tfill: 0x00,
            vfill: 0xff,
            deadline_secs: 0,
            dram_params: DramParams::default(),
            window_rad: 0,
        }
    }

    /// Defaults for huge-page mode: 512 MiB buffer, matching
    /// `original_source/3.TCHP Rowhammer/thrh.c`'s `BUFSIZE` default, and
    /// the hammer iteration count from `original_source/THP Rowhammer/hprh.c`.
    pub fn huge_page_defaults() -> Self {
        Self {
            mode: HammerMode::HugePage,
            buf_size: 512 << 20,
            sample_size: 13,
            maccess_iterations: 5000,
            calibration_runs: 64,
            threshold_mult: 1.3,
            test_iterations: 1_966_080,
            stress_iterations: 1_700_000,
            tfill: 0x00,
            vfill: 0xff,
            deadline_secs: 0,
            dram_params: DramParams::new(1, 1, 2, false),
            window_rad: 0,
        }
    }

    /// The stride used when sweeping the buffer: a page for page-granular
    /// mode, a row for row-granular mode. Huge-page mode does not use a
    /// step (it walks `map_gran`-spaced huge-page entries instead).
    pub fn sweep_step(&self) -> usize {
        match self.mode {
            HammerMode::PageGranular => PAGE_SIZE,
            HammerMode::RowGranular => PAGE_SIZE,
            HammerMode::HugePage => self.dram_params.map_gran,
        }
    }

    /// Sanity-check invariants that would otherwise surface as confusing
    /// behavior deep inside the profiler or locator.
    pub fn validate(&self) -> Result<()> {
        if self.buf_size == 0 {
            return Err(RowhammerError::Configuration("buffer size must be non-zero".into()));
        }
        if self.mode == HammerMode::HugePage && self.buf_size < HUGE_PAGE_SIZE {
            return Err(RowhammerError::Configuration(
                "huge-page mode requires a buffer of at least one huge page".into(),
            ));
        }
        if self.sample_size < 2 {
            return Err(RowhammerError::Configuration(
                "sample size must be at least 2 (need samples[1])".into(),
            ));
        }
        if self.threshold_mult <= 1.0 {
            return Err(RowhammerError::Configuration(
                "threshold multiplier must be greater than 1.0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_gran_single_channel_no_mirroring() {
        let p = DramParams::new(1, 1, 1, false);
        assert_eq!(p.map_gran, 8192);
    }

    #[test]
    fn map_gran_dual_channel() {
        let p = DramParams::new(2, 1, 1, false);
        assert_eq!(p.map_gran, 64);
    }

    #[test]
    fn map_gran_mirroring() {
        let p = DramParams::new(1, 1, 2, true);
        assert_eq!(p.map_gran, 64);
    }

    #[test]
    fn validate_rejects_tiny_sample_size() {
        let mut cfg = HammerConfig::sbdr_defaults(HammerMode::PageGranular);
        cfg.sample_size = 1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_small_huge_page_buffer() {
        let mut cfg = HammerConfig::huge_page_defaults();
        cfg.buf_size = PAGE_SIZE;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(HammerConfig::sbdr_defaults(HammerMode::PageGranular).validate().is_ok());
        assert!(HammerConfig::sbdr_defaults(HammerMode::RowGranular).validate().is_ok());
        assert!(HammerConfig::huge_page_defaults().validate().is_ok());
    }
}
