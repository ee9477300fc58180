//! Command-line surface: the single-letter flags of the original three
//! tools (`tcrh`, `tcrh_ext`, `thrh`/`hprh`), folded into one binary behind
//! a `--mode` selector.

use clap::{Parser, ValueEnum};

use rowhammer_core::config::{DramParams, HammerConfig, HammerMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Page-granular SBDR discovery and hammering.
    Page,
    /// SBDR discovery grouped into DRAM rows before hammering.
    Row,
    /// Contiguous-region location plus analytic mapping.
    Hugepage,
}

impl From<ModeArg> for HammerMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Page => HammerMode::PageGranular,
            ModeArg::Row => HammerMode::RowGranular,
            ModeArg::Hugepage => HammerMode::HugePage,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "rowhammer-rs")]
#[command(about = "Experimental Rowhammer induction harness for Sandy-Bridge-family DDR3")]
#[command(version = rowhammer_core::VERSION)]
pub struct Args {
    /// Discovery/hammering mode.
    #[arg(long, value_enum, default_value_t = ModeArg::Page)]
    pub mode: ModeArg,

    /// Buffer size in MiB.
    #[arg(short = 's', long = "size-mib")]
    pub size_mib: Option<u64>,

    /// Redirect flip/summary/progress output to this file instead of stdout.
    #[arg(short = 'o', long = "output")]
    pub output: Option<String>,

    /// Threshold multiplier applied to the calibration baseline.
    #[arg(short = 'm', long = "threshold-mult")]
    pub threshold_mult: Option<f64>,

    /// Access iterations per timing sample.
    #[arg(short = 'i', long = "maccess-iterations")]
    pub maccess_iterations: Option<u64>,

    /// Independent samples per timing measurement.
    #[arg(short = 'q', long = "sample-size")]
    pub sample_size: Option<usize>,

    /// Hammer iterations per aggressor pair before the first victim scan.
    #[arg(short = 'b', long = "test-iterations")]
    pub test_iterations: Option<u64>,

    /// Hammer iterations during amplification.
    #[arg(short = 'B', long = "stress-iterations")]
    pub stress_iterations: Option<u64>,

    /// Deadline in seconds; 0 (default) means no deadline.
    #[arg(short = 'e', long = "deadline", default_value_t = 0)]
    pub deadline_secs: u64,

    /// (huge-page mode) memory channels: 1 or 2.
    #[arg(short = 'c', long = "channels")]
    pub channels: Option<u8>,

    /// (huge-page mode) DIMMs per channel: 1 or 2.
    #[arg(short = 'd', long = "dimms")]
    pub dimms: Option<u8>,

    /// (huge-page mode) ranks per DIMM: 1 or 2.
    #[arg(short = 'r', long = "ranks")]
    pub ranks: Option<u8>,

    /// (huge-page mode) aggressor fill byte.
    #[arg(short = 't', long = "tfill")]
    pub tfill: Option<u8>,

    /// (huge-page mode) victim fill byte.
    #[arg(short = 'v', long = "vfill")]
    pub vfill: Option<u8>,

    /// (huge-page mode) enable DDR3 rank mirroring in the analytic mapper.
    #[arg(long)]
    pub rank_mirroring: bool,

    /// Rows on either side of a huge-page victim row to include in the
    /// fill/scan window.
    #[arg(long, default_value_t = 0)]
    pub window_rad: usize,
}

impl Args {
    /// Build the immutable [`HammerConfig`] this run will use, starting
    /// from the mode's defaults and overriding with any flags the user
    /// passed.
    pub fn to_hammer_config(&self) -> HammerConfig {
        let mode = HammerMode::from(self.mode);
        let mut cfg = match mode {
            HammerMode::HugePage => HammerConfig::huge_page_defaults(),
            _ => HammerConfig::sbdr_defaults(mode),
        };

        if let Some(size_mib) = self.size_mib {
            cfg.buf_size = (size_mib as usize) << 20;
        }
        if let Some(m) = self.threshold_mult {
            cfg.threshold_mult = m;
        }
        if let Some(i) = self.maccess_iterations {
            cfg.maccess_iterations = i;
        }
        if let Some(q) = self.sample_size {
            cfg.sample_size = q;
        }
        if let Some(b) = self.test_iterations {
            cfg.test_iterations = b;
        }
        if let Some(big_b) = self.stress_iterations {
            cfg.stress_iterations = big_b;
        }
        cfg.deadline_secs = self.deadline_secs;
        cfg.window_rad = self.window_rad;

        if let Some(t) = self.tfill {
            cfg.tfill = t;
        }
        if let Some(v) = self.vfill {
            cfg.vfill = v;
        }

        if mode == HammerMode::HugePage {
            let channels = self.channels.unwrap_or(cfg.dram_params.channels);
            let dimms = self.dimms.unwrap_or(cfg.dram_params.dimms);
            let ranks = self.ranks.unwrap_or(cfg.dram_params.ranks);
            cfg.dram_params = DramParams::new(channels, dimms, ranks, self.rank_mirroring);
        }

        cfg
    }
}
