//! # rowhammer-core
//!
//! An experimental Rowhammer induction harness for commodity x86-64
//! platforms whose DRAM controller follows the Sandy Bridge address-mapping
//! family, assuming DDR3 with optional rank mirroring.
//!
//! ## Architecture
//!
//! Two discovery paths feed the same hammer driver:
//!
//! - **Timing-only mode**: [`timing`] + [`memprim`] underlie [`sbdr`], which
//!   finds same-bank addresses by measuring row-buffer conflict latency with
//!   no privileged access; [`rowgroup`] then partitions those addresses into
//!   same-row equivalence classes.
//! - **Huge-page mode**: [`locator`] finds a physically contiguous 2 MiB
//!   span using the same timing primitives; [`dram`] analytically maps every
//!   offset inside it to `(channel, dimm, rank, bank, row, column)`; and
//!   [`hugepage`] sorts the result into per-row tables.
//!
//! [`hammer`] drives both paths: fill, flush, hammer, scan, retry, report.
//! [`buffer`] is the only module that owns the raw mapping; [`bits`] and
//! [`config`] are the shared, dependency-free foundation underneath
//! everything else.
//!
//! The optional `pagemap` feature adds [`pagemap`], a ground-truth oracle
//! over `/proc/self/pagemap` used only for offline study — the core never
//! opens that file unless the feature is compiled in.

pub mod bits;
pub mod buffer;
pub mod config;
pub mod dram;
pub mod error;
pub mod hammer;
pub mod hugepage;
pub mod locator;
pub mod memprim;
#[cfg(feature = "pagemap")]
pub mod pagemap;
pub mod rowgroup;
pub mod sbdr;
pub mod timing;

pub use buffer::HammerBuffer;
pub use config::{DramParams, HammerConfig, HammerMode};
pub use dram::{ddr3_rank_mirror, map_addr, DramAddr};
pub use error::{Result, RowhammerError};
pub use hammer::{run_bank_profiled, run_huge_page, FlipReport, HammerSummary, Victim};
pub use hugepage::{plan_huge_pages, HugePage, HugePageEntry};
pub use locator::find_contiguous_region;
pub use rowgroup::{group_rows, DramRow};
pub use sbdr::{sbdr, SbdrResult};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
