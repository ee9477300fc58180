//! The hammer driver: fill, flush, hammer, scan, retry, report.
//!
//! Two outer loops share the state machine `INIT -> HAMMER -> EVICT -> SCAN
//! -> (flip?) -> AMPLIFY -> SCAN (final) -> RESTORE`, grounded respectively
//! on `original_source/2.TC Rowhammer/tcrh.c::main` (page-granular),
//! `original_source/TC Rowhammer/tcrh_ext.c::main` (row-granular), and
//! `original_source/THP Rowhammer/hprh.c::runTest` (huge-page mode).

use std::thread;
use std::time::Duration;

use crate::buffer::HammerBuffer;
use crate::config::{HammerConfig, PAGE_SIZE};
use crate::dram::DramAddr;
use crate::hugepage::{HugePage, HugePageEntry};
use crate::memprim::{flush, hammer_pair};
use crate::rowgroup::DramRow;

/// A discovered hammering target: one page, or (extended mode) a whole
/// DRAM row's worth of sibling pages. Unified so `run_bank_profiled` has a
/// single body regardless of granularity.
#[derive(Debug, Clone)]
pub enum Victim {
    Page(usize),
    Row(DramRow),
}

impl Victim {
    fn spans(&self) -> Vec<(usize, usize)> {
        match self {
            Victim::Page(addr) => vec![(*addr, PAGE_SIZE)],
            Victim::Row(row) => row.vaddrs.iter().copied().zip(row.lengths.iter().copied()).collect(),
        }
    }

    /// The address used as the hammered representative of this victim when
    /// it is chosen as one half of an aggressor pair.
    fn representative(&self) -> usize {
        match self {
            Victim::Page(addr) => *addr,
            Victim::Row(row) => row.vaddrs[0],
        }
    }
}

/// One observed bit flip.
#[derive(Debug, Clone)]
pub struct FlipReport {
    pub aggressors: (usize, usize),
    pub victim_addr: usize,
    pub offset: usize,
    pub expected: u8,
    pub observed: u8,
    /// Populated only in huge-page mode, where the analytic row number is
    /// known; page-/row-granular mode leaves this `None`.
    pub row_distance: Option<i64>,
    /// Populated only in huge-page mode: the victim-row pass this flip was
    /// observed on.
    pub pass: usize,
}

/// The result of one full hammering run.
#[derive(Debug, Clone, Default)]
pub struct HammerSummary {
    pub banks_estimated: Option<u8>,
    pub rows_or_pages: usize,
    pub flips: Vec<FlipReport>,
}

unsafe fn fill_and_flush(addr: usize, len: usize, byte: u8) {
    std::ptr::write_bytes(addr as *mut u8, byte, len);
    flush(addr, len);
}

/// Hammer every pair of discovered `victims` against each other.
///
/// # Safety
///
/// Every address spanned by every victim, and every address in `buf`, must
/// be valid and readable/writable for the duration of the call.
pub unsafe fn run_bank_profiled(
    victims: &[Victim],
    buf: &HammerBuffer,
    cfg: &HammerConfig,
    mut on_flip: impl FnMut(&FlipReport),
    should_stop: &dyn Fn() -> bool,
) -> HammerSummary {
    let _ = buf; // victims already carry absolute addresses; kept for API symmetry / lifetime anchoring.
    let mut flips = Vec::new();
    let n = victims.len();

    'outer: for i in 0..n {
        for j in (i + 1)..n {
            if should_stop() {
                break 'outer;
            }

            // Victim init: every other discovered entry gets VFILL.
            for (k, victim) in victims.iter().enumerate() {
                if k == i || k == j {
                    continue;
                }
                for (addr, len) in victim.spans() {
                    fill_and_flush(addr, len, cfg.vfill);
                }
            }

            // Aggressor init: the two chosen victims get TFILL.
            for (addr, len) in victims[i].spans().into_iter().chain(victims[j].spans()) {
                fill_and_flush(addr, len, cfg.tfill);
            }

            let aggressor_a = victims[i].representative();
            let aggressor_b = victims[j].representative();
            hammer_pair(aggressor_a, aggressor_b, cfg.test_iterations);

            let mut amplified = false;
            loop {
                let mut round_flips = Vec::new();
                for (k, victim) in victims.iter().enumerate() {
                    if k == i || k == j {
                        continue;
                    }
                    for (addr, len) in victim.spans() {
                        for offset in 0..len {
                            let observed = std::ptr::read_volatile((addr + offset) as *const u8);
                            if observed != cfg.vfill {
                                round_flips.push(FlipReport {
                                    aggressors: (aggressor_a, aggressor_b),
                                    victim_addr: addr,
                                    offset,
                                    expected: cfg.vfill,
                                    observed,
                                    row_distance: None,
                                    pass: 0,
                                });
                            }
                        }
                    }
                }

                // Amplification: confirm a tentative flip with a longer
                // burst before trusting it, once per pair.
                if !round_flips.is_empty() && !amplified {
                    amplified = true;
                    hammer_pair(aggressor_a, aggressor_b, cfg.stress_iterations);
                    thread::sleep(Duration::from_secs(2));
                    hammer_pair(aggressor_a, aggressor_b, cfg.stress_iterations);
                    thread::sleep(Duration::from_secs(2));
                    continue;
                }

                for report in &round_flips {
                    on_flip(report);
                    std::ptr::write_volatile(
                        (report.victim_addr + report.offset) as *mut u8,
                        cfg.vfill,
                    );
                }
                flips.extend(round_flips);
                break;
            }
        }
    }

    HammerSummary { banks_estimated: None, rows_or_pages: n, flips }
}

fn row_key(addr: &DramAddr) -> (u16, u16, u16, u16, u16) {
    (addr.chan, addr.dimm, addr.rank, addr.bank, addr.row)
}

/// Partition a huge page's sorted entries into maximal runs sharing one
/// DRAM row. Relies on [`crate::hugepage::plan_huge_pages`] having already
/// sorted entries by composite key, so co-row entries are contiguous.
fn group_by_row(entries: &[HugePageEntry]) -> Vec<Vec<HugePageEntry>> {
    let mut groups: Vec<Vec<HugePageEntry>> = Vec::new();
    for &entry in entries {
        match groups.last_mut() {
            Some(g) if row_key(&g[0].dram_addr) == row_key(&entry.dram_addr) => g.push(entry),
            _ => groups.push(vec![entry]),
        }
    }
    groups
}

/// Hammer each huge page's interior rows double-sided: aggressors are the
/// rows immediately above and below the victim row.
///
/// # Safety
///
/// Every address in every huge page's entries must be valid and
/// readable/writable for the duration of the call.
pub unsafe fn run_huge_page(
    huge_pages: &[HugePage],
    cfg: &HammerConfig,
    mut on_flip: impl FnMut(&FlipReport),
    should_stop: &dyn Fn() -> bool,
) -> HammerSummary {
    let mut flips = Vec::new();
    let mut rows_total = 0usize;

    'outer: for page in huge_pages {
        let rows = group_by_row(&page.entries);
        rows_total += rows.len();
        if rows.len() < 3 {
            continue;
        }

        for victim_row in 1..rows.len() - 1 {
            if should_stop() {
                break 'outer;
            }

            let lo = victim_row.saturating_sub(cfg.window_rad);
            let hi = (victim_row + cfg.window_rad).min(rows.len() - 1);

            for row in &rows[lo..=hi] {
                for entry in row {
                    fill_and_flush(entry.vaddr, cfg.dram_params.map_gran, cfg.vfill);
                }
            }

            let aggressor_a = rows[victim_row - 1][0].vaddr;
            let aggressor_b = rows[victim_row + 1][0].vaddr;
            fill_and_flush(aggressor_a, cfg.dram_params.map_gran, cfg.tfill);
            fill_and_flush(aggressor_b, cfg.dram_params.map_gran, cfg.tfill);

            hammer_pair(aggressor_a, aggressor_b, cfg.test_iterations);

            let victim_row_number = rows[victim_row][0].dram_addr.row;
            for row in &rows[lo..=hi] {
                let row_number = row[0].dram_addr.row;
                for entry in row {
                    for offset in 0..cfg.dram_params.map_gran {
                        let observed =
                            std::ptr::read_volatile((entry.vaddr + offset) as *const u8);
                        if observed != cfg.vfill {
                            let report = FlipReport {
                                aggressors: (aggressor_a, aggressor_b),
                                victim_addr: entry.vaddr,
                                offset,
                                expected: cfg.vfill,
                                observed,
                                row_distance: Some(
                                    row_number as i64 - victim_row_number as i64,
                                ),
                                pass: victim_row,
                            };
                            on_flip(&report);
                            std::ptr::write_volatile(
                                (entry.vaddr + offset) as *mut u8,
                                cfg.vfill,
                            );
                            flips.push(report);
                        }
                    }
                }
            }
        }
    }

    HammerSummary { banks_estimated: None, rows_or_pages: rows_total, flips }
}
