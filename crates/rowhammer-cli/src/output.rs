//! Line-oriented stdout protocol: progress lines, flip reports, and the
//! final summary. Kept separate from diagnostics, which go through `log`
//! to stderr, so the stdout stream stays machine-parseable.

use std::io::Write;

use rowhammer_core::hammer::{FlipReport, HammerSummary};

/// `[k]Testing …` progress line, flushed immediately so a killed run loses
/// at most the line in flight.
pub fn progress(out: &mut impl Write, k: usize, detail: &str) {
    let _ = writeln!(out, "[{k}]Testing {detail}");
    let _ = out.flush();
}

pub fn flip(out: &mut impl Write, report: &FlipReport) {
    match report.row_distance {
        Some(distance) => {
            let _ = writeln!(
                out,
                "FLIP aggressors=({:#x},{:#x}) victim={:#x} offset={:#x} expected={:#04x} observed={:#04x} row_distance={} pass={}",
                report.aggressors.0,
                report.aggressors.1,
                report.victim_addr,
                report.offset,
                report.expected,
                report.observed,
                distance,
                report.pass,
            );
        }
        None => {
            let _ = writeln!(
                out,
                "FLIP aggressors=({:#x},{:#x}) victim={:#x} offset={:#x} expected={:#04x} observed={:#04x}",
                report.aggressors.0,
                report.aggressors.1,
                report.victim_addr,
                report.offset,
                report.expected,
                report.observed,
            );
        }
    }
    let _ = out.flush();
}

pub fn summary(out: &mut impl Write, summary: &HammerSummary) {
    let banks = summary
        .banks_estimated
        .map(|b| b.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let _ = writeln!(
        out,
        "SUMMARY banks_estimated={} rows_or_pages={} flips={}",
        banks,
        summary.rows_or_pages,
        summary.flips.len(),
    );
    let _ = out.flush();
}
