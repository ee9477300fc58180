//! CLI for rowhammer-rs — an experimental Rowhammer induction harness.

mod args;
mod output;
mod signals;

use std::fs::File;
use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use log::{info, warn};

use args::Args;
use rowhammer_core::config::HammerMode;
use rowhammer_core::hammer::Victim;
use rowhammer_core::{buffer::HammerBuffer, RowhammerError};

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    let cfg = args.to_hammer_config();

    if let Err(e) = cfg.validate() {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => match File::create(path) {
            Ok(file) => Box::new(file),
            Err(e) => {
                eprintln!("configuration error: could not open output file {path}: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => Box::new(io::stdout()),
    };

    let interrupted = signals::install(cfg.deadline_secs);
    let should_stop = signals::should_stop_fn(interrupted);

    let result = match HammerMode::from(args.mode) {
        HammerMode::HugePage => run_huge_page_mode(&cfg, &mut out, &should_stop),
        _ => run_bank_profiled_mode(&cfg, &mut out, &should_stop),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(RowhammerError::Operational(msg)) => {
            warn!("operational failure, exiting cleanly: {msg}");
            ExitCode::SUCCESS
        }
        Err(e @ (RowhammerError::Configuration(_) | RowhammerError::Environmental(_))) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
        Err(RowhammerError::Statistical(msg)) => {
            warn!("{msg}");
            ExitCode::SUCCESS
        }
    }
}

fn run_bank_profiled_mode(
    cfg: &rowhammer_core::HammerConfig,
    out: &mut dyn Write,
    should_stop: &dyn Fn() -> bool,
) -> Result<(), RowhammerError> {
    let buf = HammerBuffer::allocate(cfg.buf_size)?;
    buf.fill_and_flush(cfg.vfill);

    let step = cfg.sweep_step();
    output::progress(out, 0, &format!("SBDR profiling at step {step:#x}"));

    let sbdr_result = unsafe { rowhammer_core::sbdr(buf.origin(), buf.origin(), buf.len(), step, cfg) }?;
    info!(
        "sbdr baseline={} threshold={} found={} estimated_banks={:?}",
        sbdr_result.baseline,
        sbdr_result.threshold,
        sbdr_result.addrs.len(),
        sbdr_result.estimated_banks,
    );
    if sbdr_result.addrs.len() < 2 {
        return Err(RowhammerError::Statistical(
            "fewer than two same-bank addresses found".into(),
        ));
    }

    let victims: Vec<Victim> = match cfg.mode {
        HammerMode::RowGranular => {
            let rows = unsafe { rowhammer_core::group_rows(&sbdr_result.addrs, cfg) };
            rows.into_iter().map(Victim::Row).collect()
        }
        _ => sbdr_result.addrs.iter().map(|&a| Victim::Page(a)).collect(),
    };

    output::progress(out, 1, &format!("hammering {} candidates", victims.len()));

    let mut summary = unsafe {
        rowhammer_core::run_bank_profiled(
            &victims,
            &buf,
            cfg,
            |report| output::flip(out, report),
            should_stop,
        )
    };
    summary.banks_estimated = sbdr_result.estimated_banks;
    output::summary(out, &summary);

    Ok(())
}

fn run_huge_page_mode(
    cfg: &rowhammer_core::HammerConfig,
    out: &mut dyn Write,
    should_stop: &dyn Fn() -> bool,
) -> Result<(), RowhammerError> {
    let buf = HammerBuffer::allocate_huge_page_aligned(cfg.buf_size)?;
    buf.fill_and_flush(cfg.vfill);

    output::progress(out, 0, "locating a contiguous huge-page region");
    let base = unsafe { rowhammer_core::find_contiguous_region(buf.origin(), buf.len(), cfg) };
    let Some(base) = base else {
        return Err(RowhammerError::Operational(
            "no physically contiguous 2 MiB region found".into(),
        ));
    };
    // The locator's alignment refinement may shift the base back one page
    // past the mapping start (it only knows about virtual strides, not
    // where our allocation begins); clamp so the length below cannot
    // underflow.
    let base = base.max(buf.origin());

    let huge_pages = rowhammer_core::plan_huge_pages(base, buf.len() - (base - buf.origin()), &cfg.dram_params);
    output::progress(out, 1, &format!("hammering {} huge pages", huge_pages.len()));

    let summary = unsafe {
        rowhammer_core::run_huge_page(&huge_pages, cfg, |report| output::flip(out, report), should_stop)
    };
    output::summary(out, &summary);

    Ok(())
}

