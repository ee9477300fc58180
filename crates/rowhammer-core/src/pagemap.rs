//! Diagnostic physical-address oracle, gated behind the `pagemap` feature.
//!
//! Reads `/proc/self/pagemap` to ground-truth the bank/row predicted by the
//! timing side channel against the real physical address — never consulted
//! by the core unless this feature is compiled in. Grounded on
//! `original_source/2.TC Rowhammer/tcrh.c::getPhysAddress`/`getBank`/`getRow`.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use crate::bits::{bit, bits};
use crate::config::PAGE_SIZE;
use crate::error::{Result, RowhammerError};

const PAGEMAP_ENTRY_BYTES: u64 = 8;
const PFN_MASK: u64 = (1u64 << 55) - 1;

/// Resolve `vaddr`'s physical address via `/proc/self/pagemap`.
///
/// Returns `Err(RowhammerError::Environmental(_))` if the page-frame-number
/// field reads zero, which on an unprivileged process means the kernel
/// redacted it rather than that the page is genuinely unmapped.
pub fn phys_addr(vaddr: usize) -> Result<u64> {
    let page_index = (vaddr / PAGE_SIZE) as u64;
    let mut file = File::open("/proc/self/pagemap")
        .map_err(|e| RowhammerError::Environmental(format!("opening pagemap: {e}")))?;
    file.seek(SeekFrom::Start(page_index * PAGEMAP_ENTRY_BYTES))
        .map_err(|e| RowhammerError::Environmental(format!("seeking pagemap: {e}")))?;

    let mut raw = [0u8; 8];
    file.read_exact(&mut raw)
        .map_err(|e| RowhammerError::Environmental(format!("reading pagemap: {e}")))?;
    let entry = u64::from_le_bytes(raw);

    let pfn = entry & PFN_MASK;
    if pfn == 0 {
        return Err(RowhammerError::Environmental(
            "pagemap returned a zero page-frame-number; insufficient privilege".into(),
        ));
    }

    let page_offset = vaddr as u64 % PAGE_SIZE as u64;
    Ok(pfn * PAGE_SIZE as u64 + page_offset)
}

/// Bank field of a physical address, the physical-address analogue of
/// [`crate::dram::map_addr`]'s bank extraction. Kept as a separate function
/// because it operates on `paddr`, not a virtual offset — the two only
/// agree when a page is known to be physically contiguous from its start.
pub fn dram_bank_of_phys(paddr: u64) -> u64 {
    bits(paddr, 15, 13) ^ bits(paddr, 18, 16)
}

/// Row field of a physical address (full, unmasked map).
pub fn dram_row_of_phys(paddr: u64) -> u64 {
    let mut row = bits(paddr, 31, 16);
    if bit(paddr, 19) != 0 {
        row ^= 6;
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bank_of_phys_matches_analytic_formula() {
        // Same bit formula as dram::map_addr's single-channel bank
        // extraction, exercised directly on a physical address.
        let paddr = 0x20000u64;
        assert_eq!(dram_bank_of_phys(paddr), 2);
    }

    #[test]
    fn row_of_phys_applies_ondimm_remap() {
        let paddr = 0x80000u64;
        assert_eq!(dram_row_of_phys(paddr), 14);
    }

    #[test]
    fn phys_addr_reads_this_processs_own_pagemap() {
        // Exercises the live code path; environments without pagemap read
        // access (containers, some CI sandboxes) are expected to surface
        // the Environmental error rather than panic.
        let local = 0u8;
        let vaddr = &local as *const u8 as usize;
        match phys_addr(vaddr) {
            Ok(paddr) => assert_ne!(paddr, 0),
            Err(RowhammerError::Environmental(_)) => {}
            Err(other) => panic!("unexpected error variant: {other:?}"),
        }
    }
}
