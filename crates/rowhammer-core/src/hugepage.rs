//! Huge-page planner: build sorted per-huge-page tables of map-granule
//! entries, grouped by DRAM address. Grounded on
//! `original_source/TCHP Rowhammer/hprh.c::setupHPEntries` and
//! `compare_hp_entries`.

use crate::config::{DramParams, HUGE_PAGE_SIZE};
use crate::dram::{map_addr, DramAddr};

/// One map-granule-sized slot inside a huge page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HugePageEntry {
    pub vaddr: usize,
    pub dram_addr: DramAddr,
}

/// A 2 MiB huge page's entries, sorted by composite DRAM key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HugePage {
    pub entries: Vec<HugePageEntry>,
}

/// The composite sort key: a plain lexicographic tuple, resolving the
/// ambiguity in the original's mis-precedenced OR-joined macro.
fn sort_key(addr: &DramAddr) -> (u16, u16, u16, u16, u16, u16) {
    (addr.chan, addr.dimm, addr.rank, addr.bank, addr.row, addr.col)
}

/// Build one [`HugePage`] per 2 MiB span in `[base, base+len)`, each
/// populated at `params.map_gran` stride and sorted by composite DRAM key.
///
/// `len` need not be huge-page aligned; a trailing partial huge page is
/// included with however many granules fit.
pub fn plan_huge_pages(base: usize, len: usize, params: &DramParams) -> Vec<HugePage> {
    let mut pages = Vec::new();
    let mut page_base = base;

    while page_base < base + len {
        let page_end = (page_base + HUGE_PAGE_SIZE).min(base + len);

        let mut entries = Vec::new();
        let mut vaddr = page_base;
        while vaddr < page_end {
            let dram_addr = map_addr(vaddr - base, params, false);
            entries.push(HugePageEntry { vaddr, dram_addr });
            vaddr += params.map_gran;
        }

        entries.sort_by_key(|e| sort_key(&e.dram_addr));
        pages.push(HugePage { entries });

        page_base += HUGE_PAGE_SIZE;
    }

    pages
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- ordering --------------------------------------------------------------

    #[test]
    fn entries_are_non_decreasing_in_composite_key() {
        let params = DramParams::new(1, 1, 2, true);
        let pages = plan_huge_pages(0x0, HUGE_PAGE_SIZE, &params);
        assert_eq!(pages.len(), 1);

        let keys: Vec<_> = pages[0].entries.iter().map(|e| sort_key(&e.dram_addr)).collect();
        for w in keys.windows(2) {
            assert!(w[0] <= w[1], "{:?} should precede {:?}", w[0], w[1]);
        }
    }

    #[test]
    fn entry_count_matches_map_gran_stride() {
        let params = DramParams::new(2, 1, 1, false); // map_gran == 64
        let pages = plan_huge_pages(0x0, HUGE_PAGE_SIZE, &params);
        assert_eq!(pages[0].entries.len(), HUGE_PAGE_SIZE / params.map_gran);
    }

    #[test]
    fn trailing_partial_huge_page_is_included() {
        let params = DramParams::new(1, 1, 1, false);
        let len = HUGE_PAGE_SIZE + params.map_gran * 3;
        let pages = plan_huge_pages(0x0, len, &params);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].entries.len(), 3);
    }

    #[test]
    fn multiple_huge_pages_each_sorted_independently() {
        let params = DramParams::new(1, 1, 2, true);
        let pages = plan_huge_pages(0x0, HUGE_PAGE_SIZE * 3, &params);
        assert_eq!(pages.len(), 3);
        for page in &pages {
            let keys: Vec<_> = page.entries.iter().map(|e| sort_key(&e.dram_addr)).collect();
            for w in keys.windows(2) {
                assert!(w[0] <= w[1]);
            }
        }
    }
}
