//! Memory primitives that race the cache against DRAM.
//!
//! These are the only callers permitted to do so: their loop bodies must
//! stay constant-instruction-count and must not be reordered by the
//! compiler, so every read goes through [`std::ptr::read_volatile`] and
//! every flush is followed by a compiler fence. No machine-level fence is
//! issued in the hot loop — back-to-back `clflush`es to the same line
//! serialize naturally, matching the original tool's
//! `hammer_double`/`hammer_single`.

use std::arch::x86_64::_mm_clflush;
use std::sync::atomic::{compiler_fence, Ordering};

use crate::config::CACHE_LINE_SIZE;

/// Flush every cache line in `[vaddr, vaddr+len)` at 64-byte stride.
///
/// # Safety
///
/// `vaddr` must be a valid pointer into mapped memory for at least `len`
/// bytes for the duration of the call.
pub unsafe fn flush(vaddr: usize, len: usize) {
    let mut caddr = vaddr;
    let end = vaddr + len;
    while caddr < end {
        _mm_clflush(caddr as *const u8);
        caddr += CACHE_LINE_SIZE;
    }
    compiler_fence(Ordering::SeqCst);
}

/// Hammer two addresses `n` times: read `*a`, read `*b`, flush both.
///
/// No fence separates the two reads — both activations must reach DRAM in
/// quick succession for row-buffer conflicts to manifest as timing.
///
/// # Safety
///
/// `a` and `b` must be valid, readable addresses for the duration of the
/// call.
pub unsafe fn hammer_pair(a: usize, b: usize, n: u64) {
    let p = a as *const u8;
    let q = b as *const u8;
    let mut i = n;
    while i > 0 {
        std::ptr::read_volatile(p);
        std::ptr::read_volatile(q);
        _mm_clflush(p);
        _mm_clflush(q);
        i -= 1;
    }
    compiler_fence(Ordering::SeqCst);
}

/// Hammer a single address `n` times: read `*a`, flush.
///
/// # Safety
///
/// `a` must be a valid, readable address for the duration of the call.
pub unsafe fn hammer_single(a: usize, n: u64) {
    let p = a as *const u8;
    let mut i = n;
    while i > 0 {
        std::ptr::read_volatile(p);
        _mm_clflush(p);
        i -= 1;
    }
    compiler_fence(Ordering::SeqCst);
}
