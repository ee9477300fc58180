//! The test buffer: a single large anonymous mapping, pre-faulted.
//!
//! Confines the raw-pointer arithmetic the hammer primitives need to one
//! module. Callers get an `origin` address and a length; everything past
//! that point talks in `usize` virtual addresses, not pointers, which is
//! also what lets the timing/memory primitives stay free functions over
//! plain integers.

use crate::config::HUGE_PAGE_SIZE;
use crate::error::{Result, RowhammerError};

/// An owned anonymous read/write mapping.
pub struct HammerBuffer {
    ptr: *mut u8,
    len: usize,
    /// The raw mmap region, which may be larger than `len` when the
    /// mapping was over-allocated for huge-page alignment.
    raw_ptr: *mut u8,
    raw_len: usize,
}

// SAFETY: the buffer owns its mapping exclusively; nothing else can alias
// it, so it is safe to move the handle between threads (the harness itself
// is single-threaded, but tests may construct buffers on worker threads).
unsafe impl Send for HammerBuffer {}

impl HammerBuffer {
    /// Allocate a plain, page-aligned anonymous mapping of `len` bytes,
    /// populated up front, matching
    /// `original_source/2.TC Rowhammer/tcrh.c::main`'s
    /// `mmap(..., MAP_PRIVATE | MAP_ANONYMOUS | MAP_POPULATE, ...)`.
    pub fn allocate(len: usize) -> Result<Self> {
        if len == 0 {
            return Err(RowhammerError::Configuration("buffer length must be non-zero".into()));
        }
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_POPULATE,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(RowhammerError::Environmental(format!(
                "buffer allocation failed: {}",
                std::io::Error::last_os_error()
            )));
        }
        Ok(Self { ptr: ptr as *mut u8, len, raw_ptr: ptr as *mut u8, raw_len: len })
    }

    /// Allocate `len` bytes, over-mapping by one huge page so the returned
    /// buffer can be shifted forward to a 2 MiB boundary, and advise the
    /// kernel that the aligned region is transparent-hugepage-eligible.
    ///
    /// Matches `original_source/THP Rowhammer/hprh.c::main`'s
    /// `mmap(..., bufSize + HUGE_PAGE_SIZE, ...)` followed by rounding the
    /// base up to a `HUGE_PAGE_SIZE` boundary and `madvise(MADV_HUGEPAGE)`.
    pub fn allocate_huge_page_aligned(len: usize) -> Result<Self> {
        if len == 0 {
            return Err(RowhammerError::Configuration("buffer length must be non-zero".into()));
        }
        let raw_len = len + HUGE_PAGE_SIZE;
        let raw_ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                raw_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if raw_ptr == libc::MAP_FAILED {
            return Err(RowhammerError::Environmental(format!(
                "buffer allocation failed: {}",
                std::io::Error::last_os_error()
            )));
        }
        let mask = HUGE_PAGE_SIZE - 1;
        let aligned = (raw_ptr as usize + mask) & !mask;

        unsafe {
            libc::madvise(aligned as *mut libc::c_void, len, libc::MADV_HUGEPAGE);
        }

        Ok(Self { ptr: aligned as *mut u8, len, raw_ptr: raw_ptr as *mut u8, raw_len })
    }

    /// Virtual address of the first byte.
    pub fn origin(&self) -> usize {
        self.ptr as usize
    }

    /// Length in bytes of the usable (aligned) region.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Fill the whole buffer with `byte` and flush it, matching the
    /// original tool's `memset(buf, fill, size); flush(buf, size);` pairing
    /// after allocation.
    pub fn fill_and_flush(&self, byte: u8) {
        unsafe {
            std::ptr::write_bytes(self.ptr, byte, self.len);
            crate::memprim::flush(self.origin(), self.len);
        }
    }

    /// Fill `[offset, offset+len)` with `byte` and flush that range.
    pub fn fill_range_and_flush(&self, offset: usize, len: usize, byte: u8) {
        assert!(offset + len <= self.len, "fill range out of bounds");
        unsafe {
            std::ptr::write_bytes(self.ptr.add(offset), byte, len);
            crate::memprim::flush(self.origin() + offset, len);
        }
    }

    /// Read a single byte at `offset` through a volatile access, matching
    /// the victim-scan read in the hammer driver.
    pub fn read_byte(&self, offset: usize) -> u8 {
        assert!(offset < self.len, "read offset out of bounds");
        unsafe { std::ptr::read_volatile(self.ptr.add(offset)) }
    }

    /// Write a single byte at `offset` through a volatile access, used to
    /// restore a corrupted byte to its fill value after reporting a flip.
    pub fn write_byte(&self, offset: usize, byte: u8) {
        assert!(offset < self.len, "write offset out of bounds");
        unsafe { std::ptr::write_volatile(self.ptr.add(offset), byte) };
    }
}

impl Drop for HammerBuffer {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.raw_ptr as *mut libc::c_void, self.raw_len);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_rejects_zero_length() {
        assert!(HammerBuffer::allocate(0).is_err());
    }

    #[test]
    fn allocate_produces_readable_writable_memory() {
        let buf = HammerBuffer::allocate(4096).unwrap();
        buf.fill_and_flush(0xAB);
        for offset in 0..buf.len() {
            assert_eq!(buf.read_byte(offset), 0xAB);
        }
    }

    #[test]
    fn fill_range_only_touches_requested_bytes() {
        let buf = HammerBuffer::allocate(4096).unwrap();
        buf.fill_and_flush(0x00);
        buf.fill_range_and_flush(100, 8, 0xFF);
        for offset in 0..buf.len() {
            let expected = if (100..108).contains(&offset) { 0xFF } else { 0x00 };
            assert_eq!(buf.read_byte(offset), expected, "offset {offset}");
        }
    }

    #[test]
    fn write_byte_roundtrips() {
        let buf = HammerBuffer::allocate(4096).unwrap();
        buf.write_byte(10, 0x42);
        assert_eq!(buf.read_byte(10), 0x42);
    }

    #[test]
    fn huge_page_aligned_buffer_is_aligned() {
        let buf = HammerBuffer::allocate_huge_page_aligned(HUGE_PAGE_SIZE).unwrap();
        assert_eq!(buf.origin() % HUGE_PAGE_SIZE, 0);
        assert_eq!(buf.len(), HUGE_PAGE_SIZE);
    }
}
