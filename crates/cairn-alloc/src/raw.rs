//! The bottom of the allocator stack: raw aligned pages.
//!
//! A [`PageAllocator`] produces the large buffers that slab pages are carved
//! from. Allocators are passed explicitly through constructors -- there is no
//! process-wide allocator state -- which also makes it trivial to substitute
//! counting or failing implementations in tests.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

// ---------------------------------------------------------------------------
// Alignment helpers
// ---------------------------------------------------------------------------

/// The maximum scalar alignment.
///
/// Every slab block and every entity tail region is aligned to this, so any
/// scalar (or SIMD-friendly 128-bit value) can live at the start of a block
/// without further padding. Matches `max_align_t` on mainstream 64-bit
/// targets.
pub const MAX_SCALAR_ALIGN: usize = 16;

/// Round `value` up to the next multiple of `align`.
///
/// `align` must be a power of two.
#[inline]
pub const fn align_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

// ---------------------------------------------------------------------------
// PageAllocator
// ---------------------------------------------------------------------------

/// Source of large, aligned buffers.
///
/// Implementations hand out `(bytes, align)` buffers and take them back. The
/// deallocation call repeats the layout because the global allocator needs it
/// to release memory; callers of this trait always know the layout they
/// requested.
pub trait PageAllocator {
    /// Allocate `bytes` of memory aligned to `align`.
    ///
    /// Returns `None` when the underlying allocator cannot satisfy the
    /// request (including a zero-byte or zero-align request).
    fn allocate(&mut self, bytes: usize, align: usize) -> Option<NonNull<u8>>;

    /// Return memory previously obtained from [`allocate`](Self::allocate).
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate` on this same allocator
    /// with the same `bytes` and `align`, and must not have been freed
    /// before.
    unsafe fn free(&mut self, ptr: NonNull<u8>, bytes: usize, align: usize);
}

// ---------------------------------------------------------------------------
// SystemPages
// ---------------------------------------------------------------------------

/// [`PageAllocator`] backed by the global allocator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPages;

impl PageAllocator for SystemPages {
    fn allocate(&mut self, bytes: usize, align: usize) -> Option<NonNull<u8>> {
        if bytes == 0 {
            return None;
        }
        let layout = Layout::from_size_align(bytes, align).ok()?;
        NonNull::new(unsafe { alloc::alloc(layout) })
    }

    unsafe fn free(&mut self, ptr: NonNull<u8>, bytes: usize, align: usize) {
        let layout =
            Layout::from_size_align(bytes, align).expect("layout was valid at allocation time");
        unsafe { alloc::dealloc(ptr.as_ptr(), layout) };
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_multiples() {
        assert_eq!(align_up(0, 16), 0);
        assert_eq!(align_up(1, 16), 16);
        assert_eq!(align_up(16, 16), 16);
        assert_eq!(align_up(17, 16), 32);
        assert_eq!(align_up(5, 1), 5);
    }

    #[test]
    fn system_pages_roundtrip_is_aligned() {
        let mut pages = SystemPages;
        let ptr = pages.allocate(4096, MAX_SCALAR_ALIGN).unwrap();
        assert_eq!(ptr.as_ptr() as usize % MAX_SCALAR_ALIGN, 0);
        unsafe { pages.free(ptr, 4096, MAX_SCALAR_ALIGN) };
    }

    #[test]
    fn system_pages_rejects_zero_bytes() {
        let mut pages = SystemPages;
        assert!(pages.allocate(0, MAX_SCALAR_ALIGN).is_none());
    }
}
