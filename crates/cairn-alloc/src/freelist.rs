//! Intrusive first-fit free-list over a single caller-owned buffer.
//!
//! A [`FreeList`] is the in-page machinery of a slab page: free spans and
//! allocation headers live inside the buffer itself, so the list adds no
//! bookkeeping allocations of its own. Every payload pointer it returns is
//! aligned to [`MAX_SCALAR_ALIGN`].
//!
//! The list does not own its buffer. Whoever created the buffer frees it,
//! after calling [`FreeList::reset`] to detach the list.
//!
//! # Safety
//!
//! Unsafe code in this module only ever reads and writes inside the buffer
//! the list was initialized over. The constructor's contract (a valid,
//! exclusive, max-aligned buffer) is what makes the rest of the module
//! sound.

use std::fmt;
use std::mem;
use std::ptr::NonNull;

use crate::raw::{align_up, MAX_SCALAR_ALIGN};

// ---------------------------------------------------------------------------
// In-buffer structures
// ---------------------------------------------------------------------------

/// Header written immediately before every live allocation.
#[repr(C)]
struct BlockHeader {
    /// Bytes the caller asked for (not the carved span size).
    size: u64,
    /// Canary derived from `size`; checked on free to catch stray writes
    /// and double frees.
    canary: u64,
}

/// Node describing one contiguous free span, written at the span's start.
/// Spans are kept address-ordered and fully coalesced.
struct FreeSpan {
    /// Total bytes of the span, node included.
    size: usize,
    next: Option<NonNull<FreeSpan>>,
}

/// Bytes of header in front of every allocation.
pub const PER_ALLOC_OVERHEAD: usize = mem::size_of::<BlockHeader>();

const BLOCK_CANARY: u64 = 0x7A3F_19E5_C4B2_8D61;

#[inline]
const fn canary_for(size: u64) -> u64 {
    BLOCK_CANARY ^ size.rotate_left(13)
}

// ---------------------------------------------------------------------------
// FreeList
// ---------------------------------------------------------------------------

/// First-fit free-list over one buffer. See the module docs.
pub struct FreeList {
    buffer: NonNull<u8>,
    /// Usable bytes: the buffer size rounded down to [`MAX_SCALAR_ALIGN`].
    buffer_size: usize,
    /// Address-ordered list of free spans.
    head: Option<NonNull<FreeSpan>>,
}

impl FreeList {
    /// Initialize a free-list over `buffer`.
    ///
    /// # Safety
    ///
    /// - `buffer` must point to at least `buffer_size` bytes of memory that
    ///   is valid, writable, and aligned to [`MAX_SCALAR_ALIGN`].
    /// - The buffer must stay exclusively owned by this list (and its
    ///   allocations) until [`reset`](Self::reset) is called.
    pub unsafe fn new(buffer: NonNull<u8>, buffer_size: usize) -> Self {
        debug_assert_eq!(
            buffer.as_ptr() as usize % MAX_SCALAR_ALIGN,
            0,
            "free-list buffer must be max-aligned"
        );

        let usable = buffer_size & !(MAX_SCALAR_ALIGN - 1);
        let head = if usable >= mem::size_of::<FreeSpan>() {
            let span = buffer.as_ptr().cast::<FreeSpan>();
            unsafe {
                span.write(FreeSpan {
                    size: usable,
                    next: None,
                });
            }
            NonNull::new(span)
        } else {
            None
        };

        Self {
            buffer,
            buffer_size: usable,
            head,
        }
    }

    /// The buffer this list was initialized over.
    #[inline]
    pub fn buffer(&self) -> NonNull<u8> {
        self.buffer
    }

    /// Usable bytes of the buffer.
    #[inline]
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Whether `ptr` lies inside this list's buffer.
    #[inline]
    pub fn contains(&self, ptr: NonNull<u8>) -> bool {
        let addr = ptr.as_ptr() as usize;
        let base = self.buffer.as_ptr() as usize;
        addr >= base && addr < base + self.buffer_size
    }

    /// Allocate `bytes`. The returned payload is max-aligned.
    ///
    /// Returns `None` when no span can fit the request.
    pub fn malloc(&mut self, bytes: usize) -> Option<NonNull<u8>> {
        if bytes == 0 {
            return None;
        }
        let need = align_up(PER_ALLOC_OVERHEAD + bytes, MAX_SCALAR_ALIGN);

        let mut prev: Option<NonNull<FreeSpan>> = None;
        let mut cursor = self.head;
        while let Some(span) = cursor {
            let (span_size, span_next) = unsafe { ((*span.as_ptr()).size, (*span.as_ptr()).next) };
            if span_size < need {
                prev = cursor;
                cursor = span_next;
                continue;
            }

            // Carve the block from the front of the span. Sizes are all
            // multiples of MAX_SCALAR_ALIGN, so any remainder can hold a
            // span node.
            let remainder = span_size - need;
            let replacement = if remainder > 0 {
                let tail = unsafe { span.as_ptr().cast::<u8>().add(need).cast::<FreeSpan>() };
                unsafe {
                    tail.write(FreeSpan {
                        size: remainder,
                        next: span_next,
                    });
                }
                NonNull::new(tail)
            } else {
                span_next
            };
            match prev {
                None => self.head = replacement,
                Some(p) => unsafe { (*p.as_ptr()).next = replacement },
            }

            let block = span.as_ptr().cast::<u8>();
            unsafe {
                block.cast::<BlockHeader>().write(BlockHeader {
                    size: bytes as u64,
                    canary: canary_for(bytes as u64),
                });
                return Some(NonNull::new_unchecked(block.add(PER_ALLOC_OVERHEAD)));
            }
        }
        None
    }

    /// Release an allocation back to the list.
    ///
    /// The freed span is reinserted in address order and coalesced with its
    /// neighbours. Pointers that are not live payloads of this list --
    /// foreign, interior, or already freed (detected via the header canary)
    /// -- are silently ignored.
    pub fn free(&mut self, ptr: NonNull<u8>) {
        let addr = ptr.as_ptr() as usize;
        let base = self.buffer.as_ptr() as usize;
        if addr < base + PER_ALLOC_OVERHEAD || addr >= base + self.buffer_size {
            return;
        }

        let header = (addr - PER_ALLOC_OVERHEAD) as *mut BlockHeader;
        let payload_size = unsafe {
            let read = header.read();
            if read.canary != canary_for(read.size) {
                return;
            }
            // Clobber the canary so a second free of this block is ignored
            // even after the span merges into a neighbour.
            (*header).canary = 0;
            read.size as usize
        };

        let span_addr = header as usize;
        let span_size = align_up(PER_ALLOC_OVERHEAD + payload_size, MAX_SCALAR_ALIGN);

        // Find the insertion point: `cursor` is the first span past the
        // freed block, `prev` the last one before it.
        let mut prev: Option<NonNull<FreeSpan>> = None;
        let mut cursor = self.head;
        while let Some(span) = cursor {
            if span.as_ptr() as usize > span_addr {
                break;
            }
            prev = cursor;
            cursor = unsafe { (*span.as_ptr()).next };
        }

        // Merge backwards into `prev` when adjacent.
        if let Some(p) = prev {
            let prev_addr = p.as_ptr() as usize;
            let prev_size = unsafe { (*p.as_ptr()).size };
            if prev_addr + prev_size == span_addr {
                unsafe {
                    (*p.as_ptr()).size = prev_size + span_size;
                    if let Some(n) = cursor {
                        if prev_addr + (*p.as_ptr()).size == n.as_ptr() as usize {
                            (*p.as_ptr()).size += (*n.as_ptr()).size;
                            (*p.as_ptr()).next = (*n.as_ptr()).next;
                        }
                    }
                }
                return;
            }
        }

        // Otherwise write a fresh span node, merging forwards when adjacent.
        let mut node = FreeSpan {
            size: span_size,
            next: cursor,
        };
        if let Some(n) = cursor {
            if span_addr + span_size == n.as_ptr() as usize {
                unsafe {
                    node.size += (*n.as_ptr()).size;
                    node.next = (*n.as_ptr()).next;
                }
            }
        }
        let span = span_addr as *mut FreeSpan;
        unsafe { span.write(node) };
        let span = unsafe { NonNull::new_unchecked(span) };
        match prev {
            None => self.head = Some(span),
            Some(p) => unsafe { (*p.as_ptr()).next = Some(span) },
        }
    }

    /// Bytes the caller requested for the allocation behind `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live payload pointer previously returned by
    /// [`malloc`](Self::malloc) on this list.
    pub unsafe fn allocation_size(&self, ptr: NonNull<u8>) -> usize {
        let header = unsafe { ptr.as_ptr().sub(PER_ALLOC_OVERHEAD).cast::<BlockHeader>().read() };
        debug_assert_eq!(header.canary, canary_for(header.size));
        header.size as usize
    }

    /// Detach the list from its buffer. Every pointer handed out becomes
    /// invalid; the buffer is the owner's to release.
    pub fn reset(&mut self) {
        self.head = None;
        self.buffer_size = 0;
    }

    /// Walk the free spans and panic on any sign of corruption:
    /// out-of-bounds, misaligned, overlapping, or non-ascending spans.
    ///
    /// Cost is linear in the number of free spans; callers run this around
    /// every mutation of a page.
    pub fn verify(&self) {
        let base = self.buffer.as_ptr() as usize;
        let end = base + self.buffer_size;

        let mut last_end = base;
        let mut first = true;
        let mut free_total = 0usize;
        let mut cursor = self.head;
        while let Some(span) = cursor {
            let addr = span.as_ptr() as usize;
            let (size, next) = unsafe { ((*span.as_ptr()).size, (*span.as_ptr()).next) };

            assert_eq!(addr % MAX_SCALAR_ALIGN, 0, "free span is misaligned");
            // Order matters: confirm the span starts inside the page before
            // subtracting, so a corrupt address cannot underflow the bound.
            assert!(
                addr >= base && addr <= end && size <= end - addr,
                "free span escapes the page"
            );
            assert!(
                size >= mem::size_of::<FreeSpan>() && size % MAX_SCALAR_ALIGN == 0,
                "free span has a corrupt size"
            );
            if !first {
                assert!(addr > last_end, "free spans overlap or were never coalesced");
            }

            first = false;
            last_end = addr + size;
            free_total += size;
            // A cycle in the next chain would loop forever; total free
            // bytes bound the walk.
            assert!(free_total <= self.buffer_size, "free spans form a cycle");
            cursor = next;
        }
    }

    /// Number of free spans (diagnostic).
    pub fn free_span_count(&self) -> usize {
        let mut count = 0;
        let mut cursor = self.head;
        while let Some(span) = cursor {
            count += 1;
            cursor = unsafe { (*span.as_ptr()).next };
        }
        count
    }
}

impl fmt::Debug for FreeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FreeList")
            .field("buffer_size", &self.buffer_size)
            .field("free_spans", &self.free_span_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// 16-aligned chunk so test buffers satisfy the constructor contract.
    #[repr(C, align(16))]
    #[derive(Clone, Copy)]
    struct Slot([u8; 16]);

    fn buffer(slots: usize) -> Vec<Slot> {
        vec![Slot([0; 16]); slots]
    }

    fn list_over(buf: &mut [Slot]) -> FreeList {
        let ptr = NonNull::new(buf.as_mut_ptr().cast::<u8>()).unwrap();
        unsafe { FreeList::new(ptr, buf.len() * 16) }
    }

    #[test]
    fn payloads_are_max_aligned_and_inside_the_buffer() {
        let mut buf = buffer(30);
        let mut list = list_over(&mut buf);

        for _ in 0..10 {
            let ptr = list.malloc(32).unwrap();
            assert_eq!(ptr.as_ptr() as usize % MAX_SCALAR_ALIGN, 0);
            assert!(list.contains(ptr));
            list.verify();
        }
        // 10 * align(16 + 32) == the whole buffer.
        assert!(list.malloc(32).is_none());
    }

    #[test]
    fn free_then_malloc_reuses_space() {
        let mut buf = buffer(30);
        let mut list = list_over(&mut buf);

        let blocks: Vec<_> = (0..10).map(|_| list.malloc(32).unwrap()).collect();
        for block in blocks {
            list.free(block);
            list.verify();
        }
        // Everything coalesced back into one span.
        assert_eq!(list.free_span_count(), 1);

        let again: Vec<_> = (0..10).map(|_| list.malloc(32).unwrap()).collect();
        assert_eq!(again.len(), 10);
    }

    #[test]
    fn coalescing_survives_out_of_order_frees() {
        let mut buf = buffer(64);
        let mut list = list_over(&mut buf);

        let blocks: Vec<_> = (0..8).map(|_| list.malloc(48).unwrap()).collect();
        // Free even blocks first, then odd, so every merge direction runs.
        for block in blocks.iter().step_by(2) {
            list.free(*block);
            list.verify();
        }
        for block in blocks.iter().skip(1).step_by(2) {
            list.free(*block);
            list.verify();
        }
        assert_eq!(list.free_span_count(), 1);
    }

    #[test]
    fn allocation_size_reports_requested_bytes() {
        let mut buf = buffer(8);
        let mut list = list_over(&mut buf);
        let ptr = list.malloc(40).unwrap();
        assert_eq!(unsafe { list.allocation_size(ptr) }, 40);
    }

    #[test]
    fn double_free_is_ignored() {
        let mut buf = buffer(8);
        let mut list = list_over(&mut buf);
        let a = list.malloc(16).unwrap();
        let _b = list.malloc(16).unwrap();
        list.free(a);
        let spans = list.free_span_count();
        list.free(a);
        assert_eq!(list.free_span_count(), spans);
        list.verify();
    }

    #[test]
    fn foreign_pointer_is_ignored() {
        let mut buf = buffer(8);
        let mut list = list_over(&mut buf);
        let a = list.malloc(16).unwrap();
        let mut other = [0u8; 16];
        list.free(NonNull::new(other.as_mut_ptr()).unwrap());
        list.verify();
        list.free(a);
        assert_eq!(list.free_span_count(), 1);
    }

    #[test]
    fn tiny_buffer_is_inert() {
        let mut buf = buffer(0);
        let ptr = NonNull::new(buf.as_mut_ptr().cast::<u8>()).unwrap_or(NonNull::dangling());
        let mut list = unsafe { FreeList::new(ptr, 0) };
        assert!(list.malloc(8).is_none());
        list.verify();
    }

    #[test]
    #[should_panic(expected = "escapes the page")]
    fn verify_catches_a_span_pushed_past_the_buffer() {
        let mut buf = buffer(16);
        let base = NonNull::new(buf.as_mut_ptr().cast::<u8>()).unwrap();
        // List over the first half only; the rest of the buffer stands in
        // for memory beyond the page.
        let list = unsafe { FreeList::new(base, 128) };
        unsafe {
            let beyond = base.as_ptr().add(192).cast::<FreeSpan>();
            beyond.write(FreeSpan {
                size: 16,
                next: None,
            });
            (*base.as_ptr().cast::<FreeSpan>()).next = NonNull::new(beyond);
        }
        list.verify();
    }

    #[test]
    #[should_panic(expected = "escapes the page")]
    fn verify_catches_an_oversized_span() {
        let mut buf = buffer(8);
        let base = NonNull::new(buf.as_mut_ptr().cast::<u8>()).unwrap();
        let list = unsafe { FreeList::new(base, 128) };
        unsafe {
            // Stretch the head span one slot past the end of the page.
            (*base.as_ptr().cast::<FreeSpan>()).size = 144;
        }
        list.verify();
    }

    #[test]
    fn reset_detaches_from_the_buffer() {
        let mut buf = buffer(8);
        let mut list = list_over(&mut buf);
        let _ = list.malloc(16).unwrap();
        list.reset();
        assert_eq!(list.buffer_size(), 0);
        assert!(list.malloc(16).is_none());
    }
}
