//! Size-bucketed allocation: one slab per block size.
//!
//! A [`MatrixAllocator`] keeps an ordered sequence of [`SlabAllocator`]
//! buckets, strictly ascending by block size. Allocation binary-searches
//! for the bucket (creating it at the lower-bound position on a miss) and
//! forwards. Rows of the matrix are the pages inside each bucket; columns
//! are the block sizes.
//!
//! Freeing has no size argument, so the matrix offers the pointer to every
//! bucket in turn and lets each bucket's page-containment test reject
//! foreign pointers. That is O(buckets), which stays cheap because the
//! bucket count is bounded by the number of distinct sizes in use.

use std::ptr::NonNull;

use crate::raw::PageAllocator;
use crate::slab::SlabAllocator;
use crate::AllocError;

// ---------------------------------------------------------------------------
// MatrixAllocator
// ---------------------------------------------------------------------------

/// Any-size allocator multiplexing fixed-block slabs.
///
/// The backing page allocator is cloned into each bucket, so implementations
/// that share state (counters, arenas) should do so through interior
/// sharing.
#[derive(Debug)]
pub struct MatrixAllocator<P: PageAllocator + Clone> {
    backing: P,
    max_blocks_per_page: usize,
    /// Buckets in strictly ascending `block_size` order.
    buckets: Vec<SlabAllocator<P>>,
}

impl<P: PageAllocator + Clone> MatrixAllocator<P> {
    /// Create a matrix whose buckets hold at most `max_blocks_per_page`
    /// blocks per page.
    ///
    /// # Panics
    ///
    /// Panics when `max_blocks_per_page` is zero.
    pub fn new(backing: P, max_blocks_per_page: usize) -> Self {
        assert!(max_blocks_per_page > 0, "a page must hold at least one block");
        Self {
            backing,
            max_blocks_per_page,
            buckets: Vec::new(),
        }
    }

    /// Number of size buckets currently open.
    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// The block sizes of all open buckets, in ascending order.
    pub fn bucket_sizes(&self) -> Vec<usize> {
        self.buckets.iter().map(|b| b.block_size()).collect()
    }

    /// Allocate `bytes`, routed to the bucket of exactly that block size.
    ///
    /// Opens a new bucket when the size has never been requested before.
    ///
    /// # Panics
    ///
    /// Panics when `bytes` is zero.
    pub fn allocate(&mut self, bytes: usize) -> Result<NonNull<u8>, AllocError> {
        assert!(bytes > 0, "cannot allocate zero bytes");

        let index = self
            .buckets
            .partition_point(|bucket| bucket.block_size() < bytes);
        let hit = self
            .buckets
            .get(index)
            .is_some_and(|bucket| bucket.block_size() == bytes);
        if !hit {
            // Insert at the lower bound to keep the ascending order.
            self.buckets.insert(
                index,
                SlabAllocator::new(self.backing.clone(), self.max_blocks_per_page, bytes),
            );
            tracing::debug!(
                block_size = bytes,
                buckets = self.buckets.len(),
                "matrix opened a new size bucket"
            );
        }
        self.buckets[index].allocate()
    }

    /// Release a block to whichever bucket owns it.
    ///
    /// Total over any pointer; buckets that do not own it ignore it.
    pub fn free(&mut self, ptr: NonNull<u8>) {
        for bucket in &mut self.buckets {
            bucket.free(ptr);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
