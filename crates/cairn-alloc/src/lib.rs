//! Cairn Alloc -- the layered memory subsystem of the Cairn engine.
//!
//! Memory flows through three layers. At the bottom, a [`PageAllocator`]
//! hands out large max-aligned buffers straight from the system allocator.
//! On top of that, a [`SlabAllocator`] turns each buffer into a page of
//! equally sized blocks and grows page by page. At the top, a
//! [`MatrixAllocator`] multiplexes one slab per block size so callers can
//! allocate arbitrary sizes while every block still comes from a
//! fixed-block page.
//!
//! The crate also provides [`RegionAllocator`], a general-purpose
//! sub-allocator over a caller-owned window with out-of-line bookkeeping.
//! It backs the per-entity inline component storage in `cairn-world`.
//!
//! # Quick Start
//!
//! ```
//! use cairn_alloc::prelude::*;
//!
//! let mut matrix = MatrixAllocator::new(SystemPages, 64);
//!
//! let a = matrix.allocate(48).unwrap();
//! let b = matrix.allocate(48).unwrap();
//! assert_eq!(matrix.bucket_count(), 1);
//!
//! matrix.free(a);
//! matrix.free(b);
//! ```
//!
//! Everything here is single-threaded by design; callers serialize access
//! externally.

#![deny(unsafe_code)]

#[allow(unsafe_code)]
pub mod freelist;
pub mod matrix;
#[allow(unsafe_code)]
pub mod raw;
#[allow(unsafe_code)]
pub mod region;
#[allow(unsafe_code)]
pub mod slab;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by the allocator stack.
///
/// Contract violations (zero sizes, non-power-of-two alignments) are not
/// errors -- they panic immediately. Only conditions the caller can react to
/// are surfaced here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    /// The backing page allocator returned null while growing a slab.
    #[error("backing allocator returned null for a page of {bytes} bytes")]
    OutOfMemory {
        bytes: usize,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::freelist::{FreeList, PER_ALLOC_OVERHEAD};
    pub use crate::matrix::MatrixAllocator;
    pub use crate::raw::{align_up, PageAllocator, SystemPages, MAX_SCALAR_ALIGN};
    pub use crate::region::RegionAllocator;
    pub use crate::slab::SlabAllocator;
    pub use crate::AllocError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
