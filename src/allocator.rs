//! Pluggable allocation strategy for buffer storage.
//!
//! Buffers allocate their storage through the [`Allocator`] installed
//! on their [`Context`](crate::Context); the default is the global Rust
//! allocator via [`SystemAllocator`]. A buffer keeps a handle to the
//! strategy that produced its storage and returns the storage to that
//! same strategy when the last buffer handle is dropped, so storage from
//! one strategy can never be freed by another.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

/// Storage allocation strategy.
///
/// `allocate` and `release` are a matched pair: every region handed out
/// by `allocate` comes back through `release` exactly once, when the
/// last handle to the owning buffer is dropped. Implementations that
/// pool or track storage can rely on that pairing.
pub trait Allocator {
    /// Produce a zero-filled region of exactly `bytes` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the strategy cannot produce the region.
    /// Buffer construction propagates the failure; there is no retry and
    /// no fallback strategy.
    fn allocate(&self, bytes: usize) -> Result<Vec<u8>, AllocError>;

    /// Take back a region previously produced by [`allocate`](Self::allocate).
    fn release(&self, storage: Vec<u8>);
}

/// Default strategy: the global Rust allocator.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemAllocator;

impl Allocator for SystemAllocator {
    fn allocate(&self, bytes: usize) -> Result<Vec<u8>, AllocError> {
        Ok(vec![0u8; bytes])
    }

    fn release(&self, storage: Vec<u8>) {
        drop(storage);
    }
}

/// The allocation strategy could not produce the requested region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocError {
    /// Requested size in bytes.
    pub bytes: usize,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "allocation of {} bytes failed", self.bytes)
    }
}

impl core::error::Error for AllocError {}
