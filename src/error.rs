use std::io;

use thiserror::Error;

/// Failures reported by the public allocator operations.
///
/// Exhaustion (no free block fits a request) is not an error; `alloc`
/// signals it with a null pointer.
#[derive(Debug, Error)]
pub enum ArenaError {
  /// `init` was called with a region size of zero.
  #[error("region size must be at least one byte")]
  ZeroSize,

  /// A previous `init` already succeeded in this process.
  #[error("the allocator is already initialized")]
  AlreadyInitialized,

  /// Rounding the requested region size up to a page multiple overflowed.
  #[error("requested region size is too large")]
  RegionTooLarge,

  /// The operating system refused the anonymous mapping.
  #[error("anonymous mapping failed")]
  MapFailed(#[source] io::Error),

  /// The pointer handed to `free` does not name a live allocation.
  #[error("pointer does not belong to a live allocation")]
  InvalidPointer,

  /// The pointer handed to `free` resolves to a block that is already free.
  #[error("block is already free")]
  DoubleFree,
}
