//! # arenalloc - A Free-List Memory Allocator Library
//!
//! This crate provides an explicit **free-list allocator** over a single
//! anonymous memory mapping, with four selectable placement policies:
//! first-fit, next-fit, best-fit, and worst-fit.
//!
//! ## Overview
//!
//! The allocator asks the operating system for one contiguous region at
//! init time and never again. Every byte of that region belongs to exactly
//! one block; allocation carves blocks out, freeing puts them back and
//! immediately merges free neighbors:
//!
//! ```text
//!   Arena Concept:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                     ANONYMOUS MAPPING (fixed size)                   │
//!   │                                                                      │
//!   │   ┌────────┬─────┬───────────┬─────┬─────────────────────────────┐   │
//!   │   │ free   │ A1  │ free      │ A2  │ free                        │   │
//!   │   └────────┴─────┴───────────┴─────┴─────────────────────────────┘   │
//!   │       ▲              ▲                  ▲                            │
//!   │       │              │                  │                            │
//!   │     root ── next ────┴───── next ───────┘                            │
//!   │              (address-ordered doubly-linked free list)               │
//!   │                                                                      │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   Allocation walks the free list; the policy decides which fit wins.
//! ```
//!
//! ## Block Layout
//!
//! Block metadata lives in-band. Each block carries a header at its start
//! and duplicates its boundary tag in a footer at its end, so both
//! neighbors of any block can be reached in constant time:
//!
//! ```text
//!   ┌──────────────────┬─────────────────────────┬──────────┐
//!   │   Header         │      Payload            │  Footer  │
//!   ├──────────────────┼─────────────────────────┼──────────┤
//!   │ tag   (8 B)      │                         │ tag copy │
//!   │ magic (8 B)      │   [    size bytes   ]   │  (8 B)   │
//!   │ next* (8 B)      │                         │          │
//!   │ prev* (8 B)      │                         │          │
//!   └──────────────────┴─────────────────────────┴──────────┘
//!                       * free blocks only: a used block hands
//!                         these 16 bytes to the payload
//! ```
//!
//! The free flag rides in bit 0 of the tag (payload sizes are multiples of
//! 8). Freeing a block shrinks its payload by 16 bytes to make room for the
//! list pointers; allocating grows it back. The block's total footprint
//! never changes across that flip.
//!
//! ## Crate Structure
//!
//! ```text
//!   arenalloc
//!   ├── align      - Alignment macros (align!, align_to!)
//!   ├── arena      - Arena handle: init, alloc, free, dump
//!   ├── block      - In-band header/footer layout (internal)
//!   ├── error      - ArenaError
//!   ├── free_list  - Address-ordered free list (internal)
//!   └── policy     - Placement policies
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use arenalloc::{Arena, Policy};
//!
//! fn main() {
//!     let mut arena = Arena::init(4096, Policy::FirstFit).unwrap();
//!
//!     unsafe {
//!         let p = arena.alloc(64);
//!         assert!(!p.is_null());
//!
//!         // Use the memory.
//!         p.write_bytes(0xAB, 64);
//!
//!         arena.free(p).unwrap();
//!     }
//!
//!     // Print the free list to stdout.
//!     arena.dump();
//! }
//! ```
//!
//! ## Limitations
//!
//! - **Single arena**: `init` succeeds once per process; the mapping is
//!   released only at process exit.
//! - **Single-threaded only**: the handle is neither `Send` nor `Sync`.
//! - **No reallocation**: grow/shrink of live allocations is not provided.
//! - **8-byte alignment only**: payloads are aligned to 8 bytes, never more.
//! - **Unix-only**: the region comes from `mmap` via `libc`.
//!
//! ## Safety
//!
//! `alloc` and `free` are `unsafe`: they deal in raw payload pointers with
//! C-style ownership rules. Callers must not use a pointer after freeing
//! it and must only pass pointers obtained from this arena. Diagnostic
//! messages for rejected operations are emitted through the [`log`] facade.

pub mod align;
mod arena;
mod block;
mod error;
mod free_list;
mod policy;

pub use arena::Arena;
pub use error::ArenaError;
pub use policy::Policy;
