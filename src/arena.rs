//! # Arena
//!
//! The arena owns one contiguous anonymous mapping and partitions it into
//! variable-size blocks on demand. Every byte of the region belongs to
//! exactly one block at all times; allocation carves blocks out of the free
//! list and freeing puts them back, eagerly merging address-adjacent free
//! neighbors.
//!
//! ## Region layout
//!
//! ```text
//!   base                                                   base + total_size
//!   │                                                                      │
//!   ▼                                                                      ▼
//!   ┌───────────────┬──────────┬───────────────┬──────────┬───────────────┐
//!   │  free block   │   used   │  free block   │   used   │  free block   │
//!   └───────────────┴──────────┴───────────────┴──────────┴───────────────┘
//!        ▲                          ▲                           ▲
//!        │                          │                           │
//!      root ────── next ────────────┴────────── next ───────────┘
//!                  (free list, strictly ascending addresses)
//! ```
//!
//! Splitting carves the low end of a free block into a used block and leaves
//! the remainder in place on the free list; coalescing reverses it:
//!
//! ```text
//!   alloc(s):  ┌──────────── free, footprint F ────────────┐
//!              ├── used, s + 24 ──┬── free, F - (s+24) ────┤
//!
//!   free(p):   ├── free ──┬─ freed ─┬───── free ───────────┤
//!              └───────── one free block, footprint F ─────┘
//! ```
//!
//! ## Lifecycle
//!
//! One arena per process: [`Arena::init`] succeeds at most once and there is
//! no teardown, the mapping lives until the process exits. The handle holds
//! raw pointers into the region, so it is neither `Send` nor `Sync`; all
//! operations run to completion on the calling thread.

use std::io::{self, Write};
use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};

use libc::{MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE};
use log::debug;

use crate::block::{
  self, FREE_OVERHEAD, Header, MIN_PAYLOAD, USED_HEADER_SIZE, USED_OVERHEAD,
};
use crate::error::ArenaError;
use crate::policy::Policy;
use crate::{align, align_to};

/// Set once the first [`Arena::init`] succeeds; later calls are refused.
static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Effective page size of the running system.
fn page_size() -> usize {
  unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}

/// How a free block relates to a request's used footprint.
enum Fit {
  /// The block cannot hold the request.
  TooSmall,
  /// The block holds the request but the remainder could not host a free
  /// block; the whole block is taken and the slack becomes padding.
  Whole,
  /// The block holds the request plus at least one minimal free block.
  Split,
}

fn classify(
  avail: usize,
  need: usize,
) -> Fit {
  if avail < need {
    Fit::TooSmall
  } else if avail - need < FREE_OVERHEAD {
    Fit::Whole
  } else {
    Fit::Split
  }
}

/// Handle to the process arena. See the module docs for the block layout
/// and lifecycle rules.
pub struct Arena {
  pub(crate) base: *mut u8,
  pub(crate) total_size: usize,
  pub(crate) policy: Policy,
  pub(crate) root: *mut Header,
  pub(crate) cursor: *mut Header,
}

impl Arena {
  /// Maps the region and hands out the process-wide arena handle.
  ///
  /// `size` is the number of usable bytes requested; it is padded by the
  /// free-block overhead and rounded up to a page multiple, so the mapped
  /// region is always somewhat larger. The whole region starts out as a
  /// single free block.
  ///
  /// # Errors
  ///
  /// [`ZeroSize`](ArenaError::ZeroSize) for a zero request,
  /// [`AlreadyInitialized`](ArenaError::AlreadyInitialized) once a previous
  /// call succeeded, [`RegionTooLarge`](ArenaError::RegionTooLarge) when
  /// page rounding would overflow, and
  /// [`MapFailed`](ArenaError::MapFailed) when the operating system refuses
  /// the mapping (the guard is not claimed, such a call may be retried).
  pub fn init(
    size: usize,
    policy: Policy,
  ) -> Result<Arena, ArenaError> {
    if size == 0 {
      debug!("init: zero region size rejected");
      return Err(ArenaError::ZeroSize);
    }
    if INITIALIZED.load(Ordering::SeqCst) {
      debug!("init: arena already initialized");
      return Err(ArenaError::AlreadyInitialized);
    }

    let arena = Arena::create(size, policy)?;
    INITIALIZED.store(true, Ordering::SeqCst);
    Ok(arena)
  }

  /// Maps a region and writes the initial spanning free block, without
  /// touching the single-init guard. `init` is the only public path here;
  /// tests build independent throwaway arenas through this.
  pub(crate) fn create(
    size: usize,
    policy: Policy,
  ) -> Result<Arena, ArenaError> {
    let page = page_size();
    if size > usize::MAX - FREE_OVERHEAD - page {
      debug!("init: region size {size} overflows page rounding");
      return Err(ArenaError::RegionTooLarge);
    }
    let total_size = align_to!(size + FREE_OVERHEAD, page);

    let base = unsafe {
      libc::mmap(
        ptr::null_mut(),
        total_size,
        PROT_READ | PROT_WRITE,
        MAP_PRIVATE | MAP_ANONYMOUS,
        -1,
        0,
      )
    };
    if base == MAP_FAILED {
      return Err(ArenaError::MapFailed(io::Error::last_os_error()));
    }

    let root = base as *mut Header;
    unsafe {
      block::write_header(
        root,
        total_size - FREE_OVERHEAD,
        true,
        ptr::null_mut(),
        ptr::null_mut(),
      );
    }

    Ok(Arena {
      base: base as *mut u8,
      total_size,
      policy,
      root,
      cursor: root,
    })
  }

  /// Length of the mapped region in bytes, always a page multiple.
  pub fn total_size(&self) -> usize {
    self.total_size
  }

  /// The placement policy fixed at init.
  pub fn policy(&self) -> Policy {
    self.policy
  }

  /// Allocates `size` bytes and returns the payload pointer, or null when
  /// the request is zero, oversized, or nothing on the free list fits.
  ///
  /// Requests are rounded up to at least 16 bytes (a freed block must be
  /// able to host its list pointers) and to a multiple of 8, so returned
  /// pointers are always 8-byte aligned.
  ///
  /// # Safety
  ///
  /// The returned memory is uninitialized and only valid until it is passed
  /// to [`free`](Arena::free). The caller must not access more than `size`
  /// bytes through it.
  pub unsafe fn alloc(
    &mut self,
    size: usize,
  ) -> *mut u8 {
    unsafe {
      if size == 0 {
        debug!("alloc: zero-size request rejected");
        return ptr::null_mut();
      }
      if size > self.total_size {
        debug!("alloc: request of {size} bytes exceeds the region");
        return ptr::null_mut();
      }

      let need = align!(size.max(MIN_PAYLOAD));

      let h = self.find_fit(need);
      if h.is_null() {
        debug!("alloc: no free block fits {need} bytes");
        return ptr::null_mut();
      }

      match classify(block::footprint(h), need + USED_OVERHEAD) {
        Fit::TooSmall => unreachable!("placement search returned a non-fitting block"),
        Fit::Whole => self.take_whole(h),
        Fit::Split => self.split(h, need),
      }

      block::payload_of(h)
    }
  }

  /// Takes an entire free block out of the list and marks it used. The
  /// former pointer slots (and any slack below one free-block overhead)
  /// end up as payload padding.
  unsafe fn take_whole(
    &mut self,
    h: *mut Header,
  ) {
    unsafe {
      let succ = self.next_free(h);
      self.remove_free(h);
      block::set_free(h, false);

      if self.cursor == h {
        self.cursor = succ;
      }
    }
  }

  /// Carves the low end of `h` into a used block of payload `need`; the
  /// high end becomes a new free block that takes over `h`'s place in the
  /// free list.
  unsafe fn split(
    &mut self,
    h: *mut Header,
    need: usize,
  ) {
    unsafe {
      let old_footprint = block::footprint(h);
      let old_next = (*h).next;
      let old_prev = (*h).prev;

      block::write_header(h, need, false, ptr::null_mut(), ptr::null_mut());

      let rest = (h as *mut u8).add(need + USED_OVERHEAD) as *mut Header;
      block::write_header(
        rest,
        old_footprint - (need + USED_OVERHEAD) - FREE_OVERHEAD,
        true,
        old_next,
        old_prev,
      );
      assert!(
        block::footprint(h) + block::footprint(rest) == old_footprint,
        "split of a {old_footprint} byte block does not add back up"
      );

      if !old_next.is_null() {
        (*old_next).prev = rest;
      }
      if !old_prev.is_null() {
        (*old_prev).next = rest;
      }
      if self.root == h {
        self.root = rest;
      }
      if self.cursor == h {
        self.cursor = rest;
      }
    }
  }

  /// Releases an allocation. `free(null)` is a no-op.
  ///
  /// The freed block rejoins the free list and is eagerly coalesced with a
  /// free neighbor on either side.
  ///
  /// # Errors
  ///
  /// [`InvalidPointer`](ArenaError::InvalidPointer) when `p` is misaligned,
  /// outside the region, or carries no block header;
  /// [`DoubleFree`](ArenaError::DoubleFree) when the block is already free.
  /// The arena is untouched in both cases.
  ///
  /// # Safety
  ///
  /// `p` must be null or a pointer obtained from [`alloc`](Arena::alloc) on
  /// this arena. A forged pointer that happens to carry the header sentinel
  /// corrupts the allocator.
  pub unsafe fn free(
    &mut self,
    p: *mut u8,
  ) -> Result<(), ArenaError> {
    unsafe {
      if p.is_null() {
        return Ok(());
      }

      // Validate before probing: the magic probe must not read outside the
      // mapping, and headers are only readable at 8-byte offsets.
      let addr = p as usize;
      let base = self.base as usize;
      if addr % 8 != 0 || addr < base + USED_HEADER_SIZE || addr >= base + self.total_size {
        debug!("free: pointer {p:p} is outside the arena or misaligned");
        return Err(ArenaError::InvalidPointer);
      }

      let Some(h) = block::from_payload(p) else {
        debug!("free: no block header behind {p:p}");
        return Err(ArenaError::InvalidPointer);
      };
      if block::is_free(h) {
        debug!("free: double free of {p:p}");
        return Err(ArenaError::DoubleFree);
      }

      block::set_free(h, true);
      self.insert_free(h);

      let h = match self.next_by_address(h) {
        Some(next) if block::is_free(next) => self.merge(h, next),
        _ => h,
      };
      if let Some(prev) = self.prev_by_address(h) {
        if block::is_free(prev) {
          self.merge(prev, h);
        }
      }

      Ok(())
    }
  }

  /// Folds two address-adjacent free blocks into the lower one. Strict
  /// address order makes them list neighbors, so the high block's list
  /// entry just drops out. Returns the survivor.
  unsafe fn merge(
    &mut self,
    low: *mut Header,
    high: *mut Header,
  ) -> *mut Header {
    unsafe {
      assert!(
        (*low).next == high && (*high).prev == low,
        "coalescing blocks {low:p} and {high:p} which are not list neighbors"
      );

      let merged = block::footprint(low) + block::footprint(high) - FREE_OVERHEAD;
      let next = (*high).next;

      (*low).tag = block::make_tag(merged, true);
      (*low).next = next;
      if !next.is_null() {
        (*next).prev = low;
      }
      block::set_footer(low);

      if self.cursor == high {
        self.cursor = low;
      }
      low
    }
  }

  /// Writes the free list to standard output, one block per line:
  ///
  /// ```text
  /// <index>\t<header address>\t<payload size>\t<free flag>
  /// ```
  ///
  /// Lines appear in address order and the flag is always 1. Never fails;
  /// write errors on stdout are discarded.
  pub fn dump(&self) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let _ = self.dump_to(&mut out);
    let _ = out.flush();
  }

  /// [`dump`](Arena::dump) into an arbitrary writer.
  pub fn dump_to<W: Write>(
    &self,
    out: &mut W,
  ) -> io::Result<()> {
    let mut h = self.root;
    let mut index = 0;

    while !h.is_null() {
      unsafe {
        writeln!(
          out,
          "{}\t{:p}\t{}\t{}",
          index,
          h,
          block::payload_size(h),
          block::is_free(h) as u8,
        )?;
        h = self.next_free(h);
      }
      index += 1;
    }
    Ok(())
  }

  /// Steps to the block that starts where `h` ends, or none at the region
  /// end.
  pub(crate) unsafe fn next_by_address(
    &self,
    h: *mut Header,
  ) -> Option<*mut Header> {
    unsafe {
      block::assert_magic(h);
      let end = self.base as usize + self.total_size;
      let next = h as usize + block::footprint(h);
      assert!(next <= end, "block at {h:p} runs past the region end");
      if next == end {
        return None;
      }

      let next = next as *mut Header;
      block::assert_magic(next);
      Some(next)
    }
  }

  /// Steps backward over the preceding block's footer, or none at `base`.
  pub(crate) unsafe fn prev_by_address(
    &self,
    h: *mut Header,
  ) -> Option<*mut Header> {
    unsafe {
      block::assert_magic(h);
      if h as usize == self.base as usize {
        return None;
      }

      let tag = *block::prev_footer(h);
      let prev = (h as *mut u8).sub(block::footprint_from_tag(tag)) as *mut Header;
      block::assert_magic(prev);
      Some(prev)
    }
  }
}

#[cfg(test)]
pub(crate) mod checks {
  //! Structural assertions shared by the test suites. `check_arena` is run
  //! after every mutation in the scenario and randomized tests.

  use super::Arena;
  use crate::block::{self, Header};

  /// Walks every block by address and the free list by links, asserting:
  /// magic everywhere, header/footer agreement, full coverage of the
  /// region, 8-byte payload alignment, no adjacent free blocks, and a free
  /// list that is strictly address-ordered and lists exactly the free
  /// blocks.
  pub fn check_arena(arena: &Arena) {
    unsafe {
      let base = arena.base as usize;
      let end = base + arena.total_size;

      let mut free_blocks = Vec::new();
      let mut covered = 0;
      let mut prev_free = false;
      let mut at = base;

      while at < end {
        let h = at as *mut Header;
        assert!(block::has_magic(h), "missing magic at {h:p}");

        let footprint = block::footprint(h);
        assert_eq!((*h).tag, *block::footer_of(h), "header/footer mismatch at {h:p}");
        assert_eq!(block::payload_size(h) % 8, 0, "misaligned payload size at {h:p}");

        let free = block::is_free(h);
        assert!(!(free && prev_free), "adjacent free blocks at {h:p}");
        if free {
          free_blocks.push(h);
        }

        prev_free = free;
        covered += footprint;
        at += footprint;
      }
      assert_eq!(covered, arena.total_size, "blocks do not cover the region");

      let mut listed = Vec::new();
      let mut h = arena.root;
      while !h.is_null() {
        assert!(block::is_free(h), "used block {h:p} on the free list");
        match listed.last() {
          Some(&last) => {
            assert!((last as usize) < h as usize, "free list out of order at {h:p}");
            assert_eq!((*h).prev, last, "broken back link at {h:p}");
          }
          None => assert!((*h).prev.is_null(), "root {h:p} has a predecessor"),
        }
        listed.push(h);
        h = (*h).next;
      }
      assert_eq!(listed, free_blocks, "free list does not match the free blocks");

      assert!(
        arena.cursor.is_null() || listed.contains(&arena.cursor),
        "cursor does not rest on a free block"
      );
    }
  }

  /// Free-list headers in list order.
  pub fn free_headers(arena: &Arena) -> Vec<*mut Header> {
    let mut list = Vec::new();
    let mut h = arena.root;
    while !h.is_null() {
      list.push(h);
      h = unsafe { (*h).next };
    }
    list
  }

  /// Payload sizes on the free list in list order.
  pub fn free_sizes(arena: &Arena) -> Vec<usize> {
    free_headers(arena)
      .into_iter()
      .map(|h| unsafe { block::payload_size(h) })
      .collect()
  }

  /// Total payload capacity currently on the free list.
  pub fn free_capacity(arena: &Arena) -> usize {
    free_sizes(arena).iter().sum()
  }
}
