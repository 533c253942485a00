//! Placement policies.
//!
//! Each search walks the free list and returns a candidate block whose
//! footprint covers the request's used footprint, or null when nothing
//! fits. The walk order is what distinguishes the policies:
//!
//! ```text
//!   first-fit   root ──► ... take the first block that fits
//!   next-fit    cursor ─► ... ─► end ─► root ─► ... one full cycle
//!   best-fit    whole list, keep the tightest fit
//!   worst-fit   whole list, keep the loosest fit
//! ```

use std::ptr;

use crate::arena::Arena;
use crate::block::{self, Header, USED_OVERHEAD};

/// Placement strategy, fixed per arena at init.
///
/// The numeric codes are stable and accepted by [`Policy::from_code`] for
/// callers that configure the allocator from an integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Policy {
  /// Fitting block with the least space left over; ties go to the lowest
  /// address.
  BestFit = 0,
  /// Fitting block with the most space left over; ties go to the lowest
  /// address.
  WorstFit = 1,
  /// First fitting block in address order.
  FirstFit = 2,
  /// First fitting block at or after the cursor, wrapping past the end of
  /// the list.
  NextFit = 3,
}

impl Policy {
  /// Maps a stable numeric code to its policy.
  pub fn from_code(code: i32) -> Option<Policy> {
    match code {
      0 => Some(Policy::BestFit),
      1 => Some(Policy::WorstFit),
      2 => Some(Policy::FirstFit),
      3 => Some(Policy::NextFit),
      _ => None,
    }
  }
}

/// A block fits when its footprint covers the used footprint of the
/// (already rounded) request.
unsafe fn fits(
  h: *mut Header,
  need: usize,
) -> bool {
  unsafe { block::footprint(h) >= need + USED_OVERHEAD }
}

impl Arena {
  /// Runs the arena's placement search for a rounded payload request.
  pub(crate) unsafe fn find_fit(
    &self,
    need: usize,
  ) -> *mut Header {
    unsafe {
      match self.policy {
        Policy::BestFit => self.best_fit(need),
        Policy::WorstFit => self.worst_fit(need),
        Policy::FirstFit => self.first_fit(need),
        Policy::NextFit => self.next_fit(need),
      }
    }
  }

  unsafe fn first_fit(
    &self,
    need: usize,
  ) -> *mut Header {
    unsafe {
      let mut h = self.root;
      while !h.is_null() {
        if fits(h, need) {
          return h;
        }
        h = self.next_free(h);
      }
      h
    }
  }

  /// Starts where the last successful search began instead of at the root.
  /// The cursor may be null after its block was consumed with no list
  /// successor; the search then degenerates to a root start.
  unsafe fn next_fit(
    &self,
    need: usize,
  ) -> *mut Header {
    unsafe {
      let start = if self.cursor.is_null() {
        self.root
      } else {
        self.cursor
      };
      if start.is_null() {
        return ptr::null_mut();
      }

      let mut h = start;
      loop {
        if fits(h, need) {
          return h;
        }
        h = self.next_free(h);
        if h.is_null() {
          h = self.root;
        }
        if h == start {
          return ptr::null_mut();
        }
      }
    }
  }

  unsafe fn best_fit(
    &self,
    need: usize,
  ) -> *mut Header {
    unsafe {
      let mut best = ptr::null_mut();
      let mut best_slack = usize::MAX;

      let mut h = self.root;
      while !h.is_null() {
        if fits(h, need) {
          let slack = block::footprint(h) - (need + USED_OVERHEAD);
          if slack < best_slack {
            best_slack = slack;
            best = h;
          }
        }
        h = self.next_free(h);
      }
      best
    }
  }

  unsafe fn worst_fit(
    &self,
    need: usize,
  ) -> *mut Header {
    unsafe {
      let mut worst: *mut Header = ptr::null_mut();
      let mut worst_slack = 0;

      let mut h = self.root;
      while !h.is_null() {
        if fits(h, need) {
          let slack = block::footprint(h) - (need + USED_OVERHEAD);
          if worst.is_null() || slack > worst_slack {
            worst_slack = slack;
            worst = h;
          }
        }
        h = self.next_free(h);
      }
      worst
    }
  }
}
