//! The address-ordered doubly-linked free list.
//!
//! Link fields live inside the free blocks themselves (the `next` and
//! `prev` words of the free header); the arena only stores `root`, the
//! lowest-address free block. Strict address order is what lets coalescing
//! assume that two address-adjacent free blocks are also list neighbors.

use std::ptr;

use crate::arena::Arena;
use crate::block::{self, Header};

impl Arena {
  /// Follows a block's free-list link, checking the sentinel on the way.
  pub(crate) unsafe fn next_free(
    &self,
    h: *mut Header,
  ) -> *mut Header {
    unsafe {
      block::assert_magic(h);
      let next = (*h).next;
      if !next.is_null() {
        block::assert_magic(next);
      }
      next
    }
  }

  /// Links a free block into the list at its address position.
  ///
  /// The link fields of `h` are stale here, so its neighbors are found
  /// through the boundary tags instead: scan backward for the nearest free
  /// predecessor and splice in behind it, otherwise scan forward for the
  /// nearest free successor and splice in before it.
  pub(crate) unsafe fn insert_free(
    &mut self,
    h: *mut Header,
  ) {
    unsafe {
      block::assert_magic(h);

      if self.root.is_null() {
        (*h).next = ptr::null_mut();
        (*h).prev = ptr::null_mut();
        self.root = h;
        return;
      }

      let mut before = self.prev_by_address(h);
      while let Some(pred) = before {
        if block::is_free(pred) {
          self.insert_after(h, pred);
          return;
        }
        before = self.prev_by_address(pred);
      }

      let mut after = self.next_by_address(h);
      while let Some(succ) = after {
        if block::is_free(succ) {
          self.insert_before(h, succ);
          return;
        }
        after = self.next_by_address(succ);
      }

      // A non-empty free list always has a member reachable by address scan.
      unreachable!("free list root {:p} unreachable from {:p}", self.root, h);
    }
  }

  /// Unlinks a free block, patching the list and `root`.
  pub(crate) unsafe fn remove_free(
    &mut self,
    h: *mut Header,
  ) {
    unsafe {
      block::assert_magic(h);
      let prev = (*h).prev;
      let next = (*h).next;

      if !next.is_null() {
        block::assert_magic(next);
        (*next).prev = prev;
      }
      if !prev.is_null() {
        block::assert_magic(prev);
        (*prev).next = next;
      }

      if self.root == h {
        self.root = next;
      }
    }
  }

  unsafe fn insert_after(
    &mut self,
    h: *mut Header,
    pred: *mut Header,
  ) {
    unsafe {
      let succ = (*pred).next;
      (*h).next = succ;
      if !succ.is_null() {
        (*succ).prev = h;
      }
      (*pred).next = h;
      (*h).prev = pred;
    }
  }

  unsafe fn insert_before(
    &mut self,
    h: *mut Header,
    succ: *mut Header,
  ) {
    unsafe {
      let pred = (*succ).prev;
      (*h).prev = pred;
      if !pred.is_null() {
        (*pred).next = h;
      }
      (*succ).prev = h;
      (*h).next = succ;

      if self.root == succ {
        self.root = h;
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use crate::arena::Arena;
  use crate::arena::checks::free_headers;
  use crate::policy::Policy;

  /// Arena with six used blocks and a free tail remainder.
  fn arena_with_blocks() -> (Arena, Vec<*mut u8>) {
    let mut arena = Arena::create(10000, Policy::FirstFit).unwrap();
    let ptrs = (0..6)
      .map(|_| unsafe { arena.alloc(256) })
      .collect::<Vec<_>>();
    assert!(ptrs.iter().all(|p| !p.is_null()));
    (arena, ptrs)
  }

  #[test]
  fn sole_free_block_is_the_root() {
    let arena = Arena::create(1, Policy::FirstFit).unwrap();
    let list = free_headers(&arena);

    assert_eq!(list.len(), 1);
    assert_eq!(list[0] as usize, arena.base as usize);
  }

  #[test]
  fn insert_keeps_strict_address_order() {
    let (mut arena, ptrs) = arena_with_blocks();

    // Free out of address order; none of these are adjacent to each other
    // or to the free tail remainder.
    for i in [4, 0, 2] {
      unsafe { arena.free(ptrs[i]).unwrap() };
    }

    let list = free_headers(&arena);
    assert_eq!(list.len(), 4); // three freed blocks plus the tail remainder
    for pair in list.windows(2) {
      assert!((pair[0] as usize) < pair[1] as usize);
    }
  }

  #[test]
  fn freeing_the_lowest_block_moves_the_root() {
    let (mut arena, ptrs) = arena_with_blocks();

    let root_before = free_headers(&arena)[0];
    unsafe { arena.free(ptrs[0]).unwrap() };

    let root_after = free_headers(&arena)[0];
    assert!((root_after as usize) < root_before as usize);
  }

  #[test]
  fn remove_then_insert_is_the_identity() {
    let (mut arena, ptrs) = arena_with_blocks();
    unsafe {
      arena.free(ptrs[0]).unwrap();
      arena.free(ptrs[2]).unwrap();
    }

    let before = free_headers(&arena);
    assert_eq!(before.len(), 3);
    let mid = before[1];

    unsafe {
      arena.remove_free(mid);
      assert_eq!(free_headers(&arena), vec![before[0], before[2]]);

      arena.insert_free(mid);
      assert_eq!(free_headers(&arena), before);
    }
  }

  #[test]
  fn removing_the_root_promotes_its_successor() {
    let (mut arena, ptrs) = arena_with_blocks();
    unsafe {
      arena.free(ptrs[0]).unwrap();
      arena.free(ptrs[2]).unwrap();
    }

    let before = free_headers(&arena);
    unsafe {
      arena.remove_free(before[0]);
    }

    let after = free_headers(&arena);
    assert_eq!(after, &before[1..]);
  }
}
