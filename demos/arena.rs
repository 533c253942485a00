use arenalloc::{Arena, Policy};

/// Prints the free list with a caption so the walkthrough below reads as a
/// narrative.
fn show(
  label: &str,
  arena: &Arena,
) {
  println!("--- free list {label} ---");
  arena.dump();
}

fn main() {
  // Rejected operations log one diagnostic line each; run with
  // RUST_LOG=debug to see them.
  env_logger::init();

  let mut arena = Arena::init(1, Policy::FirstFit).expect("arena init");
  println!(
    "Mapped {} bytes, policy {:?}",
    arena.total_size(),
    arena.policy(),
  );
  show("after init", &arena);

  unsafe {
    // --------------------------------------------------------------------
    // 1) Carve three blocks off the front of the arena.
    // --------------------------------------------------------------------
    let a = arena.alloc(64);
    let b = arena.alloc(200);
    let c = arena.alloc(64);
    println!("\n[1] Allocated a = {a:?}, b = {b:?}, c = {c:?}");
    show("after three allocations", &arena);

    // Write something into b to show the memory is usable.
    b.write_bytes(0xAB, 200);
    println!("[1] Filled b with 0xAB");

    // --------------------------------------------------------------------
    // 2) Free the middle block. It cannot merge with either used
    //    neighbor, so a hole appears in the free list.
    // --------------------------------------------------------------------
    arena.free(b).unwrap();
    println!("\n[2] Freed b");
    show("with a hole at b", &arena);

    // --------------------------------------------------------------------
    // 3) A small request reuses the hole (first fit), splitting it.
    // --------------------------------------------------------------------
    let d = arena.alloc(64);
    println!("\n[3] Allocated d = {d:?} (reused the hole: {})", d == b);
    show("after reusing the hole", &arena);

    // --------------------------------------------------------------------
    // 4) Free everything. Coalescing folds the arena back into a single
    //    spanning free block.
    // --------------------------------------------------------------------
    arena.free(a).unwrap();
    arena.free(d).unwrap();
    arena.free(c).unwrap();
    println!("\n[4] Freed a, d, c");
    show("after coalescing back to one block", &arena);

    // --------------------------------------------------------------------
    // 5) Error paths: every rejected operation reports instead of
    //    corrupting the arena.
    // --------------------------------------------------------------------
    println!("\n[5] alloc(0)           -> {:?}", arena.alloc(0));
    println!("[5] free(a) twice      -> {:?}", arena.free(a));
    println!("[5] free(interior ptr) -> {:?}", arena.free(a.wrapping_add(10)));
  }

  println!("\nDone. The mapping is released when the process exits.");
}
