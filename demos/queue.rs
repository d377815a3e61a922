use std::cell::Cell;

use rcontainer::{AllocError, ArenaAllocator, Queue, WithErrorHandler, defer};

/// Prints the raw cursors next to the items in ring order.
fn show(
  label: &str,
  queue: &Queue<u32, impl rcontainer::Allocator>,
) {
  println!(
    "[{}] capacity = {}, head = {}, tail = {}, state = {:?}, items = {:?}",
    label,
    queue.capacity(),
    queue.head(),
    queue.tail(),
    queue.state(),
    queue.iter().collect::<Vec<_>>(),
  );
}

fn main() {
  let _bye = defer(|| println!("\n[end] queues dropped, arena released"));

  // --------------------------------------------------------------------
  // 1) A queue on the default allocator. Fill it, then wrap the cursors.
  // --------------------------------------------------------------------
  let mut queue = Queue::with_capacity(4).expect("default allocator");

  for item in 1..=4 {
    let _ = queue.push(item);
  }
  show("1: full", &queue);

  let popped = queue.pop();
  println!("[1] popped {:?}", popped);
  let _ = queue.push(5);
  show("1: wrapped and full again", &queue);

  // --------------------------------------------------------------------
  // 2) Grow while wrapped. The run at the front moves into the new slots.
  // --------------------------------------------------------------------
  queue.grow_by(3).expect("grow");
  show("2: grown", &queue);

  // --------------------------------------------------------------------
  // 3) Shrink. Whatever lived in the removed slots is gone, and the
  //    clamped head parks on the full sentinel.
  // --------------------------------------------------------------------
  queue.shrink_by(4).expect("shrink");
  show("3: shrunk", &queue);

  // --------------------------------------------------------------------
  // 4) A queue inside a small arena, with a failure callback.
  // --------------------------------------------------------------------
  let arena = ArenaAllocator::new(256).expect("arena region");
  let failures = Cell::new(0);
  let alloc = WithErrorHandler::new(&arena, |error: &AllocError| {
    failures.set(failures.get() + 1);
    println!("[4] allocator reported: {error}");
  });

  let mut bounded = Queue::with_capacity_in(8, &alloc).expect("fits in arena");
  for item in 10..14 {
    let _ = bounded.push(item);
  }
  println!("[4] arena used = {} of {} bytes", arena.used(), arena.capacity());

  match bounded.grow_by(1024) {
    Ok(()) => println!("[4] unexpectedly grew"),
    Err(error) => println!("[4] grow failed: {error}, failures = {}", failures.get()),
  }
  show("4: unchanged after failure", &bounded);
}
