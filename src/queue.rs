//! Circular queue stored in an [`Array`].
//!
//! The ring's write cursor (`head`) is the array's occupancy and the read
//! cursor (`tail`) is kept alongside. No item counter is stored: the three
//! states are told apart by index comparison alone.
//!
//! ```text
//!   Available (not wrapped)          Available (wrapped)
//!   ┌───┬───┬───┬───┬───┬───┐       ┌───┬───┬───┬───┬───┬───┐
//!   │   │ a │ b │ c │   │   │       │ d │ e │   │   │ a │ b │ ...
//!   └───┴───┴───┴───┴───┴───┘       └───┴───┴───┴───┴───┴───┘
//!         ▲tail       ▲head                 ▲head   ▲tail
//!
//!   Empty:  head == tail
//!   Full:   head == capacity   (sentinel, outside the slot range)
//! ```
//!
//! A capacity of zero gives the null queue, which is empty and full at once.

use std::fmt;

use crate::{
  alloc::{Allocator, DefaultAllocator},
  array::Array,
  error::Result,
};

/// Decoded form of the raw `(head, tail, capacity)` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingState {
  /// `head == tail`. The null queue also decodes as empty.
  Empty,
  /// `head == capacity`; every slot holds an item.
  Full,
  /// Both cursors inside `[0, capacity)` and distinct.
  Available { head: usize, tail: usize },
}

pub struct Queue<T, A: Allocator = DefaultAllocator> {
  buffer: Array<T, A>,
  tail: usize,
}

impl<T: Copy + Default> Queue<T> {
  /// The null queue on the default allocator.
  pub fn new() -> Self {
    Self::new_in(DefaultAllocator)
  }

  pub fn with_capacity(capacity: usize) -> Result<Self> {
    Self::with_capacity_in(capacity, DefaultAllocator)
  }
}

impl<T: Copy + Default> Default for Queue<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Copy, A: Allocator> Queue<T, A> {
  pub fn new_in(alloc: A) -> Self {
    Self {
      buffer: Array::new_in(alloc),
      tail: 0,
    }
  }

  /// Enqueues `item` at the head.
  ///
  /// A full queue (the null queue included) keeps its state and hands the
  /// item back.
  pub fn push(
    &mut self,
    item: T,
  ) -> std::result::Result<(), T> {
    if self.is_full() {
      return Err(item);
    }

    let capacity = self.capacity();
    let head = self.head();

    unsafe { self.buffer.write_slot(head, item) };

    let next = (head + 1) % capacity;
    self.buffer.set_occupancy(if next == self.tail { capacity } else { next });

    Ok(())
  }

  /// Dequeues the oldest item, or `None` when empty.
  pub fn pop(&mut self) -> Option<T> {
    let tail = self.tail;

    let item = match self.state() {
      RingState::Empty => return None,
      RingState::Full => {
        let item = unsafe { self.buffer.read_slot(tail) };
        self.buffer.set_occupancy(tail);
        item
      }
      RingState::Available { .. } => unsafe { self.buffer.read_slot(tail) },
    };

    self.tail = (tail + 1) % self.capacity();

    Some(item)
  }

  /// The oldest item without removing it.
  pub fn peek(&self) -> Option<&T> {
    match self.state() {
      RingState::Empty => None,
      _ => Some(unsafe { self.buffer.slot_ref(self.tail) }),
    }
  }

  /// Removes `amount` slots from the end of the block.
  ///
  /// Items stored in the removed slots are lost; nothing is relocated. The
  /// write cursor is clamped to the new capacity, so a run that reached the
  /// new end reads as full and takes in whatever the slots before the read
  /// cursor hold. When the read cursor falls in the removed range it restarts
  /// at 0, and if the write cursor was there too the queue ends up empty.
  /// Shrinking by the whole capacity gives the null queue; by more, an error
  /// and no change.
  pub fn shrink_by(
    &mut self,
    amount: usize,
  ) -> Result<()> {
    self.buffer.shrink_by(amount)?;

    let new_capacity = self.capacity();
    if new_capacity == 0 {
      self.tail = 0;
      return Ok(());
    }

    let head = self.head();

    if self.tail >= new_capacity {
      tracing::trace!(tail = self.tail, head, new_capacity, "queue read cursor truncated");
      self.tail = 0;
      if head >= new_capacity {
        self.buffer.set_occupancy(0);
      }
    }

    Ok(())
  }

  pub fn iter(&self) -> Iter<'_, T, A> {
    Iter {
      queue: self,
      index: self.tail,
      remaining: self.len(),
    }
  }

  /// Live slots as `(index, item)` in ring order.
  fn slots(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
    let capacity = self.capacity();
    let tail = self.tail;
    self
      .iter()
      .enumerate()
      .map(move |(offset, item)| ((tail + offset) % capacity, item))
  }
}

impl<T: Copy + Default, A: Allocator> Queue<T, A> {
  /// An empty queue with room for `capacity` items. Zero gives the null
  /// queue.
  pub fn with_capacity_in(
    capacity: usize,
    alloc: A,
  ) -> Result<Self> {
    Ok(Self {
      buffer: Array::with_capacity_in(capacity, alloc)?,
      tail: 0,
    })
  }

  /// Independent copy with the same capacity, cursors and items.
  pub fn try_clone(&self) -> Result<Self>
  where
    A: Clone,
  {
    let mut buffer = Array::with_capacity_in(self.capacity(), self.buffer.allocator().clone())?;

    for (index, item) in self.slots() {
      unsafe { buffer.write_slot(index, *item) };
    }
    buffer.set_occupancy(self.head());

    Ok(Self {
      buffer,
      tail: self.tail,
    })
  }

  /// Adds `amount` slots while keeping every item and its order.
  ///
  /// When the live items wrap past the end of the old block, the run stored
  /// at the front is moved into the new slots so the items stay contiguous in
  /// ring order. If the new slots cannot take the whole run, the rest is
  /// shifted down to index 0. On failure the queue is unchanged.
  pub fn grow_by(
    &mut self,
    amount: usize,
  ) -> Result<()> {
    if amount == 0 {
      return Ok(());
    }

    let old_capacity = self.capacity();
    let tail = self.tail;

    // Write cursor as a slot index; a full ring would write at `tail`.
    let (cursor, wrapped, full) = match self.state() {
      RingState::Empty => (self.head(), false, false),
      RingState::Full => (tail, tail > 0, true),
      RingState::Available { head, tail } => (head, head < tail, false),
    };

    self.buffer.grow_by(amount)?;

    let new_capacity = self.capacity();

    if wrapped {
      let moved = cursor.min(amount);
      unsafe {
        self.buffer.copy_slots(0, old_capacity, moved);
        self.buffer.copy_slots(moved, 0, cursor - moved);
      }

      let head = if cursor > amount {
        cursor - amount
      } else {
        (old_capacity + cursor) % new_capacity
      };
      self.buffer.set_occupancy(head);

      tracing::trace!(moved, shifted = cursor - moved, head, tail, "queue wraparound repaired");
    } else if full {
      self.buffer.set_occupancy(old_capacity);
    }

    Ok(())
  }
}

impl<T, A: Allocator> Queue<T, A> {
  pub fn capacity(&self) -> usize {
    self.buffer.capacity()
  }

  /// Raw write cursor; equals `capacity()` when full.
  pub fn head(&self) -> usize {
    self.buffer.occupancy()
  }

  /// Raw read cursor.
  pub fn tail(&self) -> usize {
    self.tail
  }

  pub fn state(&self) -> RingState {
    let head = self.head();
    let tail = self.tail;

    if head == tail {
      RingState::Empty
    } else if head == self.capacity() {
      RingState::Full
    } else {
      RingState::Available { head, tail }
    }
  }

  pub fn is_empty(&self) -> bool {
    self.head() == self.tail
  }

  pub fn is_full(&self) -> bool {
    self.head() == self.capacity()
  }

  /// Number of queued items.
  pub fn len(&self) -> usize {
    match self.state() {
      RingState::Empty => 0,
      RingState::Full => self.capacity(),
      RingState::Available { head, tail } if head > tail => head - tail,
      RingState::Available { head, tail } => self.capacity() - tail + head,
    }
  }

  /// Drops every item, keeping the block.
  pub fn clear(&mut self) {
    self.buffer.set_occupancy(0);
    self.tail = 0;
  }

  pub fn allocator(&self) -> &A {
    self.buffer.allocator()
  }

  /// Releases the block and returns to the null queue. Idempotent.
  pub fn destroy(&mut self) {
    self.buffer.destroy();
    self.tail = 0;
  }
}

/// Items of a [`Queue`] from oldest to newest.
pub struct Iter<'a, T, A: Allocator> {
  queue: &'a Queue<T, A>,
  index: usize,
  remaining: usize,
}

impl<'a, T: Copy, A: Allocator> Iterator for Iter<'a, T, A> {
  type Item = &'a T;

  fn next(&mut self) -> Option<Self::Item> {
    if self.remaining == 0 {
      return None;
    }

    let item = unsafe { self.queue.buffer.slot_ref(self.index) };
    self.index = (self.index + 1) % self.queue.capacity();
    self.remaining -= 1;

    Some(item)
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    (self.remaining, Some(self.remaining))
  }
}

impl<T: Copy, A: Allocator> ExactSizeIterator for Iter<'_, T, A> {}

impl<'a, T: Copy, A: Allocator> IntoIterator for &'a Queue<T, A> {
  type Item = &'a T;
  type IntoIter = Iter<'a, T, A>;

  fn into_iter(self) -> Self::IntoIter {
    self.iter()
  }
}

impl<T: Copy + fmt::Debug, A: Allocator> fmt::Debug for Queue<T, A> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("Queue")
      .field("capacity", &self.capacity())
      .field("head", &self.head())
      .field("tail", &self.tail)
      .field("items", &self.iter().collect::<Vec<_>>())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use std::cell::Cell;

  use super::*;
  use crate::{
    alloc::{AllocatorFns, FnAllocator, WithErrorHandler},
    arena::ArenaAllocator,
    error::AllocError,
  };

  fn items<A: Allocator>(queue: &Queue<u32, A>) -> Vec<u32> {
    queue.iter().copied().collect()
  }

  /// A queue of `capacity` whose live items are `live`, starting at slot
  /// `tail`.
  fn rotated(
    capacity: usize,
    tail: usize,
    live: &[u32],
  ) -> Queue<u32> {
    let mut queue = Queue::with_capacity(capacity).unwrap();
    for _ in 0..tail {
      queue.push(0).unwrap();
      queue.pop().unwrap();
    }
    for item in live {
      queue.push(*item).unwrap();
    }
    assert_eq!(queue.tail(), tail);
    queue
  }

  #[test]
  fn test_fresh_queue_is_empty() {
    for capacity in 0..6 {
      let queue: Queue<u8> = Queue::with_capacity(capacity).unwrap();

      assert!(queue.is_empty());
      assert_eq!(queue.is_full(), capacity == 0);
      assert_eq!(queue.len(), 0);
    }
  }

  #[test]
  fn test_fill_drain_wrap() {
    let mut queue = Queue::with_capacity(4).unwrap();
    for item in 1..=4 {
      queue.push(item).unwrap();
    }

    assert!(queue.is_full());
    assert_eq!(queue.len(), 4);
    assert_eq!(queue.state(), RingState::Full);

    assert_eq!(queue.pop(), Some(1));
    assert!(!queue.is_full());
    assert_eq!(queue.len(), 3);

    queue.push(5).unwrap();
    assert_eq!(queue.len(), 4);
    assert!(queue.is_full());

    let drained: Vec<u32> = std::iter::from_fn(|| queue.pop()).collect();
    assert_eq!(drained, vec![2, 3, 4, 5]);
    assert!(queue.is_empty());
  }

  #[test]
  fn test_null_queue_ignores_everything() {
    let mut queue: Queue<u32> = Queue::with_capacity(0).unwrap();

    assert_eq!(queue.push(7), Err(7));
    assert!(queue.is_empty());
    assert!(queue.is_full());
    assert_eq!(queue.pop(), None);
    assert_eq!(queue.peek(), None);
    assert_eq!((queue.head(), queue.tail()), (0, 0));
  }

  #[test]
  fn test_push_on_full_keeps_state() {
    let mut queue = rotated(3, 2, &[1, 2, 3]);
    let before = (queue.head(), queue.tail(), queue.capacity());

    assert_eq!(queue.push(4), Err(4));
    assert_eq!((queue.head(), queue.tail(), queue.capacity()), before);
    assert_eq!(items(&queue), vec![1, 2, 3]);
  }

  #[test]
  fn test_peek_does_not_consume() {
    let mut queue = Queue::with_capacity(2).unwrap();
    queue.push(11u32).unwrap();

    assert_eq!(queue.peek(), Some(&11));
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.pop(), Some(11));
    assert_eq!(queue.peek(), None);
  }

  #[test]
  fn test_grow_unwrapped() {
    let mut queue = rotated(4, 1, &[1, 2]);

    queue.grow_by(3).unwrap();

    assert_eq!(queue.capacity(), 7);
    assert_eq!(items(&queue), vec![1, 2]);
    queue.push(3).unwrap();
    assert_eq!(items(&queue), vec![1, 2, 3]);
  }

  #[test]
  fn test_grow_relocates_wrapped_run() {
    // slots: [3, 4, _, 1, 2], tail 3, head 2
    let mut queue = rotated(5, 3, &[1, 2, 3, 4]);
    assert_eq!(queue.state(), RingState::Available { head: 2, tail: 3 });

    queue.grow_by(4).unwrap();

    assert_eq!(queue.capacity(), 9);
    assert_eq!(queue.tail(), 3);
    assert_eq!(queue.head(), 7);
    assert_eq!(items(&queue), vec![1, 2, 3, 4]);
  }

  #[test]
  fn test_grow_smaller_than_wrapped_run() {
    // slots: [3, 4, 5, _, 1, 2], tail 4, head 3
    let mut queue = rotated(6, 4, &[1, 2, 3, 4, 5]);

    queue.grow_by(1).unwrap();

    assert_eq!(queue.capacity(), 7);
    assert_eq!(queue.len(), 5);
    assert_eq!(items(&queue), vec![1, 2, 3, 4, 5]);

    queue.push(6).unwrap();
    queue.push(7).unwrap();
    assert!(queue.is_full());
    assert_eq!(items(&queue), vec![1, 2, 3, 4, 5, 6, 7]);
  }

  #[test]
  fn test_grow_run_exactly_fills_new_slots() {
    // slots: [3, 4, _, _, 1, 2], tail 4, head 2
    let mut queue = rotated(6, 4, &[1, 2, 3, 4]);

    queue.grow_by(2).unwrap();

    assert_eq!(queue.head(), 0);
    assert_eq!(items(&queue), vec![1, 2, 3, 4]);
  }

  #[test]
  fn test_grow_full_queue() {
    let mut straight = rotated(3, 0, &[1, 2, 3]);
    straight.grow_by(2).unwrap();
    assert_eq!(items(&straight), vec![1, 2, 3]);
    assert_eq!(straight.len(), 3);

    let mut wrapped = rotated(3, 2, &[1, 2, 3]);
    wrapped.grow_by(2).unwrap();
    assert_eq!(items(&wrapped), vec![1, 2, 3]);
    assert!(!wrapped.is_full());

    wrapped.push(4).unwrap();
    wrapped.push(5).unwrap();
    assert!(wrapped.is_full());
    assert_eq!(items(&wrapped), vec![1, 2, 3, 4, 5]);
  }

  #[test]
  fn test_grow_null_queue() {
    let mut queue: Queue<u32> = Queue::new();

    queue.grow_by(2).unwrap();

    assert!(queue.is_empty());
    assert!(!queue.is_full());
    queue.push(1).unwrap();
    assert_eq!(queue.pop(), Some(1));
  }

  #[test]
  fn test_grow_failure_leaves_queue() {
    let arena = ArenaAllocator::new(256).unwrap();
    let failures = Cell::new(0);
    let alloc = WithErrorHandler::new(&arena, |_: &AllocError| failures.set(failures.get() + 1));

    let mut queue = Queue::with_capacity_in(4, &alloc).unwrap();
    for item in 1..=3u32 {
      queue.push(item).unwrap();
    }
    queue.pop().unwrap();
    queue.push(4).unwrap();
    queue.push(5).unwrap();
    let before = (queue.head(), queue.tail(), queue.capacity());

    assert!(queue.grow_by(10_000).is_err());
    assert_eq!(failures.get(), 1);
    assert_eq!((queue.head(), queue.tail(), queue.capacity()), before);
    assert_eq!(queue.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4, 5]);
  }

  #[test]
  fn test_shrink_failure_leaves_queue() {
    unsafe fn refuse_reallocate(
      _: *mut u8,
      _: usize,
    ) -> *mut u8 {
      std::ptr::null_mut()
    }

    let failures = Cell::new(0);
    let bundle = AllocatorFns {
      reallocate: refuse_reallocate,
      ..AllocatorFns::libc()
    };
    let alloc = WithErrorHandler::new(FnAllocator::new(bundle), |_: &AllocError| {
      failures.set(failures.get() + 1)
    });

    // slots: [1, 2, 3, 4, 5] with 1 popped, tail 1, head 0
    let mut queue = Queue::with_capacity_in(5, &alloc).unwrap();
    for item in 1..=4u32 {
      queue.push(item).unwrap();
    }
    queue.pop().unwrap();
    queue.push(5).unwrap();
    let before = (queue.head(), queue.tail(), queue.capacity());

    assert!(matches!(queue.shrink_by(2), Err(AllocError::OutOfMemory { .. })));
    assert_eq!(failures.get(), 1);
    assert_eq!((queue.head(), queue.tail(), queue.capacity()), before);
    assert_eq!(items(&queue), vec![2, 3, 4, 5]);
  }

  #[test]
  fn test_pop_on_empty_keeps_cursors() {
    let mut queue = rotated(4, 3, &[]);
    let before = (queue.head(), queue.tail(), queue.capacity());

    assert_eq!(queue.pop(), None);
    assert_eq!((queue.head(), queue.tail(), queue.capacity()), before);
  }

  #[test]
  fn test_shrink_outside_live_region() {
    let mut queue = rotated(8, 0, &[1, 2, 3]);

    queue.shrink_by(4).unwrap();

    assert_eq!(queue.capacity(), 4);
    assert_eq!(items(&queue), vec![1, 2, 3]);
  }

  #[test]
  fn test_shrink_clamps_head_to_full() {
    // slots: [0, 1, 2, 3, 4, _], tail 1, head 5. The clamp parks head on the
    // sentinel, so slot 0 (left over from the rotation) becomes the newest
    // item.
    let mut queue = rotated(6, 1, &[1, 2, 3, 4]);

    queue.shrink_by(2).unwrap();

    assert_eq!(queue.capacity(), 4);
    assert_eq!((queue.head(), queue.tail()), (4, 1));
    assert!(queue.is_full());
    assert_eq!(queue.len(), 4);
    assert_eq!(items(&queue), vec![1, 2, 3, 0]);
  }

  #[test]
  fn test_shrink_clamp_exposes_stale_slots() {
    // slots: [7, 8, 1, 2, _], tail 2, head 4. Slots 0 and 1 still hold the
    // popped 7 and 8.
    let mut queue = Queue::with_capacity(5).unwrap();
    for item in [7, 8] {
      queue.push(item).unwrap();
      queue.pop().unwrap();
    }
    queue.push(1).unwrap();
    queue.push(2).unwrap();

    queue.shrink_by(1).unwrap();

    assert!(queue.is_full());
    assert_eq!(items(&queue), vec![1, 2, 7, 8]);
  }

  #[test]
  fn test_shrink_run_from_zero_becomes_full() {
    let mut queue = rotated(6, 0, &[1, 2, 3, 4, 5]);

    queue.shrink_by(2).unwrap();

    assert!(queue.is_full());
    assert_eq!(items(&queue), vec![1, 2, 3, 4]);
  }

  #[test]
  fn test_shrink_invalidates_tail_only() {
    // slots: [3, 4, _, _, 1, 2], tail 4, head 2: the tail-side run is lost.
    let mut queue = rotated(6, 4, &[1, 2, 3, 4]);

    queue.shrink_by(3).unwrap();

    assert_eq!(queue.capacity(), 3);
    assert_eq!((queue.head(), queue.tail()), (2, 0));
    assert_eq!(items(&queue), vec![3, 4]);
  }

  #[test]
  fn test_shrink_invalidates_tail_and_head() {
    // slots: [_, _, _, _, 1, 2], tail 4, head 0 after wrapping exactly.
    let mut queue = rotated(6, 4, &[1, 2]);
    assert_eq!(queue.head(), 0);

    queue.shrink_by(3).unwrap();
    assert!(queue.is_empty());

    let mut unwrapped = rotated(8, 5, &[1, 2]);
    unwrapped.shrink_by(4).unwrap();
    assert!(unwrapped.is_empty());
    assert_eq!((unwrapped.head(), unwrapped.tail()), (0, 0));
  }

  #[test]
  fn test_shrink_full_ring_loses_middle() {
    // slots: [4, 5, 1, 2, 3], tail 2, full. Slots 3 and 4 go away and the
    // ring stays full over what is left.
    let mut queue = rotated(5, 2, &[1, 2, 3, 4, 5]);

    queue.shrink_by(2).unwrap();

    assert!(queue.is_full());
    assert_eq!(items(&queue), vec![1, 4, 5]);
  }

  #[test]
  fn test_shrink_full_ring_past_tail_empties() {
    let mut queue = rotated(5, 3, &[1, 2, 3, 4, 5]);

    queue.shrink_by(2).unwrap();

    assert!(queue.is_empty());
    assert_eq!(queue.capacity(), 3);
  }

  #[test]
  fn test_shrink_whole_and_beyond() {
    let mut queue = rotated(4, 1, &[1, 2]);

    assert!(matches!(
      queue.shrink_by(5),
      Err(AllocError::ShrinkExceedsCapacity { .. })
    ));
    assert_eq!(items(&queue), vec![1, 2]);

    queue.shrink_by(4).unwrap();
    assert!(queue.is_empty());
    assert!(queue.is_full());
    assert_eq!((queue.head(), queue.tail(), queue.capacity()), (0, 0, 0));
  }

  #[test]
  fn test_try_clone_is_independent() {
    let mut queue = rotated(4, 3, &[1, 2, 3]);
    let copy = queue.try_clone().unwrap();

    queue.pop().unwrap();
    queue.push(9).unwrap();

    assert_eq!(items(&copy), vec![1, 2, 3]);
    assert_eq!((copy.head(), copy.tail()), (2, 3));
    assert_eq!(items(&queue), vec![2, 3, 9]);
  }

  #[test]
  fn test_destroy_and_clear() {
    let mut queue = rotated(4, 2, &[1, 2]);

    queue.clear();
    assert!(queue.is_empty());
    assert_eq!(queue.capacity(), 4);

    queue.destroy();
    queue.destroy();
    assert_eq!((queue.head(), queue.tail(), queue.capacity()), (0, 0, 0));
  }
}
