use std::{alloc::Layout, cell::Cell, ffi::c_void, mem, ptr};

use crate::{align_up, alloc::Allocator, block::Block, error::AllocError};

const BLOCK_ALIGN: usize = mem::align_of::<Block>();

/// A first-fit block allocator over one fixed region.
///
/// The region is taken from the system once, at construction, and never
/// grows. Requests that do not fit return null, which containers surface as
/// [`AllocError::OutOfMemory`]. That makes the arena a convenient way to give a
/// container a hard memory ceiling.
///
/// ```text
///   base                                  cursor              base + capacity
///   ┌──────┬────┬──────┬────┬──────┬─────┬─────────────────────┐
///   │ hdr  │ A1 │ hdr  │ A2 │ hdr  │ A3  │        free         │
///   └──────┴────┴──────┴────┴──────┴─────┴─────────────────────┘
/// ```
///
/// Freed blocks stay in the list and are reused first-fit. Freeing the last
/// block moves the cursor back, together with any free blocks directly in
/// front of it.
///
/// Single-threaded: the bookkeeping lives in [`Cell`]s so the arena can be
/// shared by reference between several containers.
pub struct ArenaAllocator {
  base: *mut u8,
  capacity: usize,
  cursor: Cell<usize>,
  first: Cell<*mut Block>,
  last: Cell<*mut Block>,
}

impl ArenaAllocator {
  pub fn new(capacity: usize) -> Result<Self, AllocError> {
    let base = if capacity == 0 {
      ptr::null_mut()
    } else {
      unsafe { libc::malloc(capacity) as *mut u8 }
    };

    if capacity > 0 && base.is_null() {
      tracing::debug!(capacity, "arena region allocation failed");
      return Err(AllocError::OutOfMemory { bytes: capacity });
    }

    Ok(Self {
      base,
      capacity,
      cursor: Cell::new(0),
      first: Cell::new(ptr::null_mut()),
      last: Cell::new(ptr::null_mut()),
    })
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Bytes between the start of the region and the cursor, headers included.
  pub fn used(&self) -> usize {
    self.cursor.get()
  }

  pub fn remaining(&self) -> usize {
    self.capacity - self.cursor.get()
  }

  fn find_free_block(
    &self,
    layout: Layout,
  ) -> *mut Block {
    unsafe {
      let mut current = self.first.get();

      while !current.is_null() {
        let data = Block::data(current) as usize;
        if (*current).is_free && (*current).size >= layout.size() && data % layout.align() == 0 {
          return current;
        }
        current = (*current).next;
      }

      ptr::null_mut()
    }
  }

  fn bump(
    &self,
    layout: Layout,
  ) -> *mut Block {
    let data_align = layout.align().max(BLOCK_ALIGN);
    if layout.size() > self.remaining() || data_align > self.capacity {
      return ptr::null_mut();
    }

    let base = self.base as usize;
    let start = base + self.cursor.get();
    let data = align_up!(start + Block::HEADER, data_align);
    let end = align_up!(data + layout.size(), BLOCK_ALIGN);

    if end - base > self.capacity {
      return ptr::null_mut();
    }

    let header = (data - Block::HEADER) as *mut Block;

    unsafe {
      header.write(Block::new(end - data, header as usize - start));

      let last = self.last.get();
      if last.is_null() {
        self.first.set(header);
      } else {
        (*last).next = header;
      }
    }

    self.last.set(header);
    self.cursor.set(end - base);

    header
  }

  /// Pops free blocks off the end of the list and rewinds the cursor.
  unsafe fn release_trailing(&self) {
    unsafe {
      loop {
        let last = self.last.get();
        if last.is_null() || !(*last).is_free {
          return;
        }

        self.cursor.set(Block::start(last) as usize - self.base as usize);

        if self.first.get() == last {
          self.first.set(ptr::null_mut());
          self.last.set(ptr::null_mut());
        } else {
          let mut current = self.first.get();
          while (*current).next != last {
            current = (*current).next;
          }
          (*current).next = ptr::null_mut();
          self.last.set(current);
        }
      }
    }
  }
}

impl Allocator for ArenaAllocator {
  fn allocate(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    let free_block = self.find_free_block(layout);

    unsafe {
      if !free_block.is_null() {
        (*free_block).is_free = false;
        return Block::data(free_block);
      }

      let block = self.bump(layout);
      if block.is_null() {
        return ptr::null_mut();
      }

      Block::data(block)
    }
  }

  unsafe fn reallocate(
    &self,
    ptr: *mut u8,
    old_layout: Layout,
    new_size: usize,
  ) -> *mut u8 {
    unsafe {
      let block = Block::from_data(ptr);
      let is_last = block == self.last.get();
      let base = self.base as usize;
      let data = ptr as usize;

      if (*block).size >= new_size {
        if is_last {
          let end = align_up!(data + new_size, BLOCK_ALIGN);
          (*block).size = end - data;
          self.cursor.set(end - base);
        }
        return ptr;
      }

      if is_last && new_size <= self.capacity {
        let end = align_up!(data + new_size, BLOCK_ALIGN);
        if end - base <= self.capacity {
          (*block).size = end - data;
          self.cursor.set(end - base);
          return ptr;
        }
      }

      let Ok(new_layout) = Layout::from_size_align(new_size, old_layout.align()) else {
        return ptr::null_mut();
      };

      let fresh = self.allocate(new_layout);
      if fresh.is_null() {
        return ptr::null_mut();
      }

      ptr::copy_nonoverlapping(ptr, fresh, old_layout.size().min(new_size));
      self.deallocate(ptr, old_layout);

      fresh
    }
  }

  unsafe fn deallocate(
    &self,
    ptr: *mut u8,
    _layout: Layout,
  ) {
    unsafe {
      if ptr.is_null() {
        return;
      }

      let block = Block::from_data(ptr);
      (*block).is_free = true;

      if block == self.last.get() {
        self.release_trailing();
      }
    }
  }

  fn on_error(
    &self,
    error: &AllocError,
  ) {
    tracing::debug!(
      %error,
      used = self.used(),
      capacity = self.capacity,
      "arena request failed"
    );
  }
}

impl Drop for ArenaAllocator {
  fn drop(&mut self) {
    unsafe { libc::free(self.base as *mut c_void) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_alloc() {
    let allocator = ArenaAllocator::new(4096).unwrap();

    unsafe {
      let first_addr = allocator.allocate(Layout::new::<u64>()) as *mut u64;

      *first_addr = 3u64;

      assert_eq!(*first_addr, 3);

      let size: usize = 6;

      let second_addr = allocator.allocate(Layout::array::<u16>(size).unwrap()) as *mut u16;

      for i in 0..size {
        *(second_addr.add(i)) = (i + 1) as u16;
      }

      assert_eq!(*first_addr, 3);

      for i in 0..size {
        assert_eq!((i + 1) as u16, *(second_addr.add(i)))
      }

      allocator.deallocate(first_addr as *mut u8, Layout::new::<u64>());

      let third_addr = allocator.allocate(Layout::new::<u32>()) as *mut u32;

      assert_eq!(first_addr as *mut u32, third_addr);

      allocator.deallocate(third_addr as *mut u8, Layout::new::<u32>());

      let fourth_addr = allocator.allocate(Layout::new::<u128>()) as *mut u128;

      *fourth_addr = 25;

      assert!(fourth_addr as usize > third_addr as usize);
      assert_eq!(fourth_addr as usize % mem::align_of::<u128>(), 0);
      assert_eq!(*fourth_addr, 25);
    }
  }

  #[test]
  fn test_exhaustion_returns_null() {
    let allocator = ArenaAllocator::new(64).unwrap();

    assert!(allocator.allocate(Layout::array::<u8>(128).unwrap()).is_null());

    let empty = ArenaAllocator::new(0).unwrap();
    assert!(empty.allocate(Layout::new::<u8>()).is_null());
  }

  #[test]
  fn test_trailing_blocks_rewind_cursor() {
    let allocator = ArenaAllocator::new(1024).unwrap();
    let layout = Layout::array::<u8>(32).unwrap();

    unsafe {
      let a = allocator.allocate(layout);
      let after_a = allocator.used();
      let b = allocator.allocate(layout);
      assert!(allocator.used() > after_a);

      allocator.deallocate(a, layout);
      assert!(allocator.used() > after_a);

      allocator.deallocate(b, layout);
      assert_eq!(allocator.used(), 0);
    }
  }

  #[test]
  fn test_reallocate_in_place_then_move() {
    let allocator = ArenaAllocator::new(1024).unwrap();
    let layout = Layout::array::<u8>(16).unwrap();

    unsafe {
      let p = allocator.allocate(layout);
      for i in 0..16 {
        p.add(i).write(i as u8);
      }

      let grown = allocator.reallocate(p, layout, 48);
      assert_eq!(grown, p);

      let blocker = allocator.allocate(layout);
      assert!(!blocker.is_null());

      let moved = allocator.reallocate(grown, Layout::array::<u8>(48).unwrap(), 96);
      assert!(!moved.is_null());
      assert_ne!(moved, grown);

      for i in 0..16 {
        assert_eq!(moved.add(i).read(), i as u8);
      }
    }
  }

  #[test]
  fn test_reallocate_failure_keeps_block() {
    let allocator = ArenaAllocator::new(128).unwrap();
    let layout = Layout::array::<u8>(16).unwrap();

    unsafe {
      let p = allocator.allocate(layout);
      p.write(7);

      assert!(allocator.reallocate(p, layout, 4096).is_null());
      assert_eq!(p.read(), 7);
    }
  }
}
