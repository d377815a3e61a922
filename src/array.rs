//! Growable contiguous buffer parameterized by an [`Allocator`].
//!
//! ```text
//!   ptr ──► ┌────┬────┬────┬────┬────┬────┐
//!           │ e0 │ e1 │ e2 │ ?? │ ?? │ ?? │
//!           └────┴────┴────┴────┴────┴────┘
//!                          ▲              ▲
//!                      occupancy       capacity
//! ```
//!
//! Slots `[0, occupancy)` hold elements. Every other slot holds
//! `T::default()` or a stale value, never uninitialized memory. The queue
//! reuses `occupancy` as its write cursor, which is why it is exposed as a
//! plain index rather than only as a length.

use std::{
  alloc::Layout,
  fmt, mem,
  ops::{Deref, DerefMut},
  ptr::{self, NonNull},
  slice,
};

use crate::{
  alloc::{Allocator, DefaultAllocator},
  error::{AllocError, Result},
  region::{MemoryRegion, Permissions},
};

pub struct Array<T, A: Allocator = DefaultAllocator> {
  ptr: Option<NonNull<T>>,
  capacity: usize,
  occupancy: usize,
  alloc: A,
}

unsafe impl<T: Send, A: Allocator + Send> Send for Array<T, A> {}
unsafe impl<T: Sync, A: Allocator + Sync> Sync for Array<T, A> {}

impl<T: Copy + Default> Array<T> {
  /// The null array on the default allocator.
  pub fn new() -> Self {
    Self::new_in(DefaultAllocator)
  }

  pub fn with_capacity(capacity: usize) -> Result<Self> {
    Self::with_capacity_in(capacity, DefaultAllocator)
  }
}

impl<T: Copy + Default> Default for Array<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Copy + Default, A: Allocator> Array<T, A> {
  /// Allocates room for `capacity` elements.
  ///
  /// A capacity of zero asks for nothing and yields the null array. On
  /// failure nothing is kept and the allocator's `on_error` has fired.
  pub fn with_capacity_in(
    capacity: usize,
    alloc: A,
  ) -> Result<Self> {
    let mut array = Self::new_in(alloc);
    array.grow_by(capacity)?;
    Ok(array)
  }

  /// Deep copy on the same allocator.
  pub fn try_clone(&self) -> Result<Self>
  where
    A: Clone,
  {
    self.clone_in(self.alloc.clone())
  }

  /// Deep copy into a block from `alloc`.
  ///
  /// The copy has the same capacity as `self`; elements `[0, occupancy)` are
  /// copied one at a time.
  pub fn clone_in<B: Allocator>(
    &self,
    alloc: B,
  ) -> Result<Array<T, B>> {
    let mut copy = Array::with_capacity_in(self.capacity, alloc)?;

    for (index, item) in self.as_slice().iter().enumerate() {
      unsafe { copy.write_slot(index, *item) };
    }
    copy.occupancy = self.occupancy;

    Ok(copy)
  }

  /// Adds `amount` slots holding `T::default()`. Occupancy is unchanged.
  ///
  /// The block may move. On failure the array is exactly as before.
  pub fn grow_by(
    &mut self,
    amount: usize,
  ) -> Result<()> {
    if amount == 0 {
      return Ok(());
    }

    let overflow = AllocError::CapacityOverflow {
      capacity: self.capacity,
      amount,
    };
    let Some(new_capacity) = self.capacity.checked_add(amount) else {
      return Err(self.fail(overflow));
    };
    let Ok(new_layout) = Layout::array::<T>(new_capacity) else {
      return Err(self.fail(overflow));
    };

    if new_layout.size() == 0 {
      self.ptr = Some(NonNull::dangling());
      self.capacity = new_capacity;
      return Ok(());
    }

    let raw = match self.ptr {
      None => self.alloc.allocate(new_layout),
      Some(ptr) => unsafe {
        self
          .alloc
          .reallocate(ptr.as_ptr() as *mut u8, self.current_layout(), new_layout.size())
      },
    };

    let Some(ptr) = NonNull::new(raw as *mut T) else {
      return Err(self.fail(AllocError::OutOfMemory {
        bytes: new_layout.size(),
      }));
    };

    tracing::trace!(
      from = self.capacity,
      to = new_capacity,
      occupancy = self.occupancy,
      "array grown"
    );

    let old_capacity = self.capacity;
    self.ptr = Some(ptr);
    self.capacity = new_capacity;

    for index in old_capacity..new_capacity {
      unsafe { self.write_slot(index, T::default()) };
    }

    Ok(())
  }
}

impl<T: Copy, A: Allocator> Array<T, A> {
  /// The null array: no block, capacity 0, occupancy 0.
  pub fn new_in(alloc: A) -> Self {
    Self {
      ptr: None,
      capacity: 0,
      occupancy: 0,
      alloc,
    }
  }

  /// Removes `amount` slots from the end, losing whatever they held.
  ///
  /// Occupancy is clamped to the new capacity. Shrinking by the whole
  /// capacity releases the block. Shrinking by more than the capacity is
  /// rejected without touching the array or calling `on_error`.
  pub fn shrink_by(
    &mut self,
    amount: usize,
  ) -> Result<()> {
    if amount > self.capacity {
      return Err(AllocError::ShrinkExceedsCapacity {
        amount,
        capacity: self.capacity,
      });
    }
    if amount == 0 {
      return Ok(());
    }

    let new_capacity = self.capacity - amount;
    if new_capacity == 0 {
      self.destroy();
      return Ok(());
    }

    if let Some(ptr) = self.ptr.filter(|_| mem::size_of::<T>() != 0) {
      let new_size = mem::size_of::<T>() * new_capacity;
      let raw = unsafe {
        self
          .alloc
          .reallocate(ptr.as_ptr() as *mut u8, self.current_layout(), new_size)
      };

      let Some(ptr) = NonNull::new(raw as *mut T) else {
        return Err(self.fail(AllocError::OutOfMemory { bytes: new_size }));
      };
      self.ptr = Some(ptr);
    }

    tracing::trace!(
      from = self.capacity,
      to = new_capacity,
      occupancy = self.occupancy,
      "array shrunk"
    );

    self.capacity = new_capacity;
    self.occupancy = self.occupancy.min(new_capacity);

    Ok(())
  }

  /// Writes `item` at `occupancy` and advances it, or hands the item back
  /// when every slot is taken.
  pub fn push(
    &mut self,
    item: T,
  ) -> std::result::Result<(), T> {
    if self.occupancy == self.capacity {
      return Err(item);
    }

    unsafe { self.write_slot(self.occupancy, item) };
    self.occupancy += 1;

    Ok(())
  }

  pub fn pop(&mut self) -> Option<T> {
    if self.occupancy == 0 {
      return None;
    }

    self.occupancy -= 1;
    Some(unsafe { self.read_slot(self.occupancy) })
  }

  pub fn as_slice(&self) -> &[T] {
    match self.ptr {
      Some(ptr) => unsafe { slice::from_raw_parts(ptr.as_ptr(), self.occupancy) },
      None => &[],
    }
  }

  pub fn as_mut_slice(&mut self) -> &mut [T] {
    match self.ptr {
      Some(ptr) => unsafe { slice::from_raw_parts_mut(ptr.as_ptr(), self.occupancy) },
      None => &mut [],
    }
  }

  pub(crate) unsafe fn read_slot(
    &self,
    index: usize,
  ) -> T {
    debug_assert!(index < self.capacity);
    unsafe { self.slot_ptr(index).read() }
  }

  pub(crate) unsafe fn slot_ref(
    &self,
    index: usize,
  ) -> &T {
    debug_assert!(index < self.capacity);
    unsafe { &*self.slot_ptr(index) }
  }

  pub(crate) unsafe fn write_slot(
    &mut self,
    index: usize,
    item: T,
  ) {
    debug_assert!(index < self.capacity);
    unsafe { self.slot_ptr(index).write(item) }
  }

  /// Moves `count` slots from `src` to `dst`. The ranges may overlap.
  pub(crate) unsafe fn copy_slots(
    &mut self,
    src: usize,
    dst: usize,
    count: usize,
  ) {
    debug_assert!(src + count <= self.capacity && dst + count <= self.capacity);
    if count == 0 {
      return;
    }
    unsafe { ptr::copy(self.slot_ptr(src), self.slot_ptr(dst), count) }
  }
}

impl<T, A: Allocator> Array<T, A> {
  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn occupancy(&self) -> usize {
    self.occupancy
  }

  pub fn len(&self) -> usize {
    self.occupancy
  }

  pub fn is_empty(&self) -> bool {
    self.occupancy == 0
  }

  /// `true` for the null array (no block, capacity 0).
  pub fn is_null(&self) -> bool {
    self.ptr.is_none()
  }

  pub fn clear(&mut self) {
    self.occupancy = 0;
  }

  pub fn allocator(&self) -> &A {
    &self.alloc
  }

  /// The backing block as a read/write region. Empty for the null array.
  pub fn region(&self) -> MemoryRegion {
    match self.ptr {
      Some(ptr) => MemoryRegion::new(
        ptr.as_ptr() as *mut u8,
        mem::size_of::<T>() * self.capacity,
        Permissions::READ | Permissions::WRITE,
      ),
      None => MemoryRegion::empty(),
    }
  }

  /// Releases the block and returns to the null state. Idempotent.
  pub fn destroy(&mut self) {
    if let Some(ptr) = self.ptr.take() {
      if mem::size_of::<T>() != 0 {
        unsafe {
          self
            .alloc
            .deallocate(ptr.as_ptr() as *mut u8, self.current_layout())
        };
      }
      tracing::trace!(capacity = self.capacity, "array destroyed");
    }

    self.capacity = 0;
    self.occupancy = 0;
  }

  pub(crate) fn set_occupancy(
    &mut self,
    occupancy: usize,
  ) {
    debug_assert!(occupancy <= self.capacity);
    self.occupancy = occupancy;
  }

  /// Layout of the current block. Valid because it was valid when the block
  /// was obtained.
  fn current_layout(&self) -> Layout {
    unsafe { Layout::from_size_align_unchecked(mem::size_of::<T>() * self.capacity, mem::align_of::<T>()) }
  }

  unsafe fn slot_ptr(
    &self,
    index: usize,
  ) -> *mut T {
    match self.ptr {
      Some(ptr) => unsafe { ptr.as_ptr().add(index) },
      None => ptr::null_mut(),
    }
  }

  fn fail(
    &self,
    error: AllocError,
  ) -> AllocError {
    tracing::debug!(%error, capacity = self.capacity, "array allocation failed");
    self.alloc.on_error(&error);
    error
  }
}

impl<T, A: Allocator> Drop for Array<T, A> {
  fn drop(&mut self) {
    self.destroy();
  }
}

impl<T: Copy, A: Allocator> Deref for Array<T, A> {
  type Target = [T];

  fn deref(&self) -> &Self::Target {
    self.as_slice()
  }
}

impl<T: Copy, A: Allocator> DerefMut for Array<T, A> {
  fn deref_mut(&mut self) -> &mut Self::Target {
    self.as_mut_slice()
  }
}

impl<T: Copy + fmt::Debug, A: Allocator> fmt::Debug for Array<T, A> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("Array")
      .field("capacity", &self.capacity)
      .field("occupancy", &self.occupancy)
      .field("items", &self.as_slice())
      .finish()
  }
}
