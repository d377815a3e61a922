//! The allocation protocol shared by every container in this crate.
//!
//! Containers never talk to a memory manager directly. They hold an
//! [`Allocator`] and route every allocate, reallocate and deallocate through
//! it, reporting failures to [`Allocator::on_error`] before returning the
//! error to the caller.
//!
//! ```text
//!   Queue<T, A> ──► Array<T, A> ──► A: Allocator
//!                                     ├── DefaultAllocator ──► AllocatorFns (process-wide, set once)
//!                                     ├── FnAllocator      ──► AllocatorFns (caller supplied)
//!                                     ├── ArenaAllocator   ──► one fixed region
//!                                     └── WithErrorHandler ──► any of the above + callback
//! ```

use std::{alloc::Layout, ffi::c_void, fmt, ptr};

use once_cell::sync::OnceCell;

use crate::error::{AllocError, ConfigError};

/// Largest alignment a plain `malloc`-style function bundle guarantees.
#[cfg(target_pointer_width = "64")]
pub const MIN_ALIGN: usize = 16;
#[cfg(not(target_pointer_width = "64"))]
pub const MIN_ALIGN: usize = 8;

/// A memory manager that containers are parameterized by.
///
/// Implementations signal failure by returning a null pointer. They must not
/// panic or abort on exhaustion: the container turns the null into an
/// [`AllocError`], calls [`on_error`](Allocator::on_error) once and leaves its
/// own state untouched.
pub trait Allocator {
  /// Returns a block fitting `layout`, or null.
  ///
  /// Callers never pass a zero-sized layout.
  fn allocate(
    &self,
    layout: Layout,
  ) -> *mut u8;

  /// Resizes the block at `ptr` to `new_size` bytes with the same alignment.
  ///
  /// Bytes up to `min(old_layout.size(), new_size)` are preserved. On failure
  /// returns null and the original block stays valid.
  ///
  /// # Safety
  ///
  /// `ptr` must have been returned by this allocator for `old_layout`, and
  /// `new_size` must be non-zero.
  unsafe fn reallocate(
    &self,
    ptr: *mut u8,
    old_layout: Layout,
    new_size: usize,
  ) -> *mut u8;

  /// Releases the block at `ptr`. Null is a no-op.
  ///
  /// # Safety
  ///
  /// `ptr` must be null or have been returned by this allocator for `layout`.
  unsafe fn deallocate(
    &self,
    ptr: *mut u8,
    layout: Layout,
  );

  /// Failure hook. Fired exactly once per failed operation, never on success.
  fn on_error(
    &self,
    error: &AllocError,
  ) {
    let _ = error;
  }
}

impl<A: Allocator + ?Sized> Allocator for &A {
  fn allocate(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    (**self).allocate(layout)
  }

  unsafe fn reallocate(
    &self,
    ptr: *mut u8,
    old_layout: Layout,
    new_size: usize,
  ) -> *mut u8 {
    unsafe { (**self).reallocate(ptr, old_layout, new_size) }
  }

  unsafe fn deallocate(
    &self,
    ptr: *mut u8,
    layout: Layout,
  ) {
    unsafe { (**self).deallocate(ptr, layout) }
  }

  fn on_error(
    &self,
    error: &AllocError,
  ) {
    (**self).on_error(error)
  }
}

/// A memory manager expressed as plain functions.
///
/// This is the shape a C-style allocator takes: no layouts, just byte counts.
/// Blocks returned by `allocate` and `reallocate` are assumed to be aligned to
/// [`MIN_ALIGN`].
#[derive(Debug, Clone, Copy)]
pub struct AllocatorFns {
  pub allocate: unsafe fn(usize) -> *mut u8,
  pub reallocate: unsafe fn(*mut u8, usize) -> *mut u8,
  pub deallocate: unsafe fn(*mut u8),
  pub on_error: Option<fn(&AllocError)>,
}

unsafe fn libc_allocate(size: usize) -> *mut u8 {
  unsafe { libc::malloc(size) as *mut u8 }
}

unsafe fn libc_reallocate(
  ptr: *mut u8,
  size: usize,
) -> *mut u8 {
  unsafe { libc::realloc(ptr as *mut c_void, size) as *mut u8 }
}

unsafe fn libc_deallocate(ptr: *mut u8) {
  unsafe { libc::free(ptr as *mut c_void) }
}

impl AllocatorFns {
  /// `malloc`, `realloc` and `free`, with no failure callback.
  pub const fn libc() -> Self {
    Self {
      allocate: libc_allocate,
      reallocate: libc_reallocate,
      deallocate: libc_deallocate,
      on_error: None,
    }
  }

  pub const fn with_on_error(
    mut self,
    on_error: fn(&AllocError),
  ) -> Self {
    self.on_error = Some(on_error);
    self
  }
}

impl Default for AllocatorFns {
  fn default() -> Self {
    Self::libc()
  }
}

/// Adapts an [`AllocatorFns`] bundle to the [`Allocator`] trait.
///
/// Layouts aligned above [`MIN_ALIGN`] are refused with a null pointer since
/// the bundle has no way to honor them.
#[derive(Debug, Clone, Copy)]
pub struct FnAllocator {
  fns: AllocatorFns,
}

impl FnAllocator {
  pub const fn new(fns: AllocatorFns) -> Self {
    Self { fns }
  }

  pub fn fns(&self) -> &AllocatorFns {
    &self.fns
  }
}

impl Allocator for FnAllocator {
  fn allocate(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    if layout.align() > MIN_ALIGN {
      return ptr::null_mut();
    }
    unsafe { (self.fns.allocate)(layout.size()) }
  }

  unsafe fn reallocate(
    &self,
    ptr: *mut u8,
    old_layout: Layout,
    new_size: usize,
  ) -> *mut u8 {
    if old_layout.align() > MIN_ALIGN {
      return ptr::null_mut();
    }
    unsafe { (self.fns.reallocate)(ptr, new_size) }
  }

  unsafe fn deallocate(
    &self,
    ptr: *mut u8,
    _layout: Layout,
  ) {
    if ptr.is_null() {
      return;
    }
    unsafe { (self.fns.deallocate)(ptr) }
  }

  fn on_error(
    &self,
    error: &AllocError,
  ) {
    if let Some(on_error) = self.fns.on_error {
      on_error(error);
    }
  }
}

static DEFAULT_FNS: OnceCell<AllocatorFns> = OnceCell::new();

/// Installs the process-wide default allocator.
///
/// Must run before anything reads the default (any container created without
/// an explicit allocator does). Once the default has been read or set it is
/// fixed for the life of the process.
pub fn configure_default_allocator(fns: AllocatorFns) -> Result<(), ConfigError> {
  DEFAULT_FNS.set(fns).map_err(|_| {
    tracing::warn!("default allocator already fixed; ignoring reconfiguration");
    ConfigError::AlreadyConfigured
  })
}

/// The active default bundle, falling back to [`AllocatorFns::libc`].
pub fn default_allocator_fns() -> &'static AllocatorFns {
  DEFAULT_FNS.get_or_init(AllocatorFns::libc)
}

/// Zero-sized handle to the process-wide default allocator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultAllocator;

impl Allocator for DefaultAllocator {
  fn allocate(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    FnAllocator::new(*default_allocator_fns()).allocate(layout)
  }

  unsafe fn reallocate(
    &self,
    ptr: *mut u8,
    old_layout: Layout,
    new_size: usize,
  ) -> *mut u8 {
    unsafe { FnAllocator::new(*default_allocator_fns()).reallocate(ptr, old_layout, new_size) }
  }

  unsafe fn deallocate(
    &self,
    ptr: *mut u8,
    layout: Layout,
  ) {
    unsafe { FnAllocator::new(*default_allocator_fns()).deallocate(ptr, layout) }
  }

  fn on_error(
    &self,
    error: &AllocError,
  ) {
    FnAllocator::new(*default_allocator_fns()).on_error(error)
  }
}

/// Wraps an allocator with a failure callback.
///
/// The closure plays the role of an `onError(errorData)` pair: whatever state
/// it captures is the callback data.
pub struct WithErrorHandler<A, F> {
  inner: A,
  handler: F,
}

impl<A, F> WithErrorHandler<A, F>
where
  A: Allocator,
  F: Fn(&AllocError),
{
  pub fn new(
    inner: A,
    handler: F,
  ) -> Self {
    Self { inner, handler }
  }

  pub fn inner(&self) -> &A {
    &self.inner
  }
}

impl<A: fmt::Debug, F> fmt::Debug for WithErrorHandler<A, F> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("WithErrorHandler")
      .field("inner", &self.inner)
      .finish_non_exhaustive()
  }
}

impl<A, F> Allocator for WithErrorHandler<A, F>
where
  A: Allocator,
  F: Fn(&AllocError),
{
  fn allocate(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    self.inner.allocate(layout)
  }

  unsafe fn reallocate(
    &self,
    ptr: *mut u8,
    old_layout: Layout,
    new_size: usize,
  ) -> *mut u8 {
    unsafe { self.inner.reallocate(ptr, old_layout, new_size) }
  }

  unsafe fn deallocate(
    &self,
    ptr: *mut u8,
    layout: Layout,
  ) {
    unsafe { self.inner.deallocate(ptr, layout) }
  }

  fn on_error(
    &self,
    error: &AllocError,
  ) {
    self.inner.on_error(error);
    (self.handler)(error);
  }
}
