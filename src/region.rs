//! Memory region descriptors.

use std::{
  fmt,
  ops::{BitAnd, BitOr},
  ptr, slice,
};

/// Access rights on a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Permissions(u8);

impl Permissions {
  pub const NONE: Self = Self(0);
  pub const READ: Self = Self(1);
  pub const WRITE: Self = Self(1 << 1);
  pub const EXECUTE: Self = Self(1 << 2);
  pub const ALL: Self = Self(0b111);

  pub const fn bits(self) -> u8 {
    self.0
  }

  /// Unknown bits are dropped.
  pub const fn from_bits_truncate(bits: u8) -> Self {
    Self(bits & Self::ALL.0)
  }

  pub const fn contains(
    self,
    other: Self,
  ) -> bool {
    self.0 & other.0 == other.0
  }

  pub const fn union(
    self,
    other: Self,
  ) -> Self {
    Self(self.0 | other.0)
  }

  pub const fn intersection(
    self,
    other: Self,
  ) -> Self {
    Self(self.0 & other.0)
  }

  pub const fn is_empty(self) -> bool {
    self.0 == 0
  }
}

impl BitOr for Permissions {
  type Output = Self;

  fn bitor(
    self,
    rhs: Self,
  ) -> Self {
    self.union(rhs)
  }
}

impl BitAnd for Permissions {
  type Output = Self;

  fn bitand(
    self,
    rhs: Self,
  ) -> Self {
    self.intersection(rhs)
  }
}

impl fmt::Display for Permissions {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    let flag = |bit: Self, c: char| if self.contains(bit) { c } else { '-' };
    write!(
      f,
      "{}{}{}",
      flag(Self::READ, 'r'),
      flag(Self::WRITE, 'w'),
      flag(Self::EXECUTE, 'x')
    )
  }
}

/// A span of bytes plus what may be done with it.
///
/// A descriptor only; it neither owns nor keeps alive the memory it points
/// at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
  base: *mut u8,
  len: usize,
  permissions: Permissions,
}

impl MemoryRegion {
  pub const fn new(
    base: *mut u8,
    len: usize,
    permissions: Permissions,
  ) -> Self {
    Self {
      base,
      len,
      permissions,
    }
  }

  pub const fn empty() -> Self {
    Self::new(ptr::null_mut(), 0, Permissions::NONE)
  }

  pub fn base(&self) -> *mut u8 {
    self.base
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  pub fn permissions(&self) -> Permissions {
    self.permissions
  }

  /// Address one past the last byte.
  pub fn end(&self) -> usize {
    self.base as usize + self.len
  }

  pub fn contains_addr(
    &self,
    addr: *const u8,
  ) -> bool {
    let addr = addr as usize;
    addr >= self.base as usize && addr < self.end()
  }

  /// `true` when `other` lies entirely inside `self`.
  pub fn contains(
    &self,
    other: &MemoryRegion,
  ) -> bool {
    other.base as usize >= self.base as usize && other.end() <= self.end()
  }

  /// Splits at `offset` bytes. Both halves keep the permissions.
  pub fn split_at(
    &self,
    offset: usize,
  ) -> Option<(Self, Self)> {
    if offset > self.len {
      return None;
    }

    let head = Self::new(self.base, offset, self.permissions);
    let tail = Self::new(self.base.wrapping_add(offset), self.len - offset, self.permissions);

    Some((head, tail))
  }

  /// Drops any permission not in `allowed`.
  pub fn restrict(
    &self,
    allowed: Permissions,
  ) -> Self {
    Self::new(self.base, self.len, self.permissions & allowed)
  }

  /// The region's bytes, if it is readable.
  ///
  /// # Safety
  ///
  /// The region must describe live, initialized memory for the whole of
  /// `'a`, with no concurrent writer.
  pub unsafe fn as_slice<'a>(&self) -> Option<&'a [u8]> {
    if !self.permissions.contains(Permissions::READ) {
      return None;
    }
    if self.len == 0 {
      return Some(&[]);
    }
    Some(unsafe { slice::from_raw_parts(self.base, self.len) })
  }

  /// The region's bytes, mutably, if it is writable.
  ///
  /// # Safety
  ///
  /// The region must describe live memory for the whole of `'a` and nothing
  /// else may access it meanwhile.
  pub unsafe fn as_mut_slice<'a>(&self) -> Option<&'a mut [u8]> {
    if !self.permissions.contains(Permissions::WRITE) {
      return None;
    }
    if self.len == 0 {
      return Some(&mut []);
    }
    Some(unsafe { slice::from_raw_parts_mut(self.base, self.len) })
  }
}

impl Default for MemoryRegion {
  fn default() -> Self {
    Self::empty()
  }
}
