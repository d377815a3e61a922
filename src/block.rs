/// Header placed immediately in front of every block the arena hands out.
///
/// ```text
///   ┌──────────┬──────────────┬─────────────────────────┐
///   │   pad    │ Block header │   size usable bytes     │
///   └──────────┴──────────────┴─────────────────────────┘
///   ▲ start                   ▲ returned pointer
/// ```
pub struct Block {
  /// Usable bytes after the header.
  pub size: usize,
  /// Bytes skipped in front of the header to align the returned pointer.
  pub pad: usize,
  pub is_free: bool,
  pub next: *mut Block,
}

impl Block {
  pub const HEADER: usize = std::mem::size_of::<Block>();

  pub fn new(
    size: usize,
    pad: usize,
  ) -> Self {
    Self {
      size,
      pad,
      is_free: false,
      next: std::ptr::null_mut(),
    }
  }

  /// Pointer handed to the caller for the block whose header is at `block`.
  ///
  /// # Safety
  ///
  /// `block` must point at a header inside the arena.
  pub unsafe fn data(block: *mut Block) -> *mut u8 {
    unsafe { (block as *mut u8).add(Self::HEADER) }
  }

  /// Header belonging to a pointer previously returned by [`Block::data`].
  ///
  /// # Safety
  ///
  /// `data` must have come from [`Block::data`].
  pub unsafe fn from_data(data: *mut u8) -> *mut Block {
    unsafe { data.sub(Self::HEADER) as *mut Block }
  }

  /// First byte this block occupies, padding included.
  ///
  /// # Safety
  ///
  /// `block` must point at a live header.
  pub unsafe fn start(block: *mut Block) -> *mut u8 {
    unsafe { (block as *mut u8).sub((*block).pad) }
  }
}
