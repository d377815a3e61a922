//! # rcontainer - Allocator-Agnostic Containers
//!
//! This crate provides a growable contiguous buffer ([`Array`]) and a
//! circular queue built on top of it ([`Queue`]). Neither is tied to a memory
//! manager: both are parameterized by an [`Allocator`], and a process-wide
//! default stands in when none is named.
//!
//! ## Overview
//!
//! ```text
//!   Layering:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │  Queue<T, A>      ring semantics: push / pop / peek / grow / shrink  │
//!   │      │                                                               │
//!   │      ▼                                                               │
//!   │  Array<T, A>      block of T: capacity + occupancy                   │
//!   │      │                                                               │
//!   │      ▼                                                               │
//!   │  A: Allocator     allocate / reallocate / deallocate / on_error      │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The queue stores no item counter. Its write cursor is the array's
//! occupancy, and "full" is encoded by parking that cursor at `capacity`, one
//! past the last slot:
//!
//! ```text
//!   capacity 4, after push 1, 2, 3, 4 then pop:
//!
//!   ┌─────┬─────┬─────┬─────┐
//!   │  1  │  2  │  3  │  4  │  head = 4 (full)  ──pop──►  head = 0, tail = 1
//!   └─────┴─────┴─────┴─────┘
//!     ▲ tail
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   rcontainer
//!   ├── alloc      - Allocator trait, default allocator, function bundles
//!   ├── array      - Array<T, A>, the growable buffer
//!   ├── queue      - Queue<T, A>, the circular queue
//!   ├── arena      - ArenaAllocator, a first-fit allocator over one region
//!   ├── block      - Arena block header (internal)
//!   ├── align      - Alignment macro (align_up!)
//!   ├── region     - MemoryRegion and Permissions
//!   ├── stream     - Capability-typed byte streams, QueueStream
//!   ├── file       - POSIX file binding for the stream traits
//!   ├── defer      - Scoped cleanup
//!   └── error      - AllocError, ConfigError, StreamError
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use rcontainer::Queue;
//!
//! let mut queue = Queue::with_capacity(4).unwrap();
//! for item in 1..=4u32 {
//!     queue.push(item).unwrap();
//! }
//! assert!(queue.is_full());
//! assert_eq!(queue.push(5), Err(5));
//!
//! assert_eq!(queue.pop(), Some(1));
//! queue.push(5).unwrap();
//!
//! queue.grow_by(4).unwrap();
//! assert_eq!(queue.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4, 5]);
//! ```
//!
//! ## Choosing an Allocator
//!
//! ```rust
//! use rcontainer::{Array, ArenaAllocator, AllocError};
//!
//! // A 256-byte arena puts a hard ceiling on the array.
//! let arena = ArenaAllocator::new(256).unwrap();
//! let mut array = Array::with_capacity_in(8, &arena).unwrap();
//! array.push(1u64).unwrap();
//!
//! assert!(matches!(array.grow_by(1024), Err(AllocError::OutOfMemory { .. })));
//! assert_eq!(array.capacity(), 8);
//! ```
//!
//! The default allocator is `malloc`/`realloc`/`free` unless another bundle
//! is installed with [`configure_default_allocator`] before first use.
//!
//! ## Failure Model
//!
//! - **Allocation failure** returns [`AllocError`], leaves the container
//!   exactly as it was, and fires the allocator's
//!   [`on_error`](Allocator::on_error) hook once.
//! - **Shrinking past the capacity** returns
//!   [`AllocError::ShrinkExceedsCapacity`] without touching the allocator.
//! - **Full and empty** are not errors: pushing into a full queue hands the
//!   item back and popping an empty one returns `None`.
//! - **Shrinking** a queue can drop items stored in the removed slots. That
//!   is part of the contract, not a failure.
//!
//! ## Limitations
//!
//! - **Single-threaded**: containers need external locking to be shared.
//! - **`Copy + Default` elements only**: nothing is ever dropped in place,
//!   and fresh slots are filled with `T::default()`.
//! - **Unix-only**: the default allocator and [`PosixFile`] use `libc`.

pub mod align;
pub mod alloc;
pub mod arena;
pub mod array;
mod block;
pub mod defer;
pub mod error;
pub mod file;
pub mod queue;
pub mod region;
pub mod stream;

pub use alloc::{
  Allocator, AllocatorFns, DefaultAllocator, FnAllocator, WithErrorHandler, configure_default_allocator,
  default_allocator_fns,
};
pub use arena::ArenaAllocator;
pub use array::Array;
pub use defer::{Defer, defer};
pub use error::{AllocError, ConfigError, Result, StreamError};
pub use file::{OpenOptions, PosixFile};
pub use queue::{Queue, RingState};
pub use region::{MemoryRegion, Permissions};
pub use stream::{ByteSink, ByteSource, QueueStream, Stream};
