//! Capability-typed byte streams.
//!
//! A [`Stream`] wraps anything implementing [`ByteSource`] and/or
//! [`ByteSink`] and is tagged with a capability marker. Read methods only
//! exist on readable streams and write methods only on writable ones, so a
//! `Stream<_, ReadOnly>` handed to a consumer cannot be written to.
//!
//! The stream keeps the C-style shape of read / write / end / error: `read`
//! and `write` report a byte count, the first failure is parked in the stream
//! and inspected with [`Stream::error`], and further transfers return 0 until
//! the error is taken.

use std::{io, marker::PhantomData};

use crate::{
  alloc::{Allocator, DefaultAllocator},
  error::{AllocError, StreamError},
  queue::Queue,
};

pub trait ByteSource {
  /// Reads up to `buf.len()` bytes. `Ok(0)` with a non-empty `buf` means
  /// nothing is available right now.
  fn read(
    &mut self,
    buf: &mut [u8],
  ) -> Result<usize, StreamError>;

  /// `true` once no further bytes will ever arrive.
  fn is_end(&self) -> bool;
}

pub trait ByteSink {
  fn write(
    &mut self,
    buf: &[u8],
  ) -> Result<usize, StreamError>;

  fn flush(&mut self) -> Result<(), StreamError> {
    Ok(())
  }
}

mod sealed {
  pub trait Sealed {}
}

/// Type-level access rights of a [`Stream`].
pub trait Capability: sealed::Sealed {}
pub trait Readable: Capability {}
pub trait Writable: Capability {}

#[derive(Debug, Clone, Copy)]
pub struct ReadOnly;
#[derive(Debug, Clone, Copy)]
pub struct WriteOnly;
#[derive(Debug, Clone, Copy)]
pub struct ReadWrite;

impl sealed::Sealed for ReadOnly {}
impl sealed::Sealed for WriteOnly {}
impl sealed::Sealed for ReadWrite {}
impl Capability for ReadOnly {}
impl Capability for WriteOnly {}
impl Capability for ReadWrite {}
impl Readable for ReadOnly {}
impl Readable for ReadWrite {}
impl Writable for WriteOnly {}
impl Writable for ReadWrite {}

pub type ReadStream<S> = Stream<S, ReadOnly>;
pub type WriteStream<S> = Stream<S, WriteOnly>;
pub type DuplexStream<S> = Stream<S, ReadWrite>;

#[derive(Debug)]
pub struct Stream<S, C: Capability> {
  inner: S,
  error: Option<StreamError>,
  _capability: PhantomData<C>,
}

impl<S, C: Capability> Stream<S, C> {
  pub fn new(inner: S) -> Self {
    Self {
      inner,
      error: None,
      _capability: PhantomData,
    }
  }

  pub fn get_ref(&self) -> &S {
    &self.inner
  }

  pub fn get_mut(&mut self) -> &mut S {
    &mut self.inner
  }

  pub fn into_inner(self) -> S {
    self.inner
  }

  /// The parked failure, if any.
  pub fn error(&self) -> Option<&StreamError> {
    self.error.as_ref()
  }

  /// Removes the parked failure so transfers resume.
  pub fn take_error(&mut self) -> Option<StreamError> {
    self.error.take()
  }

  fn park(
    &mut self,
    error: StreamError,
  ) {
    tracing::debug!(%error, "stream error");
    self.error = Some(error);
  }
}

impl<S: ByteSource, C: Readable> Stream<S, C> {
  /// Bytes read into `buf`; 0 on end of input or while an error is parked.
  pub fn read(
    &mut self,
    buf: &mut [u8],
  ) -> usize {
    if self.error.is_some() {
      return 0;
    }

    match self.inner.read(buf) {
      Ok(n) => n,
      Err(error) => {
        self.park(error);
        0
      }
    }
  }

  pub fn end(&self) -> bool {
    self.inner.is_end()
  }

  /// Fills `buf` completely or fails with what was missing. Refused with
  /// [`StreamError::Parked`] while an error is parked.
  pub fn read_exact(
    &mut self,
    buf: &mut [u8],
  ) -> Result<(), StreamError> {
    if self.error.is_some() {
      return Err(StreamError::Parked);
    }

    let mut filled = 0;

    while filled < buf.len() {
      let n = self.inner.read(&mut buf[filled..])?;
      if n == 0 {
        return Err(StreamError::UnexpectedEnd {
          needed: buf.len(),
          got: filled,
        });
      }
      filled += n;
    }

    Ok(())
  }
}

impl<S: ByteSink, C: Writable> Stream<S, C> {
  /// Bytes accepted from `buf`; 0 while an error is parked.
  pub fn write(
    &mut self,
    buf: &[u8],
  ) -> usize {
    if self.error.is_some() {
      return 0;
    }

    match self.inner.write(buf) {
      Ok(n) => n,
      Err(error) => {
        self.park(error);
        0
      }
    }
  }

  pub fn flush(&mut self) -> bool {
    match self.inner.flush() {
      Ok(()) => true,
      Err(error) => {
        self.park(error);
        false
      }
    }
  }

  /// Writes all of `buf`. Refused with [`StreamError::Parked`] while an
  /// error is parked.
  pub fn write_all(
    &mut self,
    mut buf: &[u8],
  ) -> Result<(), StreamError> {
    if self.error.is_some() {
      return Err(StreamError::Parked);
    }

    while !buf.is_empty() {
      let n = self.inner.write(buf)?;
      if n == 0 {
        return Err(StreamError::WriteZero);
      }
      buf = &buf[n..];
    }

    Ok(())
  }
}

/// A bounded in-memory pipe over a [`Queue<u8>`].
///
/// Writes stop when the queue is full and reads return what is queued. After
/// [`close`](QueueStream::close) writes fail and the source reports its end
/// once drained.
#[derive(Debug)]
pub struct QueueStream<A: Allocator = DefaultAllocator> {
  queue: Queue<u8, A>,
  closed: bool,
}

impl QueueStream {
  pub fn with_capacity(capacity: usize) -> Result<Self, AllocError> {
    Self::with_capacity_in(capacity, DefaultAllocator)
  }
}

impl<A: Allocator> QueueStream<A> {
  pub fn with_capacity_in(
    capacity: usize,
    alloc: A,
  ) -> Result<Self, AllocError> {
    Ok(Self {
      queue: Queue::with_capacity_in(capacity, alloc)?,
      closed: false,
    })
  }

  pub fn close(&mut self) {
    self.closed = true;
  }

  pub fn is_closed(&self) -> bool {
    self.closed
  }

  /// Bytes waiting to be read.
  pub fn len(&self) -> usize {
    self.queue.len()
  }

  pub fn is_empty(&self) -> bool {
    self.queue.is_empty()
  }

  /// Makes room for `amount` more bytes without losing queued ones.
  pub fn grow_by(
    &mut self,
    amount: usize,
  ) -> Result<(), AllocError> {
    self.queue.grow_by(amount)
  }

  pub fn queue(&self) -> &Queue<u8, A> {
    &self.queue
  }
}

impl<A: Allocator> ByteSource for QueueStream<A> {
  fn read(
    &mut self,
    buf: &mut [u8],
  ) -> Result<usize, StreamError> {
    let mut count = 0;

    for slot in buf.iter_mut() {
      let Some(byte) = self.queue.pop() else {
        break;
      };
      *slot = byte;
      count += 1;
    }

    Ok(count)
  }

  fn is_end(&self) -> bool {
    self.closed && self.queue.is_empty()
  }
}

impl<A: Allocator> ByteSink for QueueStream<A> {
  fn write(
    &mut self,
    buf: &[u8],
  ) -> Result<usize, StreamError> {
    if self.closed {
      return Err(io::Error::from(io::ErrorKind::BrokenPipe).into());
    }

    let mut count = 0;

    for byte in buf {
      if self.queue.push(*byte).is_err() {
        break;
      }
      count += 1;
    }

    Ok(count)
  }
}
