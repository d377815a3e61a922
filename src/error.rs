use thiserror::Error;

/// Result type local to rcontainer.
pub type Result<T, E = AllocError> = std::result::Result<T, E>;

/// Failure of an allocation-bound container operation.
///
/// Every variant except [`AllocError::ShrinkExceedsCapacity`] is reported to
/// the allocator's [`on_error`](crate::Allocator::on_error) hook before it is
/// returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocError {
  #[error("allocation of {bytes} bytes failed")]
  OutOfMemory { bytes: usize },

  #[error("capacity overflow: cannot add {amount} slots to capacity {capacity}")]
  CapacityOverflow { capacity: usize, amount: usize },

  #[error("cannot shrink by {amount} slots: capacity is {capacity}")]
  ShrinkExceedsCapacity { amount: usize, capacity: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
  #[error("default allocator is already configured or in use")]
  AlreadyConfigured,
}

#[derive(Debug, Error)]
pub enum StreamError {
  #[error("stream io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("unexpected end of stream: needed {needed} bytes, got {got}")]
  UnexpectedEnd { needed: usize, got: usize },

  #[error("sink accepted zero bytes")]
  WriteZero,

  #[error("stream has a parked error")]
  Parked,
}
