/// Runs a closure when dropped, unless cancelled first.
///
/// ```rust
/// use std::cell::Cell;
/// use rcontainer::defer;
///
/// let released = Cell::new(false);
/// {
///     let _guard = defer(|| released.set(true));
/// }
/// assert!(released.get());
/// ```
#[must_use = "the action runs as soon as an unbound guard is dropped"]
pub struct Defer<F: FnOnce()> {
  action: Option<F>,
}

impl<F: FnOnce()> Defer<F> {
  pub fn new(action: F) -> Self {
    Self {
      action: Some(action),
    }
  }

  /// Disarms the guard; the action never runs.
  pub fn cancel(mut self) {
    self.action = None;
  }
}

impl<F: FnOnce()> Drop for Defer<F> {
  fn drop(&mut self) {
    if let Some(action) = self.action.take() {
      action();
    }
  }
}

pub fn defer<F: FnOnce()>(action: F) -> Defer<F> {
  Defer::new(action)
}
