/// Rounds `value` up to the next multiple of `align`.
///
/// `align` must be a power of two. The caller is responsible for making sure
/// the result does not overflow; the arena checks its bounds before rounding.
///
/// # Examples
///
/// ```rust
/// use rcontainer::align_up;
///
/// assert_eq!(align_up!(13, 8), 16);
/// assert_eq!(align_up!(16, 8), 16);
/// assert_eq!(align_up!(1, 64), 64);
/// ```
#[macro_export]
macro_rules! align_up {
  ($value:expr, $align:expr) => {
    ($value + $align - 1) & !($align - 1)
  };
}
