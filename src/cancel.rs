//! Cooperative cancellation.

use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc,
};

use crate::error::{FramecastError, Result};

/// A shared flag that long-running work polls to see if it should stop.
///
/// Clones share the same flag. Once cancelled, a token stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);
impl CancelToken {
  #[inline]
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Asks every holder of this token to stop.
  #[inline]
  pub fn cancel(&self) {
    self.0.store(true, Ordering::Relaxed);
  }

  #[inline]
  #[must_use]
  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::Relaxed)
  }

  /// `Err(Cancelled)` once [`cancel`](Self::cancel) has been called.
  #[inline]
  pub fn check(&self) -> Result<()> {
    if self.is_cancelled() {
      Err(FramecastError::Cancelled)
    } else {
      Ok(())
    }
  }
}

#[test]
fn test_clones_share_the_flag() {
  let a = CancelToken::new();
  let b = a.clone();
  assert!(a.check().is_ok());
  b.cancel();
  assert!(a.is_cancelled());
  assert!(a.check().unwrap_err().is_cancelled());
}
