//! Error kinds raised by the library itself.
//!
//! Source errors and selector errors travel as the generic `Err` parameter of a
//! stream. The operators below that detect an invariant violation of their own
//! require `Err: From<RxError>` so the violation can join that stream.

use thiserror::Error;

/// A library invariant violated while a sequence was running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum RxError {
  #[error("sequence contains no elements")]
  NoElements,
  #[error("sequence contains more than one element")]
  MoreThanOneElement,
  #[error("argument out of range")]
  ArgumentOutOfRange,
  #[error("sequence timeout")]
  Timeout,
}

/// Failure to bring up a real scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
  #[error("failed to spawn scheduler worker: {0}")]
  Spawn(#[from] std::io::Error),
  #[cfg(feature = "tokio-scheduler")]
  #[error("no tokio runtime available: {0}")]
  NoRuntime(#[from] tokio::runtime::TryCurrentError),
}
