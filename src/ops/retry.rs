//! Resubscribing after errors.
//!
//! How often and how late `retry` resubscribes is decided by a
//! [`RetryPolicy`]. A plain `usize` is the number of attempts in total;
//! [`RetryConfig`] adds delays, exponential backoff and resetting the count
//! once the source produced a value again.
//!
//! ```rust
//! use std::sync::{
//!   atomic::{AtomicUsize, Ordering},
//!   Arc,
//! };
//!
//! use rxkit::prelude::*;
//!
//! let attempts = Arc::new(AtomicUsize::new(0));
//! let c_attempts = attempts.clone();
//! let source = observable::create(move |emitter: Emitter<i32, &'static str>| {
//!   if c_attempts.fetch_add(1, Ordering::SeqCst) < 2 {
//!     emitter.error("flaky");
//!   } else {
//!     emitter.next(1);
//!     emitter.complete();
//!   }
//! });
//!
//! let (tx, rx) = std::sync::mpsc::channel();
//! source.retry(3).subscribe(move |v| tx.send(v).unwrap());
//! assert_eq!(rx.try_recv(), Ok(1));
//! assert_eq!(attempts.load(Ordering::SeqCst), 3);
//! ```
//!
//! A policy can look at the error, e.g. only retrying server failures:
//!
//! ```rust
//! use rxkit::{ops::retry::RetryPolicy, scheduler::Duration};
//!
//! #[derive(Clone)]
//! struct ServerErrors;
//!
//! impl RetryPolicy<u16> for ServerErrors {
//!   fn should_retry(&self, status: &u16, attempt: usize) -> Option<Duration> {
//!     match status {
//!       500..=599 if attempt < 3 => Some(Duration::from_millis(200)),
//!       _ => None,
//!     }
//!   }
//! }
//! ```

use std::sync::{
  atomic::{AtomicU64, AtomicUsize, Ordering},
  Arc,
};

use crate::{
  observable::Observable,
  observer::Observer,
  scheduler::{Duration, Scheduler},
  sink::Sink,
  subscription::{BoxSubscription, SerialSubscription, SingleAssignmentSubscription},
};

/// Decides whether an error is retried and how long to wait first.
pub trait RetryPolicy<Err>: Clone + Send + Sync + 'static {
  /// `attempt` is the number of errors seen so far, starting at 1 for the
  /// first one. `None` delivers `err` downstream.
  fn should_retry(&self, err: &Err, attempt: usize) -> Option<Duration>;

  /// Whether a value from the source resets the error count.
  fn reset_on_success(&self) -> bool { false }

  /// Upper bound of subscriptions, if any. With `Some(0)` the sequence
  /// completes without subscribing the source.
  fn max_attempts(&self) -> Option<usize> { None }
}

/// `n` attempts in total, resubscribing right away.
impl<Err> RetryPolicy<Err> for usize {
  fn should_retry(&self, _err: &Err, attempt: usize) -> Option<Duration> {
    if attempt < *self { Some(Duration::ZERO) } else { None }
  }

  fn max_attempts(&self) -> Option<usize> { Some(*self) }
}

/// Builder for a [`RetryPolicy`] with delays.
///
/// ```rust
/// use rxkit::{ops::retry::RetryConfig, scheduler::Duration};
///
/// let config = RetryConfig::new()
///   .count(5)
///   .delay(Duration::from_millis(100))
///   .backoff(2.0, Duration::from_secs(2))
///   .reset_on_success();
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
  count: Option<usize>,
  delay: Duration,
  backoff: Option<(f64, Duration)>,
  reset_on_success: bool,
}

impl RetryConfig {
  /// Retries forever, without delay.
  pub fn new() -> Self {
    RetryConfig { count: None, delay: Duration::ZERO, backoff: None, reset_on_success: false }
  }

  /// Total number of attempts, the first subscription included.
  pub fn count(mut self, count: usize) -> Self {
    self.count = Some(count);
    self
  }

  /// Wait before every resubscription.
  pub fn delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  /// Multiplies the delay by `factor` after each failed attempt, never
  /// waiting longer than `max_delay`.
  pub fn backoff(mut self, factor: f64, max_delay: Duration) -> Self {
    self.backoff = Some((factor, max_delay));
    self
  }

  pub fn reset_on_success(mut self) -> Self {
    self.reset_on_success = true;
    self
  }

  fn delay_for(&self, attempt: usize) -> Duration {
    match self.backoff {
      None => self.delay,
      Some((factor, max_delay)) => {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as usize) as i32;
        let secs = self.delay.as_secs_f64() * factor.powi(exponent);
        if !secs.is_finite() || secs >= max_delay.as_secs_f64() {
          max_delay
        } else {
          Duration::from_secs_f64(secs.max(0.))
        }
      }
    }
  }
}

impl Default for RetryConfig {
  fn default() -> Self { Self::new() }
}

impl<Err> RetryPolicy<Err> for RetryConfig {
  fn should_retry(&self, _err: &Err, attempt: usize) -> Option<Duration> {
    match self.count {
      Some(count) if attempt >= count => None,
      _ => Some(self.delay_for(attempt)),
    }
  }

  fn reset_on_success(&self) -> bool { self.reset_on_success }

  fn max_attempts(&self) -> Option<usize> { self.count }
}

pub struct Retry<S, P, Sch> {
  source: Arc<S>,
  policy: P,
  scheduler: Sch,
}

impl<S, P, Sch> Retry<S, P, Sch> {
  pub(crate) fn new(source: S, policy: P, scheduler: Sch) -> Self {
    Retry { source: Arc::new(source), policy, scheduler }
  }
}

impl<S, P: Clone, Sch: Clone> Clone for Retry<S, P, Sch> {
  fn clone(&self) -> Self {
    Retry {
      source: self.source.clone(),
      policy: self.policy.clone(),
      scheduler: self.scheduler.clone(),
    }
  }
}

impl<S, P, Sch> Observable for Retry<S, P, Sch>
where
  S: Observable,
  P: RetryPolicy<S::Err>,
  Sch: Scheduler,
{
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, observer: O) -> BoxSubscription
  where
    O: Observer<S::Item, S::Err> + 'static,
  {
    if self.policy.max_attempts() == Some(0) {
      observer.complete();
      return Box::new(());
    }
    let state = Arc::new(RetryState {
      sink: Sink::new(observer),
      source: self.source.clone(),
      policy: self.policy.clone(),
      scheduler: self.scheduler.clone(),
      errors: AtomicUsize::new(0),
      generation: AtomicU64::new(0),
      current: SerialSubscription::default(),
      timer: SerialSubscription::default(),
    });
    state.sink.cancel().add(state.current.clone());
    state.sink.cancel().add(state.timer.clone());
    state.subscribe_source();
    Box::new(state.sink.cancel().clone())
  }
}

struct RetryState<O, S: Observable, P, Sch> {
  sink: Arc<Sink<O, S::Item, S::Err>>,
  source: Arc<S>,
  policy: P,
  scheduler: Sch,
  errors: AtomicUsize,
  generation: AtomicU64,
  current: SerialSubscription,
  timer: SerialSubscription,
}

impl<O, S, P, Sch> RetryState<O, S, P, Sch>
where
  O: Observer<S::Item, S::Err> + 'static,
  S: Observable,
  P: RetryPolicy<S::Err>,
  Sch: Scheduler,
{
  fn subscribe_source(self: &Arc<Self>) {
    if self.sink.is_disposed() {
      return;
    }
    let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
    let slot = SingleAssignmentSubscription::default();
    self.current.set(slot.clone());
    let observer = RetryObserver { state: self.clone(), generation };
    slot.set_boxed(self.source.actual_subscribe(observer));
  }

  fn on_error(self: &Arc<Self>, err: S::Err) {
    let attempt = self.errors.fetch_add(1, Ordering::SeqCst) + 1;
    let Some(delay) = self.policy.should_retry(&err, attempt) else {
      self.sink.forward_error(err);
      return;
    };
    tracing::debug!(attempt, ?delay, "retry resubscribing");
    // Release the failed subscription right away, whatever the delay.
    self.current.set(());
    let state = self.clone();
    let handle = if delay.is_zero() {
      self.scheduler.schedule(state, |state| {
        state.subscribe_source();
        Box::new(())
      })
    } else {
      self.scheduler.schedule_relative(state, delay, |state| {
        state.subscribe_source();
        Box::new(())
      })
    };
    self.timer.set_boxed(handle);
  }
}

struct RetryObserver<O, S: Observable, P, Sch> {
  state: Arc<RetryState<O, S, P, Sch>>,
  generation: u64,
}

impl<O, S: Observable, P, Sch> RetryObserver<O, S, P, Sch> {
  fn is_current(&self) -> bool {
    self.state.generation.load(Ordering::SeqCst) == self.generation
  }
}

impl<O, S, P, Sch> Observer<S::Item, S::Err> for RetryObserver<O, S, P, Sch>
where
  O: Observer<S::Item, S::Err> + 'static,
  S: Observable,
  P: RetryPolicy<S::Err>,
  Sch: Scheduler,
{
  fn next(&mut self, value: S::Item) {
    if !self.is_current() {
      return;
    }
    if self.state.policy.reset_on_success() {
      self.state.errors.store(0, Ordering::SeqCst);
    }
    self.state.sink.forward_next(value);
  }

  fn error(self, err: S::Err) {
    if self.is_current() {
      self.state.on_error(err);
    }
  }

  fn complete(self) {
    if self.is_current() {
      self.state.sink.forward_complete();
    }
  }

  fn is_closed(&self) -> bool { self.state.sink.is_closed() }
}
