//! Disposal primitives.
//!
//! Every `actual_subscribe` returns a [`BoxSubscription`]; releasing it must
//! be idempotent and safe from any thread. The tree shaped variants live in
//! the sub modules:
//!
//! - [`CompositeSubscription`]: owns a growing set of children, late additions
//!   are released immediately.
//! - [`SingleAssignmentSubscription`]: write-once slot.
//! - [`SerialSubscription`]: replaceable slot, the previous value is released.
//! - [`RefCountSubscription`]: released once the primary and every dependent
//!   are gone.

use std::{
  fmt::{Debug, Formatter},
  sync::Arc,
};

use parking_lot::Mutex;

mod composite;
mod ref_count;
mod serial;
mod single_assignment;

pub use composite::*;
pub use ref_count::*;
pub use serial::*;
pub use single_assignment::*;

/// Releases whatever a subscription holds, exactly once.
pub trait SubscriptionLike: Send + Sync {
  /// Stops the subscription. Later calls do nothing.
  fn unsubscribe(&self);

  /// `true` once released.
  fn is_closed(&self) -> bool;
}

pub type BoxSubscription = Box<dyn SubscriptionLike>;

impl Debug for dyn SubscriptionLike {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_tuple("Subscription").field(&self.is_closed()).finish()
  }
}

/// The subscription that owns nothing.
impl SubscriptionLike for () {
  #[inline]
  fn unsubscribe(&self) {}
  #[inline]
  fn is_closed(&self) -> bool { true }
}

impl<T: SubscriptionLike + ?Sized> SubscriptionLike for Box<T> {
  #[inline]
  fn unsubscribe(&self) { (**self).unsubscribe() }
  #[inline]
  fn is_closed(&self) -> bool { (**self).is_closed() }
}

impl<T: SubscriptionLike + ?Sized> SubscriptionLike for Arc<T> {
  #[inline]
  fn unsubscribe(&self) { (**self).unsubscribe() }
  #[inline]
  fn is_closed(&self) -> bool { (**self).is_closed() }
}

/// Runs a teardown closure the first time it is unsubscribed.
pub struct FnSubscription(Mutex<Option<Box<dyn FnOnce() + Send>>>);

impl FnSubscription {
  pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
    FnSubscription(Mutex::new(Some(Box::new(teardown))))
  }
}

impl SubscriptionLike for FnSubscription {
  fn unsubscribe(&self) {
    let teardown = self.0.lock().take();
    if let Some(teardown) = teardown {
      teardown();
    }
  }

  #[inline]
  fn is_closed(&self) -> bool { self.0.lock().is_none() }
}

/// What the `subscribe` helpers hand back. Dropping it leaves the
/// subscription running.
pub struct SubscriptionWrapper<S: SubscriptionLike>(pub(crate) S);

impl<S: SubscriptionLike> SubscriptionWrapper<S> {
  /// Ties the subscription to the returned guard: it is released when the
  /// guard goes out of scope. A guard bound to `_` is released at once.
  pub fn unsubscribe_when_dropped(self) -> SubscriptionGuard<S> { SubscriptionGuard(self.0) }

  pub fn into_inner(self) -> S { self.0 }
}

impl<S: SubscriptionLike> SubscriptionLike for SubscriptionWrapper<S> {
  #[inline]
  fn unsubscribe(&self) { self.0.unsubscribe() }
  #[inline]
  fn is_closed(&self) -> bool { self.0.is_closed() }
}

/// Releases the wrapped subscription on drop.
#[must_use]
pub struct SubscriptionGuard<S: SubscriptionLike>(pub(crate) S);

impl<S: SubscriptionLike> SubscriptionGuard<S> {
  pub fn new(subscription: S) -> Self { SubscriptionGuard(subscription) }
}

impl<S: SubscriptionLike> Drop for SubscriptionGuard<S> {
  fn drop(&mut self) { self.0.unsubscribe() }
}
