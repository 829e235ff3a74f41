use std::sync::Arc;

use parking_lot::Mutex;

use super::{BoxSubscription, SubscriptionLike};

/// A write-once slot. A value assigned after the slot was unsubscribed is
/// released immediately.
#[derive(Clone, Default)]
pub struct SingleAssignmentSubscription(Arc<Mutex<Slot>>);

#[derive(Default)]
enum Slot {
  #[default]
  Empty,
  Assigned(BoxSubscription),
  Disposed,
}

impl SingleAssignmentSubscription {
  pub fn new() -> Self { Self::default() }

  /// # Panics
  ///
  /// Panics if a value was already assigned.
  pub fn set(&self, subscription: impl SubscriptionLike + 'static) {
    self.set_boxed(Box::new(subscription))
  }

  pub fn set_boxed(&self, subscription: BoxSubscription) {
    let mut slot = self.0.lock();
    match &*slot {
      Slot::Empty => *slot = Slot::Assigned(subscription),
      Slot::Disposed => {
        drop(slot);
        subscription.unsubscribe();
      }
      Slot::Assigned(_) => {
        panic!("SingleAssignmentSubscription can only be assigned once")
      }
    }
  }
}

impl SubscriptionLike for SingleAssignmentSubscription {
  fn unsubscribe(&self) {
    let prev = std::mem::replace(&mut *self.0.lock(), Slot::Disposed);
    if let Slot::Assigned(s) = prev {
      s.unsubscribe();
    }
  }

  #[inline]
  fn is_closed(&self) -> bool { matches!(*self.0.lock(), Slot::Disposed) }
}
