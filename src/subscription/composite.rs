use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::{BoxSubscription, SubscriptionLike};

/// Key of a child added to a [`CompositeSubscription`], used to remove it
/// again before the composite itself is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionKey(usize);

/// Exclusive owner of a set of child subscriptions. Unsubscribing releases
/// every child; a child added after that is released on the spot.
#[derive(Clone, Default)]
pub struct CompositeSubscription(Arc<Mutex<Inner>>);

#[derive(Default)]
struct Inner {
  closed: bool,
  next_key: usize,
  teardown: SmallVec<[(usize, BoxSubscription); 1]>,
}

impl CompositeSubscription {
  pub fn new() -> Self { Self::default() }

  pub fn add<S: SubscriptionLike + 'static>(
    &self,
    subscription: S,
  ) -> SubscriptionKey {
    self.add_boxed(Box::new(subscription))
  }

  pub fn add_boxed(&self, subscription: BoxSubscription) -> SubscriptionKey {
    let mut inner = self.0.lock();
    let key = inner.next_key;
    inner.next_key += 1;
    if inner.closed {
      drop(inner);
      subscription.unsubscribe();
    } else {
      inner.teardown.push((key, subscription));
    }
    SubscriptionKey(key)
  }

  /// Detaches a child without releasing it.
  pub fn remove(&self, key: SubscriptionKey) -> Option<BoxSubscription> {
    let mut inner = self.0.lock();
    let idx = inner.teardown.iter().position(|(k, _)| *k == key.0)?;
    Some(inner.teardown.remove(idx).1)
  }

  /// Number of children currently owned.
  pub fn len(&self) -> usize { self.0.lock().teardown.len() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl SubscriptionLike for CompositeSubscription {
  fn unsubscribe(&self) {
    let teardown = {
      let mut inner = self.0.lock();
      if inner.closed {
        return;
      }
      inner.closed = true;
      std::mem::take(&mut inner.teardown)
    };
    for (_, child) in teardown {
      child.unsubscribe();
    }
  }

  #[inline]
  fn is_closed(&self) -> bool { self.0.lock().closed }
}
