use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc,
};

use parking_lot::Mutex;

use super::{BoxSubscription, SubscriptionLike};

/// Shared ownership of an underlying subscription.
///
/// The underlying subscription is released once the primary handle has been
/// unsubscribed *and* every dependent obtained from [`retain`] has been
/// released, in whichever order that happens.
///
/// [`retain`]: RefCountSubscription::retain
#[derive(Clone)]
pub struct RefCountSubscription(Arc<Mutex<RefCountState>>);

struct RefCountState {
  primary_released: bool,
  dependents: usize,
  underlying: Option<BoxSubscription>,
}

impl RefCountSubscription {
  pub fn new(underlying: impl SubscriptionLike + 'static) -> Self {
    RefCountSubscription(Arc::new(Mutex::new(RefCountState {
      primary_released: false,
      dependents: 0,
      underlying: Some(Box::new(underlying)),
    })))
  }

  /// Returns a dependent handle that keeps the underlying subscription alive
  /// until it is released. Once the underlying subscription is gone the
  /// returned handle owns nothing.
  pub fn retain(&self) -> BoxSubscription {
    let mut state = self.0.lock();
    if state.underlying.is_none() {
      return Box::new(());
    }
    state.dependents += 1;
    Box::new(Dependent {
      parent: self.0.clone(),
      released: AtomicBool::new(false),
    })
  }

  pub fn is_primary_released(&self) -> bool { self.0.lock().primary_released }
}

impl SubscriptionLike for RefCountSubscription {
  fn unsubscribe(&self) {
    let underlying = {
      let mut state = self.0.lock();
      if state.primary_released {
        return;
      }
      state.primary_released = true;
      if state.dependents == 0 {
        state.underlying.take()
      } else {
        None
      }
    };
    if let Some(underlying) = underlying {
      underlying.unsubscribe();
    }
  }

  #[inline]
  fn is_closed(&self) -> bool { self.0.lock().underlying.is_none() }
}

struct Dependent {
  parent: Arc<Mutex<RefCountState>>,
  released: AtomicBool,
}

impl SubscriptionLike for Dependent {
  fn unsubscribe(&self) {
    if self.released.swap(true, Ordering::AcqRel) {
      return;
    }
    let underlying = {
      let mut state = self.parent.lock();
      state.dependents -= 1;
      if state.primary_released && state.dependents == 0 {
        state.underlying.take()
      } else {
        None
      }
    };
    if let Some(underlying) = underlying {
      underlying.unsubscribe();
    }
  }

  #[inline]
  fn is_closed(&self) -> bool { self.released.load(Ordering::Acquire) }
}

#[cfg(test)]
mod test {
  use std::sync::atomic::AtomicUsize;

  use super::*;
  use crate::subscription::FnSubscription;

  fn fixture() -> (RefCountSubscription, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let c_hits = hits.clone();
    let rc = RefCountSubscription::new(FnSubscription::new(move || {
      c_hits.fetch_add(1, Ordering::SeqCst);
    }));
    (rc, hits)
  }

  #[test]
  fn primary_only() {
    let (rc, hits) = fixture();
    rc.unsubscribe();
    rc.unsubscribe();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(rc.is_closed());
  }

  #[test]
  fn waits_for_dependents() {
    let (rc, hits) = fixture();
    let d1 = rc.retain();
    let d2 = rc.retain();
    rc.unsubscribe();
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    d1.unsubscribe();
    d1.unsubscribe();
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    d2.unsubscribe();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn dependents_before_primary() {
    let (rc, hits) = fixture();
    let d1 = rc.retain();
    d1.unsubscribe();
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert!(!rc.is_primary_released());
    rc.unsubscribe();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    let late = rc.retain();
    assert!(late.is_closed());
  }
}
