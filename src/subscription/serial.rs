use std::sync::Arc;

use parking_lot::Mutex;

use super::{BoxSubscription, SubscriptionLike};

/// A replaceable slot: assigning releases the previous value, and assigning
/// after unsubscribe releases the new one.
#[derive(Clone, Default)]
pub struct SerialSubscription(Arc<Mutex<SerialState>>);

#[derive(Default)]
struct SerialState {
  closed: bool,
  current: Option<BoxSubscription>,
}

impl SerialSubscription {
  pub fn new() -> Self { Self::default() }

  pub fn set(&self, subscription: impl SubscriptionLike + 'static) {
    self.set_boxed(Box::new(subscription))
  }

  pub fn set_boxed(&self, subscription: BoxSubscription) {
    let mut state = self.0.lock();
    let old = if state.closed {
      Some(subscription)
    } else {
      state.current.replace(subscription)
    };
    drop(state);
    if let Some(old) = old {
      old.unsubscribe();
    }
  }
}

impl SubscriptionLike for SerialSubscription {
  fn unsubscribe(&self) {
    let current = {
      let mut state = self.0.lock();
      state.closed = true;
      state.current.take()
    };
    if let Some(current) = current {
      current.unsubscribe();
    }
  }

  #[inline]
  fn is_closed(&self) -> bool { self.0.lock().closed }
}

#[cfg(test)]
mod test {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use super::*;
  use crate::subscription::FnSubscription;

  fn tagged(log: &Arc<parking_lot::Mutex<Vec<u8>>>, tag: u8) -> FnSubscription {
    let log = log.clone();
    FnSubscription::new(move || log.lock().push(tag))
  }

  #[test]
  fn replacement_releases_previous() {
    let log = Arc::new(parking_lot::Mutex::new(vec![]));
    let serial = SerialSubscription::new();
    serial.set(tagged(&log, 1));
    serial.set(tagged(&log, 2));
    assert_eq!(*log.lock(), vec![1]);
    serial.unsubscribe();
    assert_eq!(*log.lock(), vec![1, 2]);
    serial.set(tagged(&log, 3));
    assert_eq!(*log.lock(), vec![1, 2, 3]);
  }

  #[test]
  fn idempotent() {
    let hits = Arc::new(AtomicUsize::new(0));
    let serial = SerialSubscription::new();
    let c_hits = hits.clone();
    serial.set(FnSubscription::new(move || {
      c_hits.fetch_add(1, Ordering::SeqCst);
    }));
    serial.unsubscribe();
    serial.unsubscribe();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
  }
}
