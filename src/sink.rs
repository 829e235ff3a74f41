//! Per-subscription state shared by the stateful operators.
//!
//! A [`Sink`] owns the downstream observer and a [`CompositeSubscription`]
//! holding everything the subscription acquired upstream. The observer lock is
//! only held while a single event is being delivered; terminal events take the
//! observer out before calling it and then release the upstream tree.

use std::{marker::PhantomData, sync::Arc};

use parking_lot::Mutex;

use crate::{
  observer::Observer,
  subscription::{CompositeSubscription, SubscriptionLike},
};

pub(crate) struct Sink<O, Item, Err> {
  observer: Mutex<Option<O>>,
  cancel: CompositeSubscription,
  _hint: PhantomData<fn(Item, Err)>,
}

impl<O, Item, Err> Sink<O, Item, Err>
where
  O: Observer<Item, Err>,
{
  pub(crate) fn new(observer: O) -> Arc<Self> {
    Arc::new(Sink {
      observer: Mutex::new(Some(observer)),
      cancel: CompositeSubscription::default(),
      _hint: PhantomData,
    })
  }

  #[inline]
  pub(crate) fn cancel(&self) -> &CompositeSubscription { &self.cancel }

  #[inline]
  pub(crate) fn is_disposed(&self) -> bool { self.cancel.is_closed() }

  pub(crate) fn dispose(&self) { self.cancel.unsubscribe() }

  pub(crate) fn forward_next(&self, value: Item) {
    if self.is_disposed() {
      return;
    }
    if let Some(observer) = self.observer.lock().as_mut() {
      observer.next(value);
    }
  }

  pub(crate) fn forward_error(&self, err: Err) {
    let observer = self.observer.lock().take();
    if let Some(observer) = observer {
      if !self.is_disposed() {
        observer.error(err);
      }
    }
    self.dispose();
  }

  pub(crate) fn forward_complete(&self) {
    let observer = self.observer.lock().take();
    if let Some(observer) = observer {
      if !self.is_disposed() {
        observer.complete();
      }
    }
    self.dispose();
  }

  /// `true` once the downstream observer is gone or refuses more values.
  pub(crate) fn is_closed(&self) -> bool {
    if self.is_disposed() {
      return true;
    }
    match self.observer.try_lock() {
      Some(observer) => observer.as_ref().map_or(true, |o| o.is_closed()),
      // Locked means an event is in flight on this subscription.
      None => false,
    }
  }
}

/// Observer forwarding every event of one upstream subscription into a sink.
pub(crate) struct SinkObserver<O, Item, Err>(pub(crate) Arc<Sink<O, Item, Err>>);

impl<Item, Err, O> Observer<Item, Err> for SinkObserver<O, Item, Err>
where
  O: Observer<Item, Err>,
{
  #[inline]
  fn next(&mut self, value: Item) { self.0.forward_next(value) }
  #[inline]
  fn error(self, err: Err) { self.0.forward_error(err) }
  #[inline]
  fn complete(self) { self.0.forward_complete() }
  #[inline]
  fn is_closed(&self) -> bool { self.0.is_closed() }
}

#[cfg(test)]
mod test {
  use std::sync::atomic::{AtomicBool, Ordering};

  use super::*;
  use crate::{observer::ObserverAll, subscription::FnSubscription};

  #[test]
  fn terminal_releases_upstream() {
    let (tx, rx) = std::sync::mpsc::channel();
    let c_tx = tx.clone();
    let sink = Sink::new(ObserverAll::new(
      move |v: i32| c_tx.send(v).unwrap(),
      |_: ()| {},
      || {},
    ));
    let released = Arc::new(AtomicBool::new(false));
    let c_released = released.clone();
    sink
      .cancel()
      .add(FnSubscription::new(move || c_released.store(true, Ordering::SeqCst)));

    sink.forward_next(1);
    sink.forward_complete();
    sink.forward_next(2);
    drop(tx);
    assert_eq!(rx.iter().collect::<Vec<_>>(), vec![1]);
    assert!(released.load(Ordering::SeqCst));
    assert!(sink.is_closed());
  }

  #[test]
  fn disposed_sink_drops_events() {
    let (tx, rx) = std::sync::mpsc::channel();
    let sink = Sink::new(ObserverAll::new(
      move |v: i32| tx.send(v).unwrap(),
      |_: ()| panic!("no error expected"),
      || panic!("no completion expected"),
    ));
    sink.dispose();
    sink.forward_next(1);
    sink.forward_error(());
    sink.forward_complete();
    assert!(rx.try_recv().is_err());
  }
}
