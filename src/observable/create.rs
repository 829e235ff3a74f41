use std::{marker::PhantomData, sync::Arc};

use crate::{
  observable::Observable,
  observer::{BoxObserver, Observer},
  sink::Sink,
  subscription::{BoxSubscription, SubscriptionLike},
};

/// Creates an observable from a subscribe function.
///
/// `subscribe` runs once per subscription with an [`Emitter`] bound to that
/// subscriber; the subscription it returns is released when the subscriber
/// unsubscribes or once a terminal event went through the emitter.
///
/// ```
/// use rxkit::prelude::*;
///
/// observable::create(|emitter: Emitter<i32, ()>| {
///   emitter.next(1);
///   emitter.next(2);
///   emitter.complete();
/// })
/// .subscribe(|v| println!("{}", v));
/// ```
pub fn create<Item, Err, F, R>(subscribe: F) -> Create<F, Item, Err>
where
  F: Fn(Emitter<Item, Err>) -> R,
  R: SubscriptionLike + 'static,
{
  Create { subscribe: Arc::new(subscribe), _hint: PhantomData }
}

pub struct Create<F, Item, Err> {
  subscribe: Arc<F>,
  _hint: PhantomData<fn() -> (Item, Err)>,
}

impl<F, Item, Err> Clone for Create<F, Item, Err> {
  fn clone(&self) -> Self {
    Create { subscribe: self.subscribe.clone(), _hint: PhantomData }
  }
}

/// Handle given to a [`create`] subscribe function. Clones feed the same
/// subscriber; everything after the first terminal event is dropped.
pub struct Emitter<Item, Err>(Arc<Sink<BoxObserver<Item, Err>, Item, Err>>);

impl<Item, Err> Clone for Emitter<Item, Err> {
  fn clone(&self) -> Self { Emitter(self.0.clone()) }
}

impl<Item, Err> Emitter<Item, Err> {
  pub fn next(&self, value: Item) { self.0.forward_next(value) }

  pub fn error(&self, err: Err) { self.0.forward_error(err) }

  pub fn complete(&self) { self.0.forward_complete() }

  /// `true` once the subscriber is gone, producers should stop.
  pub fn is_closed(&self) -> bool { self.0.is_closed() }
}

impl<F, R, Item, Err> Observable for Create<F, Item, Err>
where
  F: Fn(Emitter<Item, Err>) -> R + Send + Sync + 'static,
  R: SubscriptionLike + 'static,
  Item: Send + 'static,
  Err: Send + 'static,
{
  type Item = Item;
  type Err = Err;

  fn actual_subscribe<O>(&self, observer: O) -> BoxSubscription
  where
    O: Observer<Item, Err> + 'static,
  {
    let boxed: BoxObserver<Item, Err> = Box::new(observer);
    let sink = Sink::new(boxed);
    let teardown = (self.subscribe)(Emitter(sink.clone()));
    sink.cancel().add(teardown);
    Box::new(sink.cancel().clone())
  }
}

#[cfg(test)]
mod test {
  use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  };

  use parking_lot::Mutex;

  use crate::{prelude::*, subscription::FnSubscription};

  #[test]
  fn emits_and_stops_after_terminal() {
    let values = Arc::new(Mutex::new(vec![]));
    let c_values = values.clone();
    observable::create(|emitter: Emitter<i32, &'static str>| {
      emitter.next(1);
      emitter.next(2);
      emitter.error("boom");
      emitter.next(3);
      emitter.complete();
    })
    .subscribe_err(move |v| c_values.lock().push(v), |e| assert_eq!(e, "boom"));
    assert_eq!(*values.lock(), vec![1, 2]);
  }

  #[test]
  fn teardown_on_unsubscribe() {
    let torn_down = Arc::new(AtomicBool::new(false));
    let c_torn_down = torn_down.clone();
    let emitter_slot = Arc::new(Mutex::new(None));
    let c_slot = emitter_slot.clone();
    let subscription = observable::create(move |emitter: Emitter<i32, ()>| {
      *c_slot.lock() = Some(emitter);
      let flag = c_torn_down.clone();
      FnSubscription::new(move || flag.store(true, Ordering::SeqCst))
    })
    .subscribe(|_| {});
    assert!(!torn_down.load(Ordering::SeqCst));
    subscription.unsubscribe();
    assert!(torn_down.load(Ordering::SeqCst));
    let emitter = emitter_slot.lock().take();
    assert!(emitter.map_or(false, |e| e.is_closed()));
  }

  #[test]
  fn teardown_after_completion() {
    let torn_down = Arc::new(AtomicBool::new(false));
    let c_torn_down = torn_down.clone();
    observable::create(move |emitter: Emitter<i32, ()>| {
      emitter.complete();
      let flag = c_torn_down.clone();
      FnSubscription::new(move || flag.store(true, Ordering::SeqCst))
    })
    .subscribe(|_| {});
    assert!(torn_down.load(Ordering::SeqCst));
  }
}
