use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc,
};

use parking_lot::Mutex;

use crate::{
  observable::{ConnectableObservable, Observable},
  observer::Observer,
  subject::Subject,
  subscription::{BoxSubscription, SingleAssignmentSubscription, SubscriptionLike},
};

/// Keeps a [`ConnectableObservable`] connected while it has subscribers.
///
/// The first subscriber connects, the last one leaving (or receiving a
/// terminal event) disconnects. Subscribers arriving afterwards start a new
/// connection.
pub struct RefCount<S, Sub> {
  connectable: ConnectableObservable<S, Sub>,
  state: Arc<Mutex<RefState>>,
}

#[derive(Default)]
struct RefState {
  count: usize,
  /// Bumped whenever the count leaves or reaches zero, so a connection made
  /// for an earlier generation is not kept.
  generation: u64,
  connection: Option<BoxSubscription>,
}

impl<S, Sub> RefCount<S, Sub> {
  pub(crate) fn new(connectable: ConnectableObservable<S, Sub>) -> Self {
    RefCount { connectable, state: Arc::default() }
  }
}

impl<S, Sub> Clone for RefCount<S, Sub> {
  fn clone(&self) -> Self {
    RefCount { connectable: self.connectable.clone(), state: self.state.clone() }
  }
}

impl<S, Sub> Observable for RefCount<S, Sub>
where
  S: Observable,
  Sub: Subject<Item = S::Item, Err = S::Err>,
{
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, observer: O) -> BoxSubscription
  where
    O: Observer<S::Item, S::Err> + 'static,
  {
    let (first, generation) = {
      let mut state = self.state.lock();
      state.count += 1;
      if state.count == 1 {
        state.generation += 1;
      }
      (state.count == 1, state.generation)
    };
    let lease = Arc::new(Lease { state: self.state.clone(), released: AtomicBool::new(false) });
    let subscription = SingleAssignmentSubscription::default();
    let handle = RefCountHandle { subscription: subscription.clone(), lease: lease.clone() };
    subscription.set_boxed(
      self.connectable.actual_subscribe(RefCountObserver { observer: Some(observer), lease }),
    );

    if first {
      tracing::debug!(generation, "ref_count connecting");
      let connection = self.connectable.connect();
      let mut state = self.state.lock();
      if state.generation == generation && state.count > 0 && state.connection.is_none() {
        state.connection = Some(connection);
      } else {
        drop(state);
        connection.unsubscribe();
      }
    }
    Box::new(handle)
  }
}

struct Lease {
  state: Arc<Mutex<RefState>>,
  released: AtomicBool,
}

impl Lease {
  fn release(&self) {
    if self.released.swap(true, Ordering::SeqCst) {
      return;
    }
    let connection = {
      let mut state = self.state.lock();
      state.count -= 1;
      if state.count > 0 {
        return;
      }
      state.generation += 1;
      state.connection.take()
    };
    if let Some(connection) = connection {
      tracing::debug!("ref_count disconnecting");
      connection.unsubscribe();
    }
  }
}

struct RefCountHandle {
  subscription: SingleAssignmentSubscription,
  lease: Arc<Lease>,
}

impl SubscriptionLike for RefCountHandle {
  fn unsubscribe(&self) {
    self.subscription.unsubscribe();
    self.lease.release();
  }

  fn is_closed(&self) -> bool { self.lease.released.load(Ordering::SeqCst) }
}

struct RefCountObserver<O> {
  observer: Option<O>,
  lease: Arc<Lease>,
}

impl<Item, Err, O> Observer<Item, Err> for RefCountObserver<O>
where
  O: Observer<Item, Err>,
{
  fn next(&mut self, value: Item) {
    if let Some(observer) = self.observer.as_mut() {
      observer.next(value);
    }
  }

  fn error(mut self, err: Err) {
    if let Some(observer) = self.observer.take() {
      observer.error(err);
    }
    self.lease.release();
  }

  fn complete(mut self) {
    if let Some(observer) = self.observer.take() {
      observer.complete();
    }
    self.lease.release();
  }

  fn is_closed(&self) -> bool { self.observer.as_ref().map_or(true, |o| o.is_closed()) }
}
