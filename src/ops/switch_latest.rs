use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
  observable::Observable,
  observer::Observer,
  sink::Sink,
  subscription::{
    BoxSubscription, SerialSubscription, SingleAssignmentSubscription,
    SubscriptionLike,
  },
};

#[derive(Clone)]
pub struct SwitchLatest<S> {
  pub(crate) source: S,
}

impl<S, Inner> Observable for SwitchLatest<S>
where
  S: Observable<Item = Inner>,
  Inner: Observable<Err = S::Err>,
{
  type Item = Inner::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, observer: O) -> BoxSubscription
  where
    O: Observer<Inner::Item, S::Err> + 'static,
  {
    let state = Arc::new(SwitchState {
      sink: Sink::new(observer),
      data: Mutex::new(SwitchData { latest: 0, has_latest: false, outer_done: false }),
      outer: SingleAssignmentSubscription::default(),
      inner: SerialSubscription::default(),
    });
    state.sink.cancel().add(state.outer.clone());
    state.sink.cancel().add(state.inner.clone());
    let subscription = self.source.actual_subscribe(OuterObserver(state.clone()));
    state.outer.set_boxed(subscription);
    Box::new(state.sink.cancel().clone())
  }
}

struct SwitchState<O, Item, Err> {
  sink: Arc<Sink<O, Item, Err>>,
  data: Mutex<SwitchData>,
  outer: SingleAssignmentSubscription,
  inner: SerialSubscription,
}

struct SwitchData {
  latest: u64,
  has_latest: bool,
  outer_done: bool,
}

struct OuterObserver<O, Item, Err>(Arc<SwitchState<O, Item, Err>>);

impl<O, Inner> Observer<Inner, Inner::Err> for OuterObserver<O, Inner::Item, Inner::Err>
where
  O: Observer<Inner::Item, Inner::Err> + 'static,
  Inner: Observable,
{
  fn next(&mut self, inner: Inner) {
    let state = &self.0;
    let id = {
      let mut data = state.data.lock();
      data.latest += 1;
      data.has_latest = true;
      data.latest
    };
    // Replacing the slot releases the previous inner subscription first.
    let slot = SingleAssignmentSubscription::default();
    state.inner.set(slot.clone());
    let observer = InnerObserver { state: state.clone(), id, slot: slot.clone() };
    slot.set_boxed(inner.actual_subscribe(observer));
  }

  fn error(self, err: Inner::Err) { self.0.sink.forward_error(err) }

  fn complete(self) {
    let state = &self.0;
    let finished = {
      let mut data = state.data.lock();
      data.outer_done = true;
      !data.has_latest
    };
    if finished {
      state.sink.forward_complete();
    } else {
      state.outer.unsubscribe();
    }
  }

  fn is_closed(&self) -> bool { self.0.sink.is_closed() }
}

struct InnerObserver<O, Item, Err> {
  state: Arc<SwitchState<O, Item, Err>>,
  id: u64,
  slot: SingleAssignmentSubscription,
}

impl<O, Item, Err> InnerObserver<O, Item, Err> {
  fn is_latest(&self) -> bool { self.state.data.lock().latest == self.id }
}

impl<O, Item, Err> Observer<Item, Err> for InnerObserver<O, Item, Err>
where
  O: Observer<Item, Err>,
  Item: Send,
  Err: Send,
{
  fn next(&mut self, value: Item) {
    if self.is_latest() {
      self.state.sink.forward_next(value);
    }
  }

  fn error(self, err: Err) {
    if self.is_latest() {
      self.state.sink.forward_error(err);
    }
  }

  fn complete(self) {
    let finished = {
      let mut data = self.state.data.lock();
      if data.latest != self.id {
        return;
      }
      data.has_latest = false;
      data.outer_done
    };
    if finished {
      self.state.sink.forward_complete();
    } else {
      self.slot.unsubscribe();
    }
  }

  fn is_closed(&self) -> bool { self.state.sink.is_closed() }
}
