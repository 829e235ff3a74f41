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
pub struct ExhaustAll<S> {
  pub(crate) source: S,
}

impl<S, Inner> Observable for ExhaustAll<S>
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
    let state = Arc::new(ExhaustState {
      sink: Sink::new(observer),
      data: Mutex::new(ExhaustData { active: false, outer_done: false }),
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

struct ExhaustState<O, Item, Err> {
  sink: Arc<Sink<O, Item, Err>>,
  data: Mutex<ExhaustData>,
  outer: SingleAssignmentSubscription,
  inner: SerialSubscription,
}

struct ExhaustData {
  active: bool,
  outer_done: bool,
}

struct OuterObserver<O, Item, Err>(Arc<ExhaustState<O, Item, Err>>);

impl<O, Inner> Observer<Inner, Inner::Err> for OuterObserver<O, Inner::Item, Inner::Err>
where
  O: Observer<Inner::Item, Inner::Err> + 'static,
  Inner: Observable,
{
  fn next(&mut self, inner: Inner) {
    let state = &self.0;
    {
      let mut data = state.data.lock();
      if data.active {
        return;
      }
      data.active = true;
    }
    let slot = SingleAssignmentSubscription::default();
    state.inner.set(slot.clone());
    let observer = InnerObserver { state: state.clone(), slot: slot.clone() };
    slot.set_boxed(inner.actual_subscribe(observer));
  }

  fn error(self, err: Inner::Err) { self.0.sink.forward_error(err) }

  fn complete(self) {
    let state = &self.0;
    let finished = {
      let mut data = state.data.lock();
      data.outer_done = true;
      !data.active
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
  state: Arc<ExhaustState<O, Item, Err>>,
  slot: SingleAssignmentSubscription,
}

impl<O, Item, Err> Observer<Item, Err> for InnerObserver<O, Item, Err>
where
  O: Observer<Item, Err>,
  Item: Send,
  Err: Send,
{
  #[inline]
  fn next(&mut self, value: Item) { self.state.sink.forward_next(value) }

  fn error(self, err: Err) { self.state.sink.forward_error(err) }

  fn complete(self) {
    let finished = {
      let mut data = self.state.data.lock();
      data.active = false;
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
