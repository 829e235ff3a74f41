use std::{collections::VecDeque, sync::Arc};

use parking_lot::Mutex;

use crate::{
  observable::{from_iter, FromIter, Observable, ObservableExt},
  observer::Observer,
  sink::Sink,
  subscription::{
    BoxSubscription, SingleAssignmentSubscription, SubscriptionKey,
    SubscriptionLike,
  },
};

/// Merges every source of `sources` into one stream without limiting the
/// number of live inner subscriptions.
pub fn merge<I, S>(sources: I) -> MergeAll<FromIter<Vec<S>, S::Err>>
where
  I: IntoIterator<Item = S>,
  S: Observable + Clone,
{
  from_iter(sources.into_iter().collect::<Vec<_>>()).merge_all(usize::MAX)
}

#[derive(Clone)]
pub struct MergeAll<S> {
  pub(crate) source: S,
  pub(crate) concurrent: usize,
}

impl<S, Inner> Observable for MergeAll<S>
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
    let state = Arc::new(MergeState {
      sink: Sink::new(observer),
      data: Mutex::new(MergeData {
        subscribed: 0,
        pending: VecDeque::new(),
        outside_completed: false,
      }),
      concurrent: self.concurrent,
    });
    let outside = SingleAssignmentSubscription::default();
    state.sink.cancel().add(outside.clone());
    outside.set_boxed(self.source.actual_subscribe(OutsideObserver(state.clone())));
    Box::new(state.sink.cancel().clone())
  }
}

struct MergeState<O, Inner: Observable> {
  sink: Arc<Sink<O, Inner::Item, Inner::Err>>,
  data: Mutex<MergeData<Inner>>,
  concurrent: usize,
}

struct MergeData<Inner> {
  subscribed: usize,
  pending: VecDeque<Inner>,
  outside_completed: bool,
}

impl<O, Inner> MergeState<O, Inner>
where
  O: Observer<Inner::Item, Inner::Err> + 'static,
  Inner: Observable,
{
  fn subscribe_inner(self: &Arc<Self>, mut inner: Inner) {
    loop {
      let slot = SingleAssignmentSubscription::default();
      let key = self.sink.cancel().add(slot.clone());
      let done = Arc::new(Mutex::new(false));
      slot.set_boxed(inner.actual_subscribe(InnerObserver {
        state: self.clone(),
        key,
        done: done.clone(),
      }));
      // An inner source completing synchronously hands its slot over to the
      // next pending one here instead of recursing.
      let mut done = done.lock();
      if !*done {
        *done = true;
        return;
      }
      match self.next_pending() {
        Some(next) => inner = next,
        None => return,
      }
    }
  }

  /// Called once an inner source completed: yields the next pending source
  /// or releases its concurrency slot.
  fn next_pending(&self) -> Option<Inner> {
    let mut data = self.data.lock();
    if let Some(next) = data.pending.pop_front() {
      return Some(next);
    }
    data.subscribed -= 1;
    let finished = data.subscribed == 0 && data.outside_completed;
    drop(data);
    if finished {
      self.sink.forward_complete();
    }
    None
  }

  fn inner_completed(self: &Arc<Self>, key: SubscriptionKey, done: &Mutex<bool>) {
    if let Some(subscription) = self.sink.cancel().remove(key) {
      subscription.unsubscribe();
    }
    let mut done = done.lock();
    if !*done {
      // Still inside `subscribe_inner`, which picks the next source up.
      *done = true;
      return;
    }
    drop(done);
    if let Some(next) = self.next_pending() {
      self.subscribe_inner(next);
    }
  }
}

struct OutsideObserver<O, Inner: Observable>(Arc<MergeState<O, Inner>>);

impl<O, Inner> Observer<Inner, Inner::Err> for OutsideObserver<O, Inner>
where
  O: Observer<Inner::Item, Inner::Err> + 'static,
  Inner: Observable,
{
  fn next(&mut self, value: Inner) {
    let state = &self.0;
    {
      let mut data = state.data.lock();
      if data.subscribed >= state.concurrent {
        data.pending.push_back(value);
        return;
      }
      data.subscribed += 1;
    }
    state.subscribe_inner(value);
  }

  fn error(self, err: Inner::Err) { self.0.sink.forward_error(err) }

  fn complete(self) {
    let finished = {
      let mut data = self.0.data.lock();
      data.outside_completed = true;
      data.subscribed == 0 && data.pending.is_empty()
    };
    if finished {
      self.0.sink.forward_complete();
    }
  }

  fn is_closed(&self) -> bool { self.0.sink.is_closed() }
}

struct InnerObserver<O, Inner: Observable> {
  state: Arc<MergeState<O, Inner>>,
  key: SubscriptionKey,
  done: Arc<Mutex<bool>>,
}

impl<O, Inner> Observer<Inner::Item, Inner::Err> for InnerObserver<O, Inner>
where
  O: Observer<Inner::Item, Inner::Err> + 'static,
  Inner: Observable,
{
  fn next(&mut self, value: Inner::Item) { self.state.sink.forward_next(value) }

  fn error(self, err: Inner::Err) { self.state.sink.forward_error(err) }

  fn complete(self) { self.state.inner_completed(self.key, &self.done) }

  fn is_closed(&self) -> bool { self.state.sink.is_closed() }
}

#[cfg(test)]
mod test {
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  };

  use parking_lot::Mutex;

  use crate::{
    of_sequence,
    prelude::*,
    testing::{Recorded, SubscriptionRecord},
  };

  #[test]
  fn three_synchronous_sources() {
    let values = Arc::new(Mutex::new(vec![]));
    let completed = Arc::new(AtomicUsize::new(0));
    let (c_values, c_completed) = (values.clone(), completed.clone());
    let sources = vec![of_sequence!(0, 1, 2), of_sequence!(0, 1, 2), of_sequence!(0, 1, 2)];
    observable::merge(sources).subscribe_all(
      move |v: i32| c_values.lock().push(v),
      |_: ()| {},
      move || {
        c_completed.fetch_add(1, Ordering::SeqCst);
      },
    );
    assert_eq!(*values.lock(), vec![0, 1, 2, 0, 1, 2, 0, 1, 2]);
    assert_eq!(completed.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn bounded_concurrency_queues_in_order() {
    let scheduler = TestScheduler::new(0);
    let ys1 = scheduler.create_cold_observable::<i32, ()>(vec![
      Recorded::next(50, 1),
      Recorded::next(100, 2),
      Recorded::completed(120),
    ]);
    let ys2 = scheduler.create_cold_observable::<i32, ()>(vec![
      Recorded::next(10, 3),
      Recorded::completed(20),
    ]);
    let ys3 = scheduler.create_cold_observable::<i32, ()>(vec![
      Recorded::next(10, 4),
      Recorded::completed(20),
    ]);
    let xs = scheduler.create_hot_observable::<_, ()>(vec![
      Recorded::next(210, ys1.clone()),
      Recorded::next(260, ys2.clone()),
      Recorded::next(270, ys3.clone()),
      Recorded::completed(300),
    ]);
    let res = scheduler.start(move || xs.merge_all(1));
    assert_eq!(
      res.events(),
      vec![
        Recorded::next(260, 1),
        Recorded::next(310, 2),
        Recorded::next(340, 3),
        Recorded::next(360, 4),
        Recorded::completed(370),
      ]
    );
    assert_eq!(ys1.subscriptions(), vec![SubscriptionRecord::new(210, 330)]);
    assert_eq!(ys2.subscriptions(), vec![SubscriptionRecord::new(330, 350)]);
    assert_eq!(ys3.subscriptions(), vec![SubscriptionRecord::new(350, 370)]);
  }

  #[test]
  fn inner_error_wins() {
    let scheduler = TestScheduler::new(0);
    let ys1 = scheduler.create_cold_observable::<i32, &'static str>(vec![
      Recorded::next(10, 1),
      Recorded::next(100, 2),
    ]);
    let ys2 = scheduler.create_cold_observable::<i32, &'static str>(vec![
      Recorded::error(20, "inner"),
    ]);
    let xs = scheduler.create_hot_observable::<_, &'static str>(vec![
      Recorded::next(210, ys1.clone()),
      Recorded::next(220, ys2.clone()),
    ]);
    let res = scheduler.start(move || xs.merge_all(usize::MAX));
    assert_eq!(
      res.events(),
      vec![Recorded::next(220, 1), Recorded::error(240, "inner")]
    );
    assert_eq!(ys1.subscriptions(), vec![SubscriptionRecord::new(210, 240)]);
  }

  #[test]
  fn merge_operator() {
    let values = Arc::new(Mutex::new(vec![]));
    let c_values = values.clone();
    let evens = observable::from_iter::<_, ()>((0..10).filter(|v| v % 2 == 0));
    let odds = observable::from_iter((0..10).filter(|v| v % 2 == 1));
    evens.merge(odds).subscribe(move |v| c_values.lock().push(v));
    assert_eq!(*values.lock(), vec![0, 2, 4, 6, 8, 1, 3, 5, 7, 9]);
  }

  #[test]
  fn flat_map_expands() {
    let values = Arc::new(Mutex::new(vec![]));
    let c_values = values.clone();
    observable::from_iter::<_, ()>(1..4)
      .flat_map(|n| observable::from_iter(0..n))
      .subscribe(move |v| c_values.lock().push(v));
    assert_eq!(*values.lock(), vec![0, 0, 1, 0, 1, 2]);
  }
}
