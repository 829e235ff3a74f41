use std::{collections::VecDeque, sync::Arc};

use parking_lot::Mutex;

use crate::{
  observable::Observable,
  observer::Observer,
  sink::Sink,
  subscription::{BoxSubscription, SingleAssignmentSubscription, SubscriptionLike},
};

/// Pairs up the n-th value of every source. Values wait in a per-source
/// queue until each source has one to contribute.
///
/// Once a source completed, its pending values are still paired; the whole
/// sequence completes when a value arrives that can never be paired, or when
/// every source completed.
pub fn zip<I, S, F, R>(
  sources: I,
  mut selector: F,
) -> Zip<S, impl FnMut(Vec<S::Item>) -> Result<R, S::Err> + Clone + Send + Sync + 'static>
where
  I: IntoIterator<Item = S>,
  S: Observable,
  F: FnMut(Vec<S::Item>) -> R + Clone + Send + Sync + 'static,
  R: Send + 'static,
{
  try_zip(sources, move |values: Vec<S::Item>| Ok(selector(values)))
}

/// `zip` with a fallible selector. An `Err` terminates the sequence.
pub fn try_zip<I, S, F, R>(sources: I, selector: F) -> Zip<S, F>
where
  I: IntoIterator<Item = S>,
  S: Observable,
  F: FnMut(Vec<S::Item>) -> Result<R, S::Err> + Clone + Send + Sync + 'static,
  R: Send + 'static,
{
  Zip { sources: sources.into_iter().collect(), selector }
}

#[derive(Clone)]
pub struct Zip<S, F> {
  sources: Vec<S>,
  selector: F,
}

impl<S, F, R> Observable for Zip<S, F>
where
  S: Observable,
  F: FnMut(Vec<S::Item>) -> Result<R, S::Err> + Clone + Send + Sync + 'static,
  R: Send + 'static,
{
  type Item = R;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, observer: O) -> BoxSubscription
  where
    O: Observer<R, S::Err> + 'static,
  {
    let arity = self.sources.len();
    let sink = Sink::new(observer);
    if arity == 0 {
      sink.forward_complete();
      return Box::new(sink.cancel().clone());
    }

    let slots: Vec<_> = (0..arity)
      .map(|_| SingleAssignmentSubscription::default())
      .collect();
    for slot in &slots {
      sink.cancel().add(slot.clone());
    }
    let state = Arc::new(ZipState {
      sink,
      data: Mutex::new(ZipData {
        queues: (0..arity).map(|_| VecDeque::new()).collect(),
        done: vec![false; arity],
        selector: self.selector.clone(),
      }),
      slots,
    });
    for (index, source) in self.sources.iter().enumerate() {
      if state.sink.is_disposed() {
        break;
      }
      let subscription = source.actual_subscribe(ZipObserver { state: state.clone(), index });
      state.slots[index].set_boxed(subscription);
    }
    Box::new(state.sink.cancel().clone())
  }
}

struct ZipState<O, Item, R, Err, F> {
  sink: Arc<Sink<O, R, Err>>,
  data: Mutex<ZipData<Item, F>>,
  slots: Vec<SingleAssignmentSubscription>,
}

struct ZipData<Item, F> {
  queues: Vec<VecDeque<Item>>,
  done: Vec<bool>,
  selector: F,
}

impl<Item, F> ZipData<Item, F> {
  /// One value from the front of every queue, if each has one.
  fn pop_row(&mut self) -> Option<Vec<Item>> {
    if self.queues.iter().any(VecDeque::is_empty) {
      return None;
    }
    Some(self.queues.iter_mut().filter_map(VecDeque::pop_front).collect())
  }
}

struct ZipObserver<O, Item, R, Err, F> {
  state: Arc<ZipState<O, Item, R, Err, F>>,
  index: usize,
}

impl<O, Item, R, Err, F> Observer<Item, Err> for ZipObserver<O, Item, R, Err, F>
where
  O: Observer<R, Err>,
  F: FnMut(Vec<Item>) -> Result<R, Err> + Send,
  Item: Send,
  Err: Send,
{
  fn next(&mut self, value: Item) {
    let state = &self.state;
    let mut data = state.data.lock();
    data.queues[self.index].push_back(value);
    match data.pop_row() {
      Some(row) => match (data.selector)(row) {
        Ok(zipped) => state.sink.forward_next(zipped),
        Err(err) => {
          drop(data);
          state.sink.forward_error(err);
        }
      },
      None => {
        let index = self.index;
        let others_done = data
          .done
          .iter()
          .enumerate()
          .all(|(i, done)| i == index || *done);
        if others_done {
          drop(data);
          state.sink.forward_complete();
        }
      }
    }
  }

  fn error(self, err: Err) { self.state.sink.forward_error(err) }

  fn complete(self) {
    let state = &self.state;
    let all_done = {
      let mut data = state.data.lock();
      data.done[self.index] = true;
      data.done.iter().all(|done| *done)
    };
    if all_done {
      state.sink.forward_complete();
    } else {
      state.slots[self.index].unsubscribe();
    }
  }

  fn is_closed(&self) -> bool { self.state.sink.is_closed() }
}
