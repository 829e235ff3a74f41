use std::{mem, sync::Arc};

use parking_lot::Mutex;

use crate::{
  observable::Observable,
  observer::Observer,
  sink::Sink,
  subscription::{BoxSubscription, SingleAssignmentSubscription, SubscriptionLike},
};

/// Tags the values of two heterogeneous sources so they can share the
/// n-ary engines.
#[derive(Clone, Debug)]
pub(crate) enum Either<A, B> {
  Left(A),
  Right(B),
}

/// Emits `selector` over the latest value of every source, each time one of
/// them emits once all of them have emitted.
///
/// Completes when every source completed, or as soon as a source that never
/// emitted leaves no way to build a combination.
pub fn combine_latest<I, S, F, R>(
  sources: I,
  mut selector: F,
) -> CombineLatest<S, impl FnMut(&[S::Item]) -> Result<R, S::Err> + Clone + Send + Sync + 'static>
where
  I: IntoIterator<Item = S>,
  S: Observable,
  F: FnMut(&[S::Item]) -> R + Clone + Send + Sync + 'static,
  R: Send + 'static,
{
  try_combine_latest(sources, move |values: &[S::Item]| Ok(selector(values)))
}

/// `combine_latest` with a fallible selector. An `Err` terminates the
/// sequence.
pub fn try_combine_latest<I, S, F, R>(sources: I, selector: F) -> CombineLatest<S, F>
where
  I: IntoIterator<Item = S>,
  S: Observable,
  F: FnMut(&[S::Item]) -> Result<R, S::Err> + Clone + Send + Sync + 'static,
  R: Send + 'static,
{
  CombineLatest { sources: sources.into_iter().collect(), selector }
}

#[derive(Clone)]
pub struct CombineLatest<S, F> {
  sources: Vec<S>,
  selector: F,
}

impl<S, F, R> Observable for CombineLatest<S, F>
where
  S: Observable,
  F: FnMut(&[S::Item]) -> Result<R, S::Err> + Clone + Send + Sync + 'static,
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
    let state = Arc::new(CombineState {
      sink,
      data: Mutex::new(CombineData {
        values: Values::Filling { slots: (0..arity).map(|_| None).collect(), missing: arity },
        done: vec![false; arity],
        done_count: 0,
        selector: self.selector.clone(),
      }),
      slots,
    });
    for (index, source) in self.sources.iter().enumerate() {
      if state.sink.is_disposed() {
        break;
      }
      let subscription =
        source.actual_subscribe(CombineObserver { state: state.clone(), index });
      state.slots[index].set_boxed(subscription);
    }
    Box::new(state.sink.cancel().clone())
  }
}

enum Values<Item> {
  Filling { slots: Vec<Option<Item>>, missing: usize },
  Full(Vec<Item>),
}

impl<Item> Values<Item> {
  /// Stores the latest value of source `index`, returning every latest value
  /// once each source has produced one.
  fn store(&mut self, index: usize, value: Item) -> Option<&[Item]> {
    if let Values::Filling { slots, missing } = self {
      if slots[index].is_none() {
        *missing -= 1;
      }
      slots[index] = Some(value);
      if *missing > 0 {
        return None;
      }
      let full = mem::take(slots).into_iter().flatten().collect();
      *self = Values::Full(full);
      return match self {
        Values::Full(values) => Some(values),
        Values::Filling { .. } => None,
      };
    }
    match self {
      Values::Full(values) => {
        values[index] = value;
        Some(values)
      }
      Values::Filling { .. } => None,
    }
  }
}

struct CombineState<O, Item, R, Err, F> {
  sink: Arc<Sink<O, R, Err>>,
  data: Mutex<CombineData<Item, F>>,
  slots: Vec<SingleAssignmentSubscription>,
}

struct CombineData<Item, F> {
  values: Values<Item>,
  done: Vec<bool>,
  done_count: usize,
  selector: F,
}

struct CombineObserver<O, Item, R, Err, F> {
  state: Arc<CombineState<O, Item, R, Err, F>>,
  index: usize,
}

impl<O, Item, R, Err, F> Observer<Item, Err> for CombineObserver<O, Item, R, Err, F>
where
  O: Observer<R, Err>,
  F: FnMut(&[Item]) -> Result<R, Err> + Send,
  Item: Send,
  Err: Send,
{
  fn next(&mut self, value: Item) {
    let state = &self.state;
    let mut data = state.data.lock();
    let CombineData { values, done, selector, .. } = &mut *data;
    match values.store(self.index, value) {
      Some(latest) => match selector(latest) {
        // Emitting under the lock keeps the sources from interleaving.
        Ok(combined) => state.sink.forward_next(combined),
        Err(err) => {
          drop(data);
          state.sink.forward_error(err);
        }
      },
      None => {
        let index = self.index;
        let others_done = done
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
      if data.done[self.index] {
        return;
      }
      data.done[self.index] = true;
      data.done_count += 1;
      data.done_count == data.done.len()
    };
    if all_done {
      state.sink.forward_complete();
    } else {
      state.slots[self.index].unsubscribe();
    }
  }

  fn is_closed(&self) -> bool { self.state.sink.is_closed() }
}
