//! Sequential concatenation.
//!
//! The sources are pulled lazily from an iterator. When the source about to
//! be subscribed is itself a concatenation, its iterator is pushed onto a
//! stack instead of subscribing to it, and an exhausted iterator is popped
//! before that push. Together with moving to the next source through the
//! current thread trampoline, this keeps the call stack flat no matter how
//! deeply concatenations nest or how many synchronous sources follow each
//! other.

use std::{iter::Peekable, sync::Arc};

use parking_lot::Mutex;

use crate::{
  observable::{BoxedObservable, Observable, ObservableExt},
  observer::Observer,
  scheduler::{CurrentThreadScheduler, Scheduler},
  sink::Sink,
  subscription::{BoxSubscription, SerialSubscription, SingleAssignmentSubscription},
};

type SourceIter<Item, Err> = Box<dyn Iterator<Item = BoxedObservable<Item, Err>> + Send>;

/// Produces a fresh iterator over the sources of a concatenation.
pub type ConcatSources<Item, Err> = Arc<dyn Fn() -> SourceIter<Item, Err> + Send + Sync>;

/// Subscribes to each source of `sources` only after the previous one
/// completed.
pub fn concat<I, S>(sources: I) -> Concat<S::Item, S::Err>
where
  I: IntoIterator<Item = S> + Clone + Send + Sync + 'static,
  I::IntoIter: Send + 'static,
  S: Observable,
{
  Concat {
    sources: Arc::new(move || -> SourceIter<S::Item, S::Err> {
      Box::new(sources.clone().into_iter().map(ObservableExt::box_it))
    }),
  }
}

/// Like [`concat`], with the sources produced by `factory` on every
/// subscription. The iterator may be infinite and may itself yield
/// concatenations.
pub fn concat_lazy<F, I, S>(factory: F) -> Concat<S::Item, S::Err>
where
  F: Fn() -> I + Send + Sync + 'static,
  I: IntoIterator<Item = S>,
  I::IntoIter: Send + 'static,
  S: Observable,
{
  Concat {
    sources: Arc::new(move || -> SourceIter<S::Item, S::Err> {
      Box::new(factory().into_iter().map(ObservableExt::box_it))
    }),
  }
}

pub struct Concat<Item, Err> {
  sources: ConcatSources<Item, Err>,
}

impl<Item, Err> Clone for Concat<Item, Err> {
  fn clone(&self) -> Self { Concat { sources: self.sources.clone() } }
}

impl<Item, Err> Observable for Concat<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  type Item = Item;
  type Err = Err;

  fn actual_subscribe<O>(&self, observer: O) -> BoxSubscription
  where
    O: Observer<Item, Err> + 'static,
  {
    let state = Arc::new(ConcatState {
      sink: Sink::new(observer),
      stack: Mutex::new(vec![(self.sources)().peekable()]),
      inner: SerialSubscription::default(),
    });
    state.sink.cancel().add(state.inner.clone());
    let scheduled = CurrentThreadScheduler.schedule(state.clone(), |state| {
      state.move_next();
      Box::new(())
    });
    state.sink.cancel().add_boxed(scheduled);
    Box::new(state.sink.cancel().clone())
  }

  fn concat_sources(&self) -> Option<ConcatSources<Item, Err>> {
    Some(self.sources.clone())
  }
}

struct ConcatState<O, Item, Err> {
  sink: Arc<Sink<O, Item, Err>>,
  stack: Mutex<Vec<Peekable<SourceIter<Item, Err>>>>,
  inner: SerialSubscription,
}

impl<O, Item, Err> ConcatState<O, Item, Err>
where
  O: Observer<Item, Err> + 'static,
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn next_source(&self) -> Option<BoxedObservable<Item, Err>> {
    let mut stack = self.stack.lock();
    loop {
      let top = stack.last_mut()?;
      let Some(source) = top.next() else {
        stack.pop();
        continue;
      };
      if top.peek().is_none() {
        stack.pop();
      }
      match source.concat_sources() {
        Some(nested) => stack.push(nested().peekable()),
        None => return Some(source),
      }
    }
  }

  fn move_next(self: &Arc<Self>) {
    if self.sink.is_closed() {
      return;
    }
    match self.next_source() {
      Some(source) => {
        let slot = SingleAssignmentSubscription::default();
        self.inner.set(slot.clone());
        slot.set_boxed(source.actual_subscribe(ConcatObserver(self.clone())));
      }
      None => self.sink.forward_complete(),
    }
  }
}

struct ConcatObserver<O, Item, Err>(Arc<ConcatState<O, Item, Err>>);

impl<O, Item, Err> Observer<Item, Err> for ConcatObserver<O, Item, Err>
where
  O: Observer<Item, Err> + 'static,
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn next(&mut self, value: Item) { self.0.sink.forward_next(value) }

  fn error(self, err: Err) { self.0.sink.forward_error(err) }

  fn complete(self) {
    CurrentThreadScheduler.schedule(self.0, |state| {
      state.move_next();
      Box::new(())
    });
  }

  fn is_closed(&self) -> bool { self.0.sink.is_closed() }
}
