//! The consuming side of the protocol.
//!
//! A sequence is `next*` followed by at most one `error` or `complete`. The
//! terminal methods take the observer by value, so a terminated observer
//! cannot be reached again.

use std::fmt::Debug;

/// Receives the events of one subscription.
pub trait Observer<Item, Err>: Send {
  fn next(&mut self, value: Item);

  fn error(self, err: Err);

  fn complete(self);

  /// Returns `true` if the observer will not accept more values.
  ///
  /// Synchronous sources (like `from_iter`) poll it to stop early, e.g. once
  /// a downstream `take` is satisfied.
  fn is_closed(&self) -> bool;
}

/// Object-safe mirror of [`Observer`], the terminal methods consume the box.
pub trait DynObserver<Item, Err>: Send {
  fn dyn_next(&mut self, value: Item);
  fn dyn_error(self: Box<Self>, err: Err);
  fn dyn_complete(self: Box<Self>);
  fn dyn_is_closed(&self) -> bool;
}

impl<T, Item, Err> DynObserver<Item, Err> for T
where
  T: Observer<Item, Err>,
{
  fn dyn_next(&mut self, value: Item) { self.next(value) }

  fn dyn_error(self: Box<Self>, err: Err) { (*self).error(err) }

  fn dyn_complete(self: Box<Self>) { (*self).complete() }

  fn dyn_is_closed(&self) -> bool { self.is_closed() }
}

pub type BoxObserver<Item, Err> = Box<dyn DynObserver<Item, Err>>;

impl<Item, Err> Observer<Item, Err> for BoxObserver<Item, Err> {
  #[inline]
  fn next(&mut self, value: Item) { (**self).dyn_next(value) }
  #[inline]
  fn error(self, err: Err) { self.dyn_error(err) }
  #[inline]
  fn complete(self) { self.dyn_complete() }
  #[inline]
  fn is_closed(&self) -> bool { (**self).dyn_is_closed() }
}

/// One notification of a sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event<Item, Err> {
  Next(Item),
  Error(Err),
  Completed,
}

impl<Item, Err> Event<Item, Err> {
  #[inline]
  pub fn is_terminal(&self) -> bool { !matches!(self, Event::Next(_)) }

  /// Delivers a terminal event by consuming the observer, or a `Next` through
  /// a mutable borrow of it.
  pub fn deliver<O: Observer<Item, Err>>(self, observer: &mut Option<O>) {
    match self {
      Event::Next(v) => {
        if let Some(o) = observer.as_mut() {
          o.next(v)
        }
      }
      Event::Error(e) => {
        if let Some(o) = observer.take() {
          o.error(e)
        }
      }
      Event::Completed => {
        if let Some(o) = observer.take() {
          o.complete()
        }
      }
    }
  }
}

/// Observer built from three closures, see `ObservableExt::subscribe_all`.
pub struct ObserverAll<N, E, C> {
  on_next: N,
  on_error: E,
  on_complete: C,
}

impl<N, E, C> ObserverAll<N, E, C> {
  #[inline]
  pub fn new(on_next: N, on_error: E, on_complete: C) -> Self {
    ObserverAll { on_next, on_error, on_complete }
  }
}

impl<Item, Err, N, E, C> Observer<Item, Err> for ObserverAll<N, E, C>
where
  N: FnMut(Item) + Send,
  E: FnOnce(Err) + Send,
  C: FnOnce() + Send,
{
  #[inline]
  fn next(&mut self, value: Item) { (self.on_next)(value) }
  #[inline]
  fn error(self, err: Err) { (self.on_error)(err) }
  #[inline]
  fn complete(self) { (self.on_complete)() }

  fn is_closed(&self) -> bool { false }
}

/// Observer of values only. An error reaching it is logged, not dropped.
pub struct ObserverNext<N>(pub N);

impl<Item, Err, N> Observer<Item, Err> for ObserverNext<N>
where
  N: FnMut(Item) + Send,
  Err: Debug,
{
  #[inline]
  fn next(&mut self, value: Item) { (self.0)(value) }

  fn error(self, err: Err) {
    tracing::warn!(error = ?err, "unhandled error reached a subscriber");
  }

  #[inline]
  fn complete(self) {}
  #[inline]
  fn is_closed(&self) -> bool { false }
}

/// Observer of values and errors, see `ObservableExt::subscribe_err`.
pub struct ObserverErr<N, E> {
  on_next: N,
  on_error: E,
}

impl<N, E> ObserverErr<N, E> {
  #[inline]
  pub fn new(on_next: N, on_error: E) -> Self { ObserverErr { on_next, on_error } }
}

impl<Item, Err, N, E> Observer<Item, Err> for ObserverErr<N, E>
where
  N: FnMut(Item) + Send,
  E: FnOnce(Err) + Send,
{
  #[inline]
  fn next(&mut self, value: Item) { (self.on_next)(value) }
  #[inline]
  fn error(self, err: Err) { (self.on_error)(err) }

  fn complete(self) {}

  fn is_closed(&self) -> bool { false }
}
