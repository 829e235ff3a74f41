use std::sync::Arc;

use crate::{
  observable::Observable,
  observer::{Event, Observer},
  scheduler::{CurrentThreadScheduler, Scheduler},
  sink::Sink,
  subject::PublishSubject,
  subscription::{BoxSubscription, SerialSubscription, SingleAssignmentSubscription},
};

/// Resubscribes to `source` whenever the notifier built by `handler` emits.
///
/// Errors accepted by `extract` are pushed into the subject given to
/// `handler`; the others terminate the sequence right away.
pub struct RetryWhen<S, X, H> {
  source: Arc<S>,
  extract: Arc<X>,
  handler: Arc<H>,
}

impl<S, X, H> RetryWhen<S, X, H> {
  pub(crate) fn new(source: S, extract: X, handler: H) -> Self {
    RetryWhen {
      source: Arc::new(source),
      extract: Arc::new(extract),
      handler: Arc::new(handler),
    }
  }
}

impl<S, X, H> Clone for RetryWhen<S, X, H> {
  fn clone(&self) -> Self {
    RetryWhen {
      source: self.source.clone(),
      extract: self.extract.clone(),
      handler: self.handler.clone(),
    }
  }
}

impl<S, X, H, E, N> Observable for RetryWhen<S, X, H>
where
  S: Observable,
  S::Err: Clone + Sync,
  E: Clone + Send + Sync + 'static,
  X: Fn(S::Err) -> Result<E, S::Err> + Send + Sync + 'static,
  H: Fn(PublishSubject<E, S::Err>) -> N + Send + Sync + 'static,
  N: Observable<Err = S::Err>,
{
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, observer: O) -> BoxSubscription
  where
    O: Observer<S::Item, S::Err> + 'static,
  {
    let errors = PublishSubject::new();
    let notifier = (self.handler)(errors.clone());
    let state = Arc::new(WhenState {
      sink: Sink::new(observer),
      source: self.source.clone(),
      extract: self.extract.clone(),
      errors,
      current: SerialSubscription::default(),
      resubscribe: SerialSubscription::default(),
    });
    let notifier_slot = SingleAssignmentSubscription::default();
    state.sink.cancel().add(notifier_slot.clone());
    state.sink.cancel().add(state.current.clone());
    state.sink.cancel().add(state.resubscribe.clone());

    notifier_slot.set_boxed(notifier.actual_subscribe(NotifierObserver(state.clone())));
    state.subscribe_source();
    Box::new(state.sink.cancel().clone())
  }
}

struct WhenState<O, S: Observable, X, E> {
  sink: Arc<Sink<O, S::Item, S::Err>>,
  source: Arc<S>,
  extract: Arc<X>,
  errors: PublishSubject<E, S::Err>,
  current: SerialSubscription,
  resubscribe: SerialSubscription,
}

impl<O, S, X, E> WhenState<O, S, X, E>
where
  O: Observer<S::Item, S::Err> + 'static,
  S: Observable,
  S::Err: Clone + Sync,
  E: Clone + Send + Sync + 'static,
  X: Fn(S::Err) -> Result<E, S::Err> + Send + Sync + 'static,
{
  fn subscribe_source(self: &Arc<Self>) {
    if self.sink.is_disposed() {
      return;
    }
    let slot = SingleAssignmentSubscription::default();
    self.current.set(slot.clone());
    slot.set_boxed(self.source.actual_subscribe(SourceObserver(self.clone())));
  }
}

struct SourceObserver<O, S: Observable, X, E>(Arc<WhenState<O, S, X, E>>);

impl<O, S, X, E> Observer<S::Item, S::Err> for SourceObserver<O, S, X, E>
where
  O: Observer<S::Item, S::Err> + 'static,
  S: Observable,
  S::Err: Clone + Sync,
  E: Clone + Send + Sync + 'static,
  X: Fn(S::Err) -> Result<E, S::Err> + Send + Sync + 'static,
{
  #[inline]
  fn next(&mut self, value: S::Item) { self.0.sink.forward_next(value) }

  fn error(self, err: S::Err) {
    match (self.0.extract)(err) {
      Ok(notification) => {
        self.0.current.set(());
        self.0.errors.on(Event::Next(notification));
      }
      Err(err) => self.0.sink.forward_error(err),
    }
  }

  fn complete(self) { self.0.sink.forward_complete() }

  fn is_closed(&self) -> bool { self.0.sink.is_closed() }
}

struct NotifierObserver<O, S: Observable, X, E>(Arc<WhenState<O, S, X, E>>);

impl<O, S, X, E, Signal> Observer<Signal, S::Err> for NotifierObserver<O, S, X, E>
where
  O: Observer<S::Item, S::Err> + 'static,
  S: Observable,
  S::Err: Clone + Sync,
  E: Clone + Send + Sync + 'static,
  X: Fn(S::Err) -> Result<E, S::Err> + Send + Sync + 'static,
{
  fn next(&mut self, _: Signal) {
    tracing::debug!("retry_when resubscribing");
    let handle = CurrentThreadScheduler.schedule(self.0.clone(), |state| {
      state.subscribe_source();
      Box::new(())
    });
    self.0.resubscribe.set_boxed(handle);
  }

  fn error(self, err: S::Err) { self.0.sink.forward_error(err) }

  fn complete(self) { self.0.sink.forward_complete() }

  fn is_closed(&self) -> bool { self.0.sink.is_closed() }
}
