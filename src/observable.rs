//! The observable side of the protocol.
//!
//! [`Observable`] is the one trait every source and operator implements.
//! Subscribing hands it an [`Observer`] and returns the [`BoxSubscription`]
//! that unwinds everything the subscription acquired. All operators are
//! provided by the blanket extension trait [`ObservableExt`].

use std::{fmt::Debug, hash::Hash};

use crate::{
  error::RxError,
  observer::{Observer, ObserverAll, ObserverErr, ObserverNext},
  ops::{
    combine_latest::Either,
    concat::{Concat, ConcatSources},
    exhaust_all::ExhaustAll,
    filter::Filter,
    group_by::GroupBy,
    map::{Map, TryMap},
    merge_all::MergeAll,
    observe_on::ObserveOn,
    ref_count::RefCount,
    retry::{Retry, RetryPolicy},
    retry_when::RetryWhen,
    single::{ElementAt, Single},
    subscribe_on::SubscribeOn,
    switch_latest::SwitchLatest,
    take::Take,
    timeout::Timeout,
  },
  scheduler::{CurrentThreadScheduler, Duration, Scheduler},
  subject::{PublishSubject, ReplayConfig, ReplaySubject, Subject},
  subscription::{BoxSubscription, SubscriptionWrapper},
};

mod boxed;
mod connectable;
mod create;
mod defer;
mod from_iter;
mod interval;
mod trivial;
mod using;

pub use boxed::BoxedObservable;
pub use connectable::ConnectableObservable;
pub use create::{create, Create, Emitter};
pub use defer::{defer, Defer};
pub use from_iter::{from_iter, generate, just, of, range, FromIter, Generate};
pub use interval::{interval, timer, Interval, Timer};
pub use trivial::{empty, never, throw_err, Empty, Never, ThrowErr};
pub use using::{using, Using};

pub use crate::ops::{
  combine_latest::{combine_latest, try_combine_latest},
  concat::{concat, concat_lazy},
  merge_all::merge,
  zip::{try_zip, zip},
};

/// A representation of any set of values over any amount of time.
///
/// `actual_subscribe` may produce synchronously (cold sources emitting on the
/// subscribing thread) or register the observer and return right away. It
/// never calls the observer concurrently for one subscription, and nothing is
/// delivered after a terminal event.
pub trait Observable: Send + Sync + 'static {
  type Item: Send + 'static;
  type Err: Send + 'static;

  fn actual_subscribe<O>(&self, observer: O) -> BoxSubscription
  where
    O: Observer<Self::Item, Self::Err> + 'static;

  /// Lets `concat` flatten a nested concatenation into its own source stack
  /// instead of subscribing to it.
  #[doc(hidden)]
  fn concat_sources(&self) -> Option<ConcatSources<Self::Item, Self::Err>> {
    None
  }
}

/// Operators and subscribe helpers, available on every [`Observable`].
pub trait ObservableExt: Observable + Sized {
  // ==================== Subscribing ====================

  /// Subscribes with a value handler. An error reaching this subscriber is
  /// logged with `tracing::warn!`.
  fn subscribe<N>(self, next: N) -> SubscriptionWrapper<BoxSubscription>
  where
    N: FnMut(Self::Item) + Send + 'static,
    Self::Err: Debug,
  {
    self.subscribe_with(ObserverNext(next))
  }

  fn subscribe_err<N, E>(self, next: N, error: E) -> SubscriptionWrapper<BoxSubscription>
  where
    N: FnMut(Self::Item) + Send + 'static,
    E: FnOnce(Self::Err) + Send + 'static,
  {
    self.subscribe_with(ObserverErr::new(next, error))
  }

  fn subscribe_all<N, E, C>(
    self,
    next: N,
    error: E,
    complete: C,
  ) -> SubscriptionWrapper<BoxSubscription>
  where
    N: FnMut(Self::Item) + Send + 'static,
    E: FnOnce(Self::Err) + Send + 'static,
    C: FnOnce() + Send + 'static,
  {
    self.subscribe_with(ObserverAll::new(next, error, complete))
  }

  fn subscribe_with<O>(self, observer: O) -> SubscriptionWrapper<BoxSubscription>
  where
    O: Observer<Self::Item, Self::Err> + 'static,
  {
    SubscriptionWrapper(self.actual_subscribe(observer))
  }

  /// Erases the concrete operator chain.
  fn box_it(self) -> BoxedObservable<Self::Item, Self::Err> {
    BoxedObservable::new(self)
  }

  // ==================== One to one ====================

  fn map<B, F>(self, func: F) -> Map<Self, F>
  where
    F: FnMut(Self::Item) -> B + Clone + Send + Sync + 'static,
    B: Send + 'static,
  {
    Map { source: self, func }
  }

  /// Like `map`, an `Err` returned by `func` terminates the sequence with it.
  fn try_map<B, F>(self, func: F) -> TryMap<Self, F>
  where
    F: FnMut(Self::Item) -> Result<B, Self::Err> + Clone + Send + Sync + 'static,
    B: Send + 'static,
  {
    TryMap { source: self, func }
  }

  fn filter<F>(self, predicate: F) -> Filter<Self, F>
  where
    F: FnMut(&Self::Item) -> bool + Clone + Send + Sync + 'static,
  {
    Filter { source: self, predicate }
  }

  /// Emits the first `count` values, then completes and releases the source.
  fn take(self, count: usize) -> Take<Self> { Take { source: self, count } }

  // ==================== Scheduling ====================

  /// Subscribes to the source on `scheduler`.
  fn subscribe_on<Sch: Scheduler>(self, scheduler: Sch) -> SubscribeOn<Self, Sch> {
    SubscribeOn::new(self, scheduler)
  }

  /// Delivers every event on `scheduler`, keeping their order.
  fn observe_on<Sch: Scheduler>(self, scheduler: Sch) -> ObserveOn<Self, Sch> {
    ObserveOn { source: self, scheduler }
  }

  /// Errors with [`RxError::Timeout`] when no value arrives within `due`
  /// of the subscription or of the previous value.
  fn timeout<Sch: Scheduler>(self, due: Duration, scheduler: Sch) -> Timeout<Self, Sch>
  where
    Self::Err: From<RxError>,
  {
    Timeout { source: self, due, scheduler }
  }

  // ==================== Element checks ====================

  /// Emits the only value of the source. Errors with
  /// [`RxError::NoElements`] or [`RxError::MoreThanOneElement`].
  fn single(self) -> Single<Self>
  where
    Self::Err: From<RxError>,
  {
    Single { source: self }
  }

  /// Emits the value at `index` and completes. Errors with
  /// [`RxError::ArgumentOutOfRange`] when the source is shorter.
  fn element_at(self, index: usize) -> ElementAt<Self>
  where
    Self::Err: From<RxError>,
  {
    ElementAt { source: self, index }
  }

  // ==================== Flattening ====================

  /// Flattens an observable of observables, with at most `concurrent` inner
  /// subscriptions alive at once. Further inner sources wait in arrival
  /// order.
  ///
  /// # Panics
  ///
  /// When `concurrent` is zero.
  fn merge_all(self, concurrent: usize) -> MergeAll<Self>
  where
    Self::Item: Observable<Err = Self::Err>,
  {
    assert!(concurrent > 0, "merge_all needs a concurrency of at least one");
    MergeAll { source: self, concurrent }
  }

  /// Merges the values of both sources as they arrive.
  fn merge<S>(self, other: S) -> MergeAll<FromIter<[BoxedObservable<Self::Item, Self::Err>; 2], Self::Err>>
  where
    S: Observable<Item = Self::Item, Err = Self::Err>,
  {
    from_iter([self.box_it(), other.box_it()]).merge_all(usize::MAX)
  }

  fn flat_map<S, F>(self, func: F) -> MergeAll<Map<Self, F>>
  where
    F: FnMut(Self::Item) -> S + Clone + Send + Sync + 'static,
    S: Observable<Err = Self::Err>,
  {
    self.map(func).merge_all(usize::MAX)
  }

  /// Subscribes to the inner sources one after another.
  fn concat_all(self) -> MergeAll<Self>
  where
    Self::Item: Observable<Err = Self::Err>,
  {
    self.merge_all(1)
  }

  /// Emits the values of `self`, then the values of `other`.
  fn concat_with<S>(self, other: S) -> Concat<Self::Item, Self::Err>
  where
    S: Observable<Item = Self::Item, Err = Self::Err>,
  {
    concat([self.box_it(), other.box_it()])
  }

  /// Mirrors the most recent inner source; a new inner source releases the
  /// previous one before it is subscribed.
  fn switch_latest(self) -> SwitchLatest<Self>
  where
    Self::Item: Observable<Err = Self::Err>,
  {
    SwitchLatest { source: self }
  }

  fn flat_map_latest<S, F>(self, func: F) -> SwitchLatest<Map<Self, F>>
  where
    F: FnMut(Self::Item) -> S + Clone + Send + Sync + 'static,
    S: Observable<Err = Self::Err>,
  {
    self.map(func).switch_latest()
  }

  /// Mirrors one inner source at a time; inner sources arriving while one is
  /// active are dropped.
  fn exhaust_all(self) -> ExhaustAll<Self>
  where
    Self::Item: Observable<Err = Self::Err>,
  {
    ExhaustAll { source: self }
  }

  fn flat_map_first<S, F>(self, func: F) -> ExhaustAll<Map<Self, F>>
  where
    F: FnMut(Self::Item) -> S + Clone + Send + Sync + 'static,
    S: Observable<Err = Self::Err>,
  {
    self.map(func).exhaust_all()
  }

  // ==================== Combining ====================

  /// Combines the latest values of both sources once each has produced one.
  fn combine_latest_with<S, F, R>(
    self,
    other: S,
    mut func: F,
  ) -> impl Observable<Item = R, Err = Self::Err>
  where
    S: Observable<Err = Self::Err>,
    F: FnMut(&Self::Item, &S::Item) -> R + Clone + Send + Sync + 'static,
    R: Send + 'static,
  {
    let left = self.map(Either::Left).box_it();
    let right = other.map(Either::Right).box_it();
    try_combine_latest([left, right], move |values: &[Either<_, _>]| match values {
      [Either::Left(a), Either::Right(b)] => Ok(func(a, b)),
      _ => unreachable!("combine_latest_with keeps the source order"),
    })
  }

  /// Pairs the n-th values of both sources.
  fn zip_with<S, F, R>(self, other: S, mut func: F) -> impl Observable<Item = R, Err = Self::Err>
  where
    S: Observable<Err = Self::Err>,
    F: FnMut(Self::Item, S::Item) -> R + Clone + Send + Sync + 'static,
    R: Send + 'static,
  {
    let left = self.map(Either::Left).box_it();
    let right = other.map(Either::Right).box_it();
    try_zip([left, right], move |values: Vec<Either<_, _>>| {
      let mut values = values.into_iter();
      match (values.next(), values.next()) {
        (Some(Either::Left(a)), Some(Either::Right(b))) => Ok(func(a, b)),
        _ => unreachable!("zip_with keeps the source order"),
      }
    })
  }

  // ==================== Recovery ====================

  /// Subscribes up to `attempts` times in total, resubscribing after each
  /// error. The error of the last attempt is delivered. `retry(0)` completes
  /// without subscribing.
  fn retry(self, attempts: usize) -> Retry<Self, usize, CurrentThreadScheduler> {
    Retry::new(self, attempts, CurrentThreadScheduler)
  }

  /// Resubscribes after every error, without limit.
  fn retry_forever(self) -> Retry<Self, usize, CurrentThreadScheduler> {
    self.retry(usize::MAX)
  }

  /// Resubscribes as `policy` decides, waiting the delay it returns on
  /// `scheduler`.
  fn retry_with<P, Sch>(self, policy: P, scheduler: Sch) -> Retry<Self, P, Sch>
  where
    P: RetryPolicy<Self::Err>,
    Sch: Scheduler,
  {
    Retry::new(self, policy, scheduler)
  }

  /// Feeds every error into the observable given to `handler`; the source is
  /// resubscribed each time the notifier returned by `handler` emits a value.
  /// The sequence completes or errors along with the notifier.
  fn retry_when<H, N>(
    self,
    handler: H,
  ) -> RetryWhen<Self, fn(Self::Err) -> Result<Self::Err, Self::Err>, H>
  where
    Self::Err: Clone + Sync,
    H: Fn(PublishSubject<Self::Err, Self::Err>) -> N + Send + Sync + 'static,
    N: Observable<Err = Self::Err>,
  {
    let extract: fn(Self::Err) -> Result<Self::Err, Self::Err> = Ok;
    RetryWhen::new(self, extract, handler)
  }

  /// `retry_when` for the errors `extract` accepts. An error it hands back
  /// as `Err` bypasses the notifier and terminates the sequence.
  fn retry_when_matching<E, X, H, N>(self, extract: X, handler: H) -> RetryWhen<Self, X, H>
  where
    E: Clone + Send + Sync + 'static,
    Self::Err: Clone + Sync,
    X: Fn(Self::Err) -> Result<E, Self::Err> + Send + Sync + 'static,
    H: Fn(PublishSubject<E, Self::Err>) -> N + Send + Sync + 'static,
    N: Observable<Err = Self::Err>,
  {
    RetryWhen::new(self, extract, handler)
  }

  // ==================== Multicast ====================

  /// Shares one subscription of the source through `subject`, once
  /// connected.
  fn multicast<Sub>(self, subject: Sub) -> ConnectableObservable<Self, Sub>
  where
    Sub: Subject<Item = Self::Item, Err = Self::Err>,
  {
    ConnectableObservable::new(self, subject)
  }

  /// Like `multicast`, with a fresh subject from `factory` for every
  /// connection.
  fn multicast_with<Sub, F>(self, factory: F) -> ConnectableObservable<Self, Sub>
  where
    Sub: Subject<Item = Self::Item, Err = Self::Err>,
    F: Fn() -> Sub + Send + Sync + 'static,
  {
    ConnectableObservable::with_factory(self, factory)
  }

  fn publish(self) -> ConnectableObservable<Self, PublishSubject<Self::Item, Self::Err>>
  where
    Self::Item: Clone,
    Self::Err: Clone,
  {
    self.multicast(PublishSubject::new())
  }

  /// Multicasts through a subject replaying the last `buffer_size` values.
  fn replay(self, buffer_size: usize) -> ConnectableObservable<Self, ReplaySubject<Self::Item, Self::Err>>
  where
    Self::Item: Clone,
    Self::Err: Clone,
  {
    self.multicast(ReplaySubject::new(buffer_size))
  }

  fn replay_all(self) -> ConnectableObservable<Self, ReplaySubject<Self::Item, Self::Err>>
  where
    Self::Item: Clone,
    Self::Err: Clone,
  {
    self.multicast(ReplaySubject::unbounded())
  }

  /// Multicasts through a subject replaying values bounded by count and age,
  /// the age measured on `scheduler`.
  fn replay_with<Sch: Scheduler>(
    self,
    config: ReplayConfig,
    scheduler: Sch,
  ) -> ConnectableObservable<Self, ReplaySubject<Self::Item, Self::Err>>
  where
    Self::Item: Clone,
    Self::Err: Clone,
  {
    self.multicast(ReplaySubject::with_config(config, scheduler))
  }

  /// `publish` connected while at least one subscriber is present, with a
  /// fresh subject for every connection.
  fn share(self) -> RefCount<Self, PublishSubject<Self::Item, Self::Err>>
  where
    Self::Item: Clone,
    Self::Err: Clone,
  {
    self.multicast_with(PublishSubject::new).ref_count()
  }

  /// `replay(buffer_size).ref_count()`.
  fn share_replay(
    self,
    buffer_size: usize,
  ) -> RefCount<Self, ReplaySubject<Self::Item, Self::Err>>
  where
    Self::Item: Clone,
    Self::Err: Clone,
  {
    self.replay(buffer_size).ref_count()
  }

  /// Replays the latest value to new subscribers while connected; the value
  /// is forgotten once the last subscriber leaves.
  fn share_replay_latest_while_connected(
    self,
  ) -> RefCount<Self, ReplaySubject<Self::Item, Self::Err>>
  where
    Self::Item: Clone,
    Self::Err: Clone,
  {
    self.multicast_with(|| ReplaySubject::new(1)).ref_count()
  }

  // ==================== Grouping ====================

  /// Splits the source into one [`GroupedObservable`](crate::ops::group_by::GroupedObservable)
  /// per key.
  fn group_by<K, F>(
    self,
    mut key_selector: F,
  ) -> GroupBy<Self, impl FnMut(&Self::Item) -> Result<K, Self::Err> + Clone + Send + Sync + 'static>
  where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    F: FnMut(&Self::Item) -> K + Clone + Send + Sync + 'static,
    Self::Item: Clone,
    Self::Err: Clone,
  {
    GroupBy { source: self, key_selector: move |v: &Self::Item| Ok(key_selector(v)) }
  }

  /// Like `group_by`, an `Err` from the key selector terminates the outer
  /// stream and every open group with it.
  fn try_group_by<K, F>(self, key_selector: F) -> GroupBy<Self, F>
  where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    F: FnMut(&Self::Item) -> Result<K, Self::Err> + Clone + Send + Sync + 'static,
    Self::Item: Clone,
    Self::Err: Clone,
  {
    GroupBy { source: self, key_selector }
  }
}

impl<T: Observable> ObservableExt for T {}
