//! Virtual time test harness: recorded events, hot and cold test sources and
//! a recording observer, all driven by a [`TestScheduler`].
//!
//! [`TestScheduler::start`] creates the observable under test at tick 100,
//! subscribes at 200 and disposes at 1000:
//!
//! ```rust
//! use rxkit::{
//!   prelude::*,
//!   testing::{Recorded, SubscriptionRecord},
//! };
//!
//! let scheduler = TestScheduler::new(0);
//! let xs = scheduler.create_hot_observable::<i32, ()>(vec![
//!   Recorded::next(150, 1),
//!   Recorded::next(210, 2),
//!   Recorded::completed(250),
//! ]);
//! let c_xs = xs.clone();
//! let res = scheduler.start(move || c_xs.map(|v| v * 10));
//!
//! assert_eq!(res.events(), vec![Recorded::next(210, 20), Recorded::completed(250)]);
//! assert_eq!(xs.subscriptions(), vec![SubscriptionRecord::new(200, 250)]);
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
  observable::Observable,
  observer::{BoxObserver, Event, Observer},
  scheduler::{TestScheduler, TestTime},
  subscription::{BoxSubscription, CompositeSubscription, FnSubscription, SubscriptionLike},
};

/// Tick at which [`TestScheduler::start`] creates the observable.
pub const CREATED: TestTime = 100;
/// Tick at which [`TestScheduler::start`] subscribes.
pub const SUBSCRIBED: TestTime = 200;
/// Tick at which [`TestScheduler::start`] disposes the subscription.
pub const DISPOSED: TestTime = 1000;

/// A value stamped with the virtual time it happened at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded<T> {
  pub time: TestTime,
  pub value: T,
}

impl<Item, Err> Recorded<Event<Item, Err>> {
  pub fn next(time: TestTime, value: Item) -> Self { Recorded { time, value: Event::Next(value) } }

  pub fn error(time: TestTime, err: Err) -> Self { Recorded { time, value: Event::Error(err) } }

  pub fn completed(time: TestTime) -> Self { Recorded { time, value: Event::Completed } }
}

/// When a test source was subscribed and unsubscribed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionRecord {
  pub subscribe: TestTime,
  pub unsubscribe: TestTime,
}

impl SubscriptionRecord {
  pub fn new(subscribe: TestTime, unsubscribe: TestTime) -> Self {
    SubscriptionRecord { subscribe, unsubscribe }
  }

  /// A subscription that was never released.
  pub fn open(subscribe: TestTime) -> Self { Self::new(subscribe, TestTime::MAX) }
}

type Records = Arc<Mutex<Vec<SubscriptionRecord>>>;

/// Marks record `index` as released at the current tick, once.
struct RecordedSubscription {
  scheduler: TestScheduler,
  records: Records,
  index: usize,
  scheduled: CompositeSubscription,
}

impl SubscriptionLike for RecordedSubscription {
  fn unsubscribe(&self) {
    if let Some(record) = self.records.lock().get_mut(self.index) {
      if record.unsubscribe == TestTime::MAX {
        record.unsubscribe = self.scheduler.clock();
      }
    }
    self.scheduled.unsubscribe();
  }

  fn is_closed(&self) -> bool { self.scheduled.is_closed() }
}

fn open_record(scheduler: &TestScheduler, records: &Records) -> usize {
  let mut records = records.lock();
  records.push(SubscriptionRecord::open(scheduler.clock()));
  records.len() - 1
}

// ==================== Cold ====================

/// Replays its messages for every subscriber, relative to the subscription
/// time.
pub struct ColdObservable<Item, Err> {
  scheduler: TestScheduler,
  messages: Arc<Vec<Recorded<Event<Item, Err>>>>,
  records: Records,
}

impl<Item, Err> Clone for ColdObservable<Item, Err> {
  fn clone(&self) -> Self {
    ColdObservable {
      scheduler: self.scheduler.clone(),
      messages: self.messages.clone(),
      records: self.records.clone(),
    }
  }
}

impl<Item, Err> ColdObservable<Item, Err> {
  pub fn subscriptions(&self) -> Vec<SubscriptionRecord> { self.records.lock().clone() }
}

impl<Item, Err> Observable for ColdObservable<Item, Err>
where
  Item: Clone + Send + Sync + 'static,
  Err: Clone + Send + Sync + 'static,
{
  type Item = Item;
  type Err = Err;

  fn actual_subscribe<O>(&self, observer: O) -> BoxSubscription
  where
    O: Observer<Item, Err> + 'static,
  {
    let index = open_record(&self.scheduler, &self.records);
    let clock = self.scheduler.clock();
    let observer = Arc::new(Mutex::new(Some(observer)));
    let scheduled = CompositeSubscription::default();
    for message in self.messages.iter() {
      let (observer, event) = (observer.clone(), message.value.clone());
      let handle = self.scheduler.schedule_absolute(
        clock + message.time,
        Box::new(move || -> BoxSubscription {
          deliver(&observer, event);
          Box::new(())
        }),
      );
      scheduled.add_boxed(handle);
    }
    Box::new(RecordedSubscription {
      scheduler: self.scheduler.clone(),
      records: self.records.clone(),
      index,
      scheduled,
    })
  }
}

/// Calls the observer without holding its lock, so it may unsubscribe or
/// resubscribe from inside the call.
fn deliver<O, Item, Err>(observer: &Mutex<Option<O>>, event: Event<Item, Err>)
where
  O: Observer<Item, Err>,
{
  let mut taken = observer.lock().take();
  event.deliver(&mut taken);
  if taken.is_some() {
    *observer.lock() = taken;
  }
}

// ==================== Hot ====================

/// Emits its messages at their absolute times, to whoever is subscribed
/// then.
pub struct HotObservable<Item, Err> {
  scheduler: TestScheduler,
  inner: Arc<HotInner<Item, Err>>,
}

type SharedObserver<Item, Err> = Arc<Mutex<Option<BoxObserver<Item, Err>>>>;

struct HotInner<Item, Err> {
  observers: Mutex<Vec<(usize, SharedObserver<Item, Err>)>>,
  records: Records,
}

impl<Item, Err> Clone for HotObservable<Item, Err> {
  fn clone(&self) -> Self {
    HotObservable { scheduler: self.scheduler.clone(), inner: self.inner.clone() }
  }
}

impl<Item, Err> HotObservable<Item, Err>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  fn new(scheduler: &TestScheduler, messages: Vec<Recorded<Event<Item, Err>>>) -> Self {
    let inner = Arc::new(HotInner { observers: Mutex::new(vec![]), records: Records::default() });
    for Recorded { time, value } in messages {
      let inner = inner.clone();
      scheduler.schedule_at(time, move || {
        let snapshot: Vec<_> =
          inner.observers.lock().iter().map(|(_, observer)| observer.clone()).collect();
        for observer in snapshot {
          deliver(&observer, value.clone());
        }
      });
    }
    HotObservable { scheduler: scheduler.clone(), inner }
  }

  pub fn subscriptions(&self) -> Vec<SubscriptionRecord> { self.inner.records.lock().clone() }
}

impl<Item, Err> Observable for HotObservable<Item, Err>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  type Item = Item;
  type Err = Err;

  fn actual_subscribe<O>(&self, observer: O) -> BoxSubscription
  where
    O: Observer<Item, Err> + 'static,
  {
    let index = open_record(&self.scheduler, &self.inner.records);
    let observer: BoxObserver<Item, Err> = Box::new(observer);
    self.inner.observers.lock().push((index, Arc::new(Mutex::new(Some(observer)))));
    let scheduled = CompositeSubscription::default();
    let inner = self.inner.clone();
    scheduled.add(FnSubscription::new(move || {
      inner.observers.lock().retain(|(id, _)| *id != index);
    }));
    Box::new(RecordedSubscription {
      scheduler: self.scheduler.clone(),
      records: self.inner.records.clone(),
      index,
      scheduled,
    })
  }
}

// ==================== Observer ====================

/// Records every event with the virtual time it arrived at.
pub struct TestableObserver<Item, Err> {
  scheduler: TestScheduler,
  events: Arc<Mutex<Vec<Recorded<Event<Item, Err>>>>>,
}

impl<Item, Err> Clone for TestableObserver<Item, Err> {
  fn clone(&self) -> Self {
    TestableObserver { scheduler: self.scheduler.clone(), events: self.events.clone() }
  }
}

impl<Item: Clone, Err: Clone> TestableObserver<Item, Err> {
  pub fn events(&self) -> Vec<Recorded<Event<Item, Err>>> { self.events.lock().clone() }
}

impl<Item, Err> TestableObserver<Item, Err> {
  fn record(&self, value: Event<Item, Err>) {
    let time = self.scheduler.clock();
    self.events.lock().push(Recorded { time, value });
  }
}

impl<Item: Send, Err: Send> Observer<Item, Err> for TestableObserver<Item, Err> {
  fn next(&mut self, value: Item) { self.record(Event::Next(value)) }

  fn error(self, err: Err) { self.record(Event::Error(err)) }

  fn complete(self) { self.record(Event::Completed) }

  fn is_closed(&self) -> bool { false }
}

// ==================== Scheduler helpers ====================

impl TestScheduler {
  pub fn create_hot_observable<Item, Err>(
    &self,
    messages: Vec<Recorded<Event<Item, Err>>>,
  ) -> HotObservable<Item, Err>
  where
    Item: Clone + Send + 'static,
    Err: Clone + Send + 'static,
  {
    HotObservable::new(self, messages)
  }

  pub fn create_cold_observable<Item, Err>(
    &self,
    messages: Vec<Recorded<Event<Item, Err>>>,
  ) -> ColdObservable<Item, Err> {
    ColdObservable {
      scheduler: self.clone(),
      messages: Arc::new(messages),
      records: Records::default(),
    }
  }

  pub fn create_observer<Item, Err>(&self) -> TestableObserver<Item, Err> {
    TestableObserver { scheduler: self.clone(), events: Arc::default() }
  }

  /// [`start_with`](Self::start_with) at the default ticks.
  pub fn start<S, F>(&self, factory: F) -> TestableObserver<S::Item, S::Err>
  where
    S: Observable,
    F: FnOnce() -> S + Send + 'static,
  {
    self.start_with(CREATED, SUBSCRIBED, DISPOSED, factory)
  }

  /// Creates the observable at `created`, subscribes a recording observer at
  /// `subscribed`, releases it at `disposed` and runs the whole queue.
  pub fn start_with<S, F>(
    &self,
    created: TestTime,
    subscribed: TestTime,
    disposed: TestTime,
    factory: F,
  ) -> TestableObserver<S::Item, S::Err>
  where
    S: Observable,
    F: FnOnce() -> S + Send + 'static,
  {
    let observer = self.create_observer();
    let source = Arc::new(Mutex::new(None));
    let subscription: Arc<Mutex<Option<BoxSubscription>>> = Arc::default();

    let c_source = source.clone();
    self.schedule_at(created, move || *c_source.lock() = Some(factory()));

    let (c_subscription, c_observer) = (subscription.clone(), observer.clone());
    self.schedule_at(subscribed, move || {
      let source = source.lock().take();
      if let Some(source) = source {
        let handle = source.actual_subscribe(c_observer);
        *c_subscription.lock() = Some(handle);
      }
    });

    self.schedule_at(disposed, move || {
      let handle = subscription.lock().take();
      if let Some(handle) = handle {
        handle.unsubscribe();
      }
    });

    self.start_virtual();
    observer
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::prelude::*;

  #[test]
  fn cold_is_relative_to_each_subscription() {
    let scheduler = TestScheduler::new(0);
    let xs = scheduler.create_cold_observable::<i32, ()>(vec![
      Recorded::next(10, 1),
      Recorded::completed(20),
    ]);
    let (a, b) = (scheduler.create_observer(), scheduler.create_observer());
    let (c_xs, c_a) = (xs.clone(), a.clone());
    scheduler.schedule_at(100, move || {
      c_xs.actual_subscribe(c_a);
    });
    let (c_xs, c_b) = (xs.clone(), b.clone());
    scheduler.schedule_at(150, move || {
      c_xs.actual_subscribe(c_b);
    });
    scheduler.start_virtual();
    assert_eq!(a.events(), vec![Recorded::next(110, 1), Recorded::completed(120)]);
    assert_eq!(b.events(), vec![Recorded::next(160, 1), Recorded::completed(170)]);
    assert_eq!(
      xs.subscriptions(),
      vec![SubscriptionRecord::open(100), SubscriptionRecord::open(150)]
    );
  }

  #[test]
  fn start_disposes_at_1000() {
    let scheduler = TestScheduler::new(0);
    let xs = scheduler.create_hot_observable::<i32, ()>(vec![
      Recorded::next(150, 0),
      Recorded::next(500, 1),
      Recorded::next(1100, 2),
    ]);
    let c_xs = xs.clone();
    let res = scheduler.start(move || c_xs);
    assert_eq!(res.events(), vec![Recorded::next(500, 1)]);
    assert_eq!(xs.subscriptions(), vec![SubscriptionRecord::new(200, 1000)]);
  }

  #[test]
  fn cold_unsubscribe_cancels_pending_messages() {
    let scheduler = TestScheduler::new(0);
    let xs = scheduler.create_cold_observable::<i32, ()>(vec![
      Recorded::next(50, 1),
      Recorded::next(900, 2),
    ]);
    let c_xs = xs.clone();
    let res = scheduler.start_with(100, 200, 400, move || c_xs);
    assert_eq!(res.events(), vec![Recorded::next(250, 1)]);
    assert_eq!(xs.subscriptions(), vec![SubscriptionRecord::new(200, 400)]);
  }
}
