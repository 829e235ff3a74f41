use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
  observable::Observable,
  observer::Observer,
  ops::ref_count::RefCount,
  subject::Subject,
  subscription::{BoxSubscription, SingleAssignmentSubscription, SubscriptionLike},
};

/// A source shared through a subject, subscribed only while connected.
///
/// Subscribing only attaches to the subject. [`connect`] subscribes the
/// subject to the source; calling it again while connected returns the live
/// connection. The connection ends when its subscription is released or the
/// source terminates, and a later `connect` subscribes again.
///
/// Built with a subject factory, every connection gets a fresh subject.
///
/// [`connect`]: ConnectableObservable::connect
pub struct ConnectableObservable<S, Sub> {
  inner: Arc<Shared<S, Sub>>,
}

type SubjectFactory<Sub> = Box<dyn Fn() -> Sub + Send + Sync>;

struct Shared<S, Sub> {
  source: S,
  state: Mutex<ConnectState<Sub>>,
}

struct ConnectState<Sub> {
  subject: SubjectSlot<Sub>,
  connection: Option<(u64, SingleAssignmentSubscription)>,
  next_id: u64,
}

enum SubjectSlot<Sub> {
  Fixed(Sub),
  Fresh { factory: SubjectFactory<Sub>, current: Option<Sub> },
}

impl<Sub: Clone> SubjectSlot<Sub> {
  fn get(&mut self) -> Sub {
    match self {
      SubjectSlot::Fixed(subject) => subject.clone(),
      SubjectSlot::Fresh { factory, current } => current.get_or_insert_with(|| factory()).clone(),
    }
  }

  fn reset(&mut self) {
    if let SubjectSlot::Fresh { current, .. } = self {
      *current = None;
    }
  }
}

impl<S, Sub> Clone for ConnectableObservable<S, Sub> {
  fn clone(&self) -> Self { ConnectableObservable { inner: self.inner.clone() } }
}

impl<S, Sub> ConnectableObservable<S, Sub>
where
  S: Observable,
  Sub: Subject<Item = S::Item, Err = S::Err>,
{
  pub fn new(source: S, subject: Sub) -> Self { Self::build(source, SubjectSlot::Fixed(subject)) }

  pub fn with_factory(source: S, factory: impl Fn() -> Sub + Send + Sync + 'static) -> Self {
    Self::build(source, SubjectSlot::Fresh { factory: Box::new(factory), current: None })
  }

  fn build(source: S, subject: SubjectSlot<Sub>) -> Self {
    ConnectableObservable {
      inner: Arc::new(Shared {
        source,
        state: Mutex::new(ConnectState { subject, connection: None, next_id: 0 }),
      }),
    }
  }

  /// Subscribes the subject to the source, unless already connected.
  pub fn connect(&self) -> BoxSubscription {
    let (id, upstream, subject) = {
      let mut state = self.inner.state.lock();
      if let Some((id, upstream)) = &state.connection {
        return Box::new(Connection {
          shared: self.inner.clone(),
          id: *id,
          upstream: upstream.clone(),
        });
      }
      let subject = state.subject.get();
      let id = state.next_id;
      state.next_id += 1;
      let upstream = SingleAssignmentSubscription::default();
      state.connection = Some((id, upstream.clone()));
      (id, upstream, subject)
    };
    tracing::debug!(id, "connectable connected");
    let observer = ConnectionObserver { subject, shared: self.inner.clone(), id };
    upstream.set_boxed(self.inner.source.actual_subscribe(observer));
    Box::new(Connection { shared: self.inner.clone(), id, upstream })
  }

  /// Connects on the first subscriber and disconnects when the last one
  /// leaves.
  pub fn ref_count(self) -> RefCount<S, Sub> { RefCount::new(self) }
}

impl<S, Sub: Clone> Shared<S, Sub> {
  /// Ends connection `id` if it is still the live one, handing back its
  /// upstream subscription.
  fn disconnect(&self, id: u64) -> Option<SingleAssignmentSubscription> {
    let mut state = self.state.lock();
    let upstream = match state.connection.take() {
      Some((live, upstream)) if live == id => upstream,
      other => {
        state.connection = other;
        return None;
      }
    };
    state.subject.reset();
    tracing::debug!(id, "connectable disconnected");
    Some(upstream)
  }
}

impl<S, Sub> Observable for ConnectableObservable<S, Sub>
where
  S: Observable,
  Sub: Subject<Item = S::Item, Err = S::Err>,
{
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, observer: O) -> BoxSubscription
  where
    O: Observer<S::Item, S::Err> + 'static,
  {
    let subject = self.inner.state.lock().subject.get();
    subject.actual_subscribe(observer)
  }
}

struct Connection<S, Sub> {
  shared: Arc<Shared<S, Sub>>,
  id: u64,
  upstream: SingleAssignmentSubscription,
}

impl<S, Sub> SubscriptionLike for Connection<S, Sub>
where
  S: Send + Sync,
  Sub: Clone + Send,
{
  fn unsubscribe(&self) {
    self.shared.disconnect(self.id);
    self.upstream.unsubscribe();
  }

  fn is_closed(&self) -> bool { self.upstream.is_closed() }
}

struct ConnectionObserver<S, Sub> {
  subject: Sub,
  shared: Arc<Shared<S, Sub>>,
  id: u64,
}

impl<S, Sub> Observer<S::Item, S::Err> for ConnectionObserver<S, Sub>
where
  S: Observable,
  Sub: Subject<Item = S::Item, Err = S::Err>,
{
  #[inline]
  fn next(&mut self, value: S::Item) { self.subject.next(value) }

  fn error(self, err: S::Err) {
    if let Some(upstream) = self.shared.disconnect(self.id) {
      upstream.unsubscribe();
    }
    self.subject.error(err)
  }

  fn complete(self) {
    if let Some(upstream) = self.shared.disconnect(self.id) {
      upstream.unsubscribe();
    }
    self.subject.complete()
  }

  fn is_closed(&self) -> bool { self.subject.is_closed() }
}

#[cfg(test)]
mod test {
  use std::sync::Arc;

  use parking_lot::Mutex;

  use crate::{
    prelude::*,
    testing::{Recorded, SubscriptionRecord},
  };

  fn collect<S>(source: S) -> Arc<Mutex<Vec<Option<i32>>>>
  where
    S: Observable<Item = i32, Err = ()>,
  {
    let log = Arc::new(Mutex::new(vec![]));
    let (c_log, d_log) = (log.clone(), log.clone());
    source.subscribe_all(
      move |v| c_log.lock().push(Some(v)),
      |_| {},
      move || d_log.lock().push(None),
    );
    log
  }

  #[test]
  fn connect_and_disconnect() {
    let scheduler = TestScheduler::new(0);
    let xs = scheduler.create_hot_observable::<i32, ()>(vec![
      Recorded::next(210, 1),
      Recorded::next(240, 2),
      Recorded::next(270, 3),
      Recorded::next(330, 4),
      Recorded::completed(400),
    ]);
    let connectable = xs.clone().publish();
    let observer = scheduler.create_observer::<i32, ()>();
    connectable.clone().subscribe_with(observer.clone());

    let connection = Arc::new(Mutex::new(None));
    for (at, connect) in [(220, true), (250, false), (300, true)] {
      let (connectable, connection) = (connectable.clone(), connection.clone());
      scheduler.schedule_at(at, move || {
        if connect {
          *connection.lock() = Some(connectable.connect());
        } else if let Some(c) = connection.lock().take() {
          c.unsubscribe();
        }
      });
    }
    scheduler.start_virtual();

    assert_eq!(
      observer.events(),
      vec![Recorded::next(240, 2), Recorded::next(330, 4), Recorded::completed(400)]
    );
    assert_eq!(
      xs.subscriptions(),
      vec![SubscriptionRecord::new(220, 250), SubscriptionRecord::new(300, 400)]
    );
  }

  #[test]
  fn connect_twice_shares_connection() {
    let subject = PublishSubject::<i32, ()>::new();
    let connectable = subject.clone().publish();
    let log = collect(connectable.clone());
    let first = connectable.connect();
    let second = connectable.connect();
    subject.on(Event::Next(1));
    assert_eq!(subject.observer_count(), 1);
    second.unsubscribe();
    assert!(first.is_closed());
    subject.on(Event::Next(2));
    assert_eq!(*log.lock(), vec![Some(1)]);
  }

  #[test]
  fn fixed_subject_stays_terminated() {
    let connectable = observable::from_iter::<_, ()>(0..3).publish();
    let a = collect(connectable.clone());
    connectable.connect();
    let b = collect(connectable.clone());
    connectable.connect();
    assert_eq!(*a.lock(), vec![Some(0), Some(1), Some(2), None]);
    assert_eq!(*b.lock(), vec![None]);
  }

  #[test]
  fn factory_subject_is_fresh_per_connection() {
    let connectable = observable::from_iter::<_, ()>(0..3).multicast_with(PublishSubject::new);
    let a = collect(connectable.clone());
    connectable.connect();
    let b = collect(connectable.clone());
    connectable.connect();
    assert_eq!(*a.lock(), vec![Some(0), Some(1), Some(2), None]);
    assert_eq!(*b.lock(), vec![Some(0), Some(1), Some(2), None]);
  }

  #[test]
  fn replay_after_connection() {
    let connectable = observable::from_iter::<_, ()>(0..5).replay(2);
    connectable.connect();
    let late = collect(connectable);
    assert_eq!(*late.lock(), vec![Some(3), Some(4), None]);
  }
}
