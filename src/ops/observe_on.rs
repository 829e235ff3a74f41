use std::{
  collections::VecDeque,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
};

use parking_lot::Mutex;

use crate::{
  observable::Observable,
  observer::{Event, Observer},
  scheduler::Scheduler,
  subscription::{BoxSubscription, SerialSubscription, SubscriptionLike},
};

#[derive(Clone)]
pub struct ObserveOn<S, Sch> {
  pub(crate) source: S,
  pub(crate) scheduler: Sch,
}

impl<S, Sch> Observable for ObserveOn<S, Sch>
where
  S: Observable,
  Sch: Scheduler,
{
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, observer: O) -> BoxSubscription
  where
    O: Observer<S::Item, S::Err> + 'static,
  {
    let state = Arc::new(ObserveOnState {
      observer: Mutex::new(Some(observer)),
      queue: Mutex::new(Pending { events: VecDeque::new(), scheduled: false }),
      scheduler: self.scheduler.clone(),
      disposed: AtomicBool::new(false),
      upstream: SerialSubscription::default(),
    });
    let subscription = self
      .source
      .actual_subscribe(ObserveOnObserver(state.clone()));
    state.upstream.set_boxed(subscription);
    Box::new(ObserveOnSubscription(state))
  }
}

struct ObserveOnState<O, Item, Err, Sch> {
  observer: Mutex<Option<O>>,
  queue: Mutex<Pending<Item, Err>>,
  scheduler: Sch,
  disposed: AtomicBool,
  upstream: SerialSubscription,
}

struct Pending<Item, Err> {
  events: VecDeque<Event<Item, Err>>,
  scheduled: bool,
}

impl<O, Item, Err, Sch> ObserveOnState<O, Item, Err, Sch>
where
  O: Observer<Item, Err> + 'static,
  Item: Send + 'static,
  Err: Send + 'static,
  Sch: Scheduler,
{
  fn push(self: &Arc<Self>, event: Event<Item, Err>) {
    if self.is_disposed() {
      return;
    }
    {
      let mut queue = self.queue.lock();
      queue.events.push_back(event);
      if queue.scheduled {
        return;
      }
      queue.scheduled = true;
    }
    // A pending drain finds nothing to deliver once unsubscribed, so its
    // handle is not kept.
    self.scheduler.schedule(self.clone(), |state| {
      state.drain();
      Box::new(())
    });
  }

  fn is_disposed(&self) -> bool { self.disposed.load(Ordering::Acquire) }

  /// Delivers queued events until the queue is empty. Only one drain is ever
  /// scheduled at a time, so events keep their order.
  fn drain(&self) {
    loop {
      if self.is_disposed() {
        return;
      }
      let event = {
        let mut queue = self.queue.lock();
        match queue.events.pop_front() {
          Some(event) => event,
          None => {
            queue.scheduled = false;
            return;
          }
        }
      };
      let terminal = event.is_terminal();
      // Delivered outside the lock: the observer may unsubscribe from within.
      let mut observer = self.observer.lock().take();
      event.deliver(&mut observer);
      if terminal {
        self.disposed.store(true, Ordering::Release);
        self.upstream.unsubscribe();
        return;
      }
      *self.observer.lock() = observer;
      if self.is_disposed() {
        self.observer.lock().take();
        return;
      }
    }
  }
}

struct ObserveOnObserver<O, Item, Err, Sch>(Arc<ObserveOnState<O, Item, Err, Sch>>);

impl<O, Item, Err, Sch> Observer<Item, Err> for ObserveOnObserver<O, Item, Err, Sch>
where
  O: Observer<Item, Err> + 'static,
  Item: Send + 'static,
  Err: Send + 'static,
  Sch: Scheduler,
{
  fn next(&mut self, value: Item) { self.0.push(Event::Next(value)) }

  fn error(self, err: Err) { self.0.push(Event::Error(err)) }

  fn complete(self) { self.0.push(Event::Completed) }

  fn is_closed(&self) -> bool { self.0.is_disposed() }
}

struct ObserveOnSubscription<O, Item, Err, Sch>(Arc<ObserveOnState<O, Item, Err, Sch>>);

impl<O, Item, Err, Sch> SubscriptionLike for ObserveOnSubscription<O, Item, Err, Sch>
where
  O: Send,
  Item: Send,
  Err: Send,
  Sch: Scheduler,
{
  fn unsubscribe(&self) {
    self.0.disposed.store(true, Ordering::Release);
    self.0.upstream.unsubscribe();
    self.0.observer.lock().take();
  }

  fn is_closed(&self) -> bool { self.0.disposed.load(Ordering::Acquire) }
}

#[cfg(test)]
mod test {
  use std::{
    sync::{mpsc::channel, Arc},
    thread,
    time::Duration,
  };

  use parking_lot::Mutex;

  use crate::{prelude::*, testing::Recorded};

  #[test]
  fn delivers_on_scheduler_thread() {
    let scheduler = SerialScheduler::new("observe-on").unwrap();
    let (tx, rx) = channel();
    let c_tx = tx.clone();
    observable::from_iter::<_, ()>(0..3)
      .observe_on(scheduler)
      .subscribe_all(
        move |v| {
          c_tx
            .send((v, thread::current().name().map(String::from)))
            .unwrap()
        },
        |_| {},
        move || drop(tx),
      );
    let received: Vec<_> = rx.iter().collect();
    assert_eq!(
      received,
      vec![
        (0, Some("observe-on".to_string())),
        (1, Some("observe-on".to_string())),
        (2, Some("observe-on".to_string())),
      ]
    );
  }

  #[test]
  fn shifts_by_processing_delay() {
    let scheduler = TestScheduler::new(0);
    let xs = scheduler.create_hot_observable::<i32, ()>(vec![
      Recorded::next(210, 1),
      Recorded::next(220, 2),
      Recorded::completed(230),
    ]);
    let c_scheduler = scheduler.clone();
    let res = scheduler.start(move || xs.observe_on(c_scheduler));
    assert_eq!(
      res.events(),
      vec![
        Recorded::next(211, 1),
        Recorded::next(221, 2),
        Recorded::completed(231),
      ]
    );
  }

  #[test]
  fn downstream_may_unsubscribe_while_delivering() {
    let (tx, rx) = channel();
    thread::spawn(move || {
      let scheduler = TestScheduler::new(0);
      let c_scheduler = scheduler.clone();
      let res = scheduler
        .start(move || observable::from_iter::<_, ()>(0..3).observe_on(c_scheduler).take(1));
      tx.send(res.events()).unwrap();
    });
    let events = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(events, vec![Recorded::next(201, 0), Recorded::completed(201)]);
  }

  #[test]
  fn unsubscribe_drops_pending() {
    let scheduler = TestScheduler::new(0);
    let values = Arc::new(Mutex::new(vec![]));
    let c_values = values.clone();
    let subscription = observable::from_iter::<_, ()>(0..3)
      .observe_on(scheduler.clone())
      .subscribe(move |v| c_values.lock().push(v));
    subscription.unsubscribe();
    scheduler.start_virtual();
    assert!(values.lock().is_empty());
  }
}
