//! Delivery engine shared by every subject.
//!
//! Events are appended to a queue under the lock; whichever caller finds the
//! queue idle becomes the drainer and delivers queued work, one job at a
//! time, with the lock released around each observer call. An `on` arriving
//! while a drain is running (from another thread, or re-entrantly from an
//! observer) only enqueues, so observers are never called concurrently and
//! every subscriber sees events in queue order.
//!
//! Subscribing enqueues an attach job as well: a subscriber added during a
//! delivery starts with the next queued event, after the values the
//! [`Buffer`] replays for it.

use std::{
  collections::VecDeque,
  ops::{Deref, DerefMut},
  sync::{Arc, Weak},
};

use parking_lot::{Mutex, MutexGuard};
use smallvec::SmallVec;

use crate::{
  observer::{BoxObserver, Event, Observer},
  subscription::{BoxSubscription, SubscriptionLike},
};

/// What a subject remembers for late subscribers.
pub(crate) trait Buffer<Item, Err>: Send + 'static {
  fn on_event(&mut self, event: &Event<Item, Err>);

  /// Values handed to a new subscriber before it receives live events.
  /// `stopped` tells whether the subject already terminated.
  fn replay(&mut self, stopped: bool) -> Vec<Item>;
}

/// Remembers nothing.
pub(crate) struct NoBuffer;

impl<Item, Err> Buffer<Item, Err> for NoBuffer {
  #[inline]
  fn on_event(&mut self, _: &Event<Item, Err>) {}

  #[inline]
  fn replay(&mut self, _: bool) -> Vec<Item> { Vec::new() }
}

pub(crate) struct SubjectCore<Item, Err, B> {
  state: Mutex<CoreState<Item, Err, B>>,
}

struct CoreState<Item, Err, B> {
  observers: Vec<Entry<Item, Err>>,
  queue: VecDeque<Job<Item, Err>>,
  draining: bool,
  /// A terminal event was accepted, further events are ignored.
  stopping: bool,
  /// The terminal event, once delivered.
  stopped: Option<Event<Item, Err>>,
  buffer: B,
  next_id: u64,
}

struct Entry<Item, Err> {
  id: u64,
  /// Taken out while the observer is being called.
  observer: Option<BoxObserver<Item, Err>>,
  attached: bool,
}

enum Job<Item, Err> {
  Emit(Event<Item, Err>),
  Attach(u64),
}

type Guard<'a, Item, Err, B> = MutexGuard<'a, CoreState<Item, Err, B>>;

impl<Item, Err, B> SubjectCore<Item, Err, B>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
  B: Buffer<Item, Err>,
{
  pub(crate) fn new(buffer: B) -> Arc<Self> {
    Arc::new(SubjectCore {
      state: Mutex::new(CoreState {
        observers: Vec::new(),
        queue: VecDeque::new(),
        draining: false,
        stopping: false,
        stopped: None,
        buffer,
        next_id: 0,
      }),
    })
  }

  pub(crate) fn on(&self, event: Event<Item, Err>) {
    let mut state = self.state.lock();
    if state.stopping {
      return;
    }
    state.stopping = event.is_terminal();
    state.queue.push_back(Job::Emit(event));
    self.drain(state);
  }

  pub(crate) fn subscribe(
    self: &Arc<Self>,
    observer: BoxObserver<Item, Err>,
  ) -> BoxSubscription {
    let mut state = self.state.lock();
    let id = state.next_id;
    state.next_id += 1;
    state
      .observers
      .push(Entry { id, observer: Some(observer), attached: false });
    state.queue.push_back(Job::Attach(id));
    self.drain(state);
    Box::new(SubjectSubscription { core: Arc::downgrade(self), id })
  }

  /// `true` once a terminal event was accepted.
  pub(crate) fn is_stopping(&self) -> bool { self.state.lock().stopping }

  pub(crate) fn observer_count(&self) -> usize { self.state.lock().observers.len() }

  pub(crate) fn stopped(&self) -> Option<Event<Item, Err>> {
    self.state.lock().stopped.clone()
  }

  pub(crate) fn with_buffer<R>(&self, f: impl FnOnce(&mut B) -> R) -> R {
    f(&mut self.state.lock().buffer)
  }

  fn drain(&self, mut state: Guard<'_, Item, Err, B>) {
    if state.draining {
      return;
    }
    state.draining = true;
    let mut state = Draining(state);
    while let Some(job) = state.queue.pop_front() {
      match job {
        Job::Emit(Event::Next(value)) => {
          state.buffer.on_event(&Event::Next(value.clone()));
          let ids: SmallVec<[u64; 8]> = state
            .observers
            .iter()
            .filter(|entry| entry.attached)
            .map(|entry| entry.id)
            .collect();
          for id in ids {
            let Some(mut observer) = take_observer(&mut *state, id) else {
              continue;
            };
            let value = value.clone();
            MutexGuard::unlocked(&mut *state, || observer.next(value));
            put_back(&mut *state, id, observer);
          }
        }
        Job::Emit(terminal) => {
          state.buffer.on_event(&terminal);
          state.stopped = Some(terminal.clone());
          let mut attached = Vec::new();
          state.observers.retain_mut(|entry| {
            if !entry.attached {
              return true;
            }
            attached.extend(entry.observer.take());
            false
          });
          MutexGuard::unlocked(&mut *state, || {
            for observer in attached {
              terminal.clone().deliver(&mut Some(observer));
            }
          });
        }
        Job::Attach(id) => {
          let Some(mut observer) = take_observer(&mut *state, id) else {
            continue;
          };
          let stopped = state.stopped.clone();
          let replay = state.buffer.replay(stopped.is_some());
          let observer = MutexGuard::unlocked(&mut *state, move || {
            for value in replay {
              observer.next(value);
            }
            observer
          });
          match stopped {
            Some(terminal) => {
              state.observers.retain(|entry| entry.id != id);
              MutexGuard::unlocked(&mut *state, || {
                terminal.deliver(&mut Some(observer));
              });
            }
            None => {
              if let Some(entry) = state.observers.iter_mut().find(|e| e.id == id) {
                entry.attached = true;
              }
              put_back(&mut *state, id, observer);
            }
          }
        }
      }
    }
  }

  fn remove(&self, id: u64) {
    let removed = {
      let mut state = self.state.lock();
      let position = state.observers.iter().position(|entry| entry.id == id);
      position.map(|position| state.observers.remove(position))
    };
    // Dropped outside the lock, the observer may own other subscriptions.
    drop(removed);
  }

  fn contains(&self, id: u64) -> bool {
    self.state.lock().observers.iter().any(|entry| entry.id == id)
  }
}

/// Ends a drain, also when an observer panicked out of it. The entry whose
/// observer was lost mid delivery is removed.
struct Draining<'a, Item, Err, B>(Guard<'a, Item, Err, B>);

impl<'a, Item, Err, B> Deref for Draining<'a, Item, Err, B> {
  type Target = Guard<'a, Item, Err, B>;

  fn deref(&self) -> &Self::Target { &self.0 }
}

impl<'a, Item, Err, B> DerefMut for Draining<'a, Item, Err, B> {
  fn deref_mut(&mut self) -> &mut Self::Target { &mut self.0 }
}

impl<'a, Item, Err, B> Drop for Draining<'a, Item, Err, B> {
  fn drop(&mut self) {
    self.0.draining = false;
    if std::thread::panicking() {
      self.0.observers.retain(|entry| entry.observer.is_some());
    }
  }
}

fn take_observer<Item, Err, B>(
  state: &mut Guard<'_, Item, Err, B>,
  id: u64,
) -> Option<BoxObserver<Item, Err>> {
  state
    .observers
    .iter_mut()
    .find(|entry| entry.id == id)
    .and_then(|entry| entry.observer.take())
}

/// Returns an observer to its entry, unless it unsubscribed meanwhile.
fn put_back<Item, Err, B>(
  state: &mut Guard<'_, Item, Err, B>,
  id: u64,
  observer: BoxObserver<Item, Err>,
) {
  if let Some(entry) = state.observers.iter_mut().find(|entry| entry.id == id) {
    entry.observer = Some(observer);
    return;
  }
  MutexGuard::unlocked(state, move || drop(observer));
}

struct SubjectSubscription<Item, Err, B> {
  core: Weak<SubjectCore<Item, Err, B>>,
  id: u64,
}

impl<Item, Err, B> SubscriptionLike for SubjectSubscription<Item, Err, B>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
  B: Buffer<Item, Err>,
{
  fn unsubscribe(&self) {
    if let Some(core) = self.core.upgrade() {
      core.remove(self.id);
    }
  }

  fn is_closed(&self) -> bool {
    self.core.upgrade().map_or(true, |core| !core.contains(self.id))
  }
}

#[cfg(test)]
mod test {
  use std::{panic::AssertUnwindSafe, sync::Arc};

  use parking_lot::Mutex;

  use super::*;
  use crate::observer::ObserverAll;

  type Log = Arc<Mutex<Vec<String>>>;

  fn recorder(log: &Log, tag: &'static str) -> BoxObserver<i32, ()> {
    let (l1, l2, l3) = (log.clone(), log.clone(), log.clone());
    Box::new(ObserverAll::new(
      move |v: i32| l1.lock().push(format!("{tag}{v}")),
      move |_: ()| l2.lock().push(format!("{tag}!")),
      move || l3.lock().push(format!("{tag}.")),
    ))
  }

  #[test]
  fn late_subscriber_gets_terminal() {
    let core = SubjectCore::new(NoBuffer);
    let log = Log::default();
    core.on(Event::Next(1));
    core.on(Event::Completed);
    core.on(Event::Next(2));
    let subscription = core.subscribe(recorder(&log, "a"));
    assert_eq!(*log.lock(), vec!["a."]);
    assert!(subscription.is_closed());
    assert_eq!(core.observer_count(), 0);
  }

  #[test]
  fn panicking_observer_does_not_wedge_the_subject() {
    let core = SubjectCore::new(NoBuffer);
    let log = Log::default();
    let _panicking = core.subscribe(Box::new(ObserverAll::new(
      |v: i32| {
        if v == 1 {
          panic!("observer failed");
        }
      },
      |_: ()| {},
      || {},
    )));
    let _recording = core.subscribe(recorder(&log, "b"));

    let result = std::panic::catch_unwind(AssertUnwindSafe(|| core.on(Event::Next(1))));
    assert!(result.is_err());

    core.on(Event::Next(2));
    core.on(Event::Completed);
    assert_eq!(*log.lock(), vec!["b2", "b."]);
    assert_eq!(core.observer_count(), 0);
  }

  #[test]
  fn unsubscribe_stops_delivery() {
    let core = SubjectCore::new(NoBuffer);
    let log = Log::default();
    let subscription = core.subscribe(recorder(&log, "a"));
    core.on(Event::Next(1));
    subscription.unsubscribe();
    subscription.unsubscribe();
    core.on(Event::Next(2));
    assert_eq!(*log.lock(), vec!["a1"]);
    assert!(subscription.is_closed());
  }
}
