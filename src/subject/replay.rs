use std::{collections::VecDeque, sync::Arc};

use super::{
  core::{Buffer, SubjectCore},
  impl_subject,
};
use crate::{
  observer::Event,
  scheduler::{Duration, Scheduler},
};

/// Replays buffered values to every new subscriber, then forwards live
/// events. The buffer survives termination.
pub struct ReplaySubject<Item, Err>(Arc<SubjectCore<Item, Err, ReplayBuffer<Item>>>);

/// Bounds of a [`ReplaySubject`] buffer. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayConfig {
  /// Number of values kept.
  pub buffer_size: Option<usize>,
  /// Maximum age of a kept value, measured on the scheduler clock.
  pub window: Option<Duration>,
}

type Clock = Box<dyn Fn() -> Duration + Send>;

pub(crate) struct ReplayBuffer<Item> {
  values: VecDeque<(Duration, Item)>,
  config: ReplayConfig,
  clock: Option<Clock>,
}

impl<Item> ReplayBuffer<Item> {
  fn now(&self) -> Duration { self.clock.as_ref().map_or(Duration::ZERO, |clock| clock()) }

  fn trim(&mut self, now: Duration) {
    if let Some(size) = self.config.buffer_size {
      while self.values.len() > size {
        self.values.pop_front();
      }
    }
    if let Some(window) = self.config.window {
      while self
        .values
        .front()
        .map_or(false, |(at, _)| now.saturating_sub(*at) > window)
      {
        self.values.pop_front();
      }
    }
  }
}

impl<Item, Err> Buffer<Item, Err> for ReplayBuffer<Item>
where
  Item: Clone + Send + 'static,
{
  fn on_event(&mut self, event: &Event<Item, Err>) {
    if let Event::Next(value) = event {
      let now = self.now();
      self.values.push_back((now, value.clone()));
      self.trim(now);
    }
  }

  fn replay(&mut self, _: bool) -> Vec<Item> {
    let now = self.now();
    self.trim(now);
    self.values.iter().map(|(_, v)| v.clone()).collect()
  }
}

impl<Item, Err> ReplaySubject<Item, Err>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  /// Keeps the last `buffer_size` values.
  pub fn new(buffer_size: usize) -> Self {
    Self::from_buffer(ReplayConfig { buffer_size: Some(buffer_size), window: None }, None)
  }

  /// Keeps every value.
  pub fn unbounded() -> Self { Self::from_buffer(ReplayConfig::default(), None) }

  /// Bounds the buffer by count and age, reading time from `scheduler`.
  pub fn with_config<Sch: Scheduler>(config: ReplayConfig, scheduler: Sch) -> Self {
    Self::from_buffer(config, Some(Box::new(move || scheduler.now())))
  }

  fn from_buffer(config: ReplayConfig, clock: Option<Clock>) -> Self {
    ReplaySubject(SubjectCore::new(ReplayBuffer { values: VecDeque::new(), config, clock }))
  }
}

impl_subject!(ReplaySubject);

#[cfg(test)]
mod test {
  use std::sync::Arc;

  use parking_lot::Mutex;

  use crate::{prelude::*, subject::ReplayConfig, testing::Recorded};

  fn collect(subject: &ReplaySubject<i32, ()>) -> Arc<Mutex<Vec<Option<i32>>>> {
    let log = Arc::new(Mutex::new(vec![]));
    let (c_log, d_log) = (log.clone(), log.clone());
    subject.clone().subscribe_all(
      move |v| c_log.lock().push(Some(v)),
      |_| {},
      move || d_log.lock().push(None),
    );
    log
  }

  #[test]
  fn bounded_by_count() {
    let mut subject = ReplaySubject::<i32, ()>::new(2);
    for v in 1..=4 {
      subject.next(v);
    }
    assert_eq!(*collect(&subject).lock(), vec![Some(3), Some(4)]);
  }

  #[test]
  fn replays_after_completion() {
    let mut subject = ReplaySubject::<i32, ()>::unbounded();
    subject.next(1);
    subject.next(2);
    subject.clone().complete();
    assert_eq!(*collect(&subject).lock(), vec![Some(1), Some(2), None]);
  }

  #[test]
  fn bounded_by_age() {
    let scheduler = TestScheduler::new(0);
    let subject = ReplaySubject::<i32, ()>::with_config(
      ReplayConfig { buffer_size: None, window: Some(Duration::from_millis(50)) },
      scheduler.clone(),
    );
    for (time, v) in [(100, 1), (130, 2), (170, 3)] {
      let mut feed = subject.clone();
      scheduler.schedule_at(time, move || feed.next(v));
    }
    let late = scheduler.create_observer::<i32, ()>();
    let (c_subject, c_late) = (subject.clone(), late.clone());
    scheduler.schedule_at(200, move || {
      c_subject.clone().subscribe_with(c_late.clone());
    });
    scheduler.start_virtual();
    assert_eq!(late.events(), vec![Recorded::next(200, 3)]);
  }
}
