use std::sync::Arc;

use super::{
  core::{Buffer, SubjectCore},
  impl_subject,
};
use crate::observer::Event;

/// Remembers the latest value and hands it to every new subscriber.
pub struct BehaviorSubject<Item, Err>(Arc<SubjectCore<Item, Err, Latest<Item>>>);

pub(crate) struct Latest<Item>(Item);

impl<Item, Err> Buffer<Item, Err> for Latest<Item>
where
  Item: Clone + Send + 'static,
{
  fn on_event(&mut self, event: &Event<Item, Err>) {
    if let Event::Next(value) = event {
      self.0 = value.clone();
    }
  }

  fn replay(&mut self, stopped: bool) -> Vec<Item> {
    if stopped { Vec::new() } else { vec![self.0.clone()] }
  }
}

impl<Item, Err> BehaviorSubject<Item, Err>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  pub fn new(value: Item) -> Self { BehaviorSubject(SubjectCore::new(Latest(value))) }

  /// The latest value, or the error the subject terminated with.
  ///
  /// After a completion the last value is still returned.
  pub fn value(&self) -> Result<Item, Err> {
    if let Some(Event::Error(err)) = self.0.stopped() {
      return Err(err);
    }
    Ok(self.0.with_buffer(|latest| latest.0.clone()))
  }
}

impl_subject!(BehaviorSubject);

#[cfg(test)]
mod test {
  use std::sync::Arc;

  use parking_lot::Mutex;

  use crate::prelude::*;

  #[test]
  fn replays_latest_value() {
    let mut subject = BehaviorSubject::<i32, &'static str>::new(0);
    let first = Arc::new(Mutex::new(vec![]));
    let c_first = first.clone();
    subject.clone().subscribe(move |v| c_first.lock().push(v));
    subject.next(1);
    subject.next(2);
    let second = Arc::new(Mutex::new(vec![]));
    let c_second = second.clone();
    subject.clone().subscribe(move |v| c_second.lock().push(v));
    subject.next(3);

    assert_eq!(*first.lock(), vec![0, 1, 2, 3]);
    assert_eq!(*second.lock(), vec![2, 3]);
    assert_eq!(subject.value(), Ok(3));
  }

  #[test]
  fn value_after_termination() {
    let subject = BehaviorSubject::<i32, &'static str>::new(1);
    subject.on(Event::Completed);
    assert_eq!(subject.value(), Ok(1));

    let failed = BehaviorSubject::<i32, &'static str>::new(1);
    failed.on(Event::Error("gone"));
    assert_eq!(failed.value(), Err("gone"));
  }

  #[test]
  fn stopped_subject_replays_only_terminal() {
    let subject = BehaviorSubject::<i32, ()>::new(5);
    subject.on(Event::Completed);
    let log = Arc::new(Mutex::new(vec![]));
    let (c_log, d_log) = (log.clone(), log.clone());
    subject.clone().subscribe_all(
      move |v| c_log.lock().push(Some(v)),
      |_| {},
      move || d_log.lock().push(None),
    );
    assert_eq!(*log.lock(), vec![None]);
  }
}
