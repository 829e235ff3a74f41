use std::sync::Arc;

use super::{
  core::{NoBuffer, SubjectCore},
  impl_subject,
};

/// Forwards events to the observers subscribed at the time they happen.
pub struct PublishSubject<Item, Err>(Arc<SubjectCore<Item, Err, NoBuffer>>);

impl<Item, Err> PublishSubject<Item, Err>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  pub fn new() -> Self { PublishSubject(SubjectCore::new(NoBuffer)) }
}

impl<Item, Err> Default for PublishSubject<Item, Err>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  fn default() -> Self { Self::new() }
}

impl_subject!(PublishSubject);

#[cfg(test)]
mod test {
  use std::sync::Arc;

  use parking_lot::Mutex;

  use crate::{prelude::*, testing::Recorded};

  #[test]
  fn only_later_events() {
    let mut subject = PublishSubject::<i32, &'static str>::new();
    subject.next(1);
    let log = Arc::new(Mutex::new(vec![]));
    let (c_log, e_log) = (log.clone(), log.clone());
    subject.clone().subscribe_err(
      move |v| c_log.lock().push(Ok(v)),
      move |e| e_log.lock().push(Err(e)),
    );
    subject.next(2);
    subject.clone().error("boom");
    subject.next(3);
    assert_eq!(*log.lock(), vec![Ok(2), Err("boom")]);
    assert!(subject.is_stopped());
    assert_eq!(subject.observer_count(), 0);
  }

  #[test]
  fn hot_observable_fans_out() {
    let scheduler = TestScheduler::new(0);
    let subject = PublishSubject::<i32, ()>::new();
    let mut feed = subject.clone();
    scheduler.schedule_at(210, move || feed.next(1));
    let feed = subject.clone();
    scheduler.schedule_at(300, move || feed.complete());
    let a = scheduler.create_observer::<i32, ()>();
    let b = scheduler.create_observer::<i32, ()>();
    subject.clone().subscribe_with(a.clone());
    let (c_subject, c_b) = (subject.clone(), b.clone());
    scheduler.schedule_at(250, move || {
      c_subject.clone().subscribe_with(c_b.clone());
    });
    scheduler.start_virtual();
    assert_eq!(
      a.events(),
      vec![Recorded::next(210, 1), Recorded::completed(300)]
    );
    assert_eq!(b.events(), vec![Recorded::completed(300)]);
  }
}
