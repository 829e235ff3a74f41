use std::marker::PhantomData;

use crate::{
  observable::Observable,
  observer::Observer,
  scheduler::{Duration, Scheduler, TaskState},
  subscription::BoxSubscription,
};

/// Creates an observable which will fire at `period` time into the future,
/// and will repeat every `period` interval after. Values count up from zero.
pub fn interval<Sch, Err>(period: Duration, scheduler: Sch) -> Interval<Sch, Err> {
  Interval { period, scheduler, _err: PhantomData }
}

/// Creates an observable that emits `0` after `delay` and then completes.
pub fn timer<Sch, Err>(delay: Duration, scheduler: Sch) -> Timer<Sch, Err> {
  Timer { delay, scheduler, _err: PhantomData }
}

#[derive(Clone)]
pub struct Interval<Sch, Err> {
  period: Duration,
  scheduler: Sch,
  _err: PhantomData<fn() -> Err>,
}

impl<Sch, Err> Observable for Interval<Sch, Err>
where
  Sch: Scheduler,
  Err: Send + 'static,
{
  type Item = usize;
  type Err = Err;

  fn actual_subscribe<O>(&self, observer: O) -> BoxSubscription
  where
    O: Observer<usize, Err> + 'static,
  {
    let period = self.period;
    self.scheduler.schedule_recursive(
      (0, observer),
      Some(period),
      move |(seq, observer)| {
        if observer.is_closed() {
          return TaskState::Finished;
        }
        observer.next(*seq);
        *seq += 1;
        TaskState::Sleeping(period)
      },
    )
  }
}

#[derive(Clone)]
pub struct Timer<Sch, Err> {
  delay: Duration,
  scheduler: Sch,
  _err: PhantomData<fn() -> Err>,
}

impl<Sch, Err> Observable for Timer<Sch, Err>
where
  Sch: Scheduler,
  Err: Send + 'static,
{
  type Item = usize;
  type Err = Err;

  fn actual_subscribe<O>(&self, observer: O) -> BoxSubscription
  where
    O: Observer<usize, Err> + 'static,
  {
    self
      .scheduler
      .schedule_relative(observer, self.delay, |mut observer| {
        observer.next(0);
        observer.complete();
        Box::new(())
      })
  }
}

#[cfg(test)]
mod test {
  use crate::{prelude::*, testing::Recorded};

  #[test]
  fn interval_on_virtual_time() {
    let scheduler = TestScheduler::new(0);
    let c_scheduler = scheduler.clone();
    let res = scheduler.start(move || {
      observable::interval::<_, ()>(Duration::from_millis(100), c_scheduler)
    });
    assert_eq!(
      res.events(),
      vec![
        Recorded::next(300, 0),
        Recorded::next(400, 1),
        Recorded::next(500, 2),
        Recorded::next(600, 3),
        Recorded::next(700, 4),
        Recorded::next(800, 5),
        Recorded::next(900, 6),
      ]
    );
  }

  #[test]
  fn interval_with_take() {
    let scheduler = TestScheduler::new(0);
    let c_scheduler = scheduler.clone();
    let res = scheduler.start(move || {
      observable::interval::<_, ()>(Duration::from_millis(10), c_scheduler)
        .take(3)
    });
    assert_eq!(
      res.events(),
      vec![
        Recorded::next(210, 0),
        Recorded::next(220, 1),
        Recorded::next(230, 2),
        Recorded::completed(230),
      ]
    );
  }

  #[test]
  fn timer_fires_once() {
    let scheduler = TestScheduler::new(0);
    let c_scheduler = scheduler.clone();
    let res = scheduler.start(move || {
      observable::timer::<_, ()>(Duration::from_millis(50), c_scheduler)
    });
    assert_eq!(
      res.events(),
      vec![Recorded::next(250, 0), Recorded::completed(250)]
    );
  }
}
