use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
  error::RxError,
  observable::Observable,
  observer::Observer,
  scheduler::{Duration, Scheduler},
  sink::Sink,
  subscription::{BoxSubscription, SerialSubscription, SingleAssignmentSubscription},
};

#[derive(Clone)]
pub struct Timeout<S, Sch> {
  pub(crate) source: S,
  pub(crate) due: Duration,
  pub(crate) scheduler: Sch,
}

impl<S, Sch> Observable for Timeout<S, Sch>
where
  S: Observable,
  S::Err: From<RxError>,
  Sch: Scheduler,
{
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, observer: O) -> BoxSubscription
  where
    O: Observer<S::Item, S::Err> + 'static,
  {
    let state = Arc::new(TimeoutState {
      sink: Sink::new(observer),
      // Bumped by every value, a timer only fires for the id it was armed
      // with.
      id: Mutex::new(Some(0)),
      timer: SerialSubscription::default(),
      due: self.due,
      scheduler: self.scheduler.clone(),
    });
    let upstream = SingleAssignmentSubscription::default();
    state.sink.cancel().add(state.timer.clone());
    state.sink.cancel().add(upstream.clone());
    state.arm(0);
    upstream.set_boxed(self.source.actual_subscribe(TimeoutObserver(state.clone())));
    Box::new(state.sink.cancel().clone())
  }
}

struct TimeoutState<O, Item, Err, Sch> {
  sink: Arc<Sink<O, Item, Err>>,
  id: Mutex<Option<u64>>,
  timer: SerialSubscription,
  due: Duration,
  scheduler: Sch,
}

impl<O, Item, Err, Sch> TimeoutState<O, Item, Err, Sch>
where
  O: Observer<Item, Err> + 'static,
  Item: Send + 'static,
  Err: From<RxError> + Send + 'static,
  Sch: Scheduler,
{
  fn arm(self: &Arc<Self>, id: u64) {
    let handle = self
      .scheduler
      .schedule_relative(self.clone(), self.due, move |state| {
        let fire = {
          let mut current = state.id.lock();
          if *current == Some(id) {
            *current = None;
            true
          } else {
            false
          }
        };
        if fire {
          state.sink.forward_error(RxError::Timeout.into());
        }
        Box::new(())
      });
    self.timer.set_boxed(handle);
  }

  /// Stops the timer, `false` when it already fired.
  fn stop(&self) -> bool { self.id.lock().take().is_some() }
}

struct TimeoutObserver<O, Item, Err, Sch>(Arc<TimeoutState<O, Item, Err, Sch>>);

impl<O, Item, Err, Sch> Observer<Item, Err> for TimeoutObserver<O, Item, Err, Sch>
where
  O: Observer<Item, Err> + 'static,
  Item: Send + 'static,
  Err: From<RxError> + Send + 'static,
  Sch: Scheduler,
{
  fn next(&mut self, value: Item) {
    let id = {
      let mut current = self.0.id.lock();
      let Some(id) = current.as_mut() else { return };
      *id += 1;
      *id
    };
    self.0.sink.forward_next(value);
    self.0.arm(id);
  }

  fn error(self, err: Err) {
    if self.0.stop() {
      self.0.sink.forward_error(err);
    }
  }

  fn complete(self) {
    if self.0.stop() {
      self.0.sink.forward_complete();
    }
  }

  fn is_closed(&self) -> bool { self.0.sink.is_closed() }
}
