//! Everything needed to build and subscribe to sequences, in one import.

pub use crate::{
  error::RxError,
  observable::{
    self, BoxedObservable, ConnectableObservable, Emitter, Observable, ObservableExt,
  },
  observer::{Event, Observer},
  ops::group_by::GroupedObservable,
  scheduler::{
    CurrentThreadScheduler, Duration, Scheduler, SerialScheduler, TaskState, TestScheduler,
  },
  subject::{BehaviorSubject, PublishSubject, ReplaySubject, Subject},
  subscription::*,
};

#[cfg(feature = "futures-scheduler")]
pub use crate::scheduler::ConcurrentScheduler;
#[cfg(feature = "tokio-scheduler")]
pub use crate::scheduler::TokioScheduler;
