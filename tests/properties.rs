//! Behavioral properties of the engine, exercised across operators,
//! subjects and schedulers together.

use std::{
  collections::BTreeMap,
  sync::{
    atomic::{AtomicUsize, Ordering},
    mpsc, Arc,
  },
  thread,
  time::Duration as StdDuration,
};

use parking_lot::Mutex;
use rxkit::{
  prelude::*,
  testing::{Recorded, SubscriptionRecord},
};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
}

fn log_events<S>(source: S) -> Arc<Mutex<Vec<String>>>
where
  S: Observable,
  S::Item: std::fmt::Display,
  S::Err: std::fmt::Debug,
{
  let log = Arc::new(Mutex::new(vec![]));
  let (n_log, e_log, c_log) = (log.clone(), log.clone(), log.clone());
  source.subscribe_all(
    move |v| n_log.lock().push(v.to_string()),
    move |e| e_log.lock().push(format!("error:{e:?}")),
    move || c_log.lock().push("done".to_owned()),
  );
  log
}

#[test]
fn nothing_after_terminal_event() {
  init_tracing();
  let misbehaving = observable::create(|emitter: Emitter<i32, &'static str>| {
    emitter.next(1);
    emitter.complete();
    emitter.next(2);
    emitter.error("late");
    emitter.complete();
  });

  let direct = log_events(misbehaving.clone());
  assert_eq!(*direct.lock(), vec!["1", "done"]);

  let chained = log_events(
    misbehaving
      .clone()
      .map(|v| v * 10)
      .concat_with(observable::of(3))
      .merge(observable::empty()),
  );
  assert_eq!(*chained.lock(), vec!["10", "3", "done"]);

  let shared = log_events(misbehaving.share());
  assert_eq!(*shared.lock(), vec!["1", "done"]);
}

#[test]
fn first_error_terminates_merge() {
  init_tracing();
  let scheduler = TestScheduler::new(0);
  let xs = scheduler.create_hot_observable::<i32, &'static str>(vec![
    Recorded::next(210, 1),
    Recorded::error(220, "boom"),
  ]);
  let ys = scheduler.create_hot_observable::<i32, &'static str>(vec![
    Recorded::next(215, 2),
    Recorded::next(230, 3),
    Recorded::completed(240),
  ]);
  let (c_xs, c_ys) = (xs.clone(), ys.clone());
  let res = scheduler.start(move || c_xs.merge(c_ys));

  assert_eq!(
    res.events(),
    vec![Recorded::next(210, 1), Recorded::next(215, 2), Recorded::error(220, "boom")]
  );
  assert_eq!(xs.subscriptions(), vec![SubscriptionRecord::new(200, 220)]);
  assert_eq!(ys.subscriptions(), vec![SubscriptionRecord::new(200, 220)]);
}

#[test]
fn unsubscribe_is_idempotent() {
  init_tracing();
  let released = Arc::new(AtomicUsize::new(0));
  let c_released = released.clone();
  let source = observable::using(
    move || {
      let released = c_released.clone();
      FnSubscription::new(move || {
        released.fetch_add(1, Ordering::SeqCst);
      })
    },
    |_| observable::never::<i32, ()>(),
  );

  let subscription = source.map(|v| v + 1).merge(observable::never()).subscribe(|_| {});
  for _ in 0..3 {
    subscription.unsubscribe();
  }
  assert!(subscription.is_closed());
  assert_eq!(released.load(Ordering::SeqCst), 1);

  let composite = CompositeSubscription::default();
  let c_released = released.clone();
  composite.add(FnSubscription::new(move || {
    c_released.fetch_add(1, Ordering::SeqCst);
  }));
  let handles: Vec<_> = (0..4)
    .map(|_| {
      let composite = composite.clone();
      thread::spawn(move || composite.unsubscribe())
    })
    .collect();
  for handle in handles {
    handle.join().unwrap();
  }
  assert_eq!(released.load(Ordering::SeqCst), 2);
}

#[test]
fn ref_count_connects_once_across_threads() {
  init_tracing();
  let subscribes = Arc::new(AtomicUsize::new(0));
  let teardowns = Arc::new(AtomicUsize::new(0));
  let (c_subscribes, c_teardowns) = (subscribes.clone(), teardowns.clone());
  let shared = observable::create(move |_: Emitter<i32, ()>| {
    c_subscribes.fetch_add(1, Ordering::SeqCst);
    let teardowns = c_teardowns.clone();
    FnSubscription::new(move || {
      teardowns.fetch_add(1, Ordering::SeqCst);
    })
  })
  .share();

  let handles: Vec<_> = (0..16)
    .map(|_| {
      let shared = shared.clone();
      thread::spawn(move || shared.subscribe(|_| {}))
    })
    .collect();
  let subscriptions: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
  assert_eq!(subscribes.load(Ordering::SeqCst), 1);
  assert_eq!(teardowns.load(Ordering::SeqCst), 0);

  let handles: Vec<_> = subscriptions
    .into_iter()
    .map(|subscription| thread::spawn(move || subscription.unsubscribe()))
    .collect();
  for handle in handles {
    handle.join().unwrap();
  }
  assert_eq!(subscribes.load(Ordering::SeqCst), 1);
  assert_eq!(teardowns.load(Ordering::SeqCst), 1);

  shared.subscribe(|_| {});
  assert_eq!(subscribes.load(Ordering::SeqCst), 2);
}

#[test]
fn merge_of_synchronous_sources() {
  init_tracing();
  let sources = vec![observable::from_iter::<_, ()>(0..3); 3];
  let log = log_events(observable::merge(sources));
  assert_eq!(*log.lock(), vec!["0", "1", "2", "0", "1", "2", "0", "1", "2", "done"]);
}

#[test]
fn merge_completes_after_outer_and_inners() {
  init_tracing();
  let scheduler = TestScheduler::new(0);
  let xs = scheduler.create_cold_observable::<i32, ()>(vec![
    Recorded::next(10, 1),
    Recorded::completed(50),
  ]);
  let ys = scheduler.create_cold_observable::<i32, ()>(vec![
    Recorded::next(20, 2),
    Recorded::completed(30),
  ]);
  let outer = scheduler.create_hot_observable::<_, ()>(vec![
    Recorded::next(205, xs.clone()),
    Recorded::next(210, ys.clone()),
    Recorded::completed(220),
  ]);
  let res = scheduler.start(move || outer.merge_all(usize::MAX));

  assert_eq!(
    res.events(),
    vec![Recorded::next(215, 1), Recorded::next(230, 2), Recorded::completed(255)]
  );
  assert_eq!(xs.subscriptions(), vec![SubscriptionRecord::new(205, 255)]);
  assert_eq!(ys.subscriptions(), vec![SubscriptionRecord::new(210, 240)]);
}

#[test]
fn zip_stops_at_the_shorter_source() {
  init_tracing();
  let scheduler = TestScheduler::new(0);
  let xs = scheduler.create_hot_observable::<i32, ()>(vec![
    Recorded::next(210, 1),
    Recorded::next(240, 2),
    Recorded::next(270, 3),
    Recorded::completed(300),
  ]);
  let ys = scheduler.create_hot_observable::<char, ()>(vec![
    Recorded::next(220, 'a'),
    Recorded::next(230, 'b'),
    Recorded::completed(235),
  ]);
  let (c_xs, c_ys) = (xs.clone(), ys.clone());
  let res = scheduler.start(move || c_xs.zip_with(c_ys, |x, y| (x, y)));

  assert_eq!(
    res.events(),
    vec![
      Recorded::next(220, (1, 'a')),
      Recorded::next(240, (2, 'b')),
      Recorded::completed(270),
    ]
  );
  assert_eq!(xs.subscriptions(), vec![SubscriptionRecord::new(200, 270)]);
  assert_eq!(ys.subscriptions(), vec![SubscriptionRecord::new(200, 235)]);
}

fn countdown(from: usize) -> BoxedObservable<usize, ()> {
  observable::concat_lazy(move || {
    let rest = (from > 1).then(|| countdown(from - 1));
    std::iter::once(observable::of(from).box_it()).chain(rest)
  })
  .box_it()
}

#[test]
fn deep_concat_keeps_the_stack_flat() {
  init_tracing();
  // A small stack makes any per-level recursion overflow.
  let handle = thread::Builder::new()
    .stack_size(256 * 1024)
    .spawn(|| {
      let count = Arc::new(AtomicUsize::new(0));
      let completed = Arc::new(AtomicUsize::new(0));
      let (c_count, c_completed) = (count.clone(), completed.clone());
      countdown(10_000).subscribe_all(
        move |_| {
          c_count.fetch_add(1, Ordering::SeqCst);
        },
        |_| {},
        move || {
          c_completed.fetch_add(1, Ordering::SeqCst);
        },
      );
      (count.load(Ordering::SeqCst), completed.load(Ordering::SeqCst))
    })
    .unwrap();
  assert_eq!(handle.join().unwrap(), (10_000, 1));
}

#[test]
fn retry_surfaces_the_last_error() {
  init_tracing();
  let scheduler = TestScheduler::new(0);
  let xs = scheduler.create_cold_observable::<i32, &'static str>(vec![
    Recorded::next(5, 1),
    Recorded::error(10, "boom"),
  ]);
  let c_xs = xs.clone();
  let res = scheduler.start(move || c_xs.retry(3));

  assert_eq!(
    res.events(),
    vec![
      Recorded::next(205, 1),
      Recorded::next(215, 1),
      Recorded::next(225, 1),
      Recorded::error(230, "boom"),
    ]
  );
  assert_eq!(
    xs.subscriptions(),
    vec![
      SubscriptionRecord::new(200, 210),
      SubscriptionRecord::new(210, 220),
      SubscriptionRecord::new(220, 230),
    ]
  );
}

#[test]
fn reentrant_subject_delivers_in_order() {
  init_tracing();
  let subject = PublishSubject::<i32, ()>::new();
  let first = Arc::new(Mutex::new(vec![]));
  let second = Arc::new(Mutex::new(vec![]));

  let (c_subject, c_first) = (subject.clone(), first.clone());
  subject.clone().subscribe(move |v| {
    c_first.lock().push(v);
    if v < 3 {
      c_subject.on(Event::Next(v + 1));
    }
  });
  let c_second = second.clone();
  subject.clone().subscribe(move |v| c_second.lock().push(v));

  subject.on(Event::Next(0));
  assert_eq!(*first.lock(), vec![0, 1, 2, 3]);
  assert_eq!(*second.lock(), vec![0, 1, 2, 3]);
}

#[test]
fn reentrant_completion_from_another_operator() {
  init_tracing();
  let subject = BehaviorSubject::<i32, ()>::new(0);
  let c_subject = subject.clone();
  let log = log_events(subject.clone().map(move |v| {
    if v == 1 {
      c_subject.on(Event::Completed);
    }
    v
  }));
  subject.on(Event::Next(1));
  subject.on(Event::Next(2));
  assert_eq!(*log.lock(), vec!["0", "1", "done"]);
  assert!(subject.is_stopped());
}

#[test]
fn groups_only_see_their_key() {
  init_tracing();
  let input = vec![7, 3, 12, 5, 8, 1, 4, 9, 16, 2, 11, 0];
  let groups = Arc::new(Mutex::new(BTreeMap::<i32, Vec<i32>>::new()));
  let c_groups = groups.clone();
  observable::from_iter::<_, ()>(input.clone())
    .group_by(|v: &i32| v % 4)
    .subscribe(move |group: GroupedObservable<i32, i32, ()>| {
      let (key, groups) = (*group.key(), c_groups.clone());
      groups.lock().insert(key, vec![]);
      group.subscribe(move |v| {
        if let Some(values) = groups.lock().get_mut(&key) {
          values.push(v);
        }
      });
    });

  let groups = groups.lock();
  assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
  for (key, values) in groups.iter() {
    let expected: Vec<_> = input.iter().copied().filter(|v| v % 4 == *key).collect();
    assert_eq!(*values, expected);
  }
}

#[test]
fn outer_disposal_leaves_groups_running() {
  init_tracing();
  let scheduler = TestScheduler::new(0);
  let xs = scheduler.create_hot_observable::<i32, ()>(vec![
    Recorded::next(210, 1),
    Recorded::next(215, 2),
    Recorded::next(220, 4),
    Recorded::next(230, 3),
    Recorded::next(240, 5),
    Recorded::completed(300),
  ]);
  let observers: Vec<_> = (0..3).map(|_| scheduler.create_observer::<i32, ()>()).collect();
  let c_observers = observers.clone();
  let res = scheduler.start_with(100, 200, 225, move || {
    xs.group_by(|v: &i32| v % 3).map(move |group: GroupedObservable<i32, i32, ()>| {
      group.clone().subscribe_with(c_observers[*group.key() as usize].clone());
      *group.key()
    })
  });

  assert_eq!(
    res.events(),
    vec![Recorded::next(210, 1), Recorded::next(215, 2)]
  );
  assert_eq!(
    observers[1].events(),
    vec![Recorded::next(210, 1), Recorded::next(220, 4), Recorded::completed(300)]
  );
  assert_eq!(
    observers[2].events(),
    vec![Recorded::next(215, 2), Recorded::next(240, 5), Recorded::completed(300)]
  );
  assert!(observers[0].events().is_empty());
}

#[test]
fn observe_on_serial_scheduler_keeps_order() {
  init_tracing();
  let scheduler = SerialScheduler::new("rxkit-observe").unwrap();
  let (tx, rx) = mpsc::channel();
  let values = Arc::new(Mutex::new(vec![]));
  let c_values = values.clone();
  let caller = thread::current().id();
  let threads = Arc::new(Mutex::new(vec![]));
  let c_threads = threads.clone();
  observable::from_iter::<_, ()>(0..100).observe_on(scheduler).subscribe_all(
    move |v| {
      c_threads.lock().push(thread::current().id());
      c_values.lock().push(v);
    },
    |_| {},
    move || {
      let _ = tx.send(());
    },
  );
  rx.recv_timeout(StdDuration::from_secs(5)).unwrap();
  assert_eq!(*values.lock(), (0..100).collect::<Vec<_>>());
  assert!(threads.lock().iter().all(|id| *id != caller));
}
