//! Subjects: an observer and an observable at once, fanning every event out to
//! all current subscribers.
//!
//! Every variant serializes `on` calls from any number of threads. Calling
//! back into the same subject from one of its observers is fine: the nested
//! event is queued and delivered once the current one reached everybody, so
//! each subscriber still sees a single, ordered stream.
//!
//! | Subject | A new subscriber first receives |
//! |---------|--------------------------------|
//! | [`PublishSubject`] | nothing, only later events |
//! | [`BehaviorSubject`] | the latest value (the seed before any `next`) |
//! | [`ReplaySubject`] | the buffered values, bounded by count and/or age |
//!
//! Subscribing after termination delivers the terminal event right away,
//! after the replayed values for a [`ReplaySubject`].
//!
//! ```rust
//! use rxkit::prelude::*;
//!
//! let mut subject = PublishSubject::<i32, ()>::new();
//! let (tx, rx) = std::sync::mpsc::channel();
//! subject.clone().subscribe(move |v| tx.send(v).unwrap());
//! subject.next(1);
//! subject.next(2);
//! assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![1, 2]);
//! ```

use crate::{observable::Observable, observer::Observer};

mod behavior;
mod core;
mod publish;
mod replay;

pub use behavior::BehaviorSubject;
pub use publish::PublishSubject;
pub use replay::{ReplayConfig, ReplaySubject};

/// Implemented by every subject, so multicasting operators can take any of
/// them.
pub trait Subject:
  Observable
  + Observer<<Self as Observable>::Item, <Self as Observable>::Err>
  + Clone
{
  /// Number of subscribers, including the ones not attached yet.
  fn observer_count(&self) -> usize;

  /// `true` once an error or completion was accepted.
  fn is_stopped(&self) -> bool;
}

/// Implements `Observer`, `Observable` and `Subject` for a subject newtype
/// around `Arc<SubjectCore<..>>`.
macro_rules! impl_subject {
  ($name:ident) => {
    impl<Item, Err> Clone for $name<Item, Err> {
      fn clone(&self) -> Self { $name(self.0.clone()) }
    }

    impl<Item, Err> $name<Item, Err>
    where
      Item: Clone + Send + 'static,
      Err: Clone + Send + 'static,
    {
      /// Feeds one event in, from any thread, re-entrant calls included.
      pub fn on(&self, event: $crate::observer::Event<Item, Err>) { self.0.on(event) }
    }

    impl<Item, Err> $crate::observer::Observer<Item, Err> for $name<Item, Err>
    where
      Item: Clone + Send + 'static,
      Err: Clone + Send + 'static,
    {
      #[inline]
      fn next(&mut self, value: Item) { self.0.on($crate::observer::Event::Next(value)) }
      #[inline]
      fn error(self, err: Err) { self.0.on($crate::observer::Event::Error(err)) }
      #[inline]
      fn complete(self) { self.0.on($crate::observer::Event::Completed) }
      #[inline]
      fn is_closed(&self) -> bool { self.0.is_stopping() }
    }

    impl<Item, Err> $crate::observable::Observable for $name<Item, Err>
    where
      Item: Clone + Send + 'static,
      Err: Clone + Send + 'static,
    {
      type Item = Item;
      type Err = Err;

      fn actual_subscribe<O>(&self, observer: O) -> $crate::subscription::BoxSubscription
      where
        O: $crate::observer::Observer<Item, Err> + 'static,
      {
        self.0.subscribe(Box::new(observer))
      }
    }

    impl<Item, Err> $crate::subject::Subject for $name<Item, Err>
    where
      Item: Clone + Send + 'static,
      Err: Clone + Send + 'static,
    {
      fn observer_count(&self) -> usize { self.0.observer_count() }

      fn is_stopped(&self) -> bool { self.0.is_stopping() }
    }
  };
}

pub(crate) use impl_subject;
