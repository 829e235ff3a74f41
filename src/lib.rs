//! # rxkit: a reactive stream composition engine
//!
//! Push based event sequences with a strict subscription protocol, pluggable
//! schedulers, synchronized subjects and the stateful operators built on top
//! of them.
//!
//! ## Quick Start
//!
//! ```rust
//! use rxkit::prelude::*;
//!
//! observable::from_iter::<_, ()>(0..10)
//!   .filter(|v| v % 2 == 0)
//!   .map(|v| v * 2)
//!   .subscribe(|v| println!("Value: {}", v));
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Observable`] | A producer, activated by `actual_subscribe` |
//! | [`Observer`] | Consumes `next`, `error`, and `complete` events |
//! | [`SubscriptionLike`] | Handle that releases a subscription exactly once |
//! | [`Scheduler`] | Decides when and where deferred work runs |
//!
//! ## Feature Flags
//!
//! - **`futures-scheduler`** (default): thread pool backed `ConcurrentScheduler`
//! - **`tokio-scheduler`**: `TokioScheduler` running on a tokio runtime handle
//!
//! [`Observable`]: observable::Observable
//! [`Observer`]: observer::Observer
//! [`SubscriptionLike`]: subscription::SubscriptionLike
//! [`Scheduler`]: scheduler::Scheduler

pub mod error;
pub mod observable;
pub mod observer;
pub mod ops;
pub mod prelude;
pub mod scheduler;
pub(crate) mod sink;
pub mod subject;
pub mod subscription;
pub mod testing;

pub use prelude::*;
