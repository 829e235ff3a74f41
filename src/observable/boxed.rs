//! Boxed Observable type for type erasure
//!
//! `BoxedObservable` hides the concrete operator chain behind an `Arc`, so
//! heterogeneous sources can be stored together (e.g. the sources of `concat`
//! or `merge`). Cloning it is cheap and every clone subscribes to the same
//! underlying chain.

use std::sync::Arc;

use crate::{
  observable::Observable,
  observer::{BoxObserver, Observer},
  ops::concat::ConcatSources,
  subscription::BoxSubscription,
};

// ============================================================================
// DynObservable Trait
// ============================================================================

/// Object-safe observable trait for type erasure.
pub(crate) trait DynObservable<Item, Err>: Send + Sync {
  fn dyn_subscribe(&self, observer: BoxObserver<Item, Err>) -> BoxSubscription;

  fn dyn_concat_sources(&self) -> Option<ConcatSources<Item, Err>>;
}

impl<S: Observable> DynObservable<S::Item, S::Err> for S {
  #[inline]
  fn dyn_subscribe(
    &self,
    observer: BoxObserver<S::Item, S::Err>,
  ) -> BoxSubscription {
    self.actual_subscribe(observer)
  }

  #[inline]
  fn dyn_concat_sources(&self) -> Option<ConcatSources<S::Item, S::Err>> {
    self.concat_sources()
  }
}

// ============================================================================
// BoxedObservable
// ============================================================================

pub struct BoxedObservable<Item, Err>(Arc<dyn DynObservable<Item, Err>>);

impl<Item, Err> BoxedObservable<Item, Err> {
  pub(crate) fn new<S>(source: S) -> Self
  where
    S: Observable<Item = Item, Err = Err>,
  {
    BoxedObservable(Arc::new(source))
  }
}

impl<Item, Err> Clone for BoxedObservable<Item, Err> {
  fn clone(&self) -> Self { BoxedObservable(self.0.clone()) }
}

impl<Item, Err> Observable for BoxedObservable<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  type Item = Item;
  type Err = Err;

  fn actual_subscribe<O>(&self, observer: O) -> BoxSubscription
  where
    O: Observer<Item, Err> + 'static,
  {
    self.0.dyn_subscribe(Box::new(observer))
  }

  #[inline]
  fn concat_sources(&self) -> Option<ConcatSources<Item, Err>> {
    self.0.dyn_concat_sources()
  }
}
