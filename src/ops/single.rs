use crate::{
  error::RxError,
  observable::Observable,
  observer::Observer,
  subscription::{BoxSubscription, SingleAssignmentSubscription, SubscriptionLike},
};

#[derive(Clone)]
pub struct Single<S> {
  pub(crate) source: S,
}

impl<S> Observable for Single<S>
where
  S: Observable,
  S::Err: From<RxError>,
{
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, observer: O) -> BoxSubscription
  where
    O: Observer<S::Item, S::Err> + 'static,
  {
    let upstream = SingleAssignmentSubscription::default();
    let subscription = self.source.actual_subscribe(SingleObserver {
      observer: Some(observer),
      value: None,
      upstream: upstream.clone(),
    });
    upstream.set_boxed(subscription);
    Box::new(upstream)
  }
}

struct SingleObserver<O, Item> {
  observer: Option<O>,
  value: Option<Item>,
  upstream: SingleAssignmentSubscription,
}

impl<Item, Err, O> Observer<Item, Err> for SingleObserver<O, Item>
where
  O: Observer<Item, Err>,
  Item: Send,
  Err: From<RxError>,
{
  fn next(&mut self, value: Item) {
    if self.observer.is_none() {
      return;
    }
    if self.value.is_some() {
      if let Some(observer) = self.observer.take() {
        observer.error(RxError::MoreThanOneElement.into());
      }
      self.upstream.unsubscribe();
    } else {
      self.value = Some(value);
    }
  }

  fn error(self, err: Err) {
    if let Some(observer) = self.observer {
      observer.error(err)
    }
  }

  fn complete(self) {
    let Some(mut observer) = self.observer else { return };
    match self.value {
      Some(value) => {
        observer.next(value);
        observer.complete();
      }
      None => observer.error(RxError::NoElements.into()),
    }
  }

  fn is_closed(&self) -> bool {
    self.observer.as_ref().map_or(true, |o| o.is_closed())
  }
}

#[derive(Clone)]
pub struct ElementAt<S> {
  pub(crate) source: S,
  pub(crate) index: usize,
}

impl<S> Observable for ElementAt<S>
where
  S: Observable,
  S::Err: From<RxError>,
{
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, observer: O) -> BoxSubscription
  where
    O: Observer<S::Item, S::Err> + 'static,
  {
    let upstream = SingleAssignmentSubscription::default();
    let subscription = self.source.actual_subscribe(ElementAtObserver {
      observer: Some(observer),
      remaining: self.index,
      upstream: upstream.clone(),
    });
    upstream.set_boxed(subscription);
    Box::new(upstream)
  }
}

struct ElementAtObserver<O> {
  observer: Option<O>,
  remaining: usize,
  upstream: SingleAssignmentSubscription,
}

impl<Item, Err, O> Observer<Item, Err> for ElementAtObserver<O>
where
  O: Observer<Item, Err>,
  Err: From<RxError>,
{
  fn next(&mut self, value: Item) {
    if self.observer.is_none() {
      return;
    }
    if self.remaining > 0 {
      self.remaining -= 1;
      return;
    }
    if let Some(mut observer) = self.observer.take() {
      observer.next(value);
      observer.complete();
    }
    self.upstream.unsubscribe();
  }

  fn error(self, err: Err) {
    if let Some(observer) = self.observer {
      observer.error(err)
    }
  }

  fn complete(self) {
    if let Some(observer) = self.observer {
      observer.error(RxError::ArgumentOutOfRange.into())
    }
  }

  fn is_closed(&self) -> bool {
    self.observer.as_ref().map_or(true, |o| o.is_closed())
  }
}
