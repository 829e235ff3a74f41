use std::{collections::HashMap, hash::Hash};

use crate::{
  observable::Observable,
  observer::{Event, Observer},
  subject::PublishSubject,
  subscription::{
    BoxSubscription, CompositeSubscription, RefCountSubscription,
    SingleAssignmentSubscription, SubscriptionLike,
  },
};

#[derive(Clone)]
pub struct GroupBy<S, F> {
  pub(crate) source: S,
  pub(crate) key_selector: F,
}

/// The values of one key, as emitted by `group_by`.
///
/// Subscribing keeps the grouped source subscribed even after the outer
/// subscription was released. Values arriving while a group has no
/// subscriber are dropped.
pub struct GroupedObservable<K, Item, Err> {
  key: K,
  subject: PublishSubject<Item, Err>,
  source: RefCountSubscription,
}

impl<K, Item, Err> GroupedObservable<K, Item, Err> {
  #[inline]
  pub fn key(&self) -> &K { &self.key }
}

impl<K: Clone, Item, Err> Clone for GroupedObservable<K, Item, Err> {
  fn clone(&self) -> Self {
    GroupedObservable {
      key: self.key.clone(),
      subject: self.subject.clone(),
      source: self.source.clone(),
    }
  }
}

impl<K, Item, Err> Observable for GroupedObservable<K, Item, Err>
where
  K: Send + Sync + 'static,
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  type Item = Item;
  type Err = Err;

  fn actual_subscribe<O>(&self, observer: O) -> BoxSubscription
  where
    O: Observer<Item, Err> + 'static,
  {
    let subscription = CompositeSubscription::default();
    subscription.add_boxed(self.source.retain());
    subscription.add_boxed(self.subject.actual_subscribe(observer));
    Box::new(subscription)
  }
}

impl<S, F, K> Observable for GroupBy<S, F>
where
  S: Observable,
  S::Item: Clone,
  S::Err: Clone,
  K: Hash + Eq + Clone + Send + Sync + 'static,
  F: FnMut(&S::Item) -> Result<K, S::Err> + Clone + Send + Sync + 'static,
{
  type Item = GroupedObservable<K, S::Item, S::Err>;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, observer: O) -> BoxSubscription
  where
    O: Observer<Self::Item, S::Err> + 'static,
  {
    let upstream = SingleAssignmentSubscription::default();
    let source = RefCountSubscription::new(upstream.clone());
    let observer = GroupByObserver {
      observer: Some(observer),
      key_selector: self.key_selector.clone(),
      groups: HashMap::new(),
      source: source.clone(),
      upstream: upstream.clone(),
    };
    upstream.set_boxed(self.source.actual_subscribe(observer));
    Box::new(source)
  }
}

struct GroupByObserver<O, F, K, Item, Err> {
  observer: Option<O>,
  key_selector: F,
  groups: HashMap<K, PublishSubject<Item, Err>>,
  source: RefCountSubscription,
  upstream: SingleAssignmentSubscription,
}

impl<O, F, K, Item, Err> GroupByObserver<O, F, K, Item, Err>
where
  O: Observer<GroupedObservable<K, Item, Err>, Err>,
  K: Hash + Eq + Clone + Send + Sync + 'static,
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  fn terminate(&mut self, event: Event<Item, Err>) {
    let Some(observer) = self.observer.take() else { return };
    for (_, group) in self.groups.drain() {
      group.on(event.clone());
    }
    // A released outer subscriber is dropped without a terminal event.
    if !self.source.is_primary_released() {
      match event {
        Event::Error(err) => observer.error(err),
        Event::Completed => observer.complete(),
        Event::Next(_) => {}
      }
    }
    self.upstream.unsubscribe();
  }

  fn group(&mut self, key: K) -> &PublishSubject<Item, Err> {
    if !self.groups.contains_key(&key) {
      let subject = PublishSubject::new();
      self.groups.insert(key.clone(), subject.clone());
      tracing::debug!(groups = self.groups.len(), "group_by opened group");
      // Nobody listens for new groups once the outer subscriber left.
      if !self.source.is_primary_released() {
        if let Some(observer) = self.observer.as_mut() {
          let source = self.source.clone();
          observer.next(GroupedObservable { key: key.clone(), subject, source });
        }
      }
    }
    &self.groups[&key]
  }
}

impl<O, F, K, Item, Err> Observer<Item, Err> for GroupByObserver<O, F, K, Item, Err>
where
  O: Observer<GroupedObservable<K, Item, Err>, Err>,
  F: FnMut(&Item) -> Result<K, Err> + Send,
  K: Hash + Eq + Clone + Send + Sync + 'static,
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  fn next(&mut self, value: Item) {
    if self.observer.is_none() {
      return;
    }
    match (self.key_selector)(&value) {
      Ok(key) => self.group(key).on(Event::Next(value)),
      Err(err) => self.terminate(Event::Error(err)),
    }
  }

  fn error(mut self, err: Err) { self.terminate(Event::Error(err)) }

  fn complete(mut self) { self.terminate(Event::Completed) }

  fn is_closed(&self) -> bool { self.observer.is_none() }
}
