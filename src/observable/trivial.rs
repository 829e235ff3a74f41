use std::marker::PhantomData;

use crate::{
  observable::Observable, observer::Observer, subscription::BoxSubscription,
};

/// Creates an observable that emits no items, just terminates with an error.
///
/// # Arguments
///
/// * `e` - An error to emit and terminate with
pub fn throw_err<Item, Err: Clone>(e: Err) -> ThrowErr<Item, Err> {
  ThrowErr(e, PhantomData)
}

#[derive(Clone)]
pub struct ThrowErr<Item, Err>(Err, PhantomData<fn() -> Item>);

impl<Item, Err> Observable for ThrowErr<Item, Err>
where
  Item: Send + 'static,
  Err: Clone + Send + Sync + 'static,
{
  type Item = Item;
  type Err = Err;

  fn actual_subscribe<O>(&self, observer: O) -> BoxSubscription
  where
    O: Observer<Item, Err> + 'static,
  {
    observer.error(self.0.clone());
    Box::new(())
  }
}

/// Creates an observable that produces no values.
///
/// Completes immediately. Never emits an error.
///
/// # Examples
/// ```
/// use rxkit::prelude::*;
///
/// observable::empty::<i32, ()>().subscribe(|v| println!("{},", v));
///
/// // Result: no thing printed
/// ```
pub fn empty<Item, Err>() -> Empty<Item, Err> { Empty(PhantomData) }

pub struct Empty<Item, Err>(PhantomData<fn() -> (Item, Err)>);

impl<Item, Err> Clone for Empty<Item, Err> {
  fn clone(&self) -> Self { Empty(PhantomData) }
}

impl<Item, Err> Observable for Empty<Item, Err>
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
    observer.complete();
    Box::new(())
  }
}

/// Creates an observable that never emits anything.
///
/// Neither emits a value, nor completes, nor emits an error.
pub fn never<Item, Err>() -> Never<Item, Err> { Never(PhantomData) }

pub struct Never<Item, Err>(PhantomData<fn() -> (Item, Err)>);

impl<Item, Err> Clone for Never<Item, Err> {
  fn clone(&self) -> Self { Never(PhantomData) }
}

impl<Item, Err> Observable for Never<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  type Item = Item;
  type Err = Err;

  fn actual_subscribe<O>(&self, _observer: O) -> BoxSubscription
  where
    O: Observer<Item, Err> + 'static,
  {
    Box::new(())
  }
}

#[cfg(test)]
mod test {
  use std::sync::Arc;

  use parking_lot::Mutex;

  use crate::prelude::*;

  #[test]
  fn throw() {
    let value_emitted = Arc::new(Mutex::new(false));
    let completed = Arc::new(Mutex::new(false));
    let error_emitted = Arc::new(Mutex::new(String::new()));
    let (c_value, c_completed, c_error) =
      (value_emitted.clone(), completed.clone(), error_emitted.clone());
    observable::throw_err::<i32, _>(String::from("error")).subscribe_all(
      move |_| *c_value.lock() = true,
      move |e| *c_error.lock() = e,
      move || *c_completed.lock() = true,
    );
    assert!(!*value_emitted.lock());
    assert!(!*completed.lock());
    assert_eq!(*error_emitted.lock(), "error");
  }

  #[test]
  fn empty() {
    let hits = Arc::new(Mutex::new(0));
    let completed = Arc::new(Mutex::new(false));
    let (c_hits, c_completed) = (hits.clone(), completed.clone());
    observable::empty::<i32, ()>().subscribe_all(
      move |_| *c_hits.lock() += 1,
      |_| {},
      move || *c_completed.lock() = true,
    );
    assert_eq!(*hits.lock(), 0);
    assert!(*completed.lock());
  }

  #[test]
  fn never() {
    let hits = Arc::new(Mutex::new(0));
    let c_hits = hits.clone();
    observable::never::<i32, ()>().subscribe_all(
      move |_| *c_hits.lock() += 1,
      |_| panic!("never errors"),
      || panic!("never completes"),
    );
    assert_eq!(*hits.lock(), 0);
  }
}
