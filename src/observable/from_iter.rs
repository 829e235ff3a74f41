use std::{marker::PhantomData, sync::Arc};

use crate::{
  observable::Observable, observer::Observer, subscription::BoxSubscription,
};

/// Creates an observable that emits every value of `iter` and then completes.
///
/// Each subscription walks a fresh clone of `iter`. Emission stops early once
/// the observer reports itself closed.
///
/// ```
/// use rxkit::prelude::*;
///
/// observable::from_iter::<_, ()>(0..3).subscribe(|v| println!("{},", v));
/// ```
pub fn from_iter<I, Err>(iter: I) -> FromIter<I, Err>
where
  I: IntoIterator + Clone,
{
  FromIter { iter, _err: PhantomData }
}

/// Creates an observable producing a single value.
pub fn of<Item, Err>(v: Item) -> FromIter<std::iter::Once<Item>, Err>
where
  Item: Clone,
{
  from_iter(std::iter::once(v))
}

/// Alias of [`of`].
#[inline]
pub fn just<Item: Clone, Err>(v: Item) -> FromIter<std::iter::Once<Item>, Err> {
  of(v)
}

/// Emits `count` consecutive integers starting at `start`.
pub fn range<Err>(start: i64, count: usize) -> FromIter<std::ops::Range<i64>, Err> {
  from_iter(start..start + count as i64)
}

/// Creates an observable producing the given values in order.
///
/// ```
/// use rxkit::{of_sequence, prelude::*};
///
/// let seq: observable::FromIter<_, ()> = of_sequence!(1, 2, 3);
/// seq.subscribe(|v: i32| println!("{},", v));
/// ```
#[macro_export]
macro_rules! of_sequence {
  ( $( $item:expr ),* $(,)? ) => {
    $crate::observable::from_iter([$($item),*])
  };
}

#[derive(Clone)]
pub struct FromIter<I, Err> {
  iter: I,
  _err: PhantomData<fn() -> Err>,
}

impl<I, Err> Observable for FromIter<I, Err>
where
  I: IntoIterator + Clone + Send + Sync + 'static,
  I::Item: Send + 'static,
  Err: Send + 'static,
{
  type Item = I::Item;
  type Err = Err;

  fn actual_subscribe<O>(&self, mut observer: O) -> BoxSubscription
  where
    O: Observer<I::Item, Err> + 'static,
  {
    for v in self.iter.clone() {
      if observer.is_closed() {
        return Box::new(());
      }
      observer.next(v);
    }
    observer.complete();
    Box::new(())
  }
}

/// Generates values by running a state machine, like a `for` loop:
/// `initial`, then `iterate(&state)` while `condition(&state)` holds.
pub fn generate<T, Err, C, I>(
  initial: T,
  condition: C,
  iterate: I,
) -> Generate<T, Err, C, I>
where
  C: Fn(&T) -> bool,
  I: Fn(&T) -> T,
{
  Generate {
    initial,
    condition: Arc::new(condition),
    iterate: Arc::new(iterate),
    _err: PhantomData,
  }
}

pub struct Generate<T, Err, C, I> {
  initial: T,
  condition: Arc<C>,
  iterate: Arc<I>,
  _err: PhantomData<fn() -> Err>,
}

impl<T: Clone, Err, C, I> Clone for Generate<T, Err, C, I> {
  fn clone(&self) -> Self {
    Generate {
      initial: self.initial.clone(),
      condition: self.condition.clone(),
      iterate: self.iterate.clone(),
      _err: PhantomData,
    }
  }
}

impl<T, Err, C, I> Observable for Generate<T, Err, C, I>
where
  T: Clone + Send + Sync + 'static,
  Err: Send + 'static,
  C: Fn(&T) -> bool + Send + Sync + 'static,
  I: Fn(&T) -> T + Send + Sync + 'static,
{
  type Item = T;
  type Err = Err;

  fn actual_subscribe<O>(&self, mut observer: O) -> BoxSubscription
  where
    O: Observer<T, Err> + 'static,
  {
    let mut state = self.initial.clone();
    while (self.condition)(&state) {
      if observer.is_closed() {
        return Box::new(());
      }
      let next = (self.iterate)(&state);
      observer.next(std::mem::replace(&mut state, next));
    }
    observer.complete();
    Box::new(())
  }
}

#[cfg(test)]
mod test {
  use std::sync::Arc;

  use parking_lot::Mutex;

  use crate::prelude::*;

  #[test]
  fn from_range() {
    let hit_count = Arc::new(Mutex::new(0));
    let completed = Arc::new(Mutex::new(false));
    let c_hit = hit_count.clone();
    let c_completed = completed.clone();
    observable::from_iter::<_, ()>(0..100).subscribe_all(
      move |_| *c_hit.lock() += 1,
      |_| {},
      move || *c_completed.lock() = true,
    );
    assert_eq!(*hit_count.lock(), 100);
    assert!(*completed.lock());
  }

  #[test]
  fn of_and_range() {
    let values = Arc::new(Mutex::new(vec![]));
    let c_values = values.clone();
    observable::of::<_, ()>(7i64)
      .concat_with(observable::range(1, 3))
      .subscribe(move |v| c_values.lock().push(v));
    assert_eq!(*values.lock(), vec![7, 1, 2, 3]);
  }

  #[test]
  fn sequence_macro() {
    let values = Arc::new(Mutex::new(vec![]));
    let c_values = values.clone();
    crate::of_sequence!(1, 2, 3)
      .subscribe_err(move |v| c_values.lock().push(v), |_: ()| {});
    assert_eq!(*values.lock(), vec![1, 2, 3]);
  }

  #[test]
  fn generate_like_a_loop() {
    let values = Arc::new(Mutex::new(vec![]));
    let c_values = values.clone();
    observable::generate::<_, (), _, _>(0, |x| *x < 5, |x| x + 2)
      .subscribe(move |v| c_values.lock().push(v));
    assert_eq!(*values.lock(), vec![0, 2, 4]);
  }

  #[test]
  fn infinite_source_stops_when_closed() {
    let values = Arc::new(Mutex::new(vec![]));
    let c_values = values.clone();
    observable::from_iter::<_, ()>(0..)
      .take(3)
      .subscribe(move |v| c_values.lock().push(v));
    assert_eq!(*values.lock(), vec![0, 1, 2]);
  }
}
