use std::{cell::{Cell, RefCell}, future::Future, rc::Rc, time::Duration};
use futures::future::LocalBoxFuture;

type Action<V> = Rc<dyn Fn(V) -> LocalBoxFuture<'static, ()>>;

/// Runs `action` with the latest scheduled value once `delay` has passed
/// without another `schedule` call. Each schedule supersedes the previous
/// one; `cancel` drops whatever is pending and `flush` runs it right away.
///
/// `schedule` hands back the waiting future instead of spawning it, so the
/// caller decides which executor owns it (a Dioxus `spawn` in the UI,
/// `block_on` in tests).
pub struct DebouncedTask<V> {
  delay: Duration,
  generation: Rc<Cell<u64>>,
  slot: Rc<RefCell<Option<V>>>,
  action: Action<V>
}

impl<V> Clone for DebouncedTask<V> {
  fn clone(&self) -> Self {
    Self {
      delay: self.delay,
      generation: self.generation.clone(),
      slot: self.slot.clone(),
      action: self.action.clone()
    }
  }
}

impl<V: 'static> DebouncedTask<V> {
  pub fn new<F, Fut>(delay: Duration, action: F) -> Self
  where
    F: Fn(V) -> Fut + 'static,
    Fut: Future<Output = ()> + 'static,
  {
    let action: Action<V> = Rc::new(move |value: V| -> LocalBoxFuture<'static, ()> { Box::pin(action(value)) });
    Self { delay, generation: Rc::new(Cell::new(0)), slot: Rc::new(RefCell::new(None)), action }
  }

  pub fn delay(&self) -> Duration {
    self.delay
  }

  pub fn is_pending(&self) -> bool {
    self.slot.borrow().is_some()
  }

  /// Resolves to `true` if this call's value reached the action, `false` if a
  /// later schedule, a cancel or a flush superseded it.
  pub fn schedule(&self, value: V) -> impl Future<Output = bool> + 'static {
    let ticket = self.generation.get() + 1;
    self.generation.set(ticket);
    *self.slot.borrow_mut() = Some(value);

    let generation = self.generation.clone();
    let slot = self.slot.clone();
    let action = self.action.clone();
    let delay = self.delay;

    async move {
      async_std::task::sleep(delay).await;
      if generation.get() != ticket {
        return false;
      }
      let Some(value) = slot.borrow_mut().take() else {
        return false;
      };
      action(value).await;
      true
    }
  }

  pub fn cancel(&self) {
    self.generation.set(self.generation.get() + 1);
    self.slot.borrow_mut().take();
  }

  /// Stops the timer and hands back the action for the pending value, if
  /// any. The returned future must be driven by an executor that outlives
  /// the caller when the caller is going away.
  pub fn flush(&self) -> Option<LocalBoxFuture<'static, ()>> {
    self.generation.set(self.generation.get() + 1);
    let value = self.slot.borrow_mut().take()?;
    Some((self.action)(value))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::RefCell;
  use async_std::task::block_on;

  fn recorder() -> (Rc<RefCell<Vec<String>>>, DebouncedTask<String>) {
    let calls = Rc::new(RefCell::new(vec![]));
    let sink = calls.clone();
    let task = DebouncedTask::new(Duration::from_millis(20), move |v: String| {
      let sink = sink.clone();
      async move { sink.borrow_mut().push(v) }
    });
    (calls, task)
  }

  #[test]
  fn only_the_last_value_in_a_burst_runs() {
    let (calls, task) = recorder();
    let (first, second, third) = block_on(async {
      futures::join!(task.schedule("a".into()), task.schedule("ab".into()), task.schedule("abc".into()))
    });
    assert_eq!((first, second, third), (false, false, true));
    assert_eq!(*calls.borrow(), vec!["abc".to_string()]);
    assert!(!task.is_pending());
  }

  #[test]
  fn cancel_drops_the_pending_value() {
    let (calls, task) = recorder();
    let waiting = task.schedule("x".into());
    assert!(task.is_pending());
    task.cancel();
    assert!(!block_on(waiting));
    assert!(calls.borrow().is_empty());
  }

  #[test]
  fn flush_runs_the_pending_value_once() {
    let (calls, task) = recorder();
    let waiting = task.schedule("draft".into());
    let flushed = task.flush().expect("a value was pending");
    assert!(!task.is_pending());
    block_on(flushed);
    assert!(!block_on(waiting));
    assert_eq!(*calls.borrow(), vec!["draft".to_string()]);
    assert!(task.flush().is_none());
  }

  #[test]
  fn sequential_schedules_each_run() {
    let (calls, task) = recorder();
    assert!(block_on(task.schedule("one".into())));
    assert!(block_on(task.schedule("two".into())));
    assert_eq!(calls.borrow().len(), 2);
  }
}
