use std::{cell::RefCell, rc::Rc, time::Duration};

use async_std::task::block_on;
use futures::future::LocalBoxFuture;
use tradedesk::{
  editor::arbiter::{AutosaveRequest, EditorArbiter, EditorEffect, EditorState},
  utils::debounce::DebouncedTask
};

const WINDOW: Duration = Duration::from_millis(20);

/// The arbiter wired to a real debounce timer, with saves recorded instead
/// of sent.
struct Harness {
  arbiter: Rc<RefCell<EditorArbiter>>,
  saves: Rc<RefCell<Vec<AutosaveRequest>>>,
  autosave: DebouncedTask<()>
}

impl Harness {
  fn new() -> Self {
    let arbiter = Rc::new(RefCell::new(EditorArbiter::new("# scaffold")));
    let saves = Rc::new(RefCell::new(vec![]));
    let (a, s) = (arbiter.clone(), saves.clone());
    let autosave = DebouncedTask::new(WINDOW, move |_: ()| {
      let req = a.borrow().take_autosave();
      let s = s.clone();
      async move {
        if let Some(req) = req {
          s.borrow_mut().push(req);
        }
      }
    });
    Self { arbiter, saves, autosave }
  }

  /// Applies `effect` the way the editor component does and hands back the
  /// timer future, if one was started.
  fn apply(&self, effect: EditorEffect) -> Option<LocalBoxFuture<'static, bool>> {
    match effect {
      EditorEffect::ScheduleAutosave => Some(Box::pin(self.autosave.schedule(()))),
      EditorEffect::CancelAutosave => {
        self.autosave.cancel();
        None
      },
      EditorEffect::Flush(req) => {
        self.autosave.cancel();
        self.saves.borrow_mut().push(req);
        None
      },
      EditorEffect::None => None
    }
  }

  fn select(&self, id: &str, code: &str) {
    let effect = self.arbiter.borrow_mut().select(id, code);
    self.apply(effect);
  }

  fn inject(&self, code: &str) {
    let effect = self.arbiter.borrow_mut().inject(code);
    self.apply(effect);
  }

  fn keystroke(&self, value: &str) -> Option<LocalBoxFuture<'static, bool>> {
    let effect = self.arbiter.borrow_mut().keystroke(value);
    self.apply(effect)
  }

  fn state(&self) -> EditorState {
    self.arbiter.borrow().state()
  }

  fn saved(&self) -> Vec<(String, String)> {
    self.saves.borrow().iter().map(|r| (r.strategy_id.clone(), r.code.clone())).collect()
  }
}

fn idle_for(window: Duration) {
  block_on(async_std::task::sleep(window * 3));
}

#[test]
fn injection_suspends_autosave_until_the_user_types() {
  let editor = Harness::new();
  editor.select("s1", "A");
  assert_eq!(editor.state(), EditorState::ServerAuthoritative);

  // a keystroke timer already running when the injection lands is dropped
  let pending = editor.keystroke("A1").expect("keystroke schedules autosave");
  editor.inject("B");
  assert_eq!(editor.state(), EditorState::ExternallyInjected);
  assert!(!block_on(pending));
  idle_for(WINDOW);
  assert!(editor.saved().is_empty());

  let pending = editor.keystroke("B!").expect("keystroke schedules autosave");
  assert_eq!(editor.state(), EditorState::UserEditing);
  assert!(block_on(pending));
  assert_eq!(editor.saved(), vec![("s1".to_string(), "B!".to_string())]);
}

#[test]
fn observing_the_injected_code_persisted_resumes_autosave() {
  let editor = Harness::new();
  editor.select("s1", "A");
  editor.inject("B");
  assert!(!editor.arbiter.borrow().autosave_active());

  // refresh still showing the old copy
  editor.arbiter.borrow_mut().observe_persisted("A");
  assert_eq!(editor.state(), EditorState::ExternallyInjected);

  // refresh of the same strategy after the backend stored the reply
  editor.select("s1", "B\n");
  assert_eq!(editor.state(), EditorState::ServerAuthoritative);
  assert!(editor.arbiter.borrow().autosave_active());
  assert_eq!(editor.arbiter.borrow().code(), "B");
  assert!(editor.arbiter.borrow().pending_injection().is_none());

  let pending = editor.keystroke("B2").expect("autosave is live again");
  assert!(block_on(pending));
  assert_eq!(editor.saved(), vec![("s1".to_string(), "B2".to_string())]);
}

#[test]
fn injected_then_edited_code_is_saved_exactly_once() {
  let editor = Harness::new();
  editor.select("s1", "A");

  editor.inject("B");
  assert_eq!(editor.arbiter.borrow().code(), "B");
  assert_eq!(editor.state(), EditorState::ExternallyInjected);
  idle_for(WINDOW);
  assert!(editor.saved().is_empty());

  // a burst of keystrokes, then silence
  let first = editor.keystroke("B+").expect("scheduled");
  let second = editor.keystroke("B++").expect("scheduled");
  let third = editor.keystroke("B+").expect("scheduled");
  let outcome = block_on(async { futures::join!(first, second, third) });
  assert_eq!(outcome, (false, false, true));

  assert_eq!(editor.state(), EditorState::UserEditing);
  assert_eq!(editor.saved(), vec![("s1".to_string(), "B+".to_string())]);
}

#[test]
fn switching_strategy_flushes_unsaved_keystrokes() {
  let editor = Harness::new();
  editor.select("s1", "A");
  let pending = editor.keystroke("AB").expect("scheduled");

  editor.select("s2", "Z");
  assert!(!block_on(pending));
  assert_eq!(editor.saved(), vec![("s1".to_string(), "AB".to_string())]);
  assert_eq!(editor.arbiter.borrow().code(), "Z");
  assert_eq!(editor.state(), EditorState::ServerAuthoritative);
}
