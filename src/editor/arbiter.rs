use dioxus::logger::tracing::{debug, info};

/// Who currently owns the editor text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditorState {
  /// No strategy selected; the scaffold is shown.
  #[default]
  Idle,
  /// Showing the persisted copy. Autosave active.
  ServerAuthoritative,
  /// Showing code pushed in from outside (AI reply). Autosave suspended until
  /// the persisted copy is seen to match.
  ExternallyInjected,
  /// The user typed since the last confirmed save. Autosave active.
  UserEditing,
}

/// What the caller must do with its autosave timer after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEffect {
  None,
  /// (Re)start the debounce window.
  ScheduleAutosave,
  /// Drop any pending debounce.
  CancelAutosave,
  /// Save this right away, the editor is moving to another strategy.
  Flush(AutosaveRequest),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutosaveRequest {
  pub strategy_id: String,
  pub code: String
}

/// Arbitrates between persisted code, injected code and keystrokes for the
/// single code value shown in the editor.
///
/// Pure: it owns no timer and does no I/O. Every transition returns an
/// [`EditorEffect`] the component applies to its [`DebouncedTask`], and the
/// debounced action asks [`EditorArbiter::take_autosave`] what, if anything,
/// to send.
///
/// [`DebouncedTask`]: crate::utils::debounce::DebouncedTask
#[derive(Debug, Clone, PartialEq)]
pub struct EditorArbiter {
  state: EditorState,
  scaffold: String,
  strategy_id: Option<String>,
  code: String,
  /// Last code known to be stored on the server.
  persisted: String,
  pending_injection: Option<String>
}

impl EditorArbiter {
  pub fn new(scaffold: impl Into<String>) -> Self {
    let scaffold = scaffold.into();
    Self {
      state: EditorState::Idle,
      code: scaffold.clone(),
      scaffold,
      strategy_id: None,
      persisted: String::new(),
      pending_injection: None
    }
  }

  pub fn state(&self) -> EditorState {
    self.state
  }

  pub fn code(&self) -> &str {
    &self.code
  }

  pub fn strategy_id(&self) -> Option<&str> {
    self.strategy_id.as_deref()
  }

  pub fn pending_injection(&self) -> Option<&str> {
    self.pending_injection.as_deref()
  }

  pub fn is_dirty(&self) -> bool {
    self.strategy_id.is_some() && self.code != self.persisted
  }

  pub fn autosave_active(&self) -> bool {
    matches!(self.state, EditorState::ServerAuthoritative | EditorState::UserEditing)
  }

  /// A strategy was selected, or its persisted copy was (re)loaded.
  pub fn select(&mut self, strategy_id: &str, persisted_code: &str) -> EditorEffect {
    if self.strategy_id.as_deref() == Some(strategy_id) {
      return self.observe_persisted(persisted_code);
    }

    // unsaved keystrokes for the strategy being left go out immediately
    let flush = match (&self.strategy_id, self.state) {
      (Some(id), EditorState::UserEditing) if self.code != self.persisted => {
        Some(AutosaveRequest { strategy_id: id.clone(), code: self.code.clone() })
      },
      _ => None
    };

    info!("editor loading strategy {}", strategy_id);
    self.strategy_id = Some(strategy_id.to_string());
    self.code = persisted_code.to_string();
    self.persisted = persisted_code.to_string();
    self.pending_injection = None;
    self.state = EditorState::ServerAuthoritative;

    match flush {
      Some(req) => EditorEffect::Flush(req),
      None => EditorEffect::CancelAutosave
    }
  }

  /// Code arriving from outside the editor. Empty payloads are ignored.
  pub fn inject(&mut self, code: &str) -> EditorEffect {
    if code.trim().is_empty() {
      return EditorEffect::None;
    }
    self.code = code.to_string();

    if self.strategy_id.is_none() {
      // shown on the scratchpad only; there is nothing to save it to
      debug!("external code shown with no strategy selected");
      return EditorEffect::None;
    }

    if same_code(code, &self.persisted) {
      // nothing left to round-trip
      self.pending_injection = None;
      self.state = EditorState::ServerAuthoritative;
      return EditorEffect::CancelAutosave;
    }

    info!("external code injected ({} bytes), autosave suspended", code.len());
    self.pending_injection = Some(code.to_string());
    self.state = EditorState::ExternallyInjected;
    EditorEffect::CancelAutosave
  }

  /// The user changed the editor text.
  pub fn keystroke(&mut self, value: &str) -> EditorEffect {
    if value == self.code && self.state != EditorState::ExternallyInjected {
      return EditorEffect::None;
    }
    self.code = value.to_string();
    if self.pending_injection.take().is_some() {
      debug!("keystroke overrides pending injection");
    }
    if self.strategy_id.is_none() {
      // scaffold edits have nowhere to be saved
      self.state = EditorState::Idle;
      return EditorEffect::None;
    }
    self.state = EditorState::UserEditing;
    EditorEffect::ScheduleAutosave
  }

  /// Called when the debounce window elapses. Returns what to persist, or
  /// `None` if autosave is suspended or nothing changed.
  pub fn take_autosave(&self) -> Option<AutosaveRequest> {
    if self.state != EditorState::UserEditing || !self.is_dirty() {
      return None;
    }
    let strategy_id = self.strategy_id.clone()?;
    Some(AutosaveRequest { strategy_id, code: self.code.clone() })
  }

  /// A save of `code` succeeded.
  pub fn save_confirmed(&mut self, strategy_id: &str, code: &str) -> EditorEffect {
    if self.strategy_id.as_deref() != Some(strategy_id) {
      return EditorEffect::None;
    }
    self.persisted = code.to_string();
    if self.state == EditorState::UserEditing && self.code == code {
      info!("autosave confirmed for {}", strategy_id);
      self.state = EditorState::ServerAuthoritative;
    }
    EditorEffect::None
  }

  /// A save failed. The text stays dirty; the next keystroke retries.
  pub fn save_failed(&mut self) -> EditorEffect {
    EditorEffect::None
  }

  /// A refreshed copy of the selected strategy's stored code was observed.
  pub fn observe_persisted(&mut self, code: &str) -> EditorEffect {
    if self.strategy_id.is_none() {
      return EditorEffect::None;
    }
    self.persisted = code.to_string();
    match self.state {
      EditorState::ExternallyInjected => {
        let confirmed = self.pending_injection.as_deref().is_some_and(|p| same_code(p, code));
        if confirmed {
          info!("injected code confirmed persisted, autosave resumed");
          self.pending_injection = None;
          self.state = EditorState::ServerAuthoritative;
        }
        EditorEffect::None
      },
      EditorState::ServerAuthoritative => {
        // nothing local to protect, follow the server
        self.code = code.to_string();
        EditorEffect::None
      },
      // keystrokes win over a refresh; their save is still pending
      EditorState::UserEditing | EditorState::Idle => EditorEffect::None
    }
  }

  pub fn deselect(&mut self) -> EditorEffect {
    let flush = match (&self.strategy_id, self.state) {
      (Some(id), EditorState::UserEditing) if self.code != self.persisted => {
        Some(AutosaveRequest { strategy_id: id.clone(), code: self.code.clone() })
      },
      _ => None
    };
    self.state = EditorState::Idle;
    self.strategy_id = None;
    self.code = self.scaffold.clone();
    self.persisted.clear();
    self.pending_injection = None;
    match flush {
      Some(req) => EditorEffect::Flush(req),
      None => EditorEffect::CancelAutosave
    }
  }
}

/// Equality that tolerates what a backend may do to text on save: CRLF
/// line endings and trailing whitespace at the end of the file.
pub fn same_code(a: &str, b: &str) -> bool {
  fn normalize(s: &str) -> String {
    s.replace("\r\n", "\n").trim_end().to_string()
  }
  a == b || normalize(a) == normalize(b)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn loaded(code: &str) -> EditorArbiter {
    let mut arbiter = EditorArbiter::new("# new strategy");
    arbiter.select("s1", code);
    arbiter
  }

  #[test]
  fn starts_idle_with_scaffold() {
    let arbiter = EditorArbiter::new("# new strategy");
    assert_eq!(arbiter.state(), EditorState::Idle);
    assert_eq!(arbiter.code(), "# new strategy");
    assert!(!arbiter.autosave_active());
  }

  #[test]
  fn select_loads_persisted_code_verbatim() {
    let arbiter = loaded("def on_tick():\n    pass\n");
    assert_eq!(arbiter.state(), EditorState::ServerAuthoritative);
    assert_eq!(arbiter.code(), "def on_tick():\n    pass\n");
    assert!(!arbiter.is_dirty());
  }

  #[test]
  fn empty_injection_is_ignored() {
    let mut arbiter = loaded("A");
    assert_eq!(arbiter.inject("   "), EditorEffect::None);
    assert_eq!(arbiter.state(), EditorState::ServerAuthoritative);
    assert_eq!(arbiter.code(), "A");
  }

  #[test]
  fn injection_suspends_autosave() {
    let mut arbiter = loaded("A");
    assert_eq!(arbiter.inject("B"), EditorEffect::CancelAutosave);
    assert_eq!(arbiter.state(), EditorState::ExternallyInjected);
    assert_eq!(arbiter.code(), "B");
    assert!(!arbiter.autosave_active());
    assert_eq!(arbiter.take_autosave(), None);
  }

  #[test]
  fn injection_without_a_strategy_stays_idle() {
    let mut arbiter = EditorArbiter::new("# new strategy");
    assert_eq!(arbiter.inject("B"), EditorEffect::None);
    assert_eq!(arbiter.state(), EditorState::Idle);
    assert_eq!(arbiter.code(), "B");
    assert!(arbiter.pending_injection().is_none());

    // selecting a strategy afterwards loads its stored code as usual
    arbiter.select("s1", "A");
    assert_eq!(arbiter.state(), EditorState::ServerAuthoritative);
    assert_eq!(arbiter.code(), "A");
  }

  #[test]
  fn stale_refresh_does_not_overwrite_injection() {
    let mut arbiter = loaded("A");
    arbiter.inject("B");
    arbiter.observe_persisted("A");
    assert_eq!(arbiter.state(), EditorState::ExternallyInjected);
    assert_eq!(arbiter.code(), "B");
  }

  #[test]
  fn round_trip_tolerates_line_ending_normalisation() {
    let mut arbiter = loaded("A");
    arbiter.inject("x = 1\r\ny = 2\r\n");
    arbiter.observe_persisted("x = 1\ny = 2");
    assert_eq!(arbiter.state(), EditorState::ServerAuthoritative);
    assert!(arbiter.pending_injection().is_none());
  }

  #[test]
  fn keystrokes_win_over_refresh() {
    let mut arbiter = loaded("A");
    arbiter.keystroke("AB");
    arbiter.observe_persisted("A");
    assert_eq!(arbiter.code(), "AB");
    assert_eq!(arbiter.take_autosave().unwrap().code, "AB");
  }

  #[test]
  fn confirmed_save_returns_to_server_authoritative() {
    let mut arbiter = loaded("A");
    arbiter.keystroke("AB");
    let req = arbiter.take_autosave().unwrap();
    arbiter.save_confirmed(&req.strategy_id, &req.code);
    assert_eq!(arbiter.state(), EditorState::ServerAuthoritative);
    assert!(arbiter.take_autosave().is_none());
  }

  #[test]
  fn save_confirmation_for_older_text_keeps_editing() {
    let mut arbiter = loaded("A");
    arbiter.keystroke("AB");
    arbiter.keystroke("ABC");
    arbiter.save_confirmed("s1", "AB");
    assert_eq!(arbiter.state(), EditorState::UserEditing);
    assert_eq!(arbiter.take_autosave().unwrap().code, "ABC");
  }

  #[test]
  fn switching_strategy_flushes_unsaved_edits() {
    let mut arbiter = loaded("A");
    arbiter.keystroke("AB");
    let effect = arbiter.select("s2", "Z");
    assert_eq!(effect, EditorEffect::Flush(AutosaveRequest { strategy_id: "s1".to_string(), code: "AB".to_string() }));
    assert_eq!(arbiter.strategy_id(), Some("s2"));
    assert_eq!(arbiter.code(), "Z");
  }

  #[test]
  fn deselect_returns_to_scaffold() {
    let mut arbiter = loaded("A");
    arbiter.inject("B");
    assert_eq!(arbiter.deselect(), EditorEffect::CancelAutosave);
    assert_eq!(arbiter.state(), EditorState::Idle);
    assert_eq!(arbiter.code(), "# new strategy");
    assert!(arbiter.pending_injection().is_none());
  }
}
