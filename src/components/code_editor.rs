use dioxus::{logger::tracing::{error, info}, prelude::*};
use tradedesk::{
  editor::arbiter::{AutosaveRequest, EditorArbiter, EditorEffect, EditorState},
  utils::{
    api::ApiClient,
    config::AppConfig,
    debounce::DebouncedTask,
    models::{StrategyUpdate, ValidateCodeResponse},
    server::AppError,
    session::{use_auth, Auth}
  }
};
use crate::components::status::ErrorBanner;

pub const SCAFFOLD: &str = r#"# Select or create a strategy to start editing.
def on_candle(ctx, candle):
    pass
"#;

/// Editor text plus the machinery around it: arbitration, the debounced
/// autosave and the last save error. Copy, so handlers can capture it.
#[derive(Clone, Copy, PartialEq)]
pub struct EditorHandle {
  pub arbiter: Signal<EditorArbiter>,
  pub save_error: Signal<Option<AppError>>,
  pub saving: Signal<bool>,
  autosave: Signal<DebouncedTask<()>>,
  api: Signal<ApiClient>,
  auth: Auth
}

pub fn use_editor() -> EditorHandle {
  let auth = use_auth();
  let client = use_context::<ApiClient>();
  let api = use_signal(|| client);
  let config = use_context::<AppConfig>();
  let arbiter = use_signal(|| EditorArbiter::new(SCAFFOLD));
  let save_error = use_signal(|| None);
  let saving = use_signal(|| false);

  let autosave = use_signal(move || DebouncedTask::new(config.autosave_debounce, move |_: ()| async move {
    // read at fire time; a keystroke since scheduling is included
    let Some(req) = arbiter.peek().take_autosave() else {
      return;
    };
    persist(api, auth, arbiter, save_error, saving, req).await;
  }));

  EditorHandle { arbiter, save_error, saving, autosave, api, auth }
}

async fn persist(
  api: Signal<ApiClient>,
  mut auth: Auth,
  mut arbiter: Signal<EditorArbiter>,
  mut save_error: Signal<Option<AppError>>,
  mut saving: Signal<bool>,
  req: AutosaveRequest
) {
  let api = api.peek().clone();
  let session = auth.session.peek().clone();
  saving.set(true);
  info!("saving code for strategy {}", req.strategy_id);

  match api.update_strategy(&session, &req.strategy_id, &StrategyUpdate::code(req.code.clone())).await {
    Ok(saved) => {
      let stored = saved.code.unwrap_or(req.code.clone());
      let mut a = arbiter.write();
      a.save_confirmed(&req.strategy_id, &req.code);
      if a.strategy_id() == Some(req.strategy_id.as_str()) {
        a.observe_persisted(&stored);
      }
      save_error.set(None);
    },
    Err(e) => {
      error!("saving strategy {} failed: {}", req.strategy_id, e);
      arbiter.write().save_failed();
      save_error.set(Some(auth.intercept(e)));
    }
  }
  saving.set(false);
}

impl EditorHandle {
  fn apply(&self, effect: EditorEffect) {
    match effect {
      EditorEffect::None => {},
      EditorEffect::ScheduleAutosave => {
        let pending = self.autosave.peek().schedule(());
        spawn(async move {
          pending.await;
        });
      },
      EditorEffect::CancelAutosave => self.autosave.peek().cancel(),
      EditorEffect::Flush(req) => {
        self.autosave.peek().cancel();
        spawn(persist(self.api, self.auth, self.arbiter, self.save_error, self.saving, req));
      }
    }
  }

  /// The persisted copy of `strategy_id` was fetched.
  pub fn load(&mut self, strategy_id: &str, code: &str) {
    let effect = self.arbiter.write().select(strategy_id, code);
    self.apply(effect);
  }

  pub fn deselect(&mut self) {
    let effect = self.arbiter.write().deselect();
    self.apply(effect);
  }

  pub fn inject(&mut self, code: &str) {
    let effect = self.arbiter.write().inject(code);
    self.apply(effect);
  }

  pub fn keystroke(&mut self, value: &str) {
    let effect = self.arbiter.write().keystroke(value);
    self.apply(effect);
  }

  /// Explicit save of whatever is shown, injected code included.
  pub fn save_now(&mut self) {
    let req = {
      let a = self.arbiter.peek();
      a.strategy_id().map(|id| AutosaveRequest { strategy_id: id.to_string(), code: a.code().to_string() })
    };
    if let Some(req) = req {
      self.apply(EditorEffect::Flush(req));
    }
  }

  pub fn state(&self) -> EditorState {
    self.arbiter.read().state()
  }
}

#[component]
pub fn CodeEditor(editor: EditorHandle) -> Element {
  let mut editor = editor;
  let mut auth = use_auth();
  let api = use_context::<ApiClient>();
  let mut validation: Signal<Option<Result<ValidateCodeResponse, AppError>>> = use_signal(|| None);

  let code = editor.arbiter.read().code().to_string();
  let state = editor.state();
  let has_strategy = editor.arbiter.read().strategy_id().is_some();

  let state_label = match state {
    EditorState::Idle => "No strategy",
    EditorState::ServerAuthoritative => "Saved",
    EditorState::ExternallyInjected => "Generated code (not yet saved)",
    EditorState::UserEditing if (editor.saving)() => "Saving…",
    EditorState::UserEditing => "Unsaved changes",
  };

  let validate = move |_| {
    let api = api.clone();
    let session = auth.session.peek().clone();
    let code = editor.arbiter.peek().code().to_string();
    spawn(async move {
      let result = api.validate_code(&session, &code).await.map_err(|e| auth.intercept(e));
      validation.set(Some(result));
    });
  };

  rsx! {
    div {
      class: "code-editor",
      div {
        class: "editor-toolbar",
        span { class: "editor-state", "{state_label}" }
        button { disabled: !has_strategy, onclick: validate, "Validate" }
        if has_strategy && state == EditorState::ExternallyInjected {
          button { onclick: move |_| editor.save_now(), "Save generated code" }
        }
      }
      textarea {
        class: "editor-text",
        spellcheck: false,
        value: "{code}",
        oninput: move |evt| editor.keystroke(&evt.value())
      }
      if let Some(err) = (editor.save_error)() {
        ErrorBanner { error: err, on_retry: move |_| editor.save_now() }
      }
      {match validation() {
        Some(Ok(result)) if result.valid && result.warnings.is_empty() => rsx! {
          p { class: "validation ok", "Code is valid." }
        },
        Some(Ok(result)) => rsx! {
          ul {
            class: "validation",
            for msg in result.errors.iter() {
              li { class: "validation-error", "{msg}" }
            }
            for msg in result.warnings.iter() {
              li { class: "validation-warning", "{msg}" }
            }
          }
        },
        Some(Err(err)) => rsx! { ErrorBanner { error: err, on_retry: None } },
        None => rsx! {}
      }}
    }
  }
}
