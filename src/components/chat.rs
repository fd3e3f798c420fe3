use dioxus::{logger::tracing::info, prelude::*};
use tradedesk::{
  editor::chat::ChatTranscript,
  utils::{api::ApiClient, models::ChatRole, server::AppError, session::use_auth}
};
use crate::components::{code_editor::EditorHandle, status::ErrorBanner};

fn msg_class(role: ChatRole) -> &'static str {
  match role {
    ChatRole::User => "chat-msg user",
    _ => "chat-msg assistant"
  }
}

/// AI assistant. Replies carrying code go straight into the editor through
/// `on_code`, which the editor treats as an external injection.
#[component]
pub fn ChatPane(editor: EditorHandle, on_code: EventHandler<String>) -> Element {
  let mut auth = use_auth();
  let api = use_context::<ApiClient>();
  let mut transcript = use_signal(ChatTranscript::default);
  let mut draft = use_signal(String::new);
  let mut waiting = use_signal(|| false);
  let mut error: Signal<Option<AppError>> = use_signal(|| None);

  let mut send = move || {
    let text = draft.peek().trim().to_string();
    if text.is_empty() || *waiting.peek() {
      return;
    }
    let (strategy_id, current_code) = {
      let a = editor.arbiter.peek();
      (a.strategy_id().map(str::to_string), Some(a.code().to_string()))
    };
    let req = transcript.write().ask(&text, strategy_id, current_code);
    draft.set(String::new());
    waiting.set(true);
    error.set(None);

    let api = api.clone();
    let session = auth.session.peek().clone();
    spawn(async move {
      match api.chat(&session, &req).await {
        Ok(resp) => {
          if let Some(code) = transcript.write().receive(resp) {
            info!("assistant returned {} bytes of code", code.len());
            on_code.call(code);
          }
        },
        Err(e) => error.set(Some(auth.intercept(e)))
      }
      waiting.set(false);
    });
  };

  rsx! {
    div {
      class: "chat-pane",
      div {
        class: "chat-log",
        if transcript.read().is_empty() {
          p { class: "chat-hint", "Describe the strategy you want and the assistant will write it." }
        }
        for (idx, msg) in transcript.read().messages().iter().enumerate() {
          div {
            key: "{idx}",
            class: msg_class(msg.role),
            p { "{msg.text}" }
            if let Some(code) = msg.code.clone() {
              button {
                class: "chat-inject",
                onclick: move |_| on_code.call(code.clone()),
                "Insert code again"
              }
            }
          }
        }
        if waiting() {
          p { class: "chat-waiting", "Thinking…" }
        }
      }
      if let Some(err) = error() {
        ErrorBanner { error: err, on_retry: None }
      }
      form {
        class: "chat-input",
        onsubmit: move |evt| {
          evt.prevent_default();
          send();
        },
        textarea {
          value: "{draft}",
          placeholder: "Ask the assistant…",
          oninput: move |evt| draft.set(evt.value())
        }
        button { r#type: "submit", disabled: waiting(), "Send" }
      }
    }
  }
}
