use std::time::Duration;

use dioxus::{logger::tracing::{debug, info}, prelude::*};
use tradedesk::{
    editor::arbiter::EditorState,
    utils::{api::ApiClient, server::AppError, session::use_auth},
};
use crate::{
    components::{
        backtest::BacktestPanel,
        chat::ChatPane,
        code_editor::{use_editor, CodeEditor},
        flow_builder::FlowBuilder,
        status::{ErrorBanner, StatusPill},
    },
    Route,
};

/// Re-fetches after an injection while waiting to see it persisted.
const CONFIRM_ATTEMPTS: u32 = 3;
const CONFIRM_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pane {
    Code,
    Flow,
}

fn active_class(active: bool, class: &'static str) -> &'static str {
    if active { class } else { "" }
}

#[component]
pub fn Workbench(strategy: String) -> Element {
    rsx! {
        WorkbenchView { strategy_id: strategy }
    }
}

#[component]
fn WorkbenchView(strategy_id: ReadOnlySignal<String>) -> Element {
    let mut auth = use_auth();
    let api = use_context::<ApiClient>();
    let mut editor = use_editor();
    let mut pane = use_signal(|| Pane::Code);

    let list_api = api.clone();
    let strategies = use_resource(move || {
        let api = list_api.clone();
        let session = auth.session.read().clone();
        async move { api.list_strategies(&session).await.map_err(|e| auth.intercept(e)) }
    });

    let mut selected = use_resource(move || {
        let api = api.clone();
        let session = auth.session.read().clone();
        let id = strategy_id();
        async move {
            if id.is_empty() {
                return Ok(None);
            }
            api.get_strategy(&session, &id).await.map(Some).map_err(|e| auth.intercept(e))
        }
    });

    use_effect(move || {
        match &*selected.read() {
            Some(Ok(Some(strategy))) => editor.load(&strategy.id, strategy.code.as_deref().unwrap_or_default()),
            Some(Ok(None)) => editor.deselect(),
            _ => {}
        }
    });

    let on_code = move |code: String| {
        editor.inject(&code);
        if editor.state() != EditorState::ExternallyInjected {
            return;
        }
        // the assistant may have stored the code itself; watch for it
        spawn(async move {
            for attempt in 1..=CONFIRM_ATTEMPTS {
                async_std::task::sleep(CONFIRM_INTERVAL).await;
                if editor.arbiter.peek().state() != EditorState::ExternallyInjected {
                    return;
                }
                debug!("checking whether injected code was stored ({}/{})", attempt, CONFIRM_ATTEMPTS);
                selected.restart();
            }
            info!("injected code still unsaved, waiting for an explicit save");
        });
    };

    let current = pane();
    let active_id = strategy_id();

    rsx! {
        div {
            class: "page workbench",
            aside {
                class: "strategy-picker",
                h3 { "Strategies" }
                {match &*strategies.read() {
                    None => rsx! { p { "Loading…" } },
                    Some(Err(err)) => rsx! { ErrorBanner { error: err.clone(), on_retry: None } },
                    Some(Ok(list)) => rsx! {
                        ul {
                            for s in list.iter() {
                                li {
                                    key: "{s.id}",
                                    class: active_class(s.id == active_id, "selected"),
                                    Link { to: Route::Workbench { strategy: s.id.clone() }, "{s.name}" }
                                    StatusPill { status: s.status }
                                }
                            }
                        }
                    },
                }}
                Link { class: "button", to: Route::StrategyCreate {}, "New strategy" }
            }
            section {
                class: "workbench-main",
                {match &*selected.read() {
                    Some(Err(AppError::NotFound(_))) => rsx! {
                        p { "That strategy no longer exists." }
                    },
                    Some(Err(err)) => rsx! {
                        ErrorBanner { error: err.clone(), on_retry: move |_| selected.restart() }
                    },
                    Some(Ok(Some(s))) => rsx! { h2 { "{s.name}" } },
                    _ => rsx! { h2 { "Scratchpad" } },
                }}
                div {
                    class: "tabs",
                    button { class: active_class(current == Pane::Code, "active"), onclick: move |_| pane.set(Pane::Code), "Code" }
                    button {
                        class: active_class(current == Pane::Flow, "active"),
                        disabled: active_id.is_empty(),
                        onclick: move |_| pane.set(Pane::Flow),
                        "Visual builder"
                    }
                }
                {match current {
                    Pane::Flow if !active_id.is_empty() => rsx! { FlowBuilder { strategy_id } },
                    _ => rsx! { CodeEditor { editor } },
                }}
                BacktestPanel { strategy_id, editor }
            }
            aside {
                class: "assistant",
                ChatPane { editor, on_code }
            }
        }
    }
}
