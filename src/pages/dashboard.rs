use dioxus::{logger::tracing::info, prelude::*};
use tradedesk::{
    stream::{
        endpoint::StreamKind,
        hooks::{use_event_stream, StrategyStatusStream, StreamTarget},
        mirror::StreamState,
        resource::ScopeFilter,
    },
    utils::{
        api::ApiClient,
        models::{Strategy, StrategyAction, StrategySummary},
        server::AppError,
        session::use_auth,
    },
};
use crate::{components::status::{ConnectionBadge, ErrorBanner, StatusPill}, Route};

#[component]
pub fn Dashboard() -> Element {
    let mut auth = use_auth();
    let api = use_context::<ApiClient>();
    let mut action_error: Signal<Option<AppError>> = use_signal(|| None);

    let list_api = api.clone();
    let mut strategies = use_resource(move || {
        let api = list_api.clone();
        let session = auth.session.read().clone();
        async move { api.list_strategies(&session).await.map_err(|e| auth.intercept(e)) }
    });

    let status_target = use_memo(|| -> StreamTarget { Some((StreamKind::StrategyStatus, ScopeFilter::default())) });
    let live = use_event_stream::<StrategyStatusStream>(status_target);

    let run_action = move |id: String, action: StrategyAction| {
        let api = api.clone();
        let session = auth.session.peek().clone();
        action_error.set(None);
        spawn(async move {
            match api.strategy_action(&session, &id, action).await {
                Ok(_) => {
                    info!("{} accepted for {}", action.label(), id);
                    // the status stream delivers the new state; refresh in case it is down
                    if !live.peek().connected() {
                        strategies.restart();
                    }
                },
                Err(e) => action_error.set(Some(auth.intercept(e)))
            }
        });
    };

    let remove_api = use_context::<ApiClient>();
    let remove = move |id: String| {
        let api = remove_api.clone();
        let session = auth.session.peek().clone();
        spawn(async move {
            match api.delete_strategy(&session, &id).await {
                Ok(()) => strategies.restart(),
                Err(e) => action_error.set(Some(auth.intercept(e)))
            }
        });
    };

    rsx! {
        div {
            class: "page dashboard",
            div {
                class: "page-header",
                h1 { "Strategies" }
                ConnectionBadge { link: live.read().link().clone() }
                Link { class: "button", to: Route::StrategyCreate {}, "New strategy" }
            }
            if let Some(err) = action_error() {
                ErrorBanner { error: err, on_retry: None }
            }
            {match &*strategies.read() {
                None => rsx! { p { "Loading strategies…" } },
                Some(Err(err)) => rsx! {
                    ErrorBanner { error: err.clone(), on_retry: move |_| strategies.restart() }
                },
                Some(Ok(list)) if list.is_empty() => rsx! {
                    p { "No strategies yet. Create one or ask the assistant in the workbench." }
                },
                Some(Ok(list)) => rsx! {
                    table {
                        class: "strategy-table",
                        thead {
                            tr { th { "Name" } th { "Status" } th { "Trades" } th { "Win rate" } th { "P&L" } th {} }
                        }
                        tbody {
                            for strategy in list.iter() {
                                StrategyRow {
                                    key: "{strategy.id}",
                                    summary: merged(strategy, live.read().get(&strategy.id)),
                                    name: strategy.name.clone(),
                                    on_action: {
                                        let mut run_action = run_action.clone();
                                        move |(id, action): (String, StrategyAction)| run_action(id, action)
                                    },
                                    on_delete: {
                                        let mut remove = remove.clone();
                                        move |id: String| remove(id)
                                    },
                                }
                            }
                        }
                    }
                }
            }}
        }
    }
}

/// REST row with whatever the status stream has pushed since.
fn merged(strategy: &Strategy, live: Option<&StrategySummary>) -> StrategySummary {
    match live {
        Some(update) => StrategySummary { name: Some(strategy.name.clone()), ..update.clone() },
        None => StrategySummary::from(strategy),
    }
}

#[component]
fn StrategyRow(
    summary: StrategySummary,
    name: String,
    on_action: EventHandler<(String, StrategyAction)>,
    on_delete: EventHandler<String>,
) -> Element {
    let id = summary.strategy_id.clone();

    rsx! {
        tr {
            td {
                Link { to: Route::Workbench { strategy: id.clone() }, "{name}" }
            }
            td { StatusPill { status: summary.status } }
            td { "{summary.total_trades}" }
            td { {format!("{:.1}%", summary.win_rate)} }
            td { "{summary.total_pnl}" }
            td {
                class: "row-actions",
                for action in summary.status.available_actions().iter().copied() {
                    button {
                        key: "{action.path_segment()}",
                        onclick: {
                            let id = id.clone();
                            move |_| on_action.call((id.clone(), action))
                        },
                        "{action.label()}"
                    }
                }
                Link { to: Route::StrategyEdit { id: id.clone() }, "Edit" }
                button {
                    class: "danger",
                    onclick: {
                        let id = id.clone();
                        move |_| on_delete.call(id.clone())
                    },
                    "Delete"
                }
            }
        }
    }
}
