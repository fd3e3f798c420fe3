use dioxus::{logger::tracing::info, prelude::*};
use tradedesk::utils::{
    api::ApiClient,
    models::{Strategy, StrategyRequest, StrategyUpdate},
    server::AppError,
    session::use_auth,
};
use crate::{components::status::ErrorBanner, Route};

const TIMEFRAMES: [&str; 5] = ["1m", "5m", "15m", "1h", "1d"];

#[derive(Debug, Clone, Default, PartialEq)]
struct FormValues {
    name: String,
    description: String,
    symbol: String,
    timeframe: String,
}

impl FormValues {
    fn from_strategy(s: &Strategy) -> Self {
        Self {
            name: s.name.clone(),
            description: s.description.clone().unwrap_or_default(),
            symbol: s.symbol.clone().unwrap_or_default(),
            timeframe: s.timeframe.clone().unwrap_or_else(|| "5m".to_string()),
        }
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::ValidationError("Name is required".to_string()));
        }
        Ok(())
    }
}

fn non_empty(s: &str) -> Option<String> {
    Some(s.trim().to_string()).filter(|s| !s.is_empty())
}

#[component]
pub fn StrategyCreate() -> Element {
    let mut auth = use_auth();
    let api = use_context::<ApiClient>();
    let nav = navigator();
    let mut error: Signal<Option<AppError>> = use_signal(|| None);
    let mut busy = use_signal(|| false);

    let submit = move |values: FormValues| {
        if let Err(e) = values.validate() {
            error.set(Some(e));
            return;
        }
        let api = api.clone();
        let session = auth.session.peek().clone();
        let req = StrategyRequest {
            name: values.name.trim().to_string(),
            description: non_empty(&values.description),
            symbol: non_empty(&values.symbol),
            timeframe: non_empty(&values.timeframe),
            code: None,
        };
        busy.set(true);
        spawn(async move {
            match api.create_strategy(&session, &req).await {
                Ok(created) => {
                    info!("created strategy {}", created.id);
                    nav.push(Route::Workbench { strategy: created.id });
                },
                Err(e) => error.set(Some(auth.intercept(e))),
            }
            busy.set(false);
        });
    };

    rsx! {
        div {
            class: "page strategy-form",
            h1 { "New strategy" }
            StrategyFields { initial: FormValues { timeframe: "5m".to_string(), ..Default::default() }, busy: busy(), on_submit: submit }
            if let Some(err) = error() {
                ErrorBanner { error: err, on_retry: None }
            }
        }
    }
}

#[component]
pub fn StrategyEdit(id: String) -> Element {
    let mut auth = use_auth();
    let api = use_context::<ApiClient>();
    let nav = navigator();
    let mut error: Signal<Option<AppError>> = use_signal(|| None);
    let mut busy = use_signal(|| false);

    let load_api = api.clone();
    let load_id = id.clone();
    let mut strategy = use_resource(move || {
        let (api, id) = (load_api.clone(), load_id.clone());
        let session = auth.session.read().clone();
        async move { api.get_strategy(&session, &id).await.map_err(|e| auth.intercept(e)) }
    });

    let submit = move |values: FormValues| {
        if let Err(e) = values.validate() {
            error.set(Some(e));
            return;
        }
        let (api, id) = (api.clone(), id.clone());
        let session = auth.session.peek().clone();
        let update = StrategyUpdate {
            name: Some(values.name.trim().to_string()),
            description: Some(values.description.trim().to_string()),
            symbol: non_empty(&values.symbol),
            timeframe: non_empty(&values.timeframe),
            code: None,
        };
        busy.set(true);
        spawn(async move {
            match api.update_strategy(&session, &id, &update).await {
                Ok(_) => {
                    nav.push(Route::Dashboard {});
                },
                Err(e) => error.set(Some(auth.intercept(e))),
            }
            busy.set(false);
        });
    };

    rsx! {
        div {
            class: "page strategy-form",
            h1 { "Edit strategy" }
            {match &*strategy.read() {
                None => rsx! { p { "Loading…" } },
                Some(Err(err)) => rsx! { ErrorBanner { error: err.clone(), on_retry: move |_| strategy.restart() } },
                Some(Ok(s)) => rsx! {
                    StrategyFields { initial: FormValues::from_strategy(s), busy: busy(), on_submit: submit }
                },
            }}
            if let Some(err) = error() {
                ErrorBanner { error: err, on_retry: None }
            }
        }
    }
}

#[component]
fn StrategyFields(initial: FormValues, busy: bool, on_submit: EventHandler<FormValues>) -> Element {
    let mut values = use_signal(|| initial.clone());

    rsx! {
        form {
            onsubmit: move |evt: FormEvent| {
                evt.prevent_default();
                on_submit.call(values.peek().clone());
            },
            label { "Name" }
            input { required: true, value: "{values.read().name}", oninput: move |e| values.write().name = e.value() }
            label { "Description" }
            textarea { value: "{values.read().description}", oninput: move |e| values.write().description = e.value() }
            label { "Symbol" }
            input { placeholder: "e.g. RELIANCE", value: "{values.read().symbol}", oninput: move |e| values.write().symbol = e.value() }
            label { "Timeframe" }
            select {
                value: "{values.read().timeframe}",
                onchange: move |e| values.write().timeframe = e.value(),
                for tf in TIMEFRAMES {
                    option { key: "{tf}", value: tf, "{tf}" }
                }
            }
            button { r#type: "submit", disabled: busy, if busy { "Saving…" } else { "Save" } }
        }
    }
}
