use dioxus::{logger::tracing::{info, warn}, prelude::*};
use tradedesk::utils::{
    api::ApiClient,
    models::{BrokerCredential, BrokerCredentialRequest},
    server::AppError,
    session::use_auth,
};
use crate::components::status::ErrorBanner;

const BROKERS: [&str; 2] = ["zerodha", "upstox"];

/// Masks everything but the last four characters of a key.
fn masked(key: &str) -> String {
    let tail: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    format!("••••{}", tail)
}

#[component]
pub fn Brokers() -> Element {
    let mut auth = use_auth();
    let api = use_context::<ApiClient>();
    let mut error: Signal<Option<AppError>> = use_signal(|| None);

    let list_api = api.clone();
    let mut credentials = use_resource(move || {
        let api = list_api.clone();
        let session = auth.session.read().clone();
        async move { api.list_broker_credentials(&session).await.map_err(|e| auth.intercept(e)) }
    });

    let status_api = api.clone();
    let mut oauth = use_resource(move || {
        let api = status_api.clone();
        let session = auth.session.read().clone();
        async move { api.zerodha_oauth_status(&session).await.map_err(|e| auth.intercept(e)) }
    });

    let connect_api = api.clone();
    let connect = move |_| {
        let api = connect_api.clone();
        let session = auth.session.peek().clone();
        spawn(async move {
            match api.zerodha_oauth_initiate(&session).await {
                Ok(resp) => {
                    info!("redirecting to broker login");
                    let opened = web_sys::window().map(|w| w.location().set_href(&resp.login_url));
                    if !matches!(opened, Some(Ok(()))) {
                        warn!("could not navigate to broker login");
                        error.set(Some(AppError::WasmError("Could not open the broker login page".to_string())));
                    }
                },
                Err(e) => error.set(Some(auth.intercept(e))),
            }
        });
    };

    let toggle_api = api.clone();
    let toggle = move |cred: BrokerCredential| {
        let api = toggle_api.clone();
        let session = auth.session.peek().clone();
        // an empty secret leaves the stored one unchanged
        let req = BrokerCredentialRequest {
            broker: cred.broker.clone(),
            api_key: cred.api_key.clone(),
            api_secret: String::new(),
            is_active: Some(!cred.is_active),
        };
        spawn(async move {
            match api.update_broker_credential(&session, &cred.id, &req).await {
                Ok(_) => credentials.restart(),
                Err(e) => error.set(Some(auth.intercept(e))),
            }
        });
    };

    let remove = move |id: String| {
        let api = api.clone();
        let session = auth.session.peek().clone();
        spawn(async move {
            match api.delete_broker_credential(&session, &id).await {
                Ok(()) => credentials.restart(),
                Err(e) => error.set(Some(auth.intercept(e))),
            }
        });
    };

    rsx! {
        div {
            class: "page brokers",
            h1 { "Broker connections" }
            section {
                class: "oauth",
                h2 { "Zerodha" }
                {match &*oauth.read() {
                    None => rsx! { p { "Checking session…" } },
                    Some(Ok(status)) if status.connected => rsx! {
                        p {
                            "Connected"
                            if let Some(user) = &status.user_id { " as {user}" }
                            if let Some(exp) = &status.expires_at { " until {exp}" }
                        }
                    },
                    Some(Ok(_)) => rsx! {
                        p { "Not connected. Trading sessions expire daily." }
                        button { onclick: connect, "Connect Zerodha" }
                    },
                    Some(Err(err)) => rsx! { ErrorBanner { error: err.clone(), on_retry: move |_| oauth.restart() } },
                }}
            }
            section {
                h2 { "API credentials" }
                CredentialForm { on_saved: move |_| credentials.restart() }
                if let Some(err) = error() {
                    ErrorBanner { error: err, on_retry: None }
                }
                {match &*credentials.read() {
                    None => rsx! { p { "Loading…" } },
                    Some(Err(err)) => rsx! { ErrorBanner { error: err.clone(), on_retry: move |_| credentials.restart() } },
                    Some(Ok(list)) if list.is_empty() => rsx! { p { "No credentials stored." } },
                    Some(Ok(list)) => rsx! {
                        table {
                            thead { tr { th { "Broker" } th { "API key" } th { "Active" } th {} } }
                            tbody {
                                for cred in list.iter() {
                                    tr {
                                        key: "{cred.id}",
                                        td { "{cred.broker}" }
                                        td { "{masked(&cred.api_key)}" }
                                        td {
                                            input {
                                                r#type: "checkbox",
                                                checked: cred.is_active,
                                                onchange: {
                                                    let cred = cred.clone();
                                                    let mut toggle = toggle.clone();
                                                    move |_| toggle(cred.clone())
                                                },
                                            }
                                        }
                                        td {
                                            button {
                                                class: "danger",
                                                onclick: {
                                                    let id = cred.id.clone();
                                                    let mut remove = remove.clone();
                                                    move |_| remove(id.clone())
                                                },
                                                "Remove"
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    },
                }}
            }
        }
    }
}

#[component]
fn CredentialForm(on_saved: EventHandler<()>) -> Element {
    let mut auth = use_auth();
    let api = use_context::<ApiClient>();
    let mut broker = use_signal(|| BROKERS[0].to_string());
    let mut api_key = use_signal(String::new);
    let mut api_secret = use_signal(String::new);
    let mut error: Signal<Option<AppError>> = use_signal(|| None);

    let submit = move |evt: FormEvent| {
        evt.prevent_default();
        if api_key.peek().trim().is_empty() || api_secret.peek().trim().is_empty() {
            error.set(Some(AppError::ValidationError("API key and secret are required".to_string())));
            return;
        }
        let api = api.clone();
        let session = auth.session.peek().clone();
        let req = BrokerCredentialRequest {
            broker: broker.peek().clone(),
            api_key: api_key.peek().trim().to_string(),
            api_secret: api_secret.peek().trim().to_string(),
            is_active: Some(true),
        };
        error.set(None);
        spawn(async move {
            match api.add_broker_credential(&session, &req).await {
                Ok(cred) => {
                    info!("stored {} credentials", cred.broker);
                    api_key.set(String::new());
                    api_secret.set(String::new());
                    on_saved.call(());
                },
                Err(e) => error.set(Some(auth.intercept(e))),
            }
        });
    };

    rsx! {
        form {
            class: "credential-form",
            onsubmit: submit,
            select {
                value: "{broker}",
                onchange: move |e| broker.set(e.value()),
                for b in BROKERS {
                    option { key: "{b}", value: b, "{b}" }
                }
            }
            input { placeholder: "API key", value: "{api_key}", oninput: move |e| api_key.set(e.value()) }
            input { r#type: "password", placeholder: "API secret", value: "{api_secret}", oninput: move |e| api_secret.set(e.value()) }
            button { r#type: "submit", "Add" }
            if let Some(err) = error() {
                ErrorBanner { error: err, on_retry: None }
            }
        }
    }
}
