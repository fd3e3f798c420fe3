use dioxus::{logger::tracing::{error, info}, prelude::*};
use tradedesk::utils::{api::ApiClient, firebase::FirebaseAuth, server::AppError, session::use_auth};
use crate::{components::status::ErrorBanner, Route};

#[component]
pub fn Login() -> Element {
    let mut auth = use_auth();
    let api = use_context::<ApiClient>();
    let firebase = use_context::<FirebaseAuth>();
    let nav = navigator();
    let mut email = use_signal(String::new);
    let mut password = use_signal(String::new);
    let mut busy = use_signal(|| false);
    let mut error: Signal<Option<AppError>> = use_signal(|| None);

    use_effect(move || {
        if auth.session.read().is_authenticated() {
            nav.replace(Route::Dashboard {});
        }
    });

    let submit = move |evt: FormEvent| {
        evt.prevent_default();
        let (api, firebase) = (api.clone(), firebase.clone());
        let (email, password) = (email.peek().trim().to_string(), password.peek().clone());
        busy.set(true);
        error.set(None);
        spawn(async move {
            let result = async {
                let user = firebase.sign_in(&email, &password).await?;
                let session = auth.session.peek().clone();
                let resp = api.login(&session, &user.id_token).await?;
                auth.login(&resp.access_token)
            }.await;
            match result {
                Ok(()) => {
                    info!("signed in as {}", email);
                    nav.replace(Route::Dashboard {});
                },
                Err(e) => {
                    error!("sign in failed: {}", e);
                    error.set(Some(e));
                }
            }
            busy.set(false);
        });
    };

    rsx! {
        div {
            class: "auth-page",
            h1 { "Sign in" }
            form {
                onsubmit: submit,
                label { "Email" }
                input { r#type: "email", required: true, value: "{email}", oninput: move |e| email.set(e.value()) }
                label { "Password" }
                input { r#type: "password", required: true, value: "{password}", oninput: move |e| password.set(e.value()) }
                button { r#type: "submit", disabled: busy(), if busy() { "Signing in…" } else { "Sign in" } }
            }
            if let Some(err) = error() {
                ErrorBanner { error: err, on_retry: None }
            }
            div {
                class: "auth-links",
                Link { to: Route::ForgotPassword {}, "Forgot password?" }
                Link { to: Route::Register {}, "Create an account" }
            }
        }
    }
}

#[component]
pub fn Register() -> Element {
    let mut auth = use_auth();
    let api = use_context::<ApiClient>();
    let firebase = use_context::<FirebaseAuth>();
    let nav = navigator();
    let mut full_name = use_signal(String::new);
    let mut email = use_signal(String::new);
    let mut password = use_signal(String::new);
    let mut confirm = use_signal(String::new);
    let mut busy = use_signal(|| false);
    let mut error: Signal<Option<AppError>> = use_signal(|| None);

    let submit = move |evt: FormEvent| {
        evt.prevent_default();
        if *password.peek() != *confirm.peek() {
            error.set(Some(AppError::ValidationError("Passwords do not match".to_string())));
            return;
        }
        if password.peek().len() < 6 {
            error.set(Some(AppError::ValidationError("Password must be at least 6 characters".to_string())));
            return;
        }
        let (api, firebase) = (api.clone(), firebase.clone());
        let email = email.peek().trim().to_string();
        let password = password.peek().clone();
        let name = Some(full_name.peek().trim().to_string()).filter(|n| !n.is_empty());
        busy.set(true);
        error.set(None);
        spawn(async move {
            let result = async {
                let user = firebase.sign_up(&email, &password).await?;
                let session = auth.session.peek().clone();
                let resp = api.register(&session, &user.id_token, &email, name).await?;
                auth.login(&resp.access_token)
            }.await;
            match result {
                Ok(()) => {
                    info!("registered {}", email);
                    nav.replace(Route::Dashboard {});
                },
                Err(e) => error.set(Some(e))
            }
            busy.set(false);
        });
    };

    rsx! {
        div {
            class: "auth-page",
            h1 { "Create an account" }
            form {
                onsubmit: submit,
                label { "Full name" }
                input { value: "{full_name}", oninput: move |e| full_name.set(e.value()) }
                label { "Email" }
                input { r#type: "email", required: true, value: "{email}", oninput: move |e| email.set(e.value()) }
                label { "Password" }
                input { r#type: "password", required: true, value: "{password}", oninput: move |e| password.set(e.value()) }
                label { "Confirm password" }
                input { r#type: "password", required: true, value: "{confirm}", oninput: move |e| confirm.set(e.value()) }
                button { r#type: "submit", disabled: busy(), "Register" }
            }
            if let Some(err) = error() {
                ErrorBanner { error: err, on_retry: None }
            }
            div {
                class: "auth-links",
                Link { to: Route::Login {}, "Already have an account? Sign in" }
            }
        }
    }
}

#[component]
pub fn ForgotPassword() -> Element {
    let firebase = use_context::<FirebaseAuth>();
    let mut email = use_signal(String::new);
    let mut sent = use_signal(|| false);
    let mut error: Signal<Option<AppError>> = use_signal(|| None);

    let submit = move |evt: FormEvent| {
        evt.prevent_default();
        let firebase = firebase.clone();
        let address = email.peek().trim().to_string();
        error.set(None);
        spawn(async move {
            match firebase.send_password_reset(&address).await {
                Ok(()) => sent.set(true),
                Err(e) => error.set(Some(e))
            }
        });
    };

    rsx! {
        div {
            class: "auth-page",
            h1 { "Reset password" }
            if sent() {
                p { "Check your inbox for a link to reset your password." }
            } else {
                form {
                    onsubmit: submit,
                    label { "Email" }
                    input { r#type: "email", required: true, value: "{email}", oninput: move |e| email.set(e.value()) }
                    button { r#type: "submit", "Send reset link" }
                }
            }
            if let Some(err) = error() {
                ErrorBanner { error: err, on_retry: None }
            }
            Link { to: Route::Login {}, "Back to sign in" }
        }
    }
}
