#![allow(non_snake_case)]
mod pages;
mod components;

use components::template::Template;
use dioxus::{logger::tracing::{info, Level}, prelude::*};
use pages::{
    auth::{ForgotPassword, Login, Register},
    brokers::Brokers,
    dashboard::Dashboard,
    marketplace::Marketplace,
    orders::Orders,
    strategy_form::{StrategyCreate, StrategyEdit},
    workbench::Workbench,
};
use tradedesk::utils::{api::ApiClient, config::AppConfig, firebase::FirebaseAuth, session::Auth};

#[derive(Routable, PartialEq, Clone)]
pub enum Route {
    #[route("/login")]
    Login {},
    #[route("/register")]
    Register {},
    #[route("/forgot-password")]
    ForgotPassword {},
    #[layout(Template)]
        #[route("/")]
        Dashboard {},
        #[route("/strategies/new")]
        StrategyCreate {},
        #[route("/strategies/:id/edit")]
        StrategyEdit { id: String },
        #[route("/orders")]
        Orders {},
        #[route("/brokers")]
        Brokers {},
        #[route("/marketplace")]
        Marketplace {},
        #[route("/workbench?:strategy")]
        Workbench { strategy: String },
    #[end_layout]
    #[route("/:..route")]
    PageNotFound { route: Vec<String> }
}

fn main() {
    dioxus::logger::init(Level::INFO).expect("failed to init logger");
    dioxus::launch(App);
}

fn App() -> Element {
    static CSS: Asset = asset!("/assets/main.css");

    let config = use_context_provider(AppConfig::from_build_env);
    use_context_provider(|| {
        info!("backend at {}", config.api_base_url);
        ApiClient::new(reqwest::Client::new(), &config.api_base_url)
    });
    use_context_provider(|| FirebaseAuth::new(reqwest::Client::new(), config.firebase.clone()));
    Auth::provide();

    rsx! {
        document::Stylesheet { href: CSS }
        Router::<Route> {}
    }
}

#[component]
fn PageNotFound(route: Vec<String>) -> Element {
    rsx! {
        div {
            class: "page not-found",
            h1 { "Page not found" }
            p { "The page you requested doesn't exist." }
            pre { "attempted to navigate to: {route:?}" }
            Link { to: Route::Dashboard {}, "Back to the dashboard" }
        }
    }
}
