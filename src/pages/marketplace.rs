use dioxus::{logger::tracing::info, prelude::*};
use tradedesk::utils::{
    api::ApiClient,
    models::{MarketplaceListing, PublishRequest},
    server::AppError,
    session::use_auth,
};
use crate::components::status::ErrorBanner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Browse,
    Mine,
}

fn tab_class(current: Tab, tab: Tab) -> &'static str {
    if current == tab { "active" } else { "" }
}

#[component]
pub fn Marketplace() -> Element {
    let mut auth = use_auth();
    let api = use_context::<ApiClient>();
    let mut tab = use_signal(|| Tab::Browse);
    let mut error: Signal<Option<AppError>> = use_signal(|| None);

    let browse_api = api.clone();
    let mut public = use_resource(move || {
        let api = browse_api.clone();
        let session = auth.session.read().clone();
        async move { api.list_marketplace(&session).await.map_err(|e| auth.intercept(e)) }
    });

    let mine_api = api.clone();
    let mut mine = use_resource(move || {
        let api = mine_api.clone();
        let session = auth.session.read().clone();
        async move { api.my_listings(&session).await.map_err(|e| auth.intercept(e)) }
    });

    let visibility_api = api.clone();
    let set_visibility = move |(id, is_public): (String, bool)| {
        let api = visibility_api.clone();
        let session = auth.session.peek().clone();
        spawn(async move {
            match api.set_listing_visibility(&session, &id, is_public).await {
                Ok(listing) => {
                    info!("listing {} is now {}", listing.id, if listing.is_public { "public" } else { "private" });
                    mine.restart();
                    public.restart();
                },
                Err(e) => error.set(Some(auth.intercept(e))),
            }
        });
    };

    let unpublish = move |id: String| {
        let api = api.clone();
        let session = auth.session.peek().clone();
        spawn(async move {
            match api.unpublish(&session, &id).await {
                Ok(()) => {
                    mine.restart();
                    public.restart();
                },
                Err(e) => error.set(Some(auth.intercept(e))),
            }
        });
    };

    let current = tab();

    rsx! {
        div {
            class: "page marketplace",
            h1 { "Marketplace" }
            div {
                class: "tabs",
                button { class: tab_class(current, Tab::Browse), onclick: move |_| tab.set(Tab::Browse), "Browse" }
                button { class: tab_class(current, Tab::Mine), onclick: move |_| tab.set(Tab::Mine), "My listings" }
            }
            if let Some(err) = error() {
                ErrorBanner { error: err, on_retry: None }
            }
            {match current {
                Tab::Browse => match &*public.read() {
                    None => rsx! { p { "Loading…" } },
                    Some(Err(err)) => rsx! { ErrorBanner { error: err.clone(), on_retry: move |_| public.restart() } },
                    Some(Ok(list)) if list.is_empty() => rsx! { p { "Nothing published yet." } },
                    Some(Ok(list)) => rsx! {
                        div {
                            class: "listing-grid",
                            for listing in list.iter() {
                                ListingCard { key: "{listing.id}", listing: listing.clone() }
                            }
                        }
                    },
                },
                Tab::Mine => rsx! {
                    PublishForm { on_published: move |_| { mine.restart(); public.restart(); } }
                    {match &*mine.read() {
                        None => rsx! { p { "Loading…" } },
                        Some(Err(err)) => rsx! { ErrorBanner { error: err.clone(), on_retry: move |_| mine.restart() } },
                        Some(Ok(list)) => rsx! {
                            table {
                                thead { tr { th { "Name" } th { "Subscribers" } th { "Public" } th {} } }
                                tbody {
                                    for listing in list.iter() {
                                        tr {
                                            key: "{listing.id}",
                                            td { "{listing.name}" }
                                            td { "{listing.subscribers}" }
                                            td {
                                                input {
                                                    r#type: "checkbox",
                                                    checked: listing.is_public,
                                                    onchange: {
                                                        let (id, next) = (listing.id.clone(), !listing.is_public);
                                                        let mut set_visibility = set_visibility.clone();
                                                        move |_| set_visibility((id.clone(), next))
                                                    },
                                                }
                                            }
                                            td {
                                                button {
                                                    class: "danger",
                                                    onclick: {
                                                        let id = listing.id.clone();
                                                        let mut unpublish = unpublish.clone();
                                                        move |_| unpublish(id.clone())
                                                    },
                                                    "Unpublish"
                                                }
                                            }
                                        }
                                    }
                                }
                            }
                        },
                    }}
                },
            }}
        }
    }
}

#[component]
fn ListingCard(listing: MarketplaceListing) -> Element {
    rsx! {
        div {
            class: "listing-card",
            h3 { "{listing.name}" }
            if let Some(author) = &listing.author {
                span { class: "author", "by {author}" }
            }
            if let Some(desc) = &listing.description {
                p { "{desc}" }
            }
            div {
                class: "listing-stats",
                span { {format!("Win rate {:.1}%", listing.win_rate)} }
                span { "P&L {listing.total_pnl}" }
                span { "{listing.subscribers} subscribers" }
            }
        }
    }
}

#[component]
fn PublishForm(on_published: EventHandler<()>) -> Element {
    let mut auth = use_auth();
    let api = use_context::<ApiClient>();
    let mut strategy_id = use_signal(String::new);
    let mut description = use_signal(String::new);
    let mut is_public = use_signal(|| true);
    let mut error: Signal<Option<AppError>> = use_signal(|| None);

    let list_api = api.clone();
    let strategies = use_resource(move || {
        let api = list_api.clone();
        let session = auth.session.read().clone();
        async move { api.list_strategies(&session).await.map_err(|e| auth.intercept(e)) }
    });

    let submit = move |evt: FormEvent| {
        evt.prevent_default();
        let id = strategy_id.peek().clone();
        if id.is_empty() {
            error.set(Some(AppError::ValidationError("Pick a strategy to publish".to_string())));
            return;
        }
        let api = api.clone();
        let session = auth.session.peek().clone();
        let req = PublishRequest {
            strategy_id: id,
            description: Some(description.peek().trim().to_string()).filter(|d| !d.is_empty()),
            is_public: *is_public.peek(),
        };
        error.set(None);
        spawn(async move {
            match api.publish_strategy(&session, &req).await {
                Ok(listing) => {
                    info!("published {} as {}", req.strategy_id, listing.id);
                    description.set(String::new());
                    on_published.call(());
                },
                Err(e) => error.set(Some(auth.intercept(e))),
            }
        });
    };

    rsx! {
        form {
            class: "publish-form",
            onsubmit: submit,
            select {
                value: "{strategy_id}",
                onchange: move |e| strategy_id.set(e.value()),
                option { value: "", "Choose a strategy" }
                if let Some(Ok(list)) = &*strategies.read() {
                    for s in list.iter() {
                        option { key: "{s.id}", value: "{s.id}", "{s.name}" }
                    }
                }
            }
            input { placeholder: "Description", value: "{description}", oninput: move |e| description.set(e.value()) }
            label {
                input { r#type: "checkbox", checked: is_public(), onchange: move |e| is_public.set(e.checked()) }
                "Public"
            }
            button { r#type: "submit", "Publish" }
            if let Some(err) = error() {
                ErrorBanner { error: err, on_retry: None }
            }
        }
    }
}
