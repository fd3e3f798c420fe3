use std::str::FromStr;

use dioxus::{logger::tracing::info, prelude::*};
use rust_decimal::Decimal;
use tradedesk::{
    stream::{
        endpoint::StreamKind,
        hooks::{use_event_stream, OrdersStream, StreamTarget},
        mirror::{ConnectionState, StreamState},
        resource::ScopeFilter,
    },
    utils::{
        api::ApiClient,
        models::{Order, OrderModifyRequest, OrderRequest, OrderSide, OrderType},
        server::AppError,
        session::use_auth,
    },
};
use crate::components::status::{ConnectionBadge, ErrorBanner};

const STATUS_FILTERS: [&str; 5] = ["", "OPEN", "PENDING", "COMPLETE", "CANCELLED"];

fn parse_price(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw.trim()).ok()
}

fn order_type_value(t: OrderType) -> &'static str {
    match t {
        OrderType::Market => "MARKET",
        OrderType::Limit => "LIMIT",
        OrderType::StopLoss => "SL",
        OrderType::StopLossMarket => "SL-M",
    }
}

fn order_type_from(value: &str) -> OrderType {
    match value {
        "LIMIT" => OrderType::Limit,
        "SL" => OrderType::StopLoss,
        "SL-M" => OrderType::StopLossMarket,
        _ => OrderType::Market,
    }
}

fn is_cancellable(order: &Order) -> bool {
    matches!(order.status.to_ascii_uppercase().as_str(), "OPEN" | "PENDING" | "TRIGGER PENDING")
}

#[component]
pub fn Orders() -> Element {
    let mut auth = use_auth();
    let api = use_context::<ApiClient>();
    let mut strategy_filter = use_signal(String::new);
    let mut status_filter = use_signal(String::new);
    let mut error: Signal<Option<AppError>> = use_signal(|| None);

    let target = use_memo(move || -> StreamTarget {
        let mut scope = ScopeFilter::default();
        let strategy = strategy_filter().trim().to_string();
        if !strategy.is_empty() {
            scope = ScopeFilter::strategy(strategy);
        }
        let status = status_filter();
        if !status.is_empty() {
            scope = scope.with_status(status);
        }
        Some((StreamKind::Orders, scope))
    });
    let orders = use_event_stream::<OrdersStream>(target);
    let mut detail: Signal<Option<String>> = use_signal(|| None);

    // the stream gave up before any snapshot; show the REST copy instead
    let stream_down = use_memo(move || {
        let view = orders.read();
        view.link().state() == ConnectionState::Closed && view.is_empty()
    });
    let fallback_api = api.clone();
    let fallback = use_resource(move || {
        let api = fallback_api.clone();
        let session = auth.session.read().clone();
        let down = stream_down();
        let strategy = strategy_filter().trim().to_string();
        async move {
            if !down {
                return Ok(vec![]);
            }
            info!("orders stream closed, loading orders over REST");
            let strategy = (!strategy.is_empty()).then_some(strategy);
            api.list_orders(&session, strategy.as_deref()).await.map_err(|e| auth.intercept(e))
        }
    });

    let cancel_api = api.clone();
    let cancel = move |id: String| {
        let api = cancel_api.clone();
        let session = auth.session.peek().clone();
        error.set(None);
        spawn(async move {
            match api.cancel_order(&session, &id).await {
                // the stream reports the new status
                Ok(()) => info!("cancel requested for {}", id),
                Err(e) => error.set(Some(auth.intercept(e))),
            }
        });
    };

    let reprice = move |id: String| {
        let entered = web_sys::window().and_then(|w| w.prompt_with_message("New limit price").ok().flatten());
        let Some(raw) = entered else { return; };
        let Some(price) = parse_price(&raw).filter(|p| *p > Decimal::ZERO) else {
            error.set(Some(AppError::ValidationError("Enter a positive price".to_string())));
            return;
        };
        let api = api.clone();
        let session = auth.session.peek().clone();
        let req = OrderModifyRequest { price: Some(price), ..Default::default() };
        error.set(None);
        spawn(async move {
            match api.modify_order(&session, &id, &req).await {
                Ok(order) => info!("order {} repriced to {}", order.id, price),
                Err(e) => error.set(Some(auth.intercept(e))),
            }
        });
    };

    let view = orders.read();
    let rows: Vec<Order> = match &*fallback.read() {
        Some(Ok(list)) if view.is_empty() => {
            let status = status_filter();
            list.iter().filter(|o| status.is_empty() || o.status.eq_ignore_ascii_case(&status)).cloned().collect()
        },
        _ => view.records().to_vec(),
    };

    rsx! {
        div {
            class: "page orders",
            div {
                class: "page-header",
                h1 { "Orders" }
                ConnectionBadge { link: view.link().clone() }
            }
            OrderTicket {}
            div {
                class: "filters",
                input {
                    placeholder: "Strategy id",
                    value: "{strategy_filter}",
                    onchange: move |e| strategy_filter.set(e.value()),
                }
                select {
                    value: "{status_filter}",
                    onchange: move |e| status_filter.set(e.value()),
                    for status in STATUS_FILTERS {
                        option { key: "{status}", value: status, if status.is_empty() { "All" } else { "{status}" } }
                    }
                }
            }
            if let Some(err) = error() {
                ErrorBanner { error: err, on_retry: None }
            }
            if let Some(Err(err)) = &*fallback.read() {
                ErrorBanner { error: err.clone(), on_retry: None }
            }
            if let Some(id) = detail() {
                OrderDetail { key: "{id}", id: id.clone(), on_close: move |_| detail.set(None) }
            }
            if rows.is_empty() {
                p { "No orders." }
            } else {
                table {
                    class: "order-table",
                    thead {
                        tr { th { "Time" } th { "Symbol" } th { "Side" } th { "Type" } th { "Qty" } th { "Price" } th { "Status" } th {} }
                    }
                    tbody {
                        for order in rows.iter() {
                            tr {
                                key: "{order.id}",
                                td { "{order.created_at.clone().unwrap_or_default()}" }
                                td { "{order.symbol}" }
                                td { {format!("{:?}", order.side)} }
                                td { "{order_type_value(order.order_type)}" }
                                td { "{order.filled_quantity}/{order.quantity}" }
                                td { {order.average_price.or(order.price).map(|p| p.to_string()).unwrap_or_else(|| "MKT".to_string())} }
                                td { "{order.status}" }
                                td {
                                    class: "row-actions",
                                    button {
                                        onclick: {
                                            let id = order.id.clone();
                                            move |_| detail.set(Some(id.clone()))
                                        },
                                        "Details"
                                    }
                                    if is_cancellable(order) && order.order_type == OrderType::Limit {
                                        button {
                                            onclick: {
                                                let id = order.id.clone();
                                                let mut reprice = reprice.clone();
                                                move |_| reprice(id.clone())
                                            },
                                            "Reprice"
                                        }
                                    }
                                    if is_cancellable(order) {
                                        button {
                                            class: "danger",
                                            onclick: {
                                                let id = order.id.clone();
                                                let mut cancel = cancel.clone();
                                                move |_| cancel(id.clone())
                                            },
                                            "Cancel"
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Full broker-side view of one order, fetched on demand.
#[component]
fn OrderDetail(id: String, on_close: EventHandler<()>) -> Element {
    let mut auth = use_auth();
    let api = use_context::<ApiClient>();
    let order_id = id.clone();
    let order = use_resource(move || {
        let api = api.clone();
        let session = auth.session.read().clone();
        let id = order_id.clone();
        async move { api.get_order(&session, &id).await.map_err(|e| auth.intercept(e)) }
    });

    rsx! {
        div {
            class: "order-detail",
            div {
                class: "page-header",
                h3 { "Order {id}" }
                button { onclick: move |_| on_close.call(()), "Close" }
            }
            {match &*order.read() {
                None => rsx! { p { "Loading…" } },
                Some(Err(err)) => rsx! { ErrorBanner { error: err.clone(), on_retry: None } },
                Some(Ok(o)) => rsx! {
                    dl {
                        dt { "Symbol" } dd { {format!("{} ({})", o.symbol, o.exchange.clone().unwrap_or_default())} }
                        dt { "Status" } dd { "{o.status}" }
                        dt { "Filled" } dd { "{o.filled_quantity}/{o.quantity}" }
                        dt { "Average price" } dd { {o.average_price.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string())} }
                        dt { "Broker id" } dd { {o.broker_order_id.clone().unwrap_or_else(|| "-".to_string())} }
                        dt { "Strategy" } dd { {o.strategy_id.clone().unwrap_or_else(|| "manual".to_string())} }
                        dt { "Updated" } dd { {o.updated_at.clone().or_else(|| o.created_at.clone()).unwrap_or_default()} }
                    }
                },
            }}
        }
    }
}

/// Manual order entry.
#[component]
fn OrderTicket() -> Element {
    let mut auth = use_auth();
    let api = use_context::<ApiClient>();
    let mut symbol = use_signal(String::new);
    let mut exchange = use_signal(|| "NSE".to_string());
    let mut side = use_signal(OrderSide::default);
    let mut order_type = use_signal(OrderType::default);
    let mut quantity = use_signal(|| 1u64);
    let mut price = use_signal(String::new);
    let mut trigger = use_signal(String::new);
    let mut busy = use_signal(|| false);
    let mut error: Signal<Option<AppError>> = use_signal(|| None);
    let mut placed: Signal<Option<String>> = use_signal(|| None);

    let submit = move |evt: FormEvent| {
        evt.prevent_default();
        let kind = *order_type.peek();
        let req = OrderRequest {
            symbol: symbol.peek().trim().to_uppercase(),
            exchange: exchange.peek().clone(),
            side: *side.peek(),
            order_type: kind,
            quantity: *quantity.peek(),
            product: "MIS".to_string(),
            price: kind.needs_price().then(|| parse_price(&price.peek())).flatten(),
            trigger_price: kind.needs_trigger().then(|| parse_price(&trigger.peek())).flatten(),
            strategy_id: None,
        };
        if let Err(msg) = req.validate() {
            error.set(Some(AppError::ValidationError(msg)));
            return;
        }
        let api = api.clone();
        let session = auth.session.peek().clone();
        busy.set(true);
        error.set(None);
        spawn(async move {
            match api.place_order(&session, &req).await {
                Ok(order) => {
                    info!("placed order {} for {}", order.id, order.symbol);
                    placed.set(Some(order.id));
                },
                Err(e) => error.set(Some(auth.intercept(e))),
            }
            busy.set(false);
        });
    };

    let kind = order_type();
    let (buy_class, sell_class) = match side() {
        OrderSide::Buy => ("buy active", "sell"),
        OrderSide::Sell => ("buy", "sell active"),
    };

    rsx! {
        form {
            class: "order-ticket",
            onsubmit: submit,
            input { placeholder: "Symbol", required: true, value: "{symbol}", oninput: move |e| symbol.set(e.value()) }
            select {
                value: "{exchange}",
                onchange: move |e| exchange.set(e.value()),
                option { value: "NSE", "NSE" }
                option { value: "BSE", "BSE" }
                option { value: "NFO", "NFO" }
            }
            div {
                class: "side-toggle",
                button {
                    r#type: "button",
                    class: buy_class,
                    onclick: move |_| side.set(OrderSide::Buy),
                    "Buy"
                }
                button {
                    r#type: "button",
                    class: sell_class,
                    onclick: move |_| side.set(OrderSide::Sell),
                    "Sell"
                }
            }
            select {
                value: order_type_value(kind),
                onchange: move |e| order_type.set(order_type_from(&e.value())),
                for t in [OrderType::Market, OrderType::Limit, OrderType::StopLoss, OrderType::StopLossMarket] {
                    option { key: "{order_type_value(t)}", value: order_type_value(t), "{order_type_value(t)}" }
                }
            }
            input {
                r#type: "number",
                min: "1",
                value: "{quantity}",
                oninput: move |e| if let Ok(q) = e.value().parse::<u64>() { quantity.set(q) }
            }
            if kind.needs_price() {
                input { placeholder: "Price", value: "{price}", oninput: move |e| price.set(e.value()) }
            }
            if kind.needs_trigger() {
                input { placeholder: "Trigger", value: "{trigger}", oninput: move |e| trigger.set(e.value()) }
            }
            button { r#type: "submit", disabled: busy(), "Place order" }
            if let Some(id) = placed() {
                span { class: "notice", "Order {id} sent" }
            }
            if let Some(err) = error() {
                ErrorBanner { error: err, on_retry: None }
            }
        }
    }
}
