use dioxus::prelude::*;
use tradedesk::{
  stream::mirror::{ConnectionState, LinkStatus},
  utils::{models::StrategyStatus, server::AppError}
};
use crate::Route;

/// REST failure shown in place. Retry is offered for failures that might
/// succeed on a second attempt; broker errors link to the broker page.
#[component]
pub fn ErrorBanner(error: AppError, on_retry: Option<EventHandler<()>>) -> Element {
  let broker_missing = matches!(error, AppError::BrokerNotConfigured(_));
  let retry = on_retry.filter(|_| error.is_retryable());

  rsx! {
    div {
      class: "error-banner",
      role: "alert",
      span { "{error.user_message()}" }
      if broker_missing {
        Link { class: "error-action", to: Route::Brokers {}, "Configure broker" }
      }
      if let Some(handler) = retry {
        button {
          class: "error-action",
          onclick: move |_| handler.call(()),
          "Retry"
        }
      }
    }
  }
}

/// Live/reconnecting/disconnected indicator for an event stream.
#[component]
pub fn ConnectionBadge(link: LinkStatus) -> Element {
  let (class, text) = match link.state() {
    ConnectionState::Open => ("badge live", "Live".to_string()),
    ConnectionState::Connecting if link.reconnect_attempts() > 0 => ("badge reconnecting", format!("Reconnecting ({})", link.reconnect_attempts())),
    ConnectionState::Connecting => ("badge connecting", "Connecting".to_string()),
    ConnectionState::Closed => ("badge offline", "Disconnected".to_string()),
  };

  rsx! {
    span {
      class: class,
      title: link.last_error().unwrap_or_default(),
      "{text}"
    }
  }
}

#[component]
pub fn StatusPill(status: StrategyStatus) -> Element {
  rsx! {
    span { class: "status-pill status-{status}", "{status}" }
  }
}
