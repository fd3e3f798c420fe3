use dioxus::{logger::tracing::info, prelude::*};
use tradedesk::utils::session::use_auth;
use crate::Route;

/// Layout for every signed-in page. Anonymous visitors are sent to login,
/// which also covers a session ended by a 401 anywhere below.
#[component]
pub fn Template() -> Element {
  let auth = use_auth();
  let nav = navigator();
  let signed_in = use_memo(move || auth.session.read().is_authenticated());

  use_effect(move || {
    if !signed_in() {
      info!("no session, redirecting to login");
      nav.replace(Route::Login {});
    }
  });

  if !signed_in() {
    return rsx! {};
  }

  rsx! {
    Header { }
    main {
      class: "content",
      Outlet::<Route> {}
    }
  }
}

#[component]
fn Header() -> Element {
  let mut auth = use_auth();

  rsx!{
    nav {
      div {
        class: "nav-container",
        Link {
          class: "logo",
          to: Route::Dashboard {},
          "TradeDesk",
        }
        div {
          class: "nav-links",
          Link { active_class: "nav-active", to: Route::Dashboard {}, "Dashboard" },
          Link { active_class: "nav-active", to: Route::Workbench { strategy: String::new() }, "Workbench" },
          Link { active_class: "nav-active", to: Route::Orders {}, "Orders" },
          Link { active_class: "nav-active", to: Route::Brokers {}, "Brokers" },
          Link { active_class: "nav-active", to: Route::Marketplace {}, "Marketplace" },
        }
        button {
          class: "logout-button",
          onclick: move |_| auth.logout(),
          "Log out"
        }
      }
    }
  }
}
