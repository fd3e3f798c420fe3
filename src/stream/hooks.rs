use std::{cell::RefCell, rc::Rc};
use dioxus::{logger::tracing::{error, info}, prelude::*};
use tokio::sync::mpsc;

use crate::utils::{
  config::AppConfig,
  models::{BacktestHistoryItem, BacktestJob, Order, StrategySummary},
  session::{use_auth, TeardownRegistry}
};
use super::{
  chunked::ChunkedMirror,
  endpoint::{StreamKind, SubscriptionSpec},
  mirror::{CollectionMirror, StreamState},
  progress::ProgressMirror,
  resource::ScopeFilter,
  transport::EventSourceTransport
};

pub type OrdersStream = CollectionMirror<Order>;
pub type StrategyStatusStream = CollectionMirror<StrategySummary>;
pub type BacktestJobsStream = CollectionMirror<BacktestJob>;
pub type BacktestHistoryStream = CollectionMirror<BacktestHistoryItem>;
pub type BacktestProgressStream = ProgressMirror;
pub type HistoricalDataStream = ChunkedMirror;

/// `None` means "do not connect".
pub type StreamTarget = Option<(StreamKind, ScopeFilter)>;

struct ActiveStream {
  spec: SubscriptionSpec,
  transport: EventSourceTransport,
  pump: Task,
  teardown: TeardownRegistry,
  teardown_id: u64
}

impl ActiveStream {
  fn close(self) {
    self.teardown.unregister(self.teardown_id);
    self.transport.close();
    self.pump.cancel();
  }
}

/// Keeps `S` in sync with one server event stream for as long as the calling
/// component is mounted.
///
/// Reconnects whenever the session token or `target` changes, closing the
/// previous EventSource first. The stream also registers with the session's
/// teardown registry so logout closes it even before this component reacts.
pub fn use_event_stream<S: StreamState>(target: Memo<StreamTarget>) -> Signal<S> {
  let auth = use_auth();
  let config = use_context::<AppConfig>();
  let mut state = use_signal(|| S::for_scope(ScopeFilter::default()));
  let active: Rc<RefCell<Option<ActiveStream>>> = use_hook(|| Rc::new(RefCell::new(None)));

  let effect_active = active.clone();
  use_effect(move || {
    let session = auth.session.read().clone();
    let target = target.read().clone();
    let spec = target.and_then(|(kind, scope)| SubscriptionSpec::new(kind, &session, scope));

    let unchanged = effect_active.borrow().as_ref()
      .is_some_and(|a| Some(&a.spec) == spec.as_ref() && !a.transport.is_closed());
    if unchanged {
      return;
    }

    let previous = effect_active.borrow_mut().take();
    let previous_spec = previous.as_ref().map(|a| a.spec.clone());
    if let Some(old) = previous {
      old.close();
    }

    let Some(spec) = spec else {
      state.write().link_mut().on_closed();
      return;
    };

    // a different subscription must not show the old one's records
    let same_stream = previous_spec.is_some_and(|p| p.kind == spec.kind && p.scope == spec.scope);
    if !same_stream {
      state.set(S::for_scope(spec.scope.clone()));
    }

    match open(spec, &config, state, auth.teardown()) {
      Ok(stream) => *effect_active.borrow_mut() = Some(stream),
      Err(e) => {
        error!("could not open stream: {}", e);
        let mut s = state.write();
        s.link_mut().on_error_event(e.user_message());
        s.link_mut().on_closed();
      }
    }
  });

  use_drop(move || {
    if let Some(stream) = active.borrow_mut().take() {
      stream.close();
    }
  });

  state
}

fn open<S: StreamState>(
  spec: SubscriptionSpec,
  config: &AppConfig,
  mut state: Signal<S>,
  teardown: TeardownRegistry
) -> Result<ActiveStream, crate::utils::server::AppError> {
  let url = spec.url(&config.api_base_url)?;
  let (tx, mut rx) = mpsc::unbounded_channel();
  let event_names = state.peek().event_names();
  let transport = EventSourceTransport::open(&url, &event_names, tx)?;

  let pump_transport = transport.clone();
  let pump = spawn(async move {
    while let Some(frame) = rx.recv().await {
      let terminal = {
        let mut s = state.write();
        s.apply_frame(frame);
        s.is_terminal()
      };
      if terminal {
        info!("stream reached its final event, closing");
        pump_transport.close();
        break;
      }
    }
  });

  let hook_transport = transport.clone();
  let teardown_id = teardown.register(move || {
    hook_transport.close();
    pump.cancel();
    state.write().link_mut().on_closed();
  });

  Ok(ActiveStream { spec, transport, pump, teardown, teardown_id })
}
