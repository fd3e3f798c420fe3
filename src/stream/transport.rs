use std::{cell::RefCell, rc::Rc};
use dioxus::logger::tracing::{info, warn};
use tokio::sync::mpsc::UnboundedSender;
use web_sys::{
  wasm_bindgen::{closure::Closure, JsCast},
  Event, EventSource, MessageEvent
};

use crate::utils::server::AppError;
use super::event::Frame;

type Listener = Closure<dyn FnMut(Event)>;

/// Browser EventSource forwarding everything it sees as [`Frame`]s.
///
/// Reconnection is left to the browser. A server-sent `error` event and the
/// native transport error share one name; the former arrives as a
/// `MessageEvent` with string data, the latter as a plain `Event`.
#[derive(Clone)]
pub struct EventSourceTransport {
  inner: Rc<RefCell<Option<Inner>>>
}

struct Inner {
  url: String,
  source: EventSource,
  listeners: Vec<(String, Listener)>
}

impl Drop for Inner {
  fn drop(&mut self) {
    for (name, listener) in &self.listeners {
      let _ = self.source.remove_event_listener_with_callback(name, listener.as_ref().unchecked_ref());
    }
    self.source.close();
    info!("closed stream {}", redact(&self.url));
  }
}

impl EventSourceTransport {
  pub fn open(url: &str, event_names: &[String], tx: UnboundedSender<Frame>) -> Result<Self, AppError> {
    let source = EventSource::new(url)
      .map_err(|e| AppError::StreamTransportError(format!("{:?}", e)))?;
    let mut listeners: Vec<(String, Listener)> = vec![];

    let open_tx = tx.clone();
    listeners.push(("open".to_string(), Closure::wrap(Box::new(move |_: Event| {
      let _ = open_tx.send(Frame::Open);
    }) as Box<dyn FnMut(Event)>)));

    let error_tx = tx.clone();
    let error_source = source.clone();
    listeners.push(("error".to_string(), Closure::wrap(Box::new(move |e: Event| {
      let frame = match e.dyn_ref::<MessageEvent>().and_then(|m| m.data().as_string()) {
        Some(data) => Frame::Message { event: "error".to_string(), data },
        None => {
          let closed = error_source.ready_state() == EventSource::CLOSED;
          warn!("stream transport error (closed: {})", closed);
          Frame::TransportError { closed }
        }
      };
      let _ = error_tx.send(frame);
    }) as Box<dyn FnMut(Event)>)));

    for name in event_names.iter().filter(|n| n.as_str() != "error") {
      let event_tx = tx.clone();
      let event = name.clone();
      listeners.push((name.clone(), Closure::wrap(Box::new(move |e: Event| {
        let Some(data) = e.dyn_ref::<MessageEvent>().and_then(|m| m.data().as_string()) else {
          warn!("`{}` event without text data", event);
          return;
        };
        let _ = event_tx.send(Frame::Message { event: event.clone(), data });
      }) as Box<dyn FnMut(Event)>)));
    }

    // owned before registering, so a failure below still closes the source
    let inner = Inner { url: url.to_string(), source, listeners };
    for (name, listener) in &inner.listeners {
      inner.source.add_event_listener_with_callback(name, listener.as_ref().unchecked_ref())
        .map_err(|e| AppError::WasmError(format!("listener {}: {:?}", name, e)))?;
    }

    info!("opened stream {}", redact(url));
    Ok(Self { inner: Rc::new(RefCell::new(Some(inner))) })
  }

  /// Idempotent. After this no further frames are produced.
  pub fn close(&self) {
    // take first, the drop runs after the borrow is released
    let inner = self.inner.borrow_mut().take();
    drop(inner);
  }

  pub fn is_closed(&self) -> bool {
    self.inner.borrow().is_none()
  }
}

// keep tokens out of the console
fn redact(url: &str) -> &str {
  url.split('?').next().unwrap_or(url)
}
