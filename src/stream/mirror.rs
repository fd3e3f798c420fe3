use std::collections::HashSet;
use dioxus::logger::tracing::{info, warn};

use super::{
  event::{collection_event_names, decode, Frame, StreamEvent},
  resource::{ScopeFilter, StreamResource}
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
  #[default]
  Connecting,
  Open,
  Closed
}

/// Connection bookkeeping shared by every mirror kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkStatus {
  state: ConnectionState,
  last_error: Option<String>,
  reconnect_attempts: u32
}

impl LinkStatus {
  pub fn state(&self) -> ConnectionState {
    self.state
  }

  pub fn connected(&self) -> bool {
    self.state == ConnectionState::Open
  }

  pub fn last_error(&self) -> Option<&str> {
    self.last_error.as_deref()
  }

  pub fn reconnect_attempts(&self) -> u32 {
    self.reconnect_attempts
  }

  pub fn on_open(&mut self) {
    self.state = ConnectionState::Open;
  }

  /// Data arrived, so the link is evidently up and any earlier error is stale.
  pub fn on_fresh_data(&mut self) {
    self.state = ConnectionState::Open;
    self.last_error = None;
  }

  pub fn on_error_event(&mut self, message: impl Into<String>) {
    self.last_error = Some(message.into());
  }

  pub fn on_transport_error(&mut self, closed: bool) {
    if closed {
      self.state = ConnectionState::Closed;
      self.last_error = Some("connection closed".to_string());
    } else {
      // the browser reconnects by itself; only count it
      self.state = ConnectionState::Connecting;
      self.reconnect_attempts += 1;
      self.last_error = Some("connection lost, reconnecting".to_string());
    }
  }

  pub fn on_closed(&mut self) {
    self.state = ConnectionState::Closed;
  }
}

/// Local state driven by one event stream.
pub trait StreamState: 'static {
  fn for_scope(scope: ScopeFilter) -> Self where Self: Sized;
  fn scope(&self) -> &ScopeFilter;
  fn event_names(&self) -> Vec<String>;
  fn apply_frame(&mut self, frame: Frame);
  fn link(&self) -> &LinkStatus;
  fn link_mut(&mut self) -> &mut LinkStatus;

  /// No further events are expected; the transport can be closed.
  fn is_terminal(&self) -> bool {
    false
  }
}

/// Keyed collection kept in sync by snapshot + add/update/remove events.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionMirror<T> {
  records: Vec<T>,
  scope: ScopeFilter,
  link: LinkStatus
}

impl<T: StreamResource> Default for CollectionMirror<T> {
  fn default() -> Self {
    Self::new(ScopeFilter::default())
  }
}

impl<T: StreamResource> CollectionMirror<T> {
  pub fn new(scope: ScopeFilter) -> Self {
    Self { records: vec![], scope, link: LinkStatus::default() }
  }

  pub fn records(&self) -> &[T] {
    &self.records
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  pub fn get(&self, key: &str) -> Option<&T> {
    self.records.iter().find(|r| r.key() == key)
  }

  pub fn connected(&self) -> bool {
    self.link.connected()
  }

  pub fn last_error(&self) -> Option<&str> {
    self.link.last_error()
  }

  fn position(&self, key: &str) -> Option<usize> {
    self.records.iter().position(|r| r.key() == key)
  }

  pub fn apply(&mut self, event: StreamEvent<T>) {
    match event {
      StreamEvent::Connected => self.link.on_open(),
      StreamEvent::Snapshot(items) => {
        let mut seen = HashSet::new();
        self.records = items.into_iter()
          .filter(|r| !r.key().is_empty() && self.scope.admits(r))
          .filter(|r| seen.insert(r.key().to_string()))
          .collect();
        self.reorder();
        self.link.on_fresh_data();
      },
      StreamEvent::Added(record) => {
        if record.key().is_empty() || !self.scope.admits(&record) {
          return;
        }
        // a replayed add must not duplicate the identifier
        match self.position(record.key()) {
          Some(idx) => self.records[idx] = record,
          None => self.records.insert(0, record)
        }
        self.reorder();
      },
      StreamEvent::Updated(patch) => {
        let Some(idx) = self.position(patch.key()) else {
          return;
        };
        let merged = match patch.merge_into(&self.records[idx]) {
          Ok(merged) => merged,
          Err(e) => {
            warn!("dropping {} update for {}: {}", T::SINGULAR, patch.key(), e);
            self.link.on_error_event(e.to_string());
            return;
          }
        };
        if self.scope.admits(&merged) {
          self.records[idx] = merged;
          self.reorder();
        } else {
          // e.g. an order leaving the watched status
          self.records.remove(idx);
        }
      },
      StreamEvent::Removed(key) => self.records.retain(|r| r.key() != key),
      StreamEvent::Error(message) => {
        warn!("{} stream reported: {}", T::SINGULAR, message);
        self.link.on_error_event(message);
      }
    }
  }

  fn reorder(&mut self) {
    if T::ORDERED {
      // stable: records without a key keep their relative order at the end
      self.records.sort_by(|a, b| b.order_key().cmp(&a.order_key()));
    }
    if let Some(limit) = self.scope.limit {
      self.records.truncate(limit);
    }
  }
}

impl<T: StreamResource> StreamState for CollectionMirror<T> {
  fn for_scope(scope: ScopeFilter) -> Self {
    Self::new(scope)
  }

  fn scope(&self) -> &ScopeFilter {
    &self.scope
  }

  fn event_names(&self) -> Vec<String> {
    collection_event_names::<T>()
  }

  fn apply_frame(&mut self, frame: Frame) {
    match frame {
      Frame::Open => self.link.on_open(),
      Frame::TransportError { closed } => {
        info!("{} stream transport error (closed: {}), keeping {} records", T::SINGULAR, closed, self.records.len());
        self.link.on_transport_error(closed);
      },
      Frame::Message { event, data } => match decode::<T>(&event, &data) {
        Ok(Some(decoded)) => self.apply(decoded),
        Ok(None) => {},
        Err(e) => {
          warn!("dropping malformed `{}` event: {}", event, e);
          self.link.on_error_event(e.to_string());
        }
      }
    }
  }

  fn link(&self) -> &LinkStatus {
    &self.link
  }

  fn link_mut(&mut self) -> &mut LinkStatus {
    &mut self.link
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::utils::models::{BacktestHistoryItem, Order};
  use crate::stream::event::Patch;

  fn order(id: &str, status: &str) -> Order {
    Order { id: id.to_string(), status: status.to_string(), ..Default::default() }
  }

  fn replace(record: &Order) -> StreamEvent<Order> {
    StreamEvent::Updated(Patch::from_record(record).unwrap())
  }

  fn ids<T: StreamResource>(mirror: &CollectionMirror<T>) -> Vec<&str> {
    mirror.records().iter().map(|r| r.key()).collect()
  }

  #[test]
  fn added_goes_to_the_head_and_update_keeps_position() {
    let mut mirror = CollectionMirror::<Order>::default();
    mirror.apply(StreamEvent::Snapshot(vec![order("a", "OPEN"), order("b", "OPEN")]));
    mirror.apply(StreamEvent::Added(order("c", "OPEN")));
    assert_eq!(ids(&mirror), vec!["c", "a", "b"]);

    mirror.apply(replace(&order("a", "COMPLETE")));
    assert_eq!(ids(&mirror), vec!["c", "a", "b"]);
    assert_eq!(mirror.get("a").unwrap().status, "COMPLETE");
  }

  #[test]
  fn snapshot_drops_duplicate_identifiers() {
    let mut mirror = CollectionMirror::<Order>::default();
    mirror.apply(StreamEvent::Snapshot(vec![order("a", "OPEN"), order("a", "COMPLETE"), order("b", "OPEN")]));
    assert_eq!(ids(&mirror), vec!["a", "b"]);
    assert_eq!(mirror.get("a").unwrap().status, "OPEN");
  }

  #[test]
  fn status_scope_evicts_records_that_leave_it() {
    let mut mirror = CollectionMirror::<Order>::new(ScopeFilter::default().with_status("OPEN"));
    mirror.apply(StreamEvent::Snapshot(vec![order("a", "OPEN"), order("b", "COMPLETE")]));
    assert_eq!(ids(&mirror), vec!["a"]);
    mirror.apply(replace(&order("a", "COMPLETE")));
    assert!(mirror.is_empty());
  }

  #[test]
  fn ordered_resources_sort_newest_first_and_respect_limit() {
    let item = |id: &str, at: &str| BacktestHistoryItem { id: id.to_string(), created_at: Some(at.to_string()), ..Default::default() };
    let mut mirror = CollectionMirror::<BacktestHistoryItem>::new(ScopeFilter::default().with_limit(2));
    mirror.apply(StreamEvent::Snapshot(vec![item("old", "2024-01-01T00:00:00"), item("mid", "2024-02-01T00:00:00")]));
    assert_eq!(ids(&mirror), vec!["mid", "old"]);
    mirror.apply(StreamEvent::Added(item("new", "2024-03-01T00:00:00")));
    assert_eq!(ids(&mirror), vec!["new", "mid"]);
  }

  #[test]
  fn error_event_keeps_connection_and_data() {
    let mut mirror = CollectionMirror::<Order>::default();
    mirror.apply_frame(Frame::message("connection", "{}"));
    mirror.apply_frame(Frame::message("orders_snapshot", r#"[{"id": "a"}]"#));
    mirror.apply_frame(Frame::message("error", r#"{"message": "broker feed delayed"}"#));
    assert!(mirror.connected());
    assert_eq!(mirror.last_error(), Some("broker feed delayed"));
    assert_eq!(mirror.len(), 1);
  }

  #[test]
  fn malformed_payload_is_recorded_not_applied() {
    let mut mirror = CollectionMirror::<Order>::default();
    mirror.apply_frame(Frame::message("orders_snapshot", r#"[{"id": "a"}]"#));
    mirror.apply_frame(Frame::message("order_update", "{oops"));
    assert_eq!(mirror.len(), 1);
    assert!(mirror.last_error().unwrap().starts_with("Stream decode error"));
  }

  #[test]
  fn transport_errors_count_reconnects() {
    let mut mirror = CollectionMirror::<Order>::default();
    mirror.apply_frame(Frame::Open);
    mirror.apply_frame(Frame::TransportError { closed: false });
    mirror.apply_frame(Frame::TransportError { closed: false });
    assert_eq!(mirror.link().reconnect_attempts(), 2);
    assert_eq!(mirror.link().state(), ConnectionState::Connecting);
    mirror.apply_frame(Frame::TransportError { closed: true });
    assert_eq!(mirror.link().state(), ConnectionState::Closed);
  }
}
