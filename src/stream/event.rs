use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::utils::server::AppError;
use super::resource::StreamResource;

/// What the transport hands over, before any decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
  /// EventSource `open`.
  Open,
  /// A named server event and its raw data field.
  Message { event: String, data: String },
  /// Transport failure. `closed` is true when the browser gave up instead of
  /// reconnecting on its own.
  TransportError { closed: bool },
}

impl Frame {
  pub fn message(event: &str, data: impl Into<String>) -> Self {
    Frame::Message { event: event.to_string(), data: data.into() }
  }
}

/// Decoded event for a keyed collection stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent<T> {
  Connected,
  Snapshot(Vec<T>),
  Added(T),
  Updated(Patch),
  Removed(String),
  Error(String),
}

/// The fields an update event carries, split from its identifier. Fields the
/// event leaves out keep their stored values when merged.
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
  key: String,
  fields: Map<String, Value>,
}

impl Patch {
  pub fn key(&self) -> &str {
    &self.key
  }

  /// A patch carrying every field of `record`.
  pub fn from_record<T: StreamResource>(record: &T) -> Result<Self, AppError> {
    Self::from_fields::<T>(to_object(record)?)
  }

  fn from_fields<T: StreamResource>(mut fields: Map<String, Value>) -> Result<Self, AppError> {
    let mut key = None;
    for field in [T::KEY_FIELD, "id"] {
      if let Some(value) = fields.remove(field) {
        key = key.or_else(|| key_text(&value));
      }
    }
    match key {
      Some(key) if !key.is_empty() => Ok(Self { key, fields }),
      _ => Err(AppError::StreamDecodeError(format!("{} event without `{}`", T::SINGULAR, T::KEY_FIELD)))
    }
  }

  /// Overlays the patch on `record`. The result is decoded again, so a field
  /// of the wrong type rejects the whole patch.
  pub fn merge_into<T: StreamResource>(&self, record: &T) -> Result<T, AppError> {
    let mut merged = to_object(record)?;
    for (field, value) in &self.fields {
      merged.insert(field.clone(), value.clone());
    }
    merged.insert(T::KEY_FIELD.to_string(), Value::String(self.key.clone()));
    from_value(Value::Object(merged))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delta {
  Added,
  Updated,
  Removed,
}

// `new_order` / `order_added` / `order_update` / `order_updated` / `order_removed`
fn delta_kind(name: &str, singular: &str) -> Option<Delta> {
  if let Some(rest) = name.strip_prefix("new_") {
    return (rest == singular).then_some(Delta::Added);
  }
  match name.strip_prefix(singular)?.strip_prefix('_')? {
    "added" => Some(Delta::Added),
    "updated" | "update" => Some(Delta::Updated),
    "removed" => Some(Delta::Removed),
    _ => None
  }
}

/// Event names a collection stream of `T` listens for.
pub fn collection_event_names<T: StreamResource>() -> Vec<String> {
  let s = T::SINGULAR;
  vec![
    "connection".to_string(),
    T::SNAPSHOT.to_string(),
    format!("new_{}", s),
    format!("{}_added", s),
    format!("{}_update", s),
    format!("{}_updated", s),
    format!("{}_removed", s),
    "error".to_string(),
  ]
}

/// Decodes one named event. Unknown names (heartbeats and the like) give
/// `Ok(None)`; malformed payloads give an error and must not touch state.
pub fn decode<T: StreamResource>(event: &str, data: &str) -> Result<Option<StreamEvent<T>>, AppError> {
  if event == "connection" {
    return Ok(Some(StreamEvent::Connected));
  }
  if event == "error" {
    return Ok(Some(StreamEvent::Error(error_message(data))));
  }
  if event == T::SNAPSHOT {
    let items = parse_collection::<T>(data, T::COLLECTION_FIELD)?;
    return Ok(Some(StreamEvent::Snapshot(items)));
  }
  let decoded = match delta_kind(event, T::SINGULAR) {
    Some(Delta::Added) => {
      let record = parse_record::<T>(data, T::SINGULAR)?;
      if record.key().is_empty() {
        return Err(AppError::StreamDecodeError(format!("{} event without `{}`", T::SINGULAR, T::KEY_FIELD)));
      }
      StreamEvent::Added(record)
    },
    Some(Delta::Updated) => StreamEvent::Updated(parse_patch::<T>(data)?),
    Some(Delta::Removed) => StreamEvent::Removed(parse_key(data, T::KEY_FIELD)?),
    None => return Ok(None)
  };
  Ok(Some(decoded))
}

pub(crate) fn parse_json(data: &str) -> Result<Value, AppError> {
  serde_json::from_str::<Value>(data).map_err(|e| AppError::StreamDecodeError(e.to_string()))
}

pub(crate) fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, AppError> {
  serde_json::from_value::<T>(value).map_err(|e| AppError::StreamDecodeError(e.to_string()))
}

/// Bare array, or an object wrapping it under `field` / `data` / `items`.
pub(crate) fn parse_collection<T: DeserializeOwned>(data: &str, field: &str) -> Result<Vec<T>, AppError> {
  let value = parse_json(data)?;
  let list = match value {
    Value::Array(items) => Value::Array(items),
    Value::Object(mut map) => [field, "data", "items"].iter()
      .find_map(|key| map.remove(*key))
      .ok_or_else(|| AppError::StreamDecodeError(format!("snapshot without `{}` field", field)))?,
    other => return Err(AppError::StreamDecodeError(format!("unexpected snapshot payload: {}", other)))
  };
  from_value(list)
}

fn to_object<T: Serialize>(record: &T) -> Result<Map<String, Value>, AppError> {
  match serde_json::to_value(record).map_err(|e| AppError::StreamDecodeError(e.to_string()))? {
    Value::Object(map) => Ok(map),
    other => Err(AppError::StreamDecodeError(format!("record is not an object: {}", other)))
  }
}

fn key_text(value: &Value) -> Option<String> {
  value.as_str().map(str::to_string).or_else(|| value.as_i64().map(|n| n.to_string()))
}

/// Strips a `{"<singular>": {...}}` / `{"data": {...}}` envelope.
fn unwrap_record(mut value: Value, singular: &str) -> Value {
  if let Value::Object(map) = &mut value {
    for key in [singular, "data"] {
      if map.get(key).is_some_and(Value::is_object) {
        if let Some(inner) = map.remove(key) {
          return inner;
        }
      }
    }
  }
  value
}

/// The record itself, or wrapped as `{"<singular>": {...}}` / `{"data": {...}}`.
pub(crate) fn parse_record<T: DeserializeOwned>(data: &str, singular: &str) -> Result<T, AppError> {
  from_value(unwrap_record(parse_json(data)?, singular))
}

fn parse_patch<T: StreamResource>(data: &str) -> Result<Patch, AppError> {
  match unwrap_record(parse_json(data)?, T::SINGULAR) {
    Value::Object(fields) => Patch::from_fields::<T>(fields),
    other => Err(AppError::StreamDecodeError(format!("unexpected {} update: {}", T::SINGULAR, other)))
  }
}

fn parse_key(data: &str, key_field: &str) -> Result<String, AppError> {
  let value = match parse_json(data) {
    Ok(v) => v,
    // a bare, unquoted identifier
    Err(_) if !data.trim().is_empty() && !data.trim().starts_with(['{', '[']) => return Ok(data.trim().to_string()),
    Err(e) => return Err(e)
  };
  let key = match &value {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    Value::Object(map) => [key_field, "id"].iter()
      .find_map(|k| map.get(*k))
      .and_then(key_text),
    _ => None
  };
  key.ok_or_else(|| AppError::StreamDecodeError(format!("removal event without `{}`", key_field)))
}

/// Human readable text of an `error` event.
pub(crate) fn error_message(data: &str) -> String {
  let from_json = serde_json::from_str::<Value>(data).ok().and_then(|v| {
    ["message", "error", "detail"].iter()
      .find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_string))
      .or_else(|| v.as_str().map(str::to_string))
  });
  match from_json {
    Some(msg) if !msg.is_empty() => msg,
    _ if !data.trim().is_empty() => data.trim().to_string(),
    _ => "stream error".to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::utils::models::{BacktestJob, Order, StrategyStatus, StrategySummary};

  #[test]
  fn both_naming_styles_map_to_the_same_variant() {
    let added = decode::<Order>("new_order", r#"{"id": "o1", "symbol": "INFY"}"#).unwrap();
    let added_alt = decode::<Order>("order_added", r#"{"order": {"id": "o1", "symbol": "INFY"}}"#).unwrap();
    assert_eq!(added, added_alt);
    assert!(matches!(added, Some(StreamEvent::Added(ref o)) if o.id == "o1"));

    assert!(matches!(decode::<Order>("order_update", r#"{"id": "o1"}"#).unwrap(), Some(StreamEvent::Updated(_))));
    assert!(matches!(decode::<Order>("order_updated", r#"{"id": "o1"}"#).unwrap(), Some(StreamEvent::Updated(_))));
  }

  #[test]
  fn keyless_records_are_rejected() {
    assert!(matches!(decode::<Order>("new_order", r#"{"symbol": "TCS"}"#), Err(AppError::StreamDecodeError(_))));
    assert!(matches!(decode::<Order>("order_update", r#"{"status": "COMPLETE"}"#), Err(AppError::StreamDecodeError(_))));
    assert!(matches!(decode::<Order>("order_update", r#"{"id": ""}"#), Err(AppError::StreamDecodeError(_))));
  }

  #[test]
  fn patch_keeps_fields_it_does_not_mention() {
    let stored = Order { id: "o1".to_string(), symbol: "INFY".to_string(), quantity: 10, status: "OPEN".to_string(), ..Default::default() };
    let Some(StreamEvent::Updated(patch)) = decode::<Order>("order_update", r#"{"order": {"id": "o1", "status": "COMPLETE"}}"#).unwrap() else {
      panic!("expected an update");
    };
    assert_eq!(patch.key(), "o1");
    let merged = patch.merge_into(&stored).unwrap();
    assert_eq!(merged, Order { status: "COMPLETE".to_string(), ..stored });
  }

  #[test]
  fn patch_accepts_the_id_alias_for_strategy_summaries() {
    let stored = StrategySummary { strategy_id: "s1".to_string(), total_trades: 12, ..Default::default() };
    let Some(StreamEvent::Updated(patch)) = decode::<StrategySummary>("status_update", r#"{"id": "s1", "status": "paused"}"#).unwrap() else {
      panic!("expected an update");
    };
    let merged = patch.merge_into(&stored).unwrap();
    assert_eq!(merged.strategy_id, "s1");
    assert_eq!(merged.status, StrategyStatus::Paused);
    assert_eq!(merged.total_trades, 12);
  }

  #[test]
  fn patch_with_a_mistyped_field_is_rejected_whole() {
    let stored = Order { id: "o1".to_string(), quantity: 10, ..Default::default() };
    let Some(StreamEvent::Updated(patch)) = decode::<Order>("order_update", r#"{"id": "o1", "quantity": "ten"}"#).unwrap() else {
      panic!("expected an update");
    };
    assert!(matches!(patch.merge_into(&stored), Err(AppError::StreamDecodeError(_))));
  }

  #[test]
  fn snapshots_accept_wrapped_and_bare_lists() {
    let wrapped = decode::<Order>("orders_snapshot", r#"{"orders": [{"id": "a"}, {"id": "b"}], "count": 2}"#).unwrap();
    let bare = decode::<Order>("orders_snapshot", r#"[{"id": "a"}, {"id": "b"}]"#).unwrap();
    assert_eq!(wrapped, bare);
  }

  #[test]
  fn removal_keys_follow_the_resource() {
    let removed = decode::<BacktestJob>("job_removed", r#"{"job_id": "j7"}"#).unwrap();
    assert_eq!(removed, Some(StreamEvent::Removed("j7".to_string())));
    let removed = decode::<Order>("order_removed", "o3").unwrap();
    assert_eq!(removed, Some(StreamEvent::Removed("o3".to_string())));
  }

  #[test]
  fn unknown_events_are_ignored_and_bad_payloads_rejected() {
    assert_eq!(decode::<Order>("heartbeat", "{}").unwrap(), None);
    assert_eq!(decode::<Order>("job_added", "{}").unwrap(), None);
    assert!(matches!(decode::<Order>("order_update", "{not json"), Err(AppError::StreamDecodeError(_))));
  }

  #[test]
  fn error_events_carry_a_message() {
    assert_eq!(error_message(r#"{"message": "token expired"}"#), "token expired");
    assert_eq!(error_message("plain text"), "plain text");
    assert_eq!(error_message(""), "stream error");
  }
}
