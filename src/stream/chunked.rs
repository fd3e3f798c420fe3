use dioxus::logger::tracing::{info, warn};
use serde::Deserialize;

use crate::utils::{models::Candle, server::AppError};
use super::{
  event::{error_message, parse_collection, parse_json, from_value, Frame},
  mirror::{LinkStatus, StreamState},
  resource::ScopeFilter
};

#[derive(Debug, Deserialize)]
struct IntervalStart {
  #[serde(default)]
  interval: Option<String>,
  #[serde(default, alias = "total", alias = "total_points")]
  expected_points: Option<usize>
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChunkEvent {
  Connected,
  IntervalStart { interval: Option<String>, expected_points: Option<usize> },
  DataChunk(Vec<Candle>),
  Complete,
  Error(String),
}

pub fn decode_chunk_event(event: &str, data: &str) -> Result<Option<ChunkEvent>, AppError> {
  let decoded = match event {
    "connection" => ChunkEvent::Connected,
    "interval_start" => {
      let start: IntervalStart = if data.trim().is_empty() {
        IntervalStart { interval: None, expected_points: None }
      } else {
        from_value(parse_json(data)?)?
      };
      ChunkEvent::IntervalStart { interval: start.interval, expected_points: start.expected_points }
    },
    "data_chunk" => ChunkEvent::DataChunk(parse_collection::<Candle>(data, "data")?),
    "complete" => ChunkEvent::Complete,
    "error" => ChunkEvent::Error(error_message(data)),
    _ => return Ok(None)
  };
  Ok(Some(decoded))
}

/// Historical OHLC data delivered as `interval_start`, N x `data_chunk`,
/// `complete`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkedMirror {
  points: Vec<Candle>,
  interval: Option<String>,
  expected_points: Option<usize>,
  received: usize,
  complete: bool,
  scope: ScopeFilter,
  link: LinkStatus
}

impl ChunkedMirror {
  pub fn points(&self) -> &[Candle] {
    &self.points
  }

  pub fn interval(&self) -> Option<&str> {
    self.interval.as_deref()
  }

  pub fn received(&self) -> usize {
    self.received
  }

  pub fn expected_points(&self) -> Option<usize> {
    self.expected_points
  }

  pub fn is_complete(&self) -> bool {
    self.complete
  }

  /// Fraction of the announced total received so far, if a total was given.
  pub fn fraction_received(&self) -> Option<f64> {
    match self.expected_points {
      Some(0) => Some(1.0),
      Some(total) => Some((self.received as f64 / total as f64).min(1.0)),
      None => None
    }
  }

  pub fn apply(&mut self, event: ChunkEvent) {
    if self.complete && !matches!(event, ChunkEvent::Error(_)) {
      return;
    }
    match event {
      ChunkEvent::Connected => self.link.on_open(),
      ChunkEvent::IntervalStart { interval, expected_points } => {
        self.points.clear();
        self.received = 0;
        self.interval = interval;
        self.expected_points = expected_points;
        self.link.on_fresh_data();
      },
      ChunkEvent::DataChunk(candles) => {
        self.received += candles.len();
        self.points.extend(candles);
      },
      ChunkEvent::Complete => {
        info!("historical data transfer complete: {} points", self.received);
        self.complete = true;
      },
      ChunkEvent::Error(message) => self.link.on_error_event(message)
    }
  }
}

impl StreamState for ChunkedMirror {
  fn for_scope(scope: ScopeFilter) -> Self {
    Self { scope, ..Default::default() }
  }

  fn scope(&self) -> &ScopeFilter {
    &self.scope
  }

  fn event_names(&self) -> Vec<String> {
    ["connection", "interval_start", "data_chunk", "complete", "error"]
      .iter().map(|s| s.to_string()).collect()
  }

  fn apply_frame(&mut self, frame: Frame) {
    match frame {
      Frame::Open => self.link.on_open(),
      Frame::TransportError { closed } => self.link.on_transport_error(closed),
      Frame::Message { event, data } => match decode_chunk_event(&event, &data) {
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

  fn is_terminal(&self) -> bool {
    self.complete
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn chunk(n: usize) -> String {
    let candles = (0..n)
      .map(|i| format!(r#"{{"timestamp": "t{}", "open": 1, "high": 2, "low": 0.5, "close": 1.5, "volume": 10}}"#, i))
      .collect::<Vec<_>>()
      .join(",");
    format!(r#"{{"data": [{}], "chunk_index": 0}}"#, candles)
  }

  #[test]
  fn chunks_accumulate_until_complete() {
    let mut mirror = ChunkedMirror::default();
    mirror.apply_frame(Frame::message("interval_start", r#"{"interval": "5m", "total_points": 5}"#));
    mirror.apply_frame(Frame::message("data_chunk", chunk(3)));
    assert_eq!(mirror.fraction_received(), Some(0.6));
    mirror.apply_frame(Frame::message("data_chunk", chunk(2)));
    mirror.apply_frame(Frame::message("complete", "{}"));

    assert!(mirror.is_terminal());
    assert_eq!(mirror.points().len(), 5);
    assert_eq!(mirror.interval(), Some("5m"));

    // nothing after complete
    mirror.apply_frame(Frame::message("data_chunk", chunk(4)));
    assert_eq!(mirror.received(), 5);
  }

  #[test]
  fn interval_start_resets_accumulation() {
    let mut mirror = ChunkedMirror::default();
    mirror.apply_frame(Frame::message("interval_start", r#"{"interval": "1m"}"#));
    mirror.apply_frame(Frame::message("data_chunk", chunk(4)));
    mirror.apply_frame(Frame::message("interval_start", r#"{"interval": "1m", "total": 2}"#));
    assert_eq!(mirror.received(), 0);
    assert!(mirror.points().is_empty());
    assert_eq!(mirror.expected_points(), Some(2));
  }
}
