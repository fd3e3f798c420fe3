use dioxus::logger::tracing::warn;

use crate::utils::models::BacktestProgress;
use super::{
  event::{error_message, parse_record, Frame},
  mirror::{LinkStatus, StreamState},
  resource::ScopeFilter
};

/// Single latest value of a backtest job's progress.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressMirror {
  value: Option<BacktestProgress>,
  complete: bool,
  scope: ScopeFilter,
  link: LinkStatus
}

impl ProgressMirror {
  pub fn value(&self) -> Option<&BacktestProgress> {
    self.value.as_ref()
  }

  pub fn is_complete(&self) -> bool {
    self.complete
  }

  /// 0..=100
  pub fn percent(&self) -> f64 {
    if self.complete {
      return 100.0;
    }
    self.value.as_ref().map_or(0.0, |p| p.progress.clamp(0.0, 100.0))
  }

  fn replace(&mut self, data: &str) -> bool {
    match parse_record::<BacktestProgress>(data, "progress") {
      Ok(progress) => {
        self.value = Some(progress);
        self.link.on_fresh_data();
        true
      },
      Err(e) => {
        warn!("dropping malformed progress event: {}", e);
        self.link.on_error_event(e.to_string());
        false
      }
    }
  }
}

impl StreamState for ProgressMirror {
  fn for_scope(scope: ScopeFilter) -> Self {
    Self { scope, ..Default::default() }
  }

  fn scope(&self) -> &ScopeFilter {
    &self.scope
  }

  fn event_names(&self) -> Vec<String> {
    ["connection", "progress", "progress_update", "progress_snapshot", "complete", "error"]
      .iter().map(|s| s.to_string()).collect()
  }

  fn apply_frame(&mut self, frame: Frame) {
    match frame {
      Frame::Open => self.link.on_open(),
      Frame::TransportError { closed } => self.link.on_transport_error(closed),
      Frame::Message { event, data } => {
        if self.complete && event != "error" {
          return;
        }
        match event.as_str() {
          "connection" => self.link.on_open(),
          "progress" | "progress_update" | "progress_snapshot" => { self.replace(&data); },
          "complete" => {
            // the final payload may carry the result, or may be empty
            if !data.trim().is_empty() && data.trim() != "{}" {
              self.replace(&data);
            }
            self.complete = true;
          },
          "error" => self.link.on_error_event(error_message(&data)),
          _ => {}
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

  #[test]
  fn progress_replaces_and_completes() {
    let mut mirror = ProgressMirror::default();
    mirror.apply_frame(Frame::message("progress", r#"{"job_id": "j1", "progress": 40, "status": "running"}"#));
    assert_eq!(mirror.percent(), 40.0);
    mirror.apply_frame(Frame::message("complete", r#"{"job_id": "j1", "progress": 100, "status": "completed", "result": {"total_return": 12.5, "total_trades": 8}}"#));
    assert!(mirror.is_terminal());
    assert_eq!(mirror.value().unwrap().result.as_ref().unwrap().total_trades, 8);

    mirror.apply_frame(Frame::message("progress", r#"{"job_id": "j1", "progress": 10}"#));
    assert_eq!(mirror.percent(), 100.0);
  }

  #[test]
  fn empty_complete_keeps_last_value() {
    let mut mirror = ProgressMirror::default();
    mirror.apply_frame(Frame::message("progress", r#"{"job_id": "j1", "progress": 90}"#));
    mirror.apply_frame(Frame::message("complete", ""));
    assert!(mirror.is_complete());
    assert_eq!(mirror.value().unwrap().progress, 90.0);
  }
}
