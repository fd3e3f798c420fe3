use serde::{de::DeserializeOwned, Serialize};

use crate::utils::models::{BacktestHistoryItem, BacktestJob, Order, StrategySummary};

/// A record type mirrored by a keyed collection stream. The constants give
/// the wire names; everything else is derived from them.
pub trait StreamResource: DeserializeOwned + Serialize + Clone + 'static {
  /// `order` -> `new_order`, `order_update`, `order_removed`, ...
  const SINGULAR: &'static str;
  const SNAPSHOT: &'static str;
  /// Field wrapping the list in snapshot payloads.
  const COLLECTION_FIELD: &'static str;
  /// Field carrying the identifier in removal payloads.
  const KEY_FIELD: &'static str;
  /// Keep the local list sorted newest first by `order_key`.
  const ORDERED: bool = false;

  fn key(&self) -> &str;

  fn strategy_id(&self) -> Option<&str> {
    None
  }

  fn status(&self) -> Option<&str> {
    None
  }

  fn order_key(&self) -> Option<&str> {
    None
  }
}

impl StreamResource for Order {
  const SINGULAR: &'static str = "order";
  const SNAPSHOT: &'static str = "orders_snapshot";
  const COLLECTION_FIELD: &'static str = "orders";
  const KEY_FIELD: &'static str = "id";

  fn key(&self) -> &str {
    &self.id
  }

  fn strategy_id(&self) -> Option<&str> {
    self.strategy_id.as_deref()
  }

  fn status(&self) -> Option<&str> {
    Some(&self.status)
  }
}

impl StreamResource for BacktestJob {
  const SINGULAR: &'static str = "job";
  const SNAPSHOT: &'static str = "jobs_snapshot";
  const COLLECTION_FIELD: &'static str = "jobs";
  const KEY_FIELD: &'static str = "job_id";

  fn key(&self) -> &str {
    &self.job_id
  }

  fn strategy_id(&self) -> Option<&str> {
    self.strategy_id.as_deref()
  }

  fn status(&self) -> Option<&str> {
    Some(&self.status)
  }
}

impl StreamResource for BacktestHistoryItem {
  const SINGULAR: &'static str = "backtest";
  const SNAPSHOT: &'static str = "history_snapshot";
  const COLLECTION_FIELD: &'static str = "history";
  const KEY_FIELD: &'static str = "id";
  const ORDERED: bool = true;

  fn key(&self) -> &str {
    &self.id
  }

  fn strategy_id(&self) -> Option<&str> {
    self.strategy_id.as_deref()
  }

  fn status(&self) -> Option<&str> {
    self.status.as_deref()
  }

  fn order_key(&self) -> Option<&str> {
    self.created_at.as_deref()
  }
}

impl StreamResource for StrategySummary {
  const SINGULAR: &'static str = "status";
  const SNAPSHOT: &'static str = "status_snapshot";
  const COLLECTION_FIELD: &'static str = "strategies";
  const KEY_FIELD: &'static str = "strategy_id";

  fn key(&self) -> &str {
    &self.strategy_id
  }

  fn strategy_id(&self) -> Option<&str> {
    Some(&self.strategy_id)
  }

  fn status(&self) -> Option<&str> {
    Some(self.status.as_str())
  }
}

/// Client-side narrowing of a stream. Also forwarded to the server as query
/// parameters, but records are re-checked locally since the server may
/// broadcast more than asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeFilter {
  pub strategy_id: Option<String>,
  pub status_filter: Option<String>,
  pub limit: Option<usize>,
  pub interval: Option<String>,
  pub symbol: Option<String>
}

impl ScopeFilter {
  pub fn strategy(id: impl Into<String>) -> Self {
    Self { strategy_id: Some(id.into()), ..Default::default() }
  }

  pub fn with_status(mut self, status: impl Into<String>) -> Self {
    self.status_filter = Some(status.into());
    self
  }

  pub fn with_limit(mut self, limit: usize) -> Self {
    self.limit = Some(limit);
    self
  }

  pub fn with_interval(mut self, interval: impl Into<String>) -> Self {
    self.interval = Some(interval.into());
    self
  }

  pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
    self.symbol = Some(symbol.into());
    self
  }

  pub fn admits<T: StreamResource>(&self, record: &T) -> bool {
    if let Some(wanted) = &self.strategy_id {
      if record.strategy_id() != Some(wanted.as_str()) {
        return false;
      }
    }
    if let (Some(wanted), Some(status)) = (&self.status_filter, record.status()) {
      if !wanted.eq_ignore_ascii_case(status) {
        return false;
      }
    }
    true
  }

  pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
    let mut pairs = vec![];
    if let Some(id) = &self.strategy_id {
      pairs.push(("strategy_id", id.clone()));
    }
    if let Some(status) = &self.status_filter {
      pairs.push(("status_filter", status.clone()));
    }
    if let Some(limit) = self.limit {
      pairs.push(("limit", limit.to_string()));
    }
    if let Some(interval) = &self.interval {
      pairs.push(("interval", interval.clone()));
    }
    if let Some(symbol) = &self.symbol {
      pairs.push(("symbol", symbol.clone()));
    }
    pairs
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn order(id: &str, strategy: Option<&str>, status: &str) -> Order {
    Order {
      id: id.to_string(),
      strategy_id: strategy.map(str::to_string),
      status: status.to_string(),
      ..Default::default()
    }
  }

  #[test]
  fn strategy_scope_rejects_other_and_unscoped_records() {
    let scope = ScopeFilter::strategy("s1");
    assert!(scope.admits(&order("o1", Some("s1"), "OPEN")));
    assert!(!scope.admits(&order("o2", Some("s2"), "OPEN")));
    assert!(!scope.admits(&order("o3", None, "OPEN")));
    assert!(ScopeFilter::default().admits(&order("o3", None, "OPEN")));
  }

  #[test]
  fn status_filter_is_case_insensitive() {
    let scope = ScopeFilter::default().with_status("open");
    assert!(scope.admits(&order("o1", None, "OPEN")));
    assert!(!scope.admits(&order("o1", None, "COMPLETE")));
  }

  #[test]
  fn query_pairs_skip_unset_fields() {
    let scope = ScopeFilter::strategy("s1").with_limit(20);
    assert_eq!(scope.query_pairs(), vec![("strategy_id", "s1".to_string()), ("limit", "20".to_string())]);
  }
}
