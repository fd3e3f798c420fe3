use reqwest::Url;

use crate::utils::{server::AppError, session::Session};
use super::resource::ScopeFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamKind {
  Orders,
  StrategyStatus,
  BacktestJobs,
  BacktestHistory,
  BacktestProgress { job_id: String },
  HistoricalData,
}

impl StreamKind {
  /// Path below the api base, one entry per segment.
  pub fn segments(&self) -> Vec<&str> {
    match self {
      StreamKind::Orders => vec!["api", "sse", "orders"],
      StreamKind::StrategyStatus => vec!["api", "sse", "strategies", "status"],
      StreamKind::BacktestJobs => vec!["api", "sse", "backtest", "jobs"],
      StreamKind::BacktestHistory => vec!["api", "sse", "backtest", "history"],
      StreamKind::BacktestProgress { job_id } => vec!["api", "sse", "backtest", "progress", job_id.as_str()],
      StreamKind::HistoricalData => vec!["api", "sse", "backtest", "data"],
    }
  }
}

/// Everything that identifies one subscription. Two equal specs describe the
/// same logical stream; a change in any field means reconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSpec {
  pub kind: StreamKind,
  pub token: String,
  pub scope: ScopeFilter
}

impl SubscriptionSpec {
  /// `None` without a token: an anonymous session never connects.
  pub fn new(kind: StreamKind, session: &Session, scope: ScopeFilter) -> Option<Self> {
    let token = session.token()?.to_string();
    Some(Self { kind, token, scope })
  }

  /// EventSource cannot send headers, so the token travels in the query.
  pub fn url(&self, base_url: &str) -> Result<String, AppError> {
    let mut url = Url::parse(base_url)
      .map_err(|e| AppError::ConfigError(format!("invalid stream base url {}: {}", base_url, e)))?;
    url.path_segments_mut()
      .map_err(|_| AppError::ConfigError(format!("stream base url {} cannot take a path", base_url)))?
      .pop_if_empty()
      .extend(self.kind.segments());
    url.query_pairs_mut()
      .append_pair("token", &self.token)
      .extend_pairs(self.scope.query_pairs());
    Ok(url.into())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn session(token: Option<&str>) -> Session {
    Session::new(token.map(str::to_string), "device-1")
  }

  #[test]
  fn no_token_no_subscription() {
    assert!(SubscriptionSpec::new(StreamKind::Orders, &session(None), ScopeFilter::default()).is_none());
  }

  #[test]
  fn url_carries_token_and_scope() {
    let spec = SubscriptionSpec::new(
      StreamKind::Orders,
      &session(Some("tok en")),
      ScopeFilter::strategy("s1").with_status("OPEN")
    ).unwrap();
    assert_eq!(
      spec.url("http://localhost:8000/").unwrap(),
      "http://localhost:8000/api/sse/orders?token=tok+en&strategy_id=s1&status_filter=OPEN"
    );
  }

  #[test]
  fn progress_path_escapes_the_job_id() {
    let spec = SubscriptionSpec::new(
      StreamKind::BacktestProgress { job_id: "j/42?x".to_string() },
      &session(Some("t")),
      ScopeFilter::default()
    ).unwrap();
    assert_eq!(spec.url("http://localhost:8000").unwrap(), "http://localhost:8000/api/sse/backtest/progress/j%2F42%3Fx?token=t");
  }

  #[test]
  fn token_change_is_a_different_subscription() {
    let a = SubscriptionSpec::new(StreamKind::Orders, &session(Some("a")), ScopeFilter::default());
    let b = SubscriptionSpec::new(StreamKind::Orders, &session(Some("b")), ScopeFilter::default());
    assert_ne!(a, b);
  }
}
