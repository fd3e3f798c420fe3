use std::fmt;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/* Strategies */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyStatus {
  #[default]
  Draft,
  Active,
  Paused,
  Stopped,
  Error
}

impl StrategyStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Draft => "draft",
      Self::Active => "active",
      Self::Paused => "paused",
      Self::Stopped => "stopped",
      Self::Error => "error",
    }
  }

  /// Actions the backend accepts for a strategy in this status.
  pub fn available_actions(&self) -> &'static [StrategyAction] {
    match self {
      Self::Draft | Self::Stopped | Self::Error => &[StrategyAction::Start],
      Self::Active => &[StrategyAction::Pause, StrategyAction::Stop],
      Self::Paused => &[StrategyAction::Resume, StrategyAction::Stop],
    }
  }
}

impl fmt::Display for StrategyStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyAction {
  Start,
  Stop,
  Pause,
  Resume
}

impl StrategyAction {
  pub fn path_segment(&self) -> &'static str {
    match self {
      Self::Start => "start",
      Self::Stop => "stop",
      Self::Pause => "pause",
      Self::Resume => "resume",
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      Self::Start => "Start",
      Self::Stop => "Stop",
      Self::Pause => "Pause",
      Self::Resume => "Resume",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct Strategy {
  pub id: String,
  pub name: String,
  pub description: Option<String>,
  pub status: StrategyStatus,
  pub code: Option<String>,
  pub symbol: Option<String>,
  pub timeframe: Option<String>,
  pub total_trades: u64,
  pub win_rate: f64,
  pub total_pnl: Decimal,
  pub created_at: Option<String>,
  pub updated_at: Option<String>
}

/// Status and performance projection pushed by the strategy status stream.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySummary {
  #[serde(alias = "id")]
  pub strategy_id: String,
  pub name: Option<String>,
  pub status: StrategyStatus,
  pub total_trades: u64,
  pub win_rate: f64,
  pub total_pnl: Decimal,
  pub updated_at: Option<String>
}

impl From<&Strategy> for StrategySummary {
  fn from(s: &Strategy) -> Self {
    StrategySummary {
      strategy_id: s.id.clone(),
      name: Some(s.name.clone()),
      status: s.status,
      total_trades: s.total_trades,
      win_rate: s.win_rate,
      total_pnl: s.total_pnl,
      updated_at: s.updated_at.clone()
    }
  }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct StrategyRequest {
  pub name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub symbol: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timeframe: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub code: Option<String>
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct StrategyUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub symbol: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timeframe: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub code: Option<String>
}

impl StrategyUpdate {
  pub fn code(code: impl Into<String>) -> Self {
    StrategyUpdate { code: Some(code.into()), ..Default::default() }
  }
}

#[derive(Debug, Serialize)]
pub struct ValidateCodeRequest {
  pub code: String
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct ValidateCodeResponse {
  pub valid: bool,
  pub errors: Vec<String>,
  pub warnings: Vec<String>
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisualBuilderResponse {
  #[serde(default)]
  pub strategy_id: Option<String>,
  #[serde(default, alias = "flow_data")]
  pub flow: Value,
  #[serde(default)]
  pub updated_at: Option<String>
}

/* Orders */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
  #[default]
  Buy,
  Sell
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrderType {
  #[default]
  #[serde(rename = "MARKET")]
  Market,
  #[serde(rename = "LIMIT")]
  Limit,
  #[serde(rename = "SL")]
  StopLoss,
  #[serde(rename = "SL-M")]
  StopLossMarket
}

impl OrderType {
  pub fn needs_price(&self) -> bool {
    matches!(self, Self::Limit | Self::StopLoss)
  }

  pub fn needs_trigger(&self) -> bool {
    matches!(self, Self::StopLoss | Self::StopLossMarket)
  }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Order {
  pub id: String,
  pub strategy_id: Option<String>,
  pub symbol: String,
  pub exchange: Option<String>,
  pub side: OrderSide,
  pub order_type: OrderType,
  pub quantity: u64,
  pub filled_quantity: u64,
  pub price: Option<Decimal>,
  pub average_price: Option<Decimal>,
  pub status: String,
  pub broker_order_id: Option<String>,
  pub created_at: Option<String>,
  pub updated_at: Option<String>
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OrderRequest {
  pub symbol: String,
  pub exchange: String,
  pub side: OrderSide,
  pub order_type: OrderType,
  pub quantity: u64,
  pub product: String,
  #[serde(with = "rust_decimal::serde::float_option", skip_serializing_if = "Option::is_none")]
  pub price: Option<Decimal>,
  #[serde(with = "rust_decimal::serde::float_option", skip_serializing_if = "Option::is_none")]
  pub trigger_price: Option<Decimal>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub strategy_id: Option<String>
}

impl OrderRequest {
  /// Client-side checks that mirror what the backend rejects anyway.
  pub fn validate(&self) -> Result<(), String> {
    if self.symbol.trim().is_empty() {
      return Err("Symbol is required".to_string());
    }
    if self.quantity == 0 {
      return Err("Quantity must be greater than zero".to_string());
    }
    if self.order_type.needs_price() && self.price.map_or(true, |p| p <= Decimal::ZERO) {
      return Err("A positive price is required for this order type".to_string());
    }
    if self.order_type.needs_trigger() && self.trigger_price.map_or(true, |p| p <= Decimal::ZERO) {
      return Err("A trigger price is required for stop-loss orders".to_string());
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct OrderModifyRequest {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub quantity: Option<u64>,
  #[serde(with = "rust_decimal::serde::float_option", skip_serializing_if = "Option::is_none")]
  pub price: Option<Decimal>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub order_type: Option<OrderType>,
  #[serde(with = "rust_decimal::serde::float_option", skip_serializing_if = "Option::is_none")]
  pub trigger_price: Option<Decimal>
}

/* Brokers */
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct BrokerCredential {
  pub id: String,
  pub broker: String,
  pub api_key: String,
  pub is_active: bool,
  pub created_at: Option<String>
}

#[derive(Debug, Clone, Serialize)]
pub struct BrokerCredentialRequest {
  pub broker: String,
  pub api_key: String,
  pub api_secret: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub is_active: Option<bool>
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthInitiateResponse {
  #[serde(alias = "url")]
  pub login_url: String
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct OAuthStatusResponse {
  pub connected: bool,
  pub user_id: Option<String>,
  pub expires_at: Option<String>
}

/* Marketplace */
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct MarketplaceListing {
  pub id: String,
  pub strategy_id: String,
  pub name: String,
  pub description: Option<String>,
  pub author: Option<String>,
  pub is_public: bool,
  pub subscribers: u64,
  pub win_rate: f64,
  pub total_pnl: Decimal,
  pub created_at: Option<String>
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishRequest {
  pub strategy_id: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  pub is_public: bool
}

#[derive(Debug, Clone, Serialize)]
pub struct VisibilityRequest {
  pub is_public: bool
}

/* AI chat */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
  User,
  Assistant,
  System
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
  pub role: ChatRole,
  pub content: String
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub strategy_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub current_code: Option<String>,
  pub history: Vec<ChatTurn>
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct ChatResponse {
  #[serde(alias = "response")]
  pub message: String,
  pub code: Option<String>
}

/* Backtesting */
#[derive(Debug, Clone, Serialize)]
pub struct BacktestRequest {
  pub strategy_id: String,
  pub symbol: String,
  pub interval: String,
  pub start_date: String,
  pub end_date: String,
  #[serde(with = "rust_decimal::serde::float")]
  pub initial_capital: Decimal
}

#[derive(Debug, Clone, Serialize)]
pub struct QuickBacktestRequest {
  pub code: String,
  pub symbol: String,
  pub interval: String,
  pub days: u32
}

#[derive(Debug, Clone, Deserialize)]
pub struct BacktestRunResponse {
  pub job_id: String,
  #[serde(default)]
  pub status: Option<String>
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct EquityPoint {
  pub timestamp: String,
  pub equity: f64
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct BacktestResult {
  pub total_return: f64,
  pub sharpe_ratio: Option<f64>,
  pub max_drawdown: Option<f64>,
  pub total_trades: u64,
  pub win_rate: f64,
  pub final_capital: Option<f64>,
  pub equity_curve: Vec<EquityPoint>
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestJob {
  pub job_id: String,
  pub strategy_id: Option<String>,
  pub status: String,
  pub progress: f64,
  pub error: Option<String>,
  pub created_at: Option<String>
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestHistoryItem {
  pub id: String,
  pub strategy_id: Option<String>,
  pub symbol: Option<String>,
  pub status: Option<String>,
  pub total_return: f64,
  pub total_trades: u64,
  pub win_rate: f64,
  pub created_at: Option<String>
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct BacktestProgress {
  pub job_id: String,
  pub progress: f64,
  pub status: String,
  pub message: Option<String>,
  pub result: Option<BacktestResult>
}

/* Market data */
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Candle {
  #[serde(alias = "time", alias = "date")]
  pub timestamp: String,
  pub open: f64,
  pub high: f64,
  pub low: f64,
  pub close: f64,
  pub volume: f64
}

#[derive(Debug, Clone, Serialize)]
pub struct OhlcQuery {
  pub symbol: String,
  pub interval: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub from: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub to: Option<String>
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OhlcResponse {
  pub symbol: String,
  pub interval: String,
  #[serde(alias = "candles")]
  pub data: Vec<Candle>
}

#[cfg(test)]
mod tests {
  use super::*;
  use rust_decimal_macros::dec;

  #[test]
  fn order_request_serializes_prices_as_numbers() {
    let req = OrderRequest {
      symbol: "INFY".to_string(),
      exchange: "NSE".to_string(),
      side: OrderSide::Buy,
      order_type: OrderType::StopLoss,
      quantity: 10,
      product: "MIS".to_string(),
      price: Some(dec!(1500.5)),
      trigger_price: Some(dec!(1499)),
      strategy_id: None
    };
    let json = serde_json::to_value(&req).unwrap();
    assert_eq!(json["order_type"], "SL");
    assert_eq!(json["side"], "BUY");
    assert_eq!(json["price"], 1500.5);
    assert!(json.get("strategy_id").is_none());
  }

  #[test]
  fn order_request_validation() {
    let mut req = OrderRequest {
      symbol: "TCS".to_string(),
      exchange: "NSE".to_string(),
      side: OrderSide::Sell,
      order_type: OrderType::Limit,
      quantity: 1,
      product: "CNC".to_string(),
      price: None,
      trigger_price: None,
      strategy_id: None
    };
    assert!(req.validate().is_err());
    req.price = Some(dec!(3200));
    assert!(req.validate().is_ok());
    req.quantity = 0;
    assert_eq!(req.validate(), Err("Quantity must be greater than zero".to_string()));
  }

  #[test]
  fn strategy_tolerates_partial_payloads() {
    let s: Strategy = serde_json::from_str(r#"{"id": "s1", "name": "Momentum", "status": "paused", "total_pnl": 125.5}"#).unwrap();
    assert_eq!(s.status, StrategyStatus::Paused);
    assert_eq!(s.total_pnl, dec!(125.5));
    assert_eq!(s.status.available_actions(), &[StrategyAction::Resume, StrategyAction::Stop]);
    assert!(s.code.is_none());
  }
}
