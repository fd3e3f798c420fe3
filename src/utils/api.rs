use dioxus::logger::tracing::{info, warn};
use reqwest::{Method, RequestBuilder, Url};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;

use super::{
  models::{
    BacktestRequest, BacktestResult, BacktestRunResponse, BrokerCredential, BrokerCredentialRequest,
    ChatRequest, ChatResponse, MarketplaceListing, OAuthInitiateResponse, OAuthStatusResponse, OhlcQuery, OhlcResponse, Order,
    OrderModifyRequest, OrderRequest, PublishRequest, QuickBacktestRequest, Strategy, StrategyAction, StrategyRequest, StrategyUpdate,
    ValidateCodeRequest, ValidateCodeResponse, VisibilityRequest, VisualBuilderResponse
  },
  server::{AppError, AuthResponse, LoginRequest, MessageResponse, RegisterRequest},
  session::Session
};

pub const DEVICE_ID_HEADER: &str = "X-Device-ID";

/// Typed wrappers over the backend REST surface. Every call takes the
/// current [`Session`] explicitly; nothing is read from globals.
#[derive(Debug, Clone)]
pub struct ApiClient {
  client: reqwest::Client,
  base_url: String
}

impl PartialEq for ApiClient {
  fn eq(&self, other: &Self) -> bool {
    self.base_url == other.base_url
  }
}

impl ApiClient {
  pub fn new(client: reqwest::Client, base_url: &str) -> Self {
    Self { client, base_url: base_url.trim_end_matches('/').to_string() }
  }

  /// Joins `segments` onto the base url, percent-encoding each one so an id
  /// can never add or escape a path level.
  pub fn url(&self, segments: &[&str]) -> Result<Url, AppError> {
    let mut url = Url::parse(&self.base_url)
      .map_err(|e| AppError::ConfigError(format!("invalid api base url {}: {}", self.base_url, e)))?;
    url.path_segments_mut()
      .map_err(|_| AppError::ConfigError(format!("api base url {} cannot take a path", self.base_url)))?
      .pop_if_empty()
      .extend(segments);
    Ok(url)
  }

  fn request(&self, session: &Session, method: Method, segments: &[&str]) -> Result<RequestBuilder, AppError> {
    let mut req = self.client.request(method, self.url(segments)?).header(DEVICE_ID_HEADER, session.device_id());
    if let Some(token) = session.token() {
      req = req.bearer_auth(token);
    }
    Ok(req)
  }

  async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, AppError> {
    let resp = req.send().await.map_err(|e| AppError::NetworkError(e.to_string()))?;
    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      let err = AppError::from_response(status.as_u16(), &body);
      warn!("request failed: {}", err);
      return Err(err);
    }
    resp.json::<T>().await.map_err(|e| AppError::DeserializeError(e.to_string()))
  }

  async fn send_empty(&self, req: RequestBuilder) -> Result<(), AppError> {
    let resp = req.send().await.map_err(|e| AppError::NetworkError(e.to_string()))?;
    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      let err = AppError::from_response(status.as_u16(), &body);
      warn!("request failed: {}", err);
      return Err(err);
    }
    Ok(())
  }

  async fn get<T: DeserializeOwned>(&self, session: &Session, segments: &[&str]) -> Result<T, AppError> {
    self.send(self.request(session, Method::GET, segments)?).await
  }

  async fn post<B: Serialize, T: DeserializeOwned>(&self, session: &Session, segments: &[&str], body: &B) -> Result<T, AppError> {
    self.send(self.request(session, Method::POST, segments)?.json(body)).await
  }

  async fn put<B: Serialize, T: DeserializeOwned>(&self, session: &Session, segments: &[&str], body: &B) -> Result<T, AppError> {
    self.send(self.request(session, Method::PUT, segments)?.json(body)).await
  }

  async fn delete(&self, session: &Session, segments: &[&str]) -> Result<(), AppError> {
    self.send_empty(self.request(session, Method::DELETE, segments)?).await
  }

  /* Auth */
  pub async fn login(&self, session: &Session, id_token: &str) -> Result<AuthResponse, AppError> {
    let body = LoginRequest { id_token: id_token.to_string(), device_id: session.device_id().to_string() };
    let resp: AuthResponse = self.post(session, &["api", "auth", "login"], &body).await?;
    info!("backend login succeeded");
    Ok(resp)
  }

  pub async fn register(&self, session: &Session, id_token: &str, email: &str, full_name: Option<String>) -> Result<AuthResponse, AppError> {
    let body = RegisterRequest {
      id_token: id_token.to_string(),
      device_id: session.device_id().to_string(),
      email: email.to_string(),
      full_name
    };
    self.post(session, &["api", "auth", "register"], &body).await
  }

  /* Strategies */
  pub async fn list_strategies(&self, session: &Session) -> Result<Vec<Strategy>, AppError> {
    self.get(session, &["api", "strategies"]).await
  }

  pub async fn get_strategy(&self, session: &Session, id: &str) -> Result<Strategy, AppError> {
    self.get(session, &["api", "strategies", id]).await
  }

  pub async fn create_strategy(&self, session: &Session, req: &StrategyRequest) -> Result<Strategy, AppError> {
    self.post(session, &["api", "strategies"], req).await
  }

  pub async fn update_strategy(&self, session: &Session, id: &str, update: &StrategyUpdate) -> Result<Strategy, AppError> {
    self.put(session, &["api", "strategies", id], update).await
  }

  pub async fn delete_strategy(&self, session: &Session, id: &str) -> Result<(), AppError> {
    self.delete(session, &["api", "strategies", id]).await
  }

  pub async fn strategy_action(&self, session: &Session, id: &str, action: StrategyAction) -> Result<MessageResponse, AppError> {
    info!("requesting {} for strategy {}", action.path_segment(), id);
    self.post(session, &["api", "strategies", id, action.path_segment()], &json!({})).await
  }

  pub async fn validate_code(&self, session: &Session, code: &str) -> Result<ValidateCodeResponse, AppError> {
    self.post(session, &["api", "strategies", "validate-code"], &ValidateCodeRequest { code: code.to_string() }).await
  }

  pub async fn get_visual_builder(&self, session: &Session, id: &str) -> Result<VisualBuilderResponse, AppError> {
    self.get(session, &["api", "strategies", id, "visual-builder"]).await
  }

  pub async fn put_visual_builder<F: Serialize>(&self, session: &Session, id: &str, flow: &F) -> Result<VisualBuilderResponse, AppError> {
    self.put(session, &["api", "strategies", id, "visual-builder"], &json!({ "flow": flow })).await
  }

  /* Orders */
  pub async fn list_orders(&self, session: &Session, strategy_id: Option<&str>) -> Result<Vec<Order>, AppError> {
    let mut req = self.request(session, Method::GET, &["api", "orders"])?;
    if let Some(id) = strategy_id {
      req = req.query(&[("strategy_id", id)]);
    }
    self.send(req).await
  }

  pub async fn get_order(&self, session: &Session, id: &str) -> Result<Order, AppError> {
    self.get(session, &["api", "orders", id]).await
  }

  pub async fn place_order(&self, session: &Session, req: &OrderRequest) -> Result<Order, AppError> {
    req.validate().map_err(AppError::ValidationError)?;
    self.post(session, &["api", "orders"], req).await
  }

  pub async fn modify_order(&self, session: &Session, id: &str, req: &OrderModifyRequest) -> Result<Order, AppError> {
    self.put(session, &["api", "orders", id], req).await
  }

  pub async fn cancel_order(&self, session: &Session, id: &str) -> Result<(), AppError> {
    self.delete(session, &["api", "orders", id]).await
  }

  /* Broker credentials */
  pub async fn list_broker_credentials(&self, session: &Session) -> Result<Vec<BrokerCredential>, AppError> {
    self.get(session, &["api", "broker-credentials"]).await
  }

  pub async fn add_broker_credential(&self, session: &Session, req: &BrokerCredentialRequest) -> Result<BrokerCredential, AppError> {
    self.post(session, &["api", "broker-credentials"], req).await
  }

  pub async fn update_broker_credential(&self, session: &Session, id: &str, req: &BrokerCredentialRequest) -> Result<BrokerCredential, AppError> {
    self.put(session, &["api", "broker-credentials", id], req).await
  }

  pub async fn delete_broker_credential(&self, session: &Session, id: &str) -> Result<(), AppError> {
    self.delete(session, &["api", "broker-credentials", id]).await
  }

  pub async fn zerodha_oauth_initiate(&self, session: &Session) -> Result<OAuthInitiateResponse, AppError> {
    self.get(session, &["api", "zerodha", "oauth", "initiate"]).await
  }

  pub async fn zerodha_oauth_status(&self, session: &Session) -> Result<OAuthStatusResponse, AppError> {
    self.get(session, &["api", "zerodha", "oauth", "status"]).await
  }

  /* Marketplace */
  pub async fn list_marketplace(&self, session: &Session) -> Result<Vec<MarketplaceListing>, AppError> {
    self.get(session, &["api", "marketplace", "strategies"]).await
  }

  pub async fn my_listings(&self, session: &Session) -> Result<Vec<MarketplaceListing>, AppError> {
    self.get(session, &["api", "marketplace", "my-strategies"]).await
  }

  pub async fn publish_strategy(&self, session: &Session, req: &PublishRequest) -> Result<MarketplaceListing, AppError> {
    self.post(session, &["api", "marketplace", "publish"], req).await
  }

  pub async fn set_listing_visibility(&self, session: &Session, listing_id: &str, is_public: bool) -> Result<MarketplaceListing, AppError> {
    let req = self.request(session, Method::PATCH, &["api", "marketplace", listing_id, "visibility"])?
      .json(&VisibilityRequest { is_public });
    self.send(req).await
  }

  pub async fn unpublish(&self, session: &Session, listing_id: &str) -> Result<(), AppError> {
    self.delete(session, &["api", "marketplace", listing_id]).await
  }

  /* AI */
  pub async fn chat(&self, session: &Session, req: &ChatRequest) -> Result<ChatResponse, AppError> {
    self.post(session, &["api", "ai", "chat"], req).await
  }

  /* Backtesting */
  pub async fn run_backtest(&self, session: &Session, req: &BacktestRequest) -> Result<BacktestRunResponse, AppError> {
    let resp: BacktestRunResponse = self.post(session, &["api", "backtesting", "run"], req).await?;
    info!("backtest job {} queued", resp.job_id);
    Ok(resp)
  }

  pub async fn quick_backtest(&self, session: &Session, req: &QuickBacktestRequest) -> Result<BacktestResult, AppError> {
    self.post(session, &["api", "backtesting", "quick"], req).await
  }

  /* Market data */
  pub async fn ohlc(&self, session: &Session, query: &OhlcQuery) -> Result<OhlcResponse, AppError> {
    self.send(self.request(session, Method::GET, &["api", "market-data", "ohlc"])?.query(query)).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn requests_carry_bearer_and_device_headers() {
    let api = ApiClient::new(reqwest::Client::new(), "http://localhost:8000/");
    let session = Session::new(Some("tok-9".to_string()), "device-1");
    let req = api.request(&session, Method::GET, &["api", "strategies"]).unwrap().build().unwrap();

    assert_eq!(req.url().as_str(), "http://localhost:8000/api/strategies");
    assert_eq!(req.headers().get("authorization").unwrap(), "Bearer tok-9");
    assert_eq!(req.headers().get(DEVICE_ID_HEADER).unwrap(), "device-1");
  }

  #[test]
  fn anonymous_requests_have_no_authorization() {
    let api = ApiClient::new(reqwest::Client::new(), "http://localhost:8000");
    let session = Session::new(None, "device-1");
    let req = api.request(&session, Method::POST, &["api", "auth", "login"]).unwrap().build().unwrap();
    assert!(req.headers().get("authorization").is_none());
  }

  #[test]
  fn ids_are_encoded_as_single_segments() {
    let api = ApiClient::new(reqwest::Client::new(), "http://localhost:8000");
    let url = api.url(&["api", "orders", "o/1?x#y"]).unwrap();
    assert_eq!(url.as_str(), "http://localhost:8000/api/orders/o%2F1%3Fx%23y");
  }

  #[test]
  fn base_path_prefix_is_kept() {
    let api = ApiClient::new(reqwest::Client::new(), "https://example.com/backend/");
    let url = api.url(&["api", "strategies", "s 1", "visual-builder"]).unwrap();
    assert_eq!(url.as_str(), "https://example.com/backend/api/strategies/s%201/visual-builder");
  }
}
