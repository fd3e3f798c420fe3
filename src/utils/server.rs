use std::fmt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/* Server Requests */
#[derive(Debug, Serialize)]
pub struct LoginRequest {
  pub id_token: String,
  pub device_id: String
}

#[derive(Debug, Serialize)]
pub struct RegisterRequest {
  pub id_token: String,
  pub device_id: String,
  pub email: String,
  pub full_name: Option<String>
}

/* Server Responses */
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct UserProfile {
  pub id: String,
  pub email: String,
  #[serde(default)]
  pub full_name: Option<String>
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
  pub access_token: String,
  #[serde(default)]
  pub token_type: Option<String>,
  #[serde(default)]
  pub user: Option<UserProfile>
}

#[derive(Debug, Deserialize)]
pub struct MessageResponse {
  #[serde(default)]
  pub message: Option<String>
}

// App Errors
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
  Unauthorized(String),
  ValidationError(String),
  BrokerNotConfigured(String),
  NotFound(String),
  ServerError { status: u16, detail: String },
  NetworkError(String),
  SerializeError(String),
  DeserializeError(String),
  StreamDecodeError(String),
  StreamTransportError(String),
  StorageError(String),
  FirebaseError(String),
  ConfigError(String),
  WasmError(String),
}

impl AppError {
  /// Classifies a non-2xx response. `body` is the raw response text, usually
  /// `{"detail": ...}` where detail is a string or a list of field errors.
  pub fn from_response(status: u16, body: &str) -> Self {
    let detail = extract_detail(body).unwrap_or_else(|| default_detail(status));

    match status {
      401 => AppError::Unauthorized(detail),
      404 if !is_missing_broker(&detail) => AppError::NotFound(detail),
      400..=499 => {
        if is_missing_broker(&detail) {
          AppError::BrokerNotConfigured(detail)
        } else {
          AppError::ValidationError(detail)
        }
      },
      _ => AppError::ServerError { status, detail }
    }
  }

  pub fn is_unauthorized(&self) -> bool {
    matches!(self, AppError::Unauthorized(_))
  }

  pub fn is_retryable(&self) -> bool {
    matches!(self, AppError::NetworkError(_) | AppError::ServerError { .. } | AppError::StreamTransportError(_))
  }

  /// Text shown to the user. Validation details are passed through verbatim.
  pub fn user_message(&self) -> String {
    match self {
      AppError::Unauthorized(_) => "Your session has expired. Please sign in again.".to_string(),
      AppError::ValidationError(detail) => detail.clone(),
      AppError::BrokerNotConfigured(_) => "No broker connection found. Configure your broker credentials to continue.".to_string(),
      AppError::NotFound(detail) => detail.clone(),
      AppError::ServerError { .. } => "The server could not complete the request. Please retry.".to_string(),
      AppError::NetworkError(_) => "Unable to reach the server. Check your connection and retry.".to_string(),
      AppError::FirebaseError(msg) => msg.clone(),
      AppError::StreamDecodeError(_) | AppError::StreamTransportError(_) => "Live updates are disconnected.".to_string(),
      other => other.to_string()
    }
  }
}

fn is_missing_broker(detail: &str) -> bool {
  let lowered = detail.to_lowercase();
  lowered.contains("credentials not found") || lowered.contains("broker not configured")
}

fn default_detail(status: u16) -> String {
  format!("request failed with status {}", status)
}

fn extract_detail(body: &str) -> Option<String> {
  let trimmed = body.trim();
  if trimmed.is_empty() {
    return None;
  }
  let value: Value = match serde_json::from_str(trimmed) {
    Ok(v) => v,
    Err(_) => return Some(trimmed.to_string())
  };
  let detail = value.get("detail").or_else(|| value.get("message")).or_else(|| value.get("error"))?;
  match detail {
    Value::String(s) => Some(s.clone()),
    // field errors: [{"loc": [...], "msg": "..."}]
    Value::Array(items) => {
      let msgs = items.iter()
        .filter_map(|item| item.get("msg").and_then(Value::as_str).or_else(|| item.as_str()))
        .collect::<Vec<_>>();
      if msgs.is_empty() { None } else { Some(msgs.join("; ")) }
    },
    Value::Object(map) => map.get("message").and_then(Value::as_str).map(str::to_string),
    other => Some(other.to_string())
  }
}

impl std::error::Error for AppError {}

impl fmt::Display for AppError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
      AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
      AppError::BrokerNotConfigured(msg) => write!(f, "Broker not configured: {}", msg),
      AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
      AppError::ServerError { status, detail } => write!(f, "Server error ({}): {}", status, detail),
      AppError::NetworkError(msg) => write!(f, "Network error: {}", msg),
      AppError::SerializeError(msg) => write!(f, "Serialize error: {}", msg),
      AppError::DeserializeError(msg) => write!(f, "Deserialize error: {}", msg),
      AppError::StreamDecodeError(msg) => write!(f, "Stream decode error: {}", msg),
      AppError::StreamTransportError(msg) => write!(f, "Stream transport error: {}", msg),
      AppError::StorageError(msg) => write!(f, "Storage error: {}", msg),
      AppError::FirebaseError(msg) => write!(f, "Firebase error: {}", msg),
      AppError::ConfigError(msg) => write!(f, "Config error: {}", msg),
      AppError::WasmError(msg) => write!(f, "Wasm error: {}", msg)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unauthorized_is_classified_first() {
    let err = AppError::from_response(401, r#"{"detail": "Token expired"}"#);
    assert_eq!(err, AppError::Unauthorized("Token expired".to_string()));
    assert!(err.is_unauthorized());
  }

  #[test]
  fn validation_detail_is_surfaced_verbatim() {
    let err = AppError::from_response(422, r#"{"detail": [{"loc": ["body", "name"], "msg": "field required"}, {"msg": "quantity must be positive"}]}"#);
    assert_eq!(err.user_message(), "field required; quantity must be positive");
  }

  #[test]
  fn missing_broker_credentials_get_their_own_variant() {
    let err = AppError::from_response(400, r#"{"detail": "Broker Credentials not found for user"}"#);
    assert!(matches!(err, AppError::BrokerNotConfigured(_)));

    let err = AppError::from_response(404, r#"{"detail": "credentials not found"}"#);
    assert!(matches!(err, AppError::BrokerNotConfigured(_)));
  }

  #[test]
  fn non_json_bodies_and_server_errors() {
    let err = AppError::from_response(502, "Bad Gateway");
    assert_eq!(err, AppError::ServerError { status: 502, detail: "Bad Gateway".to_string() });
    assert!(err.is_retryable());

    let err = AppError::from_response(404, "");
    assert_eq!(err, AppError::NotFound("request failed with status 404".to_string()));
    assert!(!err.is_retryable());
  }
}
