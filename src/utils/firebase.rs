use dioxus::logger::tracing::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{config::FirebaseConfig, server::AppError};

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
  email: &'a str,
  password: &'a str,
  return_secure_token: bool
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OobCodeRequest<'a> {
  request_type: &'static str,
  email: &'a str
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirebaseUser {
  pub id_token: String,
  #[serde(default)]
  pub refresh_token: Option<String>,
  pub local_id: String,
  #[serde(default)]
  pub email: Option<String>,
  #[serde(default)]
  pub expires_in: Option<String>
}

/// Email/password flows against the Identity Toolkit REST API.
#[derive(Debug, Clone)]
pub struct FirebaseAuth {
  client: reqwest::Client,
  config: FirebaseConfig
}

impl FirebaseAuth {
  pub fn new(client: reqwest::Client, config: FirebaseConfig) -> Self {
    Self { client, config }
  }

  fn endpoint(&self, action: &str) -> Result<String, AppError> {
    let key = self.config.require_api_key()?;
    Ok(format!("{}/accounts:{}?key={}", IDENTITY_TOOLKIT_URL, action, key))
  }

  pub async fn sign_in(&self, email: &str, password: &str) -> Result<FirebaseUser, AppError> {
    let body = PasswordRequest { email, password, return_secure_token: true };
    self.call(&self.endpoint("signInWithPassword")?, &body).await
  }

  pub async fn sign_up(&self, email: &str, password: &str) -> Result<FirebaseUser, AppError> {
    let body = PasswordRequest { email, password, return_secure_token: true };
    self.call(&self.endpoint("signUp")?, &body).await
  }

  pub async fn send_password_reset(&self, email: &str) -> Result<(), AppError> {
    let body = OobCodeRequest { request_type: "PASSWORD_RESET", email };
    let _: Value = self.call(&self.endpoint("sendOobCode")?, &body).await?;
    Ok(())
  }

  async fn call<B: Serialize, T: serde::de::DeserializeOwned>(&self, url: &str, body: &B) -> Result<T, AppError> {
    let resp = self.client.post(url).json(body).send().await.map_err(|e| AppError::NetworkError(e.to_string()))?;
    if !resp.status().is_success() {
      let text = resp.text().await.unwrap_or_default();
      let code = error_code(&text);
      warn!("firebase call failed with {}", code);
      return Err(AppError::FirebaseError(friendly_message(&code).to_string()));
    }
    resp.json::<T>().await.map_err(|e| AppError::DeserializeError(e.to_string()))
  }
}

/// `{"error": {"message": "INVALID_PASSWORD : extra"}}` -> `INVALID_PASSWORD`
fn error_code(body: &str) -> String {
  serde_json::from_str::<Value>(body).ok()
    .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(str::to_string))
    .map(|msg| msg.split(':').next().unwrap_or_default().trim().to_string())
    .unwrap_or_else(|| "UNKNOWN".to_string())
}

fn friendly_message(code: &str) -> &'static str {
  match code {
    "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => "Invalid email or password.",
    "USER_DISABLED" => "This account has been disabled.",
    "EMAIL_EXISTS" => "An account with this email already exists.",
    "WEAK_PASSWORD" => "Password should be at least 6 characters.",
    "INVALID_EMAIL" => "Please enter a valid email address.",
    "TOO_MANY_ATTEMPTS_TRY_LATER" => "Too many attempts. Please try again later.",
    _ => "Authentication failed. Please try again."
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn error_codes_are_mapped() {
    let body = r#"{"error": {"code": 400, "message": "WEAK_PASSWORD : Password should be at least 6 characters"}}"#;
    assert_eq!(error_code(body), "WEAK_PASSWORD");
    assert_eq!(friendly_message(&error_code(body)), "Password should be at least 6 characters.");
    assert_eq!(error_code("<html>"), "UNKNOWN");
  }

  #[test]
  fn missing_key_fails_before_any_request() {
    let auth = FirebaseAuth::new(reqwest::Client::new(), FirebaseConfig {
      api_key: String::new(),
      auth_domain: String::new(),
      project_id: String::new(),
      storage_bucket: String::new(),
      messaging_sender_id: String::new(),
      app_id: String::new()
    });
    assert!(matches!(auth.endpoint("signUp"), Err(AppError::ConfigError(_))));
  }
}
