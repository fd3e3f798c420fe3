use std::time::Duration;

use super::server::AppError;

const API_BASE_URL: &str = env!("API_BASE_URL");
const FIREBASE_API_KEY: &str = env!("FIREBASE_API_KEY");
const FIREBASE_AUTH_DOMAIN: &str = env!("FIREBASE_AUTH_DOMAIN");
const FIREBASE_PROJECT_ID: &str = env!("FIREBASE_PROJECT_ID");
const FIREBASE_STORAGE_BUCKET: &str = env!("FIREBASE_STORAGE_BUCKET");
const FIREBASE_MESSAGING_SENDER_ID: &str = env!("FIREBASE_MESSAGING_SENDER_ID");
const FIREBASE_APP_ID: &str = env!("FIREBASE_APP_ID");
const AUTOSAVE_DEBOUNCE_MS: &str = env!("AUTOSAVE_DEBOUNCE_MS");

const DEFAULT_AUTOSAVE_DEBOUNCE_MS: u64 = 1_500;

#[derive(Debug, Clone, PartialEq)]
pub struct FirebaseConfig {
  pub api_key: String,
  pub auth_domain: String,
  pub project_id: String,
  pub storage_bucket: String,
  pub messaging_sender_id: String,
  pub app_id: String
}

impl FirebaseConfig {
  pub fn require_api_key(&self) -> Result<&str, AppError> {
    if self.api_key.is_empty() {
      return Err(AppError::ConfigError("FIREBASE_API_KEY was not set at build time".to_string()));
    }
    Ok(&self.api_key)
  }
}

/// Settings baked in by build.rs.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
  pub api_base_url: String,
  pub firebase: FirebaseConfig,
  pub autosave_debounce: Duration
}

impl AppConfig {
  pub fn from_build_env() -> Self {
    Self {
      api_base_url: normalize_base_url(API_BASE_URL),
      firebase: FirebaseConfig {
        api_key: FIREBASE_API_KEY.to_string(),
        auth_domain: FIREBASE_AUTH_DOMAIN.to_string(),
        project_id: FIREBASE_PROJECT_ID.to_string(),
        storage_bucket: FIREBASE_STORAGE_BUCKET.to_string(),
        messaging_sender_id: FIREBASE_MESSAGING_SENDER_ID.to_string(),
        app_id: FIREBASE_APP_ID.to_string()
      },
      autosave_debounce: parse_debounce(AUTOSAVE_DEBOUNCE_MS)
    }
  }
}

fn normalize_base_url(raw: &str) -> String {
  raw.trim().trim_end_matches('/').to_string()
}

fn parse_debounce(raw: &str) -> Duration {
  Duration::from_millis(raw.trim().parse::<u64>().unwrap_or(DEFAULT_AUTOSAVE_DEBOUNCE_MS))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn base_url_loses_trailing_slashes() {
    assert_eq!(normalize_base_url(" https://api.example.com// "), "https://api.example.com");
  }

  #[test]
  fn debounce_falls_back_on_garbage() {
    assert_eq!(parse_debounce("800"), Duration::from_millis(800));
    assert_eq!(parse_debounce("soon"), Duration::from_millis(DEFAULT_AUTOSAVE_DEBOUNCE_MS));
  }

  #[test]
  fn missing_firebase_key_is_a_config_error() {
    let mut config = AppConfig::from_build_env();
    config.firebase.api_key.clear();
    assert!(matches!(config.firebase.require_api_key(), Err(AppError::ConfigError(_))));
  }
}
