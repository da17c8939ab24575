//! ClientConfig - クライアント設定
//!
//! JSON ファイルから読み込めます。省略したフィールドは既定値になります。
//!
//! ```json
//! { "endpoint": "/mwanzia", "application": "bank", "validateArguments": true }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::ClientError;

pub const DEFAULT_ENDPOINT: &str = "/mwanzia";
pub const DEFAULT_APPLICATION: &str = "app";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// リクエストを送る URL
    pub endpoint: String,

    /// サーバ側アプリケーション名（`application` フォームフィールド）
    pub application: String,

    /// 送信前にクライアント側検証を行うか
    pub validate_arguments: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            application: DEFAULT_APPLICATION.to_string(),
            validate_arguments: true,
        }
    }
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>, application: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            application: application.into(),
            ..Self::default()
        }
    }

    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validate_arguments = enabled;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, ClientError> {
        serde_json::from_str(json).map_err(ClientError::Config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = ClientConfig::from_json_str(r#"{"application": "bank"}"#).unwrap();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.application, "bank");
        assert!(config.validate_arguments);
    }

    #[test]
    fn camel_case_keys() {
        let config = ClientConfig::from_json_str(r#"{"validateArguments": false}"#).unwrap();
        assert!(!config.validate_arguments);
    }

    #[test]
    fn bad_json_is_a_config_error() {
        assert!(matches!(
            ClientConfig::from_json_str(r#"{"endpoint": 1}"#),
            Err(ClientError::Config(_))
        ));
    }

    #[test]
    fn load_reports_missing_files() {
        assert!(matches!(
            ClientConfig::load("/nonexistent/remora.json"),
            Err(ClientError::Io(_))
        ));
    }
}
