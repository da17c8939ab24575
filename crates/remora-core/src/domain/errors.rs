//! Errors - エラー型と分類
//!
//! - `ClientError`: 呼び出しの準備（引数変換・メソッド解決など）で起きるエラー。
//!   invocation の境界で exception チャネルに変換される
//! - `TransportError`: 通信層のエラー。error チャネルで配送される

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no remote method '{method}' on {class}")]
    UnknownMethod { class: String, method: String },

    #[error("named arguments for '{method}' must be supplied as a single map")]
    NamedArgsNotMap { method: String },

    #[error("cannot convert {value:?} to {type_name}")]
    InvalidNumber { value: String, type_name: String },

    #[error("invalid bindings: {0}")]
    Bindings(#[source] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(#[source] serde_json::Error),

    #[error("json encode: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// TransportErrorKind は通信エラーの分類
///
/// - Network: 接続できない・タイムアウトなど
/// - Protocol: サーバが想定外の応答を返した
/// - Decode: レスポンス本文を解釈できない
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Network,
    Protocol,
    Decode,
}

/// TransportError は error チャネルのペイロード
///
/// Deferred に格納するため `Clone` を実装しています（source は文字列化して保持）。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport error (kind: {kind:?}): {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Network, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Protocol, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Decode, message)
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_display_includes_kind() {
        let e = TransportError::network("connection refused");
        let msg = e.to_string();
        assert!(msg.contains("Network"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn client_error_messages_name_the_method() {
        let e = ClientError::UnknownMethod {
            class: "a.B".into(),
            method: "frob".into(),
        };
        assert_eq!(e.to_string(), "no remote method 'frob' on a.B");
    }
}
