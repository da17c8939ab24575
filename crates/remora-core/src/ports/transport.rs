//! Transport port - 実際のリクエストを送る外部コラボレータ
//!
//! Transport は `TransportRequest` を受け取り、応答が得られたら
//! `Completion` を通じて invocation に結果を返します。
//!
//! # 契約
//! - `Completion` はちょうど 1 回使う（`respond` / `succeed` / `except` / `fail`）
//! - 使わずに drop すると error チャネル（kind: Protocol）で解決される
//! - 同期的に完了しても、後から（`flush` など）完了してもよい

use crate::app::Completion;
use crate::protocol::CallDescriptor;

/// ワイヤ上のリクエスト（`application` と `call` の 2 フィールドのフォーム）
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub endpoint: String,
    pub application: String,
    /// JSON 化した CallDescriptor
    pub call: String,
}

impl TransportRequest {
    pub fn new(endpoint: impl Into<String>, application: impl Into<String>, call: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            application: application.into(),
            call: call.into(),
        }
    }

    /// POST するフォームフィールド
    pub fn form_fields(&self) -> [(&'static str, &str); 2] {
        [("application", &self.application), ("call", &self.call)]
    }

    pub fn call_descriptor(&self) -> Result<CallDescriptor, serde_json::Error> {
        CallDescriptor::from_json(&self.call)
    }
}

/// Transport はリクエストを送り、結果を Completion に渡す
///
/// シングルスレッド前提なので `Send` / `Sync` は要求しません。
pub trait Transport {
    fn send(&self, request: TransportRequest, completion: Completion);
}
