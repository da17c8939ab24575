//! Impls - 実装（開発用・テスト用）
//!
//! このモジュールには ports の実装を含めます。
//!
//! # 含まれる実装
//! - **LoopbackTransport**: プロセス内でサーバを代行する Transport
//!
//! 本物の HTTP Transport はこのクレートの外で `Transport` を実装します。

pub mod loopback;

// 主要な型を再エクスポート
pub use self::loopback::{DeliveryMode, LoopbackTransport, Reply};
