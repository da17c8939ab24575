//! Ports - 抽象化レイヤー
//!
//! 外部コラボレータへのインターフェースを定義します。
//! このクレートが外に出すポートは Transport（実際の通信）だけです。

pub mod transport;

// 主要な trait を再エクスポート
pub use self::transport::{Transport, TransportRequest};
