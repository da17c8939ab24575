//! Types - 型メタデータと値の変換
//!
//! # 主要コンポーネント
//! - **TypeRegistry**: サーバ公開型・メソッドのメタデータ（ドット区切りの名前空間）
//! - **ValueCodec**: 宣言型に従ったエンコードと、2 フェーズの revive
//! - **iso8601**: ワイヤ上の日付表現

pub mod codec;
pub mod iso8601;
pub mod registry;

// 主要な型を再エクスポート
pub use self::codec::ValueCodec;
pub use self::registry::{Bindings, Entry, TypeRegistry};
