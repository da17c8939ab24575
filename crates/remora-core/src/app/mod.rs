//! App - アプリケーション層
//!
//! domain / types / ports を組み合わせて、リモート呼び出しを実装します。
//!
//! # 主要コンポーネント
//! - **Client / ClientBuilder**: 型レジストリと Transport のワイヤリング
//! - **Invocation**: 1 回の呼び出しと success / exception / error の解決
//! - **Deferred**: 1 回だけ解決される結果スロット
//! - **ValidationContext**: 送信前のクライアント側検証
//! - **Form**: named args で送信するフォーム

pub mod client;
pub mod deferred;
pub mod forms;
pub mod invocation;
pub mod validation;

// 主要な型を再エクスポート
pub use self::client::{BuildError, Client, ClientBuilder};
pub use self::deferred::Deferred;
pub use self::forms::{Form, FormCallbacks, SubmitState};
pub use self::invocation::{BoundMethod, Completion, Invocation, InvocationStrategy, Outcome, Receiver, Target};
pub use self::validation::{validate_call, Rule, ValidationContext};
