//! remora-core
//!
//! サーバ側オブジェクトのメソッドを、ローカルのオブジェクトのように
//! 呼び出すためのクライアント側リモーティング層です。結果は非同期に
//! success / exception / error のいずれか 1 つとして届きます。
//!
//! # モジュール構成
//! - **domain**: 値・RemoteObject・Reference・型メタデータ・例外・エラー
//! - **types**: TypeRegistry、ValueCodec（エンコードと 2 フェーズ revive）、ISO-8601 日付
//! - **app**: Client / ClientBuilder、Invocation、Deferred、ValidationContext、Form
//! - **ports**: Transport（実際の通信はクレートの外）
//! - **impls**: LoopbackTransport（開発・テスト用）
//! - **protocol**: ワイヤ上の型タグ、CallDescriptor、レスポンスエンベロープ
//! - **config**: ClientConfig
//!
//! # 並行性
//! シングルスレッド前提です（`Rc` / `RefCell`）。待ち合わせは Transport の
//! 完了だけで、変換・検証・revive はすべて同期的に終わります。

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod protocol;
pub mod types;

// 主要な型を再エクスポート
pub use self::app::{
    BoundMethod, BuildError, Client, ClientBuilder, Completion, Deferred, Form, FormCallbacks, Invocation,
    Outcome, SubmitState, Target, ValidationContext,
};
pub use self::config::ClientConfig;
pub use self::domain::{
    ClientError, ExceptionHandlers, MethodDescriptor, ObjectKey, ParameterDescriptor, Reference, RemoteException,
    RemoteObject, RuleConfig, TransportError, TransportErrorKind, TypeDescriptor, ValidationError, Value,
};
pub use self::ports::{Transport, TransportRequest};
pub use self::types::{TypeRegistry, ValueCodec};

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::BTreeMap;
    use std::rc::Rc;

    use crate::app::{Client, ClientBuilder};
    use crate::config::ClientConfig;
    use crate::domain::{MethodDescriptor, ParameterDescriptor, RemoteObject, RuleConfig, TypeDescriptor, Value};
    use crate::impls::LoopbackTransport;

    pub(crate) const BRANCH: &str = "com.example.bank.Branch";
    pub(crate) const ACCOUNT: &str = "com.example.bank.Account";
    pub(crate) const CUSTOMER: &str = "com.example.bank.Customer";

    pub(crate) fn bank_types() -> Vec<TypeDescriptor> {
        vec![
            TypeDescriptor::new(BRANCH)
                .with_property("id", "java.lang.Long")
                .with_property("name", "java.lang.String")
                .with_property("accounts", "java.util.List")
                .with_transferable("name")
                .with_method(MethodDescriptor::instance("getAccounts"))
                .with_method(MethodDescriptor::instance("getName"))
                .with_method(MethodDescriptor::instance("close"))
                .with_method(
                    MethodDescriptor::instance("openAccount")
                        .with_param(
                            ParameterDescriptor::new("number", "java.lang.String")
                                .with_rule("Required", RuleConfig::new().with_error_code("required"))
                                .with_rule("Length", RuleConfig::new().with_min(5).with_error_code("length")),
                        )
                        .with_param(ParameterDescriptor::new("initialDeposit", "java.math.BigDecimal")),
                )
                .with_method(
                    MethodDescriptor::static_method("findByName")
                        .with_param(ParameterDescriptor::new("name", "java.lang.String")),
                ),
            TypeDescriptor::new(ACCOUNT)
                .with_property("id", "java.lang.Long")
                .with_property("number", "java.lang.String")
                .with_property("balance", "java.math.BigDecimal")
                .with_property("opened", "java.util.Date")
                .with_property("branch", BRANCH)
                .with_method(
                    MethodDescriptor::instance("deposit")
                        .with_param(ParameterDescriptor::new("amount", "java.math.BigDecimal")),
                ),
            TypeDescriptor::new(CUSTOMER)
                .completely_transferable()
                .with_property("id", "java.lang.Long")
                .with_property("name", "java.lang.String")
                .with_method(
                    MethodDescriptor::instance("rename").with_param(
                        ParameterDescriptor::new("name", "java.lang.String")
                            .with_rule("Required", RuleConfig::new()),
                    ),
                ),
        ]
    }

    pub(crate) fn bank_client_with(transport: LoopbackTransport) -> (Client, Rc<LoopbackTransport>) {
        let transport = Rc::new(transport);
        let client = bank_types()
            .into_iter()
            .fold(ClientBuilder::new(), |builder, t| builder.register_type(t))
            .config(ClientConfig::new("/mwanzia", "bank"))
            .transport(transport.clone())
            .build()
            .unwrap();
        (client, transport)
    }

    pub(crate) fn bank_client() -> Client {
        bank_client_with(LoopbackTransport::new()).0
    }

    pub(crate) fn empty_client() -> Client {
        ClientBuilder::new()
            .transport(Rc::new(LoopbackTransport::new()))
            .build()
            .unwrap()
    }

    pub(crate) fn branch(client: &Client, id: i64) -> RemoteObject {
        client.instantiate(
            BRANCH,
            BTreeMap::from([
                ("id".to_string(), Value::from(id)),
                ("name".to_string(), Value::from("Main")),
            ]),
        )
    }
}
