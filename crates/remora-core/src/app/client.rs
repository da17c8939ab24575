//! Client / ClientBuilder - 型レジストリ・Transport・既定ハンドラのワイヤリング
//!
//! # 学習ポイント
//! - Builder パターン（`mut self -> Self`）
//! - 起動時検証（Fail-fast）: 期待した型がバインディングに無ければ build で失敗
//! - グローバルな名前空間の代わりに、Client が TypeRegistry を持って注入する

use std::cell::{Ref, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, error};

use super::invocation::{BoundMethod, Invocation, Receiver, Target};
use crate::config::ClientConfig;
use crate::domain::{ClientError, RemoteException, RemoteObject, TransportError, TypeDescriptor, Value};
use crate::ports::Transport;
use crate::types::{TypeRegistry, ValueCodec};

pub(crate) type ExceptionHandler = Rc<dyn Fn(&RemoteException)>;
pub(crate) type ErrorHandler = Rc<dyn Fn(&TransportError)>;

/// ハンドラ未登録の invocation が使うフォールバック
#[derive(Clone)]
pub(crate) struct DefaultHandlers {
    pub(crate) exception: ExceptionHandler,
    pub(crate) error: ErrorHandler,
}

impl Default for DefaultHandlers {
    fn default() -> Self {
        Self {
            exception: Rc::new(|e: &RemoteException| {
                error!(class = e.class().unwrap_or("<untyped>"), message = e.message().unwrap_or(""), "unhandled remote exception");
            }),
            error: Rc::new(|e: &TransportError| {
                error!(kind = ?e.kind(), message = e.message(), "unhandled transport error");
            }),
        }
    }
}

struct ClientInner {
    config: ClientConfig,
    registry: RefCell<TypeRegistry>,
    transport: Rc<dyn Transport>,
    defaults: DefaultHandlers,
}

/// Client は 1 つのサーバ側アプリケーションへの入口
///
/// clone は同じ実体を指します。
#[derive(Clone)]
pub struct Client {
    inner: Rc<ClientInner>,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// 借用中に `register_type` を呼ぶと panic するので短く使う
    pub fn registry(&self) -> Ref<'_, TypeRegistry> {
        self.inner.registry.borrow()
    }

    pub fn register_type(&self, descriptor: TypeDescriptor) {
        self.inner.registry.borrow_mut().register_type(descriptor);
    }

    pub fn load_bindings(&self, json: &str) -> Result<usize, ClientError> {
        self.inner.registry.borrow_mut().load_bindings(json)
    }

    pub fn transport(&self) -> Rc<dyn Transport> {
        self.inner.transport.clone()
    }

    /// 未保存の新しいインスタンスをローカルに作る
    pub fn instantiate(&self, class: impl Into<String>, properties: BTreeMap<String, Value>) -> RemoteObject {
        let class = class.into();
        let descriptor = self.registry().type_descriptor(&class);
        if descriptor.is_none() {
            debug!(class = %class, "instantiating unregistered type");
        }
        RemoteObject::new(class, properties, descriptor)
    }

    /// static メソッドの呼び出しを組み立てる（`go()` するまで送らない）
    pub fn invoke_static(&self, class: impl Into<String>, method: impl Into<String>, arguments: Vec<Value>) -> Invocation {
        Invocation::new(self, class, Target::Static, method, arguments)
    }

    /// static メソッドを切り離して持ち回せる形で返す
    pub fn static_method(&self, class: impl Into<String>, method: impl Into<String>) -> BoundMethod {
        BoundMethod::new(self, Receiver::Static(class.into()), method)
    }

    /// `object` のリモートメソッドを呼ぶ Invocation
    ///
    /// 引数なしのアクセサ（`getX` / `isX`）は lazy 戦略になる。
    pub fn remote(&self, object: &RemoteObject, method: impl Into<String>, arguments: Vec<Value>) -> Invocation {
        let method = method.into();
        let accessor = self
            .registry()
            .resolve_method(object.class(), &method, false)
            .and_then(|m| m.accessor_property());
        match accessor {
            Some(property) if arguments.is_empty() => Invocation::lazy(self, object, method, property),
            _ => Invocation::new(self, object.class(), Target::Instance(object.clone()), method, arguments),
        }
    }

    pub fn method(&self, object: &RemoteObject, name: impl Into<String>) -> BoundMethod {
        BoundMethod::new(self, Receiver::Instance(object.clone()), name)
    }

    /// ワイヤ JSON を revive する
    pub fn decode(&self, wire: &serde_json::Value) -> Value {
        let registry = self.registry();
        ValueCodec::new(&registry).from_wire(wire)
    }

    pub fn encode(&self, value: &Value, declared: Option<&str>) -> Result<serde_json::Value, ClientError> {
        let registry = self.registry();
        ValueCodec::new(&registry).to_wire(value, declared)
    }

    pub(crate) fn default_exception_handler(&self) -> ExceptionHandler {
        self.inner.defaults.exception.clone()
    }

    pub(crate) fn default_error_handler(&self) -> ErrorHandler {
        self.inner.defaults.error.clone()
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .field("types", &self.registry().registered_types().len())
            .finish()
    }
}

/// BuildError は Client 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no transport configured")]
    MissingTransport,

    #[error("Missing types: {0:?}. These types were expected but not registered.")]
    MissingTypes(Vec<String>),
}

/// ClientBuilder は Client を構築
///
/// # 使用例
/// ```ignore
/// let client = Client::builder()
///     .config(ClientConfig::new("/mwanzia", "bank"))
///     .transport(Rc::new(LoopbackTransport::new()))
///     .bindings(include_str!("bank.json"))?
///     .expect_types(&["com.example.bank.Branch"])
///     .default_exception_handler(|e| eprintln!("{e}"))
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - expect_types() で期待する型を登録
/// - build() 時に「期待集合 ⊆ 登録済み集合」をチェック
pub struct ClientBuilder {
    config: ClientConfig,
    registry: TypeRegistry,
    transport: Option<Rc<dyn Transport>>,
    defaults: DefaultHandlers,
    expected_types: Option<Vec<String>>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            registry: TypeRegistry::new(),
            transport: None,
            defaults: DefaultHandlers::default(),
            expected_types: None,
        }
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn transport<T: Transport + 'static>(mut self, transport: Rc<T>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn register_type(mut self, descriptor: TypeDescriptor) -> Self {
        self.registry.register_type(descriptor);
        self
    }

    /// JSON バインディングを読み込む
    pub fn bindings(mut self, json: &str) -> Result<Self, ClientError> {
        let count = self.registry.load_bindings(json)?;
        debug!(count, "loaded bindings");
        Ok(self)
    }

    /// 既定の exception ハンドラ（未設定なら error ログを出すだけ）
    pub fn default_exception_handler(mut self, handler: impl Fn(&RemoteException) + 'static) -> Self {
        self.defaults.exception = Rc::new(handler);
        self
    }

    pub fn default_error_handler(mut self, handler: impl Fn(&TransportError) + 'static) -> Self {
        self.defaults.error = Rc::new(handler);
        self
    }

    pub fn expect_types(mut self, types: &[&str]) -> Self {
        self.expected_types = Some(types.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn build(self) -> Result<Client, BuildError> {
        let transport = self.transport.ok_or(BuildError::MissingTransport)?;
        if let Some(expected) = &self.expected_types {
            let registered = self.registry.registered_types();
            let missing: Vec<String> = expected
                .iter()
                .filter(|t| !registered.contains(t))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingTypes(missing));
            }
        }
        Ok(Client {
            inner: Rc::new(ClientInner {
                config: self.config,
                registry: RefCell::new(self.registry),
                transport,
                defaults: self.defaults,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::LoopbackTransport;

    #[test]
    fn build_requires_a_transport() {
        assert!(matches!(ClientBuilder::new().build(), Err(BuildError::MissingTransport)));
    }

    #[test]
    fn build_missing_types() {
        let result = ClientBuilder::new()
            .transport(Rc::new(LoopbackTransport::new()))
            .register_type(TypeDescriptor::new("com.example.bank.Branch"))
            .expect_types(&["com.example.bank.Branch", "com.example.bank.Account"])
            .build();
        assert!(matches!(
            result,
            Err(BuildError::MissingTypes(missing)) if missing == vec!["com.example.bank.Account".to_string()]
        ));
    }

    #[test]
    fn build_with_bindings() {
        let client = ClientBuilder::new()
            .transport(Rc::new(LoopbackTransport::new()))
            .bindings(r#"{"types": [{"name": "com.example.bank.Branch"}]}"#)
            .unwrap()
            .expect_types(&["com.example.bank.Branch"])
            .build()
            .unwrap();
        assert_eq!(client.config().endpoint, "/mwanzia");
        assert!(client.registry().is_remote_type("com.example.bank.Branch"));
    }

    #[test]
    fn instantiate_attaches_descriptor_when_registered() {
        let client = ClientBuilder::new()
            .transport(Rc::new(LoopbackTransport::new()))
            .register_type(TypeDescriptor::new("a.Known"))
            .build()
            .unwrap();
        assert!(client.instantiate("a.Known", BTreeMap::new()).descriptor().is_some());
        assert!(client.instantiate("a.Unknown", BTreeMap::new()).descriptor().is_none());
    }
}
