//! Invocation - 1 回分のリモート呼び出しと、その 3 通りの結果
//!
//! # 流れ
//! 1. 組み立て: `success` / `exception` / `error` で callback を登録（順不同）
//! 2. `go()`: メソッド解決 → 引数変換 → target ペイロード → 検証 → Transport
//! 3. Transport が `Completion` で結果を返す → 対応する Deferred が 1 回だけ解決
//!
//! 呼び出し準備中のエラー（未知のメソッド、数値に変換できない文字列など）は
//! panic させず、exception チャネル（`org.mwanzia.MwanziaException`）で届けます。
//!
//! # Lazy 戦略
//! 引数なしの `getX` / `isX` は、呼び出し元オブジェクトのプロパティ `x` を
//! キャッシュとして使います。キャッシュがあれば Transport を使わずに
//! success を解決し、無ければ取得して callback より先にキャッシュします。

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::client::Client;
use super::deferred::Deferred;
use super::validation::validate_call;
use crate::domain::{
    ClientError, ExceptionHandlers, MethodDescriptor, Reference, RemoteException, RemoteObject, TransportError,
    ValidationError, Value,
};
use crate::ports::TransportRequest;
use crate::protocol::CallDescriptor;
use crate::types::ValueCodec;

/// 呼び出し対象
#[derive(Debug, Clone)]
pub enum Target {
    /// static メソッド（ワイヤ上の target は null）
    Static,
    Instance(RemoteObject),
    Reference(Reference),
}

/// 構築時に選ぶ呼び出し戦略
#[derive(Debug, Clone)]
pub enum InvocationStrategy {
    Direct,
    /// `origin` のプロパティ `property` をキャッシュにする
    Lazy { origin: RemoteObject, property: String },
}

/// `outcome()` の結果
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Value),
    Exception(RemoteException),
    Error(TransportError),
}

struct InvocationState {
    client: Client,
    target_class: String,
    target: Target,
    method: String,
    arguments: Vec<Value>,
    strategy: InvocationStrategy,
    named_args: Cell<bool>,
    dispatched: Cell<bool>,
    success: Deferred<Value>,
    exception: Deferred<RemoteException>,
    error: Deferred<TransportError>,
}

impl InvocationState {
    fn resolve_success(&self, value: Value) {
        if let InvocationStrategy::Lazy { origin, property } = &self.strategy {
            debug!(class = origin.class(), property = %property, "caching lazy property");
            origin.set(property.clone(), value.clone());
        }
        self.success.ready(value);
    }

    fn resolve_exception(&self, exception: RemoteException) {
        if !self.exception.is_ready() && !self.exception.has_callback() {
            let fallback = self.client.default_exception_handler();
            self.exception.register(move |e| fallback(&e));
        }
        self.exception.ready(exception);
    }

    fn resolve_error(&self, error: TransportError) {
        if !self.error.is_ready() && !self.error.has_callback() {
            let fallback = self.client.default_error_handler();
            self.error.register(move |e| fallback(&e));
        }
        self.error.ready(error);
    }
}

/// Invocation は 1 回の呼び出し
///
/// # 使用例
/// ```ignore
/// client
///     .remote(&branch, "openAccount", vec![Value::from("1001")])
///     .success(|account| println!("opened {account}"))
///     .exception(|e| eprintln!("rejected: {e}"))
///     .go();
/// ```
#[derive(Clone)]
pub struct Invocation {
    state: Rc<InvocationState>,
}

impl Invocation {
    pub fn new(
        client: &Client,
        target_class: impl Into<String>,
        target: Target,
        method: impl Into<String>,
        arguments: Vec<Value>,
    ) -> Self {
        Self::with_strategy(client, target_class.into(), target, method.into(), arguments, InvocationStrategy::Direct)
    }

    /// 引数なしアクセサの lazy 版
    pub fn lazy(
        client: &Client,
        origin: &RemoteObject,
        method: impl Into<String>,
        property: impl Into<String>,
    ) -> Self {
        Self::with_strategy(
            client,
            origin.class().to_string(),
            Target::Instance(origin.clone()),
            method.into(),
            Vec::new(),
            InvocationStrategy::Lazy {
                origin: origin.clone(),
                property: property.into(),
            },
        )
    }

    fn with_strategy(
        client: &Client,
        target_class: String,
        target: Target,
        method: String,
        arguments: Vec<Value>,
        strategy: InvocationStrategy,
    ) -> Self {
        Self {
            state: Rc::new(InvocationState {
                client: client.clone(),
                target_class,
                target,
                method,
                arguments,
                strategy,
                named_args: Cell::new(false),
                dispatched: Cell::new(false),
                success: Deferred::new(),
                exception: Deferred::new(),
                error: Deferred::new(),
            }),
        }
    }

    pub fn target_class(&self) -> &str {
        &self.state.target_class
    }

    pub fn method(&self) -> &str {
        &self.state.method
    }

    pub fn strategy(&self) -> &InvocationStrategy {
        &self.state.strategy
    }

    pub fn is_dispatched(&self) -> bool {
        self.state.dispatched.get()
    }

    pub fn success(self, callback: impl FnOnce(Value) + 'static) -> Self {
        self.state.success.register(callback);
        self
    }

    pub fn exception(self, callback: impl FnOnce(RemoteException) + 'static) -> Self {
        self.state.exception.register(callback);
        self
    }

    pub fn error(self, callback: impl FnOnce(TransportError) + 'static) -> Self {
        self.state.error.register(callback);
        self
    }

    /// 型タグごとのハンドラ表で exception を受ける
    pub fn catch_exception(self, handlers: ExceptionHandlers) -> Self {
        let fallback = self.state.client.default_exception_handler();
        self.exception(move |e| handlers.dispatch(e, &fallback))
    }

    /// 引数を 1 個の Map（パラメータ名 → 値）として渡す
    pub fn use_named_args(self) -> Self {
        if self.is_dispatched() {
            warn!(method = %self.state.method, "use_named_args after dispatch has no effect");
        }
        self.state.named_args.set(true);
        self
    }

    /// lazy キャッシュを捨てる（次の `go()` で再取得）
    pub fn clear(self) -> Self {
        match &self.state.strategy {
            InvocationStrategy::Lazy { origin, property } => {
                debug!(class = origin.class(), property = %property, "clearing lazy property");
                origin.remove(property);
            }
            InvocationStrategy::Direct => {
                debug!(method = %self.state.method, "clear on a direct invocation; nothing cached");
            }
        }
        self
    }

    /// 呼び出しを実行する。2 回目以降は何もしない
    pub fn go(self) -> Self {
        if self.state.dispatched.replace(true) {
            warn!(method = %self.state.method, "invocation already dispatched; ignoring go()");
            return self;
        }
        if let InvocationStrategy::Lazy { origin, property } = &self.state.strategy {
            let cached = origin.get(property);
            if !cached.is_null() {
                debug!(class = origin.class(), property = %property, "lazy property cache hit");
                self.state.success.ready(cached);
                return self;
            }
        }
        self.dispatch();
        self
    }

    fn dispatch(&self) {
        let state = &self.state;
        let (method, call) = match self.prepare() {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!(method = %state.method, error = %e, "call preparation failed");
                state.resolve_exception(RemoteException::preparation(&e));
                return;
            }
        };

        if state.client.config().validate_arguments {
            if let Some(errors) = validate_call(&method, &call) {
                debug!(route = %call.route(), errors = errors.len(), "validation failed; not sending");
                state.resolve_exception(RemoteException::validation(errors));
                return;
            }
        }

        let body = match call.to_json() {
            Ok(body) => body,
            Err(e) => {
                state.resolve_exception(RemoteException::preparation(&e));
                return;
            }
        };
        let config = state.client.config();
        let request = TransportRequest::new(&config.endpoint, &config.application, body);
        debug!(route = %call.route(), endpoint = %config.endpoint, "sending call");
        state
            .client
            .transport()
            .send(request, Completion::new(state.clone()));
    }

    /// 送るはずの CallDescriptor を組み立てる（送信はしない）
    pub fn prepare_call(&self) -> Result<CallDescriptor, ClientError> {
        self.prepare().map(|(_, call)| call)
    }

    /// 送信前検証だけを行う。エラーがなければ `Ok(None)`
    pub fn validate(&self) -> Result<Option<Vec<ValidationError>>, ClientError> {
        let (method, call) = self.prepare()?;
        Ok(validate_call(&method, &call))
    }

    fn prepare(&self) -> Result<(Rc<MethodDescriptor>, CallDescriptor), ClientError> {
        let state = &self.state;
        let is_static = matches!(state.target, Target::Static);
        let registry = state.client.registry();
        let method = registry
            .resolve_method(&state.target_class, &state.method, is_static)
            .ok_or_else(|| ClientError::UnknownMethod {
                class: state.target_class.clone(),
                method: state.method.clone(),
            })?;
        let codec = ValueCodec::new(&registry);

        let named = if state.named_args.get() {
            match state.arguments.as_slice() {
                [Value::Map(map)] => Some(map),
                _ => {
                    return Err(ClientError::NamedArgsNotMap {
                        method: state.method.clone(),
                    });
                }
            }
        } else {
            None
        };

        let arguments = method
            .parameters
            .iter()
            .enumerate()
            .map(|(index, parameter)| {
                let supplied = match named {
                    Some(map) => map.get(&parameter.name),
                    None => state.arguments.get(index),
                };
                codec.to_wire(supplied.unwrap_or(&Value::Null), Some(parameter.type_name.as_str()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let target = match &state.target {
            Target::Static => None,
            Target::Instance(object) => Some(codec.encode_target(object)?),
            Target::Reference(reference) => Some(reference.to_wire()),
        };

        debug!(
            class = %state.target_class,
            method = %state.method,
            arguments = arguments.len(),
            named = state.named_args.get(),
            "prepared call"
        );
        let call = CallDescriptor::new(state.target_class.clone(), target, state.method.clone(), arguments);
        Ok((method, call))
    }

    /// 呼び出しを実行し、結果を待つ
    ///
    /// 3 つのチャネルすべてに callback を登録するので、それまでに
    /// 登録した callback は置き換えられます。
    pub async fn outcome(self) -> Outcome {
        let (tx, rx) = oneshot::channel();
        let slot = Rc::new(RefCell::new(Some(tx)));
        let (s, x, e) = (slot.clone(), slot.clone(), slot);
        let invocation = self
            .success(move |v| deliver(&s, Outcome::Success(v)))
            .exception(move |v| deliver(&x, Outcome::Exception(v)))
            .error(move |v| deliver(&e, Outcome::Error(v)));
        invocation.go();
        rx.await
            .unwrap_or_else(|_| Outcome::Error(TransportError::protocol("invocation dropped before completing")))
    }
}

fn deliver(slot: &RefCell<Option<oneshot::Sender<Outcome>>>, outcome: Outcome) {
    if let Some(tx) = slot.borrow_mut().take() {
        let _ = tx.send(outcome);
    }
}

impl std::fmt::Debug for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invocation")
            .field("target_class", &self.state.target_class)
            .field("method", &self.state.method)
            .field("dispatched", &self.state.dispatched.get())
            .finish()
    }
}

/// Completion は Transport が結果を返すためのハンドル
///
/// ちょうど 1 回使います。使わずに drop すると error チャネルで解決されます。
pub struct Completion {
    state: Option<Rc<InvocationState>>,
}

impl Completion {
    fn new(state: Rc<InvocationState>) -> Self {
        Self { state: Some(state) }
    }

    pub fn succeed(mut self, result: Value) {
        if let Some(state) = self.state.take() {
            state.resolve_success(result);
        }
    }

    pub fn except(mut self, exception: RemoteException) {
        if let Some(state) = self.state.take() {
            state.resolve_exception(exception);
        }
    }

    pub fn fail(mut self, error: TransportError) {
        if let Some(state) = self.state.take() {
            state.resolve_error(error);
        }
    }

    /// レスポンス本文（JSON テキスト）を解釈して解決する
    pub fn respond(self, body: &str) {
        match serde_json::from_str::<serde_json::Value>(body) {
            Ok(json) => self.respond_json(&json),
            Err(e) => self.fail(TransportError::decode(e.to_string())),
        }
    }

    /// `{"exception": ...}` なら exception、それ以外は `result` で success
    ///
    /// エンベロープ全体を 1 回で revive するので、result と exception の
    /// 間の参照も解決されます。
    pub fn respond_json(self, body: &serde_json::Value) {
        if !body.is_object() {
            self.fail(TransportError::decode("response body is not a JSON object"));
            return;
        }
        let Some(client) = self.state.as_ref().map(|s| s.client.clone()) else {
            return;
        };
        let envelope = client.decode(body);
        let exception = envelope.get("exception");
        if exception.is_null() {
            self.succeed(envelope.get("result"));
        } else {
            self.except(RemoteException::from_payload(exception));
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            warn!(method = %state.method, "completion dropped without a result");
            state.resolve_error(TransportError::protocol("transport dropped the call without completing it"));
        }
    }
}

/// BoundMethod の受け手
#[derive(Debug, Clone)]
pub enum Receiver {
    Static(String),
    Instance(RemoteObject),
}

impl Receiver {
    pub fn class(&self) -> &str {
        match self {
            Receiver::Static(class) => class,
            Receiver::Instance(object) => object.class(),
        }
    }
}

/// レシーバに束縛されたメソッド。切り離して持ち回せる
#[derive(Debug, Clone)]
pub struct BoundMethod {
    client: Client,
    receiver: Receiver,
    name: String,
}

impl BoundMethod {
    pub(crate) fn new(client: &Client, receiver: Receiver, name: impl Into<String>) -> Self {
        Self {
            client: client.clone(),
            receiver,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn receiver(&self) -> &Receiver {
        &self.receiver
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn descriptor(&self) -> Option<Rc<MethodDescriptor>> {
        let is_static = matches!(self.receiver, Receiver::Static(_));
        self.client
            .registry()
            .resolve_method(self.receiver.class(), &self.name, is_static)
    }

    pub fn invoke(&self, arguments: Vec<Value>) -> Invocation {
        match &self.receiver {
            Receiver::Static(class) => self.client.invoke_static(class.clone(), self.name.clone(), arguments),
            Receiver::Instance(object) => self.client.remote(object, self.name.clone(), arguments),
        }
    }
}
