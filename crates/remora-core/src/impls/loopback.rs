//! LoopbackTransport - プロセス内でサーバを代行する Transport
//!
//! # 学習ポイント
//! - `Class.method` ごとのハンドラ表
//! - 送信されたリクエストの記録（テストでの検証用）
//! - 即時配送と、`flush` まで溜めておく遅延配送
//!
//! 応答は一度 JSON テキストにしてから `Completion::respond` に渡すので、
//! 本物の Transport と同じデコード経路を通ります。

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::app::Completion;
use crate::domain::TransportError;
use crate::ports::{Transport, TransportRequest};
use crate::protocol::{CallDescriptor, ResponseEnvelope};

/// ハンドラが返す応答
#[derive(Debug, Clone)]
pub enum Reply {
    /// `{"result": ...}`
    Result(serde_json::Value),
    /// `{"exception": ...}`
    Exception(serde_json::Value),
    /// 通信エラー
    Fail(TransportError),
    /// 本文をそのまま返す
    Raw(String),
    /// 応答せずに Completion を捨てる
    Drop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// `send` の中で応答する
    #[default]
    Immediate,
    /// `flush` を呼ぶまで応答を保留する
    Deferred,
}

type Handler = Box<dyn Fn(&CallDescriptor) -> Reply>;

/// LoopbackTransport は開発・テスト用の Transport
///
/// # 使用例
/// ```ignore
/// let transport = Rc::new(
///     LoopbackTransport::new()
///         .on("com.example.bank.Branch.getAccounts", |_| Reply::Result(json!([]))),
/// );
/// ```
#[derive(Default)]
pub struct LoopbackTransport {
    mode: DeliveryMode,
    handlers: HashMap<String, Handler>,
    requests: RefCell<Vec<TransportRequest>>,
    pending: RefCell<VecDeque<(Reply, Completion)>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: DeliveryMode) -> Self {
        self.mode = mode;
        self
    }

    /// `route`（`Class.method`）のハンドラを登録する（後勝ち）
    pub fn on(mut self, route: impl Into<String>, handler: impl Fn(&CallDescriptor) -> Reply + 'static) -> Self {
        self.handlers.insert(route.into(), Box::new(handler));
        self
    }

    /// これまでに送られたリクエスト
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    /// 保留中の応答をすべて配送し、配送した数を返す
    ///
    /// 配送中に新しく送られたリクエストの応答も同じ flush で配送される。
    pub fn flush(&self) -> usize {
        let mut delivered = 0;
        loop {
            let next = self.pending.borrow_mut().pop_front();
            let Some((reply, completion)) = next else {
                break;
            };
            deliver(reply, completion);
            delivered += 1;
        }
        delivered
    }

    fn reply_for(&self, request: &TransportRequest) -> Reply {
        let call = match request.call_descriptor() {
            Ok(call) => call,
            Err(e) => return Reply::Fail(TransportError::protocol(format!("malformed call: {e}"))),
        };
        let route = call.route();
        match self.handlers.get(&route) {
            Some(handler) => handler(&call),
            None => Reply::Fail(TransportError::network(format!("no handler for {route}"))),
        }
    }
}

impl Transport for LoopbackTransport {
    fn send(&self, request: TransportRequest, completion: Completion) {
        debug!(endpoint = %request.endpoint, application = %request.application, "loopback request");
        let reply = self.reply_for(&request);
        self.requests.borrow_mut().push(request);
        match self.mode {
            DeliveryMode::Immediate => deliver(reply, completion),
            DeliveryMode::Deferred => self.pending.borrow_mut().push_back((reply, completion)),
        }
    }
}

fn deliver(reply: Reply, completion: Completion) {
    let envelope = match reply {
        Reply::Result(result) => ResponseEnvelope::success(result),
        Reply::Exception(exception) => ResponseEnvelope::exception(exception),
        Reply::Fail(error) => return completion.fail(error),
        Reply::Raw(body) => return completion.respond(&body),
        Reply::Drop => return drop(completion),
    };
    match serde_json::to_string(&envelope) {
        Ok(body) => completion.respond(&body),
        Err(e) => completion.fail(TransportError::decode(e.to_string())),
    }
}
