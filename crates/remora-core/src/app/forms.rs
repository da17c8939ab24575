//! Form - 送信用メソッドと、編集中のフィールドデータ
//!
//! # 状態遷移
//! ```text
//! Ready --submit--> Pending --success--> Submitted（終端）
//!                      |
//!                      +--exception / error--> Ready
//! ```
//! Pending 中と Submitted 後の submit は何もしません。

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::{debug, warn};

use super::invocation::{BoundMethod, Invocation};
use crate::domain::{ClientError, MethodDescriptor, RemoteException, RuleSet, TransportError, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitState {
    Ready,
    Pending,
    Submitted,
}

/// submit 時の callback（どれも省略可）
#[derive(Default)]
pub struct FormCallbacks {
    success: Option<Box<dyn FnOnce(Value)>>,
    exception: Option<Box<dyn FnOnce(RemoteException)>>,
    error: Option<Box<dyn FnOnce(TransportError)>>,
}

impl FormCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success(mut self, callback: impl FnOnce(Value) + 'static) -> Self {
        self.success = Some(Box::new(callback));
        self
    }

    pub fn on_exception(mut self, callback: impl FnOnce(RemoteException) + 'static) -> Self {
        self.exception = Some(Box::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl FnOnce(TransportError) + 'static) -> Self {
        self.error = Some(Box::new(callback));
        self
    }
}

pub struct Form {
    method: BoundMethod,
    descriptor: Rc<MethodDescriptor>,
    data: RefCell<BTreeMap<String, Value>>,
    state: Rc<Cell<SubmitState>>,
}

impl Form {
    /// 送信先メソッドが登録済みでなければエラー
    pub fn new(method: BoundMethod, initial: BTreeMap<String, Value>) -> Result<Self, ClientError> {
        let descriptor = method.descriptor().ok_or_else(|| ClientError::UnknownMethod {
            class: method.receiver().class().to_string(),
            method: method.name().to_string(),
        })?;
        debug!(method = method.name(), fields = initial.len(), "creating form");
        Ok(Self {
            method,
            descriptor,
            data: RefCell::new(initial),
            state: Rc::new(Cell::new(SubmitState::Ready)),
        })
    }

    pub fn state(&self) -> SubmitState {
        self.state.get()
    }

    pub fn is_submittable(&self) -> bool {
        self.state.get() == SubmitState::Ready
    }

    /// ドット区切りのキーでデータを読む（`address.street`）
    pub fn get_data(&self, key: &str) -> Value {
        let data = self.data.borrow();
        let mut segments = key.split('.');
        let Some(first) = segments.next() else {
            return Value::Null;
        };
        let mut current = data.get(first).cloned().unwrap_or_default();
        for segment in segments {
            current = current.get(segment);
        }
        current
    }

    /// ドット区切りのキーでデータを書く。途中の Map は必要に応じて作る
    pub fn set_data(&self, key: &str, value: impl Into<Value>) {
        let mut data = self.data.borrow_mut();
        let mut segments: Vec<&str> = key.split('.').collect();
        let Some(last) = segments.pop() else { return };
        let mut current = &mut *data;
        for segment in segments {
            let slot = current.entry(segment.to_string()).or_insert_with(|| Value::Map(BTreeMap::new()));
            if !matches!(slot, Value::Map(_)) {
                *slot = Value::Map(BTreeMap::new());
            }
            let Value::Map(next) = slot else { return };
            current = next;
        }
        current.insert(last.to_string(), value.into());
    }

    pub fn data(&self) -> BTreeMap<String, Value> {
        self.data.borrow().clone()
    }

    /// パラメータ名 → 検証ルール（UI 側の検証に渡す）
    pub fn validation_rules(&self) -> BTreeMap<String, RuleSet> {
        self.descriptor
            .parameters
            .iter()
            .filter_map(|p| p.validations.clone().map(|rules| (p.name.clone(), rules)))
            .collect()
    }

    /// パラメータ名で引数を集め、named args で呼び出す
    ///
    /// 送信しなかった場合（Pending / Submitted）は None。
    pub fn submit(&self, callbacks: FormCallbacks) -> Option<Invocation> {
        if !self.is_submittable() {
            debug!(method = self.method.name(), state = ?self.state.get(), "skipping submission");
            return None;
        }
        self.state.set(SubmitState::Pending);

        let arguments: BTreeMap<String, Value> = self
            .descriptor
            .parameter_names()
            .map(|name| (name.to_string(), self.get_data(name)))
            .collect();
        debug!(method = self.method.name(), "submitting form");

        let FormCallbacks {
            success,
            exception,
            error,
        } = callbacks;
        let on_success = self.state.clone();
        let on_exception = self.state.clone();
        let on_error = self.state.clone();
        let default_error = self.method.client().default_error_handler();

        let invocation = self
            .method
            .invoke(vec![Value::Map(arguments)])
            .use_named_args()
            .success(move |value| {
                on_success.set(SubmitState::Submitted);
                match success {
                    Some(callback) => callback(value),
                    None => debug!(response = %value, "form submitted"),
                }
            })
            .exception(move |e| {
                on_exception.set(SubmitState::Ready);
                match exception {
                    Some(callback) => callback(e),
                    None => warn!(exception = %e, "unhandled exception on submitting form"),
                }
            })
            .error(move |e| {
                on_error.set(SubmitState::Ready);
                match error {
                    Some(callback) => callback(e),
                    None => default_error(&e),
                }
            });
        Some(invocation.go())
    }
}

impl BoundMethod {
    pub fn form(&self, initial: BTreeMap<String, Value>) -> Result<Form, ClientError> {
        Form::new(self.clone(), initial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::{DeliveryMode, LoopbackTransport, Reply};
    use crate::test_support::{bank_client_with, branch};
    use serde_json::json;

    #[test]
    fn dotted_keys_create_nested_maps() {
        let (client, _) = bank_client_with(LoopbackTransport::new());
        let form = client.method(&branch(&client, 1), "openAccount").form(BTreeMap::new()).unwrap();
        form.set_data("owner.address.zip", "12345");
        form.set_data("number", "A-1");
        assert_eq!(form.get_data("owner.address.zip"), Value::from("12345"));
        assert_eq!(form.get_data("number"), Value::from("A-1"));
        assert!(form.get_data("owner.missing.deep").is_null());
    }

    #[test]
    fn unknown_method_cannot_back_a_form() {
        let (client, _) = bank_client_with(LoopbackTransport::new());
        assert!(matches!(
            client.method(&branch(&client, 1), "nope").form(BTreeMap::new()),
            Err(ClientError::UnknownMethod { .. })
        ));
    }

    #[test]
    fn exposes_validation_rules_by_parameter() {
        let (client, _) = bank_client_with(LoopbackTransport::new());
        let form = client.method(&branch(&client, 1), "openAccount").form(BTreeMap::new()).unwrap();
        let rules = form.validation_rules();
        assert!(rules["number"].contains_key("Required"));
        assert!(!rules.contains_key("initialDeposit"));
    }

    #[test]
    fn successful_submission_is_terminal() {
        let transport = LoopbackTransport::new()
            .on("com.example.bank.Branch.openAccount", |_| Reply::Result(json!({"ok": true})));
        let (client, transport) = bank_client_with(transport);
        let form = client.method(&branch(&client, 1), "openAccount").form(BTreeMap::new()).unwrap();
        form.set_data("number", "A-100");
        form.set_data("initialDeposit", "10.5");

        assert!(form.submit(FormCallbacks::new()).is_some());
        assert_eq!(form.state(), SubmitState::Submitted);
        assert!(form.submit(FormCallbacks::new()).is_none());
        assert_eq!(transport.call_count(), 1);

        let call = transport.requests()[0].call_descriptor().unwrap();
        assert_eq!(call.arguments, vec![json!("A-100"), json!(10.5)]);
    }

    #[test]
    fn exception_makes_the_form_submittable_again() {
        let transport = LoopbackTransport::new()
            .with_mode(DeliveryMode::Deferred)
            .on("com.example.bank.Branch.openAccount", |_| {
                Reply::Exception(json!({"@class": "com.example.bank.AccountClosedException", "message": "closed"}))
            });
        let (client, transport) = bank_client_with(transport);
        let form = client.method(&branch(&client, 1), "openAccount").form(BTreeMap::new()).unwrap();
        form.set_data("number", "A-100");

        form.submit(FormCallbacks::new());
        assert_eq!(form.state(), SubmitState::Pending);
        transport.flush();
        assert_eq!(form.state(), SubmitState::Ready);
    }

    #[test]
    fn local_validation_failure_resets_the_form() {
        let (client, transport) = bank_client_with(LoopbackTransport::new());
        let form = client.method(&branch(&client, 1), "openAccount").form(BTreeMap::new()).unwrap();
        let seen = Rc::new(Cell::new(false));
        let s = seen.clone();
        form.submit(FormCallbacks::new().on_exception(move |e| s.set(e.is_validation())));
        assert!(seen.get());
        assert!(form.is_submittable());
        assert_eq!(transport.call_count(), 0);
    }
}
