//! RemoteException - exception チャネルのペイロード
//!
//! サーバ側メソッドが投げたドメイン例外、ローカルの検証失敗、
//! 呼び出し準備中のエラーのいずれもこの型で届きます。区別は
//! ペイロードの型タグでのみ可能です。

use std::collections::HashMap;
use std::rc::Rc;

use super::errors::ClientError;
use super::validation_error::ValidationError;
use super::value::Value;
use crate::protocol::{CLASS_TAG, REMOTE_EXCEPTION_CLASS, VALIDATION_EXCEPTION_CLASS};

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteException {
    class: Option<String>,
    message: Option<String>,
    payload: Value,
}

impl RemoteException {
    /// revive 済みのサーバ例外から作る
    pub fn from_payload(payload: Value) -> Self {
        let class = payload.class();
        let message = payload.get("message").as_str().map(str::to_string);
        Self {
            class,
            message,
            payload,
        }
    }

    /// 呼び出し準備中のエラーを exception チャネル用に包む
    pub fn preparation(error: &ClientError) -> Self {
        let message = error.to_string();
        let payload = Value::map([
            (CLASS_TAG, Value::from(REMOTE_EXCEPTION_CLASS)),
            ("message", Value::from(message.clone())),
        ]);
        Self {
            class: Some(REMOTE_EXCEPTION_CLASS.to_string()),
            message: Some(message),
            payload,
        }
    }

    /// ローカル検証の失敗。サーバの ValidationException と同じ形にする
    pub fn validation(errors: Vec<ValidationError>) -> Self {
        let message = errors
            .first()
            .and_then(|e| e.message.clone())
            .unwrap_or_else(|| "validation failed".to_string());
        let items = errors.into_iter().map(|e| e.into_value()).collect::<Vec<_>>();
        let payload = Value::map([
            (CLASS_TAG, Value::from(VALIDATION_EXCEPTION_CLASS)),
            ("message", Value::from(message.clone())),
            ("errors", Value::from(items)),
        ]);
        Self {
            class: Some(VALIDATION_EXCEPTION_CLASS.to_string()),
            message: Some(message),
            payload,
        }
    }

    pub fn class(&self) -> Option<&str> {
        self.class.as_deref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn is_validation(&self) -> bool {
        self.class() == Some(VALIDATION_EXCEPTION_CLASS)
    }

    /// ValidationException の `errors` を取り出す（それ以外は空）
    pub fn validation_errors(&self) -> Vec<ValidationError> {
        if !self.is_validation() {
            return Vec::new();
        }
        self.payload
            .get("errors")
            .as_list()
            .map(|items| items.iter().filter_map(ValidationError::from_value).collect())
            .unwrap_or_default()
    }
}

impl std::fmt::Display for RemoteException {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}",
            self.class().unwrap_or("<untyped>"),
            self.message().unwrap_or("")
        )
    }
}

type Handler = Box<dyn FnOnce(RemoteException)>;

/// ExceptionHandlers は型タグごとの例外ハンドラ表
///
/// # 使用例
/// ```ignore
/// invocation.catch_exception(
///     ExceptionHandlers::new()
///         .on("com.example.bank.AccountClosedException", |e| println!("closed: {e}"))
///         .otherwise(|e| eprintln!("unexpected: {e}")),
/// )
/// ```
#[derive(Default)]
pub struct ExceptionHandlers {
    handlers: HashMap<String, Handler>,
    fallback: Option<Handler>,
}

impl ExceptionHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, class: impl Into<String>, handler: impl FnOnce(RemoteException) + 'static) -> Self {
        self.handlers.insert(class.into(), Box::new(handler));
        self
    }

    pub fn otherwise(mut self, handler: impl FnOnce(RemoteException) + 'static) -> Self {
        self.fallback = Some(Box::new(handler));
        self
    }

    /// 型タグが一致するハンドラ、なければ fallback、それも無ければ default
    pub(crate) fn dispatch(mut self, exception: RemoteException, default: &Rc<dyn Fn(&RemoteException)>) {
        let handler = exception
            .class()
            .and_then(|class| self.handlers.remove(class))
            .or(self.fallback);
        match handler {
            Some(handler) => handler(exception),
            None => default(&exception),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn exception(class: &str) -> RemoteException {
        RemoteException::from_payload(Value::map([
            (CLASS_TAG, Value::from(class)),
            ("message", Value::from("boom")),
        ]))
    }

    #[test]
    fn from_payload_extracts_class_and_message() {
        let e = exception("com.example.bank.AccountClosedException");
        assert_eq!(e.class(), Some("com.example.bank.AccountClosedException"));
        assert_eq!(e.message(), Some("boom"));
        assert!(!e.is_validation());
    }

    #[test]
    fn handlers_dispatch_by_class() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let default: Rc<dyn Fn(&RemoteException)> = {
            let seen = seen.clone();
            Rc::new(move |_| seen.borrow_mut().push("default"))
        };

        let s = seen.clone();
        ExceptionHandlers::new()
            .on("x.Closed", move |_| s.borrow_mut().push("closed"))
            .dispatch(exception("x.Closed"), &default);

        ExceptionHandlers::new()
            .on("x.Closed", |_| unreachable!())
            .dispatch(exception("x.Other"), &default);

        let s = seen.clone();
        ExceptionHandlers::new()
            .otherwise(move |_| s.borrow_mut().push("fallback"))
            .dispatch(exception("x.Other"), &default);

        assert_eq!(*seen.borrow(), vec!["closed", "default", "fallback"]);
    }

    #[test]
    fn preparation_errors_carry_the_error_text() {
        let e = RemoteException::preparation(&ClientError::NamedArgsNotMap {
            method: "openAccount".into(),
        });
        assert_eq!(e.class(), Some(REMOTE_EXCEPTION_CLASS));
        assert!(e.message().unwrap().contains("openAccount"));
    }
}
