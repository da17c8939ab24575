//! ValidationError - 検証エラー 1 件
//!
//! ローカル検証とサーバの ValidationException のどちらでも同じ形で扱います。

use std::collections::BTreeMap;

use super::descriptor::RuleConfig;
use super::value::Value;
use crate::protocol::{CLASS_TAG, VALIDATION_ERROR_CLASS};

/// 1 件の検証エラー。サーバの ValidationError と同じ形
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationError {
    pub field_name: String,
    pub error_code: Option<String>,
    pub message: Option<String>,
    pub message_variables: BTreeMap<String, Value>,
}

impl ValidationError {
    pub fn new(field_name: impl Into<String>, config: &RuleConfig) -> Self {
        Self {
            field_name: field_name.into(),
            error_code: config.error_code.clone(),
            message: config.message.clone(),
            message_variables: BTreeMap::new(),
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.message_variables.insert(name.into(), value.into());
        self
    }

    /// exception ペイロードに入れるための Map 表現
    pub fn into_value(self) -> Value {
        Value::map([
            (CLASS_TAG, Value::from(VALIDATION_ERROR_CLASS)),
            ("fieldName", Value::from(self.field_name)),
            ("errorCode", Value::from(self.error_code)),
            ("message", Value::from(self.message)),
            ("messageVariables", Value::Map(self.message_variables)),
        ])
    }

    /// `into_value` の逆。サーバから届いたものも読める
    pub fn from_value(value: &Value) -> Option<Self> {
        let field_name = value.get("fieldName").as_str()?.to_string();
        let text = |key: &str| value.get(key).as_str().map(str::to_string);
        Some(Self {
            field_name,
            error_code: text("errorCode"),
            message: text("message"),
            message_variables: value.get("messageVariables").as_map().cloned().unwrap_or_default(),
        })
    }
}
