//! ValidationContext - 送信前のクライアント側検証
//!
//! 組み立て済みの call（ワイヤ値）に対して、パラメータごとの
//! ルールを適用します。ネットワークには触れません。
//!
//! # ルール
//! - `Required`: null または空文字はエラー
//! - `NotNull`: null はエラー
//! - `NotEmpty`: 空文字はエラー（null は通す）
//! - `Length`: 文字列の長さ（文字数）が min / max を外れたらエラー。0 は指定なし扱い
//! - `AssertValid`: サブフィールドに `targetValidations` を再適用（フィールド名は `a.b`）
//!
//! 未知のルール名は warn を出して何もしません。

use tracing::{debug, warn};

use crate::domain::{MethodDescriptor, RuleConfig, RuleSet, ValidationError};
use crate::protocol::CallDescriptor;

/// 組み込みルール
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Required,
    NotNull,
    NotEmpty,
    Length,
    AssertValid,
}

impl Rule {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Required" => Some(Rule::Required),
            "NotNull" => Some(Rule::NotNull),
            "NotEmpty" => Some(Rule::NotEmpty),
            "Length" => Some(Rule::Length),
            "AssertValid" => Some(Rule::AssertValid),
            _ => None,
        }
    }
}

/// 検証エラーを溜めるコンテキスト
#[derive(Debug, Default)]
pub struct ValidationContext {
    errors: Vec<ValidationError>,
}

impl ValidationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// `rules` のすべてを `value` に適用する
    pub fn validate(&mut self, field_name: &str, value: &serde_json::Value, rules: &RuleSet) {
        for (rule_name, config) in rules {
            let Some(rule) = Rule::from_name(rule_name) else {
                warn!(rule = %rule_name, field = field_name, "no validator for rule; skipping");
                continue;
            };
            debug!(field = field_name, ?rule, "validating");
            self.apply(rule, field_name, value, config);
        }
    }

    fn apply(&mut self, rule: Rule, field_name: &str, value: &serde_json::Value, config: &RuleConfig) {
        let text = value.as_str();
        match rule {
            Rule::Required => {
                if value.is_null() || text.is_some_and(str::is_empty) {
                    self.report(ValidationError::new(field_name, config));
                }
            }
            Rule::NotNull => {
                if value.is_null() {
                    self.report(ValidationError::new(field_name, config));
                }
            }
            Rule::NotEmpty => {
                if text.is_some_and(str::is_empty) {
                    self.report(ValidationError::new(field_name, config));
                }
            }
            Rule::Length => {
                let Some(text) = text else { return };
                let length = text.chars().count();
                let with_bounds = |e: ValidationError| {
                    let e = e.with_variable("length", length as u64);
                    let e = match config.min {
                        Some(min) => e.with_variable("min", min as u64),
                        None => e,
                    };
                    match config.max {
                        Some(max) => e.with_variable("max", max as u64),
                        None => e,
                    }
                };
                if config.min.is_some_and(|min| min > 0 && length < min) {
                    self.report(with_bounds(ValidationError::new(field_name, config)));
                }
                if config.max.is_some_and(|max| max > 0 && length > max) {
                    self.report(with_bounds(ValidationError::new(field_name, config)));
                }
            }
            Rule::AssertValid => {
                let Some(targets) = &config.target_validations else { return };
                for (sub_field, sub_rules) in targets {
                    let sub_value = value.get(sub_field).unwrap_or(&serde_json::Value::Null);
                    self.validate(&format!("{field_name}.{sub_field}"), sub_value, sub_rules);
                }
            }
        }
    }

    fn report(&mut self, error: ValidationError) {
        debug!(field = %error.field_name, "validation failed");
        self.errors.push(error);
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<ValidationError> {
        self.errors
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// call の全パラメータを検証。エラーがなければ None
pub fn validate_call(method: &MethodDescriptor, call: &CallDescriptor) -> Option<Vec<ValidationError>> {
    let mut context = ValidationContext::new();
    for (index, parameter) in method.parameters.iter().enumerate() {
        let Some(rules) = &parameter.validations else { continue };
        let argument = call.arguments.get(index).unwrap_or(&serde_json::Value::Null);
        context.validate(&parameter.name, argument, rules);
    }
    (!context.is_valid()).then(|| context.into_errors())
}
