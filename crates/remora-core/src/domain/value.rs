//! Value - クライアント側のネイティブ値
//!
//! ワイヤ上の JSON ツリーを revive した結果、または呼び出し側が組み立てた
//! 引数を表現します。JSON と違い、日付・RemoteObject・Reference を
//! 第一級の値として持ちます。
//!
//! # 共有と同一性
//! - `List` は `Rc<Vec<Value>>`。clone してもリスト本体は共有される
//!   （lazy キャッシュから同じ配列を返すため）
//! - `Object` は RemoteObject ハンドル。clone は同じ実体を指す

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde_json::Number;

use super::object::RemoteObject;
use super::reference::Reference;

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Date(DateTime<Utc>),
    List(Rc<Vec<Value>>),
    /// 型タグを持たない（または未知の型タグを持つ）プレーンなデータ
    Map(BTreeMap<String, Value>),
    Object(RemoteObject),
    Reference(Reference),
}

impl Value {
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(Rc::new(items.into_iter().collect()))
    }

    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            Value::Date(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Rc<Vec<Value>>> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&RemoteObject> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Value::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// Object ならそのまま、解決済み Reference なら参照先を返す
    pub fn resolve_object(&self) -> Option<RemoteObject> {
        match self {
            Value::Object(o) => Some(o.clone()),
            Value::Reference(r) => r.get(),
            _ => None,
        }
    }

    /// Map のエントリ、または Object のプロパティを取り出す
    pub fn get(&self, key: &str) -> Value {
        match self {
            Value::Map(m) => m.get(key).cloned().unwrap_or_default(),
            Value::Object(o) => o.get(key),
            _ => Value::Null,
        }
    }

    /// 型タグ（Object のクラス、または Map の `@class`）
    pub fn class(&self) -> Option<String> {
        match self {
            Value::Object(o) => Some(o.class().to_string()),
            Value::Map(m) => m
                .get(crate::protocol::CLASS_TAG)
                .and_then(Value::as_str)
                .map(str::to_string),
            Value::Reference(r) => Some(r.class().to_string()),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Reference(a), Value::Reference(b)) => a.key() == b.key(),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => b.fmt(f),
            Value::Number(n) => n.fmt(f),
            Value::String(s) => s.fmt(f),
            Value::Date(d) => write!(f, "{}", crate::types::iso8601::format(d)),
            Value::List(items) => write!(f, "[{} items]", items.len()),
            Value::Map(m) => write!(f, "{{{} entries}}", m.len()),
            Value::Object(o) => write!(f, "{o:?}"),
            Value::Reference(r) => write!(f, "{r:?}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n.into())
    }
}

impl From<f64> for Value {
    /// NaN / 無限大は JSON で表現できないので Null になる
    fn from(n: f64) -> Self {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(d)
    }
}

impl From<RemoteObject> for Value {
    fn from(o: RemoteObject) -> Self {
        Value::Object(o)
    }
}

impl From<Reference> for Value {
    fn from(r: Reference) -> Self {
        Value::Reference(r)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(Rc::new(items))
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(m: BTreeMap<String, Value>) -> Self {
        Value::Map(m)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_share_storage_when_cloned() {
        let a = Value::list([Value::from(1), Value::from(2)]);
        let b = a.clone();
        assert!(Rc::ptr_eq(a.as_list().unwrap(), b.as_list().unwrap()));
    }

    #[test]
    fn get_reads_map_entries_and_defaults_to_null() {
        let v = Value::map([("name", Value::from("main"))]);
        assert_eq!(v.get("name"), Value::from("main"));
        assert!(v.get("missing").is_null());
        assert!(Value::from(3).get("x").is_null());
    }

    #[test]
    fn non_finite_floats_become_null() {
        assert!(Value::from(f64::NAN).is_null());
        assert_eq!(Value::from(2.5).as_f64(), Some(2.5));
    }

    #[test]
    fn map_class_comes_from_tag() {
        let v = Value::map([("@class", Value::from("com.example.Thing"))]);
        assert_eq!(v.class().as_deref(), Some("com.example.Thing"));
        assert_eq!(Value::from("x").class(), None);
    }
}
