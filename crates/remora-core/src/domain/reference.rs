//! Reference - {type, id} だけを運ぶ軽量な代理
//!
//! 引数として渡すときはオブジェクトグラフ全体の代わりに、
//! revive 時には共有・循環参照の表現として使います。
//! Reference は参照先を所有しません（解決結果は Weak で保持）。

use std::fmt;

use serde_json::{json, Number};

use super::object::{RemoteObject, WeakObject};
use super::value::Value;
use crate::protocol::{CLASS_TAG, REFERENCE_CLASS};

/// (型, id) の組。revive 時のオブジェクト索引キー
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub class: String,
    pub id: String,
}

impl ObjectKey {
    pub fn new(class: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.class, self.id)
    }
}

/// Reference が運ぶ id。数値か文字列のみ
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectId {
    Number(Number),
    Text(String),
}

impl ObjectId {
    /// 数値・文字列以外は id として扱わない
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(ObjectId::Number(n.clone())),
            Value::String(s) => Some(ObjectId::Text(s.clone())),
            _ => None,
        }
    }

    pub fn from_wire(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => Some(ObjectId::Number(n.clone())),
            serde_json::Value::String(s) => Some(ObjectId::Text(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            ObjectId::Number(n) => Value::Number(n.clone()),
            ObjectId::Text(s) => Value::String(s.clone()),
        }
    }

    pub fn to_wire(&self) -> serde_json::Value {
        match self {
            ObjectId::Number(n) => serde_json::Value::Number(n.clone()),
            ObjectId::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectId::Number(n) => n.fmt(f),
            ObjectId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Clone)]
pub struct Reference {
    class: String,
    id: Option<ObjectId>,
    target: Option<WeakObject>,
}

impl Reference {
    /// id が数値・文字列でなければ未保存扱い（key を持たない）
    pub fn new(class: impl Into<String>, id: impl Into<Value>) -> Self {
        Self {
            class: class.into(),
            id: ObjectId::from_value(&id.into()),
            target: None,
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn id(&self) -> Option<&ObjectId> {
        self.id.as_ref()
    }

    pub fn key(&self) -> Option<ObjectKey> {
        self.id
            .as_ref()
            .map(|id| ObjectKey::new(self.class.clone(), id.to_string()))
    }

    /// 同じレスポンス内で revive されたオブジェクトに結び付けた Reference を返す
    pub(crate) fn resolved_to(&self, object: &RemoteObject) -> Self {
        Self {
            class: self.class.clone(),
            id: self.id.clone(),
            target: Some(object.downgrade()),
        }
    }

    /// 参照先。未解決、または参照先がすでに破棄されていれば None
    pub fn get(&self) -> Option<RemoteObject> {
        self.target.as_ref().and_then(WeakObject::upgrade)
    }

    pub fn is_resolved(&self) -> bool {
        self.get().is_some()
    }

    /// `{"@class": Reference, "stub": {"@class": 型, "id": id}}`
    pub fn to_wire(&self) -> serde_json::Value {
        let id = self.id.as_ref().map_or(serde_json::Value::Null, ObjectId::to_wire);
        json!({
            CLASS_TAG: REFERENCE_CLASS,
            "stub": { CLASS_TAG: self.class, "id": id },
        })
    }

    /// `to_wire` の逆。stub が無い、または型タグが無ければ None
    pub fn from_wire(map: &serde_json::Map<String, serde_json::Value>) -> Option<Self> {
        let stub = map.get("stub")?.as_object()?;
        let class = stub.get(CLASS_TAG)?.as_str()?;
        Some(Self {
            class: class.to_string(),
            id: stub.get("id").and_then(ObjectId::from_wire),
            target: None,
        })
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reference")
            .field("class", &self.class)
            .field("id", &self.id)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape_wraps_stub() {
        let r = Reference::new("com.example.bank.Branch", 7);
        let wire = r.to_wire();
        assert_eq!(wire["@class"], REFERENCE_CLASS);
        assert_eq!(wire["stub"]["@class"], "com.example.bank.Branch");
        assert_eq!(wire["stub"]["id"], 7);
    }

    #[test]
    fn from_wire_reads_stub() {
        let wire = json!({"@class": REFERENCE_CLASS, "stub": {"@class": "a.B", "id": "x1"}});
        let r = Reference::from_wire(wire.as_object().unwrap()).unwrap();
        assert_eq!(r.class(), "a.B");
        assert_eq!(r.key(), Some(ObjectKey::new("a.B", "x1")));
        assert!(!r.is_resolved());
    }

    #[test]
    fn from_wire_without_stub_is_none() {
        let wire = json!({"@class": REFERENCE_CLASS});
        assert!(Reference::from_wire(wire.as_object().unwrap()).is_none());
    }

    #[test]
    fn null_id_has_no_key() {
        assert_eq!(Reference::new("a.B", Value::Null).key(), None);
    }

    #[test]
    fn only_scalar_ids_are_kept() {
        let numeric = Reference::new("a.B", 7);
        assert_eq!(numeric.id(), Some(&ObjectId::Number(7.into())));
        assert_eq!(numeric.id().map(ObjectId::to_value), Some(Value::from(7)));
        assert_eq!(Reference::new("a.B", "k-1").key(), Some(ObjectKey::new("a.B", "k-1")));
        // 入れ子の値は id にならない
        assert_eq!(Reference::new("a.B", Value::list(vec![Value::from(1)])).id(), None);
        assert_eq!(ObjectId::from_wire(&json!({"id": 1})), None);
    }
}
