//! ValueCodec - ネイティブ値 ⇔ ワイヤ JSON の変換
//!
//! # エンコード（`to_wire`）
//! 宣言型に従って数値・文字列を変換し、オブジェクトはプロパティごとに
//! 再帰します。`_` で始まるプロパティは送りません。
//!
//! # デコード（`from_wire`）
//! 2 フェーズで行います。
//! 1. revive: ノードを全部作り、型付きオブジェクトを (型, id) で索引する
//!    （キーは行きがけ順に予約するので、同じキーが複数あれば外側・先頭が正。
//!    重複側のプロパティは正のほうに無いものだけ補う）
//! 2. link: ツリーを 1 回たどり、Reference と重複オブジェクトを索引の
//!    インスタンスに置き換える。置き換え先が現在たどっている祖先なら
//!    弱参照の Reference のまま残す（Rc の循環を作らない）

use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use serde_json::{Map, Number};
use tracing::debug;

use super::iso8601;
use super::registry::TypeRegistry;
use crate::domain::{ClientError, ObjectId, ObjectKey, Reference, RemoteObject, Value};
use crate::protocol::{is_private, CLASS_TAG, REFERENCE_CLASS};

const INTEGER_TYPES: &[&str] = &[
    "java.lang.Long",
    "java.lang.Integer",
    "java.lang.Short",
    "java.lang.Byte",
    "java.math.BigInteger",
    "long",
    "int",
    "short",
    "byte",
];

const DECIMAL_TYPES: &[&str] = &[
    "java.lang.Double",
    "java.lang.Float",
    "java.math.BigDecimal",
    "double",
    "float",
];

const TEXT_TYPES: &[&str] = &["java.lang.String"];

/// 宣言型から見たワイヤ上の表現
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WireKind {
    Integer,
    Decimal,
    Text,
    Remote,
    Passthrough,
}

pub struct ValueCodec<'a> {
    registry: &'a TypeRegistry,
}

impl<'a> ValueCodec<'a> {
    pub fn new(registry: &'a TypeRegistry) -> Self {
        Self { registry }
    }

    fn kind_of(&self, declared: Option<&str>) -> WireKind {
        match declared {
            Some(t) if INTEGER_TYPES.contains(&t) => WireKind::Integer,
            Some(t) if DECIMAL_TYPES.contains(&t) => WireKind::Decimal,
            Some(t) if TEXT_TYPES.contains(&t) => WireKind::Text,
            Some(t) if self.registry.is_remote_type(t) => WireKind::Remote,
            _ => WireKind::Passthrough,
        }
    }

    /// ネイティブ値を宣言型に従ってワイヤ表現にする
    pub fn to_wire(&self, value: &Value, declared: Option<&str>) -> Result<serde_json::Value, ClientError> {
        self.encode(value, declared, &mut Vec::new())
    }

    fn encode(
        &self,
        value: &Value,
        declared: Option<&str>,
        ancestors: &mut Vec<*const ()>,
    ) -> Result<serde_json::Value, ClientError> {
        let kind = self.kind_of(declared);
        let wire = match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Reference(r) => r.to_wire(),
            Value::Number(n) => match (kind, declared) {
                // id だけ渡された: {型, id} の Reference にする
                (WireKind::Remote, Some(class)) => Reference::new(class, Value::Number(n.clone())).to_wire(),
                (WireKind::Text, _) => serde_json::Value::String(n.to_string()),
                _ => serde_json::Value::Number(n.clone()),
            },
            Value::String(s) => match kind {
                WireKind::Integer => parse_integer(s, declared)?,
                WireKind::Decimal => parse_decimal(s, declared)?,
                _ => serde_json::Value::String(s.clone()),
            },
            Value::Date(d) => serde_json::Value::String(iso8601::format(d)),
            Value::List(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|item| self.encode(item, None, ancestors))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Map(m) => {
                let class = m
                    .get(CLASS_TAG)
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .or_else(|| (kind == WireKind::Remote).then(|| declared.unwrap_or_default().to_string()));
                self.encode_properties(class.as_deref(), m, ancestors)?
            }
            Value::Object(o) => {
                // 自分自身を含むオブジェクトは Reference で切る
                if ancestors.contains(&o.addr()) {
                    return Ok(o.by_reference().to_wire());
                }
                ancestors.push(o.addr());
                let encoded = self.encode_properties(Some(o.class()), &o.properties(), ancestors);
                ancestors.pop();
                encoded?
            }
        };
        Ok(wire)
    }

    fn encode_properties(
        &self,
        class: Option<&str>,
        properties: &BTreeMap<String, Value>,
        ancestors: &mut Vec<*const ()>,
    ) -> Result<serde_json::Value, ClientError> {
        let mut out = Map::new();
        if let Some(class) = class {
            out.insert(CLASS_TAG.to_string(), serde_json::Value::String(class.to_string()));
        }
        for (name, value) in properties {
            if name == CLASS_TAG || is_private(name) {
                continue;
            }
            let declared = class.and_then(|c| self.registry.property_type(c, name));
            out.insert(name.clone(), self.encode(value, declared.as_deref(), ancestors)?);
        }
        Ok(serde_json::Value::Object(out))
    }

    /// 呼び出し対象（target）のペイロード
    ///
    /// 型全体が transferable、または未保存（id なし）なら型タグ + id +
    /// transferable なプロパティを送る。それ以外は Reference で送る。
    pub fn encode_target(&self, target: &RemoteObject) -> Result<serde_json::Value, ClientError> {
        let Some(id) = target.id().filter(|_| !target.is_completely_transferable()) else {
            let properties: BTreeMap<String, Value> = target
                .properties()
                .into_iter()
                .filter(|(name, _)| name == "id" || target.is_transferable(name))
                .collect();
            let mut ancestors = vec![target.addr()];
            return self.encode_properties(Some(target.class()), &properties, &mut ancestors);
        };
        Ok(Reference::new(target.class(), id).to_wire())
    }

    /// ワイヤ JSON を revive し、同じレスポンス内の参照を解決する
    pub fn from_wire(&self, wire: &serde_json::Value) -> Value {
        let mut index = HashMap::new();
        let revived = self.revive(wire, &mut index);
        debug!(objects = index.len(), "revived response");
        let mut linker = Linker {
            index: &index,
            ancestors: Vec::new(),
            visited: HashSet::new(),
        };
        linker.link(revived)
    }

    fn revive(
        &self,
        wire: &serde_json::Value,
        index: &mut HashMap<ObjectKey, RemoteObject>,
    ) -> Value {
        match wire {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.clone()),
            serde_json::Value::String(s) => match iso8601::parse(s) {
                Some(d) => Value::Date(d),
                None => Value::String(s.clone()),
            },
            serde_json::Value::Array(items) => {
                Value::list(items.iter().map(|item| self.revive(item, index)))
            }
            serde_json::Value::Object(map) => self.revive_object(map, index),
        }
    }

    fn revive_object(
        &self,
        map: &Map<String, serde_json::Value>,
        index: &mut HashMap<ObjectKey, RemoteObject>,
    ) -> Value {
        let class = map.get(CLASS_TAG).and_then(serde_json::Value::as_str);
        if class == Some(REFERENCE_CLASS) {
            if let Some(reference) = Reference::from_wire(map) {
                return Value::Reference(reference);
            }
        }

        let (Some(class), Some(descriptor)) = (class, class.and_then(|c| self.registry.type_descriptor(c))) else {
            // 未知の型タグはプレーンなデータのまま
            return Value::Map(self.revive_properties(map, false, index));
        };

        // 子より先にキーを予約する
        let object = RemoteObject::new(class, BTreeMap::new(), Some(descriptor));
        let canonical = match map.get("id").and_then(ObjectId::from_wire) {
            Some(id) => index
                .entry(ObjectKey::new(class, id.to_string()))
                .or_insert_with(|| object.clone())
                .clone(),
            None => object.clone(),
        };

        let properties = self.revive_properties(map, true, index);
        if canonical.ptr_eq(&object) {
            // 内側の重複が先に埋めた値より、自分の値を優先する
            object.merge_properties(properties, true);
        } else {
            object.replace_properties(properties.clone());
            canonical.merge_properties(properties, false);
        }
        Value::Object(object)
    }

    fn revive_properties(
        &self,
        map: &Map<String, serde_json::Value>,
        skip_tag: bool,
        index: &mut HashMap<ObjectKey, RemoteObject>,
    ) -> BTreeMap<String, Value> {
        map.iter()
            .filter(|(name, _)| !(skip_tag && name.as_str() == CLASS_TAG))
            .map(|(name, value)| (name.clone(), self.revive(value, index)))
            .collect()
    }
}

struct Linker<'i> {
    index: &'i HashMap<ObjectKey, RemoteObject>,
    ancestors: Vec<*const ()>,
    visited: HashSet<*const ()>,
}

impl Linker<'_> {
    fn link(&mut self, value: Value) -> Value {
        match value {
            Value::Reference(r) => match r.key().and_then(|k| self.index.get(&k)).cloned() {
                Some(target) => self.link_object(target),
                None => Value::Reference(r),
            },
            Value::Object(o) => {
                let canonical = o
                    .key()
                    .and_then(|k| self.index.get(&k))
                    .cloned()
                    .unwrap_or(o);
                self.link_object(canonical)
            }
            Value::List(items) => {
                let linked = items.iter().cloned().map(|item| self.link(item)).collect::<Vec<_>>();
                Value::List(Rc::new(linked))
            }
            Value::Map(m) => Value::Map(m.into_iter().map(|(k, v)| (k, self.link(v))).collect()),
            other => other,
        }
    }

    fn link_object(&mut self, object: RemoteObject) -> Value {
        let addr = object.addr();
        if self.ancestors.contains(&addr) {
            return Value::Reference(object.by_reference());
        }
        if !self.visited.insert(addr) {
            return Value::Object(object);
        }
        self.ancestors.push(addr);
        let properties = object.take_properties();
        let linked = properties
            .into_iter()
            .map(|(k, v)| (k, self.link(v)))
            .collect();
        object.replace_properties(linked);
        self.ancestors.pop();
        Value::Object(object)
    }
}

fn invalid(s: &str, declared: Option<&str>) -> ClientError {
    ClientError::InvalidNumber {
        value: s.to_string(),
        type_name: declared.unwrap_or_default().to_string(),
    }
}

/// 空文字は null。小数表記は切り捨てて整数にする
fn parse_integer(s: &str, declared: Option<&str>) -> Result<serde_json::Value, ClientError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Ok(serde_json::Value::Null);
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return Ok(serde_json::Value::Number(n.into()));
    }
    // i64 に収まらない値は丸めずにエラー
    const BOUND: f64 = 9_223_372_036_854_775_808.0;
    match trimmed.parse::<f64>().map(f64::trunc) {
        Ok(f) if f.is_finite() && (-BOUND..BOUND).contains(&f) => Ok(serde_json::Value::Number((f as i64).into())),
        _ => Err(invalid(s, declared)),
    }
}

fn parse_decimal(s: &str, declared: Option<&str>) -> Result<serde_json::Value, ClientError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Ok(serde_json::Value::Null);
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(serde_json::Value::Number)
        .ok_or_else(|| invalid(s, declared))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::bank_client;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case::long_from_string(Value::from("42"), "java.lang.Long", json!(42))]
    #[case::int_truncates(Value::from("7.9"), "int", json!(7))]
    #[case::empty_is_null(Value::from(""), "java.lang.Integer", json!(null))]
    #[case::decimal_from_string(Value::from("2.5"), "java.lang.Double", json!(2.5))]
    #[case::number_to_text(Value::from(12), "java.lang.String", json!("12"))]
    #[case::unknown_type_passes(Value::from("abc"), "java.util.UUID", json!("abc"))]
    #[case::null_stays_null(Value::Null, "java.lang.Long", json!(null))]
    fn primitives_follow_declared_type(#[case] value: Value, #[case] declared: &str, #[case] expected: serde_json::Value) {
        let client = bank_client();
        let registry = client.registry();
        let codec = ValueCodec::new(&registry);
        assert_eq!(codec.to_wire(&value, Some(declared)).unwrap(), expected);
    }

    #[rstest]
    #[case::not_a_number("ten", "java.lang.Long")]
    #[case::beyond_long("99999999999999999999", "java.lang.Long")]
    #[case::beyond_long_negative("-1e19", "int")]
    #[case::infinite("1e400", "java.lang.Integer")]
    fn unusable_integer_text_is_an_error(#[case] text: &str, #[case] declared: &str) {
        let client = bank_client();
        let registry = client.registry();
        let codec = ValueCodec::new(&registry);
        let err = codec.to_wire(&Value::from(text), Some(declared)).unwrap_err();
        assert!(matches!(err, ClientError::InvalidNumber { value, .. } if value == text));
    }

    #[test]
    fn number_with_remote_type_becomes_reference() {
        let client = bank_client();
        let registry = client.registry();
        let codec = ValueCodec::new(&registry);
        let wire = codec
            .to_wire(&Value::from(5), Some("com.example.bank.Branch"))
            .unwrap();
        assert_eq!(
            wire,
            json!({"@class": REFERENCE_CLASS, "stub": {"@class": "com.example.bank.Branch", "id": 5}})
        );
    }

    #[test]
    fn objects_skip_private_properties_and_convert_by_property_type() {
        let client = bank_client();
        let account = client.instantiate(
            "com.example.bank.Account",
            BTreeMap::from([
                ("number".to_string(), Value::from(1001)),
                ("_cache".to_string(), Value::from("secret")),
            ]),
        );
        let registry = client.registry();
        let codec = ValueCodec::new(&registry);
        let wire = codec.to_wire(&Value::Object(account), None).unwrap();
        assert_eq!(wire, json!({"@class": "com.example.bank.Account", "number": "1001"}));
    }

    #[test]
    fn self_containing_object_is_cut_with_reference() {
        let client = bank_client();
        let branch = client.instantiate(
            "com.example.bank.Branch",
            BTreeMap::from([("id".to_string(), Value::from(1))]),
        );
        branch.set("self", branch.clone());
        let registry = client.registry();
        let codec = ValueCodec::new(&registry);
        let wire = codec.to_wire(&Value::Object(branch.clone()), None).unwrap();
        assert_eq!(wire["self"]["@class"], REFERENCE_CLASS);
        // テスト用に作った循環を切る
        branch.remove("self");
    }

    #[test]
    fn target_is_sent_by_reference_unless_transferable() {
        let client = bank_client();
        let branch = client.instantiate(
            "com.example.bank.Branch",
            BTreeMap::from([("id".to_string(), Value::from(3)), ("name".to_string(), Value::from("Main"))]),
        );
        let customer = client.instantiate(
            "com.example.bank.Customer",
            BTreeMap::from([("id".to_string(), Value::from(9)), ("name".to_string(), Value::from("Ann"))]),
        );
        let fresh = client.instantiate(
            "com.example.bank.Branch",
            BTreeMap::from([("name".to_string(), Value::from("New")), ("manager".to_string(), Value::from("x"))]),
        );
        let registry = client.registry();
        let codec = ValueCodec::new(&registry);

        assert_eq!(codec.encode_target(&branch).unwrap()["@class"], REFERENCE_CLASS);
        assert_eq!(
            codec.encode_target(&customer).unwrap(),
            json!({"@class": "com.example.bank.Customer", "id": 9, "name": "Ann"})
        );
        // 未保存: transferable な name だけ
        assert_eq!(
            codec.encode_target(&fresh).unwrap(),
            json!({"@class": "com.example.bank.Branch", "name": "New"})
        );
    }

    #[test]
    fn revives_typed_objects_dates_and_plain_maps() {
        let client = bank_client();
        let registry = client.registry();
        let codec = ValueCodec::new(&registry);
        let value = codec.from_wire(
            &json!({
                "@class": "com.example.bank.Account",
                "id": 1,
                "opened": "2010-06-01T12:00:00.000+0000",
                "extra": {"@class": "com.example.Unknown", "x": 1}
            }),
        );
        let account = value.as_object().unwrap();
        assert_eq!(account.class(), "com.example.bank.Account");
        assert!(account.get("opened").as_date().is_some());
        assert!(account.get("@class").is_null());
        assert_eq!(account.get("extra").class().as_deref(), Some("com.example.Unknown"));
        assert!(account.get("extra").as_map().is_some());
    }

    #[test]
    fn duplicates_and_references_resolve_to_one_instance() {
        let client = bank_client();
        let registry = client.registry();
        let codec = ValueCodec::new(&registry);
        let value = codec.from_wire(
            &json!([
                {"@class": "com.example.bank.Branch", "id": 4, "name": "first"},
                {"@class": "com.example.bank.Branch", "id": 4, "name": "second"},
                {"@class": REFERENCE_CLASS, "stub": {"@class": "com.example.bank.Branch", "id": 4}}
            ]),
        );
        let items = value.as_list().unwrap();
        let first = items[0].as_object().unwrap();
        assert!(items[1].as_object().unwrap().ptr_eq(first));
        assert!(items[2].as_object().unwrap().ptr_eq(first));
        assert_eq!(first.get("name"), Value::from("first"));
    }

    #[test]
    fn nested_duplicate_does_not_replace_outer_object() {
        let client = bank_client();
        let registry = client.registry();
        let codec = ValueCodec::new(&registry);
        let value = codec.from_wire(&json!({
            "@class": "com.example.bank.Branch",
            "id": 4,
            "name": "outer",
            "accounts": [{
                "@class": "com.example.bank.Account",
                "id": 10,
                "branch": {"@class": "com.example.bank.Branch", "id": 4, "name": "inner", "extra": "x"}
            }]
        }));
        let branch = value.as_object().unwrap().clone();
        assert_eq!(branch.get("name"), Value::from("outer"));
        let accounts = branch.get("accounts");
        assert_eq!(accounts.as_list().unwrap().len(), 1);
        let back = accounts.as_list().unwrap()[0].get("branch");
        assert!(back.resolve_object().unwrap().ptr_eq(&branch));
        // 内側にしか無いプロパティは正のほうへ補われる
        assert_eq!(branch.get("extra"), Value::from("x"));
    }

    #[test]
    fn back_references_stay_weak() {
        let client = bank_client();
        let registry = client.registry();
        let codec = ValueCodec::new(&registry);
        let value = codec.from_wire(
            &json!({
                "@class": "com.example.bank.Branch",
                "id": 1,
                "accounts": [{
                    "@class": "com.example.bank.Account",
                    "id": 10,
                    "branch": {"@class": REFERENCE_CLASS, "stub": {"@class": "com.example.bank.Branch", "id": 1}}
                }]
            }),
        );
        let branch = value.as_object().unwrap().clone();
        let account = branch.get("accounts").as_list().unwrap()[0].clone();
        let back = account.get("branch");
        assert!(back.as_reference().is_some());
        assert!(back.resolve_object().unwrap().ptr_eq(&branch));
    }

    #[test]
    fn unresolved_references_are_left_alone() {
        let client = bank_client();
        let registry = client.registry();
        let codec = ValueCodec::new(&registry);
        let value = codec.from_wire(
            &json!({"@class": REFERENCE_CLASS, "stub": {"@class": "com.example.bank.Branch", "id": 99}}),
        );
        let r = value.as_reference().unwrap();
        assert!(!r.is_resolved());
        assert_eq!(r.key(), Some(ObjectKey::new("com.example.bank.Branch", "99")));
    }

    #[test]
    fn dates_round_trip_through_the_wire() {
        let client = bank_client();
        let registry = client.registry();
        let codec = ValueCodec::new(&registry);
        let original = "2010-06-01T12:00:00.000+0000";
        let revived = codec.from_wire(&json!(original));
        assert!(revived.as_date().is_some());
        assert_eq!(codec.to_wire(&revived, None).unwrap(), json!(original));
    }
}
