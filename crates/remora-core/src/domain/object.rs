//! RemoteObject - サーバ側エンティティのクライアント側プロキシ
//!
//! 型タグ・id・宣言済みプロパティを保持するだけのデータです。リモート
//! メソッドの呼び出しは `Client::remote` / `Client::method` から行います。
//!
//! # 所有権
//! - `RemoteObject` は `Rc` ハンドル。clone しても同じ実体を指す
//! - 逆方向の参照（循環）は `Reference` が `WeakObject` で持つので、
//!   強参照のサイクルはできない

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use super::descriptor::TypeDescriptor;
use super::reference::{ObjectId, ObjectKey, Reference};
use super::value::Value;

struct ObjectInner {
    class: String,
    descriptor: Option<Rc<TypeDescriptor>>,
    properties: RefCell<BTreeMap<String, Value>>,
}

#[derive(Clone)]
pub struct RemoteObject {
    inner: Rc<ObjectInner>,
}

/// RemoteObject への非所有参照
#[derive(Clone)]
pub(crate) struct WeakObject(Weak<ObjectInner>);

impl WeakObject {
    pub(crate) fn upgrade(&self) -> Option<RemoteObject> {
        self.0.upgrade().map(|inner| RemoteObject { inner })
    }
}

impl RemoteObject {
    pub(crate) fn new(
        class: impl Into<String>,
        properties: BTreeMap<String, Value>,
        descriptor: Option<Rc<TypeDescriptor>>,
    ) -> Self {
        Self {
            inner: Rc::new(ObjectInner {
                class: class.into(),
                descriptor,
                properties: RefCell::new(properties),
            }),
        }
    }

    pub fn class(&self) -> &str {
        &self.inner.class
    }

    pub fn descriptor(&self) -> Option<&Rc<TypeDescriptor>> {
        self.inner.descriptor.as_ref()
    }

    /// 永続化済みなら id（null は未保存扱い）
    pub fn id(&self) -> Option<Value> {
        let id = self.get("id");
        (!id.is_null()).then_some(id)
    }

    pub fn key(&self) -> Option<ObjectKey> {
        self.id()
            .and_then(|id| ObjectId::from_value(&id))
            .map(|id| ObjectKey::new(self.class(), id.to_string()))
    }

    pub fn get(&self, property: &str) -> Value {
        self.inner
            .properties
            .borrow()
            .get(property)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set(&self, property: impl Into<String>, value: impl Into<Value>) {
        self.inner
            .properties
            .borrow_mut()
            .insert(property.into(), value.into());
    }

    pub fn remove(&self, property: &str) -> Option<Value> {
        self.inner.properties.borrow_mut().remove(property)
    }

    pub fn properties(&self) -> BTreeMap<String, Value> {
        self.inner.properties.borrow().clone()
    }

    pub(crate) fn take_properties(&self) -> BTreeMap<String, Value> {
        std::mem::take(&mut *self.inner.properties.borrow_mut())
    }

    pub(crate) fn replace_properties(&self, properties: BTreeMap<String, Value>) {
        *self.inner.properties.borrow_mut() = properties;
    }

    /// `properties` を取り込む。`overwrite` でなければ、未設定（null を含む）の
    /// プロパティだけを埋める
    pub(crate) fn merge_properties(&self, properties: BTreeMap<String, Value>, overwrite: bool) {
        let mut current = self.inner.properties.borrow_mut();
        for (name, value) in properties {
            match current.get(&name) {
                Some(existing) if !overwrite && !existing.is_null() => {}
                _ => {
                    current.insert(name, value);
                }
            }
        }
    }

    /// 型全体が transferable なら、call target として丸ごと送る
    pub fn is_completely_transferable(&self) -> bool {
        self.inner
            .descriptor
            .as_ref()
            .is_some_and(|d| d.completely_transferable)
    }

    pub fn is_transferable(&self, property: &str) -> bool {
        self.inner.descriptor.as_ref().is_some_and(|d| {
            d.completely_transferable || d.transferable_properties.contains(property)
        })
    }

    /// この RemoteObject を指す解決済みの Reference
    pub fn by_reference(&self) -> Reference {
        Reference::new(self.class(), self.id().unwrap_or_default()).resolved_to(self)
    }

    pub fn ptr_eq(&self, other: &RemoteObject) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn addr(&self) -> *const () {
        Rc::as_ptr(&self.inner) as *const ()
    }

    pub(crate) fn downgrade(&self) -> WeakObject {
        WeakObject(Rc::downgrade(&self.inner))
    }
}

impl fmt::Debug for RemoteObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteObject")
            .field("class", &self.inner.class)
            .field("id", &self.id())
            .finish()
    }
}
