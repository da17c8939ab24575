//! TypeRegistry - サーバ公開型のメタデータ管理
//!
//! # 名前空間
//! - ドット区切りの各セグメントが 1 階層になる（`com.example.bank.Branch`）
//! - インスタンスメソッドは `<型>.prototype.<メソッド>`、
//!   static メソッドは `<型>.<メソッド>` に登録される
//! - 中間の名前空間は登録時に必要に応じて作られる
//!
//! # 上書きポリシー
//! 同じパスへの再登録は後勝ち。バインディングは何度でも追加ロードできます。

use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{ClientError, MethodDescriptor, TypeDescriptor};

/// 名前空間の葉に置かれるもの
#[derive(Debug, Clone)]
pub enum Entry {
    Type(Rc<TypeDescriptor>),
    Method(Rc<MethodDescriptor>),
}

#[derive(Debug, Default)]
struct Namespace {
    entry: Option<Entry>,
    children: BTreeMap<String, Namespace>,
}

/// 生成済みバインディング（JSON）のトップレベル
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bindings {
    #[serde(default)]
    pub types: Vec<TypeDescriptor>,
}

/// TypeRegistry は型・メソッドのメタデータを階層的に保持
///
/// # 使用例
/// ```ignore
/// let mut registry = TypeRegistry::new();
/// registry.register_type(TypeDescriptor::new("com.example.bank.Branch"));
/// assert!(registry.is_remote_type("com.example.bank.Branch"));
/// ```
#[derive(Debug, Default)]
pub struct TypeRegistry {
    root: Namespace,
}

const PROTOTYPE: &str = "prototype";

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `qualified_name` に entry を置く（既存なら上書き）
    pub fn register(&mut self, qualified_name: &str, entry: Entry) {
        let mut current = &mut self.root;
        for segment in qualified_name.split('.') {
            current = current.children.entry(segment.to_string()).or_default();
        }
        if current.entry.replace(entry).is_some() {
            debug!(name = qualified_name, "replaced existing registration");
        }
    }

    /// 未登録なら None（panic しない）
    pub fn resolve(&self, qualified_name: &str) -> Option<&Entry> {
        let mut current = &self.root;
        for segment in qualified_name.split('.') {
            current = current.children.get(segment)?;
        }
        current.entry.as_ref()
    }

    /// 型とそのメソッドをまとめて登録
    pub fn register_type(&mut self, descriptor: TypeDescriptor) {
        debug!(name = %descriptor.name, methods = descriptor.methods.len(), "registering type");
        let name = descriptor.name.clone();
        for method in &descriptor.methods {
            let path = if method.is_static {
                format!("{name}.{}", method.name)
            } else {
                format!("{name}.{PROTOTYPE}.{}", method.name)
            };
            self.register(&path, Entry::Method(Rc::new(method.clone())));
        }
        self.register(&name, Entry::Type(Rc::new(descriptor)));
    }

    /// JSON バインディングを読み込み、登録した型の数を返す
    pub fn load_bindings(&mut self, json: &str) -> Result<usize, ClientError> {
        let bindings: Bindings = serde_json::from_str(json).map_err(ClientError::Bindings)?;
        let count = bindings.types.len();
        for descriptor in bindings.types {
            self.register_type(descriptor);
        }
        Ok(count)
    }

    pub fn type_descriptor(&self, name: &str) -> Option<Rc<TypeDescriptor>> {
        match self.resolve(name)? {
            Entry::Type(t) => Some(t.clone()),
            Entry::Method(_) => None,
        }
    }

    pub fn is_remote_type(&self, name: &str) -> bool {
        self.type_descriptor(name).is_some()
    }

    /// メソッドを解決。見つからなければ親型をたどる
    pub fn resolve_method(
        &self,
        class: &str,
        method: &str,
        is_static: bool,
    ) -> Option<Rc<MethodDescriptor>> {
        self.lineage(class).into_iter().find_map(|name| {
            let path = if is_static {
                format!("{name}.{method}")
            } else {
                format!("{name}.{PROTOTYPE}.{method}")
            };
            match self.resolve(&path)? {
                Entry::Method(m) => Some(m.clone()),
                Entry::Type(_) => None,
            }
        })
    }

    /// プロパティの宣言型。見つからなければ親型をたどる
    pub fn property_type(&self, class: &str, property: &str) -> Option<String> {
        self.lineage(class).into_iter().find_map(|name| {
            self.type_descriptor(&name)
                .and_then(|d| d.property_types.get(property).cloned())
        })
    }

    /// 登録済みの型名（ソート済み）
    pub fn registered_types(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect_types(&self.root, &mut Vec::new(), &mut out);
        out.sort();
        out
    }

    /// class 自身と、その親をたどった型名の列（循環は打ち切る）
    fn lineage(&self, class: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut chain = Vec::new();
        let mut next = Some(class.to_string());
        while let Some(name) = next.take() {
            if !seen.insert(name.clone()) {
                break;
            }
            next = self.type_descriptor(&name).and_then(|d| d.parent.clone());
            chain.push(name);
        }
        chain
    }
}

fn collect_types<'a>(ns: &'a Namespace, path: &mut Vec<&'a str>, out: &mut Vec<String>) {
    if let Some(Entry::Type(_)) = ns.entry {
        out.push(path.join("."));
    }
    for (segment, child) in &ns.children {
        path.push(segment);
        collect_types(child, path, out);
        path.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ParameterDescriptor;

    fn branch() -> TypeDescriptor {
        TypeDescriptor::new("com.example.bank.Branch")
            .with_property("name", "java.lang.String")
            .with_method(MethodDescriptor::instance("getAccounts"))
            .with_method(MethodDescriptor::static_method("findAll"))
    }

    #[test]
    fn register_and_resolve() {
        let mut registry = TypeRegistry::new();
        registry.register_type(branch());

        assert!(registry.is_remote_type("com.example.bank.Branch"));
        assert!(registry.resolve_method("com.example.bank.Branch", "getAccounts", false).is_some());
        assert!(registry.resolve_method("com.example.bank.Branch", "findAll", true).is_some());
        assert!(registry.resolve_method("com.example.bank.Branch", "findAll", false).is_none());
    }

    #[test]
    fn namespaces_are_not_types() {
        let mut registry = TypeRegistry::new();
        registry.register_type(branch());
        assert!(registry.resolve("com.example").is_none());
        assert!(!registry.is_remote_type("com.example.bank"));
        assert!(registry.resolve("com.example.nothing.Here").is_none());
    }

    #[test]
    fn last_registration_wins() {
        let mut registry = TypeRegistry::new();
        registry.register_type(branch());
        registry.register_type(
            TypeDescriptor::new("com.example.bank.Branch").with_property("name", "java.lang.Long"),
        );
        assert_eq!(
            registry.property_type("com.example.bank.Branch", "name").as_deref(),
            Some("java.lang.Long")
        );
    }

    #[test]
    fn methods_and_properties_are_inherited() {
        let mut registry = TypeRegistry::new();
        registry.register_type(
            TypeDescriptor::new("com.example.Entity")
                .with_property("id", "java.lang.Long")
                .with_method(
                    MethodDescriptor::instance("save")
                        .with_param(ParameterDescriptor::new("flush", "boolean")),
                ),
        );
        registry.register_type(TypeDescriptor::new("com.example.Person").with_parent("com.example.Entity"));

        assert!(registry.resolve_method("com.example.Person", "save", false).is_some());
        assert_eq!(
            registry.property_type("com.example.Person", "id").as_deref(),
            Some("java.lang.Long")
        );
    }

    #[test]
    fn parent_cycles_terminate() {
        let mut registry = TypeRegistry::new();
        registry.register_type(TypeDescriptor::new("a.A").with_parent("a.B"));
        registry.register_type(TypeDescriptor::new("a.B").with_parent("a.A"));
        assert!(registry.resolve_method("a.A", "missing", false).is_none());
    }

    #[test]
    fn registered_types_lists_types_only() {
        let mut registry = TypeRegistry::new();
        registry.register_type(branch());
        registry.register_type(TypeDescriptor::new("com.example.bank.Account"));
        assert_eq!(
            registry.registered_types(),
            vec!["com.example.bank.Account".to_string(), "com.example.bank.Branch".to_string()]
        );
    }

    #[test]
    fn load_bindings_rejects_bad_json() {
        let mut registry = TypeRegistry::new();
        assert!(matches!(registry.load_bindings("{"), Err(ClientError::Bindings(_))));
        assert_eq!(registry.load_bindings(r#"{"types": [{"name": "x.Y"}]}"#).unwrap(), 1);
        assert!(registry.is_remote_type("x.Y"));
    }
}
