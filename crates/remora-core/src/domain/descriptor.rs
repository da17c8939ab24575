//! Type descriptors: metadata for server-exposed types.
//!
//! Descriptors are plain data so that bindings can be generated elsewhere
//! and loaded as JSON (see `types::registry::Bindings`).

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Per-type metadata, immutable once registered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDescriptor {
    /// Fully-qualified, dot-separated type name.
    pub name: String,

    /// Supertype whose methods and property types are inherited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    /// Instances are sent whole as call targets instead of by reference.
    #[serde(default)]
    pub completely_transferable: bool,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub transferable_properties: BTreeSet<String>,

    /// Property name -> declared property type.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub property_types: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<MethodDescriptor>,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.property_types.insert(name.into(), type_name.into());
        self
    }

    pub fn with_transferable(mut self, name: impl Into<String>) -> Self {
        self.transferable_properties.insert(name.into());
        self
    }

    pub fn completely_transferable(mut self) -> Self {
        self.completely_transferable = true;
        self
    }

    pub fn with_method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    pub fn method(&self, name: &str, is_static: bool) -> Option<&MethodDescriptor> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.is_static == is_static)
    }
}

/// A remotely callable method with its ordered parameter list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub name: String,

    #[serde(rename = "static", default)]
    pub is_static: bool,

    #[serde(default)]
    pub parameters: Vec<ParameterDescriptor>,
}

impl MethodDescriptor {
    pub fn instance(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_static: false,
            parameters: Vec::new(),
        }
    }

    pub fn static_method(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_static: true,
            parameters: Vec::new(),
        }
    }

    pub fn with_param(mut self, parameter: ParameterDescriptor) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().map(|p| p.name.as_str())
    }

    /// Zero-argument `getX` / `isX` methods map onto the lazy property `x`.
    pub fn accessor_property(&self) -> Option<String> {
        if !self.parameters.is_empty() || self.is_static {
            return None;
        }
        let rest = self
            .name
            .strip_prefix("get")
            .or_else(|| self.name.strip_prefix("is"))?;
        let mut chars = rest.chars();
        let first = chars.next()?;
        Some(first.to_lowercase().chain(chars).collect())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,

    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validations: Option<RuleSet>,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            validations: None,
        }
    }

    pub fn with_rule(mut self, rule: impl Into<String>, config: RuleConfig) -> Self {
        self.validations
            .get_or_insert_with(RuleSet::new)
            .insert(rule.into(), config);
        self
    }
}

/// Rule name (`Required`, `Length`, ...) -> rule configuration.
pub type RuleSet = BTreeMap<String, RuleConfig>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<usize>,

    /// Sub-field rules for `AssertValid`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_validations: Option<BTreeMap<String, RuleSet>>,
}

impl RuleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_min(mut self, min: usize) -> Self {
        self.min = Some(min);
        self
    }

    pub fn with_max(mut self, max: usize) -> Self {
        self.max = Some(max);
        self
    }

    pub fn with_target(mut self, field: impl Into<String>, rules: RuleSet) -> Self {
        self.target_validations
            .get_or_insert_with(BTreeMap::new)
            .insert(field.into(), rules);
        self
    }
}
