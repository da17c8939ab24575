//! Wire protocol: tag names, the call descriptor, and the response envelope.
//!
//! Class names here are the server's; they must match byte-for-byte.

use serde::{Deserialize, Serialize};

use crate::domain::ClientError;

/// Key carrying the fully-qualified type name of a wire object.
pub const CLASS_TAG: &str = "@class";

pub const CALL_CLASS: &str = "org.mwanzia.Call";
pub const REFERENCE_CLASS: &str = "org.mwanzia.extras.jpa.Reference";
pub const REMOTE_EXCEPTION_CLASS: &str = "org.mwanzia.MwanziaException";
pub const VALIDATION_EXCEPTION_CLASS: &str = "org.mwanzia.extras.validation.ValidationException";
pub const VALIDATION_ERROR_CLASS: &str = "org.mwanzia.extras.validation.ValidationError";

/// Properties starting with this prefix are client bookkeeping and never serialized.
pub const PRIVATE_PREFIX: char = '_';

pub fn is_private(property: &str) -> bool {
    property.starts_with(PRIVATE_PREFIX)
}

/// One remote call, as sent in the `call` form field.
///
/// Built once per call attempt and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallDescriptor {
    #[serde(rename = "@class")]
    pub class_tag: String,

    #[serde(rename = "targetClass")]
    pub target_class: String,

    /// `None` for static calls.
    pub target: Option<serde_json::Value>,

    pub method: String,

    pub arguments: Vec<serde_json::Value>,
}

impl CallDescriptor {
    pub fn new(
        target_class: impl Into<String>,
        target: Option<serde_json::Value>,
        method: impl Into<String>,
        arguments: Vec<serde_json::Value>,
    ) -> Self {
        Self {
            class_tag: CALL_CLASS.to_string(),
            target_class: target_class.into(),
            target,
            method: method.into(),
            arguments,
        }
    }

    pub fn is_static(&self) -> bool {
        self.target.is_none()
    }

    /// `Class.method`, the key loopback handlers are registered under.
    pub fn route(&self) -> String {
        format!("{}.{}", self.target_class, self.method)
    }

    pub fn to_json(&self) -> Result<String, ClientError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Response body: `{"result": ...}` or `{"exception": ...}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<serde_json::Value>,
}

impl ResponseEnvelope {
    pub fn success(result: serde_json::Value) -> Self {
        Self {
            result: Some(result),
            exception: None,
        }
    }

    pub fn exception(exception: serde_json::Value) -> Self {
        Self {
            result: None,
            exception: Some(exception),
        }
    }
}
