//! Domain model (values, remote objects, references, descriptors, errors).
//!
//! 通信やレジストリを前提にしない「形」だけを定義します。
//! 例外として `RemoteObject` はリモート呼び出しのために所属する `Client` を保持します。

pub mod value;
pub mod object;
pub mod reference;
pub mod descriptor;
pub mod exception;
pub mod errors;
pub mod validation_error;

pub use self::value::Value;
pub use self::object::RemoteObject;
pub use self::reference::{ObjectId, ObjectKey, Reference};
pub use self::descriptor::{
    MethodDescriptor, ParameterDescriptor, RuleConfig, RuleSet, TypeDescriptor,
};
pub use self::exception::{ExceptionHandlers, RemoteException};
pub use self::errors::{ClientError, TransportError, TransportErrorKind};
pub use self::validation_error::ValidationError;
