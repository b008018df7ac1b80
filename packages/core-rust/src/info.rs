//! Introspected metadata describing a managed object's management surface.
//!
//! An [`MBeanInfo`] is what the registry exposes about a managed object: its
//! declared class name plus the attributes, operations, constructors and
//! notifications it supports.

use serde::{Deserialize, Serialize};

use crate::name::ObjectName;
use crate::value::Value;

/// Full management description of one managed object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MBeanInfo {
    /// Declared class name of the managed object. Never empty for a
    /// compliant object.
    pub class_name: String,
    pub description: String,
    pub attributes: Vec<AttributeInfo>,
    pub operations: Vec<OperationInfo>,
    pub constructors: Vec<ConstructorInfo>,
    pub notifications: Vec<NotificationInfo>,
}

impl MBeanInfo {
    /// Creates metadata with no members.
    #[must_use]
    pub fn new(class_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            description: description.into(),
            attributes: Vec::new(),
            operations: Vec::new(),
            constructors: Vec::new(),
            notifications: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, attribute: AttributeInfo) -> Self {
        self.attributes.push(attribute);
        self
    }

    #[must_use]
    pub fn with_operation(mut self, operation: OperationInfo) -> Self {
        self.operations.push(operation);
        self
    }

    #[must_use]
    pub fn with_constructor(mut self, constructor: ConstructorInfo) -> Self {
        self.constructors.push(constructor);
        self
    }

    #[must_use]
    pub fn with_notification(mut self, notification: NotificationInfo) -> Self {
        self.notifications.push(notification);
        self
    }

    /// Looks up an attribute descriptor by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeInfo> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Looks up an operation by name and exact parameter type signature.
    #[must_use]
    pub fn operation(&self, name: &str, signature: &[String]) -> Option<&OperationInfo> {
        self.operations.iter().find(|op| {
            op.name == name
                && op.signature.len() == signature.len()
                && op
                    .signature
                    .iter()
                    .zip(signature)
                    .all(|(param, ty)| &param.type_name == ty)
        })
    }
}

/// Describes one attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeInfo {
    pub name: String,
    /// Type label, matching [`Value::type_name`] for built-in kinds.
    pub type_name: String,
    pub description: String,
    pub readable: bool,
    pub writable: bool,
    /// Boolean attribute exposed through an `is`-style getter.
    pub is_getter: bool,
}

impl AttributeInfo {
    #[must_use]
    pub fn read_only(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            description: String::new(),
            readable: true,
            writable: false,
            is_getter: false,
        }
    }

    #[must_use]
    pub fn read_write(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            writable: true,
            ..Self::read_only(name, type_name)
        }
    }

    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Effect an operation has on the managed object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Impact {
    /// Read-like: returns information, no state change.
    Info,
    /// Write-like: changes state, returns nothing meaningful.
    Action,
    ActionInfo,
    Unknown,
}

/// One operation parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub name: String,
    pub type_name: String,
}

impl ParameterInfo {
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Describes one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationInfo {
    pub name: String,
    pub description: String,
    pub signature: Vec<ParameterInfo>,
    pub return_type: String,
    pub impact: Impact,
}

impl OperationInfo {
    #[must_use]
    pub fn new(name: impl Into<String>, return_type: impl Into<String>, impact: Impact) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            signature: Vec::new(),
            return_type: return_type.into(),
            impact,
        }
    }

    #[must_use]
    pub fn with_param(mut self, param: ParameterInfo) -> Self {
        self.signature.push(param);
        self
    }
}

/// Describes a public constructor of the managed object's class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructorInfo {
    pub name: String,
    pub description: String,
    pub signature: Vec<ParameterInfo>,
}

/// Describes a family of notifications the object may emit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationInfo {
    /// Notification type strings, e.g. `"JMX.mbean.registered"`.
    pub types: Vec<String>,
    /// Name of the notification class.
    pub name: String,
    pub description: String,
}

/// A registered object's name and declared class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectInstance {
    pub name: ObjectName,
    pub class_name: String,
}

/// A named attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: Value,
}

impl Attribute {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Result of a bulk attribute read or write. Attributes that could not be
/// read or written are simply absent.
pub type AttributeList = Vec<Attribute>;
