use std::any::Any;
use std::sync::Arc;

use mbeans_core::{ObjectName, Value};

use crate::mbean::{Candidate, DynamicMBean};

/// Result of introspecting a candidate object: the management façade the
/// server dispatches to, and the raw resource behind it when they differ.
pub struct Introspected {
    /// Façade receiving attribute and operation calls.
    pub mbean: Arc<dyn DynamicMBean>,
    /// Underlying object when the façade is a generated adapter. `None`
    /// means the façade is the resource.
    pub resource: Option<Arc<dyn Any + Send + Sync>>,
    /// Declared class name from the façade's metadata.
    pub class_name: String,
}

/// A candidate object does not meet the structural contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{class_name} is not a compliant managed object: {reason}")]
pub struct NotCompliant {
    pub class_name: String,
    pub reason: String,
}

impl NotCompliant {
    #[must_use]
    pub fn new(class_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            reason: reason.into(),
        }
    }
}

/// Produces the management façade for arbitrary candidate objects.
pub trait Introspector: Send + Sync {
    /// # Errors
    ///
    /// Returns [`NotCompliant`] if the candidate cannot be managed.
    fn introspect(&self, candidate: Candidate) -> Result<Introspected, NotCompliant>;
}

/// A loaded class, ready to be instantiated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassHandle {
    pub class_name: String,
    /// Registered loader object the class was resolved through, if any.
    pub loader: Option<ObjectName>,
}

/// Failures of the instantiation service.
#[derive(Debug, thiserror::Error)]
pub enum InstantiationError {
    #[error("class not found: {class_name}")]
    ClassNotFound { class_name: String },

    /// No constructor matches, or the class cannot be instantiated at all.
    #[error("cannot instantiate {class_name}: {reason}")]
    Reflection { class_name: String, reason: String },

    /// The constructor itself failed.
    #[error("constructor of {class_name} failed: {source}")]
    Fault {
        class_name: String,
        source: anyhow::Error,
    },
}

/// External class-loading and construction service used by
/// [`MBeanServer::create_mbean`](crate::MBeanServer::create_mbean).
pub trait Instantiator: Send + Sync {
    /// Resolves `class_name`, optionally through a registered loader object.
    ///
    /// # Errors
    ///
    /// Returns [`InstantiationError::ClassNotFound`] if the class is unknown.
    fn load_class(
        &self,
        class_name: &str,
        loader: Option<&ObjectName>,
    ) -> Result<ClassHandle, InstantiationError>;

    /// Constructs an instance using the constructor matching `signature`.
    ///
    /// # Errors
    ///
    /// Returns [`InstantiationError`] if no constructor matches or it fails.
    fn instantiate(
        &self,
        class: &ClassHandle,
        args: &[Value],
        signature: &[String],
    ) -> Result<Candidate, InstantiationError>;
}
