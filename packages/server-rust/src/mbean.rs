//! Managed object contracts.
//!
//! A managed object is reached through its [`DynamicMBean`] façade. Optional
//! capabilities (lifecycle hooks, notification broadcasting) are exposed as
//! explicit `Option` views on the façade, so every caller branches on
//! "has capability" / "does not" instead of inspecting runtime types.

use std::any::Any;
use std::sync::Arc;

use mbeans_core::{Attribute, AttributeList, MBeanInfo, ObjectName, Value};

use crate::broadcaster::NotificationBroadcaster;
use crate::interceptor::MBeanServer;

// ---------------------------------------------------------------------------
// Errors returned by managed objects
// ---------------------------------------------------------------------------

/// Failure reported by a managed object while serving an attribute or
/// operation call. The server wraps it with the target name and action.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    /// The attribute does not exist, or is not readable/writable in the
    /// requested direction.
    #[error("attribute not found: {0}")]
    AttributeNotFound(String),

    #[error("invalid value for attribute {attribute}: {reason}")]
    InvalidAttributeValue { attribute: String, reason: String },

    #[error("no such operation: {0}")]
    NoSuchOperation(String),

    #[error(transparent)]
    Fault(#[from] anyhow::Error),
}

/// Outcome of a lifecycle hook that did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    /// The object vetoes the transition. Expected, not a malfunction.
    #[error("refused: {0}")]
    Refused(String),

    #[error(transparent)]
    Fault(#[from] anyhow::Error),
}

// ---------------------------------------------------------------------------
// DynamicMBean
// ---------------------------------------------------------------------------

/// Management façade of a registered object.
pub trait DynamicMBean: Send + Sync {
    /// Declared class name and member descriptors.
    fn mbean_info(&self) -> MBeanInfo;

    /// # Errors
    ///
    /// Returns [`TargetError::AttributeNotFound`] for unknown or unreadable
    /// attributes, or [`TargetError::Fault`] if the read itself fails.
    fn get_attribute(&self, attribute: &str) -> Result<Value, TargetError>;

    /// # Errors
    ///
    /// Returns [`TargetError::AttributeNotFound`] for unknown or read-only
    /// attributes and [`TargetError::InvalidAttributeValue`] for a value of
    /// the wrong kind.
    fn set_attribute(&self, attribute: &Attribute) -> Result<(), TargetError>;

    /// Reads several attributes. Attributes that fail are left out.
    fn get_attributes(&self, attributes: &[String]) -> AttributeList {
        attributes
            .iter()
            .filter_map(|name| {
                self.get_attribute(name)
                    .ok()
                    .map(|value| Attribute::new(name.clone(), value))
            })
            .collect()
    }

    /// Writes several attributes and returns the ones that were written.
    fn set_attributes(&self, attributes: &[Attribute]) -> AttributeList {
        attributes
            .iter()
            .filter(|attribute| self.set_attribute(attribute).is_ok())
            .cloned()
            .collect()
    }

    /// # Errors
    ///
    /// Returns [`TargetError::NoSuchOperation`] if no operation matches
    /// `operation` and `signature`, or [`TargetError::Fault`] if it fails.
    fn invoke(
        &self,
        operation: &str,
        params: &[Value],
        signature: &[String],
    ) -> Result<Value, TargetError>;

    /// Lifecycle hooks, if the object participates in its own registration.
    fn registration(&self) -> Option<&dyn MBeanRegistration> {
        None
    }

    /// Notification broadcasting, if the object emits notifications.
    fn broadcaster(&self) -> Option<&dyn NotificationBroadcaster> {
        None
    }

    /// Whether the object is an instance of `class_name`.
    fn is_instance_of(&self, class_name: &str) -> bool {
        self.mbean_info().class_name == class_name
    }
}

// ---------------------------------------------------------------------------
// MBeanRegistration
// ---------------------------------------------------------------------------

/// Hooks an object may implement to take part in its own registration and
/// removal.
///
/// The server never holds a registry-wide lock while a hook runs, so hooks
/// may call back into the server.
pub trait MBeanRegistration: Send + Sync {
    /// Called before the object is stored. Returns the name to register
    /// under, which may replace `name` (or supply one when `name` is `None`).
    ///
    /// # Errors
    ///
    /// [`HookError::Refused`] vetoes the registration.
    fn pre_register(
        &self,
        server: &MBeanServer,
        name: Option<&ObjectName>,
    ) -> Result<ObjectName, HookError> {
        let _ = server;
        name.cloned()
            .ok_or_else(|| HookError::Refused("no name supplied".to_string()))
    }

    /// Called once after a successful `pre_register`, with whether the
    /// object ended up registered.
    ///
    /// # Errors
    ///
    /// A failure after a successful registration is reported to the caller;
    /// the object stays registered.
    fn post_register(&self, registration_done: bool) -> Result<(), HookError> {
        let _ = registration_done;
        Ok(())
    }

    /// Called before the object is removed.
    ///
    /// # Errors
    ///
    /// Any error keeps the object registered.
    fn pre_deregister(&self) -> Result<(), HookError> {
        Ok(())
    }

    /// Called after the object has been removed.
    ///
    /// # Errors
    ///
    /// Reported to the caller; the removal is not undone.
    fn post_deregister(&self) -> Result<(), HookError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Candidate
// ---------------------------------------------------------------------------

/// Object offered for registration.
#[derive(Clone)]
pub enum Candidate {
    /// Already implements the management façade.
    Dynamic(Arc<dyn DynamicMBean>),
    /// Arbitrary object; an adapter façade is produced by introspection.
    Resource(Arc<dyn Any + Send + Sync>),
}

impl Candidate {
    pub fn dynamic<T: DynamicMBean + 'static>(mbean: T) -> Self {
        Self::Dynamic(Arc::new(mbean))
    }

    pub fn resource<T: Any + Send + Sync>(resource: T) -> Self {
        Self::Resource(Arc::new(resource))
    }
}

impl std::fmt::Debug for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dynamic(_) => f.write_str("Candidate::Dynamic"),
            Self::Resource(_) => f.write_str("Candidate::Resource"),
        }
    }
}
