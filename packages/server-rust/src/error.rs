//! Error taxonomy surfaced by the management server.
//!
//! Every fault returned to a caller is a [`ManagementError`]. Variants carry
//! the target and attempted action so a caller can tell "object doesn't
//! exist" from "object refused" from "caller lacks permission" from "object
//! itself is broken". [`ManagementError::kind`] gives a fieldless view for
//! callers that only branch on the category.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use mbeans_core::{Action, MalformedObjectName, ObjectName};

use crate::security::AccessDenied;
use crate::traits::NotCompliant;

// ---------------------------------------------------------------------------
// Target / HookPhase
// ---------------------------------------------------------------------------

/// What a fault is about: a registered name, or a class when no name is
/// known yet (instantiation, self-naming registration).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Name(ObjectName),
    Class(String),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{name}"),
            Self::Class(class_name) => write!(f, "instance of {class_name}"),
        }
    }
}

/// Lifecycle hook that produced a veto or fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    PreRegister,
    PostRegister,
    PreDeregister,
    PostDeregister,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PreRegister => "pre-register",
            Self::PostRegister => "post-register",
            Self::PreDeregister => "pre-deregister",
            Self::PostDeregister => "post-deregister",
        })
    }
}

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Category of a [`ManagementError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidArgument,
    NotCompliant,
    RegistrationRefused,
    HookFault,
    PermissionDenied,
    AttributeNotFound,
    InvalidAttributeValue,
    Reflection,
    TargetFault,
    ListenerNotFound,
}

// ---------------------------------------------------------------------------
// ManagementError
// ---------------------------------------------------------------------------

/// Errors returned by [`MBeanServer`](crate::MBeanServer) operations.
#[derive(Debug, thiserror::Error)]
pub enum ManagementError {
    #[error("instance not found: {name}")]
    InstanceNotFound { name: ObjectName },

    #[error("instance already exists: {name}")]
    InstanceAlreadyExists { name: ObjectName },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    MalformedName(#[from] MalformedObjectName),

    #[error(transparent)]
    NotCompliant(#[from] NotCompliant),

    /// A lifecycle hook vetoed the transition. This is an expected outcome,
    /// not a fault in the object.
    #[error("{phase} of {target} refused: {reason}")]
    RegistrationRefused {
        target: Target,
        phase: HookPhase,
        reason: String,
    },

    /// A lifecycle hook failed unexpectedly.
    #[error("{phase} hook of {target} failed: {source}")]
    HookFault {
        target: Target,
        phase: HookPhase,
        source: anyhow::Error,
    },

    #[error(transparent)]
    PermissionDenied(#[from] AccessDenied),

    #[error("attribute {attribute:?} not found on {name}")]
    AttributeNotFound { name: ObjectName, attribute: String },

    #[error("invalid value for attribute {attribute:?} of {name}: {reason}")]
    InvalidAttributeValue {
        name: ObjectName,
        attribute: String,
        reason: String,
    },

    /// The requested member or constructor does not exist or cannot be
    /// called with the supplied signature.
    #[error("{action} on {target}: {reason}")]
    Reflection {
        target: Target,
        action: Action,
        reason: String,
    },

    /// The managed object itself failed while serving the call.
    #[error("{action} on {target} failed: {source}")]
    TargetFault {
        target: Target,
        action: Action,
        source: anyhow::Error,
    },

    #[error("listener not registered with {name}")]
    ListenerNotFound { name: ObjectName },

    #[error("{name} does not broadcast notifications")]
    NotBroadcaster { name: ObjectName },
}

impl ManagementError {
    /// Category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InstanceNotFound { .. } => ErrorKind::NotFound,
            Self::InstanceAlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::InvalidArgument(_) | Self::MalformedName(_) | Self::NotBroadcaster { .. } => {
                ErrorKind::InvalidArgument
            }
            Self::NotCompliant(_) => ErrorKind::NotCompliant,
            Self::RegistrationRefused { .. } => ErrorKind::RegistrationRefused,
            Self::HookFault { .. } => ErrorKind::HookFault,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::AttributeNotFound { .. } => ErrorKind::AttributeNotFound,
            Self::InvalidAttributeValue { .. } => ErrorKind::InvalidAttributeValue,
            Self::Reflection { .. } => ErrorKind::Reflection,
            Self::TargetFault { .. } => ErrorKind::TargetFault,
            Self::ListenerNotFound { .. } => ErrorKind::ListenerNotFound,
        }
    }

    pub(crate) fn not_found(name: &ObjectName) -> Self {
        Self::InstanceNotFound { name: name.clone() }
    }
}

// ---------------------------------------------------------------------------
// Panic containment
// ---------------------------------------------------------------------------

/// Runs caller-supplied code, turning a panic into an error.
///
/// Managed objects, hooks, listeners and predicates are foreign code; a panic
/// inside one must reach the caller as a typed fault rather than unwinding
/// through the server.
pub(crate) fn catch_fault<T>(f: impl FnOnce() -> T) -> Result<T, anyhow::Error> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .map_err(|payload| anyhow::anyhow!("panicked: {}", panic_message(payload.as_ref())))
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
