//! Permission checks delegated to an optional access controller.
//!
//! The server never decides policy itself. It builds an [`MBeanPermission`]
//! for each sensitive call and asks the installed [`AccessController`]. With
//! no controller installed every check passes.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use mbeans_core::MBeanPermission;

/// A permission check failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("access denied for {permission}: {reason}")]
pub struct AccessDenied {
    pub permission: MBeanPermission,
    pub reason: String,
}

impl AccessDenied {
    #[must_use]
    pub fn new(permission: MBeanPermission, reason: impl Into<String>) -> Self {
        Self {
            permission,
            reason: reason.into(),
        }
    }
}

/// External permission service.
pub trait AccessController: Send + Sync {
    /// Returns `Ok(())` if the permission is granted.
    ///
    /// # Errors
    ///
    /// Returns [`AccessDenied`] when the caller may not perform the action.
    fn check(&self, permission: &MBeanPermission) -> Result<(), AccessDenied>;
}

impl<F> AccessController for F
where
    F: Fn(&MBeanPermission) -> bool + Send + Sync,
{
    fn check(&self, permission: &MBeanPermission) -> Result<(), AccessDenied> {
        if self(permission) {
            Ok(())
        } else {
            Err(AccessDenied::new(permission.clone(), "denied by policy"))
        }
    }
}

/// Holds the currently installed controller, swappable at runtime.
///
/// Reads are lock-free; a check in flight keeps using the controller it
/// loaded even if another thread replaces it concurrently.
pub struct AccessGate {
    controller: ArcSwapOption<Arc<dyn AccessController>>,
}

impl AccessGate {
    #[must_use]
    pub fn new(controller: Option<Arc<dyn AccessController>>) -> Self {
        Self {
            controller: ArcSwapOption::new(controller.map(Arc::new)),
        }
    }

    /// Installs, replaces or (with `None`) removes the controller.
    pub fn replace(&self, controller: Option<Arc<dyn AccessController>>) {
        self.controller.store(controller.map(Arc::new));
    }

    /// `true` when a controller is installed.
    #[must_use]
    pub fn is_enforcing(&self) -> bool {
        self.controller.load().is_some()
    }

    /// Checks `permission`, passing trivially when nothing is installed.
    ///
    /// # Errors
    ///
    /// Returns [`AccessDenied`] from the installed controller.
    pub fn check(&self, permission: &MBeanPermission) -> Result<(), AccessDenied> {
        match self.controller.load_full() {
            Some(controller) => controller.check(permission),
            None => Ok(()),
        }
    }

    /// Boolean form of [`AccessGate::check`], for silent filtering.
    #[must_use]
    pub fn allows(&self, permission: &MBeanPermission) -> bool {
        self.check(permission).is_ok()
    }
}

impl Default for AccessGate {
    fn default() -> Self {
        Self::new(None)
    }
}
