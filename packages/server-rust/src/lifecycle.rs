//! Registration and unregistration protocols.
//!
//! [`LifecycleCoordinator`] drives a managed object through its hooks, the
//! permission checks, the repository and the lifecycle notifications. No
//! repository-wide lock is held while a hook runs: same-name registration is
//! serialized by the repository's entry API, and same-name unregistration by
//! the in-flight set, so unrelated names never wait on each other's hooks.

use std::collections::HashSet;
use std::sync::Arc;

use mbeans_core::{Action, MBeanPermission, ObjectInstance, ObjectName};
use parking_lot::{Condvar, Mutex};

use crate::delegate::{MBeanServerDelegate, RESERVED_DOMAIN};
use crate::error::{catch_fault, HookPhase, ManagementError, Target};
use crate::interceptor::MBeanServer;
use crate::mbean::{DynamicMBean, HookError, MBeanRegistration};
use crate::relay::NotificationRelay;
use crate::repository::{RegisteredEntry, Repository};
use crate::security::AccessGate;
use crate::traits::Introspected;

// ---------------------------------------------------------------------------
// LifecycleCoordinator
// ---------------------------------------------------------------------------

pub struct LifecycleCoordinator {
    repository: Arc<Repository>,
    relay: Arc<NotificationRelay>,
    access: Arc<AccessGate>,
    /// Names whose unregistration is currently in progress.
    in_flight: Mutex<HashSet<ObjectName>>,
    in_flight_cv: Condvar,
}

impl LifecycleCoordinator {
    #[must_use]
    pub fn new(
        repository: Arc<Repository>,
        relay: Arc<NotificationRelay>,
        access: Arc<AccessGate>,
    ) -> Self {
        Self {
            repository,
            relay,
            access,
            in_flight: Mutex::new(HashSet::new()),
            in_flight_cv: Condvar::new(),
        }
    }

    /// Registers an introspected object under `name` (already qualified), or
    /// under the name its `pre_register` hook supplies.
    ///
    /// Once `pre_register` has succeeded, `post_register` is called exactly
    /// once: with `true` after a successful insert, otherwise with `false`.
    ///
    /// # Errors
    ///
    /// - [`ManagementError::InvalidArgument`] for a missing, pattern or
    ///   reserved-domain name.
    /// - [`ManagementError::PermissionDenied`] from the access controller.
    /// - [`ManagementError::RegistrationRefused`] / [`ManagementError::HookFault`]
    ///   from `pre_register`.
    /// - [`ManagementError::InstanceAlreadyExists`] if the final name is taken.
    /// - [`ManagementError::HookFault`] if `post_register(true)` fails; the
    ///   object then stays registered.
    pub fn register(
        &self,
        server: &MBeanServer,
        introspected: Introspected,
        name: Option<ObjectName>,
    ) -> Result<ObjectInstance, ManagementError> {
        let result = self.register_inner(server, introspected, name);
        let outcome = match &result {
            Ok(_) => "ok",
            Err(ManagementError::RegistrationRefused { .. }) => "refused",
            Err(_) => "error",
        };
        metrics::counter!("mbeans_registrations_total", "outcome" => outcome).increment(1);
        result
    }

    fn register_inner(
        &self,
        server: &MBeanServer,
        introspected: Introspected,
        name: Option<ObjectName>,
    ) -> Result<ObjectInstance, ManagementError> {
        let mbean = Arc::clone(&introspected.mbean);
        let class_name = introspected.class_name.clone();
        let hooks = mbean.registration();

        if let Some(name) = &name {
            ensure_registrable(name)?;
        } else if hooks.is_none() {
            return Err(ManagementError::InvalidArgument(format!(
                "no name supplied for {class_name}"
            )));
        }
        self.check(&class_name, name.as_ref(), Action::RegisterMBean)?;

        let Some(hooks) = hooks else {
            let name = name.ok_or_else(|| {
                ManagementError::InvalidArgument(format!("no name supplied for {class_name}"))
            })?;
            return self.store(introspected, name);
        };

        let target = name
            .as_ref()
            .map_or_else(|| Target::Class(class_name.clone()), |n| Target::Name(n.clone()));
        tracing::debug!(%target, "calling pre_register");
        let proposed = run_hook(&target, HookPhase::PreRegister, || {
            hooks.pre_register(server, name.as_ref())
        })?;

        let result = self
            .finalize_name(server, &class_name, name.as_ref(), &proposed)
            .and_then(|final_name| self.store(introspected, final_name));

        match result {
            Ok(instance) => {
                let target = Target::Name(instance.name.clone());
                post_register(hooks, &target, true)?;
                Ok(instance)
            }
            Err(error) => {
                // The object is not registered; a failing post hook cannot
                // change that, so only log it.
                if let Err(post_error) = post_register(hooks, &target, false) {
                    tracing::warn!(%target, error = %post_error, "post_register(false) failed");
                }
                Err(error)
            }
        }
    }

    /// Completes and validates the name returned by `pre_register`, checking
    /// permission again if it differs from the supplied one.
    fn finalize_name(
        &self,
        server: &MBeanServer,
        class_name: &str,
        supplied: Option<&ObjectName>,
        proposed: &ObjectName,
    ) -> Result<ObjectName, ManagementError> {
        let final_name = server.qualify(proposed)?;
        ensure_registrable(&final_name)?;
        if supplied != Some(&final_name) {
            tracing::debug!(name = %final_name, "pre_register replaced the name");
            self.check(class_name, Some(&final_name), Action::RegisterMBean)?;
        }
        Ok(final_name)
    }

    fn store(
        &self,
        introspected: Introspected,
        name: ObjectName,
    ) -> Result<ObjectInstance, ManagementError> {
        let entry = self
            .repository
            .insert(RegisteredEntry::new(name, introspected))?;
        tracing::debug!(name = %entry.name(), class = entry.class_name(), "registered");
        self.relay.emit_registered(entry.name());
        Ok(entry.object_instance())
    }

    /// Unregisters `name` (already qualified).
    ///
    /// Concurrent calls for the same name are serialized: a second caller
    /// waits until the first finishes, then sees the outcome (usually
    /// [`ManagementError::InstanceNotFound`]).
    ///
    /// # Errors
    ///
    /// - [`ManagementError::InvalidArgument`] for a pattern name or the
    ///   server delegate.
    /// - [`ManagementError::InstanceNotFound`] if nothing is registered.
    /// - [`ManagementError::PermissionDenied`] from the access controller.
    /// - [`ManagementError::RegistrationRefused`] / [`ManagementError::HookFault`]
    ///   from `pre_deregister`; the object stays registered.
    /// - [`ManagementError::HookFault`] from `post_deregister`; the object is
    ///   already removed.
    pub fn unregister(&self, name: &ObjectName) -> Result<(), ManagementError> {
        let result = self.unregister_inner(name);
        let outcome = match &result {
            Ok(()) => "ok",
            Err(ManagementError::RegistrationRefused { .. }) => "refused",
            Err(ManagementError::InstanceNotFound { .. }) => "not_found",
            Err(_) => "error",
        };
        metrics::counter!("mbeans_unregistrations_total", "outcome" => outcome).increment(1);
        result
    }

    fn unregister_inner(&self, name: &ObjectName) -> Result<(), ManagementError> {
        if name.is_pattern() {
            return Err(ManagementError::InvalidArgument(format!(
                "cannot unregister pattern {name}"
            )));
        }
        if name == MBeanServerDelegate::object_name() {
            return Err(ManagementError::InvalidArgument(
                "the server delegate cannot be unregistered".to_string(),
            ));
        }

        let _guard = self.begin_unregister(name);

        let entry = self.repository.lookup(name)?;
        self.check(entry.class_name(), Some(name), Action::UnregisterMBean)?;

        let target = Target::Name(name.clone());
        let hooks = entry.mbean().registration();
        if let Some(hooks) = hooks {
            tracing::debug!(%target, "calling pre_deregister");
            run_hook(&target, HookPhase::PreDeregister, || hooks.pre_deregister())?;
        }

        self.repository.remove(name)?;
        tracing::debug!(%name, "unregistered");
        self.relay.emit_unregistered(name);

        if let Some(hooks) = hooks {
            run_hook(&target, HookPhase::PostDeregister, || hooks.post_deregister())
                .map_err(refusal_as_fault)?;
        }
        Ok(())
    }

    /// Claims `name` in the in-flight set, waiting while another thread holds
    /// it. The claim is released when the guard drops.
    fn begin_unregister(&self, name: &ObjectName) -> InFlightGuard<'_> {
        let mut in_flight = self.in_flight.lock();
        while in_flight.contains(name) {
            tracing::debug!(%name, "waiting for in-flight unregistration");
            self.in_flight_cv.wait(&mut in_flight);
        }
        in_flight.insert(name.clone());
        InFlightGuard {
            coordinator: self,
            name: name.clone(),
        }
    }

    /// Whether an unregistration of `name` is in progress.
    #[must_use]
    pub fn is_unregistering(&self, name: &ObjectName) -> bool {
        self.in_flight.lock().contains(name)
    }

    fn check(
        &self,
        class_name: &str,
        name: Option<&ObjectName>,
        action: Action,
    ) -> Result<(), ManagementError> {
        self.access
            .check(&MBeanPermission::new(Some(class_name), None, name, action))
            .map_err(ManagementError::from)
    }
}

// ---------------------------------------------------------------------------
// InFlightGuard
// ---------------------------------------------------------------------------

/// Removes its name from the in-flight set and wakes every waiter on drop,
/// whichever way the unregistration ended.
struct InFlightGuard<'a> {
    coordinator: &'a LifecycleCoordinator,
    name: ObjectName,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.coordinator.in_flight.lock().remove(&self.name);
        self.coordinator.in_flight_cv.notify_all();
    }
}

// ---------------------------------------------------------------------------
// Hook helpers
// ---------------------------------------------------------------------------

fn ensure_registrable(name: &ObjectName) -> Result<(), ManagementError> {
    if name.is_pattern() {
        return Err(ManagementError::InvalidArgument(format!(
            "cannot register under pattern {name}"
        )));
    }
    if name.domain() == RESERVED_DOMAIN {
        return Err(ManagementError::InvalidArgument(format!(
            "domain {RESERVED_DOMAIN} is reserved"
        )));
    }
    Ok(())
}

/// Runs a hook, translating a veto into `RegistrationRefused` and an error or
/// panic into `HookFault`.
fn run_hook<T>(
    target: &Target,
    phase: HookPhase,
    hook: impl FnOnce() -> Result<T, HookError>,
) -> Result<T, ManagementError> {
    match catch_fault(hook) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(HookError::Refused(reason))) => {
            tracing::warn!(%target, %phase, %reason, "hook refused");
            Err(ManagementError::RegistrationRefused {
                target: target.clone(),
                phase,
                reason,
            })
        }
        Ok(Err(HookError::Fault(source))) | Err(source) => {
            tracing::warn!(%target, %phase, error = %source, "hook failed");
            Err(ManagementError::HookFault {
                target: target.clone(),
                phase,
                source,
            })
        }
    }
}

fn post_register(
    hooks: &dyn MBeanRegistration,
    target: &Target,
    registration_done: bool,
) -> Result<(), ManagementError> {
    run_hook(target, HookPhase::PostRegister, || {
        hooks.post_register(registration_done)
    })
    .map_err(refusal_as_fault)
}

/// Post hooks run after the transition is final, so a refusal there cannot
/// veto anything; report it as a fault.
fn refusal_as_fault(error: ManagementError) -> ManagementError {
    match error {
        ManagementError::RegistrationRefused {
            target,
            phase,
            reason,
        } => ManagementError::HookFault {
            target,
            phase,
            source: anyhow::anyhow!("refused: {reason}"),
        },
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
