//! Public dispatch surface of the management server.
//!
//! Every [`MBeanServer`] call completes the supplied name with the default
//! domain (once, in [`MBeanServer::qualify`]), looks the target up, checks an
//! [`MBeanPermission`] scoped to `(class, member, name, action)` and only then
//! calls into the managed object. Faults raised by the object, including
//! panics, come back as typed [`ManagementError`]s.

use std::collections::BTreeSet;
use std::sync::Arc;

use mbeans_core::{
    Action, Attribute, AttributeList, MBeanInfo, MBeanPermission, ObjectInstance, ObjectName,
    Value,
};

use crate::broadcaster::{Handback, NotificationFilter, NotificationListener};
use crate::config::ServerConfig;
use crate::delegate::{MBeanServerDelegate, RESERVED_DOMAIN};
use crate::error::{catch_fault, ManagementError, Target};
use crate::introspect::StandardIntrospector;
use crate::lifecycle::LifecycleCoordinator;
use crate::mbean::{Candidate, DynamicMBean, TargetError};
use crate::query::QueryExp;
use crate::relay::NotificationRelay;
use crate::repository::{RegisteredEntry, Repository};
use crate::security::{AccessController, AccessGate};
use crate::traits::{InstantiationError, Instantiator, Introspected, Introspector};

// ---------------------------------------------------------------------------
// MBeanServerBuilder
// ---------------------------------------------------------------------------

/// Wires a [`ServerConfig`] with the optional collaborators.
#[derive(Default)]
pub struct MBeanServerBuilder {
    config: ServerConfig,
    access_controller: Option<Arc<dyn AccessController>>,
    introspector: Option<Arc<dyn Introspector>>,
    instantiator: Option<Arc<dyn Instantiator>>,
}

impl MBeanServerBuilder {
    #[must_use]
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn default_domain(mut self, domain: impl Into<String>) -> Self {
        self.config.default_domain = domain.into();
        self
    }

    /// Enables permission enforcement. Without a controller every check passes.
    #[must_use]
    pub fn access_controller(mut self, controller: Arc<dyn AccessController>) -> Self {
        self.access_controller = Some(controller);
        self
    }

    /// Replaces the default [`StandardIntrospector`].
    #[must_use]
    pub fn introspector(mut self, introspector: Arc<dyn Introspector>) -> Self {
        self.introspector = Some(introspector);
        self
    }

    /// Service used by [`MBeanServer::create_mbean`].
    #[must_use]
    pub fn instantiator(mut self, instantiator: Arc<dyn Instantiator>) -> Self {
        self.instantiator = Some(instantiator);
        self
    }

    /// Builds the server and registers its delegate.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementError::InvalidArgument`] if the configuration is
    /// invalid.
    pub fn build(self) -> Result<MBeanServer, ManagementError> {
        self.config.validate()?;

        let repository = Arc::new(Repository::new([
            self.config.default_domain.clone(),
            RESERVED_DOMAIN.to_string(),
        ]));
        let delegate = Arc::new(MBeanServerDelegate::new(&self.config));
        let relay = Arc::new(NotificationRelay::new(Arc::clone(&delegate)));
        let access = Arc::new(AccessGate::new(self.access_controller));

        let class_name = delegate.mbean_info().class_name;
        repository.insert(RegisteredEntry::new(
            MBeanServerDelegate::object_name().clone(),
            Introspected {
                mbean: delegate as Arc<dyn DynamicMBean>,
                resource: None,
                class_name,
            },
        ))?;

        let lifecycle =
            LifecycleCoordinator::new(Arc::clone(&repository), Arc::clone(&relay), Arc::clone(&access));

        tracing::info!(
            default_domain = %self.config.default_domain,
            server_id = %self.config.server_id,
            enforcing = access.is_enforcing(),
            "management server started"
        );

        Ok(MBeanServer {
            introspector: self
                .introspector
                .unwrap_or_else(|| Arc::new(StandardIntrospector::new())),
            instantiator: self.instantiator,
            config: self.config,
            repository,
            lifecycle,
            relay,
            access,
        })
    }
}

// ---------------------------------------------------------------------------
// MBeanServer
// ---------------------------------------------------------------------------

/// In-process registry of managed objects.
///
/// Safe to share across threads (`Arc<MBeanServer>`); no call holds a
/// registry-wide lock while managed-object code runs.
pub struct MBeanServer {
    config: ServerConfig,
    repository: Arc<Repository>,
    lifecycle: LifecycleCoordinator,
    relay: Arc<NotificationRelay>,
    access: Arc<AccessGate>,
    introspector: Arc<dyn Introspector>,
    instantiator: Option<Arc<dyn Instantiator>>,
}

impl MBeanServer {
    #[must_use]
    pub fn builder() -> MBeanServerBuilder {
        MBeanServerBuilder::default()
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Completes `name` with the default domain if its domain is empty.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementError::MalformedName`] if completion produces an
    /// invalid name.
    pub fn qualify(&self, name: &ObjectName) -> Result<ObjectName, ManagementError> {
        Ok(name.with_domain_if_empty(&self.config.default_domain)?)
    }

    /// Installs, replaces or removes the access controller at runtime.
    pub fn set_access_controller(&self, controller: Option<Arc<dyn AccessController>>) {
        self.access.replace(controller);
    }

    #[must_use]
    pub fn delegate(&self) -> &Arc<MBeanServerDelegate> {
        self.relay.delegate()
    }

    #[must_use]
    pub fn delegate_name(&self) -> ObjectName {
        MBeanServerDelegate::object_name().clone()
    }

    pub(crate) fn lifecycle(&self) -> &LifecycleCoordinator {
        &self.lifecycle
    }

    // -- registration --------------------------------------------------------

    /// Registers `candidate` under `name`, or under the name its
    /// `pre_register` hook chooses when `name` is `None`.
    ///
    /// # Errors
    ///
    /// See [`LifecycleCoordinator::register`]; additionally
    /// [`ManagementError::NotCompliant`] if the candidate cannot be
    /// introspected.
    pub fn register_mbean(
        &self,
        candidate: Candidate,
        name: Option<&ObjectName>,
    ) -> Result<ObjectInstance, ManagementError> {
        self.instrumented(Action::RegisterMBean, name, || {
            let name = name.map(|n| self.qualify(n)).transpose()?;
            let introspected = self.introspector.introspect(candidate)?;
            self.lifecycle.register(self, introspected, name)
        })
    }

    /// Instantiates `class_name` through the configured instantiation
    /// service and registers the result.
    ///
    /// # Errors
    ///
    /// - [`ManagementError::InvalidArgument`] if no instantiation service is
    ///   configured.
    /// - [`ManagementError::InstanceNotFound`] if `loader` is not registered.
    /// - [`ManagementError::Reflection`] for an unknown class or constructor.
    /// - [`ManagementError::TargetFault`] if the constructor fails.
    /// - Any error of [`MBeanServer::register_mbean`].
    pub fn create_mbean(
        &self,
        class_name: &str,
        name: Option<&ObjectName>,
        loader: Option<&ObjectName>,
        params: &[Value],
        signature: &[String],
    ) -> Result<ObjectInstance, ManagementError> {
        self.instrumented(Action::Instantiate, name, || {
            let instantiator = self.instantiator.as_ref().ok_or_else(|| {
                ManagementError::InvalidArgument("no instantiation service configured".to_string())
            })?;
            let name = name.map(|n| self.qualify(n)).transpose()?;
            self.access.check(&MBeanPermission::new(
                Some(class_name),
                None,
                name.as_ref(),
                Action::Instantiate,
            ))?;
            let loader = match loader {
                Some(loader) => Some(self.lookup(loader)?.name().clone()),
                None => None,
            };

            let class = instantiator
                .load_class(class_name, loader.as_ref())
                .map_err(instantiation_error)?;
            let candidate = instantiator
                .instantiate(&class, params, signature)
                .map_err(instantiation_error)?;
            let introspected = self.introspector.introspect(candidate)?;
            self.lifecycle.register(self, introspected, name)
        })
    }

    /// # Errors
    ///
    /// See [`LifecycleCoordinator::unregister`].
    pub fn unregister_mbean(&self, name: &ObjectName) -> Result<(), ManagementError> {
        self.instrumented(Action::UnregisterMBean, Some(name), || {
            let name = self.qualify(name)?;
            self.lifecycle.unregister(&name)
        })
    }

    // -- metadata -------------------------------------------------------------

    /// # Errors
    ///
    /// [`ManagementError::InstanceNotFound`] or
    /// [`ManagementError::PermissionDenied`].
    pub fn get_object_instance(&self, name: &ObjectName) -> Result<ObjectInstance, ManagementError> {
        self.instrumented(Action::GetObjectInstance, Some(name), || {
            let entry = self.lookup(name)?;
            self.check(&entry, None, Action::GetObjectInstance)?;
            Ok(entry.object_instance())
        })
    }

    /// Whether `name` is registered. Never fails; a malformed or pattern name
    /// is simply not registered.
    #[must_use]
    pub fn is_registered(&self, name: &ObjectName) -> bool {
        self.qualify(name)
            .is_ok_and(|n| !n.is_pattern() && self.repository.contains(&n))
    }

    /// Number of registered objects, including the delegate.
    #[must_use]
    pub fn get_mbean_count(&self) -> usize {
        self.repository.count()
    }

    #[must_use]
    pub fn get_default_domain(&self) -> &str {
        &self.config.default_domain
    }

    /// Domains with at least one registered object, plus the declared ones.
    /// With enforcement active, domains the caller may not see are omitted.
    ///
    /// # Errors
    ///
    /// [`ManagementError::PermissionDenied`] if the caller may not list
    /// domains at all.
    pub fn get_domains(&self) -> Result<Vec<String>, ManagementError> {
        self.instrumented(Action::GetDomains, None, || {
            let domains = self.repository.domains();
            if !self.access.is_enforcing() {
                return Ok(domains.into_iter().collect());
            }
            self.access
                .check(&MBeanPermission::new(None, None, None, Action::GetDomains))?;
            Ok(domains
                .into_iter()
                .filter(|domain| {
                    ObjectName::from_parts(domain, [("x", "x")]).is_ok_and(|sample| {
                        self.access.allows(&MBeanPermission::new(
                            None,
                            None,
                            Some(&sample),
                            Action::GetDomains,
                        ))
                    })
                })
                .collect())
        })
    }

    /// # Errors
    ///
    /// [`ManagementError::InstanceNotFound`],
    /// [`ManagementError::PermissionDenied`] or
    /// [`ManagementError::TargetFault`] if producing the metadata panics.
    pub fn get_mbean_info(&self, name: &ObjectName) -> Result<MBeanInfo, ManagementError> {
        self.instrumented(Action::GetMBeanInfo, Some(name), || {
            let entry = self.lookup(name)?;
            self.check(&entry, None, Action::GetMBeanInfo)?;
            call_target(&entry, Action::GetMBeanInfo, || Ok(entry.mbean().mbean_info()))
        })
    }

    /// Whether the object registered as `name` is an instance of
    /// `class_name`.
    ///
    /// # Errors
    ///
    /// [`ManagementError::InstanceNotFound`] or
    /// [`ManagementError::PermissionDenied`].
    pub fn is_instance_of(&self, name: &ObjectName, class_name: &str) -> Result<bool, ManagementError> {
        self.instrumented(Action::IsInstanceOf, Some(name), || {
            let entry = self.lookup(name)?;
            self.check(&entry, None, Action::IsInstanceOf)?;
            if entry.class_name() == class_name {
                return Ok(true);
            }
            call_target(&entry, Action::IsInstanceOf, || {
                Ok(entry.mbean().is_instance_of(class_name))
            })
        })
    }

    // -- attributes and operations -------------------------------------------

    /// # Errors
    ///
    /// [`ManagementError::InstanceNotFound`],
    /// [`ManagementError::PermissionDenied`],
    /// [`ManagementError::AttributeNotFound`] or
    /// [`ManagementError::TargetFault`].
    pub fn get_attribute(&self, name: &ObjectName, attribute: &str) -> Result<Value, ManagementError> {
        self.instrumented(Action::GetAttribute, Some(name), || {
            let entry = self.lookup(name)?;
            self.check(&entry, Some(attribute), Action::GetAttribute)?;
            call_target(&entry, Action::GetAttribute, || {
                entry.mbean().get_attribute(attribute)
            })
        })
    }

    /// Reads several attributes. Attributes that cannot be read, or that the
    /// caller may not read, are left out of the result.
    ///
    /// # Errors
    ///
    /// [`ManagementError::InstanceNotFound`],
    /// [`ManagementError::PermissionDenied`] or
    /// [`ManagementError::TargetFault`] if the object panics.
    pub fn get_attributes(
        &self,
        name: &ObjectName,
        attributes: &[String],
    ) -> Result<AttributeList, ManagementError> {
        self.instrumented(Action::GetAttribute, Some(name), || {
            let entry = self.lookup(name)?;
            let allowed = self.allowed_members(&entry, attributes.iter(), Action::GetAttribute)?;
            call_target(&entry, Action::GetAttribute, || {
                Ok(entry.mbean().get_attributes(&allowed))
            })
        })
    }

    /// # Errors
    ///
    /// [`ManagementError::InstanceNotFound`],
    /// [`ManagementError::PermissionDenied`],
    /// [`ManagementError::AttributeNotFound`],
    /// [`ManagementError::InvalidAttributeValue`] or
    /// [`ManagementError::TargetFault`].
    pub fn set_attribute(&self, name: &ObjectName, attribute: &Attribute) -> Result<(), ManagementError> {
        self.instrumented(Action::SetAttribute, Some(name), || {
            let entry = self.lookup(name)?;
            self.check(&entry, Some(&attribute.name), Action::SetAttribute)?;
            call_target(&entry, Action::SetAttribute, || {
                entry.mbean().set_attribute(attribute)
            })
        })
    }

    /// Writes several attributes and returns those that were written.
    /// Attributes the caller may not write are silently skipped.
    ///
    /// # Errors
    ///
    /// Same as [`MBeanServer::get_attributes`].
    pub fn set_attributes(
        &self,
        name: &ObjectName,
        attributes: &[Attribute],
    ) -> Result<AttributeList, ManagementError> {
        self.instrumented(Action::SetAttribute, Some(name), || {
            let entry = self.lookup(name)?;
            let allowed_names = self.allowed_members(
                &entry,
                attributes.iter().map(|a| &a.name),
                Action::SetAttribute,
            )?;
            let allowed: Vec<Attribute> = attributes
                .iter()
                .filter(|a| allowed_names.contains(&a.name))
                .cloned()
                .collect();
            call_target(&entry, Action::SetAttribute, || {
                Ok(entry.mbean().set_attributes(&allowed))
            })
        })
    }

    /// # Errors
    ///
    /// [`ManagementError::InstanceNotFound`],
    /// [`ManagementError::PermissionDenied`],
    /// [`ManagementError::Reflection`] if no operation matches, or
    /// [`ManagementError::TargetFault`].
    pub fn invoke(
        &self,
        name: &ObjectName,
        operation: &str,
        params: &[Value],
        signature: &[String],
    ) -> Result<Value, ManagementError> {
        self.instrumented(Action::Invoke, Some(name), || {
            let entry = self.lookup(name)?;
            self.check(&entry, Some(operation), Action::Invoke)?;
            call_target(&entry, Action::Invoke, || {
                entry.mbean().invoke(operation, params, signature)
            })
        })
    }

    // -- queries ---------------------------------------------------------------

    /// Objects whose names `pattern` selects (all when `None`) and for which
    /// `query` holds (all when `None`).
    ///
    /// # Errors
    ///
    /// [`ManagementError::PermissionDenied`] if the caller may not query at
    /// all. Objects the caller may not see are silently left out.
    pub fn query_mbeans(
        &self,
        pattern: Option<&ObjectName>,
        query: Option<&dyn QueryExp>,
    ) -> Result<BTreeSet<ObjectInstance>, ManagementError> {
        self.instrumented(Action::QueryMBeans, pattern, || {
            Ok(self
                .query_entries(Action::QueryMBeans, pattern, query)?
                .iter()
                .map(|entry| entry.object_instance())
                .collect())
        })
    }

    /// Names form of [`MBeanServer::query_mbeans`].
    ///
    /// # Errors
    ///
    /// Same as [`MBeanServer::query_mbeans`].
    pub fn query_names(
        &self,
        pattern: Option<&ObjectName>,
        query: Option<&dyn QueryExp>,
    ) -> Result<BTreeSet<ObjectName>, ManagementError> {
        self.instrumented(Action::QueryNames, pattern, || {
            Ok(self
                .query_entries(Action::QueryNames, pattern, query)?
                .iter()
                .map(|entry| entry.name().clone())
                .collect())
        })
    }

    /// With enforcement active, objects the caller may not see are dropped
    /// before the predicate runs, so it never observes them. Without
    /// enforcement the predicate runs directly on the name matches.
    fn query_entries(
        &self,
        action: Action,
        pattern: Option<&ObjectName>,
        query: Option<&dyn QueryExp>,
    ) -> Result<Vec<Arc<RegisteredEntry>>, ManagementError> {
        let pattern = match pattern {
            Some(pattern) => self.qualify(pattern)?,
            None => ObjectName::wildcard(),
        };
        let enforcing = self.access.is_enforcing();
        if enforcing {
            self.access
                .check(&MBeanPermission::new(None, None, None, action))?;
        }

        let mut candidates = self.repository.query(&pattern);
        if enforcing {
            candidates.retain(|entry| {
                self.access.allows(&MBeanPermission::new(
                    Some(entry.class_name()),
                    None,
                    Some(entry.name()),
                    action,
                ))
            });
        }
        if let Some(query) = query {
            candidates.retain(|entry| self.matches(query, entry.name()));
        }
        Ok(candidates)
    }

    fn matches(&self, query: &dyn QueryExp, name: &ObjectName) -> bool {
        match catch_fault(|| query.apply(name, self)) {
            Ok(Ok(matched)) => matched,
            Ok(Err(error)) => {
                tracing::debug!(%name, %error, "query predicate failed; treating as no match");
                false
            }
            Err(error) => {
                tracing::warn!(%name, %error, "query predicate panicked; treating as no match");
                false
            }
        }
    }

    // -- notifications ---------------------------------------------------------

    /// Subscribes `listener` to notifications from the object registered as
    /// `name`. Notifications the object emits about itself arrive with their
    /// source rewritten to `name`.
    ///
    /// # Errors
    ///
    /// [`ManagementError::InstanceNotFound`],
    /// [`ManagementError::PermissionDenied`] or
    /// [`ManagementError::NotBroadcaster`].
    pub fn add_notification_listener(
        &self,
        name: &ObjectName,
        listener: Arc<dyn NotificationListener>,
        filter: Option<Arc<dyn NotificationFilter>>,
        handback: Option<Handback>,
    ) -> Result<(), ManagementError> {
        self.instrumented(Action::AddNotificationListener, Some(name), || {
            let entry = self.lookup(name)?;
            self.check(&entry, None, Action::AddNotificationListener)?;
            self.relay.subscribe(&entry, listener, filter, handback)
        })
    }

    /// Removes every registration of `listener` on `name`.
    ///
    /// # Errors
    ///
    /// [`ManagementError::InstanceNotFound`],
    /// [`ManagementError::PermissionDenied`],
    /// [`ManagementError::NotBroadcaster`] or
    /// [`ManagementError::ListenerNotFound`].
    pub fn remove_notification_listener(
        &self,
        name: &ObjectName,
        listener: &Arc<dyn NotificationListener>,
    ) -> Result<(), ManagementError> {
        self.instrumented(Action::RemoveNotificationListener, Some(name), || {
            let entry = self.lookup(name)?;
            self.check(&entry, None, Action::RemoveNotificationListener)?;
            self.relay.unsubscribe(&entry, listener)
        })
    }

    /// Removes the single registration of `listener` on `name` with exactly
    /// this `filter` and `handback`.
    ///
    /// # Errors
    ///
    /// Same as [`MBeanServer::remove_notification_listener`].
    pub fn remove_notification_listener_exact(
        &self,
        name: &ObjectName,
        listener: &Arc<dyn NotificationListener>,
        filter: Option<&Arc<dyn NotificationFilter>>,
        handback: Option<&Handback>,
    ) -> Result<(), ManagementError> {
        self.instrumented(Action::RemoveNotificationListener, Some(name), || {
            let entry = self.lookup(name)?;
            self.check(&entry, None, Action::RemoveNotificationListener)?;
            self.relay
                .unsubscribe_exact(&entry, listener, filter, handback)
        })
    }

    // -- helpers ---------------------------------------------------------------

    fn lookup(&self, name: &ObjectName) -> Result<Arc<RegisteredEntry>, ManagementError> {
        let name = self.qualify(name)?;
        if name.is_pattern() {
            return Err(ManagementError::InvalidArgument(format!(
                "{name} is a pattern; a concrete name is required"
            )));
        }
        self.repository.lookup(&name)
    }

    fn check(
        &self,
        entry: &RegisteredEntry,
        member: Option<&str>,
        action: Action,
    ) -> Result<(), ManagementError> {
        self.access
            .check(&MBeanPermission::new(
                Some(entry.class_name()),
                member,
                Some(entry.name()),
                action,
            ))
            .map_err(ManagementError::from)
    }

    /// Bulk-call filter: with enforcement active, the caller needs the action
    /// on the object itself, and each member it may not touch is dropped.
    fn allowed_members<'a>(
        &self,
        entry: &RegisteredEntry,
        members: impl Iterator<Item = &'a String>,
        action: Action,
    ) -> Result<Vec<String>, ManagementError> {
        if !self.access.is_enforcing() {
            return Ok(members.cloned().collect());
        }
        self.check(entry, None, action)?;
        Ok(members
            .filter(|member| self.check(entry, Some(member), action).is_ok())
            .cloned()
            .collect())
    }

    /// Runs one public call inside a `mbean_call` span, counting failures.
    fn instrumented<T>(
        &self,
        action: Action,
        name: Option<&ObjectName>,
        call: impl FnOnce() -> Result<T, ManagementError>,
    ) -> Result<T, ManagementError> {
        let span = tracing::debug_span!(
            "mbean_call",
            action = action.as_str(),
            name = tracing::field::Empty,
        );
        if let Some(name) = name {
            span.record("name", tracing::field::display(name));
        }
        let _entered = span.enter();

        let result = call();
        if let Err(error) = &result {
            tracing::debug!(kind = ?error.kind(), %error, "call failed");
            metrics::counter!("mbeans_dispatch_errors_total", "action" => action.as_str())
                .increment(1);
        }
        result
    }
}

/// Calls into a managed object, normalizing its failures.
fn call_target<T>(
    entry: &RegisteredEntry,
    action: Action,
    call: impl FnOnce() -> Result<T, TargetError>,
) -> Result<T, ManagementError> {
    let name = entry.name();
    match catch_fault(call) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(TargetError::AttributeNotFound(attribute))) => {
            Err(ManagementError::AttributeNotFound {
                name: name.clone(),
                attribute,
            })
        }
        Ok(Err(TargetError::InvalidAttributeValue { attribute, reason })) => {
            Err(ManagementError::InvalidAttributeValue {
                name: name.clone(),
                attribute,
                reason,
            })
        }
        Ok(Err(TargetError::NoSuchOperation(operation))) => Err(ManagementError::Reflection {
            target: Target::Name(name.clone()),
            action,
            reason: format!("no operation {operation:?} with the given signature"),
        }),
        Ok(Err(TargetError::Fault(source))) | Err(source) => Err(ManagementError::TargetFault {
            target: Target::Name(name.clone()),
            action,
            source,
        }),
    }
}

fn instantiation_error(error: InstantiationError) -> ManagementError {
    match error {
        InstantiationError::ClassNotFound { class_name } => ManagementError::Reflection {
            target: Target::Class(class_name),
            action: Action::Instantiate,
            reason: "class not found".to_string(),
        },
        InstantiationError::Reflection { class_name, reason } => ManagementError::Reflection {
            target: Target::Class(class_name),
            action: Action::Instantiate,
            reason,
        },
        InstantiationError::Fault { class_name, source } => ManagementError::TargetFault {
            target: Target::Class(class_name),
            action: Action::Instantiate,
            source,
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use mbeans_core::Notification;
    use parking_lot::Mutex;

    use super::*;
    use crate::error::ErrorKind;
    use crate::instantiate::FactoryInstantiator;
    use crate::query::Query;
    use crate::test_support::{TestBean, TestEmitter};

    fn name(s: &str) -> ObjectName {
        ObjectName::parse(s).unwrap()
    }

    fn server() -> MBeanServer {
        MBeanServer::builder().build().unwrap()
    }

    fn register(server: &MBeanServer, n: &str, class_name: &str) -> Arc<TestBean> {
        let bean = Arc::new(TestBean::new(class_name));
        server
            .register_mbean(bean.candidate(), Some(&name(n)))
            .unwrap();
        bean
    }

    fn strings(names: &BTreeSet<ObjectName>) -> Vec<&str> {
        names.iter().map(ObjectName::canonical_name).collect()
    }

    #[test]
    fn delegate_is_registered_at_build() {
        let server = server();
        assert_eq!(server.get_mbean_count(), 1);
        let id = server
            .get_attribute(&server.delegate_name(), "MBeanServerId")
            .unwrap();
        assert_eq!(id, Value::String(server.config().server_id.clone()));
        assert!(server
            .get_domains()
            .unwrap()
            .contains(&"JMImplementation".to_string()));
    }

    #[test]
    fn invalid_default_domain_fails_build() {
        assert!(MBeanServer::builder().default_domain("").build().is_err());
    }

    #[test]
    fn default_domain_completion() {
        let server = MBeanServer::builder()
            .default_domain("com.example")
            .build()
            .unwrap();
        let bean = Arc::new(TestBean::new("test.Foo"));
        let instance = server
            .register_mbean(bean.candidate(), Some(&name(":type=Foo")))
            .unwrap();
        assert_eq!(instance.name.canonical_name(), "com.example:type=Foo");

        let bare = server.get_object_instance(&name(":type=Foo")).unwrap();
        let full = server
            .get_object_instance(&name("com.example:type=Foo"))
            .unwrap();
        assert_eq!(bare, full);
        assert_eq!(server.get_default_domain(), "com.example");
    }

    #[test]
    fn query_by_domain_and_predicate() {
        let server = server();
        register(&server, "d:type=A", "test.A");
        register(&server, "d:type=B", "test.B");
        register(&server, "e:type=A", "test.A");

        let in_d = server.query_names(Some(&name("d:*")), None).unwrap();
        assert_eq!(strings(&in_d), vec!["d:type=A", "d:type=B"]);

        let type_a = Query::name_matches(name("*:type=A"));
        let narrowed = server
            .query_names(Some(&name("d:*")), Some(&type_a))
            .unwrap();
        assert_eq!(strings(&narrowed), vec!["d:type=A"]);

        let all = server.query_mbeans(None, None).unwrap();
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn predicate_may_reenter_server() {
        let server = server();
        let a = register(&server, "d:type=A", "test.A");
        register(&server, "d:type=B", "test.B");
        a.set_attribute(&Attribute::new("Value", Value::Int(3)))
            .unwrap();

        let reads_attribute = |n: &ObjectName, s: &MBeanServer| -> Result<bool, ManagementError> {
            Ok(s.get_attribute(n, "Value")?.as_i64() == Some(3))
        };
        let matched = server
            .query_names(Some(&name("d:*")), Some(&reads_attribute))
            .unwrap();
        assert_eq!(strings(&matched), vec!["d:type=A"]);
    }

    #[test]
    fn failing_or_panicking_predicate_is_no_match() {
        let server = server();
        register(&server, "d:type=A", "test.A");
        let failing = |_: &ObjectName, _: &MBeanServer| -> Result<bool, ManagementError> {
            Err(ManagementError::InvalidArgument("nope".into()))
        };
        let panicking =
            |_: &ObjectName, _: &MBeanServer| -> Result<bool, ManagementError> { panic!("bad predicate") };
        assert!(server
            .query_names(Some(&name("d:*")), Some(&failing))
            .unwrap()
            .is_empty());
        assert!(server
            .query_names(Some(&name("d:*")), Some(&panicking))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn enforcement_filters_before_predicate() {
        let server = server();
        register(&server, "d:type=Visible", "test.Visible");
        register(&server, "d:type=Secret", "test.Secret");
        server.set_access_controller(Some(Arc::new(|p: &MBeanPermission| {
            p.class_name.as_deref() != Some("test.Secret")
        })));

        let evaluated = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&evaluated);
        let recording = move |n: &ObjectName, _: &MBeanServer| -> Result<bool, ManagementError> {
            seen.lock().push(n.canonical_name().to_string());
            Ok(true)
        };
        let names = server
            .query_names(Some(&name("d:*")), Some(&recording))
            .unwrap();
        assert_eq!(strings(&names), vec!["d:type=Visible"]);
        assert_eq!(*evaluated.lock(), vec!["d:type=Visible"]);
    }

    #[test]
    fn without_enforcement_predicate_sees_everything() {
        let server = server();
        register(&server, "d:type=Visible", "test.Visible");
        register(&server, "d:type=Secret", "test.Secret");
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let counting = move |_: &ObjectName, _: &MBeanServer| -> Result<bool, ManagementError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        };
        let names = server
            .query_names(Some(&name("d:*")), Some(&counting))
            .unwrap();
        assert_eq!(names.len(), 2);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn attribute_round_trip_and_errors() {
        let server = server();
        register(&server, "d:type=A", "test.A");
        let n = name("d:type=A");

        server
            .set_attribute(&n, &Attribute::new("Value", Value::Int(42)))
            .unwrap();
        assert_eq!(server.get_attribute(&n, "Value").unwrap(), Value::Int(42));

        assert_eq!(
            server.get_attribute(&n, "Missing").unwrap_err().kind(),
            ErrorKind::AttributeNotFound
        );
        assert_eq!(
            server
                .set_attribute(&n, &Attribute::new("Value", "text"))
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidAttributeValue
        );
        assert_eq!(
            server.get_attribute(&n, "Broken").unwrap_err().kind(),
            ErrorKind::TargetFault
        );
        assert_eq!(
            server
                .get_attribute(&name("d:type=Missing"), "Value")
                .unwrap_err()
                .kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            server.get_attribute(&name("d:*"), "Value").unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn panicking_target_surfaces_as_target_fault() {
        let server = server();
        register(&server, "d:type=A", "test.A");
        let err = server
            .get_attribute(&name("d:type=A"), "Exploding")
            .unwrap_err();
        match err {
            ManagementError::TargetFault { action, source, .. } => {
                assert_eq!(action, Action::GetAttribute);
                assert!(source.to_string().contains("attribute getter bug"));
            }
            other => panic!("unexpected error: {other}"),
        }
        let err = server
            .invoke(&name("d:type=A"), "explode", &[], &[])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TargetFault);
    }

    #[test]
    fn invoke_dispatches_and_maps_unknown_operations() {
        let server = server();
        register(&server, "d:type=A", "test.A");
        let n = name("d:type=A");
        assert_eq!(
            server.invoke(&n, "increment", &[], &[]).unwrap(),
            Value::Int(1)
        );
        assert_eq!(
            server
                .invoke(&n, "add", &[Value::Int(4)], &["long".to_string()])
                .unwrap(),
            Value::Int(5)
        );
        assert_eq!(
            server.invoke(&n, "teleport", &[], &[]).unwrap_err().kind(),
            ErrorKind::Reflection
        );
        assert_eq!(
            server.invoke(&n, "fail", &[], &[]).unwrap_err().kind(),
            ErrorKind::TargetFault
        );
    }

    #[test]
    fn bulk_attributes_drop_failures_and_denied_members() {
        let server = server();
        register(&server, "d:type=A", "test.A");
        let n = name("d:type=A");
        let wanted = vec!["Value".to_string(), "Name".to_string(), "Broken".to_string()];

        let read = server.get_attributes(&n, &wanted).unwrap();
        let read_names: Vec<_> = read.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(read_names, vec!["Value", "Name"]);

        server.set_access_controller(Some(Arc::new(|p: &MBeanPermission| {
            p.member.as_deref() != Some("Name")
        })));
        let read = server.get_attributes(&n, &wanted).unwrap();
        let read_names: Vec<_> = read.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(read_names, vec!["Value"]);

        let written = server
            .set_attributes(
                &n,
                &[
                    Attribute::new("Value", Value::Int(8)),
                    Attribute::new("Name", "renamed"),
                ],
            )
            .unwrap();
        assert_eq!(written, vec![Attribute::new("Value", Value::Int(8))]);
    }

    #[test]
    fn permission_denied_is_typed() {
        let server = MBeanServer::builder()
            .access_controller(Arc::new(|p: &MBeanPermission| p.action != Action::Invoke))
            .build()
            .unwrap();
        register(&server, "d:type=A", "test.A");
        let err = server
            .invoke(&name("d:type=A"), "increment", &[], &[])
            .unwrap_err();
        match err {
            ManagementError::PermissionDenied(denied) => {
                assert_eq!(denied.permission.member.as_deref(), Some("increment"));
                assert_eq!(denied.permission.class_name.as_deref(), Some("test.A"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn domains_filtered_by_permission() {
        let server = server();
        register(&server, "d:type=A", "test.A");
        register(&server, "secret:type=A", "test.A");
        server.set_access_controller(Some(Arc::new(|p: &MBeanPermission| {
            p.name.as_ref().map_or(true, |n| n.domain() != "secret")
        })));
        let domains = server.get_domains().unwrap();
        assert!(domains.contains(&"d".to_string()));
        assert!(!domains.contains(&"secret".to_string()));
    }

    #[test]
    fn metadata_and_instance_of() {
        let server = server();
        register(&server, "d:type=A", "test.A");
        let n = name("d:type=A");
        let info = server.get_mbean_info(&n).unwrap();
        assert_eq!(info.class_name, "test.A");
        assert!(info.attribute("Value").is_some());
        assert!(server.is_instance_of(&n, "test.A").unwrap());
        assert!(!server.is_instance_of(&n, "test.B").unwrap());
        assert!(!server.is_registered(&name("d:*")));
    }

    #[test]
    fn create_mbean_through_instantiator() {
        let instantiator = Arc::new(FactoryInstantiator::new());
        instantiator.register("test.Created", |_, _| {
            Ok(Candidate::dynamic(TestBean::new("test.Created")))
        });
        let server = MBeanServer::builder()
            .instantiator(instantiator)
            .build()
            .unwrap();

        let instance = server
            .create_mbean("test.Created", Some(&name("d:type=Created")), None, &[], &[])
            .unwrap();
        assert_eq!(instance.class_name, "test.Created");

        let err = server
            .create_mbean("test.Unknown", Some(&name("d:type=U")), None, &[], &[])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reflection);

        let err = server
            .create_mbean(
                "test.Created",
                Some(&name("d:type=Other")),
                Some(&name("d:type=NoLoader")),
                &[],
                &[],
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn create_mbean_without_instantiator_is_invalid() {
        let err = server()
            .create_mbean("test.Created", Some(&name("d:type=C")), None, &[], &[])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn listener_identity_is_stable_across_subscriptions() {
        let server = server();
        let delegate = server.delegate_name();
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let listener: Arc<dyn NotificationListener> =
            Arc::new(move |n: &Notification, _: Option<&Handback>| sink.lock().push(n.kind.clone()));
        let h1: Handback = Arc::new(1_u8);
        let h2: Handback = Arc::new(2_u8);
        let f2: Arc<dyn NotificationFilter> = Arc::new(|_: &Notification| true);

        server
            .add_notification_listener(&delegate, Arc::clone(&listener), None, Some(h1))
            .unwrap();
        server
            .add_notification_listener(&delegate, Arc::clone(&listener), Some(f2), Some(h2))
            .unwrap();
        assert_eq!(server.delegate().listener_count(), 2);

        register(&server, "d:type=A", "test.A");
        assert_eq!(log.lock().len(), 2);

        server
            .remove_notification_listener(&delegate, &listener)
            .unwrap();
        assert_eq!(server.delegate().listener_count(), 0);
        assert_eq!(
            server
                .remove_notification_listener(&delegate, &listener)
                .unwrap_err()
                .kind(),
            ErrorKind::ListenerNotFound
        );
    }

    #[test]
    fn reregistered_broadcaster_keeps_listeners_removable() {
        let server = server();
        let emitter = Arc::new(TestEmitter::default());
        let n = name("d:type=Emitter");
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let listener: Arc<dyn NotificationListener> =
            Arc::new(move |note: &Notification, _: Option<&Handback>| sink.lock().push(note.clone()));

        server.register_mbean(emitter.candidate(), Some(&n)).unwrap();
        server
            .add_notification_listener(&n, Arc::clone(&listener), None, None)
            .unwrap();
        server.unregister_mbean(&n).unwrap();

        server.register_mbean(emitter.candidate(), Some(&n)).unwrap();
        server
            .add_notification_listener(&n, Arc::clone(&listener), None, None)
            .unwrap();
        assert_eq!(emitter.support.listener_count(), 2);

        server.remove_notification_listener(&n, &listener).unwrap();
        assert_eq!(emitter.support.listener_count(), 0);
        emitter.emit("x.after");
        assert!(log.lock().is_empty());
    }

    #[test]
    fn non_broadcaster_cannot_take_listeners() {
        let server = server();
        register(&server, "d:type=A", "test.A");
        let listener: Arc<dyn NotificationListener> =
            Arc::new(|_: &Notification, _: Option<&Handback>| {});
        let err = server
            .add_notification_listener(&name("d:type=A"), listener, None, None)
            .unwrap_err();
        assert!(matches!(err, ManagementError::NotBroadcaster { .. }));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
