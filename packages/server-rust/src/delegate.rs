//! The server's own managed object.
//!
//! [`MBeanServerDelegate`] is registered under
//! [`MBeanServerDelegate::object_name`] when the server is built. It describes
//! the server through read-only attributes and is the broadcaster of the
//! registration/unregistration notifications.

use std::sync::{Arc, LazyLock};

use mbeans_core::{
    Attribute, AttributeInfo, MBeanInfo, Notification, NotificationInfo, NotificationSource,
    ObjectName, Value, REGISTRATION_NOTIFICATION, UNREGISTRATION_NOTIFICATION,
};

use crate::broadcaster::{
    BroadcasterSupport, Handback, ListenerNotRegistered, NotificationBroadcaster,
    NotificationFilter, NotificationListener,
};
use crate::config::ServerConfig;
use crate::mbean::{DynamicMBean, TargetError};

/// Domain reserved for the server's own objects.
pub const RESERVED_DOMAIN: &str = "JMImplementation";

/// Canonical name of the delegate.
pub const DELEGATE_NAME: &str = "JMImplementation:type=MBeanServerDelegate";

const CLASS_NAME: &str = "mbeans.MBeanServerDelegate";

static OBJECT_NAME: LazyLock<ObjectName> = LazyLock::new(|| {
    ObjectName::from_parts(RESERVED_DOMAIN, [("type", "MBeanServerDelegate")])
        .expect("delegate name is a valid literal")
});

pub struct MBeanServerDelegate {
    server_id: String,
    specification_name: String,
    specification_version: String,
    implementation_name: String,
    implementation_version: String,
    support: BroadcasterSupport,
}

impl MBeanServerDelegate {
    #[must_use]
    pub fn new(config: &ServerConfig) -> Self {
        let info = NotificationInfo {
            types: vec![
                REGISTRATION_NOTIFICATION.to_string(),
                UNREGISTRATION_NOTIFICATION.to_string(),
            ],
            name: "MBeanServerNotification".to_string(),
            description: "Registration lifecycle of managed objects".to_string(),
        };
        Self {
            server_id: config.server_id.clone(),
            specification_name: config.specification_name.clone(),
            specification_version: config.specification_version.clone(),
            implementation_name: config.implementation_name.clone(),
            implementation_version: config.implementation_version.clone(),
            support: BroadcasterSupport::new(vec![info]),
        }
    }

    /// `JMImplementation:type=MBeanServerDelegate`.
    #[must_use]
    pub fn object_name() -> &'static ObjectName {
        &OBJECT_NAME
    }

    #[must_use]
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Emits a lifecycle notification of `kind` about `subject`.
    pub fn send_notification(&self, kind: &str, subject: &ObjectName) {
        let notification = Notification::new(
            kind,
            NotificationSource::Name(Self::object_name().clone()),
            self.support.next_sequence(),
            subject.canonical_name(),
        )
        .with_user_data(Value::Name(subject.clone()));
        tracing::debug!(kind, name = %subject, sequence = notification.sequence, "lifecycle notification");
        self.support.send_notification(&notification);
    }

    /// Number of listeners currently subscribed to lifecycle notifications.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.support.listener_count()
    }
}

impl DynamicMBean for MBeanServerDelegate {
    fn mbean_info(&self) -> MBeanInfo {
        let mut info = MBeanInfo::new(CLASS_NAME, "Represents the management server")
            .with_attribute(AttributeInfo::read_only("MBeanServerId", "string"))
            .with_attribute(AttributeInfo::read_only("SpecificationName", "string"))
            .with_attribute(AttributeInfo::read_only("SpecificationVersion", "string"))
            .with_attribute(AttributeInfo::read_only("ImplementationName", "string"))
            .with_attribute(AttributeInfo::read_only("ImplementationVersion", "string"));
        for notification in self.support.notification_info() {
            info = info.with_notification(notification);
        }
        info
    }

    fn get_attribute(&self, attribute: &str) -> Result<Value, TargetError> {
        let value = match attribute {
            "MBeanServerId" => &self.server_id,
            "SpecificationName" => &self.specification_name,
            "SpecificationVersion" => &self.specification_version,
            "ImplementationName" => &self.implementation_name,
            "ImplementationVersion" => &self.implementation_version,
            _ => return Err(TargetError::AttributeNotFound(attribute.to_string())),
        };
        Ok(Value::String(value.clone()))
    }

    fn set_attribute(&self, attribute: &Attribute) -> Result<(), TargetError> {
        Err(TargetError::AttributeNotFound(attribute.name.clone()))
    }

    fn invoke(&self, operation: &str, _: &[Value], _: &[String]) -> Result<Value, TargetError> {
        Err(TargetError::NoSuchOperation(operation.to_string()))
    }

    fn broadcaster(&self) -> Option<&dyn NotificationBroadcaster> {
        Some(self)
    }
}

impl NotificationBroadcaster for MBeanServerDelegate {
    fn add_notification_listener(
        &self,
        listener: Arc<dyn NotificationListener>,
        filter: Option<Arc<dyn NotificationFilter>>,
        handback: Option<Handback>,
    ) {
        self.support.add_notification_listener(listener, filter, handback);
    }

    fn remove_notification_listener(
        &self,
        listener: &Arc<dyn NotificationListener>,
    ) -> Result<(), ListenerNotRegistered> {
        self.support.remove_notification_listener(listener)
    }

    fn remove_notification_listener_exact(
        &self,
        listener: &Arc<dyn NotificationListener>,
        filter: Option<&Arc<dyn NotificationFilter>>,
        handback: Option<&Handback>,
    ) -> Result<(), ListenerNotRegistered> {
        self.support
            .remove_notification_listener_exact(listener, filter, handback)
    }

    fn notification_info(&self) -> Vec<NotificationInfo> {
        self.support.notification_info()
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    #[test]
    fn exposes_read_only_server_attributes() {
        let config = ServerConfig {
            server_id: "node-1".to_string(),
            ..ServerConfig::default()
        };
        let delegate = MBeanServerDelegate::new(&config);
        assert_eq!(
            delegate.get_attribute("MBeanServerId").unwrap(),
            Value::String("node-1".to_string())
        );
        assert!(delegate.get_attribute("ImplementationVersion").is_ok());
        assert!(matches!(
            delegate.set_attribute(&Attribute::new("MBeanServerId", "x")),
            Err(TargetError::AttributeNotFound(_))
        ));
        assert!(matches!(
            delegate.get_attribute("Nope"),
            Err(TargetError::AttributeNotFound(_))
        ));
        assert_eq!(delegate.mbean_info().attributes.len(), 5);
    }

    #[test]
    fn notifications_carry_subject_and_increasing_sequence() {
        let delegate = MBeanServerDelegate::new(&ServerConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        delegate.add_notification_listener(
            Arc::new(move |n: &Notification, _: Option<&Handback>| sink.lock().push(n.clone())),
            None,
            None,
        );

        let subject = ObjectName::parse("d:type=A").unwrap();
        delegate.send_notification(REGISTRATION_NOTIFICATION, &subject);
        delegate.send_notification(UNREGISTRATION_NOTIFICATION, &subject);

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].kind, REGISTRATION_NOTIFICATION);
        assert_eq!(seen[0].mbean_name(), Some(&subject));
        assert_eq!(
            seen[0].source,
            NotificationSource::Name(MBeanServerDelegate::object_name().clone())
        );
        assert!(seen[1].sequence > seen[0].sequence);
    }

    #[test]
    fn object_name_is_canonical() {
        assert_eq!(MBeanServerDelegate::object_name().canonical_name(), DELEGATE_NAME);
    }

    #[test]
    fn object_name_is_built_once() {
        assert!(std::ptr::eq(
            MBeanServerDelegate::object_name(),
            MBeanServerDelegate::object_name()
        ));
    }
}
