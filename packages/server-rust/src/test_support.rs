//! Managed objects shared by the unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mbeans_core::{
    Attribute, AttributeInfo, Impact, MBeanInfo, Notification, NotificationSource, ObjectAddr,
    ObjectName, OperationInfo, ParameterInfo, Value,
};
use parking_lot::Mutex;

use crate::broadcaster::{
    BroadcasterSupport, Handback, ListenerNotRegistered, NotificationBroadcaster,
    NotificationFilter, NotificationListener,
};
use crate::interceptor::MBeanServer;
use crate::mbean::{Candidate, DynamicMBean, HookError, MBeanRegistration, TargetError};

/// How a [`TestBean`]'s lifecycle hooks behave.
#[derive(Default)]
pub(crate) struct Hooks {
    /// Name returned by `pre_register` regardless of the supplied one.
    pub self_name: Option<ObjectName>,
    pub refuse_register: bool,
    pub fault_pre_register: bool,
    pub fault_post_register: bool,
    pub refuse_deregister: AtomicBool,
    pub fault_post_deregister: bool,
    pub deregister_delay: Option<Duration>,
}

/// Counter bean with an optional, scriptable set of lifecycle hooks. Every
/// hook invocation is appended to `log`.
pub(crate) struct TestBean {
    class_name: String,
    value: Mutex<i64>,
    hooks: Option<Hooks>,
    log: Mutex<Vec<String>>,
}

impl TestBean {
    pub fn new(class_name: &str) -> Self {
        Self {
            class_name: class_name.to_string(),
            value: Mutex::new(0),
            hooks: None,
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn with_hooks(class_name: &str, hooks: Hooks) -> Self {
        Self {
            hooks: Some(hooks),
            ..Self::new(class_name)
        }
    }

    pub fn candidate(self: &Arc<Self>) -> Candidate {
        Candidate::Dynamic(Arc::clone(self) as Arc<dyn DynamicMBean>)
    }

    pub fn events(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.log.lock().iter().filter(|e| *e == event).count()
    }

    pub fn set_refuse_deregister(&self, refuse: bool) {
        if let Some(hooks) = &self.hooks {
            hooks.refuse_deregister.store(refuse, Ordering::SeqCst);
        }
    }

    fn record(&self, event: impl Into<String>) {
        self.log.lock().push(event.into());
    }

    fn hooks(&self) -> &Hooks {
        self.hooks.as_ref().expect("hooks are only exposed when configured")
    }
}

impl DynamicMBean for TestBean {
    fn mbean_info(&self) -> MBeanInfo {
        MBeanInfo::new(self.class_name.clone(), "counter used by tests")
            .with_attribute(AttributeInfo::read_write("Value", "long"))
            .with_attribute(AttributeInfo::read_only("Name", "string"))
            .with_attribute(AttributeInfo::read_only("Broken", "long"))
            .with_operation(OperationInfo::new("increment", "long", Impact::Action))
            .with_operation(
                OperationInfo::new("add", "long", Impact::Action)
                    .with_param(ParameterInfo::new("delta", "long")),
            )
            .with_operation(OperationInfo::new("explode", "void", Impact::Action))
    }

    fn get_attribute(&self, attribute: &str) -> Result<Value, TargetError> {
        match attribute {
            "Value" => Ok(Value::Int(*self.value.lock())),
            "Name" => Ok(Value::String(self.class_name.clone())),
            "Broken" => Err(anyhow::anyhow!("sensor offline").into()),
            "Exploding" => panic!("attribute getter bug"),
            _ => Err(TargetError::AttributeNotFound(attribute.to_string())),
        }
    }

    fn set_attribute(&self, attribute: &Attribute) -> Result<(), TargetError> {
        match attribute.name.as_str() {
            "Value" => {
                let v = attribute
                    .value
                    .as_i64()
                    .ok_or_else(|| TargetError::InvalidAttributeValue {
                        attribute: "Value".to_string(),
                        reason: format!("expected long, got {}", attribute.value.type_name()),
                    })?;
                *self.value.lock() = v;
                Ok(())
            }
            other => Err(TargetError::AttributeNotFound(other.to_string())),
        }
    }

    fn invoke(
        &self,
        operation: &str,
        params: &[Value],
        _signature: &[String],
    ) -> Result<Value, TargetError> {
        match (operation, params) {
            ("increment", []) => {
                let mut value = self.value.lock();
                *value += 1;
                Ok(Value::Int(*value))
            }
            ("add", [delta]) => {
                let delta = delta
                    .as_i64()
                    .ok_or_else(|| TargetError::NoSuchOperation("add(non-long)".to_string()))?;
                let mut value = self.value.lock();
                *value += delta;
                Ok(Value::Int(*value))
            }
            ("explode", []) => panic!("operation bug"),
            ("fail", []) => Err(anyhow::anyhow!("disk full").into()),
            _ => Err(TargetError::NoSuchOperation(operation.to_string())),
        }
    }

    fn registration(&self) -> Option<&dyn MBeanRegistration> {
        self.hooks.as_ref().map(|_| self as &dyn MBeanRegistration)
    }
}

impl MBeanRegistration for TestBean {
    fn pre_register(
        &self,
        _server: &MBeanServer,
        name: Option<&ObjectName>,
    ) -> Result<ObjectName, HookError> {
        self.record("pre_register");
        let hooks = self.hooks();
        if hooks.refuse_register {
            return Err(HookError::Refused("not today".to_string()));
        }
        if hooks.fault_pre_register {
            return Err(anyhow::anyhow!("pre-register crashed").into());
        }
        hooks
            .self_name
            .clone()
            .or_else(|| name.cloned())
            .ok_or_else(|| HookError::Refused("no name".to_string()))
    }

    fn post_register(&self, registration_done: bool) -> Result<(), HookError> {
        self.record(format!("post_register({registration_done})"));
        if registration_done && self.hooks().fault_post_register {
            return Err(anyhow::anyhow!("post-register crashed").into());
        }
        Ok(())
    }

    fn pre_deregister(&self) -> Result<(), HookError> {
        self.record("pre_deregister");
        let hooks = self.hooks();
        if let Some(delay) = hooks.deregister_delay {
            std::thread::sleep(delay);
        }
        if hooks.refuse_deregister.load(Ordering::SeqCst) {
            return Err(HookError::Refused("still in use".to_string()));
        }
        Ok(())
    }

    fn post_deregister(&self) -> Result<(), HookError> {
        self.record("post_deregister");
        if self.hooks().fault_post_deregister {
            return Err(anyhow::anyhow!("post-deregister crashed").into());
        }
        Ok(())
    }
}

/// Broadcaster with no attributes that emits under its own identity.
#[derive(Default)]
pub(crate) struct TestEmitter {
    pub support: BroadcasterSupport,
}

impl TestEmitter {
    pub fn candidate(self: &Arc<Self>) -> Candidate {
        Candidate::Dynamic(Arc::clone(self) as Arc<dyn DynamicMBean>)
    }

    pub fn emit(&self, kind: &str) {
        let notification = Notification::new(
            kind,
            NotificationSource::Object(ObjectAddr::of(self)),
            self.support.next_sequence(),
            "",
        );
        self.support.send_notification(&notification);
    }
}

impl DynamicMBean for TestEmitter {
    fn mbean_info(&self) -> MBeanInfo {
        MBeanInfo::new("test.Emitter", "")
    }

    fn get_attribute(&self, attribute: &str) -> Result<Value, TargetError> {
        Err(TargetError::AttributeNotFound(attribute.to_string()))
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

impl NotificationBroadcaster for TestEmitter {
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
}
