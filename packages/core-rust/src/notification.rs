//! Notification payloads and source identity.

use serde::{Deserialize, Serialize};

use crate::name::ObjectName;
use crate::value::Value;

/// Type of the notification emitted after an object is registered.
pub const REGISTRATION_NOTIFICATION: &str = "JMX.mbean.registered";

/// Type of the notification emitted after an object is unregistered.
pub const UNREGISTRATION_NOTIFICATION: &str = "JMX.mbean.unregistered";

/// Pointer identity of an in-process object.
///
/// Two `ObjectAddr` values are equal iff they were taken from the same live
/// allocation. Only meaningful while that allocation is alive; it is never
/// dereferenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectAddr(usize);

impl ObjectAddr {
    /// Identity of the value behind `value`. For trait objects only the data
    /// pointer is used, so `ObjectAddr::of(&*arc)` and `ObjectAddr::of(self)`
    /// inside the implementation agree.
    #[must_use]
    pub fn of<T: ?Sized>(value: &T) -> Self {
        Self(std::ptr::from_ref(value).cast::<()>() as usize)
    }
}

/// Where a notification claims to come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationSource {
    None,
    /// Logical name of a registered object.
    Name(ObjectName),
    /// A raw in-process object. Relayed notifications from a registered
    /// object have this rewritten to [`NotificationSource::Name`].
    Object(ObjectAddr),
}

/// An event emitted by a broadcaster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Dotted type string, e.g. `"JMX.mbean.registered"`.
    pub kind: String,
    pub source: NotificationSource,
    /// Per-broadcaster sequence number.
    pub sequence: u64,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    pub message: String,
    pub user_data: Option<Value>,
}

impl Notification {
    /// Creates a notification stamped with the current wall-clock time.
    #[must_use]
    pub fn new(
        kind: impl Into<String>,
        source: NotificationSource,
        sequence: u64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            source,
            sequence,
            timestamp_ms: now_millis(),
            message: message.into(),
            user_data: None,
        }
    }

    #[must_use]
    pub fn with_user_data(mut self, user_data: Value) -> Self {
        self.user_data = Some(user_data);
        self
    }

    /// The object name carried by a registration or unregistration
    /// notification.
    #[must_use]
    pub fn mbean_name(&self) -> Option<&ObjectName> {
        match &self.user_data {
            Some(Value::Name(name)) => Some(name),
            _ => None,
        }
    }
}

/// Millisecond timestamps fit comfortably in i64 until the year 292 million.
#[allow(clippy::cast_possible_truncation)]
fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    trait Marker {
        fn addr(&self) -> ObjectAddr;
    }

    struct Thing(#[allow(dead_code)] u8);

    impl Marker for Thing {
        fn addr(&self) -> ObjectAddr {
            ObjectAddr::of(self)
        }
    }

    #[test]
    fn object_addr_agrees_through_trait_objects() {
        let thing: Arc<dyn Marker> = Arc::new(Thing(1));
        assert_eq!(ObjectAddr::of(&*thing), thing.addr());

        let other: Arc<dyn Marker> = Arc::new(Thing(1));
        assert_ne!(ObjectAddr::of(&*thing), ObjectAddr::of(&*other));
    }

    #[test]
    fn mbean_name_reads_user_data() {
        let name = ObjectName::parse("d:type=A").unwrap();
        let n = Notification::new(REGISTRATION_NOTIFICATION, NotificationSource::None, 1, "")
            .with_user_data(Value::Name(name.clone()));
        assert_eq!(n.mbean_name(), Some(&name));
        assert!(n.timestamp_ms > 0);
    }
}
