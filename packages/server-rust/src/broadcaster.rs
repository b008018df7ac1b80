//! Listener, filter and broadcaster contracts, plus [`BroadcasterSupport`],
//! a reusable broadcaster that fans a notification out to every registered
//! listener whose filter accepts it.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use mbeans_core::{Notification, NotificationInfo, ObjectAddr};
use parking_lot::RwLock;

use crate::error::catch_fault;

/// Opaque caller context echoed back to a listener with each notification.
/// Compared by identity when removing a single registration.
pub type Handback = Arc<dyn Any + Send + Sync>;

/// Receives notifications.
pub trait NotificationListener: Send + Sync {
    fn handle_notification(&self, notification: &Notification, handback: Option<&Handback>);
}

impl<F> NotificationListener for F
where
    F: Fn(&Notification, Option<&Handback>) + Send + Sync,
{
    fn handle_notification(&self, notification: &Notification, handback: Option<&Handback>) {
        self(notification, handback);
    }
}

/// Decides whether a listener sees a notification.
pub trait NotificationFilter: Send + Sync {
    fn is_notification_enabled(&self, notification: &Notification) -> bool;
}

impl<F> NotificationFilter for F
where
    F: Fn(&Notification) -> bool + Send + Sync,
{
    fn is_notification_enabled(&self, notification: &Notification) -> bool {
        self(notification)
    }
}

/// The listener (or the exact listener/filter/handback triple) was never
/// added to this broadcaster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("listener not registered")]
pub struct ListenerNotRegistered;

/// Capability of emitting notifications to registered listeners.
pub trait NotificationBroadcaster: Send + Sync {
    fn add_notification_listener(
        &self,
        listener: Arc<dyn NotificationListener>,
        filter: Option<Arc<dyn NotificationFilter>>,
        handback: Option<Handback>,
    );

    /// Removes every registration of `listener`, whatever its filter and
    /// handback.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerNotRegistered`] if `listener` has no registration.
    fn remove_notification_listener(
        &self,
        listener: &Arc<dyn NotificationListener>,
    ) -> Result<(), ListenerNotRegistered>;

    /// Removes the single registration matching all three identities.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerNotRegistered`] if no registration matches exactly.
    fn remove_notification_listener_exact(
        &self,
        listener: &Arc<dyn NotificationListener>,
        filter: Option<&Arc<dyn NotificationFilter>>,
        handback: Option<&Handback>,
    ) -> Result<(), ListenerNotRegistered>;

    /// Notification types this broadcaster may emit.
    fn notification_info(&self) -> Vec<NotificationInfo> {
        Vec::new()
    }
}

// ---------------------------------------------------------------------------
// BroadcasterSupport
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct ListenerRegistration {
    listener: Arc<dyn NotificationListener>,
    filter: Option<Arc<dyn NotificationFilter>>,
    handback: Option<Handback>,
}

impl ListenerRegistration {
    fn is_listener(&self, listener: &Arc<dyn NotificationListener>) -> bool {
        ObjectAddr::of(&*self.listener) == ObjectAddr::of(&**listener)
    }

    fn matches_exact(
        &self,
        listener: &Arc<dyn NotificationListener>,
        filter: Option<&Arc<dyn NotificationFilter>>,
        handback: Option<&Handback>,
    ) -> bool {
        let same_filter = match (&self.filter, filter) {
            (None, None) => true,
            (Some(a), Some(b)) => ObjectAddr::of(&**a) == ObjectAddr::of(&**b),
            _ => false,
        };
        let same_handback = match (&self.handback, handback) {
            (None, None) => true,
            (Some(a), Some(b)) => ObjectAddr::of(&**a) == ObjectAddr::of(&**b),
            _ => false,
        };
        self.is_listener(listener) && same_filter && same_handback
    }
}

/// Thread-safe listener list with sequence numbering.
///
/// Dispatch takes a snapshot of the registrations and releases the lock
/// before calling any filter or listener, so listeners may add or remove
/// registrations re-entrantly. A panicking filter or listener is logged and
/// skipped; the remaining listeners still run.
pub struct BroadcasterSupport {
    registrations: RwLock<Vec<ListenerRegistration>>,
    info: Vec<NotificationInfo>,
    sequence: AtomicU64,
}

impl BroadcasterSupport {
    #[must_use]
    pub fn new(info: Vec<NotificationInfo>) -> Self {
        Self {
            registrations: RwLock::new(Vec::new()),
            info,
            sequence: AtomicU64::new(0),
        }
    }

    /// Next sequence number, starting at 1.
    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Number of live registrations.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.registrations.read().len()
    }

    /// Delivers `notification` to every registration whose filter accepts it.
    pub fn send_notification(&self, notification: &Notification) {
        let snapshot = self.registrations.read().clone();
        for registration in snapshot {
            let outcome = catch_fault(|| {
                let enabled = registration
                    .filter
                    .as_ref()
                    .map_or(true, |f| f.is_notification_enabled(notification));
                if enabled {
                    registration
                        .listener
                        .handle_notification(notification, registration.handback.as_ref());
                }
            });
            if let Err(error) = outcome {
                tracing::warn!(
                    kind = %notification.kind,
                    sequence = notification.sequence,
                    %error,
                    "notification listener failed"
                );
            }
        }
    }
}

impl Default for BroadcasterSupport {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl NotificationBroadcaster for BroadcasterSupport {
    fn add_notification_listener(
        &self,
        listener: Arc<dyn NotificationListener>,
        filter: Option<Arc<dyn NotificationFilter>>,
        handback: Option<Handback>,
    ) {
        self.registrations.write().push(ListenerRegistration {
            listener,
            filter,
            handback,
        });
    }

    fn remove_notification_listener(
        &self,
        listener: &Arc<dyn NotificationListener>,
    ) -> Result<(), ListenerNotRegistered> {
        let mut registrations = self.registrations.write();
        let before = registrations.len();
        registrations.retain(|r| !r.is_listener(listener));
        if registrations.len() == before {
            Err(ListenerNotRegistered)
        } else {
            Ok(())
        }
    }

    fn remove_notification_listener_exact(
        &self,
        listener: &Arc<dyn NotificationListener>,
        filter: Option<&Arc<dyn NotificationFilter>>,
        handback: Option<&Handback>,
    ) -> Result<(), ListenerNotRegistered> {
        let mut registrations = self.registrations.write();
        let position = registrations
            .iter()
            .position(|r| r.matches_exact(listener, filter, handback))
            .ok_or(ListenerNotRegistered)?;
        registrations.remove(position);
        Ok(())
    }

    fn notification_info(&self) -> Vec<NotificationInfo> {
        self.info.clone()
    }
}
