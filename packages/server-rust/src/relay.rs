//! Listener bookkeeping between callers and registered broadcasters.
//!
//! Callers subscribe by object name. The relay wraps each listener in a
//! [`ListenerWrapper`] that rewrites a notification's raw source into the
//! registered name, so consumers only ever see names. At most one live wrapper
//! exists per `(listener, resource, name)`. The cache holds it weakly, so the
//! broadcasters that hold it are the only thing keeping it (and the listener)
//! alive, and a dead entry is simply replaced on the next subscribe.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use mbeans_core::{
    Notification, NotificationSource, ObjectAddr, ObjectName, REGISTRATION_NOTIFICATION,
    UNREGISTRATION_NOTIFICATION,
};
use parking_lot::Mutex;

use crate::broadcaster::{Handback, NotificationBroadcaster, NotificationFilter, NotificationListener};
use crate::delegate::MBeanServerDelegate;
use crate::error::ManagementError;
use crate::repository::RegisteredEntry;

type WrapperKey = (ObjectAddr, ObjectAddr, ObjectName);

// ---------------------------------------------------------------------------
// ListenerWrapper
// ---------------------------------------------------------------------------

/// Forwards notifications from one resource to one caller listener,
/// replacing the resource's raw identity with its registered name.
pub struct ListenerWrapper {
    listener: Arc<dyn NotificationListener>,
    name: ObjectName,
    resource: ObjectAddr,
}

impl NotificationListener for ListenerWrapper {
    fn handle_notification(&self, notification: &Notification, handback: Option<&Handback>) {
        if notification.source == NotificationSource::Object(self.resource) {
            let mut rewritten = notification.clone();
            rewritten.source = NotificationSource::Name(self.name.clone());
            self.listener.handle_notification(&rewritten, handback);
        } else {
            self.listener.handle_notification(notification, handback);
        }
    }
}

// ---------------------------------------------------------------------------
// NotificationRelay
// ---------------------------------------------------------------------------

pub struct NotificationRelay {
    wrappers: Mutex<HashMap<WrapperKey, Weak<ListenerWrapper>>>,
    delegate: Arc<MBeanServerDelegate>,
}

impl NotificationRelay {
    #[must_use]
    pub fn new(delegate: Arc<MBeanServerDelegate>) -> Self {
        Self {
            wrappers: Mutex::new(HashMap::new()),
            delegate,
        }
    }

    #[must_use]
    pub fn delegate(&self) -> &Arc<MBeanServerDelegate> {
        &self.delegate
    }

    /// Adds `listener` to the broadcaster behind `entry`.
    ///
    /// Subscribing the same listener to the same object again reuses the
    /// existing wrapper.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementError::NotBroadcaster`] if the object does not emit
    /// notifications.
    pub fn subscribe(
        &self,
        entry: &RegisteredEntry,
        listener: Arc<dyn NotificationListener>,
        filter: Option<Arc<dyn NotificationFilter>>,
        handback: Option<Handback>,
    ) -> Result<(), ManagementError> {
        let broadcaster = broadcaster_of(entry)?;
        let wrapper = self.wrapper_for(entry, listener);
        broadcaster.add_notification_listener(wrapper, filter, handback);
        tracing::debug!(name = %entry.name(), "listener subscribed");
        Ok(())
    }

    /// Removes every registration of `listener` on the object behind `entry`.
    ///
    /// The cache entry is left alone: once no broadcaster holds the wrapper
    /// its weak reference is dead, while a concurrent `subscribe` that re-added
    /// it keeps it reachable for the next removal.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementError::NotBroadcaster`] if the object does not emit
    /// notifications, or [`ManagementError::ListenerNotFound`] if the listener
    /// was never subscribed to it.
    pub fn unsubscribe(
        &self,
        entry: &RegisteredEntry,
        listener: &Arc<dyn NotificationListener>,
    ) -> Result<(), ManagementError> {
        let broadcaster = broadcaster_of(entry)?;
        let wrapper = self
            .cached(&key_of(entry, listener))
            .ok_or_else(|| listener_not_found(entry))?;
        let removed = broadcaster.remove_notification_listener(&wrapper);
        tracing::debug!(name = %entry.name(), "listener unsubscribed");
        removed.map_err(|_| listener_not_found(entry))
    }

    /// Removes the single registration of `listener` with exactly this
    /// `filter` and `handback`.
    ///
    /// # Errors
    ///
    /// Same as [`NotificationRelay::unsubscribe`].
    pub fn unsubscribe_exact(
        &self,
        entry: &RegisteredEntry,
        listener: &Arc<dyn NotificationListener>,
        filter: Option<&Arc<dyn NotificationFilter>>,
        handback: Option<&Handback>,
    ) -> Result<(), ManagementError> {
        let broadcaster = broadcaster_of(entry)?;
        let wrapper = self
            .cached(&key_of(entry, listener))
            .ok_or_else(|| listener_not_found(entry))?;
        broadcaster
            .remove_notification_listener_exact(&wrapper, filter, handback)
            .map_err(|_| listener_not_found(entry))
    }

    pub fn emit_registered(&self, name: &ObjectName) {
        self.delegate.send_notification(REGISTRATION_NOTIFICATION, name);
    }

    pub fn emit_unregistered(&self, name: &ObjectName) {
        self.delegate.send_notification(UNREGISTRATION_NOTIFICATION, name);
    }

    /// Number of wrappers still held by at least one broadcaster.
    #[must_use]
    pub fn cached_wrapper_count(&self) -> usize {
        let mut wrappers = self.wrappers.lock();
        wrappers.retain(|_, w| w.strong_count() > 0);
        wrappers.len()
    }

    fn cached(&self, key: &WrapperKey) -> Option<Arc<dyn NotificationListener>> {
        let wrapper = self.wrappers.lock().get(key).and_then(Weak::upgrade)?;
        Some(wrapper)
    }

    fn wrapper_for(
        &self,
        entry: &RegisteredEntry,
        listener: Arc<dyn NotificationListener>,
    ) -> Arc<dyn NotificationListener> {
        let key = key_of(entry, &listener);
        let mut wrappers = self.wrappers.lock();
        if let Some(existing) = wrappers.get(&key).and_then(Weak::upgrade) {
            return existing;
        }
        wrappers.retain(|_, w| w.strong_count() > 0);
        let wrapper = Arc::new(ListenerWrapper {
            listener,
            name: entry.name().clone(),
            resource: entry.resource_addr(),
        });
        wrappers.insert(key, Arc::downgrade(&wrapper));
        wrapper
    }
}

fn key_of(entry: &RegisteredEntry, listener: &Arc<dyn NotificationListener>) -> WrapperKey {
    (
        ObjectAddr::of(&**listener),
        entry.resource_addr(),
        entry.name().clone(),
    )
}

fn broadcaster_of(entry: &RegisteredEntry) -> Result<&dyn NotificationBroadcaster, ManagementError> {
    entry
        .mbean()
        .broadcaster()
        .ok_or_else(|| ManagementError::NotBroadcaster {
            name: entry.name().clone(),
        })
}

fn listener_not_found(entry: &RegisteredEntry) -> ManagementError {
    ManagementError::ListenerNotFound {
        name: entry.name().clone(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
