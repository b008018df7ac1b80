//! Authoritative name → managed object map.
//!
//! [`Repository`] is backed by a [`DashMap`], so lookups and writes to
//! different names proceed in parallel while the entry API makes the
//! test-and-insert of a single name atomic. Names reaching the repository are
//! already qualified with the default domain; the repository never completes
//! names itself.

use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use mbeans_core::{ObjectAddr, ObjectInstance, ObjectName};
use parking_lot::RwLock;

use crate::error::ManagementError;
use crate::mbean::DynamicMBean;
use crate::traits::Introspected;

// ---------------------------------------------------------------------------
// RegisteredEntry
// ---------------------------------------------------------------------------

/// One registered object. Immutable once stored.
pub struct RegisteredEntry {
    name: ObjectName,
    mbean: Arc<dyn DynamicMBean>,
    resource: Option<Arc<dyn Any + Send + Sync>>,
    resource_addr: ObjectAddr,
    class_name: String,
}

impl RegisteredEntry {
    #[must_use]
    pub fn new(name: ObjectName, introspected: Introspected) -> Self {
        let resource_addr = match &introspected.resource {
            Some(resource) => ObjectAddr::of(&**resource),
            None => ObjectAddr::of(&*introspected.mbean),
        };
        Self {
            name,
            mbean: introspected.mbean,
            resource: introspected.resource,
            resource_addr,
            class_name: introspected.class_name,
        }
    }

    #[must_use]
    pub fn name(&self) -> &ObjectName {
        &self.name
    }

    /// Façade that attribute and operation calls are dispatched to.
    #[must_use]
    pub fn mbean(&self) -> &Arc<dyn DynamicMBean> {
        &self.mbean
    }

    /// Raw object behind an adapter façade; `None` when the façade is the
    /// resource itself.
    #[must_use]
    pub fn resource(&self) -> Option<&Arc<dyn Any + Send + Sync>> {
        self.resource.as_ref()
    }

    /// Identity of the underlying resource, used to recognise notifications
    /// it emits about itself.
    #[must_use]
    pub fn resource_addr(&self) -> ObjectAddr {
        self.resource_addr
    }

    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    #[must_use]
    pub fn object_instance(&self) -> ObjectInstance {
        ObjectInstance {
            name: self.name.clone(),
            class_name: self.class_name.clone(),
        }
    }
}

impl fmt::Debug for RegisteredEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredEntry")
            .field("name", &self.name)
            .field("class_name", &self.class_name)
            .field("adapted", &self.resource.is_some())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// Concurrent registry of managed objects keyed by name.
pub struct Repository {
    entries: DashMap<ObjectName, Arc<RegisteredEntry>>,
    /// Domains reported by [`Repository::domains`] even when empty.
    declared_domains: RwLock<BTreeSet<String>>,
}

impl Repository {
    /// Creates an empty repository with the given domains pre-declared.
    #[must_use]
    pub fn new<I, S>(declared_domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: DashMap::new(),
            declared_domains: RwLock::new(declared_domains.into_iter().map(Into::into).collect()),
        }
    }

    /// Stores `entry` unless its name is taken.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementError::InstanceAlreadyExists`] if an entry with the
    /// same name is present; the existing entry is left untouched.
    pub fn insert(&self, entry: RegisteredEntry) -> Result<Arc<RegisteredEntry>, ManagementError> {
        match self.entries.entry(entry.name.clone()) {
            Entry::Occupied(_) => Err(ManagementError::InstanceAlreadyExists { name: entry.name }),
            Entry::Vacant(vacant) => {
                let entry = Arc::new(entry);
                vacant.insert(Arc::clone(&entry));
                Ok(entry)
            }
        }
    }

    /// Removes and returns the entry for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementError::InstanceNotFound`] if nothing is registered.
    pub fn remove(&self, name: &ObjectName) -> Result<Arc<RegisteredEntry>, ManagementError> {
        self.entries
            .remove(name)
            .map(|(_, entry)| entry)
            .ok_or_else(|| ManagementError::not_found(name))
    }

    /// Returns the entry for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementError::InstanceNotFound`] if nothing is registered.
    pub fn lookup(&self, name: &ObjectName) -> Result<Arc<RegisteredEntry>, ManagementError> {
        self.entries
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ManagementError::not_found(name))
    }

    #[must_use]
    pub fn contains(&self, name: &ObjectName) -> bool {
        self.entries.contains_key(name)
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Every domain with at least one entry, plus every declared domain.
    #[must_use]
    pub fn domains(&self) -> BTreeSet<String> {
        let mut domains = self.declared_domains.read().clone();
        for entry in &self.entries {
            if !domains.contains(entry.key().domain()) {
                domains.insert(entry.key().domain().to_string());
            }
        }
        domains
    }

    /// Makes `domain` visible in [`Repository::domains`] even while empty.
    pub fn declare_domain(&self, domain: impl Into<String>) {
        self.declared_domains.write().insert(domain.into());
    }

    /// Point-in-time snapshot of the entries whose names `pattern` selects.
    ///
    /// The map is only read-locked per shard while the snapshot is taken;
    /// callers evaluate any further predicate on the returned vector.
    #[must_use]
    pub fn query(&self, pattern: &ObjectName) -> Vec<Arc<RegisteredEntry>> {
        if !pattern.is_pattern() {
            return self.lookup(pattern).map(|e| vec![e]).unwrap_or_default();
        }
        self.entries
            .iter()
            .filter(|entry| pattern.apply(entry.key()))
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
