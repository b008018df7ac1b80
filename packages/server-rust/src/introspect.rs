use std::any::{type_name, Any, TypeId};
use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use mbeans_core::MBeanInfo;

use crate::error::catch_fault;
use crate::mbean::{Candidate, DynamicMBean};
use crate::traits::{Introspected, Introspector, NotCompliant};

type AdapterFn =
    dyn Fn(Arc<dyn Any + Send + Sync>) -> Result<Arc<dyn DynamicMBean>, NotCompliant> + Send + Sync;

// ---------------------------------------------------------------------------
// StandardIntrospector
// ---------------------------------------------------------------------------

/// Default introspection service.
///
/// - **Dynamic** candidates are accepted as their own façade once their
///   metadata passes the structural checks.
/// - **Resource** candidates are converted through an adapter registered for
///   their concrete type with [`StandardIntrospector::register_adapter`].
///   Types without an adapter are not compliant.
pub struct StandardIntrospector {
    /// Concrete resource type -> façade factory.
    adapters: DashMap<TypeId, Arc<AdapterFn>>,
}

impl StandardIntrospector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            adapters: DashMap::new(),
        }
    }

    /// Registers the façade factory used for resources of type `T`,
    /// replacing any previous one.
    pub fn register_adapter<T, F>(&self, adapter: F)
    where
        T: Any + Send + Sync,
        F: Fn(Arc<T>) -> Arc<dyn DynamicMBean> + Send + Sync + 'static,
    {
        let erased: Arc<AdapterFn> = Arc::new(move |resource: Arc<dyn Any + Send + Sync>| {
            resource
                .downcast::<T>()
                .map(|typed| adapter(typed))
                .map_err(|_| NotCompliant::new(type_name::<T>(), "resource type mismatch"))
        });
        self.adapters.insert(TypeId::of::<T>(), erased);
    }

    /// Whether resources of type `T` can be adapted.
    #[must_use]
    pub fn has_adapter<T: Any>(&self) -> bool {
        self.adapters.contains_key(&TypeId::of::<T>())
    }

    fn adapt(
        &self,
        resource: Arc<dyn Any + Send + Sync>,
    ) -> Result<Arc<dyn DynamicMBean>, NotCompliant> {
        let type_id = (*resource).type_id();
        let adapter = self
            .adapters
            .get(&type_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| {
                NotCompliant::new(format!("{type_id:?}"), "no management adapter registered")
            })?;
        catch_fault(|| adapter(resource)).map_err(|e| {
            NotCompliant::new(format!("{type_id:?}"), format!("adapter failed: {e}"))
        })?
    }
}

impl Default for StandardIntrospector {
    fn default() -> Self {
        Self::new()
    }
}

impl Introspector for StandardIntrospector {
    fn introspect(&self, candidate: Candidate) -> Result<Introspected, NotCompliant> {
        let (mbean, resource) = match candidate {
            Candidate::Dynamic(mbean) => (mbean, None),
            Candidate::Resource(resource) => (self.adapt(Arc::clone(&resource))?, Some(resource)),
        };
        let info = catch_fault(|| mbean.mbean_info())
            .map_err(|e| NotCompliant::new("<unknown>", format!("metadata unavailable: {e}")))?;
        check_info(&info)?;
        Ok(Introspected {
            mbean,
            resource,
            class_name: info.class_name,
        })
    }
}

/// Structural contract every façade must meet.
fn check_info(info: &MBeanInfo) -> Result<(), NotCompliant> {
    if info.class_name.trim().is_empty() {
        return Err(NotCompliant::new("<unknown>", "class name is empty"));
    }
    let mut seen = HashSet::new();
    for attribute in &info.attributes {
        if attribute.name.is_empty() {
            return Err(NotCompliant::new(&info.class_name, "attribute with empty name"));
        }
        if !seen.insert(attribute.name.as_str()) {
            return Err(NotCompliant::new(
                &info.class_name,
                format!("attribute {:?} declared twice", attribute.name),
            ));
        }
    }
    if info.operations.iter().any(|op| op.name.is_empty()) {
        return Err(NotCompliant::new(&info.class_name, "operation with empty name"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
