//! `mbeans` server: concurrent registry of managed objects with lifecycle
//! hooks, permission-scoped dispatch, pattern queries and notification relay.

pub mod broadcaster;
pub mod config;
pub mod delegate;
pub mod error;
pub mod instantiate;
pub mod interceptor;
pub mod introspect;
pub mod lifecycle;
pub mod logging;
pub mod mbean;
pub mod query;
pub mod relay;
pub mod repository;
pub mod security;
pub mod traits;

#[cfg(test)]
pub(crate) mod test_support;

pub use broadcaster::{
    BroadcasterSupport, Handback, NotificationBroadcaster, NotificationFilter,
    NotificationListener,
};
pub use config::{ServerConfig, DEFAULT_DOMAIN};
pub use delegate::MBeanServerDelegate;
pub use error::{ErrorKind, HookPhase, ManagementError, Target};
pub use instantiate::FactoryInstantiator;
pub use interceptor::{MBeanServer, MBeanServerBuilder};
pub use introspect::StandardIntrospector;
pub use logging::{init_tracing, LogConfig};
pub use mbean::{Candidate, DynamicMBean, HookError, MBeanRegistration, TargetError};
pub use query::{CompareOp, Query, QueryExp};
pub use security::{AccessController, AccessDenied};
pub use traits::{ClassHandle, InstantiationError, Instantiator, Introspected, Introspector, NotCompliant};
