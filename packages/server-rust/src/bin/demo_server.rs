//! demo-server: registers a few worker pools, runs a query against them and
//! prints the result as JSON.

use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use mbeans_core::{
    Attribute, AttributeInfo, Impact, MBeanInfo, Notification, ObjectName, OperationInfo,
    ParameterInfo, Value,
};
use mbeans_server::{
    init_tracing, Candidate, DynamicMBean, Handback, LogConfig, MBeanServer, NotificationListener,
    Query, ServerConfig, StandardIntrospector, TargetError,
};

/// Management registry demo
#[derive(Parser, Debug)]
#[command(name = "demo-server")]
#[command(about = "Registers sample worker pools and queries them")]
struct Args {
    /// JSON server configuration; absent fields take their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Domain for names given without one (overrides the config file)
    #[arg(long, env = "MBEANS_DEFAULT_DOMAIN")]
    default_domain: Option<String>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_filter: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "MBEANS_LOG_JSON")]
    log_json: bool,

    /// Pools with more active workers than this are reported as busy
    #[arg(long, default_value = "2")]
    busy_threshold: i64,
}

// ---------------------------------------------------------------------------
// Sample resource
// ---------------------------------------------------------------------------

struct WorkerPool {
    size: AtomicI64,
    active: AtomicI64,
}

impl WorkerPool {
    fn new(size: i64, active: i64) -> Self {
        Self {
            size: AtomicI64::new(size),
            active: AtomicI64::new(active),
        }
    }
}

/// Management façade produced for every registered [`WorkerPool`].
struct WorkerPoolFacade(Arc<WorkerPool>);

impl DynamicMBean for WorkerPoolFacade {
    fn mbean_info(&self) -> MBeanInfo {
        MBeanInfo::new("demo.WorkerPool", "fixed-size worker pool")
            .with_attribute(AttributeInfo::read_write("Size", "long"))
            .with_attribute(AttributeInfo::read_only("Active", "long"))
            .with_operation(
                OperationInfo::new("resize", "long", Impact::Action)
                    .with_param(ParameterInfo::new("size", "long")),
            )
    }

    fn get_attribute(&self, attribute: &str) -> Result<Value, TargetError> {
        match attribute {
            "Size" => Ok(Value::Int(self.0.size.load(Ordering::Relaxed))),
            "Active" => Ok(Value::Int(self.0.active.load(Ordering::Relaxed))),
            _ => Err(TargetError::AttributeNotFound(attribute.to_string())),
        }
    }

    fn set_attribute(&self, attribute: &Attribute) -> Result<(), TargetError> {
        if attribute.name != "Size" {
            return Err(TargetError::AttributeNotFound(attribute.name.clone()));
        }
        let size = attribute
            .value
            .as_i64()
            .filter(|s| *s > 0)
            .ok_or_else(|| TargetError::InvalidAttributeValue {
                attribute: "Size".to_string(),
                reason: "expected a positive long".to_string(),
            })?;
        self.0.size.store(size, Ordering::Relaxed);
        Ok(())
    }

    fn invoke(
        &self,
        operation: &str,
        params: &[Value],
        _signature: &[String],
    ) -> Result<Value, TargetError> {
        match (operation, params) {
            ("resize", [size]) => {
                self.set_attribute(&Attribute::new("Size", size.clone()))?;
                Ok(size.clone())
            }
            _ => Err(TargetError::NoSuchOperation(operation.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(&LogConfig {
        filter: args.log_filter.clone(),
        json: args.log_json,
    })?;

    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            ServerConfig::from_json(&raw)?
        }
        None => ServerConfig::default(),
    };
    if let Some(domain) = args.default_domain {
        config.default_domain = domain;
    }

    let introspector = StandardIntrospector::new();
    introspector.register_adapter::<WorkerPool, _>(|pool| Arc::new(WorkerPoolFacade(pool)));

    let server = MBeanServer::builder()
        .config(config)
        .introspector(Arc::new(introspector))
        .build()?;

    let lifecycle_log: Arc<dyn NotificationListener> =
        Arc::new(|n: &Notification, _: Option<&Handback>| {
            if let Some(name) = n.mbean_name() {
                tracing::info!(kind = %n.kind, sequence = n.sequence, %name, "lifecycle event");
            }
        });
    server.add_notification_listener(&server.delegate_name(), lifecycle_log, None, None)?;

    for (pool, size, active) in [("io", 8, 5), ("cpu", 4, 1), ("blocking", 16, 3)] {
        let name = ObjectName::from_parts("", [("type", "WorkerPool"), ("name", pool)])?;
        server.register_mbean(Candidate::resource(WorkerPool::new(size, active)), Some(&name))?;
    }

    let cpu = ObjectName::from_parts("", [("type", "WorkerPool"), ("name", "cpu")])?;
    server.invoke(&cpu, "resize", &[Value::Int(6)], &["long".to_string()])?;

    let pattern = ObjectName::parse(":type=WorkerPool,*")?;
    let busy = Query::attr_gt("Active", args.busy_threshold);
    let names = server.query_names(Some(&pattern), Some(&busy))?;
    tracing::info!(query = %busy, matched = names.len(), "query evaluated");

    let mut pools = Vec::new();
    for name in &names {
        let attributes = server.get_attributes(name, &["Size".to_string(), "Active".to_string()])?;
        let fields: serde_json::Map<String, serde_json::Value> = attributes
            .into_iter()
            .map(|a| (a.name, a.value.to_json()))
            .collect();
        pools.push(serde_json::json!({ "name": name, "attributes": fields }));
    }

    let report = serde_json::json!({
        "server_id": server.config().server_id,
        "default_domain": server.get_default_domain(),
        "domains": server.get_domains()?,
        "mbean_count": server.get_mbean_count(),
        "busy_pools": pools,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    for name in server.query_names(Some(&pattern), None)? {
        server.unregister_mbean(&name)?;
    }
    Ok(())
}
