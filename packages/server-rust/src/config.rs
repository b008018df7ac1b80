use serde::{Deserialize, Serialize};

use crate::error::ManagementError;

/// Domain that names without an explicit domain are completed with.
pub const DEFAULT_DOMAIN: &str = "DefaultDomain";

/// Server-level configuration.
///
/// Every field has a default, so a partial JSON document (or `{}`) yields a
/// usable configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Domain prefixed to names supplied without one.
    pub default_domain: String,
    /// Identifier reported by the delegate's `MBeanServerId` attribute.
    pub server_id: String,
    pub specification_name: String,
    pub specification_version: String,
    pub implementation_name: String,
    pub implementation_version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            default_domain: DEFAULT_DOMAIN.to_string(),
            server_id: uuid::Uuid::new_v4().to_string(),
            specification_name: "Managed Object Registry".to_string(),
            specification_version: "1.4".to_string(),
            implementation_name: env!("CARGO_PKG_NAME").to_string(),
            implementation_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Parses a JSON document; absent fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementError::InvalidArgument`] for malformed JSON or an
    /// invalid default domain.
    pub fn from_json(json: &str) -> Result<Self, ManagementError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ManagementError::InvalidArgument(format!("server config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the default domain can prefix a name.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementError::InvalidArgument`] if the default domain is
    /// empty, contains a wildcard, or contains `:`.
    pub fn validate(&self) -> Result<(), ManagementError> {
        let domain = &self.default_domain;
        if domain.is_empty() {
            return Err(ManagementError::InvalidArgument(
                "default domain must not be empty".to_string(),
            ));
        }
        if domain.contains(['*', '?', ':', '\n']) {
            return Err(ManagementError::InvalidArgument(format!(
                "default domain {domain:?} contains a reserved character"
            )));
        }
        Ok(())
    }
}
