//! Policy configuration
//!
//! This module provides the configuration for the subnet policy hooks:
//! which subnet ids play the registered and unregistered roles, and how
//! the DNS hijack side effect is dispatched.

use crate::error::{PolicyError, Result};
use crate::subnet::SubnetId;
use serde::Deserialize;
use std::path::PathBuf;

/// Default script invoked for hijack/unhijack notifications
pub const DEFAULT_HIJACK_SCRIPT: &str = "/scripts/dns-hijack.sh";

/// Policy configuration
///
/// Deserialized from the parameter map the host server hands to the
/// library at load time, e.g.
///
/// ```json
/// {
///     "registered-subnet-id": 10,
///     "unregistered-subnet-id": 11,
///     "hijack-script": "/scripts/dns-hijack.sh",
///     "notify-queue-depth": 64
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PolicyConfig {
    /// Subnet for clients with a hardware-address reservation
    pub registered_subnet_id: SubnetId,

    /// Subnet for everyone else
    pub unregistered_subnet_id: SubnetId,

    /// Script run as `<script> <hijack|unhijack> <ip>`
    /// If None, no notifications are dispatched
    pub hijack_script: Option<PathBuf>,

    /// Pending notifications held before new ones are dropped
    pub notify_queue_depth: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            registered_subnet_id: SubnetId(10),
            unregistered_subnet_id: SubnetId(11),
            hijack_script: Some(PathBuf::from(DEFAULT_HIJACK_SCRIPT)),
            notify_queue_depth: 64,
        }
    }
}

impl PolicyConfig {
    /// Create a config with the default subnet ids and no notifications
    pub fn new() -> Self {
        Self {
            hijack_script: None,
            ..Default::default()
        }
    }

    /// Build a config from the host's hook parameters
    ///
    /// A missing (null) parameter map yields the defaults.
    pub fn from_params(params: &serde_json::Value) -> Result<Self> {
        let config: Self = if params.is_null() {
            Self::default()
        } else {
            serde_json::from_value(params.clone())
                .map_err(|e| PolicyError::ConfigError(e.to_string()))?
        };
        config.validate()?;
        Ok(config)
    }

    /// Set the registered subnet id
    pub fn with_registered_subnet(mut self, id: impl Into<SubnetId>) -> Self {
        self.registered_subnet_id = id.into();
        self
    }

    /// Set the unregistered subnet id
    pub fn with_unregistered_subnet(mut self, id: impl Into<SubnetId>) -> Self {
        self.unregistered_subnet_id = id.into();
        self
    }

    /// Set the hijack script
    pub fn with_hijack_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.hijack_script = Some(script.into());
        self
    }

    /// Disable hijack notifications
    pub fn without_hijack_script(mut self) -> Self {
        self.hijack_script = None;
        self
    }

    /// Set the notification queue depth
    pub fn with_notify_queue_depth(mut self, depth: usize) -> Self {
        self.notify_queue_depth = depth;
        self
    }

    /// Check the config for inconsistent values
    pub fn validate(&self) -> Result<()> {
        if self.registered_subnet_id == self.unregistered_subnet_id {
            return Err(PolicyError::ConfigError(format!(
                "registered and unregistered subnets are both {}",
                self.registered_subnet_id
            )));
        }
        if self.notify_queue_depth == 0 {
            return Err(PolicyError::ConfigError(
                "notify-queue-depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
