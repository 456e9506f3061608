//! Last-known state of provisioned resources
//!
//! The reconciler produces a [`ResourceState`] after every successful apply.
//! The host persists it between runs and hands it back as the prior state.

use crate::provider::PropertyMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State of a single resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Remote-assigned resource ID
    pub id: String,

    /// Resource type (e.g., "Vps", "StorageBucket")
    pub resource_type: String,

    /// Resource name, unique within a deployment
    pub name: String,

    /// Current status
    pub status: ResourceStatus,

    /// Properties as last applied (defaults filled in)
    #[serde(default)]
    pub inputs: PropertyMap,

    /// Computed outputs (public_ip, endpoint, port, ...)
    #[serde(default)]
    pub outputs: PropertyMap,

    /// When the resource was created
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl ResourceState {
    pub fn new(
        id: impl Into<String>,
        resource_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            name: name.into(),
            status: ResourceStatus::Unknown,
            inputs: PropertyMap::new(),
            outputs: PropertyMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: ResourceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_inputs(mut self, inputs: PropertyMap) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_output(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.outputs.insert(key.into(), value);
        self
    }

    pub fn set_output(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.outputs.insert(key.into(), value);
        self.updated_at = Utc::now();
    }

    pub fn get_output<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.outputs
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Resolve an output reference such as `id` or `public_ip`
    pub fn output_value(&self, key: &str) -> Option<serde_json::Value> {
        if key == "id" {
            return Some(serde_json::Value::String(self.id.clone()));
        }
        self.outputs.get(key).cloned()
    }
}

/// Status of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Resource is being created
    Creating,
    /// Resource is running/active
    Running,
    /// Resource is stopped
    Stopped,
    /// Resource is being deleted
    Deleting,
    /// Resource has been deleted
    Deleted,
    /// Resource is in error state
    Error,
    /// Status is unknown
    Unknown,
}

impl ResourceStatus {
    /// Map a status string reported by the DanubeData API
    pub fn from_remote(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "pending" | "creating" | "provisioning" | "building" | "starting" => {
                ResourceStatus::Creating
            }
            "running" | "active" | "ready" | "available" | "online" => ResourceStatus::Running,
            "stopped" | "offline" | "suspended" => ResourceStatus::Stopped,
            "deleting" | "terminating" => ResourceStatus::Deleting,
            "deleted" | "terminated" => ResourceStatus::Deleted,
            "error" | "failed" => ResourceStatus::Error,
            _ => ResourceStatus::Unknown,
        }
    }

    /// Whether provisioning has finished successfully
    pub fn is_ready(&self) -> bool {
        matches!(self, ResourceStatus::Running | ResourceStatus::Stopped)
    }
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceStatus::Creating => write!(f, "creating"),
            ResourceStatus::Running => write!(f, "running"),
            ResourceStatus::Stopped => write!(f, "stopped"),
            ResourceStatus::Deleting => write!(f, "deleting"),
            ResourceStatus::Deleted => write!(f, "deleted"),
            ResourceStatus::Error => write!(f, "error"),
            ResourceStatus::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_remote_status_mapping() {
        assert_eq!(ResourceStatus::from_remote("Active"), ResourceStatus::Running);
        assert_eq!(
            ResourceStatus::from_remote("provisioning"),
            ResourceStatus::Creating
        );
        assert_eq!(ResourceStatus::from_remote("failed"), ResourceStatus::Error);
        assert_eq!(ResourceStatus::from_remote("???"), ResourceStatus::Unknown);
    }

    #[test]
    fn test_output_value_includes_id() {
        let state = ResourceState::new("vps-1", "Vps", "web-server")
            .with_status(ResourceStatus::Running)
            .with_output("public_ip", json!("203.0.113.10"));

        assert_eq!(state.output_value("id"), Some(json!("vps-1")));
        assert_eq!(
            state.get_output::<String>("public_ip").as_deref(),
            Some("203.0.113.10")
        );
        assert_eq!(state.output_value("missing"), None);
    }

    #[test]
    fn test_state_serde_roundtrip_keeps_outputs() {
        let state = ResourceState::new("7", "Cache", "session-cache")
            .with_output("port", json!(6379));
        let text = serde_json::to_string(&state).unwrap();
        let loaded: ResourceState = serde_json::from_str(&text).unwrap();
        assert_eq!(loaded.get_output::<u16>("port"), Some(6379));
        assert_eq!(loaded.name, "session-cache");
    }
}
