//! Provider trait and the resource specification model

use crate::action::Plan;
use crate::context::ApplyContext;
use crate::error::Result;
use crate::registry::Registry;
use crate::state::ResourceState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Property bag of a resource (key -> heterogeneous typed value)
pub type PropertyMap = BTreeMap<String, serde_json::Value>;

/// Resource provider abstraction
///
/// The orchestration host drives a provider through these operations. Each
/// call is a function of its arguments and the remote API responses; an
/// implementation must not keep mutable state across calls.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// Returns the provider package name (e.g., "danubedata")
    fn name(&self) -> &str;

    /// Schemas of every resource type this provider manages
    fn registry(&self) -> &Registry;

    /// Validate inputs, fill defaults and autoname the resource
    fn check(&self, spec: ResourceSpec, prior: Option<&ResourceState>) -> Result<ResourceSpec>;

    /// Calculate the change needed to move `prior` to `desired`
    fn diff(&self, desired: Option<&ResourceSpec>, prior: Option<&ResourceState>)
    -> Result<Plan>;

    /// Apply a plan; returns `None` once the resource is gone
    async fn apply(&self, plan: &Plan, ctx: &ApplyContext) -> Result<Option<ResourceState>>;

    /// Refresh a resource from the remote API; `None` if it no longer exists
    async fn read(&self, state: &ResourceState, ctx: &ApplyContext)
    -> Result<Option<ResourceState>>;

    /// Run a read-only lookup function with filter arguments
    async fn invoke(&self, function: &str, args: &PropertyMap, ctx: &ApplyContext) -> Result<serde_json::Value>;
}

/// Desired configuration of one resource
///
/// Submitted by the host for a single apply cycle; the provider only borrows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Resource type (e.g., "Vps", "Cache")
    pub resource_type: String,

    /// Resource name, unique within a deployment
    pub name: String,

    /// Declared properties, references already resolved by the host
    #[serde(default)]
    pub properties: PropertyMap,

    /// Properties that were filled from other resources' outputs
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

impl ResourceSpec {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            properties: PropertyMap::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Record that `property` comes from `resource.output`
    pub fn depends_on(
        mut self,
        property: impl Into<String>,
        resource: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        self.dependencies.push(Dependency {
            property: property.into(),
            resource: resource.into(),
            output: output.into(),
        });
        self
    }

    /// Get the full resource key (type:name)
    pub fn key(&self) -> String {
        format!("{}:{}", self.resource_type, self.name)
    }

    /// Get a property value as a specific type
    pub fn get_property<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.properties
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Dependency edge: `property` was resolved from `resource`'s `output`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub property: String,
    pub resource: String,
    pub output: String,
}

/// Retry configuration for remote calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first one)
    pub max_attempts: u32,

    /// Initial delay between retries
    #[serde(with = "duration_millis")]
    pub initial_delay: Duration,

    /// Maximum delay between retries
    #[serde(with = "duration_millis")]
    pub max_delay: Duration,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// A single attempt, no retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before the retry following `attempt` (0-indexed), capped at `max_delay`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt as i32);
        let delay = self.initial_delay.as_secs_f64() * factor;
        let max = self.max_delay.as_secs_f64();
        Duration::from_secs_f64(delay.min(max))
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
