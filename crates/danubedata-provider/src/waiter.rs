//! Readiness polling for resources that provision asynchronously
//!
//! VPS instances, caches and databases are returned by the API while still
//! provisioning. The reconciler polls them until their status reports ready.

use danubedata_client::ApiClient;
use danubedata_config::ProviderConfig;
use danubedata_core::{ApplyContext, ErrorKind, ProviderError, ResourceSchema, ResourceStatus, Result};
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;

/// Polling settings
#[derive(Debug, Clone, PartialEq)]
pub struct WaitConfig {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(600),
        }
    }
}

impl From<&ProviderConfig> for WaitConfig {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            timeout: config.ready_timeout(),
        }
    }
}

/// Poll `id` until it is ready; returns the last object the API reported
///
/// `initial` is the object returned by the create/update call, checked
/// before the first poll.
pub async fn wait_until_ready(
    client: &ApiClient,
    schema: &ResourceSchema,
    id: &str,
    initial: Value,
    config: &WaitConfig,
    ctx: &ApplyContext,
) -> Result<Value> {
    let started = Instant::now();
    let mut current = initial;
    let mut polls = 0u32;

    loop {
        if is_ready(schema, id, &current)? {
            tracing::debug!(
                "{} {} ready after {} polls ({:?})",
                schema.type_name,
                id,
                polls,
                started.elapsed()
            );
            return Ok(current);
        }

        if started.elapsed() >= config.timeout {
            return Err(ProviderError::Timeout(format!(
                "{} {} not ready after {}s",
                schema.type_name,
                id,
                config.timeout.as_secs()
            )));
        }

        ctx.sleep(config.poll_interval).await?;
        polls += 1;

        current = client
            .get(&schema.collection, id, ctx)
            .await?
            .ok_or_else(|| {
                ProviderError::ResourceNotFound(format!(
                    "{} {} disappeared while provisioning",
                    schema.type_name, id
                ))
            })?;
        tracing::debug!(
            "Polled {} {}: status {:?}",
            schema.type_name,
            id,
            current.get("status")
        );
    }
}

/// Whether the object is ready; a failed provisioning is a permanent error
fn is_ready(schema: &ResourceSchema, id: &str, remote: &Value) -> Result<bool> {
    if !remote.is_object() {
        return Ok(false);
    }
    let Some(raw) = remote.get("status").and_then(Value::as_str) else {
        // objects without a status are usable as soon as they exist
        return Ok(true);
    };

    match ResourceStatus::from_remote(raw) {
        ResourceStatus::Error => Err(ProviderError::Api {
            status: 200,
            kind: ErrorKind::Permanent,
            message: format!("{} {} entered status '{}'", schema.type_name, id, raw),
        }),
        status => Ok(status.is_ready()),
    }
}
