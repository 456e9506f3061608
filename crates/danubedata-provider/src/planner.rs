//! Input checking and change planning
//!
//! Both operations are pure: they depend only on the registry and their
//! arguments, never on the remote API.

use crate::naming::autoname;
use danubedata_core::diff::{additions, compare};
use danubedata_core::{
    FieldChange, Plan, Registry, ResourceSpec, ResourceState, ResourceStatus, Result,
};
use serde_json::Value;

/// Validate a spec, fill defaults and assign a physical name
///
/// A resource declared without `name` keeps the name recorded in `prior`;
/// a new one gets `<logical>-<random suffix>`.
pub fn check(registry: &Registry, mut spec: ResourceSpec, prior: Option<&ResourceState>) -> Result<ResourceSpec> {
    let schema = registry.schema(&spec.resource_type)?;

    let unnamed = spec.properties.get("name").is_none_or(Value::is_null);
    if unnamed && schema.get_field("name").is_some() {
        let name = prior
            .filter(|p| p.resource_type == spec.resource_type)
            .and_then(|p| p.inputs.get("name").filter(|v| !v.is_null()).cloned())
            .unwrap_or_else(|| Value::String(autoname(&spec.name)));
        tracing::debug!("Autonamed {} as {}", spec.key(), name);
        spec.properties.insert("name".to_string(), name);
    }

    spec.properties = registry.apply_defaults(&spec.resource_type, &spec.properties)?;
    registry.validate(&spec)?;
    Ok(spec)
}

/// Decide how to move `prior` to `desired`
pub fn diff(registry: &Registry, desired: Option<&ResourceSpec>, prior: Option<&ResourceState>) -> Result<Plan> {
    let (desired, prior) = match (desired, prior) {
        (None, None) => return Ok(Plan::noop(None, None)),
        (None, Some(prior)) => return Ok(Plan::delete(prior.clone())),
        (Some(desired), prior) => (normalize(registry, desired)?, prior),
    };
    let schema = registry.schema(&desired.resource_type)?;

    let prior = match prior {
        Some(p) if p.status != ResourceStatus::Deleted => p,
        _ => {
            let changes = additions(schema, &desired.properties);
            return Ok(Plan::create(desired, changes));
        }
    };

    if prior.resource_type != desired.resource_type {
        let change = FieldChange {
            field: "resource_type".to_string(),
            old: Some(Value::String(prior.resource_type.clone())),
            new: Some(Value::String(desired.resource_type.clone())),
            requires_replace: true,
        };
        return Ok(Plan::replace(desired, prior.clone(), vec![change]));
    }

    let recorded = registry.apply_defaults(&prior.resource_type, &prior.inputs)?;
    let changes = compare(schema, &desired.properties, &recorded);

    let plan = if changes.is_empty() {
        Plan::noop(Some(desired), Some(prior.clone()))
    } else if changes.iter().any(|c| c.requires_replace) {
        Plan::replace(desired, prior.clone(), changes)
    } else {
        Plan::update(desired, prior.clone(), changes)
    };
    tracing::debug!("{}", plan.description());
    Ok(plan)
}

fn normalize(registry: &Registry, spec: &ResourceSpec) -> Result<ResourceSpec> {
    let mut spec = spec.clone();
    spec.properties = registry.apply_defaults(&spec.resource_type, &spec.properties)?;
    Ok(spec)
}
