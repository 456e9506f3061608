//! Deployment-level invariants
//!
//! The host orders and schedules resources; this module only checks that
//! the set it submits is well formed. The plugin exposes the check as
//! `validateDeployment`.

use crate::error::{ProviderError, Result};
use crate::provider::ResourceSpec;
use crate::registry::Registry;
use std::collections::HashMap;

/// Resources of one deployment, in the order the host declared them
#[derive(Debug, Clone, Default)]
pub struct Deployment {
    resources: Vec<ResourceSpec>,
}

impl Deployment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, resource: ResourceSpec) {
        self.resources.push(resource);
    }

    pub fn with(mut self, resource: ResourceSpec) -> Self {
        self.add(resource);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ResourceSpec> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceSpec> {
        self.resources.iter()
    }

    pub fn by_type<'a>(&'a self, resource_type: &'a str) -> impl Iterator<Item = &'a ResourceSpec> {
        self.resources
            .iter()
            .filter(move |r| r.resource_type == resource_type)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Check names are unique and every reference points backwards
    ///
    /// A reference may only target a resource declared earlier, which also
    /// rules out cycles. The referenced output must exist on the target type.
    pub fn validate(&self, registry: &Registry) -> Result<()> {
        let mut seen: HashMap<&str, &ResourceSpec> = HashMap::new();

        for resource in &self.resources {
            registry.schema(&resource.resource_type)?;

            for dep in &resource.dependencies {
                let target = seen.get(dep.resource.as_str()).ok_or_else(|| {
                    ProviderError::UnresolvedReference {
                        resource: resource.name.clone(),
                        property: dep.property.clone(),
                        target: dep.resource.clone(),
                        output: dep.output.clone(),
                    }
                })?;

                let target_schema = registry.schema(&target.resource_type)?;
                if !target_schema.has_output(&dep.output) {
                    return Err(ProviderError::validation(
                        &resource.name,
                        &dep.property,
                        format!(
                            "{} has no output '{}'",
                            target_schema.type_name, dep.output
                        ),
                    ));
                }
            }

            if seen.insert(resource.name.as_str(), resource).is_some() {
                return Err(ProviderError::DuplicateName(resource.name.clone()));
            }
        }

        tracing::debug!("Deployment of {} resources is well formed", self.len());
        Ok(())
    }
}

impl FromIterator<ResourceSpec> for Deployment {
    fn from_iter<I: IntoIterator<Item = ResourceSpec>>(iter: I) -> Self {
        Self {
            resources: iter.into_iter().collect(),
        }
    }
}
