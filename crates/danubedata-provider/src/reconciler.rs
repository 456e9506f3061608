//! DanubeData resource provider

use crate::{lookup, planner};
use crate::resource::{create_body, refresh_inputs, to_state, update_body};
use crate::waiter::{WaitConfig, wait_until_ready};
use async_trait::async_trait;
use danubedata_client::ApiClient;
use danubedata_config::ProviderConfig;
use danubedata_core::schema::PACKAGE;
use danubedata_core::{
    ActionType, ApplyContext, Plan, PropertyMap, ProviderError, Registry, ResourceProvider,
    ResourceSchema, ResourceSpec, ResourceState, ResourceStatus, Result,
};
use serde_json::Value;
use std::sync::Arc;

/// Reconciles declared resources against the DanubeData API
///
/// Holds nothing but immutable configuration; independent resources can be
/// applied concurrently through a shared reference.
#[derive(Debug, Clone)]
pub struct Reconciler {
    client: ApiClient,
    registry: Arc<Registry>,
    wait: WaitConfig,
}

impl Reconciler {
    /// Reconciler for every built-in resource type
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = ApiClient::new(config)?;
        Ok(Self::with_client(
            client,
            Arc::new(Registry::builtin()),
            WaitConfig::from(config),
        ))
    }

    pub fn with_client(client: ApiClient, registry: Arc<Registry>, wait: WaitConfig) -> Self {
        Self {
            client,
            registry,
            wait,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    async fn create(&self, desired: &ResourceSpec, ctx: &ApplyContext) -> Result<ResourceState> {
        let schema = self.registry.schema(&desired.resource_type)?;
        let body = create_body(schema, &desired.properties);

        tracing::info!("Creating {} {}", schema.type_name, desired.name);
        let created = self.client.create(&schema.collection, &body, ctx).await?;
        let state = to_state(schema, &desired.name, &desired.properties, &created, None)?;
        tracing::info!("Created {} {} (ID: {})", schema.type_name, desired.name, state.id);

        self.settle(schema, state, created, ctx).await
    }

    async fn update(&self, plan: &Plan, desired: &ResourceSpec, ctx: &ApplyContext) -> Result<ResourceState> {
        let prior = required(plan.prior.as_ref(), plan, "prior")?;
        let schema = self.registry.schema(&desired.resource_type)?;

        let fields = plan
            .changes
            .iter()
            .filter(|c| !c.requires_replace)
            .map(|c| c.field.as_str());
        let body = update_body(fields, &desired.properties);

        tracing::info!(
            "Updating {} {} ({})",
            schema.type_name,
            desired.name,
            plan.changed_fields().join(", ")
        );
        let updated = self
            .client
            .update(&schema.collection, &prior.id, &body, ctx)
            .await?;
        let state = to_state(schema, &desired.name, &desired.properties, &updated, Some(prior))?;

        self.settle(schema, state, updated, ctx).await
    }

    /// Wait for readiness where the type needs it
    ///
    /// Once the remote mutation has happened, any failure carries the state
    /// reached so far.
    async fn settle(
        &self,
        schema: &ResourceSchema,
        state: ResourceState,
        remote: Value,
        ctx: &ApplyContext,
    ) -> Result<ResourceState> {
        if !schema.await_ready {
            return Ok(state);
        }

        let ready = wait_until_ready(&self.client, schema, &state.id, remote, &self.wait, ctx)
            .await
            .and_then(|remote| to_state(schema, &state.name, &state.inputs, &remote, Some(&state)));

        ready.map_err(|source| {
            tracing::warn!(
                "{} {} (ID: {}) did not become ready: {}",
                schema.type_name,
                state.name,
                state.id,
                source
            );
            ProviderError::Partial {
                state: Box::new(state),
                source: Box::new(source),
            }
        })
    }

    async fn delete(&self, prior: &ResourceState, ctx: &ApplyContext) -> Result<()> {
        let schema = self.registry.schema(&prior.resource_type)?;

        tracing::info!("Deleting {} {} (ID: {})", schema.type_name, prior.name, prior.id);
        let deleted = self.client.delete(&schema.collection, &prior.id, ctx).await?;
        if !deleted {
            tracing::info!("{} {} was already deleted", schema.type_name, prior.name);
        }
        Ok(())
    }
}

/// Error of a replacement whose create failed after the old resource was deleted
///
/// When the new resource was never created the host is handed the old
/// state marked deleted, so the next diff plans a plain create.
fn replaced_without_successor(prior: &ResourceState, err: ProviderError) -> ProviderError {
    if err.partial_state().is_some() {
        return err;
    }
    tracing::warn!(
        "{} {} (ID: {}) was deleted but its replacement failed: {}",
        prior.resource_type,
        prior.name,
        prior.id,
        err
    );
    ProviderError::Partial {
        state: Box::new(prior.clone().with_status(ResourceStatus::Deleted)),
        source: Box::new(err),
    }
}

fn required<'a, T>(value: Option<&'a T>, plan: &Plan, what: &str) -> Result<&'a T> {
    value.ok_or_else(|| {
        ProviderError::validation(
            &plan.name,
            what,
            format!("{} plan carries no {} resource", plan.action, what),
        )
    })
}

#[async_trait]
impl ResourceProvider for Reconciler {
    fn name(&self) -> &str {
        PACKAGE
    }

    fn registry(&self) -> &Registry {
        &self.registry
    }

    fn check(&self, spec: ResourceSpec, prior: Option<&ResourceState>) -> Result<ResourceSpec> {
        planner::check(&self.registry, spec, prior)
    }

    fn diff(&self, desired: Option<&ResourceSpec>, prior: Option<&ResourceState>) -> Result<Plan> {
        planner::diff(&self.registry, desired, prior)
    }

    async fn apply(&self, plan: &Plan, ctx: &ApplyContext) -> Result<Option<ResourceState>> {
        match plan.action {
            ActionType::NoOp => Ok(plan.prior.clone()),
            ActionType::Create => {
                let desired = required(plan.desired.as_ref(), plan, "desired")?;
                self.create(desired, ctx).await.map(Some)
            }
            ActionType::Update => {
                let desired = required(plan.desired.as_ref(), plan, "desired")?;
                self.update(plan, desired, ctx).await.map(Some)
            }
            ActionType::Replace => {
                let desired = required(plan.desired.as_ref(), plan, "desired")?;
                let prior = required(plan.prior.as_ref(), plan, "prior")?;
                tracing::info!("{}", plan.description());
                self.delete(prior, ctx).await?;
                self.create(desired, ctx)
                    .await
                    .map(Some)
                    .map_err(|e| replaced_without_successor(prior, e))
            }
            ActionType::Delete => {
                let prior = required(plan.prior.as_ref(), plan, "prior")?;
                self.delete(prior, ctx).await?;
                Ok(None)
            }
        }
    }

    async fn read(&self, state: &ResourceState, ctx: &ApplyContext) -> Result<Option<ResourceState>> {
        let schema = self.registry.schema(&state.resource_type)?;

        let Some(remote) = self.client.get(&schema.collection, &state.id, ctx).await? else {
            tracing::info!("{} {} (ID: {}) no longer exists", schema.type_name, state.name, state.id);
            return Ok(None);
        };

        let inputs = refresh_inputs(schema, &state.inputs, &remote);
        let refreshed = to_state(schema, &state.name, &inputs, &remote, Some(state))?;
        if refreshed.status == ResourceStatus::Deleted {
            return Ok(None);
        }
        Ok(Some(refreshed))
    }

    async fn invoke(&self, function: &str, args: &PropertyMap, ctx: &ApplyContext) -> Result<Value> {
        let function = self.registry.function(function)?;
        lookup::check_args(function, args)?;

        let items = self.client.list(&function.path, ctx).await?;
        let total = items.len();
        let selected = lookup::select(args, items);
        tracing::info!(
            "{} matched {} of {} items",
            function.function,
            selected.len(),
            total
        );
        Ok(lookup::result(function, selected))
    }
}
