//! Plan types for resource reconciliation

use crate::provider::ResourceSpec;
use crate::state::ResourceState;
use serde::{Deserialize, Serialize};

/// Type of action to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create a new resource
    Create,
    /// Update an existing resource in place
    Update,
    /// Delete the existing resource, then create it again
    Replace,
    /// Delete a resource
    Delete,
    /// No changes needed
    NoOp,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::Replace => write!(f, "replace"),
            ActionType::Delete => write!(f, "delete"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

/// A single property difference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old: Option<serde_json::Value>,
    pub new: Option<serde_json::Value>,
    /// The field cannot be updated in place
    pub requires_replace: bool,
}

/// Planned action for one resource
///
/// A plan embeds both the desired spec and the prior state so that applying
/// it needs nothing but the plan itself and the remote API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Type of action to perform
    pub action: ActionType,

    /// Resource type (e.g., "Vps", "StorageBucket")
    pub resource_type: String,

    /// Resource name
    pub name: String,

    /// Changed fields
    #[serde(default)]
    pub changes: Vec<FieldChange>,

    /// Desired spec, normalized (absent for Delete)
    #[serde(default)]
    pub desired: Option<ResourceSpec>,

    /// Last-known state (absent for Create)
    #[serde(default)]
    pub prior: Option<ResourceState>,
}

impl Plan {
    pub fn create(desired: ResourceSpec, changes: Vec<FieldChange>) -> Self {
        Self {
            action: ActionType::Create,
            resource_type: desired.resource_type.clone(),
            name: desired.name.clone(),
            changes,
            desired: Some(desired),
            prior: None,
        }
    }

    pub fn update(desired: ResourceSpec, prior: ResourceState, changes: Vec<FieldChange>) -> Self {
        Self {
            action: ActionType::Update,
            resource_type: desired.resource_type.clone(),
            name: desired.name.clone(),
            changes,
            desired: Some(desired),
            prior: Some(prior),
        }
    }

    pub fn replace(desired: ResourceSpec, prior: ResourceState, changes: Vec<FieldChange>) -> Self {
        Self {
            action: ActionType::Replace,
            ..Self::update(desired, prior, changes)
        }
    }

    pub fn delete(prior: ResourceState) -> Self {
        Self {
            action: ActionType::Delete,
            resource_type: prior.resource_type.clone(),
            name: prior.name.clone(),
            changes: Vec::new(),
            desired: None,
            prior: Some(prior),
        }
    }

    pub fn noop(desired: Option<ResourceSpec>, prior: Option<ResourceState>) -> Self {
        let (resource_type, name) = match (&desired, &prior) {
            (Some(d), _) => (d.resource_type.clone(), d.name.clone()),
            (None, Some(p)) => (p.resource_type.clone(), p.name.clone()),
            (None, None) => (String::new(), String::new()),
        };
        Self {
            action: ActionType::NoOp,
            resource_type,
            name,
            changes: Vec::new(),
            desired,
            prior,
        }
    }

    /// Whether applying the plan touches the remote API
    pub fn has_changes(&self) -> bool {
        self.action != ActionType::NoOp
    }

    /// Names of the changed fields
    pub fn changed_fields(&self) -> Vec<&str> {
        self.changes.iter().map(|c| c.field.as_str()).collect()
    }

    /// Fields forcing a replacement
    pub fn replace_reasons(&self) -> Vec<&str> {
        self.changes
            .iter()
            .filter(|c| c.requires_replace)
            .map(|c| c.field.as_str())
            .collect()
    }

    /// Description of the action
    pub fn description(&self) -> String {
        match self.action {
            ActionType::NoOp => format!("{} {} is up to date", self.resource_type, self.name),
            ActionType::Replace => format!(
                "replace {} {} (forced by {})",
                self.resource_type,
                self.name,
                self.replace_reasons().join(", ")
            ),
            ActionType::Update => format!(
                "update {} {} ({})",
                self.resource_type,
                self.name,
                self.changed_fields().join(", ")
            ),
            action => format!("{} {} {}", action, self.resource_type, self.name),
        }
    }
}

/// Counts of planned actions across a deployment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub replace: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl PlanSummary {
    pub fn of<'a>(plans: impl IntoIterator<Item = &'a Plan>) -> Self {
        let mut summary = Self::default();
        for plan in plans {
            match plan.action {
                ActionType::Create => summary.create += 1,
                ActionType::Update => summary.update += 1,
                ActionType::Replace => summary.replace += 1,
                ActionType::Delete => summary.delete += 1,
                ActionType::NoOp => summary.no_change += 1,
            }
        }
        summary
    }
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to replace, {} to delete, {} unchanged",
            self.create, self.update, self.replace, self.delete, self.no_change
        )
    }
}
