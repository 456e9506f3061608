//! Wire types of the plugin protocol
//!
//! One JSON object per line in each direction:
//!
//! ```text
//! -> {"id": 1, "method": "diff", "params": {"desired": {...}, "prior": null}}
//! <- {"id": 1, "result": {"action": "create", ...}}
//! <- {"id": 2, "error": {"kind": "transient", "message": "...", "partial_state": {...}}}
//! ```

use danubedata_core::{
    Dependency, ErrorKind, Plan, PropertyMap, ProviderError, ResourceSpec, ResourceState,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const METHOD_GET_SCHEMA: &str = "getSchema";
pub const METHOD_CONFIGURE: &str = "configure";
pub const METHOD_CHECK: &str = "check";
pub const METHOD_DIFF: &str = "diff";
pub const METHOD_APPLY: &str = "apply";
pub const METHOD_READ: &str = "read";
pub const METHOD_CANCEL: &str = "cancel";
pub const METHOD_INVOKE: &str = "invoke";
pub const METHOD_VALIDATE_DEPLOYMENT: &str = "validateDeployment";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Response {
    pub fn ok(id: u64, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: u64, error: ErrorBody) -> Self {
        Self {
            id,
            result: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
    /// Remote resource left behind by a failed apply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_state: Option<ResourceState>,
}

impl ErrorBody {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            partial_state: None,
        }
    }
}

impl From<&ProviderError> for ErrorBody {
    fn from(err: &ProviderError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            partial_state: err.partial_state().cloned(),
        }
    }
}

/// `check` parameters
#[derive(Debug, Clone, Deserialize)]
pub struct CheckParams {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    #[serde(default)]
    pub inputs: PropertyMap,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub prior: Option<ResourceState>,
}

impl CheckParams {
    pub fn into_spec(self) -> (ResourceSpec, Option<ResourceState>) {
        let spec = ResourceSpec {
            resource_type: self.resource_type,
            name: self.name,
            properties: self.inputs,
            dependencies: self.dependencies,
        };
        (spec, self.prior)
    }
}

/// `diff` parameters
#[derive(Debug, Clone, Deserialize)]
pub struct DiffParams {
    #[serde(default)]
    pub desired: Option<ResourceSpec>,
    #[serde(default)]
    pub prior: Option<ResourceState>,
}

/// `apply` parameters
#[derive(Debug, Clone, Deserialize)]
pub struct ApplyParams {
    pub plan: Plan,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// `read` parameters
#[derive(Debug, Clone, Deserialize)]
pub struct ReadParams {
    pub state: ResourceState,
}

/// `invoke` parameters
#[derive(Debug, Clone, Deserialize)]
pub struct InvokeParams {
    /// Function name or token, e.g. `getVpss`
    #[serde(alias = "token")]
    pub function: String,
    #[serde(default)]
    pub args: PropertyMap,
}

/// `validateDeployment` parameters: the host's resources in declaration order
#[derive(Debug, Clone, Deserialize)]
pub struct ValidateDeploymentParams {
    pub resources: Vec<ResourceSpec>,
}
