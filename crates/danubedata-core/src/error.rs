//! Provider error types

use crate::state::ResourceState;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad classification of a provider failure
///
/// The host uses this to decide how to report a failure; the reconciler uses
/// it to decide whether a remote call may be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The declared properties are invalid; retrying cannot help
    Validation,
    /// Rate limits, network faults, remote 5xx; safe to retry
    Transient,
    /// Remote refused the request for good (quota, auth, conflict)
    Permanent,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::Transient => write!(f, "transient"),
            ErrorKind::Permanent => write!(f, "permanent"),
        }
    }
}

/// Provider errors
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Invalid property '{field}' on {resource}: {message}")]
    Validation {
        resource: String,
        field: String,
        message: String,
    },

    #[error("Unresolved reference: {resource}.{property} <- {target}.{output}")]
    UnresolvedReference {
        resource: String,
        property: String,
        target: String,
        output: String,
    },

    #[error("Duplicate resource name: {0}")]
    DuplicateName(String),

    #[error("API error ({status}, {kind}): {message}")]
    Api {
        status: u16,
        kind: ErrorKind,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected API response: {0}")]
    InvalidResponse(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Deadline exceeded")]
    DeadlineExceeded,

    #[error("Gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<ProviderError>,
    },

    #[error("Resource {} left in partial state: {source}", .state.id)]
    Partial {
        state: Box<ResourceState>,
        #[source]
        source: Box<ProviderError>,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProviderError {
    pub fn validation(
        resource: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Validation {
            resource: resource.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::UnknownResourceType(_)
            | ProviderError::UnknownFunction(_)
            | ProviderError::Validation { .. }
            | ProviderError::UnresolvedReference { .. }
            | ProviderError::DuplicateName(_)
            | ProviderError::Config(_) => ErrorKind::Validation,
            ProviderError::Api { kind, .. } => *kind,
            ProviderError::Network(_) => ErrorKind::Transient,
            ProviderError::RetriesExhausted { source, .. }
            | ProviderError::Partial { source, .. } => source.kind(),
            ProviderError::ResourceNotFound(_)
            | ProviderError::InvalidResponse(_)
            | ProviderError::Timeout(_)
            | ProviderError::Cancelled
            | ProviderError::DeadlineExceeded
            | ProviderError::Io(_)
            | ProviderError::Json(_) => ErrorKind::Permanent,
        }
    }

    /// Whether another attempt of the same call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Api {
                kind: ErrorKind::Transient,
                ..
            } | ProviderError::Network(_)
        )
    }

    /// State of a resource that exists remotely even though the call failed
    pub fn partial_state(&self) -> Option<&ResourceState> {
        match self {
            ProviderError::Partial { state, .. } => Some(state),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;
