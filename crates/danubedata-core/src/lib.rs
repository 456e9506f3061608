//! DanubeData provider core
//!
//! Data model and pure logic of the DanubeData provider plugin: resource
//! schemas, the diff engine that decides between in-place updates and
//! replacements, plan types, and the typed errors surfaced to the host.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │              orchestration host                  │
//! └─────────────────┬───────────────────────────────┘
//!                   │ check / diff / apply / read
//! ┌─────────────────▼───────────────────────────────┐
//! │               danubedata-core                    │
//! │  ┌──────────────┐  ┌──────────────┐             │
//! │  │   Registry   │  │ Diff engine  │             │
//! │  └──────────────┘  └──────────────┘             │
//! │  trait ResourceProvider { ... }                  │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────┐
//! │ danubedata-provider (Reconciler) │──► danubedata-client ──► REST API
//! └──────────────────────────────────┘
//! ```

pub mod action;
pub mod context;
pub mod deployment;
pub mod diff;
pub mod error;
pub mod provider;
pub mod registry;
pub mod schema;
pub mod state;

// Re-exports
pub use action::{ActionType, FieldChange, Plan, PlanSummary};
pub use context::ApplyContext;
pub use deployment::Deployment;
pub use error::{ErrorKind, ProviderError, Result};
pub use provider::{Dependency, PropertyMap, ResourceProvider, ResourceSpec, RetryConfig};
pub use registry::Registry;
pub use schema::{DataSourceSchema, FieldKind, FieldSchema, OutputSchema, ResourceSchema};
pub use state::{ResourceState, ResourceStatus};
