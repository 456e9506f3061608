//! DanubeData API client
//!
//! Thin wrapper over the DanubeData REST API used by the provider's
//! reconciler.
//!
//! # Features
//!
//! - Bearer token authentication
//! - Exponential backoff for transient failures (429, 5xx, network), honoring `Retry-After`
//! - `Idempotency-Key` on every mutating request, stable across retries
//! - HTTP status codes mapped onto validation / transient / permanent errors
//!
//! # Example
//!
//! ```ignore
//! use danubedata_client::ApiClient;
//! use danubedata_config::ProviderConfig;
//! use danubedata_core::ApplyContext;
//!
//! let client = ApiClient::new(&ProviderConfig::load()?)?;
//! let ctx = ApplyContext::background();
//!
//! let key = client
//!     .create("/ssh-keys", &serde_json::json!({"name": "deployment-key", "public_key": "ssh-ed25519 ..."}), &ctx)
//!     .await?;
//! ```

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::{api_error, classify_status, transport_error};
