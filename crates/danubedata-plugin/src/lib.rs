//! DanubeData provider plugin
//!
//! Serves the provider operations (`getSchema`, `configure`, `check`,
//! `diff`, `apply`, `read`, `invoke`, `validateDeployment`, `cancel`) to an
//! orchestration host over line-delimited JSON on stdin/stdout. stdout carries nothing but protocol
//! responses; logs go to stderr.

pub mod protocol;
pub mod server;

pub use server::{PluginServer, run_server, serve};
