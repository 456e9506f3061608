//! DanubeData provider
//!
//! [`Reconciler`] implements [`danubedata_core::ResourceProvider`] on top of
//! the REST client: it checks and diffs declared resources, then creates,
//! updates, replaces or deletes them and waits for asynchronously
//! provisioned types to become ready. It also runs the read-only lookup
//! functions (`getVpss`, `getVpsImages`, ...).

pub mod lookup;
pub mod naming;
pub mod planner;
pub mod reconciler;
pub mod resource;
pub mod waiter;

pub use reconciler::Reconciler;
pub use waiter::WaitConfig;
