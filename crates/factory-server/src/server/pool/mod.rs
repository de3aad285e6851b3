//! Worker tasks and the per-order crew that runs them.
//!
//! - [`worker`] - the claim / process / report loop of a single worker.
//! - [`profiles`] - per-order capacity and service-time draws.
//! - [`manager`] - spawning, joining and aborting one order's workers.

pub mod manager;
pub mod profiles;
pub mod worker;
