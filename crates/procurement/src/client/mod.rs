pub mod config;
pub mod coordinator;
pub mod ledger;
pub mod telemetry;
