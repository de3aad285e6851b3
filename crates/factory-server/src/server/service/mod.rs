//! The factory's datagram service.
//!
//! This module contains the server's receive loop and the per-order
//! orchestration: accepting a request, confirming it, running the crew and
//! relaying its reports back to procurement.
//!
//! ## Structure
//!
//! - [`handler`] - the service entry point (`FactoryService`).
//! - [`relay`] - forwards worker reports to the procurement client.

pub mod handler;
pub mod relay;
