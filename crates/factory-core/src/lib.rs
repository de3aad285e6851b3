#![doc = include_str!("../README.md")]

mod common;
pub mod pool;
pub mod protocol;
pub mod transport;

pub use common::*;
pub use pool::{Claim, WorkPool};
pub use protocol::{MESSAGE_SIZE, Message, Purpose};
pub use transport::{Transport, UdpTransport};
