//! Error types shared by the factory server and the procurement client.
//!
//! This module defines the central `Error` enum, which captures every fault
//! either side of the exchange can report. The variants follow the protocol's
//! fault taxonomy:
//!
//! ## Error Cases
//! - `Transport`: A send or receive failed at the OS boundary. Always fatal.
//! - `MalformedMessage`: A datagram could not be decoded (wrong length or
//!   unknown purpose). Receivers treat it as a protocol error.
//! - `ProtocolFault`: The counterpart sent an explicit `PROTOCOL_ERROR` or a
//!   message that is not valid for the current phase of the exchange.
//! - `LockPoisoned`: A worker panicked while holding the work pool lock.
//! - `ChannelError`: An internal communication failure between tasks.
//! - `ServiceShutdown`: The operation was interrupted by a shutdown signal.
//!
//! Inconsistencies (e.g. a production report for a worker that already
//! completed) are not errors; they are reported as values by the aggregating
//! side and only logged.

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the work-distribution protocol.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// Sending or receiving a datagram failed.
    #[error("Transport error ({kind}): {context}")]
    Transport {
        context: String,
        kind: std::io::ErrorKind,
    },

    /// A datagram did not decode into a valid message.
    #[error("Malformed message: {reason}")]
    MalformedMessage { reason: String },

    /// The counterpart broke the exchange.
    #[error("Protocol fault: {reason}")]
    ProtocolFault { reason: String },

    /// The work pool lock was poisoned by a panicking holder.
    #[error("Work pool lock poisoned")]
    LockPoisoned,

    /// Internal channel send/receive failure (e.g., closed channel).
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl Error {
    /// Wraps an I/O error raised by the socket layer.
    pub fn transport(context: impl Into<String>, err: &std::io::Error) -> Self {
        Self::Transport {
            context: format!("{}: {err}", context.into()),
            kind: err.kind(),
        }
    }

    /// Returns `true` if this error should terminate the process rather than
    /// just the current exchange.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::LockPoisoned | Self::ChannelError { .. }
        )
    }
}

#[cfg(not(feature = "parking-lot"))]
impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Self::LockPoisoned
    }
}
