//! # Wire Protocol
//!
//! Every datagram carries exactly one fixed-size record of seven big-endian
//! `u32` fields:
//!
//! | offset | field        | used by                    |
//! |--------|--------------|----------------------------|
//! | 0      | purpose      | all                        |
//! | 4      | order size   | [`Purpose::Request`]       |
//! | 8      | worker count | [`Purpose::OrderConfirm`]  |
//! | 12     | worker ID    | production, completion     |
//! | 16     | capacity     | [`Purpose::Production`]    |
//! | 20     | units made   | [`Purpose::Production`]    |
//! | 24     | duration ms  | [`Purpose::Production`]    |
//!
//! Fields a purpose does not use are written as zero and ignored when read.
//! A record with an unknown purpose, or a datagram that is not exactly
//! [`MESSAGE_SIZE`] bytes long, is rejected with
//! [`Error::MalformedMessage`]; receivers treat it as a protocol error.

use crate::{
    CompletionReport, Error, OrderConfirmation, ProductionReport, Result, WorkOrder, WorkerId,
};
use bytes::{Buf, BufMut};
use core::fmt;


/// Size in bytes of one encoded message.
pub const MESSAGE_SIZE: usize = 7 * core::mem::size_of::<u32>();

/// The enumerated tag identifying a message's semantic type.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Purpose {
    Request = 1,
    OrderConfirm = 2,
    Production = 3,
    Completion = 4,
    ProtocolError = 5,
}

impl TryFrom<u32> for Purpose {
    type Error = Error;

    fn try_from(raw: u32) -> Result<Self> {
        match raw {
            1 => Ok(Self::Request),
            2 => Ok(Self::OrderConfirm),
            3 => Ok(Self::Production),
            4 => Ok(Self::Completion),
            5 => Ok(Self::ProtocolError),
            other => Err(Error::MalformedMessage {
                reason: format!("unknown purpose {other}"),
            }),
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Request => "REQUEST",
            Self::OrderConfirm => "ORDER_CONFIRM",
            Self::Production => "PRODUCTION",
            Self::Completion => "COMPLETION",
            Self::ProtocolError => "PROTOCOL_ERROR",
        };
        f.write_str(name)
    }
}

/// A decoded protocol message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Message {
    Request(WorkOrder),
    OrderConfirm(OrderConfirmation),
    Production(ProductionReport),
    Completion(CompletionReport),
    ProtocolError,
}

/// The flat record as it appears on the wire, before the purpose selects
/// which fields mean anything.
#[derive(Default)]
struct Record {
    purpose: u32,
    order_size: u32,
    worker_count: u32,
    worker_id: u32,
    capacity: u32,
    units_made: u32,
    duration_ms: u32,
}

impl Message {
    pub const fn purpose(&self) -> Purpose {
        match self {
            Self::Request(_) => Purpose::Request,
            Self::OrderConfirm(_) => Purpose::OrderConfirm,
            Self::Production(_) => Purpose::Production,
            Self::Completion(_) => Purpose::Completion,
            Self::ProtocolError => Purpose::ProtocolError,
        }
    }

    /// Encodes the message into a fixed-size big-endian record.
    pub fn encode(&self) -> [u8; MESSAGE_SIZE] {
        let mut frame = [0_u8; MESSAGE_SIZE];
        self.encode_into(&mut &mut frame[..]);
        frame
    }

    /// Writes the encoded record into `buf`, which must have at least
    /// [`MESSAGE_SIZE`] bytes of remaining capacity.
    pub fn encode_into(&self, buf: &mut impl BufMut) {
        let mut record = Record {
            purpose: self.purpose() as u32,
            ..Record::default()
        };
        match *self {
            Self::Request(order) => record.order_size = order.total_units,
            Self::OrderConfirm(confirm) => record.worker_count = confirm.worker_count,
            Self::Production(report) => {
                record.worker_id = report.worker_id.0;
                record.capacity = report.capacity;
                record.units_made = report.units_made;
                record.duration_ms = report.duration_ms;
            }
            Self::Completion(report) => record.worker_id = report.worker_id.0,
            Self::ProtocolError => {}
        }

        buf.put_u32(record.purpose);
        buf.put_u32(record.order_size);
        buf.put_u32(record.worker_count);
        buf.put_u32(record.worker_id);
        buf.put_u32(record.capacity);
        buf.put_u32(record.units_made);
        buf.put_u32(record.duration_ms);
    }

    /// Decodes one datagram.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedMessage`] if the datagram is not exactly
    /// [`MESSAGE_SIZE`] bytes or its purpose is not one of [`Purpose`].
    pub fn decode(mut datagram: &[u8]) -> Result<Self> {
        if datagram.len() != MESSAGE_SIZE {
            return Err(Error::MalformedMessage {
                reason: format!(
                    "expected {MESSAGE_SIZE} bytes, received {}",
                    datagram.len()
                ),
            });
        }

        let record = Record {
            purpose: datagram.get_u32(),
            order_size: datagram.get_u32(),
            worker_count: datagram.get_u32(),
            worker_id: datagram.get_u32(),
            capacity: datagram.get_u32(),
            units_made: datagram.get_u32(),
            duration_ms: datagram.get_u32(),
        };

        let message = match Purpose::try_from(record.purpose)? {
            Purpose::Request => Self::Request(WorkOrder {
                total_units: record.order_size,
            }),
            Purpose::OrderConfirm => Self::OrderConfirm(OrderConfirmation {
                worker_count: record.worker_count,
            }),
            Purpose::Production => Self::Production(ProductionReport {
                worker_id: WorkerId(record.worker_id),
                capacity: record.capacity,
                units_made: record.units_made,
                duration_ms: record.duration_ms,
            }),
            Purpose::Completion => Self::Completion(CompletionReport {
                worker_id: WorkerId(record.worker_id),
            }),
            Purpose::ProtocolError => Self::ProtocolError,
        };
        Ok(message)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(order) => write!(f, "{{ REQUEST OrderSize={} }}", order.total_units),
            Self::OrderConfirm(confirm) => {
                write!(f, "{{ ORDER_CONFIRM numFactories={} }}", confirm.worker_count)
            }
            Self::Production(report) => write!(
                f,
                "{{ PRODUCTION Factory{} capacity={} made={} duration={}ms }}",
                report.worker_id, report.capacity, report.units_made, report.duration_ms
            ),
            Self::Completion(report) => write!(f, "{{ COMPLETION Factory{} }}", report.worker_id),
            Self::ProtocolError => f.write_str("{ PROTOCOL_ERROR }"),
        }
    }
}
