use std::time::Duration;
use thiserror::Error;

use crate::bydhvs::poller::State;

/// Faults raised by the byte-stream transport.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("no connection available")]
    NotConnected,

    #[error("connection timeout after {0:?}")]
    ConnectTimeout(Duration),

    #[error("no data received for {0:?}")]
    Timeout(Duration),

    #[error("connection closed by peer")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons a received buffer is rejected before or during decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("packet too short: {0} bytes")]
    TooShort(usize),

    #[error("unexpected unit id {0}")]
    UnitId(u8),

    #[error("unexpected function code {0}")]
    FunctionCode(u8),

    #[error("length mismatch: header declares {declared} bytes, received {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("checksum mismatch (residue {0:#06x})")]
    Checksum(u16),

    #[error("field at offset {offset} lies outside the {len} byte packet")]
    Truncated { offset: usize, len: usize },

    #[error("tower {0} was never allocated")]
    UnknownTower(usize),
}

/// Why a poll cycle ended early. The cycle is always back in `State::Idle`
/// by the time one of these is reported.
#[derive(Error, Debug)]
pub enum PollError {
    #[error("connection error in state {state}: {source}")]
    Connection {
        state: State,
        #[source]
        source: TransportError,
    },

    #[error("invalid reply in state {state}: {source}")]
    Protocol {
        state: State,
        #[source]
        source: PacketError,
    },

    #[error("no start-measurement request for tower {0}")]
    UnsupportedTower(usize),
}
