//! Ingestion error taxonomy
//!
//! None of these are fatal to the process; a rejected event affects only
//! its own wallet's stream. An overdrawn sell is not an error at all: the
//! covered portion still applies and the excess is flagged on the
//! `PositionDelta`.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error("duplicate transaction hash {0}")]
    DuplicateEvent(String),

    #[error("out-of-order event for {wallet}: timestamp {timestamp} before last {last_seen}")]
    OutOfOrderEvent {
        wallet: String,
        timestamp: i64,
        last_seen: i64,
    },

    #[error("invalid event data: {0}")]
    InvalidEventData(String),

    #[error("ingestion queue full ({capacity} pending), retry later")]
    OverloadRejected { capacity: usize },
}

impl IngestError {
    /// Stable label for logs and API responses
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateEvent(_) => "duplicate_event",
            Self::OutOfOrderEvent { .. } => "out_of_order_event",
            Self::InvalidEventData(_) => "invalid_event_data",
            Self::OverloadRejected { .. } => "overload_rejected",
        }
    }
}
