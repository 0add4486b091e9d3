//! Error type shared by every fallible operation in the crate.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Errors raised while discovering, connecting, configuring or streaming.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Bluetooth error: {0}")]
    Ble(#[from] btleplug::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Characteristic {0} not found")]
    CharacteristicNotFound(Uuid),

    #[error("Peripheral {address} is no longer known to the adapter")]
    PeripheralNotFound { address: String },

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Session {0} is not connected")]
    NotConnected(usize),

    #[error("Sink {host}:{port} could not be resolved")]
    UnresolvedSink { host: String, port: u16 },

    #[error("Sink {host}:{port} is closed")]
    SinkClosed { host: String, port: u16 },

    #[error("Could not encode message: {0}")]
    Encode(String),

    #[error("Interrupted by shutdown")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
