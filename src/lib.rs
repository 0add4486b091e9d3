//! # metaosc
//!
//! Discover MetaWear / MetaMotion motion sensors over Bluetooth Low Energy,
//! keep a connection to each selected board, and re-broadcast their
//! orientation and motion data as OSC messages to one or more UDP receivers.
//!
//! ## Outbound messages
//!
//! Every dispatch pass (default 100 ms) emits, per connected sensor `i` and
//! to every configured sink:
//!
//! | Address | Arguments |
//! |---|---|
//! | `/euler/{i}` | quaternion `w x y z` (4 × float) |
//! | `/acc/{i}` | acceleration in g (3 × float) |
//! | `/mag/{i}` | magnetic field in µT (3 × float) |
//! | `/gyro/{i}` | angular rate in °/s (3 × float) |
//!
//! `i` is the order in which the sensor was selected and never changes while
//! the process runs.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use metaosc::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let shutdown = Shutdown::new();
//!     let worker = Worker::new(Config::default(), Arc::new(BtleRadio::new()), SinkSet::osc(), shutdown.clone());
//!     let coordinator = ShutdownCoordinator::new(shutdown.clone());
//!     coordinator.listen_for_interrupt();
//!
//!     let handle = tokio::spawn(worker.run());
//!     shutdown.triggered().await;
//!     if let WorkerExit::Finished(Ok(mut pipeline)) = coordinator.stop_worker(handle).await {
//!         coordinator.teardown(&mut pipeline).await;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`adapter`] | [`adapter::Radio`] / [`adapter::Central`] capability and adapter enumeration |
//! | [`scanner`] | Timed discovery window and scan-event sinks |
//! | [`selector`] | Allow-list or product-family selection of discovered devices |
//! | [`session`] | One connected sensor and its cached sample |
//! | [`sink`] | OSC-over-UDP endpoints and the broadcast set |
//! | [`dispatcher`] | The fixed-cadence polling loop |
//! | [`shutdown`] | Cancellation token and ordered teardown |
//! | [`pipeline`] | The worker that wires everything together |
//! | [`metawear_client`] | btleplug implementation for MetaWear boards |
//! | [`protocol`] / [`parse`] | MetaWear GATT constants, commands and decoders |

pub mod adapter;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod metawear_client;
pub mod parse;
pub mod pipeline;
pub mod protocol;
pub mod scanner;
pub mod selector;
pub mod session;
pub mod shutdown;
pub mod sink;
pub mod types;

#[cfg(test)]
mod mock;

pub use error::{Error, Result};

// ── Prelude ───────────────────────────────────────────────────────────────────

/// Convenience re-exports for the binary and downstream crates.
pub mod prelude {
    pub use crate::config::{Config, ServerConfig};
    pub use crate::error::{Error, Result};
    pub use crate::metawear_client::BtleRadio;
    pub use crate::pipeline::{Pipeline, Worker};
    pub use crate::shutdown::{Shutdown, ShutdownCoordinator, TeardownStep, WorkerExit};
    pub use crate::sink::SinkSet;
    pub use crate::types::{Message, PeripheralRecord, Sample};
}
