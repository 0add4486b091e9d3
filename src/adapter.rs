//! Radio abstraction: adapter enumeration, scanning and connecting.
//!
//! [`Radio`] and [`Central`] are the narrow capability the rest of the crate
//! needs from a BLE stack.  The btleplug implementation lives in
//! [`crate::metawear_client`].

use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::session::SensorLink;
use crate::types::{PeripheralRecord, ScanEvent};

/// A BLE stack that can list its radio adapters.
#[async_trait]
pub trait Radio: Send + Sync {
    async fn adapters(&self) -> Result<Vec<Arc<dyn Central>>>;
}

/// One radio adapter.
#[async_trait]
pub trait Central: Send + Sync {
    /// Human-readable adapter description for logs.
    fn name(&self) -> String;

    /// Begin discovery.  The adapter reports [`ScanEvent::ScanStarted`],
    /// every [`ScanEvent::DeviceFound`] and, once [`Central::stop_scan`] is
    /// called, [`ScanEvent::ScanStopped`] through `events`.
    async fn start_scan(&self, events: mpsc::UnboundedSender<ScanEvent>) -> Result<()>;

    /// Stop discovery.  Idempotent.
    async fn stop_scan(&self) -> Result<()>;

    /// Open a connection to a previously discovered peripheral.
    async fn connect(&self, record: &PeripheralRecord) -> Result<Box<dyn SensorLink>>;
}

/// Lists the adapters of a [`Radio`].
pub struct AdapterManager {
    radio: Arc<dyn Radio>,
}

impl AdapterManager {
    pub fn new(radio: Arc<dyn Radio>) -> Self {
        Self { radio }
    }

    /// Enumerate adapters in stack order.
    ///
    /// An empty list is not an error: the caller runs without devices.
    /// Transport failures are returned as-is and never retried.
    pub async fn list_adapters(&self) -> Result<Vec<Arc<dyn Central>>> {
        let adapters = self.radio.adapters().await?;
        if adapters.is_empty() {
            warn!("No adapter was found.");
        } else {
            for (i, a) in adapters.iter().enumerate() {
                info!("Adapter {i}: {}", a.name());
            }
        }
        Ok(adapters)
    }
}
