//! Timed discovery on one adapter.

use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc;

use crate::adapter::Central;
use crate::error::Result;
use crate::protocol::SCAN_TIMEOUT_MS;
use crate::shutdown::Shutdown;
use crate::types::{PeripheralRecord, ScanEvent};

/// Receives scan progress from [`DeviceScanner::scan_into`].
pub trait ScanEventSink {
    fn on_event(&mut self, event: ScanEvent);
}

/// The default sink: logs every event and accumulates discovered devices in
/// discovery order.
///
/// A device reported more than once keeps its first position but takes the
/// newest report, since the advertised name often arrives only in a later
/// scan response.  An empty name never overwrites a known one.
#[derive(Debug, Default)]
pub struct DiscoveryLog {
    records: Vec<PeripheralRecord>,
}

impl DiscoveryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[PeripheralRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<PeripheralRecord> {
        self.records
    }
}

impl ScanEventSink for DiscoveryLog {
    fn on_event(&mut self, event: ScanEvent) {
        match event {
            ScanEvent::ScanStarted => info!("Scan started."),
            ScanEvent::ScanStopped => info!("Scan stopped."),
            ScanEvent::DeviceFound(record) => {
                if let Some(known) = self.records.iter_mut().find(|r| r.address == record.address) {
                    debug!("Seen again: {} [{}]", record.identifier, record.address);
                    if known.identifier.is_empty() && !record.identifier.is_empty() {
                        info!("Device {} is {}", record.address, record.identifier);
                    }
                    if !record.identifier.is_empty() {
                        known.identifier = record.identifier;
                    }
                    if record.rssi.is_some() {
                        known.rssi = record.rssi;
                    }
                    return;
                }
                match record.rssi {
                    Some(rssi) => info!(
                        "Found device: {} [{}] {rssi} dBm",
                        record.identifier, record.address
                    ),
                    None => info!("Found device: {} [{}]", record.identifier, record.address),
                }
                self.records.push(record);
            }
        }
    }
}

/// Drives one adapter through a bounded discovery window.
pub struct DeviceScanner {
    window: Duration,
}

impl Default for DeviceScanner {
    fn default() -> Self {
        Self::new(Duration::from_millis(SCAN_TIMEOUT_MS))
    }
}

impl DeviceScanner {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    /// Scan for the configured window (or until shutdown) and return every
    /// device found, in discovery order.
    pub async fn scan(
        &self,
        adapter: &dyn Central,
        shutdown: &Shutdown,
    ) -> Result<Vec<PeripheralRecord>> {
        let mut log = DiscoveryLog::new();
        self.scan_into(adapter, &mut log, shutdown).await?;
        Ok(log.into_records())
    }

    /// Like [`DeviceScanner::scan`], but deliver events to a caller-supplied sink.
    ///
    /// Blocks for the whole window.  Only a shutdown request ends it early.
    pub async fn scan_into(
        &self,
        adapter: &dyn Central,
        sink: &mut (dyn ScanEventSink + Send),
        shutdown: &Shutdown,
    ) -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        adapter.start_scan(tx).await?;

        let deadline = tokio::time::sleep(self.window);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                Some(event) = rx.recv() => sink.on_event(event),
                _ = &mut deadline => break,
                _ = shutdown.triggered() => {
                    info!("Scan interrupted by shutdown.");
                    break;
                }
            }
        }

        // Discovery already happened; a failed stop only loses the
        // ScanStopped event.
        if let Err(e) = self.stop(adapter).await {
            warn!("Could not stop scan on {}: {e}", adapter.name());
        }
        // Deliver whatever arrived before the stop, including ScanStopped.
        while let Ok(event) = rx.try_recv() {
            sink.on_event(event);
        }
        Ok(())
    }

    /// Ask the adapter to stop scanning.  Safe to call repeatedly.
    pub async fn stop(&self, adapter: &dyn Central) -> Result<()> {
        adapter.stop_scan().await
    }
}

/// Log the discovered devices as a numbered list.
pub fn list_devices(records: &[PeripheralRecord]) {
    info!("The following devices were found:");
    for (i, r) in records.iter().enumerate() {
        info!("  {i}: {} ({})", r.identifier, r.address);
    }
}
