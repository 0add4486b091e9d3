//! btleplug implementation of [`Radio`], [`Central`] and [`SensorLink`] for
//! MetaWear / MetaMotion boards.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central as _, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter,
    WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::StreamExt;
use log::{debug, info, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::adapter::{Central, Radio};
use crate::error::{Error, Result};
use crate::parse::parse_notification;
use crate::protocol::{
    streaming_setup_commands, streaming_teardown_commands, COMMAND_CHARACTERISTIC,
    DEVICE_INFO_SERVICE_UUID, FIRMWARE_REVISION_CHARACTERISTIC, METAWEAR_SERVICE_UUID,
    NOTIFY_CHARACTERISTIC,
};
use crate::session::SensorLink;
use crate::types::{PeripheralRecord, Sample, ScanEvent};

/// Gap between consecutive command writes; the board drops back-to-back
/// writes without response.
const COMMAND_GAP_MS: u64 = 20;

/// Address used to match a peripheral against a [`PeripheralRecord`].
///
/// CoreBluetooth hides MAC addresses (all zeros), so the platform id is used
/// there instead.
fn peripheral_address(p: &Peripheral) -> String {
    let addr = p.address();
    if addr.into_inner() == [0u8; 6] {
        p.id().to_string()
    } else {
        addr.to_string()
    }
}

/// Look up `uuid` inside `service`.
fn find_characteristic(
    chars: &BTreeSet<Characteristic>,
    service: Uuid,
    uuid: Uuid,
) -> Result<Characteristic> {
    chars
        .iter()
        .find(|c| c.service_uuid == service && c.uuid == uuid)
        .cloned()
        .ok_or(Error::CharacteristicNotFound(uuid))
}

// ── Radio ─────────────────────────────────────────────────────────────────────

/// The platform BLE stack.
#[derive(Debug, Default, Clone, Copy)]
pub struct BtleRadio;

impl BtleRadio {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Radio for BtleRadio {
    async fn adapters(&self) -> Result<Vec<Arc<dyn Central>>> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;

        let mut out: Vec<Arc<dyn Central>> = Vec::with_capacity(adapters.len());
        for (i, adapter) in adapters.into_iter().enumerate() {
            wait_until_powered_on(&adapter).await;
            let label = adapter
                .adapter_info()
                .await
                .unwrap_or_else(|_| format!("adapter {i}"));
            out.push(Arc::new(BtleCentral::new(adapter, label)));
        }
        Ok(out)
    }
}

/// CoreBluetooth starts in an "unknown" state and silently ignores scans
/// until it reaches PoweredOn.
#[cfg(target_os = "macos")]
async fn wait_until_powered_on(adapter: &Adapter) {
    use btleplug::api::CentralState;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    loop {
        match adapter.adapter_state().await {
            Ok(CentralState::PoweredOn) => break,
            Ok(state) if tokio::time::Instant::now() >= deadline => {
                warn!("macOS: adapter still in state {state:?} after 3 s; proceeding anyway");
                break;
            }
            Ok(state) => debug!("macOS: adapter state = {state:?}, waiting…"),
            Err(e) => {
                warn!("macOS: adapter_state() error: {e}");
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    tokio::time::sleep(Duration::from_millis(300)).await;
}

#[cfg(not(target_os = "macos"))]
async fn wait_until_powered_on(_adapter: &Adapter) {}

// ── Central ───────────────────────────────────────────────────────────────────

struct ActiveScan {
    events: mpsc::UnboundedSender<ScanEvent>,
    watcher: JoinHandle<()>,
}

/// One btleplug adapter.
pub struct BtleCentral {
    adapter: Adapter,
    label: String,
    scan: Mutex<Option<ActiveScan>>,
}

impl BtleCentral {
    pub fn new(adapter: Adapter, label: String) -> Self {
        Self {
            adapter,
            label,
            scan: Mutex::new(None),
        }
    }

    fn take_scan(&self) -> Option<ActiveScan> {
        self.scan.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    async fn find_peripheral(&self, record: &PeripheralRecord) -> Result<Peripheral> {
        self.adapter
            .peripherals()
            .await?
            .into_iter()
            .find(|p| peripheral_address(p).eq_ignore_ascii_case(&record.address))
            .ok_or_else(|| Error::PeripheralNotFound {
                address: record.address.clone(),
            })
    }
}

async fn record_for(adapter: &Adapter, id: &PeripheralId) -> Option<PeripheralRecord> {
    let p = adapter.peripheral(id).await.ok()?;
    let props = p.properties().await.ok()??;
    Some(PeripheralRecord {
        identifier: props.local_name.unwrap_or_default(),
        address: peripheral_address(&p),
        rssi: props.rssi,
    })
}

#[async_trait]
impl Central for BtleCentral {
    fn name(&self) -> String {
        self.label.clone()
    }

    async fn start_scan(&self, events: mpsc::UnboundedSender<ScanEvent>) -> Result<()> {
        // Stop a scan left over from an earlier call before starting anew.
        self.stop_scan().await?;

        let mut stream = self.adapter.events().await?;
        self.adapter.start_scan(ScanFilter::default()).await?;
        let _ = events.send(ScanEvent::ScanStarted);

        let adapter = self.adapter.clone();
        let tx = events.clone();
        let watcher = tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                let id = match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                    _ => continue,
                };
                if let Some(record) = record_for(&adapter, &id).await {
                    if tx.send(ScanEvent::DeviceFound(record)).is_err() {
                        break;
                    }
                }
            }
        });

        *self.scan.lock().unwrap_or_else(|e| e.into_inner()) = Some(ActiveScan { events, watcher });
        Ok(())
    }

    async fn stop_scan(&self) -> Result<()> {
        let Some(active) = self.take_scan() else {
            return Ok(());
        };
        active.watcher.abort();
        let result = self.adapter.stop_scan().await;
        let _ = active.events.send(ScanEvent::ScanStopped);
        result.map_err(Error::from)
    }

    async fn connect(&self, record: &PeripheralRecord) -> Result<Box<dyn SensorLink>> {
        let peripheral = self.find_peripheral(record).await?;
        peripheral.connect().await?;

        // BlueZ reports the connection before the GATT cache is populated;
        // discovering services straight away can come back empty.
        #[cfg(target_os = "linux")]
        tokio::time::sleep(Duration::from_millis(600)).await;

        tokio::time::timeout(Duration::from_secs(15), peripheral.discover_services())
            .await
            .map_err(|_| Error::Timeout {
                operation: "discover_services()",
                after: Duration::from_secs(15),
            })??;

        let link = MetaWearLink::new(peripheral, record.address.clone(), &self.adapter).await?;
        Ok(Box::new(link))
    }
}

// ── MetaWearLink ──────────────────────────────────────────────────────────────

/// A connected MetaWear board.
///
/// Notifications are decoded on a background task that only publishes the
/// newest [`Sample`]; [`SensorLink::latest`] reads it without waiting.
pub struct MetaWearLink {
    peripheral: Peripheral,
    address: String,
    command: Characteristic,
    notify: Characteristic,
    firmware: Option<Characteristic>,
    publisher: Option<watch::Sender<Sample>>,
    latest: watch::Receiver<Sample>,
    tasks: Vec<JoinHandle<()>>,
}

impl MetaWearLink {
    async fn new(peripheral: Peripheral, address: String, adapter: &Adapter) -> Result<Self> {
        let chars = peripheral.characteristics();
        let command = find_characteristic(&chars, METAWEAR_SERVICE_UUID, COMMAND_CHARACTERISTIC)?;
        let notify = find_characteristic(&chars, METAWEAR_SERVICE_UUID, NOTIFY_CHARACTERISTIC)?;
        let firmware = find_characteristic(
            &chars,
            DEVICE_INFO_SERVICE_UUID,
            FIRMWARE_REVISION_CHARACTERISTIC,
        )
        .ok();

        let (publisher, latest) = watch::channel(Sample::default());
        let mut link = Self {
            peripheral,
            address,
            command,
            notify,
            firmware,
            publisher: Some(publisher),
            latest,
            tasks: Vec::new(),
        };
        link.watch_disconnect(adapter).await;
        Ok(link)
    }

    /// Log when the board drops the link on its own.
    async fn watch_disconnect(&mut self, adapter: &Adapter) {
        let id = self.peripheral.id();
        let address = self.address.clone();
        match adapter.events().await {
            Ok(mut events) => self.tasks.push(tokio::spawn(async move {
                while let Some(event) = events.next().await {
                    if matches!(&event, CentralEvent::DeviceDisconnected(gone) if *gone == id) {
                        warn!("{address}: link lost");
                        break;
                    }
                }
            })),
            Err(e) => warn!("{}: could not watch for disconnects: {e}", self.address),
        }
    }

    async fn write(&self, payload: &[u8]) -> Result<()> {
        self.peripheral
            .write(&self.command, payload, WriteType::WithoutResponse)
            .await?;
        tokio::time::sleep(Duration::from_millis(COMMAND_GAP_MS)).await;
        Ok(())
    }
}

#[async_trait]
impl SensorLink for MetaWearLink {
    async fn setup(&mut self) -> Result<()> {
        if let Some(c) = &self.firmware {
            match self.peripheral.read(c).await {
                Ok(bytes) => info!(
                    "{}: firmware {}",
                    self.address,
                    String::from_utf8_lossy(&bytes).trim_end_matches('\0')
                ),
                Err(e) => debug!("{}: firmware revision unreadable: {e}", self.address),
            }
        }

        self.peripheral.subscribe(&self.notify).await?;
        let mut notifications = self.peripheral.notifications().await?;
        if let Some(tx) = self.publisher.take() {
            let address = self.address.clone();
            self.tasks.push(tokio::spawn(async move {
                let mut count: u64 = 0;
                while let Some(n) = notifications.next().await {
                    if n.uuid != NOTIFY_CHARACTERISTIC {
                        continue;
                    }
                    count += 1;
                    if count <= 3 || count % 1000 == 0 {
                        debug!("{address}: notification #{count} len={}", n.value.len());
                    }
                    if let Some(update) = parse_notification(&n.value) {
                        tx.send_modify(|s| s.apply(update));
                    }
                }
                info!("{address}: notification stream ended.");
            }));
        }

        for cmd in streaming_setup_commands() {
            self.write(&cmd).await?;
        }
        info!("{}: streaming enabled", self.address);
        Ok(())
    }

    fn latest(&mut self) -> Option<Sample> {
        match self.latest.has_changed() {
            Ok(true) => Some(*self.latest.borrow_and_update()),
            _ => None,
        }
    }

    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    async fn disconnect(&mut self) -> Result<()> {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if self.is_connected().await {
            for cmd in streaming_teardown_commands() {
                if let Err(e) = self.write(&cmd).await {
                    debug!("{}: stop command {cmd:02x?} failed: {e}", self.address);
                }
            }
        }
        self.peripheral.disconnect().await?;
        Ok(())
    }
}
