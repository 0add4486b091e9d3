//! In-memory radios, sensors and sinks for tests.
//!
//! Every mock appends to a shared [`Journal`] so tests can assert the order
//! in which side effects happened.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::adapter::{Central, Radio};
use crate::error::{Error, Result};
use crate::session::SensorLink;
use crate::sink::{SinkConnector, Transport};
use crate::types::{Message, PeripheralRecord, Sample, ScanEvent};

#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// An I/O-style failure carrying `what`.
pub fn refused(what: &str) -> Error {
    Error::Io(std::io::Error::other(what.to_owned()))
}

// ── Radio ─────────────────────────────────────────────────────────────────────

pub struct MockRadio {
    adapters: Vec<Arc<dyn Central>>,
    fail: bool,
}

impl MockRadio {
    pub fn without_adapters() -> Self {
        Self {
            adapters: vec![],
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            adapters: vec![],
            fail: true,
        }
    }

    /// One adapter per entry, each advertising the given records.
    pub fn with_adapters(journal: Journal, advertised: Vec<Vec<PeripheralRecord>>) -> Self {
        let adapters = advertised
            .into_iter()
            .enumerate()
            .map(|(i, records)| {
                Arc::new(MockCentral::new(journal.clone(), records).named(format!("mock{i}")))
                    as Arc<dyn Central>
            })
            .collect();
        Self {
            adapters,
            fail: false,
        }
    }

    pub fn with_central(central: MockCentral) -> Self {
        Self {
            adapters: vec![Arc::new(central)],
            fail: false,
        }
    }
}

#[async_trait]
impl Radio for MockRadio {
    async fn adapters(&self) -> Result<Vec<Arc<dyn Central>>> {
        if self.fail {
            return Err(refused("radio unavailable"));
        }
        Ok(self.adapters.clone())
    }
}

// ── Central ───────────────────────────────────────────────────────────────────

pub struct MockCentral {
    journal: Journal,
    name: String,
    records: Vec<PeripheralRecord>,
    links: Mutex<HashMap<String, MockLink>>,
    scan: Mutex<Option<mpsc::UnboundedSender<ScanEvent>>>,
    fail_start: bool,
    fail_stop: bool,
    hang_connect: bool,
    unreachable: Vec<String>,
    connect_delays: HashMap<String, Duration>,
}

impl MockCentral {
    pub fn new(journal: Journal, records: Vec<PeripheralRecord>) -> Self {
        Self {
            journal,
            name: "mock0".into(),
            records,
            links: Mutex::new(HashMap::new()),
            scan: Mutex::new(None),
            fail_start: false,
            fail_stop: false,
            hang_connect: false,
            unreachable: vec![],
            connect_delays: HashMap::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Hand out `link` when `address` is connected.
    pub fn with_link(self, address: &str, link: MockLink) -> Self {
        self.links.lock().unwrap().insert(address.to_owned(), link);
        self
    }

    pub fn failing_start(mut self, fail: bool) -> Self {
        self.fail_start = fail;
        self
    }

    pub fn failing_stop(mut self, fail: bool) -> Self {
        self.fail_stop = fail;
        self
    }

    pub fn hanging_connect(mut self, hang: bool) -> Self {
        self.hang_connect = hang;
        self
    }

    /// Connecting to `address` takes `delay`.
    pub fn slow_connect(mut self, address: &str, delay: Duration) -> Self {
        self.connect_delays.insert(address.to_owned(), delay);
        self
    }

    pub fn unreachable(mut self, address: &str) -> Self {
        self.unreachable.push(address.to_owned());
        self
    }
}

#[async_trait]
impl Central for MockCentral {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn start_scan(&self, events: mpsc::UnboundedSender<ScanEvent>) -> Result<()> {
        if self.fail_start {
            return Err(refused("scan refused"));
        }
        self.journal.push("start_scan");
        let _ = events.send(ScanEvent::ScanStarted);
        for r in &self.records {
            let _ = events.send(ScanEvent::DeviceFound(r.clone()));
        }
        *self.scan.lock().unwrap() = Some(events);
        Ok(())
    }

    async fn stop_scan(&self) -> Result<()> {
        self.journal.push("stop_scan");
        if let Some(tx) = self.scan.lock().unwrap().take() {
            let _ = tx.send(ScanEvent::ScanStopped);
        }
        if self.fail_stop {
            return Err(refused("stop refused"));
        }
        Ok(())
    }

    async fn connect(&self, record: &PeripheralRecord) -> Result<Box<dyn SensorLink>> {
        if self.hang_connect {
            futures::future::pending::<()>().await;
        }
        if let Some(delay) = self.connect_delays.get(&record.address) {
            tokio::time::sleep(*delay).await;
        }
        if self.unreachable.contains(&record.address) {
            return Err(Error::PeripheralNotFound {
                address: record.address.clone(),
            });
        }
        self.journal.push(format!("connect {}", record.address));
        let link = self
            .links
            .lock()
            .unwrap()
            .remove(&record.address)
            .unwrap_or_else(|| MockLink::new(self.journal.clone(), &record.address));
        Ok(Box::new(link))
    }
}

// ── Sensor link ───────────────────────────────────────────────────────────────

pub struct MockLink {
    journal: Journal,
    address: String,
    samples: std::collections::VecDeque<Sample>,
    fail_setup: bool,
    hang_setup: bool,
    fail_disconnect: bool,
    connected: bool,
}

impl MockLink {
    pub fn new(journal: Journal, address: &str) -> Self {
        Self {
            journal,
            address: address.to_owned(),
            samples: Default::default(),
            fail_setup: false,
            hang_setup: false,
            fail_disconnect: false,
            connected: true,
        }
    }

    /// Samples handed out one per `latest()` call, oldest first.
    pub fn with_samples(mut self, samples: Vec<Sample>) -> Self {
        self.samples = samples.into();
        self
    }

    pub fn failing_setup(mut self, fail: bool) -> Self {
        self.fail_setup = fail;
        self
    }

    pub fn hanging_setup(mut self, hang: bool) -> Self {
        self.hang_setup = hang;
        self
    }

    pub fn failing_disconnect(mut self, fail: bool) -> Self {
        self.fail_disconnect = fail;
        self
    }
}

#[async_trait]
impl SensorLink for MockLink {
    async fn setup(&mut self) -> Result<()> {
        self.journal.push(format!("setup {}", self.address));
        if self.hang_setup {
            futures::future::pending::<()>().await;
        }
        if self.fail_setup {
            return Err(refused("setup refused"));
        }
        Ok(())
    }

    fn latest(&mut self) -> Option<Sample> {
        self.samples.pop_front()
    }

    async fn is_connected(&self) -> bool {
        self.connected
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.journal.push(format!("disconnect {}", self.address));
        self.connected = false;
        if self.fail_disconnect {
            return Err(refused("disconnect refused"));
        }
        Ok(())
    }
}

// ── Sinks ─────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct MockConnector {
    journal: Journal,
    sent: Arc<Mutex<Vec<(u16, Message)>>>,
    fail_send: Vec<u16>,
    fail_connect: Vec<u16>,
    fail_close: bool,
}

impl MockConnector {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            sent: Arc::default(),
            fail_send: vec![],
            fail_connect: vec![],
            fail_close: false,
        }
    }

    pub fn failing_send_to(mut self, port: u16) -> Self {
        self.fail_send.push(port);
        self
    }

    pub fn failing_connect_to(mut self, port: u16) -> Self {
        self.fail_connect.push(port);
        self
    }

    pub fn failing_close(mut self, fail: bool) -> Self {
        self.fail_close = fail;
        self
    }

    /// Every successfully sent message with the port it went to.
    pub fn sent(&self) -> Vec<(u16, Message)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SinkConnector for MockConnector {
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn Transport>> {
        if self.fail_connect.contains(&port) {
            return Err(Error::UnresolvedSink {
                host: host.to_owned(),
                port,
            });
        }
        Ok(Box::new(MockTransport {
            journal: self.journal.clone(),
            endpoint: format!("{host}:{port}"),
            port,
            sent: Arc::clone(&self.sent),
            fail_send: self.fail_send.contains(&port),
            fail_close: self.fail_close,
        }))
    }
}

struct MockTransport {
    journal: Journal,
    endpoint: String,
    port: u16,
    sent: Arc<Mutex<Vec<(u16, Message)>>>,
    fail_send: bool,
    fail_close: bool,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, message: &Message) -> Result<()> {
        if self.fail_send {
            return Err(refused(&format!("{} unreachable", self.endpoint)));
        }
        self.sent.lock().unwrap().push((self.port, message.clone()));
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.journal.push(format!("close {}", self.endpoint));
        if self.fail_close {
            return Err(refused("close refused"));
        }
        Ok(())
    }
}
