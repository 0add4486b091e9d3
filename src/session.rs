//! One connected sensor and its cached sample.

use std::time::Duration;

use async_trait::async_trait;
use log::{error, info, warn};

use crate::adapter::Central;
use crate::error::{Error, Result};
use crate::shutdown::Shutdown;
use crate::types::{PeripheralRecord, Sample};

/// The per-device sensor capability: configure streaming, hand out the most
/// recently decoded sample, and release the link.
#[async_trait]
pub trait SensorLink: Send {
    /// Enable streaming of every output a [`Sample`] needs.
    async fn setup(&mut self) -> Result<()>;

    /// The most recent decoded sample, if one arrived since the last call.
    /// Never waits for new hardware data.
    fn latest(&mut self) -> Option<Sample>;

    async fn is_connected(&self) -> bool;

    async fn disconnect(&mut self) -> Result<()>;
}

/// A selected peripheral, its dispatch index, and its live connection.
///
/// The index is fixed at construction and never changes.
pub struct SensorSession {
    index: usize,
    record: PeripheralRecord,
    link: Option<Box<dyn SensorLink>>,
    sample: Sample,
    connected: bool,
    configured: bool,
}

impl SensorSession {
    pub fn new(index: usize, record: PeripheralRecord) -> Self {
        Self {
            index,
            record,
            link: None,
            sample: Sample::default(),
            connected: false,
            configured: false,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn record(&self) -> &PeripheralRecord {
        &self.record
    }

    /// The cached sample as of the last [`SensorSession::update`].
    pub fn sample(&self) -> &Sample {
        &self.sample
    }

    /// `true` between a successful connect and the matching disconnect.
    pub fn is_marked_connected(&self) -> bool {
        self.connected
    }

    /// Whether [`SensorSession::setup`] succeeded.
    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Connect through `adapter`, then wait `settle` before any
    /// characteristic access.
    ///
    /// A shutdown request abandons the attempt with [`Error::Cancelled`].
    /// The settle wait also ends early on shutdown; the session then still
    /// counts as connected so teardown releases it.
    pub async fn connect(
        &mut self,
        adapter: &dyn Central,
        settle: Duration,
        timeout: Duration,
        shutdown: &Shutdown,
    ) -> Result<()> {
        info!("Connecting to {} [{}] …", self.record.identifier, self.record.address);
        let attempt = tokio::time::timeout(timeout, adapter.connect(&self.record));
        let link = tokio::select! {
            result = attempt => result.map_err(|_| Error::Timeout {
                operation: "BLE connect",
                after: timeout,
            })??,
            _ = shutdown.triggered() => {
                warn!("Session {}: connect abandoned on shutdown", self.index);
                return Err(Error::Cancelled);
            }
        };
        self.link = Some(link);
        self.connected = true;
        info!("Session {} connected: {}", self.index, self.record.address);

        shutdown.sleep(settle).await;
        Ok(())
    }

    /// Configure the sensor for streaming.  On failure, or when shutdown
    /// interrupts it, the session keeps emitting its zero-valued default
    /// sample.
    pub async fn setup(&mut self, shutdown: &Shutdown) -> Result<()> {
        let link = self.link.as_mut().ok_or(Error::NotConnected(self.index))?;
        tokio::select! {
            result = link.setup() => result?,
            _ = shutdown.triggered() => return Err(Error::Cancelled),
        }
        self.configured = true;
        Ok(())
    }

    /// Pull the latest decoded sample into the cache and return it.
    pub fn update(&mut self) -> Sample {
        if let Some(sample) = self.link.as_mut().and_then(|l| l.latest()) {
            self.sample = sample;
        }
        self.sample
    }

    /// Ask the link whether the peripheral is still connected.
    pub async fn is_connected(&self) -> bool {
        match &self.link {
            Some(link) => link.is_connected().await,
            None => false,
        }
    }

    /// Release the connection.  Failures are logged, never returned, so the
    /// remaining sessions can still be torn down.
    pub async fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        self.connected = false;
        if let Some(mut link) = self.link.take() {
            match link.disconnect().await {
                Ok(()) => info!("Session {} disconnected: {}", self.index, self.record.address),
                Err(e) => error!(
                    "Session {} ({}): disconnect failed: {e}",
                    self.index, self.record.address
                ),
            }
        } else {
            warn!("Session {}: no link to disconnect", self.index);
        }
    }
}
