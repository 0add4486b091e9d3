//! Outbound message endpoints.
//!
//! Every sink receives every message; sinks are independent of each other
//! and of the sensor sessions.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use rosc::{OscMessage, OscPacket, OscType};
use tokio::net::UdpSocket;

use crate::error::{Error, Result};
use crate::types::Message;

/// Log every n-th consecutive send failure of a sink after the first.
const FAILURE_LOG_EVERY: u64 = 100;

/// A connected message endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, message: &Message) -> Result<()>;

    /// Release the endpoint.  Closing twice is not an error.
    async fn close(&mut self) -> Result<()>;
}

/// Opens [`Transport`]s for `host:port` pairs.
#[async_trait]
pub trait SinkConnector: Send + Sync {
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn Transport>>;
}

// ── OSC over UDP ──────────────────────────────────────────────────────────────

/// Encode a [`Message`] as an OSC 1.0 packet with one float argument per value.
pub fn encode_osc(message: &Message) -> Result<Vec<u8>> {
    let packet = OscPacket::Message(OscMessage {
        addr: message.address.clone(),
        args: message.args.iter().copied().map(OscType::Float).collect(),
    });
    rosc::encoder::encode(&packet).map_err(|e| Error::Encode(format!("{e:?}")))
}

/// One UDP socket connected to a single OSC receiver.
pub struct OscTransport {
    target: SocketAddr,
    socket: Option<UdpSocket>,
}

impl OscTransport {
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let target = tokio::net::lookup_host((host, port))
            .await?
            .next()
            .ok_or_else(|| Error::UnresolvedSink {
                host: host.to_owned(),
                port,
            })?;
        let local = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(target).await?;
        Ok(Self {
            target,
            socket: Some(socket),
        })
    }
}

#[async_trait]
impl Transport for OscTransport {
    async fn send(&self, message: &Message) -> Result<()> {
        let socket = self.socket.as_ref().ok_or_else(|| Error::SinkClosed {
            host: self.target.ip().to_string(),
            port: self.target.port(),
        })?;
        let bytes = encode_osc(message)?;
        socket.send(&bytes).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.socket.take();
        Ok(())
    }
}

/// Connects [`OscTransport`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct OscConnector;

#[async_trait]
impl SinkConnector for OscConnector {
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn Transport>> {
        Ok(Box::new(OscTransport::connect(host, port).await?))
    }
}

// ── SinkSet ───────────────────────────────────────────────────────────────────

/// One configured endpoint.
pub struct SinkEndpoint {
    pub host: String,
    pub port: u16,
    transport: Option<Box<dyn Transport>>,
    consecutive_failures: u64,
}

impl SinkEndpoint {
    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }
}

/// The ordered set of outbound endpoints.
pub struct SinkSet {
    connector: Arc<dyn SinkConnector>,
    sinks: Vec<SinkEndpoint>,
}

impl SinkSet {
    pub fn new(connector: impl SinkConnector + 'static) -> Self {
        Self {
            connector: Arc::new(connector),
            sinks: Vec::new(),
        }
    }

    /// A set whose sinks speak OSC over UDP.
    pub fn osc() -> Self {
        Self::new(OscConnector)
    }

    /// Open one endpoint and append it to the set.
    pub async fn add(&mut self, host: &str, port: u16) -> Result<()> {
        let transport = self.connector.connect(host, port).await?;
        info!("Sink connected: {host}:{port}");
        self.sinks.push(SinkEndpoint {
            host: host.to_owned(),
            port,
            transport: Some(transport),
            consecutive_failures: 0,
        });
        Ok(())
    }

    pub fn endpoints(&self) -> &[SinkEndpoint] {
        &self.sinks
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Send `message` to every open sink, returning how many accepted it.
    ///
    /// A failing sink is logged and skipped; it never stops delivery to the
    /// others.
    pub async fn broadcast(&mut self, message: &Message) -> usize {
        let mut delivered = 0;
        for sink in &mut self.sinks {
            let Some(transport) = &sink.transport else {
                continue;
            };
            match transport.send(message).await {
                Ok(()) => {
                    if sink.consecutive_failures > 0 {
                        info!(
                            "Sink {}:{} recovered after {} failed sends",
                            sink.host, sink.port, sink.consecutive_failures
                        );
                        sink.consecutive_failures = 0;
                    }
                    delivered += 1;
                }
                Err(e) => {
                    sink.consecutive_failures += 1;
                    let n = sink.consecutive_failures;
                    if n == 1 || n % FAILURE_LOG_EVERY == 0 {
                        warn!(
                            "Send {} to {}:{} failed ({n} in a row): {e}",
                            message.address, sink.host, sink.port
                        );
                    } else {
                        debug!("Send {} to {}:{} failed: {e}", message.address, sink.host, sink.port);
                    }
                }
            }
        }
        delivered
    }

    /// Close every sink.  Already-closed sinks are skipped and a failing
    /// close does not stop the rest.
    pub async fn close_all(&mut self) {
        for sink in &mut self.sinks {
            if let Some(mut transport) = sink.transport.take() {
                match transport.close().await {
                    Ok(()) => info!("Sink closed: {}:{}", sink.host, sink.port),
                    Err(e) => warn!("Error during shutdown: closing {}:{}: {e}", sink.host, sink.port),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Journal, MockConnector};

    fn msg(addr: &str) -> Message {
        Message::new(addr, &[1.0, 2.0, 3.0])
    }

    #[tokio::test]
    async fn broadcast_reaches_every_sink_in_order() {
        let connector = MockConnector::new(Journal::default());
        let mut sinks = SinkSet::new(connector.clone());
        sinks.add("127.0.0.1", 8000).await.unwrap();
        sinks.add("127.0.0.1", 8001).await.unwrap();

        assert_eq!(sinks.broadcast(&msg("/acc/0")).await, 2);
        assert_eq!(
            connector.sent(),
            vec![(8000, msg("/acc/0")), (8001, msg("/acc/0"))]
        );
    }

    #[tokio::test]
    async fn failing_sink_does_not_block_others() {
        let connector = MockConnector::new(Journal::default()).failing_send_to(8000);
        let mut sinks = SinkSet::new(connector.clone());
        sinks.add("127.0.0.1", 8000).await.unwrap();
        sinks.add("127.0.0.1", 8001).await.unwrap();

        assert_eq!(sinks.broadcast(&msg("/acc/0")).await, 1);
        assert_eq!(sinks.broadcast(&msg("/gyro/0")).await, 1);
        assert_eq!(
            connector.sent(),
            vec![(8001, msg("/acc/0")), (8001, msg("/gyro/0"))]
        );
    }

    #[tokio::test]
    async fn add_propagates_connect_failure() {
        let connector = MockConnector::new(Journal::default()).failing_connect_to(9000);
        let mut sinks = SinkSet::new(connector);
        assert!(sinks.add("127.0.0.1", 9000).await.is_err());
        assert!(sinks.is_empty());
    }

    #[tokio::test]
    async fn close_all_is_tolerant_and_stops_delivery() {
        let journal = Journal::default();
        let connector = MockConnector::new(journal.clone()).failing_close(true);
        let mut sinks = SinkSet::new(connector.clone());
        sinks.add("127.0.0.1", 8000).await.unwrap();
        sinks.add("127.0.0.1", 8001).await.unwrap();

        sinks.close_all().await;
        sinks.close_all().await;
        assert_eq!(journal.entries(), vec!["close 127.0.0.1:8000", "close 127.0.0.1:8001"]);
        assert!(sinks.endpoints().iter().all(|s| !s.is_open()));
        assert_eq!(sinks.broadcast(&msg("/acc/0")).await, 0);
    }

    #[test]
    fn osc_encoding_uses_float_arguments() {
        let bytes = encode_osc(&Message::new("/euler/0", &[1.0, 0.0, 0.0, 0.0])).unwrap();
        let (_, packet) = rosc::decoder::decode_udp(&bytes).unwrap();
        match packet {
            OscPacket::Message(m) => {
                assert_eq!(m.addr, "/euler/0");
                assert_eq!(
                    m.args,
                    vec![
                        OscType::Float(1.0),
                        OscType::Float(0.0),
                        OscType::Float(0.0),
                        OscType::Float(0.0)
                    ]
                );
            }
            other => panic!("expected a message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn osc_transport_delivers_over_loopback() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();

        let mut sinks = SinkSet::osc();
        sinks.add("127.0.0.1", port).await.unwrap();
        assert_eq!(sinks.broadcast(&Message::new("/gyro/2", &[0.5, -1.0, 2.0])).await, 1);

        let mut buf = [0u8; 1024];
        let n = tokio::time::timeout(std::time::Duration::from_secs(5), receiver.recv(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let (_, packet) = rosc::decoder::decode_udp(&buf[..n]).unwrap();
        let OscPacket::Message(m) = packet else {
            panic!("expected a message");
        };
        assert_eq!(m.addr, "/gyro/2");
        assert_eq!(m.args.len(), 3);

        sinks.close_all().await;
        assert_eq!(sinks.broadcast(&Message::new("/gyro/2", &[0.0; 3])).await, 0);
    }
}
