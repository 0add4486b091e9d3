//! The fixed-cadence polling loop.
//!
//! Each pass pulls the latest sample of every session in index order and
//! broadcasts four messages per session to every sink.  The loop sleeps a
//! fixed interval *after* each pass, so the real period is the interval plus
//! the time the pass took.

use std::time::Duration;

use log::{debug, info};

use crate::protocol::{
    address, ACCELERATION_ADDRESS, ANGULAR_RATE_ADDRESS, DISPATCH_INTERVAL_MS,
    MAGNETIC_FIELD_ADDRESS, ORIENTATION_ADDRESS,
};
use crate::session::SensorSession;
use crate::shutdown::Shutdown;
use crate::sink::SinkSet;
use crate::types::{Message, Sample};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// Constructed, no pass run yet.
    Idle,
    Running,
    /// Shutdown observed at the end of a pass that was already running.
    Draining,
    Stopped,
}

/// The four messages emitted for one session per pass, in emission order.
pub fn sample_messages(index: usize, sample: &Sample) -> [Message; 4] {
    [
        Message::new(address(ORIENTATION_ADDRESS, index), &sample.orientation),
        Message::new(address(ACCELERATION_ADDRESS, index), &sample.acceleration),
        Message::new(address(MAGNETIC_FIELD_ADDRESS, index), &sample.magnetic_field),
        Message::new(address(ANGULAR_RATE_ADDRESS, index), &sample.angular_rate),
    ]
}

pub struct Dispatcher {
    interval: Duration,
    shutdown: Shutdown,
    state: DispatcherState,
    passes: u64,
}

impl Dispatcher {
    pub fn new(interval: Duration, shutdown: Shutdown) -> Self {
        Self {
            interval,
            shutdown,
            state: DispatcherState::Idle,
            passes: 0,
        }
    }

    pub fn with_default_interval(shutdown: Shutdown) -> Self {
        Self::new(Duration::from_millis(DISPATCH_INTERVAL_MS), shutdown)
    }

    pub fn state(&self) -> DispatcherState {
        self.state
    }

    /// Completed passes so far.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// One pass over every session.  Empty slots are skipped.
    ///
    /// Returns the number of (message, sink) deliveries that succeeded.
    pub async fn pass(&mut self, sessions: &mut [Option<SensorSession>], sinks: &mut SinkSet) -> usize {
        let mut delivered = 0;
        for session in sessions.iter_mut().flatten() {
            let index = session.index();
            let sample = session.update();
            let [w, x, y, z] = sample.orientation;
            debug!("/euler/{index} {w:.6} {x:.6} {y:.6} {z:.6}");
            for message in sample_messages(index, &sample) {
                delivered += sinks.broadcast(&message).await;
            }
        }
        self.passes += 1;
        if self.shutdown.is_triggered() {
            // Shutdown arrived while this pass was sending.
            self.state = DispatcherState::Draining;
        }
        delivered
    }

    /// Run passes until shutdown is observed, then return.
    ///
    /// The flag is checked once per pass; a pass that has started always
    /// completes.
    pub async fn run(&mut self, sessions: &mut [Option<SensorSession>], sinks: &mut SinkSet) {
        self.state = DispatcherState::Running;
        info!(
            "Dispatching {} session(s) to {} sink(s) every {:?}",
            sessions.iter().flatten().count(),
            sinks.len(),
            self.interval
        );
        loop {
            if self.shutdown.is_triggered() {
                break;
            }
            self.pass(sessions, sinks).await;
            self.shutdown.sleep(self.interval).await;
        }
        self.state = DispatcherState::Stopped;
        info!("Dispatcher stopped after {} passes.", self.passes);
    }
}
