//! Plain data carried between the scanner, the sessions and the sinks.

/// A peripheral seen during a scan window.
///
/// Records are immutable once the scanner has produced them; selection only
/// reorders and filters them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralRecord {
    /// Advertised local name (e.g. `"MetaWear"`).  Empty when the device did
    /// not advertise one.
    pub identifier: String,
    /// Stable hardware address.
    /// • Linux / Windows: a Bluetooth MAC address (`AA:BB:CC:DD:EE:FF`)
    /// • macOS: the CoreBluetooth peripheral UUID
    pub address: String,
    /// Signal strength at discovery time in dBm, when the stack reported one.
    pub rssi: Option<i16>,
}

impl PeripheralRecord {
    pub fn new(identifier: impl Into<String>, address: impl Into<String>, rssi: Option<i16>) -> Self {
        Self {
            identifier: identifier.into(),
            address: address.into(),
            rssi,
        }
    }
}

/// One snapshot of decoded motion data from a session.
///
/// Every field is zero until the first decoded notification for that
/// category arrives.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Sample {
    /// Orientation quaternion `[w, x, y, z]`.
    pub orientation: [f32; 4],
    /// Acceleration `[x, y, z]` in g.
    pub acceleration: [f32; 3],
    /// Magnetic field `[x, y, z]` in µT.
    pub magnetic_field: [f32; 3],
    /// Angular rate `[x, y, z]` in °/s.
    pub angular_rate: [f32; 3],
}

impl Sample {
    /// Fold one decoded notification into the snapshot.
    pub fn apply(&mut self, update: SampleUpdate) {
        match update {
            SampleUpdate::Orientation(q) => self.orientation = q,
            SampleUpdate::Acceleration(v) => self.acceleration = v,
            SampleUpdate::MagneticField(v) => self.magnetic_field = v,
            SampleUpdate::AngularRate(v) => self.angular_rate = v,
        }
    }
}

/// A single decoded sensor-fusion output.
///
/// MetaWear boards notify each output category separately, so a [`Sample`]
/// is assembled from the most recent update of every category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleUpdate {
    Orientation([f32; 4]),
    Acceleration([f32; 3]),
    MagneticField([f32; 3]),
    AngularRate([f32; 3]),
}

/// An outbound real-time message: an address plus float arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub address: String,
    pub args: Vec<f32>,
}

impl Message {
    pub fn new(address: impl Into<String>, args: &[f32]) -> Self {
        Self {
            address: address.into(),
            args: args.to_vec(),
        }
    }
}

/// Scan progress reported by a [`crate::adapter::Central`].
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    ScanStarted,
    ScanStopped,
    DeviceFound(PeripheralRecord),
}
