//! GATT UUIDs, MetaWear command framing and the timing constants of the
//! streaming pipeline.
//!
//! MetaWear boards expose a single write characteristic that accepts
//! `[module, register, payload…]` commands and a single notify
//! characteristic that answers in the same framing.

use uuid::Uuid;

// ── Product family ───────────────────────────────────────────────────────────

/// Substring of the advertised name shared by every MetaWear / MetaMotion
/// board.  Used for automatic selection when no allow-list is configured.
pub const PRODUCT_FAMILY_TOKEN: &str = "MetaWear";

// ── Services & characteristics ───────────────────────────────────────────────

/// Standard Device Information service.
pub const DEVICE_INFO_SERVICE_UUID: Uuid =
    Uuid::from_u128(0x0000180a_0000_1000_8000_00805f9b34fb);

/// Firmware revision string (inside [`DEVICE_INFO_SERVICE_UUID`]).
pub const FIRMWARE_REVISION_CHARACTERISTIC: Uuid =
    Uuid::from_u128(0x00002a26_0000_1000_8000_00805f9b34fb);

/// MetaWear vendor service.
pub const METAWEAR_SERVICE_UUID: Uuid = Uuid::from_u128(0x326a9000_85cb_9195_d9dd_464cfbbae75a);

/// Host → board command channel.
pub const COMMAND_CHARACTERISTIC: Uuid =
    Uuid::from_u128(0x326a9001_85cb_9195_d9dd_464cfbbae75a);

/// Board → host notification channel.
pub const NOTIFY_CHARACTERISTIC: Uuid =
    Uuid::from_u128(0x326a9006_85cb_9195_d9dd_464cfbbae75a);

// ── Modules & registers ──────────────────────────────────────────────────────

pub mod module {
    pub const ACCELEROMETER: u8 = 0x03;
    pub const GYROSCOPE: u8 = 0x13;
    pub const MAGNETOMETER: u8 = 0x15;
    pub const SENSOR_FUSION: u8 = 0x19;
}

/// Sensor-fusion registers.
pub mod fusion {
    pub const ENABLE: u8 = 0x01;
    pub const MODE: u8 = 0x02;
    pub const OUTPUT_ENABLE: u8 = 0x03;
    pub const CORRECTED_ACC: u8 = 0x04;
    pub const CORRECTED_GYRO: u8 = 0x05;
    pub const CORRECTED_MAG: u8 = 0x06;
    pub const QUATERNION: u8 = 0x07;

    /// NDoF: accelerometer + gyroscope + magnetometer, absolute orientation.
    pub const MODE_NDOF: u8 = 0x01;
    /// ±16 g accelerometer range, ±2000 °/s gyroscope range.
    pub const RANGES: u8 = 0x03 | (0x01 << 4);
    /// Every output register that the sample needs, as an enable bitmask
    /// (bit n = register `CORRECTED_ACC + n`).
    pub const OUTPUT_MASK: u8 = 0b0000_1111;
    /// All outputs, used to clear the mask on teardown.
    pub const ALL_OUTPUTS: u8 = 0x7f;
}

/// Per-sensor data-interrupt and power registers shared by the raw
/// accelerometer, gyroscope and magnetometer modules.
pub mod sensor {
    pub const POWER: u8 = 0x01;
    pub const DATA_INTERRUPT_ENABLE: u8 = 0x02;
}

// ── Command builders ─────────────────────────────────────────────────────────

/// Subscribe to (`enable = true`) or silence a data register.
pub fn notify_command(module: u8, register: u8, enable: bool) -> Vec<u8> {
    vec![module, register, enable as u8]
}

/// The full command sequence that switches a board into NDoF streaming,
/// in the order it has to be written.
///
/// ```
/// # use metaosc::protocol::{streaming_setup_commands, module, fusion};
/// let cmds = streaming_setup_commands();
/// assert_eq!(cmds.last().unwrap(), &[module::SENSOR_FUSION, fusion::ENABLE, 0x01]);
/// ```
pub fn streaming_setup_commands() -> Vec<Vec<u8>> {
    use module::*;

    let mut cmds = vec![vec![SENSOR_FUSION, fusion::MODE, fusion::MODE_NDOF, fusion::RANGES]];
    for register in [
        fusion::QUATERNION,
        fusion::CORRECTED_ACC,
        fusion::CORRECTED_MAG,
        fusion::CORRECTED_GYRO,
    ] {
        cmds.push(notify_command(SENSOR_FUSION, register, true));
    }
    for raw in [ACCELEROMETER, GYROSCOPE, MAGNETOMETER] {
        cmds.push(vec![raw, sensor::DATA_INTERRUPT_ENABLE, 0x01, 0x00]);
        cmds.push(vec![raw, sensor::POWER, 0x01]);
    }
    cmds.push(vec![SENSOR_FUSION, fusion::OUTPUT_ENABLE, fusion::OUTPUT_MASK, 0x00]);
    cmds.push(vec![SENSOR_FUSION, fusion::ENABLE, 0x01]);
    cmds
}

/// Commands that stop streaming before the link is dropped.
pub fn streaming_teardown_commands() -> Vec<Vec<u8>> {
    use module::*;

    let mut cmds = vec![
        vec![SENSOR_FUSION, fusion::ENABLE, 0x00],
        vec![SENSOR_FUSION, fusion::OUTPUT_ENABLE, 0x00, fusion::ALL_OUTPUTS],
    ];
    for raw in [ACCELEROMETER, GYROSCOPE, MAGNETOMETER] {
        cmds.push(vec![raw, sensor::POWER, 0x00]);
        cmds.push(vec![raw, sensor::DATA_INTERRUPT_ENABLE, 0x00, 0x01]);
    }
    cmds
}

// ── Timing ───────────────────────────────────────────────────────────────────

/// Length of the discovery window.
pub const SCAN_TIMEOUT_MS: u64 = 10_000;

/// Pause between a successful connect and the first characteristic access.
/// MetaWear boards drop early writes without it.
pub const SETTLE_MS: u64 = 2_000;

/// Sleep between two full dispatch passes.  Best-effort cadence: there is no
/// drift compensation, so the effective period grows with device count and
/// network latency.
pub const DISPATCH_INTERVAL_MS: u64 = 100;

/// Upper bound on a single BLE connect attempt.
pub const CONNECT_TIMEOUT_MS: u64 = 10_000;

/// How long shutdown waits for the worker to exit on its own.
pub const GRACEFUL_STOP_MS: u64 = 5_000;

/// How long shutdown waits after aborting an unresponsive worker.
pub const FORCED_STOP_MS: u64 = 1_000;

// ── Outbound addresses ───────────────────────────────────────────────────────

/// OSC address prefixes, in emission order.
pub const ORIENTATION_ADDRESS: &str = "/euler";
pub const ACCELERATION_ADDRESS: &str = "/acc";
pub const MAGNETIC_FIELD_ADDRESS: &str = "/mag";
pub const ANGULAR_RATE_ADDRESS: &str = "/gyro";

/// Build `"{prefix}/{index}"`.
pub fn address(prefix: &str, index: usize) -> String {
    format!("{prefix}/{index}")
}
