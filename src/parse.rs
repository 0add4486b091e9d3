//! Decoders for MetaWear sensor-fusion notifications.
//!
//! All functions here are pure and safe to call from any context.
//!
//! Every notification starts with the module id and register that produced
//! it.  The fusion outputs this crate subscribes to carry little-endian
//! `f32` values:
//!
//! | Register | Output | Payload |
//! |---|---|---|
//! | `0x07` | quaternion | `w x y z` |
//! | `0x04` | corrected acceleration | `x y z` in mg + accuracy byte |
//! | `0x05` | corrected angular rate | `x y z` in °/s + accuracy byte |
//! | `0x06` | corrected magnetic field | `x y z` in nT-scale units + accuracy byte |

use crate::protocol::{fusion, module};
use crate::types::SampleUpdate;

const HEADER: usize = 2;

/// mg → g
const ACC_DIVISOR: f32 = 1000.0;
/// board units → µT
const MAG_DIVISOR: f32 = 1000.0;

fn read_f32_le(data: &[u8], offset: usize) -> Option<f32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_vec3(payload: &[u8], divisor: f32) -> Option<[f32; 3]> {
    Some([
        read_f32_le(payload, 0)? / divisor,
        read_f32_le(payload, 4)? / divisor,
        read_f32_le(payload, 8)? / divisor,
    ])
}

/// Decode one notification from the MetaWear notify characteristic.
///
/// Returns `None` for notifications from other modules or registers, and for
/// payloads too short to hold the expected values.
pub fn parse_notification(data: &[u8]) -> Option<SampleUpdate> {
    if data.len() < HEADER || data[0] != module::SENSOR_FUSION {
        return None;
    }
    let payload = &data[HEADER..];
    match data[1] {
        fusion::QUATERNION => Some(SampleUpdate::Orientation([
            read_f32_le(payload, 0)?,
            read_f32_le(payload, 4)?,
            read_f32_le(payload, 8)?,
            read_f32_le(payload, 12)?,
        ])),
        fusion::CORRECTED_ACC => read_vec3(payload, ACC_DIVISOR).map(SampleUpdate::Acceleration),
        fusion::CORRECTED_GYRO => read_vec3(payload, 1.0).map(SampleUpdate::AngularRate),
        fusion::CORRECTED_MAG => read_vec3(payload, MAG_DIVISOR).map(SampleUpdate::MagneticField),
        _ => None,
    }
}
