//! Visible space vehicles as reported by satellite receivers.

use serde::{Deserialize, Serialize};

use crate::units::Degrees;

/// GNSS constellation a vehicle belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Constellation {
    Gps,
    Glonass,
    Galileo,
    Beidou,
    Qzss,
    Sbas,
    Unknown,
}

/// Identity of a space vehicle: constellation plus the per-constellation
/// vehicle id (PRN or slot number).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SvKey {
    pub constellation: Constellation,
    pub prn: u16,
}

/// A single tracked space vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpaceVehicle {
    pub key: SvKey,
    /// Carrier-to-noise density, dB-Hz.
    pub snr: f64,
    pub has_almanac_data: bool,
    pub has_ephemeris_data: bool,
    pub used_in_fix: bool,
    pub azimuth: Degrees,
    pub elevation: Degrees,
}

impl SpaceVehicle {
    pub fn new(key: SvKey) -> Self {
        Self {
            key,
            snr: 0.0,
            has_almanac_data: false,
            has_ephemeris_data: false,
            used_in_fix: false,
            azimuth: Degrees(0.0),
            elevation: Degrees(0.0),
        }
    }
}
