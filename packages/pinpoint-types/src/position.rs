//! Position, heading and velocity estimates.

use serde::{Deserialize, Serialize};

use crate::units::{Degrees, Meters, MetersPerSecond};
use crate::QuantityError;

// ── Accuracy ──────────────────────────────────────────────────────────────────

/// Accuracy bundle attached to a position estimate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Accuracy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horizontal: Option<Meters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical: Option<Meters>,
}

// ── Position ──────────────────────────────────────────────────────────────────

/// A geographic position. Latitude and longitude are mandatory; altitude is
/// meters above the WGS-84 ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: Degrees,
    pub longitude: Degrees,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<Meters>,
    #[serde(default)]
    pub accuracy: Accuracy,
}

impl Position {
    /// Validates the coordinate ranges at the boundary.
    pub fn new(latitude: Degrees, longitude: Degrees) -> Result<Self, QuantityError> {
        if !(-90.0..=90.0).contains(&latitude.0) {
            return Err(QuantityError::LatitudeOutOfRange(latitude.0));
        }
        if !(-180.0..=180.0).contains(&longitude.0) {
            return Err(QuantityError::LongitudeOutOfRange(longitude.0));
        }
        Ok(Self {
            latitude,
            longitude,
            altitude: None,
            accuracy: Accuracy::default(),
        })
    }

    pub fn with_altitude(mut self, altitude: Meters) -> Self {
        self.altitude = Some(altitude);
        self
    }

    pub fn with_horizontal_accuracy(mut self, accuracy: Meters) -> Self {
        self.accuracy.horizontal = Some(accuracy);
        self
    }

    pub fn with_vertical_accuracy(mut self, accuracy: Meters) -> Self {
        self.accuracy.vertical = Some(accuracy);
        self
    }
}

// ── Heading ───────────────────────────────────────────────────────────────────

/// A course over ground, normalized to [0, 360) degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Heading(Degrees);

impl Heading {
    pub fn new(degrees: Degrees) -> Self {
        Self(degrees.wrapped())
    }

    pub fn degrees(self) -> Degrees {
        self.0
    }
}

// ── Velocity ──────────────────────────────────────────────────────────────────

/// Magnitude of the horizontal ground speed. Never negative.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Velocity(MetersPerSecond);

impl Velocity {
    pub fn new(speed: MetersPerSecond) -> Result<Self, QuantityError> {
        if speed.0 < 0.0 {
            return Err(QuantityError::NegativeSpeed(speed.0));
        }
        Ok(Self(speed))
    }

    pub fn speed(self) -> MetersPerSecond {
        self.0
    }
}
