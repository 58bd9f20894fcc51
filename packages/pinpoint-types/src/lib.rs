//! # pinpoint-types
//!
//! Shared data model for the Pinpoint Suite positioning stack.
//!
//! These types are used by:
//! - `pinpoint-engine`: the positioning engine fusing provider updates
//! - `provider-sim`: simulated providers for development and soak testing
//! - any provider implementation linked into the service
//!
//! ## Unit conventions
//!
//! All physical quantities are newtype-tagged in SI-ish units:
//! - angles in degrees (latitude/longitude/heading/azimuth/elevation)
//! - lengths in meters (altitude above the WGS-84 ellipsoid, accuracies)
//! - speeds in meters per second (horizontal ground speed)
//!
//! The tagging is a compile-time discipline only; values cross the process
//! boundary as IEEE-754 doubles in the stated unit, no implicit conversion.

pub mod criteria;
pub mod position;
pub mod space_vehicle;
pub mod units;
pub mod update;

pub use criteria::{AccuracyBounds, Criteria, Features, Requirements};
pub use position::{Accuracy, Heading, Position, Velocity};
pub use space_vehicle::{Constellation, SpaceVehicle, SvKey};
pub use units::{Degrees, Meters, MetersPerSecond};
pub use update::Update;

use thiserror::Error;

/// Range violations raised by the validating constructors in this crate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuantityError {
    #[error("latitude out of range: {0} deg (expected [-90, +90])")]
    LatitudeOutOfRange(f64),
    #[error("longitude out of range: {0} deg (expected [-180, +180])")]
    LongitudeOutOfRange(f64),
    #[error("ground speed must be non-negative, got {0} m/s")]
    NegativeSpeed(f64),
}
