//! Client criteria and provider requirement descriptions.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::units::{Degrees, Meters, MetersPerSecond};

bitflags! {
    /// The positioning features a client session asks for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Features: u8 {
        const POSITION = 0b001;
        const HEADING  = 0b010;
        const VELOCITY = 0b100;
    }
}

bitflags! {
    /// Abstract resources a provider needs to operate. Declared statically
    /// per provider and read by the engine to gate enablement against
    /// configuration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Requirements: u8 {
        const SATELLITES        = 0b0001;
        const CELL_NETWORK      = 0b0010;
        const DATA_NETWORK      = 0b0100;
        const MONETARY_SPENDING = 0b1000;
    }
}

macro_rules! bits_serde {
    ($flags:ident) => {
        impl Serialize for $flags {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_u8(self.bits())
            }
        }

        impl<'de> Deserialize<'de> for $flags {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let bits = u8::deserialize(deserializer)?;
                Ok($flags::from_bits_truncate(bits))
            }
        }
    };
}

bits_serde!(Features);
bits_serde!(Requirements);

/// Per-feature accuracy bounds a client may attach to its criteria. `None`
/// means any accuracy is acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AccuracyBounds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horizontal: Option<Meters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical: Option<Meters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<Degrees>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity: Option<MetersPerSecond>,
}

/// A client's request for positioning features and accuracy bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Criteria {
    pub requires: Features,
    #[serde(default)]
    pub accuracy: AccuracyBounds,
}

impl Default for Criteria {
    fn default() -> Self {
        Self {
            requires: Features::POSITION,
            accuracy: AccuracyBounds::default(),
        }
    }
}

impl Criteria {
    pub fn wants_position(&self) -> bool {
        self.requires.contains(Features::POSITION)
    }

    pub fn wants_heading(&self) -> bool {
        self.requires.contains(Features::HEADING)
    }

    pub fn wants_velocity(&self) -> bool {
        self.requires.contains(Features::VELOCITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_criteria_asks_for_position_only() {
        let criteria = Criteria::default();
        assert!(criteria.wants_position());
        assert!(!criteria.wants_heading());
        assert!(!criteria.wants_velocity());
    }

    #[test]
    fn requirement_bits_round_trip_through_serde() {
        let reqs = Requirements::SATELLITES | Requirements::DATA_NETWORK;
        let json = serde_json::to_string(&reqs).unwrap();
        assert_eq!(json, "5");
        let back: Requirements = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reqs);
    }

    #[test]
    fn unknown_bits_are_truncated_on_read() {
        let back: Features = serde_json::from_str("255").unwrap();
        assert_eq!(back, Features::all());
    }
}
