//! Engine-level configuration states and their textual forms.
//!
//! The textual forms are the values round-tripped through the settings
//! store, so they are part of the persistence contract and must not change.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised when persisted text does not name a known state.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("could not resolve state {0:?}")]
pub struct ParseStateError(pub String);

// ── Engine status ─────────────────────────────────────────────────────────────

/// Overall engine state. `active` is only ever reached by a provider
/// transitioning to active; it is never set directly by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    /// The engine is offline; every provider is disabled.
    Off,
    /// Engine and providers are powered on but not navigating.
    #[default]
    On,
    /// At least one provider is actively navigating.
    Active,
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EngineStatus::Off => "Engine::Status::off",
            EngineStatus::On => "Engine::Status::on",
            EngineStatus::Active => "Engine::Status::active",
        };
        f.write_str(s)
    }
}

impl FromStr for EngineStatus {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Engine::Status::off" => Ok(EngineStatus::Off),
            "Engine::Status::on" => Ok(EngineStatus::On),
            "Engine::Status::active" => Ok(EngineStatus::Active),
            other => Err(ParseStateError(other.to_string())),
        }
    }
}

// ── Satellite-based positioning ───────────────────────────────────────────────

/// Whether providers that require satellites are permitted to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SatelliteBasedPositioningState {
    #[default]
    On,
    Off,
}

impl fmt::Display for SatelliteBasedPositioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SatelliteBasedPositioningState::On => "SatelliteBasedPositioningState::on",
            SatelliteBasedPositioningState::Off => "SatelliteBasedPositioningState::off",
        };
        f.write_str(s)
    }
}

impl FromStr for SatelliteBasedPositioningState {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SatelliteBasedPositioningState::on" => Ok(SatelliteBasedPositioningState::On),
            "SatelliteBasedPositioningState::off" => Ok(SatelliteBasedPositioningState::Off),
            other => Err(ParseStateError(other.to_string())),
        }
    }
}

// ── Wifi and cell id reporting ────────────────────────────────────────────────

/// Whether providers may consult wifi/cellular identities for coarse
/// positioning and report them upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WifiAndCellIdReportingState {
    On,
    #[default]
    Off,
}

impl fmt::Display for WifiAndCellIdReportingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WifiAndCellIdReportingState::On => "WifiAndCellIdReportingState::on",
            WifiAndCellIdReportingState::Off => "WifiAndCellIdReportingState::off",
        };
        f.write_str(s)
    }
}

impl FromStr for WifiAndCellIdReportingState {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WifiAndCellIdReportingState::on" => Ok(WifiAndCellIdReportingState::On),
            "WifiAndCellIdReportingState::off" => Ok(WifiAndCellIdReportingState::Off),
            other => Err(ParseStateError(other.to_string())),
        }
    }
}
