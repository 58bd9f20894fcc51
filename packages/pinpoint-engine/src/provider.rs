//! The provider contract.
//!
//! A provider is a source of position/heading/velocity updates with a
//! lifecycle and statically declared requirements. Providers emit from their
//! own internal threads (a hardware poller, an I/O thread, a timer); the
//! engine never blocks on them, and there is no error channel on the update
//! streams: a failing provider simply ceases to emit.

use std::fmt;

use pinpoint_types::{Criteria, Heading, Position, Requirements, SpaceVehicle, Update, Velocity};
use uuid::Uuid;

use crate::signals::Signal;
use crate::states::WifiAndCellIdReportingState;

// ── Provider identity ─────────────────────────────────────────────────────────

/// Identity of a provider instance, minted when the provider is wrapped for
/// the engine. Source identity for the fusion selector and the
/// reference-data bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProviderId(Uuid);

impl ProviderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProviderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "provider/{}", self.0)
    }
}

// ── Events ────────────────────────────────────────────────────────────────────

/// Out-of-band inputs delivered to providers through the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A position hint from outside the engine, e.g. another process or a
    /// higher-level integrator.
    ReferencePositionUpdated(Update<Position>),
    /// Informs providers whether they may consult wireless/cellular
    /// identities for coarse positioning.
    WifiAndCellIdReportingStateChanged(WifiAndCellIdReportingState),
}

// ── Update signals ────────────────────────────────────────────────────────────

/// The four update streams every provider exposes. Implementors embed this
/// bundle and emit on it from their worker.
#[derive(Default)]
pub struct UpdateSignals {
    pub position: Signal<Update<Position>>,
    pub heading: Signal<Update<Heading>>,
    pub velocity: Signal<Update<Velocity>>,
    pub space_vehicles: Signal<Update<Vec<SpaceVehicle>>>,
}

// ── Provider trait ────────────────────────────────────────────────────────────

/// A source of positioning updates.
///
/// The enable/disable axis gates whether the provider is permitted to do
/// work; the activate/deactivate axis governs whether it currently is. All
/// four lifecycle operations are idempotent.
pub trait Provider: Send + Sync + 'static {
    /// Abstract resources this provider needs; read once by the engine to
    /// gate enablement against configuration.
    fn requirements(&self) -> Requirements {
        Requirements::empty()
    }

    /// Whether this provider can serve the given criteria.
    fn satisfies(&self, criteria: &Criteria) -> bool;

    fn enable(&self) {}
    fn disable(&self) {}
    fn activate(&self) {}
    fn deactivate(&self) {}

    /// Arbitrary out-of-band input; the engine forwards events unchanged to
    /// every provider.
    fn on_new_event(&self, _event: &Event) {}

    // Reference-data sinks, fed from the engine's best current estimates.
    fn on_reference_position_updated(&self, _position: &Update<Position>) {}
    fn on_reference_velocity_updated(&self, _velocity: &Update<Velocity>) {}
    fn on_reference_heading_updated(&self, _heading: &Update<Heading>) {}
    fn on_wifi_and_cell_reporting_state_changed(&self, _state: WifiAndCellIdReportingState) {}

    // Update sources.
    fn position_updates(&self) -> &Signal<Update<Position>>;
    fn heading_updates(&self) -> &Signal<Update<Heading>>;
    fn velocity_updates(&self) -> &Signal<Update<Velocity>>;
    fn space_vehicle_updates(&self) -> &Signal<Update<Vec<SpaceVehicle>>>;
}
