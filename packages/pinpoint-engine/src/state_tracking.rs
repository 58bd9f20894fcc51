//! State-tracking wrapper placed around every provider the engine owns.
//!
//! The wrapper enforces the disabled/enabled/active state machine, publishes
//! the current state on an observable cell, and reference-counts per-stream
//! start/stop requests: the first start across all three streams activates
//! the inner provider, the last stop deactivates it. Updates from the inner
//! provider are republished on the wrapper's own signals, gated so that a
//! disabled provider contributes nothing.

use std::fmt;
use std::sync::{Arc, Mutex};

use pinpoint_types::{Criteria, Heading, Position, Requirements, SpaceVehicle, Update, Velocity};
use tracing::debug;

use crate::error::Error;
use crate::provider::{Event, Provider, ProviderId, UpdateSignals};
use crate::signals::{Cell, Connection, Signal};
use crate::states::WifiAndCellIdReportingState;

// ── Provider state ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    /// Not permitted to do any work.
    Disabled,
    /// Permitted to work, currently idle.
    Enabled,
    /// Currently navigating.
    Active,
}

impl fmt::Display for ProviderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderState::Disabled => "disabled",
            ProviderState::Enabled => "enabled",
            ProviderState::Active => "active",
        };
        f.write_str(s)
    }
}

// ── Start/stop bookkeeping ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamKind {
    Position,
    Heading,
    Velocity,
}

#[derive(Default)]
struct StartCounters {
    position: usize,
    heading: usize,
    velocity: usize,
}

impl StartCounters {
    fn total(&self) -> usize {
        self.position + self.heading + self.velocity
    }

    fn slot_mut(&mut self, stream: StreamKind) -> &mut usize {
        match stream {
            StreamKind::Position => &mut self.position,
            StreamKind::Heading => &mut self.heading,
            StreamKind::Velocity => &mut self.velocity,
        }
    }

    fn reset(&mut self) {
        *self = StartCounters::default();
    }
}

// ── Wrapper ───────────────────────────────────────────────────────────────────

/// The adapter the engine installs around every provider. Initial state on
/// wrap is `enabled`.
pub struct StateTrackingProvider {
    id: ProviderId,
    inner: Arc<dyn Provider>,
    state: Cell<ProviderState>,
    counters: Mutex<StartCounters>,
    updates: UpdateSignals,
    _forwards: Vec<Connection>,
}

impl StateTrackingProvider {
    pub fn new(inner: Arc<dyn Provider>) -> Arc<Self> {
        Arc::new_cyclic(|weak: &std::sync::Weak<Self>| {
            // Republish inner updates on the wrapper's signals, gated on the
            // wrapper not being disabled.
            let weak_pos = weak.clone();
            let weak_head = weak.clone();
            let weak_vel = weak.clone();
            let weak_svs = weak.clone();
            let forwards = vec![
                inner
                    .position_updates()
                    .connect(move |update: &Update<Position>| {
                        if let Some(me) = weak_pos.upgrade() {
                            if me.forwarding() {
                                me.updates.position.emit(update.clone());
                            }
                        }
                    }),
                inner
                    .heading_updates()
                    .connect(move |update: &Update<Heading>| {
                        if let Some(me) = weak_head.upgrade() {
                            if me.forwarding() {
                                me.updates.heading.emit(update.clone());
                            }
                        }
                    }),
                inner
                    .velocity_updates()
                    .connect(move |update: &Update<Velocity>| {
                        if let Some(me) = weak_vel.upgrade() {
                            if me.forwarding() {
                                me.updates.velocity.emit(update.clone());
                            }
                        }
                    }),
                inner
                    .space_vehicle_updates()
                    .connect(move |update: &Update<Vec<SpaceVehicle>>| {
                        if let Some(me) = weak_svs.upgrade() {
                            if me.forwarding() {
                                me.updates.space_vehicles.emit(update.clone());
                            }
                        }
                    }),
            ];

            Self {
                id: ProviderId::new(),
                inner,
                state: Cell::new(ProviderState::Enabled),
                counters: Mutex::new(StartCounters::default()),
                updates: UpdateSignals::default(),
                _forwards: forwards,
            }
        })
    }

    pub fn id(&self) -> ProviderId {
        self.id
    }

    pub fn state(&self) -> ProviderState {
        self.state.get()
    }

    pub fn state_changed(&self) -> &Signal<ProviderState> {
        self.state.changed()
    }

    /// Whether inner updates may flow through. A disabled wrapper's streams
    /// are torn down: the emission is dropped and nobody is notified.
    fn forwarding(&self) -> bool {
        if self.state.get() == ProviderState::Disabled {
            debug!(provider = %self.id, "{}", Error::Cancelled);
            return false;
        }
        true
    }

    // ── Permit level ─────────────────────────────────────────────────────

    /// Permits the provider to work again. Idempotent.
    pub fn enable(&self) {
        if self.state.get() == ProviderState::Disabled {
            self.inner.enable();
            self.state.set(ProviderState::Enabled);
        }
    }

    /// Revokes the work permit; an active provider is deactivated first and
    /// outstanding start requests are forgotten. Idempotent.
    pub fn disable(&self) {
        match self.state.get() {
            ProviderState::Disabled => {}
            ProviderState::Enabled => {
                self.counters.lock().unwrap().reset();
                self.inner.disable();
                self.state.set(ProviderState::Disabled);
            }
            ProviderState::Active => {
                self.counters.lock().unwrap().reset();
                self.inner.deactivate();
                self.inner.disable();
                self.state.set(ProviderState::Disabled);
            }
        }
    }

    // ── Activity level ───────────────────────────────────────────────────

    /// Direct activation, bypassing the stream counters. Idempotent.
    pub fn activate(&self) {
        if self.state.get() == ProviderState::Enabled {
            self.inner.activate();
            self.state.set(ProviderState::Active);
        }
    }

    /// Direct deactivation. Idempotent.
    pub fn deactivate(&self) {
        if self.state.get() == ProviderState::Active {
            self.inner.deactivate();
            self.state.set(ProviderState::Enabled);
        }
    }

    // ── Reference-counted stream control ─────────────────────────────────

    pub fn start_position_updates(&self) {
        self.start_updates(StreamKind::Position);
    }

    pub fn stop_position_updates(&self) {
        self.stop_updates(StreamKind::Position);
    }

    pub fn start_heading_updates(&self) {
        self.start_updates(StreamKind::Heading);
    }

    pub fn stop_heading_updates(&self) {
        self.stop_updates(StreamKind::Heading);
    }

    pub fn start_velocity_updates(&self) {
        self.start_updates(StreamKind::Velocity);
    }

    pub fn stop_velocity_updates(&self) {
        self.stop_updates(StreamKind::Velocity);
    }

    /// Cancels every outstanding start request and deactivates. Used by the
    /// engine during teardown.
    pub fn cancel_all_updates(&self) {
        self.counters.lock().unwrap().reset();
        self.deactivate();
    }

    fn start_updates(&self, stream: StreamKind) {
        if self.state.get() == ProviderState::Disabled {
            debug!(provider = %self.id, ?stream, "start request on disabled provider discarded");
            return;
        }

        let first = {
            let mut counters = self.counters.lock().unwrap();
            let was_idle = counters.total() == 0;
            *counters.slot_mut(stream) += 1;
            was_idle
        };

        if first {
            self.inner.activate();
            self.state.set(ProviderState::Active);
        }
    }

    fn stop_updates(&self, stream: StreamKind) {
        let last = {
            let mut counters = self.counters.lock().unwrap();
            let slot = counters.slot_mut(stream);
            if *slot == 0 {
                return;
            }
            *slot -= 1;
            counters.total() == 0
        };

        if last {
            self.inner.deactivate();
            self.state.set(ProviderState::Enabled);
        }
    }
}

impl Drop for StateTrackingProvider {
    fn drop(&mut self) {
        // Backstop: updates must cease before storage is released.
        if self.state.get() == ProviderState::Active {
            self.inner.deactivate();
        }
    }
}

impl Provider for StateTrackingProvider {
    fn requirements(&self) -> Requirements {
        self.inner.requirements()
    }

    fn satisfies(&self, criteria: &Criteria) -> bool {
        self.inner.satisfies(criteria)
    }

    fn enable(&self) {
        StateTrackingProvider::enable(self);
    }

    fn disable(&self) {
        StateTrackingProvider::disable(self);
    }

    fn activate(&self) {
        StateTrackingProvider::activate(self);
    }

    fn deactivate(&self) {
        StateTrackingProvider::deactivate(self);
    }

    fn on_new_event(&self, event: &Event) {
        self.inner.on_new_event(event);
    }

    fn on_reference_position_updated(&self, position: &Update<Position>) {
        self.inner.on_reference_position_updated(position);
    }

    fn on_reference_velocity_updated(&self, velocity: &Update<Velocity>) {
        self.inner.on_reference_velocity_updated(velocity);
    }

    fn on_reference_heading_updated(&self, heading: &Update<Heading>) {
        self.inner.on_reference_heading_updated(heading);
    }

    fn on_wifi_and_cell_reporting_state_changed(&self, state: WifiAndCellIdReportingState) {
        self.inner.on_wifi_and_cell_reporting_state_changed(state);
    }

    fn position_updates(&self) -> &Signal<Update<Position>> {
        &self.updates.position
    }

    fn heading_updates(&self) -> &Signal<Update<Heading>> {
        &self.updates.heading
    }

    fn velocity_updates(&self) -> &Signal<Update<Velocity>> {
        &self.updates.velocity
    }

    fn space_vehicle_updates(&self) -> &Signal<Update<Vec<SpaceVehicle>>> {
        &self.updates.space_vehicles
    }
}
