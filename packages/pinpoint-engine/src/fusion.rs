//! Fusion composition: many providers feeding one logical provider, with a
//! selector choosing the authoritative update per stream.

use std::sync::{Arc, Mutex};

use chrono::TimeDelta;
use pinpoint_types::{
    Criteria, Heading, Position, Requirements, SpaceVehicle, Update, Velocity,
};

use crate::provider::{Event, Provider, ProviderId, UpdateSignals};
use crate::signals::{Connection, Signal};
use crate::state_tracking::StateTrackingProvider;
use crate::states::WifiAndCellIdReportingState;

// ── Sourced updates ───────────────────────────────────────────────────────────

/// An update together with the identity of the provider that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sourced<T> {
    pub source: ProviderId,
    pub update: T,
}

// ── Selector ──────────────────────────────────────────────────────────────────

/// Decides whether an incoming update replaces the current authoritative one
/// on a fused stream. Total: returns the chosen of the two.
pub trait UpdateSelector: Send + Sync {
    fn select_position(
        &self,
        current: Sourced<Update<Position>>,
        incoming: Sourced<Update<Position>>,
    ) -> Sourced<Update<Position>>;

    fn select_heading(
        &self,
        current: Sourced<Update<Heading>>,
        incoming: Sourced<Update<Heading>>,
    ) -> Sourced<Update<Heading>>;

    fn select_velocity(
        &self,
        current: Sourced<Update<Velocity>>,
        incoming: Sourced<Update<Velocity>>,
    ) -> Sourced<Update<Velocity>>;
}

/// The default selector.
///
/// An update from the same source as the current one is accepted
/// unconditionally. From a different source it must be newer by more than
/// the tolerance; position updates are additionally accepted on
/// better-or-equal horizontal accuracy. Ties keep the incumbent.
pub struct NewerOrMoreAccurateSelector {
    tolerance: TimeDelta,
}

impl NewerOrMoreAccurateSelector {
    pub fn new(tolerance: TimeDelta) -> Self {
        Self { tolerance }
    }

    pub fn default_tolerance() -> TimeDelta {
        TimeDelta::seconds(5)
    }

    fn prefers_newer<T>(&self, current: &Sourced<Update<T>>, incoming: &Sourced<Update<T>>) -> bool {
        if incoming.source == current.source {
            return true;
        }
        incoming.update.when > current.update.when + self.tolerance
    }
}

impl Default for NewerOrMoreAccurateSelector {
    fn default() -> Self {
        Self::new(Self::default_tolerance())
    }
}

impl UpdateSelector for NewerOrMoreAccurateSelector {
    fn select_position(
        &self,
        current: Sourced<Update<Position>>,
        incoming: Sourced<Update<Position>>,
    ) -> Sourced<Update<Position>> {
        if self.prefers_newer(&current, &incoming) {
            return incoming;
        }
        let more_accurate = match (
            current.update.value.accuracy.horizontal,
            incoming.update.value.accuracy.horizontal,
        ) {
            (Some(current_acc), Some(incoming_acc)) => incoming_acc <= current_acc,
            _ => false,
        };
        if more_accurate {
            incoming
        } else {
            current
        }
    }

    fn select_heading(
        &self,
        current: Sourced<Update<Heading>>,
        incoming: Sourced<Update<Heading>>,
    ) -> Sourced<Update<Heading>> {
        if self.prefers_newer(&current, &incoming) {
            incoming
        } else {
            current
        }
    }

    fn select_velocity(
        &self,
        current: Sourced<Update<Velocity>>,
        incoming: Sourced<Update<Velocity>>,
    ) -> Sourced<Update<Velocity>> {
        if self.prefers_newer(&current, &incoming) {
            incoming
        } else {
            current
        }
    }
}

// ── Fusion provider ───────────────────────────────────────────────────────────

/// Merges a set of providers into one logical provider. Every member
/// contributes on every stream; the selector arbitrates. Start/stop on a
/// fused stream fans out to every member.
pub struct FusionProvider {
    members: Vec<Arc<StateTrackingProvider>>,
    selector: Arc<dyn UpdateSelector>,
    updates: UpdateSignals,
    current_position: Mutex<Option<Sourced<Update<Position>>>>,
    current_heading: Mutex<Option<Sourced<Update<Heading>>>>,
    current_velocity: Mutex<Option<Sourced<Update<Velocity>>>>,
    _taps: Vec<Connection>,
}

impl FusionProvider {
    pub fn new(
        members: Vec<Arc<StateTrackingProvider>>,
        selector: Arc<dyn UpdateSelector>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &std::sync::Weak<Self>| {
            let mut taps = Vec::new();
            for member in &members {
                let source = member.id();

                let w = weak.clone();
                taps.push(member.position_updates().connect(
                    move |update: &Update<Position>| {
                        if let Some(me) = w.upgrade() {
                            me.offer_position(Sourced {
                                source,
                                update: *update,
                            });
                        }
                    },
                ));

                let w = weak.clone();
                taps.push(
                    member
                        .heading_updates()
                        .connect(move |update: &Update<Heading>| {
                            if let Some(me) = w.upgrade() {
                                me.offer_heading(Sourced {
                                    source,
                                    update: *update,
                                });
                            }
                        }),
                );

                let w = weak.clone();
                taps.push(member.velocity_updates().connect(
                    move |update: &Update<Velocity>| {
                        if let Some(me) = w.upgrade() {
                            me.offer_velocity(Sourced {
                                source,
                                update: *update,
                            });
                        }
                    },
                ));

                // Space vehicles are not arbitrated; every sighting counts.
                let w = weak.clone();
                taps.push(member.space_vehicle_updates().connect(
                    move |update: &Update<Vec<SpaceVehicle>>| {
                        if let Some(me) = w.upgrade() {
                            me.updates.space_vehicles.emit(update.clone());
                        }
                    },
                ));
            }

            Self {
                members,
                selector,
                updates: UpdateSignals::default(),
                current_position: Mutex::new(None),
                current_heading: Mutex::new(None),
                current_velocity: Mutex::new(None),
                _taps: taps,
            }
        })
    }

    pub fn start_position_updates(&self) {
        for member in &self.members {
            member.start_position_updates();
        }
    }

    pub fn stop_position_updates(&self) {
        for member in &self.members {
            member.stop_position_updates();
        }
    }

    pub fn start_heading_updates(&self) {
        for member in &self.members {
            member.start_heading_updates();
        }
    }

    pub fn stop_heading_updates(&self) {
        for member in &self.members {
            member.stop_heading_updates();
        }
    }

    pub fn start_velocity_updates(&self) {
        for member in &self.members {
            member.start_velocity_updates();
        }
    }

    pub fn stop_velocity_updates(&self) {
        for member in &self.members {
            member.stop_velocity_updates();
        }
    }

    fn offer_position(&self, incoming: Sourced<Update<Position>>) {
        let accepted = {
            let mut current = self.current_position.lock().unwrap();
            let accepted = match *current {
                None => true, // the first update is always accepted
                Some(cur) => self.selector.select_position(cur, incoming) == incoming,
            };
            if accepted {
                *current = Some(incoming);
            }
            accepted
        };
        if accepted {
            self.updates.position.emit(incoming.update);
        }
    }

    fn offer_heading(&self, incoming: Sourced<Update<Heading>>) {
        let accepted = {
            let mut current = self.current_heading.lock().unwrap();
            let accepted = match *current {
                None => true,
                Some(cur) => self.selector.select_heading(cur, incoming) == incoming,
            };
            if accepted {
                *current = Some(incoming);
            }
            accepted
        };
        if accepted {
            self.updates.heading.emit(incoming.update);
        }
    }

    fn offer_velocity(&self, incoming: Sourced<Update<Velocity>>) {
        let accepted = {
            let mut current = self.current_velocity.lock().unwrap();
            let accepted = match *current {
                None => true,
                Some(cur) => self.selector.select_velocity(cur, incoming) == incoming,
            };
            if accepted {
                *current = Some(incoming);
            }
            accepted
        };
        if accepted {
            self.updates.velocity.emit(incoming.update);
        }
    }
}

impl Provider for FusionProvider {
    fn requirements(&self) -> Requirements {
        self.members
            .iter()
            .fold(Requirements::empty(), |acc, m| acc | m.requirements())
    }

    fn satisfies(&self, criteria: &Criteria) -> bool {
        self.members.iter().any(|m| m.satisfies(criteria))
    }

    fn enable(&self) {
        for member in &self.members {
            member.enable();
        }
    }

    fn disable(&self) {
        for member in &self.members {
            member.disable();
        }
    }

    fn activate(&self) {
        for member in &self.members {
            member.activate();
        }
    }

    fn deactivate(&self) {
        for member in &self.members {
            member.deactivate();
        }
    }

    fn on_new_event(&self, event: &Event) {
        for member in &self.members {
            member.on_new_event(event);
        }
    }

    fn on_reference_position_updated(&self, position: &Update<Position>) {
        for member in &self.members {
            member.on_reference_position_updated(position);
        }
    }

    fn on_reference_velocity_updated(&self, velocity: &Update<Velocity>) {
        for member in &self.members {
            member.on_reference_velocity_updated(velocity);
        }
    }

    fn on_reference_heading_updated(&self, heading: &Update<Heading>) {
        for member in &self.members {
            member.on_reference_heading_updated(heading);
        }
    }

    fn on_wifi_and_cell_reporting_state_changed(&self, state: WifiAndCellIdReportingState) {
        for member in &self.members {
            member.on_wifi_and_cell_reporting_state_changed(state);
        }
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
