//! Controllable provider double shared by the unit tests in this crate.

use std::sync::atomic::AtomicUsize;
use std::sync::Mutex;

use pinpoint_types::{
    Criteria, Heading, Position, Requirements, SpaceVehicle, Update, Velocity,
};

use crate::provider::{Event, Provider, UpdateSignals};
use crate::signals::Signal;
use crate::states::WifiAndCellIdReportingState;

/// A provider whose updates are injected from the test and whose lifecycle
/// calls are counted.
pub struct MockProvider {
    pub requirements: Requirements,
    pub satisfies: bool,
    pub enable_calls: AtomicUsize,
    pub disable_calls: AtomicUsize,
    pub activate_calls: AtomicUsize,
    pub deactivate_calls: AtomicUsize,
    pub events: Mutex<Vec<Event>>,
    pub reference_positions: Mutex<Vec<Update<Position>>>,
    pub reference_velocities: Mutex<Vec<Update<Velocity>>>,
    pub reference_headings: Mutex<Vec<Update<Heading>>>,
    pub wifi_states: Mutex<Vec<WifiAndCellIdReportingState>>,
    pub updates: UpdateSignals,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            requirements: Requirements::empty(),
            satisfies: true,
            enable_calls: AtomicUsize::new(0),
            disable_calls: AtomicUsize::new(0),
            activate_calls: AtomicUsize::new(0),
            deactivate_calls: AtomicUsize::new(0),
            events: Mutex::new(Vec::new()),
            reference_positions: Mutex::new(Vec::new()),
            reference_velocities: Mutex::new(Vec::new()),
            reference_headings: Mutex::new(Vec::new()),
            wifi_states: Mutex::new(Vec::new()),
            updates: UpdateSignals::default(),
        }
    }

    pub fn with_requirements(requirements: Requirements) -> Self {
        Self {
            requirements,
            ..Self::new()
        }
    }

    pub fn inject_position(&self, update: Update<Position>) {
        self.updates.position.emit(update);
    }

    pub fn inject_heading(&self, update: Update<Heading>) {
        self.updates.heading.emit(update);
    }

    pub fn inject_velocity(&self, update: Update<Velocity>) {
        self.updates.velocity.emit(update);
    }

    pub fn inject_space_vehicles(&self, update: Update<Vec<SpaceVehicle>>) {
        self.updates.space_vehicles.emit(update);
    }
}

impl Provider for MockProvider {
    fn requirements(&self) -> Requirements {
        self.requirements
    }

    fn satisfies(&self, _criteria: &Criteria) -> bool {
        self.satisfies
    }

    fn enable(&self) {
        self.enable_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    fn disable(&self) {
        self.disable_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    fn activate(&self) {
        self.activate_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    fn deactivate(&self) {
        self.deactivate_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    fn on_new_event(&self, event: &Event) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn on_reference_position_updated(&self, position: &Update<Position>) {
        self.reference_positions.lock().unwrap().push(*position);
    }

    fn on_reference_velocity_updated(&self, velocity: &Update<Velocity>) {
        self.reference_velocities.lock().unwrap().push(*velocity);
    }

    fn on_reference_heading_updated(&self, heading: &Update<Heading>) {
        self.reference_headings.lock().unwrap().push(*heading);
    }

    fn on_wifi_and_cell_reporting_state_changed(&self, state: WifiAndCellIdReportingState) {
        self.wifi_states.lock().unwrap().push(state);
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
