//! Proxy composition: one handle combining the three discrete providers of a
//! selection, forwarding each stream to the provider chosen for it.

use std::sync::Arc;

use pinpoint_types::{
    Criteria, Heading, Position, Requirements, SpaceVehicle, Update, Velocity,
};

use crate::provider::{Event, Provider, UpdateSignals};
use crate::selection::ProviderSelection;
use crate::signals::{Connection, Signal};
use crate::states::WifiAndCellIdReportingState;

/// Forwards start/stop of each stream to the provider selected for that
/// stream and republishes its updates unchanged.
pub struct ProxyProvider {
    selection: ProviderSelection,
    updates: UpdateSignals,
    _taps: Vec<Connection>,
}

impl ProxyProvider {
    pub fn new(selection: ProviderSelection) -> Arc<Self> {
        Arc::new_cyclic(|weak: &std::sync::Weak<Self>| {
            let mut taps = Vec::new();

            if let Some(provider) = &selection.position {
                let w = weak.clone();
                taps.push(provider.position_updates().connect(
                    move |update: &Update<Position>| {
                        if let Some(me) = w.upgrade() {
                            me.updates.position.emit(*update);
                        }
                    },
                ));
            }
            if let Some(provider) = &selection.heading {
                let w = weak.clone();
                taps.push(
                    provider
                        .heading_updates()
                        .connect(move |update: &Update<Heading>| {
                            if let Some(me) = w.upgrade() {
                                me.updates.heading.emit(*update);
                            }
                        }),
                );
            }
            if let Some(provider) = &selection.velocity {
                let w = weak.clone();
                taps.push(provider.velocity_updates().connect(
                    move |update: &Update<Velocity>| {
                        if let Some(me) = w.upgrade() {
                            me.updates.velocity.emit(*update);
                        }
                    },
                ));
            }

            // Space-vehicle sightings come from every distinct member.
            for provider in selection.distinct_providers() {
                let w = weak.clone();
                taps.push(provider.space_vehicle_updates().connect(
                    move |update: &Update<Vec<SpaceVehicle>>| {
                        if let Some(me) = w.upgrade() {
                            me.updates.space_vehicles.emit(update.clone());
                        }
                    },
                ));
            }

            Self {
                selection,
                updates: UpdateSignals::default(),
                _taps: taps,
            }
        })
    }

    pub fn start_position_updates(&self) {
        if let Some(provider) = &self.selection.position {
            provider.start_position_updates();
        }
    }

    pub fn stop_position_updates(&self) {
        if let Some(provider) = &self.selection.position {
            provider.stop_position_updates();
        }
    }

    pub fn start_heading_updates(&self) {
        if let Some(provider) = &self.selection.heading {
            provider.start_heading_updates();
        }
    }

    pub fn stop_heading_updates(&self) {
        if let Some(provider) = &self.selection.heading {
            provider.stop_heading_updates();
        }
    }

    pub fn start_velocity_updates(&self) {
        if let Some(provider) = &self.selection.velocity {
            provider.start_velocity_updates();
        }
    }

    pub fn stop_velocity_updates(&self) {
        if let Some(provider) = &self.selection.velocity {
            provider.stop_velocity_updates();
        }
    }
}

impl Provider for ProxyProvider {
    fn requirements(&self) -> Requirements {
        self.selection
            .distinct_providers()
            .iter()
            .fold(Requirements::empty(), |acc, p| acc | p.requirements())
    }

    fn satisfies(&self, criteria: &Criteria) -> bool {
        let slot_satisfies = |slot: &Option<Arc<crate::state_tracking::StateTrackingProvider>>,
                              wanted: bool| {
            !wanted || slot.as_ref().is_some_and(|p| p.satisfies(criteria))
        };
        slot_satisfies(&self.selection.position, criteria.wants_position())
            && slot_satisfies(&self.selection.heading, criteria.wants_heading())
            && slot_satisfies(&self.selection.velocity, criteria.wants_velocity())
    }

    fn enable(&self) {
        for provider in self.selection.distinct_providers() {
            provider.enable();
        }
    }

    fn disable(&self) {
        for provider in self.selection.distinct_providers() {
            provider.disable();
        }
    }

    fn activate(&self) {
        for provider in self.selection.distinct_providers() {
            provider.activate();
        }
    }

    fn deactivate(&self) {
        for provider in self.selection.distinct_providers() {
            provider.deactivate();
        }
    }

    fn on_new_event(&self, event: &Event) {
        for provider in self.selection.distinct_providers() {
            provider.on_new_event(event);
        }
    }

    fn on_reference_position_updated(&self, position: &Update<Position>) {
        for provider in self.selection.distinct_providers() {
            provider.on_reference_position_updated(position);
        }
    }

    fn on_reference_velocity_updated(&self, velocity: &Update<Velocity>) {
        for provider in self.selection.distinct_providers() {
            provider.on_reference_velocity_updated(velocity);
        }
    }

    fn on_reference_heading_updated(&self, heading: &Update<Heading>) {
        for provider in self.selection.distinct_providers() {
            provider.on_reference_heading_updated(heading);
        }
    }

    fn on_wifi_and_cell_reporting_state_changed(&self, state: WifiAndCellIdReportingState) {
        for provider in self.selection.distinct_providers() {
            provider.on_wifi_and_cell_reporting_state_changed(state);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_tracking::StateTrackingProvider;
    use crate::test_support::MockProvider;
    use pinpoint_types::Degrees;
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    fn wrap(mock: &Arc<MockProvider>) -> Arc<StateTrackingProvider> {
        let inner: Arc<dyn Provider> = mock.clone();
        StateTrackingProvider::new(inner)
    }

    #[test]
    fn per_stream_start_reaches_exactly_the_selected_provider() {
        let for_position = Arc::new(MockProvider::new());
        let for_heading = Arc::new(MockProvider::new());

        let proxy = ProxyProvider::new(ProviderSelection {
            position: Some(wrap(&for_position)),
            heading: Some(wrap(&for_heading)),
            velocity: None,
        });

        proxy.start_position_updates();
        assert_eq!(for_position.activate_calls.load(Ordering::SeqCst), 1);
        assert_eq!(for_heading.activate_calls.load(Ordering::SeqCst), 0);

        proxy.start_velocity_updates(); // empty slot, nothing happens
        proxy.stop_position_updates();
        assert_eq!(for_position.deactivate_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn updates_are_republished_unchanged() {
        let mock = Arc::new(MockProvider::new());
        let wrapper = wrap(&mock);
        let proxy = ProxyProvider::new(ProviderSelection {
            position: Some(wrapper),
            heading: None,
            velocity: None,
        });

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _c = proxy
            .position_updates()
            .connect(move |u: &Update<Position>| sink.lock().unwrap().push(*u));

        let update = Update::now(Position::new(Degrees(9.0), Degrees(53.0)).unwrap());
        mock.inject_position(update);

        assert_eq!(*seen.lock().unwrap(), vec![update]);
    }
}
