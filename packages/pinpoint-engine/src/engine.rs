//! The positioning engine.
//!
//! Owns a dynamic set of providers, tracks the global engine state, funnels
//! every candidate update through the update policy into the authoritative
//! `last_known_*` cells, and feeds those best estimates back into providers
//! as reference data. Configuration changes fan out to all providers.
//!
//! The engine is a passive object: none of its methods block on I/O, and
//! update delivery happens synchronously on the emitting provider's thread.
//! The provider table is snapshotted before callbacks run, so a callback
//! re-entering the engine cannot deadlock it.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Weak};

use pinpoint_types::{
    Criteria, Heading, Position, Requirements, SpaceVehicle, SvKey, Update, Velocity,
};
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::fusion::Sourced;
use crate::provider::{Event, Provider};
use crate::selection::{ProviderEnumerator, ProviderSelection, ProviderSelectionPolicy};
use crate::settings::{Settings, SettingsExt};
use crate::signals::{Cell, Connection, Signal};
use crate::state_tracking::{ProviderState, StateTrackingProvider};
use crate::states::{EngineStatus, SatelliteBasedPositioningState, WifiAndCellIdReportingState};
use crate::update_policy::{TimeBasedUpdatePolicy, UpdatePolicy};

/// Settings keys the engine persists its configuration under. Part of the
/// persistence contract; do not rename.
pub mod keys {
    pub const ENGINE_STATE: &str = "Engine::State";
    pub const WIFI_AND_CELL_ID_REPORTING_STATE: &str = "Engine::WifiAndCellIdReportingState";
}

// ── Observable engine surface ─────────────────────────────────────────────────

/// The engine's observable configuration. Defaults: on / on / off.
pub struct Configuration {
    pub engine_state: Cell<EngineStatus>,
    pub satellite_based_positioning_state: Cell<SatelliteBasedPositioningState>,
    pub wifi_and_cell_id_reporting_state: Cell<WifiAndCellIdReportingState>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            engine_state: Cell::new(EngineStatus::default()),
            satellite_based_positioning_state: Cell::new(SatelliteBasedPositioningState::default()),
            wifi_and_cell_id_reporting_state: Cell::new(WifiAndCellIdReportingState::default()),
        }
    }
}

/// All updates distributed via the engine. The `last_known_*` cells double
/// as the reference-data bus; `visible_space_vehicles` is a union over time,
/// vehicles are retained until re-reported.
#[derive(Default)]
pub struct Updates {
    pub last_known_position: Cell<Option<Update<Position>>>,
    pub last_known_velocity: Cell<Option<Update<Velocity>>>,
    pub last_known_heading: Cell<Option<Update<Heading>>>,
    pub visible_space_vehicles: Cell<HashMap<SvKey, SpaceVehicle>>,
}

// ── Internals ─────────────────────────────────────────────────────────────────

struct ProviderEntry {
    // Dropped before the provider: severing the wiring first guarantees no
    // callback fires into a half-dead provider.
    _connections: Vec<Connection>,
    provider: Arc<StateTrackingProvider>,
}

/// Internal fan-out of accepted updates, each tagged with the provider that
/// produced it. Feedback subscriptions read the origin straight off the
/// delivered value, so concurrently emitting providers cannot misattribute
/// an update to each other.
#[derive(Default)]
struct ReferenceBus {
    position: Signal<Sourced<Update<Position>>>,
    velocity: Signal<Sourced<Update<Velocity>>>,
    heading: Signal<Sourced<Update<Heading>>>,
}

struct EngineInner {
    // Handed to subscription closures so they never keep the engine alive.
    weak_self: Weak<EngineInner>,
    providers: Mutex<Vec<ProviderEntry>>,
    configuration: Configuration,
    updates: Updates,
    selection_policy: Arc<dyn ProviderSelectionPolicy>,
    update_policy: Arc<dyn UpdatePolicy>,
    settings: Arc<dyn Settings>,
    reference: ReferenceBus,
}

// ── Engine ────────────────────────────────────────────────────────────────────

/// The positioning engine. Construction restores `engine_state` and
/// `wifi_and_cell_id_reporting_state` from settings; destruction writes both
/// back, cancels every update stream and severs all provider wiring.
pub struct Engine {
    inner: Arc<EngineInner>,
    _config_wiring: Vec<Connection>,
}

impl Engine {
    pub fn new(
        selection_policy: Arc<dyn ProviderSelectionPolicy>,
        settings: Arc<dyn Settings>,
    ) -> Self {
        Self::with_update_policy(
            selection_policy,
            settings,
            Arc::new(TimeBasedUpdatePolicy::default()),
        )
    }

    pub fn with_update_policy(
        selection_policy: Arc<dyn ProviderSelectionPolicy>,
        settings: Arc<dyn Settings>,
        update_policy: Arc<dyn UpdatePolicy>,
    ) -> Self {
        let mut engine_state = settings.get_enum(keys::ENGINE_STATE, EngineStatus::default());
        if engine_state == EngineStatus::Active {
            // `active` is only reachable through a provider activating.
            engine_state = EngineStatus::On;
        }
        let wifi_state = settings.get_enum(
            keys::WIFI_AND_CELL_ID_REPORTING_STATE,
            WifiAndCellIdReportingState::default(),
        );

        let inner = Arc::new_cyclic(|weak| EngineInner {
            weak_self: weak.clone(),
            providers: Mutex::new(Vec::new()),
            configuration: Configuration {
                engine_state: Cell::new(engine_state),
                satellite_based_positioning_state: Cell::new(
                    SatelliteBasedPositioningState::default(),
                ),
                wifi_and_cell_id_reporting_state: Cell::new(wifi_state),
            },
            updates: Updates::default(),
            selection_policy,
            update_policy,
            settings,
            reference: ReferenceBus::default(),
        });

        // Fan configuration changes out to all providers.
        let weak = Arc::downgrade(&inner);
        let on_engine_state = inner.configuration.engine_state.changed().connect(
            move |status: &EngineStatus| {
                if let Some(inner) = weak.upgrade() {
                    inner.apply_engine_state(*status);
                }
            },
        );

        let weak = Arc::downgrade(&inner);
        let on_satellite_state = inner
            .configuration
            .satellite_based_positioning_state
            .changed()
            .connect(move |state: &SatelliteBasedPositioningState| {
                if let Some(inner) = weak.upgrade() {
                    inner.apply_satellite_state(*state);
                }
            });

        info!(state = %engine_state, "positioning engine up");

        Self {
            inner,
            _config_wiring: vec![on_engine_state, on_satellite_state],
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.inner.configuration
    }

    pub fn updates(&self) -> &Updates {
        &self.inner.updates
    }

    /// Makes a provider known to the engine: wraps it, synchronizes it to
    /// the current configuration and installs all signal wiring.
    pub fn add_provider(&self, provider: Arc<dyn Provider>) -> Result<()> {
        self.inner.add_provider(provider)
    }

    /// Iterates the registered providers in insertion order. A panicking
    /// callback is caught and logged; the iteration continues.
    pub fn for_each_provider(&self, mut f: impl FnMut(&Arc<StateTrackingProvider>)) {
        self.inner.for_each_provider(&mut f);
    }

    pub fn determine_provider_selection_for_criteria(
        &self,
        criteria: &Criteria,
    ) -> ProviderSelection {
        self.inner
            .selection_policy
            .determine_provider_selection_for_criteria(criteria, &*self.inner)
    }

    /// Forwards an out-of-band event unchanged to every provider.
    pub fn on_new_event(&self, event: &Event) {
        self.inner.for_each_provider(&mut |provider| {
            provider.on_new_event(event);
        });
    }

    pub fn provider_count(&self) -> usize {
        self.inner.providers.lock().unwrap().len()
    }
}

impl ProviderEnumerator for Engine {
    fn for_each_provider(&self, enumerator: &mut dyn FnMut(&Arc<StateTrackingProvider>)) {
        self.inner.for_each_provider(enumerator);
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let configuration = &self.inner.configuration;
        self.inner
            .settings
            .set_enum(keys::ENGINE_STATE, configuration.engine_state.get());
        self.inner.settings.set_enum(
            keys::WIFI_AND_CELL_ID_REPORTING_STATE,
            configuration.wifi_and_cell_id_reporting_state.get(),
        );
        if let Err(e) = self.inner.settings.sync() {
            warn!("failed to persist engine settings: {e}");
        }

        // Stop updates first, then drop the connection bundles, then the
        // providers. No callback fires after this returns.
        let entries: Vec<ProviderEntry> = {
            let mut providers = self.inner.providers.lock().unwrap();
            providers.drain(..).collect()
        };
        for entry in &entries {
            entry.provider.cancel_all_updates();
        }
        drop(entries);
    }
}

// ── Wiring ────────────────────────────────────────────────────────────────────

impl EngineInner {
    fn snapshot(&self) -> Vec<Arc<StateTrackingProvider>> {
        self.providers
            .lock()
            .unwrap()
            .iter()
            .map(|entry| entry.provider.clone())
            .collect()
    }

    fn for_each_provider(&self, enumerator: &mut dyn FnMut(&Arc<StateTrackingProvider>)) {
        // Snapshot under the lock, call outside it: callbacks may re-enter.
        for provider in self.snapshot() {
            if catch_unwind(AssertUnwindSafe(|| enumerator(&provider))).is_err() {
                let err = Error::ProviderFault(format!(
                    "enumeration callback panicked for {}",
                    provider.id()
                ));
                error!("{err}; continuing with remaining providers");
            }
        }
    }

    fn apply_engine_state(&self, status: EngineStatus) {
        match status {
            EngineStatus::On => {
                let satellites_allowed = self.configuration.satellite_based_positioning_state.get()
                    == SatelliteBasedPositioningState::On;
                for provider in self.snapshot() {
                    if provider.requirements().contains(Requirements::SATELLITES)
                        && !satellites_allowed
                    {
                        continue;
                    }
                    provider.enable();
                }
            }
            EngineStatus::Off => {
                for provider in self.snapshot() {
                    provider.disable();
                }
            }
            // Only reachable by a provider transitioning to active; nothing
            // to fan out.
            EngineStatus::Active => {}
        }
    }

    fn apply_satellite_state(&self, state: SatelliteBasedPositioningState) {
        let engine_off = self.configuration.engine_state.get() == EngineStatus::Off;
        for provider in self.snapshot() {
            if !provider.requirements().contains(Requirements::SATELLITES) {
                continue;
            }
            match state {
                SatelliteBasedPositioningState::On => {
                    if !engine_off {
                        provider.enable();
                    }
                }
                SatelliteBasedPositioningState::Off => provider.disable(),
            }
        }
    }

    /// Engine state is `active` iff at least one provider is. While the
    /// engine is `off`, provider transitions do not resurrect it.
    fn recompute_activity(&self) {
        let any_active = self
            .snapshot()
            .iter()
            .any(|provider| provider.state() == ProviderState::Active);

        if self.configuration.engine_state.get() != EngineStatus::Off {
            self.configuration.engine_state.set(if any_active {
                EngineStatus::Active
            } else {
                EngineStatus::On
            });
        }
    }

    fn add_provider(&self, provider: Arc<dyn Provider>) -> Result<()> {
        let provider = StateTrackingProvider::new(provider);
        let pid = provider.id();

        // Synchronize the newcomer to the current configuration.
        if provider.requirements().contains(Requirements::SATELLITES)
            && self.configuration.satellite_based_positioning_state.get()
                == SatelliteBasedPositioningState::Off
        {
            provider.disable();
        }
        if self.configuration.engine_state.get() == EngineStatus::Off {
            provider.disable();
        }

        let mut connections = Vec::new();

        // Reference-data bus: accepted estimates flow back into the
        // provider. Each delivery carries the identity of the provider that
        // produced it, so self-originated updates are skipped reliably even
        // while several providers emit at once.
        {
            let sink = provider.clone();
            connections.push(self.reference.position.connect(
                move |sourced: &Sourced<Update<Position>>| {
                    if sourced.source != pid {
                        sink.on_reference_position_updated(&sourced.update);
                    }
                },
            ));
        }
        {
            let sink = provider.clone();
            connections.push(self.reference.velocity.connect(
                move |sourced: &Sourced<Update<Velocity>>| {
                    if sourced.source != pid {
                        sink.on_reference_velocity_updated(&sourced.update);
                    }
                },
            ));
        }
        {
            let sink = provider.clone();
            connections.push(self.reference.heading.connect(
                move |sourced: &Sourced<Update<Heading>>| {
                    if sourced.source != pid {
                        sink.on_reference_heading_updated(&sourced.update);
                    }
                },
            ));
        }
        {
            let sink = provider.clone();
            connections.push(
                self.configuration
                    .wifi_and_cell_id_reporting_state
                    .changed()
                    .connect(move |state: &WifiAndCellIdReportingState| {
                        sink.on_wifi_and_cell_reporting_state_changed(*state);
                    }),
            );
        }

        // Satellite visibility is funneled into the engine-wide union.
        {
            let weak = self.weak_self.clone();
            connections.push(provider.space_vehicle_updates().connect(
                move |update: &Update<Vec<SpaceVehicle>>| {
                    if let Some(inner) = weak.upgrade() {
                        let sighted = update.value.clone();
                        inner.updates.visible_space_vehicles.update(move |visible| {
                            for sv in &sighted {
                                visible.insert(sv.key, *sv);
                            }
                            true
                        });
                    }
                },
            ));
        }

        // Provider streams run through the update policy into the
        // authoritative cells. An accepted update is republished on the
        // reference bus as one value pairing estimate and origin; a rejected
        // one changes nothing and feeds nothing back.
        {
            let weak = self.weak_self.clone();
            connections.push(provider.position_updates().connect(
                move |update: &Update<Position>| {
                    if let Some(inner) = weak.upgrade() {
                        let chosen = inner.update_policy.verify_position(*update);
                        inner.updates.last_known_position.set(Some(chosen));
                        if chosen == *update {
                            inner.reference.position.emit(Sourced {
                                source: pid,
                                update: chosen,
                            });
                        }
                    }
                },
            ));
        }
        {
            let weak = self.weak_self.clone();
            connections.push(provider.heading_updates().connect(
                move |update: &Update<Heading>| {
                    if let Some(inner) = weak.upgrade() {
                        let chosen = inner.update_policy.verify_heading(*update);
                        inner.updates.last_known_heading.set(Some(chosen));
                        if chosen == *update {
                            inner.reference.heading.emit(Sourced {
                                source: pid,
                                update: chosen,
                            });
                        }
                    }
                },
            ));
        }
        {
            let weak = self.weak_self.clone();
            connections.push(provider.velocity_updates().connect(
                move |update: &Update<Velocity>| {
                    if let Some(inner) = weak.upgrade() {
                        let chosen = inner.update_policy.verify_velocity(*update);
                        inner.updates.last_known_velocity.set(Some(chosen));
                        if chosen == *update {
                            inner.reference.velocity.emit(Sourced {
                                source: pid,
                                update: chosen,
                            });
                        }
                    }
                },
            ));
        }

        // Provider state transitions drive the engine-wide activity state.
        {
            let weak = self.weak_self.clone();
            connections.push(
                provider
                    .state_changed()
                    .connect(move |_state: &ProviderState| {
                        if let Some(inner) = weak.upgrade() {
                            inner.recompute_activity();
                        }
                    }),
            );
        }

        info!(provider = %pid, requirements = ?provider.requirements(), "provider added");
        self.providers.lock().unwrap().push(ProviderEntry {
            _connections: connections,
            provider,
        });
        Ok(())
    }
}

impl ProviderEnumerator for EngineInner {
    fn for_each_provider(&self, enumerator: &mut dyn FnMut(&Arc<StateTrackingProvider>)) {
        EngineInner::for_each_provider(self, enumerator);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::DefaultProviderSelectionPolicy;
    use crate::settings::InMemorySettings;
    use crate::test_support::MockProvider;
    use chrono::{TimeDelta, Utc};
    use pinpoint_types::{Constellation, Degrees, Meters};
    use std::sync::atomic::Ordering;

    fn engine_with_settings(settings: Arc<dyn Settings>) -> Engine {
        Engine::new(Arc::new(DefaultProviderSelectionPolicy), settings)
    }

    fn engine() -> Engine {
        engine_with_settings(Arc::new(InMemorySettings::new()))
    }

    fn fix_at(when: chrono::DateTime<Utc>, lat: f64, lon: f64) -> Update<Position> {
        Update::new(Position::new(Degrees(lat), Degrees(lon)).unwrap(), when)
    }

    #[test]
    fn add_start_stop_activates_and_deactivates_once() {
        let engine = engine();
        let mock = Arc::new(MockProvider::new());
        engine.add_provider(mock.clone()).unwrap();

        let selection = engine.determine_provider_selection_for_criteria(&Criteria {
            requires: pinpoint_types::Features::all(),
            ..Criteria::default()
        });
        let chosen = selection.position.clone().unwrap();

        chosen.start_position_updates();
        chosen.start_position_updates();
        chosen.start_heading_updates();
        chosen.start_velocity_updates();
        assert_eq!(mock.activate_calls.load(Ordering::SeqCst), 1);

        chosen.stop_position_updates();
        chosen.stop_position_updates();
        chosen.stop_heading_updates();
        chosen.stop_velocity_updates();
        assert_eq!(mock.deactivate_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn a_significantly_newer_position_supersedes_the_last_known_one() {
        let engine = engine();
        let mock = Arc::new(MockProvider::new());
        engine.add_provider(mock.clone()).unwrap();

        let t = Utc::now();
        mock.inject_position(fix_at(t, 9.0, 53.0));
        let newer = fix_at(t + TimeDelta::minutes(3), 9.1, 53.1);
        mock.inject_position(newer);

        assert_eq!(engine.updates().last_known_position.get(), Some(newer));
    }

    #[test]
    fn an_older_and_less_accurate_position_is_rejected() {
        let engine = engine();
        let mock = Arc::new(MockProvider::new());
        engine.add_provider(mock.clone()).unwrap();

        let t = Utc::now();
        let current = Update::new(
            Position::new(Degrees(9.0), Degrees(53.0))
                .unwrap()
                .with_horizontal_accuracy(Meters(50.0)),
            t,
        );
        mock.inject_position(current);

        let stale = Update::new(
            Position::new(Degrees(9.5), Degrees(53.5))
                .unwrap()
                .with_horizontal_accuracy(Meters(500.0)),
            t - TimeDelta::seconds(3),
        );
        mock.inject_position(stale);

        assert_eq!(engine.updates().last_known_position.get(), Some(current));
    }

    #[test]
    fn the_satellite_gate_disables_and_reenables_providers() {
        let engine = engine();
        let mock = Arc::new(MockProvider::with_requirements(Requirements::SATELLITES));
        engine.add_provider(mock.clone()).unwrap();

        engine
            .configuration()
            .satellite_based_positioning_state
            .set(SatelliteBasedPositioningState::Off);

        let selection = engine.determine_provider_selection_for_criteria(&Criteria::default());
        let chosen = selection.position.clone().unwrap();
        assert_eq!(chosen.state(), ProviderState::Disabled);

        chosen.start_position_updates();
        assert_eq!(mock.activate_calls.load(Ordering::SeqCst), 0);

        engine
            .configuration()
            .satellite_based_positioning_state
            .set(SatelliteBasedPositioningState::On);
        engine.configuration().engine_state.set(EngineStatus::On);

        assert_eq!(chosen.state(), ProviderState::Enabled);
        chosen.start_position_updates();
        assert_eq!(mock.activate_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn a_provider_needing_satellites_is_disabled_on_add_when_the_gate_is_closed() {
        let engine = engine();
        engine
            .configuration()
            .satellite_based_positioning_state
            .set(SatelliteBasedPositioningState::Off);

        let gated = Arc::new(MockProvider::with_requirements(Requirements::SATELLITES));
        let free = Arc::new(MockProvider::new());
        engine.add_provider(gated).unwrap();
        engine.add_provider(free).unwrap();

        let mut states = Vec::new();
        engine.for_each_provider(|p| states.push(p.state()));
        assert_eq!(states, vec![ProviderState::Disabled, ProviderState::Enabled]);
    }

    #[test]
    fn switching_the_engine_off_disables_every_provider() {
        let engine = engine();
        let a = Arc::new(MockProvider::new());
        let b = Arc::new(MockProvider::with_requirements(Requirements::SATELLITES));
        engine.add_provider(a).unwrap();
        engine.add_provider(b).unwrap();

        engine.configuration().engine_state.set(EngineStatus::Off);

        let mut states = Vec::new();
        engine.for_each_provider(|p| states.push(p.state()));
        assert_eq!(states, vec![ProviderState::Disabled, ProviderState::Disabled]);

        // Back on: the satellite provider comes back too, the gate is open.
        engine.configuration().engine_state.set(EngineStatus::On);
        let mut states = Vec::new();
        engine.for_each_provider(|p| states.push(p.state()));
        assert_eq!(states, vec![ProviderState::Enabled, ProviderState::Enabled]);
    }

    #[test]
    fn engine_state_is_active_iff_some_provider_is() {
        let engine = engine();
        let mock = Arc::new(MockProvider::new());
        engine.add_provider(mock).unwrap();
        engine.add_provider(Arc::new(MockProvider::new())).unwrap();

        assert_eq!(engine.configuration().engine_state.get(), EngineStatus::On);

        let selection = engine.determine_provider_selection_for_criteria(&Criteria::default());
        let chosen = selection.position.clone().unwrap();
        chosen.start_position_updates();
        assert_eq!(
            engine.configuration().engine_state.get(),
            EngineStatus::Active
        );

        chosen.stop_position_updates();
        assert_eq!(engine.configuration().engine_state.get(), EngineStatus::On);
    }

    #[test]
    fn reference_position_reaches_every_provider_but_the_originator() {
        let engine = engine();
        let origin = Arc::new(MockProvider::new());
        let peer = Arc::new(MockProvider::new());
        engine.add_provider(origin.clone()).unwrap();
        engine.add_provider(peer.clone()).unwrap();

        origin.inject_position(fix_at(Utc::now(), 9.0, 53.0));

        assert_eq!(origin.reference_positions.lock().unwrap().len(), 0);
        assert_eq!(peer.reference_positions.lock().unwrap().len(), 1);
    }

    /// Accepts every candidate, so each emission reaches the feedback path.
    struct AcceptAll;

    impl UpdatePolicy for AcceptAll {
        fn verify_position(&self, update: Update<Position>) -> Update<Position> {
            update
        }
        fn verify_heading(&self, update: Update<Heading>) -> Update<Heading> {
            update
        }
        fn verify_velocity(&self, update: Update<Velocity>) -> Update<Velocity> {
            update
        }
    }

    #[test]
    fn concurrent_emitters_never_receive_their_own_updates_as_reference() {
        let engine = Engine::with_update_policy(
            Arc::new(DefaultProviderSelectionPolicy),
            Arc::new(InMemorySettings::new()),
            Arc::new(AcceptAll),
        );
        let a = Arc::new(MockProvider::new());
        let b = Arc::new(MockProvider::new());
        engine.add_provider(a.clone()).unwrap();
        engine.add_provider(b.clone()).unwrap();

        const ROUNDS: usize = 200;
        let emitter = |provider: Arc<MockProvider>, coordinate: f64| {
            std::thread::spawn(move || {
                for _ in 0..ROUNDS {
                    provider.inject_position(fix_at(Utc::now(), coordinate, coordinate));
                }
            })
        };
        let emit_a = emitter(a.clone(), 10.0);
        let emit_b = emitter(b.clone(), 20.0);
        emit_a.join().unwrap();
        emit_b.join().unwrap();

        // The origin travels with every delivery, so however the two
        // emitter threads interleave, each provider sees all of its peer's
        // updates and none of its own.
        let to_a = a.reference_positions.lock().unwrap();
        assert_eq!(to_a.len(), ROUNDS);
        assert!(to_a.iter().all(|u| u.value.latitude == Degrees(20.0)));

        let to_b = b.reference_positions.lock().unwrap();
        assert_eq!(to_b.len(), ROUNDS);
        assert!(to_b.iter().all(|u| u.value.latitude == Degrees(10.0)));
    }

    #[test]
    fn wifi_reporting_state_changes_reach_every_provider() {
        let engine = engine();
        let a = Arc::new(MockProvider::new());
        let b = Arc::new(MockProvider::new());
        engine.add_provider(a.clone()).unwrap();
        engine.add_provider(b.clone()).unwrap();

        engine
            .configuration()
            .wifi_and_cell_id_reporting_state
            .set(WifiAndCellIdReportingState::On);

        assert_eq!(
            *a.wifi_states.lock().unwrap(),
            vec![WifiAndCellIdReportingState::On]
        );
        assert_eq!(
            *b.wifi_states.lock().unwrap(),
            vec![WifiAndCellIdReportingState::On]
        );
    }

    #[test]
    fn events_are_forwarded_unchanged_to_every_provider() {
        let engine = engine();
        let a = Arc::new(MockProvider::new());
        let b = Arc::new(MockProvider::new());
        engine.add_provider(a.clone()).unwrap();
        engine.add_provider(b.clone()).unwrap();

        let event = Event::ReferencePositionUpdated(fix_at(Utc::now(), 9.0, 53.0));
        engine.on_new_event(&event);

        assert_eq!(*a.events.lock().unwrap(), vec![event.clone()]);
        assert_eq!(*b.events.lock().unwrap(), vec![event]);
    }

    #[test]
    fn space_vehicles_accumulate_as_a_union_over_time() {
        let engine = engine();
        let mock = Arc::new(MockProvider::new());
        engine.add_provider(mock.clone()).unwrap();

        let gps23 = SvKey {
            constellation: Constellation::Gps,
            prn: 23,
        };
        let gal05 = SvKey {
            constellation: Constellation::Galileo,
            prn: 5,
        };

        let mut first = SpaceVehicle::new(gps23);
        first.snr = 38.0;
        mock.inject_space_vehicles(Update::now(vec![first]));

        let mut second = SpaceVehicle::new(gal05);
        second.snr = 30.0;
        let mut resighted = first;
        resighted.snr = 41.0;
        mock.inject_space_vehicles(Update::now(vec![second, resighted]));

        let visible = engine.updates().visible_space_vehicles.get();
        assert_eq!(visible.len(), 2);
        assert_eq!(visible[&gps23].snr, 41.0);
        assert_eq!(visible[&gal05].snr, 30.0);
    }

    #[test]
    fn a_faulting_enumeration_callback_does_not_end_the_iteration() {
        let engine = engine();
        engine.add_provider(Arc::new(MockProvider::new())).unwrap();
        engine.add_provider(Arc::new(MockProvider::new())).unwrap();

        let mut visited = 0;
        engine.for_each_provider(|_| {
            visited += 1;
            panic!("bad consumer");
        });
        assert_eq!(visited, 2);
    }

    #[test]
    fn settings_are_restored_on_construction_and_persisted_on_drop() {
        let settings = Arc::new(InMemorySettings::new());
        settings.set_enum(keys::ENGINE_STATE, EngineStatus::Off);

        {
            let engine = engine_with_settings(settings.clone());
            assert_eq!(engine.configuration().engine_state.get(), EngineStatus::Off);

            // A provider added while off starts disabled.
            let mock = Arc::new(MockProvider::new());
            engine.add_provider(mock).unwrap();
            let mut states = Vec::new();
            engine.for_each_provider(|p| states.push(p.state()));
            assert_eq!(states, vec![ProviderState::Disabled]);

            engine.configuration().engine_state.set(EngineStatus::On);
            engine
                .configuration()
                .wifi_and_cell_id_reporting_state
                .set(WifiAndCellIdReportingState::On);
        }

        // Both keys were written back on drop.
        assert_eq!(
            settings.get_enum(keys::ENGINE_STATE, EngineStatus::Off),
            EngineStatus::On
        );
        assert_eq!(
            settings.get_enum(
                keys::WIFI_AND_CELL_ID_REPORTING_STATE,
                WifiAndCellIdReportingState::Off
            ),
            WifiAndCellIdReportingState::On
        );
    }

    #[test]
    fn teardown_stops_streams_and_silences_callbacks() {
        let mock = Arc::new(MockProvider::new());
        {
            let engine = engine();
            engine.add_provider(mock.clone()).unwrap();
            let selection = engine.determine_provider_selection_for_criteria(&Criteria::default());
            selection.position.as_ref().unwrap().start_position_updates();
            assert_eq!(mock.activate_calls.load(Ordering::SeqCst), 1);
        }

        // The engine deactivated the stream on drop; emitting afterwards
        // reaches nobody and must not panic.
        assert_eq!(mock.deactivate_calls.load(Ordering::SeqCst), 1);
        mock.inject_position(fix_at(Utc::now(), 9.0, 53.0));
    }
}
