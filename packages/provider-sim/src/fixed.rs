//! A provider that reports one configured reference fix, forever.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use pinpoint_engine::{Options, Provider, Signal, UpdateSignals};
use pinpoint_types::{
    Criteria, Degrees, Heading, Meters, MetersPerSecond, Position, SpaceVehicle, Update, Velocity,
};
use tracing::debug;

pub const CLASS_NAME: &str = "sim::fixed";

/// Configuration option keys understood by [`FixedProvider`].
pub mod keys {
    pub const UPDATE_PERIOD_MS: &str = "sim.fixed.update_period_ms";
    pub const STARTUP_DELAY_MS: &str = "sim.fixed.startup_delay_ms";
    pub const LAT: &str = "sim.fixed.lat";
    pub const LON: &str = "sim.fixed.lon";
    pub const ALT: &str = "sim.fixed.alt";
    pub const HORIZONTAL_ACCURACY: &str = "sim.fixed.acc.hor";
    pub const VERTICAL_ACCURACY: &str = "sim.fixed.acc.ver";
    pub const SPEED_OVER_GROUND: &str = "sim.fixed.sog";
    pub const COURSE_OVER_GROUND: &str = "sim.fixed.cog";
}

#[derive(Debug, Clone, Copy)]
pub struct FixedConfig {
    pub update_period: Duration,
    /// Delay before the first emission; models a slow-to-first-fix source.
    pub startup_delay: Duration,
    pub reference_position: Position,
    pub reference_velocity: Velocity,
    pub reference_heading: Heading,
}

impl Default for FixedConfig {
    fn default() -> Self {
        Self {
            update_period: Duration::from_millis(500),
            startup_delay: Duration::ZERO,
            reference_position: Position::new(Degrees(51.0), Degrees(7.0))
                .expect("default reference coordinates are in range"),
            reference_velocity: Velocity::default(),
            reference_heading: Heading::new(Degrees(127.0)),
        }
    }
}

impl FixedConfig {
    pub fn from_options(options: &Options) -> Self {
        let defaults = Self::default();

        let mut position = Position::new(
            Degrees(options.get_or(keys::LAT, 51.0)),
            Degrees(options.get_or(keys::LON, 7.0)),
        )
        .unwrap_or(defaults.reference_position);

        if let Some(alt) = options.get::<f64>(keys::ALT) {
            position = position.with_altitude(Meters(alt));
        }
        if let Some(acc) = options.get::<f64>(keys::HORIZONTAL_ACCURACY) {
            position = position.with_horizontal_accuracy(Meters(acc));
        }
        if let Some(acc) = options.get::<f64>(keys::VERTICAL_ACCURACY) {
            position = position.with_vertical_accuracy(Meters(acc));
        }

        Self {
            update_period: Duration::from_millis(options.get_or(keys::UPDATE_PERIOD_MS, 500)),
            startup_delay: Duration::from_millis(options.get_or(keys::STARTUP_DELAY_MS, 0)),
            reference_position: position,
            reference_velocity: Velocity::new(MetersPerSecond(
                options.get_or::<f64>(keys::SPEED_OVER_GROUND, 0.0).max(0.0),
            ))
            .expect("clamped speed is non-negative"),
            reference_heading: Heading::new(Degrees(options.get_or(keys::COURSE_OVER_GROUND, 127.0))),
        }
    }
}

/// Emits the configured reference fix on every update period while active.
pub struct FixedProvider {
    config: FixedConfig,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    updates: Arc<UpdateSignals>,
}

impl FixedProvider {
    pub fn new(config: FixedConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
            updates: Arc::new(UpdateSignals::default()),
        })
    }

    pub fn from_options(options: &Options) -> Arc<Self> {
        Self::new(FixedConfig::from_options(options))
    }
}

impl Provider for FixedProvider {
    fn satisfies(&self, criteria: &Criteria) -> bool {
        // Honor a requested horizontal bound when we know our own accuracy.
        match (
            criteria.accuracy.horizontal,
            self.config.reference_position.accuracy.horizontal,
        ) {
            (Some(wanted), Some(ours)) => ours <= wanted,
            _ => true,
        }
    }

    fn activate(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let running = self.running.clone();
        let updates = self.updates.clone();
        let config = self.config;

        let handle = std::thread::spawn(move || {
            debug!("fixed provider worker started");
            if !config.startup_delay.is_zero() {
                std::thread::sleep(config.startup_delay);
            }
            while running.load(Ordering::SeqCst) {
                updates
                    .position
                    .emit(Update::now(config.reference_position));
                updates.heading.emit(Update::now(config.reference_heading));
                updates
                    .velocity
                    .emit(Update::now(config.reference_velocity));
                std::thread::sleep(config.update_period);
            }
            debug!("fixed provider worker stopped");
        });

        *self.worker.lock().unwrap() = Some(handle);
    }

    fn deactivate(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
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

impl Drop for FixedProvider {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}
