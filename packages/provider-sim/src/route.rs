//! A provider that walks a waypoint route, mimicking a satellite receiver
//! on a moving carrier.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use pinpoint_engine::{Error, Options, Provider, Result, Signal, UpdateSignals};
use pinpoint_types::{
    Constellation, Criteria, Degrees, Heading, Meters, MetersPerSecond, Position, Requirements,
    SpaceVehicle, SvKey, Update, Velocity,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tracing::debug;

use crate::geodesy;

pub const CLASS_NAME: &str = "sim::route";

/// Configuration option keys understood by [`RouteProvider`].
pub mod keys {
    pub const UPDATE_PERIOD_MS: &str = "sim.route.update_period_ms";
    /// Semicolon-separated `lat,lon` pairs, e.g. `53.54,9.98;53.55,9.99`.
    pub const WAYPOINTS: &str = "sim.route.waypoints";
    pub const SPEED: &str = "sim.route.speed";
    pub const NOISE_SIGMA: &str = "sim.route.noise_sigma";
    pub const HORIZONTAL_ACCURACY: &str = "sim.route.acc.hor";
    pub const LOOP: &str = "sim.route.loop";
}

// ── Route model ───────────────────────────────────────────────────────────────

/// One noise-free sample along the route.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteSample {
    pub lat: f64,
    pub lon: f64,
    pub bearing_deg: f64,
    pub speed_mps: f64,
}

/// Pure kinematics of the route walk; the worker thread adds noise and
/// timestamps. Separated out so the math is testable without threads.
#[derive(Debug, Clone)]
pub struct RouteModel {
    waypoints: Vec<(f64, f64)>,
    next: usize,
    position: (f64, f64),
    speed_mps: f64,
    loop_route: bool,
    started: bool,
    done: bool,
}

impl RouteModel {
    /// Needs at least two waypoints to define a direction of travel.
    pub fn new(waypoints: Vec<(f64, f64)>, speed_mps: f64, loop_route: bool) -> Option<Self> {
        if waypoints.len() < 2 {
            return None;
        }
        let position = waypoints[0];
        Some(Self {
            waypoints,
            next: 1,
            position,
            speed_mps,
            loop_route,
            started: false,
            done: false,
        })
    }

    /// Replaces the starting point with a reference hint. Only honored
    /// before the first step, the route geometry stays untouched.
    pub fn warm_start(&mut self, lat: f64, lon: f64) {
        if !self.started {
            self.position = (lat, lon);
        }
    }

    /// Advances the walk by `dt` seconds.
    pub fn step(&mut self, dt: f64) -> RouteSample {
        self.started = true;

        if self.done {
            return RouteSample {
                lat: self.position.0,
                lon: self.position.1,
                bearing_deg: geodesy::bearing_deg(self.position, self.waypoints[self.next]),
                speed_mps: 0.0,
            };
        }

        let mut remaining = self.speed_mps * dt;
        while remaining > 0.0 {
            let target = self.waypoints[self.next];
            let to_target = geodesy::distance_m(self.position, target);
            if to_target > remaining {
                self.position = geodesy::step_towards(self.position, target, remaining);
                break;
            }

            // Waypoint reached, spend the leftover on the next leg.
            self.position = target;
            remaining -= to_target;
            if self.next + 1 < self.waypoints.len() {
                self.next += 1;
            } else if self.loop_route {
                self.next = 0;
            } else {
                self.done = true;
                break;
            }
        }

        RouteSample {
            lat: self.position.0,
            lon: self.position.1,
            bearing_deg: geodesy::bearing_deg(self.position, self.waypoints[self.next]),
            speed_mps: if self.done { 0.0 } else { self.speed_mps },
        }
    }
}

// ── Configuration ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RouteConfig {
    pub update_period: Duration,
    pub waypoints: Vec<(f64, f64)>,
    pub speed_mps: f64,
    pub noise_sigma_m: f64,
    pub horizontal_accuracy: Meters,
    pub loop_route: bool,
}

impl RouteConfig {
    pub fn from_options(options: &Options) -> Result<Self> {
        let raw = options.get_raw(keys::WAYPOINTS).ok_or_else(|| {
            Error::InvalidArgument(format!("{} option is required", keys::WAYPOINTS))
        })?;
        let waypoints = parse_waypoints(raw)?;

        Ok(Self {
            update_period: Duration::from_millis(options.get_or(keys::UPDATE_PERIOD_MS, 1000)),
            waypoints,
            speed_mps: options.get_or(keys::SPEED, 4.0),
            noise_sigma_m: options.get_or(keys::NOISE_SIGMA, 2.0),
            horizontal_accuracy: Meters(options.get_or(keys::HORIZONTAL_ACCURACY, 5.0)),
            loop_route: options.get_or(keys::LOOP, true),
        })
    }
}

fn parse_waypoints(raw: &str) -> Result<Vec<(f64, f64)>> {
    let mut waypoints = Vec::new();
    for pair in raw.split(';').filter(|p| !p.trim().is_empty()) {
        let mut coords = pair.splitn(2, ',');
        let parsed = match (coords.next(), coords.next()) {
            (Some(lat), Some(lon)) => lat
                .trim()
                .parse::<f64>()
                .ok()
                .zip(lon.trim().parse::<f64>().ok()),
            _ => None,
        };
        match parsed {
            Some((lat, lon)) => {
                // Range-check through the boundary constructor.
                Position::new(Degrees(lat), Degrees(lon)).map_err(Error::from)?;
                waypoints.push((lat, lon));
            }
            None => {
                return Err(Error::InvalidArgument(format!(
                    "malformed waypoint {pair:?} (expected \"lat,lon\")"
                )))
            }
        }
    }
    if waypoints.len() < 2 {
        return Err(Error::InvalidArgument(
            "a route needs at least two waypoints".to_string(),
        ));
    }
    Ok(waypoints)
}

// ── Synthetic constellation ───────────────────────────────────────────────────

const GPS_PRNS: [u16; 8] = [2, 5, 7, 13, 15, 18, 21, 26];

fn synthetic_constellation(rng: &mut impl Rng) -> Vec<SpaceVehicle> {
    let snr_dist = Normal::<f64>::new(40.0, 6.0).expect("valid snr distribution");
    GPS_PRNS
        .iter()
        .map(|&prn| {
            let snr: f64 = snr_dist.sample(rng).clamp(10.0, 55.0);
            let used = snr > 28.0;
            SpaceVehicle {
                key: SvKey {
                    constellation: Constellation::Gps,
                    prn,
                },
                snr,
                has_almanac_data: true,
                has_ephemeris_data: used,
                used_in_fix: used,
                azimuth: Degrees(rng.gen_range(0.0..360.0)),
                elevation: Degrees(rng.gen_range(15.0..85.0)),
            }
        })
        .collect()
}

// ── Provider ──────────────────────────────────────────────────────────────────

/// Walks the configured route while active, emitting noisy position fixes,
/// bearing-derived headings, the configured ground speed, and a synthetic
/// GPS constellation. Declares the satellite requirement, so the engine's
/// satellite gate applies to it.
pub struct RouteProvider {
    config: RouteConfig,
    model: Arc<Mutex<RouteModel>>,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    updates: Arc<UpdateSignals>,
}

impl RouteProvider {
    pub fn new(config: RouteConfig) -> Result<Arc<Self>> {
        let model = RouteModel::new(config.waypoints.clone(), config.speed_mps, config.loop_route)
            .ok_or_else(|| {
                Error::InvalidArgument("a route needs at least two waypoints".to_string())
            })?;

        Ok(Arc::new(Self {
            config,
            model: Arc::new(Mutex::new(model)),
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
            updates: Arc::new(UpdateSignals::default()),
        }))
    }

    pub fn from_options(options: &Options) -> Result<Arc<dyn Provider>> {
        let provider: Arc<dyn Provider> = Self::new(RouteConfig::from_options(options)?)?;
        Ok(provider)
    }
}

impl Provider for RouteProvider {
    fn requirements(&self) -> Requirements {
        Requirements::SATELLITES
    }

    fn satisfies(&self, criteria: &Criteria) -> bool {
        match criteria.accuracy.horizontal {
            Some(wanted) => self.config.horizontal_accuracy <= wanted,
            None => true,
        }
    }

    fn activate(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let running = self.running.clone();
        let updates = self.updates.clone();
        let model = self.model.clone();
        let config = self.config.clone();

        let handle = std::thread::spawn(move || {
            debug!("route provider worker started");
            let mut rng = StdRng::from_entropy();
            let noise = Normal::new(0.0, config.noise_sigma_m).expect("valid noise sigma");
            let dt = config.update_period.as_secs_f64();

            while running.load(Ordering::SeqCst) {
                let sample = model.lock().unwrap().step(dt);

                let (lat, lon) = geodesy::offset_m(
                    (sample.lat, sample.lon),
                    noise.sample(&mut rng),
                    noise.sample(&mut rng),
                );
                if let Ok(position) = Position::new(Degrees(lat), Degrees(lon)) {
                    updates.position.emit(Update::now(
                        position.with_horizontal_accuracy(config.horizontal_accuracy),
                    ));
                }
                updates
                    .heading
                    .emit(Update::now(Heading::new(Degrees(sample.bearing_deg))));
                if let Ok(velocity) = Velocity::new(MetersPerSecond(sample.speed_mps)) {
                    updates.velocity.emit(Update::now(velocity));
                }
                updates
                    .space_vehicles
                    .emit(Update::now(synthetic_constellation(&mut rng)));

                std::thread::sleep(config.update_period);
            }
            debug!("route provider worker stopped");
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

    fn on_reference_position_updated(&self, position: &Update<Position>) {
        // A hint from the engine shortens our cold start.
        self.model.lock().unwrap().warm_start(
            position.value.latitude.value(),
            position.value.longitude.value(),
        );
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

impl Drop for RouteProvider {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leg() -> Vec<(f64, f64)> {
        // Roughly 1.1 km going north.
        vec![(53.55, 9.99), (53.56, 9.99)]
    }

    #[test]
    fn the_walk_advances_at_the_configured_speed() {
        let mut model = RouteModel::new(leg(), 5.0, false).unwrap();
        let start = (53.55, 9.99);

        model.step(10.0);
        let after = model.step(10.0);
        let moved = geodesy::distance_m(start, (after.lat, after.lon));
        assert!((moved - 100.0).abs() < 1.0, "moved {moved} m in 20 s");
        assert_eq!(after.speed_mps, 5.0);
    }

    #[test]
    fn a_non_looping_route_holds_at_the_final_waypoint() {
        let mut model = RouteModel::new(leg(), 5.0, false).unwrap();

        // Way more than the leg length.
        let sample = model.step(10_000.0);
        assert_eq!((sample.lat, sample.lon), (53.56, 9.99));
        assert_eq!(sample.speed_mps, 0.0);

        let again = model.step(10.0);
        assert_eq!((again.lat, again.lon), (53.56, 9.99));
    }

    #[test]
    fn a_looping_route_wraps_back_to_the_first_waypoint() {
        let mut model = RouteModel::new(leg(), 5.0, true).unwrap();
        let leg_m = geodesy::distance_m(leg()[0], leg()[1]);

        // One full leg plus 50 m of the return leg.
        let sample = model.step((leg_m + 50.0) / 5.0);
        let from_top = geodesy::distance_m(leg()[1], (sample.lat, sample.lon));
        assert!((from_top - 50.0).abs() < 1.0, "wrapped {from_top} m");
        assert_eq!(sample.speed_mps, 5.0);
    }

    #[test]
    fn warm_start_is_only_honored_before_the_first_step() {
        let mut model = RouteModel::new(leg(), 5.0, false).unwrap();
        model.warm_start(53.5, 9.9);
        let first = model.step(0.0);
        assert_eq!((first.lat, first.lon), (53.5, 9.9));

        model.warm_start(0.0, 0.0);
        let second = model.step(0.0);
        assert_eq!((second.lat, second.lon), (53.5, 9.9));
    }

    #[test]
    fn waypoint_parsing_accepts_the_documented_format() {
        let waypoints = parse_waypoints("53.54,9.98; 53.55,9.99 ;53.56,10.0").unwrap();
        assert_eq!(waypoints.len(), 3);
        assert_eq!(waypoints[1], (53.55, 9.99));
    }

    #[test]
    fn bad_waypoints_are_invalid_arguments() {
        assert!(matches!(
            parse_waypoints("53.54;53.55,9.99"),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            parse_waypoints("99.0,9.98;53.55,9.99"),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            parse_waypoints("53.54,9.98"),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn the_synthetic_constellation_reports_distinct_vehicles() {
        let mut rng = StdRng::seed_from_u64(7);
        let svs = synthetic_constellation(&mut rng);

        assert_eq!(svs.len(), GPS_PRNS.len());
        let mut keys: Vec<_> = svs.iter().map(|sv| sv.key).collect();
        keys.dedup();
        assert_eq!(keys.len(), svs.len());
        for sv in &svs {
            assert!((10.0..=55.0).contains(&sv.snr));
            assert_eq!(sv.used_in_fix, sv.snr > 28.0);
        }
    }

    #[test]
    fn the_route_config_requires_waypoints() {
        let result = RouteConfig::from_options(&Options::new());
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }
}
