//! # provider-sim
//!
//! Simulated positioning providers for the Pinpoint Suite.
//!
//! Two providers are included:
//! - [`FixedProvider`]: emits one configured reference fix on a fixed
//!   period, optionally after a startup delay. Stands in for any "it just
//!   reports where it is told" source during development.
//! - [`RouteProvider`]: walks a list of waypoints at a configured speed with
//!   Gaussian position noise and a synthetic GPS constellation, mimicking a
//!   satellite receiver on a moving carrier.
//!
//! Both register themselves in the process-wide provider registry under
//! `sim::fixed` and `sim::route`; call [`register`] once at program start.
//!
//! Activation spawns a worker thread that emits on the provider's update
//! signals; deactivation stops and joins it. The engine never blocks on
//! either.

pub mod fixed;
pub mod geodesy;
pub mod route;

pub use fixed::FixedProvider;
pub use route::{RouteModel, RouteProvider};

use pinpoint_engine::ProviderRegistry;

/// Registers every simulated provider class with the process-wide registry.
pub fn register() {
    let registry = ProviderRegistry::instance();
    registry.add_factory(fixed::CLASS_NAME, |options| {
        Ok(FixedProvider::from_options(options))
    });
    registry.add_factory(route::CLASS_NAME, |options| {
        RouteProvider::from_options(options)
    });
}
