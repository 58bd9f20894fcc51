//! # pinpoint-engine
//!
//! The positioning engine of the Pinpoint Suite: a device-side service core
//! that combines heterogeneous positioning providers (satellite receivers,
//! radio-network estimation, reference providers) into a single coherent
//! stream of position, velocity and heading updates.
//!
//! ## Architecture
//!
//! Providers are added to the [`engine::Engine`], which wraps each one in a
//! [`state_tracking::StateTrackingProvider`] enforcing the
//! disabled/enabled/active lifecycle. Updates flow:
//!
//! ```text
//! provider → state-tracking wrapper → update policy → last_known_* cells
//!                                                      │            │
//!                                 session layer ◄──────┘            └──► reference data
//!                                                                        back into providers
//! ```
//!
//! Configuration changes (engine on/off, satellite-based positioning on/off,
//! wifi/cell reporting) fan out to all providers through the engine. The
//! engine is passive and synchronous; providers emit from their own threads.
//!
//! The IPC surface to clients, wire protocols and hardware drivers live
//! outside this crate; `pinpointd` assembles a minimal service around it.

pub mod engine;
pub mod error;
pub mod fusion;
pub mod provider;
pub mod proxy;
pub mod registry;
pub mod selection;
pub mod settings;
pub mod signals;
pub mod state_tracking;
pub mod states;
pub mod update_policy;

#[cfg(test)]
pub(crate) mod test_support;

pub use engine::{Configuration, Engine, Updates};
pub use error::{Error, Result};
pub use fusion::{FusionProvider, NewerOrMoreAccurateSelector, Sourced, UpdateSelector};
pub use provider::{Event, Provider, ProviderId, UpdateSignals};
pub use proxy::ProxyProvider;
pub use registry::{Options, ProviderRegistry};
pub use selection::{
    DefaultProviderSelectionPolicy, ProviderEnumerator, ProviderSelection, ProviderSelectionPolicy,
};
pub use settings::{FileSettings, InMemorySettings, Settings, SettingsExt};
pub use signals::{Cell, Connection, Signal};
pub use state_tracking::{ProviderState, StateTrackingProvider};
pub use states::{EngineStatus, SatelliteBasedPositioningState, WifiAndCellIdReportingState};
pub use update_policy::{TimeBasedUpdatePolicy, UpdatePolicy};
