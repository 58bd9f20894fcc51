//! Daemon configuration: the provider roster.
//!
//! The roster names provider classes from the process-wide registry and the
//! option bundle each factory receives. A missing or corrupt file falls back
//! to a demo roster so a bare `pinpointd` run produces fixes.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub provider: Vec<ProviderRoster>,
}

#[derive(Debug, Deserialize)]
pub struct ProviderRoster {
    /// Registry class name, e.g. `sim::route`.
    pub class: String,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl DaemonConfig {
    /// Two simulated providers walking and holding around Hamburg harbor.
    pub fn demo() -> Self {
        let mut route_options = BTreeMap::new();
        route_options.insert(
            "sim.route.waypoints".to_string(),
            "53.5403,9.9840;53.5450,9.9935;53.5428,10.0012;53.5380,9.9950".to_string(),
        );
        route_options.insert("sim.route.speed".to_string(), "4.5".to_string());

        let mut fixed_options = BTreeMap::new();
        fixed_options.insert("sim.fixed.lat".to_string(), "53.5403".to_string());
        fixed_options.insert("sim.fixed.lon".to_string(), "9.9840".to_string());
        fixed_options.insert("sim.fixed.acc.hor".to_string(), "150".to_string());

        Self {
            provider: vec![
                ProviderRoster {
                    class: "sim::route".to_string(),
                    options: route_options,
                },
                ProviderRoster {
                    class: "sim::fixed".to_string(),
                    options: fixed_options,
                },
            ],
        }
    }
}

/// Loads the roster from disk, falling back to the demo roster.
pub fn load(path: &Path) -> DaemonConfig {
    match std::fs::read_to_string(path) {
        Ok(data) => match toml::from_str::<DaemonConfig>(&data) {
            Ok(config) => {
                info!(
                    "loaded {} provider(s) from {}",
                    config.provider.len(),
                    path.display()
                );
                config
            }
            Err(e) => {
                warn!("failed to parse {}: {e}, using demo roster", path.display());
                DaemonConfig::demo()
            }
        },
        Err(_) => {
            info!("no config at {}, using demo roster", path.display());
            DaemonConfig::demo()
        }
    }
}
