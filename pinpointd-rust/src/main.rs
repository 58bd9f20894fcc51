mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use pinpoint_engine::{
    DefaultProviderSelectionPolicy, Engine, FileSettings, Options, ProviderRegistry, ProxyProvider,
};
use pinpoint_types::{Criteria, Features, Heading, Position, Update, Velocity};

// ─── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "pinpointd", about = "Pinpoint Suite positioning daemon")]
struct Args {
    /// Provider roster (TOML). Falls back to a built-in demo roster.
    #[arg(long, default_value = "pinpointd.toml")]
    config: PathBuf,

    /// Settings store the engine persists its state in.
    #[arg(long, default_value = "settings.json")]
    settings: PathBuf,
}

// ─── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pinpointd=info,pinpoint_engine=info,provider_sim=info".into()),
        )
        .init();

    let args = Args::parse();
    info!("📍 pinpointd v{} starting", env!("CARGO_PKG_VERSION"));

    // Provider implementations register themselves before the roster is read.
    provider_sim::register();

    let roster = config::load(&args.config);
    let settings = Arc::new(FileSettings::load(&args.settings));
    let engine = Arc::new(Engine::new(
        Arc::new(DefaultProviderSelectionPolicy),
        settings,
    ));

    for entry in &roster.provider {
        let options: Options = entry
            .options
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        match ProviderRegistry::instance().create(&entry.class, &options) {
            Ok(provider) => engine.add_provider(provider)?,
            Err(e) => warn!(class = %entry.class, "skipping provider: {e}"),
        }
    }

    // Surface every accepted estimate in the log.
    let _position_log = engine.updates().last_known_position.changed().connect(
        |estimate: &Option<Update<Position>>| {
            if let Some(update) = estimate {
                info!(
                    "fix: {:.5} {:.5} (±{}m)",
                    update.value.latitude.value(),
                    update.value.longitude.value(),
                    update
                        .value
                        .accuracy
                        .horizontal
                        .map(|m| m.value().round().to_string())
                        .unwrap_or_else(|| "?".into()),
                );
            }
        },
    );
    let _heading_log = engine.updates().last_known_heading.changed().connect(
        |estimate: &Option<Update<Heading>>| {
            if let Some(update) = estimate {
                info!("heading: {:.1}°", update.value.degrees().value());
            }
        },
    );
    let _velocity_log = engine.updates().last_known_velocity.changed().connect(
        |estimate: &Option<Update<Velocity>>| {
            if let Some(update) = estimate {
                info!("speed: {:.1} m/s", update.value.speed().value());
            }
        },
    );

    // Drive the streams a client session would ask for.
    let criteria = Criteria {
        requires: Features::all(),
        ..Criteria::default()
    };
    let selection = engine.determine_provider_selection_for_criteria(&criteria);
    if selection.is_empty() {
        warn!("no registered provider satisfies the default criteria; idling");
    }
    let session = ProxyProvider::new(selection);
    session.start_position_updates();
    session.start_heading_updates();
    session.start_velocity_updates();

    // Periodic status line.
    let engine_status = engine.clone();
    let status = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(30));
        loop {
            ticker.tick().await;
            info!(
                state = %engine_status.configuration().engine_state.get(),
                providers = engine_status.provider_count(),
                satellites = engine_status.updates().visible_space_vehicles.get().len(),
                "status"
            );
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    status.abort();
    let _ = status.await;

    session.stop_position_updates();
    session.stop_heading_updates();
    session.stop_velocity_updates();
    drop(session);

    // Last reference: tears the engine down, which stops every stream and
    // persists the settings.
    drop(engine);
    Ok(())
}
