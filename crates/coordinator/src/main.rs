use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fleet_coordinator::{run_batch, FleetConfig};
use fleet_core::{CoreError, TaskCatalog};
use fleet_events::{MessageChannel, TopicBus};

const DEFAULT_LOG_FILTER: &str =
    "fleet=info,fleet_core=info,fleet_events=info,fleet_coordinator=info,fleet_worker=info";

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Batch failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), CoreError> {
    // --- Configuration ---
    let config = FleetConfig::from_env()?;
    tracing::info!(
        tasks_file = %config.tasks_file.display(),
        workers = config.worker_count,
        deadline_secs = config.results_deadline.as_secs(),
        solver_limit_secs = config.solver.time_limit.as_secs(),
        "Loaded fleet configuration"
    );

    // --- Catalog ---
    let catalog = TaskCatalog::from_path(&config.tasks_file)?;
    tracing::info!(
        tasks = catalog.len(),
        total_payoff = catalog.total_payoff(),
        "Loaded task catalog"
    );

    // --- Channel ---
    let bus = Arc::new(TopicBus::default());
    let channel: Arc<dyn MessageChannel> = bus.clone();

    let report = run_batch(&config, catalog, channel).await;
    bus.close().await;
    let report = report?;

    println!("{}", report.summary);
    Ok(())
}
