use std::env;
use std::path::PathBuf;

use anyhow::Context;
use api_conformance::client::{
    ApiClient, Cassette, Credential, Executor, RecordingExecutor, ReplayExecutor,
};
use api_conformance::{Config, Runner, Suite};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Live,
    Record,
    Replay,
}

impl Mode {
    fn from_env() -> anyhow::Result<Self> {
        match env::var("CONFORMANCE_MODE").as_deref() {
            Err(_) | Ok("live") => Ok(Self::Live),
            Ok("record") => Ok(Self::Record),
            Ok("replay") => Ok(Self::Replay),
            Ok(other) => anyhow::bail!(
                "CONFORMANCE_MODE must be one of live, record, replay (got {:?})",
                other
            ),
        }
    }
}

/// Stands in for the credential during replay, where nothing reaches the network.
const REPLAY_CREDENTIAL: &str = "replay";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".to_string().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Get configuration from environment variables
    let suite_path = env::args()
        .nth(1)
        .or_else(|| env::var("CONFORMANCE_SUITE").ok())
        .map(PathBuf::from)
        .context("No suite given. Pass a suite file path or set CONFORMANCE_SUITE.")?;
    let mode = Mode::from_env()?;
    let cassette_path = env::var("CONFORMANCE_CASSETTE").ok().map(PathBuf::from);
    let report_path = env::var("CONFORMANCE_REPORT").ok().map(PathBuf::from);

    let mut config = Config::from_env()?;
    if mode == Mode::Replay && config.credential().is_none() {
        config = config.with_credential(Credential::new(REPLAY_CREDENTIAL));
    }

    let suite = Suite::load(&suite_path)?;
    tracing::info!(
        "Loaded {} scenarios in {} fixture groups from {}",
        suite.scenarios.len(),
        suite.groups.len(),
        suite_path.display()
    );

    let report = match mode {
        Mode::Live => {
            tracing::info!("Running live against {}", config.base_url);
            let client = ApiClient::new(&config);
            run(&config, &client, &suite).await
        }
        Mode::Record => {
            let path = cassette_path
                .as_ref()
                .context("CONFORMANCE_CASSETTE must be set when recording")?;
            tracing::info!("Recording {} into {}", config.base_url, path.display());
            let recorder =
                RecordingExecutor::new(ApiClient::new(&config), config.credential().cloned());
            let report = run(&config, &recorder, &suite).await;
            recorder.cassette().save(path)?;
            report
        }
        Mode::Replay => {
            let path = cassette_path
                .as_ref()
                .context("CONFORMANCE_CASSETTE must be set when replaying")?;
            tracing::info!("Replaying from {}", path.display());
            let replay = ReplayExecutor::new(Cassette::load(path)?, config.credential().cloned());
            let report = run(&config, &replay, &suite).await;
            if replay.remaining() > 0 {
                tracing::warn!("{} recorded interactions were not used", replay.remaining());
            }
            report
        }
    };

    println!("{}", report);

    if let Some(path) = report_path {
        std::fs::write(&path, report.to_json()?)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        tracing::info!("Wrote JSON report to {}", path.display());
    }

    std::process::exit(report.exit_code());
}

async fn run(config: &Config, executor: &dyn Executor, suite: &Suite) -> api_conformance::RunReport {
    Runner::new(config, executor).run(suite).await
}
