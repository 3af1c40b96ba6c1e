//! `flowscribe`: documents a directory of exported workflows.

mod config;

use crate::config::CliConfig;
use flowscribe_pipeline::{BatchRunner, FsArtifactWriter, FsWorkflowSource, write_artifacts};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match CliConfig::load() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        source = %config.source_dir.display(),
        output = %config.output_dir.display(),
        lookback_days = config.lookback_days,
        "loaded configuration"
    );

    let source = FsWorkflowSource::new(&config.source_dir);
    let runner = BatchRunner::new(config.batch_options());
    let outcome = match runner.run(&source, &config.query()).await {
        Ok(outcome) => outcome,
        Err(report) => {
            tracing::error!(error = %report, "cannot read workflows");
            return ExitCode::FAILURE;
        }
    };

    let writer = FsArtifactWriter::new(&config.output_dir);
    let summary = write_artifacts(&writer, &outcome).await;
    if !summary.is_complete() {
        tracing::error!(failed = summary.failed, "some artifacts could not be written");
        return ExitCode::FAILURE;
    }

    tracing::info!(
        batch = %outcome.report.id,
        documents = outcome.documents.len(),
        output = %config.output_dir.display(),
        "documentation written"
    );
    ExitCode::SUCCESS
}
