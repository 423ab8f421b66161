mod cli;
mod error;

use crate::cli::Cli;
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use futures::StreamExt;
use remime_config::Config;
use remime_engine::{FixEvent, fix};
use remime_mime::ExtensionResolver;
use remime_storage::StoreHandle;
use remime_storage::backend::{ReadOnlyStore, S3Backend};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            tracing::error!(error = ?error, "{error}");
            ExitCode::FAILURE
        },
    }
}

/// `RUST_LOG` wins; otherwise each `-v` raises this workspace's crates one
/// level above `info`. Everything else stays at `warn`.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,remime={level},remime_config={level},remime_engine={level},remime_mime={level},remime_storage={level}"
        ))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Returns `true` when every object was accounted for without a failure.
async fn run(cli: &Cli) -> Result<bool> {
    let config = Config::load(cli.config.as_deref(), cli.overrides()).or_raise(|| ErrorKind::Config)?;

    let backend = S3Backend::new(
        &config.bucket,
        &config.region,
        config.endpoint.as_deref(),
        &config.credentials.key_id,
        &config.credentials.key_secret,
        config.max_attempts,
    );
    let mut store: StoreHandle = Arc::new(backend);
    if config.dry_run {
        tracing::info!("Dry run: no object will be modified");
        store = Arc::new(ReadOnlyStore::new(store));
    }
    let resolver = ExtensionResolver::default().with_overrides(&config.types);

    let mut failures = 0_u64;
    let mut finished = false;
    let events = fix(&store, &resolver, &config.run);
    let mut events = std::pin::pin!(events);
    while let Some(event) = events.next().await {
        match event {
            Ok(FixEvent::Connected { bucket, region }) => {
                tracing::info!(bucket = %bucket, region = %region, "Connected");
            },
            Ok(FixEvent::BatchFinished(result)) => {
                tracing::info!(batch = result.batch, retrieved = result.retrieved, total = result.total, "Batch finished");
            },
            Ok(FixEvent::AllBatchesFinished { batches, total }) => {
                tracing::info!(batches, total, "Listing complete");
            },
            Ok(FixEvent::Transformed { key, content_type, number }) => {
                tracing::info!(key = %key, content_type = %content_type, number, "Transformed");
            },
            Ok(FixEvent::End(summary)) => {
                finished = true;
                tracing::info!(
                    objects = summary.handled.objects,
                    transformed = summary.handled.transformed,
                    failed = summary.handled.failed,
                    batches = summary.totals.batches,
                    "Finished"
                );
            },
            Err(error) => {
                failures += 1;
                tracing::error!(kind = error.tag(), error = ?error, "{error}");
            },
        }
    }

    Ok(finished && failures == 0)
}
