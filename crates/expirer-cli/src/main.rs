//! expirer: extend Firestore expiries for the IDs queued in a Redis set.
//!
//! Exit codes: 0 success, 2 configuration error (no store I/O happened),
//! 1 store failure.

mod args;
mod logging;

use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;

use expirer_core::impls::{FirestoreDocumentStore, RedisKeySource};
use expirer_core::{BuildError, ConfigError, ReconcileError, ReconcilerBuilder, RunCounts};

use crate::args::Args;

const EXIT_STORE: u8 = 1;
const EXIT_CONFIG: u8 = 2;

async fn run(args: Args) -> anyhow::Result<RunCounts> {
    // 設定はすべてここで検証する（store にはまだ触らない）
    let settings = args.into_settings()?;

    let keys = RedisKeySource::connect(&settings.redis)
        .await
        .with_context(|| format!("connecting to redis at {}", settings.redis.addr))?;
    let docs = FirestoreDocumentStore::new(settings.firestore)
        .context("creating firestore client")?;

    let reconciler = ReconcilerBuilder::new(settings.reconciler)
        .key_source(keys)
        .document_store(docs)
        .build()?;

    let report = reconciler.run().await?;
    Ok(report.counts())
}

/// 設定エラーかどうかで exit code を分ける
fn exit_code(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<ConfigError>().is_some()
        || matches!(err.downcast_ref::<BuildError>(), Some(BuildError::Config(_)))
    {
        EXIT_CONFIG
    } else {
        EXIT_STORE
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(&args.log_level, args.log_format);

    match run(args).await {
        Ok(counts) => {
            tracing::info!(
                batch = counts.batch,
                initialized = counts.initialized,
                extended = counts.extended,
                missing = counts.missing,
                removed = counts.removed,
                "done"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            if let Some(e) = err.downcast_ref::<ReconcileError>()
                && !e.applied_keys().is_empty()
            {
                tracing::warn!(
                    applied = e.applied_keys().len(),
                    "documents were already extended and their keys remain queued; the next run extends them again"
                );
            }
            let message = format!("{err:#}");
            tracing::error!(error = %message, "reconcile failed");
            ExitCode::from(exit_code(&err))
        }
    }
}
