use chrono::{DateTime, Utc};
use common_exception::{BenchError, Result};
use tokio_postgres::{Client, Transaction};
use tracing::{info, warn};

use crate::config::ExperimentConfig;
use crate::isolate::isolate_index;
use crate::plan::capture_plan;
use crate::region::resolve_region;
use crate::sampling::{PreparedCountQuery, count_query_sql, sample_windows};
use crate::stats::{RunResult, aggregate};

/// Outcome of one (index, window size) run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowOutcome {
    Complete(RunResult),
    /// The budget elapsed before a single pass finished.
    NoSamples,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowRun {
    pub window_size: f64,
    pub outcome: WindowOutcome,
}

/// Everything measured for one index, or the error that ended its test.
/// Either way the transaction was rolled back and the schema restored.
#[derive(Debug)]
pub struct IndexRun {
    pub index: String,
    pub outcome: Result<Vec<WindowRun>>,
}

/// Final report, keyed by index in configured order, then window size.
#[derive(Debug)]
pub struct ExperimentReport {
    pub started_at: DateTime<Utc>,
    pub indexes: Vec<IndexRun>,
}

/// Runs the full experiment: every configured index against every window
/// size, each index inside its own transaction.
///
/// A schema or query failure ends that one index's test; the remaining
/// indexes still run. Only a configuration error aborts the whole
/// experiment.
pub async fn run_experiment(
    client: &mut Client, config: &ExperimentConfig,
) -> Result<ExperimentReport> {
    config.validate()?;

    let started_at = Utc::now();
    let mut indexes = Vec::with_capacity(config.indexes.len());
    for index in &config.indexes {
        info!(index = index.as_str(), "testing index");
        let outcome = test_index(client, config, index).await;
        if let Err(error) = &outcome {
            warn!(index = index.as_str(), %error, "index test failed, skipping to next index");
        }
        indexes.push(IndexRun {
            index: index.clone(),
            outcome,
        });
    }

    Ok(ExperimentReport {
        started_at,
        indexes,
    })
}

/// One index's test inside a dedicated transaction. The rollback runs
/// regardless of outcome, restoring every dropped index before the next
/// test begins.
async fn test_index(
    client: &mut Client, config: &ExperimentConfig, index: &str,
) -> Result<Vec<WindowRun>> {
    let txn = client.transaction().await?;
    let runs = sample_index(&txn, config, index).await;
    let rollback = txn.rollback().await;

    let runs = runs?;
    rollback?;
    Ok(runs)
}

async fn sample_index(
    txn: &Transaction<'_>, config: &ExperimentConfig, index: &str,
) -> Result<Vec<WindowRun>> {
    isolate_index(txn, &config.indexes, index, &config.drop_indexes).await?;

    let count_sql = count_query_sql(config);
    for line in capture_plan(txn, &count_sql).await? {
        info!(index, plan = line.as_str());
    }
    let probe = PreparedCountQuery::prepare(txn, &count_sql).await?;

    let mut runs = Vec::with_capacity(config.window_sizes.len());
    for &window_size in &config.window_sizes {
        let region = resolve_region(txn, config, window_size / 2.0).await?;
        let totals = sample_windows(&probe, &region, window_size, config.sample_budget).await?;

        let outcome = match aggregate(window_size, &totals) {
            Ok(result) => {
                info!(
                    index,
                    window_size,
                    passes = result.passes,
                    avg_item_count = result.avg_item_count,
                    time_per_pass_ms = result.time_per_pass.as_secs_f64() * 1e3,
                    "window size sampled"
                );
                WindowOutcome::Complete(result)
            }
            Err(BenchError::NoSamples { .. }) => {
                warn!(index, window_size, "budget elapsed before the first pass");
                WindowOutcome::NoSamples
            }
            Err(other) => return Err(other),
        };
        runs.push(WindowRun {
            window_size,
            outcome,
        });
    }
    Ok(runs)
}
