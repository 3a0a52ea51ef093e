use std::time::Duration;

use common_exception::{BenchError, Result};
use serde::{Serialize, Serializer};

use crate::sampling::SampleTotals;

/// Aggregated metrics for one (index, window size) run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunResult {
    /// Wall-clock time spent in the sampling loop. May overrun the
    /// configured budget by up to one query's latency.
    #[serde(serialize_with = "as_secs")]
    pub duration: Duration,
    pub passes: u64,
    pub avg_item_count: f64,
    #[serde(serialize_with = "as_secs")]
    pub time_per_pass: Duration,
}

fn as_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Reduces one run's totals to averages. Zero passes is an explicit error,
/// never a division by zero.
pub fn aggregate(window_size: f64, totals: &SampleTotals) -> Result<RunResult> {
    if totals.passes == 0 {
        return Err(BenchError::NoSamples { window_size });
    }
    Ok(RunResult {
        duration: totals.duration,
        passes: totals.passes,
        avg_item_count: totals.items as f64 / totals.passes as f64,
        time_per_pass: totals.duration.div_f64(totals.passes as f64),
    })
}
