use std::time::{Duration, Instant};

use async_trait::async_trait;
use common_exception::Result;
use tokio_postgres::{Statement, Transaction};
use tracing::trace;

use crate::config::ExperimentConfig;
use crate::region::WorkingRegion;

/// One rectangular query window, centered on a sampled point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Window {
    /// Window of edge length `size` centered at `(x, y)`.
    pub fn centered(x: f64, y: f64, size: f64) -> Self {
        let radius = size / 2.0;
        Self {
            xmin: x - radius,
            ymin: y - radius,
            xmax: x + radius,
            ymax: y + radius,
        }
    }
}

/// One executed pass: wall-clock time of the call and the count it
/// returned. Folded into [`SampleTotals`] immediately, never retained.
#[derive(Debug, Clone, Copy)]
pub struct Sample {
    pub elapsed: Duration,
    pub items: i64,
}

/// Running totals over all passes of one (index, window size) run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SampleTotals {
    pub passes: u64,
    pub items: i64,
    pub duration: Duration,
}

impl SampleTotals {
    fn record(&mut self, sample: Sample) {
        self.passes += 1;
        self.items += sample.items;
    }
}

/// The count query issued once per pass.
#[async_trait]
pub trait WindowQuery {
    async fn count(&self, window: &Window) -> Result<i64>;
}

/// Builds the benchmark query. The window coordinates are the only bound
/// parameters; the filter fragment is operator-supplied and appended
/// verbatim.
pub fn count_query_sql(config: &ExperimentConfig) -> String {
    let mut sql = format!(
        "SELECT count(*) FROM {} WHERE {} && ST_SetSRID(ST_MakeBox2D(ST_MakePoint($1, $2), \
         ST_MakePoint($3, $4)), {})",
        config.table, config.geometry_column, config.target_srid
    );
    if let Some(filter) = &config.filter {
        sql.push_str(&format!(" AND ({filter})"));
    }
    sql
}

/// The benchmark statement, prepared once per index under test and reused
/// across every window size.
pub struct PreparedCountQuery<'a> {
    txn: &'a Transaction<'a>,
    stmt: Statement,
}

impl<'a> PreparedCountQuery<'a> {
    pub async fn prepare(txn: &'a Transaction<'a>, count_sql: &str) -> Result<Self> {
        let stmt = txn.prepare(count_sql).await?;
        Ok(Self { txn, stmt })
    }
}

#[async_trait]
impl WindowQuery for PreparedCountQuery<'_> {
    async fn count(&self, window: &Window) -> Result<i64> {
        let row = self
            .txn
            .query_one(&self.stmt, &[
                &window.xmin,
                &window.ymin,
                &window.xmax,
                &window.ymax,
            ])
            .await?;
        Ok(row.try_get(0)?)
    }
}

/// Repeatedly probes random windows of `window_size` until `budget`
/// elapses.
///
/// The budget is a polling check, not a preemptive timer: the loop always
/// finishes its current query, so the run may overrun by one query's
/// latency. At least one pass executes when the budget is positive; a zero
/// budget yields zero passes. Any query failure aborts the loop and
/// discards its partial totals.
pub async fn sample_windows(
    query: &dyn WindowQuery, region: &WorkingRegion, window_size: f64, budget: Duration,
) -> Result<SampleTotals> {
    let mut rng = rand::rng();
    let mut totals = SampleTotals::default();
    let started = Instant::now();

    while started.elapsed() < budget || (totals.passes == 0 && budget > Duration::ZERO) {
        let (x, y) = region.random_point(&mut rng);
        let window = Window::centered(x, y, window_size);

        let pass_started = Instant::now();
        let items = query.count(&window).await?;
        let sample = Sample {
            elapsed: pass_started.elapsed(),
            items,
        };
        trace!(
            pass = totals.passes + 1,
            items,
            elapsed_us = sample.elapsed.as_micros() as u64,
            "sampled window"
        );
        totals.record(sample);
    }

    totals.duration = started.elapsed();
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use common_exception::BenchError;

    use super::*;

    /// Records every probed window and returns canned counts.
    struct RecordingQuery {
        windows: Mutex<Vec<Window>>,
        count: i64,
        fail: bool,
    }

    impl RecordingQuery {
        fn returning(count: i64) -> Self {
            Self {
                windows: Mutex::new(Vec::new()),
                count,
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                windows: Mutex::new(Vec::new()),
                count: 0,
                fail: true,
            }
        }
    }

    #[async_trait]
    impl WindowQuery for RecordingQuery {
        async fn count(&self, window: &Window) -> Result<i64> {
            if self.fail {
                return Err(BenchError::Config("probe failed".to_owned()));
            }
            self.windows.lock().unwrap().push(*window);
            Ok(self.count)
        }
    }

    fn region() -> WorkingRegion {
        WorkingRegion {
            xmin: 0.0,
            ymin: 0.0,
            xmax: 1000.0,
            ymax: 1000.0,
        }
    }

    #[test]
    fn centered_window_extends_by_half_the_size() {
        let window = Window::centered(100.0, 200.0, 50.0);
        assert_eq!(window, Window {
            xmin: 75.0,
            ymin: 175.0,
            xmax: 125.0,
            ymax: 225.0,
        });
    }

    #[tokio::test]
    async fn positive_budget_runs_at_least_one_pass() {
        let query = RecordingQuery::returning(7);
        let totals = sample_windows(&query, &region(), 64.0, Duration::from_nanos(1))
            .await
            .unwrap();
        assert!(totals.passes >= 1);
        assert_eq!(totals.items, totals.passes as i64 * 7);
        assert!(totals.duration > Duration::ZERO);
    }

    #[tokio::test]
    async fn zero_budget_runs_no_passes() {
        let query = RecordingQuery::returning(7);
        let totals = sample_windows(&query, &region(), 64.0, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(totals.passes, 0);
        assert_eq!(totals.items, 0);
    }

    #[tokio::test]
    async fn windows_stay_within_the_buffered_bounds() {
        let query = RecordingQuery::returning(0);
        let region = region();
        let size = 128.0;
        let totals = sample_windows(&query, &region, size, Duration::from_millis(5))
            .await
            .unwrap();

        let windows = query.windows.lock().unwrap();
        assert_eq!(windows.len() as u64, totals.passes);
        let radius = size / 2.0;
        for window in &*windows {
            assert!(window.xmin >= region.xmin - radius);
            assert!(window.ymin >= region.ymin - radius);
            assert!(window.xmax <= region.xmax + radius);
            assert!(window.ymax <= region.ymax + radius);
            assert!((window.xmax - window.xmin - size).abs() < 1e-9);
            assert!((window.ymax - window.ymin - size).abs() < 1e-9);
        }
    }

    #[tokio::test]
    async fn query_failure_aborts_the_loop() {
        let query = RecordingQuery::failing();
        let result = sample_windows(&query, &region(), 64.0, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(BenchError::Config(_))));
    }

    #[test]
    fn filter_fragment_is_appended_verbatim() {
        use crate::config::{ExperimentConfig, GeoBoundingBox};

        let bbox = GeoBoundingBox::new(0.0, 0.0, 10.0, 10.0).unwrap();
        let config = ExperimentConfig::new("roads", bbox, vec!["idx".to_owned()]);
        assert_eq!(
            count_query_sql(&config),
            "SELECT count(*) FROM roads WHERE way && \
             ST_SetSRID(ST_MakeBox2D(ST_MakePoint($1, $2), ST_MakePoint($3, $4)), 900913)"
        );

        let config = config.with_filter(Some("tags @> 'amenity=>restaurant'".to_owned()));
        assert_eq!(
            count_query_sql(&config),
            "SELECT count(*) FROM roads WHERE way && \
             ST_SetSRID(ST_MakeBox2D(ST_MakePoint($1, $2), ST_MakePoint($3, $4)), 900913) AND \
             (tags @> 'amenity=>restaurant')"
        );
    }
}
