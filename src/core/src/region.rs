use common_exception::{BenchError, Result};
use rand::Rng;
use tokio_postgres::Transaction;
use tracing::debug;

use crate::config::ExperimentConfig;

/// Envelope of the configured survey area, projected to the target
/// reference and contracted by the window radius. The buffer radius is
/// negated so a window centered on any point sampled from the region stays
/// inside the survey area.
const BUFFERED_ENVELOPE_SQL: &str = "SELECT ST_XMin(bbox), ST_YMin(bbox), ST_XMax(bbox), \
     ST_YMax(bbox) FROM (SELECT ST_Buffer(ST_Transform(ST_SetSRID(ST_MakeBox2D(ST_MakePoint($1, \
     $2), ST_MakePoint($3, $4)), $5), $6), $7) AS bbox OFFSET 0) AS envelope";

/// Sampling domain for window centers, in the query's spatial reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkingRegion {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl WorkingRegion {
    /// Draws a uniform random window center inside the region.
    pub fn random_point<R: Rng + ?Sized>(&self, rng: &mut R) -> (f64, f64) {
        let x = rng.random_range(self.xmin..self.xmax);
        let y = rng.random_range(self.ymin..self.ymax);
        (x, y)
    }
}

/// Computes the working region for one window size. `radius` is half the
/// window edge length.
pub async fn resolve_region(
    txn: &Transaction<'_>, config: &ExperimentConfig, radius: f64,
) -> Result<WorkingRegion> {
    let bbox = &config.bounding_box;
    let row = txn
        .query_one(BUFFERED_ENVELOPE_SQL, &[
            &bbox.xmin,
            &bbox.ymin,
            &bbox.xmax,
            &bbox.ymax,
            &config.source_srid,
            &config.target_srid,
            &(-radius),
        ])
        .await?;

    let region = WorkingRegion {
        xmin: row.try_get(0)?,
        ymin: row.try_get(1)?,
        xmax: row.try_get(2)?,
        ymax: row.try_get(3)?,
    };
    if region.xmin >= region.xmax || region.ymin >= region.ymax {
        return Err(BenchError::Config(format!(
            "survey area is too small for windows of size {}",
            radius * 2.0
        )));
    }
    debug!(
        xmin = region.xmin,
        ymin = region.ymin,
        xmax = region.xmax,
        ymax = region.ymax,
        "resolved working region"
    );
    Ok(region)
}
