use std::str::FromStr;
use std::time::Duration;

use common_exception::{BenchError, Result};

/// Window edge lengths swept when none are configured, in units of the
/// query coordinate space.
pub const DEFAULT_WINDOW_SIZES: [f64; 4] = [1024.0, 4096.0, 16384.0, 65536.0];

const DEFAULT_SOURCE_SRID: i32 = 4326;
const DEFAULT_TARGET_SRID: i32 = 900_913;
const DEFAULT_SAMPLE_BUDGET: Duration = Duration::from_secs(5);

/// Geographic rectangle in the source coordinate reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBoundingBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl GeoBoundingBox {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Result<Self> {
        let bbox = Self {
            xmin,
            ymin,
            xmax,
            ymax,
        };
        bbox.check()?;
        Ok(bbox)
    }

    fn check(&self) -> Result<()> {
        let finite = [self.xmin, self.ymin, self.xmax, self.ymax]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(BenchError::Config(
                "bounding box coordinates must be finite numbers".to_owned(),
            ));
        }
        if self.xmin >= self.xmax || self.ymin >= self.ymax {
            return Err(BenchError::Config(format!(
                "bounding box {},{},{},{} is degenerate (xmin<xmax and ymin<ymax required)",
                self.xmin, self.ymin, self.xmax, self.ymax
            )));
        }
        Ok(())
    }
}

impl FromStr for GeoBoundingBox {
    type Err = BenchError;

    /// Parses the `"xmin,ymin,xmax,ymax"` form used on the command line.
    fn from_str(s: &str) -> Result<Self> {
        let parts = s.split(',').map(str::trim).collect::<Vec<_>>();
        let [xmin, ymin, xmax, ymax] = parts.as_slice() else {
            return Err(BenchError::Config(format!(
                "bounding box {s:?} must have exactly 4 comma-separated values"
            )));
        };
        let parse = |v: &str| {
            v.parse::<f64>()
                .map_err(|_| BenchError::Config(format!("bounding box value {v:?} is not a number")))
        };
        Self::new(parse(xmin)?, parse(ymin)?, parse(xmax)?, parse(ymax)?)
    }
}

/// Immutable description of one experiment run.
#[derive(Debug, Clone)]
pub struct ExperimentConfig {
    /// Table holding the geometries under test.
    pub table: String,
    /// Geometry column probed by the bounding-box predicate.
    pub geometry_column: String,
    /// Operator-supplied WHERE fragment, appended to the benchmark query
    /// verbatim. Not sanitized; it comes from a trusted command-line flag,
    /// never from untrusted input.
    pub filter: Option<String>,
    /// Survey area in the source coordinate reference.
    pub bounding_box: GeoBoundingBox,
    /// Indexes to benchmark, one transaction each.
    pub indexes: Vec<String>,
    /// Indexes dropped during every run so the planner can never pick them.
    pub drop_indexes: Vec<String>,
    /// Window edge lengths to sweep, in query-space linear units.
    pub window_sizes: Vec<f64>,
    /// Spatial reference of `bounding_box`.
    pub source_srid: i32,
    /// Spatial reference the table's geometries are stored in.
    pub target_srid: i32,
    /// Wall-clock sampling budget per (index, window size) pair.
    pub sample_budget: Duration,
}

impl ExperimentConfig {
    pub fn new(
        table: impl Into<String>, bounding_box: GeoBoundingBox, indexes: Vec<String>,
    ) -> Self {
        Self {
            table: table.into(),
            geometry_column: "way".to_owned(),
            filter: None,
            bounding_box,
            indexes,
            drop_indexes: Vec::new(),
            window_sizes: DEFAULT_WINDOW_SIZES.to_vec(),
            source_srid: DEFAULT_SOURCE_SRID,
            target_srid: DEFAULT_TARGET_SRID,
            sample_budget: DEFAULT_SAMPLE_BUDGET,
        }
    }

    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_drop_indexes(mut self, drop_indexes: Vec<String>) -> Self {
        self.drop_indexes = drop_indexes;
        self
    }

    pub fn with_window_sizes(mut self, window_sizes: Vec<f64>) -> Self {
        self.window_sizes = window_sizes;
        self
    }

    pub fn with_sample_budget(mut self, sample_budget: Duration) -> Self {
        self.sample_budget = sample_budget;
        self
    }

    /// Rejects inconsistent configurations before any database work starts.
    pub fn validate(&self) -> Result<()> {
        if self.table.is_empty() {
            return Err(BenchError::Config("table name must not be empty".to_owned()));
        }
        if self.geometry_column.is_empty() {
            return Err(BenchError::Config(
                "geometry column must not be empty".to_owned(),
            ));
        }
        self.bounding_box.check()?;
        if self.indexes.is_empty() {
            return Err(BenchError::Config(
                "at least one index to test is required".to_owned(),
            ));
        }
        if self.window_sizes.is_empty() {
            return Err(BenchError::Config(
                "at least one window size is required".to_owned(),
            ));
        }
        if let Some(size) = self
            .window_sizes
            .iter()
            .find(|size| !size.is_finite() || **size <= 0.0)
        {
            return Err(BenchError::Config(format!(
                "window size {size} must be a positive number"
            )));
        }
        if self.sample_budget.is_zero() {
            return Err(BenchError::Config(
                "sample budget must be positive".to_owned(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ExperimentConfig {
        let bbox = GeoBoundingBox::new(0.0, 0.0, 1000.0, 1000.0).unwrap();
        ExperimentConfig::new("planet_osm_polygon", bbox, vec![
            "idx_a".to_owned(),
            "idx_b".to_owned(),
        ])
    }

    #[test]
    fn parses_bbox_from_cli_form() {
        let bbox: GeoBoundingBox = "0,0,1000,1000".parse().unwrap();
        assert_eq!(bbox, GeoBoundingBox::new(0.0, 0.0, 1000.0, 1000.0).unwrap());

        let bbox: GeoBoundingBox = " -8.7, 49.8, 1.8, 60.9 ".parse().unwrap();
        assert_eq!(bbox.xmin, -8.7);
        assert_eq!(bbox.ymax, 60.9);
    }

    #[test]
    fn rejects_malformed_bbox_strings() {
        assert!("0,0,1000".parse::<GeoBoundingBox>().is_err());
        assert!("0,0,1000,1000,5".parse::<GeoBoundingBox>().is_err());
        assert!("0,zero,1000,1000".parse::<GeoBoundingBox>().is_err());
    }

    #[test]
    fn rejects_degenerate_bbox() {
        assert!(GeoBoundingBox::new(1000.0, 0.0, 0.0, 1000.0).is_err());
        assert!(GeoBoundingBox::new(0.0, 5.0, 1000.0, 5.0).is_err());
        assert!(GeoBoundingBox::new(0.0, f64::NAN, 1000.0, 1000.0).is_err());
    }

    #[test]
    fn default_sweep_matches_expected_sizes() {
        let config = test_config();
        assert_eq!(config.window_sizes, vec![1024.0, 4096.0, 16384.0, 65536.0]);
        assert_eq!(config.sample_budget, Duration::from_secs(5));
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_empty_index_list() {
        let mut config = test_config();
        config.indexes.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_non_positive_window_sizes() {
        let config = test_config().with_window_sizes(vec![1024.0, 0.0]);
        assert!(config.validate().is_err());

        let config = test_config().with_window_sizes(vec![-16.0]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_budget() {
        let config = test_config().with_sample_budget(Duration::ZERO);
        assert!(config.validate().is_err());
    }
}
