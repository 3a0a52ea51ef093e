mod config;
mod driver;
mod isolate;
mod plan;
mod region;
mod sampling;
mod stats;

pub use config::{DEFAULT_WINDOW_SIZES, ExperimentConfig, GeoBoundingBox};
pub use driver::{ExperimentReport, IndexRun, WindowOutcome, WindowRun, run_experiment};
pub use region::WorkingRegion;
pub use sampling::{PreparedCountQuery, Sample, SampleTotals, Window, WindowQuery, count_query_sql};
pub use stats::RunResult;
