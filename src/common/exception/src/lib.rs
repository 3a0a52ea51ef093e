use thiserror::Error;

pub type Result<T, E = BenchError> = std::result::Result<T, E>;

/// Failure taxonomy of the benchmark harness.
///
/// `Config` aborts the whole run before any database work. The other kinds
/// are fatal to one index's test only: the driver rolls the transaction
/// back and moves on to the next index.
#[derive(Debug, Error)]
pub enum BenchError {
    /// Malformed or inconsistent experiment configuration.
    #[error("invalid experiment configuration: {0}")]
    Config(String),

    /// An index drop or plan capture failed inside the test transaction.
    #[error("schema operation failed ({context})")]
    Schema {
        context: String,
        #[source]
        source: tokio_postgres::Error,
    },

    /// A benchmark query, envelope query, or transaction control statement
    /// failed.
    #[error("query execution failed")]
    Query(#[from] tokio_postgres::Error),

    /// The sampling budget elapsed before a single pass completed.
    #[error("no samples collected for window size {window_size}")]
    NoSamples { window_size: f64 },
}

impl BenchError {
    pub fn schema(context: impl Into<String>, source: tokio_postgres::Error) -> Self {
        Self::Schema {
            context: context.into(),
            source,
        }
    }
}
