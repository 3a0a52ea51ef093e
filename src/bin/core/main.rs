use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use gistbench::{
    ExperimentConfig, ExperimentReport, GeoBoundingBox, WindowOutcome, run_experiment,
};
use tikv_jemallocator::Jemalloc;
use tokio_postgres::NoTls;
use tracing::error;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

/// Speed tests for spatial indexes on a PostgreSQL/PostGIS table.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Name of the database table to test
    #[arg(short, long)]
    table: String,

    /// Geometry column probed by the bounding-box predicate
    #[arg(long, default_value = "way")]
    geometry_column: String,

    /// Region in which tests are performed, as "xmin,ymin,xmax,ymax"
    #[arg(short, long)]
    bbox: GeoBoundingBox,

    /// Indexes to test, each isolated in its own transaction
    #[arg(short, long, num_args = 1.., required = true)]
    indexes: Vec<String>,

    /// Indexes to (temporarily) drop during every run to avoid accidental
    /// usage
    #[arg(short = 'D', long = "drop", num_args = 1..)]
    drop_indexes: Vec<String>,

    /// Where selector appended to the benchmark query verbatim, e.g.
    /// "tags @> 'amenity=>restaurant'"
    #[arg(short = 'w', long = "where")]
    filter: Option<String>,

    /// Window edge lengths to sweep, in projected units
    #[arg(short = 's', long = "sizes", value_delimiter = ',', default_values_t = gistbench::DEFAULT_WINDOW_SIZES)]
    window_sizes: Vec<f64>,

    /// Seconds of sampling per (index, window size) pair
    #[arg(long, default_value = "5", value_parser = parse_budget)]
    budget: Duration,

    /// Host for the database
    #[arg(short = 'H', long, default_value = "localhost")]
    host: String,

    /// Name of the database (default: user name)
    #[arg(short, long)]
    database: Option<String>,

    /// User for the database (default: $USER)
    #[arg(short, long)]
    user: Option<String>,

    /// Password for the database
    #[arg(short, long)]
    password: Option<String>,

    /// Print the report as JSON instead of text
    #[arg(long)]
    json: bool,
}

fn parse_budget(value: &str) -> Result<Duration, String> {
    let secs: f64 = value.parse().map_err(|_| "not a number".to_owned())?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err("budget must be a positive number of seconds".to_owned());
    }
    Ok(Duration::from_secs_f64(secs))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = common_telemetry::init_logging();
    let args = Args::parse();

    let user = args
        .user
        .clone()
        .or_else(|| std::env::var("USER").ok())
        .context("no --user given and $USER is unset")?;
    let database = args.database.clone().unwrap_or_else(|| user.clone());

    let mut pg_config = tokio_postgres::Config::new();
    pg_config.host(&args.host).user(&user).dbname(&database);
    if let Some(password) = &args.password {
        pg_config.password(password);
    }
    let (mut client, connection) = pg_config
        .connect(NoTls)
        .await
        .with_context(|| format!("failed to connect to {database} on {}", args.host))?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("connection error: {e}");
        }
    });

    let mut config = ExperimentConfig::new(args.table, args.bbox, args.indexes)
        .with_filter(args.filter)
        .with_drop_indexes(args.drop_indexes)
        .with_window_sizes(args.window_sizes)
        .with_sample_budget(args.budget);
    config.geometry_column = args.geometry_column;

    let report = run_experiment(&mut client, &config).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report_json(&report))?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &ExperimentReport) {
    for run in &report.indexes {
        println!("* {}", run.index);
        match &run.outcome {
            Ok(windows) => {
                for window in windows {
                    println!("  size {}:", window.window_size);
                    match &window.outcome {
                        WindowOutcome::Complete(result) => {
                            println!("    duration: {:.4}s", result.duration.as_secs_f64());
                            println!("    passes: {}", result.passes);
                            println!("    avg_item_count: {:.2}", result.avg_item_count);
                            println!(
                                "    time_per_pass: {:.4}ms",
                                result.time_per_pass.as_secs_f64() * 1e3
                            );
                        }
                        WindowOutcome::NoSamples => println!("    no samples collected"),
                    }
                }
            }
            Err(error) => println!("  failed: {error}"),
        }
    }
}

fn report_json(report: &ExperimentReport) -> serde_json::Value {
    let indexes = report
        .indexes
        .iter()
        .map(|run| {
            let outcome = match &run.outcome {
                Ok(windows) => serde_json::json!({
                    "windows": windows
                        .iter()
                        .map(|window| {
                            let result = match &window.outcome {
                                WindowOutcome::Complete(result) => {
                                    serde_json::to_value(result).unwrap_or_default()
                                }
                                WindowOutcome::NoSamples => serde_json::Value::Null,
                            };
                            serde_json::json!({
                                "window_size": window.window_size,
                                "result": result,
                            })
                        })
                        .collect::<Vec<_>>(),
                }),
                Err(error) => serde_json::json!({ "error": error.to_string() }),
            };
            serde_json::json!({ "index": run.index, "outcome": outcome })
        })
        .collect::<Vec<_>>();

    serde_json::json!({
        "started_at": report.started_at.to_rfc3339(),
        "indexes": indexes,
    })
}
