use common_exception::{BenchError, Result};
use tokio_postgres::Transaction;

/// Captures the execution plan of the benchmark query, as text lines.
///
/// Runs after isolation so the reported plan matches what sampling will
/// execute. The window parameters are degenerate (all zero); the plan does
/// not depend on their values.
pub async fn capture_plan(txn: &Transaction<'_>, count_sql: &str) -> Result<Vec<String>> {
    let explain_sql = format!("EXPLAIN {count_sql}");
    let zero = 0.0f64;
    let rows = txn
        .query(explain_sql.as_str(), &[&zero, &zero, &zero, &zero])
        .await
        .map_err(|source| BenchError::schema(explain_sql, source))?;

    let mut lines = Vec::with_capacity(rows.len());
    for row in &rows {
        lines.push(row.try_get(0)?);
    }
    Ok(lines)
}
