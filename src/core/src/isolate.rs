use common_exception::{BenchError, Result};
use tokio_postgres::Transaction;
use tracing::debug;

/// Drops every index in the test set other than `keep`, plus the
/// unconditional drop list, inside the caller's transaction.
///
/// No existence check is performed: a drop naming an absent index fails
/// the run for the index under test. The drops are transaction-local and
/// undone by the driver's rollback.
pub async fn isolate_index(
    txn: &Transaction<'_>, test_set: &[String], keep: &str, drop_always: &[String],
) -> Result<()> {
    let victims = test_set
        .iter()
        .filter(|index| index.as_str() != keep)
        .chain(drop_always);

    for index in victims {
        debug!(%index, "dropping index");
        let sql = format!("DROP INDEX {index}");
        txn.batch_execute(&sql)
            .await
            .map_err(|source| BenchError::schema(sql, source))?;
    }
    Ok(())
}
