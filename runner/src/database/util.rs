use super::ConnectionError;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use rusqlite::{Connection, Params};
use tracing::{debug, error};

/// `insert into <table> (<columns>) values (?, ...), ...` for `rows` rows
pub fn insert_sql(table: &str, columns: &[&str], rows: usize) -> String {
    let row = format!("({})", columns.iter().map(|_| "?").join(", "));

    format!(
        "insert into {table} ({}) values {}",
        columns.join(", "),
        std::iter::repeat(row.as_str()).take(rows).join(", ")
    )
}

/// execute DDL statements one by one, reporting which one failed
pub fn apply_schema(connection: &Connection, statements: &[&str]) -> Result<(), ConnectionError> {
    let total = statements.len();

    for (counter, statement) in statements.iter().enumerate() {
        match connection.execute(statement, []) {
            Ok(_) => debug!("Applied SQL schema ({}/{total})", counter + 1),
            Err(error) => {
                error!(error = ?error, statement = statement, "Failed to apply SQL schema ({}/{total}): {error}", counter + 1);

                return Err(error.into());
            }
        }
    }

    Ok(())
}

/// run a query whose first column is the document id
pub fn document_ids<P: Params>(
    connection: &Connection,
    query: &str,
    params: P,
) -> Result<Vec<String>, ConnectionError> {
    connection
        .prepare_cached(query)?
        .query_map(params, |row| row.get(0))?
        .try_fold(Vec::new(), |mut init, result| {
            init.push(result?);

            Ok::<Vec<String>, ConnectionError>(init)
        })
}

pub fn epoch_millis(timestamp: &DateTime<Utc>) -> i64 {
    timestamp.timestamp_millis()
}
