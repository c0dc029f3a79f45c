//! Put command implementation.

use super::open_session;
use consus_client::ConnectOptions;
use serde::Serialize;

/// Result of writing one record.
#[derive(Debug, Serialize)]
pub struct PutResult {
    /// Table name.
    pub table: String,
    /// Record key.
    pub key: String,
    /// Size of the written value in bytes.
    pub bytes: usize,
    /// Transaction that committed the write.
    pub transaction: String,
}

/// Runs the put command.
pub fn run(
    connect: &ConnectOptions,
    table: &str,
    key: &str,
    value: &str,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = open_session(connect)?;
    let mut txn = session.begin_transaction()?;
    txn.put(table, key, value)?;
    txn.commit()?;
    let transaction = txn.id().to_string();
    drop(txn);
    session.close()?;

    let result = PutResult {
        table: table.to_string(),
        key: key.to_string(),
        bytes: value.len(),
        transaction,
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => println!(
            "Stored {} bytes at {}/{} ({})",
            result.bytes, result.table, result.key, result.transaction
        ),
    }

    Ok(())
}
