//! Check command implementation.

use super::open_session;
use consus_client::ConnectOptions;
use std::time::Instant;

/// Runs the check command.
///
/// Begins and aborts one transaction against the configured endpoints.
pub fn run(connect: &ConnectOptions) -> Result<(), Box<dyn std::error::Error>> {
    let session = open_session(connect)?;
    let endpoints = consus_client::join(session.endpoints());

    let started = Instant::now();
    let mut txn = session.begin_transaction()?;
    let txid = txn.id();
    txn.abort()?;
    let elapsed = started.elapsed();
    session.close()?;

    println!("Store at {endpoints} is up");
    println!("  transaction: {txid}");
    println!("  round trip:  {:.2?}", elapsed);

    Ok(())
}
