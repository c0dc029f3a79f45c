//! Get command implementation.

use super::{display_bytes, open_session};
use consus_client::ConnectOptions;
use serde::Serialize;

/// Result of reading one record.
#[derive(Debug, Serialize)]
pub struct GetResult {
    /// Table name.
    pub table: String,
    /// Record key.
    pub key: String,
    /// Whether the record exists.
    pub found: bool,
    /// Record value, if found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl GetResult {
    fn render_text(&self) -> String {
        match &self.value {
            Some(value) => value.clone(),
            None => format!("{}/{}: not found", self.table, self.key),
        }
    }
}

/// Runs the get command.
///
/// The read runs in its own transaction, which is aborted afterwards since
/// it wrote nothing.
pub fn run(
    connect: &ConnectOptions,
    table: &str,
    key: &str,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = open_session(connect)?;
    let mut txn = session.begin_transaction()?;
    let value = txn.get(table, key)?;
    txn.abort()?;
    session.close()?;

    let result = GetResult {
        table: table.to_string(),
        key: key.to_string(),
        found: value.is_some(),
        value: value.as_deref().map(display_bytes),
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => println!("{}", result.render_text()),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_record_json_omits_value() {
        let result = GetResult {
            table: "users".into(),
            key: "alice".into(),
            found: false,
            value: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["found"], false);
        assert!(json.get("value").is_none());
        assert_eq!(result.render_text(), "users/alice: not found");
    }

    #[test]
    fn found_record_prints_value() {
        let result = GetResult {
            table: "users".into(),
            key: "alice".into(),
            found: true,
            value: Some("admin".into()),
        };
        assert_eq!(result.render_text(), "admin");
    }
}
