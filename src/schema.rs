use std::{fs, path::Path};

use anyhow::Result;
use junction_worker::TransportMessage;
use schemars::schema_for;

use crate::{config::WorkerOptions, message::ApiMessage};

/// Write the JSON schemas of the public message and option types to `out_dir`.
/// Returns the files written.
pub fn write_schema(out_dir: &Path) -> Result<Vec<String>> {
    fs::create_dir_all(out_dir)?;

    let schemas = [
        ("api-message.schema.json", schema_for!(ApiMessage)),
        ("transport-message.schema.json", schema_for!(TransportMessage)),
        ("worker-options.schema.json", schema_for!(WorkerOptions)),
    ];

    let mut written = Vec::with_capacity(schemas.len());
    for (file, schema) in schemas {
        fs::write(out_dir.join(file), serde_json::to_string_pretty(&schema)?)?;
        written.push(file.to_string());
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tempfile::TempDir;

    #[test]
    fn writes_api_message_schema() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("schemas");
        let files = write_schema(&out).unwrap();
        assert_eq!(files.len(), 3);

        let text = fs::read_to_string(out.join("api-message.schema.json")).unwrap();
        let schema: Value = serde_json::from_str(&text).unwrap();
        let props = schema["properties"].as_object().unwrap();
        for field in ["to", "from", "content", "channel_data", "reply_to"] {
            assert!(props.contains_key(field), "missing {field}");
        }
    }
}
