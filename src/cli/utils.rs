use serde_json::{json, Value};

use crate::cli::OutputFormat;

/// Print a success message, merging `data` into the JSON envelope.
pub fn output_success(
    output_format: OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(Value::Object(fields)), Some(target)) = (data, response.as_object_mut()) {
                target.extend(fields);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Print `key  value` rows, or an object keyed by `title` in JSON mode.
pub fn output_fields(
    output_format: OutputFormat,
    title: &str,
    fields: &[(&str, String)],
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let object: serde_json::Map<String, Value> = fields
                .iter()
                .map(|(key, value)| (key.to_string(), json!(value)))
                .collect();
            println!("{}", serde_json::to_string_pretty(&json!({ title: object }))?);
        }
        OutputFormat::Text => {
            println!("{}", title);
            println!("{}", "-".repeat(40));
            let width = fields.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
            for (key, value) in fields {
                println!("{:<width$}  {}", key, value, width = width);
            }
        }
    }
    Ok(())
}
