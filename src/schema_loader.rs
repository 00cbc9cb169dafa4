//! Shared JSON Schema loader with version enforcement.
//!
//! The schema's `schema_version` const names the document version it
//! validates; callers can restrict which versions they accept before the
//! validator is compiled.

use anyhow::{Context, Result, anyhow, bail};
use jsonschema::JSONSchema;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

const SCHEMA_VERSION_POINTER: &str = "/properties/schema_version/const";

/// Result of loading and compiling a JSON Schema.
pub(crate) struct SchemaLoadResult {
    pub schema_version: String,
    pub compiled: JSONSchema,
}

pub(crate) fn load_json_schema(
    path: &Path,
    allowed_versions: Option<&BTreeSet<String>>,
) -> Result<SchemaLoadResult> {
    let file = File::open(path).with_context(|| format!("opening schema {}", path.display()))?;
    let schema_value: Value = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing schema {}", path.display()))?;

    let schema_version = extract_schema_version(&schema_value)
        .ok_or_else(|| anyhow!("schema {} missing schema_version const", path.display()))?;

    if let Some(allowed) = allowed_versions {
        if !allowed.contains(&schema_version) {
            bail!(
                "schema_version '{}' not in allowed set {:?}",
                schema_version,
                allowed
            );
        }
    }

    let compiled = JSONSchema::compile(&schema_value)
        .map_err(|err| anyhow!("compiling schema {}: {err}", path.display()))?;

    Ok(SchemaLoadResult {
        schema_version,
        compiled,
    })
}

/// Validate `instance` and collect every violation into one message.
pub(crate) fn validate_instance(schema: &JSONSchema, instance: &Value) -> Result<(), String> {
    schema.validate(instance).map_err(|errors| {
        errors
            .map(|err| format!("{} (at {})", err, err.instance_path))
            .collect::<Vec<_>>()
            .join("\n")
    })
}

fn extract_schema_version(schema: &Value) -> Option<String> {
    let version = schema
        .pointer(SCHEMA_VERSION_POINTER)
        .and_then(Value::as_str)?;
    if is_identifier(version) {
        Some(version.to_string())
    } else {
        None
    }
}

/// True when `value` is non-empty and matches `^[A-Za-z0-9_.-]+$`.
pub(crate) fn is_identifier(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}
