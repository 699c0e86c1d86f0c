//! Validation gate
//!
//! A pure function of (schema or absence, candidate bytes) to the decoded
//! candidate. With a schema every violated rule is reported at once; without
//! one the candidate only has to be well-formed JSON.

use crate::error::{StoreError, StoreResult};
use jsonschema::JSONSchema;
use serde_json::Value;

/// Decode `bytes` as JSON, reporting syntax errors as validation failures
pub fn parse_json(bytes: &[u8]) -> StoreResult<Value> {
    serde_json::from_slice(bytes)
        .map_err(|e| StoreError::Validation(vec![format!("document is not valid JSON: {}", e)]))
}

/// Check that `bytes` hold a JSON Schema that compiles.
///
/// Used before a schema record is stored so a broken schema never locks a
/// namespace against writes.
pub fn compile_schema(bytes: &[u8]) -> StoreResult<JSONSchema> {
    let schema = parse_json(bytes)?;
    build_schema(&schema).map_err(|reason| StoreError::Validation(vec![reason]))
}

fn build_schema(schema: &Value) -> Result<JSONSchema, String> {
    JSONSchema::compile(schema).map_err(|e| format!("invalid JSON schema: {}", e))
}

/// Run the gate over `candidate`.
///
/// Returns the decoded candidate on success, or `Validation` carrying every
/// schema violation. A stored schema that does not compile is a
/// `StoredSchema` fault, not the caller's.
pub fn validate_document(schema: Option<&[u8]>, candidate: &[u8]) -> StoreResult<Value> {
    let document = parse_json(candidate)?;

    let Some(schema) = schema else {
        return Ok(document);
    };

    let compiled = serde_json::from_slice::<Value>(schema)
        .map_err(|e| format!("not valid JSON: {}", e))
        .and_then(|schema| build_schema(&schema))
        .map_err(StoreError::StoredSchema)?;
    let violations: Vec<String> = match compiled.validate(&document) {
        Ok(()) => Vec::new(),
        Err(errors) => errors.map(|error| describe(&error)).collect(),
    };

    if violations.is_empty() {
        Ok(document)
    } else {
        tracing::debug!(violations = violations.len(), "document rejected by schema");
        Err(StoreError::Validation(violations))
    }
}

fn describe(error: &jsonschema::ValidationError<'_>) -> String {
    let path = error.instance_path.to_string();
    if path.is_empty() {
        format!("(root): {}", error)
    } else {
        format!("{}: {}", path, error)
    }
}
