//! JSON Schema validation for serialized results records.
//!
//! The schema is embedded at compile time from
//! `schemas/election-results.json` and checked (draft 7) against the
//! canonical JSON of every record before it is handed to the repository.
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use election_results::validation::validate_results_record;
//!
//! let record = json!({ "sections": {}, "candidates": [] });
//! assert!(validate_results_record(&record).is_ok());
//! ```

use once_cell::sync::Lazy;
use serde_json::Value;

static RESULTS_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/election-results.json"))
        .expect("Invalid embedded schema")
});

/// Validate a JSON value against a JSON schema.
///
/// # Returns
/// * `Ok(())` when valid
/// * `Err(Vec<String>)` with one message per violation
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema)
        .map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Quick check, no error details.
pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

/// Validate against the embedded results record schema.
pub fn validate_results_record(data: &Value) -> Result<(), Vec<String>> {
    validate(&RESULTS_SCHEMA, data)
}

pub fn is_valid_results_record(data: &Value) -> bool {
    is_valid(&RESULTS_SCHEMA, data)
}
