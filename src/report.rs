//! Final result rendering: a success line in text mode, one JSON object in json mode.

use serde_json::{json, Value};

use crate::config::OutputFormat;
use crate::error::AclError;
use crate::orchestrator::Outcome;

pub fn outcome_json(outcome: &Outcome) -> Value {
    json!({
        "status": "ok",
        "kind": outcome.kind,
        "target": outcome.target,
        "command": outcome.command(),
        "summary": outcome.summary(),
        "detail": outcome.detail,
    })
}

pub fn error_json(err: &AclError) -> Value {
    json!({ "status": "error", "error": err })
}

/// Text for stdout on success.
pub fn render_outcome(format: OutputFormat, outcome: &Outcome) -> String {
    match format {
        OutputFormat::Text => outcome.summary(),
        OutputFormat::Json => outcome_json(outcome).to_string(),
    }
}

/// Text for a failure. In text mode this goes to stderr; in json mode to stdout.
pub fn render_error(format: OutputFormat, err: &AclError) -> String {
    match format {
        OutputFormat::Text => format!("{} failed: {}", err.code_str(), err.message()),
        OutputFormat::Json => error_json(err).to_string(),
    }
}
