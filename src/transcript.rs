//! Transcript loading.
//!
//! Transcripts arrive either as a JSON array of turns (REST export) or as
//! newline-delimited JSON, one turn per line (session logs).

use std::path::Path;

use tracing::{trace, warn};

use crate::error::KickoffError;
use crate::model::Turn;

/// Parses transcript text. A leading `[` selects the JSON array form;
/// anything else is read as NDJSON.
pub fn parse_transcript(contents: &str) -> Result<Vec<Turn>, String> {
    if contents.trim_start().starts_with('[') {
        return serde_json::from_str::<Vec<Turn>>(contents)
            .map_err(|e| format!("Invalid transcript JSON: {}", e));
    }

    Ok(contents.lines().filter_map(parse_line).collect())
}

/// Parses one NDJSON line. Blank and malformed lines yield `None`.
fn parse_line(line: &str) -> Option<Turn> {
    if line.trim().is_empty() {
        return None;
    }

    trace!(json = line, "raw_json_line");

    match serde_json::from_str::<Turn>(line) {
        Ok(turn) => Some(turn),
        Err(e) => {
            // Distinguish "valid JSON, wrong shape" from garbage for the log
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(line) {
                if let Some(role) = json.get("role").and_then(|v| v.as_str()) {
                    warn!(role, error = %e, "Unsupported turn, skipping");
                } else {
                    warn!(?e, "Turn without role field, skipping");
                }
            } else {
                warn!(?e, "Malformed JSON line, skipping");
            }
            None
        }
    }
}

/// Reads and parses a transcript file.
pub fn load_transcript(path: &Path) -> Result<Vec<Turn>, KickoffError> {
    let contents = std::fs::read_to_string(path).map_err(|e| KickoffError::TranscriptRead {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    parse_transcript(&contents).map_err(|detail| KickoffError::TranscriptRead {
        path: path.to_path_buf(),
        detail,
    })
}
