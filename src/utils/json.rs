// Helpers for pulling structured JSON out of free-form agent replies

use crate::types::{AppError, AppResult};
use serde::de::DeserializeOwned;

/// Returns the JSON candidate inside a reply: the first ```json fenced block,
/// else the first plain fenced block, else the trimmed reply.
pub fn extract_json_block(response: &str) -> &str {
    if response.contains("```json") {
        response
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .unwrap_or(response)
            .trim()
    } else if response.contains("```") {
        response.split("```").nth(1).unwrap_or(response).trim()
    } else {
        response.trim()
    }
}

/// Parses an agent reply as JSON of type `T`.
pub fn parse_agent_json<T: DeserializeOwned>(response: &str) -> AppResult<T> {
    serde_json::from_str(extract_json_block(response))
        .map_err(|e| AppError::ResponseFormat(format!("agent reply is not the expected JSON: {}", e)))
}
