//! Classification of assistant free text: final-answer extraction and
//! text-form action parsing.
//!
//! Text-form actions are the fallback for backends without native tool
//! support. The grammar is `Action: name(key=value, key2="value")`; each
//! value is tried as a JSON literal first (numbers, booleans, quoted
//! strings), falling back to the raw trimmed string. No match means no
//! action this turn.

use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

/// Marker that signals the model's terminal output.
pub const FINAL_ANSWER_MARKER: &str = "Final Answer:";

/// Extract the final answer text if the marker is present.
///
/// Takes everything after the last occurrence of the marker, so a model that
/// narrates the format before using it still terminates cleanly.
pub fn extract_final_answer(text: &str) -> Option<String> {
    text.rsplit_once(FINAL_ANSWER_MARKER)
        .map(|(_, after)| after.trim().to_string())
}

/// Parse a text-form `Action: name(args)` invocation out of assistant text.
///
/// Returns the tool name and its arguments as a JSON object. Malformed
/// action text (including an unterminated `Action: foo(`) parses as `None`.
pub fn parse_action(text: &str) -> Option<(String, Value)> {
    let action_re = match Regex::new(r"Action:\s*(\w+)\((.*)\)") {
        Ok(re) => re,
        Err(e) => {
            warn!(error = %e, "Action pattern failed to compile");
            return None;
        }
    };
    let caps = action_re.captures(text)?;

    let tool_name = caps[1].to_string();
    let args_str = caps[2].trim().to_string();

    let mut args = Map::new();
    if !args_str.is_empty() {
        let arg_re = match Regex::new(r#"(\w+)\s*=\s*("[^"]*"|'[^']*'|[^,]+)"#) {
            Ok(re) => re,
            Err(e) => {
                warn!(error = %e, "Argument pattern failed to compile");
                return None;
            }
        };
        for cap in arg_re.captures_iter(&args_str) {
            let key = cap[1].to_string();
            let raw = cap[2].trim();
            let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| {
                Value::String(raw.trim_matches(|c| c == '\'' || c == '"').to_string())
            });
            args.insert(key, value);
        }
    }

    Some((tool_name, Value::Object(args)))
}
