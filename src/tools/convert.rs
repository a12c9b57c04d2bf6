//! Structure file format conversion tool.
//!
//! Conversion runs on the structure service rather than in-process; the tool
//! uploads the source content, receives the converted text back, and stores
//! it in the session workspace under the new extension.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::info;

use crate::error::{Result, ZeolithError};
use crate::session::Conversation;

use super::{required_str, Tool};

const TARGET_FORMATS: [&str; 4] = ["xyz", "cif", "pdb", "cssr"];

/// Converts a chemical structure file between formats and saves the result to
/// the session workspace.
pub struct FileConverterTool {
    service_url: String,
    client: Client,
}

impl FileConverterTool {
    pub fn new(base_url: &str) -> Self {
        Self {
            service_url: format!("{}/api/convert", base_url.trim_end_matches('/')),
            client: Client::new(),
        }
    }

    fn output_filename(input_filename: &str, target_format: &str) -> String {
        let stem = input_filename
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(input_filename);
        format!("{}.{}", stem, target_format)
    }
}

#[async_trait]
impl Tool for FileConverterTool {
    fn name(&self) -> &str {
        "convert_structure_file"
    }

    fn description(&self) -> &str {
        "Converts a structure file's content to a target format. The result is saved in the \
         session workspace."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "input_filename": {
                    "type": "string",
                    "description": "The original filename of the input structure, e.g., 'MOF-1.cif'."
                },
                "input_content_base64": {
                    "type": "string",
                    "description": "The Base64 encoded string of the source file's content."
                },
                "target_format": {
                    "type": "string",
                    "enum": TARGET_FORMATS,
                    "description": "The desired output file format."
                }
            },
            "required": ["input_filename", "input_content_base64", "target_format"]
        })
    }

    async fn execute(&self, args: Value, conversation: &mut Conversation) -> Result<String> {
        let input_filename = required_str(&args, "input_filename")?.to_string();
        let input_content_base64 = required_str(&args, "input_content_base64")?;
        let target_format = required_str(&args, "target_format")?.to_string();

        if !TARGET_FORMATS.contains(&target_format.as_str()) {
            return Err(ZeolithError::Tool(format!(
                "Unsupported target format '{}'. Supported formats: {}",
                target_format,
                TARGET_FORMATS.join(", ")
            )));
        }

        info!(
            file = %input_filename,
            format = %target_format,
            "Converting structure file"
        );

        let decoded = BASE64.decode(input_content_base64).map_err(|e| {
            ZeolithError::Tool(format!(
                "Base64 decoding failed for file '{}': {}",
                input_filename, e
            ))
        })?;

        let form = Form::new()
            .part(
                "structure_file",
                Part::bytes(decoded)
                    .file_name(input_filename.clone())
                    .mime_str("application/octet-stream")
                    .map_err(|e| ZeolithError::Tool(e.to_string()))?,
            )
            .text("target_format", target_format.clone());

        let response = self
            .client
            .post(&self.service_url)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ZeolithError::Tool(format!(
                "Conversion service at {} returned {}: {}",
                self.service_url, status, body
            )));
        }

        let data: Value = response.json().await?;
        let converted = data
            .get("content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                ZeolithError::Tool("Conversion response is missing the 'content' field".to_string())
            })?;

        let new_filename = Self::output_filename(&input_filename, &target_format);
        conversation.put_workspace_file(&new_filename, &BASE64.encode(converted.as_bytes()));

        Ok(format!(
            "Successfully converted '{}' to '{}' and saved it to the workspace under the name '{}'.",
            input_filename, new_filename, new_filename
        ))
    }
}
