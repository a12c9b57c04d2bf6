//! Geometry optimization tools (MACE and GFN-xTB services).
//!
//! All four tools run in the background through the job queue: optimizations
//! take minutes, and the downloads pull archives that are large relative to a
//! chat turn. Submission returns immediately with a job id; the model polls
//! with `check_task_status`.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::info;

use crate::error::{Result, ZeolithError};
use crate::session::Conversation;

use super::{decode_workspace_file, required_str, Tool};

/// Submits a structure in XYZ format for geometry optimization with MACE.
///
/// Does NOT return the final structure; the service replies with the final
/// energy and relative paths for `download_optimized_structure`.
pub struct MaceOptimizeTool {
    service_url: String,
    client: Client,
}

impl MaceOptimizeTool {
    pub fn new(base_url: &str) -> Self {
        Self {
            service_url: format!("{}/optimize", base_url.trim_end_matches('/')),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Tool for MaceOptimizeTool {
    fn name(&self) -> &str {
        "optimize_structure_with_mace"
    }

    fn description(&self) -> &str {
        "Performs geometry optimization on a structure from the workspace. The input file MUST \
         be in .xyz format."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "source_filename": {
                    "type": "string",
                    "description": "The filename of the structure in .xyz format from the workspace."
                },
                "fmax": {
                    "type": "number",
                    "description": "The maximum force tolerance for the geometry optimization."
                },
                "device": {
                    "type": "string",
                    "description": "The device to run the calculation on, e.g., 'cpu' or 'cuda'."
                }
            },
            "required": ["source_filename"]
        })
    }

    fn runs_in_background(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value, conversation: &mut Conversation) -> Result<String> {
        let source_filename = required_str(&args, "source_filename")?.to_string();
        let fmax = args.get("fmax").and_then(|v| v.as_f64()).unwrap_or(0.1);
        let device = args
            .get("device")
            .and_then(|v| v.as_str())
            .unwrap_or("cpu")
            .to_string();

        info!(file = %source_filename, fmax, device = %device, "Submitting MACE optimization");

        let content = decode_workspace_file(conversation, &source_filename)?;

        let form = Form::new()
            .part(
                "structure_file",
                Part::bytes(content)
                    .file_name(source_filename.clone())
                    .mime_str("application/octet-stream")
                    .map_err(|e| ZeolithError::Tool(e.to_string()))?,
            )
            .text("fmax", fmax.to_string())
            .text("device", device);

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
                "MACE optimization service at {} returned {}: {}",
                self.service_url, status, body
            )));
        }

        let data: Value = response.json().await?;
        Ok(serde_json::to_string_pretty(&data)?)
    }
}

/// Downloads an optimized structure file from the MACE service using a path
/// from an `optimize_structure_with_mace` result, and saves it to the
/// workspace.
pub struct DownloadOptimizedStructureTool {
    service_url: String,
    client: Client,
}

impl DownloadOptimizedStructureTool {
    pub fn new(base_url: &str) -> Self {
        Self {
            service_url: format!("{}/download", base_url.trim_end_matches('/')),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Tool for DownloadOptimizedStructureTool {
    fn name(&self) -> &str {
        "download_optimized_structure"
    }

    fn description(&self) -> &str {
        "Downloads a structure file from the MACE optimization service and saves it to the \
         session workspace."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The relative path to the file to download, e.g., 'session_xyz/optimized.xyz', provided by the 'optimize_structure_with_mace' tool."
                }
            },
            "required": ["path"]
        })
    }

    fn runs_in_background(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value, conversation: &mut Conversation) -> Result<String> {
        let path = required_str(&args, "path")?.to_string();
        info!(path = %path, "Downloading optimized structure");

        let response = self
            .client
            .get(&self.service_url)
            .query(&[("path", path.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ZeolithError::Tool(format!(
                "Download from {} returned {}: {}",
                self.service_url, status, body
            )));
        }

        let bytes = response.bytes().await?;
        let filename = path.rsplit('/').next().unwrap_or(path.as_str()).to_string();
        conversation.put_workspace_file(&filename, &BASE64.encode(&bytes));

        Ok(format!(
            "Successfully downloaded '{}' and saved it to the workspace.",
            filename
        ))
    }
}

/// Submits a structure for GFN-xTB geometry optimization.
pub struct XtbOptimizeTool {
    service_url: String,
    client: Client,
}

impl XtbOptimizeTool {
    pub fn new(base_url: &str) -> Self {
        Self {
            service_url: format!("{}/optimize", base_url.trim_end_matches('/')),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Tool for XtbOptimizeTool {
    fn name(&self) -> &str {
        "optimize_structure_with_xtb"
    }

    fn description(&self) -> &str {
        "Performs geometry optimization on a structure from the workspace using GFN1-xTB. The \
         input file MUST be in .xyz format."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "source_filename": {
                    "type": "string",
                    "description": "The filename of the structure in .xyz format from the workspace."
                },
                "charge": {
                    "type": "integer",
                    "description": "The total charge of the molecule."
                },
                "uhf": {
                    "type": "integer",
                    "description": "The number of unpaired electrons."
                },
                "gfn": {
                    "type": "integer",
                    "description": "The GFN-xTB model version to use."
                }
            },
            "required": ["source_filename"]
        })
    }

    fn runs_in_background(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value, conversation: &mut Conversation) -> Result<String> {
        let source_filename = required_str(&args, "source_filename")?.to_string();
        let charge = args.get("charge").and_then(|v| v.as_i64()).unwrap_or(0);
        let uhf = args.get("uhf").and_then(|v| v.as_i64()).unwrap_or(0);
        let gfn = args.get("gfn").and_then(|v| v.as_i64()).unwrap_or(1);

        info!(file = %source_filename, charge, uhf, gfn, "Submitting xTB optimization");

        let content = decode_workspace_file(conversation, &source_filename)?;

        let form = Form::new()
            .part(
                "structure_file",
                Part::bytes(content)
                    .file_name(source_filename.clone())
                    .mime_str("application/octet-stream")
                    .map_err(|e| ZeolithError::Tool(e.to_string()))?,
            )
            .text("charge", charge.to_string())
            .text("uhf", uhf.to_string())
            .text("gfn", gfn.to_string());

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
                "xTB optimization service at {} returned {}: {}",
                self.service_url, status, body
            )));
        }

        let data: Value = response.json().await?;
        Ok(serde_json::to_string_pretty(&data)?)
    }
}

/// Downloads the result archive for an xTB job, extracts the optimized
/// structure (`xtbopt.xyz`), and saves it to the workspace.
pub struct DownloadXtbResultTool {
    base_url: String,
    client: Client,
}

impl DownloadXtbResultTool {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Tool for DownloadXtbResultTool {
    fn name(&self) -> &str {
        "download_xtb_optimization_result"
    }

    fn description(&self) -> &str {
        "Downloads and unpacks an xTB optimization result from the service and saves the \
         optimized .xyz file to the workspace."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "job_id": {
                    "type": "string",
                    "description": "The job_id provided by the 'optimize_structure_with_xtb' tool."
                }
            },
            "required": ["job_id"]
        })
    }

    fn runs_in_background(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value, conversation: &mut Conversation) -> Result<String> {
        let job_id = required_str(&args, "job_id")?.to_string();
        let service_url = format!("{}/download/{}", self.base_url, job_id);
        info!(job_id = %job_id, "Downloading xTB optimization result");

        let response = self.client.get(&service_url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ZeolithError::Tool(format!(
                "Download from {} returned {}: {}",
                service_url, status, body
            )));
        }

        let zip_bytes = response.bytes().await.map(|b| b.to_vec())?;

        // Extract synchronously inside spawn_blocking to avoid holding a
        // non-Send ZipFile across await points.
        let optimized = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            let cursor = std::io::Cursor::new(zip_bytes);
            let mut archive =
                zip::ZipArchive::new(cursor).map_err(|e| ZeolithError::Tool(e.to_string()))?;
            let mut file = archive.by_name("xtbopt.xyz").map_err(|_| {
                ZeolithError::Tool(
                    "'xtbopt.xyz' not found in the downloaded ZIP archive".to_string(),
                )
            })?;
            let mut content = Vec::new();
            std::io::Read::read_to_end(&mut file, &mut content)?;
            Ok(content)
        })
        .await
        .map_err(|e| ZeolithError::Tool(format!("Archive extraction task failed: {}", e)))??;

        let new_filename = format!("{}_optimized.xyz", job_id);
        conversation.put_workspace_file(&new_filename, &BASE64.encode(&optimized));

        Ok(format!(
            "Successfully downloaded and extracted 'xtbopt.xyz'. Saved to workspace as '{}'.",
            new_filename
        ))
    }
}
