//! Tool implementations for Zeolith
//!
//! This module provides the tool trait, the registry, and the concrete tools
//! the materials assistant ships with: web search, the Zeo++ analysis suite,
//! structure file conversion, geometry optimization, and background task
//! polling.

mod convert;
mod optimize;
mod registry;
mod search;
mod status;
mod types;
mod zeopp;

pub use convert::FileConverterTool;
pub use optimize::{
    DownloadOptimizedStructureTool, DownloadXtbResultTool, MaceOptimizeTool, XtbOptimizeTool,
};
pub use registry::ToolRegistry;
pub use search::TavilySearchTool;
pub use status::CheckTaskStatusTool;
pub use types::{optional_str, required_str, Tool};
pub use zeopp::{ZeoOperation, ZeoPropertyTool};

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::warn;

use crate::config::Config;
use crate::error::{Result, ZeolithError};
use crate::jobs::JobBoard;
use crate::session::Conversation;

/// Fetch and decode a base64 workspace file.
///
/// Shared by every tool that uploads a structure file; keeps the
/// missing-file and bad-encoding messages uniform so the model sees the same
/// phrasing regardless of which tool hit the problem.
pub(crate) fn decode_workspace_file(
    conversation: &Conversation,
    filename: &str,
) -> Result<Vec<u8>> {
    let content = conversation.workspace_file(filename).ok_or_else(|| {
        ZeolithError::Tool(format!(
            "File '{}' not found in the current session workspace",
            filename
        ))
    })?;

    BASE64.decode(content).map_err(|e| {
        ZeolithError::Tool(format!(
            "Base64 decoding failed for file '{}' from workspace: {}",
            filename, e
        ))
    })
}

/// Build the full tool registry from configuration.
///
/// The tool set is fixed here, before first use; nothing registers later.
/// Endpoints are required (checked by `Config::validate` at startup, rechecked
/// here for callers that skip validation). The Tavily tool is the one
/// optional member: without an API key the assistant simply has no web
/// search.
pub fn build_registry(config: &Config, board: JobBoard) -> Result<ToolRegistry> {
    let zeopp_base = config
        .endpoints
        .zeopp_api_base_url
        .as_deref()
        .ok_or_else(|| ZeolithError::Config("endpoints.zeopp_api_base_url is not set".to_string()))?;
    let mace_base = config
        .endpoints
        .maceopt_api_base_url
        .as_deref()
        .ok_or_else(|| {
            ZeolithError::Config("endpoints.maceopt_api_base_url is not set".to_string())
        })?;
    let xtb_base = config
        .endpoints
        .xtbopt_api_base_url
        .as_deref()
        .ok_or_else(|| {
            ZeolithError::Config("endpoints.xtbopt_api_base_url is not set".to_string())
        })?;

    let mut registry = ToolRegistry::new();

    for tool in ZeoPropertyTool::suite(zeopp_base) {
        registry.register(Arc::new(tool))?;
    }
    registry.register(Arc::new(FileConverterTool::new(zeopp_base)))?;

    registry.register(Arc::new(MaceOptimizeTool::new(mace_base)))?;
    registry.register(Arc::new(DownloadOptimizedStructureTool::new(mace_base)))?;
    registry.register(Arc::new(XtbOptimizeTool::new(xtb_base)))?;
    registry.register(Arc::new(DownloadXtbResultTool::new(xtb_base)))?;

    registry.register(Arc::new(CheckTaskStatusTool::new(board)))?;

    match config.endpoints.tavily_api_key.as_deref() {
        Some(key) if !key.is_empty() => {
            registry.register(Arc::new(TavilySearchTool::new(key)))?;
        }
        _ => warn!("TAVILY_API_KEY not set; web search tool disabled"),
    }

    Ok(registry)
}
