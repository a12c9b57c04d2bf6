//! Zeo++ structural analysis tools.
//!
//! All seven analyses share the same shape: read a base64 structure file from
//! the session workspace, post it as multipart form data to the Zeo++ service,
//! and format the JSON reply as observation text. A single `ZeoPropertyTool`
//! parameterized by operation covers the whole suite; the set of operations is
//! a fixed table, not discovered at runtime.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::info;

use crate::error::{Result, ZeolithError};
use crate::session::Conversation;

use super::{decode_workspace_file, optional_str, required_str, Tool};

/// One Zeo++ analysis endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeoOperation {
    PoreDiameter,
    SurfaceArea,
    AccessibleVolume,
    ProbeOccupiableVolume,
    PoreSizeDistribution,
    ChannelAnalysis,
    StructureInfo,
}

impl ZeoOperation {
    /// All operations, in registration order.
    pub fn all() -> [ZeoOperation; 7] {
        [
            ZeoOperation::PoreDiameter,
            ZeoOperation::SurfaceArea,
            ZeoOperation::AccessibleVolume,
            ZeoOperation::ProbeOccupiableVolume,
            ZeoOperation::PoreSizeDistribution,
            ZeoOperation::ChannelAnalysis,
            ZeoOperation::StructureInfo,
        ]
    }

    fn tool_name(&self) -> &'static str {
        match self {
            Self::PoreDiameter => "calculate_pore_diameter",
            Self::SurfaceArea => "calculate_surface_area",
            Self::AccessibleVolume => "calculate_accessible_volume",
            Self::ProbeOccupiableVolume => "calculate_probe_occupiable_volume",
            Self::PoreSizeDistribution => "calculate_pore_size_distribution",
            Self::ChannelAnalysis => "calculate_channel_analysis",
            Self::StructureInfo => "analyze_structure_info",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            Self::PoreDiameter => {
                "Calculates the pore diameters of a crystalline material from a file in the \
                 workspace. The input file MUST be in .cif format."
            }
            Self::SurfaceArea => {
                "Calculates the accessible surface area (ASA) and non-accessible surface area \
                 (NASA) of a crystalline material from a file in the workspace. The input file \
                 MUST be in .cif format."
            }
            Self::AccessibleVolume => {
                "Calculates the accessible volume (AV) and non-accessible volume (NAV) of a \
                 crystalline material from a file in the workspace. The input file MUST be in \
                 .cif format."
            }
            Self::ProbeOccupiableVolume => {
                "Calculates the probe-occupiable accessible volume (POAV) and non-accessible \
                 volume (PONAV) from a file in the workspace. The input file MUST be in .cif \
                 format."
            }
            Self::PoreSizeDistribution => {
                "Computes the pore size distribution (PSD) of a crystalline material from a \
                 file in the workspace and returns the raw histogram data as text. The input \
                 file MUST be in .cif format."
            }
            Self::ChannelAnalysis => {
                "Analyzes the channel system of a porous material from a file in the workspace \
                 to determine its dimensionality and diameters. The input file MUST be in .cif \
                 format."
            }
            Self::StructureInfo => {
                "Analyzes a crystalline structure from a file in the workspace to get general \
                 information like framework count and dimensionality. The input file MUST be \
                 in .cif format."
            }
        }
    }

    fn endpoint(&self) -> &'static str {
        match self {
            Self::PoreDiameter => "pore_diameter",
            Self::SurfaceArea => "surface_area",
            Self::AccessibleVolume => "accessible_volume",
            Self::ProbeOccupiableVolume => "probe_volume",
            Self::PoreSizeDistribution => "pore_size_dist",
            Self::ChannelAnalysis => "channel_analysis",
            Self::StructureInfo => "structure_info",
        }
    }

    fn default_output_filename(&self) -> &'static str {
        match self {
            Self::PoreDiameter => "result.res",
            Self::SurfaceArea => "result.sa",
            Self::AccessibleVolume => "result.vol",
            Self::ProbeOccupiableVolume => "result.volpo",
            Self::PoreSizeDistribution => "result.psd_histo",
            Self::ChannelAnalysis => "result.chan",
            Self::StructureInfo => "result.strinfo",
        }
    }

    /// Whether this operation takes the Monte Carlo sampling trio
    /// (chan_radius, probe_radius, samples).
    fn takes_sampling_args(&self) -> bool {
        matches!(
            self,
            Self::SurfaceArea
                | Self::AccessibleVolume
                | Self::ProbeOccupiableVolume
                | Self::PoreSizeDistribution
        )
    }

    fn takes_probe_radius_only(&self) -> bool {
        matches!(self, Self::ChannelAnalysis)
    }

    fn takes_ha(&self) -> bool {
        !matches!(self, Self::StructureInfo)
    }

    fn parameters(&self) -> Value {
        let mut properties = json!({
            "source_filename": {
                "type": "string",
                "description": "The filename of the structure within the session workspace to use as input."
            },
            "output_filename": {
                "type": "string",
                "description": "Custom output filename for the result."
            }
        });
        let mut required = vec!["source_filename"];

        if self.takes_sampling_args() {
            properties["chan_radius"] = json!({
                "type": "number",
                "description": "The radius of the probe used to test for accessibility."
            });
            properties["probe_radius"] = json!({
                "type": "number",
                "description": "The radius of the probe used for the Monte Carlo sampling."
            });
            properties["samples"] = json!({
                "type": "integer",
                "description": "The number of Monte Carlo samples to use."
            });
            required.extend(["chan_radius", "probe_radius", "samples"]);
        }
        if self.takes_probe_radius_only() {
            properties["probe_radius"] = json!({
                "type": "number",
                "description": "The radius of the spherical probe used for channel analysis."
            });
            required.push("probe_radius");
        }
        if self.takes_ha() {
            properties["ha"] = json!({
                "type": "boolean",
                "description": "Whether to use high-accuracy mode."
            });
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required
        })
    }

    /// Build the non-file form fields for this operation.
    fn form_fields(&self, args: &Value) -> Result<Vec<(&'static str, String)>> {
        let mut fields = Vec::new();

        if self.takes_sampling_args() {
            fields.push(("chan_radius", required_number(args, "chan_radius")?));
            fields.push(("probe_radius", required_number(args, "probe_radius")?));
            fields.push(("samples", required_number(args, "samples")?));
        }
        if self.takes_probe_radius_only() {
            fields.push(("probe_radius", required_number(args, "probe_radius")?));
        }
        if self.takes_ha() {
            let ha = args.get("ha").and_then(|v| v.as_bool()).unwrap_or(true);
            fields.push(("ha", ha.to_string()));
        }

        let output = optional_str(args, "output_filename")
            .unwrap_or_else(|| self.default_output_filename());
        fields.push(("output_filename", output.to_string()));

        Ok(fields)
    }

    /// Format the service reply as observation text.
    fn format_result(&self, source_filename: &str, data: &Value) -> String {
        let field = |key: &str| display_value(data.get(key));

        match self {
            Self::PoreDiameter => format!(
                "Pore diameter calculation completed successfully for '{}'. \
                 Included Sphere Diameter: {} \u{212b}, Free Sphere Diameter: {} \u{212b}, \
                 Included Sphere Along Free Sphere Path: {} \u{212b}. Cache used: {}.",
                source_filename,
                field("included_diameter"),
                field("free_diameter"),
                field("included_along_free"),
                field("cached"),
            ),
            Self::SurfaceArea => format!(
                "Surface area calculation completed successfully for '{}'. \
                 Accessible Surface Area (ASA): {} m^2/cm^3, {} m^2/g. \
                 Non-Accessible Surface Area (NASA): {} m^2/cm^3, {} m^2/g. Cache used: {}.",
                source_filename,
                field("asa_volume"),
                field("asa_mass"),
                field("nasa_volume"),
                field("nasa_mass"),
                field("cached"),
            ),
            Self::AccessibleVolume => {
                let av = data
                    .get("av")
                    .filter(|v| !v.is_null())
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "Not available".to_string());
                let nav = data
                    .get("nav")
                    .filter(|v| !v.is_null())
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "Not available".to_string());
                format!(
                    "Accessible Volume calculation completed successfully for '{}'. \
                     Unitcell Volume: {} \u{212b}^3, Density: {} g/cm^3. \
                     Accessible Volume (AV) details: {}. \
                     Non-Accessible Volume (NAV) details: {}. Cache used: {}.",
                    source_filename,
                    field("unitcell_volume"),
                    field("density"),
                    av,
                    nav,
                    field("cached"),
                )
            }
            Self::ProbeOccupiableVolume => format!(
                "Probe Occupiable Volume calculation completed successfully. \
                 Accessible Volume (POAV): {} (v/v), {} cm^3/g. \
                 Non-Accessible Volume (PONAV): {} (v/v), {} cm^3/g. Cache used: {}.",
                field("poav_fraction"),
                field("poav_mass"),
                field("ponav_fraction"),
                field("ponav_mass"),
                field("cached"),
            ),
            Self::PoreSizeDistribution => {
                let content = data
                    .get("content")
                    .and_then(|v| v.as_str())
                    .unwrap_or("No content found in response.");
                format!(
                    "Pore size distribution calculation completed successfully for '{}'. \
                     The raw histogram data is as follows:\n\n{}",
                    source_filename, content
                )
            }
            Self::ChannelAnalysis => format!(
                "Channel analysis completed successfully for '{}'. \
                 Channel Dimensionality: {}. Largest Included Sphere: {} \u{212b}, \
                 Largest Free Sphere: {} \u{212b}, \
                 Largest Included Sphere Along Free Sphere Path: {} \u{212b}. Cache used: {}.",
                source_filename,
                field("dimension"),
                field("included_diameter"),
                field("free_diameter"),
                field("included_along_free"),
                field("cached"),
            ),
            Self::StructureInfo => {
                let frameworks = data
                    .get("frameworks")
                    .and_then(|v| v.as_array())
                    .map(|list| {
                        list.iter()
                            .map(|f| {
                                format!(
                                    "ID {}: dimensionality {}",
                                    display_value(f.get("id")),
                                    display_value(f.get("dimensionality"))
                                )
                            })
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| "No framework data.".to_string());
                format!(
                    "Structure analysis completed successfully for '{}'. \
                     Number of frameworks: {}. Framework details: [{}]. \
                     Number of channels: {}. Number of pockets: {}. \
                     Nodes assigned: {}. Cache used: {}.",
                    source_filename,
                    field("num_frameworks"),
                    frameworks,
                    field("channels"),
                    field("pockets"),
                    field("nodes_assigned"),
                    field("cached"),
                )
            }
        }
    }
}

fn display_value(v: Option<&Value>) -> String {
    match v {
        None | Some(Value::Null) => "N/A".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn required_number(args: &Value, key: &str) -> Result<String> {
    let value = args
        .get(key)
        .ok_or_else(|| ZeolithError::Tool(format!("Missing required argument: {}", key)))?;
    match value {
        Value::Number(n) => Ok(n.to_string()),
        // Models occasionally quote numeric arguments
        Value::String(s) if s.parse::<f64>().is_ok() => Ok(s.clone()),
        _ => Err(ZeolithError::Tool(format!(
            "Argument '{}' must be a number",
            key
        ))),
    }
}

/// A single Zeo++ analysis tool bound to one operation and service base URL.
pub struct ZeoPropertyTool {
    operation: ZeoOperation,
    service_url: String,
    client: Client,
}

impl ZeoPropertyTool {
    pub fn new(operation: ZeoOperation, base_url: &str) -> Self {
        Self {
            operation,
            service_url: format!(
                "{}/api/{}",
                base_url.trim_end_matches('/'),
                operation.endpoint()
            ),
            client: Client::new(),
        }
    }

    /// Instantiate the full analysis suite against one service.
    pub fn suite(base_url: &str) -> Vec<ZeoPropertyTool> {
        ZeoOperation::all()
            .into_iter()
            .map(|op| ZeoPropertyTool::new(op, base_url))
            .collect()
    }
}

#[async_trait]
impl Tool for ZeoPropertyTool {
    fn name(&self) -> &str {
        self.operation.tool_name()
    }

    fn description(&self) -> &str {
        self.operation.description()
    }

    fn parameters(&self) -> Value {
        self.operation.parameters()
    }

    async fn execute(&self, args: Value, conversation: &mut Conversation) -> Result<String> {
        let source_filename = required_str(&args, "source_filename")?.to_string();
        info!(
            tool = self.operation.tool_name(),
            file = %source_filename,
            "Running Zeo++ analysis"
        );

        let content = decode_workspace_file(conversation, &source_filename)?;

        let mut form = Form::new().part(
            "structure_file",
            Part::bytes(content)
                .file_name(source_filename.clone())
                .mime_str("application/octet-stream")
                .map_err(|e| ZeolithError::Tool(e.to_string()))?,
        );
        for (key, value) in self.operation.form_fields(&args)? {
            form = form.text(key, value);
        }

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
                "Zeo++ service at {} returned {}: {}",
                self.service_url, status, body
            )));
        }

        let data: Value = response.json().await?;
        Ok(self.operation.format_result(&source_filename, &data))
    }
}
