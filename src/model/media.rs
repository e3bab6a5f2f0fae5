//! Installation media

use crate::xml::Element;
use serde::{Deserialize, Serialize};

/// Cabinet compression level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    High,
    Medium,
    Low,
    Mszip,
    None,
}

impl CompressionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionLevel::High => "high",
            CompressionLevel::Medium => "medium",
            CompressionLevel::Low => "low",
            CompressionLevel::Mszip => "mszip",
            CompressionLevel::None => "none",
        }
    }
}

/// `Media` element. `{projectId}` in the cabinet name is replaced with the
/// project's output name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Media {
    pub id: u32,
    pub cabinet: String,
    pub compression_level: Option<CompressionLevel>,
    pub disk_prompt: Option<String>,
    pub embed_cab: Option<bool>,
    pub layout: Option<String>,
    pub source: Option<String>,
    pub volume_label: Option<String>,
}

impl Default for Media {
    fn default() -> Self {
        Self {
            id: 1,
            cabinet: "{projectId}.cab".to_string(),
            compression_level: None,
            disk_prompt: None,
            embed_cab: Some(true),
            layout: None,
            source: None,
            volume_label: None,
        }
    }
}

impl Media {
    pub fn to_element(&self, project_id: &str) -> Element {
        let cabinet = self.cabinet.replace("{projectId}", project_id);
        Element::new("Media")
            .attr("Id", self.id.to_string())
            .attr_opt("Cabinet", (!cabinet.is_empty()).then_some(cabinet))
            .attr_opt("CompressionLevel", self.compression_level.map(|c| c.as_str()))
            .attr_opt("DiskPrompt", self.disk_prompt.clone())
            .attr_opt("EmbedCab", self.embed_cab.map(|e| if e { "yes" } else { "no" }))
            .attr_opt("Layout", self.layout.clone())
            .attr_opt("Source", self.source.clone())
            .attr_opt("VolumeLabel", self.volume_label.clone())
    }
}

/// `MediaTemplate` element, used instead of explicit media
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaTemplate {
    pub cabinet_template: Option<String>,
    pub compression_level: Option<CompressionLevel>,
    pub disk_prompt: Option<String>,
    pub embed_cab: Option<bool>,
    pub maximum_cabinet_size_for_large_file_splitting: Option<u32>,
    pub maximum_uncompressed_media_size: Option<u32>,
    pub volume_label: Option<String>,
}

impl MediaTemplate {
    pub fn to_element(&self) -> Element {
        Element::new("MediaTemplate")
            .attr_opt("CabinetTemplate", self.cabinet_template.clone())
            .attr_opt("CompressionLevel", self.compression_level.map(|c| c.as_str()))
            .attr_opt("DiskPrompt", self.disk_prompt.clone())
            .attr_opt("EmbedCab", self.embed_cab.map(|e| if e { "yes" } else { "no" }))
            .attr_opt(
                "MaximumCabinetSizeForLargeFileSplitting",
                self.maximum_cabinet_size_for_large_file_splitting
                    .map(|v| v.to_string()),
            )
            .attr_opt(
                "MaximumUncompressedMediaSize",
                self.maximum_uncompressed_media_size.map(|v| v.to_string()),
            )
            .attr_opt("VolumeLabel", self.volume_label.clone())
    }
}
