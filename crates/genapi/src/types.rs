//! Request and response bodies exchanged with the generation service

use serde::{Deserialize, Serialize};
use std::fmt;

/// Viewpoint of a generated reference image
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Angle {
    Front,
    Side,
    Back,
}

impl Angle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Angle::Front => "front",
            Angle::Side => "side",
            Angle::Back => "back",
        }
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub prompt: String,
    /// Base64 image bytes, without a data-URL prefix
    pub image_data: String,
    #[serde(default)]
    pub generate_angles: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireVariation {
    /// Data URL of a raster image, or a plain-text description
    pub image: String,
    pub angle: Angle,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerateResponse {
    pub success: bool,
    #[serde(default)]
    pub variations: Vec<WireVariation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl GenerateResponse {
    /// Normalized failure body
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            variations: Vec::new(),
            message: Some(message.into()),
        }
    }
}
