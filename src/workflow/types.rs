// Core types for the generation workflow

use base64::{Engine as _, engine::general_purpose};
use genapi::{Angle, WireVariation};
use serde::Serialize;

/// Prefix that marks a variation as an embedded raster image
pub const IMAGE_DATA_URL_PREFIX: &str = "data:image/";

/// Identity of one accepted upload; a new upload always gets a new id
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
pub struct ImageId(pub u64);

/// Observable workflow state, derived from the workflow's fields
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    NoImage,
    ImageReady,
    GeneratingFront,
    FrontReady,
    GeneratingAngles,
    AnglesReady,
}

/// Which of the two generation requests a ticket belongs to
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Front,
    Angles,
}

/// A `data:<media type>;base64,<payload>` image reference
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DataUrl {
    pub media_type: String,
    /// Base64 payload, exactly as received
    pub data: String,
}

impl DataUrl {
    /// Parse an image data URL; anything else yields `None`
    pub fn parse(value: &str) -> Option<Self> {
        if !value.starts_with(IMAGE_DATA_URL_PREFIX) {
            return None;
        }
        let rest = &value["data:".len()..];
        let (header, data) = rest.split_once(',')?;
        let media_type = header.strip_suffix(";base64")?;

        Some(Self {
            media_type: media_type.to_string(),
            data: data.to_string(),
        })
    }

    /// Decode the payload to raw image bytes
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        general_purpose::STANDARD.decode(self.data.as_bytes())
    }

    /// File extension matching the media type
    pub fn extension(&self) -> &'static str {
        match self.media_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "png",
        }
    }

    pub fn to_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

/// What the service produced for one angle
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum VariationPayload {
    Image(DataUrl),
    /// Fallback description when no image could be produced
    Text(String),
}

impl VariationPayload {
    pub fn from_wire(image: &str) -> Self {
        match DataUrl::parse(image) {
            Some(url) => VariationPayload::Image(url),
            None => VariationPayload::Text(image.to_string()),
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, VariationPayload::Image(_))
    }
}

/// One generated result
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ImageVariation {
    pub payload: VariationPayload,
    pub angle: Angle,
}

impl ImageVariation {
    pub fn from_wire(variation: &WireVariation) -> Self {
        Self {
            payload: VariationPayload::from_wire(&variation.image),
            angle: variation.angle,
        }
    }

    /// Same payload, different angle label
    pub fn tagged(mut self, angle: Angle) -> Self {
        self.angle = angle;
        self
    }
}

/// An entry of the result grid
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DisplayCard {
    Result(ImageVariation),
    /// Placeholder while the angle request is outstanding
    Pending { angle: Angle },
}

/// Read-only snapshot for presentation
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WorkflowView {
    pub state: WorkflowState,
    pub file_name: Option<String>,
    pub preview: Option<(u32, u32)>,
    pub prompt: Option<String>,
    pub error: Option<String>,
    pub has_front_result: bool,
    pub has_angles: bool,
    pub cards: Vec<DisplayCard>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_data_url() {
        let url = DataUrl::parse("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(url.media_type, "image/png");
        assert_eq!(url.decode().unwrap(), b"hello");
        assert_eq!(url.extension(), "png");
        assert_eq!(url.to_url(), "data:image/png;base64,aGVsbG8=");
    }

    #[test]
    fn test_plain_text_is_not_an_image() {
        let payload = VariationPayload::from_wire("A tapered fade with a textured crop on top");
        assert!(!payload.is_image());

        // Only image media types count
        let payload = VariationPayload::from_wire("data:text/plain;base64,aGk=");
        assert!(matches!(payload, VariationPayload::Text(_)));
    }

    #[test]
    fn test_jpeg_extension() {
        let url = DataUrl::parse("data:image/jpeg;base64,AA==").unwrap();
        assert_eq!(url.extension(), "jpg");
    }

    #[test]
    fn test_pending_card_has_explicit_kind() {
        let card = DisplayCard::Pending { angle: Angle::Side };
        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["kind"], "pending");
        assert_eq!(json["angle"], "side");
    }
}
