//! Upload-time checks on the photo and the haircut description
//!
//! Run before anything is handed to the workflow.

use crate::workflow::is_heic;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Unsupported file type: {0}. Accepted: JPEG, PNG, WebP")]
    UnsupportedType(String),

    #[error("File too small: {size} bytes. Minimum: {min} bytes")]
    TooSmall { size: usize, min: usize },

    #[error("File too large: {size_mb:.1} MB. Maximum: {max_mb:.1} MB")]
    TooLarge { size_mb: f64, max_mb: f64 },

    #[error("Please describe the haircut you want")]
    EmptyPrompt,

    #[error("Description too long: {len} characters. Maximum: {max}")]
    PromptTooLong { len: usize, max: usize },

    #[error("Description contains disallowed content")]
    BlockedContent,
}

/// Limits applied before a photo or prompt reaches the workflow
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadLimits {
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,

    #[serde(default = "default_min_bytes")]
    pub min_bytes: usize,

    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,

    /// Case-insensitive substrings a prompt may not contain
    #[serde(default = "default_blocked_terms")]
    pub blocked_terms: Vec<String>,
}

fn default_allowed_types() -> Vec<String> {
    ["image/jpeg", "image/png", "image/webp"]
        .iter()
        .map(|t| t.to_string())
        .collect()
}

fn default_min_bytes() -> usize {
    1024
}

fn default_max_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_max_prompt_chars() -> usize {
    500
}

fn default_blocked_terms() -> Vec<String> {
    ["<script", "javascript:", "nude", "naked"]
        .iter()
        .map(|t| t.to_string())
        .collect()
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            allowed_types: default_allowed_types(),
            min_bytes: default_min_bytes(),
            max_bytes: default_max_bytes(),
            max_prompt_chars: default_max_prompt_chars(),
            blocked_terms: default_blocked_terms(),
        }
    }
}

/// Guess a media type from a file extension
pub fn media_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        "heif" => "image/heif",
        _ => "application/octet-stream",
    }
}

/// Check a photo's type and size
///
/// HEIC/HEIF passes through here; the workflow rejects it with its own message.
pub fn validate_image(
    limits: &UploadLimits,
    file_name: &str,
    media_type: &str,
    size: usize,
) -> Result<(), ValidationError> {
    if is_heic(file_name, media_type) {
        return Ok(());
    }

    if !limits
        .allowed_types
        .iter()
        .any(|t| t.eq_ignore_ascii_case(media_type))
    {
        return Err(ValidationError::UnsupportedType(media_type.to_string()));
    }

    if size < limits.min_bytes {
        return Err(ValidationError::TooSmall {
            size,
            min: limits.min_bytes,
        });
    }

    if size > limits.max_bytes {
        return Err(ValidationError::TooLarge {
            size_mb: size as f64 / 1024.0 / 1024.0,
            max_mb: limits.max_bytes as f64 / 1024.0 / 1024.0,
        });
    }

    Ok(())
}

/// Check a haircut description
pub fn validate_prompt(limits: &UploadLimits, prompt: &str) -> Result<(), ValidationError> {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyPrompt);
    }

    let len = trimmed.chars().count();
    if len > limits.max_prompt_chars {
        return Err(ValidationError::PromptTooLong {
            len,
            max: limits.max_prompt_chars,
        });
    }

    let lower = trimmed.to_lowercase();
    if limits
        .blocked_terms
        .iter()
        .any(|term| !term.is_empty() && lower.contains(&term.to_lowercase()))
    {
        return Err(ValidationError::BlockedContent);
    }

    Ok(())
}
