//! Client for the haircut generation service
//!
//! Wire types for `/api/generate`, an HTTP transport built on reqwest, and the
//! failure classification shown to users.

pub mod client;
pub mod error;
pub mod types;

pub use client::{GenapiClient, GenerationService};
pub use error::{FailureKind, ServiceError};
pub use types::{Angle, GenerateRequest, GenerateResponse, WireVariation};
