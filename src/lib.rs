// cutview - haircut reference images from a photo and a description

pub mod config;
pub mod validation;
pub mod workflow;

pub use config::AppConfig;
pub use workflow::{Studio, Workflow, WorkflowError, WorkflowState};
