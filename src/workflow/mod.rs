// Generation workflow - photo upload, front view, then side and back views

pub mod error;
pub mod machine;
pub mod session;
pub mod types;

pub use error::{GENERIC_FAILURE_MESSAGE, WorkflowError};
pub use machine::{RequestOutcome, Ticket, Workflow, is_heic};
pub use session::{DEFAULT_THRESHOLD_BYTES, SAFETY_MARGIN, Studio};
pub use types::*;
