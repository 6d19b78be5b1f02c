// Generation workflow state machine
//
// Pure and synchronous: every network or codec operation happens outside, in
// between a `begin_*` call that hands out a ticket and the `finish`/`fail`
// call that folds its outcome back in.

use super::error::WorkflowError;
use super::types::{
    DisplayCard, ImageId, ImageVariation, RequestKind, WorkflowState, WorkflowView,
};
use genapi::{Angle, GenerateResponse, ServiceError};
use imgfit::SourceImage;
use std::sync::Arc;
use tracing::{debug, info, warn};

const UNSUPPORTED_EXTENSIONS: [&str; 2] = ["heic", "heif"];
const UNSUPPORTED_MEDIA_TYPES: [&str; 4] =
    ["image/heic", "image/heif", "image/heic-sequence", "image/heif-sequence"];

/// Whether a file is a HEIC/HEIF container the service cannot read
pub fn is_heic(file_name: &str, media_type: &str) -> bool {
    let by_name = file_name
        .rsplit_once('.')
        .map(|(_, ext)| {
            UNSUPPORTED_EXTENSIONS
                .iter()
                .any(|unsupported| ext.eq_ignore_ascii_case(unsupported))
        })
        .unwrap_or(false);
    let by_type = UNSUPPORTED_MEDIA_TYPES
        .iter()
        .any(|unsupported| media_type.eq_ignore_ascii_case(unsupported));

    by_name || by_type
}

/// Everything one outstanding request needs, captured when it starts
#[derive(Debug, Clone)]
pub struct Ticket {
    pub kind: RequestKind,
    pub image_id: ImageId,
    pub image: Arc<SourceImage>,
    pub prompt: String,
}

/// How a generation call ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Not allowed from the current state; nothing happened
    Rejected,
    /// Results were merged
    Completed,
    /// The error was recorded and the workflow is retryable
    Failed(WorkflowError),
    /// The image changed while the request was out; the response was dropped
    Stale,
}

#[derive(Debug)]
struct Upload {
    id: ImageId,
    image: Arc<SourceImage>,
    preview: Option<(u32, u32)>,
}

/// Upload and generation state for one session
#[derive(Debug, Default)]
pub struct Workflow {
    upload: Option<Upload>,
    next_id: u64,
    prompt: Option<String>,
    results: Vec<ImageVariation>,
    in_flight: Option<RequestKind>,
    error: Option<WorkflowError>,
}

impl Workflow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a new photo, replacing the current one and everything derived from it
    pub fn upload_image(&mut self, image: SourceImage) -> Result<ImageId, WorkflowError> {
        if is_heic(image.file_name(), image.media_type()) {
            warn!(file = image.file_name(), "Rejected HEIC/HEIF upload");
            let err = WorkflowError::UnsupportedFormat {
                file_name: image.file_name().to_string(),
            };
            self.error = Some(err.clone());
            return Err(err);
        }
        if image.is_empty() {
            let err = WorkflowError::InvalidInput {
                message: "The selected file is empty.".to_string(),
            };
            self.error = Some(err.clone());
            return Err(err);
        }

        self.next_id += 1;
        let id = ImageId(self.next_id);
        info!(
            image_id = id.0,
            file = image.file_name(),
            size = image.byte_len(),
            "Image accepted"
        );

        self.upload = Some(Upload {
            id,
            image: Arc::new(image),
            preview: None,
        });
        self.prompt = None;
        self.results.clear();
        self.in_flight = None;
        self.error = None;

        Ok(id)
    }

    /// Record decoded dimensions for display, if the image is still current
    pub fn record_preview(&mut self, id: ImageId, width: u32, height: u32) {
        match self.upload.as_mut() {
            Some(upload) if upload.id == id => upload.preview = Some((width, height)),
            _ => debug!(image_id = id.0, "Dropping preview for replaced image"),
        }
    }

    /// Start the front request; `None` unless the workflow is `ImageReady`
    pub fn begin_front(&mut self, prompt: &str) -> Option<Ticket> {
        if self.state() != WorkflowState::ImageReady {
            debug!(state = ?self.state(), "Ignoring front request");
            return None;
        }
        let upload = self.upload.as_ref()?;
        let ticket = Ticket {
            kind: RequestKind::Front,
            image_id: upload.id,
            image: Arc::clone(&upload.image),
            prompt: prompt.to_string(),
        };

        self.in_flight = Some(RequestKind::Front);
        self.error = None;
        Some(ticket)
    }

    /// Start the angle request; `None` unless the workflow is `FrontReady`
    pub fn begin_angles(&mut self) -> Option<Ticket> {
        if self.state() != WorkflowState::FrontReady {
            debug!(state = ?self.state(), "Ignoring angle request");
            return None;
        }
        let upload = self.upload.as_ref()?;
        let prompt = self.prompt.clone()?;
        let ticket = Ticket {
            kind: RequestKind::Angles,
            image_id: upload.id,
            image: Arc::clone(&upload.image),
            prompt,
        };

        self.in_flight = Some(RequestKind::Angles);
        self.error = None;
        Some(ticket)
    }

    /// Fold a service response into the result set
    pub fn finish(
        &mut self,
        ticket: Ticket,
        response: Result<GenerateResponse, ServiceError>,
    ) -> RequestOutcome {
        if !self.owns(&ticket) {
            return RequestOutcome::Stale;
        }

        let response = match response {
            Ok(response) => response,
            Err(err) => {
                warn!(kind = ?ticket.kind, error = %err, "Generation request failed");
                return self.record_failure(WorkflowError::from_service(&err));
            }
        };
        if !response.success {
            return self.record_failure(WorkflowError::rejected(response.message));
        }

        match ticket.kind {
            RequestKind::Front => {
                let Some(first) = response.variations.first() else {
                    return self.record_failure(WorkflowError::EmptyResult);
                };
                self.results = vec![ImageVariation::from_wire(first).tagged(Angle::Front)];
                self.prompt = Some(ticket.prompt);
            }
            RequestKind::Angles => {
                let mut added = Vec::new();
                for variation in &response.variations {
                    let duplicate = added.iter().any(|v: &ImageVariation| v.angle == variation.angle);
                    if variation.angle != Angle::Front && !duplicate {
                        added.push(ImageVariation::from_wire(variation));
                    }
                }
                if added.is_empty() {
                    return self.record_failure(WorkflowError::EmptyResult);
                }
                self.results.extend(added);
            }
        }

        self.in_flight = None;
        // A rejected upload during the request may have left an error behind
        self.error = None;
        info!(kind = ?ticket.kind, results = self.results.len(), "Generation completed");
        RequestOutcome::Completed
    }

    /// Abort a request before it reached the service
    pub fn fail(&mut self, ticket: Ticket, error: WorkflowError) -> RequestOutcome {
        if !self.owns(&ticket) {
            return RequestOutcome::Stale;
        }
        self.record_failure(error)
    }

    /// Drop results and prompt but keep the photo, back to `ImageReady`
    pub fn clear_results(&mut self) -> bool {
        if self.upload.is_none() || self.in_flight.is_some() {
            return false;
        }
        self.results.clear();
        self.prompt = None;
        self.error = None;
        true
    }

    // A ticket is live while its image is current and its request is outstanding
    fn owns(&self, ticket: &Ticket) -> bool {
        let current = self.upload.as_ref().map(|u| u.id);
        if current != Some(ticket.image_id) || self.in_flight != Some(ticket.kind) {
            debug!(
                image_id = ticket.image_id.0,
                kind = ?ticket.kind,
                "Discarding response for a replaced image"
            );
            return false;
        }
        true
    }

    fn record_failure(&mut self, error: WorkflowError) -> RequestOutcome {
        self.in_flight = None;
        self.error = Some(error.clone());
        RequestOutcome::Failed(error)
    }

    pub fn state(&self) -> WorkflowState {
        if self.upload.is_none() {
            return WorkflowState::NoImage;
        }
        match self.in_flight {
            Some(RequestKind::Front) => WorkflowState::GeneratingFront,
            Some(RequestKind::Angles) => WorkflowState::GeneratingAngles,
            None if self.has_angles() => WorkflowState::AnglesReady,
            None if self.has_front_result() => WorkflowState::FrontReady,
            None => WorkflowState::ImageReady,
        }
    }

    pub fn has_front_result(&self) -> bool {
        self.results.iter().any(|v| v.angle == Angle::Front)
    }

    pub fn has_angles(&self) -> bool {
        self.results
            .iter()
            .any(|v| matches!(v.angle, Angle::Side | Angle::Back))
    }

    pub fn error(&self) -> Option<&WorkflowError> {
        self.error.as_ref()
    }

    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    pub fn results(&self) -> &[ImageVariation] {
        &self.results
    }

    pub fn image(&self) -> Option<&SourceImage> {
        self.upload.as_ref().map(|u| u.image.as_ref())
    }

    pub fn image_id(&self) -> Option<ImageId> {
        self.upload.as_ref().map(|u| u.id)
    }

    /// Result grid, with placeholders for angles still being generated
    pub fn cards(&self) -> Vec<DisplayCard> {
        let mut cards: Vec<DisplayCard> = self
            .results
            .iter()
            .cloned()
            .map(DisplayCard::Result)
            .collect();

        if self.state() == WorkflowState::GeneratingAngles {
            cards.push(DisplayCard::Pending { angle: Angle::Side });
            cards.push(DisplayCard::Pending { angle: Angle::Back });
        }
        cards
    }

    pub fn view(&self) -> WorkflowView {
        WorkflowView {
            state: self.state(),
            file_name: self.image().map(|i| i.file_name().to_string()),
            preview: self.upload.as_ref().and_then(|u| u.preview),
            prompt: self.prompt.clone(),
            error: self.error.as_ref().map(|e| e.to_string()),
            has_front_result: self.has_front_result(),
            has_angles: self.has_angles(),
            cards: self.cards(),
        }
    }
}
