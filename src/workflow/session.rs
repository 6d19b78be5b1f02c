// Async driver around the workflow state machine
//
// The workflow lock is only taken between suspension points, so a new upload
// can land while a compression or generation request is still running.

use super::error::WorkflowError;
use super::machine::{RequestOutcome, Ticket, Workflow};
use super::types::{ImageId, WorkflowView};
use base64::{Engine as _, engine::general_purpose};
use genapi::{GenerateRequest, GenerationService};
use imgfit::{RasterCodec, SourceImage, compress};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Share of the threshold used as the compression budget
pub const SAFETY_MARGIN: f64 = 0.9;

/// Default size above which photos are compressed before upload
pub const DEFAULT_THRESHOLD_BYTES: usize = 2 * 1024 * 1024;

/// One page session: a workflow plus the codec and service it drives
pub struct Studio<C, S> {
    workflow: Arc<Mutex<Workflow>>,
    codec: Arc<C>,
    service: Arc<S>,
    threshold_bytes: usize,
}

impl<C, S> Clone for Studio<C, S> {
    fn clone(&self) -> Self {
        Self {
            workflow: Arc::clone(&self.workflow),
            codec: Arc::clone(&self.codec),
            service: Arc::clone(&self.service),
            threshold_bytes: self.threshold_bytes,
        }
    }
}

impl<C, S> Studio<C, S>
where
    C: RasterCodec + 'static,
    S: GenerationService + 'static,
{
    pub fn new(codec: C, service: S) -> Self {
        Self::with_threshold(codec, service, DEFAULT_THRESHOLD_BYTES)
    }

    pub fn with_threshold(codec: C, service: S, threshold_bytes: usize) -> Self {
        Self {
            workflow: Arc::new(Mutex::new(Workflow::new())),
            codec: Arc::new(codec),
            service: Arc::new(service),
            threshold_bytes,
        }
    }

    pub fn threshold_bytes(&self) -> usize {
        self.threshold_bytes
    }

    /// Budget handed to the compression engine for oversized photos
    pub fn compression_budget(&self) -> usize {
        (self.threshold_bytes as f64 * SAFETY_MARGIN) as usize
    }

    /// Accept a photo; the preview decode runs in the background
    pub async fn upload_image(
        &self,
        data: impl Into<Arc<[u8]>>,
        file_name: &str,
        media_type: &str,
    ) -> Result<ImageId, WorkflowError> {
        let image = SourceImage::new(data, media_type, file_name);
        let (id, image) = {
            let mut workflow = self.workflow.lock().await;
            let id = workflow.upload_image(image)?;
            let image = workflow.image().cloned();
            (id, image)
        };

        if let (Some(image), Ok(handle)) = (image, tokio::runtime::Handle::try_current()) {
            let codec = Arc::clone(&self.codec);
            let workflow = Arc::clone(&self.workflow);
            handle.spawn(async move {
                match codec.decode(&image).await {
                    Ok(surface) => {
                        let (width, height) = codec.dimensions(&surface);
                        workflow.lock().await.record_preview(id, width, height);
                    }
                    Err(e) => warn!(image_id = id.0, error = %e, "Preview decode failed"),
                }
            });
        }

        Ok(id)
    }

    /// Compress if needed, request the front view, and merge the response
    pub async fn generate_front(&self, prompt: &str) -> RequestOutcome {
        let Some(ticket) = self.workflow.lock().await.begin_front(prompt) else {
            return RequestOutcome::Rejected;
        };

        let image_data = match self.prepare(&ticket).await {
            Ok(data) => data,
            Err(err) => return self.workflow.lock().await.fail(ticket, err),
        };

        let request = GenerateRequest {
            prompt: ticket.prompt.clone(),
            image_data,
            generate_angles: false,
        };
        let response = self.service.generate(&request).await;

        self.workflow.lock().await.finish(ticket, response)
    }

    /// Request side and back views for the current photo and prompt
    pub async fn generate_angles(&self) -> RequestOutcome {
        let Some(ticket) = self.workflow.lock().await.begin_angles() else {
            return RequestOutcome::Rejected;
        };

        // Only the front path compresses
        let request = GenerateRequest {
            prompt: ticket.prompt.clone(),
            image_data: general_purpose::STANDARD.encode(ticket.image.data()),
            generate_angles: true,
        };
        let response = self.service.generate(&request).await;

        self.workflow.lock().await.finish(ticket, response)
    }

    /// Start over with the same photo
    pub async fn clear_results(&self) -> bool {
        self.workflow.lock().await.clear_results()
    }

    pub async fn view(&self) -> WorkflowView {
        self.workflow.lock().await.view()
    }

    // Transport form of the ticket's image, compressed when over the threshold
    async fn prepare(&self, ticket: &Ticket) -> Result<String, WorkflowError> {
        let image = ticket.image.as_ref();
        if image.byte_len() <= self.threshold_bytes {
            debug!(size = image.byte_len(), "Image under threshold, sending as is");
            return Ok(general_purpose::STANDARD.encode(image.data()));
        }

        let budget = self.compression_budget();
        info!(
            size = image.byte_len(),
            threshold = self.threshold_bytes,
            budget,
            "Compressing image before upload"
        );
        let compressed = compress(self.codec.as_ref(), image, budget)
            .await
            .map_err(|e| {
                warn!(error = %e, "Compression failed");
                WorkflowError::compression(&e)
            })?;

        Ok(general_purpose::STANDARD.encode(&compressed.data))
    }
}
