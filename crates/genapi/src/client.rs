//! HTTP client for the generation service

use crate::error::ServiceError;
use crate::types::{GenerateRequest, GenerateResponse};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, error, info};

/// Anything that can turn a photo and a prompt into generated variations
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, ServiceError>;
}

/// Generation service client
pub struct GenapiClient {
    client: reqwest::Client,
    base_url: String,
}

impl GenapiClient {
    /// Create a client with reqwest defaults
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: normalize_base_url(base_url.into()),
        }
    }

    /// Create a client whose requests give up after `timeout`
    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: normalize_base_url(base_url.into()),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    /// Whether the service answers its health route
    pub async fn health(&self) -> Result<bool, ServiceError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;

        if !response.status().is_success() {
            return Ok(false);
        }
        let body = response.text().await?;
        Ok(body.trim() == "OK")
    }

    /// POST a generation request and parse the body
    pub async fn send(&self, request: &GenerateRequest) -> Result<GenerateResponse, ServiceError> {
        info!(
            generate_angles = request.generate_angles,
            prompt_len = request.prompt.len(),
            image_len = request.image_data.len(),
            "Calling generation service"
        );

        let response = self
            .client
            .post(self.generate_url())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!(%status, body = %body, "Generation service returned an error status");
            return Err(ServiceError::from_status(status.as_u16(), &body));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)?;
        debug!(
            success = parsed.success,
            variations = parsed.variations.len(),
            "Generation response received"
        );

        Ok(parsed)
    }
}

#[async_trait]
impl GenerationService for GenapiClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, ServiceError> {
        self.send(request).await
    }
}

fn normalize_base_url(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Angle;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    // Serve one canned HTTP response on a loopback port
    async fn serve_once(status: &'static str, body: &'static str) -> GenapiClient {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();

            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let content_length = text[..end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
        });

        GenapiClient {
            client: reqwest::Client::builder().no_proxy().build().unwrap(),
            base_url: format!("http://{}", addr),
        }
    }

    fn request() -> GenerateRequest {
        GenerateRequest {
            prompt: "textured crop".to_string(),
            image_data: "aGVsbG8=".to_string(),
            generate_angles: false,
        }
    }

    #[tokio::test]
    async fn test_send_parses_success() {
        let client = serve_once(
            "200 OK",
            r#"{"success":true,"variations":[{"image":"data:image/png;base64,QQ==","angle":"front"}]}"#,
        )
        .await;

        let response = client.send(&request()).await.unwrap();
        assert!(response.success);
        assert_eq!(response.variations.len(), 1);
        assert_eq!(response.variations[0].angle, Angle::Front);
    }

    #[tokio::test]
    async fn test_send_classifies_status() {
        let client = serve_once("429 Too Many Requests", "").await;
        assert!(matches!(
            client.send(&request()).await,
            Err(ServiceError::RateLimited)
        ));

        let client = serve_once("503 Service Unavailable", "upstream down").await;
        assert!(matches!(
            client.send(&request()).await,
            Err(ServiceError::Server { status: 503 })
        ));

        let client = serve_once(
            "400 Bad Request",
            r#"{"success":false,"variations":[],"message":"Invalid image data"}"#,
        )
        .await;
        match client.send(&request()).await {
            Err(err @ ServiceError::Status { status: 400, .. }) => {
                assert_eq!(err.user_message(), "Invalid image data");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_malformed_body() {
        let client = serve_once("200 OK", "<html>gateway</html>").await;
        assert!(matches!(
            client.send(&request()).await,
            Err(ServiceError::Malformed(_))
        ));
    }

    #[test]
    fn test_client_creation() {
        let client = GenapiClient::new("http://localhost:3001/");
        assert_eq!(client.base_url(), "http://localhost:3001");
        assert_eq!(client.generate_url(), "http://localhost:3001/api/generate");
    }

    #[test]
    fn test_client_with_timeout() {
        let client = GenapiClient::with_timeout("http://example.test", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://example.test");
    }
}
