//! Analysis Backend Client
//!
//! HTTP client for the external analysis backend: chat queries, PDF uploads
//! and area analysis. Requests are validated here, before anything touches
//! the network.

use financeguard_models::{
    AreaAnalysisRequest, AreaAnalysisResponse, BackendResponse, ChatRequest, PdfUploadResponse,
};
use reqwest::{multipart, Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::error::{FinanceGuardError, FinanceGuardResult, RETRY_MESSAGE};
use crate::validation::{decode_image_data_url, validate_model, validate_pdf_upload, UploadCandidate};

const SERVICE: &str = "Analysis backend";

/// Client for the analysis backend.
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    chat_url: String,
    upload_url: String,
    area_analysis_url: String,
    api_key: Option<String>,
    max_upload_bytes: u64,
}

impl BackendClient {
    pub fn new(config: &AppConfig) -> FinanceGuardResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.backend.timeout_seconds))
            .build()
            .map_err(|e| FinanceGuardError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            chat_url: config.backend_url(&config.backend.chat_path),
            upload_url: config.backend_url(&config.backend.upload_path),
            area_analysis_url: config.backend_url(&config.backend.area_analysis_path),
            api_key: config.backend.api_key.clone(),
            max_upload_bytes: config.upload.max_file_size,
        })
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    /// Ask the backend about the document.
    pub async fn chat(&self, request: &ChatRequest) -> FinanceGuardResult<BackendResponse> {
        validate_model(request)?;

        let response = self
            .authorized(self.client.post(&self.chat_url))
            .json(request)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FinanceGuardError::Authentication {
                message: format!("Backend rejected credentials ({})", status.as_u16()),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "Chat request failed");
            let message = if status.is_server_error() {
                RETRY_MESSAGE.to_string()
            } else {
                error_message_from_body(&body)
                    .unwrap_or_else(|| format!("Backend error: {}", status.as_u16()))
            };
            return Err(FinanceGuardError::upstream(SERVICE, status.as_u16(), message));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| FinanceGuardError::unsupported_response(format!("Chat reply is not JSON: {}", e)))?;
        parse_backend_response(body)
    }

    /// Forward a PDF to the backend's upload endpoint.
    pub async fn upload_pdf(
        &self,
        file_name: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> FinanceGuardResult<PdfUploadResponse> {
        let size_bytes = data.len() as u64;
        validate_pdf_upload(
            &UploadCandidate {
                file_name,
                content_type,
                size_bytes,
            },
            self.max_upload_bytes,
        )?;

        let part = multipart::Part::bytes(data)
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .map_err(|e| FinanceGuardError::validation("file_type", e.to_string()))?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("fileName", file_name.to_string())
            .text("fileSize", size_bytes.to_string());

        debug!(file_name, size_bytes, "Forwarding PDF upload");
        let response = self
            .authorized(self.client.post(&self.upload_url))
            .multipart(form)
            .send()
            .await
            .map_err(network_error)?;

        let response = ensure_success(response).await?;
        response
            .json()
            .await
            .map_err(|e| FinanceGuardError::unsupported_response(format!("Upload reply is not JSON: {}", e)))
    }

    /// Ask the backend to describe a captured region of a page.
    pub async fn analyze_area(
        &self,
        request: &AreaAnalysisRequest,
    ) -> FinanceGuardResult<AreaAnalysisResponse> {
        validate_model(request)?;
        decode_image_data_url(&request.image)?;

        let response = self
            .authorized(self.client.post(&self.area_analysis_url))
            .json(request)
            .send()
            .await
            .map_err(network_error)?;

        let response = ensure_success(response).await?;
        response
            .json()
            .await
            .map_err(|e| FinanceGuardError::unsupported_response(format!("Analysis reply is not JSON: {}", e)))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

/// Turn a chat reply body into the typed union, rejecting unknown shapes.
pub fn parse_backend_response(body: serde_json::Value) -> FinanceGuardResult<BackendResponse> {
    let kind = body
        .get("type")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    match kind {
        Some(kind) if BackendResponse::KINDS.contains(&kind.as_str()) => {
            serde_json::from_value(body).map_err(|e| {
                warn!(kind = %kind, error = %e, "Malformed chat reply");
                FinanceGuardError::unsupported_response(format!("Malformed '{}' reply: {}", kind, e))
            })
        }
        Some(kind) => {
            warn!(kind = %kind, "Unsupported message type");
            Err(FinanceGuardError::unsupported_response(format!(
                "Unsupported message type '{}'",
                kind
            )))
        }
        None => {
            let message = body
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("Reply has no message type")
                .to_string();
            warn!(message = %message, "Chat reply without type");
            Err(FinanceGuardError::unsupported_response(message))
        }
    }
}

fn network_error(error: reqwest::Error) -> FinanceGuardError {
    warn!(error = %error, "Backend unreachable");
    FinanceGuardError::external_service(SERVICE, error.to_string())
}

async fn ensure_success(response: Response) -> FinanceGuardResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), body = %body, "Backend request failed");
    let message = error_message_from_body(&body)
        .unwrap_or_else(|| format!("Backend error: {}", status.as_u16()));
    Err(FinanceGuardError::upstream(SERVICE, status.as_u16(), message))
}

fn error_message_from_body(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["error", "message"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(str::to_string)
}
