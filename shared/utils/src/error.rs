use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message shown to the reviewer whenever the backend cannot answer.
pub const RETRY_MESSAGE: &str =
    "Error regarding agent response about user query. Please try again.";

#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum FinanceGuardError {
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Document processing error: {message}")]
    DocumentProcessing { message: String },

    #[error("Text extraction failed on page {page}: {message}")]
    PageExtraction { page: u32, message: String },

    #[error("No document loaded")]
    NoDocument,

    #[error("Authentication error: {message}")]
    Authentication { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("External service error: {service} - {message}")]
    ExternalService { service: String, message: String },

    /// The backend answered with a status it considers a failure.
    #[error("{service} returned {status}: {message}")]
    Upstream {
        service: String,
        status: u16,
        message: String,
    },

    #[error("Unsupported response: {message}")]
    UnsupportedResponse { message: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl FinanceGuardError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn document_processing(message: impl Into<String>) -> Self {
        Self::DocumentProcessing {
            message: message.into(),
        }
    }

    pub fn page_extraction(page: u32, message: impl Into<String>) -> Self {
        Self::PageExtraction {
            page,
            message: message.into(),
        }
    }

    pub fn external_service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalService {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn upstream(service: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Upstream {
            service: service.into(),
            status,
            message: message.into(),
        }
    }

    pub fn unsupported_response(message: impl Into<String>) -> Self {
        Self::UnsupportedResponse {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::DocumentProcessing { .. } => "DOCUMENT_PROCESSING_ERROR",
            Self::PageExtraction { .. } => "PAGE_EXTRACTION_ERROR",
            Self::NoDocument => "NO_DOCUMENT",
            Self::Authentication { .. } => "AUTHENTICATION_ERROR",
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::ExternalService { .. } => "EXTERNAL_SERVICE_ERROR",
            Self::Upstream { .. } => "UPSTREAM_ERROR",
            Self::UnsupportedResponse { .. } => "UNSUPPORTED_RESPONSE",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Internal { .. } => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::DocumentProcessing { .. } => 422,
            Self::PageExtraction { .. } => 422,
            Self::NoDocument => 409,
            Self::Authentication { .. } => 401,
            Self::Configuration { .. } => 500,
            Self::ExternalService { .. } => 502,
            Self::Upstream { status, .. } if *status < 500 => 400,
            Self::Upstream { .. } => 502,
            Self::UnsupportedResponse { .. } => 502,
            Self::NotFound { .. } => 404,
            Self::Internal { .. } => 500,
        }
    }

    /// Whether asking again may succeed without the user changing anything.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ExternalService { .. } => true,
            Self::Upstream { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Text safe to show to the reviewer.
    ///
    /// Validation and backend-supplied messages are surfaced verbatim; network
    /// failures collapse to the generic retry message.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { message, .. } => message.clone(),
            Self::Upstream { message, .. } => message.clone(),
            Self::Authentication { message } => message.clone(),
            Self::NoDocument => "No PDF document loaded".to_string(),
            Self::NotFound { .. } => self.to_string(),
            _ if self.is_retryable() => RETRY_MESSAGE.to_string(),
            Self::UnsupportedResponse { .. } => RETRY_MESSAGE.to_string(),
            _ => self.to_string(),
        }
    }
}

pub type FinanceGuardResult<T> = Result<T, FinanceGuardError>;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub message: String,
    pub retryable: bool,
    pub timestamp: String,
    pub details: Option<serde_json::Value>,
}

impl From<FinanceGuardError> for ErrorResponse {
    fn from(error: FinanceGuardError) -> Self {
        Self {
            error: error.user_message(),
            code: error.error_code().to_string(),
            message: error.to_string(),
            retryable: error.is_retryable(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            details: None,
        }
    }
}

// Conversion from common error types
impl From<reqwest::Error> for FinanceGuardError {
    fn from(error: reqwest::Error) -> Self {
        Self::external_service("HTTP Client", error.to_string())
    }
}

impl From<serde_json::Error> for FinanceGuardError {
    fn from(error: serde_json::Error) -> Self {
        Self::validation("JSON", error.to_string())
    }
}
