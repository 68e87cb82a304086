use crate::error::{FinanceGuardError, FinanceGuardResult};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use validator::{Validate, ValidationErrors};

pub fn validate_model<T: Validate>(model: &T) -> FinanceGuardResult<()> {
    match model.validate() {
        Ok(()) => Ok(()),
        Err(errors) => {
            let error_messages = format_validation_errors(&errors);
            Err(FinanceGuardError::validation("model", error_messages))
        }
    }
}

pub fn format_validation_errors(errors: &ValidationErrors) -> String {
    let mut messages = Vec::new();

    for (field, field_errors) in errors.field_errors() {
        for error in field_errors {
            let message = match (&error.message, error.code.as_ref()) {
                (Some(message), _) => message.to_string(),
                (None, "length") => format!("Length validation failed for field '{}'", field),
                (None, "range") => format!("Value out of range for field '{}'", field),
                (None, "required") => format!("Field '{}' is required", field),
                (None, code) => format!("Validation failed for field '{}': {}", field, code),
            };
            messages.push(message);
        }
    }

    // Nested structs report their own field errors
    for (field, kind) in errors.errors() {
        if let validator::ValidationErrorsKind::Struct(inner) = kind {
            messages.push(format!("{}: {}", field, format_validation_errors(inner)));
        }
    }

    messages.join(", ")
}

/// A file as received from the reviewer, before anything is sent anywhere.
#[derive(Debug, Clone, Copy)]
pub struct UploadCandidate<'a> {
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub size_bytes: u64,
}

/// Checks that an upload is a PDF within the size limit.
pub fn validate_pdf_upload(upload: &UploadCandidate<'_>, max_size: u64) -> FinanceGuardResult<()> {
    if upload.file_name.trim().is_empty() {
        return Err(FinanceGuardError::validation("file", "No file provided"));
    }
    validate_pdf_content_type(upload.content_type)?;
    validate_file_size(upload.size_bytes, max_size)
}

pub fn validate_pdf_content_type(content_type: &str) -> FinanceGuardResult<()> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    if !essence.contains("pdf") {
        return Err(FinanceGuardError::validation(
            "file_type",
            format!(
                "Invalid file type '{}'. Please upload a PDF document",
                if essence.is_empty() { "unknown" } else { essence.as_str() }
            ),
        ));
    }

    Ok(())
}

pub fn validate_file_size(file_size: u64, max_size: u64) -> FinanceGuardResult<()> {
    if file_size > max_size {
        return Err(FinanceGuardError::validation(
            "file_size",
            format!(
                "File too large ({}). Please upload a file smaller than {}",
                format_file_size(file_size),
                format_file_size(max_size)
            ),
        ));
    }

    Ok(())
}

/// Human readable size: bytes, KB with one decimal, or MB with one decimal.
pub fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;

    if bytes < KB {
        format!("{} bytes", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    }
}

/// Decodes a `data:image/...;base64,` URL, returning the image bytes.
pub fn decode_image_data_url(data_url: &str) -> FinanceGuardResult<Vec<u8>> {
    let (header, payload) = data_url
        .split_once(',')
        .ok_or_else(|| FinanceGuardError::validation("image", "Image must be a data URL"))?;

    let is_base64_image = header
        .strip_prefix("data:image/")
        .map(|rest| rest.ends_with(";base64"))
        .unwrap_or(false);
    if !is_base64_image {
        return Err(FinanceGuardError::validation(
            "image",
            "Image must be a base64 encoded data:image URL",
        ));
    }

    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|e| FinanceGuardError::validation("image", format!("Invalid base64 image: {}", e)))?;
    if bytes.is_empty() {
        return Err(FinanceGuardError::validation("image", "Image is empty"));
    }

    Ok(bytes)
}
