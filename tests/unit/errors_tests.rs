/*!
 * Tests for error types and conversions
 */

use epub_gloss::errors::{AppError, DocumentError, ProviderError};

#[test]
fn test_providerError_requestFailed_shouldDisplayCorrectly() {
    let error = ProviderError::RequestFailed("Connection timeout".to_string());
    let display = format!("{}", error);
    assert!(display.contains("API request failed"));
    assert!(display.contains("Connection timeout"));
}

#[test]
fn test_providerError_apiError_shouldDisplayStatusAndMessage() {
    let error = ProviderError::ApiError {
        status_code: 500,
        message: "Internal error".to_string(),
    };
    let display = format!("{}", error);
    assert!(display.contains("500"));
    assert!(display.contains("Internal error"));
}

#[test]
fn test_providerError_fromStatus_shouldMapToVariant() {
    assert!(matches!(ProviderError::from_status(401, "x"), ProviderError::AuthenticationError(_)));
    assert!(matches!(ProviderError::from_status(403, "x"), ProviderError::AuthenticationError(_)));
    assert!(matches!(ProviderError::from_status(429, "x"), ProviderError::RateLimitExceeded(_)));
    assert!(matches!(
        ProviderError::from_status(502, "bad gateway"),
        ProviderError::ApiError { status_code: 502, .. }
    ));
}

#[test]
fn test_providerError_retriesExhausted_shouldIncludeLastError() {
    let error = ProviderError::RetriesExhausted {
        attempts: 5,
        last_error: Box::new(ProviderError::RateLimitExceeded("slow down".to_string())),
    };
    let display = format!("{}", error);
    assert!(display.contains("5 attempts"));
    assert!(display.contains("slow down"));
}

#[test]
fn test_documentError_markup_shouldNameLocation() {
    let error = DocumentError::Markup {
        location: "OEBPS/content.opf".to_string(),
        message: "unexpected end".to_string(),
    };
    assert_eq!(format!("{}", error), "Malformed markup in OEBPS/content.opf: unexpected end");
}

#[test]
fn test_appError_fromProviderError_shouldWrapCorrectly() {
    let app_error: AppError = ProviderError::ConnectionError("refused".to_string()).into();
    assert!(matches!(app_error, AppError::Provider(ProviderError::ConnectionError(_))));
    assert!(format!("{}", app_error).contains("refused"));
}

#[test]
fn test_appError_fromDocumentError_shouldWrapCorrectly() {
    let app_error: AppError = DocumentError::MissingEntry("mimetype".to_string()).into();
    assert!(matches!(app_error, AppError::Document(DocumentError::MissingEntry(_))));
}

#[test]
fn test_appError_fromIoError_shouldBecomeFileError() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.epub");
    let app_error: AppError = io_error.into();
    assert!(matches!(app_error, AppError::File(_)));
}
