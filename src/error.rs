use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::info;

use crate::{listing::ListingError, pages, upload::UploadError};

/// Failures that end a request with an error page.
#[derive(Debug, Error)]
pub enum ShareError {
    #[error("File not found")]
    NotFound,
    #[error("{0}")]
    BadRequest(String),
    #[error("Uploads must declare a Content-Length")]
    LengthRequired,
}

impl ShareError {
    pub fn status(&self) -> StatusCode {
        match self {
            ShareError::NotFound => StatusCode::NOT_FOUND,
            ShareError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ShareError::LengthRequired => StatusCode::LENGTH_REQUIRED,
        }
    }
}

// Listing failures, permission errors included, are reported as missing.
impl From<ListingError> for ShareError {
    fn from(err: ListingError) -> Self {
        info!(error = %err, "directory listing failed");
        ShareError::NotFound
    }
}

impl IntoResponse for ShareError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, pages::error_page(status, &self.to_string())).into_response()
    }
}

impl UploadError {
    /// Status used when upload failures are not reported as 200.
    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::MalformedBody
            | UploadError::MissingFilename
            | UploadError::TruncatedBody => StatusCode::BAD_REQUEST,
            UploadError::WritePermissionDenied { .. } => StatusCode::FORBIDDEN,
            UploadError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{io, path::PathBuf};

    #[test]
    fn listing_errors_become_not_found() {
        let err = ListingError::DirectoryUnreadable {
            path: PathBuf::from("/locked"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        let share: ShareError = err.into();
        assert_eq!(share.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn upload_error_statuses() {
        assert_eq!(UploadError::TruncatedBody.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            UploadError::WritePermissionDenied {
                path: PathBuf::from("/x"),
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            }
            .status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            UploadError::Io(io::Error::from(io::ErrorKind::Other)).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn error_response_uses_mapped_status() {
        let response = ShareError::LengthRequired.into_response();
        assert_eq!(response.status(), StatusCode::LENGTH_REQUIRED);
    }
}
