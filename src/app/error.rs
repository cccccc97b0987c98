use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("No file part")]
    NoFilePart,

    #[error("No selected file")]
    NoSelectedFile,

    #[error("Only JPEG images are allowed")]
    NotJpeg,

    #[error("Failed to read upload: {0}")]
    Upload(#[from] MultipartError),

    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Unable to confidently detect a tomato plant disease in this image")]
    LowConfidence { class_index: usize, confidence: f64 },

    #[error("Inference failed: {0}")]
    Inference(#[from] tch::TchError),

    #[error("Failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Detection worker failed: {0}")]
    Worker(String),
}

impl DetectError {
    pub fn status(&self) -> StatusCode {
        match self {
            DetectError::NoFilePart
            | DetectError::NoSelectedFile
            | DetectError::NotJpeg
            | DetectError::Decode(_) => StatusCode::BAD_REQUEST,
            // 413 for body-limit overruns, 400 for malformed bodies
            DetectError::Upload(e) => e.status(),
            DetectError::LowConfidence { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            DetectError::Inference(_) | DetectError::Encode(_) | DetectError::Worker(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for DetectError {
    fn into_response(self) -> Response {
        let status = self.status();
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_match_client_expectations() {
        assert_eq!(DetectError::NoFilePart.to_string(), "No file part");
        assert_eq!(DetectError::NoSelectedFile.to_string(), "No selected file");
        assert_eq!(
            DetectError::NotJpeg.to_string(),
            "Only JPEG images are allowed"
        );
        let low = DetectError::LowConfidence {
            class_index: 3,
            confidence: 0.42,
        };
        assert_eq!(
            low.to_string(),
            "Unable to confidently detect a tomato plant disease in this image"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(DetectError::NotJpeg.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            DetectError::LowConfidence {
                class_index: 0,
                confidence: 0.1
            }
            .status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            DetectError::Worker("panicked".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
