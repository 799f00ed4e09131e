use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::Value;
use thiserror::Error;

use crate::models::ErrorBody;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("No image uploaded")]
    MissingImage,

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("Image exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    #[error("Upload exceeds the {limit} byte limit")]
    UploadTooLarge { limit: usize },

    /// The classifier answered with a non-success status. `detail` carries its
    /// body untouched: parsed JSON when possible, otherwise the raw text.
    #[error("{message} (status {status})")]
    Upstream {
        status: u16,
        message: String,
        detail: Option<Value>,
    },

    #[error("Classification failed: {detail}")]
    Transport { detail: String },
}

impl RelayError {
    pub fn body(&self) -> ErrorBody {
        match self {
            RelayError::MissingImage
            | RelayError::PayloadTooLarge { .. }
            | RelayError::UploadTooLarge { .. } => ErrorBody {
                error: self.to_string(),
                detail: None,
            },
            RelayError::InvalidUpload(reason) => ErrorBody {
                error: "Invalid upload".to_string(),
                detail: Some(Value::String(reason.clone())),
            },
            RelayError::Upstream {
                message, detail, ..
            } => ErrorBody {
                error: message.clone(),
                detail: detail.clone(),
            },
            RelayError::Transport { detail } => ErrorBody {
                error: "Classification failed".to_string(),
                detail: Some(Value::String(detail.clone())),
            },
        }
    }
}

impl ResponseError for RelayError {
    fn status_code(&self) -> StatusCode {
        match self {
            RelayError::MissingImage | RelayError::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            RelayError::PayloadTooLarge { .. } | RelayError::UploadTooLarge { .. } => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            RelayError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            RelayError::Transport { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self.body())
    }
}
