//! Image upload endpoint
//!
//! - POST /api/admin/upload - multipart form with a single `file` field
//!
//! The file goes to whichever [`ImageStore`](crate::services::ImageStore)
//! is configured; the response carries the public URL.

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::services::{Action, Resource, StoredImage, UploadError};

impl From<UploadError> for ApiError {
    fn from(error: UploadError) -> Self {
        match error {
            UploadError::Missing => ApiError::field("file", "is required"),
            UploadError::UnsupportedType(content_type) => {
                ApiError::field("file", format!("type {} is not allowed", content_type))
            }
            UploadError::TooLarge { max } => {
                ApiError::field("file", format!("must be at most {} bytes", max))
            }
            UploadError::ContentMismatch => {
                ApiError::field("file", "content does not match its declared type")
            }
            UploadError::InternalError(e) => ApiError::internal(format!("{:#}", e)),
        }
    }
}

/// Nested under `/api/admin/upload`
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(upload_image))
}

fn multipart_error(error: MultipartError, max: u64) -> ApiError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::TooLarge { max }.into()
    } else {
        ApiError::bad_request(error.body_text())
    }
}

/// POST /api/admin/upload
async fn upload_image(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<StoredImage>), ApiError> {
    current.require(Resource::Upload, Action::Create)?;
    let uploads = &state.uploads;
    let max = uploads.max_file_size();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        uploads.check_type(&content_type)?;

        let bytes = field.bytes().await.map_err(|e| multipart_error(e, max))?;
        let stored = uploads
            .upload(filename.as_deref(), &content_type, bytes.to_vec())
            .await?;
        tracing::info!(user_id = current.user.id, url = %stored.url, "Image uploaded");
        return Ok((StatusCode::CREATED, Json(stored)));
    }

    Err(UploadError::Missing.into())
}
