use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    middleware,
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::instrument;

use super::service::{self, MAX_UPLOAD_BYTES};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::rate_limit::{rate_limit_layer, RateLimiter};
use crate::state::AppState;

pub fn routes(upload_limiter: RateLimiter) -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload))
        .route_layer(middleware::from_fn(rate_limit_layer(upload_limiter)))
        // Headroom for multipart framing around the image itself.
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 64 * 1024))
}

#[derive(Debug, Serialize)]
pub struct UploadMetadata {
    pub size: usize,
    #[serde(rename = "type")]
    pub content_type: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub url: String,
    pub key: String,
    pub metadata: UploadMetadata,
}

/// POST /upload (multipart): one `image` file field, optional `prompt` and
/// `style` text fields.
#[instrument(skip(state, user, mp))]
pub async fn upload(
    State(state): State<AppState>,
    user: AuthUser,
    mut mp: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut image: Option<(Bytes, String)> = None;
    let mut prompt: Option<String> = None;
    let mut style: Option<String> = None;

    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(e.to_string()))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("image") => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Validation(e.to_string()))?;
                image = Some((data, content_type));
            }
            Some("prompt") => {
                prompt = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::Validation(e.to_string()))?,
                );
            }
            Some("style") => {
                style = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::Validation(e.to_string()))?,
                );
            }
            _ => {}
        }
    }

    let (body, content_type) =
        image.ok_or_else(|| ApiError::Validation("No image file provided".into()))?;

    let uploaded = service::store_image(&state, user.id, body, &content_type, prompt, style).await?;

    Ok(Json(UploadResponse {
        message: "Image uploaded successfully".into(),
        url: uploaded.url,
        key: uploaded.key,
        metadata: UploadMetadata {
            size: uploaded.size,
            content_type: uploaded.content_type,
        },
    }))
}
