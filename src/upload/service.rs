use bytes::Bytes;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const ALLOWED_MIME_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];
const SIGNED_URL_TTL_SECS: u64 = 3600;

#[derive(Debug)]
pub struct UploadedImage {
    pub key: String,
    pub url: String,
    pub size: usize,
    pub content_type: String,
}

pub(crate) fn ext_for_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

pub(crate) fn check_content_type(ct: &str) -> Result<(), ApiError> {
    if ALLOWED_MIME_TYPES.contains(&ct) {
        Ok(())
    } else {
        Err(ApiError::Validation(
            "Invalid file type. Only JPEG, PNG, and WebP images are allowed.".into(),
        ))
    }
}

/// Bucket key: `fg-<unix millis>-<short id>.<ext>`.
pub(crate) fn object_key(content_type: &str) -> String {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    let id = Uuid::new_v4().to_string();
    let short = id.split('-').next().unwrap_or("0");
    let ext = ext_for_mime(content_type).unwrap_or("jpg");
    format!("fg-{millis}-{short}.{ext}")
}

/// Validate, store, and presign one uploaded image. Prompt and style travel
/// as object metadata so the gallery can show provenance.
pub async fn store_image(
    st: &AppState,
    user_id: Uuid,
    body: Bytes,
    content_type: &str,
    prompt: Option<String>,
    style: Option<String>,
) -> Result<UploadedImage, ApiError> {
    check_content_type(content_type)?;
    if body.is_empty() {
        return Err(ApiError::Validation("No image file provided".into()));
    }
    if body.len() > MAX_UPLOAD_BYTES {
        return Err(ApiError::Validation("File exceeds upload size limit".into()));
    }

    let size = body.len();
    let key = object_key(content_type);
    let metadata = vec![
        ("user-id".to_string(), user_id.to_string()),
        ("prompt".to_string(), prompt.unwrap_or_default()),
        ("style".to_string(), style.unwrap_or_default()),
    ];

    st.storage
        .put_object(&key, body, content_type, metadata)
        .await?;
    let url = st.storage.presign_get(&key, SIGNED_URL_TTL_SECS).await?;

    info!(user_id = %user_id, key = %key, size, "image uploaded");
    Ok(UploadedImage {
        key,
        url,
        size,
        content_type: content_type.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ext_for_known_mime_types() {
        assert_eq!(ext_for_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_for_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_for_mime("image/png"), Some("png"));
        assert_eq!(ext_for_mime("image/webp"), Some("webp"));
        assert_eq!(ext_for_mime("application/octet-stream"), None);
    }

    #[test]
    fn content_type_whitelist() {
        assert!(check_content_type("image/png").is_ok());
        assert!(check_content_type("image/gif").is_err());
        assert!(check_content_type("text/html").is_err());
    }

    #[test]
    fn object_key_shape() {
        let key = object_key("image/png");
        assert!(key.starts_with("fg-"));
        assert!(key.ends_with(".png"));
        assert_eq!(key.split('-').count(), 3);
    }

    #[tokio::test]
    async fn store_image_happy_path() {
        let st = crate::state::AppState::fake();
        let body = Bytes::from_static(&[0u8; 64]);
        let uploaded = store_image(
            &st,
            Uuid::new_v4(),
            body,
            "image/jpeg",
            Some("a red fox".into()),
            None,
        )
        .await
        .expect("upload");
        assert_eq!(uploaded.size, 64);
        assert!(uploaded.url.contains(&uploaded.key));
        assert_eq!(uploaded.content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn store_image_rejects_bad_mime() {
        let st = crate::state::AppState::fake();
        let err = store_image(
            &st,
            Uuid::new_v4(),
            Bytes::from_static(b"x"),
            "image/gif",
            None,
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn store_image_rejects_empty_body() {
        let st = crate::state::AppState::fake();
        let err = store_image(&st, Uuid::new_v4(), Bytes::new(), "image/png", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
