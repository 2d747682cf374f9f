use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::instrument;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::StorageClient;

const SIGNED_URL_TTL_SECS: u64 = 3600;

#[derive(Debug, Serialize)]
pub struct GalleryItem {
    pub key: String,
    pub url: String,
    pub size: i64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub uploaded: Option<OffsetDateTime>,
}

#[derive(Debug, Serialize)]
pub struct GalleryResponse {
    pub images: Vec<GalleryItem>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/gallery", get(list_gallery))
}

#[instrument(skip(state, _user))]
pub async fn list_gallery(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<Json<GalleryResponse>, ApiError> {
    let images = build_gallery(state.storage.as_ref()).await?;
    Ok(Json(GalleryResponse { images }))
}

/// List the bucket and sign a time-limited GET URL per object, newest first.
pub(crate) async fn build_gallery(
    storage: &dyn StorageClient,
) -> anyhow::Result<Vec<GalleryItem>> {
    let mut objects = storage.list_objects().await?;
    objects.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));

    let mut images = Vec::with_capacity(objects.len());
    for o in objects {
        let url = storage.presign_get(&o.key, SIGNED_URL_TTL_SECS).await?;
        images.push(GalleryItem {
            key: o.key,
            url,
            size: o.size,
            uploaded: o.last_modified,
        });
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoredObject;
    use axum::async_trait;
    use bytes::Bytes;

    struct ListingStorage;

    #[async_trait]
    impl StorageClient for ListingStorage {
        async fn put_object(
            &self,
            _k: &str,
            _b: Bytes,
            _ct: &str,
            _meta: Vec<(String, String)>,
        ) -> anyhow::Result<()> {
            Ok(())
        }
        async fn list_objects(&self) -> anyhow::Result<Vec<StoredObject>> {
            let older = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
            let newer = OffsetDateTime::from_unix_timestamp(1_700_100_000).unwrap();
            Ok(vec![
                StoredObject {
                    key: "fg-1-old.jpg".into(),
                    size: 10,
                    last_modified: Some(older),
                },
                StoredObject {
                    key: "fg-2-new.png".into(),
                    size: 20,
                    last_modified: Some(newer),
                },
            ])
        }
        async fn presign_get(&self, k: &str, _s: u64) -> anyhow::Result<String> {
            Ok(format!("https://fake.local/{}", k))
        }
    }

    #[tokio::test]
    async fn gallery_is_signed_and_newest_first() {
        let images = build_gallery(&ListingStorage).await.unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].key, "fg-2-new.png");
        assert_eq!(images[0].url, "https://fake.local/fg-2-new.png");
        assert_eq!(images[1].key, "fg-1-old.jpg");
    }
}
