use anyhow::Context;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    presigning::PresigningConfig,
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use axum::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;

use crate::config::StorageConfig;

/// Object listed from the bucket.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub key: String,
    pub size: i64,
    pub last_modified: Option<OffsetDateTime>,
}

#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        metadata: Vec<(String, String)>,
    ) -> anyhow::Result<()>;
    async fn list_objects(&self) -> anyhow::Result<Vec<StoredObject>>;
    async fn presign_get(&self, key: &str, seconds: u64) -> anyhow::Result<String>;
}

#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
}

impl Storage {
    pub async fn new(cfg: &StorageConfig) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(Credentials::new(
                cfg.access_key.clone(),
                cfg.secret_key.clone(),
                None,
                None,
                "static",
            ))
            .endpoint_url(&cfg.endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&cfg.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: cfg.bucket.clone(),
        })
    }
}

#[async_trait]
impl StorageClient for Storage {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        metadata: Vec<(String, String)>,
    ) -> anyhow::Result<()> {
        let mut req = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type);
        for (k, v) in metadata {
            req = req.metadata(k, v);
        }
        req.send().await.context("s3 put_object")?;
        Ok(())
    }

    async fn list_objects(&self) -> anyhow::Result<Vec<StoredObject>> {
        let resp = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .send()
            .await
            .context("s3 list_objects_v2")?;

        let objects = resp
            .contents()
            .iter()
            .filter_map(|o| {
                let key = o.key()?.to_string();
                Some(StoredObject {
                    key,
                    size: o.size().unwrap_or(0),
                    last_modified: o
                        .last_modified()
                        .and_then(|dt| OffsetDateTime::from_unix_timestamp(dt.secs()).ok()),
                })
            })
            .collect();
        Ok(objects)
    }

    async fn presign_get(&self, key: &str, seconds: u64) -> anyhow::Result<String> {
        let req = self.client.get_object().bucket(&self.bucket).key(key);
        let presigned = req
            .presigned(PresigningConfig::expires_in(
                std::time::Duration::from_secs(seconds),
            )?)
            .await
            .context("s3 presign_get")?;
        Ok(presigned.uri().to_string())
    }
}
