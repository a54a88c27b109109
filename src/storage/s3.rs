//! S3-compatible object store.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::client::Waiters;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use tracing::{debug, info};

use super::ObjectStore;
use crate::config::StorageConfig;
use crate::{HangarError, Result};

/// How long `put` and `delete` wait for the bucket to reflect the change.
const WAIT_BUDGET: Duration = Duration::from_secs(60);

/// Object store backed by an S3 bucket.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    presign_expiry: Duration,
}

impl S3ObjectStore {
    /// Build a client from the AWS provider chain and make sure the bucket exists.
    ///
    /// A custom endpoint switches to path-style addressing, which MinIO and
    /// other S3-compatible servers expect.
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        let client = Client::from_conf(builder.build());

        let store = Self {
            client,
            bucket: config.bucket.clone(),
            presign_expiry: Duration::from_secs(config.presign_expiry_secs),
        };
        store.ensure_bucket(&config.region).await?;
        Ok(store)
    }

    /// Create the bucket unless we already own it. Any other failure is fatal.
    async fn ensure_bucket(&self, region: &str) -> Result<()> {
        let mut request = self.client.create_bucket().bucket(&self.bucket);
        if region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => {
                info!("Created bucket {}", self.bucket);
                Ok(())
            }
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_bucket_already_owned_by_you() {
                    debug!("Bucket {} already exists", self.bucket);
                    Ok(())
                } else {
                    Err(HangarError::Upstream(format!(
                        "cannot create bucket {}: {}",
                        self.bucket, service_err
                    )))
                }
            }
        }
    }

    /// Bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(HangarError::Upstream(service_err.to_string()))
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: Option<&str>) -> Result<()> {
        let size = data.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .set_content_type(content_type.map(str::to_string))
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| HangarError::Upstream(format!("upload of {key} failed: {e}")))?;

        self.client
            .wait_until_object_exists()
            .bucket(&self.bucket)
            .key(key)
            .wait(WAIT_BUDGET)
            .await
            .map_err(|e| HangarError::Upstream(format!("{key} did not appear: {e}")))?;

        debug!(key, size, "Stored object");
        Ok(())
    }

    async fn get_link(&self, key: &str) -> Result<String> {
        if !self.exists(key).await? {
            return Err(HangarError::ObjectNotFound(key.to_string()));
        }

        let presigning = PresigningConfig::expires_in(self.presign_expiry)
            .map_err(|e| HangarError::Config(format!("invalid presign expiry: {e}")))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| HangarError::Upstream(format!("cannot presign {key}: {e}")))?;
        Ok(request.uri().to_string())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if !self.exists(key).await? {
            return Err(HangarError::ObjectNotFound(key.to_string()));
        }

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| HangarError::Upstream(format!("delete of {key} failed: {e}")))?;

        self.client
            .wait_until_object_not_exists()
            .bucket(&self.bucket)
            .key(key)
            .wait(WAIT_BUDGET)
            .await
            .map_err(|e| HangarError::Upstream(format!("{key} was not removed: {e}")))?;

        debug!(key, "Deleted object");
        Ok(())
    }
}

impl std::fmt::Debug for S3ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3ObjectStore")
            .field("bucket", &self.bucket)
            .finish()
    }
}
