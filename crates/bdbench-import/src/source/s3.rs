//! S3 object store.
//!
//! The SDK is async; workers are plain threads, so every call is driven
//! through a handle to the runtime owned by the binary.

use super::{ObjectStore, RemoteObject, transport_error};
use crate::Result;
use aws_config::BehaviorVersion;
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::error::DisplayErrorContext;
use tokio::runtime::Handle;

/// Region of the public benchmark bucket.
const DEFAULT_REGION: &str = "us-east-1";

/// S3 connection settings.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    /// Region used when the environment does not name one.
    pub region: String,
    /// Send unsigned requests (public buckets).
    pub anonymous: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: "big-data-benchmark".to_string(),
            region: DEFAULT_REGION.to_string(),
            anonymous: false,
        }
    }
}

/// [`ObjectStore`] over one S3 bucket.
pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
    runtime: Handle,
}

impl S3ObjectStore {
    /// Load the AWS configuration and build a client.
    ///
    /// Must not be called from inside the runtime behind `runtime`.
    pub fn connect(config: &S3Config, runtime: Handle) -> Self {
        let region = RegionProviderChain::default_provider().or_else(
            aws_config::Region::new(config.region.clone()),
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region);
        if config.anonymous {
            loader = loader.no_credentials();
        }
        let sdk_config = runtime.block_on(loader.load());

        tracing::info!(
            "Initialized S3 client for bucket: {}{}",
            config.bucket,
            if config.anonymous { " (unsigned)" } else { "" }
        );

        Self {
            client: S3Client::new(&sdk_config),
            bucket: config.bucket.clone(),
            runtime,
        }
    }

    async fn list_async(&self, prefix: &str) -> Result<Vec<RemoteObject>> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);

            if let Some(token) = continuation_token {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| transport_error("list_objects_v2", DisplayErrorContext(e)))?;

            for obj in response.contents() {
                if let Some(key) = obj.key() {
                    objects.push(RemoteObject {
                        key: key.to_string(),
                        size: obj.size().unwrap_or(0).max(0) as u64,
                    });
                }
            }

            if response.is_truncated().unwrap_or(false) {
                continuation_token = response.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }

        Ok(objects)
    }

    async fn get_async(&self, key: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| transport_error(key, DisplayErrorContext(e)))?;

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| transport_error(key, e))?;

        Ok(body.into_bytes().to_vec())
    }
}

impl ObjectStore for S3ObjectStore {
    fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>> {
        self.runtime.block_on(self.list_async(prefix))
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.runtime.block_on(self.get_async(key))
    }

    fn describe(&self) -> String {
        format!("s3://{}", self.bucket)
    }
}
