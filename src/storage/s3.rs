//! S3 object store implementation

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::debug;

use super::traits::{ListingPage, ObjectStore};
use crate::error::{Error, Result};

/// S3-backed object store scoped to one bucket and base object path.
/// Holds no state between calls beyond the SDK client.
pub struct S3Store {
    client: Client,
    bucket: String,
    base: String,
}

impl S3Store {
    pub fn new(client: Client, bucket: &str, base: &str) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
            base: base.trim_end_matches('/').to_string(),
        }
    }

    /// Build an S3 client for `region` from the ambient AWS environment.
    pub async fn client_for_region(region: &str) -> Client {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;
        Client::new(&config)
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}/{}", self.base, key)
    }

    fn strip(&self, full_key: &str) -> String {
        full_key.replace(&format!("{}/", self.base), "")
    }

    fn list_error(&self, message: String) -> Error {
        Error::List {
            message,
            bucket: self.bucket.clone(),
            prefix: self.base.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn base_path(&self) -> &str {
        &self.base
    }

    async fn list_page(&self, prefix: &str, cursor: Option<String>) -> Result<ListingPage> {
        let full_prefix = self.full_key(prefix);
        let mut request = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&full_prefix);
        if let Some(token) = cursor {
            request = request.continuation_token(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.list_error(e.to_string()))?;

        let keys: Vec<String> = response
            .contents()
            .iter()
            .filter_map(|object| object.key())
            .map(|key| self.strip(key))
            .collect();
        let next_cursor = response.next_continuation_token().map(str::to_string);

        debug!(
            bucket = %self.bucket,
            prefix = %full_prefix,
            count = keys.len(),
            "listed object page"
        );
        Ok(ListingPage { keys, next_cursor })
    }

    async fn get(&self, key: &str, dest: &Path) -> Result<PathBuf> {
        let full_key = self.full_key(key);
        let download_error = |message: String| Error::Download {
            message,
            remote_key: full_key.clone(),
        };

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| download_error(format!("failed to create local directory: {}", e)))?;
        }

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .send()
            .await
            .map_err(|e| download_error(format!("failed to download file: {}", e)))?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| download_error(format!("failed to create local file: {}", e)))?;
        let mut body = response.body.into_async_read();
        if let Err(e) = tokio::io::copy(&mut body, &mut file).await {
            // Never leave a truncated download behind.
            drop(file);
            let _ = tokio::fs::remove_file(dest).await;
            return Err(download_error(format!("failed to write local file: {}", e)));
        }

        debug!(key = %full_key, dest = %dest.display(), "downloaded object");
        Ok(dest.to_path_buf())
    }

    async fn put(&self, local: &Path, key: &str) -> Result<String> {
        if !local.exists() {
            return Err(Error::NotFound(local.to_path_buf()));
        }
        let full_key = self.full_key(key);

        let body = ByteStream::from_path(local).await.map_err(|e| Error::Download {
            message: format!("failed to read local file: {}", e),
            remote_key: full_key.clone(),
        })?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Download {
                message: format!("failed to upload file: {}", e),
                remote_key: full_key.clone(),
            })?;

        debug!(key = %full_key, "uploaded object");
        Ok(full_key)
    }

    async fn latest(&self, prefix: &str) -> Result<Option<String>> {
        let full_prefix = self.full_key(prefix);
        let mut latest_key: Option<String> = None;
        let mut latest_time: Option<aws_sdk_s3::primitives::DateTime> = None;
        let mut cursor: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&full_prefix);
            if let Some(token) = cursor.take() {
                request = request.continuation_token(token);
            }
            let response = request
                .send()
                .await
                .map_err(|e| self.list_error(e.to_string()))?;

            for object in response.contents() {
                let (Some(key), Some(modified)) = (object.key(), object.last_modified()) else {
                    continue;
                };
                // Strictly greater only: ties keep the first key encountered.
                if latest_time.as_ref().map_or(true, |t| modified > t) {
                    latest_time = Some(modified.clone());
                    latest_key = Some(self.strip(key));
                }
            }

            match response.next_continuation_token() {
                Some(token) => cursor = Some(token.to_string()),
                None => break,
            }
        }

        Ok(latest_key)
    }
}
