//! In-memory object store
//!
//! Backs the test suite and credential-less local runs. Objects live in a
//! BTreeMap keyed by full object path, so listings come back in the same
//! lexicographic order S3 produces, split into fixed-size pages.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::traits::{ListingPage, ObjectStore};
use crate::error::{Error, Result};

struct StoredObject {
    data: Vec<u8>,
    last_modified: i64,
}

pub struct MemoryStore {
    bucket: String,
    base: String,
    page_size: usize,
    objects: Mutex<BTreeMap<String, StoredObject>>,
    clock: AtomicI64,
}

impl MemoryStore {
    pub fn new(bucket: &str, base: &str, page_size: usize) -> Self {
        Self {
            bucket: bucket.to_string(),
            base: base.trim_end_matches('/').to_string(),
            page_size,
            objects: Mutex::new(BTreeMap::new()),
            clock: AtomicI64::new(0),
        }
    }

    /// Insert an object under the store's base path, stamping it with the
    /// next logical timestamp.
    pub fn insert(&self, key: &str, data: Vec<u8>) {
        let ts = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
        self.insert_at(key, data, ts);
    }

    /// Insert with an explicit last-modified timestamp.
    pub fn insert_at(&self, key: &str, data: Vec<u8>, last_modified: i64) {
        self.objects.lock().insert(
            self.full_key(key),
            StoredObject {
                data,
                last_modified,
            },
        );
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}/{}", self.base, key)
    }

    fn strip(&self, full_key: &str) -> String {
        full_key.replace(&format!("{}/", self.base), "")
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn base_path(&self) -> &str {
        &self.base
    }

    async fn list_page(&self, prefix: &str, cursor: Option<String>) -> Result<ListingPage> {
        let full_prefix = self.full_key(prefix);
        let offset: usize = match cursor {
            Some(c) => c.parse().map_err(|_| Error::List {
                message: format!("invalid continuation cursor: {}", c),
                bucket: self.bucket.clone(),
                prefix: self.base.clone(),
            })?,
            None => 0,
        };

        let objects = self.objects.lock();
        let matching: Vec<String> = objects
            .keys()
            .filter(|k| k.starts_with(&full_prefix))
            .map(|k| self.strip(k))
            .collect();

        let keys: Vec<String> = matching
            .iter()
            .skip(offset)
            .take(self.page_size)
            .cloned()
            .collect();
        let next = offset + keys.len();
        let next_cursor = (next < matching.len()).then(|| next.to_string());

        Ok(ListingPage { keys, next_cursor })
    }

    async fn get(&self, key: &str, dest: &Path) -> Result<PathBuf> {
        let full_key = self.full_key(key);
        let data = {
            let objects = self.objects.lock();
            objects.get(&full_key).map(|o| o.data.clone())
        };
        let data = data.ok_or_else(|| Error::Download {
            message: "no such key".to_string(),
            remote_key: full_key.clone(),
        })?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Download {
                    message: format!("failed to create local directory: {}", e),
                    remote_key: full_key.clone(),
                })?;
        }
        if let Err(e) = tokio::fs::write(dest, &data).await {
            let _ = tokio::fs::remove_file(dest).await;
            return Err(Error::Download {
                message: format!("failed to write local file: {}", e),
                remote_key: full_key,
            });
        }
        Ok(dest.to_path_buf())
    }

    async fn put(&self, local: &Path, key: &str) -> Result<String> {
        if !local.exists() {
            return Err(Error::NotFound(local.to_path_buf()));
        }
        let full_key = self.full_key(key);
        let data = tokio::fs::read(local).await.map_err(|e| Error::Download {
            message: format!("failed to read local file: {}", e),
            remote_key: full_key.clone(),
        })?;
        let ts = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
        self.objects.lock().insert(
            full_key.clone(),
            StoredObject {
                data,
                last_modified: ts,
            },
        );
        Ok(full_key)
    }

    async fn latest(&self, prefix: &str) -> Result<Option<String>> {
        let full_prefix = self.full_key(prefix);
        let objects = self.objects.lock();

        let mut latest_key: Option<String> = None;
        let mut latest_time: Option<i64> = None;
        for (key, object) in objects.iter() {
            if !key.starts_with(&full_prefix) {
                continue;
            }
            // Strictly greater only: ties keep the first key encountered.
            if latest_time.map_or(true, |t| object.last_modified > t) {
                latest_time = Some(object.last_modified);
                latest_key = Some(self.strip(key));
            }
        }
        Ok(latest_key)
    }
}
