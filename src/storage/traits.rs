//! Object storage abstraction
//!
//! Defines the interface for the remote object store holding model
//! artifacts and avatar media. Implementations can be swapped between
//! S3 and the in-memory store used in tests.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

use crate::error::{Error, Result};

/// One page of an object listing. Keys carry the store's base path
/// already stripped; pages are concatenated in provider order.
#[derive(Debug, Clone)]
pub struct ListingPage {
    pub keys: Vec<String>,
    pub next_cursor: Option<String>,
}

/// Object store trait
/// Implementations must be thread-safe and async-compatible.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Bucket name, used for error context.
    fn bucket(&self) -> &str;

    /// Base object path under which all keys of this store live.
    fn base_path(&self) -> &str;

    /// Fetch one listing page under `prefix`, starting at `cursor`.
    async fn list_page(&self, prefix: &str, cursor: Option<String>) -> Result<ListingPage>;

    /// Download the object at `key` to `dest`, creating any missing parent
    /// directories. A failed download never leaves a partial file at `dest`.
    async fn get(&self, key: &str, dest: &Path) -> Result<PathBuf>;

    /// Upload a local file to `key`. Fails with [`Error::NotFound`] if the
    /// local file is absent. Returns the full remote key.
    async fn put(&self, local: &Path, key: &str) -> Result<String>;

    /// Key of the object with the greatest last-modified timestamp under
    /// `prefix`, or `None` if the listing is empty. Ties keep the first
    /// key encountered.
    async fn latest(&self, prefix: &str) -> Result<Option<String>>;

    /// All keys under `prefix` as a lazy sequence, paginating transparently
    /// via [`ObjectStore::list_page`]. Finite and not restartable; calling
    /// again issues a fresh listing.
    fn list<'a>(&'a self, prefix: &'a str) -> BoxStream<'a, Result<String>> {
        stream::try_unfold(Cursor::Start, move |cursor| async move {
            let token = match cursor {
                Cursor::Start => None,
                Cursor::Next(token) => Some(token),
                Cursor::Done => return Ok(None),
            };
            let page = self.list_page(prefix, token).await?;
            let next = match page.next_cursor {
                Some(token) => Cursor::Next(token),
                None => Cursor::Done,
            };
            Ok::<_, Error>(Some((stream::iter(page.keys.into_iter().map(Ok)), next)))
        })
        .try_flatten()
        .boxed()
    }
}

enum Cursor {
    Start,
    Next(String),
    Done,
}

#[cfg(test)]
mod tests {
    use super::super::memory::MemoryStore;
    use super::*;

    #[tokio::test]
    async fn test_list_paginates_in_provider_order() {
        // Two pages of 2 and 3 keys must yield a 5-element sequence with
        // the base path stripped from every entry.
        let store = MemoryStore::new("bucket", "base", 2);
        for key in ["a.pt", "b.pt", "c.pt", "d.pt", "e.pt"] {
            store.insert(key, b"x".to_vec());
        }

        let first = store.list_page("", None).await.unwrap();
        assert_eq!(first.keys.len(), 2);
        assert!(first.next_cursor.is_some());

        let keys: Vec<String> = store.list("").try_collect().await.unwrap();
        assert_eq!(keys, vec!["a.pt", "b.pt", "c.pt", "d.pt", "e.pt"]);
    }

    #[tokio::test]
    async fn test_list_with_prefix() {
        let store = MemoryStore::new("bucket", "base", 10);
        store.insert("landmark/latest/model.pt", b"x".to_vec());
        store.insert("encoder/latest/model.bin", b"y".to_vec());

        let keys: Vec<String> = store.list("landmark/").try_collect().await.unwrap();
        assert_eq!(keys, vec!["landmark/latest/model.pt"]);
    }
}
