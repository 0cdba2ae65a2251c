//! In-process blob store for tests and dry runs.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{BlobStore, StorageError};

/// A [`BlobStore`] backed by a map in memory.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    name: String,
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    /// Creates an empty store reporting `name` as its location.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            objects: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns every stored key.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.objects
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn location(&self) -> &str {
        &self.name
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.lock().get(key).cloned())
    }

    async fn write(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        self.lock().insert(key.to_string(), bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_replace_and_keys_stay_sorted() {
        let store = MemoryBlobStore::new("mem");
        store.write("raw_data/b.json", vec![2]).await.unwrap();
        store.write("raw_data/a.json", vec![1]).await.unwrap();
        store.write("master_data/m.json", vec![3]).await.unwrap();
        store.write("raw_data/a.json", vec![4]).await.unwrap();

        assert_eq!(
            store.keys(),
            vec!["master_data/m.json", "raw_data/a.json", "raw_data/b.json"]
        );
        assert_eq!(store.read("raw_data/a.json").await.unwrap(), Some(vec![4]));
        assert!(store.exists("master_data/m.json").await.unwrap());
        assert!(!store.exists("master_data/other.json").await.unwrap());
    }
}
