use std::{collections::HashMap, hash::Hash, path::PathBuf, sync::Arc};
use tokio::{fs, sync::RwLock};
use tracing::warn;

use crate::errors::ServiceError;

/// Generic JSON file-backed key-value map store.
///
/// Persists a `HashMap<K, V>` to a JSON file and provides simple CRUD helpers.
/// Writes go to a sibling temp file first and are renamed into place; the
/// map's write lock is held until the rename finishes.
#[derive(Clone)]
pub struct JsonMapStore<K, V> {
    inner: Arc<RwLock<HashMap<K, V>>>,
    file_path: PathBuf,
}

fn storage_err(e: impl std::fmt::Display) -> ServiceError {
    ServiceError::Storage(e.to_string())
}

impl<K, V> JsonMapStore<K, V>
where
    K: Eq + Hash + serde::Serialize + serde::de::DeserializeOwned + Clone,
    V: serde::Serialize + serde::de::DeserializeOwned + Clone + PartialEq,
{
    /// Initialize the store from a path. Creates the file with an empty map if missing.
    pub async fn new<P: Into<PathBuf>>(path: P) -> Result<Arc<Self>, ServiceError> {
        let file_path = path.into();
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await.ok();
        }

        let map: HashMap<K, V> = match fs::read(&file_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!(path = %file_path.display(), error = %e, "corrupt state file; starting empty");
                HashMap::new()
            }),
            Err(_) => {
                let empty: HashMap<K, V> = HashMap::new();
                fs::write(&file_path, serde_json::to_vec(&empty).map_err(storage_err)?)
                    .await
                    .map_err(storage_err)?;
                empty
            }
        };

        Ok(Arc::new(Self { inner: Arc::new(RwLock::new(map)), file_path }))
    }

    /// Serialize `map` and swap it into place. Callers hold the write guard, so
    /// persisted snapshots land in the same order as the mutations.
    async fn persist(&self, map: &HashMap<K, V>) -> Result<(), ServiceError> {
        let data = serde_json::to_vec(map).map_err(storage_err)?;
        let tmp = self.file_path.with_extension("json.tmp");
        fs::write(&tmp, data).await.map_err(storage_err)?;
        fs::rename(&tmp, &self.file_path).await.map_err(storage_err)?;
        Ok(())
    }

    /// List all entries as `(key, value)` pairs.
    pub async fn list(&self) -> Vec<(K, V)> {
        let map = self.inner.read().await;
        map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// Get value by key.
    pub async fn get(&self, key: &K) -> Option<V> {
        let map = self.inner.read().await;
        map.get(key).cloned()
    }

    /// Insert or update a value by key and persist.
    ///
    /// The in-memory map is rolled back when the file cannot be written.
    pub async fn insert(&self, key: K, value: V) -> Result<(), ServiceError> {
        let mut map = self.inner.write().await;
        let previous = map.insert(key.clone(), value);
        if let Err(e) = self.persist(&map).await {
            match previous {
                Some(v) => map.insert(key, v),
                None => map.remove(&key),
            };
            return Err(e);
        }
        Ok(())
    }

    /// Remove a key and persist; returns whether it existed.
    pub async fn remove(&self, key: &K) -> Result<bool, ServiceError> {
        let mut map = self.inner.write().await;
        let Some(previous) = map.remove(key) else { return Ok(false) };
        if let Err(e) = self.persist(&map).await {
            map.insert(key.clone(), previous);
            return Err(e);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn json_map_store_crud_persists() -> Result<(), anyhow::Error> {
        let tmp = std::env::temp_dir().join(format!("json_map_store_{}.json", uuid::Uuid::new_v4()));
        let store = JsonMapStore::<String, String>::new(&tmp).await?;

        // initially empty
        assert_eq!(store.list().await.len(), 0);

        store.insert("a".into(), "1".into()).await?;
        store.insert("b".into(), "2".into()).await?;
        assert_eq!(store.get(&"a".into()).await.as_deref(), Some("1"));

        // overwrite
        store.insert("a".into(), "10".into()).await?;

        // remove and reload persistence
        assert!(store.remove(&"b".into()).await?);
        assert!(!store.remove(&"b".into()).await?);
        let reloaded = JsonMapStore::<String, String>::new(&tmp).await?;
        let entries = reloaded.list().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(reloaded.get(&"a".into()).await.unwrap(), "10");

        let _ = tokio::fs::remove_file(&tmp).await;
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_file_starts_empty() -> Result<(), anyhow::Error> {
        let tmp = std::env::temp_dir().join(format!("json_map_store_bad_{}.json", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, b"{not json").await?;
        let store = JsonMapStore::<String, String>::new(&tmp).await?;
        assert!(store.list().await.is_empty());
        store.insert("k".into(), "v".into()).await?;
        let reloaded = JsonMapStore::<String, String>::new(&tmp).await?;
        assert_eq!(reloaded.get(&"k".into()).await.as_deref(), Some("v"));
        let _ = tokio::fs::remove_file(&tmp).await;
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_inserts_all_persist() -> Result<(), anyhow::Error> {
        let tmp = std::env::temp_dir().join(format!("json_map_store_par_{}.json", uuid::Uuid::new_v4()));
        let store = JsonMapStore::<String, String>::new(&tmp).await?;

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..32 {
            let store = store.clone();
            tasks.spawn(async move { store.insert(format!("k{i}"), i.to_string()).await });
        }
        while let Some(res) = tasks.join_next().await {
            res??;
        }

        let reloaded = JsonMapStore::<String, String>::new(&tmp).await?;
        assert_eq!(reloaded.list().await.len(), 32);
        assert_eq!(reloaded.get(&"k17".into()).await.as_deref(), Some("17"));
        let _ = tokio::fs::remove_file(&tmp).await;
        Ok(())
    }

    #[tokio::test]
    async fn failed_write_rolls_back_memory() -> Result<(), anyhow::Error> {
        let dir = std::env::temp_dir().join(format!("json_map_store_gone_{}", uuid::Uuid::new_v4()));
        let store = JsonMapStore::<String, String>::new(dir.join("state.json")).await?;
        store.insert("kept".into(), "1".into()).await?;
        tokio::fs::remove_dir_all(&dir).await?;

        assert!(store.insert("kept".into(), "2".into()).await.is_err());
        assert!(store.insert("fresh".into(), "3".into()).await.is_err());
        assert!(store.remove(&"kept".into()).await.is_err());

        assert_eq!(store.get(&"kept".into()).await.as_deref(), Some("1"));
        assert_eq!(store.get(&"fresh".into()).await, None);
        Ok(())
    }
}
