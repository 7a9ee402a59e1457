use std::fmt;

use async_trait::async_trait;
use uuid::Uuid;

use super::json_map_store::JsonMapStore;
use crate::errors::ServiceError;

/// Durable per-user key-value storage on the client side.
/// Implementations can be file-backed, browser-backed, or remote KV.
#[async_trait]
pub trait ClientStorage: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: String) -> Result<(), ServiceError>;
    async fn remove(&self, key: &str) -> Result<bool, ServiceError>;
}

/// Namespaced storage keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageKey {
    ActiveProject { user_id: Uuid },
    SystemPrompts { organization_id: Uuid, prompt_type: &'static str },
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageKey::ActiveProject { user_id } => write!(f, "activeProject:{user_id}"),
            StorageKey::SystemPrompts { organization_id, prompt_type } => {
                write!(f, "systemPrompts:{organization_id}:{prompt_type}")
            }
        }
    }
}

#[async_trait]
impl ClientStorage for JsonMapStore<String, String> {
    async fn get(&self, key: &str) -> Option<String> {
        JsonMapStore::get(self, &key.to_string()).await
    }

    async fn set(&self, key: &str, value: String) -> Result<(), ServiceError> {
        self.insert(key.to_string(), value).await
    }

    async fn remove(&self, key: &str) -> Result<bool, ServiceError> {
        JsonMapStore::remove(self, &key.to_string()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn keys_are_namespaced() {
        let user_id = Uuid::nil();
        assert_eq!(
            StorageKey::ActiveProject { user_id }.to_string(),
            "activeProject:00000000-0000-0000-0000-000000000000"
        );
        let key = StorageKey::SystemPrompts { organization_id: user_id, prompt_type: "calling" };
        assert_eq!(key.to_string(), "systemPrompts:00000000-0000-0000-0000-000000000000:calling");
    }

    #[tokio::test]
    async fn json_map_store_as_client_storage() -> Result<(), anyhow::Error> {
        let tmp = std::env::temp_dir().join(format!("client_storage_{}.json", Uuid::new_v4()));
        let storage: Arc<dyn ClientStorage> = JsonMapStore::<String, String>::new(&tmp).await?;
        assert_eq!(storage.get("missing").await, None);
        storage.set("activeProject:x", "p1".into()).await?;
        assert_eq!(storage.get("activeProject:x").await.as_deref(), Some("p1"));
        assert!(storage.remove("activeProject:x").await?);
        let _ = tokio::fs::remove_file(&tmp).await;
        Ok(())
    }
}
