use std::collections::HashMap;
use std::path::PathBuf;

use tokio::sync::RwLock;

use crate::api_service::errors::ApiServiceError;

/// Key-value storage for tokens
///
/// No atomicity is promised across calls: concurrent requests may race on
/// the same key.
#[async_trait::async_trait]
pub trait TokenStorage: Send + Sync {
    /// Read a value, `None` when the key is absent
    async fn get_item(&self, key: &str) -> Result<Option<String>, ApiServiceError>;

    /// Write a value, replacing any previous one
    async fn set_item(&self, key: &str, value: &str) -> Result<(), ApiServiceError>;

    /// Remove a value; removing an absent key is not an error
    async fn remove_item(&self, key: &str) -> Result<(), ApiServiceError>;
}

/// In-process storage
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create storage pre-populated with the given entries
    pub fn with_items<I, K, V>(items: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            items: RwLock::new(
                items
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Copy of everything currently stored
    pub async fn snapshot(&self) -> HashMap<String, String> {
        self.items.read().await.clone()
    }
}

#[async_trait::async_trait]
impl TokenStorage for MemoryStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, ApiServiceError> {
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), ApiServiceError> {
        self.items
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), ApiServiceError> {
        self.items.write().await.remove(key);
        Ok(())
    }
}

/// File-based storage: one JSON object in `tokens.json` under `storage_dir`
pub struct FileStorage {
    storage_dir: PathBuf,
}

impl FileStorage {
    pub fn new(storage_dir: PathBuf) -> Self {
        Self { storage_dir }
    }

    fn file_path(&self) -> PathBuf {
        self.storage_dir.join("tokens.json")
    }

    async fn load(&self) -> Result<HashMap<String, String>, ApiServiceError> {
        match tokio::fs::read(self.file_path()).await {
            Ok(content) => Ok(serde_json::from_slice(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(ApiServiceError::Io(e)),
        }
    }

    async fn store(&self, items: &HashMap<String, String>) -> Result<(), ApiServiceError> {
        let json_content = serde_json::to_string_pretty(items)?;
        tokio::fs::write(self.file_path(), json_content).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl TokenStorage for FileStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, ApiServiceError> {
        Ok(self.load().await?.remove(key))
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), ApiServiceError> {
        let mut items = self.load().await?;
        items.insert(key.to_string(), value.to_string());
        self.store(&items).await
    }

    async fn remove_item(&self, key: &str) -> Result<(), ApiServiceError> {
        let mut items = self.load().await?;
        if items.remove(key).is_some() {
            self.store(&items).await?;
        }
        Ok(())
    }
}
