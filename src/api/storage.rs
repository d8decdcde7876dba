use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Key under which the authorization token is kept
pub const TOKEN_KEY: &str = "token";

/// Key/value storage that lives for one session, shared by every clone of an `ApiClient`
#[derive(Debug, Clone, Default)]
pub struct SessionStorage {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl SessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_item(&self, key: &str) -> Option<String> {
        self.inner.read().await.get(key).cloned()
    }

    pub async fn set_item(&self, key: &str, value: &str) {
        self.inner
            .write()
            .await
            .insert(key.to_string(), value.to_string());
    }

    pub async fn remove_item(&self, key: &str) -> Option<String> {
        self.inner.write().await.remove(key)
    }

    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }

    pub async fn token(&self) -> Option<String> {
        self.get_item(TOKEN_KEY).await
    }

    pub async fn set_token(&self, token: &str) {
        self.set_item(TOKEN_KEY, token).await;
    }

    pub async fn clear_token(&self) {
        self.remove_item(TOKEN_KEY).await;
    }
}
