//! HTTP implementation of [`TodoCollection`].

use async_trait::async_trait;

use super::TodoCollection;
use crate::error::{ensure_success, RemoteError};
use crate::models::{NewTodo, Todo, TodoPatch};

/// Public demo collection used when nothing else is configured.
pub const DEFAULT_COLLECTION_URL: &str = "https://jsonplaceholder.typicode.com/todos";

/// REST collection client.
///
/// `collection_url` points at the collection itself (e.g. `.../todos`);
/// single items live at `{collection_url}/{id}`.
#[derive(Debug, Clone)]
pub struct RestClient {
    collection_url: String,
    http: reqwest::Client,
}

impl RestClient {
    pub fn new(collection_url: impl Into<String>) -> Self {
        let collection_url = collection_url.into().trim_end_matches('/').to_string();
        Self {
            collection_url,
            http: reqwest::Client::new(),
        }
    }

    pub fn collection_url(&self) -> &str {
        &self.collection_url
    }

    fn item_url(&self, id: i64) -> String {
        format!("{}/{}", self.collection_url, id)
    }
}

impl Default for RestClient {
    fn default() -> Self {
        Self::new(DEFAULT_COLLECTION_URL)
    }
}

#[async_trait]
impl TodoCollection for RestClient {
    async fn list(&self) -> Result<Vec<Todo>, RemoteError> {
        tracing::debug!(url = %self.collection_url, "GET collection");
        let response = self.http.get(&self.collection_url).send().await?;
        let response = ensure_success(response, "Failed to fetch todos").await?;
        Ok(response.json().await?)
    }

    async fn get(&self, id: i64) -> Result<Todo, RemoteError> {
        let response = self.http.get(self.item_url(id)).send().await?;
        let response = ensure_success(response, &format!("Failed to fetch todo {}", id)).await?;
        Ok(response.json().await?)
    }

    async fn create(&self, title: &str) -> Result<Todo, RemoteError> {
        let response = self
            .http
            .post(&self.collection_url)
            .json(&NewTodo::new(title))
            .send()
            .await?;
        let response = ensure_success(response, "Failed to create todo").await?;
        Ok(response.json().await?)
    }

    async fn update(&self, id: i64, patch: &TodoPatch) -> Result<Todo, RemoteError> {
        let response = self.http.patch(self.item_url(id)).json(patch).send().await?;
        let response = ensure_success(response, &format!("Failed to update todo {}", id)).await?;
        Ok(response.json().await?)
    }

    async fn delete(&self, id: i64) -> Result<(), RemoteError> {
        let response = self.http.delete(self.item_url(id)).send().await?;
        ensure_success(response, &format!("Failed to delete todo {}", id)).await?;
        Ok(())
    }
}
