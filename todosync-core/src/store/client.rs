//! Hosted table store client (PostgREST + Realtime).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::Deserialize;
use serde_json::Value;

use super::realtime::{open_channel, ChannelSetup, JOIN_TIMEOUT, PROTOCOL_VERSION};
use super::subscription::Subscription;
use super::TableStore;
use crate::error::{ensure_success, RemoteError};
use crate::models::{Todo, TodoPatch};

/// Table holding the todos.
pub const DEFAULT_TABLE: &str = "todos";
/// Channel name used for the change subscription.
pub const DEFAULT_CHANNEL: &str = "todos-channel";

/// Project URL and anonymous key for the hosted store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCredentials {
    pub project_url: String,
    pub anon_key: String,
}

impl StoreCredentials {
    pub fn new(project_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            project_url: project_url.into(),
            anon_key: anon_key.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IdRow {
    id: i64,
}

/// Client for one table of the hosted store.
#[derive(Debug, Clone)]
pub struct SupabaseStore {
    credentials: StoreCredentials,
    table: String,
    channel: String,
    join_timeout: Duration,
    http: reqwest::Client,
}

impl SupabaseStore {
    pub fn new(credentials: StoreCredentials) -> Self {
        Self {
            credentials,
            table: DEFAULT_TABLE.to_string(),
            channel: DEFAULT_CHANNEL.to_string(),
            join_timeout: JOIN_TIMEOUT,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// How long `subscribe` waits for the join reply before reporting
    /// `TIMED_OUT`. Defaults to 10 seconds.
    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Reads up to `limit` raw rows from any table, for inspection.
    pub async fn select_rows(&self, table: &str, limit: usize) -> Result<Vec<Value>, RemoteError> {
        let response = self
            .authed(self.http.get(self.rest_url(table)))
            .query(&[("select", "*".to_string()), ("limit", limit.to_string())])
            .send()
            .await?;
        let response = ensure_success(response, &format!("Failed to read table {}", table)).await?;
        Ok(response.json().await?)
    }

    /// Builds the PostgREST URL for a table.
    fn rest_url(&self, table: &str) -> String {
        format!(
            "{}/rest/v1/{}",
            self.base_http_url(),
            urlencoding::encode(table)
        )
    }

    /// Builds the Realtime websocket URL.
    fn realtime_url(&self) -> String {
        let http = self.base_http_url();
        let base = if let Some(rest) = http.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = http.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            http
        };

        format!(
            "{}/realtime/v1/websocket?apikey={}&vsn={}",
            base,
            urlencoding::encode(&self.credentials.anon_key),
            PROTOCOL_VERSION
        )
    }

    /// Project URL with a scheme and without a trailing slash.
    fn base_http_url(&self) -> String {
        let url = self.credentials.project_url.trim_end_matches('/');
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("https://{}", url)
        }
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.credentials.anon_key)
            .bearer_auth(&self.credentials.anon_key)
    }

    fn id_filter(id: i64) -> [(&'static str, String); 1] {
        [("id", format!("eq.{}", id))]
    }
}

#[async_trait]
impl TableStore for SupabaseStore {
    async fn select_all(&self, limit: usize) -> Result<Vec<Todo>, RemoteError> {
        let response = self
            .authed(self.http.get(self.rest_url(&self.table)))
            .query(&[("select", "*".to_string()), ("limit", limit.to_string())])
            .send()
            .await?;
        let response = ensure_success(response, "Failed to read todos").await?;
        Ok(response.json().await?)
    }

    async fn select_ids(&self) -> Result<Vec<i64>, RemoteError> {
        let response = self
            .authed(self.http.get(self.rest_url(&self.table)))
            .query(&[("select", "id")])
            .send()
            .await?;
        let response = ensure_success(response, "Failed to read todo ids").await?;
        let rows: Vec<IdRow> = response.json().await?;
        Ok(rows.into_iter().map(|row| row.id).collect())
    }

    async fn insert(&self, items: &[Todo]) -> Result<Vec<Todo>, RemoteError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .authed(self.http.post(self.rest_url(&self.table)))
            .header("Prefer", "return=representation")
            .json(items)
            .send()
            .await?;
        let response = ensure_success(response, "Failed to insert todos").await?;
        Ok(response.json().await?)
    }

    async fn update(&self, id: i64, patch: &TodoPatch) -> Result<(), RemoteError> {
        let response = self
            .authed(self.http.patch(self.rest_url(&self.table)))
            .query(&Self::id_filter(id))
            .json(patch)
            .send()
            .await?;
        ensure_success(response, &format!("Failed to update todo {}", id)).await?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), RemoteError> {
        let response = self
            .authed(self.http.delete(self.rest_url(&self.table)))
            .query(&Self::id_filter(id))
            .send()
            .await?;
        ensure_success(response, &format!("Failed to delete todo {}", id)).await?;
        Ok(())
    }

    async fn delete_all(&self) -> Result<(), RemoteError> {
        let response = self
            .authed(self.http.delete(self.rest_url(&self.table)))
            .query(&[("id", "neq.0")])
            .send()
            .await?;
        ensure_success(response, "Failed to clear todos").await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), RemoteError> {
        let response = self
            .authed(self.http.get(self.rest_url(&self.table)))
            .query(&[("select", "id"), ("limit", "1")])
            .send()
            .await?;
        ensure_success(response, &format!("Cannot access table {}", self.table)).await?;
        Ok(())
    }

    async fn subscribe(&self) -> Result<Subscription, RemoteError> {
        let setup = ChannelSetup {
            topic: format!("realtime:{}", self.channel),
            table: self.table.clone(),
            access_token: self.credentials.anon_key.clone(),
            join_timeout: self.join_timeout,
        };
        open_channel(&self.realtime_url(), setup).await
    }
}
