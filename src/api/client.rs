use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::api::ChatBackend;
use crate::api::models::{ChatMessage, Conversation, ConversationId, Page, SendMessageRequest, UserId};
use crate::error::{ChatError, Result};

pub struct ApiClient {
    pub http: HttpClient,
    base_api: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let http = HttpClient::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            http,
            base_api: Self::base_api(base_url),
            token,
        })
    }

    fn base_api(base_url: &str) -> String {
        let trimmed = base_url.trim_end_matches('/');
        if trimmed.ends_with("/api") { trimmed.to_string() } else { format!("{}/api", trimmed) }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/chat/{}", self.base_api, path)
    }

    fn with_auth(&self, mut req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(t) = &self.token {
            req = req.header("Authorization", format!("Bearer {}", t));
        }
        req
    }

    async fn send(&self, req: reqwest::RequestBuilder, endpoint: &str) -> Result<reqwest::Response> {
        let resp = self.with_auth(req).send().await?;
        if !resp.status().is_success() {
            return Err(ChatError::Status {
                status: resp.status().as_u16(),
                endpoint: endpoint.to_string(),
            });
        }
        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, String)]) -> Result<T> {
        let mut req = self.http.get(endpoint);
        if !query.is_empty() {
            req = req.query(query);
        }
        let resp = self.send(req, endpoint).await?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl ChatBackend for ApiClient {
    async fn conversations(&self, user_id: UserId) -> Result<Vec<Conversation>> {
        let endpoint = self.endpoint(&format!("conversations/{}", user_id));
        self.get_json(&endpoint, &[]).await
    }

    async fn messages(&self, chat_id: ConversationId, page: u32, size: u32) -> Result<Page<ChatMessage>> {
        let endpoint = self.endpoint(&format!("{}/messages", chat_id));
        self.get_json(&endpoint, &[("page", page.to_string()), ("size", size.to_string())])
            .await
    }

    async fn send_message(&self, chat_id: ConversationId, request: SendMessageRequest) -> Result<ChatMessage> {
        let endpoint = self.endpoint(&format!("{}/messages", chat_id));
        let resp = self.send(self.http.post(&endpoint).json(&request), &endpoint).await?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn mark_read(&self, chat_id: ConversationId) -> Result<()> {
        let endpoint = self.endpoint(&format!("{}/read", chat_id));
        self.send(self.http.put(&endpoint), &endpoint).await?;
        Ok(())
    }

    async fn search(&self, query: &str, chat_id: Option<ConversationId>) -> Result<Vec<ChatMessage>> {
        let endpoint = self.endpoint("search");
        let mut params = vec![("query", query.to_string())];
        if let Some(id) = chat_id {
            params.push(("chatId", id.to_string()));
        }
        self.get_json(&endpoint, &params).await
    }
}
