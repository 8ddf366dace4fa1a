//! Paperless-ngx API client / Paperless-ngx API客户端
//!
//! The remote document store is the source of truth; the local search index
//! only caches titles and E-numbers. 远程存储为权威数据源

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Remote document metadata / 远程文档元数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteDocument {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    /// OCR text, may be missing / OCR文本
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub modified: Option<String>,
}

/// One page of the document list / 文档列表分页
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentPage {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub results: Vec<RemoteDocument>,
}

/// Remote document store / 远程文档存储
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch one document, `None` when it does not exist / 获取文档
    async fn get_document(&self, doc_id: &str) -> Result<Option<RemoteDocument>>;

    /// List documents, 1-based page / 分页列出文档
    async fn list_documents(&self, page: u32, page_size: u32) -> Result<DocumentPage>;

    /// Whether the remote API answers / 测试连接
    async fn test_connection(&self) -> bool;
}

/// Paperless-ngx REST client / Paperless-ngx REST 客户端
pub struct PaperlessClient {
    base_url: Url,
    api_token: String,
    client: Client,
}

impl PaperlessClient {
    pub fn new(base_url: &str, api_token: &str, timeout: Duration) -> Result<Self> {
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|e| anyhow!("无效的Paperless地址: {} - {}", base_url, e))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow!("创建HTTP客户端失败: {}", e))?;

        Ok(Self {
            base_url,
            api_token: api_token.to_string(),
            client,
        })
    }

    /// Absolute API URL for a relative path / 拼接API地址
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .with_context(|| format!("Invalid API path: {}", path))
    }

    fn get(&self, url: Url) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .header("Authorization", format!("Token {}", self.api_token))
            .header("Accept", "application/json")
    }
}

#[async_trait]
impl DocumentStore for PaperlessClient {
    async fn get_document(&self, doc_id: &str) -> Result<Option<RemoteDocument>> {
        let url = self.endpoint(&format!("api/documents/{}/", doc_id))?;
        let response = self
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch document {}", doc_id))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(anyhow!("Paperless get document {} failed: {}", doc_id, response.status()));
        }

        let doc = response
            .json::<RemoteDocument>()
            .await
            .with_context(|| format!("Invalid document payload for {}", doc_id))?;
        Ok(Some(doc))
    }

    async fn list_documents(&self, page: u32, page_size: u32) -> Result<DocumentPage> {
        let mut url = self.endpoint("api/documents/")?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("page_size", &page_size.to_string())
            .append_pair("ordering", "id");

        let response = self.get(url).send().await.context("Failed to list documents")?;
        if !response.status().is_success() {
            return Err(anyhow!("Paperless list page {} failed: {}", page, response.status()));
        }

        response.json::<DocumentPage>().await.context("Invalid document list payload")
    }

    async fn test_connection(&self) -> bool {
        let url = match self.endpoint("api/documents/") {
            Ok(url) => url,
            Err(_) => return false,
        };
        match self.get(url).timeout(Duration::from_secs(10)).send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                tracing::error!("Paperless connection test failed: {}", e);
                false
            }
        }
    }
}
