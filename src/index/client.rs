use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("search engine returned error status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error("{0}")]
    Rejected(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// The remote operations the shipper needs from a search engine.
///
/// Implementations are owned by a single task; nothing here requires
/// interior locking for concurrent writers.
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn index_exists(&self, index: &str) -> Result<bool>;

    async fn create_index(&self, index: &str, body: &serde_json::Value) -> Result<()>;

    async fn delete_index(&self, index: &str) -> Result<()>;

    /// Stores `body` verbatim as a new document in `index`.
    async fn index_document(&self, index: &str, body: &str) -> Result<()>;
}

/// Builds fresh client connections. Each call yields an independent client.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn SearchClient>>;
}

/// Elasticsearch REST client over HTTP
#[derive(Debug, Clone)]
pub struct ElasticClient {
    base_url: String,
    client: reqwest::Client,
}

impl ElasticClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::InvalidEndpoint(base_url));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self { base_url, client })
    }

    /// Builds a client and verifies the cluster answers on its root endpoint.
    pub async fn connect(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Self::new(base_url, timeout)?;
        client.ping().await?;
        Ok(client)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn ping(&self) -> Result<()> {
        let response = self.client.get(format!("{}/", self.base_url)).send().await?;
        check_status(response).await
    }

    fn index_url(&self, index: &str) -> String {
        format!("{}/{}", self.base_url, index)
    }
}

#[async_trait]
impl SearchClient for ElasticClient {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        let response = self.client.head(self.index_url(index)).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(ClientError::Status {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn create_index(&self, index: &str, body: &serde_json::Value) -> Result<()> {
        let response = self
            .client
            .put(self.index_url(index))
            .json(body)
            .send()
            .await?;
        check_status(response).await
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        let response = self.client.delete(self.index_url(index)).send().await?;
        check_status(response).await
    }

    async fn index_document(&self, index: &str, body: &str) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/_doc", self.index_url(index)))
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await?;
        check_status(response).await
    }
}

async fn check_status(response: reqwest::Response) -> Result<()> {
    if response.status().is_success() {
        return Ok(());
    }

    Err(ClientError::Status {
        status: response.status().as_u16(),
        message: response.text().await.unwrap_or_default(),
    })
}

/// Connects to one Elasticsearch endpoint with a fixed request timeout.
#[derive(Debug, Clone)]
pub struct ElasticConnector {
    base_url: String,
    timeout: Duration,
}

impl ElasticConnector {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Connector for ElasticConnector {
    async fn connect(&self) -> Result<Arc<dyn SearchClient>> {
        let client = ElasticClient::connect(&self.base_url, self.timeout).await?;
        Ok(Arc::new(client))
    }
}
