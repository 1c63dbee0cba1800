//! Request execution.
//!
//! The compiler and mapper never talk to the network; a [`Transport`] takes a
//! compiled [`RequestDocument`] to the backend and hands back the raw
//! response. [`OpenSearchTransport`] is the production implementation.

use crate::{
    compiler::{QueryCompiler, RequestDocument},
    config::ClientConfig,
    error::{Result, SearchError},
    hit::{hits_of, RawHit},
    record::{Record, RecordStore},
    source::SourceProjection,
};
use async_trait::async_trait;
use hitmap_log::{debug, info, trace};
use opensearch::{
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    OpenSearch,
};
use serde_json::{json, Value};
use std::marker::PhantomData;
use std::sync::Arc;

/// Executes search requests against a backend.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Run `request` against `index` and return the response document.
    ///
    /// # Errors
    ///
    /// [`SearchError::Transport`] or [`SearchError::Client`] on backend or
    /// network failure.
    async fn execute(&self, index: &str, request: &RequestDocument) -> Result<Value>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(&self, index: &str, request: &RequestDocument) -> Result<Value> {
        (**self).execute(index, request).await
    }
}

/// Transport backed by the `opensearch` client.
#[derive(Clone)]
pub struct OpenSearchTransport {
    client: Arc<OpenSearch>,
    config: Arc<ClientConfig>,
}

impl OpenSearchTransport {
    /// Create a transport for the first URL in `config`.
    pub fn new(config: ClientConfig) -> Result<Self> {
        info!("Initializing search transport for: {:?}", config.urls);

        let url = config
            .urls
            .first()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| SearchError::config("No URLs provided"))?;

        let url = opensearch::http::Url::parse(url)
            .map_err(|e| SearchError::config(format!("Invalid URL: {}", e)))?;

        let mut builder = TransportBuilder::new(SingleNodeConnectionPool::new(url))
            .timeout(config.request_timeout)
            .disable_proxy();

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.auth(opensearch::auth::Credentials::Basic(
                user.clone(),
                pass.clone(),
            ));
        }

        let transport = builder
            .build()
            .map_err(|e| SearchError::Transport(e.to_string()))?;

        Ok(Self {
            client: Arc::new(OpenSearch::new(transport)),
            config: Arc::new(config),
        })
    }

    /// Get the underlying OpenSearch client.
    pub fn inner(&self) -> &OpenSearch {
        &self.client
    }

    /// Get the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

#[async_trait]
impl Transport for OpenSearchTransport {
    async fn execute(&self, index: &str, request: &RequestDocument) -> Result<Value> {
        debug!("Searching index {} with {:?}", index, request.clause_names());

        let response = self
            .client
            .search(opensearch::SearchParts::Index(&[index]))
            .body(request.to_json())
            .send()
            .await?;

        let status = response.status_code();
        let body: Value = response.json().await?;

        if !status.is_success() {
            return Err(SearchError::Transport(
                body.get("error")
                    .and_then(|e| e.get("reason"))
                    .and_then(|r| r.as_str())
                    .unwrap_or("Search failed")
                    .to_string(),
            ));
        }

        Ok(body)
    }
}

/// Record store that fetches full records from an index by identity.
///
/// Lookups run an `ids` query limited to one hit and hydrate its source.
pub struct IndexStore<R, T> {
    transport: Arc<T>,
    index: String,
    _record: PhantomData<fn() -> R>,
}

impl<R, T> IndexStore<R, T> {
    /// Create a store over `index`.
    pub fn new(transport: Arc<T>, index: impl Into<String>) -> Self {
        Self {
            transport,
            index: index.into(),
            _record: PhantomData,
        }
    }

    /// The index looked up.
    pub fn index(&self) -> &str {
        &self.index
    }
}

#[async_trait]
impl<R, T> RecordStore<R> for IndexStore<R, T>
where
    R: Record + 'static,
    T: Transport + 'static,
{
    async fn find_by_identity(&self, identity: &Value) -> Result<Option<R>> {
        trace!("Fetching {} by identity {}", self.index, identity);

        let request = QueryCompiler::new()
            .query(json!({ "ids": { "values": [identity] } }))
            .with_source(SourceProjection::All)
            .limit(1, 0)?
            .compile();

        let response = self.transport.execute(&self.index, &request).await?;

        let Some(hit) = hits_of(&response).into_iter().next() else {
            return Ok(None);
        };

        match RawHit::from_value(hit).into_body() {
            Value::Object(fields) => self.instantiate(&fields).map(Some),
            _ => Ok(None),
        }
    }
}
