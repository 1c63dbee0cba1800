//! Compile, execute and map in one place.

use crate::{
    compiler::{QueryCompiler, RequestDocument},
    config::SearchConfig,
    error::{Result, SearchError},
    mapper::{Mapped, MappedResults, ResultMapper},
    record::Record,
    transport::Transport,
};
use hitmap_log::debug;
use serde_json::Value;
use std::sync::Arc;

/// A search against one index whose hits go through a [`ResultMapper`].
///
/// ```rust,no_run
/// use hitmap_search::{
///     ClientConfig, OpenSearchTransport, QueryCompiler, ResultMapper, SearchQuery,
/// };
/// use std::sync::Arc;
///
/// # async fn run() -> hitmap_search::Result<()> {
/// let transport = Arc::new(OpenSearchTransport::new(ClientConfig::from_env())?);
///
/// let titles = SearchQuery::new(transport, "articles", ResultMapper::rows())
///     .compiler(QueryCompiler::new().query("rust").with_source(true).limit(10, 0)?)
///     .all()
///     .await?;
///
/// println!("{} articles", titles.len());
/// # Ok(())
/// # }
/// ```
pub struct SearchQuery<R: Record, T> {
    transport: Arc<T>,
    index: String,
    compiler: QueryCompiler,
    mapper: ResultMapper<R>,
}

impl<R, T> SearchQuery<R, T>
where
    R: Record + 'static,
    T: Transport,
{
    /// Create a search over `index`.
    pub fn new(transport: Arc<T>, index: impl Into<String>, mapper: ResultMapper<R>) -> Self {
        Self {
            transport,
            index: index.into(),
            compiler: QueryCompiler::new(),
            mapper,
        }
    }

    /// Create a search over the configured default index.
    ///
    /// # Errors
    ///
    /// [`SearchError::Config`] when `config` names no default index.
    pub fn from_config(
        transport: Arc<T>,
        config: &SearchConfig,
        mapper: ResultMapper<R>,
    ) -> Result<Self> {
        let index = config
            .default_index
            .clone()
            .ok_or_else(|| SearchError::config("no default index configured"))?;

        Ok(Self {
            transport,
            index,
            compiler: QueryCompiler::with_config(config),
            mapper,
        })
    }

    /// Use `compiler` to build the request.
    pub fn compiler(mut self, compiler: QueryCompiler) -> Self {
        self.compiler = compiler;
        self
    }

    /// Replace the mapper.
    pub fn mapper(mut self, mapper: ResultMapper<R>) -> Self {
        self.mapper = mapper;
        self
    }

    /// The index searched.
    pub fn index(&self) -> &str {
        &self.index
    }

    /// The request that would be sent.
    pub fn request(&self) -> RequestDocument {
        self.compiler.compile()
    }

    /// Execute the request and return the raw response.
    pub async fn search(&self) -> Result<Value> {
        let request = self.compiler.compile();
        debug!("Executing search on {}", self.index);
        self.transport.execute(&self.index, &request).await
    }

    /// Execute and map every hit. No hits map to an empty result.
    pub async fn all(&self) -> Result<MappedResults<R>> {
        let response = self.search().await?;
        self.mapper.map(&response).await
    }

    /// Execute and return the last mapped result.
    pub async fn one(&self) -> Result<Option<Mapped<R>>> {
        Ok(self.all().await?.into_last())
    }
}
