//! Client and mapping configuration.

use std::env;
use std::time::Duration;

/// Field used to key results when nothing else is configured.
pub const DEFAULT_KEY_FIELD: &str = "id";

/// Backend identity field.
pub const DEFAULT_IDENTITY_FIELD: &str = "_id";

/// Mapping defaults shared by compilers and mappers.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Field results are keyed by.
    pub key_field: String,
    /// Field that addresses a document in the backend store. Also the field
    /// the default sort runs on.
    pub identity_field: String,
    /// Index searched when a query does not name one.
    pub default_index: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            key_field: DEFAULT_KEY_FIELD.to_string(),
            identity_field: DEFAULT_IDENTITY_FIELD.to_string(),
            default_index: None,
        }
    }
}

impl SearchConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the key field.
    pub fn with_key_field(mut self, field: impl Into<String>) -> Self {
        self.key_field = field.into();
        self
    }

    /// Set the identity field.
    pub fn with_identity_field(mut self, field: impl Into<String>) -> Self {
        self.identity_field = field.into();
        self
    }

    /// Set the default index.
    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.default_index = Some(index.into());
        self
    }
}

/// Connection settings for [`OpenSearchTransport`](crate::OpenSearchTransport).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Node URL(s). Only the first is used for the connection pool.
    pub urls: Vec<String>,
    /// Basic auth username.
    pub username: Option<String>,
    /// Basic auth password.
    pub password: Option<String>,
    /// Request timeout.
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Create a new configuration with a single URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            password: None,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Create configuration with multiple URLs for a cluster.
    pub fn cluster(urls: Vec<String>) -> Self {
        Self {
            urls,
            ..Self::new("")
        }
    }

    /// Read `HITMAP_URL`, `HITMAP_USERNAME`, `HITMAP_PASSWORD` and
    /// `HITMAP_TIMEOUT_SECS`.
    ///
    /// Unset or unparseable values keep their defaults; the URL defaults to
    /// `http://localhost:9200`.
    pub fn from_env() -> Self {
        let mut config = Self::new(
            env::var("HITMAP_URL").unwrap_or_else(|_| "http://localhost:9200".to_string()),
        );

        if let (Ok(user), Ok(pass)) = (env::var("HITMAP_USERNAME"), env::var("HITMAP_PASSWORD")) {
            config = config.with_basic_auth(user, pass);
        }

        if let Some(secs) = env::var("HITMAP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            config = config.with_request_timeout(Duration::from_secs(secs));
        }

        config
    }

    /// Set basic authentication credentials.
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
