//! Search request compilation and result mapping for Elasticsearch-style
//! backends.
//!
//! This crate sits between application code and a JSON search backend:
//! - [`QueryCompiler`] assembles a request document from independent axes
//!   (query, filter, pagination, sort, aggregations, highlight, `_source`)
//!   and fills in a stable default sort and source projection
//! - [`ResultMapper`] keys raw hits, projects them with a select path, and
//!   hydrates them into typed [`Record`]s, with relation loading afterwards
//! - [`Transport`] executes requests; [`OpenSearchTransport`] is the
//!   production implementation
//!
//! # Example
//!
//! ```rust
//! use hitmap_search::{HitKey, QueryCompiler, ResultMapper};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> hitmap_search::Result<()> {
//! let request = QueryCompiler::new()
//!     .query(json!({ "match": { "title": "rust" } }))
//!     .compile();
//! assert_eq!(request.clause_names(), vec!["query", "sort", "_source"]);
//!
//! // ... execute `request`, then map the response:
//! let response = json!({ "hits": { "hits": [
//!     { "_id": "5", "_source": { "id": 5, "name": "a" } }
//! ] } });
//! let rows = ResultMapper::rows().map(&response).await?;
//! assert_eq!(
//!     rows.rows().and_then(|r| r.get(&HitKey::Int(5))),
//!     Some(&json!({ "id": 5, "name": "a" }))
//! );
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod compiler;
mod config;
mod error;
mod hit;
mod key;
mod mapper;
mod path;
mod query;
mod record;
mod relation;
mod sort;
mod source;
mod transport;

pub use compiler::{QueryCompiler, QueryPayload, RequestDocument, ReservedClause};
pub use config::{ClientConfig, SearchConfig, DEFAULT_IDENTITY_FIELD, DEFAULT_KEY_FIELD};
pub use error::{Result, SearchError};
pub use hit::{hits_of, RawHit};
pub use key::{Collection, HitKey, HitKeyFn, KeyPolicy, KeyedResults, RecordKeyFn};
pub use mapper::{Mapped, MappedResults, ResultMapper, SelectPath};
pub use path::{get_path, is_blank, merge, set_path, ClausePath};
pub use query::SearchQuery;
pub use record::{FieldCoverage, Hydrated, Record, RecordStore};
pub use relation::{populate_relations, RelationLoader, RelationSpec, TermsRelation};
pub use sort::{SortOrder, SortSpec};
pub use source::SourceProjection;
pub use transport::{IndexStore, OpenSearchTransport, Transport};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        HitKey, KeyPolicy, MappedResults, QueryCompiler, Record, RecordStore, RelationSpec,
        Result, ResultMapper, SearchError, SearchQuery, SortSpec, SourceProjection, Transport,
    };
}
