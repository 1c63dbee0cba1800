//! Relation loading after primary mapping.
//!
//! A [`RelationSpec`] pairs a relation name with a [`RelationLoader`] that
//! batch-loads related data for the whole primary result set and attaches it
//! in place. The mapper runs every configured relation once, after keying and
//! before the records' `after_find` hook.

use crate::{
    compiler::QueryCompiler,
    error::Result,
    hit::{hits_of, RawHit},
    key::HitKey,
    mapper::MappedResults,
    record::Record,
    source::SourceProjection,
    transport::Transport,
};
use async_trait::async_trait;
use hitmap_log::debug;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Loads one relation onto a primary result set.
#[async_trait]
pub trait RelationLoader<R: Record>: Send + Sync {
    /// Load `relation` and attach it to every primary result.
    ///
    /// `as_array` is the effective mode: the relation's own setting, or the
    /// primary mapper's when the relation left it unset.
    async fn populate(
        &self,
        relation: &str,
        primary: &mut MappedResults<R>,
        as_array: bool,
    ) -> Result<()>;
}

/// A named relation and its loader.
pub struct RelationSpec<R: Record> {
    name: String,
    loader: Arc<dyn RelationLoader<R>>,
    as_array: Option<bool>,
}

impl<R: Record> RelationSpec<R> {
    /// Create a relation whose mode follows the primary mapper.
    pub fn new(name: impl Into<String>, loader: impl RelationLoader<R> + 'static) -> Self {
        Self::shared(name, Arc::new(loader))
    }

    /// Create a relation around an already shared loader.
    pub fn shared(name: impl Into<String>, loader: Arc<dyn RelationLoader<R>>) -> Self {
        Self {
            name: name.into(),
            loader,
            as_array: None,
        }
    }

    /// Pin the relation's mode instead of inheriting it.
    pub fn as_array(mut self, as_array: bool) -> Self {
        self.as_array = Some(as_array);
        self
    }

    /// Relation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The mode the loader runs in under a primary mapper in `inherited` mode.
    pub fn effective_mode(&self, inherited: bool) -> bool {
        self.as_array.unwrap_or(inherited)
    }
}

impl<R: Record> Clone for RelationSpec<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            loader: Arc::clone(&self.loader),
            as_array: self.as_array,
        }
    }
}

impl<R: Record> fmt::Debug for RelationSpec<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationSpec")
            .field("name", &self.name)
            .field("as_array", &self.as_array)
            .finish_non_exhaustive()
    }
}

/// Run every relation over `primary`, in order.
pub async fn populate_relations<R: Record>(
    relations: &[RelationSpec<R>],
    primary: &mut MappedResults<R>,
    as_array: bool,
) -> Result<()> {
    for relation in relations {
        let mode = relation.effective_mode(as_array);
        debug!(
            "Loading relation '{}' for {} results (as_array: {})",
            relation.name,
            primary.len(),
            mode
        );
        relation
            .loader
            .populate(&relation.name, primary, mode)
            .await?;
    }
    Ok(())
}

/// Loads related documents from an index with one `terms` query.
///
/// Primary results are linked through `primary_key`, related documents
/// through `foreign_key`. A has-many relation attaches an array (empty when
/// nothing matched); a has-one relation attaches the first match or `null`.
/// Related data is attached as source documents whatever the effective
/// mode, so the `as_array` flag passed to [`RelationLoader::populate`] is
/// ignored here; records receive the documents through
/// [`Record::populate_relation`].
pub struct TermsRelation<T> {
    transport: Arc<T>,
    index: String,
    foreign_key: String,
    primary_key: String,
    multiple: bool,
    size: u64,
}

impl<T: Transport> TermsRelation<T> {
    /// Has-many relation: `related.foreign_key == primary.primary_key`.
    pub fn has_many(
        transport: Arc<T>,
        index: impl Into<String>,
        foreign_key: impl Into<String>,
        primary_key: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            index: index.into(),
            foreign_key: foreign_key.into(),
            primary_key: primary_key.into(),
            multiple: true,
            size: 10_000,
        }
    }

    /// Has-one relation: `related.foreign_key == primary.primary_key`.
    pub fn has_one(
        transport: Arc<T>,
        index: impl Into<String>,
        foreign_key: impl Into<String>,
        primary_key: impl Into<String>,
    ) -> Self {
        Self {
            multiple: false,
            ..Self::has_many(transport, index, foreign_key, primary_key)
        }
    }

    /// Cap on related documents fetched per batch.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    fn link_values<R: Record>(&self, primary: &MappedResults<R>) -> Vec<Value> {
        let mut seen = Vec::new();
        let mut values = Vec::new();
        for value in primary.attributes(&self.primary_key).into_iter().flatten() {
            if value.is_null() {
                continue;
            }
            let key = HitKey::from_value(&value);
            if !seen.contains(&key) {
                seen.push(key);
                values.push(value);
            }
        }
        values
    }
}

#[async_trait]
impl<R, T> RelationLoader<R> for TermsRelation<T>
where
    R: Record + 'static,
    T: Transport + 'static,
{
    async fn populate(
        &self,
        relation: &str,
        primary: &mut MappedResults<R>,
        _as_array: bool,
    ) -> Result<()> {
        let links = self.link_values(primary);
        let mut groups: HashMap<HitKey, Vec<Value>> = HashMap::new();

        if !links.is_empty() {
            let size = i64::try_from(self.size).unwrap_or(i64::MAX);
            let request = QueryCompiler::new()
                .query(json!({ "terms": { self.foreign_key.as_str(): links } }))
                .with_source(SourceProjection::All)
                .limit(size, 0)?
                .compile();

            let response = self.transport.execute(&self.index, &request).await?;
            for hit in hits_of(&response) {
                let body = RawHit::from_value(hit).into_body();
                if let Some(link) = body.get(&self.foreign_key) {
                    groups
                        .entry(HitKey::from_value(link))
                        .or_default()
                        .push(body.clone());
                }
            }
        }

        let multiple = self.multiple;
        primary.attach(relation, &self.primary_key, |link| {
            let related = link
                .map(HitKey::from_value)
                .and_then(|key| groups.get(&key));
            match (related, multiple) {
                (Some(docs), true) => Value::Array(docs.clone()),
                (None, true) => Value::Array(Vec::new()),
                (Some(docs), false) => docs.first().cloned().unwrap_or(Value::Null),
                (None, false) => Value::Null,
            }
        });

        Ok(())
    }
}
