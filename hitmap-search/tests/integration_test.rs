//! Integration tests for hitmap-search

use async_trait::async_trait;
use hitmap_search::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct Article {
    id: i64,
    title: String,
    body: String,
    #[serde(skip)]
    author: Option<Value>,
    #[serde(skip)]
    finalized: bool,
    #[serde(skip)]
    author_seen_on_finalize: bool,
}

impl Record for Article {
    fn populate_relation(&mut self, name: &str, related: Value) {
        if name == "author" {
            self.author = Some(related);
        }
    }

    fn after_find(&mut self) {
        self.finalized = true;
        self.author_seen_on_finalize = self.author.is_some();
    }
}

fn article(id: i64, title: &str) -> Article {
    Article {
        id,
        title: title.to_string(),
        body: format!("body of {}", title),
        ..Default::default()
    }
}

#[derive(Default)]
struct ArticleStore {
    records: HashMap<String, Article>,
    lookups: AtomicUsize,
    fail_lookups: bool,
}

impl ArticleStore {
    fn with(records: Vec<Article>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|a| (a.id.to_string(), a))
                .collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl RecordStore<Article> for ArticleStore {
    async fn find_by_identity(&self, identity: &Value) -> Result<Option<Article>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookups {
            return Err(SearchError::Transport("store offline".into()));
        }
        let key = match identity {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Ok(self.records.get(&key).cloned())
    }
}

#[derive(Default)]
struct FakeTransport {
    responses: HashMap<String, Value>,
    requests: Mutex<Vec<(String, Value)>>,
}

impl FakeTransport {
    fn with(index: &str, response: Value) -> Self {
        let mut responses = HashMap::new();
        responses.insert(index.to_string(), response);
        Self {
            responses,
            ..Default::default()
        }
    }

    fn requests(&self) -> Vec<(String, Value)> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn execute(&self, index: &str, request: &RequestDocument) -> Result<Value> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((index.to_string(), request.to_json()));
        }
        self.responses
            .get(index)
            .cloned()
            .ok_or_else(|| SearchError::Transport(format!("no such index: {}", index)))
    }
}

fn response(hits: Vec<Value>) -> Value {
    json!({ "hits": { "total": { "value": hits.len() }, "hits": hits } })
}

fn full_hit(a: &Article) -> Value {
    json!({
        "_id": a.id.to_string(),
        "_source": { "id": a.id, "title": a.title, "body": a.body }
    })
}

// ========== Query Compiler ==========

#[test]
fn test_query_only_request_shape() {
    let request = QueryCompiler::new()
        .query(json!({ "match": { "title": "rust" } }))
        .compile();

    assert_eq!(
        request.to_json(),
        json!({
            "query": { "match": { "title": "rust" } },
            "sort": [{ "_id": { "order": "asc" } }],
            "_source": false
        })
    );
}

#[test]
fn test_with_source_fallback_and_override() {
    let compiler = QueryCompiler::new().with_source(SourceProjection::Filter {
        includes: vec!["title".into()],
        excludes: vec!["body".into()],
    });
    assert_eq!(
        compiler.compile().get("_source"),
        Some(&json!({ "includes": ["title"], "excludes": ["body"] }))
    );

    let compiler = compiler.source(["id"]);
    assert_eq!(compiler.compile().get("_source"), Some(&json!(["id"])));
}

#[test]
fn test_full_request() {
    let request = QueryCompiler::new()
        .query("ownership")
        .filter(json!({ "term": { "published": true } }))
        .limit(20, 40)
        .unwrap()
        .sort(SortSpec::new().desc("published_at"))
        .aggregations(json!({ "by_tag": { "terms": { "field": "tags" } } }))
        .highlight(json!({ "fields": { "body": {} } }))
        .pass_through(ReservedClause::StoredFields, json!(["title"]))
        .compile();

    assert_eq!(
        request.clause_names(),
        vec![
            "query", "filter", "from", "size", "aggs", "highlight", "sort", "_source",
            "stored_fields"
        ]
    );
    assert_eq!(request.get("from"), Some(&json!(40)));
    assert_eq!(
        request.get("sort"),
        Some(&json!([{ "published_at": { "order": "desc" } }]))
    );
    assert_eq!(
        serde_json::to_string(&request).unwrap(),
        serde_json::to_string(&request.to_json()).unwrap()
    );
}

#[test]
fn test_negative_pagination_is_config_error() {
    let err = QueryCompiler::new().limit(-10, 0).unwrap_err();
    assert!(matches!(err, SearchError::Config(_)));
    assert!(err.to_string().contains("size"));
}

// ========== Result Mapper: rows ==========

#[tokio::test]
async fn test_zero_hits_map_to_empty() {
    let rows = ResultMapper::rows().map(&json!({})).await.unwrap();
    assert!(rows.is_empty());

    let store = Arc::new(ArticleStore::default());
    let records = ResultMapper::<Article>::new(store)
        .map(&response(vec![]))
        .await
        .unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_end_to_end_rows() {
    let response = json!({ "hits": { "hits": [{ "_id": "1", "_source": { "id": 1, "title": "x" } }] } });
    let rows = ResultMapper::rows()
        .key_by("id")
        .map(&response)
        .await
        .unwrap()
        .into_rows()
        .unwrap();

    assert_eq!(rows.to_json(), json!({ "1": { "id": 1, "title": "x" } }));
}

#[tokio::test]
async fn test_duplicate_keys_last_wins() {
    let rows = ResultMapper::rows()
        .map(&response(vec![
            json!({ "_source": { "id": 5, "name": "a" } }),
            json!({ "_source": { "id": 6, "name": "b" } }),
            json!({ "_source": { "id": 5, "name": "c" } }),
        ]))
        .await
        .unwrap()
        .into_rows()
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows.get(&HitKey::Int(5)), Some(&json!({ "id": 5, "name": "c" })));
}

#[tokio::test]
async fn test_key_from_stored_fields_and_envelope() {
    let hits = vec![
        json!({ "_id": "a1", "_source": { "title": "x" }, "fields": { "slug": ["first-post"] } }),
        json!({ "_id": "a2", "_source": { "title": "y" } }),
    ];

    let by_slug = ResultMapper::rows().key_by("slug").map_hits(hits.clone()).await.unwrap();
    let by_slug = by_slug.rows().unwrap();
    assert!(by_slug.get(&HitKey::from("first-post")).is_some());
    // The second hit has no slug and takes the first fallback key.
    assert_eq!(by_slug.get(&HitKey::Int(0)), Some(&json!({ "title": "y" })));

    let by_id = ResultMapper::rows().key_by("_id").map_hits(hits).await.unwrap();
    let keys: Vec<String> = match by_id.rows().unwrap() {
        Collection::Keyed(keyed) => keyed.keys().map(ToString::to_string).collect(),
        Collection::List(_) => Vec::new(),
    };
    assert_eq!(keys, vec!["a1", "a2"]);
}

#[tokio::test]
async fn test_key_function_on_hits() {
    let rows = ResultMapper::rows()
        .key_by(KeyPolicy::<Value>::by_hit(|hit: &RawHit| {
            let id = hit.identity.as_ref().and_then(Value::as_str).unwrap_or("?");
            HitKey::from(format!("doc-{}", id))
        }))
        .map(&response(vec![json!({ "_id": "9", "_source": { "t": 1 } })]))
        .await
        .unwrap();

    assert!(rows.rows().unwrap().get(&HitKey::from("doc-9")).is_some());
}

#[tokio::test]
async fn test_disabled_keying_returns_list() {
    let rows = ResultMapper::rows()
        .key_by(KeyPolicy::Disabled)
        .map(&response(vec![
            json!({ "_source": { "id": 2 } }),
            json!({ "_source": { "id": 1 } }),
            json!({ "_source": { "id": 2 } }),
        ]))
        .await
        .unwrap();

    assert_eq!(
        rows.into_rows().unwrap(),
        Collection::List(vec![json!({ "id": 2 }), json!({ "id": 1 }), json!({ "id": 2 })])
    );
}

#[tokio::test]
async fn test_select_path_flattens_tags() {
    let rows = ResultMapper::rows()
        .select_path("tags.*")
        .map(&response(vec![
            json!({ "_id": "1", "_source": { "tags": ["rust", "async"] } }),
            json!({ "_id": "2", "_source": { "tags": ["serde", "json"] } }),
        ]))
        .await
        .unwrap()
        .into_rows()
        .unwrap();

    assert_eq!(rows.len(), 4);
    assert_eq!(
        rows.values().cloned().collect::<Vec<_>>(),
        vec![json!("rust"), json!("async"), json!("serde"), json!("json")]
    );
}

#[tokio::test]
async fn test_select_path_with_hydration_is_config_error() {
    let store = Arc::new(ArticleStore::default());
    let err = ResultMapper::<Article>::new(store)
        .select_path("tags.*")
        .map(&response(vec![json!({ "_source": { "tags": ["a"] } })]))
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::Config(_)));
}

#[tokio::test]
async fn test_zero_hits_skip_config_checks() {
    let store = Arc::new(ArticleStore::default());
    let records = ResultMapper::<Article>::new(store)
        .select_path("tags.*")
        .map(&response(vec![]))
        .await
        .unwrap();
    assert!(records.is_empty());

    let rows = ResultMapper::rows()
        .key_by(KeyPolicy::Disabled)
        .map(&json!({ "hits": { "hits": [] } }))
        .await
        .unwrap();
    assert_eq!(rows.into_rows(), Some(Collection::List(Vec::new())));
}

#[tokio::test]
async fn test_null_keys_take_fallback_keys() {
    let rows = ResultMapper::rows()
        .map(&response(vec![
            json!({ "_source": { "id": null, "name": "a" } }),
            json!({ "_source": { "id": null, "name": "b" } }),
            json!({ "_source": { "name": "c" } }),
        ]))
        .await
        .unwrap()
        .into_rows()
        .unwrap();

    assert_eq!(rows.len(), 3);
    assert_eq!(
        rows.to_json(),
        json!({
            "0": { "id": null, "name": "a" },
            "1": { "id": null, "name": "b" },
            "2": { "name": "c" }
        })
    );
}

// ========== Result Mapper: records ==========

#[tokio::test]
async fn test_full_hits_hydrate_without_lookup() {
    let store = Arc::new(ArticleStore::default());
    let records = ResultMapper::<Article>::new(store.clone())
        .map(&response(vec![full_hit(&article(1, "a")), full_hit(&article(2, "b"))]))
        .await
        .unwrap()
        .into_records()
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records.get(&HitKey::Int(2)).map(|a| a.title.as_str()), Some("b"));
    assert!(records.values().all(|a| a.finalized));
    assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_partial_hit_is_fetched_by_identity() {
    let store = Arc::new(ArticleStore::with(vec![article(3, "complete")]));
    let records = ResultMapper::<Article>::new(store.clone())
        .map(&response(vec![json!({ "_id": "3", "_source": { "id": 3 } })]))
        .await
        .unwrap()
        .into_records()
        .unwrap();

    assert_eq!(store.lookups.load(Ordering::SeqCst), 1);
    let found = records.get(&HitKey::Int(3)).unwrap();
    assert_eq!(found.title, "complete");
    assert!(found.finalized);
}

#[tokio::test]
async fn test_partial_hit_not_found_is_dropped() {
    let store = Arc::new(ArticleStore::with(vec![article(3, "complete")]));
    let results = ResultMapper::<Article>::new(store.clone())
        .map(&response(vec![
            full_hit(&article(1, "a")),
            json!({ "_id": "404", "_source": { "id": 404 } }),
            full_hit(&article(2, "b")),
        ]))
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(store.lookups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_partial_hit_without_identity_is_dropped() {
    let store = Arc::new(ArticleStore::with(vec![article(3, "complete")]));
    let results = ResultMapper::<Article>::new(store.clone())
        .map_hits(vec![json!({ "title": "no identity" })])
        .await
        .unwrap();

    assert!(results.is_empty());
    assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failed_lookup_is_dropped() {
    let store = Arc::new(ArticleStore {
        fail_lookups: true,
        ..ArticleStore::with(vec![article(3, "complete")])
    });
    let results = ResultMapper::<Article>::new(store)
        .map(&response(vec![json!({ "_id": "3", "_source": { "id": 3 } })]))
        .await
        .unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_scalar_hits_are_wrapped_as_identity() {
    let store = Arc::new(ArticleStore::with(vec![article(7, "seven"), article(8, "eight")]));
    let records = ResultMapper::<Article>::new(store.clone())
        .map_hits(vec![json!(7), json!("8"), json!(99)])
        .await
        .unwrap()
        .into_records()
        .unwrap();

    assert_eq!(store.lookups.load(Ordering::SeqCst), 3);
    assert_eq!(records.len(), 2);
    assert!(records.get(&HitKey::Int(8)).is_some());
}

#[tokio::test]
async fn test_hydration_error_propagates() {
    let store = Arc::new(ArticleStore::default());
    let err = ResultMapper::<Article>::new(store)
        .map(&response(vec![json!({ "_source": { "id": "seven", "title": "x", "body": "y" } })]))
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::Hydration(_)));
}

#[tokio::test]
async fn test_record_key_function() {
    let store = Arc::new(ArticleStore::default());
    let records = ResultMapper::<Article>::new(store)
        .key_by(KeyPolicy::by_record(|a: &Article| HitKey::from(a.title.to_uppercase())))
        .map(&response(vec![full_hit(&article(1, "alpha"))]))
        .await
        .unwrap();

    assert!(records.records().unwrap().get(&HitKey::from("ALPHA")).is_some());
}

#[tokio::test]
async fn test_hit_key_function_with_records_is_config_error() {
    let store = Arc::new(ArticleStore::default());
    let err = ResultMapper::<Article>::new(store)
        .key_by(KeyPolicy::<Article>::by_hit(|_: &RawHit| HitKey::Int(0)))
        .map(&response(vec![full_hit(&article(1, "a"))]))
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::Config(_)));
}

#[tokio::test]
async fn test_custom_key_and_identity_fields() {
    let config = SearchConfig::new().with_key_field("title").with_identity_field("_id");
    let store = Arc::new(ArticleStore::default());
    let records = ResultMapper::<Article>::with_config(store, &config)
        .map(&response(vec![full_hit(&article(1, "alpha"))]))
        .await
        .unwrap();
    assert!(records.records().unwrap().get(&HitKey::from("alpha")).is_some());
}

// ========== Relations ==========

struct RecordingLoader {
    modes: Mutex<Vec<bool>>,
}

#[async_trait]
impl<R: Record + 'static> RelationLoader<R> for RecordingLoader {
    async fn populate(
        &self,
        relation: &str,
        primary: &mut MappedResults<R>,
        as_array: bool,
    ) -> Result<()> {
        if let Ok(mut modes) = self.modes.lock() {
            modes.push(as_array);
        }
        primary.attach(relation, "id", |id| json!({ "for": id.cloned() }));
        Ok(())
    }
}

#[tokio::test]
async fn test_relation_mode_inherits_and_runs_before_after_find() {
    let loader = Arc::new(RecordingLoader {
        modes: Mutex::new(Vec::new()),
    });
    let store = Arc::new(ArticleStore::default());

    let records = ResultMapper::<Article>::new(store)
        .with_relations(vec![
            RelationSpec::<Article>::shared("author", loader.clone()),
            RelationSpec::<Article>::shared("other", loader.clone()).as_array(true),
        ])
        .map(&response(vec![full_hit(&article(1, "a"))]))
        .await
        .unwrap()
        .into_records()
        .unwrap();

    assert_eq!(*loader.modes.lock().unwrap(), vec![false, true]);
    let first = records.get(&HitKey::Int(1)).unwrap();
    assert_eq!(first.author, Some(json!({ "for": 1 })));
    assert!(first.author_seen_on_finalize);
}

#[tokio::test]
async fn test_relations_on_rows() {
    let loader = Arc::new(RecordingLoader {
        modes: Mutex::new(Vec::new()),
    });
    let rows = ResultMapper::rows()
        .with_relation(RelationSpec::<Value>::shared("meta", loader.clone()))
        .map(&response(vec![json!({ "_source": { "id": 4 } })]))
        .await
        .unwrap();

    assert_eq!(*loader.modes.lock().unwrap(), vec![true]);
    assert_eq!(
        rows.rows().unwrap().get(&HitKey::Int(4)),
        Some(&json!({ "id": 4, "meta": { "for": 4 } }))
    );
}

#[tokio::test]
async fn test_terms_relation_has_many() {
    let comments = Arc::new(FakeTransport::with(
        "comments",
        response(vec![
            json!({ "_id": "c1", "_source": { "article_id": 1, "text": "first" } }),
            json!({ "_id": "c2", "_source": { "article_id": 1, "text": "second" } }),
            json!({ "_id": "c3", "_source": { "article_id": 2, "text": "other" } }),
        ]),
    ));

    let rows = ResultMapper::rows()
        .with_relation(RelationSpec::new(
            "comments",
            TermsRelation::has_many(comments.clone(), "comments", "article_id", "id"),
        ))
        .map(&response(vec![
            json!({ "_source": { "id": 1 } }),
            json!({ "_source": { "id": 2 } }),
            json!({ "_source": { "id": 3 } }),
        ]))
        .await
        .unwrap()
        .into_rows()
        .unwrap();

    let texts = |key: i64| -> Vec<Value> {
        rows.get(&HitKey::Int(key))
            .and_then(|row| row.get("comments"))
            .and_then(Value::as_array)
            .map(|docs| docs.iter().map(|d| d["text"].clone()).collect())
            .unwrap_or_default()
    };
    assert_eq!(texts(1), vec![json!("first"), json!("second")]);
    assert_eq!(texts(2), vec![json!("other")]);
    assert!(texts(3).is_empty());

    let requests = comments.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].1["query"],
        json!({ "terms": { "article_id": [1, 2, 3] } })
    );
}

#[tokio::test]
async fn test_terms_relation_has_one_on_records() {
    let authors = Arc::new(FakeTransport::with(
        "authors",
        response(vec![json!({ "_id": "u1", "_source": { "article_id": 1, "name": "Ann" } })]),
    ));
    let store = Arc::new(ArticleStore::default());

    let records = ResultMapper::<Article>::new(store)
        .with_relation(RelationSpec::new(
            "author",
            TermsRelation::has_one(authors, "authors", "article_id", "id"),
        ))
        .map(&response(vec![full_hit(&article(1, "a")), full_hit(&article(2, "b"))]))
        .await
        .unwrap()
        .into_records()
        .unwrap();

    assert_eq!(
        records.get(&HitKey::Int(1)).and_then(|a| a.author.clone()),
        Some(json!({ "article_id": 1, "name": "Ann" }))
    );
    assert_eq!(
        records.get(&HitKey::Int(2)).and_then(|a| a.author.clone()),
        Some(Value::Null)
    );
}

#[tokio::test]
async fn test_terms_relation_shape_ignores_mode() {
    let comments = Arc::new(FakeTransport::with(
        "comments",
        response(vec![json!({ "_source": { "article_id": 1, "text": "hi" } })]),
    ));

    for as_array in [true, false] {
        let rows = ResultMapper::rows()
            .with_relation(
                RelationSpec::new(
                    "comments",
                    TermsRelation::has_many(comments.clone(), "comments", "article_id", "id"),
                )
                .as_array(as_array),
            )
            .map(&response(vec![json!({ "_source": { "id": 1 } })]))
            .await
            .unwrap();

        assert_eq!(
            rows.rows().and_then(|r| r.get(&HitKey::Int(1))),
            Some(&json!({ "id": 1, "comments": [{ "article_id": 1, "text": "hi" }] }))
        );
    }
}

// ========== Transport-backed pieces ==========

#[tokio::test]
async fn test_search_query_all_and_one() {
    let transport = Arc::new(FakeTransport::with(
        "articles",
        response(vec![full_hit(&article(1, "a")), full_hit(&article(2, "b"))]),
    ));

    let search = SearchQuery::new(transport.clone(), "articles", ResultMapper::rows())
        .compiler(QueryCompiler::new().query("a").with_source(true));

    assert_eq!(search.all().await.unwrap().len(), 2);
    match search.one().await.unwrap() {
        Some(Mapped::Row(row)) => assert_eq!(row["id"], json!(2)),
        other => panic!("unexpected: {:?}", other),
    }

    let (index, body) = &transport.requests()[0];
    assert_eq!(index, "articles");
    assert_eq!(body["_source"], json!("*"));
}

#[tokio::test]
async fn test_search_query_transport_error_surfaces() {
    let transport = Arc::new(FakeTransport::default());
    let err = SearchQuery::new(transport, "missing", ResultMapper::rows())
        .all()
        .await
        .unwrap_err();
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_search_query_from_config() {
    let transport = Arc::new(FakeTransport::default());
    assert!(SearchQuery::from_config(transport.clone(), &SearchConfig::new(), ResultMapper::rows()).is_err());

    let search = SearchQuery::from_config(
        transport,
        &SearchConfig::new().with_index("articles").with_identity_field("uuid"),
        ResultMapper::rows(),
    )
    .unwrap();
    assert_eq!(search.index(), "articles");
    assert_eq!(
        search.request().get("sort"),
        Some(&json!([{ "uuid": { "order": "asc" } }]))
    );
}

#[tokio::test]
async fn test_index_store_lookup_feeds_partial_hydration() {
    let transport = Arc::new(FakeTransport::with(
        "articles",
        response(vec![full_hit(&article(5, "from index"))]),
    ));
    let store: Arc<dyn RecordStore<Article>> =
        Arc::new(IndexStore::<Article, _>::new(transport.clone(), "articles"));

    let records = ResultMapper::new(store)
        .map(&response(vec![json!({ "_id": "5", "_source": { "id": 5 } })]))
        .await
        .unwrap()
        .into_records()
        .unwrap();

    assert_eq!(records.get(&HitKey::Int(5)).map(|a| a.title.as_str()), Some("from index"));

    let requests = transport.requests();
    assert_eq!(requests[0].1["query"], json!({ "ids": { "values": ["5"] } }));
    assert_eq!(requests[0].1["size"], json!(1));
}
