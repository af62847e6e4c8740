mod common;

use bson::doc;
use bson::oid::ObjectId;
use common::{Fixture, names};
use nexus_adapter::errors::AdapterError;
use nexus_adapter::query::QueryDescriptor;
use nexus_adapter::store::{NativeCollection, StoreError, StoreOp};

async fn seeded() -> Fixture {
    let fx = Fixture::new();
    fx.seed(
        "user",
        vec![
            doc! { "name": "ann", "age": 31 },
            doc! { "name": "bob", "age": 25 },
            doc! { "name": "cid", "age": 40 },
            doc! { "name": "dee", "age": 25 },
        ],
    )
    .await;
    fx
}

#[tokio::test]
async fn absent_where_returns_everything_with_string_ids() {
    let fx = seeded().await;
    let out = fx.adapter.find(&QueryDescriptor::new("user")).await.unwrap();
    assert_eq!(out.len(), 4);
    for r in &out {
        let id = r.get_str("id").unwrap();
        assert_eq!(id.len(), 24);
        assert!(!r.contains_key("_id"));
    }
}

#[tokio::test]
async fn comparators_and_logicals_filter_records() {
    let fx = seeded().await;
    let q = QueryDescriptor::new("user").filter(doc! { "age": { ">": 30 } }).sort_by("name", "asc");
    assert_eq!(names(&fx.adapter.find(&q).await.unwrap()), vec!["ann", "cid"]);

    let q = QueryDescriptor::new("user")
        .filter(doc! { "or": [ { "name": "ann" }, { "age": { "lte": 25 } } ] })
        .sort_by("name", "asc");
    assert_eq!(names(&fx.adapter.find(&q).await.unwrap()), vec!["ann", "bob", "dee"]);

    let q = QueryDescriptor::new("user").filter(doc! { "not": [ { "age": 25 } ] }).sort_by("name", "asc");
    assert_eq!(names(&fx.adapter.find(&q).await.unwrap()), vec!["ann", "cid"]);
}

#[tokio::test]
async fn list_value_matches_any_member() {
    let fx = seeded().await;
    let q = QueryDescriptor::new("user").filter(doc! { "name": ["bob", "cid", "zed"] }).sort_by("name", "asc");
    assert_eq!(names(&fx.adapter.find(&q).await.unwrap()), vec!["bob", "cid"]);
}

#[tokio::test]
async fn pattern_modifiers_match_literally() {
    let fx = Fixture::new();
    fx.seed("user", vec![doc! { "name": "a.c" }, doc! { "name": "abc" }, doc! { "name": "Alice" }]).await;

    let q = QueryDescriptor::new("user").filter(doc! { "name": { "contains": "." } });
    assert_eq!(names(&fx.adapter.find(&q).await.unwrap()), vec!["a.c"]);

    let q = QueryDescriptor::new("user").filter(doc! { "name": { "like": "a_c" } }).sort_by("name", "asc");
    assert_eq!(names(&fx.adapter.find(&q).await.unwrap()), vec!["a.c", "abc"]);

    let q = QueryDescriptor::new("user").filter(doc! { "name": { "startsWith": "a" } });
    assert_eq!(fx.adapter.find(&q).await.unwrap().len(), 2);
}

#[tokio::test]
async fn case_insensitive_patterns_follow_config() {
    let config = nexus_adapter::config::AdapterConfig { case_sensitive: false, ..Default::default() };
    let fx = Fixture::with_config(config);
    fx.seed("user", vec![doc! { "name": "Alice" }, doc! { "name": "bob" }]).await;
    let q = QueryDescriptor::new("user").filter(doc! { "name": { "startsWith": "a" } });
    assert_eq!(names(&fx.adapter.find(&q).await.unwrap()), vec!["Alice"]);
}

#[tokio::test]
async fn sort_limit_skip_and_select() {
    let fx = seeded().await;
    let q = QueryDescriptor::new("user").sort_by("age", "DESC").sort_by("name", "asc").skip(1).limit(2);
    assert_eq!(names(&fx.adapter.find(&q).await.unwrap()), vec!["ann", "bob"]);

    let q = QueryDescriptor::new("user").filter(doc! { "name": "cid" }).select(&["name"]);
    let out = fx.adapter.find(&q).await.unwrap();
    assert_eq!(out.len(), 1);
    assert!(out[0].contains_key("id"));
    assert!(out[0].contains_key("name"));
    assert!(!out[0].contains_key("age"));
}

#[tokio::test]
async fn zero_limit_means_no_limit() {
    let fx = seeded().await;
    let q = QueryDescriptor::new("user").limit(0).skip(0);
    assert_eq!(fx.adapter.find(&q).await.unwrap().len(), 4);
}

#[tokio::test]
async fn lookup_by_string_id() {
    let fx = seeded().await;
    let all = fx.adapter.find(&QueryDescriptor::new("user").sort_by("name", "asc")).await.unwrap();
    let bob_id = all[1].get_str("id").unwrap().to_string();

    let out = fx.adapter.find(&QueryDescriptor::new("user").filter(doc! { "id": bob_id.clone() })).await.unwrap();
    assert_eq!(names(&out), vec!["bob"]);
    assert_eq!(out[0].get_str("id").unwrap(), bob_id);

    let q = QueryDescriptor::new("user").filter(doc! { "id": { "in": [bob_id, ObjectId::new().to_hex()] } });
    assert_eq!(fx.adapter.find(&q).await.unwrap().len(), 1);
}

#[tokio::test]
async fn malformed_id_fails_before_any_store_call() {
    let fx = seeded().await;
    let before = fx.users().calls(StoreOp::Find);
    let err = fx.adapter.find(&QueryDescriptor::new("user").filter(doc! { "id": "not-hex" })).await.unwrap_err();
    assert!(matches!(err, AdapterError::InvalidIdentifier(s) if s == "not-hex"));
    assert_eq!(fx.users().calls(StoreOp::Find), before);
}

#[tokio::test]
async fn custom_primary_key_is_exposed_under_its_name() {
    let fx = Fixture::new();
    fx.seed("tag", vec![doc! { "slug": "rust", "label": "Rust" }]).await;
    let out = fx.adapter.find(&QueryDescriptor::new("tag").filter(doc! { "slug": "rust" })).await.unwrap();
    assert_eq!(out, vec![doc! { "slug": "rust", "label": "Rust" }]);
    let raw = fx.store.memory_collection("tag").documents();
    assert_eq!(raw[0].get_str("_id").unwrap(), "rust");
}

#[tokio::test]
async fn references_come_back_as_strings() {
    let fx = Fixture::new();
    let owner = fx.seed("user", vec![doc! { "name": "ann" }]).await.remove(0);
    let owner_id = owner.get_str("id").unwrap().to_string();
    fx.seed("pet", vec![doc! { "name": "rex", "owner": owner_id.clone() }]).await;

    let raw = fx.pets().documents();
    assert!(raw[0].get_object_id("owner").is_ok());

    let q = QueryDescriptor::new("pet").filter(doc! { "owner": owner_id.clone() });
    let out = fx.adapter.find(&q).await.unwrap();
    assert_eq!(out[0].get_str("owner").unwrap(), owner_id);
}

#[tokio::test]
async fn unregistered_target_is_reported() {
    let fx = Fixture::new();
    let err = fx.adapter.find(&QueryDescriptor::new("ghost")).await.unwrap_err();
    assert!(matches!(err, AdapterError::UnregisteredCollection(n) if n == "ghost"));
    assert!(fx.store.collection_names().is_empty());
}

#[tokio::test]
async fn unknown_modifier_names_field_and_operator() {
    let fx = Fixture::new();
    let q = QueryDescriptor::new("user").filter(doc! { "age": { "between": [1, 2] } });
    match fx.adapter.find(&q).await.unwrap_err() {
        AdapterError::UnsupportedOperator { field, operator } => {
            assert_eq!(field, "age");
            assert_eq!(operator, "between");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn store_failure_is_wrapped() {
    let fx = seeded().await;
    fx.users().fail_next(StoreOp::Find);
    let err = fx.adapter.find(&QueryDescriptor::new("user")).await.unwrap_err();
    assert!(matches!(
        err,
        AdapterError::StoreCommunicationFailure { op: "find", source: StoreError::Backend(_) }
    ));
    assert_eq!(fx.adapter.telemetry().snapshot().calls_failed_total, 1);
    assert_eq!(fx.adapter.find(&QueryDescriptor::new("user")).await.unwrap().len(), 4);
}

#[tokio::test]
async fn repeated_find_is_stable() {
    let fx = seeded().await;
    let q = QueryDescriptor::new("user").filter(doc! { "age": 25 }).sort_by("name", "asc");
    let a = fx.adapter.find(&q).await.unwrap();
    let b = fx.adapter.find(&q).await.unwrap();
    assert_eq!(a, b);
    assert_eq!(fx.users().name(), "user");
}
