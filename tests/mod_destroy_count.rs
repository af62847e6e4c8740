mod common;

use std::sync::Arc;

use bson::doc;
use common::{Fixture, names};
use nexus_adapter::errors::AdapterError;
use nexus_adapter::query::QueryDescriptor;
use nexus_adapter::store::{DeleteReport, StoreOp};
use parking_lot::RwLock;

async fn seeded() -> Fixture {
    let fx = Fixture::new();
    fx.seed(
        "user",
        vec![doc! { "name": "ann", "age": 20 }, doc! { "name": "bob", "age": 35 }, doc! { "name": "cid", "age": 50 }],
    )
    .await;
    fx
}

#[tokio::test]
async fn destroy_returns_the_native_report() {
    let fx = seeded().await;
    let q = QueryDescriptor::new("user").filter(doc! { "age": { ">=": 35 } });
    let report = fx.adapter.destroy(&q).await.unwrap();
    assert_eq!(report, DeleteReport { acknowledged: true, deleted: 2 });
    assert_eq!(names(&fx.adapter.find(&QueryDescriptor::new("user")).await.unwrap()), vec!["ann"]);
}

#[tokio::test]
async fn destroy_without_matches_deletes_nothing() {
    let fx = seeded().await;
    let q = QueryDescriptor::new("user").filter(doc! { "name": "zed" });
    assert_eq!(fx.adapter.destroy(&q).await.unwrap().deleted, 0);
    assert_eq!(fx.users().len(), 3);
}

#[tokio::test]
async fn destroy_is_audited_with_the_deleted_count() {
    let fx = seeded().await;
    let sink = Arc::new(RwLock::new(Vec::new()));
    fx.adapter.telemetry().set_audit_sink_for_tests(sink.clone());
    fx.adapter.destroy(&QueryDescriptor::new("user").filter(doc! { "name": "ann" })).await.unwrap();
    let v: serde_json::Value = serde_json::from_str(&sink.read()[0]).unwrap();
    assert_eq!(v["op"], "destroy");
    assert_eq!(v["affected"], 1);
}

#[tokio::test]
async fn destroy_with_bad_filter_touches_nothing() {
    let fx = seeded().await;
    let err = fx.adapter.destroy(&QueryDescriptor::new("user").filter(doc! { "or": [] })).await.unwrap_err();
    assert!(matches!(err, AdapterError::FilterBuildFailure(_)));
    assert_eq!(fx.users().calls(StoreOp::DeleteMany), 0);
    assert_eq!(fx.users().len(), 3);
}

#[tokio::test]
async fn count_matches_find() {
    let fx = seeded().await;
    assert_eq!(fx.adapter.count(&QueryDescriptor::new("user")).await.unwrap(), 3);
    let q = QueryDescriptor::new("user").filter(doc! { "age": { "<": 40 } });
    assert_eq!(fx.adapter.count(&q).await.unwrap(), fx.adapter.find(&q).await.unwrap().len() as u64);
}

#[tokio::test]
async fn count_ignores_limit_and_skip() {
    let fx = seeded().await;
    let q = QueryDescriptor::new("user").limit(1).skip(1);
    assert_eq!(fx.adapter.count(&q).await.unwrap(), 3);
}

#[tokio::test]
async fn count_of_empty_collection_is_zero() {
    let fx = Fixture::new();
    assert_eq!(fx.adapter.count(&QueryDescriptor::new("pet")).await.unwrap(), 0);
}

#[tokio::test]
async fn count_failure_is_wrapped() {
    let fx = seeded().await;
    fx.users().fail_next(StoreOp::CountDocuments);
    let err = fx.adapter.count(&QueryDescriptor::new("user")).await.unwrap_err();
    assert!(matches!(err, AdapterError::StoreCommunicationFailure { op: "count_documents", .. }));
}
