//! In-process document store.
//!
//! Backs tests and embedded use. Every collection keeps its documents in
//! insertion order behind a `parking_lot` lock, counts calls per operation and
//! can be told to fail the next call of a given kind.

pub mod eval;
pub mod group;

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document as BsonDocument};
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use super::{
    Datastore, DeleteReport, DocumentStream, FindOptions, InsertManyAck, NativeCollection, StoreError,
    UpdateReport,
};
use crate::types::NATIVE_ID_FIELD;
use eval::{apply_update, compare_docs, eval_filter, parse_filter, parse_update, project};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Find,
    Cursor,
    Aggregate,
    InsertMany,
    UpdateMany,
    DeleteMany,
    CountDocuments,
}

#[derive(Debug)]
pub struct MemoryCollection {
    name: String,
    docs: RwLock<Vec<BsonDocument>>,
    calls: Mutex<HashMap<StoreOp, u64>>,
    armed_failures: Mutex<HashSet<StoreOp>>,
}

impl MemoryCollection {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            docs: RwLock::new(Vec::new()),
            calls: Mutex::new(HashMap::new()),
            armed_failures: Mutex::new(HashSet::new()),
        }
    }

    /// Number of calls of `op` received so far, failed ones included.
    #[must_use]
    pub fn calls(&self, op: StoreOp) -> u64 {
        self.calls.lock().get(&op).copied().unwrap_or(0)
    }

    /// Makes the next call of `op` fail with a backend error.
    pub fn fail_next(&self, op: StoreOp) {
        self.armed_failures.lock().insert(op);
    }

    /// Snapshot of the stored documents in insertion order.
    #[must_use]
    pub fn documents(&self) -> Vec<BsonDocument> {
        self.docs.read().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    fn enter(&self, op: StoreOp) -> Result<(), StoreError> {
        *self.calls.lock().entry(op).or_insert(0) += 1;
        if self.armed_failures.lock().remove(&op) {
            log::debug!("{}: injected failure on {op:?}", self.name);
            return Err(StoreError::Backend(format!("injected failure on {op:?}")));
        }
        Ok(())
    }

    fn find_sync(&self, filter: &BsonDocument, options: &FindOptions) -> Result<Vec<BsonDocument>, StoreError> {
        let filter = parse_filter(filter)?;
        let mut out: Vec<BsonDocument> =
            self.docs.read().iter().filter(|d| eval_filter(d, &filter)).cloned().collect();
        if let Some(sort) = &options.sort {
            out.sort_by(|a, b| compare_docs(a, b, sort));
        }
        let skip = options.skip.map_or(0, |s| usize::try_from(s).unwrap_or(usize::MAX));
        let limit =
            options.limit.filter(|l| *l > 0).map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        let out = out.into_iter().skip(skip).take(limit);
        Ok(match &options.projection {
            Some(p) => out.map(|d| project(&d, p)).collect(),
            None => out.collect(),
        })
    }

    fn insert_sync(&self, docs: Vec<BsonDocument>) -> Result<InsertManyAck, StoreError> {
        let mut stored = self.docs.write();
        let mut prepared: Vec<BsonDocument> = Vec::with_capacity(docs.len());
        let mut inserted_ids = BTreeMap::new();
        for (i, doc) in docs.into_iter().enumerate() {
            let (doc, id) = with_native_id(doc);
            if stored.iter().chain(prepared.iter()).any(|d| d.get(NATIVE_ID_FIELD) == Some(&id)) {
                return Err(StoreError::DuplicateKey { collection: self.name.clone(), key: id.to_string() });
            }
            inserted_ids.insert(i, id);
            prepared.push(doc);
        }
        stored.extend(prepared);
        Ok(InsertManyAck { acknowledged: true, inserted_ids })
    }

    fn update_sync(&self, filter: &BsonDocument, update: &BsonDocument) -> Result<UpdateReport, StoreError> {
        let filter = parse_filter(filter)?;
        let update = parse_update(update)?;
        let mut report = UpdateReport::default();
        for d in self.docs.write().iter_mut().filter(|d| eval_filter(d, &filter)) {
            report.matched += 1;
            if apply_update(d, &update) {
                report.modified += 1;
            }
        }
        Ok(report)
    }

    fn delete_sync(&self, filter: &BsonDocument) -> Result<DeleteReport, StoreError> {
        let filter = parse_filter(filter)?;
        let mut docs = self.docs.write();
        let before = docs.len();
        docs.retain(|d| !eval_filter(d, &filter));
        Ok(DeleteReport { acknowledged: true, deleted: (before - docs.len()) as u64 })
    }

    fn count_sync(&self, filter: &BsonDocument) -> Result<u64, StoreError> {
        let filter = parse_filter(filter)?;
        Ok(self.docs.read().iter().filter(|d| eval_filter(d, &filter)).count() as u64)
    }
}

/// Puts a generated `_id` first when the document has none.
fn with_native_id(doc: BsonDocument) -> (BsonDocument, Bson) {
    if let Some(id) = doc.get(NATIVE_ID_FIELD) {
        let id = id.clone();
        return (doc, id);
    }
    let id = Bson::ObjectId(ObjectId::new());
    let mut out = BsonDocument::new();
    out.insert(NATIVE_ID_FIELD, id.clone());
    for (k, v) in doc {
        out.insert(k, v);
    }
    (out, id)
}

#[async_trait]
impl NativeCollection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find(&self, filter: BsonDocument, options: FindOptions) -> Result<Vec<BsonDocument>, StoreError> {
        self.enter(StoreOp::Find)?;
        self.find_sync(&filter, &options)
    }

    async fn cursor(&self, filter: BsonDocument, options: FindOptions) -> Result<DocumentStream, StoreError> {
        self.enter(StoreOp::Cursor)?;
        let docs = self.find_sync(&filter, &options)?;
        Ok(futures::stream::iter(docs.into_iter().map(Ok)).boxed())
    }

    async fn aggregate(&self, pipeline: Vec<BsonDocument>) -> Result<Vec<BsonDocument>, StoreError> {
        self.enter(StoreOp::Aggregate)?;
        let docs = self.documents();
        group::run_pipeline(docs, &pipeline)
    }

    async fn insert_many(&self, docs: Vec<BsonDocument>) -> Result<InsertManyAck, StoreError> {
        self.enter(StoreOp::InsertMany)?;
        self.insert_sync(docs)
    }

    async fn update_many(&self, filter: BsonDocument, update: BsonDocument) -> Result<UpdateReport, StoreError> {
        self.enter(StoreOp::UpdateMany)?;
        self.update_sync(&filter, &update)
    }

    async fn delete_many(&self, filter: BsonDocument) -> Result<DeleteReport, StoreError> {
        self.enter(StoreOp::DeleteMany)?;
        self.delete_sync(&filter)
    }

    async fn count_documents(&self, filter: BsonDocument) -> Result<u64, StoreError> {
        self.enter(StoreOp::CountDocuments)?;
        self.count_sync(&filter)
    }
}

/// Collections are created on first use.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Arc<MemoryCollection>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Concrete handle, for seeding data and inspecting call counts.
    #[must_use]
    pub fn memory_collection(&self, name: &str) -> Arc<MemoryCollection> {
        if let Some(c) = self.collections.read().get(name) {
            return c.clone();
        }
        self.collections
            .write()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCollection::new(name)))
            .clone()
    }

    #[must_use]
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Datastore for MemoryStore {
    fn collection(&self, name: &str) -> Arc<dyn NativeCollection> {
        self.memory_collection(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn insert_assigns_ids_and_rejects_duplicates() {
        let c = MemoryCollection::new("t");
        let ack = c.insert_many(vec![doc! { "a": 1 }, doc! { "a": 2 }]).await.unwrap();
        assert!(ack.acknowledged);
        assert_eq!(ack.inserted_ids.len(), 2);
        let first = c.documents().remove(0);
        assert_eq!(first.keys().next().map(String::as_str), Some("_id"));

        let dup = ack.inserted_ids[&0].clone();
        let err = c.insert_many(vec![doc! { "a": 3 }, doc! { "_id": dup, "a": 4 }]).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));
        assert_eq!(c.len(), 2);
    }

    #[tokio::test]
    async fn find_update_delete_count() {
        let c = MemoryCollection::new("t");
        c.insert_many(vec![doc! { "n": 1 }, doc! { "n": 2 }, doc! { "n": 3 }]).await.unwrap();
        let opts = FindOptions { sort: Some(doc! { "n": -1 }), limit: Some(2), ..FindOptions::default() };
        let found = c.find(doc! {}, opts).await.unwrap();
        let ns: Vec<i32> = found.iter().map(|d| d.get_i32("n").unwrap()).collect();
        assert_eq!(ns, vec![3, 2]);

        let rep = c.update_many(doc! { "n": { "$gte": 2 } }, doc! { "$set": { "big": true } }).await.unwrap();
        assert_eq!(rep, UpdateReport { matched: 2, modified: 2 });
        assert_eq!(c.count_documents(doc! { "big": true }).await.unwrap(), 2);

        let del = c.delete_many(doc! { "big": { "$exists": false } }).await.unwrap();
        assert_eq!(del, DeleteReport { acknowledged: true, deleted: 1 });
        assert_eq!(c.calls(StoreOp::Find), 1);
        assert_eq!(c.calls(StoreOp::UpdateMany), 1);
    }

    #[tokio::test]
    async fn cursor_yields_matching_documents() {
        let c = MemoryCollection::new("t");
        c.insert_many(vec![doc! { "n": 1 }, doc! { "n": 2 }]).await.unwrap();
        let stream = c.cursor(doc! { "n": 2 }, FindOptions::ids_only()).await.unwrap();
        let docs: Vec<BsonDocument> = stream.try_collect().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].len(), 1);
    }

    #[tokio::test]
    async fn armed_failure_fires_once() {
        let c = MemoryCollection::new("t");
        c.fail_next(StoreOp::CountDocuments);
        assert!(matches!(c.count_documents(doc! {}).await, Err(StoreError::Backend(_))));
        assert_eq!(c.count_documents(doc! {}).await.unwrap(), 0);
        assert_eq!(c.calls(StoreOp::CountDocuments), 2);
    }

    #[test]
    fn store_reuses_collections() {
        let store = MemoryStore::new();
        let a = store.memory_collection("x");
        let b = store.memory_collection("x");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.collection("x").name(), "x");
        assert_eq!(store.collection_names(), vec!["x".to_string()]);
    }
}
