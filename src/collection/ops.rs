use bson::{Bson, Document as BsonDocument};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use super::core::CollectionHandle;
use crate::document::DocumentBuilder;
use crate::errors::AdapterError;
use crate::query::aggregate::{flatten_groups, plan_pipeline};
use crate::query::builder::find_options;
use crate::query::cursor::RecordStream;
use crate::query::normalize::CriteriaNormalizer;
use crate::query::results::ResultNormalizer;
use crate::query::types::{InsertInput, QueryDescriptor};
use crate::registry::Registry;
use crate::store::{DeleteReport, FindOptions, NativeCollection, StoreError};
use crate::telemetry::Telemetry;
use crate::types::{NATIVE_ID_FIELD, Record};

/// Per-call collaborators of a CRUD operation.
pub struct CallContext {
    pub registry: Arc<Registry>,
    pub native: Arc<dyn NativeCollection>,
    pub telemetry: Arc<Telemetry>,
}

impl CollectionHandle {
    fn filter_for(&self, query: &QueryDescriptor) -> Result<BsonDocument, AdapterError> {
        CriteriaNormalizer::new(&self.schema, &self.config).normalize(query.where_clause.as_ref())
    }

    /// Times one native call and records its outcome.
    async fn call<T, F>(
        &self,
        cx: &CallContext,
        op: &'static str,
        fut: F,
        size: fn(&T) -> usize,
    ) -> Result<T, AdapterError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let start = Instant::now();
        let res = fut.await;
        let n = res.as_ref().map_or(0, size);
        cx.telemetry.log_call(op, self.name_str(), start.elapsed(), res.is_ok(), n);
        res.map_err(AdapterError::store(op))
    }

    /// Reads matching records, or per-group summaries when the query asks
    /// for grouping.
    ///
    /// # Errors
    /// Filter translation errors, or `StoreCommunicationFailure`.
    pub async fn find(&self, cx: &CallContext, query: &QueryDescriptor) -> Result<Vec<Record>, AdapterError> {
        let filter = self.filter_for(query)?;
        let normalizer = ResultNormalizer::new(&cx.registry, &self.schema);
        if let Some(group) = &query.aggregate_group {
            let pipeline = plan_pipeline(filter, group, &self.schema)?;
            let groups = self.call(cx, "aggregate", cx.native.aggregate(pipeline), Vec::len).await?;
            return Ok(normalizer.normalize(flatten_groups(groups)));
        }
        let options = find_options(query, &self.schema)?;
        let docs = self.call(cx, "find", cx.native.find(filter, options), Vec::len).await?;
        Ok(normalizer.normalize(docs))
    }

    /// Inserts one or many records and returns them as stored.
    ///
    /// # Errors
    /// `InvalidIdentifier` for malformed identifiers, `InsertCountMismatch`
    /// when the store does not acknowledge every document, or
    /// `StoreCommunicationFailure`.
    pub async fn insert(&self, cx: &CallContext, values: InsertInput) -> Result<Vec<Record>, AdapterError> {
        let builder = DocumentBuilder::new(&self.schema, &self.config);
        let mut docs = values
            .into_vec()
            .iter()
            .map(|v| builder.for_insert(v))
            .collect::<Result<Vec<_>, _>>()?;
        let expected = docs.len();
        if expected == 0 {
            return Ok(Vec::new());
        }
        let ack = self
            .call(cx, "insert_many", cx.native.insert_many(docs.clone()), |a| a.inserted_ids.len())
            .await?;

        let reported = if ack.acknowledged { ack.inserted_ids.len() } else { 0 };
        let covered = (0..expected).filter(|i| ack.inserted_ids.contains_key(i)).count();
        if reported != expected || covered != expected {
            let actual = if reported == expected { covered } else { reported };
            log::error!("{}: insert acknowledged {actual} of {expected} documents", self.name_str());
            return Err(AdapterError::InsertCountMismatch { expected, actual });
        }
        for (i, doc) in docs.iter_mut().enumerate() {
            if let Some(id) = ack.inserted_ids.get(&i) {
                *doc = with_id_first(std::mem::take(doc), id.clone());
            }
        }
        cx.telemetry.log_audit("insert", self.name_str(), expected as u64);
        Ok(ResultNormalizer::new(&cx.registry, &self.schema).normalize(docs))
    }

    /// Applies `values` to every matching record and returns the updated
    /// records.
    ///
    /// Runs as three native calls: capture the ids of the matching set, apply
    /// the values to that filter, then re-read by the captured ids. Records
    /// that start matching between the first two calls may be modified but
    /// are not returned; records deleted before the re-read are absent.
    ///
    /// # Errors
    /// Filter translation errors, `InvalidIdentifier`, or
    /// `StoreCommunicationFailure` from any of the three calls.
    pub async fn update(
        &self,
        cx: &CallContext,
        query: &QueryDescriptor,
        values: &BsonDocument,
    ) -> Result<Vec<Record>, AdapterError> {
        let filter = self.filter_for(query)?;
        let changes = DocumentBuilder::new(&self.schema, &self.config).for_update(values)?;

        let captured =
            self.call(cx, "find", cx.native.find(filter.clone(), FindOptions::ids_only()), Vec::len).await?;
        let ids: Vec<Bson> = captured.into_iter().filter_map(|mut d| d.remove(NATIVE_ID_FIELD)).collect();
        if ids.is_empty() {
            log::debug!("{}: update matched nothing, skipping write", self.name_str());
            return Ok(Vec::new());
        }

        if changes.is_empty() {
            log::debug!("{}: update carries no values besides identifiers", self.name_str());
        } else {
            let mut update = BsonDocument::new();
            update.insert("$set", changes);
            let report = self.call(cx, "update_many", cx.native.update_many(filter, update), |_| 0).await?;
            cx.telemetry.log_audit("update", self.name_str(), report.modified);
        }

        let mut by_id = BsonDocument::new();
        let mut any_of = BsonDocument::new();
        any_of.insert("$in", ids);
        by_id.insert(NATIVE_ID_FIELD, any_of);
        let docs = self.call(cx, "find", cx.native.find(by_id, FindOptions::default()), Vec::len).await?;
        Ok(ResultNormalizer::new(&cx.registry, &self.schema).normalize(docs))
    }

    /// # Errors
    /// Filter translation errors, or `StoreCommunicationFailure`.
    pub async fn destroy(&self, cx: &CallContext, query: &QueryDescriptor) -> Result<DeleteReport, AdapterError> {
        let filter = self.filter_for(query)?;
        let report = self.call(cx, "delete_many", cx.native.delete_many(filter), |_| 0).await?;
        cx.telemetry.log_audit("destroy", self.name_str(), report.deleted);
        Ok(report)
    }

    /// # Errors
    /// Filter translation errors, or `StoreCommunicationFailure`.
    pub async fn count(&self, cx: &CallContext, query: &QueryDescriptor) -> Result<u64, AdapterError> {
        let filter = self.filter_for(query)?;
        self.call(cx, "count_documents", cx.native.count_documents(filter), |_| 0).await
    }

    /// Opens a demand-driven stream over the matching records. Sort, limit,
    /// skip and select apply; grouping does not.
    ///
    /// # Errors
    /// Filter translation errors are returned before any stream exists; store
    /// failures arrive as the stream's terminal error event.
    pub fn stream(self: &Arc<Self>, cx: &CallContext, query: &QueryDescriptor) -> Result<RecordStream, AdapterError> {
        let filter = self.filter_for(query)?;
        let options = find_options(query, &self.schema)?;
        let native = cx.native.clone();
        let telemetry = cx.telemetry.clone();
        let name = self.collection_name.clone();
        let open = Box::pin(async move {
            let start = Instant::now();
            let res = native.cursor(filter, options).await;
            telemetry.log_call("cursor", &name, start.elapsed(), res.is_ok(), 0);
            res
        });
        let registry = cx.registry.clone();
        let handle = Arc::clone(self);
        Ok(RecordStream::spawn(open, move |doc| ResultNormalizer::new(&registry, &handle.schema).normalize_one(doc)))
    }
}

fn with_id_first(doc: BsonDocument, id: Bson) -> BsonDocument {
    let mut out = BsonDocument::new();
    out.insert(NATIVE_ID_FIELD, id);
    for (k, v) in doc {
        if k != NATIVE_ID_FIELD {
            out.insert(k, v);
        }
    }
    out
}
