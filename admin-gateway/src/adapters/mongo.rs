//! MongoDB adapter.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database};
use serde_json::Value;

use common::config::AppConfig;
use common::errors::{AppError, AppResult};
use common::models::row::scalar_row;
use common::models::{ConnectionConfig, DbType, Row, RowSet};

use super::{Adapter, Operation, OperationKind, AFFECTED_ROWS, DELETED_COUNT, INSERTED_ID, TOTAL};
use crate::normalizer::document::{self, bson_to_json, object_id, ID_FIELD};
use crate::normalizer::{prepare_insert, FindParams};

/// Converts a row count to the signed count the driver expects.
fn count_option<N>(name: &str, value: N) -> AppResult<i64>
where
    N: Copy + std::fmt::Display,
    i64: TryFrom<N>,
{
    i64::try_from(value)
        .map_err(|_| AppError::Validation(format!("{} is too large: {}", name, value)))
}

pub struct MongoAdapter {
    client: Client,
    db: Database,
}

impl MongoAdapter {
    /// Opens a client and pings the server so that bad credentials fail here.
    pub async fn connect(config: &ConnectionConfig, settings: &AppConfig) -> AppResult<Self> {
        if config.database.trim().is_empty() {
            return Err(AppError::Validation("database is required for MongoDB".into()));
        }
        let timeout = Duration::from_secs(settings.connect_timeout_secs);

        let mut options = ClientOptions::parse(config.url())
            .await
            .map_err(|e| AppError::DatabaseConnection(e.to_string()))?;
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);
        options.app_name = Some(settings.service_name.clone());

        let client = Client::with_options(options)
            .map_err(|e| AppError::DatabaseConnection(e.to_string()))?;
        let db = client.database(&config.database);
        db.run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| AppError::DatabaseConnection(e.to_string()))?;

        Ok(Self { client, db })
    }

    fn collection(&self, name: &str) -> AppResult<Collection<Document>> {
        if name.is_empty() {
            return Err(AppError::Validation("collection is required".into()));
        }
        Ok(self.db.collection::<Document>(name))
    }

    async fn find(&self, name: &str, find: &FindParams) -> AppResult<RowSet> {
        let collection = self.collection(name)?;
        let filter = document::filter(&find.criteria)?;

        let mut action = collection.find(filter);
        if let Some(page) = find.page {
            // a zero limit means "no limit" to the server
            if page.limit == 0 {
                return Ok(Vec::new());
            }
            action = action.skip(page.offset).limit(count_option("limit", page.limit)?);
        }
        if let Some(sort) = &find.sort {
            action = action.sort(document::sort(sort));
        }

        let docs: Vec<Document> = action.await?.try_collect().await?;
        Ok(docs.iter().map(document::to_row).collect())
    }

    async fn insert(&self, name: &str, row: &Row) -> AppResult<RowSet> {
        let row = prepare_insert(row.clone(), true);
        let doc = document::to_document(&row)?;
        let result = self.collection(name)?.insert_one(doc).await?;
        Ok(scalar_row(INSERTED_ID, bson_to_json(&result.inserted_id)))
    }

    async fn update(&self, name: &str, id: &str, changes: &Row) -> AppResult<RowSet> {
        let oid = object_id(id)?;
        let mut changes = changes.clone();
        changes.shift_remove(ID_FIELD);
        if changes.is_empty() {
            return Err(AppError::Validation("No fields to update".into()));
        }
        let set = document::to_document(&changes)?;
        let result = self
            .collection(name)?
            .update_one(doc! { "_id": oid }, doc! { "$set": set })
            .await?;
        Ok(scalar_row(AFFECTED_ROWS, result.matched_count))
    }

    async fn delete(&self, name: &str, ids: &[String]) -> AppResult<RowSet> {
        if ids.is_empty() {
            return Ok(scalar_row(DELETED_COUNT, 0u64));
        }
        let oids: Vec<Bson> = ids
            .iter()
            .map(|id| object_id(id).map(Bson::ObjectId))
            .collect::<AppResult<_>>()?;
        let result = self
            .collection(name)?
            .delete_many(doc! { "_id": { "$in": oids } })
            .await?;
        Ok(scalar_row(DELETED_COUNT, result.deleted_count))
    }

    async fn describe(&self, name: &str) -> AppResult<RowSet> {
        let sample = self.collection(name)?.find_one(doc! {}).await?;
        Ok(sample
            .iter()
            .flat_map(|doc| doc.iter())
            .map(|(key, value)| {
                let mut row = Row::new();
                row.insert("column".into(), Value::String(key.clone()));
                row.insert(
                    "data_type".into(),
                    Value::String(format!("{:?}", value.element_type())),
                );
                row
            })
            .collect())
    }

    /// Runs `{"collection": "...", "filter": {...}}` as a find.
    async fn raw(&self, target: &str, statement: &str, limit: usize) -> AppResult<RowSet> {
        let parsed: Value = serde_json::from_str(statement).map_err(|e| {
            AppError::Validation(format!("MongoDB query must be a JSON document: {}", e))
        })?;
        let name = parsed
            .get("collection")
            .and_then(Value::as_str)
            .unwrap_or(target);
        let filter = match parsed.get("filter") {
            None | Some(Value::Null) => Document::new(),
            Some(Value::Object(map)) => document::to_document(map)?,
            Some(_) => return Err(AppError::Validation("filter must be a JSON object".into())),
        };

        let docs: Vec<Document> = self
            .collection(name)?
            .find(filter)
            .limit(count_option("limit", limit)?)
            .await?
            .try_collect()
            .await?;
        Ok(docs.iter().map(document::to_row).collect())
    }
}

#[async_trait]
impl Adapter for MongoAdapter {
    fn engine(&self) -> DbType {
        DbType::MongoDB
    }

    async fn execute(&self, op: &Operation) -> AppResult<RowSet> {
        let name = op.target.as_str();
        match &op.kind {
            OperationKind::Find(find) => self.find(name, find).await,
            OperationKind::Insert(row) => self.insert(name, row).await,
            OperationKind::Update { id, changes } => self.update(name, id, changes).await,
            OperationKind::Delete { ids } => self.delete(name, ids).await,
            OperationKind::Count(criteria) => {
                let filter = document::filter(criteria)?;
                let total = self.collection(name)?.count_documents(filter).await?;
                Ok(scalar_row(TOTAL, total))
            }
            OperationKind::Describe => self.describe(name).await,
            OperationKind::Raw { statement, limit } => self.raw(name, statement, *limit).await,
        }
    }

    async fn list_targets(&self) -> AppResult<Vec<String>> {
        let mut names = self.db.list_collection_names().await?;
        names.sort();
        Ok(names)
    }

    async fn close(&self) {
        self.client.clone().shutdown().await;
    }
}
