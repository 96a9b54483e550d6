// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// In-memory backend
//
// Evaluates the same queries as the PostgREST backend against rows held in
// process. Used for local demo runs and for tests.

use super::backend::{DataBackend, QueryResult};
use crate::config::MemoryConfig;
use crate::error::{BackendError, BackendResult};
use crate::model::{Collection, DEMO_TRANSACTION_FUNCTION};
use crate::query::Query;
use crate::subscription::{RowHandler, Subscription};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use dashmap::DashMap;
use rand::Rng;
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

const INSERT_CHANNEL_CAPACITY: usize = 256;

pub struct MemoryBackend {
    tables: DashMap<Collection, Vec<Value>>,
    inserts: HashMap<Collection, broadcast::Sender<Value>>,
    max_rows: Option<usize>,
}

impl MemoryBackend {
    pub fn new(config: MemoryConfig) -> Self {
        let inserts = Collection::ALL
            .into_iter()
            .map(|c| (c, broadcast::channel(INSERT_CHANNEL_CAPACITY).0))
            .collect();

        info!(
            "Initializing in-memory backend (row cap: {:?})",
            config.max_rows_per_collection
        );

        Self {
            tables: DashMap::new(),
            inserts,
            max_rows: config.max_rows_per_collection,
        }
    }

    pub fn row_count(&self, collection: Collection) -> usize {
        self.tables.get(&collection).map(|t| t.len()).unwrap_or(0)
    }

    /// Store a row, filling in backend-assigned columns, and notify listeners.
    ///
    /// An explicit `null` in `id` or the timestamp column is also filled in,
    /// where Postgres would store NULL or reject the row.
    fn store(&self, collection: Collection, row: Value) -> BackendResult<Value> {
        let Value::Object(mut fields) = row else {
            return Err(BackendError::InvalidRow {
                collection: collection.to_string(),
                reason: "row must be a JSON object".to_string(),
            });
        };

        if fields.get("id").map_or(true, Value::is_null) {
            fields.insert("id".to_string(), json!(uuid::Uuid::new_v4().to_string()));
        }
        let ts_column = collection.timestamp_column();
        if fields.get(ts_column).map_or(true, Value::is_null) {
            let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
            fields.insert(ts_column.to_string(), json!(now));
        }
        let stored = Value::Object(fields);

        {
            let mut table = self.tables.entry(collection).or_default();
            table.push(stored.clone());
            if let Some(max) = self.max_rows {
                if table.len() > max {
                    let excess = table.len() - max;
                    table.drain(..excess);
                    debug!("Dropped {} oldest rows from '{}'", excess, collection);
                }
            }
        }

        if let Some(sender) = self.inserts.get(&collection) {
            // No receivers is fine
            let _ = sender.send(stored.clone());
        }

        Ok(stored)
    }
}

/// Random transaction in the shape the demo procedure produces
fn demo_transaction() -> Value {
    let mut rng = rand::thread_rng();
    let amount = (rng.gen_range(5.0..5000.0_f64) * 100.0).round() / 100.0;
    let score: f64 = rng.gen();

    let decision = if score > 0.8 {
        "BLOCKED"
    } else if score > 0.5 {
        "REVIEW"
    } else {
        "APPROVED"
    };
    let risk_level = if score < 0.3 {
        "LOW"
    } else if score < 0.5 {
        "MEDIUM"
    } else if score < 0.8 {
        "HIGH"
    } else {
        "CRITICAL"
    };

    let txn_suffix = uuid::Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    json!({
        "transaction_id": format!("TXN-{}", txn_suffix),
        "user_id": format!("USR-{:04}", rng.gen_range(0..10_000)),
        "amount": amount,
        "decision": decision,
        "risk_level": risk_level,
        "risk_score": (score * 10_000.0).round() / 100.0,
    })
}

#[async_trait]
impl DataBackend for MemoryBackend {
    async fn select(&self, query: &Query) -> BackendResult<QueryResult> {
        let (rows, total) = match self.tables.get(&query.collection) {
            Some(table) => query.apply(table.iter()),
            None => (Vec::new(), 0),
        };

        Ok(QueryResult {
            rows,
            count: query.count_exact.then_some(total),
        })
    }

    async fn insert(
        &self,
        collection: Collection,
        row: Value,
        returning: bool,
    ) -> BackendResult<Option<Value>> {
        let stored = self.store(collection, row)?;
        Ok(returning.then_some(stored))
    }

    async fn rpc(&self, function: &str, _args: Value) -> BackendResult<Value> {
        match function {
            DEMO_TRANSACTION_FUNCTION => {
                let row = self.store(Collection::Transactions, demo_transaction())?;
                debug!("Generated demo transaction {}", row["transaction_id"]);
                Ok(Value::Null)
            }
            unknown => Err(BackendError::UnknownFunction(unknown.to_string())),
        }
    }

    async fn subscribe_inserts(
        &self,
        collection: Collection,
        handler: RowHandler,
    ) -> BackendResult<Subscription> {
        let sender = self.inserts.get(&collection).ok_or_else(|| {
            BackendError::Config(format!("no insert channel for '{}'", collection))
        })?;
        let mut inserts = sender.subscribe();
        let (subscription, mut listener) = Subscription::channel(collection.channel_name());

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = listener.cancelled() => break,
                    received = inserts.recv() => match received {
                        Ok(row) => {
                            listener.deliver(&handler, row);
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("Listener on '{}' lagged, skipped {} rows", listener.channel(), skipped);
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
            listener.close();
            debug!("In-memory listener on '{}' stopped", listener.channel());
        });

        Ok(subscription)
    }

    async fn health_check(&self) -> BackendResult<bool> {
        Ok(true)
    }

    fn backend_type(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_assigns_backend_fields() {
        let backend = MemoryBackend::new(MemoryConfig::default());
        let stored = backend
            .insert(Collection::Metrics, json!({"tps": 12}), true)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(stored["tps"], 12);
        assert!(stored["id"].is_string());
        assert!(stored["recorded_at"].is_string());
        assert!(stored.get("created_at").is_none());
    }

    #[tokio::test]
    async fn test_insert_fills_explicit_nulls_but_keeps_given_values() {
        let backend = MemoryBackend::new(MemoryConfig::default());
        let stored = backend
            .insert(
                Collection::Transactions,
                json!({"id": null, "created_at": null, "amount": 3.0}),
                true,
            )
            .await
            .unwrap()
            .unwrap();
        assert!(stored["id"].is_string());
        assert!(stored["created_at"].is_string());

        let stored = backend
            .insert(
                Collection::Transactions,
                json!({"id": 9, "created_at": "2025-03-01T12:00:00Z"}),
                true,
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored["id"], 9);
        assert_eq!(stored["created_at"], "2025-03-01T12:00:00Z");
    }

    #[tokio::test]
    async fn test_insert_rejects_non_object() {
        let backend = MemoryBackend::new(MemoryConfig::default());
        let result = backend.insert(Collection::AuditLog, json!([1, 2]), false).await;
        assert!(matches!(result, Err(BackendError::InvalidRow { .. })));
    }

    #[tokio::test]
    async fn test_row_cap_drops_oldest() {
        let backend = MemoryBackend::new(MemoryConfig {
            max_rows_per_collection: Some(2),
        });
        for n in 0..3 {
            backend
                .insert(Collection::AuditLog, json!({"level": "INFO", "message": n}), false)
                .await
                .unwrap();
        }

        assert_eq!(backend.row_count(Collection::AuditLog), 2);
        let result = backend
            .select(&Query::from(Collection::AuditLog).eq("message", "0"))
            .await
            .unwrap();
        assert!(result.rows.is_empty());
    }

    #[tokio::test]
    async fn test_demo_procedure_inserts_transaction() {
        let backend = MemoryBackend::new(MemoryConfig::default());
        backend
            .rpc(DEMO_TRANSACTION_FUNCTION, json!({}))
            .await
            .unwrap();

        assert_eq!(backend.row_count(Collection::Transactions), 1);
        let result = backend
            .select(&Query::from(Collection::Transactions))
            .await
            .unwrap();
        let row = &result.rows[0];
        let amount = row["amount"].as_f64().unwrap();
        assert!((5.0..=5000.0).contains(&amount));
        assert!(["APPROVED", "REVIEW", "BLOCKED"].contains(&row["decision"].as_str().unwrap()));
    }

    #[tokio::test]
    async fn test_unknown_procedure() {
        let backend = MemoryBackend::new(MemoryConfig::default());
        let result = backend.rpc("drop_everything", json!({})).await;
        assert!(matches!(result, Err(BackendError::UnknownFunction(_))));
    }

    #[tokio::test]
    async fn test_count_only_when_requested() {
        let backend = MemoryBackend::new(MemoryConfig::default());
        let plain = backend.select(&Query::from(Collection::Metrics)).await.unwrap();
        assert_eq!(plain.count, None);

        let counted = backend
            .select(&Query::from(Collection::Metrics).count_exact())
            .await
            .unwrap();
        assert_eq!(counted.count, Some(0));
    }
}
