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

// Radar data-access façade
//
// Every operation is async and infallible from the caller's point of view:
// backend failures are logged and replaced by a safe default (empty list,
// `None`, or the caller's own input). Without a backend the store is a
// local-only no-op.

use crate::backend::{BackendFactory, DataBackend, QueryResult};
use crate::config::BackendSettings;
use crate::error::BackendResult;
use crate::model::{
    AuditLogEntry, Collection, Decision, Metric, RiskLevel, ThreatEvent, Transaction,
    DEFAULT_LOG_SOURCE, DEMO_TRANSACTION_FUNCTION,
};
use crate::query::{Filter, Query};
use crate::stats::{window_start, LiveStats};
use crate::subscription::{RowHandler, Subscription};
use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, warn};

pub const DEFAULT_TRANSACTION_LIMIT: usize = 10;
pub const DEFAULT_THREAT_LIMIT: usize = 20;
pub const DEFAULT_LOG_LIMIT: usize = 20;

/// Data-access object over the four radar collections
#[derive(Clone, Default)]
pub struct RadarStore {
    backend: Option<Arc<dyn DataBackend>>,
}

impl RadarStore {
    pub fn new(backend: Option<Arc<dyn DataBackend>>) -> Self {
        Self { backend }
    }

    /// Store with no backend; every call returns its default
    pub fn offline() -> Self {
        Self { backend: None }
    }

    pub fn with_backend(backend: Arc<dyn DataBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    pub fn from_config(settings: &BackendSettings) -> Result<Self> {
        Ok(Self::new(BackendFactory::create(settings)?))
    }

    pub fn is_live(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend_type(&self) -> &str {
        self.backend
            .as_ref()
            .map(|b| b.backend_type())
            .unwrap_or("none")
    }

    pub async fn health_check(&self) -> bool {
        let Some(backend) = &self.backend else {
            return false;
        };
        match backend.health_check().await {
            Ok(healthy) => healthy,
            Err(e) => {
                error!("Health check failed: {}", e);
                false
            }
        }
    }

    /// Most recent `limit` rows of a collection, newest first, optionally
    /// filtered by one predicate.
    pub async fn recent<T: DeserializeOwned>(
        &self,
        collection: Collection,
        filter: Option<Filter>,
        limit: usize,
    ) -> Vec<T> {
        let Some(backend) = &self.backend else {
            return Vec::new();
        };

        let mut query = Query::from(collection).newest_first().limit(limit);
        if let Some(filter) = filter {
            query = query.filter(filter);
        }

        match backend.select(&query).await {
            Ok(result) => decode_rows(collection, result.rows),
            Err(e) => {
                error!("Failed to fetch {}: {}", collection, e);
                Vec::new()
            }
        }
    }

    pub async fn recent_transactions(&self, limit: usize) -> Vec<Transaction> {
        self.recent(Collection::Transactions, None, limit).await
    }

    pub async fn transactions_by_risk(&self, risk_level: &RiskLevel, limit: usize) -> Vec<Transaction> {
        let filter = Filter::eq("risk_level", risk_level.as_str());
        self.recent(Collection::Transactions, Some(filter), limit)
            .await
    }

    /// Newest metrics snapshot
    pub async fn latest_metrics(&self) -> Option<Metric> {
        if !self.is_live() {
            return None;
        }
        let latest = self
            .recent::<Metric>(Collection::Metrics, None, 1)
            .await
            .into_iter()
            .next();
        if latest.is_none() {
            warn!("No metrics snapshot available");
        }
        latest
    }

    pub async fn recent_threats(&self, limit: usize) -> Vec<ThreatEvent> {
        self.recent(Collection::ThreatEvents, None, limit).await
    }

    pub async fn recent_logs(&self, limit: usize) -> Vec<AuditLogEntry> {
        self.recent(Collection::AuditLog, None, limit).await
    }

    /// Transaction, blocked and threat counts for the last 24 hours, plus
    /// the blocked amount. A failed read contributes zeros.
    pub async fn live_stats(&self) -> Option<LiveStats> {
        let backend = self.backend.as_ref()?;

        let since = window_start(Utc::now()).to_rfc3339_opts(SecondsFormat::Millis, true);
        let created_at = Collection::Transactions.timestamp_column();

        let total = Query::from(Collection::Transactions)
            .select("amount")
            .gte(created_at, since.clone())
            .count_exact();
        let blocked = Query::from(Collection::Transactions)
            .select("amount")
            .eq("decision", Decision::Blocked.as_str())
            .gte(created_at, since.clone())
            .count_exact();
        let threats = Query::from(Collection::ThreatEvents)
            .select("id")
            .gte(Collection::ThreatEvents.timestamp_column(), since)
            .count_exact();

        let (total, blocked, threats) = tokio::join!(
            backend.select(&total),
            backend.select(&blocked),
            backend.select(&threats),
        );

        let total = or_empty("transactions (24h)", total);
        let blocked = or_empty("blocked transactions (24h)", blocked);
        let threats = or_empty("threat events (24h)", threats);

        Some(LiveStats::from_results(&total, &blocked, &threats))
    }

    /// Insert a record and return the stored row, or the input unchanged
    /// when there is no backend or the insert fails.
    pub async fn insert<T>(&self, collection: Collection, record: T) -> T
    where
        T: Serialize + DeserializeOwned,
    {
        let Some(backend) = &self.backend else {
            return record;
        };

        let payload = match serde_json::to_value(&record) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to encode {} row: {}", collection, e);
                return record;
            }
        };

        match backend.insert(collection, payload, true).await {
            Ok(Some(row)) => match serde_json::from_value(row) {
                Ok(stored) => stored,
                Err(e) => {
                    error!("Failed to decode inserted {} row: {}", collection, e);
                    record
                }
            },
            Ok(None) => {
                warn!("Insert into {} returned no row", collection);
                record
            }
            Err(e) => {
                error!("Failed to insert into {}: {}", collection, e);
                record
            }
        }
    }

    pub async fn insert_transaction(&self, txn: Transaction) -> Transaction {
        self.insert(Collection::Transactions, txn).await
    }

    pub async fn insert_threat_event(&self, threat: ThreatEvent) -> ThreatEvent {
        self.insert(Collection::ThreatEvents, threat).await
    }

    /// Append an audit log line. `source` defaults to SYSTEM.
    pub async fn insert_audit_log(&self, level: &str, message: &str, source: Option<&str>) {
        let Some(backend) = &self.backend else {
            return;
        };

        let entry = AuditLogEntry::new(level, message, source.unwrap_or(DEFAULT_LOG_SOURCE));
        let payload = match serde_json::to_value(&entry) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to encode audit log row: {}", e);
                return;
            }
        };

        if let Err(e) = backend.insert(Collection::AuditLog, payload, false).await {
            error!("Failed to insert log: {}", e);
        }
    }

    /// Call `handler` for every row inserted into `collection`
    pub async fn subscribe<T, F>(&self, collection: Collection, handler: F) -> Subscription
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let Some(backend) = &self.backend else {
            return Subscription::noop();
        };

        let handler: RowHandler = Arc::new(move |row: Value| match serde_json::from_value::<T>(row) {
            Ok(record) => handler(record),
            Err(e) => warn!("Skipping undecodable {} row: {}", collection, e),
        });

        match backend.subscribe_inserts(collection, handler).await {
            Ok(subscription) => subscription,
            Err(e) => {
                error!("Failed to subscribe to {}: {}", collection, e);
                Subscription::noop()
            }
        }
    }

    pub async fn subscribe_transactions<F>(&self, handler: F) -> Subscription
    where
        F: Fn(Transaction) + Send + Sync + 'static,
    {
        self.subscribe(Collection::Transactions, handler).await
    }

    pub async fn subscribe_threats<F>(&self, handler: F) -> Subscription
    where
        F: Fn(ThreatEvent) + Send + Sync + 'static,
    {
        self.subscribe(Collection::ThreatEvents, handler).await
    }

    pub async fn subscribe_logs<F>(&self, handler: F) -> Subscription
    where
        F: Fn(AuditLogEntry) + Send + Sync + 'static,
    {
        self.subscribe(Collection::AuditLog, handler).await
    }

    /// Ask the backend to synthesize one demo transaction
    pub async fn generate_demo_transaction(&self) {
        let Some(backend) = &self.backend else {
            return;
        };

        match backend.rpc(DEMO_TRANSACTION_FUNCTION, json!({})).await {
            Ok(_) => debug!("Requested demo transaction"),
            Err(e) => error!("Failed to generate demo transaction: {}", e),
        }
    }
}

fn or_empty(what: &str, result: BackendResult<QueryResult>) -> QueryResult {
    result.unwrap_or_else(|e| {
        error!("Failed to fetch {}: {}", what, e);
        QueryResult::default()
    })
}

/// Decode rows one by one so a single malformed row does not hide the rest
fn decode_rows<T: DeserializeOwned>(collection: Collection, rows: Vec<Value>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value(row) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping undecodable {} row: {}", collection, e);
                None
            }
        })
        .collect()
}
