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

// Radar data-access layer
//
// Maps application calls onto a hosted Postgres backend:
// - Recent-row queries over transactions, metrics, threat events and audit log
// - A 24-hour summary built from three concurrent reads
// - Inserts that return the stored row
// - Realtime insert subscriptions with idempotent unsubscribe
// - Degrades to a local-only no-op when no backend is configured

pub mod backend;
pub mod config;
pub mod error;
pub mod model;
pub mod protocol;
pub mod query;
pub mod stats;
pub mod store;
pub mod subscription;

// Re-export main types
pub use backend::{BackendFactory, DataBackend, MemoryBackend, QueryResult, SupabaseBackend};
pub use config::{load_config, load_config_with_env, StoreConfig};
pub use error::{BackendError, BackendResult};
pub use model::{
    AuditLogEntry, Collection, Decision, Metric, RiskLevel, RowId, ThreatEvent, Transaction,
};
pub use query::{Filter, FilterOp, Query};
pub use stats::LiveStats;
pub use store::{RadarStore, DEFAULT_LOG_LIMIT, DEFAULT_THREAT_LIMIT, DEFAULT_TRANSACTION_LIMIT};
pub use subscription::{RowHandler, Subscription};
