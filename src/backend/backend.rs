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

// Data backend trait

use crate::error::BackendResult;
use crate::model::Collection;
use crate::query::Query;
use crate::subscription::{RowHandler, Subscription};
use async_trait::async_trait;
use serde_json::Value;

/// Rows returned by a select, plus the exact match count when requested
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub rows: Vec<Value>,
    pub count: Option<u64>,
}

/// Backend the radar store talks to.
///
/// Implementations map each call onto one request (or one in-process
/// operation). They do not retry; callers decide what a failure means.
#[async_trait]
pub trait DataBackend: Send + Sync {
    /// Run a read query
    async fn select(&self, query: &Query) -> BackendResult<QueryResult>;

    /// Insert one row.
    ///
    /// With `returning` set, the stored row (including backend-assigned
    /// columns) is returned.
    async fn insert(
        &self,
        collection: Collection,
        row: Value,
        returning: bool,
    ) -> BackendResult<Option<Value>>;

    /// Invoke a stored procedure by name
    async fn rpc(&self, function: &str, args: Value) -> BackendResult<Value>;

    /// Listen for inserted rows on a collection.
    ///
    /// The handler runs on a background task, once per inserted row, until
    /// the returned handle is unsubscribed.
    async fn subscribe_inserts(
        &self,
        collection: Collection,
        handler: RowHandler,
    ) -> BackendResult<Subscription>;

    /// Health check
    async fn health_check(&self) -> BackendResult<bool>;

    /// Get backend type identifier
    fn backend_type(&self) -> &str;
}
