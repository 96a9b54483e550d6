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

// Supabase backend: PostgREST over HTTPS plus the realtime websocket

use super::backend::{DataBackend, QueryResult};
use super::realtime::RealtimeClient;
use crate::config::SupabaseConfig;
use crate::error::{BackendError, BackendResult};
use crate::model::Collection;
use crate::query::Query;
use crate::subscription::{RowHandler, Subscription};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE};
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// PostgREST client for a Supabase project
pub struct SupabaseBackend {
    client: Client,
    rest_url: String,
    schema: String,
    realtime: RealtimeClient,
}

impl SupabaseBackend {
    pub fn new(config: SupabaseConfig) -> BackendResult<Self> {
        if !config.has_credentials() {
            return Err(BackendError::Config(
                "supabase url and api_key are required".to_string(),
            ));
        }

        let api_key = config.api_key.trim();
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(api_key)
                .map_err(|_| BackendError::Config("Invalid API key".to_string()))?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|_| BackendError::Config("Invalid API key".to_string()))?,
        );

        let client = reqwest::ClientBuilder::new()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(config.timeout())
            .default_headers(headers)
            .build()?;

        let base_url = config.url.trim().trim_end_matches('/');

        Ok(Self {
            client,
            rest_url: format!("{}/rest/v1", base_url),
            schema: config.schema.clone(),
            realtime: RealtimeClient::new(&config),
        })
    }

    pub fn rest_url(&self) -> &str {
        &self.rest_url
    }

    pub fn realtime(&self) -> &RealtimeClient {
        &self.realtime
    }

    fn table_url(&self, collection: Collection) -> String {
        format!("{}/{}", self.rest_url, collection.table_name())
    }

    fn rpc_url(&self, function: &str) -> String {
        format!("{}/rpc/{}", self.rest_url, function)
    }
}

/// Turn a non-2xx response into `BackendError::Status`
async fn ensure_success(response: Response) -> BackendResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Status { status, body })
}

/// Total row count from a PostgREST `Content-Range` header (`0-9/57`, `*/0`)
pub fn parse_content_range(header: &str) -> Option<u64> {
    let (_, total) = header.trim().split_once('/')?;
    total.parse().ok()
}

#[async_trait]
impl DataBackend for SupabaseBackend {
    async fn select(&self, query: &Query) -> BackendResult<QueryResult> {
        let mut request = self
            .client
            .get(self.table_url(query.collection))
            .query(&query.to_pairs())
            .header("Accept-Profile", &self.schema);

        if query.count_exact {
            request = request.header("Prefer", "count=exact");
        }

        let response = ensure_success(request.send().await?).await?;

        let count = if query.count_exact {
            response
                .headers()
                .get(CONTENT_RANGE)
                .and_then(|value| value.to_str().ok())
                .and_then(parse_content_range)
        } else {
            None
        };

        let rows: Vec<Value> = response.json().await?;
        debug!(
            "Fetched {} rows from '{}' (count: {:?})",
            rows.len(),
            query.collection,
            count
        );

        Ok(QueryResult { rows, count })
    }

    async fn insert(
        &self,
        collection: Collection,
        row: Value,
        returning: bool,
    ) -> BackendResult<Option<Value>> {
        let prefer = if returning {
            "return=representation"
        } else {
            "return=minimal"
        };

        let response = self
            .client
            .post(self.table_url(collection))
            .header("Content-Profile", &self.schema)
            .header("Prefer", prefer)
            .json(&row)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        if !returning {
            return Ok(None);
        }

        let rows: Vec<Value> = response.json().await?;
        Ok(rows.into_iter().next())
    }

    async fn rpc(&self, function: &str, args: Value) -> BackendResult<Value> {
        let response = self
            .client
            .post(self.rpc_url(function))
            .header("Content-Profile", &self.schema)
            .json(&args)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        // Void functions answer with an empty body
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn subscribe_inserts(
        &self,
        collection: Collection,
        handler: RowHandler,
    ) -> BackendResult<Subscription> {
        self.realtime.subscribe(collection, handler).await
    }

    async fn health_check(&self) -> BackendResult<bool> {
        let url = format!("{}/", self.rest_url);
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => Ok(true),
            Ok(response) => {
                warn!("Health check failed with status: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Health check error: {}", e);
                Ok(false)
            }
        }
    }

    fn backend_type(&self) -> &str {
        "supabase"
    }
}
