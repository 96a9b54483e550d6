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

// Error type for the backend layer

use thiserror::Error;

/// Errors raised by a [`DataBackend`](crate::backend::DataBackend).
///
/// These never reach callers of [`RadarStore`](crate::store::RadarStore):
/// the façade logs them and substitutes a default value.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("realtime channel '{channel}' failed: {reason}")]
    Realtime { channel: String, reason: String },

    #[error("invalid row for {collection}: {reason}")]
    InvalidRow { collection: String, reason: String },

    #[error("unknown stored procedure: {0}")]
    UnknownFunction(String),

    #[error("invalid backend configuration: {0}")]
    Config(String),
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;
