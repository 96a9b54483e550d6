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

// Configuration types for radar-store

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: BackendSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendSettings {
    /// Backend kind: "supabase", "memory", "none"
    pub kind: String,

    /// Kind-specific configuration
    #[serde(flatten)]
    pub backend_config: BackendConfig,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            kind: "supabase".to_string(),
            backend_config: BackendConfig::Supabase {
                supabase: SupabaseConfig::default(),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum BackendConfig {
    Supabase {
        #[serde(rename = "supabase")]
        supabase: SupabaseConfig,
    },
    Memory {
        #[serde(rename = "memory")]
        memory: MemoryConfig,
    },
    /// No kind-specific section (used with kind "none")
    Empty {},
}

impl BackendConfig {
    pub fn as_supabase(&self) -> Option<&SupabaseConfig> {
        match self {
            BackendConfig::Supabase { supabase } => Some(supabase),
            _ => None,
        }
    }

    pub fn as_supabase_mut(&mut self) -> Option<&mut SupabaseConfig> {
        match self {
            BackendConfig::Supabase { supabase } => Some(supabase),
            _ => None,
        }
    }

    pub fn as_memory(&self) -> Option<&MemoryConfig> {
        match self {
            BackendConfig::Memory { memory } => Some(memory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SupabaseConfig {
    /// Project URL, e.g. https://<project>.supabase.co
    #[serde(default)]
    pub url: String,

    /// Publishable (anon) API key
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_schema")]
    pub schema: String,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default)]
    pub realtime: RealtimeConfig,
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            schema: default_schema(),
            timeout_seconds: default_timeout(),
            realtime: RealtimeConfig::default(),
        }
    }
}

impl SupabaseConfig {
    /// Both credentials present
    pub fn has_credentials(&self) -> bool {
        !self.url.trim().is_empty() && !self.api_key.trim().is_empty()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RealtimeConfig {
    #[serde(default = "default_heartbeat")]
    pub heartbeat_seconds: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            heartbeat_seconds: default_heartbeat(),
        }
    }
}

impl RealtimeConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_seconds)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MemoryConfig {
    /// Oldest rows are dropped once a collection exceeds this many rows
    #[serde(default)]
    pub max_rows_per_collection: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,  // "trace", "debug", "info", "warn", "error"

    #[serde(default = "default_log_format")]
    pub format: String,  // "text", "json"
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_schema() -> String { "public".to_string() }
fn default_timeout() -> u64 { 30 }
fn default_heartbeat() -> u64 { 25 }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "text".to_string() }
