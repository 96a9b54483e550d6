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

// Backend factory for creating data backends from configuration

use super::backend::DataBackend;
use super::memory::MemoryBackend;
use super::supabase::SupabaseBackend;
use crate::config::{BackendSettings, MemoryConfig, SUPPORTED_BACKENDS};
use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::{info, warn};

pub struct BackendFactory;

impl BackendFactory {
    /// Create the data backend from configuration.
    ///
    /// `Ok(None)` means the store runs local-only: either the "none" kind
    /// was selected or Supabase credentials are missing.
    pub fn create(settings: &BackendSettings) -> Result<Option<Arc<dyn DataBackend>>> {
        match settings.kind.as_str() {
            "supabase" => {
                let backend_config = settings
                    .backend_config
                    .as_supabase()
                    .ok_or_else(|| anyhow::anyhow!("Supabase config missing"))?;

                if !backend_config.has_credentials() {
                    warn!("Supabase credentials missing. Data persistence will be local-only.");
                    return Ok(None);
                }

                let backend = SupabaseBackend::new(backend_config.clone())?;
                info!("Supabase backend ready at {}", backend.rest_url());
                Ok(Some(Arc::new(backend)))
            }

            "memory" => {
                let backend_config = settings
                    .backend_config
                    .as_memory()
                    .cloned()
                    .unwrap_or_default();

                Ok(Some(Arc::new(MemoryBackend::new(backend_config))))
            }

            "none" => {
                info!("No backend configured. Data persistence will be local-only.");
                Ok(None)
            }

            unknown => bail!(
                "Unknown backend: '{}'. Supported: {}",
                unknown,
                SUPPORTED_BACKENDS.join(", ")
            ),
        }
    }

    /// In-memory backend with default settings
    pub fn memory() -> Arc<dyn DataBackend> {
        Arc::new(MemoryBackend::new(MemoryConfig::default()))
    }
}
