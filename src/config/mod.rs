// Configuration module for radar-store
//
// Provides:
// - YAML configuration file loading
// - Environment variable substitution
// - Configuration validation
// - Default values

pub mod types;
mod loader;

pub use types::*;
pub use loader::{ConfigLoader, SUPPORTED_BACKENDS};

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<StoreConfig> {
    ConfigLoader::load(path).context("Failed to load configuration")
}

/// Load configuration with environment variable overrides
pub fn load_config_with_env<P: AsRef<Path>>(path: P) -> Result<StoreConfig> {
    let mut config = load_config(path)?;
    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Apply RADAR_BACKEND, SUPABASE_URL and SUPABASE_KEY on top of a loaded config
pub fn apply_env_overrides(config: &mut StoreConfig) -> Result<()> {
    if let Ok(kind) = std::env::var("RADAR_BACKEND") {
        select_backend(config, &kind);
    }

    if let Ok(url) = std::env::var("SUPABASE_URL") {
        if let Some(supabase) = config.backend.backend_config.as_supabase_mut() {
            supabase.url = url;
        }
    }

    if let Ok(api_key) = std::env::var("SUPABASE_KEY") {
        if let Some(supabase) = config.backend.backend_config.as_supabase_mut() {
            supabase.api_key = api_key;
        }
    }

    ConfigLoader::validate(config).context("Invalid configuration after environment overrides")
}

/// Switch backend kind, filling in a default section when the kind needs one
pub fn select_backend(config: &mut StoreConfig, kind: &str) {
    config.backend.kind = kind.to_string();
    match kind {
        "supabase" if config.backend.backend_config.as_supabase().is_none() => {
            config.backend.backend_config = BackendConfig::Supabase {
                supabase: SupabaseConfig::default(),
            };
        }
        "memory" if config.backend.backend_config.as_memory().is_none() => {
            config.backend.backend_config = BackendConfig::Memory {
                memory: MemoryConfig::default(),
            };
        }
        _ => {}
    }
}
