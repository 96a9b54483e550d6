// Configuration loader with environment variable substitution

use super::types::*;
use anyhow::{bail, Context, Result};
use regex::Regex;
use std::path::Path;

/// Backend kinds accepted in `backend.kind`
pub const SUPPORTED_BACKENDS: [&str; 3] = ["supabase", "memory", "none"];

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file with environment variable substitution
    pub fn load<P: AsRef<Path>>(path: P) -> Result<StoreConfig> {
        let content = std::fs::read_to_string(path.as_ref())
            .context("Failed to read config file")?;

        Self::parse(&content)
    }

    /// Parse YAML text after substituting environment variables
    pub fn parse(content: &str) -> Result<StoreConfig> {
        let content = Self::substitute_env_vars(content);

        let config: StoreConfig = serde_yaml::from_str(&content)
            .context("Failed to parse YAML configuration")?;

        Self::validate(&config)?;

        Ok(config)
    }

    /// Substitute ${VAR} and ${VAR:-default} patterns with environment variables
    ///
    /// Examples:
    /// - ${SUPABASE_URL} -> https://project.supabase.co
    /// - ${SUPABASE_KEY:-} -> "" (if SUPABASE_KEY not set)
    pub(crate) fn substitute_env_vars(content: &str) -> String {
        let re = Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").expect("static regex");

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str());

            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => match default_value {
                    Some(default) => default.to_string(),
                    // Keep original if no default and var not found
                    None => format!("${{{}}}", var_name),
                },
            }
        })
        .to_string()
    }

    /// Validate configuration
    pub fn validate(config: &StoreConfig) -> Result<()> {
        match config.backend.kind.as_str() {
            "supabase" => {
                let Some(supabase) = config.backend.backend_config.as_supabase() else {
                    bail!("supabase backend selected but supabase config missing");
                };

                let url = supabase.url.trim();
                if !url.is_empty() && !url.starts_with("http://") && !url.starts_with("https://") {
                    bail!("supabase.url must start with http:// or https://, got '{}'", url);
                }

                if supabase.timeout_seconds == 0 {
                    bail!("supabase.timeout_seconds must be > 0");
                }

                if supabase.realtime.heartbeat_seconds == 0 {
                    bail!("supabase.realtime.heartbeat_seconds must be > 0");
                }
            }
            "memory" => {
                if let Some(memory) = config.backend.backend_config.as_memory() {
                    if memory.max_rows_per_collection == Some(0) {
                        bail!("memory.max_rows_per_collection must be > 0");
                    }
                }
            }
            "none" => {}
            unknown => bail!(
                "Unknown backend: '{}'. Supported: {}",
                unknown,
                SUPPORTED_BACKENDS.join(", ")
            ),
        }

        match config.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => bail!("logging.level '{}' is not a valid level", other),
        }

        Ok(())
    }
}
