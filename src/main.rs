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

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use radar_store::config::{apply_env_overrides, select_backend, ConfigLoader, LoggingConfig};
use radar_store::{
    load_config, RadarStore, RiskLevel, StoreConfig, Subscription, DEFAULT_LOG_LIMIT,
    DEFAULT_THREAT_LIMIT, DEFAULT_TRANSACTION_LIMIT,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Radar Store - query and watch the fraud radar collections
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.yaml")]
    config: PathBuf,

    /// Backend kind (overrides config file): supabase, memory, none.
    /// The memory backend lives only for one invocation, so `demo` prints
    /// what it generated.
    #[arg(short, long)]
    backend: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show backend kind and health
    Status,
    /// Most recent transactions
    Transactions {
        /// Only transactions with this risk level (LOW, MEDIUM, HIGH, CRITICAL)
        #[arg(long)]
        risk: Option<String>,
        #[arg(short, long, default_value_t = DEFAULT_TRANSACTION_LIMIT)]
        limit: usize,
    },
    /// Most recent threat events
    Threats {
        #[arg(short, long, default_value_t = DEFAULT_THREAT_LIMIT)]
        limit: usize,
    },
    /// Most recent audit log lines
    Logs {
        #[arg(short, long, default_value_t = DEFAULT_LOG_LIMIT)]
        limit: usize,
    },
    /// Latest metrics snapshot
    Metrics,
    /// 24-hour summary
    Stats,
    /// Generate demo transactions on the backend (printed when in-memory)
    Demo {
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },
    /// Append an audit log line
    Log {
        #[arg(long, default_value = "INFO")]
        level: String,
        #[arg(long)]
        message: String,
        #[arg(long)]
        source: Option<String>,
    },
    /// Print inserted rows until Ctrl+C
    Watch {
        #[arg(value_enum)]
        target: WatchTarget,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum WatchTarget {
    Transactions,
    Threats,
    Logs,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // A missing config file is not fatal: defaults plus environment
    let mut store_config = if args.config.exists() {
        load_config(&args.config)?
    } else {
        StoreConfig::default()
    };

    // Apply CLI overrides
    if let Some(kind) = &args.backend {
        select_backend(&mut store_config, kind);
        ConfigLoader::validate(&store_config)?;
    }
    apply_env_overrides(&mut store_config)?;

    init_tracing(&store_config.logging)?;

    info!("Starting Radar Store");
    info!("Configuration: {:?}", args.config);
    info!("Backend: {}", store_config.backend.kind);

    let store = RadarStore::from_config(&store_config.backend)?;

    match args.command {
        Command::Status => {
            let healthy = store.health_check().await;
            print_json(&serde_json::json!({
                "live": store.is_live(),
                "backend": store.backend_type(),
                "healthy": healthy,
            }))?;
        }
        Command::Transactions { risk, limit } => {
            let rows = match risk {
                Some(level) => {
                    store
                        .transactions_by_risk(&RiskLevel::from(level.as_str()), limit)
                        .await
                }
                None => store.recent_transactions(limit).await,
            };
            print_json(&rows)?;
        }
        Command::Threats { limit } => print_json(&store.recent_threats(limit).await)?,
        Command::Logs { limit } => print_json(&store.recent_logs(limit).await)?,
        Command::Metrics => print_json(&store.latest_metrics().await)?,
        Command::Stats => print_json(&store.live_stats().await)?,
        Command::Demo { count } => {
            for _ in 0..count {
                store.generate_demo_transaction().await;
            }
            info!("Requested {} demo transactions", count);
            // Nothing outlives this process with the memory backend
            if store.backend_type() == "memory" {
                print_json(&store.recent_transactions(count).await)?;
            }
        }
        Command::Log {
            level,
            message,
            source,
        } => {
            store
                .insert_audit_log(&level, &message, source.as_deref())
                .await;
        }
        Command::Watch { target } => watch(&store, target).await?,
    }

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.to_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if logging.format.eq_ignore_ascii_case("json") {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_row<T: Serialize>(row: T) {
    match serde_json::to_string(&row) {
        Ok(line) => println!("{}", line),
        Err(e) => tracing::error!("Failed to encode row: {}", e),
    }
}

async fn watch(store: &RadarStore, target: WatchTarget) -> Result<()> {
    if !store.is_live() {
        info!("No backend configured; nothing to watch");
        return Ok(());
    }

    let subscription: Subscription = match target {
        WatchTarget::Transactions => store.subscribe_transactions(print_row).await,
        WatchTarget::Threats => store.subscribe_threats(print_row).await,
        WatchTarget::Logs => store.subscribe_logs(print_row).await,
    };

    info!("Watching {:?}, press Ctrl+C to stop", target);
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down");

    subscription.unsubscribe();
    Ok(())
}
