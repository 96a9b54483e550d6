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

// Record types for the four radar collections
//
// The collections are owned by the backend. Fields assigned there (ids,
// timestamps) are optional here and left out of insert payloads when unset.
// Columns this crate does not know about are preserved in `extra`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Stored procedure that synthesizes one demo transaction server-side
pub const DEMO_TRANSACTION_FUNCTION: &str = "generate_demo_transaction";

/// Audit log source used when the caller does not name one
pub const DEFAULT_LOG_SOURCE: &str = "SYSTEM";

/// Record collections exposed by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Transactions,
    Metrics,
    ThreatEvents,
    AuditLog,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Transactions,
        Collection::Metrics,
        Collection::ThreatEvents,
        Collection::AuditLog,
    ];

    /// Table name on the wire
    pub fn table_name(self) -> &'static str {
        match self {
            Collection::Transactions => "transactions",
            Collection::Metrics => "metrics",
            Collection::ThreatEvents => "threat_events",
            Collection::AuditLog => "audit_log",
        }
    }

    /// Column that orders the collection, newest first
    pub fn timestamp_column(self) -> &'static str {
        match self {
            Collection::Metrics => "recorded_at",
            _ => "created_at",
        }
    }

    /// Realtime channel name used when subscribing to inserts
    pub fn channel_name(self) -> &'static str {
        match self {
            Collection::Transactions => "transactions-realtime",
            Collection::Metrics => "metrics-realtime",
            Collection::ThreatEvents => "threats-realtime",
            Collection::AuditLog => "logs-realtime",
        }
    }

    pub fn from_table_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.table_name() == name)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Primary key as returned by the backend (bigint or uuid/text)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowId::Int(id) => write!(f, "{}", id),
            RowId::Text(id) => f.write_str(id),
        }
    }
}

/// Outcome the fraud engine attached to a transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Decision {
    Approved,
    Review,
    Blocked,
    Other(String),
}

impl Decision {
    pub fn as_str(&self) -> &str {
        match self {
            Decision::Approved => "APPROVED",
            Decision::Review => "REVIEW",
            Decision::Blocked => "BLOCKED",
            Decision::Other(value) => value,
        }
    }
}

impl From<String> for Decision {
    fn from(value: String) -> Self {
        match value.as_str() {
            "APPROVED" => Decision::Approved,
            "REVIEW" => Decision::Review,
            "BLOCKED" => Decision::Blocked,
            _ => Decision::Other(value),
        }
    }
}

impl From<Decision> for String {
    fn from(value: Decision) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Risk classification of a transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
    Other(String),
}

impl RiskLevel {
    pub fn as_str(&self) -> &str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
            RiskLevel::Other(value) => value,
        }
    }
}

impl From<String> for RiskLevel {
    fn from(value: String) -> Self {
        match value.as_str() {
            "LOW" => RiskLevel::Low,
            "MEDIUM" => RiskLevel::Medium,
            "HIGH" => RiskLevel::High,
            "CRITICAL" => RiskLevel::Critical,
            _ => RiskLevel::Other(value),
        }
    }
}

impl From<&str> for RiskLevel {
    fn from(value: &str) -> Self {
        RiskLevel::from(value.to_uppercase())
    }
}

impl From<RiskLevel> for String {
    fn from(value: RiskLevel) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Monetary event scored by the fraud engine.
///
/// Every column may be null or missing on the backend side, so every field
/// is optional and a row the backend returns always decodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RowId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    #[serde(
        default,
        deserialize_with = "deserialize_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub risk_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Transaction {
    pub fn new(amount: f64, decision: Decision, risk_level: RiskLevel) -> Self {
        Self {
            id: None,
            transaction_id: None,
            user_id: None,
            amount: Some(amount),
            decision: Some(decision),
            risk_level: Some(risk_level),
            risk_score: None,
            created_at: None,
            extra: Map::new(),
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.decision == Some(Decision::Blocked)
    }
}

/// Periodic metrics snapshot; its columns are opaque to this crate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RowId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub values: Map<String, Value>,
}

impl Metric {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }
}

/// Detected-threat record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RowId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threat_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ThreatEvent {
    pub fn new(threat_type: impl Into<String>, severity: impl Into<String>) -> Self {
        Self {
            id: None,
            threat_type: Some(threat_type.into()),
            severity: Some(severity.into()),
            description: None,
            created_at: None,
            extra: Map::new(),
        }
    }
}

/// Audit log line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RowId>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl AuditLogEntry {
    pub fn new(
        level: impl Into<String>,
        message: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            level: Some(level.into()),
            message: Some(message.into()),
            source: source.into(),
            created_at: None,
        }
    }
}

fn default_source() -> String {
    DEFAULT_LOG_SOURCE.to_string()
}

/// Read a monetary amount that the backend may send as a number or as a
/// numeric string (Postgres `numeric`).
pub fn parse_amount(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Optional number that may arrive as a JSON number, a numeric string or
/// null. Anything unreadable decodes as `None` rather than failing the row.
fn deserialize_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
        Other(Value),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(n)) => Some(n),
        Some(Raw::Text(s)) => s.trim().parse().ok(),
        Some(Raw::Other(_)) | None => None,
    })
}
