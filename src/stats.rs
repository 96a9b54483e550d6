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

// 24-hour summary computed from three independent reads

use crate::backend::QueryResult;
use crate::model::parse_amount;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const STATS_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveStats {
    pub transactions_24h: u64,
    pub blocked_24h: u64,
    pub fraud_blocked_amount: f64,
    pub threats_24h: u64,
}

impl LiveStats {
    /// Combine the total, blocked and threat reads.
    ///
    /// Each read reflects its own query time; there is no consistency
    /// between them.
    pub fn from_results(total: &QueryResult, blocked: &QueryResult, threats: &QueryResult) -> Self {
        Self {
            transactions_24h: total.count.unwrap_or(0),
            blocked_24h: blocked.count.unwrap_or(0),
            fraud_blocked_amount: sum_amounts(&blocked.rows),
            threats_24h: threats.count.unwrap_or(0),
        }
    }
}

/// Start of the stats window ending at `now`
pub fn window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::hours(STATS_WINDOW_HOURS)
}

/// Sum `amount` over rows; rows without a readable amount count as zero
pub fn sum_amounts(rows: &[Value]) -> f64 {
    rows.iter()
        .filter_map(|row| row.get("amount").and_then(parse_amount))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sum_amounts_mixed_representations() {
        let rows = vec![
            json!({"amount": 100.25}),
            json!({"amount": "49.75"}),
            json!({"amount": null}),
            json!({}),
        ];
        assert_eq!(sum_amounts(&rows), 150.0);
    }

    #[test]
    fn test_from_results_missing_counts_are_zero() {
        let blocked = QueryResult {
            rows: vec![json!({"amount": 10}), json!({"amount": 5})],
            count: Some(2),
        };
        let stats = LiveStats::from_results(&QueryResult::default(), &blocked, &QueryResult::default());

        assert_eq!(
            stats,
            LiveStats {
                transactions_24h: 0,
                blocked_24h: 2,
                fraud_blocked_amount: 15.0,
                threats_24h: 0,
            }
        );
    }

    #[test]
    fn test_window_start() {
        let now = DateTime::parse_from_rfc3339("2025-03-02T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(window_start(now).to_rfc3339(), "2025-03-01T12:00:00+00:00");
    }
}
