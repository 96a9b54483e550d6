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

// Store behaviour against the in-memory backend

use chrono::{DateTime, Duration, Utc};
use radar_store::{
    BackendFactory, Collection, DataBackend, Decision, Metric, RadarStore, RiskLevel, ThreatEvent, Transaction,
};
use serde_json::{json, Map};
use std::time::Duration as StdDuration;
use tokio::sync::mpsc;

fn memory_store() -> RadarStore {
    RadarStore::with_backend(BackendFactory::memory())
}

fn txn_at(
    amount: f64,
    decision: Decision,
    risk: RiskLevel,
    created_at: DateTime<Utc>,
) -> Transaction {
    let mut txn = Transaction::new(amount, decision, risk);
    txn.created_at = Some(created_at);
    txn
}

fn threat_at(created_at: DateTime<Utc>) -> ThreatEvent {
    let mut threat = ThreatEvent::new("VELOCITY", "HIGH");
    threat.created_at = Some(created_at);
    threat
}

#[tokio::test]
async fn test_insert_returns_backend_assigned_fields() {
    let store = memory_store();

    let mut txn = Transaction::new(1200.0, Decision::Blocked, RiskLevel::Critical);
    txn.user_id = Some("USR-0042".to_string());
    txn.extra.insert("merchant".to_string(), json!("acme"));

    let stored = store.insert_transaction(txn).await;

    assert!(stored.id.is_some());
    assert!(stored.created_at.is_some());
    assert_eq!(stored.amount, Some(1200.0));
    assert_eq!(stored.decision, Some(Decision::Blocked));
    assert_eq!(stored.user_id.as_deref(), Some("USR-0042"));
    assert_eq!(stored.extra.get("merchant"), Some(&json!("acme")));
}

#[tokio::test]
async fn test_recent_transactions_newest_first_with_limit() {
    let store = memory_store();
    let now = Utc::now();

    for minutes in [30, 5, 50, 10, 20] {
        store
            .insert_transaction(txn_at(
                minutes as f64,
                Decision::Approved,
                RiskLevel::Low,
                now - Duration::minutes(minutes),
            ))
            .await;
    }

    let recent = store.recent_transactions(3).await;
    let amounts: Vec<f64> = recent.iter().filter_map(|t| t.amount).collect();
    assert_eq!(amounts, vec![5.0, 10.0, 20.0]);

    let all = store.recent_transactions(10).await;
    assert_eq!(all.len(), 5);
    assert!(all
        .windows(2)
        .all(|pair| pair[0].created_at >= pair[1].created_at));
}

#[tokio::test]
async fn test_transactions_by_risk_filters() {
    let store = memory_store();
    let now = Utc::now();

    store
        .insert_transaction(txn_at(10.0, Decision::Approved, RiskLevel::Low, now))
        .await;
    store
        .insert_transaction(txn_at(20.0, Decision::Review, RiskLevel::High, now - Duration::seconds(1)))
        .await;
    store
        .insert_transaction(txn_at(30.0, Decision::Blocked, RiskLevel::High, now))
        .await;

    let high = store.transactions_by_risk(&RiskLevel::High, 10).await;
    assert_eq!(high.len(), 2);
    assert!(high.iter().all(|t| t.risk_level == Some(RiskLevel::High)));
    assert_eq!(high[0].amount, Some(30.0));
}

#[tokio::test]
async fn test_latest_metrics_picks_newest_snapshot() {
    let store = memory_store();
    let now = Utc::now();

    assert!(store.latest_metrics().await.is_none());

    for (tps, age) in [(10, 60), (25, 1), (17, 30)] {
        let mut values = Map::new();
        values.insert("tps".to_string(), json!(tps));
        let metric = Metric {
            id: None,
            recorded_at: Some(now - Duration::seconds(age)),
            values,
        };
        store.insert(Collection::Metrics, metric).await;
    }

    let latest = store.latest_metrics().await.unwrap();
    assert_eq!(latest.get("tps"), Some(&json!(25)));
}

#[tokio::test]
async fn test_live_stats_counts_and_blocked_sum() {
    let store = memory_store();
    let now = Utc::now();
    let recent = now - Duration::hours(1);
    let stale = now - Duration::hours(30);

    store
        .insert_transaction(txn_at(100.0, Decision::Approved, RiskLevel::Low, recent))
        .await;
    store
        .insert_transaction(txn_at(250.5, Decision::Blocked, RiskLevel::High, recent))
        .await;
    store
        .insert_transaction(txn_at(49.5, Decision::Blocked, RiskLevel::Critical, recent))
        .await;
    // Outside the window: must not count toward any figure
    store
        .insert_transaction(txn_at(9999.0, Decision::Blocked, RiskLevel::Critical, stale))
        .await;
    store
        .insert_transaction(txn_at(75.0, Decision::Review, RiskLevel::Medium, stale))
        .await;

    store.insert_threat_event(threat_at(recent)).await;
    store.insert_threat_event(threat_at(stale)).await;

    let stats = store.live_stats().await.unwrap();
    assert_eq!(stats.transactions_24h, 3);
    assert_eq!(stats.blocked_24h, 2);
    assert_eq!(stats.fraud_blocked_amount, 300.0);
    assert_eq!(stats.threats_24h, 1);
}

#[tokio::test]
async fn test_live_stats_empty_backend() {
    let store = memory_store();
    let stats = store.live_stats().await.unwrap();

    assert_eq!(stats.transactions_24h, 0);
    assert_eq!(stats.blocked_24h, 0);
    assert_eq!(stats.fraud_blocked_amount, 0.0);
    assert_eq!(stats.threats_24h, 0);
}

#[tokio::test]
async fn test_audit_log_default_source() {
    let store = memory_store();

    store.insert_audit_log("WARN", "velocity spike", None).await;
    store
        .insert_audit_log("INFO", "model reloaded", Some("ML_ENGINE"))
        .await;

    let logs = store.recent_logs(10).await;
    assert_eq!(logs.len(), 2);
    let sources: Vec<&str> = logs.iter().map(|l| l.source.as_str()).collect();
    assert!(sources.contains(&"SYSTEM"));
    assert!(sources.contains(&"ML_ENGINE"));
}

#[tokio::test]
async fn test_generate_demo_transactions() {
    let store = memory_store();
    assert_eq!(store.backend_type(), "memory");

    for _ in 0..3 {
        store.generate_demo_transaction().await;
    }

    let txns = store.recent_transactions(10).await;
    assert_eq!(txns.len(), 3);
    assert!(txns.iter().all(|t| t.id.is_some() && t.amount.unwrap_or(0.0) >= 5.0));
}

#[tokio::test]
async fn test_subscription_delivers_until_unsubscribed() {
    let store = memory_store();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let subscription = store
        .subscribe_transactions(move |txn: Transaction| {
            let _ = tx.send(txn);
        })
        .await;
    assert!(subscription.is_active());
    assert_eq!(subscription.channel_name(), Some("transactions-realtime"));

    store
        .insert_transaction(Transaction::new(42.0, Decision::Approved, RiskLevel::Low))
        .await;

    let received = tokio::time::timeout(StdDuration::from_secs(1), rx.recv())
        .await
        .expect("insert notification")
        .expect("channel open");
    assert_eq!(received.amount, Some(42.0));
    assert!(received.id.is_some());

    subscription.unsubscribe();
    subscription.unsubscribe();
    assert!(!subscription.is_active());

    store
        .insert_transaction(Transaction::new(7.0, Decision::Approved, RiskLevel::Low))
        .await;
    tokio::time::sleep(StdDuration::from_millis(100)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_subscriptions_are_independent() {
    let store = memory_store();
    let (threat_tx, mut threat_rx) = mpsc::unbounded_channel();
    let (log_tx, mut log_rx) = mpsc::unbounded_channel();

    let threats = store
        .subscribe_threats(move |threat: ThreatEvent| {
            let _ = threat_tx.send(threat);
        })
        .await;
    let _logs = store
        .subscribe_logs(move |entry| {
            let _ = log_tx.send(entry);
        })
        .await;

    threats.unsubscribe();
    store.insert_threat_event(ThreatEvent::new("GEO_MISMATCH", "MEDIUM")).await;
    store.insert_audit_log("INFO", "still listening", None).await;

    let entry = tokio::time::timeout(StdDuration::from_secs(1), log_rx.recv())
        .await
        .expect("log notification")
        .expect("channel open");
    assert_eq!(entry.message.as_deref(), Some("still listening"));

    tokio::time::sleep(StdDuration::from_millis(50)).await;
    assert!(threat_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_rows_with_null_columns_are_returned() {
    let backend = BackendFactory::memory();
    let store = RadarStore::with_backend(backend.clone());

    backend
        .insert(
            Collection::Transactions,
            json!({"amount": 10, "decision": null, "risk_level": "LOW"}),
            false,
        )
        .await
        .unwrap();
    backend
        .insert(
            Collection::Transactions,
            json!({"amount": 20, "decision": "APPROVED", "risk_level": null}),
            false,
        )
        .await
        .unwrap();
    backend
        .insert(
            Collection::AuditLog,
            json!({"level": "INFO", "message": null}),
            false,
        )
        .await
        .unwrap();

    let txns = store.recent_transactions(10).await;
    let stats = store.live_stats().await.unwrap();
    assert_eq!(txns.len(), 2);
    assert_eq!(stats.transactions_24h, txns.len() as u64);
    assert!(txns.iter().any(|t| t.decision.is_none()));
    assert!(txns.iter().any(|t| t.risk_level.is_none()));

    let logs = store.recent_logs(10).await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].message, None);
    assert_eq!(logs[0].source, "SYSTEM");
}

#[tokio::test]
async fn test_subscription_receives_rows_with_null_columns() {
    let backend = BackendFactory::memory();
    let store = RadarStore::with_backend(backend.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let subscription = store
        .subscribe_transactions(move |txn: Transaction| {
            let _ = tx.send(txn);
        })
        .await;

    backend
        .insert(
            Collection::Transactions,
            json!({"amount": null, "decision": null, "risk_level": null}),
            false,
        )
        .await
        .unwrap();

    let received = tokio::time::timeout(StdDuration::from_secs(1), rx.recv())
        .await
        .expect("insert notification")
        .expect("channel open");
    assert_eq!(received.amount, None);
    assert!(received.id.is_some());
    subscription.unsubscribe();
}
