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

// Realtime subscriptions against a local Phoenix channel server

use futures::{SinkExt, StreamExt};
use radar_store::config::SupabaseConfig;
use radar_store::{RadarStore, RowId, Subscription, SupabaseBackend, Transaction};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

const WAIT: Duration = Duration::from_secs(5);

type ServerSocket = WebSocketStream<TcpStream>;

async fn local_server() -> (TcpListener, RadarStore) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = SupabaseConfig {
        url: format!("http://{}", addr),
        api_key: "key".to_string(),
        ..SupabaseConfig::default()
    };
    let backend = SupabaseBackend::new(config).unwrap();
    (listener, RadarStore::with_backend(Arc::new(backend)))
}

async fn accept_channel(listener: TcpListener) -> ServerSocket {
    let (stream, _) = listener.accept().await.unwrap();
    accept_async(stream).await.unwrap()
}

/// Next JSON text frame, or None once the client is gone
async fn next_frame(ws: &mut ServerSocket) -> Option<Value> {
    while let Some(message) = ws.next().await {
        match message {
            Ok(Message::Text(text)) => return serde_json::from_str(&text).ok(),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => {}
        }
    }
    None
}

async fn send_frame(ws: &mut ServerSocket, frame: Value) {
    ws.send(Message::Text(frame.to_string())).await.unwrap();
}

fn join_reply(join: &Value, status: &str) -> Value {
    json!({
        "topic": join["topic"],
        "event": "phx_reply",
        "payload": { "status": status, "response": {} },
        "ref": join["ref"],
        "join_ref": join["ref"],
    })
}

fn insert_frame(topic: &Value, table: &str, record: Value) -> Value {
    json!({
        "topic": topic,
        "event": "postgres_changes",
        "ref": null,
        "payload": {
            "ids": [1],
            "data": {
                "type": "INSERT",
                "schema": "public",
                "table": table,
                "commit_timestamp": "2025-03-01T12:00:00Z",
                "columns": [],
                "record": record,
                "errors": null
            }
        }
    })
}

async fn wait_inactive(subscription: &Subscription) {
    tokio::time::timeout(WAIT, async {
        while subscription.is_active() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("subscription should end");
}

#[tokio::test]
async fn test_insert_for_subscribed_table_is_delivered_once() {
    let (listener, store) = local_server().await;
    let (leave_tx, leave_rx) = oneshot::channel::<Value>();

    tokio::spawn(async move {
        let mut ws = accept_channel(listener).await;
        let join = next_frame(&mut ws).await.unwrap();
        assert_eq!(join["event"], "phx_join");
        assert_eq!(join["topic"], "realtime:transactions-realtime");
        assert_eq!(
            join["payload"]["config"]["postgres_changes"][0]["table"],
            "transactions"
        );

        send_frame(&mut ws, join_reply(&join, "ok")).await;
        // Same channel, different table: must be ignored
        send_frame(
            &mut ws,
            insert_frame(&join["topic"], "threat_events", json!({"id": 7, "threat_type": "VELOCITY"})),
        )
        .await;
        send_frame(
            &mut ws,
            insert_frame(
                &join["topic"],
                "transactions",
                json!({"id": 42, "amount": "120.50", "decision": "BLOCKED", "risk_level": null}),
            ),
        )
        .await;

        while let Some(frame) = next_frame(&mut ws).await {
            if frame["event"] == "phx_leave" {
                let _ = leave_tx.send(frame);
                break;
            }
        }
    });

    let (row_tx, mut row_rx) = mpsc::unbounded_channel::<Transaction>();
    let subscription = store
        .subscribe_transactions(move |txn| {
            let _ = row_tx.send(txn);
        })
        .await;
    assert!(subscription.is_active());
    assert_eq!(subscription.channel_name(), Some("transactions-realtime"));

    let txn = tokio::time::timeout(WAIT, row_rx.recv())
        .await
        .expect("row should arrive")
        .unwrap();
    assert_eq!(txn.id, Some(RowId::Int(42)));
    assert_eq!(txn.amount, Some(120.5));
    assert!(txn.is_blocked());
    assert_eq!(txn.risk_level, None);

    subscription.unsubscribe();
    assert!(!subscription.is_active());

    let leave = tokio::time::timeout(WAIT, leave_rx)
        .await
        .expect("leave should be sent")
        .unwrap();
    assert_eq!(leave["topic"], "realtime:transactions-realtime");
    assert_eq!(leave["join_ref"], "1");

    assert!(row_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_rejected_join_ends_subscription() {
    let (listener, store) = local_server().await;

    tokio::spawn(async move {
        let mut ws = accept_channel(listener).await;
        let join = next_frame(&mut ws).await.unwrap();
        send_frame(&mut ws, join_reply(&join, "error")).await;
        // Hold the socket until the client drops it
        while next_frame(&mut ws).await.is_some() {}
    });

    let subscription = store.subscribe_logs(|_| {}).await;
    assert_eq!(subscription.channel_name(), Some("logs-realtime"));

    wait_inactive(&subscription).await;
    // Still safe after the listener ended on its own
    subscription.unsubscribe();
    assert!(!subscription.is_active());
}

#[tokio::test]
async fn test_server_close_ends_subscription() {
    let (listener, store) = local_server().await;

    tokio::spawn(async move {
        let mut ws = accept_channel(listener).await;
        let join = next_frame(&mut ws).await.unwrap();
        send_frame(&mut ws, join_reply(&join, "ok")).await;
        send_frame(
            &mut ws,
            json!({
                "topic": join["topic"],
                "event": "phx_close",
                "payload": {},
                "ref": join["ref"],
            }),
        )
        .await;
        while next_frame(&mut ws).await.is_some() {}
    });

    let subscription = store.subscribe_threats(|_| {}).await;
    wait_inactive(&subscription).await;
}

#[tokio::test]
async fn test_unreachable_realtime_server_yields_noop_handle() {
    let (listener, store) = local_server().await;
    drop(listener);

    let subscription = store.subscribe_transactions(|_| {}).await;
    assert!(!subscription.is_active());
    assert_eq!(subscription.channel_name(), None);
}
