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

// Realtime subscription handles

use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Callback invoked once per inserted row
pub type RowHandler = Arc<dyn Fn(Value) + Send + Sync>;

struct SubscriptionState {
    channel: String,
    active: AtomicBool,
    shutdown: watch::Sender<bool>,
}

/// Handle returned by every subscribe call.
///
/// `unsubscribe` is idempotent and may be called from any clone. Dropping
/// the handle leaves the listener running.
#[derive(Clone)]
pub struct Subscription {
    state: Option<Arc<SubscriptionState>>,
}

impl Subscription {
    /// Create a live handle together with the listener side that the
    /// background task polls.
    pub fn channel(channel: impl Into<String>) -> (Self, SubscriptionListener) {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let state = Arc::new(SubscriptionState {
            channel: channel.into(),
            active: AtomicBool::new(true),
            shutdown,
        });
        let listener = SubscriptionListener {
            state: state.clone(),
            shutdown: shutdown_rx,
        };
        (Self { state: Some(state) }, listener)
    }

    /// Handle for offline mode: nothing to stop
    pub fn noop() -> Self {
        Self { state: None }
    }

    pub fn unsubscribe(&self) {
        if let Some(state) = &self.state {
            if state.active.swap(false, Ordering::SeqCst) {
                debug!("Unsubscribing from channel '{}'", state.channel);
                let _ = state.shutdown.send(true);
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.state
            .as_ref()
            .map(|s| s.active.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    pub fn channel_name(&self) -> Option<&str> {
        self.state.as_ref().map(|s| s.channel.as_str())
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel_name())
            .field("active", &self.is_active())
            .finish()
    }
}

/// Listener side of a [`Subscription`], owned by the background task
pub struct SubscriptionListener {
    state: Arc<SubscriptionState>,
    shutdown: watch::Receiver<bool>,
}

impl SubscriptionListener {
    pub fn channel(&self) -> &str {
        &self.state.channel
    }

    pub fn is_active(&self) -> bool {
        self.state.active.load(Ordering::SeqCst)
    }

    /// Deliver a row unless the handle has been unsubscribed
    pub fn deliver(&self, handler: &RowHandler, row: Value) -> bool {
        if !self.is_active() {
            return false;
        }
        handler(row);
        true
    }

    /// Resolves once `unsubscribe` has been called
    pub async fn cancelled(&mut self) {
        // The sender lives in the shared state, so `changed` cannot fail
        // while this listener exists.
        while !*self.shutdown.borrow_and_update() {
            if self.shutdown.changed().await.is_err() {
                return;
            }
        }
    }

    /// Mark the subscription finished from the listener side (socket closed,
    /// join rejected).
    pub fn close(&self) {
        self.state.active.store(false, Ordering::SeqCst);
    }
}
