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

// Realtime subscriptions over the Phoenix channel websocket

use crate::config::SupabaseConfig;
use crate::error::BackendResult;
use crate::model::Collection;
use crate::protocol::{
    ChangeEvent, PhoenixMessage, RefCounter, EVENT_CLOSE, EVENT_ERROR, EVENT_POSTGRES_CHANGES,
    EVENT_REPLY, EVENT_SYSTEM, PHOENIX_TOPIC,
};
use crate::subscription::{RowHandler, Subscription, SubscriptionListener};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type SocketSink = SplitSink<Socket, Message>;
type SocketStream = SplitStream<Socket>;

/// Opens one websocket per subscription
pub struct RealtimeClient {
    socket_url: String,
    api_key: String,
    schema: String,
    heartbeat: Duration,
}

impl RealtimeClient {
    pub fn new(config: &SupabaseConfig) -> Self {
        Self {
            socket_url: socket_url(&config.url, config.api_key.trim()),
            api_key: config.api_key.trim().to_string(),
            schema: config.schema.clone(),
            heartbeat: config.realtime.heartbeat_interval(),
        }
    }

    pub fn socket_url(&self) -> &str {
        &self.socket_url
    }

    /// Connect, join the collection's channel and spawn the listener task
    pub async fn subscribe(
        &self,
        collection: Collection,
        handler: RowHandler,
    ) -> BackendResult<Subscription> {
        let channel = collection.channel_name();
        let (socket, _) = connect_async(self.socket_url.as_str()).await?;
        let (mut sink, stream) = socket.split();

        let mut refs = RefCounter::default();
        let join_ref = refs.next();
        let join = PhoenixMessage::join(
            channel,
            &self.schema,
            collection.table_name(),
            ChangeEvent::Insert,
            &self.api_key,
            &join_ref,
        );
        send_frame(&mut sink, &join).await?;
        info!(
            "Joining realtime channel '{}' for inserts on '{}'",
            channel, collection
        );

        let (subscription, listener) = Subscription::channel(channel);
        let task = ChannelTask {
            collection,
            topic: PhoenixMessage::topic_for(channel),
            channel: channel.to_string(),
            join_ref,
            refs,
            heartbeat: self.heartbeat,
        };
        tokio::spawn(task.run(sink, stream, listener, handler));

        Ok(subscription)
    }
}

/// Realtime websocket endpoint for a project URL
pub fn socket_url(project_url: &str, api_key: &str) -> String {
    let base = project_url.trim().trim_end_matches('/');
    let base = if let Some(host) = base.strip_prefix("https://") {
        format!("wss://{}", host)
    } else if let Some(host) = base.strip_prefix("http://") {
        format!("ws://{}", host)
    } else {
        base.to_string()
    };
    format!("{}/realtime/v1/websocket?apikey={}&vsn=1.0.0", base, api_key)
}

async fn send_frame(sink: &mut SocketSink, frame: &PhoenixMessage) -> BackendResult<()> {
    let text = serde_json::to_string(frame)?;
    sink.send(Message::Text(text)).await?;
    Ok(())
}

struct ChannelTask {
    collection: Collection,
    topic: String,
    channel: String,
    join_ref: String,
    refs: RefCounter,
    heartbeat: Duration,
}

impl ChannelTask {
    async fn run(
        mut self,
        mut sink: SocketSink,
        mut stream: SocketStream,
        mut listener: SubscriptionListener,
        handler: RowHandler,
    ) {
        let mut heartbeat = tokio::time::interval(self.heartbeat);
        // First tick completes immediately
        heartbeat.tick().await;

        loop {
            tokio::select! {
                _ = listener.cancelled() => {
                    let leave = PhoenixMessage::leave(&self.channel, &self.refs.next(), &self.join_ref);
                    if let Err(e) = send_frame(&mut sink, &leave).await {
                        debug!("Failed to send leave for '{}': {}", self.channel, e);
                    }
                    let _ = sink.close().await;
                    info!("Left realtime channel '{}'", self.channel);
                    break;
                }
                _ = heartbeat.tick() => {
                    let frame = PhoenixMessage::heartbeat(&self.refs.next());
                    if let Err(e) = send_frame(&mut sink, &frame).await {
                        error!("Realtime heartbeat on '{}' failed: {}", self.channel, e);
                        break;
                    }
                }
                message = stream.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            if !self.handle_text(&text, &listener, &handler) {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            warn!("Realtime socket for '{}' closed by server: {:?}", self.channel, frame);
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!("Realtime socket error on '{}': {}", self.channel, e);
                            break;
                        }
                        None => {
                            warn!("Realtime stream for '{}' ended", self.channel);
                            break;
                        }
                    }
                }
            }
        }

        listener.close();
    }

    /// Returns false when the channel should stop listening
    fn handle_text(
        &self,
        text: &str,
        listener: &SubscriptionListener,
        handler: &RowHandler,
    ) -> bool {
        let frame: PhoenixMessage = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Ignoring malformed realtime frame on '{}': {}", self.channel, e);
                return true;
            }
        };

        if frame.topic != self.topic && frame.topic != PHOENIX_TOPIC {
            return true;
        }

        match frame.event.as_str() {
            EVENT_REPLY => {
                let status = frame.reply_status().unwrap_or_default();
                let is_join_reply = frame.msg_ref.as_deref() == Some(self.join_ref.as_str());
                if is_join_reply && status == "ok" {
                    info!("Subscribed to realtime channel '{}'", self.channel);
                } else if is_join_reply {
                    error!(
                        "Realtime join for '{}' rejected: {}",
                        self.channel,
                        frame.payload.get("response").cloned().unwrap_or_default()
                    );
                    return false;
                } else if status != "ok" {
                    warn!("Realtime reply on '{}' with status '{}'", self.channel, status);
                }
            }
            EVENT_POSTGRES_CHANGES => match frame.postgres_change() {
                Some(change)
                    if change.event == ChangeEvent::Insert
                        && change.table == self.collection.table_name() =>
                {
                    listener.deliver(handler, change.record);
                }
                Some(_) => {}
                None => warn!("Undecodable change notification on '{}'", self.channel),
            },
            EVENT_ERROR | EVENT_CLOSE => {
                error!(
                    "Realtime channel '{}' closed by server ({})",
                    self.channel, frame.event
                );
                return false;
            }
            EVENT_SYSTEM => debug!("Realtime system message on '{}': {}", self.channel, frame.payload),
            other => debug!("Ignoring realtime event '{}' on '{}'", other, self.channel),
        }

        true
    }
}
