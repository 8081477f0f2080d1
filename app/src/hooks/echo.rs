//! Pusher-protocol push channel carrying round lifecycle broadcasts.

use std::{collections::BTreeSet, future::Future, time::Duration};

use futures::{SinkExt, StreamExt};
use ori_api::prelude::*;
use serde::Deserialize;
use tokio::{
    net::TcpStream,
    sync::{mpsc, watch},
};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use crate::{Error, Input, PushConfig, Result};

/// A broadcast as received, before it is interpreted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushMessage {
    pub channel: String,
    pub event: String,
    /// JSON document carried by the message.
    pub data: String,
}

pub trait PushSource: Send + 'static {
    fn subscribe(&mut self, channel: &str) -> impl Future<Output = Result<()>> + Send;

    fn unsubscribe(&mut self, channel: &str) -> impl Future<Output = Result<()>> + Send;

    /// Next broadcast on any subscribed channel. An error means the
    /// connection was lost; the next call reconnects.
    fn next_message(&mut self) -> impl Future<Output = Result<PushMessage>> + Send;
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Pusher protocol 7 client. Connects lazily and resubscribes every channel
/// after a reconnect.
pub struct PusherClient {
    url: String,
    socket: Option<Socket>,
    channels: BTreeSet<String>,
}

#[derive(Deserialize, Debug)]
struct Frame {
    event: String,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    data: serde_json::Value,
}

// Pusher double-encodes `data` as a JSON string.
fn data_string(data: serde_json::Value) -> String {
    match data {
        serde_json::Value::String(data) => data,
        serde_json::Value::Null => "{}".to_string(),
        other => other.to_string(),
    }
}

pub fn pusher_url(config: &PushConfig) -> Result<Url> {
    let scheme = if config.tls { "wss" } else { "ws" };
    let mut url = Url::parse(&format!(
        "{scheme}://{}:{}/app/{}",
        config.host, config.port, config.key
    ))
    .map_err(|e| Error::Config(format!("push url: {e}")))?;
    url.query_pairs_mut()
        .append_pair("protocol", "7")
        .append_pair("client", "ori-rs")
        .append_pair("version", env!("CARGO_PKG_VERSION"))
        .append_pair("flash", "false");
    Ok(url)
}

fn channel_frame(event: &str, channel: &str) -> Message {
    Message::Text(
        serde_json::json!({
            "event": event,
            "data": { "channel": channel },
        })
        .to_string(),
    )
}

impl PusherClient {
    pub fn new(config: &PushConfig) -> Result<Self> {
        Ok(Self {
            url: pusher_url(config)?.to_string(),
            socket: None,
            channels: BTreeSet::new(),
        })
    }

    async fn connection(&mut self) -> Result<&mut Socket> {
        if self.socket.is_none() {
            let (mut socket, _) = connect_async(self.url.as_str()).await?;
            info!(url = %self.url, "push channel connected");
            for channel in &self.channels {
                socket.send(channel_frame("pusher:subscribe", channel)).await?;
            }
            self.socket = Some(socket);
        }
        self.socket
            .as_mut()
            .ok_or_else(|| Error::Push("not connected".to_string()))
    }

    /// Send on the live connection, if there is one.
    async fn send_if_connected(&mut self, message: Message) -> Result<()> {
        let Some(socket) = self.socket.as_mut() else {
            return Ok(());
        };
        if let Err(err) = socket.send(message).await {
            self.socket = None;
            return Err(err.into());
        }
        Ok(())
    }
}

impl PushSource for PusherClient {
    async fn subscribe(&mut self, channel: &str) -> Result<()> {
        if self.channels.insert(channel.to_string()) {
            self.send_if_connected(channel_frame("pusher:subscribe", channel))
                .await?;
        }
        Ok(())
    }

    async fn unsubscribe(&mut self, channel: &str) -> Result<()> {
        if self.channels.remove(channel) {
            self.send_if_connected(channel_frame("pusher:unsubscribe", channel))
                .await?;
        }
        Ok(())
    }

    async fn next_message(&mut self) -> Result<PushMessage> {
        loop {
            let frame = self.connection().await?.next().await;
            let text = match frame {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Close(frame))) => {
                    self.socket = None;
                    return Err(Error::Push(format!("closed by server: {frame:?}")));
                }
                Some(Ok(_)) => continue,
                Some(Err(err)) => {
                    self.socket = None;
                    return Err(err.into());
                }
                None => {
                    self.socket = None;
                    return Err(Error::Push("connection closed".to_string()));
                }
            };

            let Frame {
                event,
                channel,
                data,
            } = match serde_json::from_str(&text) {
                Ok(frame) => frame,
                Err(err) => {
                    warn!(%err, "unreadable push frame");
                    continue;
                }
            };
            match event.as_str() {
                "pusher:connection_established" => debug!("push handshake complete"),
                "pusher:ping" => {
                    let pong = serde_json::json!({ "event": "pusher:pong", "data": {} });
                    self.send_if_connected(Message::Text(pong.to_string()))
                        .await?;
                }
                "pusher:pong" => {}
                "pusher_internal:subscription_succeeded" => {
                    debug!(?channel, "subscribed")
                }
                "pusher:error" => warn!(%data, "push channel error"),
                _ => match channel {
                    Some(channel) => {
                        return Ok(PushMessage {
                            channel,
                            event: event.clone(),
                            data: data_string(data),
                        });
                    }
                    None => debug!(%event, "ignoring channel-less frame"),
                },
            }
        }
    }
}

/// Subscribe to the round channels and forward their events to the driver
/// until shutdown.
pub async fn listen<P: PushSource>(
    mut source: P,
    inputs: mpsc::UnboundedSender<Input>,
    mut shutdown: watch::Receiver<bool>,
    reconnect: Duration,
) {
    for subscription in SUBSCRIPTIONS {
        if let Err(err) = source.subscribe(subscription.channel).await {
            warn!(channel = subscription.channel, %err, "subscribe failed");
        }
    }

    while !*shutdown.borrow() {
        let message = tokio::select! {
            message = source.next_message() => message,
            _ = shutdown.changed() => break,
        };
        match message {
            Ok(message) => {
                match PushEvent::parse(&message.channel, &message.event, &message.data) {
                    Ok(event) => {
                        debug!(?event, "push received");
                        if inputs.send(Input::Push(event)).is_err() {
                            break;
                        }
                    }
                    Err(OriError::UnknownEvent { channel, event }) => {
                        debug!(%channel, %event, "ignoring push event")
                    }
                    Err(err) => warn!(channel = %message.channel, %err, "malformed push payload"),
                }
            }
            Err(err) => {
                warn!(%err, "push channel lost, retrying in {:?}", reconnect);
                tokio::select! {
                    _ = tokio::time::sleep(reconnect) => {}
                    _ = shutdown.changed() => break,
                }
            }
        }
    }

    for subscription in SUBSCRIPTIONS {
        if let Err(err) = source.unsubscribe(subscription.channel).await {
            debug!(channel = subscription.channel, %err, "unsubscribe failed");
        }
    }
    debug!("push listener stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_pusher_url() {
        let url = pusher_url(&PushConfig {
            host: "ws.example.com".to_string(),
            port: 6001,
            key: "abc".to_string(),
            tls: false,
        })
        .unwrap();
        assert_eq!(url.scheme(), "ws");
        assert_eq!(url.port(), Some(6001));
        assert_eq!(url.path(), "/app/abc");
        assert!(url.query_pairs().any(|(k, v)| k == "protocol" && v == "7"));
    }

    #[test]
    fn frame_data_may_be_a_string() {
        let frame: Frame = serde_json::from_str(
            r#"{"event":"round.data.reset","channel":"round.reset","data":"{\"winning_square\":3}"}"#,
        )
        .unwrap();
        let data = data_string(frame.data);
        let event = PushEvent::parse("round.reset", "round.data.reset", &data).unwrap();
        assert!(matches!(event, PushEvent::Reset(reset) if reset.winner() == Some(3)));

        let frame: Frame =
            serde_json::from_str(r#"{"event":"x","data":{"timestamp":5}}"#).unwrap();
        assert_eq!(data_string(frame.data), r#"{"timestamp":5}"#);
    }

    struct Scripted {
        messages: Vec<Result<PushMessage>>,
        subscribed: BTreeSet<String>,
    }

    impl PushSource for Scripted {
        async fn subscribe(&mut self, channel: &str) -> Result<()> {
            self.subscribed.insert(channel.to_string());
            Ok(())
        }

        async fn unsubscribe(&mut self, channel: &str) -> Result<()> {
            self.subscribed.remove(channel);
            Ok(())
        }

        async fn next_message(&mut self) -> Result<PushMessage> {
            match self.messages.pop() {
                Some(message) => message,
                None => std::future::pending().await,
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn forwards_known_events_only() {
        let message = |channel: &str, event: &str, data: &str| {
            Ok(PushMessage {
                channel: channel.to_string(),
                event: event.to_string(),
                data: data.to_string(),
            })
        };
        // popped from the back
        let source = Scripted {
            messages: vec![
                message("round.reset", "round.data.reset", r#"{"winning_square":9}"#),
                Err(Error::Push("dropped".to_string())),
                message("round.reset", "round.data.reset", "{oops"),
                message("chat", "message", "{}"),
                message("round.new_round", "round.data.started", r#"{"timestamp":100}"#),
            ],
            subscribed: BTreeSet::new(),
        };
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (stop, shutdown) = watch::channel(false);
        let task = tokio::spawn(listen(source, tx, shutdown, Duration::from_secs(3)));

        assert!(matches!(
            rx.recv().await,
            Some(Input::Push(PushEvent::Started(started))) if started.timestamp == Some(100)
        ));
        assert!(matches!(
            rx.recv().await,
            Some(Input::Push(PushEvent::Reset(reset))) if reset.winner() == Some(9)
        ));

        stop.send(true).unwrap();
        task.await.unwrap();
        assert!(rx.recv().await.is_none());
    }
}
