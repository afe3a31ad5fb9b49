//! Snapshot-created notifications.
//!
//! Events are published after the ingestion transaction commits. Delivery is
//! best-effort: callers log publish failures and move on.

use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tracing::{debug, info};

use crate::config::EventsConfig;
use crate::date::GameDate;
use crate::Error;

/// Published once per newly committed gamestate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GamestateCreated {
    pub save_id: i64,
    pub gamestate_id: i64,
    /// Serialized as `YYYY-MM-DD`.
    pub date: GameDate,
}

/// Wire envelope: one JSON object per line.
#[derive(Debug, Serialize)]
struct Envelope<'a, T> {
    topic: &'a str,
    payload: &'a T,
}

#[allow(async_fn_in_trait)]
pub trait EventPublisher {
    async fn publish(&self, event: &GamestateCreated) -> Result<(), Error>;
}

/// Newline-delimited JSON over a Unix socket.
pub struct SocketPublisher {
    socket_path: String,
    topic: String,
}

impl SocketPublisher {
    pub fn new(socket_path: String, topic: String) -> Self {
        Self { socket_path, topic }
    }

    fn encode(&self, event: &GamestateCreated) -> Result<String, Error> {
        let mut line = serde_json::to_string(&Envelope {
            topic: &self.topic,
            payload: event,
        })?;
        line.push('\n');
        Ok(line)
    }
}

impl EventPublisher for SocketPublisher {
    async fn publish(&self, event: &GamestateCreated) -> Result<(), Error> {
        debug!(topic = %self.topic, gamestate_id = event.gamestate_id, "Publishing event");

        let line = self.encode(event)?;
        let mut stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| Error::Publish(format!("Failed to connect to {}: {}", self.socket_path, e)))?;
        stream
            .write_all(line.as_bytes())
            .await
            .map_err(|e| Error::Publish(format!("Failed to write event: {}", e)))?;
        stream
            .flush()
            .await
            .map_err(|e| Error::Publish(format!("Failed to flush: {}", e)))?;
        Ok(())
    }
}

/// Logs events instead of delivering them.
pub struct LogPublisher {
    topic: String,
}

impl LogPublisher {
    pub fn new(topic: String) -> Self {
        Self { topic }
    }
}

impl EventPublisher for LogPublisher {
    async fn publish(&self, event: &GamestateCreated) -> Result<(), Error> {
        info!(
            topic = %self.topic,
            save_id = event.save_id,
            gamestate_id = event.gamestate_id,
            date = %event.date.to_iso(),
            "Gamestate created"
        );
        Ok(())
    }
}

/// Publisher selected from configuration.
pub enum Publisher {
    Socket(SocketPublisher),
    Log(LogPublisher),
}

impl Publisher {
    pub fn from_config(config: &EventsConfig) -> Self {
        match &config.socket_path {
            Some(path) => Publisher::Socket(SocketPublisher::new(path.clone(), config.topic.clone())),
            None => Publisher::Log(LogPublisher::new(config.topic.clone())),
        }
    }
}

impl EventPublisher for Publisher {
    async fn publish(&self, event: &GamestateCreated) -> Result<(), Error> {
        match self {
            Publisher::Socket(publisher) => publisher.publish(event).await,
            Publisher::Log(publisher) => publisher.publish(event).await,
        }
    }
}
