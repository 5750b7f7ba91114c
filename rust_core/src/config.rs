// rust_core/src/config.rs
// Client settings. Every field has a default, so a partial JSON file is valid.

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ClientError, Result};
use crate::stomp::DEFAULT_MAX_FRAME_BYTES;

pub const API_URL_ENV: &str = "LOTUS_API_URL";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the match server, e.g. `http://localhost:8080`.
    pub api_base: String,
    /// Raw WebSocket leg of the server's SockJS endpoint.
    pub ws_path: String,
    /// Fallback poll while the push channel is down.
    pub poll_interval_ms: u64,
    pub reconnect_delay_ms: u64,
    /// Outgoing heartbeat offered in CONNECT, and the incoming one requested.
    pub heartbeat_ms: u64,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    /// Time the result banner stays up before the exit callback fires.
    pub exit_delay_ms: u64,
    /// Lifetime of the just-played / just-hit highlights.
    pub animation_ms: u64,
    /// Lobby poll while the match is still WAITING.
    pub waiting_poll_ms: u64,
    pub event_channel_capacity: usize,
    pub shutdown_timeout_ms: u64,
    /// Largest STOMP frame accepted from the push channel.
    pub max_frame_bytes: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8080".to_string(),
            ws_path: "/ws/websocket".to_string(),
            poll_interval_ms: 5000,
            reconnect_delay_ms: 5000,
            heartbeat_ms: 10_000,
            connect_timeout_ms: 10_000,
            request_timeout_ms: 15_000,
            exit_delay_ms: 2500,
            animation_ms: 450,
            waiting_poll_ms: 2000,
            event_channel_capacity: 64,
            shutdown_timeout_ms: 1000,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl ClientConfig {
    /// Defaults, with `LOTUS_API_URL` overriding the base URL.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                config.api_base = url;
            }
        }
        config.normalized()
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        let config = config.normalized();
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into();
        self.normalized()
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay_ms = delay.as_millis() as u64;
        self
    }

    #[must_use]
    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat_ms = interval.as_millis() as u64;
        self
    }

    fn normalized(mut self) -> Self {
        while self.api_base.ends_with('/') {
            self.api_base.pop();
        }
        self.event_channel_capacity = self.event_channel_capacity.max(1);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.api_base.starts_with("http://") || self.api_base.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "api_base must start with http:// or https://, got {:?}",
                self.api_base
            )));
        }
        if self.poll_interval_ms == 0 || self.reconnect_delay_ms == 0 {
            return Err(ClientError::Config(
                "poll and reconnect intervals must be positive".to_string(),
            ));
        }
        if self.max_frame_bytes == 0 {
            return Err(ClientError::Config(
                "max_frame_bytes must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// `http` becomes `ws`, `https` becomes `wss`.
    pub fn ws_url(&self) -> String {
        let base = if let Some(rest) = self.api_base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.api_base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.api_base.clone()
        };
        format!("{}{}", base, self.ws_path)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn exit_delay(&self) -> Duration {
        Duration::from_millis(self.exit_delay_ms)
    }

    pub fn animation(&self) -> Duration {
        Duration::from_millis(self.animation_ms)
    }

    pub fn waiting_poll(&self) -> Duration {
        Duration::from_millis(self.waiting_poll_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}
