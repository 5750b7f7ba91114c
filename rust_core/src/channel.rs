// rust_core/src/channel.rs
// The live push channel for one match.
//
// A background task owns the socket: it connects, speaks STOMP, subscribes to
// the match topic and forwards every decoded snapshot. On any failure it
// reports `Disconnected`, waits a fixed delay and tries again. The handle
// tears the task down deterministically; once `shutdown` returns, the task is
// gone and no further events are produced.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, sleep_until, timeout, Instant, Interval};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::credentials::CredentialProvider;
use crate::error::{ClientError, Result};
use crate::models::{MatchId, MatchSnapshot};
use crate::stomp::{self, Command, Frame, FrameDecoder, Incoming};

// --- TRANSPORT SEAM ---

/// A connected, text-oriented duplex pipe.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, text: String) -> Result<()>;
    /// `None` once the peer closed the connection.
    async fn recv(&mut self) -> Option<Result<String>>;
    async fn close(&mut self) -> Result<()>;
}

/// Opens a fresh transport for every (re)connect attempt.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>>;
}

pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>> {
        let (stream, _response) = connect_async(url).await?;
        Ok(Box::new(WsTransport { stream }))
    }
}

pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, text: String) -> Result<()> {
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(bytes)) => {
                    return Some(Ok(String::from_utf8_lossy(&bytes).into_owned()))
                }
                Ok(Message::Close(_)) => return None,
                // Pings are answered by tungstenite itself.
                Ok(_) => continue,
                Err(err) => return Some(Err(err.into())),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}

// --- EVENTS ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Identity of one channel instance. Events carry it so a consumer can
/// drop anything emitted by a channel it has already replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(u64);

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

impl ChannelId {
    fn next() -> Self {
        ChannelId(NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch-{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub enum ChannelEventKind {
    State(ConnectionState),
    Snapshot(Box<MatchSnapshot>),
    /// A MESSAGE frame whose body did not decode as a snapshot.
    Malformed(String),
}

#[derive(Debug, Clone)]
pub struct ChannelEvent {
    pub channel: ChannelId,
    pub kind: ChannelEventKind,
}

// --- HANDLE ---

pub struct MatchSyncChannel {
    id: ChannelId,
    match_id: MatchId,
    live: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_timeout: Duration,
}

impl MatchSyncChannel {
    /// Spawns the channel task and returns its handle plus the event stream.
    #[must_use = "the event receiver must be used to receive snapshots"]
    pub fn connect(
        match_id: MatchId,
        credentials: Arc<dyn CredentialProvider>,
        connector: Arc<dyn Connector>,
        config: &ClientConfig,
    ) -> (Self, mpsc::Receiver<ChannelEvent>) {
        let id = ChannelId::next();
        let (events_tx, events_rx) = mpsc::channel(config.event_channel_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let live = Arc::new(AtomicBool::new(false));
        let url = config.ws_url();

        let worker = ChannelTask {
            id,
            match_id,
            host: host_of(&url).to_string(),
            url,
            credentials,
            connector,
            events: events_tx,
            live: live.clone(),
            heartbeat: config.heartbeat(),
            reconnect_delay: config.reconnect_delay(),
            connect_timeout: config.connect_timeout(),
            max_frame: config.max_frame_bytes,
        };
        let task = tokio::spawn(worker.run(shutdown_rx));

        let channel = Self {
            id,
            match_id,
            live,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout(),
        };
        (channel, events_rx)
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    /// True while subscribed and receiving.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Sends DISCONNECT, closes the socket and waits for the task to end.
    /// A task that does not finish within the shutdown timeout is aborted.
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(mut task) = self.task.take() {
            match timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => warn!(channel = %self.id, "channel task failed: {join_err}"),
                Err(_) => {
                    warn!(channel = %self.id, "channel task did not stop in time; aborting");
                    task.abort();
                    let _ = task.await;
                }
            }
        }
        self.live.store(false, Ordering::Release);
        debug!(channel = %self.id, match_id = self.match_id, "channel torn down");
    }
}

impl fmt::Debug for MatchSyncChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchSyncChannel")
            .field("id", &self.id)
            .field("match_id", &self.match_id)
            .field("live", &self.is_live())
            .finish()
    }
}

impl Drop for MatchSyncChannel {
    fn drop(&mut self) {
        // No executor here to run a graceful close; just stop the task.
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.live.store(false, Ordering::Release);
    }
}

// --- BACKGROUND TASK ---

enum SessionEnd {
    Shutdown,
    Lost(ClientError),
}

struct ChannelTask {
    id: ChannelId,
    match_id: MatchId,
    url: String,
    host: String,
    credentials: Arc<dyn CredentialProvider>,
    connector: Arc<dyn Connector>,
    events: mpsc::Sender<ChannelEvent>,
    live: Arc<AtomicBool>,
    heartbeat: Duration,
    reconnect_delay: Duration,
    connect_timeout: Duration,
    max_frame: usize,
}

impl ChannelTask {
    async fn run(self, mut shutdown_rx: oneshot::Receiver<()>) {
        loop {
            if !self.set_state(ConnectionState::Connecting).await {
                return;
            }
            let end = self.session(&mut shutdown_rx).await;
            self.live.store(false, Ordering::Release);
            match end {
                SessionEnd::Shutdown => return,
                SessionEnd::Lost(err) => {
                    warn!(channel = %self.id, match_id = self.match_id, error = %err, "push channel down");
                    if !self.set_state(ConnectionState::Disconnected).await {
                        return;
                    }
                }
            }
            tokio::select! {
                _ = &mut shutdown_rx => return,
                _ = sleep(self.reconnect_delay) => {}
            }
        }
    }

    /// One connection attempt, from socket open to loss or shutdown.
    async fn session(&self, shutdown: &mut oneshot::Receiver<()>) -> SessionEnd {
        let mut transport = tokio::select! {
            _ = &mut *shutdown => return SessionEnd::Shutdown,
            opened = timeout(self.connect_timeout, self.connector.connect(&self.url)) => match opened {
                Ok(Ok(transport)) => transport,
                Ok(Err(err)) => return SessionEnd::Lost(err),
                Err(_) => return SessionEnd::Lost(ClientError::NotConnected),
            },
        };

        let mut backlog = None;
        let outcome = tokio::select! {
            _ = &mut *shutdown => None,
            result = self.drive(transport.as_mut(), &mut backlog) => Some(result),
        };
        match outcome {
            // Shutdown requested, or nobody is listening any more.
            None | Some(Ok(())) => {
                let _ = transport.send(stomp::disconnect().encode()).await;
                let _ = transport.close().await;
                SessionEnd::Shutdown
            }
            Some(Err(err)) => {
                let _ = transport.close().await;
                // The last push seen still goes out ahead of `Disconnected`.
                if let Some(kind) = backlog.take() {
                    if !self.deliver(kind).await {
                        return SessionEnd::Shutdown;
                    }
                }
                SessionEnd::Lost(err)
            }
        }
    }

    /// Handshake, subscribe, then pump frames until something breaks.
    /// `Ok(())` means the event receiver was dropped.
    ///
    /// When the consumer lags, the newest push waits in `backlog`, replacing
    /// any older one that has not been delivered yet.
    async fn drive(
        &self,
        transport: &mut dyn Transport,
        backlog: &mut Option<ChannelEventKind>,
    ) -> Result<()> {
        let token = self.credentials.access_token();
        transport
            .send(stomp::connect(&self.host, token.as_deref(), self.heartbeat).encode())
            .await?;

        let mut decoder = FrameDecoder::with_limit(self.max_frame);
        let connected = timeout(
            self.connect_timeout,
            wait_for_connected(transport, &mut decoder),
        )
        .await
        .map_err(|_| ClientError::NotConnected)??;
        let heartbeat = stomp::negotiate_heartbeat(self.heartbeat, connected.get("heart-beat"));

        let subscription = format!("sub-{}", self.id.0);
        transport
            .send(stomp::subscribe(&subscription, &stomp::match_topic(self.match_id)).encode())
            .await?;

        self.live.store(true, Ordering::Release);
        info!(channel = %self.id, match_id = self.match_id, "push channel connected");
        if !self.set_state(ConnectionState::Connected).await {
            return Ok(());
        }

        let mut beat = heartbeat
            .outgoing
            .map(|period| interval_at(Instant::now() + period, period));
        let mut last_seen = Instant::now();

        loop {
            while let Some(item) = decoder.next_item()? {
                if let Incoming::Frame(frame) = item {
                    if let Some(kind) = self.on_frame(frame)? {
                        if !self.emit(kind, backlog) {
                            return Ok(());
                        }
                    }
                }
            }

            // Silence for twice the agreed period means the peer is gone.
            let deadline = heartbeat.incoming.map(|period| last_seen + period * 2);
            tokio::select! {
                permit = self.events.reserve(), if backlog.is_some() => match (permit, backlog.take()) {
                    (Ok(permit), Some(kind)) => permit.send(ChannelEvent { channel: self.id, kind }),
                    (Ok(_), None) => {}
                    (Err(_), _) => return Ok(()),
                },
                _ = tick(&mut beat) => {
                    transport.send("\n".to_string()).await?;
                }
                _ = wait_until(deadline) => {
                    return Err(ClientError::HeartbeatTimeout);
                }
                incoming = transport.recv() => match incoming {
                    Some(Ok(text)) => {
                        last_seen = Instant::now();
                        decoder.push(text.as_bytes());
                    }
                    Some(Err(err)) => return Err(err),
                    None => return Err(ClientError::NotConnected),
                },
            }
        }
    }

    /// The event a frame turns into, if any. An ERROR frame ends the session.
    fn on_frame(&self, frame: Frame) -> Result<Option<ChannelEventKind>> {
        match frame.command {
            Command::Message => {
                let kind = match serde_json::from_str::<MatchSnapshot>(&frame.body) {
                    Ok(snapshot) => ChannelEventKind::Snapshot(Box::new(snapshot)),
                    Err(err) => {
                        warn!(channel = %self.id, error = %err, "dropping malformed snapshot");
                        ChannelEventKind::Malformed(err.to_string())
                    }
                };
                Ok(Some(kind))
            }
            Command::Error => Err(ClientError::Stomp(error_text(&frame))),
            other => {
                debug!(channel = %self.id, command = %other, "ignoring frame");
                Ok(None)
            }
        }
    }

    /// Queues a push without waiting. A full queue parks it in `backlog`;
    /// while something is parked, newer pushes replace it so they never
    /// overtake it. Returns `false` once the receiver has gone away.
    fn emit(&self, kind: ChannelEventKind, backlog: &mut Option<ChannelEventKind>) -> bool {
        if backlog.is_some() {
            debug!(channel = %self.id, "consumer lagging, keeping only the newest push");
            *backlog = Some(kind);
            return true;
        }
        let event = ChannelEvent {
            channel: self.id,
            kind,
        };
        match self.events.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                *backlog = Some(event.kind);
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    async fn deliver(&self, kind: ChannelEventKind) -> bool {
        self.events
            .send(ChannelEvent {
                channel: self.id,
                kind,
            })
            .await
            .is_ok()
    }

    /// State changes are never dropped.
    async fn set_state(&self, state: ConnectionState) -> bool {
        debug!(channel = %self.id, ?state, "channel state");
        self.deliver(ChannelEventKind::State(state)).await
    }
}

async fn wait_for_connected(
    transport: &mut dyn Transport,
    decoder: &mut FrameDecoder,
) -> Result<Frame> {
    loop {
        while let Some(item) = decoder.next_item()? {
            match item {
                Incoming::Frame(frame) if frame.command == Command::Connected => return Ok(frame),
                Incoming::Frame(frame) if frame.command == Command::Error => {
                    return Err(ClientError::Stomp(error_text(&frame)))
                }
                _ => {}
            }
        }
        match transport.recv().await {
            Some(Ok(text)) => decoder.push(text.as_bytes()),
            Some(Err(err)) => return Err(err),
            None => return Err(ClientError::NotConnected),
        }
    }
}

fn error_text(frame: &Frame) -> String {
    match frame.get("message") {
        Some(message) if !message.is_empty() => message.to_string(),
        _ => frame.body.trim().to_string(),
    }
}

async fn tick(beat: &mut Option<Interval>) {
    match beat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

/// Host part of a ws:// URL, for the STOMP `host` header.
fn host_of(url: &str) -> &str {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    let authority = rest.split('/').next().unwrap_or(rest);
    authority.split(':').next().unwrap_or(authority)
}

// --- TEST DOUBLES ---

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    pub const SNAPSHOT: &str = r#"{"id":42,"player1Id":1,"player2Id":2,"status":"IN_PROGRESS"}"#;

    /// Server side of one scripted connection.
    pub(crate) struct Peer {
        pub to_client: mpsc::UnboundedSender<String>,
        pub from_client: mpsc::UnboundedReceiver<String>,
    }

    impl Peer {
        /// Next non-heartbeat frame the client sent.
        pub async fn frame(&mut self) -> String {
            loop {
                let text = self.from_client.recv().await.unwrap();
                if text != "\n" {
                    return text;
                }
            }
        }

        pub fn send(&self, raw: &str) {
            self.to_client.send(raw.to_string()).unwrap();
        }

        pub async fn accept(&mut self, heartbeat: &str) {
            let connect = self.frame().await;
            assert!(connect.starts_with("CONNECT\n"));
            self.send(&format!("CONNECTED\nversion:1.2\nheart-beat:{}\n\n\0", heartbeat));
            let subscribe = self.frame().await;
            assert!(subscribe.contains("destination:/topic/match/42\n"));
        }

        pub fn push(&self, body: &str) {
            self.send(&format!(
                "MESSAGE\ndestination:/topic/match/42\nsubscription:sub-1\n\n{}\0",
                body
            ));
        }
    }

    struct MockTransport {
        inbound: mpsc::UnboundedReceiver<String>,
        outbound: mpsc::UnboundedSender<String>,
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&mut self, text: String) -> Result<()> {
            self.outbound.send(text).map_err(|_| ClientError::NotConnected)
        }

        async fn recv(&mut self) -> Option<Result<String>> {
            self.inbound.recv().await.map(Ok)
        }

        async fn close(&mut self) -> Result<()> {
            self.inbound.close();
            Ok(())
        }
    }

    /// Hands out one prepared transport per attempt and records when each
    /// attempt happened. Runs dry with a connect error.
    #[derive(Default)]
    pub(crate) struct MockConnector {
        ready: Mutex<VecDeque<MockTransport>>,
        attempts: Mutex<Vec<Instant>>,
    }

    impl MockConnector {
        pub fn peer(&self) -> Peer {
            let (to_client, inbound) = mpsc::unbounded_channel();
            let (outbound, from_client) = mpsc::unbounded_channel();
            self.ready
                .lock()
                .unwrap()
                .push_back(MockTransport { inbound, outbound });
            Peer {
                to_client,
                from_client,
            }
        }

        pub fn attempts(&self) -> Vec<Instant> {
            self.attempts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        async fn connect(&self, _url: &str) -> Result<Box<dyn Transport>> {
            self.attempts.lock().unwrap().push(Instant::now());
            match self.ready.lock().unwrap().pop_front() {
                Some(t) => Ok(Box::new(t)),
                None => Err(ClientError::NotConnected),
            }
        }
    }

    impl ChannelId {
        pub(crate) fn fake(n: u64) -> Self {
            ChannelId(n)
        }
    }
}

// --- TESTS ---

#[cfg(test)]
mod tests {
    use super::testing::{MockConnector, SNAPSHOT};
    use super::*;
    use crate::credentials::TokenStore;

    fn open(connector: Arc<MockConnector>) -> (MatchSyncChannel, mpsc::Receiver<ChannelEvent>) {
        open_with(connector, &ClientConfig::default())
    }

    fn open_with(
        connector: Arc<MockConnector>,
        config: &ClientConfig,
    ) -> (MatchSyncChannel, mpsc::Receiver<ChannelEvent>) {
        let creds = Arc::new(TokenStore::new("abc", None));
        MatchSyncChannel::connect(42, creds, connector, config)
    }

    async fn next_snapshot(rx: &mut mpsc::Receiver<ChannelEvent>) -> MatchSnapshot {
        match next_kind(rx).await {
            ChannelEventKind::Snapshot(snap) => *snap,
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    async fn next_kind(rx: &mut mpsc::Receiver<ChannelEvent>) -> ChannelEventKind {
        rx.recv().await.unwrap().kind
    }

    async fn expect_state(rx: &mut mpsc::Receiver<ChannelEvent>, want: ConnectionState) {
        match next_kind(rx).await {
            ChannelEventKind::State(s) => assert_eq!(s, want),
            other => panic!("expected {:?}, got {:?}", want, other),
        }
    }

    #[tokio::test]
    async fn handshake_subscribe_and_forward_snapshots() {
        let connector = Arc::new(MockConnector::default());
        let mut peer = connector.peer();
        let (channel, mut rx) = open(connector.clone());

        expect_state(&mut rx, ConnectionState::Connecting).await;
        let connect = peer.frame().await;
        assert!(connect.contains("token:abc\n"));
        assert!(connect.contains("heart-beat:10000,10000\n"));
        peer.send("CONNECTED\nversion:1.2\nheart-beat:0,0\n\n\0");
        let subscribe = peer.frame().await;
        assert!(subscribe.starts_with("SUBSCRIBE\n"));
        assert!(subscribe.contains("destination:/topic/match/42\n"));
        expect_state(&mut rx, ConnectionState::Connected).await;
        assert!(channel.is_live());

        peer.push(SNAPSHOT);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.channel, channel.id());
        match event.kind {
            ChannelEventKind::Snapshot(snap) => assert_eq!(snap.id, 42),
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn malformed_push_is_reported_and_channel_stays_up() {
        let connector = Arc::new(MockConnector::default());
        let mut peer = connector.peer();
        let (channel, mut rx) = open(connector.clone());

        expect_state(&mut rx, ConnectionState::Connecting).await;
        peer.accept("0,0").await;
        expect_state(&mut rx, ConnectionState::Connected).await;

        peer.push("{not json");
        assert!(matches!(next_kind(&mut rx).await, ChannelEventKind::Malformed(_)));
        peer.push(SNAPSHOT);
        assert!(matches!(next_kind(&mut rx).await, ChannelEventKind::Snapshot(_)));
        assert!(channel.is_live());
    }

    #[tokio::test(start_paused = true)]
    async fn lagging_consumer_still_gets_the_newest_push() {
        use crate::models::MatchStatus;

        let connector = Arc::new(MockConnector::default());
        let mut peer = connector.peer();
        let config = ClientConfig {
            event_channel_capacity: 1,
            ..ClientConfig::default()
        };
        let (channel, mut rx) = open_with(connector.clone(), &config);

        expect_state(&mut rx, ConnectionState::Connecting).await;
        peer.accept("0,0").await;
        expect_state(&mut rx, ConnectionState::Connected).await;

        // Nobody reads while three pushes arrive. The first fills the queue,
        // the second is superseded by the third (the match just ended).
        peer.push(SNAPSHOT);
        peer.push(r#"{"id":42,"player1Id":1,"player2Id":2,"status":"IN_PROGRESS","currentTurnPlayerId":2}"#);
        peer.push(r#"{"id":42,"player1Id":1,"player2Id":2,"status":"FINISHED","winnerId":1}"#);
        tokio::time::sleep(Duration::from_millis(700)).await;

        let first = next_snapshot(&mut rx).await;
        assert_eq!(first.status, MatchStatus::InProgress);
        assert_eq!(first.current_turn_player_id, None);
        let last = next_snapshot(&mut rx).await;
        assert_eq!(last.status, MatchStatus::Finished);
        assert_eq!(last.winner_id, Some(1));

        tokio::time::sleep(Duration::from_millis(700)).await;
        assert!(rx.try_recv().is_err());
        assert!(channel.is_live());
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_frame_drops_the_connection() {
        let connector = Arc::new(MockConnector::default());
        let mut peer = connector.peer();
        let config = ClientConfig {
            max_frame_bytes: 256,
            ..ClientConfig::default()
        };
        let (channel, mut rx) = open_with(connector.clone(), &config);

        expect_state(&mut rx, ConnectionState::Connecting).await;
        peer.accept("0,0").await;
        expect_state(&mut rx, ConnectionState::Connected).await;

        peer.send("MESSAGE\ndestination:/topic/match/42\ncontent-length:18446744073709551615\n\n{");
        expect_state(&mut rx, ConnectionState::Disconnected).await;
        assert!(!channel.is_live());
        // And it comes back around to reconnect.
        expect_state(&mut rx, ConnectionState::Connecting).await;
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_after_fixed_delay() {
        let connector = Arc::new(MockConnector::default());
        let mut first = connector.peer();
        let mut second = connector.peer();
        let (channel, mut rx) = open(connector.clone());

        expect_state(&mut rx, ConnectionState::Connecting).await;
        first.accept("0,0").await;
        expect_state(&mut rx, ConnectionState::Connected).await;

        // Server drops the connection.
        drop(first);
        expect_state(&mut rx, ConnectionState::Disconnected).await;
        assert!(!channel.is_live());

        expect_state(&mut rx, ConnectionState::Connecting).await;
        second.accept("0,0").await;
        expect_state(&mut rx, ConnectionState::Connected).await;

        let attempts = connector.attempts();
        assert_eq!(attempts.len(), 2);
        // The first session dropped at once, so the gap is the retry delay.
        assert!(attempts[1] - attempts[0] >= Duration::from_millis(5000));
        assert!(channel.is_live());
    }

    #[tokio::test(start_paused = true)]
    async fn silent_server_is_declared_dead() {
        let connector = Arc::new(MockConnector::default());
        let mut peer = connector.peer();
        let (_channel, mut rx) = open(connector.clone());

        expect_state(&mut rx, ConnectionState::Connecting).await;
        peer.accept("10000,10000").await;
        expect_state(&mut rx, ConnectionState::Connected).await;
        let connected_at = Instant::now();

        // Nothing from the server from here on; our own heartbeats keep going.
        expect_state(&mut rx, ConnectionState::Disconnected).await;
        assert!(Instant::now() - connected_at >= Duration::from_millis(20_000));
        let beats = std::iter::from_fn(|| peer.from_client.try_recv().ok())
            .filter(|t| t == "\n")
            .count();
        assert!(beats >= 1);
    }

    #[tokio::test]
    async fn error_frame_during_handshake_forces_retry() {
        let connector = Arc::new(MockConnector::default());
        let mut peer = connector.peer();
        let (_channel, mut rx) = open(connector.clone());

        expect_state(&mut rx, ConnectionState::Connecting).await;
        peer.frame().await;
        peer.send("ERROR\nmessage:Invalid token\n\n\0");
        expect_state(&mut rx, ConnectionState::Disconnected).await;
    }

    #[tokio::test]
    async fn shutdown_disconnects_and_silences_the_channel() {
        let connector = Arc::new(MockConnector::default());
        let mut peer = connector.peer();
        let (mut channel, mut rx) = open(connector.clone());

        expect_state(&mut rx, ConnectionState::Connecting).await;
        peer.accept("0,0").await;
        expect_state(&mut rx, ConnectionState::Connected).await;

        channel.shutdown().await;
        assert!(!channel.is_live());
        assert_eq!(peer.frame().await, "DISCONNECT\n\n\0");

        // A late push after teardown never reaches the consumer.
        let _ = peer.to_client.send(format!("MESSAGE\n\n{}\0", SNAPSHOT));
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn host_header_comes_from_url() {
        assert_eq!(host_of("ws://localhost:8080/ws/websocket"), "localhost");
        assert_eq!(host_of("wss://cards.example/ws/websocket"), "cards.example");
    }
}
