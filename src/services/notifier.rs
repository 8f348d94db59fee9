//! Realtime notifier
//!
//! Holds the single push subscription of a mounted dashboard. Inbound
//! `ReceiveBookUpdate` invocations are forwarded as [`HubEvent`]s; they carry
//! no data the client relies on and only mean "refetch". Local mutations are
//! announced to other sessions through [`UpdateBroadcaster::broadcast`].
//!
//! Connection lifecycle:
//! `Disconnected -> Connecting -> Connected -> (Reconnecting -> Connected)* -> Disconnected`
//!
//! The initial connection is not retried. Once connected, a dropped socket is
//! retried on the standard schedule (0s, 2s, 10s, 30s) before giving up.
//! Missed events are not replayed after a reconnect.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use super::hub_protocol::{self, HubMessage};
use crate::domain::{ClientError, UpdateBroadcaster};
use crate::infrastructure::config::Config;

pub const RECEIVE_BOOK_UPDATE: &str = "ReceiveBookUpdate";
pub const NOTIFY_BOOK_UPDATE: &str = "NotifyBookUpdate";

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

type HubSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Invalidation signal received from the hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubEvent {
    pub target: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct NotifierOptions {
    pub hub_url: String,
    pub skip_negotiation: bool,
    /// Delay before each reconnect attempt; its length is the attempt budget
    pub retry_delays: Vec<Duration>,
    pub keep_alive: Duration,
}

impl NotifierOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            hub_url: config.hub_url.clone(),
            skip_negotiation: config.hub_skip_negotiation,
            retry_delays: default_retry_delays(),
            keep_alive: KEEP_ALIVE_INTERVAL,
        }
    }
}

pub fn default_retry_delays() -> Vec<Duration> {
    [0, 2, 10, 30].into_iter().map(Duration::from_secs).collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NegotiateResponse {
    connection_id: Option<String>,
    connection_token: Option<String>,
    #[serde(default)]
    available_transports: Vec<AvailableTransport>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AvailableTransport {
    transport: String,
}

/// Where and as whom to connect
struct HubEndpoint {
    options: NotifierOptions,
    token: String,
    http: reqwest::Client,
}

impl HubEndpoint {
    async fn socket_url(&self) -> Result<Url, ClientError> {
        let mut url = Url::parse(&self.options.hub_url)?;

        if !self.options.skip_negotiation {
            let connection = self.negotiate(&url).await?;
            url.query_pairs_mut().append_pair("id", &connection);
        }
        url.query_pairs_mut().append_pair("access_token", &self.token);

        let scheme = match url.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => other,
        }
        .to_string();
        url.set_scheme(&scheme)
            .map_err(|_| ClientError::Config(format!("Cannot use scheme {} for the hub", scheme)))?;

        Ok(url)
    }

    async fn negotiate(&self, hub: &Url) -> Result<String, ClientError> {
        let mut url = hub.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Config("Hub URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push("negotiate");
        url.query_pairs_mut().append_pair("negotiateVersion", "1");

        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }
        if !status.is_success() {
            return Err(ClientError::Subscription(format!(
                "Negotiation failed with status {}",
                status
            )));
        }

        let body = resp.text().await?;
        let negotiation: NegotiateResponse = serde_json::from_str(&body)?;

        if let Some(error) = negotiation.error {
            return Err(ClientError::Subscription(error));
        }
        if !negotiation
            .available_transports
            .iter()
            .any(|t| t.transport == "WebSockets")
        {
            return Err(ClientError::Subscription(
                "Server does not offer WebSockets".to_string(),
            ));
        }

        negotiation
            .connection_token
            .or(negotiation.connection_id)
            .ok_or_else(|| ClientError::Subscription("Negotiation returned no connection id".into()))
    }
}

/// Open the socket and complete the hub handshake. Records that arrived in the
/// same frame as the handshake reply are handed back for dispatch.
async fn connect(endpoint: &HubEndpoint) -> Result<(HubSocket, Vec<String>), ClientError> {
    let url = endpoint.socket_url().await?;

    let mut request = url.as_str().into_client_request()?;
    let bearer = HeaderValue::from_str(&format!("Bearer {}", endpoint.token))
        .map_err(|e| ClientError::Subscription(format!("Invalid token header: {}", e)))?;
    request.headers_mut().insert(AUTHORIZATION, bearer);

    let (mut socket, _response) = connect_async(request).await?;
    socket
        .send(Message::Text(hub_protocol::handshake_request()))
        .await?;

    loop {
        match socket.next().await {
            Some(Ok(Message::Text(text))) => {
                let mut records = hub_protocol::split_records(&text);
                let Some(reply) = records.next() else {
                    continue;
                };
                hub_protocol::parse_handshake(reply)?;
                let pending = records.map(str::to_string).collect();
                return Ok((socket, pending));
            }
            Some(Ok(Message::Close(_))) | None => {
                return Err(ClientError::Subscription(
                    "Connection closed during handshake".to_string(),
                ));
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

enum PumpExit {
    Shutdown,
    Dropped(String),
    Closed {
        error: Option<String>,
        allow_reconnect: bool,
    },
}

/// Background side of a live subscription
struct HubSession {
    endpoint: Arc<HubEndpoint>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    events: mpsc::UnboundedSender<HubEvent>,
    outbound_rx: mpsc::UnboundedReceiver<String>,
    shutdown_rx: watch::Receiver<bool>,
}

impl HubSession {
    async fn run(mut self, socket: HubSocket, pending: Vec<String>) {
        let mut socket = socket;
        self.dispatch_records(pending.iter().map(String::as_str));

        loop {
            let exit = self.pump(&mut socket).await;
            match exit {
                PumpExit::Shutdown => {
                    if let Err(e) = socket.close(None).await {
                        tracing::debug!("Closing hub socket: {}", e);
                    }
                    break;
                }
                PumpExit::Closed {
                    error,
                    allow_reconnect: false,
                } => {
                    tracing::warn!("SignalR connection closed by server: {:?}", error);
                    break;
                }
                PumpExit::Closed { error, .. } => {
                    tracing::warn!("⚠️ SignalR connection closed, reconnecting: {:?}", error);
                }
                PumpExit::Dropped(reason) => {
                    tracing::warn!("⚠️ SignalR connection lost: {}", reason);
                }
            }

            self.state_tx.send_replace(ConnectionState::Reconnecting);
            let discarded = self.discard_queued();
            if discarded > 0 {
                tracing::warn!("Dropped {} message(s) queued for the lost connection", discarded);
            }

            match self.reconnect().await {
                Some((fresh, pending)) => {
                    socket = fresh;
                    self.dispatch_records(pending.iter().map(String::as_str));
                }
                None => break,
            }
        }

        self.state_tx.send_replace(ConnectionState::Disconnected);
        tracing::info!("SignalR subscription ended");
    }

    async fn pump(&mut self, socket: &mut HubSocket) -> PumpExit {
        let mut keep_alive = tokio::time::interval(self.endpoint.options.keep_alive);
        keep_alive.tick().await;

        loop {
            tokio::select! {
                _ = async { let _ = self.shutdown_rx.wait_for(|stop| *stop).await; } => return PumpExit::Shutdown,
                Some(frame) = self.outbound_rx.recv() => {
                    if let Err(e) = socket.send(Message::Text(frame)).await {
                        tracing::error!("SignalR invoke error: {}", e);
                        return PumpExit::Dropped(e.to_string());
                    }
                }
                _ = keep_alive.tick() => {
                    if let Err(e) = socket.send(Message::Text(hub_protocol::ping())).await {
                        return PumpExit::Dropped(e.to_string());
                    }
                }
                incoming = socket.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        for record in hub_protocol::split_records(&text) {
                            match hub_protocol::parse_message(record) {
                                Ok(HubMessage::Close { error, allow_reconnect }) => {
                                    return PumpExit::Closed { error, allow_reconnect };
                                }
                                Ok(message) => self.dispatch(message),
                                Err(e) => tracing::warn!("Ignoring malformed hub message: {}", e),
                            }
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        return PumpExit::Dropped(format!("socket closed: {:?}", frame));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return PumpExit::Dropped(e.to_string()),
                    None => return PumpExit::Dropped("stream ended".to_string()),
                },
            }
        }
    }

    async fn reconnect(&mut self) -> Option<(HubSocket, Vec<String>)> {
        let delays = self.endpoint.options.retry_delays.clone();

        for (attempt, delay) in delays.into_iter().enumerate() {
            self.state_tx.send_replace(ConnectionState::Reconnecting);

            let endpoint = Arc::clone(&self.endpoint);
            let result = tokio::select! {
                _ = self.shutdown_rx.wait_for(|stop| *stop) => return None,
                result = async move {
                    tokio::time::sleep(delay).await;
                    connect(&endpoint).await
                } => result,
            };

            match result {
                Ok(connection) => {
                    self.state_tx.send_replace(ConnectionState::Connected);
                    tracing::info!("SignalR reconnected (attempt {})", attempt + 1);
                    return Some(connection);
                }
                Err(e) => tracing::warn!("Reconnect attempt {} failed: {}", attempt + 1, e),
            }
        }

        tracing::error!("❌ SignalR reconnect attempts exhausted");
        None
    }

    /// Outbound frames are only valid for the socket they were queued for
    fn discard_queued(&mut self) -> usize {
        let mut discarded = 0;
        while self.outbound_rx.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }

    fn dispatch_records<'a>(&self, records: impl Iterator<Item = &'a str>) {
        for record in records {
            match hub_protocol::parse_message(record) {
                Ok(message) => self.dispatch(message),
                Err(e) => tracing::warn!("Ignoring malformed hub message: {}", e),
            }
        }
    }

    fn dispatch(&self, message: HubMessage) {
        match message {
            HubMessage::Invocation { target, arguments } if target == RECEIVE_BOOK_UPDATE => {
                let message = hub_protocol::first_argument_text(&arguments);
                tracing::info!("SignalR message received: {}", message);
                if self.events.send(HubEvent { target, message }).is_err() {
                    tracing::debug!("No listener for hub events");
                }
            }
            HubMessage::Invocation { target, .. } => {
                tracing::debug!("Ignoring hub method {}", target);
            }
            HubMessage::Ping | HubMessage::Close { .. } | HubMessage::Other(_) => {}
        }
    }
}

/// Owner of one push subscription
pub struct RealtimeNotifier {
    endpoint: Arc<HubEndpoint>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    outbound_tx: mpsc::UnboundedSender<String>,
    outbound_rx: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    shutdown_tx: watch::Sender<bool>,
    // Read at teardown, never captured at setup
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RealtimeNotifier {
    pub fn new(options: NotifierOptions, http: reqwest::Client, token: impl Into<String>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (shutdown_tx, _) = watch::channel(false);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        Self {
            endpoint: Arc::new(HubEndpoint {
                options,
                token: token.into(),
                http,
            }),
            state_tx: Arc::new(state_tx),
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            shutdown_tx,
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Connect and start delivering hub events to `events`.
    ///
    /// Fails when the first connection cannot be established; the caller is
    /// expected to log and carry on without realtime updates.
    pub async fn start(&self, events: mpsc::UnboundedSender<HubEvent>) -> Result<(), ClientError> {
        let mut task = self.task.lock().await;
        if task.is_some() {
            return Err(ClientError::InvalidState(
                "Subscription already started".to_string(),
            ));
        }

        let Some(outbound_rx) = self.outbound_rx.lock().await.take() else {
            return Err(ClientError::InvalidState(
                "Notifier has been shut down".to_string(),
            ));
        };

        // Subscribed before connecting so a shutdown issued mid-connect is seen
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        self.state_tx.send_replace(ConnectionState::Connecting);
        let connected = tokio::select! {
            _ = shutdown_rx.wait_for(|stop| *stop) => None,
            result = connect(&self.endpoint) => Some(result),
        };

        let (socket, pending) = match connected {
            None => {
                tracing::info!("SignalR shut down while connecting");
                self.state_tx.send_replace(ConnectionState::Disconnected);
                return Err(ClientError::InvalidState(
                    "Notifier has been shut down".to_string(),
                ));
            }
            Some(Ok(connection)) => connection,
            Some(Err(e)) => {
                tracing::error!("SignalR connection failed: {}", e);
                self.state_tx.send_replace(ConnectionState::Disconnected);
                *self.outbound_rx.lock().await = Some(outbound_rx);
                return Err(e);
            }
        };

        self.state_tx.send_replace(ConnectionState::Connected);
        tracing::info!("SignalR connected");

        let session = HubSession {
            endpoint: Arc::clone(&self.endpoint),
            state_tx: Arc::clone(&self.state_tx),
            events,
            outbound_rx,
            shutdown_rx,
        };
        *task = Some(tokio::spawn(session.run(socket, pending)));

        Ok(())
    }

    /// Tear the subscription down and wait for the background task to exit
    pub async fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);

        let handle = self.task.lock().await.take();
        match handle {
            Some(handle) => {
                if let Err(e) = handle.await {
                    tracing::warn!("SignalR task ended abnormally: {}", e);
                }
            }
            None => tracing::debug!("No active subscription to stop"),
        }

        self.state_tx.send_replace(ConnectionState::Disconnected);
    }
}

impl UpdateBroadcaster for RealtimeNotifier {
    fn broadcast(&self, method: &str, message: &str) {
        if self.state() != ConnectionState::Connected {
            tracing::warn!("SignalR connection not ready yet, not sending {}", method);
            return;
        }

        if self
            .outbound_tx
            .send(hub_protocol::invocation(method, &[message]))
            .is_err()
        {
            tracing::error!("SignalR invoke error: subscription task is gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(hub_url: &str, skip_negotiation: bool) -> HubEndpoint {
        HubEndpoint {
            options: NotifierOptions {
                hub_url: hub_url.to_string(),
                skip_negotiation,
                retry_delays: vec![],
                keep_alive: KEEP_ALIVE_INTERVAL,
            },
            token: "abc.def.ghi".to_string(),
            http: reqwest::Client::new(),
        }
    }

    #[tokio::test]
    async fn test_socket_url_without_negotiation() {
        let url = endpoint("https://localhost:7158/notificationHub", true)
            .socket_url()
            .await
            .unwrap();
        assert_eq!(
            url.as_str(),
            "wss://localhost:7158/notificationHub?access_token=abc.def.ghi"
        );

        let url = endpoint("http://127.0.0.1:5000/notificationHub", true)
            .socket_url()
            .await
            .unwrap();
        assert_eq!(url.scheme(), "ws");
    }

    #[tokio::test]
    async fn test_socket_url_after_negotiation() {
        use wiremock::matchers::{header, method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/notificationHub/negotiate"))
            .and(query_param("negotiateVersion", "1"))
            .and(header("authorization", "Bearer abc.def.ghi"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "negotiateVersion": 1,
                "connectionId": "conn-1",
                "connectionToken": "token-1",
                "availableTransports": [
                    { "transport": "WebSockets", "transferFormats": ["Text", "Binary"] },
                    { "transport": "LongPolling", "transferFormats": ["Text", "Binary"] }
                ]
            })))
            .mount(&mock_server)
            .await;

        let hub = format!("{}/notificationHub", mock_server.uri());
        let url = endpoint(&hub, false).socket_url().await.unwrap();

        assert_eq!(url.scheme(), "ws");
        assert_eq!(url.path(), "/notificationHub");
        assert_eq!(url.query(), Some("id=token-1&access_token=abc.def.ghi"));
    }

    #[tokio::test]
    async fn test_negotiation_without_websockets_fails() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/notificationHub/negotiate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "connectionId": "conn-1",
                "availableTransports": [{ "transport": "LongPolling" }]
            })))
            .mount(&mock_server)
            .await;

        let hub = format!("{}/notificationHub", mock_server.uri());
        assert!(matches!(
            endpoint(&hub, false).socket_url().await,
            Err(ClientError::Subscription(_))
        ));
    }

    #[test]
    fn test_default_retry_schedule() {
        assert_eq!(
            default_retry_delays(),
            vec![
                Duration::from_secs(0),
                Duration::from_secs(2),
                Duration::from_secs(10),
                Duration::from_secs(30),
            ]
        );
    }

    #[tokio::test]
    async fn test_broadcast_while_disconnected_is_dropped() {
        let notifier = RealtimeNotifier::new(
            endpoint("http://127.0.0.1:1/notificationHub", true).options,
            reqwest::Client::new(),
            "token",
        );
        assert_eq!(notifier.state(), ConnectionState::Disconnected);

        notifier.broadcast(NOTIFY_BOOK_UPDATE, "A book has been borrowed!");

        // Nothing was queued for a later connection
        let mut rx = notifier.outbound_rx.lock().await.take().unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_frames_for_a_lost_socket_are_discarded() {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events, _events_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(ConnectionState::Connected);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut session = HubSession {
            endpoint: Arc::new(endpoint("http://127.0.0.1:1/notificationHub", true)),
            state_tx: Arc::new(state_tx),
            events,
            outbound_rx,
            shutdown_rx,
        };

        outbound_tx
            .send(hub_protocol::invocation(NOTIFY_BOOK_UPDATE, &["first"]))
            .unwrap();
        outbound_tx
            .send(hub_protocol::invocation(NOTIFY_BOOK_UPDATE, &["second"]))
            .unwrap();

        assert_eq!(session.discard_queued(), 2);
        assert_eq!(session.discard_queued(), 0);

        // Frames queued after the drop still go out on the next socket
        outbound_tx
            .send(hub_protocol::invocation(NOTIFY_BOOK_UPDATE, &["third"]))
            .unwrap();
        assert!(session.outbound_rx.try_recv().is_ok());
    }
}
