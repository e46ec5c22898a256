//! Websocket push channel for one user.
//!
//! The notifier keeps a single connection to `/ws/users/{id}/` open,
//! reconnecting with a Fibonacci backoff. Incoming `{"command": ...}` messages
//! are routed to registered handlers; each command is debounced on its own,
//! so a burst of pushes runs its handler once.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use omix_core::{ClientConfig, OmixError, Result};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::backoff::FibonacciBackoff;
use crate::debounce::{sleep_until_deadline, Debouncer};
use crate::http::session_cookie;

/// Command pushed when the experiment list changed.
pub const UPDATE_EXPERIMENTS: &str = "update_experiments";

type Handler = Arc<dyn Fn() + Send + Sync>;
type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Deserialize)]
struct PushMessage {
    command: String,
}

/// Extracts the `command` of a pushed message; `None` if it is malformed.
pub fn parse_command(text: &str) -> Option<String> {
    serde_json::from_str::<PushMessage>(text)
        .ok()
        .map(|m| m.command)
}

pub struct Notifier {
    url: Url,
    cookie: Option<String>,
    handlers: HashMap<String, Handler>,
    debounce: Duration,
    backoff_unit: Duration,
    max_backoff: Duration,
}

impl Notifier {
    pub fn new(config: &ClientConfig, user_id: u64) -> Result<Self> {
        Ok(Self {
            url: config.websocket_url(user_id)?,
            cookie: session_cookie(config),
            handlers: HashMap::new(),
            debounce: config.debounce(),
            backoff_unit: Duration::from_secs(1),
            max_backoff: Duration::from_secs(config.reconnect.max_delay_secs),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Registers the handler for `command`, replacing any previous one.
    pub fn on<F>(mut self, command: impl Into<String>, handler: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.handlers.insert(command.into(), Arc::new(handler));
        self
    }

    /// Base unit of the reconnect backoff.
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// Runs until `token` is cancelled.
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(token))
    }

    pub async fn run(self, token: CancellationToken) {
        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = tokio::spawn(dispatch_commands(
            rx,
            self.handlers.clone(),
            self.debounce,
            token.clone(),
        ));

        let mut backoff = FibonacciBackoff::new(self.backoff_unit, self.max_backoff);
        loop {
            let connected = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                res = self.connect() => res,
            };
            match connected {
                Ok(socket) => {
                    info!(url = %self.url, "Notifier connected");
                    backoff.reset();
                    read_messages(socket, &tx, &token).await;
                    if token.is_cancelled() {
                        break;
                    }
                    info!("Notifier connection closed");
                }
                Err(e) => warn!(url = %self.url, error = %e, "Notifier connection failed"),
            }

            let delay = backoff.next_delay();
            debug!(delay_ms = delay.as_millis() as u64, "Reconnecting notifier");
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        drop(tx);
        let _ = dispatcher.await;
        debug!("Notifier stopped");
    }

    async fn connect(&self) -> Result<Socket> {
        let mut request: Request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| OmixError::Network(e.to_string()))?;
        if let Some(cookie) = &self.cookie {
            let value = HeaderValue::from_str(cookie)
                .map_err(|_| OmixError::Config("invalid session cookie".into()))?;
            request.headers_mut().insert("Cookie", value);
        }
        let (socket, _) = connect_async(request)
            .await
            .map_err(|e| OmixError::Network(e.to_string()))?;
        Ok(socket)
    }
}

/// Reads until the socket closes, errors or `token` fires.
async fn read_messages(
    mut socket: Socket,
    commands: &mpsc::UnboundedSender<String>,
    token: &CancellationToken,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => {
                let _ = socket.close(None).await;
                return;
            }
            next = socket.next() => next,
        };
        match next {
            Some(Ok(Message::Text(text))) => match parse_command(text.as_str()) {
                Some(command) => {
                    let _ = commands.send(command);
                }
                None => warn!(message = %text.as_str(), "Dropping malformed push message"),
            },
            Some(Ok(Message::Close(_))) | None => return,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!(error = %e, "Notifier read failed");
                return;
            }
        }
    }
}

async fn dispatch_commands(
    mut commands: mpsc::UnboundedReceiver<String>,
    handlers: HashMap<String, Handler>,
    quiet: Duration,
    token: CancellationToken,
) {
    let mut debouncer = Debouncer::new(quiet);
    loop {
        let deadline = debouncer.next_deadline();
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            command = commands.recv() => {
                let Some(command) = command else { break };
                if handlers.contains_key(&command) {
                    debouncer.trigger(command, Instant::now());
                } else {
                    debug!(command = %command, "Ignoring unknown command");
                }
            }
            _ = sleep_until_deadline(deadline) => {
                for command in debouncer.take_due(Instant::now()) {
                    if let Some(handler) = handlers.get(&command) {
                        debug!(command = %command, "Running command handler");
                        handler();
                    }
                }
            }
        }
    }
}
