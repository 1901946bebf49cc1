use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use tokio::{
    net::TcpStream,
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
    time::{sleep_until, Instant},
};
use tokio_tungstenite::{
    connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;

use crate::common::{
    constants::{ACK_TIMEOUT, MAX_REDEPLOY_ATTEMPTS, RECONNECT_BACKOFF},
    logger::Logger,
    utils::sleep_or_cancel,
};
use crate::core::token::Token;

/// Terminal outcome of one deployment attempt, sent to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentEvent {
    Deployed(Token),
    Failed(Token),
}

#[derive(Debug, Serialize)]
struct CreateTokenRequest<'a> {
    action: &'static str,
    name: &'a str,
    supply: u64,
    creator_wallet: String,
    trading_enabled: bool,
    liquidity_added: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum Ack {
    Success(String),
    Failure(String),
}

/// Inbound frames are only acks when they are JSON objects with a `status`.
fn parse_ack(text: &str) -> Option<Ack> {
    let json: Value = serde_json::from_str(text).ok()?;
    let status = json.get("status")?;
    if status.as_str() == Some("success") {
        match json.get("mint_address").and_then(Value::as_str) {
            Some(mint) if !mint.is_empty() => Some(Ack::Success(mint.to_string())),
            _ => Some(Ack::Failure(format!("success without mint_address: {}", json))),
        }
    } else {
        Some(Ack::Failure(json.to_string()))
    }
}

/// A live connection to the creation feed.
#[async_trait]
pub trait FeedConnection: Send {
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Next text frame. `None` means the connection is gone.
    async fn next_text(&mut self) -> Option<Result<String>>;
}

#[async_trait]
pub trait FeedConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn FeedConnection>>;
}

pub struct PumpPortalConnector {
    url: String,
}

impl PumpPortalConnector {
    pub fn new(url: impl Into<String>) -> Self {
        PumpPortalConnector { url: url.into() }
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct WsFeedConnection {
    write: SplitSink<WsStream, WsMessage>,
    read: SplitStream<WsStream>,
}

#[async_trait]
impl FeedConnector for PumpPortalConnector {
    async fn connect(&self) -> Result<Box<dyn FeedConnection>> {
        let (ws_stream, _) = connect_async(self.url.as_str()).await?;
        let (write, read) = ws_stream.split();
        Ok(Box::new(WsFeedConnection { write, read }))
    }
}

#[async_trait]
impl FeedConnection for WsFeedConnection {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.write.send(text.into()).await?;
        Ok(())
    }

    async fn next_text(&mut self) -> Option<Result<String>> {
        while let Some(msg) = self.read.next().await {
            match msg {
                Ok(WsMessage::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(WsMessage::Close(frame)) => {
                    return Some(Err(anyhow!("closed by peer: {:?}", frame)));
                }
                Ok(_) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
        None
    }
}

/// Orchestrator side of the deployer task.
pub struct DeployerHandle {
    requests: mpsc::Sender<()>,
    events: mpsc::UnboundedReceiver<DeploymentEvent>,
}

impl DeployerHandle {
    pub fn new(
        requests: mpsc::Sender<()>,
        events: mpsc::UnboundedReceiver<DeploymentEvent>,
    ) -> Self {
        DeployerHandle { requests, events }
    }

    /// Queues one deployment. A request made while another is still queued
    /// collapses into it. Returns `false` if the deployer task is gone.
    pub fn request_deployment(&self) -> bool {
        match self.requests.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => true,
            Err(TrySendError::Closed(())) => false,
        }
    }

    /// Waits for the next event. `None` once the deployer task is gone.
    pub async fn next_event(&mut self) -> Option<DeploymentEvent> {
        self.events.recv().await
    }

    /// Every event delivered since the last drain, in arrival order.
    pub fn drain(&mut self) -> Vec<DeploymentEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

struct Outstanding {
    token: Token,
    redeploys: u32,
    deadline: Instant,
}

enum Step {
    Request(Option<()>),
    Frame(Option<Result<String>>),
    Expired,
}

/// Long-lived listener owning the creation-feed connection.
///
/// One deployment is in flight at a time and at most one further request
/// waits behind it. A deployment with no ack before its deadline is given up
/// as `Failed`. A dropped connection is re-established after a fixed delay, with no
/// cap on attempts, and a deployment that was in flight is abandoned as
/// `Failed` and replaced by exactly one fresh request on the new connection.
pub struct Deployer<C> {
    connector: C,
    creator: Pubkey,
    reconnect_delay: Duration,
    ack_timeout: Duration,
    max_redeploys: u32,
    rng: StdRng,
    logger: Logger,
}

impl<C: FeedConnector + 'static> Deployer<C> {
    pub fn new(connector: C, creator: Pubkey) -> Self {
        Deployer {
            connector,
            creator,
            reconnect_delay: Duration::from_secs(RECONNECT_BACKOFF),
            ack_timeout: Duration::from_secs(ACK_TIMEOUT),
            max_redeploys: MAX_REDEPLOY_ATTEMPTS,
            rng: StdRng::from_entropy(),
            logger: Logger::new("[DEPLOYER] => "),
        }
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn spawn(self, cancel: CancellationToken) -> (DeployerHandle, JoinHandle<()>) {
        let (request_tx, request_rx) = mpsc::channel(1);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(request_rx, event_tx, cancel));
        (DeployerHandle::new(request_tx, event_rx), task)
    }

    async fn run(
        mut self,
        mut requests: mpsc::Receiver<()>,
        events: mpsc::UnboundedSender<DeploymentEvent>,
        cancel: CancellationToken,
    ) {
        let mut outstanding: Option<Outstanding> = None;

        loop {
            if cancel.is_cancelled() {
                return;
            }
            let connected = tokio::select! {
                _ = cancel.cancelled() => return,
                res = self.connector.connect() => res,
            };
            let mut conn = match connected {
                Ok(conn) => conn,
                Err(e) => {
                    self.logger
                        .error(format!("WebSocket connect failed, retrying: {}", e));
                    if !sleep_or_cancel(&cancel, self.reconnect_delay).await {
                        return;
                    }
                    continue;
                }
            };
            self.logger.log("[CONNECTED] creation feed".to_string());

            let mut alive = true;
            if let Some(abandoned) = outstanding.take() {
                let mut token = abandoned.token;
                self.logger.warn(format!(
                    "Connection dropped before {} was acknowledged, issuing a fresh token",
                    token
                ));
                if token.mark_failed().is_ok() {
                    self.emit(&events, DeploymentEvent::Failed(token));
                }
                let (next, sent) = self.issue(conn.as_mut(), abandoned.redeploys).await;
                outstanding = Some(next);
                alive = sent;
            }

            while alive {
                if events.is_closed() {
                    self.logger
                        .warn("Event receiver dropped, deployer stopping".to_string());
                    return;
                }
                let deadline = outstanding.as_ref().map(|o| o.deadline);
                let step = tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => Step::Expired,
                    req = requests.recv(), if outstanding.is_none() => Step::Request(req),
                    frame = conn.next_text() => Step::Frame(frame),
                };
                match step {
                    Step::Request(None) => {
                        self.logger
                            .log("Request channel closed, deployer stopping".to_string());
                        return;
                    }
                    Step::Request(Some(())) => {
                        let (next, sent) = self.issue(conn.as_mut(), 0).await;
                        outstanding = Some(next);
                        alive = sent;
                    }
                    Step::Frame(Some(Ok(text))) => {
                        let Some(ack) = parse_ack(&text) else {
                            continue;
                        };
                        let Some(current) = outstanding.take() else {
                            self.logger
                                .warn(format!("Ack with no deployment in flight: {}", text));
                            continue;
                        };
                        let (next, sent) = self.resolve(conn.as_mut(), current, ack, &events).await;
                        outstanding = next;
                        alive = sent;
                    }
                    Step::Expired => {
                        if let Some(expired) = outstanding.take() {
                            let mut token = expired.token;
                            self.logger.error(format!(
                                "No acknowledgement for {} within {}s, giving up",
                                token,
                                self.ack_timeout.as_secs()
                            ));
                            if token.mark_failed().is_ok() {
                                self.emit(&events, DeploymentEvent::Failed(token));
                            }
                        }
                    }
                    Step::Frame(Some(Err(e))) => {
                        self.logger.error(format!("WebSocket error: {}", e));
                        alive = false;
                    }
                    Step::Frame(None) => {
                        self.logger.error("WebSocket disconnected".to_string());
                        alive = false;
                    }
                }
            }

            if !sleep_or_cancel(&cancel, self.reconnect_delay).await {
                return;
            }
        }
    }

    /// Applies a terminal ack. A rejection restarts with a new identity until
    /// the redeploy budget is spent.
    async fn resolve(
        &mut self,
        conn: &mut dyn FeedConnection,
        current: Outstanding,
        ack: Ack,
        events: &mpsc::UnboundedSender<DeploymentEvent>,
    ) -> (Option<Outstanding>, bool) {
        let mut token = current.token;
        match ack {
            Ack::Success(mint) => {
                if let Err(e) = token.mark_deployed(mint) {
                    self.logger.error(e.to_string());
                    return (None, true);
                }
                self.logger
                    .success(format!("Successfully deployed: {}", token));
                self.emit(events, DeploymentEvent::Deployed(token));
                (None, true)
            }
            Ack::Failure(reason) => {
                self.logger
                    .error(format!("Failed to deploy: {} - {}", token, reason));
                if token.mark_failed().is_ok() {
                    self.emit(events, DeploymentEvent::Failed(token));
                }
                if events.is_closed() {
                    return (None, true);
                }
                if current.redeploys >= self.max_redeploys {
                    self.logger.warn(format!(
                        "Giving up after {} fresh identities, waiting for next cycle",
                        current.redeploys
                    ));
                    return (None, true);
                }
                let (next, sent) = self.issue(conn, current.redeploys + 1).await;
                (Some(next), sent)
            }
        }
    }

    fn emit(&self, events: &mpsc::UnboundedSender<DeploymentEvent>, event: DeploymentEvent) {
        if let Err(e) = events.send(event) {
            self.logger
                .error(format!("Event receiver dropped, lost outcome {:?}", e.0));
        }
    }

    /// Generates a new identity and sends its creation request.
    async fn issue(
        &mut self,
        conn: &mut dyn FeedConnection,
        redeploys: u32,
    ) -> (Outstanding, bool) {
        let token = Token::generate(&mut self.rng);
        self.logger.log(format!(
            "Deploying token: {} with supply {}",
            token.name(),
            token.supply()
        ));
        let payload = CreateTokenRequest {
            action: "create_token",
            name: token.name(),
            supply: token.supply(),
            creator_wallet: self.creator.to_string(),
            trading_enabled: true,
            liquidity_added: false,
        };
        let sent = match serde_json::to_string(&payload) {
            Ok(text) => match conn.send_text(text).await {
                Ok(()) => true,
                Err(e) => {
                    self.logger
                        .error(format!("Failed to send creation request: {}", e));
                    false
                }
            },
            Err(e) => {
                self.logger
                    .error(format!("Failed to encode creation request: {}", e));
                false
            }
        };
        let deadline = Instant::now() + self.ack_timeout;
        (
            Outstanding {
                token,
                redeploys,
                deadline,
            },
            sent,
        )
    }
}
