use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::client::{
    ClientEvent, ConnectionState, ConnectionStats, HandleEvent, RequestOptions, SessionEvent, SessionState,
};
use crate::config::JanusClientConfig;
use crate::core::{Connector, TransportCommand, TransportEvent, TransportLink};
use crate::error::{JanusError, Result};
use crate::protocol::{
    ClientResponse, CorrelationTable, Delivery, InboundFrame, JanusEventKind, JanusId, JanusRequest, TableConfig,
    TableStatistics, TimeoutTimer, TimerEvent, Transaction, TransactionObserver, TransactionOptions,
};

const EVENT_CAPACITY: usize = 64;

/// Requests from the public handles into the event loop
#[derive(Debug)]
pub(crate) enum Command {
    Connect {
        reply: Option<oneshot::Sender<Result<()>>>,
    },
    Close {
        reconnect: bool,
        reply: oneshot::Sender<()>,
    },
    Request {
        request: JanusRequest,
        options: RequestOptions,
        reply: oneshot::Sender<Result<ClientResponse>>,
    },
    AddSession {
        id: JanusId,
        reply: oneshot::Sender<SessionChannels>,
    },
    RemoveSession {
        id: JanusId,
        reply: oneshot::Sender<bool>,
    },
    StopHeartbeat {
        id: JanusId,
    },
    KeepAlive {
        id: JanusId,
        reply: oneshot::Sender<Result<()>>,
    },
    AddHandle {
        session_id: JanusId,
        plugin: String,
        handle_id: JanusId,
        reply: oneshot::Sender<Result<HandleChannels>>,
    },
    HasHandle {
        session_id: JanusId,
        plugin: String,
        handle_id: JanusId,
        reply: oneshot::Sender<bool>,
    },
    RemoveHandle {
        session_id: JanusId,
        plugin: String,
        handle_id: JanusId,
        reply: oneshot::Sender<bool>,
    },
    SessionIds {
        reply: oneshot::Sender<Vec<JanusId>>,
    },
    Statistics {
        reply: oneshot::Sender<TableStatistics>,
    },
    ServerInfo {
        reply: oneshot::Sender<Option<Value>>,
    },
    CacheServerInfo(Value),
    Stats {
        reply: oneshot::Sender<ConnectionStats>,
    },
    Shutdown,
}

/// What a new session needs to observe itself
#[derive(Debug)]
pub(crate) struct SessionChannels {
    pub state: watch::Receiver<SessionState>,
    pub events: broadcast::Sender<SessionEvent>,
}

/// What a new plugin handle needs to observe itself
#[derive(Debug)]
pub(crate) struct HandleChannels {
    pub connected: watch::Receiver<bool>,
    pub events: broadcast::Sender<HandleEvent>,
}

/// Outcomes of requests the loop issued on its own behalf
enum Internal {
    Handshake {
        epoch: u64,
        result: Result<ClientResponse>,
    },
    Heartbeat {
        session_id: JanusId,
        result: Result<()>,
        reply: Option<oneshot::Sender<Result<()>>>,
    },
}

/// Clonable sender side used by every public object
#[derive(Debug, Clone)]
pub(crate) struct LoopHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl LoopHandle {
    pub(crate) fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| JanusError::Shutdown)
    }

    pub(crate) async fn call<T, F>(&self, make: F) -> Result<T>
    where
        F: FnOnce(oneshot::Sender<T>) -> Command,
    {
        let (reply, outcome) = oneshot::channel();
        self.send(make(reply))?;
        outcome.await.map_err(|_| JanusError::Shutdown)
    }

    pub(crate) async fn request(&self, request: JanusRequest, options: RequestOptions) -> Result<ClientResponse> {
        self.call(|reply| Command::Request {
            request,
            options,
            reply,
        })
        .await?
    }

    /// Destroy a session remotely; the local entry goes away only on success
    pub(crate) async fn destroy_session(&self, id: &JanusId) -> Result<ClientResponse> {
        let request = JanusRequest::new("destroy").with("session_id", id.to_value());
        let response = self.request(request, RequestOptions::default()).await?;
        self.call(|reply| Command::RemoveSession { id: id.clone(), reply })
            .await?;
        Ok(response)
    }
}

/// Start the event loop for one connection. Must be called inside a tokio runtime.
pub(crate) fn spawn(
    config: JanusClientConfig,
    connector: Arc<dyn Connector>,
) -> (LoopHandle, watch::Receiver<ConnectionState>, broadcast::Sender<ClientEvent>) {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (timers_tx, timers_rx) = mpsc::unbounded_channel();
    let (internal_tx, internal_rx) = mpsc::unbounded_channel();
    let (connection, state_rx, events) = ConnectionLoop::new(config, connector, timers_tx, internal_tx);
    tokio::spawn(connection.run(commands_rx, timers_rx, internal_rx));

    (LoopHandle { commands: commands_tx }, state_rx, events)
}

struct HandleEntry {
    connected: watch::Sender<bool>,
    events: broadcast::Sender<HandleEvent>,
}

impl HandleEntry {
    fn new() -> Self {
        let (connected, _) = watch::channel(false);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { connected, events }
    }

    fn channels(&self) -> HandleChannels {
        HandleChannels {
            connected: self.connected.subscribe(),
            events: self.events.clone(),
        }
    }

    /// Connectivity is driven only by webrtcup and hangup
    fn dispatch(&self, kind: JanusEventKind, body: Value) {
        let event = match kind {
            JanusEventKind::WebrtcUp => {
                self.connected.send_replace(true);
                HandleEvent::WebrtcUp(body)
            }
            JanusEventKind::Hangup => {
                self.connected.send_replace(false);
                HandleEvent::Hangup(body)
            }
            JanusEventKind::Media => HandleEvent::Media(body),
            JanusEventKind::SlowLink => HandleEvent::SlowLink(body),
            JanusEventKind::Detached => HandleEvent::Detached(body),
            JanusEventKind::Timeout | JanusEventKind::Other(_) => HandleEvent::Event(body),
        };
        let _ = self.events.send(event);
    }
}

struct SessionEntry {
    state: SessionState,
    failures: u32,
    heartbeat: TimeoutTimer,
    state_tx: watch::Sender<SessionState>,
    events: broadcast::Sender<SessionEvent>,
    plugins: HashMap<String, HashMap<JanusId, HandleEntry>>,
}

impl SessionEntry {
    fn channels(&self) -> SessionChannels {
        SessionChannels {
            state: self.state_tx.subscribe(),
            events: self.events.clone(),
        }
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            self.state = state;
            self.state_tx.send_replace(state);
            let _ = self.events.send(SessionEvent::StateChanged(state));
        }
    }

    fn find_handle(&self, id: &JanusId) -> Option<&HandleEntry> {
        self.plugins.values().find_map(|handles| handles.get(id))
    }

    fn arm_heartbeat(&mut self, session_id: &JanusId, interval: std::time::Duration) {
        let session_id = session_id.clone();
        self.heartbeat
            .arm(interval, move |generation| TimerEvent::Heartbeat { session_id, generation });
    }
}

/// Routes a transaction outcome to the caller waiting on it
struct ReplyObserver {
    transaction_id: String,
    reply: Option<oneshot::Sender<Result<ClientResponse>>>,
}

impl TransactionObserver for ReplyObserver {
    fn on_response(&mut self, response: &ClientResponse) {
        match self.reply.take() {
            Some(reply) => {
                let _ = reply.send(Ok(response.clone()));
            }
            None => log::warn!("Duplicate response for transaction={}", self.transaction_id),
        }
    }

    fn on_error(&mut self, error: &JanusError) {
        match self.reply.take() {
            Some(reply) => {
                let _ = reply.send(Err(error.clone()));
            }
            None => log::warn!(
                "Transaction={} already delivered its response, dropping error: {}",
                self.transaction_id,
                error
            ),
        }
    }
}

struct ConnectionLoop {
    config: JanusClientConfig,
    connector: Arc<dyn Connector>,
    transport: Option<TransportLink>,
    /// Bumped for every transport opened; stale handshakes carry an older one
    epoch: u64,
    state: ConnectionState,
    /// A `Connected` event was emitted and no `Disconnected` has followed
    announced: bool,
    state_tx: watch::Sender<ConnectionState>,
    events: broadcast::Sender<ClientEvent>,
    table: CorrelationTable,
    sessions: HashMap<JanusId, SessionEntry>,
    idle: TimeoutTimer,
    timers: mpsc::UnboundedSender<TimerEvent>,
    internal: mpsc::UnboundedSender<Internal>,
    connect_waiters: Vec<oneshot::Sender<Result<()>>>,
    server_info: Option<Value>,
    stats: ConnectionStats,
}

async fn next_transport_event(transport: &mut Option<TransportLink>) -> Option<TransportEvent> {
    match transport {
        Some(link) => link.inbound.recv().await,
        None => std::future::pending().await,
    }
}

impl ConnectionLoop {
    fn new(
        config: JanusClientConfig,
        connector: Arc<dyn Connector>,
        timers: mpsc::UnboundedSender<TimerEvent>,
        internal: mpsc::UnboundedSender<Internal>,
    ) -> (Self, watch::Receiver<ConnectionState>, broadcast::Sender<ClientEvent>) {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let connection = Self {
            table: CorrelationTable::new(TableConfig {
                max_pending_transactions: config.max_pending_transactions,
            }),
            config,
            connector,
            transport: None,
            epoch: 0,
            state: ConnectionState::Disconnected,
            announced: false,
            state_tx,
            events: events.clone(),
            sessions: HashMap::new(),
            idle: TimeoutTimer::new(timers.clone()),
            timers,
            internal,
            connect_waiters: Vec::new(),
            server_info: None,
            stats: ConnectionStats::default(),
        };
        (connection, state_rx, events)
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut timers: mpsc::UnboundedReceiver<TimerEvent>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(event) = timers.recv() => self.handle_timer(event),
                Some(outcome) = internal.recv() => self.handle_internal(outcome),
                event = next_transport_event(&mut self.transport) => {
                    // a transport task that vanished without saying so is closed
                    self.handle_transport_event(event.unwrap_or(TransportEvent::Closed));
                }
            }
        }

        log::debug!(
            "Event loop stopping with {} pending transactions and {} sessions",
            self.table.len(),
            self.sessions.len()
        );
        self.close(false);
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { reply } => self.connect(reply),
            Command::Close { reconnect, reply } => {
                self.close(reconnect);
                let _ = reply.send(());
            }
            Command::Request {
                request,
                options,
                reply,
            } => self.dispatch(request, options, reply),
            Command::AddSession { id, reply } => {
                let _ = reply.send(self.add_session(id));
            }
            Command::RemoveSession { id, reply } => {
                let _ = reply.send(self.remove_session(&id).is_some());
            }
            Command::StopHeartbeat { id } => {
                if let Some(entry) = self.sessions.get_mut(&id) {
                    entry.heartbeat.cancel();
                }
            }
            Command::KeepAlive { id, reply } => {
                if self.sessions.contains_key(&id) {
                    self.send_keepalive(id, Some(reply));
                } else {
                    let _ = reply.send(Err(JanusError::SessionNotFound(id)));
                }
            }
            Command::AddHandle {
                session_id,
                plugin,
                handle_id,
                reply,
            } => {
                let _ = reply.send(self.add_handle(session_id, plugin, handle_id));
            }
            Command::HasHandle {
                session_id,
                plugin,
                handle_id,
                reply,
            } => {
                let found = self
                    .sessions
                    .get(&session_id)
                    .and_then(|entry| entry.plugins.get(&plugin))
                    .map(|handles| handles.contains_key(&handle_id))
                    .unwrap_or(false);
                let _ = reply.send(found);
            }
            Command::RemoveHandle {
                session_id,
                plugin,
                handle_id,
                reply,
            } => {
                let removed = self
                    .sessions
                    .get_mut(&session_id)
                    .and_then(|entry| entry.plugins.get_mut(&plugin))
                    .and_then(|handles| handles.remove(&handle_id))
                    .is_some();
                if removed {
                    log::info!("Detached handle {} from session {}", handle_id, session_id);
                }
                let _ = reply.send(removed);
            }
            Command::SessionIds { reply } => {
                let _ = reply.send(self.sessions.keys().cloned().collect());
            }
            Command::Statistics { reply } => {
                let _ = reply.send(self.table.statistics());
            }
            Command::ServerInfo { reply } => {
                let _ = reply.send(self.server_info.clone());
            }
            Command::CacheServerInfo(info) => self.server_info = Some(info),
            Command::Stats { reply } => {
                let _ = reply.send(self.stats.clone());
            }
            Command::Shutdown => {}
        }
    }

    fn handle_timer(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::Transaction { id, generation } => {
                if self.table.timeout(&id, generation) == Delivery::Ended {
                    log::debug!("Transaction={} removed after timeout", id);
                }
            }
            TimerEvent::Idle { generation } => {
                if self.idle.fire(generation) {
                    log::warn!(
                        "No traffic from {} for {:?}, closing connection",
                        self.config.url,
                        self.config.connection_timeout
                    );
                    self.close(self.config.reconnect);
                }
            }
            TimerEvent::Heartbeat { session_id, generation } => self.heartbeat_tick(session_id, generation),
        }
    }

    fn handle_internal(&mut self, outcome: Internal) {
        match outcome {
            Internal::Handshake { epoch, result } => self.handshake_result(epoch, result),
            Internal::Heartbeat {
                session_id,
                result,
                reply,
            } => self.heartbeat_result(session_id, result, reply),
        }
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Open => {
                log::info!("Transport open to {}", self.config.url);
                if self.state == ConnectionState::Disconnected {
                    self.state = ConnectionState::Connected;
                    self.state_tx.send_replace(ConnectionState::Connected);
                    self.stats.connected_at = Some(Utc::now());
                    let epoch = self.epoch;
                    self.forward(JanusRequest::new("info"), RequestOptions::default(), move |result| {
                        Internal::Handshake { epoch, result }
                    });
                }
            }
            TransportEvent::Message(text) => self.on_message(text),
            TransportEvent::Error(message) => {
                log::error!("Transport error on {}: {}", self.config.url, message);
                let _ = self.events.send(ClientEvent::Error(JanusError::Transport(message)));
            }
            TransportEvent::Closed => {
                log::info!("Transport to {} closed", self.config.url);
                self.teardown(false);
            }
        }
    }

    fn connect(&mut self, waiter: Option<oneshot::Sender<Result<()>>>) {
        if let Some(waiter) = waiter {
            if self.announced {
                let _ = waiter.send(Ok(()));
            } else {
                self.connect_waiters.push(waiter);
            }
        }
        if self.transport.is_some() {
            return;
        }

        log::info!("Connecting to {} ({})", self.config.url, self.config.protocol);
        self.epoch += 1;
        self.transport = Some(self.connector.open(&self.config.url, &self.config.protocol));
        // a handshake that never completes is caught by the same watchdog
        self.arm_idle();
    }

    fn close(&mut self, reconnect: bool) {
        if let Some(link) = self.transport.as_ref() {
            let _ = link.outbound.send(TransportCommand::Close);
        }
        self.teardown(reconnect);
    }

    fn teardown(&mut self, reconnect: bool) {
        self.idle.cancel();
        if self.transport.take().is_some() {
            log::debug!("Transport to {} detached", self.config.url);
        }
        if self.state == ConnectionState::Connected {
            self.state = ConnectionState::Disconnected;
            self.state_tx.send_replace(ConnectionState::Disconnected);
        }
        if self.announced {
            self.announced = false;
            log::info!("Disconnected from {}", self.config.url);
            let _ = self.events.send(ClientEvent::Disconnected);
        }

        if reconnect {
            self.connect(None);
        } else {
            for waiter in self.connect_waiters.drain(..) {
                let _ = waiter.send(Err(JanusError::ConnectionState {
                    state: ConnectionState::Disconnected,
                }));
            }
        }
    }

    fn arm_idle(&mut self) {
        self.idle
            .arm(self.config.connection_timeout, |generation| TimerEvent::Idle { generation });
    }

    fn on_message(&mut self, text: String) {
        self.arm_idle();
        self.stats.frames_received += 1;
        self.stats.last_activity = Some(Utc::now());
        log::debug!("Received {}", text);

        let frame = match InboundFrame::parse(&text) {
            Ok(frame) => frame,
            Err(error) => {
                log::warn!("Dropped unparsable frame: {}", error);
                let _ = self.events.send(ClientEvent::Error(error));
                return;
            }
        };

        match frame.transaction.clone() {
            Some(id) if self.table.contains(&id) => {
                self.table.deliver(&id, frame.body);
            }
            Some(id) => log::warn!("Dropped janus={} for unknown transaction={}", frame.janus, id),
            None => self.delegate_event(frame),
        }
    }

    fn delegate_event(&mut self, frame: InboundFrame) {
        let Some(session_id) = frame.session_id.clone() else {
            log::warn!("Dropped event janus={} without session_id", frame.janus);
            return;
        };
        if !self.sessions.contains_key(&session_id) {
            log::info!("Rejected event janus={} for unknown session {}", frame.janus, session_id);
            return;
        }

        let kind = frame.event_kind();
        if kind == JanusEventKind::Timeout {
            log::info!("Session {} expired on the server", session_id);
            if let Some(entry) = self.remove_session(&session_id) {
                let _ = entry.events.send(SessionEvent::Expired);
            }
            return;
        }

        let Some(entry) = self.sessions.get(&session_id) else {
            return;
        };
        match frame.sender.as_ref().and_then(|sender| entry.find_handle(sender)) {
            Some(handle) => handle.dispatch(kind, frame.body),
            None => {
                let _ = entry.events.send(SessionEvent::Event(frame.body));
            }
        }
    }

    fn dispatch(
        &mut self,
        mut request: JanusRequest,
        options: RequestOptions,
        reply: oneshot::Sender<Result<ClientResponse>>,
    ) {
        let outbound = match (&self.transport, self.state) {
            (Some(link), ConnectionState::Connected) => link.outbound.clone(),
            _ => {
                let _ = reply.send(Err(JanusError::ConnectionState { state: self.state }));
                return;
            }
        };

        // any traffic on a session counts as its heartbeat
        if let Some(session_id) = request.get("session_id").and_then(JanusId::from_value) {
            self.reset_heartbeat(&session_id);
        }
        if let Some(token) = &self.config.token {
            request.set("token", token.clone());
        }
        if let Some(secret) = &self.config.api_secret {
            request.set("apisecret", secret.clone());
        }

        let options = TransactionOptions {
            timeout: options.timeout.unwrap_or(self.config.request_timeout),
            ack: options.ack,
        };
        let mut transaction = Transaction::new(request, options, self.timers.clone());
        let transaction_id = transaction.id().to_string();
        transaction.observe(Box::new(ReplyObserver {
            transaction_id,
            reply: Some(reply),
        }));

        let id = match self.table.register(transaction) {
            Ok(id) => id,
            Err(error) => {
                log::warn!("Request rejected: {}", error);
                return;
            }
        };
        match self.table.start(&id, &outbound) {
            Ok(Delivery::Pending) => self.stats.frames_sent += 1,
            Ok(_) => log::debug!("Transaction={} ended while starting", id),
            Err(error) => log::error!("Transaction={} failed to start: {}", id, error),
        }
    }

    /// Dispatch a request whose outcome comes back into the loop as an [`Internal`]
    fn forward<F>(&mut self, request: JanusRequest, options: RequestOptions, wrap: F)
    where
        F: FnOnce(Result<ClientResponse>) -> Internal + Send + 'static,
    {
        let (reply, outcome) = oneshot::channel();
        self.dispatch(request, options, reply);
        let internal = self.internal.clone();
        tokio::spawn(async move {
            let result = outcome.await.unwrap_or_else(|_| Err(JanusError::Shutdown));
            let _ = internal.send(wrap(result));
        });
    }

    fn handshake_result(&mut self, epoch: u64, result: Result<ClientResponse>) {
        if epoch != self.epoch || self.state != ConnectionState::Connected || self.announced {
            log::debug!("Ignored stale handshake outcome from transport #{}", epoch);
            return;
        }
        let result = result.and_then(|response| match response.response_type() {
            Some("server_info") => Ok(response),
            other => Err(JanusError::UnexpectedResponse(format!(
                "expected server_info, got {:?}",
                other
            ))),
        });

        match result {
            Ok(response) => {
                self.server_info = Some(response.into_response());
                self.announced = true;
                log::info!("Connected to {}", self.config.url);
                let _ = self.events.send(ClientEvent::Connected);
                for waiter in self.connect_waiters.drain(..) {
                    let _ = waiter.send(Ok(()));
                }
            }
            Err(error) => {
                log::error!("Handshake with {} failed: {}", self.config.url, error);
                let _ = self.events.send(ClientEvent::Error(error.clone()));
                for waiter in self.connect_waiters.drain(..) {
                    let _ = waiter.send(Err(error.clone()));
                }
                // an unusable link; the next connect() opens a fresh one
                self.close(false);
            }
        }
    }

    fn add_session(&mut self, id: JanusId) -> SessionChannels {
        if let Some(entry) = self.sessions.get(&id) {
            return entry.channels();
        }

        let state = if self.state == ConnectionState::Connected {
            SessionState::Alive
        } else {
            SessionState::Dead
        };
        let (state_tx, _) = watch::channel(state);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let mut entry = SessionEntry {
            state,
            failures: 0,
            heartbeat: TimeoutTimer::new(self.timers.clone()),
            state_tx,
            events,
            plugins: HashMap::new(),
        };
        // a session born dead is still sent keep-alives; the failure threshold reaps it
        entry.arm_heartbeat(&id, self.config.keepalive_interval);
        let channels = entry.channels();
        self.sessions.insert(id.clone(), entry);
        log::info!("Created session {} ({} active)", id, self.sessions.len());
        channels
    }

    /// Drop a session from the map; its heartbeat is cancelled and it reads as dead
    fn remove_session(&mut self, id: &JanusId) -> Option<SessionEntry> {
        let mut entry = self.sessions.remove(id)?;
        entry.heartbeat.cancel();
        entry.set_state(SessionState::Dead);
        log::info!("Deleted session {} ({} remaining)", id, self.sessions.len());
        Some(entry)
    }

    fn add_handle(&mut self, session_id: JanusId, plugin: String, handle_id: JanusId) -> Result<HandleChannels> {
        let Some(entry) = self.sessions.get_mut(&session_id) else {
            return Err(JanusError::SessionNotFound(session_id));
        };
        log::info!("Attached {} handle {} to session {}", plugin, handle_id, session_id);
        let handle = entry
            .plugins
            .entry(plugin)
            .or_default()
            .entry(handle_id)
            .or_insert_with(HandleEntry::new);
        Ok(handle.channels())
    }

    fn reset_heartbeat(&mut self, session_id: &JanusId) {
        let interval = self.config.keepalive_interval;
        if let Some(entry) = self.sessions.get_mut(session_id) {
            entry.arm_heartbeat(session_id, interval);
        }
    }

    fn heartbeat_tick(&mut self, session_id: JanusId, generation: u64) {
        let interval = self.config.keepalive_interval;
        let Some(entry) = self.sessions.get_mut(&session_id) else {
            return;
        };
        if !entry.heartbeat.fire(generation) {
            return;
        }
        // keeps ticking while disconnected so failures still accumulate
        entry.arm_heartbeat(&session_id, interval);
        self.send_keepalive(session_id, None);
    }

    fn send_keepalive(&mut self, session_id: JanusId, reply: Option<oneshot::Sender<Result<()>>>) {
        let request = JanusRequest::new("keepalive").with("session_id", session_id.to_value());
        self.forward(request, RequestOptions::default(), move |result| Internal::Heartbeat {
            session_id,
            result: result.map(|_| ()),
            reply,
        });
    }

    fn heartbeat_result(
        &mut self,
        session_id: JanusId,
        result: Result<()>,
        reply: Option<oneshot::Sender<Result<()>>>,
    ) {
        // an explicit keep-alive only reports back to its caller
        if let Some(reply) = reply {
            log::debug!("Explicit keep-alive for session {}: {:?}", session_id, result);
            let _ = reply.send(result);
            return;
        }

        let threshold = self.config.keepalive_failure_threshold;
        let mut dead = false;

        if let Some(entry) = self.sessions.get_mut(&session_id) {
            match &result {
                Ok(()) => {
                    log::debug!("Keep-alive ok for session {}", session_id);
                    entry.failures = 0;
                    entry.set_state(SessionState::Alive);
                    let _ = entry.events.send(SessionEvent::KeepAlive(true));
                }
                Err(error) => {
                    entry.failures += 1;
                    log::warn!(
                        "Keep-alive failed for session {} ({}/{}): {}",
                        session_id,
                        entry.failures,
                        threshold,
                        error
                    );
                    let _ = entry.events.send(SessionEvent::KeepAlive(false));
                    if entry.failures >= threshold {
                        entry.heartbeat.cancel();
                        entry.set_state(SessionState::Dead);
                        let _ = entry.events.send(SessionEvent::Timeout);
                        dead = true;
                    } else if entry.state != SessionState::Dead {
                        entry.set_state(SessionState::Dying);
                    }
                }
            }
        }

        if dead {
            self.remove_session(&session_id);
            let (ignored, _) = oneshot::channel();
            let request = JanusRequest::new("destroy").with("session_id", session_id.to_value());
            self.dispatch(request, RequestOptions::default(), ignored);
        }
    }
}
