use crate::config::{CloudEnvironmentConfig, ExecutorSettings, Provider};
use crate::envelope::{EnvironmentInfo, Inbound, Outbound, RemoteContext};
use crate::error::ExecutorError;
use crate::transport::{Connector, Duplex, WebSocketConnector};
use chrono::{DateTime, Utc};
use opsdeck_audit::{AuditEntry, AuditLog};
use opsdeck_policy::CommandSanitizer;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Audit action written for raw commands sent to the remote backend.
pub const REMOTE_EXECUTE: &str = "remote_execute";
const REMOTE_RESOURCE: &str = "terminal";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Authenticating,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultMetadata {
    pub provider: Provider,
    pub execution_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandResult {
    pub success: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_time_ms: u64,
    pub metadata: ResultMetadata,
}

type Reply = oneshot::Sender<Result<CommandResult, ExecutorError>>;

struct PendingExecution {
    generation: u64,
    submitted_at: Instant,
    reply: Reply,
    progress: mpsc::UnboundedSender<Value>,
    /// Fires the per-call timeout. Aborted once the record leaves the table.
    timer: Option<JoinHandle<()>>,
}

struct Link {
    generation: u64,
    outbound: mpsc::UnboundedSender<String>,
    reader: Option<JoinHandle<()>>,
}

/// State reachable from the reader task and from cancel handles.
struct Shared {
    provider: Provider,
    state: Mutex<ConnectionState>,
    link: Mutex<Option<Link>>,
    pending: Mutex<HashMap<String, PendingExecution>>,
    generations: AtomicU64,
}

impl Shared {
    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
    }

    /// Transition only if `generation` is still the live connection.
    fn set_state_for(&self, generation: u64, state: ConnectionState) {
        let link = self.link.lock();
        if link.as_ref().map(|l| l.generation) == Some(generation) {
            *self.state.lock() = state;
        }
    }

    fn live_generation(&self) -> Option<u64> {
        self.link.lock().as_ref().map(|l| l.generation)
    }

    fn send(&self, frame: &Outbound) -> Result<(), ExecutorError> {
        let text = serde_json::to_string(frame)?;
        let link = self.link.lock();
        let link = link.as_ref().ok_or(ExecutorError::ConnectionClosed)?;
        link.outbound
            .send(text)
            .map_err(|_| ExecutorError::ConnectionClosed)
    }

    fn take(&self, id: &str) -> Option<PendingExecution> {
        let mut record = self.pending.lock().remove(id)?;
        if let Some(timer) = record.timer.take() {
            timer.abort();
        }
        Some(record)
    }

    /// Tear down `generation` and reject everything submitted on it.
    fn close_generation(&self, generation: u64, reason: ExecutorError) -> Option<Link> {
        let link = {
            let mut link = self.link.lock();
            if link.as_ref().map(|l| l.generation) == Some(generation) {
                *self.state.lock() = ConnectionState::Disconnected;
                link.take()
            } else {
                None
            }
        };

        let drained: Vec<(String, PendingExecution)> = {
            let mut pending = self.pending.lock();
            let ids: Vec<String> = pending
                .iter()
                .filter(|(_, p)| p.generation == generation)
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| pending.remove(&id).map(|p| (id, p)))
                .collect()
        };

        for (_, record) in &drained {
            if let Some(timer) = &record.timer {
                timer.abort();
            }
        }

        if !drained.is_empty() {
            warn!("Rejecting {} pending executions: {}", drained.len(), reason);
        }
        for (_, record) in drained {
            let _ = record.reply.send(Err(reason.clone()));
        }

        link
    }

    /// Route one inbound frame. An error terminates the connection.
    fn handle_frame(&self, generation: u64, text: &str) -> Result<(), ExecutorError> {
        let frame: Inbound = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Ignoring unrecognised frame: {}", e);
                return Ok(());
            }
        };

        match frame {
            Inbound::CommandResult {
                id,
                success,
                output,
                error,
                metadata,
            } => {
                let Some(record) = self.take(&id) else {
                    warn!("Result for unknown execution id: {}", id);
                    return Ok(());
                };
                let outcome = if success {
                    Ok(CommandResult {
                        success,
                        output,
                        error,
                        execution_time_ms: record.submitted_at.elapsed().as_millis() as u64,
                        metadata: ResultMetadata {
                            provider: self.provider,
                            execution_id: id,
                            timestamp: Utc::now(),
                            extra: metadata,
                        },
                    })
                } else {
                    Err(ExecutorError::CommandFailed {
                        id,
                        error: error.unwrap_or_else(|| "Command execution failed".to_string()),
                    })
                };
                let _ = record.reply.send(outcome);
            }
            Inbound::CommandProgress { id, progress } => match self.pending.lock().get(&id) {
                Some(record) => {
                    let _ = record.progress.send(progress);
                }
                None => debug!("Progress for unknown execution id: {}", id),
            },
            Inbound::AuthenticationResult { success: true, .. } => {
                info!("Authenticated with remote executor");
                self.set_state_for(generation, ConnectionState::Ready);
            }
            Inbound::AuthenticationResult { success: false, error } => {
                let reason = error.unwrap_or_else(|| "rejected by proxy".to_string());
                error!("Remote authentication failed: {}", reason);
                return Err(ExecutorError::Authentication(reason));
            }
            Inbound::Error { id: Some(id), error } => match self.take(&id) {
                Some(record) => {
                    let _ = record.reply.send(Err(ExecutorError::Remote(error)));
                }
                None => warn!("Error for unknown execution id {}: {}", id, error),
            },
            Inbound::Error { id: None, error } => {
                error!("Remote executor error: {}", error);
            }
        }

        Ok(())
    }
}

async fn read_loop(shared: Arc<Shared>, generation: u64, mut inbound: mpsc::UnboundedReceiver<String>) {
    while let Some(text) = inbound.recv().await {
        if let Err(reason) = shared.handle_frame(generation, &text) {
            shared.close_generation(generation, reason);
            return;
        }
    }
    info!("Remote connection closed");
    shared.close_generation(generation, ExecutorError::ConnectionClosed);
}

fn execution_id() -> String {
    let suffix: String = uuid::Uuid::new_v4().simple().to_string().chars().take(9).collect();
    format!("cmd_{}_{}", Utc::now().timestamp_millis(), suffix)
}

/// Cancels one in-flight execution. Cloneable and usable from any task.
#[derive(Clone)]
pub struct CancelHandle {
    id: String,
    shared: Arc<Shared>,
}

impl CancelHandle {
    /// Returns `false` when the execution had already finished.
    pub fn cancel(&self) -> bool {
        let Some(record) = self.shared.take(&self.id) else {
            return false;
        };
        let _ = record.reply.send(Err(ExecutorError::Cancelled(self.id.clone())));

        let frame = Outbound::CancelCommand {
            id: self.id.clone(),
            timestamp: Utc::now(),
        };
        if let Err(e) = self.shared.send(&frame) {
            debug!("Cancel frame for {} not delivered: {}", self.id, e);
        }
        info!("Cancelled execution {}", self.id);
        true
    }
}

/// An execution that has been sent and is awaiting its response.
///
/// The per-call timeout runs from submission whether or not [`wait`] is
/// awaited. Dropping a submission removes its record from the table.
///
/// [`wait`]: Submission::wait
pub struct Submission {
    id: String,
    reply: Option<oneshot::Receiver<Result<CommandResult, ExecutorError>>>,
    progress: Option<mpsc::UnboundedReceiver<Value>>,
    cancel: CancelHandle,
}

impl Submission {
    pub fn execution_id(&self) -> &str {
        &self.id
    }

    /// Progress payloads for this execution. The stream ends when the
    /// execution settles.
    pub fn take_progress(&mut self) -> Option<mpsc::UnboundedReceiver<Value>> {
        self.progress.take()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub async fn wait(mut self) -> Result<CommandResult, ExecutorError> {
        let Some(reply) = self.reply.take() else {
            return Err(ExecutorError::ConnectionClosed);
        };
        reply.await.unwrap_or(Err(ExecutorError::ConnectionClosed))
    }
}

impl Drop for Submission {
    fn drop(&mut self) {
        if self.cancel.shared.take(&self.id).is_some() {
            debug!("Execution {} abandoned before it settled", self.id);
        }
    }
}

/// Client for one remote execution backend.
///
/// Owns a single connection and the table of executions awaiting a response
/// on it. Responses are matched to callers by execution id only, so they may
/// arrive in any order.
pub struct RemoteExecutor {
    config: CloudEnvironmentConfig,
    settings: ExecutorSettings,
    connector: Arc<dyn Connector>,
    sanitizer: CommandSanitizer,
    audit: Option<Arc<AuditLog>>,
    shared: Arc<Shared>,
    connecting: tokio::sync::Mutex<()>,
}

impl RemoteExecutor {
    pub fn new(config: CloudEnvironmentConfig) -> Self {
        Self::with_connector(config, ExecutorSettings::default(), Arc::new(WebSocketConnector))
    }

    pub fn with_connector(
        config: CloudEnvironmentConfig,
        settings: ExecutorSettings,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let shared = Arc::new(Shared {
            provider: config.provider,
            state: Mutex::new(ConnectionState::Disconnected),
            link: Mutex::new(None),
            pending: Mutex::new(HashMap::new()),
            generations: AtomicU64::new(0),
        });

        Self {
            config,
            settings,
            connector,
            sanitizer: CommandSanitizer::new(),
            audit: None,
            shared,
            connecting: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn config(&self) -> &CloudEnvironmentConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.live_generation().is_some()
    }

    pub fn pending_count(&self) -> usize {
        self.shared.pending.lock().len()
    }

    /// Open the connection and send the authentication frame. Returns once
    /// the transport is open; authentication completes in the background.
    pub async fn connect(&self) -> Result<(), ExecutorError> {
        let _guard = self.connecting.lock().await;
        if self.is_connected() {
            return Ok(());
        }

        let url = self.config.websocket_url()?;
        self.shared.set_state(ConnectionState::Connecting);
        info!("Connecting to remote executor ({})", self.config.provider);

        let opened = tokio::time::timeout(self.settings.connect_timeout, self.connector.open(&url)).await;
        let Duplex { outbound, inbound } = match opened {
            Ok(Ok(duplex)) => duplex,
            Ok(Err(e)) => {
                self.shared.set_state(ConnectionState::Disconnected);
                warn!("Remote connection failed: {}", e);
                return Err(e);
            }
            Err(_) => {
                self.shared.set_state(ConnectionState::Disconnected);
                warn!("Remote connection timed out after {:?}", self.settings.connect_timeout);
                return Err(ExecutorError::ConnectionTimeout(self.settings.connect_timeout));
            }
        };

        let generation = self.shared.generations.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut link = self.shared.link.lock();
            *link = Some(Link {
                generation,
                outbound,
                reader: None,
            });
            *self.shared.state.lock() = ConnectionState::Connected;
        }

        let reader = tokio::spawn(read_loop(self.shared.clone(), generation, inbound));
        if let Some(link) = self
            .shared
            .link
            .lock()
            .as_mut()
            .filter(|l| l.generation == generation)
        {
            link.reader = Some(reader);
        }

        self.shared.set_state_for(generation, ConnectionState::Authenticating);
        self.shared.send(&Outbound::Authenticate {
            credentials: self.config.auth_credentials(),
            provider: self.config.provider.to_string(),
            timestamp: Utc::now(),
        })?;

        debug!("Remote connection {} open", generation);
        Ok(())
    }

    /// Screen, send and register `command` without waiting for its result.
    pub async fn submit(&self, command: &str, context: &RemoteContext) -> Result<Submission, ExecutorError> {
        let command = match self.screen(command, context) {
            Ok(command) => command,
            Err(e) => {
                warn!("Remote command rejected for {}: {}", context.user_id, e);
                self.audit_denied(context, &e);
                return Err(e);
            }
        };

        if !self.is_connected() {
            self.connect().await?;
        }
        let generation = self
            .shared
            .live_generation()
            .ok_or(ExecutorError::ConnectionClosed)?;

        let id = execution_id();
        let (reply_tx, reply_rx) = oneshot::channel();
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        self.shared.pending.lock().insert(
            id.clone(),
            PendingExecution {
                generation,
                submitted_at: Instant::now(),
                reply: reply_tx,
                progress: progress_tx,
                timer: None,
            },
        );
        self.arm_timeout(&id);

        self.audit_allowed(context);

        let frame = Outbound::ExecuteCommand {
            id: id.clone(),
            command,
            context: context.clone(),
            environment: EnvironmentInfo {
                provider: self.config.provider.to_string(),
                region: self.config.credentials.region.clone(),
                connection_type: self.config.connection_type.as_str().to_string(),
            },
            timestamp: Utc::now(),
        };
        if let Err(e) = self.shared.send(&frame) {
            self.shared.take(&id);
            return Err(e);
        }
        debug!("Submitted execution {}", id);

        Ok(Submission {
            id: id.clone(),
            reply: Some(reply_rx),
            progress: Some(progress_rx),
            cancel: CancelHandle {
                id,
                shared: self.shared.clone(),
            },
        })
    }

    pub async fn execute(&self, command: &str, context: &RemoteContext) -> Result<CommandResult, ExecutorError> {
        self.submit(command, context).await?.wait().await
    }

    /// Close the connection and reject pending executions. Safe to call
    /// repeatedly.
    pub fn disconnect(&self) {
        let Some(generation) = self.shared.live_generation() else {
            return;
        };
        if let Some(link) = self
            .shared
            .close_generation(generation, ExecutorError::ConnectionClosed)
        {
            if let Some(reader) = link.reader {
                reader.abort();
            }
            info!("Disconnected from remote executor");
        }
    }

    /// Reject `id` with `CommandTimeout` once the per-call limit passes.
    fn arm_timeout(&self, id: &str) {
        let shared = self.shared.clone();
        let limit = self.settings.command_timeout;
        let timer_id = id.to_string();

        let timer = tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            let Some(record) = shared.pending.lock().remove(&timer_id) else {
                return;
            };
            warn!("Execution {} timed out after {:?}", timer_id, limit);
            let _ = record.reply.send(Err(ExecutorError::CommandTimeout {
                id: timer_id,
                timeout: limit,
            }));
        });

        match self.shared.pending.lock().get_mut(id) {
            Some(record) => record.timer = Some(timer),
            None => timer.abort(),
        }
    }

    fn screen(&self, command: &str, context: &RemoteContext) -> Result<String, ExecutorError> {
        self.sanitizer.check_syntax(command)?;
        let clean = self.sanitizer.sanitize(command, context.role)?;
        if clean.is_empty() {
            return Err(ExecutorError::Rejected(opsdeck_policy::SanitizerError::Malformed(
                "nothing left after sanitizing".into(),
            )));
        }
        Ok(clean)
    }

    fn audit_allowed(&self, context: &RemoteContext) {
        if let Some(audit) = &self.audit {
            audit.record(AuditEntry::allowed(
                context.user_id.as_str(),
                context.role.as_str(),
                REMOTE_EXECUTE,
                REMOTE_RESOURCE,
            ));
        }
    }

    fn audit_denied(&self, context: &RemoteContext, reason: &ExecutorError) {
        if let Some(audit) = &self.audit {
            audit.record(AuditEntry::denied(
                context.user_id.as_str(),
                context.role.as_str(),
                REMOTE_EXECUTE,
                REMOTE_RESOURCE,
                reason.to_string(),
            ));
        }
    }
}

impl Drop for RemoteExecutor {
    fn drop(&mut self) {
        self.disconnect();
    }
}
