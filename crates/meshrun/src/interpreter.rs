//! # Interpreter
//!
//! Builds commands, validates them against the local registry, routes them to a
//! transport, and dispatches inbound commands.
//!
//! ## Dispatch
//!
//! | inbound          | action                                         | local event             |
//! |------------------|------------------------------------------------|-------------------------|
//! | `rpc`            | run the named operation from the registry      | broadcast/unicast result |
//! | `custom`         | resolve the key, run the named mapper          | none (mapper may emit)  |
//! | `custom-response`| forward                                        | broadcast custom result |
//!
//! Everything inbound funnels through one pump task per peer, so dispatch never
//! races with itself. Outbound sends hand bytes to the transport and return.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use meshrpc::CausalToken;
use meshrpc::Command;
use meshrpc::CommandKind;
use meshrpc::FailureReason;
use meshrpc::JobId;
use meshrpc::PeerId;
use meshrpc::ResponseShape;
use meshrpc::Val;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::builder::Builder;
use crate::clock::Clock;
use crate::events::Event;
use crate::events::EventKind;
use crate::events::Events;
use crate::events::Subscription;
use crate::id::JobIds;
use crate::mapper::Context;
use crate::mapper::Emitter;
use crate::mapper::Mappers;
use crate::registry::Registry;
use crate::registry::ValidationError;
use crate::store::Store;
use crate::transport;
use crate::transport::Broadcast;
use crate::transport::Unicast;

/// Why an outbound call produced no send.
#[derive(Debug, Clone)]
pub enum Error {
    /// The call was refused locally and never reached the network.
    Validation(ValidationError),
    /// The transport failed to accept the payload.
    Transport(transport::Error),
    /// The command could not be encoded, or is too large.
    Codec(meshrpc::Error),
    /// The builder was missing a required collaborator.
    MissingTransport(&'static str),
    /// `run` was called on an interpreter whose pump already started.
    AlreadyRunning,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(e) => write!(f, "Validation error: {}", e),
            Self::Transport(e) => write!(f, "Transport error: {}", e),
            Self::Codec(e) => write!(f, "Codec error: {}", e),
            Self::MissingTransport(which) => write!(f, "Missing {} transport", which),
            Self::AlreadyRunning => write!(f, "Interpreter pump already running"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<transport::Error> for Error {
    fn from(e: transport::Error) -> Self {
        Self::Transport(e)
    }
}

impl From<meshrpc::Error> for Error {
    fn from(e: meshrpc::Error) -> Self {
        Self::Codec(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why an inbound payload produced no local effect.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// The payload did not decode to a command.
    Codec(String),
    /// A custom command could not be served on this peer.
    Custom { job: JobId, reason: FailureReason },
    /// The command kind is not accepted on this channel.
    Unsupported(CommandKind),
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Codec(msg) => write!(f, "Undecodable payload: {}", msg),
            Self::Custom { job, reason } => write!(f, "Custom {} not served: {}", job, reason),
            Self::Unsupported(kind) => write!(f, "Unsupported command kind on this channel: {}", kind),
        }
    }
}

impl std::error::Error for DispatchError {}

/// Acknowledgement that a command was handed to a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Sent {
    pub command: Command,
    /// The causal token, for broadcasts.
    pub token: Option<CausalToken>,
    /// The addressee, for unicasts.
    pub to: Option<PeerId>,
}

/// One peer's remote-execution interpreter.
pub struct Interpreter {
    pub(crate) peer: PeerId,
    pub(crate) protocol: String,
    pub(crate) registry: Registry,
    pub(crate) store: Store,
    pub(crate) mappers: Mappers,
    pub(crate) events: Events,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) job_ids: JobIds,
    pub(crate) max_payload: usize,
    pub(crate) broadcast: Arc<dyn Broadcast>,
    pub(crate) unicast: Arc<dyn Unicast>,
    pub(crate) outbox_tx: mpsc::UnboundedSender<Command>,
    pub(crate) outbox_rx: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
    /// Held from token to send, so broadcasts leave this peer in token order.
    pub(crate) send_lock: tokio::sync::Mutex<()>,
}

impl Interpreter {
    pub fn builder(peer: PeerId) -> Builder {
        Builder::new(peer)
    }

    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn events(&self) -> &Events {
        &self.events
    }

    /// Shorthand for `events().on(kind, listener)`.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.events.on(kind, listener)
    }

    // ------------------------------------------------------------------------
    //  OUTBOUND
    // ------------------------------------------------------------------------

    /// Validates `name(args...)` against this peer's registry and broadcasts it.
    pub async fn execute_broadcast(&self, name: &str, args: Vec<Val>) -> Result<Sent> {
        self.registry.validate(name, &args).inspect_err(|e| {
            debug!(peer = %self.peer, protocol = %self.protocol, error = %e, "refusing broadcast rpc");
        })?;
        self.send_broadcast(Command::rpc(name, args)).await
    }

    /// Validates `name(args...)` against this peer's registry and sends it to `to`.
    pub async fn execute_unicast(&self, name: &str, args: Vec<Val>, to: &PeerId) -> Result<Sent> {
        self.registry.validate(name, &args).inspect_err(|e| {
            debug!(peer = %self.peer, protocol = %self.protocol, error = %e, "refusing unicast rpc");
        })?;
        self.send_unicast(Command::rpc(name, args), to).await
    }

    /// Broadcasts a custom job under a fresh identifier and returns it.
    pub async fn execute_custom(&self, key: &str, mapper: &str, shape: ResponseShape) -> Result<JobId> {
        let job = self.job_ids.next();
        self.send_custom(job.clone(), key, mapper, shape).await?;
        Ok(job)
    }

    pub(crate) async fn send_custom(&self, job: JobId, key: &str, mapper: &str, shape: ResponseShape) -> Result<Sent> {
        if key.is_empty() {
            return Err(Error::Validation(ValidationError::EmptyKey));
        }
        if mapper.is_empty() {
            return Err(Error::Validation(ValidationError::EmptyName));
        }

        let sent = self.send_broadcast(Command::custom(job.clone(), key, mapper, shape)).await?;
        self.store.record_job(&job, key);
        Ok(sent)
    }

    pub(crate) fn next_job(&self) -> JobId {
        self.job_ids.next()
    }

    async fn send_broadcast(&self, command: Command) -> Result<Sent> {
        let payload = self.encode(&command)?;

        let _ordered = self.send_lock.lock().await;
        let token = self.clock.peek();
        self.broadcast.send(&payload, token.clone()).await?;
        self.clock.commit(&token);

        debug!(peer = %self.peer, kind = %command.kind(), counter = token.counter, "broadcast sent");
        Ok(Sent { command, token: Some(token), to: None })
    }

    async fn send_unicast(&self, command: Command, to: &PeerId) -> Result<Sent> {
        let payload = self.encode(&command)?;
        self.unicast.send(&payload, to).await?;

        debug!(peer = %self.peer, kind = %command.kind(), %to, "unicast sent");
        Ok(Sent { command, token: None, to: Some(to.clone()) })
    }

    fn encode(&self, command: &Command) -> Result<Vec<u8>> {
        let payload = meshrpc::encode(command)?;
        if payload.len() > self.max_payload {
            return Err(Error::Codec(meshrpc::Error::PayloadTooLarge {
                limit: self.max_payload,
                found: payload.len(),
            }));
        }
        Ok(payload)
    }

    // ------------------------------------------------------------------------
    //  INBOUND
    // ------------------------------------------------------------------------

    /// Dispatches a payload delivered by the broadcast channel.
    pub fn receive_broadcast(&self, payload: &[u8]) -> std::result::Result<(), DispatchError> {
        let command = self.decode(payload)?;

        match &command {
            Command::Custom { job, key, mapper, shape } => {
                let (job, key, mapper, shape) = (job.clone(), key.clone(), mapper.clone(), *shape);
                self.receive_custom(&job, &key, &mapper, shape)
                    .map_err(|reason| DispatchError::Custom { job, reason })
            }
            Command::CustomResponse { value, .. } => {
                let value = value.clone();
                self.events.emit(Event::BroadcastCustomResult { value, command });
                Ok(())
            }
            Command::Rpc { name, args } => {
                let result = self.registry.invoke(name, args);
                if let Err(reason) = &result {
                    debug!(peer = %self.peer, op = %name, %reason, "broadcast rpc failed");
                }
                self.events.emit(Event::BroadcastResult { result, command });
                Ok(())
            }
        }
    }

    /// Dispatches a payload delivered by the unicast channel from `sender`.
    ///
    /// Only `rpc` travels by unicast; anything else is refused.
    pub fn receive_unicast(&self, sender: &PeerId, payload: &[u8]) -> std::result::Result<(), DispatchError> {
        let command = self.decode(payload)?;

        let Command::Rpc { name, args } = &command else {
            return Err(DispatchError::Unsupported(command.kind()));
        };

        let result = self.registry.invoke(name, args);
        if let Err(reason) = &result {
            debug!(peer = %self.peer, op = %name, %sender, %reason, "unicast rpc failed");
        }
        self.events.emit(Event::UnicastResult {
            result,
            sender: sender.clone(),
            command,
        });
        Ok(())
    }

    /// Resolves `key` and runs this peer's mapper `mapper` on the value.
    fn receive_custom(
        &self,
        job: &JobId,
        key: &str,
        mapper: &str,
        shape: ResponseShape,
    ) -> std::result::Result<(), FailureReason> {
        let func = self.mappers
            .get(mapper)
            .ok_or_else(|| FailureReason::UnknownMapper(mapper.to_string()))?;

        // Thunks run under the same guard as mappers.
        let resolve = std::panic::AssertUnwindSafe(|| self.store.resolve(key));
        let val = std::panic::catch_unwind(resolve)
            .map_err(|_| FailureReason::Panicked(format!("store key '{}'", key)))?
            .ok_or_else(|| FailureReason::NotFound(key.to_string()))?;

        let ctx = Context {
            peer: self.peer.clone(),
            store: self.store.clone(),
            registry: self.registry.clone(),
        };
        let emitter = Emitter::new(shape, self.outbox_tx.clone());

        let run = std::panic::AssertUnwindSafe(|| func(job, &ctx, val, &emitter));
        match std::panic::catch_unwind(run) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(msg)) => Err(FailureReason::OperationFailed(msg)),
            Err(_) => Err(FailureReason::Panicked(format!("mapper '{}'", mapper))),
        }
    }

    fn decode(&self, payload: &[u8]) -> std::result::Result<Command, DispatchError> {
        meshrpc::decode_bounded(payload, self.max_payload)
            .map_err(|e| DispatchError::Codec(e.to_string()))
    }

    // ------------------------------------------------------------------------
    //  PUMP
    // ------------------------------------------------------------------------

    /// Starts the pump: one task that receives from both transports and
    /// flushes emitter responses, until both transports close.
    pub fn run(self: &Arc<Self>) -> Result<PumpHandle> {
        let mut outbox = self.outbox_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(Error::AlreadyRunning)?;

        let this = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut broadcast_open = true;
            let mut unicast_open = true;
            info!(peer = %this.peer, protocol = %this.protocol, "interpreter pump started");

            while broadcast_open || unicast_open {
                tokio::select! {
                    msg = this.broadcast.recv(), if broadcast_open => match msg {
                        Ok(Some(payload)) => {
                            if let Err(e) = this.receive_broadcast(&payload) {
                                warn!(peer = %this.peer, error = %e, "broadcast dispatch failed");
                            }
                        }
                        Ok(None) => broadcast_open = false,
                        Err(e) => {
                            warn!(peer = %this.peer, error = %e, "broadcast transport failed");
                            broadcast_open = false;
                        }
                    },
                    msg = this.unicast.recv(), if unicast_open => match msg {
                        Ok(Some((sender, payload))) => {
                            if let Err(e) = this.receive_unicast(&sender, &payload) {
                                warn!(peer = %this.peer, %sender, error = %e, "unicast dispatch failed");
                            }
                        }
                        Ok(None) => unicast_open = false,
                        Err(e) => {
                            warn!(peer = %this.peer, error = %e, "unicast transport failed");
                            unicast_open = false;
                        }
                    },
                    Some(response) = outbox.recv() => {
                        if let Err(e) = this.send_broadcast(response).await {
                            warn!(peer = %this.peer, error = %e, "custom response not sent");
                        }
                    }
                }
            }

            info!(peer = %this.peer, "interpreter pump stopped");
        });

        Ok(PumpHandle { task: Some(task) })
    }
}

/// Owns the pump task. Dropping it stops the pump.
#[must_use = "dropping a PumpHandle stops the interpreter pump"]
pub struct PumpHandle {
    task: Option<JoinHandle<()>>,
}

impl PumpHandle {
    /// Stops the pump and waits for it to finish.
    pub async fn shutdown(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }

    /// Waits for the pump to stop on its own, i.e. when both transports close.
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PumpHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
