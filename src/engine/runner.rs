//! Engine background loop.
//!
//! [`Engine::start`] moves the engine onto a tokio task that owns the tick
//! timer and a command channel. Ticks and commands are handled one at a
//! time by that task, so a tick never overlaps another tick or a command.

use super::{Engine, EngineState};
use crate::collaborators::RawNotice;
use crate::config::ConfigPatch;
use crate::delivery::DeliveryOutcome;
use crate::error::{CircadianError, Result};
use crate::events::{EngineEvent, SubscriberRegistry, Subscription};
use crate::queue::{AttentionItem, NewAttentionItem};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Command channel capacity.
const COMMAND_CAPACITY: usize = 32;

enum Command {
    State(oneshot::Sender<EngineState>),
    PushItem(NewAttentionItem, oneshot::Sender<String>),
    IngestNotice(RawNotice, oneshot::Sender<Option<String>>),
    IngestNotices(Vec<RawNotice>, oneshot::Sender<Vec<String>>),
    DeliverNow(oneshot::Sender<Option<DeliveryOutcome>>),
    SetConfig(ConfigPatch, oneshot::Sender<Result<()>>),
    PendingItems(oneshot::Sender<Vec<AttentionItem>>),
}

/// Handle to a running engine.
///
/// Dropping the handle also ends the loop once the command channel closes.
pub struct EngineHandle {
    commands: mpsc::Sender<Command>,
    cancel: CancellationToken,
    subscribers: SubscriberRegistry,
    events_tx: broadcast::Sender<EngineEvent>,
    task: JoinHandle<()>,
}

impl Engine {
    /// Spawn the tick loop. The first tick runs immediately.
    pub fn start(self) -> EngineHandle {
        let (commands, rx) = mpsc::channel(COMMAND_CAPACITY);
        let cancel = CancellationToken::new();
        let subscribers = self.subscribers.clone();
        let events_tx = self.events_tx.clone();
        let task = tokio::spawn(run(self, rx, cancel.clone()));
        EngineHandle {
            commands,
            cancel,
            subscribers,
            events_tx,
            task,
        }
    }

    async fn handle(&mut self, command: Command) {
        // A dropped reply receiver means the caller gave up; nothing to do.
        match command {
            Command::State(reply) => {
                let _ = reply.send(self.state());
            }
            Command::PushItem(item, reply) => {
                let _ = reply.send(self.push_item(item));
            }
            Command::IngestNotice(notice, reply) => {
                let _ = reply.send(self.ingest_notice(&notice).await);
            }
            Command::IngestNotices(notices, reply) => {
                let _ = reply.send(self.ingest_notices(&notices).await);
            }
            Command::DeliverNow(reply) => {
                let _ = reply.send(self.deliver_now().await);
            }
            Command::SetConfig(patch, reply) => {
                let _ = reply.send(self.set_config(&patch));
            }
            Command::PendingItems(reply) => {
                let _ = reply.send(self.pending_items());
            }
        }
    }
}

async fn run(mut engine: Engine, mut commands: mpsc::Receiver<Command>, cancel: CancellationToken) {
    let mut heartbeat = engine.config.heartbeat();
    let mut timer = tokio::time::interval(heartbeat);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(heartbeat_secs = heartbeat.as_secs(), "circadian engine started");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                break;
            }
            _ = timer.tick() => {
                engine.tick().await;
            }
            command = commands.recv() => match command {
                Some(command) => engine.handle(command).await,
                None => {
                    debug!("every engine handle dropped");
                    break;
                }
            },
        }

        let configured = engine.config.heartbeat();
        if configured != heartbeat {
            heartbeat = configured;
            let start = Instant::now()
                .checked_add(heartbeat)
                .unwrap_or_else(Instant::now);
            timer = tokio::time::interval_at(start, heartbeat);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(heartbeat_secs = heartbeat.as_secs(), "tick timer re-armed");
        }
    }

    info!("circadian engine stopped");
}

fn stopped() -> CircadianError {
    CircadianError::Engine("engine is stopped".to_owned())
}

impl EngineHandle {
    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        if self.cancel.is_cancelled() {
            return Err(stopped());
        }
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| stopped())?;
        rx.await.map_err(|_| stopped())
    }

    /// # Errors
    ///
    /// Returns [`CircadianError::Engine`] once the engine has stopped.
    pub async fn state(&self) -> Result<EngineState> {
        self.request(Command::State).await
    }

    /// Queue an item. Returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`CircadianError::Engine`] once the engine has stopped.
    pub async fn push_item(&self, item: NewAttentionItem) -> Result<String> {
        self.request(|reply| Command::PushItem(item, reply)).await
    }

    /// # Errors
    ///
    /// Returns [`CircadianError::Engine`] once the engine has stopped.
    pub async fn ingest_notice(&self, notice: RawNotice) -> Result<Option<String>> {
        self.request(|reply| Command::IngestNotice(notice, reply))
            .await
    }

    /// # Errors
    ///
    /// Returns [`CircadianError::Engine`] once the engine has stopped.
    pub async fn ingest_notices(&self, notices: Vec<RawNotice>) -> Result<Vec<String>> {
        self.request(|reply| Command::IngestNotices(notices, reply))
            .await
    }

    /// Force an out-of-band flush.
    ///
    /// # Errors
    ///
    /// Returns [`CircadianError::Engine`] once the engine has stopped.
    pub async fn deliver_now(&self) -> Result<Option<DeliveryOutcome>> {
        self.request(Command::DeliverNow).await
    }

    /// # Errors
    ///
    /// Returns [`CircadianError::Config`] for an invalid patch, or
    /// [`CircadianError::Engine`] once the engine has stopped.
    pub async fn set_config(&self, patch: ConfigPatch) -> Result<()> {
        self.request(|reply| Command::SetConfig(patch, reply))
            .await?
    }

    /// # Errors
    ///
    /// Returns [`CircadianError::Engine`] once the engine has stopped.
    pub async fn pending_items(&self) -> Result<Vec<AttentionItem>> {
        self.request(Command::PendingItems).await
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    pub fn events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events_tx.subscribe()
    }

    /// No new tick starts after this. A tick already running completes.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            info!("circadian engine stop requested");
        }
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled() || self.task.is_finished()
    }

    /// Wait for the loop to exit. Call [`stop`](Self::stop) first.
    ///
    /// # Errors
    ///
    /// Returns [`CircadianError::Engine`] if the engine task panicked.
    pub async fn join(self) -> Result<()> {
        let Self { commands, task, .. } = self;
        drop(commands);
        task.await
            .map_err(|e| CircadianError::Engine(format!("engine task failed: {e}")))
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}
