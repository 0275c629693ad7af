//! Stdin/stdout JSON bridge for the headless host.
//!
//! Reads newline-delimited [`HostCommand`] objects, applies them to a
//! running engine and writes [`HostMessage`] lines back. Engine events and
//! output-channel activity are forwarded on the same stream.
//!
//! Stdout is exclusively reserved for the JSON protocol; all diagnostic
//! output (tracing, logs) must be routed to stderr.

use crate::clock::{Clock, SystemClock};
use crate::config::CircadianConfig;
use crate::engine::{Engine, EngineHandle};
use crate::error::{CircadianError, Result};
use crate::host::contract::{HostCommand, HostMessage, OutputActivity};
use crate::host::providers::{StdioOutputs, StdioSignals, host_collaborators};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, broadcast, mpsc};
use tracing::{debug, error, info, warn};

type SharedWriter<W> = Arc<Mutex<W>>;

/// Engine plus the stdio-fed collaborators around it.
pub struct HostBridge {
    config: CircadianConfig,
    clock: Arc<dyn Clock>,
}

impl HostBridge {
    pub fn new(config: CircadianConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Serve `reader`/`writer` until the input closes or `stop` arrives.
    ///
    /// Three things run side by side: the reader (on this task), an event
    /// forwarder and an output forwarder. On exit the engine is stopped and
    /// both forwarders drain before returning.
    ///
    /// # Errors
    ///
    /// Returns [`CircadianError::Host`] when reading input or writing output
    /// fails, or [`CircadianError::Engine`] when the engine task fails.
    pub async fn run<R, W>(self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let signals = Arc::new(StdioSignals::new(self.clock.clone()));
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let collaborators = host_collaborators(&signals, &StdioOutputs::new(output_tx));

        let engine = Engine::new(self.config, collaborators).with_clock(self.clock);
        // Subscribe before the first tick so its events are not missed.
        let event_rx = engine.events();
        let handle = engine.start();

        let writer: SharedWriter<W> = Arc::new(Mutex::new(writer));
        let events = tokio::spawn(forward_events(event_rx, Arc::clone(&writer)));
        let outputs = tokio::spawn(forward_outputs(output_rx, Arc::clone(&writer)));

        let reader_result = run_reader(reader, &handle, &signals, &writer).await;

        // Engine exit drops every event sender and output channel, which
        // ends both forwarders once they have drained.
        handle.stop();
        let joined = handle.join().await;
        let _ = events.await;
        let _ = outputs.await;

        reader_result?;
        joined
    }
}

impl std::fmt::Debug for HostBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostBridge")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Run the bridge on the process stdin/stdout.
///
/// # Errors
///
/// See [`HostBridge::run`].
pub async fn run_stdio_bridge(config: CircadianConfig) -> Result<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::BufWriter::new(tokio::io::stdout());
    HostBridge::new(config).run(stdin, stdout).await
}

async fn run_reader<R, W>(
    mut reader: R,
    handle: &EngineHandle,
    signals: &StdioSignals,
    writer: &SharedWriter<W>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        let bytes_read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| CircadianError::Host(format!("failed to read command: {e}")))?;
        if bytes_read == 0 {
            info!("input closed (EOF); shutting down host bridge");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let command: HostCommand = match serde_json::from_str(trimmed) {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, raw_line = %trimmed, "failed to parse host command");
                let response = HostMessage::error("parse_error", format!("invalid command: {e}"));
                write_message(writer, &response).await?;
                continue;
            }
        };

        let name = command.name();
        let is_stop = matches!(command, HostCommand::Stop);
        debug!(command = name, "host command received");

        let response = match execute(command, handle, signals).await {
            Ok(result) => HostMessage::ok(name, result),
            Err(e) => {
                warn!(command = name, error = %e, "host command failed");
                HostMessage::error(name, e.to_string())
            }
        };
        write_message(writer, &response).await?;

        if is_stop {
            info!("stop received; shutting down host bridge");
            break;
        }
    }
    Ok(())
}

async fn execute(
    command: HostCommand,
    handle: &EngineHandle,
    signals: &StdioSignals,
) -> Result<Option<serde_json::Value>> {
    let result = match command {
        HostCommand::PushItem(item) => {
            let id = handle.push_item(item).await?;
            Some(serde_json::json!({ "id": id }))
        }
        HostCommand::Notice(notice) => {
            let id = handle.ingest_notice(notice).await?;
            Some(serde_json::json!({ "id": id }))
        }
        HostCommand::Notices { notices } => {
            let ids = handle.ingest_notices(notices).await?;
            Some(serde_json::json!({ "ids": ids }))
        }
        HostCommand::Battery { level, charging } => {
            signals.set_battery(level, charging)?;
            None
        }
        HostCommand::Focus { active } => {
            signals.set_focus(active);
            None
        }
        HostCommand::Calendar { events } => {
            signals.set_events(events);
            None
        }
        HostCommand::DeliverNow => {
            let outcome = handle.deliver_now().await?;
            Some(serde_json::to_value(outcome)?)
        }
        HostCommand::State => Some(serde_json::to_value(handle.state().await?)?),
        HostCommand::Pending => Some(serde_json::to_value(handle.pending_items().await?)?),
        HostCommand::SetConfig(patch) => {
            handle.set_config(patch).await?;
            None
        }
        HostCommand::Stop => None,
    };
    Ok(result)
}

async fn forward_events<W>(mut rx: broadcast::Receiver<crate::events::EngineEvent>, writer: SharedWriter<W>)
where
    W: AsyncWrite + Unpin,
{
    loop {
        match rx.recv().await {
            Ok(event) => {
                if let Err(e) = write_message(&writer, &HostMessage::Event { event }).await {
                    warn!(error = %e, "failed to write event; stopping event forwarder");
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(lagged = n, "event forwarder lagged; some events were dropped");
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("event stream closed; stopping event forwarder");
                break;
            }
        }
    }
}

async fn forward_outputs<W>(mut rx: mpsc::UnboundedReceiver<OutputActivity>, writer: SharedWriter<W>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(output) = rx.recv().await {
        if let Err(e) = write_message(&writer, &HostMessage::Output { output }).await {
            warn!(error = %e, "failed to write output activity; stopping output forwarder");
            break;
        }
    }
}

/// Serialize `message` and write it as one flushed line.
async fn write_message<W>(writer: &SharedWriter<W>, message: &HostMessage) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            error!(error = %e, "failed to serialize host message; skipping");
            return Ok(());
        }
    };
    let mut w = writer.lock().await;
    w.write_all(json.as_bytes())
        .await
        .map_err(|e| CircadianError::Host(format!("failed to write output: {e}")))?;
    w.write_all(b"\n")
        .await
        .map_err(|e| CircadianError::Host(format!("failed to write newline: {e}")))?;
    w.flush()
        .await
        .map_err(|e| CircadianError::Host(format!("failed to flush output: {e}")))?;
    Ok(())
}
