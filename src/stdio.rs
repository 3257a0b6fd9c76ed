//! Line-delimited JSON host. Each stdin line is an [`Intent`]; each reply is a
//! `CommandResult` line and events go out as `{"event": .., "payload": ..}`.

use std::path::PathBuf;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::commands::{dispatch, CommandCtx, CommandResult, Reply};
use crate::events::{
    Intent, RemindersPayload, StatePayload, EVENT_REMINDERS_CHANGED, EVENT_STATE_UPDATED,
    EVENT_THEME_SYNCED,
};
use crate::models::{Theme, Timestamp};
use crate::scheduler::spawn_undo_expiry;
use crate::state::AppState;
use crate::storage::StorageError;
use crate::undo::UndoToken;

#[derive(Serialize)]
struct EventLine<'a, T: Serialize> {
    event: &'a str,
    payload: T,
}

#[derive(Clone)]
pub struct StdioCtx {
    data_dir: PathBuf,
    out: UnboundedSender<String>,
}

impl StdioCtx {
    pub fn new(data_dir: PathBuf, out: UnboundedSender<String>) -> Self {
        Self { data_dir, out }
    }

    fn send_event<T: Serialize>(&self, event: &str, payload: T) {
        match serde_json::to_string(&EventLine { event, payload }) {
            Ok(line) => self.send(line),
            Err(err) => log::error!("failed to encode event {event}: {err}"),
        }
    }

    fn send(&self, line: String) {
        if self.out.send(line).is_err() {
            log::warn!("output closed, dropping line");
        }
    }
}

impl CommandCtx for StdioCtx {
    fn app_data_dir(&self) -> Result<PathBuf, StorageError> {
        Ok(self.data_dir.clone())
    }

    fn now_ms(&self) -> Timestamp {
        chrono::Utc::now().timestamp_millis()
    }

    fn emit_state_updated(&self, payload: StatePayload) {
        self.send_event(EVENT_STATE_UPDATED, payload);
    }

    fn emit_theme_synced(&self, theme: Theme) {
        self.send_event(EVENT_THEME_SYNCED, theme);
    }

    fn emit_reminders_changed(&self, payload: RemindersPayload) {
        self.send_event(EVENT_REMINDERS_CHANGED, payload);
    }

    fn schedule_undo_expiry(&self, state: &AppState, token: UndoToken, ttl_ms: Timestamp) {
        spawn_undo_expiry(self.clone(), state.clone(), token, ttl_ms);
    }
}

/// Handles one input line; blank lines produce no reply.
pub fn handle_line(ctx: &StdioCtx, state: &AppState, line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let result = match serde_json::from_str::<Intent>(line) {
        Ok(intent) => dispatch(ctx, state, intent),
        Err(err) => {
            log::warn!("rejected input line: {err}");
            CommandResult::<Reply> {
                ok: false,
                data: None,
                error: Some(format!("invalid intent: {err}")),
                warning: None,
            }
        }
    };
    match serde_json::to_string(&result) {
        Ok(reply) => Some(reply),
        Err(err) => {
            log::error!("failed to encode reply: {err}");
            None
        }
    }
}

/// [`handle_line`] for async callers. Commands persist with blocking file IO,
/// so the worker is handed over for the duration. Needs the multi-thread runtime.
pub fn handle_line_blocking(ctx: &StdioCtx, state: &AppState, line: &str) -> Option<String> {
    tokio::task::block_in_place(|| handle_line(ctx, state, line))
}

/// Drains `rx` to stdout, one line per message, until every sender is gone.
pub fn spawn_writer(mut rx: UnboundedReceiver<String>) -> JoinHandle<std::io::Result<()>> {
    tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = rx.recv().await {
            stdout.write_all(line.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
        Ok::<(), std::io::Error>(())
    })
}

/// Serves stdin until EOF.
pub async fn serve(ctx: &StdioCtx, state: &AppState) -> std::io::Result<()> {
    // Initial state so a view can draw before its first intent.
    ctx.emit_state_updated(state.state_payload(ctx.now_ms()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(reply) = handle_line_blocking(ctx, state, &line) {
            ctx.send(reply);
        }
    }
    log::info!("stdin closed, shutting down");
    Ok(())
}
