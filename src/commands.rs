use std::path::PathBuf;

use chrono::{Datelike, Local, TimeZone};

use crate::events::{Intent, RemindersPayload, StatePayload, SyncSnapshot};
use crate::models::{DataFile, Settings, SortOrder, Task, Theme, Timestamp};
use crate::state::{AppState, StoreError};
use crate::storage::{Storage, StorageError};
use crate::undo::UndoToken;
use crate::views::ViewSnapshot;

#[derive(Debug, serde::Serialize)]
pub struct CommandResult<T> {
    pub ok: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    /// Set when the change was applied in memory but could not be persisted.
    pub warning: Option<String>,
}

impl<T> CommandResult<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CommandResult<U> {
        CommandResult {
            ok: self.ok,
            data: self.data.map(f),
            error: self.error,
            warning: self.warning,
        }
    }
}

/// Everything a command needs from its host: where to persist, what time it is,
/// how to notify the view and how to arm the undo timer.
pub trait CommandCtx {
    fn app_data_dir(&self) -> Result<PathBuf, StorageError>;
    fn now_ms(&self) -> Timestamp;
    fn emit_state_updated(&self, payload: StatePayload);
    fn emit_theme_synced(&self, theme: Theme);
    fn emit_reminders_changed(&self, payload: RemindersPayload);
    fn schedule_undo_expiry(&self, state: &AppState, token: UndoToken, ttl_ms: Timestamp);
}

fn ok<T>(data: T) -> CommandResult<T> {
    CommandResult {
        ok: true,
        data: Some(data),
        error: None,
        warning: None,
    }
}

fn err<T>(message: &str) -> CommandResult<T> {
    CommandResult {
        ok: false,
        data: None,
        error: Some(message.to_string()),
        warning: None,
    }
}

/// Maps a store rejection. `InvalidState` is an idempotent no-op, reported as
/// success with the unchanged value and without persisting or notifying.
fn rejected<T>(error: StoreError, unchanged: Option<T>) -> CommandResult<T> {
    match error {
        StoreError::InvalidState(reason) => {
            log::debug!("ignored no-op intent: {reason}");
            CommandResult {
                ok: true,
                data: unchanged,
                error: None,
                warning: None,
            }
        }
        other => err(&other.to_string()),
    }
}

fn persist(ctx: &impl CommandCtx, state: &AppState) -> Result<(), StorageError> {
    let storage = Storage::new(ctx.app_data_dir()?);
    storage.ensure_dirs()?;
    storage.save(&state.data_file())
}

/// Write-after-mutate, then notify. A failed write keeps the in-memory change.
fn commit<T>(ctx: &impl CommandCtx, state: &AppState, data: T) -> CommandResult<T> {
    let warning = match persist(ctx, state) {
        Ok(()) => None,
        Err(error) => {
            log::warn!("persist failed, keeping in-memory state: {error}");
            Some(format!("storage error: {error}"))
        }
    };
    ctx.emit_state_updated(state.state_payload(ctx.now_ms()));
    CommandResult {
        warning,
        ..ok(data)
    }
}

/// Startup read. Missing or corrupt data yields an empty store.
pub fn open_state(ctx: &impl CommandCtx, undo_ttl_ms: Timestamp) -> Result<AppState, StorageError> {
    let storage = Storage::new(ctx.app_data_dir()?);
    storage.ensure_dirs()?;
    let data = storage.load_or_default();
    log::info!(
        "loaded {} tasks from {}",
        data.tasks.len(),
        storage.data_path().display()
    );
    Ok(AppState::with_undo_ttl(
        data.tasks,
        data.settings,
        undo_ttl_ms,
    ))
}

fn add_task_impl(ctx: &impl CommandCtx, state: &AppState, title: String) -> CommandResult<Task> {
    match state.add_task(&title, ctx.now_ms()) {
        Ok(task) => {
            log::debug!("task added id={}", task.id);
            commit(ctx, state, task)
        }
        Err(error) => rejected(error, None),
    }
}

fn edit_task_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    task_id: String,
    title: String,
) -> CommandResult<Task> {
    match state.edit_title(&task_id, &title) {
        Ok(task) => commit(ctx, state, task),
        Err(error) => rejected(error, None),
    }
}

fn toggle_urgent_impl(ctx: &impl CommandCtx, state: &AppState, task_id: String) -> CommandResult<Task> {
    match state.toggle_urgent(&task_id) {
        Ok(task) => commit(ctx, state, task),
        Err(error) => rejected(error, None),
    }
}

fn duplicate_task_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    task_id: String,
) -> CommandResult<Task> {
    match state.duplicate_task(&task_id, ctx.now_ms()) {
        Ok(task) => commit(ctx, state, task),
        Err(error) => rejected(error, None),
    }
}

fn complete_task_impl(ctx: &impl CommandCtx, state: &AppState, task_id: String) -> CommandResult<Task> {
    match state.complete_task(&task_id, ctx.now_ms()) {
        Ok(task) => {
            log::debug!("task completed id={}", task.id);
            commit(ctx, state, task)
        }
        Err(error) => rejected(error, state.task(&task_id)),
    }
}

fn restore_task_impl(ctx: &impl CommandCtx, state: &AppState, task_id: String) -> CommandResult<Task> {
    match state.restore_task(&task_id) {
        Ok(task) => commit(ctx, state, task),
        Err(error) => rejected(error, state.task(&task_id)),
    }
}

fn delete_task_impl(ctx: &impl CommandCtx, state: &AppState, task_id: String) -> CommandResult<bool> {
    match state.delete_task(&task_id, ctx.now_ms()) {
        Ok(token) => {
            log::debug!("task deleted id={task_id}, undo window open");
            ctx.schedule_undo_expiry(state, token, state.undo_ttl_ms());
            commit(ctx, state, true)
        }
        Err(error) => rejected(error, None),
    }
}

fn undo_delete_impl(ctx: &impl CommandCtx, state: &AppState) -> CommandResult<Task> {
    match state.undo_delete(ctx.now_ms()) {
        Ok(task) => {
            log::debug!("delete undone id={}", task.id);
            commit(ctx, state, task)
        }
        Err(error) => rejected(error, None),
    }
}

fn reorder_active_impl(ctx: &impl CommandCtx, state: &AppState, ids: Vec<String>) -> CommandResult<bool> {
    match state.reorder_active(&ids) {
        Ok(()) => commit(ctx, state, true),
        Err(error) => rejected(error, None),
    }
}

/// The day filter is view state and is not persisted.
fn set_filter_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    day_start: Option<Timestamp>,
) -> CommandResult<Option<Timestamp>> {
    state.set_filter(day_start);
    ctx.emit_state_updated(state.state_payload(ctx.now_ms()));
    ok(day_start)
}

fn set_sort_order_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    sort_order: SortOrder,
) -> CommandResult<Settings> {
    let settings = state.set_sort_order(sort_order);
    commit(ctx, state, settings)
}

fn set_completed_section_open_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    open: bool,
) -> CommandResult<Settings> {
    let settings = state.set_completed_section_open(open);
    commit(ctx, state, settings)
}

fn set_theme_impl(ctx: &impl CommandCtx, state: &AppState, theme: Theme) -> CommandResult<Settings> {
    let settings = state.set_theme(theme);
    commit(ctx, state, settings)
}

fn view_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    year: Option<i32>,
    month: Option<u32>,
) -> CommandResult<ViewSnapshot> {
    let now = ctx.now_ms();
    let today = Local.timestamp_millis_opt(now).single().map(|dt| dt.date_naive());
    let year = year.or(today.map(|d| d.year())).unwrap_or(1970);
    let month = month.or(today.map(|d| d.month())).unwrap_or(1);
    if !(1..=12).contains(&month) {
        return err(&format!("invalid month: {month}"));
    }
    ok(state.view(now, year, month, &Local))
}

fn snapshot_impl(state: &AppState) -> CommandResult<DataFile> {
    ok(state.snapshot())
}

fn apply_sync_impl(ctx: &impl CommandCtx, state: &AppState, snapshot: SyncSnapshot) -> CommandResult<bool> {
    let incoming = snapshot.tasks.as_ref().map(Vec::len);
    let theme_changed = state.apply_sync(snapshot);
    log::info!("sync applied tasks={incoming:?} theme_changed={theme_changed}");
    let result = commit(ctx, state, theme_changed);
    if theme_changed {
        ctx.emit_theme_synced(state.settings().theme);
    }
    result
}

/// Serializable reply for [`dispatch`].
#[derive(Debug, serde::Serialize)]
#[serde(untagged)]
pub enum Reply {
    Task(Task),
    Flag(bool),
    Filter(Option<Timestamp>),
    Settings(Settings),
    View(Box<ViewSnapshot>),
    Data(DataFile),
}

/// Routes a view intent to its command.
pub fn dispatch(ctx: &impl CommandCtx, state: &AppState, intent: Intent) -> CommandResult<Reply> {
    match intent {
        Intent::Add { title } => add_task_impl(ctx, state, title).map(Reply::Task),
        Intent::Edit { id, title } => edit_task_impl(ctx, state, id, title).map(Reply::Task),
        Intent::ToggleUrgent { id } => toggle_urgent_impl(ctx, state, id).map(Reply::Task),
        Intent::Duplicate { id } => duplicate_task_impl(ctx, state, id).map(Reply::Task),
        Intent::Complete { id } => complete_task_impl(ctx, state, id).map(Reply::Task),
        Intent::Restore { id } => restore_task_impl(ctx, state, id).map(Reply::Task),
        Intent::Delete { id } => delete_task_impl(ctx, state, id).map(Reply::Flag),
        Intent::UndoDelete => undo_delete_impl(ctx, state).map(Reply::Task),
        Intent::ReorderActive { ids } => reorder_active_impl(ctx, state, ids).map(Reply::Flag),
        Intent::SetFilter { day_start } => {
            set_filter_impl(ctx, state, day_start).map(Reply::Filter)
        }
        Intent::SetSortOrder { sort_order } => {
            set_sort_order_impl(ctx, state, sort_order).map(Reply::Settings)
        }
        Intent::SetCompletedSectionOpen { open } => {
            set_completed_section_open_impl(ctx, state, open).map(Reply::Settings)
        }
        Intent::SetTheme { theme } => set_theme_impl(ctx, state, theme).map(Reply::Settings),
        Intent::View { year, month } => {
            view_impl(ctx, state, year, month).map(|view| Reply::View(Box::new(view)))
        }
        Intent::Snapshot => snapshot_impl(state).map(Reply::Data),
        Intent::Sync { snapshot } => apply_sync_impl(ctx, state, snapshot).map(Reply::Flag),
    }
}
