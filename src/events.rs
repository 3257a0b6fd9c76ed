use serde::{Deserialize, Serialize};

use crate::models::{DataFile, Settings, SortOrder, Task, Theme, Timestamp};

pub const EVENT_STATE_UPDATED: &str = "state_updated";
pub const EVENT_REMINDERS_CHANGED: &str = "reminders_changed";
pub const EVENT_THEME_SYNCED: &str = "theme_synced";

/// Emitted after every successful mutation; enough to re-derive every view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePayload {
    pub tasks: Vec<Task>,
    pub settings: Settings,
    pub filter_day: Option<Timestamp>,
    pub undo_pending: bool,
}

/// Ids of active tasks past each reminder threshold, sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemindersPayload {
    pub overdue_ids: Vec<String>,
    pub critical_ids: Vec<String>,
}

/// Incoming snapshot from the sync collaborator. Missing parts are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSnapshot {
    #[serde(default)]
    pub tasks: Option<Vec<Task>>,
    #[serde(default)]
    pub settings: Option<SyncSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    #[serde(default)]
    pub theme: Option<Theme>,
}

impl From<DataFile> for SyncSnapshot {
    fn from(data: DataFile) -> Self {
        Self {
            tasks: Some(data.tasks),
            settings: Some(SyncSettings {
                theme: Some(data.settings.theme),
            }),
        }
    }
}

/// User intents sent by a view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    Add { title: String },
    Edit { id: String, title: String },
    ToggleUrgent { id: String },
    Duplicate { id: String },
    Complete { id: String },
    Restore { id: String },
    Delete { id: String },
    UndoDelete,
    ReorderActive { ids: Vec<String> },
    SetFilter { day_start: Option<Timestamp> },
    SetSortOrder { sort_order: SortOrder },
    SetCompletedSectionOpen { open: bool },
    SetTheme { theme: Theme },
    /// Derived views for the current time; `year`/`month` pick the calendar page.
    View {
        #[serde(default)]
        year: Option<i32>,
        #[serde(default)]
        month: Option<u32>,
    },
    Snapshot,
    Sync { snapshot: SyncSnapshot },
}
