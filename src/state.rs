use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{Local, TimeZone};

use crate::events::{StatePayload, SyncSnapshot};
use crate::models::{DataFile, Settings, SortOrder, Task, Theme, Timestamp, COPY_SUFFIX};
use crate::undo::{UndoBuffer, UndoToken, DEFAULT_UNDO_TTL_MS};
use crate::views::{self, CalendarCell, Reminder, TaskStats, ViewSnapshot};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("task not found: {0}")]
    NotFound(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
}

/// The single source of truth for tasks and settings. Cloning shares the same data.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Mutex<AppData>>,
    undo_ttl_ms: Timestamp,
}

impl AppState {
    pub fn new(tasks: Vec<Task>, settings: Settings) -> Self {
        Self::with_undo_ttl(tasks, settings, DEFAULT_UNDO_TTL_MS)
    }

    pub fn with_undo_ttl(tasks: Vec<Task>, settings: Settings, undo_ttl_ms: Timestamp) -> Self {
        Self {
            inner: Arc::new(Mutex::new(AppData {
                tasks: normalize_tasks(tasks),
                settings,
                filter_day: None,
                undo: UndoBuffer::new(),
            })),
            undo_ttl_ms,
        }
    }

    pub fn from_data_file(data: DataFile) -> Self {
        Self::new(data.tasks, data.settings)
    }

    pub fn undo_ttl_ms(&self) -> Timestamp {
        self.undo_ttl_ms
    }

    pub fn data_file(&self) -> DataFile {
        let guard = self.inner.lock().expect("state poisoned");
        DataFile {
            tasks: guard.tasks.clone(),
            settings: guard.settings.clone(),
        }
    }

    pub fn state_payload(&self, now: Timestamp) -> StatePayload {
        let guard = self.inner.lock().expect("state poisoned");
        StatePayload {
            tasks: guard.tasks.clone(),
            settings: guard.settings.clone(),
            filter_day: guard.filter_day,
            undo_pending: guard.undo.is_pending(now),
        }
    }

    pub fn tasks(&self) -> Vec<Task> {
        let guard = self.inner.lock().expect("state poisoned");
        guard.tasks.clone()
    }

    pub fn task(&self, task_id: &str) -> Option<Task> {
        let guard = self.inner.lock().expect("state poisoned");
        guard.tasks.iter().find(|t| t.id == task_id).cloned()
    }

    pub fn settings(&self) -> Settings {
        let guard = self.inner.lock().expect("state poisoned");
        guard.settings.clone()
    }

    pub fn filter_day(&self) -> Option<Timestamp> {
        let guard = self.inner.lock().expect("state poisoned");
        guard.filter_day
    }

    pub fn add_task(&self, title: &str, now: Timestamp) -> Result<Task, StoreError> {
        let title = validate_title(title)?;
        let mut guard = self.inner.lock().expect("state poisoned");
        let order = guard.tasks.iter().filter(|t| t.is_active()).count() as i64;
        let task = Task::new(title, now, order);
        guard.tasks.insert(0, task.clone());
        Ok(task)
    }

    pub fn duplicate_task(&self, task_id: &str, now: Timestamp) -> Result<Task, StoreError> {
        let mut guard = self.inner.lock().expect("state poisoned");
        let source = guard.find(task_id)?.clone();
        let mut copy = Task::new(
            format!("{}{COPY_SUFFIX}", source.title),
            now,
            guard.tasks.len() as i64,
        );
        copy.is_completed = source.is_completed;
        copy.completed_at = source.completed_at;
        copy.is_urgent = source.is_urgent;
        if copy.is_completed {
            guard.tasks.push(copy.clone());
        } else {
            guard.tasks.insert(0, copy.clone());
        }
        Ok(copy)
    }

    pub fn edit_title(&self, task_id: &str, title: &str) -> Result<Task, StoreError> {
        let title = validate_title(title)?;
        let mut guard = self.inner.lock().expect("state poisoned");
        let task = guard.find_mut(task_id)?;
        task.title = title;
        Ok(task.clone())
    }

    pub fn toggle_urgent(&self, task_id: &str) -> Result<Task, StoreError> {
        let mut guard = self.inner.lock().expect("state poisoned");
        let task = guard.find_mut(task_id)?;
        task.is_urgent = !task.is_urgent;
        Ok(task.clone())
    }

    /// Fails with `InvalidState` on an already completed task, leaving it untouched.
    pub fn complete_task(&self, task_id: &str, now: Timestamp) -> Result<Task, StoreError> {
        let mut guard = self.inner.lock().expect("state poisoned");
        let task = guard.find_mut(task_id)?;
        if task.is_completed {
            return Err(StoreError::InvalidState(format!(
                "task {task_id} is already completed"
            )));
        }
        task.is_completed = true;
        task.completed_at = Some(now);
        Ok(task.clone())
    }

    /// Fails with `InvalidState` on an already active task, leaving it untouched.
    pub fn restore_task(&self, task_id: &str) -> Result<Task, StoreError> {
        let mut guard = self.inner.lock().expect("state poisoned");
        let task = guard.find_mut(task_id)?;
        if task.is_active() {
            return Err(StoreError::InvalidState(format!(
                "task {task_id} is already active"
            )));
        }
        task.is_completed = false;
        task.completed_at = None;
        Ok(task.clone())
    }

    /// Removes the task and parks it in the undo slot. The returned token is what
    /// an expiry timer must present to close the window.
    pub fn delete_task(&self, task_id: &str, now: Timestamp) -> Result<UndoToken, StoreError> {
        let mut guard = self.inner.lock().expect("state poisoned");
        let index = guard
            .tasks
            .iter()
            .position(|t| t.id == task_id)
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
        let task = guard.tasks.remove(index);
        Ok(guard.undo.hold(task, now, self.undo_ttl_ms))
    }

    /// Puts the held task back at the front of the collection.
    pub fn undo_delete(&self, now: Timestamp) -> Result<Task, StoreError> {
        let mut guard = self.inner.lock().expect("state poisoned");
        let task = guard
            .undo
            .take(now)
            .ok_or_else(|| StoreError::InvalidState("nothing to undo".to_string()))?;
        if guard.tasks.iter().any(|t| t.id == task.id) {
            log::warn!(
                "undo dropped, task id={} already present in the collection",
                task.id
            );
            return Err(StoreError::InvalidState(format!(
                "task {} already exists",
                task.id
            )));
        }
        guard.tasks.insert(0, task.clone());
        Ok(task)
    }

    pub fn expire_undo(&self, token: UndoToken) -> bool {
        let mut guard = self.inner.lock().expect("state poisoned");
        guard.undo.expire(token)
    }

    pub fn expire_due_undo(&self, now: Timestamp) -> Option<UndoToken> {
        let mut guard = self.inner.lock().expect("state poisoned");
        guard.undo.expire_due(now)
    }

    pub fn undo_pending(&self, now: Timestamp) -> bool {
        let guard = self.inner.lock().expect("state poisoned");
        guard.undo.is_pending(now)
    }

    /// Applies a drag result. `id_order` must list every active task exactly once.
    /// Switches the list into manual sort mode.
    pub fn reorder_active(&self, id_order: &[String]) -> Result<(), StoreError> {
        let mut guard = self.inner.lock().expect("state poisoned");
        let active: HashSet<&str> = guard
            .tasks
            .iter()
            .filter(|t| t.is_active())
            .map(|t| t.id.as_str())
            .collect();
        let requested: HashSet<&str> = id_order.iter().map(String::as_str).collect();
        if requested.len() != id_order.len() {
            return Err(StoreError::Validation(
                "reorder contains duplicate ids".to_string(),
            ));
        }
        if requested != active {
            return Err(StoreError::Validation(
                "reorder must list exactly the active tasks".to_string(),
            ));
        }

        let (mut actives, completed): (Vec<Task>, Vec<Task>) =
            guard.tasks.drain(..).partition(|t| t.is_active());
        actives.sort_by_key(|t| id_order.iter().position(|id| *id == t.id));
        for (index, task) in actives.iter_mut().enumerate() {
            task.order = index as i64;
        }
        actives.extend(completed);
        guard.tasks = actives;
        guard.settings.sort_order = SortOrder::Manual;
        Ok(())
    }

    pub fn set_filter(&self, day_start: Option<Timestamp>) {
        let mut guard = self.inner.lock().expect("state poisoned");
        guard.filter_day = day_start;
    }

    pub fn set_sort_order(&self, sort_order: SortOrder) -> Settings {
        let mut guard = self.inner.lock().expect("state poisoned");
        guard.settings.sort_order = sort_order;
        guard.settings.clone()
    }

    pub fn set_completed_section_open(&self, open: bool) -> Settings {
        let mut guard = self.inner.lock().expect("state poisoned");
        guard.settings.completed_section_open = open;
        guard.settings.clone()
    }

    pub fn set_theme(&self, theme: Theme) -> Settings {
        let mut guard = self.inner.lock().expect("state poisoned");
        guard.settings.theme = theme;
        guard.settings.clone()
    }

    /// Full state for the sync collaborator.
    pub fn snapshot(&self) -> DataFile {
        self.data_file()
    }

    /// Merges an external snapshot: tasks are replaced wholesale, the theme is
    /// taken only when it differs. Returns whether the theme changed.
    pub fn apply_sync(&self, snapshot: SyncSnapshot) -> bool {
        let mut guard = self.inner.lock().expect("state poisoned");
        if let Some(tasks) = snapshot.tasks {
            guard.tasks = normalize_tasks(tasks);
        }
        match snapshot.settings.and_then(|s| s.theme) {
            Some(theme) if theme != guard.settings.theme => {
                guard.settings.theme = theme;
                true
            }
            _ => false,
        }
    }

    pub fn active_tasks(&self, filter_day: Option<Timestamp>, now: Timestamp) -> Vec<Task> {
        let guard = self.inner.lock().expect("state poisoned");
        views::active_tasks(&guard.tasks, guard.settings.sort_order, filter_day, now)
    }

    /// Active tasks under the stored day filter.
    pub fn visible_active_tasks(&self, now: Timestamp) -> Vec<Task> {
        let guard = self.inner.lock().expect("state poisoned");
        views::active_tasks(
            &guard.tasks,
            guard.settings.sort_order,
            guard.filter_day,
            now,
        )
    }

    pub fn completed_tasks(&self) -> Vec<Task> {
        let guard = self.inner.lock().expect("state poisoned");
        views::completed_tasks(&guard.tasks)
    }

    pub fn stats(&self, now: Timestamp) -> TaskStats {
        self.stats_in(now, &Local)
    }

    pub fn stats_in<Tz: TimeZone>(&self, now: Timestamp, tz: &Tz) -> TaskStats {
        let guard = self.inner.lock().expect("state poisoned");
        views::stats(&guard.tasks, now, tz)
    }

    pub fn reminders(&self, now: Timestamp) -> Vec<Reminder> {
        let guard = self.inner.lock().expect("state poisoned");
        views::reminders(&guard.tasks, now)
    }

    pub fn calendar_bucket(&self, day_start: Timestamp, day_end: Timestamp) -> usize {
        let guard = self.inner.lock().expect("state poisoned");
        views::calendar_bucket(&guard.tasks, day_start, day_end)
    }

    pub fn month_grid<Tz: TimeZone>(
        &self,
        year: i32,
        month: u32,
        now: Timestamp,
        tz: &Tz,
    ) -> Vec<CalendarCell> {
        let guard = self.inner.lock().expect("state poisoned");
        views::month_grid(&guard.tasks, year, month, now, tz)
    }

    /// Every derived view for one instant, read under a single lock.
    pub fn view<Tz: TimeZone>(&self, now: Timestamp, year: i32, month: u32, tz: &Tz) -> ViewSnapshot {
        let guard = self.inner.lock().expect("state poisoned");
        let stats = views::stats(&guard.tasks, now, tz);
        ViewSnapshot {
            now,
            active: views::active_tasks(
                &guard.tasks,
                guard.settings.sort_order,
                guard.filter_day,
                now,
            ),
            completed: views::completed_tasks(&guard.tasks),
            severity: stats.severity(),
            progress_percent: stats.progress_percent(),
            stats,
            reminders: views::reminders(&guard.tasks, now),
            calendar: views::month_grid(&guard.tasks, year, month, now, tz),
            settings: guard.settings.clone(),
            filter_day: guard.filter_day,
            undo_pending: guard.undo.is_pending(now),
        }
    }
}

#[derive(Debug)]
struct AppData {
    tasks: Vec<Task>,
    settings: Settings,
    filter_day: Option<Timestamp>,
    undo: UndoBuffer,
}

impl AppData {
    fn find(&self, task_id: &str) -> Result<&Task, StoreError> {
        self.tasks
            .iter()
            .find(|t| t.id == task_id)
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))
    }

    fn find_mut(&mut self, task_id: &str) -> Result<&mut Task, StoreError> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))
    }
}

fn validate_title(title: &str) -> Result<String, StoreError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(StoreError::Validation("title must not be empty".to_string()));
    }
    Ok(trimmed.to_string())
}

fn normalize_tasks(tasks: Vec<Task>) -> Vec<Task> {
    let mut seen = HashSet::new();
    tasks
        .into_iter()
        .filter_map(|mut task| {
            if !seen.insert(task.id.clone()) {
                log::warn!("dropping duplicate task id={}", task.id);
                return None;
            }
            task.normalize();
            Some(task)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SyncSettings;
    use crate::models::{DAY_MS, HOUR_MS};
    use chrono_tz::UTC;

    const BASE: Timestamp = 1_700_000_000_000;

    fn make_task(id: &str, created_at: Timestamp) -> Task {
        let mut task = Task::new(format!("task-{id}"), created_at, 0);
        task.id = id.to_string();
        task
    }

    fn make_state(tasks: Vec<Task>) -> AppState {
        AppState::new(tasks, Settings::default())
    }

    fn assert_completion_invariant(state: &AppState) {
        for task in state.tasks() {
            assert_eq!(task.is_completed, task.completed_at.is_some(), "task {}", task.id);
        }
    }

    fn ids(tasks: &[Task]) -> Vec<String> {
        tasks.iter().map(|t| t.id.clone()).collect()
    }

    #[test]
    fn new_normalizes_and_dedupes_loaded_tasks() {
        let mut completed_without_stamp = make_task("a", 10);
        completed_without_stamp.is_completed = true;
        let duplicate = make_task("a", 20);
        let state = make_state(vec![completed_without_stamp, duplicate, make_task("b", 30)]);

        let tasks = state.tasks();
        assert_eq!(ids(&tasks), vec!["a", "b"]);
        assert_eq!(tasks[0].completed_at, Some(10));
        assert_completion_invariant(&state);
    }

    #[test]
    fn add_task_rejects_blank_titles() {
        let state = make_state(Vec::new());
        assert!(matches!(state.add_task("", BASE), Err(StoreError::Validation(_))));
        assert!(matches!(state.add_task("   ", BASE), Err(StoreError::Validation(_))));
        assert!(state.tasks().is_empty());
    }

    #[test]
    fn add_task_trims_and_prepends() {
        let state = make_state(Vec::new());
        let a = state.add_task("  A ", BASE).unwrap();
        let b = state.add_task("B", BASE + 1).unwrap();

        assert_eq!(a.title, "A");
        assert_eq!(a.order, 0);
        assert_eq!(b.order, 1);
        assert!(!b.is_completed);
        assert_eq!(b.completed_at, None);
        assert_eq!(b.created_at, BASE + 1);
        assert_eq!(ids(&state.tasks()), vec![b.id.clone(), a.id.clone()]);
        assert_eq!(ids(&state.active_tasks(None, BASE + 2)), vec![b.id, a.id]);
    }

    #[test]
    fn add_task_order_counts_only_active_tasks() {
        let mut done = make_task("done", BASE);
        done.is_completed = true;
        done.completed_at = Some(BASE);
        let state = make_state(vec![done, make_task("x", BASE)]);
        let added = state.add_task("new", BASE + 1).unwrap();
        assert_eq!(added.order, 1);
    }

    #[test]
    fn duplicate_active_goes_to_front_and_completed_to_back() {
        let mut done = make_task("done", BASE);
        done.is_completed = true;
        done.completed_at = Some(BASE + 5);
        done.is_urgent = true;
        let state = make_state(vec![make_task("a", BASE), done]);

        let copy = state.duplicate_task("a", BASE + 10).unwrap();
        assert_eq!(copy.title, "task-a (Copy)");
        assert_eq!(copy.created_at, BASE + 10);
        assert_eq!(copy.order, 2);
        assert_ne!(copy.id, "a");
        assert_eq!(state.tasks()[0].id, copy.id);

        let done_copy = state.duplicate_task("done", BASE + 11).unwrap();
        assert!(done_copy.is_completed);
        assert_eq!(done_copy.completed_at, Some(BASE + 5));
        assert!(done_copy.is_urgent);
        assert_eq!(state.tasks().last().unwrap().id, done_copy.id);

        assert!(matches!(
            state.duplicate_task("missing", BASE),
            Err(StoreError::NotFound(_))
        ));
        assert_completion_invariant(&state);
    }

    #[test]
    fn edit_title_validates_and_replaces() {
        let state = make_state(vec![make_task("a", BASE)]);
        assert!(matches!(state.edit_title("a", "  "), Err(StoreError::Validation(_))));
        assert!(matches!(state.edit_title("x", "new"), Err(StoreError::NotFound(_))));
        assert_eq!(state.task("a").unwrap().title, "task-a");

        let edited = state.edit_title("a", "  renamed ").unwrap();
        assert_eq!(edited.title, "renamed");
        assert_eq!(state.task("a").unwrap().title, "renamed");
    }

    #[test]
    fn toggle_urgent_flips_independently_of_completion() {
        let state = make_state(vec![make_task("a", BASE)]);
        assert!(state.toggle_urgent("a").unwrap().is_urgent);
        state.complete_task("a", BASE).unwrap();
        let task = state.toggle_urgent("a").unwrap();
        assert!(!task.is_urgent);
        assert!(task.is_completed);
        assert!(matches!(state.toggle_urgent("x"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn complete_restore_complete_keeps_second_stamp() {
        let state = make_state(vec![make_task("a", BASE)]);
        state.complete_task("a", BASE + 100).unwrap();
        assert_completion_invariant(&state);
        let restored = state.restore_task("a").unwrap();
        assert_eq!(restored.completed_at, None);
        assert_completion_invariant(&state);
        state.complete_task("a", BASE + 200).unwrap();

        let task = state.task("a").unwrap();
        assert!(task.is_completed);
        assert_eq!(task.completed_at, Some(BASE + 200));
        assert_completion_invariant(&state);
    }

    #[test]
    fn double_complete_and_double_restore_leave_state_untouched() {
        let state = make_state(vec![make_task("a", BASE)]);
        state.complete_task("a", BASE + 1).unwrap();
        assert!(matches!(
            state.complete_task("a", BASE + 2),
            Err(StoreError::InvalidState(_))
        ));
        assert_eq!(state.task("a").unwrap().completed_at, Some(BASE + 1));

        state.restore_task("a").unwrap();
        assert!(matches!(state.restore_task("a"), Err(StoreError::InvalidState(_))));
        assert!(matches!(
            state.complete_task("missing", BASE),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(state.restore_task("missing"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn delete_then_undo_restores_identical_task_at_front() {
        let mut urgent = make_task("a", BASE);
        urgent.is_urgent = true;
        let state = make_state(vec![make_task("b", BASE + 1), urgent.clone()]);

        state.delete_task("a", BASE + 10).unwrap();
        assert!(state.task("a").is_none());
        assert!(state.active_tasks(None, BASE + 10).iter().all(|t| t.id != "a"));
        assert_eq!(state.stats_in(BASE + 10, &UTC).total_count, 1);
        assert!(state.undo_pending(BASE + 10));

        let restored = state.undo_delete(BASE + 20).unwrap();
        assert_eq!(restored, urgent);
        assert_eq!(state.tasks()[0].id, "a");
        assert!(state.active_tasks(None, BASE + 20).iter().any(|t| t.id == "a"));
        assert!(!state.undo_pending(BASE + 20));
    }

    #[test]
    fn undo_after_expiry_is_a_noop() {
        let state = make_state(vec![make_task("a", BASE)]);
        state.delete_task("a", BASE).unwrap();
        assert!(matches!(
            state.undo_delete(BASE + DEFAULT_UNDO_TTL_MS),
            Err(StoreError::InvalidState(_))
        ));
        assert!(state.tasks().is_empty());
    }

    #[test]
    fn timer_expiry_then_undo_is_a_noop() {
        let state = make_state(vec![make_task("a", BASE)]);
        let token = state.delete_task("a", BASE).unwrap();
        assert!(state.expire_undo(token));
        assert!(state.undo_delete(BASE + 1).is_err());
        assert!(state.tasks().is_empty());
    }

    #[test]
    fn late_timer_for_first_delete_does_not_clear_second() {
        let state = make_state(vec![make_task("a", BASE), make_task("b", BASE)]);
        let first = state.delete_task("a", BASE).unwrap();
        state.delete_task("b", BASE + 1_000).unwrap();

        assert!(!state.expire_undo(first));
        let restored = state.undo_delete(BASE + 2_000).unwrap();
        assert_eq!(restored.id, "b");
        assert!(state.task("a").is_none());
    }

    #[test]
    fn undo_refuses_to_duplicate_an_id_reintroduced_by_sync() {
        let state = make_state(vec![make_task("a", BASE)]);
        state.delete_task("a", BASE).unwrap();
        state.apply_sync(SyncSnapshot {
            tasks: Some(vec![make_task("a", BASE)]),
            settings: None,
        });
        assert!(matches!(state.undo_delete(BASE + 1), Err(StoreError::InvalidState(_))));
        assert_eq!(state.tasks().len(), 1);
    }

    #[test]
    fn delete_unknown_task_fails() {
        let state = make_state(Vec::new());
        assert!(matches!(
            state.delete_task("nope", BASE),
            Err(StoreError::NotFound(_))
        ));
        assert!(!state.undo_pending(BASE));
    }

    #[test]
    fn reorder_assigns_dense_order_and_enters_manual_mode() {
        let mut done = make_task("done", BASE);
        done.is_completed = true;
        done.completed_at = Some(BASE);
        let state = make_state(vec![
            make_task("a", BASE),
            done,
            make_task("b", BASE + 1),
            make_task("c", BASE + 2),
        ]);

        let order = vec!["c".to_string(), "a".to_string(), "b".to_string()];
        state.reorder_active(&order).unwrap();

        assert_eq!(state.settings().sort_order, SortOrder::Manual);
        assert_eq!(ids(&state.tasks()), vec!["c", "a", "b", "done"]);
        let actives = state.active_tasks(None, BASE);
        assert_eq!(ids(&actives), vec!["c", "a", "b"]);
        let orders: Vec<i64> = actives.iter().map(|t| t.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);

        // Switching back to a declared sort ignores the manual order.
        state.set_sort_order(SortOrder::Newest);
        assert_eq!(ids(&state.active_tasks(None, BASE)), vec!["c", "b", "a"]);
    }

    #[test]
    fn manual_mode_puts_new_duplicated_and_undone_tasks_first() {
        let state = make_state(vec![make_task("a", BASE), make_task("b", BASE + 1)]);
        state
            .reorder_active(&["b".to_string(), "a".to_string()])
            .unwrap();

        let c = state.add_task("C", BASE + 2).unwrap();
        assert_eq!(c.order, 2);
        assert_eq!(ids(&state.active_tasks(None, BASE + 2)), vec![c.id.as_str(), "b", "a"]);

        let copy = state.duplicate_task("a", BASE + 3).unwrap();
        assert_eq!(
            ids(&state.active_tasks(None, BASE + 3)),
            vec![copy.id.as_str(), c.id.as_str(), "b", "a"]
        );

        state.delete_task("a", BASE + 4).unwrap();
        state.undo_delete(BASE + 5).unwrap();
        assert_eq!(
            ids(&state.active_tasks(None, BASE + 5)),
            vec!["a", copy.id.as_str(), c.id.as_str(), "b"]
        );
        assert_eq!(state.settings().sort_order, SortOrder::Manual);
    }

    #[test]
    fn out_of_range_input_never_panics_queries() {
        let state = make_state(Vec::new());
        state.apply_sync(SyncSnapshot {
            tasks: Some(vec![make_task("old", Timestamp::MIN), make_task("new", Timestamp::MAX - 1)]),
            settings: None,
        });
        state.set_filter(Some(Timestamp::MAX - DAY_MS / 2));

        assert_eq!(ids(&state.visible_active_tasks(BASE)), vec!["new"]);
        let stats = state.stats_in(BASE, &UTC);
        assert_eq!(stats.active_count, 2);
        assert_eq!(stats.critical_count, 1);
        assert_eq!(state.reminders(BASE).len(), 1);
    }

    #[test]
    fn rejected_reorder_leaves_orders_untouched() {
        let mut a = make_task("a", BASE);
        a.order = 7;
        let mut b = make_task("b", BASE);
        b.order = 3;
        let mut done = make_task("done", BASE);
        done.is_completed = true;
        done.completed_at = Some(BASE);
        let state = make_state(vec![a, b, done]);
        let before = state.tasks();

        let missing = vec!["a".to_string()];
        assert!(matches!(state.reorder_active(&missing), Err(StoreError::Validation(_))));
        let duplicated = vec!["a".to_string(), "a".to_string(), "b".to_string()];
        assert!(matches!(state.reorder_active(&duplicated), Err(StoreError::Validation(_))));
        let extra = vec!["a".to_string(), "b".to_string(), "done".to_string()];
        assert!(matches!(state.reorder_active(&extra), Err(StoreError::Validation(_))));

        assert_eq!(state.tasks(), before);
        assert_eq!(state.settings().sort_order, SortOrder::Newest);
    }

    #[test]
    fn stored_filter_limits_visible_active_tasks() {
        let day = BASE - BASE.rem_euclid(DAY_MS);
        let state = make_state(vec![make_task("in", day + HOUR_MS), make_task("out", day - 1)]);
        state.set_filter(Some(day));
        assert_eq!(state.filter_day(), Some(day));
        assert_eq!(ids(&state.visible_active_tasks(day + 2 * HOUR_MS)), vec!["in"]);
        state.set_filter(None);
        assert_eq!(state.visible_active_tasks(day + 2 * HOUR_MS).len(), 2);
    }

    #[test]
    fn settings_setters_return_updated_settings() {
        let state = make_state(Vec::new());
        assert_eq!(state.set_sort_order(SortOrder::Oldest).sort_order, SortOrder::Oldest);
        assert!(state.set_completed_section_open(true).completed_section_open);
        assert_eq!(state.set_theme(Theme::Verdant).theme, Theme::Verdant);
        assert_eq!(state.data_file().settings.theme, Theme::Verdant);
    }

    #[test]
    fn apply_sync_replaces_tasks_and_only_reports_real_theme_change() {
        let state = make_state(vec![make_task("old", BASE)]);
        state.set_completed_section_open(true);

        let changed = state.apply_sync(SyncSnapshot {
            tasks: Some(vec![make_task("new", BASE)]),
            settings: Some(SyncSettings {
                theme: Some(Theme::Ember),
            }),
        });
        assert!(!changed);
        assert_eq!(ids(&state.tasks()), vec!["new"]);
        assert!(state.settings().completed_section_open);

        // A settings object without a theme leaves the theme alone.
        let changed = state.apply_sync(SyncSnapshot {
            tasks: None,
            settings: Some(SyncSettings { theme: None }),
        });
        assert!(!changed);
        assert_eq!(state.settings().theme, Theme::Ember);

        let changed = state.apply_sync(SyncSnapshot {
            tasks: None,
            settings: Some(SyncSettings {
                theme: Some(Theme::Arctic),
            }),
        });
        assert!(changed);
        assert_eq!(state.settings().theme, Theme::Arctic);
        assert_eq!(ids(&state.tasks()), vec!["new"]);
    }

    #[test]
    fn snapshot_round_trips_through_apply_sync() {
        let state = make_state(vec![make_task("a", BASE)]);
        let snapshot = state.snapshot();
        let other = make_state(Vec::new());
        other.apply_sync(SyncSnapshot::from(snapshot));
        assert_eq!(other.tasks(), state.tasks());
    }

    #[test]
    fn calendar_bucket_excludes_next_day_edge() {
        let day = BASE - BASE.rem_euclid(DAY_MS);
        let state = make_state(vec![
            make_task("edge", day + DAY_MS - 1),
            make_task("next", day + DAY_MS),
        ]);
        assert_eq!(state.calendar_bucket(day, day + DAY_MS), 1);
        assert_eq!(state.calendar_bucket(day + DAY_MS, day + 2 * DAY_MS), 1);
    }

    #[test]
    fn view_collects_every_derived_list() {
        let state = make_state(vec![make_task("old", BASE - 30 * HOUR_MS), make_task("new", BASE)]);
        state.complete_task("new", BASE).unwrap();
        let view = state.view(BASE, 2023, 11, &UTC);
        assert_eq!(ids(&view.active), vec!["old"]);
        assert_eq!(ids(&view.completed), vec!["new"]);
        assert_eq!(view.stats.overdue_count, 1);
        assert_eq!(view.reminders.len(), 1);
        assert!(!view.calendar.is_empty());
        assert!(!view.undo_pending);
        assert_eq!(view.progress_percent, 50.0);
    }
}
