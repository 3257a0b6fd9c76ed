use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

pub const HOUR_MS: Timestamp = 60 * 60 * 1000;
pub const DAY_MS: Timestamp = 24 * HOUR_MS;

/// Active tasks older than this are overdue.
pub const OVERDUE_AFTER_MS: Timestamp = DAY_MS;
/// Active tasks older than this are critical.
pub const CRITICAL_AFTER_MS: Timestamp = 2 * DAY_MS;

pub const COPY_SUFFIX: &str = " (Copy)";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub created_at: Timestamp,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub completed_at: Option<Timestamp>,
    #[serde(default)]
    pub is_urgent: bool,
    #[serde(default)]
    pub order: i64,
}

impl Task {
    pub fn new(title: String, created_at: Timestamp, order: i64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title,
            created_at,
            is_completed: false,
            completed_at: None,
            is_urgent: false,
            order,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.is_completed
    }

    /// Age in ms at `now`; negative for tasks stamped in the future. Saturates
    /// on out-of-range stamps from imported data.
    pub fn age_at(&self, now: Timestamp) -> Timestamp {
        now.saturating_sub(self.created_at)
    }

    pub fn is_overdue_at(&self, now: Timestamp) -> bool {
        self.is_active() && self.age_at(now) > OVERDUE_AFTER_MS
    }

    pub fn is_critical_at(&self, now: Timestamp) -> bool {
        self.is_active() && self.age_at(now) > CRITICAL_AFTER_MS
    }

    /// Brings a stored task back in line with the completion invariant.
    pub fn normalize(&mut self) {
        self.title = self.title.trim().to_string();
        match (self.is_completed, self.completed_at) {
            (true, None) => self.completed_at = Some(self.created_at),
            (false, Some(_)) => self.completed_at = None,
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    Overdue,
    /// Entered by a drag reorder; active tasks follow their `order` field.
    Manual,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Ember,
    Arctic,
    Verdant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub sort_order: SortOrder,
    #[serde(default)]
    pub completed_section_open: bool,
    #[serde(default)]
    pub theme: Theme,
}

/// The persisted blob stored under the single storage key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DataFile {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub settings: Settings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_default_values() {
        let settings = Settings::default();
        assert_eq!(settings.sort_order, SortOrder::Newest);
        assert!(!settings.completed_section_open);
        assert_eq!(settings.theme, Theme::Ember);
    }

    #[test]
    fn age_saturates_for_out_of_range_stamps() {
        let ancient = Task::new("ancient".to_string(), Timestamp::MIN, 0);
        assert_eq!(ancient.age_at(1), Timestamp::MAX);
        assert!(ancient.is_critical_at(1));

        let future = Task::new("future".to_string(), Timestamp::MAX, 0);
        assert_eq!(future.age_at(-2), Timestamp::MIN);
        assert!(!future.is_overdue_at(-2));
    }

    #[test]
    fn stored_blob_with_missing_optional_fields_deserializes() {
        // Tasks written by the add path never carried `isUrgent`.
        let json = r#"
        {
          "tasks": [
            {
              "id": "t1",
              "title": "Buy milk",
              "createdAt": 1700000000000,
              "isCompleted": false,
              "completedAt": null,
              "order": 0
            }
          ],
          "settings": {
            "sortOrder": "newest",
            "completedSectionOpen": true,
            "theme": "arctic"
          }
        }
        "#;

        let data: DataFile = serde_json::from_str(json).expect("blob should deserialize");
        assert_eq!(data.tasks.len(), 1);
        assert!(!data.tasks[0].is_urgent);
        assert_eq!(data.tasks[0].created_at, 1_700_000_000_000);
        assert!(data.settings.completed_section_open);
        assert_eq!(data.settings.theme, Theme::Arctic);
    }

    #[test]
    fn settings_fields_default_individually() {
        let settings: Settings =
            serde_json::from_str(r#"{ "theme": "verdant" }"#).expect("settings");
        assert_eq!(settings.theme, Theme::Verdant);
        assert_eq!(settings.sort_order, SortOrder::Newest);
        assert!(!settings.completed_section_open);
    }

    #[test]
    fn task_serializes_with_camel_case_keys() {
        let task = Task {
            id: "a".to_string(),
            title: "x".to_string(),
            created_at: 5,
            is_completed: true,
            completed_at: Some(9),
            is_urgent: true,
            order: 2,
        };
        let value = serde_json::to_value(&task).expect("serialize task");
        assert_eq!(
            value,
            serde_json::json!({
              "id": "a",
              "title": "x",
              "createdAt": 5,
              "isCompleted": true,
              "completedAt": 9,
              "isUrgent": true,
              "order": 2
            })
        );
    }

    #[test]
    fn normalize_restores_completion_invariant() {
        let mut done = Task::new("  done  ".to_string(), 10, 0);
        done.is_completed = true;
        done.normalize();
        assert_eq!(done.title, "done");
        assert_eq!(done.completed_at, Some(10));

        let mut active = Task::new("active".to_string(), 10, 0);
        active.completed_at = Some(20);
        active.normalize();
        assert_eq!(active.completed_at, None);
    }

    #[test]
    fn overdue_and_critical_thresholds_are_strict() {
        let task = Task::new("t".to_string(), 0, 0);
        assert!(!task.is_overdue_at(DAY_MS));
        assert!(task.is_overdue_at(DAY_MS + 1));
        assert!(!task.is_critical_at(2 * DAY_MS));
        assert!(task.is_critical_at(2 * DAY_MS + 1));

        let mut done = task.clone();
        done.is_completed = true;
        done.completed_at = Some(1);
        assert!(!done.is_overdue_at(10 * DAY_MS));
    }

    #[test]
    fn new_tasks_get_distinct_ids() {
        let a = Task::new("a".to_string(), 1, 0);
        let b = Task::new("a".to_string(), 1, 0);
        assert_ne!(a.id, b.id);
    }
}
