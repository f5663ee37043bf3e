// Serialized form of the task collection

use crate::storage::KeyValueStore;
use crate::task::{Task, TaskStatus, normalize_description, renumber};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use eyre::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Key the collection is stored under unless configured otherwise
pub const DEFAULT_KEY: &str = "todos";

#[derive(Deserialize)]
#[serde(untagged)]
enum Layout {
    Flat(Vec<StoredTask>),
    Grouped(Vec<StoredBucket>),
}

/// One column of the grouped layout
#[derive(Deserialize)]
struct StoredBucket {
    status: String,
    #[serde(default)]
    title: Option<String>,
    tasks: Vec<StoredTask>,
}

/// A task record as any supported layout stores it
///
/// Timestamps are epoch milliseconds or ISO 8601 text. The grouped layout names
/// them `createdDate`/`editedDate` and may keep the description in `details`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTask {
    id: String,
    title: String,
    #[serde(default)]
    description: Option<serde_json::Value>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    due_date: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default, alias = "createdDate")]
    created_at: Option<Stamp>,
    #[serde(default, alias = "editedDate")]
    updated_at: Option<Stamp>,
    #[serde(default)]
    order: Option<usize>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Stamp {
    Millis(i64),
    Text(String),
}

impl Stamp {
    fn to_millis(&self) -> Option<i64> {
        match self {
            Stamp::Millis(ms) => Some(*ms),
            Stamp::Text(text) => parse_timestamp(text),
        }
    }
}

/// Parse an ISO 8601 timestamp into epoch milliseconds
///
/// Text without an offset is read as UTC. A bare date means its midnight.
fn parse_timestamp(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Some(at.timestamp_millis());
    }
    if let Ok(at) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(at.and_utc().timestamp_millis());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|at| at.and_utc().timestamp_millis())
}

fn parse_due_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(text).and_then(DateTime::from_timestamp_millis).map(|at| at.date_naive()))
}

/// Rank and status for a stored status name
///
/// Besides the three statuses this reads the four-stage board: `0`/backlog,
/// `1`/in progress, `2`/review and `3`/done. Review work is still in progress.
fn stage(name: &str) -> Option<(usize, TaskStatus)> {
    let name = name.trim().to_lowercase();
    if let Ok(status) = name.parse::<TaskStatus>() {
        let rank = match status {
            TaskStatus::Active => 0,
            TaskStatus::InProgress => 1,
            TaskStatus::Completed => 3,
        };
        return Some((rank, status));
    }

    match name.as_str() {
        "0" | "backlog" => Some((0, TaskStatus::Active)),
        "1" | "in progress" => Some((1, TaskStatus::InProgress)),
        "2" | "review" => Some((2, TaskStatus::InProgress)),
        "3" | "done" => Some((3, TaskStatus::Completed)),
        _ => None,
    }
}

impl StoredTask {
    /// Convert to a task; `column` is the status of the bucket holding it
    fn into_task(self, column: Option<TaskStatus>) -> Option<Task> {
        let status = match (column, self.status.as_deref().map(str::trim)) {
            (Some(status), _) => status,
            (None, None | Some("")) => TaskStatus::default(),
            (None, Some(name)) => match stage(name) {
                Some((_, status)) => status,
                None => {
                    warn!(id = %self.id, status = name, "Dropping stored task with unknown status");
                    return None;
                }
            },
        };

        let created_at = self.created_at.as_ref().and_then(Stamp::to_millis);
        let updated_at = self.updated_at.as_ref().and_then(Stamp::to_millis);
        if created_at.is_none() && updated_at.is_none() {
            debug!(id = %self.id, "Stored task has no readable timestamps");
        }
        let created_at = created_at.or(updated_at).unwrap_or(0);
        let updated_at = updated_at.unwrap_or(created_at).max(created_at);

        let description = match self.description {
            Some(serde_json::Value::String(text)) => Some(text),
            _ => self.details,
        };

        Some(Task {
            id: self.id,
            title: self.title,
            description: normalize_description(description),
            due_date: self.due_date.as_deref().and_then(parse_due_date),
            status,
            created_at,
            updated_at,
            order: self.order.unwrap_or_default(),
        })
    }
}

/// Serialize the collection as a flat JSON array
pub fn encode(tasks: &[Task]) -> Result<String> {
    serde_json::to_string(tasks).context("Failed to serialize tasks")
}

/// Parse a stored collection
///
/// Accepts the flat layout and the grouped layout. Grouped buckets are
/// flattened in column order and each task takes its bucket's status. Records
/// with a blank title or an unknown status are dropped; for duplicate ids the
/// copy with the latest `updated_at` wins and keeps the position of the first
/// occurrence. Orders are renumbered to match positions.
pub fn decode(raw: &str) -> Result<Vec<Task>> {
    let layout: Layout = serde_json::from_str(raw).context("Failed to parse stored tasks")?;

    let parsed: Vec<Task> = match layout {
        Layout::Flat(tasks) => tasks.into_iter().filter_map(|task| task.into_task(None)).collect(),
        Layout::Grouped(buckets) => {
            let mut columns: Vec<(usize, Option<TaskStatus>, Vec<StoredTask>)> = buckets
                .into_iter()
                .map(|bucket| {
                    let found = stage(&bucket.status).or_else(|| bucket.title.as_deref().and_then(stage));
                    if found.is_none() {
                        warn!(status = %bucket.status, "Unknown column in stored tasks");
                    }
                    let (rank, status) = found.map_or((usize::MAX, None), |(rank, status)| (rank, Some(status)));
                    (rank, status, bucket.tasks)
                })
                .collect();
            columns.sort_by_key(|(rank, _, _)| *rank);

            columns
                .into_iter()
                .flat_map(|(_, status, tasks)| tasks.into_iter().filter_map(move |task| task.into_task(status)))
                .collect()
        }
    };

    let mut tasks: Vec<Task> = Vec::with_capacity(parsed.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for task in parsed {
        if task.title.trim().is_empty() {
            warn!(id = %task.id, "Dropping stored task with empty title");
            continue;
        }

        // Keep the record with the latest updated_at
        match positions.get(&task.id) {
            Some(&index) => {
                warn!(id = %task.id, "Duplicate task id in stored data");
                if task.updated_at > tasks[index].updated_at {
                    tasks[index] = task;
                }
            }
            None => {
                positions.insert(task.id.clone(), tasks.len());
                tasks.push(task);
            }
        }
    }

    renumber(&mut tasks);
    Ok(tasks)
}

/// Load the collection under `key`, falling back to an empty board
///
/// A missing key, a storage read error, or unparseable data all yield an
/// empty collection; the latter two are logged.
pub fn load<S: KeyValueStore + ?Sized>(storage: &S, key: &str) -> Vec<Task> {
    let raw = match storage.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!(key, "No saved tasks, starting empty");
            return Vec::new();
        }
        Err(e) => {
            warn!(key, error = ?e, "Failed to read saved tasks, starting empty");
            return Vec::new();
        }
    };

    match decode(&raw) {
        Ok(tasks) => {
            info!(key, count = tasks.len(), "Loaded saved tasks");
            tasks
        }
        Err(e) => {
            warn!(key, error = ?e, "Saved tasks are corrupt, starting empty");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use chrono::NaiveDate;

    fn task(id: &str, status: TaskStatus, order: usize, updated_at: i64) -> Task {
        Task {
            id: id.to_string(),
            title: format!("Task {}", id),
            description: None,
            due_date: None,
            status,
            created_at: 1000,
            updated_at,
            order,
        }
    }

    #[test]
    fn test_roundtrip_is_lossless() {
        let mut first = task("a", TaskStatus::Active, 0, 1000);
        first.description = Some("with details".to_string());
        first.due_date = NaiveDate::from_ymd_opt(2024, 1, 15);
        let tasks = vec![first, task("b", TaskStatus::Completed, 1, 2000)];

        let raw = encode(&tasks).unwrap();
        assert!(raw.starts_with('['));
        assert_eq!(decode(&raw).unwrap(), tasks);
    }

    #[test]
    fn test_decode_empty_array() {
        assert!(decode("[]").unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode("not json").is_err());
        assert!(decode("{\"todos\": 1}").is_err());
    }

    #[test]
    fn test_decode_drops_unknown_status() {
        let raw = r#"[
            {"id": "a", "title": "Archived", "status": "archived", "createdAt": 1, "updatedAt": 1},
            {"id": "b", "title": "Kept", "status": "completed", "createdAt": 1, "updatedAt": 1}
        ]"#;
        let tasks = decode(raw).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "b");
        assert_eq!(tasks[0].order, 0);
    }

    #[test]
    fn test_decode_renumbers_orders() {
        let raw = encode(&[task("a", TaskStatus::Active, 5, 1), task("b", TaskStatus::Active, 9, 1)]).unwrap();
        let orders: Vec<usize> = decode(&raw).unwrap().iter().map(|t| t.order).collect();
        assert_eq!(orders, vec![0, 1]);
    }

    #[test]
    fn test_decode_missing_order_and_status() {
        let raw = r#"[{"id":"a","title":"Legacy","createdAt":1,"updatedAt":2}]"#;
        let tasks = decode(raw).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].status, TaskStatus::Active);
        assert_eq!(tasks[0].order, 0);
    }

    #[test]
    fn test_decode_duplicate_ids_keep_latest() {
        let mut newer = task("a", TaskStatus::Completed, 2, 5000);
        newer.title = "Newer".to_string();
        let raw = encode(&[task("a", TaskStatus::Active, 0, 1000), task("b", TaskStatus::Active, 1, 1000), newer]).unwrap();

        let tasks = decode(&raw).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, "a");
        assert_eq!(tasks[0].title, "Newer");
        assert_eq!(tasks[0].status, TaskStatus::Completed);
        assert_eq!(tasks[1].id, "b");
    }

    #[test]
    fn test_decode_drops_blank_titles() {
        let mut blank = task("a", TaskStatus::Active, 0, 1);
        blank.title = "  ".to_string();
        let raw = encode(&[blank, task("b", TaskStatus::Active, 1, 1)]).unwrap();

        let tasks = decode(&raw).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "b");
        assert_eq!(tasks[0].order, 0);
    }

    #[test]
    fn test_decode_grouped_layout() {
        let raw = r#"[
            {"status": "completed", "title": "Completed", "tasks": [
                {"id": "c", "title": "Done thing", "status": "active", "createdAt": 1, "updatedAt": 1}
            ]},
            {"status": "active", "tasks": [
                {"id": "a", "title": "First", "createdAt": 1, "updatedAt": 1},
                {"id": "b", "title": "Second", "createdAt": 1, "updatedAt": 1}
            ]},
            {"status": "in_progress", "tasks": []}
        ]"#;

        let tasks = decode(raw).unwrap();
        let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(tasks[2].status, TaskStatus::Completed);
        let orders: Vec<usize> = tasks.iter().map(|t| t.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[test]
    fn test_decode_flat_records_with_iso_timestamps() {
        // Records written with local date-times rather than epoch milliseconds
        let raw = r#"[
            {"id": "1705314600123", "title": "Learn React", "description": "Hooks first",
             "status": "in_progress", "createdAt": "2024-01-15T10:30:00.123",
             "updatedAt": "2024-01-16T08:00:00.5", "dueDate": "2024-01-20", "order": 0},
            {"id": "1705314600999", "title": "Ship it", "status": "completed",
             "createdAt": "2024-01-15T10:30:00", "updatedAt": "2024-01-15T11:00:00Z", "order": 1}
        ]"#;

        let tasks = decode(raw).unwrap();
        assert_eq!(tasks.len(), 2);

        let first = &tasks[0];
        assert_eq!(first.status, TaskStatus::InProgress);
        assert_eq!(first.description.as_deref(), Some("Hooks first"));
        assert_eq!(first.due_date, NaiveDate::from_ymd_opt(2024, 1, 20));
        assert_eq!(first.created_at, 1_705_314_600_123);
        assert_eq!(first.updated_at, 1_705_392_000_500);

        assert_eq!(tasks[1].created_at, 1_705_314_600_000);
        assert_eq!(tasks[1].updated_at, 1_705_316_400_000);
    }

    #[test]
    fn test_decode_four_stage_template() {
        let raw = r#"[
            {"title": "Backlog", "status": "0", "tasks": []},
            {"title": "In Progress", "status": "1", "tasks": []},
            {"title": "Review", "status": "2", "tasks": []},
            {"title": "Done", "status": "3", "tasks": []}
        ]"#;
        assert!(decode(raw).unwrap().is_empty());
    }

    #[test]
    fn test_decode_four_stage_board() {
        // Columns come back in the order they were last rewritten
        let raw = r#"[
            {"title": "Done", "status": "3", "tasks": [
                {"id": "d", "title": "Released", "priority": "low", "status": "3",
                 "createdDate": "2024-01-10T09:00:00.000Z", "editedDate": "2024-01-12T09:00:00.000Z"}
            ]},
            {"title": "Review", "status": "2", "tasks": [
                {"id": "r", "title": "Check copy", "details": "Landing page", "priority": "high", "status": "2",
                 "dueDate": "2024-02-01"}
            ]},
            {"title": "Backlog", "status": "0", "tasks": [
                {"id": "b", "title": "Plan sprint", "description": "", "priority": "medium", "status": "0",
                 "createdDate": "2024-01-11T09:00:00.000Z"}
            ]},
            {"title": "In Progress", "status": "1", "tasks": [
                {"id": "p", "title": "Build board", "description": "Columns", "priority": "high", "status": "1"}
            ]}
        ]"#;

        let tasks = decode(raw).unwrap();
        let summary: Vec<(&str, TaskStatus)> = tasks.iter().map(|t| (t.id.as_str(), t.status)).collect();
        assert_eq!(
            summary,
            vec![
                ("b", TaskStatus::Active),
                ("p", TaskStatus::InProgress),
                ("r", TaskStatus::InProgress),
                ("d", TaskStatus::Completed),
            ]
        );

        assert_eq!(tasks[0].description, None);
        assert_eq!(tasks[0].created_at, tasks[0].updated_at);
        assert_eq!(tasks[1].description.as_deref(), Some("Columns"));
        assert_eq!(tasks[2].description.as_deref(), Some("Landing page"));
        assert_eq!(tasks[2].due_date, NaiveDate::from_ymd_opt(2024, 2, 1));
        assert!(tasks[3].updated_at > tasks[3].created_at);

        let orders: Vec<usize> = tasks.iter().map(|t| t.order).collect();
        assert_eq!(orders, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("1970-01-01T00:00:01.5"), Some(1_500));
        assert_eq!(parse_timestamp("1970-01-01T01:00:00+01:00"), Some(0));
        assert_eq!(parse_timestamp("1970-01-02"), Some(86_400_000));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_load_missing_key() {
        let storage = MemoryStorage::new();
        assert!(load(&storage, DEFAULT_KEY).is_empty());
    }

    #[test]
    fn test_load_corrupt_data_falls_back_to_empty() {
        let mut storage = MemoryStorage::new();
        storage.set(DEFAULT_KEY, "{broken").unwrap();
        assert!(load(&storage, DEFAULT_KEY).is_empty());
    }

    #[test]
    fn test_load_saved_tasks() {
        let mut storage = MemoryStorage::new();
        let tasks = vec![task("a", TaskStatus::InProgress, 0, 1)];
        storage.set(DEFAULT_KEY, &encode(&tasks).unwrap()).unwrap();
        assert_eq!(load(&storage, DEFAULT_KEY), tasks);
    }
}
