// Task records and the commands that create and modify them

use chrono::NaiveDate;
use eyre::{Result, eyre};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Workflow stage a task occupies
///
/// The declaration order is the column order of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Active,
    InProgress,
    Completed,
}

impl TaskStatus {
    /// Every status, in column order
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Active, TaskStatus::InProgress, TaskStatus::Completed];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Active => "active",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }

    /// Human-readable column title
    pub fn title(&self) -> &'static str {
        match self {
            TaskStatus::Active => "Active",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Completed => "Completed",
        }
    }

    /// Position of this status in column order
    pub fn column_index(&self) -> usize {
        match self {
            TaskStatus::Active => 0,
            TaskStatus::InProgress => 1,
            TaskStatus::Completed => 2,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "active" => Ok(TaskStatus::Active),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(eyre!(
                "Unknown status: {} (expected active, in_progress or completed)",
                other
            )),
        }
    }
}

/// A single item on the board
///
/// Field names serialize in camelCase, the layout the browser build of the
/// board used. Timestamps are written as epoch milliseconds; the ISO text and
/// four-stage columns that build stored are converted by `snapshot::decode`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: TaskStatus,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub order: usize,
}

/// Input for creating a task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }
}

/// Partial update applied by `TaskStore::edit`
///
/// `None` leaves a field untouched. The nested options on `description` and
/// `due_date` allow clearing: `Some(None)` removes the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub due_date: Option<Option<NaiveDate>>,
    pub status: Option<TaskStatus>,
}

impl TaskUpdate {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(Some(description.into()));
        self
    }

    pub fn clear_description(mut self) -> Self {
        self.description = Some(None);
        self
    }

    pub fn due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(Some(due_date));
        self
    }

    pub fn clear_due_date(mut self) -> Self {
        self.due_date = Some(None);
        self
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.due_date.is_none() && self.status.is_none()
    }
}

/// Trim a title, rejecting blank input
pub fn validate_title(title: &str) -> Result<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(eyre!("Task title cannot be empty or whitespace-only"));
    }
    Ok(trimmed.to_string())
}

/// Trim a description; blank descriptions become `None`
pub fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

/// Fresh time-ordered task identifier
pub fn new_task_id() -> String {
    Uuid::now_v7().to_string()
}

/// Rewrite `order` so it matches each task's position
pub fn renumber(tasks: &mut [Task]) {
    for (index, task) in tasks.iter_mut().enumerate() {
        task.order = index;
    }
}

/// Starter tasks offered on an empty board
pub fn sample_drafts() -> Vec<TaskDraft> {
    let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d);
    let entries = [
        ("Learn React hooks", "Go through useState, useEffect, useContext and friends", date(2024, 1, 15)),
        ("Set up the store", "Create the state container for the application", date(2024, 1, 20)),
        ("Style the components", "Apply a consistent look to every column and card", date(2024, 1, 25)),
        ("Add drag and drop", "Let tasks be dragged between status columns", date(2024, 1, 30)),
        ("Test the application", "Write unit tests for every component", date(2024, 2, 5)),
    ];

    entries
        .into_iter()
        .map(|(title, description, due_date)| TaskDraft {
            title: title.to_string(),
            description: Some(description.to_string()),
            due_date,
        })
        .collect()
}
