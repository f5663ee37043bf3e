// Drag-and-drop status transitions
//
// A drag captures the task's status when it starts. Dropping over a status
// column commits that status; dropping anywhere else, or cancelling, restores
// the captured one. The task's status stays legal for the whole drag.

use crate::task::TaskStatus;

/// In-flight drag of one task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragSession {
    pub task_id: String,
    pub previous_status: TaskStatus,
}

/// How a drag interaction ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragOutcome {
    /// Dropped on a different column; the task moved
    Committed {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
    },
    /// Dropped on the column the task is already in
    Unchanged { task_id: String, status: TaskStatus },
    /// Missed every column or was cancelled; the captured status is back
    RolledBack { task_id: String, status: TaskStatus },
    /// The task was deleted while being dragged
    TaskMissing { task_id: String },
    /// No drag was in progress
    NoActiveDrag,
}

impl DragOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, DragOutcome::Committed { .. })
    }

    /// Status the dragged task ended with, if it still exists
    pub fn final_status(&self) -> Option<TaskStatus> {
        match self {
            DragOutcome::Committed { to, .. } => Some(*to),
            DragOutcome::Unchanged { status, .. } | DragOutcome::RolledBack { status, .. } => Some(*status),
            DragOutcome::TaskMissing { .. } | DragOutcome::NoActiveDrag => None,
        }
    }
}

/// Map a drop target id to the status column it names
///
/// Column ids are the status strings. Anything else, including no target at
/// all, is a miss.
pub fn resolve_drop_target(over: Option<&str>) -> Option<TaskStatus> {
    over.and_then(|id| id.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_drop_target() {
        assert_eq!(resolve_drop_target(Some("completed")), Some(TaskStatus::Completed));
        assert_eq!(resolve_drop_target(Some("in_progress")), Some(TaskStatus::InProgress));
        assert_eq!(resolve_drop_target(Some("sidebar")), None);
        assert_eq!(resolve_drop_target(Some("")), None);
        assert_eq!(resolve_drop_target(None), None);
    }

    #[test]
    fn test_outcome_final_status() {
        let committed = DragOutcome::Committed {
            task_id: "a".to_string(),
            from: TaskStatus::Active,
            to: TaskStatus::Completed,
        };
        assert!(committed.is_committed());
        assert_eq!(committed.final_status(), Some(TaskStatus::Completed));

        let rolled_back = DragOutcome::RolledBack {
            task_id: "a".to_string(),
            status: TaskStatus::Active,
        };
        assert!(!rolled_back.is_committed());
        assert_eq!(rolled_back.final_status(), Some(TaskStatus::Active));

        assert_eq!(DragOutcome::NoActiveDrag.final_status(), None);
    }
}
