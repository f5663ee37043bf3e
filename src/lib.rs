// TaskBoard - Task board state store with drag-and-drop status transitions and key-value persistence

pub mod clock;
pub mod config;
pub mod drag;
pub mod filter;
pub mod snapshot;
pub mod storage;
pub mod store;
pub mod task;

// Re-export main types for convenience
pub use clock::{Clock, ManualClock, SystemClock, now_ms};
pub use config::{Backend, Config};
pub use drag::{DragOutcome, DragSession};
pub use filter::{SearchMode, StatusFilter, TaskFilter};
pub use storage::{FileStorage, KeyValueStore, MemoryStorage, SqliteStorage};
pub use store::{Column, StatusCounts, SubscriptionId, TaskStore};
pub use task::{Task, TaskDraft, TaskStatus, TaskUpdate};
