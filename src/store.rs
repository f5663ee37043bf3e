// Task board state container with synchronous key-value persistence

use crate::clock::{Clock, SystemClock};
use crate::drag::{self, DragOutcome, DragSession};
use crate::filter::TaskFilter;
use crate::snapshot::{self, DEFAULT_KEY};
use crate::storage::{KeyValueStore, validate_key};
use crate::task::{
    Task, TaskDraft, TaskStatus, TaskUpdate, new_task_id, normalize_description, renumber, validate_title,
};
use eyre::{Result, eyre};
use tracing::{debug, info, warn};

/// Callback invoked with the full collection after each mutation
pub type Listener = Box<dyn FnMut(&[Task])>;

/// Handle returned by [`TaskStore::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Per-status task counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusCounts {
    pub total: usize,
    pub active: usize,
    pub in_progress: usize,
    pub completed: usize,
}

impl StatusCounts {
    pub fn get(&self, status: TaskStatus) -> usize {
        match status {
            TaskStatus::Active => self.active,
            TaskStatus::InProgress => self.in_progress,
            TaskStatus::Completed => self.completed,
        }
    }
}

/// One board column: the tasks in a status, in collection order
#[derive(Debug, Clone, PartialEq)]
pub struct Column<'a> {
    pub status: TaskStatus,
    pub tasks: Vec<&'a Task>,
}

impl Column<'_> {
    pub fn title(&self) -> &'static str {
        self.status.title()
    }
}

/// Owner of the task collection
///
/// Every mutating command writes the whole collection to storage before it
/// returns and then notifies subscribers. Storage write failures are logged and
/// counted; the in-memory state stays authoritative.
pub struct TaskStore<S: KeyValueStore> {
    storage: S,
    key: String,
    tasks: Vec<Task>,
    filter: TaskFilter,
    drag: Option<DragSession>,
    clock: Box<dyn Clock>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
    persist_failures: usize,
}

impl<S: KeyValueStore> TaskStore<S> {
    /// Open the store over `storage` using the default key
    pub fn open(storage: S) -> Self {
        Self::load(storage, DEFAULT_KEY.to_string())
    }

    /// Open the store over `storage` using a custom key
    pub fn open_with_key(storage: S, key: &str) -> Result<Self> {
        validate_key(key)?;
        Ok(Self::load(storage, key.to_string()))
    }

    fn load(storage: S, key: String) -> Self {
        let tasks = snapshot::load(&storage, &key);
        Self {
            storage,
            key,
            tasks,
            filter: TaskFilter::default(),
            drag: None,
            clock: Box::new(SystemClock),
            listeners: Vec::new(),
            next_subscription: 0,
            persist_failures: 0,
        }
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Mutable access to the storage adapter; writes through it bypass the store
    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Number of persistence writes that failed since the store was opened
    pub fn persist_failures(&self) -> usize {
        self.persist_failures
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// The whole collection in order
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }

    /// Lazily yield the tasks matching `filter`, in collection order
    pub fn query<'a>(&'a self, filter: &TaskFilter) -> impl Iterator<Item = &'a Task> + use<'a, S> {
        let matcher = filter.matcher();
        self.tasks.iter().filter(move |task| matcher.matches(task))
    }

    pub fn by_status(&self, status: TaskStatus) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |t| t.status == status)
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts {
            total: self.tasks.len(),
            ..StatusCounts::default()
        };
        for task in &self.tasks {
            match task.status {
                TaskStatus::Active => counts.active += 1,
                TaskStatus::InProgress => counts.in_progress += 1,
                TaskStatus::Completed => counts.completed += 1,
            }
        }
        counts
    }

    /// Matching tasks grouped into one column per status, empty columns included
    pub fn columns(&self, filter: &TaskFilter) -> Vec<Column<'_>> {
        let mut columns: Vec<Column<'_>> = TaskStatus::ALL
            .iter()
            .map(|&status| Column {
                status,
                tasks: Vec::new(),
            })
            .collect();

        for task in self.query(filter) {
            columns[task.status.column_index()].tasks.push(task);
        }
        columns
    }

    // ========================================================================
    // Transient filter
    // ========================================================================

    pub fn filter(&self) -> &TaskFilter {
        &self.filter
    }

    /// Replace the current filter; not persisted and not broadcast
    pub fn set_filter(&mut self, filter: TaskFilter) {
        debug!(?filter, "set_filter: called");
        self.filter = filter;
    }

    /// Tasks matching the current filter
    pub fn filtered(&self) -> impl Iterator<Item = &Task> {
        self.query(&self.filter)
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Create a task in the initial status at the end of the collection
    ///
    /// Returns the new task's id. A blank title is rejected and nothing changes.
    pub fn add(&mut self, draft: TaskDraft) -> Result<String> {
        let title = validate_title(&draft.title)?;

        let mut id = new_task_id();
        while self.position(&id).is_some() {
            id = new_task_id();
        }

        let now = self.clock.now_ms();
        let task = Task {
            id: id.clone(),
            title,
            description: normalize_description(draft.description),
            due_date: draft.due_date,
            status: TaskStatus::default(),
            created_at: now,
            updated_at: now,
            order: self.tasks.len(),
        };

        info!(id = %task.id, title = %task.title, "Added task");
        self.tasks.push(task);
        self.commit();
        Ok(id)
    }

    /// Merge `update` into the task with `id`
    ///
    /// Returns `Ok(false)` if no such task exists. A blank replacement title is
    /// rejected before anything changes.
    pub fn edit(&mut self, id: &str, update: TaskUpdate) -> Result<bool> {
        let title = update.title.as_deref().map(validate_title).transpose()?;

        let Some(index) = self.position(id) else {
            warn!(id, "Task not found for editing");
            return Ok(false);
        };

        let now = self.refreshed(self.tasks[index].updated_at);
        let task = &mut self.tasks[index];
        if let Some(title) = title {
            task.title = title;
        }
        if let Some(description) = update.description {
            task.description = normalize_description(description);
        }
        if let Some(due_date) = update.due_date {
            task.due_date = due_date;
        }
        if let Some(status) = update.status {
            task.status = status;
        }
        task.updated_at = now;

        info!(id, title = %task.title, "Edited task");
        self.commit();
        Ok(true)
    }

    /// Remove the task with `id` and renumber the rest
    pub fn delete(&mut self, id: &str) -> bool {
        let Some(index) = self.position(id) else {
            warn!(id, "Task not found for deletion");
            return false;
        };

        let removed = self.tasks.remove(index);
        renumber(&mut self.tasks);

        info!(id, title = %removed.title, "Deleted task");
        self.commit();
        true
    }

    /// Change only the status of the task with `id`
    pub fn set_status(&mut self, id: &str, status: TaskStatus) -> bool {
        let Some(index) = self.position(id) else {
            warn!(id, "Task not found for status update");
            return false;
        };

        let now = self.refreshed(self.tasks[index].updated_at);
        let task = &mut self.tasks[index];
        let from = task.status;
        task.status = status;
        task.updated_at = now;

        info!(id, %from, to = %status, "Updated task status");
        self.commit();
        true
    }

    /// Move the task at `from` to position `to` and renumber
    ///
    /// The moved task's `updated_at` is refreshed. Both indices must be valid
    /// positions; otherwise an error is returned and nothing changes.
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.tasks.len();
        if from >= len || to >= len {
            return Err(eyre!("Reorder indices out of range: {} -> {} (len {})", from, to, len));
        }
        if from == to {
            debug!(from, "reorder: task already in place");
            return Ok(());
        }

        let mut task = self.tasks.remove(from);
        task.updated_at = self.refreshed(task.updated_at);
        self.tasks.insert(to, task);
        renumber(&mut self.tasks);

        info!(from, to, "Reordered tasks");
        self.commit();
        Ok(())
    }

    /// Give the task with `id` a new status and move it to the end
    pub fn move_to_end(&mut self, id: &str, status: TaskStatus) -> bool {
        let Some(index) = self.position(id) else {
            warn!(id, "Task not found for move to end");
            return false;
        };

        let mut task = self.tasks.remove(index);
        task.status = status;
        task.updated_at = self.refreshed(task.updated_at);
        self.tasks.push(task);
        renumber(&mut self.tasks);

        info!(id, %status, "Moved task to end");
        self.commit();
        true
    }

    /// Add `drafts` only when the board is empty; returns how many were added
    pub fn seed_if_empty(&mut self, drafts: impl IntoIterator<Item = TaskDraft>) -> Result<usize> {
        if !self.tasks.is_empty() {
            debug!(count = self.tasks.len(), "seed_if_empty: board already has tasks");
            return Ok(0);
        }

        let mut added = 0;
        for draft in drafts {
            self.add(draft)?;
            added += 1;
        }
        info!(added, "Loaded sample tasks");
        Ok(added)
    }

    // ========================================================================
    // Drag and drop
    // ========================================================================

    pub fn active_drag(&self) -> Option<&DragSession> {
        self.drag.as_ref()
    }

    /// Start dragging the task with `id`, capturing its current status
    ///
    /// An unfinished drag is rolled back first. Returns `false` if no such task
    /// exists.
    pub fn begin_drag(&mut self, id: &str) -> bool {
        if self.drag.is_some() {
            let outcome = self.cancel_drag();
            debug!(?outcome, "Rolled back unfinished drag");
        }

        let Some(task) = self.get(id) else {
            warn!(id, "Task not found for drag start");
            return false;
        };

        let session = DragSession {
            task_id: task.id.clone(),
            previous_status: task.status,
        };
        debug!(id, previous_status = %session.previous_status, "Drag started");
        self.drag = Some(session);
        true
    }

    /// Finish the drag over the drop target `over`
    ///
    /// A target naming a status commits it; no target or an unknown one rolls
    /// back to the captured status.
    pub fn end_drag(&mut self, over: Option<&str>) -> DragOutcome {
        let Some(session) = self.drag.take() else {
            return DragOutcome::NoActiveDrag;
        };

        match drag::resolve_drop_target(over) {
            Some(target) => self.commit_drag(session, target),
            None => {
                if let Some(over) = over {
                    debug!(target = over, "Drop target is not a status column");
                }
                self.rollback_drag(session)
            }
        }
    }

    /// Abandon the drag, restoring the captured status
    pub fn cancel_drag(&mut self) -> DragOutcome {
        match self.drag.take() {
            Some(session) => self.rollback_drag(session),
            None => DragOutcome::NoActiveDrag,
        }
    }

    fn commit_drag(&mut self, session: DragSession, target: TaskStatus) -> DragOutcome {
        let DragSession { task_id, .. } = session;
        let Some(current) = self.get(&task_id).map(|t| t.status) else {
            warn!(id = %task_id, "Dragged task disappeared before drop");
            return DragOutcome::TaskMissing { task_id };
        };

        if current == target {
            debug!(id = %task_id, status = %current, "Dropped on own column");
            return DragOutcome::Unchanged {
                task_id,
                status: current,
            };
        }

        self.set_status(&task_id, target);
        DragOutcome::Committed {
            task_id,
            from: current,
            to: target,
        }
    }

    fn rollback_drag(&mut self, session: DragSession) -> DragOutcome {
        let DragSession {
            task_id,
            previous_status,
        } = session;
        let Some(current) = self.get(&task_id).map(|t| t.status) else {
            warn!(id = %task_id, "Dragged task disappeared before rollback");
            return DragOutcome::TaskMissing { task_id };
        };

        if current != previous_status {
            self.set_status(&task_id, previous_status);
        }

        debug!(id = %task_id, status = %previous_status, "Drag rolled back");
        DragOutcome::RolledBack {
            task_id,
            status: previous_status,
        }
    }

    // ========================================================================
    // Change notification
    // ========================================================================

    /// Call `listener` with the collection after every successful mutation
    pub fn subscribe(&mut self, listener: impl FnMut(&[Task]) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener; returns `false` if it was not registered
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    // ========================================================================
    // Helper methods
    // ========================================================================

    /// Timestamp for a task last touched at `previous`, strictly after it
    fn refreshed(&self, previous: i64) -> i64 {
        self.clock.now_ms().max(previous.saturating_add(1))
    }

    fn commit(&mut self) {
        self.persist();
        for (_, listener) in self.listeners.iter_mut() {
            listener(&self.tasks);
        }
    }

    fn persist(&mut self) {
        let result = match snapshot::encode(&self.tasks) {
            Ok(raw) => self.storage.set(&self.key, &raw),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => debug!(key = %self.key, count = self.tasks.len(), "Persisted tasks"),
            Err(e) => {
                self.persist_failures += 1;
                warn!(key = %self.key, error = ?e, "Failed to persist tasks, continuing in memory");
            }
        }
    }
}
