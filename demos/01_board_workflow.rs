//! Demo 01: Board Workflow
//!
//! This demo walks a task across the board: adding, searching, dragging
//! between columns, cancelling a drag, and reopening the persisted board.
//!
//! Run with: cargo run --example 01_board_workflow

use eyre::Result;
use taskboard::{FileStorage, SearchMode, TaskDraft, TaskFilter, TaskStatus, TaskStore, TaskUpdate};

fn print_board<S: taskboard::KeyValueStore>(store: &TaskStore<S>) {
    for column in store.columns(&TaskFilter::all()) {
        println!("   {} ({})", column.title(), column.tasks.len());
        for task in column.tasks {
            println!("     {}. {}", task.order, task.title);
        }
    }
    println!();
}

fn main() -> Result<()> {
    // Create a temporary directory for this demo
    let temp_dir = tempfile::tempdir()?;
    let store_path = temp_dir.path().to_path_buf();

    println!("TaskBoard Workflow Demo");
    println!("=======================\n");
    println!("Store path: {}\n", store_path.display());

    let mut store = TaskStore::open(FileStorage::open(&store_path)?);
    let changes = std::rc::Rc::new(std::cell::Cell::new(0));
    let counter = changes.clone();
    store.subscribe(move |_| counter.set(counter.get() + 1));

    // ADD
    println!("1. ADD - Filling the board...");
    let milk = store.add(TaskDraft::new("Buy milk"))?;
    let report = store.add(TaskDraft::new("Write report").description("Quarterly numbers for the team"))?;
    let review = store.add(TaskDraft::new("Review pull request"))?;
    print_board(&store);

    // SEARCH
    println!("2. SEARCH - Looking for \"raport\"...");
    let fuzzy: Vec<&str> = store
        .query(&TaskFilter::all().search("raport"))
        .map(|t| t.title.as_str())
        .collect();
    let exact = store
        .query(&TaskFilter::all().search("raport").mode(SearchMode::Substring))
        .count();
    println!("   Fuzzy matches: {:?}", fuzzy);
    println!("   Substring matches: {}\n", exact);

    // DRAG
    println!("3. DRAG - Moving \"Write report\" to In Progress...");
    store.begin_drag(&report);
    let outcome = store.end_drag(Some("in_progress"));
    println!("   Outcome: {:?}\n", outcome);

    println!("4. DRAG - Dropping \"Buy milk\" outside any column...");
    store.begin_drag(&milk);
    let outcome = store.end_drag(Some("sidebar"));
    println!("   Outcome: {:?}\n", outcome);

    // EDIT / REORDER
    println!("5. EDIT - Finishing the review and moving it to the top...");
    store.edit(&review, TaskUpdate::default().status(TaskStatus::Completed))?;
    store.reorder(2, 0)?;
    print_board(&store);

    // DELETE
    println!("6. DELETE - Removing \"Buy milk\"...");
    store.delete(&milk);
    print_board(&store);

    println!("   Change notifications received: {}\n", changes.get());

    // REOPEN
    println!("7. REOPEN - Loading the board from disk...");
    let reopened = TaskStore::open(FileStorage::open(&store_path)?);
    println!("   Tasks after reopen: {}", reopened.len());
    print_board(&reopened);

    println!("Demo complete!");
    Ok(())
}
