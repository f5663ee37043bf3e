use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use colored::{ColoredString, Colorize};
use eyre::{Result, eyre};
use std::path::PathBuf;
use taskboard::filter::SearchMode;
use taskboard::task::sample_drafts;
use taskboard::{
    Backend, Config, DragOutcome, KeyValueStore, StatusFilter, Task, TaskDraft, TaskFilter, TaskStatus, TaskStore,
    TaskUpdate,
};
use tracing_subscriber::EnvFilter;

type Board = TaskStore<Box<dyn KeyValueStore>>;

#[derive(Parser)]
#[command(name = "taskboard")]
#[command(about = "TaskBoard CLI - Task board with status columns and local persistence")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Path to the store directory (default: current directory)
    #[arg(short, long, default_value = ".")]
    store_path: PathBuf,

    /// YAML config file (default: <config dir>/taskboard/config.yml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Storage backend, overriding the config file
    #[arg(short, long, value_enum)]
    backend: Option<Backend>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a task to the Active column
    Add {
        title: String,
        #[arg(short, long)]
        description: Option<String>,
        /// Due date as YYYY-MM-DD
        #[arg(long)]
        due: Option<NaiveDate>,
    },

    /// List tasks in board order
    List {
        /// active, in_progress, completed or all
        #[arg(long, default_value = "all", value_parser = parse_status_filter)]
        status: StatusFilter,
        /// Search title and description
        #[arg(long)]
        search: Option<String>,
        /// Match the search string exactly instead of approximately
        #[arg(long)]
        exact: bool,
    },

    /// Show tasks grouped by status column
    Board {
        #[arg(long)]
        search: Option<String>,
    },

    /// Change fields of a task
    Edit {
        /// Task id or unique id prefix
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, conflicts_with = "clear_description")]
        description: Option<String>,
        #[arg(long)]
        clear_description: bool,
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<NaiveDate>,
        #[arg(long)]
        clear_due: bool,
        #[arg(long, value_parser = parse_status)]
        status: Option<TaskStatus>,
    },

    /// Set the status of a task
    Status {
        id: String,
        #[arg(value_parser = parse_status)]
        status: TaskStatus,
    },

    /// Move the task at one position to another
    Move { from: usize, to: usize },

    /// Delete a task
    Delete { id: String },

    /// Drag a task and drop it over a column (omit the target to miss)
    Drag { id: String, target: Option<String> },

    /// Show task counts per status
    Stats,

    /// Load sample tasks into an empty board
    Seed,
}

fn parse_status(s: &str) -> Result<TaskStatus, String> {
    s.parse().map_err(|e: eyre::Report| e.to_string())
}

fn parse_status_filter(s: &str) -> Result<StatusFilter, String> {
    s.parse().map_err(|e: eyre::Report| e.to_string())
}

fn main() -> Result<()> {
    // Setup tracing; library logs stay quiet unless RUST_LOG asks for them
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }

    // Open store
    let storage = config.open_storage(&cli.store_path)?;
    let mut store: Board = TaskStore::open_with_key(storage, &config.storage_key)?;
    let mode = config.search_mode();

    match cli.command {
        Commands::Add {
            title,
            description,
            due,
        } => {
            let draft = TaskDraft {
                title,
                description,
                due_date: due,
            };
            let id = store.add(draft)?;
            println!("Added task {}", id);
        }
        Commands::List { status, search, exact } => {
            let mode = if exact { SearchMode::Substring } else { mode };
            let filter = TaskFilter::all()
                .status(status)
                .search(search.unwrap_or_default())
                .mode(mode);
            let mut shown = 0;
            for task in store.query(&filter) {
                print_task(task);
                shown += 1;
            }
            if shown == 0 {
                println!("No tasks");
            }
        }
        Commands::Board { search } => {
            let filter = TaskFilter::all().search(search.unwrap_or_default()).mode(mode);
            for column in store.columns(&filter) {
                println!("{} ({})", column.title().bold(), column.tasks.len());
                for task in column.tasks {
                    print_task(task);
                }
                println!();
            }
        }
        Commands::Edit {
            id,
            title,
            description,
            clear_description,
            due,
            clear_due,
            status,
        } => {
            let Some(id) = resolve_id(&store, &id)? else {
                return Ok(());
            };

            let mut update = TaskUpdate {
                title,
                status,
                ..TaskUpdate::default()
            };
            if let Some(description) = description {
                update = update.description(description);
            } else if clear_description {
                update = update.clear_description();
            }
            if let Some(due) = due {
                update = update.due_date(due);
            } else if clear_due {
                update = update.clear_due_date();
            }

            if update.is_empty() {
                println!("Nothing to change");
                return Ok(());
            }
            if store.edit(&id, update)? {
                println!("Updated task {}", id);
            }
        }
        Commands::Status { id, status } => {
            let Some(id) = resolve_id(&store, &id)? else {
                return Ok(());
            };
            if store.set_status(&id, status) {
                println!("{} -> {}", id, status_label(status));
            }
        }
        Commands::Move { from, to } => {
            store.reorder(from, to)?;
            println!("Moved task {} -> {}", from, to);
        }
        Commands::Delete { id } => {
            let Some(id) = resolve_id(&store, &id)? else {
                return Ok(());
            };
            if store.delete(&id) {
                println!("Deleted task {}", id);
            }
        }
        Commands::Drag { id, target } => {
            let Some(id) = resolve_id(&store, &id)? else {
                return Ok(());
            };
            store.begin_drag(&id);
            match store.end_drag(target.as_deref()) {
                DragOutcome::Committed { task_id, from, to } => {
                    println!("{}: {} -> {}", task_id, status_label(from), status_label(to));
                }
                DragOutcome::Unchanged { task_id, status } => {
                    println!("{}: already {}", task_id, status_label(status));
                }
                DragOutcome::RolledBack { task_id, status } => {
                    println!("{}: no column there, stays {}", task_id, status_label(status));
                }
                DragOutcome::TaskMissing { task_id } => {
                    println!("{} Task {} disappeared", "!".yellow(), task_id);
                }
                DragOutcome::NoActiveDrag => {
                    return Err(eyre!("Drag did not start"));
                }
            }
        }
        Commands::Stats => {
            let counts = store.counts();
            println!("Total: {}", counts.total);
            for status in TaskStatus::ALL {
                println!("  {:<12} {}", status_label(status), counts.get(status));
            }
        }
        Commands::Seed => {
            let added = store.seed_if_empty(sample_drafts())?;
            if added == 0 {
                println!("Board already has tasks, nothing seeded");
            } else {
                println!("Seeded {} sample tasks", added);
            }
        }
    }

    if store.persist_failures() > 0 {
        eprintln!("{} Changes could not be saved", "warning:".yellow().bold());
    }

    Ok(())
}

/// Find the task named by a full id or a unique id prefix
fn resolve_id(store: &Board, input: &str) -> Result<Option<String>> {
    if store.get(input).is_some() {
        return Ok(Some(input.to_string()));
    }

    let matches: Vec<&str> = store
        .tasks()
        .iter()
        .filter(|t| t.id.starts_with(input))
        .map(|t| t.id.as_str())
        .collect();

    match matches.as_slice() {
        [] => {
            println!("{} No task matches {}", "!".yellow(), input);
            Ok(None)
        }
        [id] => Ok(Some(id.to_string())),
        _ => Err(eyre!("Task id prefix {} is ambiguous ({} matches)", input, matches.len())),
    }
}

fn status_label(status: TaskStatus) -> ColoredString {
    match status {
        TaskStatus::Active => status.as_str().blue(),
        TaskStatus::InProgress => status.as_str().yellow(),
        TaskStatus::Completed => status.as_str().green(),
    }
}

fn print_task(task: &Task) {
    let title = match task.status {
        TaskStatus::Completed => task.title.strikethrough(),
        _ => task.title.bold(),
    };

    let mut line = format!("{:>3}  {}  [{}]  {}", task.order, task.id.dimmed(), status_label(task.status), title);
    if let Some(due) = task.due_date {
        line.push_str(&format!("  (due {})", due));
    }
    println!("{}", line);

    if let Some(description) = &task.description {
        println!("       {}", description.dimmed());
    }
}
