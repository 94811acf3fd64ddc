use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use eyre::{Context, Result, eyre};
use organizer::{
    Backend, Config, Event, EventDraft, Note, NoteDraft, Organizer, Snapshot, Task, TaskDraft,
};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "organizer")]
#[command(about = "Organizer CLI - tasks, notes and calendar events")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Config file (default: <config dir>/organizer/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data directory, overriding the config file
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Storage backend, overriding the config file
    #[arg(short, long, value_enum)]
    backend: Option<BackendArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    File,
    Sqlite,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::File => Backend::File,
            BackendArg::Sqlite => Backend::Sqlite,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Manage tasks
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },

    /// Manage notes
    Note {
        #[command(subcommand)]
        action: NoteAction,
    },

    /// Manage calendar events
    Event {
        #[command(subcommand)]
        action: EventAction,
    },

    /// Search every list
    Search { query: String },

    /// Print all lists as JSON
    Export,

    /// Replace all lists with the contents of a JSON export
    ///
    /// Use either the current keys (tasks/notes/events) or the legacy ones
    /// (tareas/notas/eventos) for a list, not both.
    Import { file: PathBuf },
}

#[derive(Subcommand)]
enum TaskAction {
    /// Add a task
    Add {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Toggle a task between done and not done
    Done { id: i64 },
    /// Delete a task
    Rm { id: i64 },
    /// List tasks
    List {
        #[arg(short, long, default_value = "")]
        search: String,
    },
}

#[derive(Subcommand)]
enum NoteAction {
    /// Add a note
    Add {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Delete a note
    Rm { id: i64 },
    /// List notes
    List {
        #[arg(short, long, default_value = "")]
        search: String,
    },
}

#[derive(Subcommand)]
enum EventAction {
    /// Add an event
    Add {
        #[arg(short, long)]
        title: String,
        /// YYYY-MM-DD
        #[arg(short, long)]
        date: String,
        /// HH:MM
        #[arg(long, default_value = "")]
        time: String,
        /// Flag the event for a reminder
        #[arg(short, long)]
        reminder: bool,
    },
    /// Delete an event
    Rm { id: i64 },
    /// List events
    List {
        #[arg(short, long, default_value = "")]
        search: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = Some(dir);
    }
    if let Some(backend) = cli.backend {
        config.backend = backend.into();
    }

    // Setup tracing
    init_tracing(config.log_level.as_deref());
    tracing::debug!(
        config = ?cli.config,
        backend = %config.backend,
        data_dir = ?config.data_dir,
        "Starting organizer"
    );

    let mut org = Organizer::open_boxed(config.open_backend()?);

    match cli.command {
        Commands::Task { action } => run_task(&mut org, action),
        Commands::Note { action } => run_note(&mut org, action),
        Commands::Event { action } => run_event(&mut org, action),
        Commands::Search { query } => {
            let results = org.search(&query);
            if results.is_empty() {
                println!("No matches for {:?}", query);
            }
            print_section("Tasks", results.tasks.iter().map(|t| format_task(t)));
            print_section("Events", results.events.iter().map(|e| format_event(e)));
            print_section("Notes", results.notes.iter().map(|n| format_note(n)));
        }
        Commands::Export => {
            let json = serde_json::to_string_pretty(&org.snapshot())?;
            println!("{}", json);
        }
        Commands::Import { file } => {
            let content =
                fs::read_to_string(&file).with_context(|| format!("Failed to read {:?}", file))?;
            let snapshot: Snapshot = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {:?}", file))?;
            let counts = (snapshot.tasks.len(), snapshot.notes.len(), snapshot.events.len());
            org.replace(snapshot);
            println!(
                "Imported {} tasks, {} notes, {} events",
                counts.0, counts.1, counts.2
            );
        }
    }

    match org.persist_error() {
        Some(e) => Err(eyre!("Organizer state was not fully saved: {:#}", e)),
        None => Ok(()),
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.unwrap_or("warn")))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_task(org: &mut Organizer, action: TaskAction) {
    match action {
        TaskAction::Add { text } => match org.add_task(TaskDraft::new(text.join(" "))) {
            Some(task) => println!("Added task {}", task.id.to_string().cyan()),
            None => println!("Nothing added: task text is empty"),
        },
        TaskAction::Done { id } => match org.toggle_task(id) {
            Some(true) => println!("Task {} done", id.to_string().cyan()),
            Some(false) => println!("Task {} reopened", id.to_string().cyan()),
            None => println!("No task with id {}", id),
        },
        TaskAction::Rm { id } => report_remove("task", id, org.remove_task(id)),
        TaskAction::List { search } => {
            print_lines(org.tasks().filter(&search).map(format_task));
        }
    }
}

fn run_note(org: &mut Organizer, action: NoteAction) {
    match action {
        NoteAction::Add { text } => match org.add_note(NoteDraft::new(text.join(" "))) {
            Some(note) => println!("Added note {}", note.id.to_string().cyan()),
            None => println!("Nothing added: note text is empty"),
        },
        NoteAction::Rm { id } => report_remove("note", id, org.remove_note(id)),
        NoteAction::List { search } => {
            print_lines(org.notes().filter(&search).map(format_note));
        }
    }
}

fn run_event(org: &mut Organizer, action: EventAction) {
    match action {
        EventAction::Add {
            title,
            date,
            time,
            reminder,
        } => {
            let draft = EventDraft {
                title,
                date,
                time,
                reminder,
            };
            match org.add_event(draft) {
                Some(event) => println!("Added event {}", event.id.to_string().cyan()),
                None => println!("Nothing added: an event needs a title and a valid date"),
            }
        }
        EventAction::Rm { id } => report_remove("event", id, org.remove_event(id)),
        EventAction::List { search } => {
            print_lines(org.events().filter(&search).map(format_event));
        }
    }
}

fn report_remove(kind: &str, id: i64, removed: bool) {
    if removed {
        println!("Removed {} {}", kind, id.to_string().cyan());
    } else {
        println!("No {} with id {}", kind, id);
    }
}

fn print_lines(lines: impl Iterator<Item = String>) {
    let mut any = false;
    for line in lines {
        println!("{}", line);
        any = true;
    }
    if !any {
        println!("{}", "(empty)".dimmed());
    }
}

fn print_section(title: &str, lines: impl Iterator<Item = String>) {
    let lines: Vec<String> = lines.collect();
    if lines.is_empty() {
        return;
    }
    println!("{}", title.bold());
    for line in lines {
        println!("  {}", line);
    }
}

fn format_task(task: &Task) -> String {
    let id = task.id.to_string().cyan();
    if task.done {
        format!("{} [x] {}", id, task.text.dimmed().strikethrough())
    } else {
        format!("{} [ ] {}", id, task.text)
    }
}

fn format_note(note: &Note) -> String {
    let header = format!(
        "{} {}",
        note.id.to_string().cyan(),
        note.created_at.format("%Y-%m-%d").to_string().dimmed()
    );
    let body: Vec<String> = note.text.lines().map(|line| format!("    {}", line)).collect();
    format!("{}\n{}", header, body.join("\n"))
}

fn format_event(event: &Event) -> String {
    let reminder = if event.reminder {
        format!(" {}", "(reminder)".yellow())
    } else {
        String::new()
    };
    format!(
        "{} {} {}{}",
        event.id.to_string().cyan(),
        event.when_display().green(),
        event.title,
        reminder
    )
}
