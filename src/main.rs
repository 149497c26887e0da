use std::{io::Write, path::PathBuf, str::FromStr, sync::Arc};

use clap::{Args, Parser, Subcommand};
use colored::*;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use crate::{
    config::{Config, ConfigError},
    models::{
        day::{Day, DayError},
        task::{NewTask, Task, TaskPatch},
        weekday::{WeekdayError, describe_days, parse_weekdays},
    },
    services::{
        cursor::SystemClock,
        filters::{DAY_FILTER, PENDING_FILTER},
        session::Session,
    },
    storage::{KeyValueStore, json::JsonDirStore, memory::MemoryStore},
};

mod config;
mod models;
mod services;
mod storage;
mod ui;

#[derive(Parser)]
#[command(
    name = "weekdo",
    about = "Recurring to-dos by weekday, with completion tracked per day"
)]
struct Cli {
    /// Directory holding todos.json and history.json
    #[arg(long, env = "WEEKDO_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Keep everything in memory for this run
    #[arg(long, global = true)]
    ephemeral: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// More logging (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the tasks scheduled for a day (default: today)
    Show(ShowArgs),

    /// Add a new task
    Add {
        /// Task text
        text: String,

        /// Days it recurs on, e.g. "mon,wed,fri" or "all" (default: every day)
        #[arg(short, long)]
        days: Option<String>,
    },

    /// Change a task's text or days
    Edit {
        /// Task id (e.g. todo_3, or just 3)
        task: String,

        /// New text
        #[arg(short, long)]
        text: Option<String>,

        /// New days, e.g. "sat,sun"
        #[arg(short, long)]
        days: Option<String>,
    },

    /// Toggle a task as done for a day (default: today)
    Done {
        /// Task id
        task: String,

        /// Day to toggle (YYYY-MM-DD)
        #[arg(short, long)]
        date: Option<String>,
    },

    /// Toggle a task's global completion flag
    Check {
        /// Task id
        task: String,
    },

    /// Remove a task
    Rm {
        /// Task id
        task: String,

        /// Also forget every day the task was completed on
        #[arg(long)]
        purge_history: bool,
    },

    /// List the days a task was completed on, or every recorded day
    History {
        /// Task id
        task: Option<String>,
    },

    /// Step through days interactively
    Browse {
        /// Day to start on (YYYY-MM-DD)
        #[arg(short, long)]
        date: Option<String>,
    },
}

#[derive(Args, Default)]
struct ShowArgs {
    /// Day to show (YYYY-MM-DD)
    #[arg(short, long)]
    date: Option<String>,

    /// Days relative to the chosen day, e.g. 1 for tomorrow or -1 for yesterday
    #[arg(short, long, allow_negative_numbers = true)]
    offset: Option<i64>,

    /// Show every task, scheduled for this day or not
    #[arg(short, long)]
    all: bool,

    /// Hide tasks already done on this day
    #[arg(short, long)]
    pending: bool,
}

#[derive(Debug, Error)]
enum CommandError {
    #[error("Task '{0}' not found")]
    TaskNotFound(String),

    #[error("A task needs at least one day; use --days all to schedule it every day")]
    NoDays,

    #[error(transparent)]
    Weekday(#[from] WeekdayError),

    #[error(transparent)]
    Day(#[from] DayError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Day {0} cannot be recorded in the history")]
    UnrecordableDay(Day),

    #[error("Unknown command '{0}', type 'h' for help")]
    UnknownBrowseCommand(String),

    #[error("'{0}' needs an argument")]
    MissingArgument(String),

    #[error("Failed to read input: {0}")]
    Input(#[from] std::io::Error),
}

/// A line typed in `browse` mode.
#[derive(Debug, PartialEq, Eq)]
enum BrowseCommand {
    Next,
    Previous,
    Today,
    Toggle(String),
    Filter(String),
    Filters,
    Help,
    Quit,
}

impl FromStr for BrowseCommand {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            return Ok(BrowseCommand::Help);
        };
        let argument = parts.next().map(str::to_string);
        let require = |argument: Option<String>| {
            argument.ok_or_else(|| CommandError::MissingArgument(command.to_string()))
        };

        match command {
            "n" | "next" => Ok(BrowseCommand::Next),
            "p" | "prev" | "previous" => Ok(BrowseCommand::Previous),
            "t" | "today" => Ok(BrowseCommand::Today),
            "x" | "done" => Ok(BrowseCommand::Toggle(require(argument)?)),
            "f" | "filter" => Ok(argument.map_or(BrowseCommand::Filters, BrowseCommand::Filter)),
            "h" | "help" | "?" => Ok(BrowseCommand::Help),
            "q" | "quit" | "exit" => Ok(BrowseCommand::Quit),
            other => Err(CommandError::UnknownBrowseCommand(other.to_string())),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = Config::resolve(cli.data_dir, cli.ephemeral, cli.no_color, cli.verbose);

    init_logging(&config);
    if !config.color {
        colored::control::set_override(false);
    }

    let command = cli
        .command
        .unwrap_or_else(|| Commands::Show(ShowArgs::default()));

    if let Err(e) = run(command, &config).await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(command: Commands, config: &Config) -> Result<(), CommandError> {
    let store: Arc<dyn KeyValueStore> = if config.ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        config.ensure_data_dir()?;
        Arc::new(JsonDirStore::new(config.data_dir.clone()))
    };
    let mut session = Session::open(store, Arc::new(SystemClock)).await;

    let result = dispatch(command, &mut session).await;
    session.flush().await;
    result
}

async fn dispatch(command: Commands, session: &mut Session) -> Result<(), CommandError> {
    match command {
        Commands::Show(args) => {
            if let Some(date) = args.date {
                session.jump_to(date.parse()?);
            }
            if let Some(offset) = args.offset {
                let day = session.day().add_days(offset);
                session.jump_to(day);
            }
            let mut filters = Vec::new();
            if !args.all {
                filters.push(DAY_FILTER);
            }
            if args.pending {
                filters.push(PENDING_FILTER);
            }
            session.set_active_filters(filters);
            render_current_day(session);
        }
        Commands::Add { text, days } => {
            let mut new_task = NewTask::new(text);
            if let Some(days) = days {
                new_task = new_task.on_days(parse_required_days(&days)?);
            }
            let task = session.add_task(new_task);
            println!(
                "{} Added {} {} ({})",
                "✓".green(),
                task.id.dimmed(),
                task.text.bold(),
                describe_days(&task.days)
            );
        }
        Commands::Edit { task, text, days } => {
            let task = find_task(session, &task)?;
            let days = days.as_deref().map(parse_required_days).transpose()?;
            session.update_task(TaskPatch {
                text,
                days,
                ..TaskPatch::new(task.id.clone())
            });
            if let Some(updated) = session.tasks().get(&task.id) {
                println!(
                    "{} Updated {} {} ({})",
                    "✓".green(),
                    updated.id.dimmed(),
                    updated.text.bold(),
                    describe_days(&updated.days)
                );
            }
        }
        Commands::Done { task, date } => {
            let task = find_task(session, &task)?;
            if let Some(date) = date {
                session.jump_to(date.parse()?);
            }
            let day = session.day();
            match session.toggle_completion(&task.id) {
                Some(true) => println!("{} {} done on {}", "✓".green(), task.text.bold(), day),
                Some(false) => println!("{} {} not done on {}", "○".normal(), task.text.bold(), day),
                None => return Err(CommandError::UnrecordableDay(day)),
            }
        }
        Commands::Check { task } => {
            let task = find_task(session, &task)?;
            if let Some(toggled) = session.toggle_task(task.id.as_str()) {
                let state = if toggled.is_completed { "completed" } else { "open" };
                println!("{} {} marked {}", "✓".green(), toggled.text.bold(), state);
            }
        }
        Commands::Rm { task, purge_history } => {
            let task = find_task(session, &task)?;
            if let Some(removed) = session.remove_task(task.id.as_str(), purge_history) {
                println!("{} Removed {} {}", "✓".green(), removed.id.dimmed(), removed.text.bold());
            }
        }
        Commands::History { task: Some(task) } => {
            let task = find_task(session, &task)?;
            ui::render_task_history(&task, &session.history().completed_dates(&task.id));
        }
        Commands::History { task: None } => {
            ui::render_history_overview(&session.history().snapshot());
        }
        Commands::Browse { date } => {
            if let Some(date) = date {
                session.jump_to(date.parse()?);
            }
            browse(session).await?;
        }
    }
    Ok(())
}

/// Interactive loop over stdin driving the day cursor.
async fn browse(session: &mut Session) -> Result<(), CommandError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    render_current_day(session);
    ui::render_browse_help();

    loop {
        print!("\n> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.parse::<BrowseCommand>() {
            Ok(BrowseCommand::Quit) => break,
            Ok(BrowseCommand::Help) => {
                ui::render_browse_help();
                continue;
            }
            Ok(command) => {
                if let Err(e) = apply_browse_command(session, command) {
                    eprintln!("{} {}", "Error:".red().bold(), e);
                    continue;
                }
            }
            Err(e) => {
                eprintln!("{} {}", "Error:".red().bold(), e);
                continue;
            }
        }
        render_current_day(session);
    }
    Ok(())
}

fn apply_browse_command(session: &mut Session, command: BrowseCommand) -> Result<(), CommandError> {
    match command {
        BrowseCommand::Next => {
            session.go_to_next_day();
        }
        BrowseCommand::Previous => {
            session.go_to_previous_day();
        }
        BrowseCommand::Today => {
            session.go_to_today();
        }
        BrowseCommand::Toggle(task) => {
            let task = find_task(session, &task)?;
            if session.toggle_completion(&task.id).is_none() {
                return Err(CommandError::UnrecordableDay(session.day()));
            }
        }
        BrowseCommand::Filter(name) => {
            if !session.filters().is_registered(&name) {
                let known: Vec<_> = session.filters().registered_names().collect();
                println!("  Unknown filter '{}' (available: {})", name, known.join(", "));
            } else {
                let active = session.toggle_filter(&name);
                println!("  Filter '{}' {}", name, if active { "on" } else { "off" });
            }
        }
        BrowseCommand::Filters => {
            let filters = session.filters();
            let names: Vec<_> = filters.registered_names().collect();
            ui::render_filters(&names, &filters.active_names());
        }
        BrowseCommand::Help | BrowseCommand::Quit => {}
    }
    Ok(())
}

fn render_current_day(session: &Session) {
    let rows: Vec<(Task, bool)> = session
        .visible_tasks()
        .into_iter()
        .map(|task| {
            let done = session.is_completed(&task.id);
            (task, done)
        })
        .collect();
    ui::render_day(session.day(), session.today(), &rows);
}

/// Looks a task up by exact id, or by bare number (`3` for `todo_3`).
fn find_task(session: &Session, input: &str) -> Result<Task, CommandError> {
    let input = input.trim();
    session
        .tasks()
        .get(input)
        .or_else(|| {
            input
                .parse::<u64>()
                .ok()
                .and_then(|n| session.tasks().get(&format!("{}_{}", services::ids::TASK_ID_PREFIX, n)))
        })
        .ok_or_else(|| CommandError::TaskNotFound(input.to_string()))
}

/// Days typed by the user; an empty selection is rejected.
fn parse_required_days(
    input: &str,
) -> Result<std::collections::BTreeSet<models::weekday::Weekday>, CommandError> {
    let days = parse_weekdays(input)?;
    if days.is_empty() {
        return Err(CommandError::NoDays);
    }
    Ok(days)
}

#[cfg(test)]
mod tests {
    use jiff::civil::date;

    use super::*;
    use crate::services::cursor::testing::FixedClock;

    async fn session() -> Session {
        Session::open(
            Arc::new(MemoryStore::new()),
            FixedClock::new(Day::new(date(2018, 12, 24))),
        )
        .await
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_browse_commands() {
        assert_eq!("n".parse::<BrowseCommand>().unwrap(), BrowseCommand::Next);
        assert_eq!("prev".parse::<BrowseCommand>().unwrap(), BrowseCommand::Previous);
        assert_eq!("  today ".parse::<BrowseCommand>().unwrap(), BrowseCommand::Today);
        assert_eq!(
            "x todo_3".parse::<BrowseCommand>().unwrap(),
            BrowseCommand::Toggle("todo_3".to_string())
        );
        assert_eq!(
            "f day".parse::<BrowseCommand>().unwrap(),
            BrowseCommand::Filter("day".to_string())
        );
        assert_eq!("f".parse::<BrowseCommand>().unwrap(), BrowseCommand::Filters);
        assert_eq!("".parse::<BrowseCommand>().unwrap(), BrowseCommand::Help);
        assert!(matches!(
            "x".parse::<BrowseCommand>(),
            Err(CommandError::MissingArgument(_))
        ));
        assert!(matches!(
            "jump".parse::<BrowseCommand>(),
            Err(CommandError::UnknownBrowseCommand(_))
        ));
    }

    #[test]
    fn test_parse_required_days_rejects_empty() {
        assert!(matches!(parse_required_days(" , "), Err(CommandError::NoDays)));
        assert_eq!(parse_required_days("sat,sun").unwrap().len(), 2);
        assert!(matches!(
            parse_required_days("someday"),
            Err(CommandError::Weekday(_))
        ));
    }

    #[tokio::test]
    async fn test_find_task_by_id_or_number() {
        let mut session = session().await;
        session.add_task(NewTask::new("Floss"));
        session.add_task(NewTask::new("Read"));

        assert_eq!(find_task(&session, "todo_1").unwrap().text, "Read");
        assert_eq!(find_task(&session, "0").unwrap().text, "Floss");
        assert!(matches!(
            find_task(&session, "7"),
            Err(CommandError::TaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_browse_commands_drive_the_session() {
        let mut session = session().await;
        let task = session.add_task(NewTask::new("Gym").on_days([models::weekday::Weekday::MONDAY]));

        apply_browse_command(&mut session, BrowseCommand::Toggle("0".to_string())).unwrap();
        assert!(session.is_completed(&task.id));

        apply_browse_command(&mut session, BrowseCommand::Next).unwrap();
        assert!(session.visible_tasks().is_empty());

        apply_browse_command(&mut session, BrowseCommand::Filter("day".to_string())).unwrap();
        assert_eq!(session.visible_tasks().len(), 1);
        assert!(!session.is_completed(&task.id));

        apply_browse_command(&mut session, BrowseCommand::Today).unwrap();
        assert!(session.is_completed(&task.id));

        apply_browse_command(&mut session, BrowseCommand::Filter("pending".to_string())).unwrap();
        assert!(session.visible_tasks().is_empty());
        apply_browse_command(&mut session, BrowseCommand::Filters).unwrap();

        assert!(matches!(
            apply_browse_command(&mut session, BrowseCommand::Toggle("todo_9".to_string())),
            Err(CommandError::TaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_show_pending_hides_tasks_done_that_day() {
        let mut session = session().await;
        let floss = session.add_task(NewTask::new("Floss"));
        session.add_task(NewTask::new("Read"));
        session.toggle_completion(&floss.id);

        let args = ShowArgs {
            pending: true,
            ..ShowArgs::default()
        };
        dispatch(Commands::Show(args), &mut session).await.unwrap();

        let visible: Vec<_> = session.visible_tasks().into_iter().map(|t| t.text).collect();
        assert_eq!(visible, vec!["Read"]);
        assert_eq!(session.filters().active_names(), vec![DAY_FILTER, PENDING_FILTER]);
    }
}
