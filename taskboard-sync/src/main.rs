use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use taskboard_core::{BoardView, DragKind, DropLocation, DropResult, TaskDraft};
use taskboard_sync::{default_config_path, load_config, Outcome, SyncClient};

#[derive(Parser)]
#[command(name = "taskboard")]
#[command(version, about = "Kanban board client with optimistic sync")]
struct Cli {
    /// Config file (defaults to <config dir>/taskboard/client.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true, env = "TASKBOARD_BASE_URL")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List boards visible to the configured viewer
    Boards,
    /// Print a board's columns and tasks in order
    Show { board: String },
    /// List a board's archived tasks with the column holding each
    Archived { board: String },
    /// Move a task to a column, at an index as listed by `show`
    MoveTask {
        task: String,
        to_column: String,
        index: usize,
    },
    /// Move a column to an index within its board
    MoveColumn { column: String, index: usize },
    /// Append a task to a column
    AddTask { column: String, name: String },
    /// Archive a column; its tasks stay untouched
    ArchiveColumn { column: String },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        log::error!(target: "taskboard", "{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let path = cli.config.unwrap_or_else(default_config_path);
    let mut config = load_config(&path);
    if let Some(url) = cli.base_url {
        config.base_url = url;
    }
    log::info!(target: "taskboard", "Using backend at {}", config.base_url);

    let client = SyncClient::from_config(&config)?;
    client.load_all().await?;

    match cli.command {
        Commands::Boards => {
            let boards = client.cache().get::<taskboard_core::Board>().unwrap_or_default();
            let viewer = client.settings().viewer.as_deref();
            for board in boards
                .iter()
                .filter(|b| !b.archived)
                .filter(|b| viewer.map_or(true, |v| b.has_member(v)))
            {
                println!("{}\t{} ({} columns)", board.id, board.name, board.column_ids.len());
            }
        }
        Commands::Show { board } => {
            let view = view_of(&client, &board)?;
            print_view(&view);
        }
        Commands::Archived { board } => {
            let view = view_of(&client, &board)?;
            for (task, column) in view.archived_tasks() {
                println!("{}\t{}\t{}", task.id, column, task.name);
            }
        }
        Commands::MoveTask {
            task,
            to_column,
            index,
        } => {
            let column = client
                .cache()
                .find::<taskboard_core::Column>(&to_column)
                .ok_or_else(|| format!("Column not found: {}", to_column))?;
            let view = view_of(&client, &column.board_id)?;
            let source = view
                .column_of_task(&task)
                .ok_or_else(|| format!("Task {} is not on board {}", task, column.board_id))?;
            let from = source
                .task_ids
                .iter()
                .position(|t| *t == task)
                .ok_or("task vanished from its column")?;
            let drop = DropResult {
                draggable_id: task,
                kind: DragKind::Task,
                source: DropLocation::new(source.id.clone(), from),
                destination: Some(DropLocation::new(
                    to_column.clone(),
                    view.sequence_index(&to_column, index),
                )),
            };
            report(client.apply_drop(&column.board_id, &drop).await?)?;
        }
        Commands::MoveColumn { column, index } => {
            let col = client
                .cache()
                .find::<taskboard_core::Column>(&column)
                .ok_or_else(|| format!("Column not found: {}", column))?;
            let view = view_of(&client, &col.board_id)?;
            let from = view
                .board
                .column_ids
                .iter()
                .position(|c| *c == column)
                .ok_or_else(|| format!("Column {} is not on board {}", column, col.board_id))?;
            let drop = DropResult {
                draggable_id: column,
                kind: DragKind::Column,
                source: DropLocation::new(col.board_id.clone(), from),
                destination: Some(DropLocation::new(col.board_id.clone(), index)),
            };
            report(client.apply_drop(&col.board_id, &drop).await?)?;
        }
        Commands::AddTask { column, name } => {
            let task = client.create_task(&column, TaskDraft::named(name)).await?;
            if let Outcome::Applied(t) = &task {
                println!("{}", t.id);
            }
            report(task)?;
        }
        Commands::ArchiveColumn { column } => {
            report(client.set_column_archived(&column, true).await?)?;
        }
    }
    Ok(())
}

fn view_of(client: &SyncClient, board: &str) -> Result<BoardView, Box<dyn Error>> {
    client
        .board_view(Some(board))
        .into_view()
        .ok_or_else(|| format!("Board not available: {}", board).into())
}

fn print_view(view: &BoardView) {
    println!("{}", view.board.name);
    for column in view.ordered_columns() {
        println!("  [{}] {}", column.id, column.name);
        for (i, task) in view.column_tasks(&column.id).into_iter().enumerate() {
            println!("    {}. {} ({})", i, task.name, task.id);
        }
    }
}

fn report<T>(outcome: Outcome<T>) -> Result<(), Box<dyn Error>> {
    match outcome {
        Outcome::Applied(_) => Ok(()),
        Outcome::Noop => {
            log::info!(target: "taskboard", "Nothing to do");
            Ok(())
        }
        Outcome::Reverted(e) => Err(Box::new(e)),
    }
}
