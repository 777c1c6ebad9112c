//! Command-line front end over a SQLite-backed notetree store.
//!
//! # Responsibility
//! - Map subcommands onto one `SyncSession` and the supplementary services.
//! - Print the forest as an indented outline honoring expansion state.

use clap::{Args, Parser, Subcommand};
use log::info;
use notetree_core::model::node::parse_tag_line;
use notetree_core::view::{project_forest, visible_rows, ExpansionState};
use notetree_core::{
    load_config, DocumentPatch, EngineConfig, FolderPatch, NewDocument, NewFolder,
    PostItService, ScratchpadService, SqliteStore, SyncSession, DEFAULT_FOLDER_COLOR,
};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "notetree")]
#[command(about = "Ordered folder/document tree over a local document store", long_about = None)]
struct Cli {
    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file; overrides the config value
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the tree
    Tree {
        /// Ignore expansion state and print every node
        #[arg(short, long)]
        all: bool,
    },

    /// Flip the expansion flag of a folder
    Toggle { id: String },

    /// Create a folder
    AddFolder {
        #[arg(short, long)]
        label: String,

        #[arg(short, long, default_value = DEFAULT_FOLDER_COLOR)]
        color: String,

        /// Parent folder id; root when omitted
        #[arg(short, long)]
        parent: Option<String>,
    },

    /// Create a document inside a folder
    AddDocument {
        #[arg(short, long)]
        label: String,

        #[arg(short, long)]
        parent: String,

        #[arg(long, default_value = "")]
        content: String,

        /// Comma-separated tags
        #[arg(short, long, default_value = "")]
        tags: String,
    },

    /// Edit a folder or document
    Edit(EditArgs),

    /// Move a node under another folder or to the root
    Move {
        id: String,

        /// Destination folder id; root when omitted
        #[arg(long)]
        to: Option<String>,

        /// Zero-based index among the destination's children
        #[arg(short, long, default_value = "0")]
        index: i64,
    },

    /// Delete a document or an empty folder
    Delete { id: String },

    /// Manage post-its
    Postits {
        #[command(subcommand)]
        command: PostItCommands,
    },

    /// Read or write the scratchpad
    Scratch {
        /// New content; prints the current content when omitted
        content: Option<String>,
    },
}

#[derive(Args)]
struct EditArgs {
    id: String,

    #[arg(short, long)]
    label: Option<String>,

    /// Folder color
    #[arg(short, long)]
    color: Option<String>,

    /// Document content
    #[arg(long)]
    content: Option<String>,

    /// Document tags, comma-separated
    #[arg(short, long)]
    tags: Option<String>,

    /// One-based position among siblings
    #[arg(short, long)]
    position: Option<u32>,
}

#[derive(Subcommand)]
enum PostItCommands {
    /// List post-its, optionally filtered
    List {
        #[arg(short, long)]
        filter: Option<String>,
    },
    Add {
        #[arg(short, long)]
        title: String,

        #[arg(long)]
        text: String,
    },
    Delete { id: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };
    config.init_logging()?;

    let db_path = cli
        .db
        .clone()
        .or_else(|| config.database_path.clone())
        .ok_or("no database: pass --db or set database_path in the config")?;
    let store = Arc::new(SqliteStore::open(&db_path)?);
    info!("event=cli_start module=cli status=ok");

    match cli.command {
        Commands::Postits { command } => run_postits(store, command),
        Commands::Scratch { content } => {
            let scratchpad = ScratchpadService::new(store);
            match content {
                Some(content) => scratchpad.save(&content)?,
                None => println!("{}", scratchpad.load()?),
            }
            Ok(())
        }
        Commands::Toggle { id } => {
            let mut expansion = load_expansion(&config);
            let expanded = expansion.toggle(&id);
            expansion.save()?;
            println!("{id} expanded={expanded}");
            Ok(())
        }
        command => run_tree_command(store, &config, command).await,
    }
}

async fn run_tree_command(
    store: Arc<SqliteStore>,
    config: &EngineConfig,
    command: Commands,
) -> CliResult<()> {
    let session = SyncSession::start(store)?;

    match command {
        Commands::Tree { all } => {
            let mut expansion = load_expansion(config);
            let forest = session.forest();
            if all {
                for node in forest.iter() {
                    expansion.set_expanded(node.id(), true);
                }
            }
            let display = project_forest(&forest, &expansion);
            for row in visible_rows(&display) {
                let marker = match (row.record.is_folder(), row.expanded) {
                    (true, true) => "v",
                    (true, false) => ">",
                    (false, _) => "-",
                };
                println!(
                    "{}{marker} {} [{}] {}",
                    "  ".repeat(row.level),
                    row.record.label,
                    row.position(),
                    row.record.id
                );
            }
            for orphan in &forest.orphans {
                eprintln!(
                    "warning: {} shown at root ({})",
                    orphan.node_id,
                    orphan.reason.as_str()
                );
            }
        }
        Commands::AddFolder {
            label,
            color,
            parent,
        } => {
            let id = session.add_folder(NewFolder {
                label,
                color,
                parent_id: parent,
            })?;
            println!("{id}");
        }
        Commands::AddDocument {
            label,
            parent,
            content,
            tags,
        } => {
            let id = session.add_document(NewDocument {
                label,
                content,
                tags: parse_tag_line(&tags),
                parent_id: parent,
            })?;
            println!("{id}");
        }
        Commands::Edit(args) => edit(&session, args)?,
        Commands::Move { id, to, index } => session.move_node(&id, to.as_deref(), index)?,
        Commands::Delete { id } => session.delete_node(&id)?,
        Commands::Postits { .. } | Commands::Scratch { .. } | Commands::Toggle { .. } => {}
    }

    session.settled().await?;
    session.unsubscribe().await;
    Ok(())
}

fn edit(session: &SyncSession<SqliteStore>, args: EditArgs) -> CliResult<()> {
    let is_folder = session
        .forest()
        .find(&args.id)
        .map(|node| node.is_folder())
        .ok_or_else(|| format!("node not found: {}", args.id))?;

    if is_folder {
        session.edit_folder(
            &args.id,
            FolderPatch {
                label: args.label,
                color: args.color,
                position: args.position,
            },
        )?;
    } else {
        session.edit_document(
            &args.id,
            DocumentPatch {
                label: args.label,
                content: args.content,
                tags: args.tags.as_deref().map(parse_tag_line),
                position: args.position,
            },
        )?;
    }
    Ok(())
}

fn run_postits(store: Arc<SqliteStore>, command: PostItCommands) -> CliResult<()> {
    let postits = PostItService::new(store);
    match command {
        PostItCommands::List { filter } => {
            let items = match filter {
                Some(needle) => postits.filter(&needle)?,
                None => postits.list()?,
            };
            for item in items {
                println!("{}  {}: {}", item.id, item.title, item.text);
            }
        }
        PostItCommands::Add { title, text } => {
            let item = postits.add(&title, &text)?;
            println!("{}", item.id);
        }
        PostItCommands::Delete { id } => postits.delete(&id)?,
    }
    Ok(())
}

fn load_expansion(config: &EngineConfig) -> ExpansionState {
    match &config.expansion_state_path {
        Some(path) => ExpansionState::load(path),
        None => ExpansionState::in_memory(),
    }
}
