//! candymap CLI
//!
//! Plays the game from a terminal against the local store or a shared server.
//!
//! Usage:
//!   candymap --user ana visit <house>
//!   candymap --user ana vote <house> <category>
//!   candymap --user ana note <house> <category> <text...>
//!   candymap --user ana notes <house>
//!   candymap --user ana votes <house>
//!   candymap --user ana feed <house> <category>
//!   candymap --user ana top [--limit N]
//!   candymap --user ana ranking
//!   candymap --user ana status
//!   candymap --user ana houses
//!   candymap --user ana sync

use candymap_core::{Catalog, Category, NoteChange, DEFAULT_TOP_LIMIT};
use candymap_gateway::{ClientConfig, Session};
use clap::{Parser, Subcommand};
use reqwest::Url;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "candymap", version, about = "Visit houses, vote and take notes")]
struct Cli {
    /// Player name
    #[arg(long, short, env = "CANDYMAP_USER")]
    user: String,

    /// Shared server URL; the local store is used when unset
    #[arg(long, env = "CANDYMAP_SERVER_URL")]
    server: Option<Url>,

    /// Directory of the local store
    #[arg(long, env = "CANDYMAP_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Catalog file (`casas.json`)
    #[arg(long, env = "CANDYMAP_CATALOG")]
    catalog: Option<PathBuf>,

    /// Request timeout for the shared server, in milliseconds
    #[arg(long, env = "CANDYMAP_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Mark a house as visited
    Visit { house: String },
    /// Vote for a house in a category
    Vote { house: String, category: Category },
    /// Write a private note; blank text deletes it
    Note {
        house: String,
        category: Category,
        text: Vec<String>,
    },
    /// Show your private notes for a house
    Notes { house: String },
    /// Show votes per category for a house
    Votes { house: String },
    /// Show public notes for a house and category
    Feed { house: String, category: Category },
    /// Show the most voted houses
    Top {
        #[arg(long, default_value_t = DEFAULT_TOP_LIMIT)]
        limit: usize,
    },
    /// Show players by houses visited
    Ranking,
    /// Show your progress
    Status,
    /// List the houses
    Houses,
    /// Re-send pending changes and pull changes from other devices
    Sync,
}

impl Cli {
    fn config(&self) -> ClientConfig {
        let mut config = ClientConfig {
            server_url: self.server.clone(),
            ..ClientConfig::default()
        };
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(path) = &self.catalog {
            config.catalog = path.clone();
        }
        if let Some(ms) = self.timeout_ms {
            config.timeout = Duration::from_millis(ms);
        }
        config
    }
}

/// Accept a house id or its display name.
fn resolve_house(catalog: &Catalog, query: &str) -> Result<String, String> {
    let query = query.trim();
    if catalog.contains(query) {
        return Ok(query.to_string());
    }
    let matches: Vec<_> = catalog
        .iter()
        .filter(|h| h.display_name.eq_ignore_ascii_case(query))
        .collect();
    match matches.as_slice() {
        [house] => Ok(house.id.clone()),
        [] => Err(format!("unknown house: {}", query)),
        _ => Err(format!("{} houses are named {:?}; use the id", matches.len(), query)),
    }
}

fn house_name<'a>(catalog: &'a Catalog, id: &'a str) -> &'a str {
    catalog
        .get(id)
        .map(|h| h.display_name.as_str())
        .unwrap_or(id)
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = cli.config();
    let gateway = config.open_gateway()?;
    let catalog = Arc::new(config.load_catalog(gateway.as_ref()).await?);
    let mut session = Session::open(&cli.user, Arc::clone(&catalog), gateway).await?;

    match cli.command {
        Command::Visit { house } => {
            let house = resolve_house(&catalog, &house)?;
            let visit = session.mark_visited(&house).await?;
            if visit.outcome.already_visited {
                println!("Already visited {}", house_name(&catalog, &house));
            } else {
                println!(
                    "Visited {} ({}/{})",
                    house_name(&catalog, &house),
                    visit.outcome.new_count,
                    catalog.len()
                );
            }
            if let Some(event) = visit.completed {
                println!("Congratulations! You visited all {} houses!", event.total);
            }
        }
        Command::Vote { house, category } => {
            let house = resolve_house(&catalog, &house)?;
            let record = session.cast_vote(&house, category).await?;
            println!(
                "Voted {} for {} ({} votes)",
                house_name(&catalog, &house),
                category,
                record.count()
            );
        }
        Command::Note {
            house,
            category,
            text,
        } => {
            let house = resolve_house(&catalog, &house)?;
            let saved = session.save_note(&house, category, &text.join(" ")).await?;
            match saved.change {
                NoteChange::Written => println!("Note saved and shared"),
                NoteChange::Removed { existed: true } => println!("Note removed"),
                NoteChange::Removed { existed: false } => println!("No note to remove"),
            }
        }
        Command::Notes { house } => {
            let house = resolve_house(&catalog, &house)?;
            let notes = session.private_notes(&house);
            if notes.is_empty() {
                println!("No notes for {}", house_name(&catalog, &house));
            }
            for (category, text) in notes {
                println!("{}: {}", category, text);
            }
        }
        Command::Votes { house } => {
            let house = resolve_house(&catalog, &house)?;
            let votes = session.votes(&house).await;
            let summary = session.public_summary(&house).await;
            println!("{}", house_name(&catalog, &house));
            for category in Category::ALL {
                let count = votes.get(&category).map(|r| r.count()).unwrap_or(0);
                let notes = summary.get(&category).copied().unwrap_or(0);
                println!("  {:<18} {:>3} votes  {:>3} notes", category.label(), count, notes);
            }
        }
        Command::Feed { house, category } => {
            let house = resolve_house(&catalog, &house)?;
            let feed = session.public_feed(&house, category).await;
            if feed.is_empty() {
                println!("No public notes yet");
            }
            for note in feed {
                let when = chrono::DateTime::from_timestamp_millis(note.date)
                    .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                println!("[{}] {}: {}", when, note.user, note.text);
            }
        }
        Command::Top { limit } => {
            for (i, score) in session.top_houses(limit).await.iter().enumerate() {
                println!("{}. {} ({} votes)", i + 1, house_name(&catalog, &score.0), score.1);
            }
        }
        Command::Ranking => {
            for (i, score) in session.user_ranking().await.iter().enumerate() {
                println!("{}. {} ({} houses)", i + 1, score.0, score.1);
            }
        }
        Command::Status => {
            println!(
                "{}: {}/{} houses visited{}",
                session.user(),
                session.visits().count_in(&catalog),
                catalog.len(),
                if session.is_complete() { " (complete)" } else { "" }
            );
        }
        Command::Houses => {
            for house in catalog.iter() {
                let mark = if session.visits().contains(&house.id) { "x" } else { " " };
                println!("[{}] {}  {}", mark, house.id, house.display_name);
            }
        }
        Command::Sync => {
            let completed = session.sync().await?;
            println!("Synced ({} houses visited)", session.visit_count());
            if let Some(event) = completed {
                println!("Congratulations! You visited all {} houses!", event.total);
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "candymap_gateway=warn,candymap_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
