// rust_core/src/bin/replay.rs
// Step through a finished match from the terminal.

use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use lotus_match_core::render;
use lotus_match_core::replay::ReplayCursor;
use lotus_match_core::{CardCatalog, ClientConfig, HttpMatchApi, MatchApi, TokenStore};

#[derive(Parser, Debug)]
#[command(name = "replay", about = "Replay a finished match")]
struct Args {
    /// Match to replay. Omit to list your finished matches.
    #[arg(long)]
    match_id: Option<i64>,

    /// Match server base URL (overrides LOTUS_API_URL).
    #[arg(long)]
    api_url: Option<String>,

    /// Access token (defaults to LOTUS_ACCESS_TOKEN).
    #[arg(long)]
    token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let mut config = ClientConfig::from_env();
    if let Some(url) = args.api_url {
        config = config.with_api_base(url);
    }
    config.validate()?;
    let store = match args.token {
        Some(token) => TokenStore::new(token, None),
        None => TokenStore::from_env(),
    };
    let api = HttpMatchApi::new(config, Arc::new(store))?;

    let match_id = match args.match_id {
        Some(id) => id,
        None => {
            print!("{}", render::finished_matches(&api.fetch_my_matches().await?));
            return Ok(());
        }
    };

    // 1. Fetch history, the seats and the catalog for names
    println!(">>> Loading replay of match #{}...", match_id);
    let (cards, seats, steps) = tokio::try_join!(
        api.fetch_cards(),
        api.fetch_match(match_id),
        api.fetch_replay(match_id)
    )?;
    let catalog = CardCatalog::new(cards);
    let mut cursor = ReplayCursor::new(steps);
    if cursor.is_empty() {
        println!(">>> No steps recorded.");
        return Ok(());
    }

    // 2. Navigate
    println!("commands: n (next) | p (prev) | f (first) | l (last) | q");
    if let Some(step) = cursor.current() {
        println!("{}", render::replay_step(step, &cursor.label(), Some(&seats), &catalog));
    }
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let moved = match line.trim() {
            "n" | "" => cursor.next().is_some(),
            "p" => cursor.prev().is_some(),
            "f" => cursor.first().is_some(),
            "l" => cursor.last().is_some(),
            "q" => break,
            _ => false,
        };
        if moved {
            if let Some(step) = cursor.current() {
                println!("{}", render::replay_step(step, &cursor.label(), Some(&seats), &catalog));
            }
        }
    }
    Ok(())
}
