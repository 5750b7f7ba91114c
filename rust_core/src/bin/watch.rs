// rust_core/src/bin/watch.rs
// Terminal match client: join (or find) a match, stay in sync over the
// push channel and play it by typing commands.

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lotus_match_core::lobby;
use lotus_match_core::models::{MatchMode, UserId};
use lotus_match_core::render;
use lotus_match_core::{
    ClientConfig, Click, CredentialProvider, HttpMatchApi, MatchApi, MatchSession,
    MatchSyncChannel, SessionCommand, SessionEvent, SyncLink, TokenStore, WsConnector,
};

#[derive(Parser, Debug)]
#[command(name = "watch", about = "Play a live match from the terminal")]
struct Args {
    /// Match to open. Omit together with --deck to find a new one.
    #[arg(long)]
    match_id: Option<i64>,

    /// Deck for matchmaking.
    #[arg(long)]
    deck: Option<i64>,

    /// RANKED or CASUAL.
    #[arg(long, default_value = "casual")]
    mode: String,

    /// Your user id (decides which side of the board is yours).
    #[arg(long)]
    user_id: UserId,

    /// Match server base URL (overrides LOTUS_API_URL).
    #[arg(long)]
    api_url: Option<String>,

    /// JSON settings file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Access token (defaults to LOTUS_ACCESS_TOKEN).
    #[arg(long)]
    token: Option<String>,

    /// Refresh token (defaults to LOTUS_REFRESH_TOKEN).
    #[arg(long)]
    refresh_token: Option<String>,

    /// Skip the push channel and poll only.
    #[arg(long)]
    no_push: bool,

    /// Fallback poll interval in milliseconds.
    #[arg(long)]
    poll_ms: Option<u64>,

    /// Delay before reconnecting the push channel, in milliseconds.
    #[arg(long)]
    reconnect_ms: Option<u64>,

    /// STOMP heart-beat in milliseconds (0 turns heartbeats off).
    #[arg(long)]
    heartbeat_ms: Option<u64>,
}

const HELP: &str = "commands: m <id> (your minion) | e <id> (enemy minion) | h <id> (hand card) \
| hero | me | end | x (dismiss effect) | r (refresh) | q";

fn parse_command(line: &str) -> Option<SessionCommand> {
    let mut parts = line.split_whitespace();
    let verb = parts.next()?;
    let arg = parts.next().map(str::to_string);
    let command = match (verb, arg) {
        ("m", Some(id)) => SessionCommand::Click(Click::OwnMinion(id)),
        ("e", Some(id)) => SessionCommand::Click(Click::EnemyMinion(id)),
        ("h", Some(id)) => SessionCommand::Click(Click::HandCard(id)),
        ("hero", None) => SessionCommand::Click(Click::EnemyHero),
        ("me", None) => SessionCommand::Click(Click::OwnHero),
        ("end", None) => SessionCommand::EndTurn,
        ("x", None) => SessionCommand::DismissOverlay,
        ("r", None) => SessionCommand::Refresh,
        ("q", None) => SessionCommand::Exit,
        _ => return None,
    };
    Some(command)
}

fn parse_mode(raw: &str) -> Result<MatchMode, String> {
    match raw.to_ascii_uppercase().as_str() {
        "RANKED" => Ok(MatchMode::Ranked),
        "CASUAL" => Ok(MatchMode::Casual),
        other => Err(format!("unknown mode {:?} (RANKED or CASUAL)", other)),
    }
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

    // --- Step 1: Settings and credentials ---
    let mut config = match &args.config {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::from_env(),
    };
    if let Some(url) = &args.api_url {
        config = config.with_api_base(url.clone());
    }
    if let Some(ms) = args.poll_ms {
        config = config.with_poll_interval(Duration::from_millis(ms));
    }
    if let Some(ms) = args.reconnect_ms {
        config = config.with_reconnect_delay(Duration::from_millis(ms));
    }
    if let Some(ms) = args.heartbeat_ms {
        config = config.with_heartbeat(Duration::from_millis(ms));
    }
    config.validate()?;

    let store = match &args.token {
        Some(token) => TokenStore::new(token.clone(), args.refresh_token.clone()),
        None => TokenStore::from_env(),
    };
    if store.access_token().is_none() {
        warn!("no access token; the server will likely refuse us");
    }
    let credentials: Arc<dyn CredentialProvider> = Arc::new(store);
    let api: Arc<dyn MatchApi> = Arc::new(HttpMatchApi::new(config.clone(), credentials.clone())?);

    // --- Step 2: Which match? ---
    let match_id = match (args.match_id, args.deck) {
        (Some(id), _) => id,
        (None, Some(deck)) => {
            let found = lobby::find_match(api.as_ref(), deck, parse_mode(&args.mode)?).await?;
            println!(">>> Match #{} ({:?})", found.id, found.status);
            let started = tokio::select! {
                started = lobby::wait_for_start(api.as_ref(), found, config.waiting_poll()) => started,
                _ = tokio::signal::ctrl_c() => return Ok(()),
            };
            started.id
        }
        (None, None) => return Err("pass --match-id or --deck".into()),
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    // --- Step 3: Load, with a retry prompt ---
    let session = loop {
        match MatchSession::load(api.clone(), match_id, args.user_id, config.clone()).await {
            Ok(session) => break session,
            Err(err) => {
                println!("!!! Could not load match: {}", err.user_message());
                println!("Press Enter to retry, q to quit.");
                match lines.next_line().await? {
                    Some(line) if line.trim() == "q" => return Ok(()),
                    Some(_) => continue,
                    None => return Ok(()),
                }
            }
        }
    };

    // --- Step 4: Push channel ---
    let link = if args.no_push {
        None
    } else {
        let (channel, events) = MatchSyncChannel::connect(
            match_id,
            credentials.clone(),
            Arc::new(WsConnector),
            &config,
        );
        Some(SyncLink { channel, events })
    };

    // --- Step 5: Wire stdin and stdout to the session ---
    let (cmd_tx, cmd_rx) = mpsc::channel::<SessionCommand>(16);
    let (upd_tx, mut upd_rx) = mpsc::channel::<SessionEvent>(config.event_channel_capacity);

    tokio::spawn(async move {
        println!("{}", HELP);
        while let Ok(Some(line)) = lines.next_line().await {
            match parse_command(&line) {
                Some(command) => {
                    if cmd_tx.send(command).await.is_err() {
                        break;
                    }
                }
                None if line.trim().is_empty() => {}
                None => println!("{}", HELP),
            }
        }
    });

    let printer = tokio::spawn(async move {
        while let Some(update) = upd_rx.recv().await {
            match update {
                SessionEvent::View(view) => println!("\n{}", render::board(&view)),
                SessionEvent::Waiting(status) => println!(">>> Waiting ({:?})...", status),
                SessionEvent::Notice(message) => println!("!!! {}", message),
                SessionEvent::Exit(outcome) => {
                    if let Some(outcome) = outcome {
                        println!(">>> {}", outcome.text());
                    }
                }
            }
        }
    });

    session
        .run(link, cmd_rx, upd_tx, || info!("match over, back to matchmaking"))
        .await;
    let _ = printer.await;
    Ok(())
}
