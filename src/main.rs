//! Dicehouse CLI
//!
//! Inspect a settlement database, verify resolved games, or drive the
//! engine through a seeded simulation.

use clap::{Parser, Subcommand};
use dicehouse::{
    config::{generate_sample_config, ConfigLoader, DiceConfig},
    games::GameEvent,
    AccountId, ChainEntropy, DiceEngine, DiceResult, InMemoryLedger, OptimizedStorage,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{path::PathBuf, sync::Arc};
use tokio::sync::broadcast::error::RecvError;

type CliEngine = DiceEngine<OptimizedStorage, InMemoryLedger, ChainEntropy>;

/// Dicehouse wager settlement CLI
#[derive(Parser)]
#[command(name = "dicehouse")]
#[command(about = "Deterministic dice wager settlement engine")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Data directory, overriding the configured one
    #[arg(short, long)]
    data_dir: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show limits, counters and the house balance
    ///
    /// Balances live in a per-run in-memory ledger, so the custody balance
    /// reported here is always 0 even when the stored house balance is not.
    Info,

    /// Show a single game record
    Game {
        id: u64,
    },

    /// Show a player's aggregate statistics
    Player {
        /// Account as 64 hex characters, or a label with --label
        account: String,

        /// Derive the account from a label instead of parsing hex
        #[arg(long)]
        label: bool,
    },

    /// List unresolved games
    Pending {
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Cursor returned by a previous page
        #[arg(long)]
        cursor: Option<String>,
    },

    /// Recompute resolved games from their stored proofs
    Verify {
        id: Option<u64>,

        /// Verify every stored game
        #[arg(long, conflicts_with = "id")]
        all: bool,
    },

    /// Place and resolve random bets against an in-memory ledger
    ///
    /// The ledger starts empty on every run. Pass --fresh to also clear the
    /// data directory, otherwise stored games and house balance carry over.
    Simulate {
        #[arg(short, long, default_value = "1000")]
        bets: u64,

        #[arg(short, long, default_value = "10")]
        players: usize,

        /// RNG seed for bet selection
        #[arg(short, long, default_value = "42")]
        seed: u64,

        #[arg(long, default_value = "1")]
        start_height: u64,

        /// Wipe the data directory before simulating
        #[arg(long)]
        fresh: bool,
    },

    /// Write a default configuration file
    InitConfig {
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> DiceResult<()> {
    let cli = Cli::parse();

    if let Commands::InitConfig { path } = &cli.command {
        generate_sample_config(&path.to_string_lossy())?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_path(path);
    }
    let mut config = loader.load()?;
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_directory = data_dir;
    }

    let default_filter = if cli.verbose {
        "dicehouse=debug".to_string()
    } else {
        config.logging.filter.clone()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    match cli.command {
        Commands::Info => show_info(&config),
        Commands::Game { id } => show_game(&config, id),
        Commands::Player { account, label } => show_player(&config, &account, label),
        Commands::Pending { limit, cursor } => show_pending(&config, limit, cursor),
        Commands::Verify { id, all } => verify_games(&config, id, all),
        Commands::Simulate { bets, players, seed, start_height, fresh } => {
            if fresh {
                config.storage.clear_on_start = true;
            }
            run_simulation(&config, bets, players, seed, start_height).await
        }
        Commands::InitConfig { .. } => Ok(()),
    }
}

fn open_engine(config: &DiceConfig, start_height: u64) -> DiceResult<CliEngine> {
    let storage = OptimizedStorage::new_with_config(&config.storage)?;
    DiceEngine::new(
        config,
        Arc::new(storage),
        Arc::new(InMemoryLedger::new()),
        Arc::new(ChainEntropy::new(start_height)),
    )
}

fn print_json<T: serde::Serialize>(value: &T) -> DiceResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn show_info(config: &DiceConfig) -> DiceResult<()> {
    let engine = open_engine(config, 0)?;
    println!("Data directory: {}", config.storage.data_directory);
    print_json(&engine.get_game_info()?)
}

fn show_game(config: &DiceConfig, id: u64) -> DiceResult<()> {
    let engine = open_engine(config, 0)?;
    match engine.get_game(id)? {
        Some(game) => print_json(&game),
        None => {
            println!("Game {} not found", id);
            Ok(())
        }
    }
}

fn show_player(config: &DiceConfig, account: &str, label: bool) -> DiceResult<()> {
    let account = if label {
        AccountId::from_label(account)
    } else {
        match account.parse::<AccountId>() {
            Ok(account) => account,
            Err(e) => {
                eprintln!("Invalid account: {}", e);
                std::process::exit(2);
            }
        }
    };

    let engine = open_engine(config, 0)?;
    match engine.get_player_stats(&account)? {
        Some(stats) => {
            println!("Player {}", account);
            print_json(&stats)
        }
        None => {
            println!("No games recorded for {}", account);
            Ok(())
        }
    }
}

fn show_pending(config: &DiceConfig, limit: usize, cursor: Option<String>) -> DiceResult<()> {
    let engine = open_engine(config, 0)?;
    let (games, next) = engine.list_pending_games(cursor.as_deref(), limit)?;

    println!("{} pending game(s)", games.len());
    for game in &games {
        println!(
            "  #{:<8} player {:?}  prediction {}  stake {}  admitted at {}",
            game.id, game.player, game.prediction, game.stake, game.admission_height
        );
    }
    if let Some(next) = next {
        println!("Next cursor: {}", next);
    }
    Ok(())
}

fn verify_games(config: &DiceConfig, id: Option<u64>, all: bool) -> DiceResult<()> {
    let engine = open_engine(config, 0)?;

    if let Some(id) = id {
        let ok = engine.verify_game(id)?;
        println!("Game {}: {}", id, if ok { "verified" } else { "NOT verified" });
        return Ok(());
    }
    if !all {
        eprintln!("Pass a game id or --all");
        std::process::exit(2);
    }

    let (mut verified, mut unresolved, mut failed) = (0u64, 0u64, Vec::new());
    let mut cursor: Option<String> = None;
    loop {
        let (games, next) = engine.list_games(cursor.as_deref(), 500)?;
        for game in games {
            if !game.resolved {
                unresolved += 1;
            } else if engine.verify_game(game.id)? {
                verified += 1;
            } else {
                failed.push(game.id);
            }
        }
        match next {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    println!("Verified: {}  Unresolved: {}  Failed: {}", verified, unresolved, failed.len());
    for id in &failed {
        println!("  game {} failed verification", id);
    }
    Ok(())
}

async fn run_simulation(
    config: &DiceConfig,
    bets: u64,
    players: usize,
    seed: u64,
    start_height: u64,
) -> DiceResult<()> {
    let engine = open_engine(config, start_height)?;
    let authority = *engine.authority();
    let game = engine.game_config().clone();

    let players: Vec<AccountId> = (0..players.max(1))
        .map(|i| AccountId::from_label(&format!("sim-player-{}", i)))
        .collect();
    let bankroll = game.max_bet.saturating_mul(bets.max(1));
    for player in &players {
        engine.ledger().mint(player, bankroll)?;
    }
    engine.ledger().mint(&authority, bankroll)?;
    engine.fund(&authority, bankroll)?;

    let mut events = engine.subscribe();
    let listener = tokio::spawn(async move {
        let mut resolved_events = 0u64;
        loop {
            match events.recv().await {
                Ok(GameEvent::GameResolved(_)) => resolved_events += 1,
                Ok(GameEvent::BetPlaced(_)) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event listener lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
        resolved_events
    });

    tracing::info!(bets, players = players.len(), seed, "Starting simulation");
    let mut rng = StdRng::seed_from_u64(seed);
    let mut failures = 0u64;
    for _ in 0..bets {
        let player = &players[rng.gen_range(0..players.len())];
        let prediction = rng.gen_range(1..=6u8);
        let stake = rng.gen_range(game.min_bet..=game.max_bet);

        let id = match engine.place_bet(player, prediction, stake) {
            Ok(id) => id,
            Err(_) => {
                failures += 1;
                continue;
            }
        };
        engine.entropy().advance(rng.gen_range(1..=3));
        if engine.resolve_game(id).is_err() {
            failures += 1;
        }
    }

    let snapshot = engine.metrics().snapshot();
    let house_balance = engine.get_house_balance()?;
    let counter = engine.get_game_counter()?;
    drop(engine);

    let resolved_events = listener.await.unwrap_or_default();

    println!("Simulation complete");
    println!("  Bets placed:     {}", snapshot.bets_placed);
    println!("  Games resolved:  {} ({} events)", snapshot.games_resolved, resolved_events);
    println!("  Player wins:     {}", snapshot.player_wins);
    println!("  Player losses:   {}", snapshot.player_losses);
    println!("  Failures:        {}", failures);
    println!("  Total staked:    {}", snapshot.total_staked);
    println!("  Total paid out:  {}", snapshot.total_paid_out);
    println!("  House balance:   {}", house_balance);
    println!("  Game counter:    {}", counter);
    if let Some(rate) = snapshot.house_win_rate() {
        println!("  House win rate:  {:.2}%", rate * 100.0);
    }
    Ok(())
}
