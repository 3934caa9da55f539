//! TTT-Online terminal client.
//!
//! Connects to the game server, authenticates once the connection has
//! settled, and then reads commands from standard input.  Server events are
//! printed as they arrive, together with the board.
//!
//! # Usage
//!
//! ```text
//! ttt-client [OPTIONS]
//!
//! Options:
//!   -c, --config <PATH>   Config file [default: ttt-client.toml]
//!       --host <HOST>     Server host (overrides the config file)
//!   -p, --port <PORT>     Server port (overrides the config file)
//! ```
//!
//! # Commands
//!
//! | Command        | Effect                                              |
//! |----------------|-----------------------------------------------------|
//! | `create NNNN`  | Leave the current competition, create `NNNN`        |
//! | `join NNNN`    | Leave the current competition, join `NNNN`          |
//! | `leave`        | Leave the current competition                       |
//! | `put X Y`      | Place a piece at column `X`, row `Y` (1 to 3)       |
//! | `reset`        | Start a new round in the current competition        |
//! | `sync`         | Ask the server to replay the board                  |
//! | `stats`        | Ask the server for statistics                       |
//! | `status`       | Print the local competition mirror                  |
//! | `quit`         | Close the connection and exit                       |

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use clap::Parser;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ttt_client::application::competition::{Notice, Outcome, SessionObserver, Side};
use ttt_client::application::session::{Session, StopReason};
use ttt_client::application::session_client::{SessionClient, SessionError};
use ttt_client::domain::board::{Board, Cell};
use ttt_client::domain::competition::{CompetitionMirror, Phase};
use ttt_client::infrastructure::config::load_config;
use ttt_client::infrastructure::network::ConnectionManager;
use ttt_core::{CompetitionId, PlayerId};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name = "ttt-client",
    about = "Terminal client for TTT-Online two-player tic-tac-toe",
    version
)]
struct Cli {
    /// Path to the TOML config file.  A missing file means defaults.
    #[arg(short, long, default_value = "ttt-client.toml", env = "TTT_CONFIG")]
    config: PathBuf,

    /// Server host name or IP address.
    #[arg(long, env = "TTT_HOST")]
    host: Option<String>,

    /// Server TCP port.
    #[arg(short, long, env = "TTT_PORT")]
    port: Option<u16>,
}

// ── User commands ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Create(CompetitionId),
    Join(CompetitionId),
    Leave,
    Put(i32, i32),
    Reset,
    Sync,
    Stats,
    Status,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err("empty command".to_string());
    };
    let args: Vec<&str> = words.collect();

    let competition = |args: &[&str]| match args {
        [code] => CompetitionId::parse_code(code).map_err(|e| e.to_string()),
        _ => Err("expected a four-digit competition number".to_string()),
    };

    match verb.to_ascii_lowercase().as_str() {
        "create" => competition(&args).map(Command::Create),
        "join" => competition(&args).map(Command::Join),
        "leave" => Ok(Command::Leave),
        "put" => match args.as_slice() {
            [x, y] => {
                let x = x.parse().map_err(|_| format!("bad column {x:?}"))?;
                let y = y.parse().map_err(|_| format!("bad row {y:?}"))?;
                Ok(Command::Put(x, y))
            }
            _ => Err("usage: put X Y".to_string()),
        },
        "reset" => Ok(Command::Reset),
        "sync" => Ok(Command::Sync),
        "stats" => Ok(Command::Stats),
        "status" => Ok(Command::Status),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(format!("unknown command {other:?}; type `help`")),
    }
}

/// Sends the requests for one command.  Returns `false` on `quit`.
fn execute(
    command: Command,
    client: &SessionClient,
    mirror: &CompetitionMirror,
) -> Result<bool, SessionError> {
    let current = mirror.id();
    match command {
        Command::Create(id) | Command::Join(id) => {
            if !current.is_none() {
                client.leave_competition(current)?;
            }
            if matches!(command, Command::Create(_)) {
                client.create_competition(id)?;
            } else {
                client.join_competition(id)?;
            }
        }
        Command::Leave => client.leave_competition(current)?,
        Command::Put(x, y) => client.place_piece(current, x, y)?,
        Command::Reset => {
            if current.is_none() {
                client.leave_competition(CompetitionId::NONE)?;
                println!("not in a competition; use `create NNNN` or `join NNNN`");
            } else {
                client.reset_competition(current)?;
                client.request_statistics()?;
            }
        }
        Command::Sync => client.request_sync()?,
        Command::Stats => client.request_statistics()?,
        Command::Status => print_status(mirror),
        Command::Help => println!(
            "commands: create NNNN, join NNNN, leave, put X Y, reset, sync, stats, status, quit"
        ),
        Command::Quit => return Ok(false),
    }
    Ok(true)
}

fn print_status(mirror: &CompetitionMirror) {
    let short = |p: Option<PlayerId>| p.map_or_else(|| "unknown".to_string(), |p| p.short());
    let competition = match mirror.phase() {
        Phase::NoMatch => "not joined".to_string(),
        Phase::Waiting => format!("{} (waiting for opponent)", mirror.id()),
        Phase::Active => format!("{} (playing)", mirror.id()),
    };
    let me = mirror.score(Side::Myself);
    let other = mirror.score(Side::Opponent);
    println!("competition: {competition}");
    println!(
        "me:       {}  {} wins / {} losses",
        short(mirror.myself()),
        me.wins,
        me.losses
    );
    println!(
        "opponent: {}  {} wins / {} losses",
        short(mirror.opponent()),
        other.wins,
        other.losses
    );
}

/// Feeds standard input lines into a channel from a plain thread.
///
/// A detached thread does not hold up runtime shutdown while it is blocked
/// on a read.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    warn!("could not read standard input: {e}");
                    return;
                }
            }
        }
    });
    rx
}

async fn read_commands(
    mut lines: mpsc::Receiver<String>,
    client: SessionClient,
    mirror: watch::Receiver<CompetitionMirror>,
) {
    while let Some(line) = lines.recv().await {
        if line.trim().is_empty() {
            continue;
        }
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };
        let snapshot = mirror.borrow().clone();
        match execute(command, &client, &snapshot) {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => println!("{e}"),
        }
    }
}

// ── Terminal observer ─────────────────────────────────────────────────────────

/// Prints notices and keeps the board that is drawn after every change.
#[derive(Default)]
struct TerminalObserver {
    board: Mutex<Board>,
}

impl SessionObserver for TerminalObserver {
    fn notice(&self, notice: Notice) {
        let text = match notice {
            Notice::Created(id) => format!("created competition {id}"),
            Notice::Joined(id) => format!("joined competition {id}"),
            Notice::Started(id) => format!("competition {id} started"),
            Notice::Left => "left the competition".to_string(),
            Notice::BoardReset => "board reset".to_string(),
            Notice::Finished(Outcome::SelfWin) => "you win! `reset` to play again".to_string(),
            Notice::Finished(Outcome::OpponentWin) => {
                "your opponent wins. `reset` to play again".to_string()
            }
            Notice::Finished(Outcome::Draw) => "draw. `reset` to play again".to_string(),
            Notice::Finished(Outcome::NoWinner) => "nobody wins".to_string(),
            Notice::ServerError(e) => format!("server: {e}"),
            Notice::ConnectionLost => "connection lost".to_string(),
            Notice::ConnectFailed(e) => format!("could not connect: {e}"),
        };
        println!("* {text}");
    }

    fn reset_board(&self) {
        self.board
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset();
    }

    fn place_piece(&self, side: Side, x: i32, y: i32) {
        let cell = match side {
            Side::Myself => Cell::FirstHand,
            Side::Opponent => Cell::BackHand,
        };
        let mut board = self.board.lock().unwrap_or_else(PoisonError::into_inner);
        match board.put(cell, x, y) {
            Ok(()) => print!("{board}"),
            Err(e) => warn!("ignoring placement from server: {e}"),
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let host = cli.host.unwrap_or_else(|| config.server.host.clone());
    let port = cli.port.unwrap_or(config.server.port);
    info!("TTT-Online client starting, server={host}:{port}");

    let (manager, mut events) = ConnectionManager::new(config.session.connection_config());
    let mut session = Session::new(manager.client(), Arc::new(TerminalObserver::default()));
    session.set_on_connected(|client| {
        info!("connection settled; authenticating");
        if let Err(e) = client.auth() {
            warn!("authentication request failed: {e}");
        }
        println!("connected. type `help` for commands");
    });

    manager.connect(&host, port);
    let mut input = tokio::spawn(read_commands(
        spawn_stdin_reader(),
        manager.client(),
        session.mirror(),
    ));

    let stopped = tokio::select! {
        reason = session.run(&mut events) => Some(reason),
        _ = &mut input => None,
        _ = tokio::signal::ctrl_c() => {
            info!("received Ctrl+C");
            None
        }
    };

    let reason = match stopped {
        Some(reason) => {
            input.abort();
            reason
        }
        None => {
            manager.close();
            session.run(&mut events).await
        }
    };

    match reason {
        StopReason::ConnectFailed(e) => Err(e).context("could not reach the server"),
        other => {
            info!(reason = ?other, "TTT-Online client stopped");
            Ok(())
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
