use std::sync::Arc;

use anyhow::{Context, bail};
use courtside_sync::{
    ConnectionState, SnapshotStore, Supervisor, SyncEvent, WebSocketConnector, metrics,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::api::MatchesClient;
use crate::cli::Cli;
use crate::render;

/// Runs until Ctrl-C, `q` on stdin, or (with `--exit-on-failure`) until the
/// stream gives up. `r` on stdin reconnects, `d` disconnects.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli
        .supervisor_config()
        .with_context(|| format!("invalid origin `{}`", cli.origin))?;
    let api_base = cli
        .api_base()
        .with_context(|| format!("invalid origin `{}`", cli.origin))?;

    let store = SnapshotStore::new();
    let _board = store.subscribe(|snapshot| {
        println!("{}\n", render::scoreboard(snapshot));
    });
    hydrate(&store, &MatchesClient::new(api_base), cli.chat_id).await;

    info!(
        url = %config.endpoint.url(),
        backoff = ?config.backoff,
        max_reconnect_attempts = config.max_reconnect_attempts,
        "starting courtside"
    );
    let supervisor = Supervisor::spawn(config, Arc::new(WebSocketConnector), store);
    let mut events = supervisor.events();
    supervisor.connect();

    let outcome = follow(&supervisor, &mut events, cli.exit_on_failure).await;
    supervisor.shutdown().await;

    if cli.print_metrics {
        print!("{}", String::from_utf8_lossy(&metrics::gather()));
    }
    outcome
}

/// Loads the initial collection. A failed fetch is logged and leaves the
/// store empty; the stream still runs. Returns the number of matches loaded.
pub async fn hydrate(
    store: &SnapshotStore,
    client: &MatchesClient,
    chat_id: Option<i64>,
) -> usize {
    match client.list_live(chat_id).await {
        Ok(matches) => {
            let count = matches.len();
            store.replace(matches);
            info!(count, ?chat_id, "loaded live matches");
            count
        }
        Err(err) => {
            warn!(error = %err, "could not load live matches, starting empty");
            0
        }
    }
}

async fn follow(
    supervisor: &Supervisor,
    events: &mut broadcast::Receiver<SyncEvent>,
    exit_on_failure: bool,
) -> anyhow::Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut commands = stdin_lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result.context("listening for ctrl-c")?;
                info!("interrupted");
                return Ok(());
            }
            line = commands.recv(), if stdin_open => match line {
                Some(line) => match line.trim() {
                    "r" | "reconnect" => supervisor.connect(),
                    "d" | "disconnect" => supervisor.disconnect(),
                    "q" | "quit" => return Ok(()),
                    "" => {}
                    other => warn!(command = other, "unknown command, expected r, d or q"),
                },
                None => stdin_open = false,
            },
            event = events.recv() => match event {
                Ok(SyncEvent::Connected(up)) => info!(connected = up, "match stream"),
                Ok(SyncEvent::StateChanged(ConnectionState::FailedPermanently)) => {
                    if exit_on_failure {
                        bail!("match stream unavailable, reconnection attempts exhausted");
                    }
                    error!("match stream gave up, enter `r` to reconnect");
                }
                Ok(SyncEvent::StateChanged(state)) => debug!(%state, "match stream state"),
                Ok(SyncEvent::Error(err)) => debug!(error = %err, "match stream error"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "dropped stream events"),
                Err(RecvError::Closed) => return Ok(()),
            },
        }
    }
}

/// Stdin lines, read on a plain thread: a blocking read must not hold up
/// runtime shutdown.
fn stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    let spawned = std::thread::Builder::new()
        .name("courtside-stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(err) = spawned {
        warn!(error = %err, "stdin commands unavailable");
    }
    rx
}
