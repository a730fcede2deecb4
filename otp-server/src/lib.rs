//! OTP server: accepts TCP connections and runs one session per connection.
//!
//! Each accepted connection gets its own task and its own [`Session`]. A
//! semaphore caps how many run at once; a slot is taken before `accept`, so
//! while the server is full new clients wait in the listen backlog instead of
//! being dropped. Finished tasks are joined from the accept loop, and a
//! failing session only ends its own task.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use otp_core::{Session, SessionError};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

/// Server configuration.
pub mod config;

pub use config::{ConfigError, ServerConfig};

/// Pause after a failed `accept` before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Serves sessions on `listener` until `shutdown` completes.
///
/// On shutdown the server stops accepting and waits for the sessions in
/// flight to finish. Sessions still running after the configured grace
/// period are aborted.
///
/// # Errors
///
/// Returns [`ConfigError`] if `config` is invalid. Connection-level failures
/// are logged and never end the server.
pub async fn run_server<F>(
    listener: TcpListener,
    config: ServerConfig,
    shutdown: F,
) -> Result<(), ConfigError>
where
    F: Future<Output = ()>,
{
    config.validate()?;
    let config = Arc::new(config);
    let slots = Arc::new(Semaphore::new(config.max_sessions));
    let mut workers = JoinSet::new();
    let mut next_id: u64 = 0;
    tokio::pin!(shutdown);

    match listener.local_addr() {
        Ok(addr) => info!(
            "{} server listening on {addr} (up to {} concurrent sessions)",
            config.role, config.max_sessions
        ),
        Err(e) => warn!("listening on an unknown address: {e}"),
    }

    'serve: loop {
        let slot = tokio::select! {
            () = &mut shutdown => break 'serve,
            Some(joined) = workers.join_next(), if !workers.is_empty() => {
                reap(joined);
                continue 'serve;
            }
            slot = Arc::clone(&slots).acquire_owned() => match slot {
                Ok(slot) => slot,
                Err(_) => break 'serve,
            },
        };

        let (stream, peer) = loop {
            tokio::select! {
                () = &mut shutdown => break 'serve,
                Some(joined) = workers.join_next(), if !workers.is_empty() => reap(joined),
                accepted = listener.accept() => match accepted {
                    Ok(connection) => break connection,
                    Err(e) => {
                        warn!("accept failed: {e}");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        };

        next_id += 1;
        let id = next_id;
        let config = Arc::clone(&config);
        debug!("session {id}: accepted connection from {peer}");
        workers.spawn(async move {
            // Held until the session ends, whichever way it ends.
            let _slot = slot;
            handle_connection(stream, peer, id, &config).await;
        });
    }

    let grace = config.shutdown_grace();
    info!(
        "shutting down; waiting up to {}s for {} active session(s)",
        grace.as_secs(),
        workers.len()
    );
    if tokio::time::timeout(grace, drain(&mut workers)).await.is_err() {
        warn!("aborting {} session(s) still running", workers.len());
        workers.abort_all();
        drain(&mut workers).await;
    }
    Ok(())
}

async fn drain(workers: &mut JoinSet<()>) {
    while let Some(joined) = workers.join_next().await {
        reap(joined);
    }
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, id: u64, config: &ServerConfig) {
    let mut session = Session::new(stream, config.role).with_max_frame_len(config.max_frame_len);

    let outcome = match config.session_timeout() {
        Some(limit) => {
            let timed = tokio::time::timeout(limit, session.serve()).await;
            if let Ok(outcome) = timed {
                outcome
            } else {
                warn!(
                    "session {id} ({peer}): timed out after {}s while {}",
                    limit.as_secs(),
                    session.state()
                );
                return;
            }
        }
        None => session.serve().await,
    };

    match outcome {
        Ok(result) => info!(
            "session {id} ({peer}): {} {} symbols",
            config.role,
            result.len()
        ),
        Err(e) => log_failure(id, peer, &e),
    }
}

fn log_failure(id: u64, peer: SocketAddr, e: &SessionError) {
    if e.is_auth_rejected() {
        warn!("session {id} ({peer}): rejected: {e}");
    } else {
        error!("session {id} ({peer}): ended {}: {e}", e.terminal_state());
    }
}

fn reap(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!("session worker panicked: {e}");
        } else {
            debug!("session worker cancelled: {e}");
        }
    }
}
