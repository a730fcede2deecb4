#![deny(missing_docs)]
//! The OTP server: encrypts or decrypts text for any number of clients.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use env_logger::Env;
use log::error;
use otp_core::Role;
use otp_server::{ConfigError, ServerConfig, run_server};
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(
    after_help = "EXAMPLES:\n  \n# Serve encryption on port 57171\notp-server 57171\n\n# Serve decryption to at most 10 clients at once\notp-server --role dec --max-sessions 10 57172\n\n# Start from a JSON config file, overriding the role\notp-server --config ./server.json --role enc 57171"
)]
struct Cli {
    /// TCP port to listen on
    #[arg()]
    port: u16,

    /// Transform to serve: `enc` or `dec`. Defaults to `enc`.
    #[arg(short, long, env = "OTP_SERVER_ROLE")]
    role: Option<Role>,

    /// Address to bind. Defaults to all interfaces.
    #[arg(long, value_name = "ADDR")]
    bind: Option<IpAddr>,

    /// Sessions served at once. Defaults to 5.
    #[arg(short = 'n', long, env = "OTP_MAX_SESSIONS")]
    max_sessions: Option<usize>,

    /// Largest text or key accepted, in bytes.
    #[arg(long, value_name = "BYTES")]
    max_frame_len: Option<u32>,

    /// Abort a session after this many seconds.
    #[arg(long, value_name = "SECS")]
    session_timeout: Option<u64>,

    /// Seconds to wait for running sessions on Ctrl-C before aborting them.
    #[arg(long, value_name = "SECS")]
    shutdown_grace: Option<u64>,

    /// JSON configuration file; command-line flags take precedence.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl Cli {
    fn server_config(&self) -> Result<ServerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };
        if let Some(role) = self.role {
            config.role = role;
        }
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(max_sessions) = self.max_sessions {
            config.max_sessions = max_sessions;
        }
        if let Some(max_frame_len) = self.max_frame_len {
            config.max_frame_len = max_frame_len;
        }
        if self.session_timeout.is_some() {
            config.session_timeout_secs = self.session_timeout;
        }
        if let Some(shutdown_grace) = self.shutdown_grace {
            config.shutdown_grace_secs = shutdown_grace;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::try_parse().unwrap_or_else(|e| {
        if !e.use_stderr() {
            e.exit();
        }
        if let Err(write_err) = e.print() {
            error!("{}: {write_err}", e.kind());
        }
        process::exit(1);
    });

    let config = cli.server_config().unwrap_or_else(|e| {
        error!("{e}");
        process::exit(1);
    });

    let addr = SocketAddr::new(config.bind, cli.port);
    let listener = TcpListener::bind(addr).await.unwrap_or_else(|e| {
        error!("Failed to bind {addr}: {e}");
        process::exit(1);
    });

    if let Err(e) = run_server(listener, config, shutdown_signal()).await {
        error!("{e}");
        process::exit(1);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Cannot listen for Ctrl-C, running until killed: {e}");
        std::future::pending::<()>().await;
    }
}
