#![deny(missing_docs)]
//! A command-line client for the OTP server.
//!
//! Loads a text and a key, has the server encrypt or decrypt the text, and
//! prints the result. Exit status 1 means the inputs were rejected locally,
//! 2 means the connection or the exchange failed.

use std::io;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use env_logger::Env;
use log::{debug, error};
use otp_core::crypto::{self, CryptoError};
use otp_core::{LoadError, Message, Role, Session, SessionError};
use thiserror::Error;
use tokio::net::TcpStream;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(
    after_help = "EXAMPLES:\n  \n# Encrypt plaintext1 with mykey on an encryption server at port 57171\notp-client plaintext1 mykey 57171 > ciphertext1\n\n# Decrypt it again on a decryption server at port 57172\notp-client --role dec ciphertext1 mykey 57172"
)]
struct Cli {
    /// File holding the text: plaintext to encrypt, or ciphertext to decrypt
    #[arg()]
    text: PathBuf,

    /// File holding the key; must be at least as long as the text
    #[arg()]
    key: PathBuf,

    /// Port the server listens on
    #[arg()]
    port: u16,

    /// Role to request from the server: `enc` or `dec`
    #[arg(short, long, env = "OTP_CLIENT_ROLE", default_value = "enc")]
    role: Role,

    /// Host the server runs on
    #[arg(long, env = "OTP_HOST", default_value = "localhost")]
    host: String,
}

#[derive(Debug, Error)]
enum ClientError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error("cannot connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        source: io::Error,
    },
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ClientError {
    const fn exit_code(&self) -> i32 {
        match self {
            Self::Load(_) | Self::Crypto(_) => 1,
            Self::Session(e) if e.is_validation() => 1,
            Self::Connect { .. } | Self::Session(_) => 2,
        }
    }
}

async fn run(cli: &Cli) -> Result<Message, ClientError> {
    let text = Message::from_file(&cli.text)?;
    let key = Message::from_file(&cli.key)?;
    crypto::check_key_length(&text, &key)?;

    let stream = TcpStream::connect((cli.host.as_str(), cli.port))
        .await
        .map_err(|source| ClientError::Connect {
            host: cli.host.clone(),
            port: cli.port,
            source,
        })?;
    debug!("connected to {}:{} as {}", cli.host, cli.port, cli.role);

    let mut session = Session::new(stream, cli.role);
    Ok(session.request(&text, &key).await?)
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();
    let cli = Cli::try_parse().unwrap_or_else(|e| {
        if !e.use_stderr() {
            e.exit();
        }
        if let Err(write_err) = e.print() {
            error!("{}: {write_err}", e.kind());
        }
        process::exit(1);
    });

    match run(&cli).await {
        Ok(result) => println!("{result}"),
        Err(e) => {
            error!("{e}");
            process::exit(e.exit_code());
        }
    }
}
