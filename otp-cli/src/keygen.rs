#![deny(missing_docs)]
//! Generates a random key for the OTP client.
//!
//! The key is `LENGTH` symbols drawn uniformly from `A`-`Z` and space,
//! followed by a newline.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use env_logger::Env;
use log::{error, info};
use otp_core::pad_generator;

#[derive(Parser)]
#[command(author, version, about, long_about = None, allow_negative_numbers = true)]
#[command(
    after_help = "EXAMPLES:\n  \n# Print a 256-symbol key\notp-keygen 256\n\n# Save a key for a 70000-symbol plaintext\notp-keygen 70000 > mykey"
)]
struct Cli {
    /// Number of symbols to generate
    #[arg(value_parser = parse_length)]
    length: usize,

    /// Write the key to this file instead of standard output
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

fn parse_length(arg: &str) -> Result<usize, String> {
    match arg.parse::<usize>() {
        Ok(length) if length > 0 => Ok(length),
        _ => Err(format!("key length must be a positive integer, got '{arg}'")),
    }
}

fn main() {
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

    let mut rng = rand::rng();
    let key = pad_generator::generate_key(&mut rng, cli.length).unwrap_or_else(|e| {
        error!("{e}");
        process::exit(1);
    });

    match &cli.output {
        Some(path) => {
            if let Err(e) = pad_generator::write_key(path, &key) {
                error!("{}: {e}", path.display());
                process::exit(1);
            }
            info!("Wrote a {}-symbol key to '{}'", key.len(), path.display());
        }
        None => println!("{key}"),
    }
}
