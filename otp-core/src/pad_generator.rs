// File:    pad_generator.rs
// Author:  apezoo
// Date:    2025-07-17
//
// Description: Provides functionality for generating one-time pad keys over the 27-symbol alphabet.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

use rand::Rng;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

use crate::alphabet::ALPHABET;
use crate::message::Message;

/// Errors raised while generating a key.
#[derive(Debug, Error)]
pub enum KeygenError {
    /// A key must contain at least one symbol.
    #[error("key length must be a positive integer")]
    InvalidLength,
    /// The key could not be written out.
    #[error("failed to write key: {0}")]
    Io(#[from] std::io::Error),
}

/// Generates a key of `length` symbols, each drawn uniformly from the alphabet.
///
/// The random source is supplied by the caller; seed it from the OS for real
/// keys and from a fixed seed in tests.
///
/// # Errors
///
/// Returns [`KeygenError::InvalidLength`] if `length` is zero.
pub fn generate_key<R: Rng + ?Sized>(rng: &mut R, length: usize) -> Result<Message, KeygenError> {
    if length == 0 {
        return Err(KeygenError::InvalidLength);
    }
    let symbols = (0..length)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())])
        .collect();
    Ok(Message::from_symbols(symbols))
}

/// Writes `key` followed by a newline to a new file at `path`.
///
/// # Errors
///
/// This function will return an error if the file cannot be created or written to.
pub fn write_key(path: &Path, key: &Message) -> Result<(), KeygenError> {
    let mut file = File::create(path)?;
    file.write_all(key.as_bytes())?;
    file.write_all(b"\n")?;
    Ok(())
}
