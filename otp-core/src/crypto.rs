// File:    crypto.rs
// Author:  apezoo
// Date:    2025-07-17
//
// Description: Handles the core cryptographic operations: modular one-time pad encryption and decryption over the 27-symbol alphabet.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! This module contains the core cryptographic operations.
//!
//! Each symbol of the text is combined with the symbol at the same position
//! of the key by addition (encrypt) or subtraction (decrypt) modulo 27. Only
//! the first `text.len()` symbols of the key are consumed.

use thiserror::Error;

use crate::alphabet::{self, ALPHABET_SIZE, AlphabetError};
use crate::message::Message;

/// Errors raised by the transform.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    /// The key has fewer symbols than the text.
    #[error("key is too short: {key_len} symbols for {text_len} symbols of text")]
    KeyTooShort {
        /// Symbols in the text.
        text_len: usize,
        /// Symbols in the key.
        key_len: usize,
    },
    /// A symbol failed to encode or decode.
    #[error(transparent)]
    Alphabet(#[from] AlphabetError),
}

/// Checks that `key` covers every symbol of `text`.
///
/// # Errors
///
/// Returns [`CryptoError::KeyTooShort`] if it does not.
pub fn check_key_length(text: &Message, key: &Message) -> Result<(), CryptoError> {
    let (text_len, key_len) = (text.len(), key.len());
    if key_len < text_len {
        return Err(CryptoError::KeyTooShort { text_len, key_len });
    }
    Ok(())
}

/// Encrypts `text` with `key`.
///
/// # Errors
///
/// Returns [`CryptoError::KeyTooShort`] before transforming anything if the
/// key is shorter than the text.
pub fn encrypt(text: &Message, key: &Message) -> Result<Message, CryptoError> {
    transform(text, key, |t, k| (t + k) % ALPHABET_SIZE)
}

/// Decrypts `text` with `key`. This is the inverse of [`encrypt`].
///
/// # Errors
///
/// Returns [`CryptoError::KeyTooShort`] before transforming anything if the
/// key is shorter than the text.
pub fn decrypt(text: &Message, key: &Message) -> Result<Message, CryptoError> {
    transform(text, key, |t, k| (t + ALPHABET_SIZE - k) % ALPHABET_SIZE)
}

fn transform(
    text: &Message,
    key: &Message,
    combine: impl Fn(u8, u8) -> u8,
) -> Result<Message, CryptoError> {
    check_key_length(text, key)?;
    let output = text
        .as_bytes()
        .iter()
        .zip(key.as_bytes())
        .map(|(&t, &k)| -> Result<u8, AlphabetError> {
            alphabet::decode(combine(alphabet::encode(t)?, alphabet::encode(k)?))
        })
        .collect::<Result<Vec<u8>, AlphabetError>>()?;
    Ok(Message::from_symbols(output))
}
