// File:    message.rs
// Author:  apezoo
// Date:    2025-08-02
//
// Description: A validated sequence of alphabet symbols, and the loader that reads one from a text file.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::alphabet::{self, AlphabetError};

/// A byte in a candidate message was not an alphabet symbol.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("{source} at position {position}")]
pub struct MessageError {
    /// Zero-based index of the offending byte.
    pub position: usize,
    /// The codec error for that byte.
    pub source: AlphabetError,
}

/// Failure to load a message from a file.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file could not be read.
    #[error("cannot read '{}': {source}", path.display())]
    Io {
        /// The file that was being read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
    /// The file contained a byte outside the alphabet.
    #[error("invalid content in '{}': {source}", path.display())]
    Invalid {
        /// The file that was being read.
        path: PathBuf,
        /// Which byte was rejected.
        source: MessageError,
    },
}

/// An ordered sequence of alphabet symbols.
///
/// A `Message` can only be built through the alphabet codec, so every value
/// holds symbols only. Text, keys and results are all messages.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Message(Vec<u8>);

impl Message {
    /// Validates `bytes` and wraps them.
    ///
    /// # Errors
    ///
    /// Returns the position of the first byte that is not a symbol.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, MessageError> {
        let bytes = bytes.into();
        for (position, &byte) in bytes.iter().enumerate() {
            alphabet::encode(byte).map_err(|source| MessageError { position, source })?;
        }
        Ok(Self(bytes))
    }

    /// Reads a message from a text file.
    ///
    /// Trailing line terminators are stripped; every other byte must be a
    /// symbol.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Io`] if the file cannot be read and
    /// [`LoadError::Invalid`] if it contains anything else.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let mut bytes = fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        while matches!(bytes.last(), Some(b'\n' | b'\r')) {
            bytes.pop();
        }
        Self::new(bytes).map_err(|source| LoadError::Invalid {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Wraps bytes already known to be symbols.
    pub(crate) const fn from_symbols(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The symbols as raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Number of symbols.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the message has no symbols.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for Message {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.as_bytes())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Symbols are ASCII, so each byte is one char.
        self.0.iter().try_for_each(|&b| write!(f, "{}", char::from(b)))
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Message({:?})", self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn accepts_alphabet_text() {
        let message: Message = "HELLO WORLD".parse().unwrap();
        assert_eq!(message.len(), 11);
        assert_eq!(message.to_string(), "HELLO WORLD");
    }

    #[test]
    fn empty_message_is_valid() {
        let message = Message::new(Vec::new()).unwrap();
        assert!(message.is_empty());
        assert_eq!(message.to_string(), "");
    }

    #[test]
    fn reports_first_invalid_position() {
        let err = "HELLo W5".parse::<Message>().unwrap_err();
        assert_eq!(err.position, 4);
        assert_eq!(err.source, AlphabetError::InvalidSymbol(b'o'));
    }

    #[test]
    fn rejects_embedded_newline() {
        let err = Message::new(b"AB\nCD".to_vec()).unwrap_err();
        assert_eq!(err.position, 2);
    }

    #[test]
    fn loads_file_and_strips_trailing_newline() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"THE RED GOOSE\r\n").unwrap();
        let message = Message::from_file(file.path()).unwrap();
        assert_eq!(message.to_string(), "THE RED GOOSE");
    }

    #[test]
    fn file_with_lowercase_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"HELLO world\n").unwrap();
        let err = Message::from_file(file.path()).unwrap_err();
        assert!(matches!(err, LoadError::Invalid { source, .. } if source.position == 6));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Message::from_file(dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
