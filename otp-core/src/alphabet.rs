// File:    alphabet.rs
// Author:  apezoo
// Date:    2025-08-02
//
// Description: Maps the 27-symbol text alphabet (A-Z and space) to and from the integers 0-26.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! The 27-symbol alphabet and its integer encoding.
//!
//! `A`-`Z` encode to 0-25 and space encodes to 26. Every character check in
//! the workspace goes through [`encode`].

use thiserror::Error;

/// The symbols of the alphabet, indexed by their encoded value.
pub const ALPHABET: &[u8; 27] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ ";

/// Number of symbols in the alphabet; the modulus of the transform.
pub const ALPHABET_SIZE: u8 = 27;

const SPACE_VALUE: u8 = 26;

/// Errors raised by the alphabet codec.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AlphabetError {
    /// The byte is not one of `A`-`Z` or space.
    #[error("invalid symbol 0x{0:02x}")]
    InvalidSymbol(u8),
    /// The value is outside `0..27`.
    #[error("value {0} is outside the alphabet range 0..27")]
    ValueOutOfRange(u8),
}

/// Encodes a symbol to its value in `0..27`.
///
/// # Errors
///
/// Returns [`AlphabetError::InvalidSymbol`] for any byte outside the alphabet.
pub const fn encode(symbol: u8) -> Result<u8, AlphabetError> {
    match symbol {
        b'A'..=b'Z' => Ok(symbol - b'A'),
        b' ' => Ok(SPACE_VALUE),
        other => Err(AlphabetError::InvalidSymbol(other)),
    }
}

/// Decodes a value in `0..27` back to its symbol.
///
/// # Errors
///
/// Returns [`AlphabetError::ValueOutOfRange`] for values of 27 and above.
pub const fn decode(value: u8) -> Result<u8, AlphabetError> {
    if value < ALPHABET_SIZE {
        Ok(ALPHABET[value as usize])
    } else {
        Err(AlphabetError::ValueOutOfRange(value))
    }
}

/// Returns `true` if `byte` is a symbol of the alphabet.
pub const fn is_symbol(byte: u8) -> bool {
    encode(byte).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_letters_and_space() {
        assert_eq!(encode(b'A'), Ok(0));
        assert_eq!(encode(b'H'), Ok(7));
        assert_eq!(encode(b'Z'), Ok(25));
        assert_eq!(encode(b' '), Ok(26));
    }

    #[test]
    fn decode_is_inverse_of_encode() {
        for &symbol in ALPHABET {
            let value = encode(symbol).unwrap();
            assert_eq!(decode(value), Ok(symbol));
        }
        for value in 0..ALPHABET_SIZE {
            assert_eq!(encode(decode(value).unwrap()), Ok(value));
        }
    }

    #[test]
    fn rejects_bytes_outside_alphabet() {
        for byte in [b'a', b'z', b'5', b'\n', b'@', b'[', 0x00, 0xff] {
            assert_eq!(encode(byte), Err(AlphabetError::InvalidSymbol(byte)));
            assert!(!is_symbol(byte));
        }
    }

    #[test]
    fn rejects_values_out_of_range() {
        assert_eq!(decode(27), Err(AlphabetError::ValueOutOfRange(27)));
        assert_eq!(decode(u8::MAX), Err(AlphabetError::ValueOutOfRange(255)));
    }

    #[test]
    fn error_message_names_the_byte() {
        let err = encode(b'a').unwrap_err();
        assert_eq!(err.to_string(), "invalid symbol 0x61");
        let err = encode(b'\n').unwrap_err();
        assert_eq!(err.to_string(), "invalid symbol 0x0a");
    }
}
