// File:    lib.rs
// Author:  apezoo
// Date:    2025-07-17
//
// Description: The main library crate for otp-core: alphabet codec, one-time pad transform, key generation, framing and the session protocol.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! # OTP Core Library
//!
//! This library provides the core functionality for one-time pad (OTP)
//! encryption of text over the 27-symbol alphabet `A`-`Z` plus space, and the
//! wire protocol a client and server use to exchange it over TCP.

/// The 27-symbol alphabet and its integer encoding.
pub mod alphabet;
/// Cryptographic operations for encryption and decryption.
pub mod crypto;
/// Length-prefixed framing over a byte stream.
pub mod framing;
/// Validated symbol sequences and the file loader.
pub mod message;
/// Utilities for generating new one-time pad keys.
pub mod pad_generator;
/// The handshake and exchange run over each connection.
pub mod protocol;

pub use crypto::{CryptoError, decrypt, encrypt};
pub use framing::FrameError;
pub use message::{LoadError, Message, MessageError};
pub use protocol::{Role, Session, SessionError, SessionState};
