// File:    protocol.rs
// Author:  apezoo
// Date:    2025-08-03
//
// Description: The per-connection session protocol shared by the OTP client and server.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! The session protocol.
//!
//! One session is one exchange over one connection:
//!
//! 1. the client sends a 3-byte role token (`ENC` or `DEC`);
//! 2. the server answers `OK` if the token matches its own role, otherwise
//!    `NO`, and closes;
//! 3. the client sends the text, then the key, each as one frame;
//! 4. the server validates both, applies its transform and sends the result
//!    as one frame;
//! 5. both ends close.
//!
//! Client and server run the same [`Session`] type; only the entry point
//! differs ([`Session::request`] or [`Session::serve`]).

use std::fmt;
use std::str::FromStr;

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::crypto::{self, CryptoError};
use crate::framing::{self, DEFAULT_MAX_FRAME_LEN, FrameError};
use crate::message::{Message, MessageError};

/// Width of the role token sent by the client.
pub const ROLE_TOKEN_LEN: usize = 3;

/// Width of the handshake status sent by the server.
pub const STATUS_LEN: usize = 2;

/// Status sent when the client's role matches the server's.
pub const STATUS_OK: [u8; STATUS_LEN] = *b"OK";

/// Status sent before the server closes a mismatched handshake.
pub const STATUS_REJECTED: [u8; STATUS_LEN] = *b"NO";

/// Which direction of the transform a session performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Plaintext in, ciphertext out.
    #[serde(alias = "enc")]
    Encrypt,
    /// Ciphertext in, plaintext out.
    #[serde(alias = "dec")]
    Decrypt,
}

impl Role {
    /// The handshake token identifying this role on the wire.
    pub const fn token(self) -> [u8; ROLE_TOKEN_LEN] {
        match self {
            Self::Encrypt => *b"ENC",
            Self::Decrypt => *b"DEC",
        }
    }

    /// Looks up the role for a handshake token.
    pub fn from_token(token: &[u8]) -> Option<Self> {
        [Self::Encrypt, Self::Decrypt]
            .into_iter()
            .find(|role| role.token() == token)
    }

    /// Applies this role's transform.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::KeyTooShort`] if the key does not cover the text.
    pub fn apply(self, text: &Message, key: &Message) -> Result<Message, CryptoError> {
        match self {
            Self::Encrypt => crypto::encrypt(text, key),
            Self::Decrypt => crypto::decrypt(text, key),
        }
    }

    /// Lowercase name, as used in configuration.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Encrypt => "encrypt",
            Self::Decrypt => "decrypt",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role name that is none of `enc`, `encrypt`, `dec` or `decrypt`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role '{0}', expected 'enc' or 'dec'")]
pub struct ParseRoleError(String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "enc" | "encrypt" => Ok(Self::Encrypt),
            "dec" | "decrypt" => Ok(Self::Decrypt),
            _ => Err(ParseRoleError(s.to_owned())),
        }
    }
}

/// Where a session is in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The connection is open; nothing has been exchanged.
    Connected,
    /// Role token and status are being exchanged.
    Handshaking,
    /// The text frame is in flight.
    AwaitingText,
    /// The key frame is in flight.
    AwaitingKey,
    /// The transform is being applied.
    Processing,
    /// The result frame is in flight.
    Replying,
    /// The exchange completed and the connection is closed.
    Closed,
    /// The handshake failed because the roles differ.
    AuthRejected,
    /// Text or key failed validation; no transform was applied.
    ValidationFailed,
    /// The transport failed or the peer broke the protocol.
    Aborted,
}

impl SessionState {
    /// Whether the session has ended.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Closed | Self::AuthRejected | Self::ValidationFailed | Self::Aborted
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connected => "connected",
            Self::Handshaking => "handshaking",
            Self::AwaitingText => "awaiting-text",
            Self::AwaitingKey => "awaiting-key",
            Self::Processing => "processing",
            Self::Replying => "replying",
            Self::Closed => "closed",
            Self::AuthRejected => "auth-rejected",
            Self::ValidationFailed => "validation-failed",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Which payload of the exchange an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// The plaintext or ciphertext sent by the client.
    Text,
    /// The key sent by the client.
    Key,
    /// The result sent by the server.
    Result,
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Key => "key",
            Self::Result => "result",
        })
    }
}

/// Errors that end a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The server refused this client's role.
    #[error("server rejected the {role} handshake; it serves the other role")]
    Rejected {
        /// The role the client asked for.
        role: Role,
    },
    /// The client presented a token for another role.
    #[error("client sent role token {received:?} but this server serves {expected}")]
    RoleMismatch {
        /// The role this server serves.
        expected: Role,
        /// The token as received, lossily decoded.
        received: String,
    },
    /// The server answered the handshake with neither `OK` nor `NO`.
    #[error("unexpected handshake status {0:?}")]
    UnexpectedStatus(String),
    /// A payload contained a byte outside the alphabet.
    #[error("invalid {payload}: {source}")]
    Validation {
        /// The offending payload.
        payload: Payload,
        /// Which byte was rejected.
        source: MessageError,
    },
    /// The key does not cover the text.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    /// The result has a different length from the text.
    #[error("result has {received} symbols, expected {expected}")]
    ReplyLength {
        /// Symbols in the text.
        expected: usize,
        /// Symbols in the result.
        received: usize,
    },
    /// The transport failed.
    #[error(transparent)]
    Transport(#[from] FrameError),
}

impl SessionError {
    /// The terminal state a session ends in after this error.
    pub const fn terminal_state(&self) -> SessionState {
        match self {
            Self::Rejected { .. } | Self::RoleMismatch { .. } => SessionState::AuthRejected,
            Self::Validation { .. } | Self::Crypto(_) => SessionState::ValidationFailed,
            Self::UnexpectedStatus(_) | Self::ReplyLength { .. } | Self::Transport(_) => {
                SessionState::Aborted
            }
        }
    }

    /// Whether the handshake failed on a role mismatch.
    pub const fn is_auth_rejected(&self) -> bool {
        matches!(self.terminal_state(), SessionState::AuthRejected)
    }

    /// Whether text or key failed validation.
    pub const fn is_validation(&self) -> bool {
        matches!(self.terminal_state(), SessionState::ValidationFailed)
    }
}

/// One protocol exchange over one connection.
///
/// The session owns its stream for its whole life; when it is dropped the
/// connection closes, whichever way the exchange ended.
#[derive(Debug)]
pub struct Session<S> {
    stream: S,
    role: Role,
    state: SessionState,
    max_frame_len: u32,
}

impl<S> Session<S> {
    /// Starts a session for `role` on an open connection.
    pub const fn new(stream: S, role: Role) -> Self {
        Self {
            stream,
            role,
            state: SessionState::Connected,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }

    /// Sets the largest frame this session will accept.
    #[must_use]
    pub fn with_max_frame_len(mut self, max_frame_len: u32) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// The current protocol state.
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// The role this session performs.
    pub const fn role(&self) -> Role {
        self.role
    }

    fn advance(&mut self, next: SessionState) {
        debug!("{} session: {} -> {}", self.role, self.state, next);
        self.state = next;
    }
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Runs the server side of the exchange and returns the result sent.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::RoleMismatch`] after answering `NO`,
    /// [`SessionError::Validation`] or [`SessionError::Crypto`] without
    /// replying, and [`SessionError::Transport`] for I/O failures.
    pub async fn serve(&mut self) -> Result<Message, SessionError> {
        let outcome = self.serve_steps().await;
        self.finish(outcome).await
    }

    /// Runs the client side of the exchange and returns the server's result.
    ///
    /// The key length is checked before anything is written.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Crypto`] for a short key,
    /// [`SessionError::Rejected`] if the server serves the other role,
    /// and [`SessionError::Transport`] for I/O failures.
    pub async fn request(&mut self, text: &Message, key: &Message) -> Result<Message, SessionError> {
        let outcome = self.request_steps(text, key).await;
        self.finish(outcome).await
    }

    async fn serve_steps(&mut self) -> Result<Message, SessionError> {
        self.advance(SessionState::Handshaking);
        let mut token = [0u8; ROLE_TOKEN_LEN];
        framing::read_fixed(&mut self.stream, &mut token).await?;
        if Role::from_token(&token) != Some(self.role) {
            if let Err(e) = self.write_status(STATUS_REJECTED).await {
                trace!("could not send rejection: {e}");
            }
            return Err(SessionError::RoleMismatch {
                expected: self.role,
                received: String::from_utf8_lossy(&token).into_owned(),
            });
        }
        self.write_status(STATUS_OK).await?;

        self.advance(SessionState::AwaitingText);
        let text = framing::receive_message(&mut self.stream, self.max_frame_len).await?;
        self.advance(SessionState::AwaitingKey);
        let key = framing::receive_message(&mut self.stream, self.max_frame_len).await?;

        let text = validate(text, Payload::Text)?;
        let key = validate(key, Payload::Key)?;
        crypto::check_key_length(&text, &key)?;

        self.advance(SessionState::Processing);
        let result = self.role.apply(&text, &key)?;

        self.advance(SessionState::Replying);
        framing::send_message(&mut self.stream, result.as_bytes()).await?;
        Ok(result)
    }

    async fn request_steps(&mut self, text: &Message, key: &Message) -> Result<Message, SessionError> {
        crypto::check_key_length(text, key)?;

        self.advance(SessionState::Handshaking);
        let token = self.role.token();
        self.stream
            .write_all(&token)
            .await
            .map_err(FrameError::from)?;
        self.stream.flush().await.map_err(FrameError::from)?;

        let mut status = [0u8; STATUS_LEN];
        match framing::read_fixed(&mut self.stream, &mut status).await {
            Ok(()) => {}
            // A server may close without answering a role it does not serve.
            Err(FrameError::ConnectionClosed | FrameError::Truncated { .. }) => {
                return Err(SessionError::Rejected { role: self.role });
            }
            Err(e) => return Err(e.into()),
        }
        if status == STATUS_REJECTED {
            return Err(SessionError::Rejected { role: self.role });
        }
        if status != STATUS_OK {
            return Err(SessionError::UnexpectedStatus(
                String::from_utf8_lossy(&status).into_owned(),
            ));
        }

        self.advance(SessionState::AwaitingText);
        framing::send_message(&mut self.stream, text.as_bytes()).await?;
        self.advance(SessionState::AwaitingKey);
        framing::send_message(&mut self.stream, key.as_bytes()).await?;

        self.advance(SessionState::Processing);
        let reply = framing::receive_message(&mut self.stream, self.max_frame_len).await?;
        self.advance(SessionState::Replying);
        let result = validate(reply, Payload::Result)?;
        if result.len() != text.len() {
            return Err(SessionError::ReplyLength {
                expected: text.len(),
                received: result.len(),
            });
        }
        Ok(result)
    }

    async fn write_status(&mut self, status: [u8; STATUS_LEN]) -> Result<(), FrameError> {
        self.stream.write_all(&status).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn finish(
        &mut self,
        outcome: Result<Message, SessionError>,
    ) -> Result<Message, SessionError> {
        match &outcome {
            Ok(_) => self.advance(SessionState::Closed),
            Err(e) => self.advance(e.terminal_state()),
        }
        if let Err(e) = self.stream.shutdown().await {
            trace!("shutdown after {} failed: {e}", self.state);
        }
        outcome
    }
}

fn validate(bytes: Vec<u8>, payload: Payload) -> Result<Message, SessionError> {
    Message::new(bytes).map_err(|source| SessionError::Validation { payload, source })
}
