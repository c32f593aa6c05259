//! Protocol error types.

use thiserror::Error;

/// Errors from framing, handshake negotiation, or the underlying stream.
///
/// A framing failure leaves the stream position unknown; callers must
/// treat the connection as poisoned (see [`Session`](crate::Session)).
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid sysinfo frame: special {special:#010x}, eye-catcher {eye_catcher:#010x}")]
    InvalidSysInfo { special: u32, eye_catcher: u32 },

    #[error("invalid sysinfo reply length: {0}")]
    InvalidSysInfoLength(i32),

    #[error("invalid message length: expected at least {expected}, actual {actual}")]
    InvalidLength { expected: i32, actual: i32 },

    #[error("unknown opcode: {0}")]
    UnknownOpCode(u32),

    #[error("unexpected opcode: expected {expected:#010x}, got {actual:#010x}")]
    UnexpectedOpCode { expected: u32, actual: u32 },

    #[error("session poisoned by an earlier framing error")]
    Poisoned,

    #[error("document error: {0}")]
    Bson(#[from] redwood_bson::BsonError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
