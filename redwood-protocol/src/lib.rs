//! # redwood-protocol
//!
//! Wire protocol for redwood.
//!
//! This crate provides:
//! - Opcode constants and classification
//! - The 12-byte sysinfo probe and 128-byte reply used to negotiate the
//!   connection's byte order
//! - Encoders for update/insert/query/delete/disconnect request frames
//! - A decoder for reply frames, including the trailing error document
//! - A blocking [`Session`] that pins the negotiated byte order to a stream
//!
//! Frames embed [`redwood_bson`] documents, each aligned to a 4-byte
//! boundary with zero padding. All I/O is sequential `read_exact` /
//! `write_all` against a caller-supplied stream; the codec never seeks,
//! never retries, and propagates stream errors unchanged.

pub mod error;
pub mod message;
pub mod opcode;
pub mod session;
pub mod sysinfo;

pub use error::ProtocolError;
pub use message::{
    DeleteMsg, DisconnectMsg, InsertMsg, Message, MsgHeader, QueryMsg, ReplyMsg, UpdateMsg,
};
pub use opcode::{is_response, request_code, OpCode, RESPONSE_MASK};
pub use session::Session;
pub use sysinfo::{SysInfoHeader, SysInfoReply, SysInfoRequest};

/// Size of the fixed operation-message header in bytes.
pub const MSG_HEADER_SIZE: usize = 28;

/// Size of the sysinfo header (and of the whole sysinfo request) in bytes.
pub const SYSINFO_HEADER_SIZE: usize = 12;

/// Size of the sysinfo reply frame in bytes.
pub const SYSINFO_REPLY_SIZE: usize = 128;

/// Marker in the first field of a sysinfo frame.
pub const SYSINFO_SPECIAL: u32 = 0xFFFF_FFFF;

/// Eye-catcher identifying a sysinfo frame in the sender's byte order.
pub const SYSINFO_EYE_CATCHER: u32 = 0xFFFE_FDFC;

/// The eye-catcher as seen when the peer encoded with the opposite order.
pub const SYSINFO_EYE_CATCHER_REVERSED: u32 = 0xFCFD_FEFF;
