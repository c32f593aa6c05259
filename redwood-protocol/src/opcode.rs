//! Operation codes.
//!
//! Opcodes are 32-bit; the top bit marks a response. A reply carries its
//! request's code with [`RESPONSE_MASK`] OR'd in.

use crate::error::ProtocolError;

/// Bit marking a message as a response.
pub const RESPONSE_MASK: u32 = 0x8000_0000;

/// Request operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum OpCode {
    Update = 2001,
    Insert = 2002,
    Query = 2004,
    Delete = 2006,
    Disconnect = 2008,
}

impl OpCode {
    /// The raw request code.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// The opcode a reply to this request carries.
    pub const fn reply_code(self) -> u32 {
        self as u32 | RESPONSE_MASK
    }
}

impl TryFrom<u32> for OpCode {
    type Error = ProtocolError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            2001 => Ok(OpCode::Update),
            2002 => Ok(OpCode::Insert),
            2004 => Ok(OpCode::Query),
            2006 => Ok(OpCode::Delete),
            2008 => Ok(OpCode::Disconnect),
            other => Err(ProtocolError::UnknownOpCode(other)),
        }
    }
}

/// Whether a raw opcode carries the response bit.
pub const fn is_response(code: u32) -> bool {
    code & RESPONSE_MASK != 0
}

/// Strips the response bit, leaving the request code.
pub const fn request_code(code: u32) -> u32 {
    code & !RESPONSE_MASK
}
