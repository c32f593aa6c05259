//! Pre-handshake sysinfo frames and byte-order negotiation.
//!
//! The initiator sends a 12-byte probe in its preferred byte order. The
//! receiver interprets the eye-catcher field in its own order: a match
//! means the peers agree, the reversed constant means the peer used the
//! opposite order and the receiver must flip for the remainder of the
//! connection, anything else is not a sysinfo frame.

use std::io::{Read, Write};

use redwood_bson::ByteOrder;

use crate::error::ProtocolError;
use crate::{
    SYSINFO_EYE_CATCHER, SYSINFO_EYE_CATCHER_REVERSED, SYSINFO_HEADER_SIZE, SYSINFO_REPLY_SIZE,
    SYSINFO_SPECIAL,
};

/// Common 12-byte header of sysinfo frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SysInfoHeader {
    pub special: u32,
    pub eye_catcher: u32,
    pub length: i32,
}

impl SysInfoHeader {
    pub fn encode<W: Write>(&self, w: &mut W, order: ByteOrder) -> Result<(), ProtocolError> {
        let mut buf = [0u8; SYSINFO_HEADER_SIZE];
        order.set_u32(&mut buf, 0, self.special);
        order.set_u32(&mut buf, 4, self.eye_catcher);
        order.set_u32(&mut buf, 8, self.length as u32);
        w.write_all(&buf)?;
        Ok(())
    }

    pub fn decode<R: Read>(r: &mut R, order: ByteOrder) -> Result<Self, ProtocolError> {
        let mut buf = [0u8; SYSINFO_HEADER_SIZE];
        r.read_exact(&mut buf)?;
        Ok(SysInfoHeader {
            special: order.read_u32(&buf),
            eye_catcher: order.read_u32(&buf[4..]),
            length: order.read_u32(&buf[8..]) as i32,
        })
    }
}

/// The 12-byte endianness probe that opens every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SysInfoRequest {
    pub header: SysInfoHeader,
}

impl SysInfoRequest {
    pub fn new() -> Self {
        SysInfoRequest {
            header: SysInfoHeader {
                special: SYSINFO_SPECIAL,
                eye_catcher: SYSINFO_EYE_CATCHER,
                length: SYSINFO_HEADER_SIZE as i32,
            },
        }
    }

    pub const fn size(&self) -> i32 {
        SYSINFO_HEADER_SIZE as i32
    }

    pub fn encode<W: Write>(&self, w: &mut W, order: ByteOrder) -> Result<(), ProtocolError> {
        self.header.encode(w, order)
    }

    /// Decodes a probe, negotiating the peer's byte order.
    ///
    /// The header is read in `assumed` order; if the eye-catcher comes out
    /// reversed the peer used the opposite order and the returned
    /// [`ByteOrder`] (to be used for the rest of the connection) is the
    /// flipped one, with the header fields corrected.
    pub fn decode<R: Read>(
        r: &mut R,
        assumed: ByteOrder,
    ) -> Result<(Self, ByteOrder), ProtocolError> {
        let header = SysInfoHeader::decode(r, assumed)?;
        match header.eye_catcher {
            SYSINFO_EYE_CATCHER => Ok((SysInfoRequest { header }, assumed)),
            SYSINFO_EYE_CATCHER_REVERSED => {
                let corrected = SysInfoHeader {
                    special: header.special.swap_bytes(),
                    eye_catcher: header.eye_catcher.swap_bytes(),
                    length: header.length.swap_bytes(),
                };
                Ok((SysInfoRequest { header: corrected }, assumed.flip()))
            }
            other => Err(ProtocolError::InvalidSysInfo {
                special: header.special,
                eye_catcher: other,
            }),
        }
    }
}

impl Default for SysInfoRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// The 128-byte sysinfo reply: header, OS discriminant, zero padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SysInfoReply {
    pub header: SysInfoHeader,
    pub os_type: i32,
}

impl SysInfoReply {
    pub fn new(os_type: i32) -> Self {
        SysInfoReply {
            header: SysInfoHeader {
                special: SYSINFO_SPECIAL,
                eye_catcher: SYSINFO_EYE_CATCHER,
                length: SYSINFO_REPLY_SIZE as i32,
            },
            os_type,
        }
    }

    pub const fn size(&self) -> i32 {
        SYSINFO_REPLY_SIZE as i32
    }

    pub fn encode<W: Write>(&self, w: &mut W, order: ByteOrder) -> Result<(), ProtocolError> {
        self.header.encode(w, order)?;
        let mut buf = [0u8; SYSINFO_REPLY_SIZE - SYSINFO_HEADER_SIZE];
        order.set_u32(&mut buf, 0, self.os_type as u32);
        w.write_all(&buf)?;
        Ok(())
    }

    pub fn decode<R: Read>(r: &mut R, order: ByteOrder) -> Result<Self, ProtocolError> {
        let header = SysInfoHeader::decode(r, order)?;
        if header.length != SYSINFO_REPLY_SIZE as i32 {
            return Err(ProtocolError::InvalidSysInfoLength(header.length));
        }
        let mut buf = [0u8; SYSINFO_REPLY_SIZE - SYSINFO_HEADER_SIZE];
        r.read_exact(&mut buf)?;
        Ok(SysInfoReply {
            header,
            os_type: order.read_u32(&buf) as i32,
        })
    }
}
