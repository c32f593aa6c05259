//! Fixed-layout operation messages.
//!
//! Every operation frame opens with the 28-byte header:
//!
//! ```text
//! +----------+----------+----------+----------+------------+
//! | length   | opcode   | tid      | route_id | request_id |
//! | 4 bytes  | 4 bytes  | 4 bytes  | 8 bytes  | 8 bytes    |
//! +----------+----------+----------+----------+------------+
//! ```
//!
//! Request bodies carry a fixed prelude, the collection name, then their
//! embedded documents. The name region is zero-padded to a 4-byte boundary
//! taken on `name_length + 1`; the first pad byte doubles as the name's
//! NUL terminator. Each document is zero-padded to a 4-byte boundary taken
//! on its declared length.

use std::io::{Read, Write};

use redwood_bson::{Bson, ByteOrder};

use crate::error::ProtocolError;
use crate::opcode::OpCode;
use crate::MSG_HEADER_SIZE;

/// Rounds `n` up to the next multiple of `align` (a power of two).
fn aligned_size(n: i32, align: i32) -> i32 {
    (n + align - 1) & !(align - 1)
}

/// Writes the collection name followed by its NUL-bearing zero padding.
fn write_name<W: Write>(w: &mut W, name: &str) -> Result<(), ProtocolError> {
    w.write_all(name.as_bytes())?;
    let name_len = name.len() as i32;
    let padding = aligned_size(name_len + 1, 4) - name_len;
    let zeros = [0u8; 4];
    w.write_all(&zeros[..padding as usize])?;
    Ok(())
}

/// Writes a finished document followed by its zero padding.
fn write_bson<W: Write>(w: &mut W, bson: &Bson) -> Result<(), ProtocolError> {
    w.write_all(bson.raw())?;
    let len = bson.len_prefix();
    let padding = aligned_size(len, 4) - len;
    let zeros = [0u8; 4];
    w.write_all(&zeros[..padding as usize])?;
    Ok(())
}

fn padded_name_size(name: &str) -> i32 {
    aligned_size(name.len() as i32 + 1, 4)
}

fn padded_bson_size(bson: &Bson) -> i32 {
    aligned_size(bson.len_prefix(), 4)
}

/// A wire-encodable frame.
pub trait Message {
    /// Total encoded frame size in bytes, padding included.
    fn size(&self) -> i32;

    fn encode<W: Write>(&self, w: &mut W, order: ByteOrder) -> Result<(), ProtocolError>;
}

/// The 28-byte header common to every operation frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MsgHeader {
    pub length: i32,
    pub op_code: u32,
    pub tid: u32,
    pub route_id: u64,
    pub request_id: u64,
}

impl MsgHeader {
    pub const fn size(&self) -> i32 {
        MSG_HEADER_SIZE as i32
    }

    pub fn encode<W: Write>(&self, w: &mut W, order: ByteOrder) -> Result<(), ProtocolError> {
        let mut buf = [0u8; MSG_HEADER_SIZE];
        order.set_u32(&mut buf, 0, self.length as u32);
        order.set_u32(&mut buf, 4, self.op_code);
        order.set_u32(&mut buf, 8, self.tid);
        order.set_u64(&mut buf, 12, self.route_id);
        order.set_u64(&mut buf, 20, self.request_id);
        w.write_all(&buf)?;
        Ok(())
    }

    pub fn decode<R: Read>(r: &mut R, order: ByteOrder) -> Result<Self, ProtocolError> {
        let mut buf = [0u8; MSG_HEADER_SIZE];
        r.read_exact(&mut buf)?;
        Ok(MsgHeader {
            length: order.read_u32(&buf) as i32,
            op_code: order.read_u32(&buf[4..]),
            tid: order.read_u32(&buf[8..]),
            route_id: order.read_u64(&buf[12..]),
            request_id: order.read_u64(&buf[20..]),
        })
    }

    /// Encodes a copy of this header with the length field filled in.
    fn encode_with_length<W: Write>(
        &self,
        w: &mut W,
        order: ByteOrder,
        length: i32,
    ) -> Result<(), ProtocolError> {
        let mut header = *self;
        header.length = length;
        header.encode(w, order)
    }
}

/// Writes the 16-byte body prelude shared by insert, delete, and update.
fn write_prelude<W: Write>(
    w: &mut W,
    order: ByteOrder,
    version: i32,
    weight: i16,
    flags: i32,
    name_length: i32,
) -> Result<(), ProtocolError> {
    let mut buf = [0u8; 16];
    order.set_u32(&mut buf, 0, version as u32);
    order.set_u16(&mut buf, 4, weight as u16);
    order.set_u16(&mut buf, 6, 0); // reserved padding
    order.set_u32(&mut buf, 8, flags as u32);
    order.set_u32(&mut buf, 12, name_length as u32);
    w.write_all(&buf)?;
    Ok(())
}

/// An insert request: prelude, collection name, one optional document.
#[derive(Debug, Clone, Default)]
pub struct InsertMsg {
    pub header: MsgHeader,
    pub version: i32,
    pub w: i16,
    pub flags: i32,
    pub name: String,
    pub doc: Option<Bson>,
}

impl InsertMsg {
    /// Header plus the fixed body prelude.
    pub const FIXED_SIZE: i32 = MSG_HEADER_SIZE as i32 + 16;

    pub fn new(name: impl Into<String>, doc: Option<Bson>) -> Self {
        InsertMsg {
            header: MsgHeader {
                op_code: OpCode::Insert.code(),
                ..Default::default()
            },
            version: 0,
            w: 0,
            flags: 0,
            name: name.into(),
            doc,
        }
    }
}

impl Message for InsertMsg {
    fn size(&self) -> i32 {
        let mut size = Self::FIXED_SIZE + padded_name_size(&self.name);
        if let Some(doc) = &self.doc {
            size += padded_bson_size(doc);
        }
        size
    }

    fn encode<W: Write>(&self, w: &mut W, order: ByteOrder) -> Result<(), ProtocolError> {
        self.header.encode_with_length(w, order, self.size())?;
        write_prelude(
            w,
            order,
            self.version,
            self.w,
            self.flags,
            self.name.len() as i32,
        )?;
        write_name(w, &self.name)?;
        if let Some(doc) = &self.doc {
            write_bson(w, doc)?;
        }
        Ok(())
    }
}

/// A query request: 32-byte prelude, collection name, then up to four
/// optional documents in order: where, select, order-by, hint.
#[derive(Debug, Clone, Default)]
pub struct QueryMsg {
    pub header: MsgHeader,
    pub version: i32,
    pub w: i16,
    pub flags: i32,
    pub name: String,
    pub skip_num: i64,
    pub return_num: i64,
    pub where_cond: Option<Bson>,
    pub select: Option<Bson>,
    pub order_by: Option<Bson>,
    pub hint: Option<Bson>,
}

impl QueryMsg {
    /// Header plus the fixed body prelude.
    pub const FIXED_SIZE: i32 = MSG_HEADER_SIZE as i32 + 32;

    pub fn new(name: impl Into<String>) -> Self {
        QueryMsg {
            header: MsgHeader {
                op_code: OpCode::Query.code(),
                ..Default::default()
            },
            name: name.into(),
            ..Default::default()
        }
    }
}

impl Message for QueryMsg {
    fn size(&self) -> i32 {
        let mut size = Self::FIXED_SIZE + padded_name_size(&self.name);
        for doc in [&self.where_cond, &self.select, &self.order_by, &self.hint]
            .into_iter()
            .flatten()
        {
            size += padded_bson_size(doc);
        }
        size
    }

    fn encode<W: Write>(&self, w: &mut W, order: ByteOrder) -> Result<(), ProtocolError> {
        self.header.encode_with_length(w, order, self.size())?;

        let mut buf = [0u8; 32];
        order.set_u32(&mut buf, 0, self.version as u32);
        order.set_u16(&mut buf, 4, self.w as u16);
        order.set_u16(&mut buf, 6, 0); // reserved padding
        order.set_u32(&mut buf, 8, self.flags as u32);
        order.set_u32(&mut buf, 12, self.name.len() as u32);
        order.set_u64(&mut buf, 16, self.skip_num as u64);
        order.set_u64(&mut buf, 24, self.return_num as u64);
        w.write_all(&buf)?;

        write_name(w, &self.name)?;
        for doc in [&self.where_cond, &self.select, &self.order_by, &self.hint]
            .into_iter()
            .flatten()
        {
            write_bson(w, doc)?;
        }
        Ok(())
    }
}

/// A delete request: prelude, collection name, condition and hint
/// documents. A missing document encodes as the empty document.
#[derive(Debug, Clone, Default)]
pub struct DeleteMsg {
    pub header: MsgHeader,
    pub version: i32,
    pub w: i16,
    pub flags: i32,
    pub name: String,
    pub condition: Option<Bson>,
    pub hint: Option<Bson>,
}

impl DeleteMsg {
    /// Header plus the fixed body prelude.
    pub const FIXED_SIZE: i32 = MSG_HEADER_SIZE as i32 + 16;

    pub fn new(name: impl Into<String>) -> Self {
        DeleteMsg {
            header: MsgHeader {
                op_code: OpCode::Delete.code(),
                ..Default::default()
            },
            name: name.into(),
            ..Default::default()
        }
    }
}

impl Message for DeleteMsg {
    fn size(&self) -> i32 {
        let empty = Bson::empty();
        Self::FIXED_SIZE
            + padded_name_size(&self.name)
            + padded_bson_size(self.condition.as_ref().unwrap_or(&empty))
            + padded_bson_size(self.hint.as_ref().unwrap_or(&empty))
    }

    fn encode<W: Write>(&self, w: &mut W, order: ByteOrder) -> Result<(), ProtocolError> {
        self.header.encode_with_length(w, order, self.size())?;
        write_prelude(
            w,
            order,
            self.version,
            self.w,
            self.flags,
            self.name.len() as i32,
        )?;
        write_name(w, &self.name)?;

        let empty = Bson::empty();
        write_bson(w, self.condition.as_ref().unwrap_or(&empty))?;
        write_bson(w, self.hint.as_ref().unwrap_or(&empty))?;
        Ok(())
    }
}

/// An update request: prelude, collection name, condition, rule, and hint
/// documents. A missing document encodes as the empty document.
#[derive(Debug, Clone, Default)]
pub struct UpdateMsg {
    pub header: MsgHeader,
    pub version: i32,
    pub w: i16,
    pub flags: i32,
    pub name: String,
    pub condition: Option<Bson>,
    pub rule: Option<Bson>,
    pub hint: Option<Bson>,
}

impl UpdateMsg {
    /// Header plus the fixed body prelude.
    pub const FIXED_SIZE: i32 = MSG_HEADER_SIZE as i32 + 16;

    pub fn new(name: impl Into<String>) -> Self {
        UpdateMsg {
            header: MsgHeader {
                op_code: OpCode::Update.code(),
                ..Default::default()
            },
            name: name.into(),
            ..Default::default()
        }
    }
}

impl Message for UpdateMsg {
    fn size(&self) -> i32 {
        let empty = Bson::empty();
        Self::FIXED_SIZE
            + padded_name_size(&self.name)
            + padded_bson_size(self.condition.as_ref().unwrap_or(&empty))
            + padded_bson_size(self.rule.as_ref().unwrap_or(&empty))
            + padded_bson_size(self.hint.as_ref().unwrap_or(&empty))
    }

    fn encode<W: Write>(&self, w: &mut W, order: ByteOrder) -> Result<(), ProtocolError> {
        self.header.encode_with_length(w, order, self.size())?;
        write_prelude(
            w,
            order,
            self.version,
            self.w,
            self.flags,
            self.name.len() as i32,
        )?;
        write_name(w, &self.name)?;

        let empty = Bson::empty();
        write_bson(w, self.condition.as_ref().unwrap_or(&empty))?;
        write_bson(w, self.rule.as_ref().unwrap_or(&empty))?;
        write_bson(w, self.hint.as_ref().unwrap_or(&empty))?;
        Ok(())
    }
}

/// A disconnect notice: header only, no reply expected.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisconnectMsg {
    pub header: MsgHeader,
}

impl DisconnectMsg {
    pub fn new() -> Self {
        DisconnectMsg {
            header: MsgHeader {
                length: MSG_HEADER_SIZE as i32,
                op_code: OpCode::Disconnect.code(),
                ..Default::default()
            },
        }
    }
}

impl Message for DisconnectMsg {
    fn size(&self) -> i32 {
        MSG_HEADER_SIZE as i32
    }

    fn encode<W: Write>(&self, w: &mut W, order: ByteOrder) -> Result<(), ProtocolError> {
        self.header.encode_with_length(w, order, self.size())
    }
}

/// A reply frame: header, 20-byte body, optional trailing error document.
#[derive(Debug, Clone, Default)]
pub struct ReplyMsg {
    pub header: MsgHeader,
    pub context_id: i64,
    pub flags: i32,
    pub start_from: i32,
    pub return_num: i32,
    /// Rendered error document, present when `flags != 0`.
    pub error: Option<String>,
}

impl ReplyMsg {
    /// Header plus the fixed reply body.
    pub const FIXED_SIZE: i32 = MSG_HEADER_SIZE as i32 + 20;

    pub fn decode<R: Read>(r: &mut R, order: ByteOrder) -> Result<Self, ProtocolError> {
        let header = MsgHeader::decode(r, order)?;
        Self::decode_body(header, r, order)
    }

    /// Decodes the body when the header has already been read.
    ///
    /// Any `length >= FIXED_SIZE` is accepted; the trailing error document
    /// is read only when `flags != 0`.
    pub fn decode_body<R: Read>(
        header: MsgHeader,
        r: &mut R,
        order: ByteOrder,
    ) -> Result<Self, ProtocolError> {
        if header.length < Self::FIXED_SIZE {
            return Err(ProtocolError::InvalidLength {
                expected: Self::FIXED_SIZE,
                actual: header.length,
            });
        }

        let mut buf = [0u8; 20];
        r.read_exact(&mut buf)?;
        let mut msg = ReplyMsg {
            header,
            context_id: order.read_u64(&buf) as i64,
            flags: order.read_u32(&buf[8..]) as i32,
            start_from: order.read_u32(&buf[12..]) as i32,
            return_num: order.read_u32(&buf[16..]) as i32,
            error: None,
        };

        if msg.flags == 0 {
            return Ok(msg);
        }

        let tail = (header.length - Self::FIXED_SIZE) as usize;
        let mut doc = vec![0u8; tail];
        r.read_exact(&mut doc)?;
        msg.error = Some(Bson::from_bytes(&doc).render()?);
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const LE: ByteOrder = ByteOrder::Little;

    fn doc(pairs: &[(&str, i32)]) -> Bson {
        let mut bson = Bson::new();
        for (name, value) in pairs {
            bson.append_i32(name, *value);
        }
        bson.finish();
        bson
    }

    /// Asserts the frame-level invariants: declared length matches, every
    /// embedded document starts on a 4-byte boundary, and all padding is
    /// zero.
    fn check_frame(frame: &[u8], declared: i32, doc_offsets: &[usize]) {
        assert_eq!(frame.len() as i32, declared);
        assert_eq!(LE.read_i32(frame), declared);
        for &offset in doc_offsets {
            assert_eq!(offset % 4, 0, "document at {offset} is unaligned");
            let len = LE.read_i32(&frame[offset..]);
            let padded = (len + 3) & !3;
            for i in len..padded {
                assert_eq!(frame[offset + i as usize], 0, "padding at {i} not zero");
            }
        }
    }

    #[test]
    fn test_aligned_size() {
        assert_eq!(aligned_size(0, 4), 0);
        assert_eq!(aligned_size(1, 4), 4);
        assert_eq!(aligned_size(4, 4), 4);
        assert_eq!(aligned_size(5, 4), 8);
        assert_eq!(aligned_size(17, 4), 20);
    }

    #[test]
    fn test_header_roundtrip() {
        let header = MsgHeader {
            length: 28,
            op_code: OpCode::Query.code(),
            tid: 7,
            route_id: 0x0102030405060708,
            request_id: 42,
        };
        for order in [ByteOrder::Little, ByteOrder::Big] {
            let mut buf = Vec::new();
            header.encode(&mut buf, order).unwrap();
            assert_eq!(buf.len(), MSG_HEADER_SIZE);
            let decoded = MsgHeader::decode(&mut Cursor::new(buf), order).unwrap();
            assert_eq!(decoded, header);
        }
    }

    #[test]
    fn test_disconnect_frame() {
        let mut buf = Vec::new();
        DisconnectMsg::new().encode(&mut buf, LE).unwrap();
        assert_eq!(buf.len(), 28);
        assert_eq!(LE.read_i32(&buf), 28);
        assert_eq!(LE.read_u32(&buf[4..]), 2008);
    }

    #[test]
    fn test_disconnect_header_big_endian() {
        let mut buf = Vec::new();
        DisconnectMsg::new().encode(&mut buf, ByteOrder::Big).unwrap();
        // length=28 in big-endian
        assert_eq!(&buf[..4], &[0x00, 0x00, 0x00, 0x1C]);
        assert_eq!(ByteOrder::Big.read_u32(&buf[4..]), 2008);
    }

    #[test]
    fn test_insert_frame_layout() {
        let mut msg = InsertMsg::new("orders", Some(doc(&[("a", 1)])));
        msg.header.request_id = 9;
        let mut buf = Vec::new();
        msg.encode(&mut buf, LE).unwrap();

        // name "orders" is 6 bytes, padded on 7 to 8
        let name_region = InsertMsg::FIXED_SIZE as usize;
        assert_eq!(&buf[name_region..name_region + 6], b"orders");
        assert_eq!(&buf[name_region + 6..name_region + 8], &[0, 0]);

        let doc_offset = name_region + 8;
        check_frame(&buf, msg.size(), &[doc_offset]);
        assert_eq!(LE.read_u32(&buf[4..]), 2002);
    }

    #[test]
    fn test_insert_without_document() {
        let msg = InsertMsg::new("orders", None);
        let mut buf = Vec::new();
        msg.encode(&mut buf, LE).unwrap();
        check_frame(&buf, InsertMsg::FIXED_SIZE + 8, &[]);
    }

    #[test]
    fn test_query_frame_layout() {
        let mut msg = QueryMsg::new("db.users");
        msg.skip_num = 10;
        msg.return_num = -1;
        msg.where_cond = Some(doc(&[("age", 30)]));
        msg.order_by = Some(doc(&[("age", 1)]));
        let mut buf = Vec::new();
        msg.encode(&mut buf, LE).unwrap();

        // name "db.users" is 8 bytes, padded on 9 to 12
        let name_region = QueryMsg::FIXED_SIZE as usize;
        let first_doc = name_region + 12;
        let where_len = aligned_size(LE.read_i32(&buf[first_doc..]), 4) as usize;
        check_frame(&buf, msg.size(), &[first_doc, first_doc + where_len]);

        // prelude carries skip and return counts
        assert_eq!(LE.read_u64(&buf[44..]) as i64, 10);
        assert_eq!(LE.read_u64(&buf[52..]) as i64, -1);
    }

    #[test]
    fn test_query_empty_frame() {
        let msg = QueryMsg::new("x");
        let mut buf = Vec::new();
        msg.encode(&mut buf, LE).unwrap();
        // name "x": aligned(2, 4) = 4
        assert_eq!(buf.len() as i32, QueryMsg::FIXED_SIZE + 4);
        assert_eq!(LE.read_u32(&buf[4..]), 2004);
    }

    #[test]
    fn test_delete_substitutes_empty_documents() {
        let msg = DeleteMsg::new("tab");
        let mut buf = Vec::new();
        msg.encode(&mut buf, LE).unwrap();

        // name "tab" padded on 4 to 4; then two empty documents padded 5→8
        let first = DeleteMsg::FIXED_SIZE as usize + 4;
        assert_eq!(
            &buf[first..first + 8],
            &[0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
        let second = first + 8;
        assert_eq!(
            &buf[second..second + 8],
            &[0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
        check_frame(&buf, msg.size(), &[first, second]);
        assert_eq!(LE.read_u32(&buf[4..]), 2006);
    }

    #[test]
    fn test_update_frame_layout() {
        let mut msg = UpdateMsg::new("tab");
        msg.rule = Some(doc(&[("n", 2)]));
        let mut buf = Vec::new();
        msg.encode(&mut buf, LE).unwrap();

        let first = UpdateMsg::FIXED_SIZE as usize + 4;
        let first_len = aligned_size(LE.read_i32(&buf[first..]), 4) as usize;
        let second = first + first_len;
        let second_len = aligned_size(LE.read_i32(&buf[second..]), 4) as usize;
        let third = second + second_len;
        check_frame(&buf, msg.size(), &[first, second, third]);
        assert_eq!(LE.read_u32(&buf[4..]), 2001);
    }

    #[test]
    fn test_reply_decode_without_error() {
        let header = MsgHeader {
            length: ReplyMsg::FIXED_SIZE,
            op_code: OpCode::Query.reply_code(),
            ..Default::default()
        };
        let mut buf = Vec::new();
        header.encode(&mut buf, LE).unwrap();
        let mut body = [0u8; 20];
        LE.set_u64(&mut body, 0, 77); // context_id
        LE.set_u32(&mut body, 8, 0); // flags
        LE.set_u32(&mut body, 12, 5); // start_from
        LE.set_u32(&mut body, 16, 3); // return_num
        buf.extend_from_slice(&body);

        let reply = ReplyMsg::decode(&mut Cursor::new(buf), LE).unwrap();
        assert_eq!(reply.context_id, 77);
        assert_eq!(reply.flags, 0);
        assert_eq!(reply.start_from, 5);
        assert_eq!(reply.return_num, 3);
        assert!(reply.error.is_none());
    }

    #[test]
    fn test_reply_decode_with_error_document() {
        let mut error_doc = Bson::new();
        error_doc.append_i32("errno", -23);
        error_doc.append_str("description", "collection not found");
        error_doc.finish();

        let header = MsgHeader {
            length: ReplyMsg::FIXED_SIZE + error_doc.len_prefix(),
            op_code: OpCode::Insert.reply_code(),
            ..Default::default()
        };
        let mut buf = Vec::new();
        header.encode(&mut buf, LE).unwrap();
        let mut body = [0u8; 20];
        LE.set_u32(&mut body, 8, 0xFFFF_FFE9); // flags = -23
        buf.extend_from_slice(&body);
        buf.extend_from_slice(error_doc.raw());

        let reply = ReplyMsg::decode(&mut Cursor::new(buf), LE).unwrap();
        assert_eq!(reply.flags, -23);
        assert_eq!(
            reply.error.as_deref(),
            Some(r#"{"errno":-23, "description":"collection not found"}"#)
        );
    }

    #[test]
    fn test_reply_rejects_short_length() {
        let header = MsgHeader {
            length: 30,
            ..Default::default()
        };
        let mut buf = Vec::new();
        header.encode(&mut buf, LE).unwrap();
        buf.extend_from_slice(&[0u8; 20]);

        assert!(matches!(
            ReplyMsg::decode(&mut Cursor::new(buf), LE),
            Err(ProtocolError::InvalidLength {
                expected: 48,
                actual: 30
            })
        ));
    }

    #[test]
    fn test_reply_truncated_error_document() {
        // flags set but the declared tail is garbage
        let header = MsgHeader {
            length: ReplyMsg::FIXED_SIZE + 3,
            ..Default::default()
        };
        let mut buf = Vec::new();
        header.encode(&mut buf, LE).unwrap();
        let mut body = [0u8; 20];
        LE.set_u32(&mut body, 8, 1);
        buf.extend_from_slice(&body);
        buf.extend_from_slice(&[0u8; 3]);

        assert!(matches!(
            ReplyMsg::decode(&mut Cursor::new(buf), LE),
            Err(ProtocolError::Bson(_))
        ));
    }

    #[test]
    fn test_insert_big_endian_roundtrip_header() {
        let msg = InsertMsg::new("t", Some(doc(&[("k", 1)])));
        let mut buf = Vec::new();
        msg.encode(&mut buf, ByteOrder::Big).unwrap();

        let header = MsgHeader::decode(&mut Cursor::new(&buf[..28]), ByteOrder::Big).unwrap();
        assert_eq!(header.length as usize, buf.len());
        assert_eq!(header.op_code, 2002);
        // embedded documents stay little-endian regardless of frame order
        let name_region = InsertMsg::FIXED_SIZE as usize + 4;
        assert_eq!(LE.read_i32(&buf[name_region..]), 12);
    }
}
