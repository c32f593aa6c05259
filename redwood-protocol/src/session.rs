//! Blocking protocol session over a caller-supplied stream.
//!
//! A session pins the byte order negotiated by the sysinfo handshake to a
//! stream and frames every later message with it. A failed send or a
//! failed frame decode leaves the stream position unknown, so the session
//! poisons itself and refuses further use; the caller must discard the
//! connection.

use std::io::{Read, Write};

use redwood_bson::ByteOrder;

use crate::error::ProtocolError;
use crate::message::{DisconnectMsg, Message, ReplyMsg};
use crate::opcode::is_response;
use crate::sysinfo::{SysInfoReply, SysInfoRequest};
use crate::SYSINFO_EYE_CATCHER;

/// A connection-scoped framing context.
///
/// The stream only needs sequential reads and writes; the session never
/// seeks and never retries.
pub struct Session<S> {
    stream: S,
    order: ByteOrder,
    poisoned: bool,
}

impl<S: Read + Write> Session<S> {
    /// Initiator side: sends the sysinfo probe in host order and checks
    /// the 128-byte reply.
    pub fn initiate(mut stream: S) -> Result<Self, ProtocolError> {
        let order = ByteOrder::host();
        tracing::debug!(?order, "sending sysinfo probe");
        SysInfoRequest::new().encode(&mut stream, order)?;
        stream.flush()?;

        let reply = SysInfoReply::decode(&mut stream, order)?;
        if reply.header.eye_catcher != SYSINFO_EYE_CATCHER {
            return Err(ProtocolError::InvalidSysInfo {
                special: reply.header.special,
                eye_catcher: reply.header.eye_catcher,
            });
        }
        tracing::debug!(os_type = reply.os_type, "sysinfo reply received");
        Ok(Session {
            stream,
            order,
            poisoned: false,
        })
    }

    /// Receiver side: reads the probe, negotiates the byte order, and
    /// answers with the sysinfo reply carrying `os_type`.
    pub fn accept(mut stream: S, os_type: i32) -> Result<Self, ProtocolError> {
        let assumed = ByteOrder::host();
        let (_, order) = SysInfoRequest::decode(&mut stream, assumed)?;
        if order != assumed {
            tracing::debug!(?order, "peer byte order differs, flipping");
        }
        SysInfoReply::new(os_type).encode(&mut stream, order)?;
        stream.flush()?;
        Ok(Session {
            stream,
            order,
            poisoned: false,
        })
    }

    /// The byte order negotiated for this connection.
    pub fn order(&self) -> ByteOrder {
        self.order
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    fn check_usable(&self) -> Result<(), ProtocolError> {
        if self.poisoned {
            return Err(ProtocolError::Poisoned);
        }
        Ok(())
    }

    /// Sends a request frame in the negotiated order.
    pub fn send<M: Message>(&mut self, msg: &M) -> Result<(), ProtocolError> {
        self.check_usable()?;
        let result = msg
            .encode(&mut self.stream, self.order)
            .and_then(|()| self.stream.flush().map_err(ProtocolError::from));
        match result {
            Ok(()) => {
                tracing::debug!(size = msg.size(), "frame sent");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "send failed, poisoning session");
                self.poisoned = true;
                Err(e)
            }
        }
    }

    /// Reads the next reply frame. The opcode must carry the response bit.
    pub fn read_reply(&mut self) -> Result<ReplyMsg, ProtocolError> {
        self.check_usable()?;
        let result = ReplyMsg::decode(&mut self.stream, self.order).and_then(|reply| {
            if !is_response(reply.header.op_code) {
                return Err(ProtocolError::UnexpectedOpCode {
                    expected: reply.header.op_code | crate::RESPONSE_MASK,
                    actual: reply.header.op_code,
                });
            }
            Ok(reply)
        });
        match result {
            Ok(reply) => {
                tracing::debug!(
                    op_code = reply.header.op_code,
                    flags = reply.flags,
                    "reply received"
                );
                Ok(reply)
            }
            Err(e) => {
                tracing::warn!(error = %e, "framing error, poisoning session");
                self.poisoned = true;
                Err(e)
            }
        }
    }

    /// Sends the disconnect notice; the connection is done afterwards.
    pub fn disconnect(&mut self) -> Result<(), ProtocolError> {
        tracing::debug!("disconnecting");
        self.send(&DisconnectMsg::new())
    }

    /// Consumes the session, returning the stream.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MsgHeader, QueryMsg};
    use crate::opcode::OpCode;
    use crate::{SYSINFO_REPLY_SIZE, SYSINFO_SPECIAL};
    use std::io::Cursor;

    /// A scripted stream: reads come from `input`, writes land in `output`.
    struct FakeStream {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl FakeStream {
        fn new(input: Vec<u8>) -> Self {
            FakeStream {
                input: Cursor::new(input),
                output: Vec::new(),
            }
        }
    }

    impl Read for FakeStream {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for FakeStream {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn reply_bytes(order: ByteOrder) -> Vec<u8> {
        let mut buf = Vec::new();
        SysInfoReply::new(1).encode(&mut buf, order).unwrap();
        buf
    }

    #[test]
    fn test_initiate() {
        let host = ByteOrder::host();
        let stream = FakeStream::new(reply_bytes(host));
        let session = Session::initiate(stream).unwrap();
        assert_eq!(session.order(), host);
        assert!(!session.is_poisoned());

        let output = session.into_inner().output;
        assert_eq!(output.len(), 12);
        assert_eq!(host.read_u32(&output), SYSINFO_SPECIAL);
        assert_eq!(host.read_u32(&output[4..]), SYSINFO_EYE_CATCHER);
    }

    #[test]
    fn test_accept_same_order_peer() {
        let host = ByteOrder::host();
        let mut probe = Vec::new();
        SysInfoRequest::new().encode(&mut probe, host).unwrap();

        let session = Session::accept(FakeStream::new(probe), 1).unwrap();
        assert_eq!(session.order(), host);
        assert_eq!(session.into_inner().output.len(), SYSINFO_REPLY_SIZE);
    }

    #[test]
    fn test_accept_opposite_order_peer_flips() {
        let host = ByteOrder::host();
        let peer = host.flip();
        let mut probe = Vec::new();
        SysInfoRequest::new().encode(&mut probe, peer).unwrap();

        let mut session = Session::accept(FakeStream::new(probe), 1).unwrap();
        assert_eq!(session.order(), peer);

        // the reply and all later frames use the peer's order
        session.disconnect().unwrap();
        let output = session.into_inner().output;
        assert_eq!(peer.read_u32(&output[4..]), SYSINFO_EYE_CATCHER);
        let header =
            MsgHeader::decode(&mut Cursor::new(&output[SYSINFO_REPLY_SIZE..]), peer).unwrap();
        assert_eq!(header.length, 28);
        assert_eq!(header.op_code, OpCode::Disconnect.code());
    }

    #[test]
    fn test_accept_garbage_probe_fails() {
        let result = Session::accept(FakeStream::new(vec![0u8; 12]), 1);
        assert!(matches!(result, Err(ProtocolError::InvalidSysInfo { .. })));
    }

    #[test]
    fn test_send_query_after_handshake() {
        let host = ByteOrder::host();
        let mut session = Session::initiate(FakeStream::new(reply_bytes(host))).unwrap();

        let msg = QueryMsg::new("t");
        session.send(&msg).unwrap();
        let output = session.into_inner().output;
        let frame = &output[12..];
        assert_eq!(frame.len() as i32, msg.size());
        let header = MsgHeader::decode(&mut Cursor::new(frame), host).unwrap();
        assert_eq!(header.op_code, OpCode::Query.code());
    }

    #[test]
    fn test_reply_roundtrip_through_session() {
        let host = ByteOrder::host();
        let mut input = reply_bytes(host);
        let header = MsgHeader {
            length: ReplyMsg::FIXED_SIZE,
            op_code: OpCode::Query.reply_code(),
            ..Default::default()
        };
        header.encode(&mut input, host).unwrap();
        input.extend_from_slice(&[0u8; 20]);

        let mut session = Session::initiate(FakeStream::new(input)).unwrap();
        let reply = session.read_reply().unwrap();
        assert_eq!(reply.header.op_code, OpCode::Query.reply_code());
        assert!(reply.error.is_none());
    }

    #[test]
    fn test_request_opcode_in_reply_poisons() {
        let host = ByteOrder::host();
        let mut input = reply_bytes(host);
        let header = MsgHeader {
            length: ReplyMsg::FIXED_SIZE,
            op_code: OpCode::Query.code(), // response bit missing
            ..Default::default()
        };
        header.encode(&mut input, host).unwrap();
        input.extend_from_slice(&[0u8; 20]);

        let mut session = Session::initiate(FakeStream::new(input)).unwrap();
        assert!(matches!(
            session.read_reply(),
            Err(ProtocolError::UnexpectedOpCode { .. })
        ));
        assert!(session.is_poisoned());
        assert!(matches!(
            session.read_reply(),
            Err(ProtocolError::Poisoned)
        ));
        assert!(matches!(session.disconnect(), Err(ProtocolError::Poisoned)));
    }

    #[test]
    fn test_truncated_reply_poisons() {
        let host = ByteOrder::host();
        let mut input = reply_bytes(host);
        input.extend_from_slice(&[0u8; 10]); // half a header

        let mut session = Session::initiate(FakeStream::new(input)).unwrap();
        assert!(matches!(session.read_reply(), Err(ProtocolError::Io(_))));
        assert!(session.is_poisoned());
    }
}
