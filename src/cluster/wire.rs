use byteorder::{ByteOrder, LittleEndian};
use rkyv::{from_bytes, to_bytes, AlignedVec, Archive, Deserialize, Serialize};

use super::error::WireError;

/// Bumped whenever the header or either record changes shape. Peers with a
/// different version reject each other's datagrams instead of misreading
/// them.
pub const PROTOCOL_VERSION: u8 = 1;

/// version (1) | message type (1) | body length (4, little endian)
pub const HEADER_LEN: usize = 1 + 1 + 4;

/// Largest datagram any peer sends, and the receive buffer size every peer
/// allocates.
pub const MAX_DATAGRAM_LEN: usize = 2048;

/// Scratch space handed to the serializer before it falls back to the heap.
const SCRATCH_SPACE: usize = 256;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageType {
    /// Coordinator asking a worker to sum a partition
    Request = 0,
    /// Worker answering with the partition's sum
    Reply = 1,
}

impl TryFrom<u8> for MessageType {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MessageType::Request),
            1 => Ok(MessageType::Reply),
            other => Err(WireError::UnknownMessageType(other)),
        }
    }
}

/// A partition of work sent to a worker. Ranges are inclusive on both ends.
#[derive(Archive, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[archive(check_bytes)]
pub struct Request {
    pub function: u32,
    pub partition: u32,
    pub range_start: u64,
    pub range_end: u64,
    /// `n` of the whole computation, for context only
    pub total_terms: u64,
    pub exponent: u32,
}

/// Whether a reply's terms count towards the total.
#[derive(Archive, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[archive(check_bytes)]
pub enum Inclusion {
    Include,
    Exclude,
}

/// A worker's answer. Everything but the sum and term count is echoed from
/// the request so the coordinator can correlate it.
#[derive(Archive, Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[archive(check_bytes)]
pub struct Reply {
    pub function: u32,
    pub partition: u32,
    pub term_count: u64,
    pub total_terms: u64,
    pub exponent: u32,
    pub partial_sum: f64,
    pub inclusion: Inclusion,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Message {
    Request(Request),
    Reply(Reply),
}

impl Message {
    pub fn kind(&self) -> MessageType {
        match self {
            Message::Request(_) => MessageType::Request,
            Message::Reply(_) => MessageType::Reply,
        }
    }

    /// Encodes the message into a single datagram payload.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let body = match self {
            Message::Request(request) => to_bytes::<_, SCRATCH_SPACE>(request),
            Message::Reply(reply) => to_bytes::<_, SCRATCH_SPACE>(reply),
        }
        .map_err(|_| WireError::Encode)?;

        let len = HEADER_LEN + body.len();
        if len > MAX_DATAGRAM_LEN {
            Err(WireError::TooLarge {
                len,
                max: MAX_DATAGRAM_LEN,
            })?
        }

        let mut buf = Vec::with_capacity(len);
        buf.push(PROTOCOL_VERSION);
        buf.push(self.kind() as u8);
        let mut body_len = [0u8; 4];
        LittleEndian::write_u32(&mut body_len, body.len() as u32);
        buf.extend_from_slice(&body_len);
        buf.extend_from_slice(&body);
        Ok(buf)
    }

    /// Decodes exactly one message from a datagram payload. The payload must
    /// contain the header and precisely the body length it declares.
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < HEADER_LEN {
            Err(WireError::Truncated {
                expected: HEADER_LEN,
                actual: buf.len(),
            })?
        }

        if buf[0] != PROTOCOL_VERSION {
            Err(WireError::SchemaMismatch {
                expected: PROTOCOL_VERSION,
                found: buf[0],
            })?
        }

        let msg_type = MessageType::try_from(buf[1])?;
        let body_len = LittleEndian::read_u32(&buf[2..HEADER_LEN]) as usize;
        let body = &buf[HEADER_LEN..];

        if body.len() < body_len {
            Err(WireError::Truncated {
                expected: HEADER_LEN.saturating_add(body_len),
                actual: buf.len(),
            })?
        }
        if body.len() > body_len {
            Err(WireError::TrailingBytes(body.len() - body_len))?
        }

        // archives must be validated from an aligned buffer, and the body
        // sits six bytes into the datagram
        let mut aligned = AlignedVec::with_capacity(body_len);
        aligned.extend_from_slice(body);

        let msg = match msg_type {
            MessageType::Request => from_bytes::<Request>(&aligned)
                .map(Message::Request)
                .map_err(|_| WireError::Malformed)?,
            MessageType::Reply => from_bytes::<Reply>(&aligned)
                .map(Message::Reply)
                .map_err(|_| WireError::Malformed)?,
        };
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> Request {
        Request {
            function: 1,
            partition: 3,
            range_start: 6,
            range_end: 7,
            total_terms: 10,
            exponent: 2,
        }
    }

    fn reply() -> Reply {
        Reply {
            function: 1,
            partition: 3,
            term_count: 2,
            total_terms: 10,
            exponent: 2,
            partial_sum: 85.,
            inclusion: Inclusion::Include,
        }
    }

    #[test]
    fn request_round_trip() {
        let msg = Message::Request(request());
        let buf = msg.encode().unwrap();

        assert_eq!(buf[0], PROTOCOL_VERSION);
        assert_eq!(buf[1], MessageType::Request as u8);
        assert_eq!(Message::decode(&buf).unwrap(), msg);
    }

    #[test]
    fn reply_round_trip() {
        let msg = Message::Reply(reply());
        let buf = msg.encode().unwrap();

        assert_eq!(buf[1], MessageType::Reply as u8);
        assert_eq!(Message::decode(&buf).unwrap(), msg);
    }

    #[test]
    fn boundary_values_survive() {
        let low = Message::Request(Request {
            function: 0,
            partition: 0,
            range_start: 0,
            range_end: 0,
            total_terms: 0,
            exponent: 0,
        });
        let high = Message::Reply(Reply {
            function: u32::MAX,
            partition: u32::MAX,
            term_count: u64::MAX,
            total_terms: u64::MAX,
            exponent: u32::MAX,
            partial_sum: f64::MAX,
            inclusion: Inclusion::Exclude,
        });

        for msg in [low, high] {
            assert_eq!(Message::decode(&msg.encode().unwrap()).unwrap(), msg);
        }
    }

    #[test]
    fn header_length_matches_body() {
        let buf = Message::Request(request()).encode().unwrap();
        let body_len = LittleEndian::read_u32(&buf[2..HEADER_LEN]) as usize;

        assert_eq!(buf.len(), HEADER_LEN + body_len);
        assert!(buf.len() <= MAX_DATAGRAM_LEN);
    }

    #[test]
    fn truncated_datagrams_are_rejected() {
        let buf = Message::Reply(reply()).encode().unwrap();

        for cut in [0, 1, HEADER_LEN - 1, HEADER_LEN, buf.len() - 1] {
            assert!(matches!(
                Message::decode(&buf[..cut]),
                Err(WireError::Truncated { .. })
            ));
        }
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut buf = Message::Request(request()).encode().unwrap();
        buf.extend_from_slice(&[0, 0]);

        assert_eq!(Message::decode(&buf), Err(WireError::TrailingBytes(2)));
    }

    #[test]
    fn other_versions_are_a_schema_mismatch() {
        let mut buf = Message::Request(request()).encode().unwrap();
        buf[0] = PROTOCOL_VERSION + 1;

        assert_eq!(
            Message::decode(&buf),
            Err(WireError::SchemaMismatch {
                expected: PROTOCOL_VERSION,
                found: PROTOCOL_VERSION + 1,
            })
        );
    }

    #[test]
    fn unknown_message_type() {
        let mut buf = Message::Request(request()).encode().unwrap();
        buf[1] = 7;

        assert_eq!(Message::decode(&buf), Err(WireError::UnknownMessageType(7)));
    }

    #[test]
    fn short_body_fails_validation() {
        let buf = [PROTOCOL_VERSION, MessageType::Request as u8, 3, 0, 0, 0, 1, 2, 3];

        assert_eq!(Message::decode(&buf), Err(WireError::Malformed));
    }
}
