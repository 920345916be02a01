/// Size of the wire header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Direction of the framed message that follows the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    /// Collective request from a rank.
    Request = 0,
    /// Reply or status from the coordinator.
    Response = 1,
}

impl MessageKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(MessageKind::Request),
            1 => Some(MessageKind::Response),
            _ => None,
        }
    }
}

/// 8-byte wire header prepended to every framed message.
///
/// ```text
/// [0..4] payload_length: u32 LE
/// [4..6] protocol_version: u16 LE
/// [6]    kind: u8
/// [7]    reserved (must be 0)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub payload_length: u32,
    pub protocol_version: u16,
    pub kind: MessageKind,
}

impl Header {
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.payload_length.to_le_bytes());
        buf[4..6].copy_from_slice(&self.protocol_version.to_le_bytes());
        buf[6] = self.kind as u8;
        buf
    }

    /// Returns `None` if the kind byte is invalid.
    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Option<Self> {
        let payload_length = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let protocol_version = u16::from_le_bytes([buf[4], buf[5]]);
        let kind = MessageKind::from_u8(buf[6])?;
        Some(Header {
            payload_length,
            protocol_version,
            kind,
        })
    }
}
