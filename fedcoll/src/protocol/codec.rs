use crate::error::{FedError, Result};
use crate::protocol::header::{HEADER_SIZE, Header, MessageKind};
use crate::protocol::message::FederatedMessage;
use crate::types::PROTOCOL_VERSION;

/// Encode a `FederatedMessage` into a framed byte buffer: `[header][rkyv payload]`.
pub fn encode_message(msg: &FederatedMessage) -> Result<Vec<u8>> {
    let payload = rkyv::to_bytes::<rkyv::rancor::Error>(msg)
        .map_err(|e| FedError::EncodeFailed(e.to_string()))?;

    if payload.len() > u32::MAX as usize {
        return Err(FedError::EncodeFailed(format!(
            "payload too large for framed header: {} bytes exceeds u32::MAX",
            payload.len()
        )));
    }

    let header = Header {
        payload_length: payload.len() as u32,
        protocol_version: PROTOCOL_VERSION,
        kind: if msg.is_request() {
            MessageKind::Request
        } else {
            MessageKind::Response
        },
    };

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Validate a decoded header against this build's protocol.
pub fn check_header(header: &Header) -> Result<()> {
    if header.protocol_version != PROTOCOL_VERSION {
        return Err(FedError::ProtocolMismatch {
            local: PROTOCOL_VERSION,
            remote: header.protocol_version,
        });
    }
    Ok(())
}

/// Decode the rkyv payload that followed `header`.
pub fn decode_payload(header: &Header, payload: &[u8]) -> Result<FederatedMessage> {
    check_header(header)?;

    // rkyv validates alignment; copy into an aligned buffer first.
    let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(payload.len());
    aligned.extend_from_slice(payload);
    let msg = rkyv::from_bytes::<FederatedMessage, rkyv::rancor::Error>(&aligned)
        .map_err(|e| FedError::DecodeFailed(e.to_string()))?;

    let kind = if msg.is_request() {
        MessageKind::Request
    } else {
        MessageKind::Response
    };
    if kind != header.kind {
        return Err(FedError::DecodeFailed(format!(
            "header says {:?} but payload is {}",
            header.kind,
            msg.name()
        )));
    }
    Ok(msg)
}

/// Decode a framed byte buffer back into a `(Header, FederatedMessage)`.
pub fn decode_message(buf: &[u8]) -> Result<(Header, FederatedMessage)> {
    if buf.len() < HEADER_SIZE {
        return Err(FedError::DecodeFailed(format!(
            "buffer too short: {} < {HEADER_SIZE}",
            buf.len()
        )));
    }

    let header_bytes: &[u8; HEADER_SIZE] = buf[..HEADER_SIZE]
        .try_into()
        .map_err(|_| FedError::DecodeFailed("header slice length mismatch".into()))?;

    let header = Header::decode(header_bytes)
        .ok_or_else(|| FedError::DecodeFailed("invalid header: unknown message kind".into()))?;

    let payload_end = HEADER_SIZE + header.payload_length as usize;
    if buf.len() < payload_end {
        return Err(FedError::DecodeFailed(format!(
            "buffer too short for payload: {} < {payload_end}",
            buf.len()
        )));
    }

    let msg = decode_payload(&header, &buf[HEADER_SIZE..payload_end])?;
    Ok((header, msg))
}
