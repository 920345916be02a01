use crate::error::{FedError, Result};
use crate::protocol::codec::{check_header, decode_payload, encode_message};
use crate::protocol::{FederatedMessage, HEADER_SIZE, Header};

/// Write one framed message and finish the send side of the stream.
pub async fn write_framed(send: &mut quinn::SendStream, msg: &FederatedMessage) -> Result<()> {
    let buf = encode_message(msg)?;
    send.write_all(&buf)
        .await
        .map_err(|e| FedError::transport_with_source("write frame", e))?;
    send.finish()
        .map_err(|e| FedError::transport_with_source("finish stream", e))?;
    Ok(())
}

/// Read exactly one framed message, rejecting payloads over `max_message_bytes`
/// before reading them.
pub async fn read_framed(
    recv: &mut quinn::RecvStream,
    max_message_bytes: u64,
) -> Result<FederatedMessage> {
    let mut header_buf = [0u8; HEADER_SIZE];
    recv.read_exact(&mut header_buf)
        .await
        .map_err(|e| FedError::transport_with_source("read frame header", e))?;

    let header = Header::decode(&header_buf)
        .ok_or_else(|| FedError::DecodeFailed("invalid header: unknown message kind".into()))?;
    check_header(&header)?;

    let len = u64::from(header.payload_length);
    if len > max_message_bytes {
        return Err(FedError::MessageTooLarge {
            size: len,
            limit: max_message_bytes,
        });
    }

    let mut payload = vec![0u8; header.payload_length as usize];
    recv.read_exact(&mut payload)
        .await
        .map_err(|e| FedError::transport_with_source("read frame payload", e))?;
    decode_payload(&header, &payload)
}

/// Send `request` on a fresh bidirectional stream and wait for the reply.
pub async fn request_reply(
    conn: &quinn::Connection,
    request: &FederatedMessage,
    max_message_bytes: u64,
) -> Result<FederatedMessage> {
    let (mut send, mut recv) = conn
        .open_bi()
        .await
        .map_err(|e| FedError::transport_with_source("open bi stream", e))?;
    write_framed(&mut send, request).await?;
    read_framed(&mut recv, max_message_bytes).await
}
