//! Wire framing.
//!
//! Every frame is a 1-byte message id followed by a MessagePack body.
//! Bodies are encoded with named keys so client and server structs can
//! evolve independently of field order.

use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Debug)]
pub enum FrameError {
    /// Too small to carry an id plus a body.
    Truncated(usize),
    Encode(rmp_serde::encode::Error),
    Decode(rmp_serde::decode::Error),
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Truncated(len) => write!(f, "truncated frame ({len} bytes)"),
            Self::Encode(e) => write!(f, "encode failed: {e}"),
            Self::Decode(e) => write!(f, "decode failed: {e}"),
        }
    }
}

impl std::error::Error for FrameError {}

/// Build an outbound frame, serializing the payload straight into the
/// id-prefixed buffer.
pub fn encode_frame<T: Serialize>(type_id: u8, payload: &T) -> Result<Vec<u8>, FrameError> {
    let mut frame = vec![type_id];
    rmp_serde::encode::write_named(&mut frame, payload).map_err(FrameError::Encode)?;
    Ok(frame)
}

/// Split an inbound frame into its id and payload bytes.
pub fn split_frame(data: &[u8]) -> Result<(u8, &[u8]), FrameError> {
    match data {
        [id, body @ ..] if !body.is_empty() => Ok((*id, body)),
        _ => Err(FrameError::Truncated(data.len())),
    }
}

/// Deserialize a payload body into a concrete message struct.
pub fn decode_payload<T: DeserializeOwned>(body: &[u8]) -> Result<T, FrameError> {
    rmp_serde::from_slice(body).map_err(FrameError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_splits_into_id_and_body() {
        let frame = encode_frame(0x07, &crate::msg::types::PongPayload { client_time: 1.5 }).unwrap();
        let (id, body) = split_frame(&frame).unwrap();
        assert_eq!(id, 0x07);
        assert_eq!(body, &frame[1..]);
    }

    #[test]
    fn undersized_frames_are_rejected() {
        assert!(matches!(split_frame(&[]), Err(FrameError::Truncated(0))));
        assert!(matches!(split_frame(&[0x01]), Err(FrameError::Truncated(1))));
    }
}
