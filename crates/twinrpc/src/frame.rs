//! Framing of binary protocol response bodies.
//!
//! A response body is a sequence of frames, each `[flag: u8][len: u32 BE][payload]`.
//! At most one message frame (flag [`MESSAGE_FLAG`]) is followed by exactly one
//! trailers frame (flag [`TRAILERS_FLAG`]) carrying a protobuf [`Trailers`]
//! with the status of the call and its trailer metadata. The trailers frame is
//! always the last frame of a body.

use std::{
    convert::TryFrom,
    error::Error as StdError,
    fmt::{self, Display, Formatter},
};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use prost::Message as PbMsg;

use crate::{
    proto::{MetadataEntry, Trailers},
    Code, MetadataMap, Status,
};

/// Flag of a frame carrying a message.
pub const MESSAGE_FLAG: u8 = 0x00;
/// Flag of the terminal frame carrying status and trailer metadata.
pub const TRAILERS_FLAG: u8 = 0x80;
/// Length of a frame header.
pub const FRAME_HEADER_LEN: usize = 5;

/// Errors that can occur while encoding or decoding frames.
#[derive(Debug)]
pub enum FrameError {
    /// A frame header or payload was cut short.
    Truncated,
    /// A frame had an unknown flag.
    UnknownFlag(u8),
    /// A payload was too large to fit in a frame.
    TooLarge(usize),
    /// The body carried more than one message.
    MultipleMessages,
    /// The body continued after the trailers frame.
    DataAfterTrailers,
    /// The body ended without a trailers frame.
    MissingTrailers,
    /// The trailers frame couldn't be decoded.
    InvalidTrailers(prost::DecodeError),
    /// The trailers frame carried invalid metadata.
    InvalidMetadata(Status),
}

impl Display for FrameError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Truncated => f.write_str("frame is truncated"),
            FrameError::UnknownFlag(flag) => write!(f, "unknown frame flag {:#04x}", flag),
            FrameError::TooLarge(len) => write!(f, "payload of {} bytes is too large", len),
            FrameError::MultipleMessages => f.write_str("unary response has several messages"),
            FrameError::DataAfterTrailers => f.write_str("data found after trailers frame"),
            FrameError::MissingTrailers => f.write_str("response has no trailers frame"),
            FrameError::InvalidTrailers(err) => write!(f, "invalid trailers frame: {}", err),
            FrameError::InvalidMetadata(status) => {
                write!(f, "invalid trailer metadata: {}", status.message())
            }
        }
    }
}

impl StdError for FrameError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            FrameError::InvalidTrailers(err) => Some(err),
            FrameError::InvalidMetadata(status) => Some(status),
            _ => None,
        }
    }
}

fn put_frame(buf: &mut BytesMut, flag: u8, payload: &[u8]) -> Result<(), FrameError> {
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::TooLarge(payload.len()))?;
    buf.reserve(FRAME_HEADER_LEN + payload.len());
    buf.put_u8(flag);
    buf.put_u32(len);
    buf.put_slice(payload);
    Ok(())
}

/// Encode the trailers of a call.
pub fn trailers_of(status: &Status, trailer: &MetadataMap) -> Trailers {
    Trailers {
        code: status.code().as_i32(),
        message: status.message().to_owned(),
        metadata: trailer
            .iter()
            .map(|(key, value)| MetadataEntry {
                key: key.to_owned(),
                value: value.to_owned(),
            })
            .collect(),
    }
}

/// Encode a whole unary response body.
///
/// `message` must only be present for successful calls.
pub fn encode_response(
    message: Option<&[u8]>,
    status: &Status,
    trailer: &MetadataMap,
) -> Result<Bytes, FrameError> {
    let mut buf = BytesMut::new();
    if let Some(message) = message {
        put_frame(&mut buf, MESSAGE_FLAG, message)?;
    }
    let trailers = trailers_of(status, trailer).encode_to_vec();
    put_frame(&mut buf, TRAILERS_FLAG, &trailers)?;
    Ok(buf.freeze())
}

/// A decoded unary response body.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedResponse {
    /// The message, if the server sent one.
    pub message: Option<Bytes>,
    /// Terminal status of the call.
    pub status: Status,
    /// Trailer metadata of the call.
    pub trailer: MetadataMap,
}

/// Decode a whole unary response body.
pub fn decode_response(mut body: Bytes) -> Result<DecodedResponse, FrameError> {
    let mut message = None;

    loop {
        if body.is_empty() {
            return Err(FrameError::MissingTrailers);
        }
        if body.len() < FRAME_HEADER_LEN {
            return Err(FrameError::Truncated);
        }

        let flag = body.get_u8();
        let len = body.get_u32() as usize;
        if body.len() < len {
            return Err(FrameError::Truncated);
        }
        let payload = body.split_to(len);

        match flag {
            MESSAGE_FLAG => {
                if message.replace(payload).is_some() {
                    return Err(FrameError::MultipleMessages);
                }
            }
            TRAILERS_FLAG => {
                if !body.is_empty() {
                    return Err(FrameError::DataAfterTrailers);
                }
                let trailers = Trailers::decode(payload).map_err(FrameError::InvalidTrailers)?;
                let mut trailer = MetadataMap::new();
                for entry in &trailers.metadata {
                    trailer
                        .append(&entry.key, &entry.value)
                        .map_err(FrameError::InvalidMetadata)?;
                }
                let status = Status::new(Code::from_i32_lossy(trailers.code), trailers.message);

                return Ok(DecodedResponse {
                    message,
                    status,
                    trailer,
                });
            }
            other => return Err(FrameError::UnknownFlag(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trailer() -> MetadataMap {
        let mut map = MetadataMap::new();
        map.append("buf", "buffer").unwrap();
        map.append("multi", "1").unwrap();
        map.append("multi", "2").unwrap();
        map
    }

    #[test]
    fn success_body() {
        let body = encode_response(Some(b"payload"), &Status::ok(), &trailer()).unwrap();

        assert_eq!(body[0], MESSAGE_FLAG);
        assert_eq!(&body[1..5], &7u32.to_be_bytes());
        assert_eq!(&body[5..12], b"payload");
        assert_eq!(body[12], TRAILERS_FLAG);

        let decoded = decode_response(body).unwrap();
        assert_eq!(decoded.message.as_deref(), Some(&b"payload"[..]));
        assert!(decoded.status.is_ok());
        assert_eq!(decoded.trailer, trailer());
    }

    #[test]
    fn error_body_has_only_trailers() {
        let status = Status::invalid_argument("无效的参数");
        let body = encode_response(None, &status, &MetadataMap::new()).unwrap();
        assert_eq!(body[0], TRAILERS_FLAG);

        let decoded = decode_response(body).unwrap();
        assert_eq!(decoded.message, None);
        assert_eq!(decoded.status, status);
        assert!(decoded.trailer.is_empty());
    }

    #[test]
    fn empty_message_is_still_a_message() {
        let body = encode_response(Some(b""), &Status::ok(), &MetadataMap::new()).unwrap();
        let decoded = decode_response(body).unwrap();
        assert_eq!(decoded.message, Some(Bytes::new()));
    }

    #[test]
    fn rejects_malformed_bodies() {
        let ok = encode_response(Some(b"x"), &Status::ok(), &MetadataMap::new()).unwrap();

        assert!(matches!(
            decode_response(Bytes::new()),
            Err(FrameError::MissingTrailers)
        ));
        assert!(matches!(
            decode_response(ok.slice(..ok.len() - 1)),
            Err(FrameError::Truncated)
        ));
        assert!(matches!(
            decode_response(ok.slice(..6)),
            Err(FrameError::MissingTrailers)
        ));
        assert!(matches!(
            decode_response(Bytes::from_static(&[0x01, 0, 0, 0, 0])),
            Err(FrameError::UnknownFlag(0x01))
        ));

        let mut trailing = BytesMut::from(&ok[..]);
        trailing.put_u8(0);
        assert!(matches!(
            decode_response(trailing.freeze()),
            Err(FrameError::DataAfterTrailers)
        ));

        let mut twice = BytesMut::new();
        put_frame(&mut twice, MESSAGE_FLAG, b"a").unwrap();
        twice.extend_from_slice(&ok);
        assert!(matches!(
            decode_response(twice.freeze()),
            Err(FrameError::MultipleMessages)
        ));
    }

    #[test]
    fn unknown_code_decodes_as_unknown() {
        let trailers = Trailers {
            code: 42,
            message: "from the future".into(),
            metadata: Vec::new(),
        };
        let mut body = BytesMut::new();
        put_frame(&mut body, TRAILERS_FLAG, &trailers.encode_to_vec()).unwrap();

        let decoded = decode_response(body.freeze()).unwrap();
        assert_eq!(decoded.status.code(), Code::Unknown);
        assert_eq!(decoded.status.message(), "from the future");
    }
}
