//! The wire codec seam.
//!
//! Framing is newline-delimited JSON: one compact JSON object per
//! `\n`-terminated line. `serde_json`'s compact encoding never emits a raw
//! newline inside an object, so the delimiter determines message boundaries
//! deterministically. The core depends only on the [`Codec`] contract, not
//! on the concrete encoding.

use serde_json::Value;
use uuid::Uuid;

use crate::error::{NetError, Result};
use crate::messages::Frame;

/// Encodes outbound frames to bytes and decodes inbound lines to frames.
///
/// Implementations must be safe to share across the read loop and every
/// concurrent writer of a connection.
pub trait Codec: Send + Sync {
    /// Encodes a frame into bytes, including its trailing delimiter.
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>>;

    /// Decodes one delimited line into a frame.
    fn decode(&self, line: &str) -> Result<Frame>;
}

/// The newline-delimited JSON codec used by every Lattice connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>> {
        let mut bytes =
            serde_json::to_vec(frame).map_err(|e| NetError::Codec(e.to_string()))?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    fn decode(&self, line: &str) -> Result<Frame> {
        let frame: Frame =
            serde_json::from_str(line).map_err(|e| NetError::Codec(e.to_string()))?;
        if let Frame::Response(response) = &frame {
            if !response.is_well_formed() {
                return Err(NetError::InvalidFrame(
                    "response must carry exactly one of result and error".to_string(),
                ));
            }
        }
        Ok(frame)
    }
}

/// Attempts to recover a correlation id from a line that failed to decode.
///
/// A malformed frame is never fatal to the connection; when the broken
/// object still carries a parseable `id`, the read loop uses it to answer
/// with an `"invalid frame"` failure instead of dropping the message
/// silently.
pub(crate) fn salvage_id(line: &str) -> Option<Uuid> {
    let value: Value = serde_json::from_str(line).ok()?;
    value
        .get("id")
        .and_then(Value::as_str)
        .and_then(|raw| Uuid::parse_str(raw).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{Request, Response};
    use serde_json::json;

    #[test]
    fn encoded_frames_are_single_lines() {
        let codec = JsonCodec;
        let frame = Frame::Request(Request::new("echo").with_parameter("text", json!("a\nb")));
        let bytes = codec.encode(&frame).unwrap();
        assert_eq!(bytes.last(), Some(&b'\n'));
        // The embedded newline in the parameter is escaped, never raw.
        assert_eq!(
            bytes.iter().filter(|b| **b == b'\n').count(),
            1,
            "frame must occupy exactly one line"
        );
    }

    #[test]
    fn encode_decode_round_trips_a_request() {
        let codec = JsonCodec;
        let request = Request::new("echo").with_parameter("text", json!("hi"));
        let bytes = codec.encode(&Frame::Request(request.clone())).unwrap();
        let line = std::str::from_utf8(&bytes).unwrap().trim_end();
        match codec.decode(line).unwrap() {
            Frame::Request(decoded) => {
                assert_eq!(decoded.id(), request.id());
                assert_eq!(decoded.method(), request.method());
                assert_eq!(decoded.parameters(), request.parameters());
            }
            Frame::Response(_) => panic!("request decoded as response"),
        }
    }

    #[test]
    fn decode_rejects_response_with_both_sides() {
        let codec = JsonCodec;
        let line = format!(
            r#"{{"id":"{}","result":1,"error":{{"kind":"k","message":"m"}}}}"#,
            uuid::Uuid::new_v4()
        );
        assert!(matches!(
            codec.decode(&line),
            Err(NetError::InvalidFrame(_))
        ));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            JsonCodec.decode("not json at all"),
            Err(NetError::Codec(_))
        ));
    }

    #[test]
    fn salvage_id_recovers_from_broken_frames() {
        let id = uuid::Uuid::new_v4();
        let line = format!(r#"{{"id":"{id}","method":12}}"#);
        assert_eq!(salvage_id(&line), Some(id));
        assert_eq!(salvage_id("not json"), None);
        assert_eq!(salvage_id(r#"{"id":"not-a-uuid"}"#), None);
    }

    #[test]
    fn decode_accepts_success_response() {
        let codec = JsonCodec;
        let response = Response::ok(uuid::Uuid::new_v4(), json!("hi"));
        let bytes = codec.encode(&Frame::Response(response.clone())).unwrap();
        let line = std::str::from_utf8(&bytes).unwrap().trim_end();
        match codec.decode(line).unwrap() {
            Frame::Response(decoded) => {
                assert_eq!(decoded.id(), response.id());
                assert_eq!(decoded.result(), Some(&json!("hi")));
            }
            Frame::Request(_) => panic!("response decoded as request"),
        }
    }
}
