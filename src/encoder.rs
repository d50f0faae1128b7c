//! Wire encoding of records
//!
//! Every record goes out as one frame: `<token><SEPARATOR><json><TERMINATOR>`.
//! JSON objects are self-delimiting, so there is no length prefix.

use crate::{Result, ShipperError};
use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use tokio_util::codec::Encoder;

/// Byte between the account token and the record
pub const SEPARATOR: u8 = b' ';

/// Byte terminating every record
pub const TERMINATOR: u8 = b'\n';

/// Encodes records behind a fixed, token-derived prefix
#[derive(Debug, Clone)]
pub struct RecordEncoder {
    prefix: Bytes,
}

impl RecordEncoder {
    /// Create an encoder for the given account token
    pub fn new(token: &str) -> Self {
        let mut prefix = BytesMut::with_capacity(token.len() + 1);
        prefix.put_slice(token.as_bytes());
        prefix.put_u8(SEPARATOR);
        Self {
            prefix: prefix.freeze(),
        }
    }

    /// Prefix written before every record
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Encode a single record into a fresh buffer
    pub fn encode_to_vec<R: Serialize>(&mut self, record: &R) -> Result<Vec<u8>> {
        let mut buf = BytesMut::new();
        self.encode(record, &mut buf)?;
        Ok(buf.to_vec())
    }
}

impl<'a, R: Serialize> Encoder<&'a R> for RecordEncoder {
    type Error = ShipperError;

    fn encode(&mut self, item: &'a R, dst: &mut BytesMut) -> Result<()> {
        let start = dst.len();
        dst.reserve(self.prefix.len() + 128);
        dst.put_slice(&self.prefix);

        if let Err(e) = serde_json::to_writer((&mut *dst).writer(), item) {
            // never leave half a frame behind
            dst.truncate(start);
            return Err(ShipperError::Encode(e));
        }

        dst.put_u8(TERMINATOR);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::Error as _;
    use serde_json::json;

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
            Err(S::Error::custom("not today"))
        }
    }

    #[test]
    fn test_wire_format() {
        let mut encoder = RecordEncoder::new("abc");
        let bytes = encoder.encode_to_vec(&json!({"msg": "hello"})).unwrap();
        assert_eq!(bytes, b"abc {\"msg\":\"hello\"}\n");
    }

    #[test]
    fn test_prefix_is_token_and_separator() {
        let encoder = RecordEncoder::new("2bfbea1e");
        assert_eq!(encoder.prefix(), b"2bfbea1e ");
    }

    #[test]
    fn test_consecutive_frames_are_appended() {
        let mut encoder = RecordEncoder::new("t");
        let mut buf = BytesMut::new();
        encoder.encode(&json!({"n": 1}), &mut buf).unwrap();
        encoder.encode(&json!({"n": 2}), &mut buf).unwrap();
        assert_eq!(&buf[..], b"t {\"n\":1}\nt {\"n\":2}\n");
    }

    #[test]
    fn test_embedded_newlines_are_escaped() {
        let mut encoder = RecordEncoder::new("t");
        let bytes = encoder.encode_to_vec(&json!({"msg": "two\nlines"})).unwrap();
        assert_eq!(bytes.iter().filter(|b| **b == TERMINATOR).count(), 1);
        assert_eq!(bytes.last(), Some(&TERMINATOR));
    }

    #[test]
    fn test_encode_failure_leaves_buffer_untouched() {
        let mut encoder = RecordEncoder::new("t");
        let mut buf = BytesMut::from(&b"earlier"[..]);

        let err = encoder.encode(&Unserializable, &mut buf).unwrap_err();
        assert!(matches!(err, ShipperError::Encode(_)));
        assert_eq!(&buf[..], b"earlier");
    }
}
