//! MsgPack codec for payloads crossing a context boundary.
//!
//! Every payload that crosses a transport is serialized to MessagePack first,
//! which is what enforces the "no shared memory" rule: live object references,
//! closures, and foreign-context resources simply cannot be represented.
//!
//! **Always `to_vec_named`, never `to_vec`** — struct-as-map keeps payloads
//! self-describing, so the two sides of a channel can evolve field order
//! independently.
//!
//! # Example
//!
//! ```
//! use launchwire::codec::MsgPackCodec;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Message {
//!     id: u32,
//!     content: String,
//! }
//!
//! let msg = Message { id: 42, content: "hello".to_string() };
//! let encoded = MsgPackCodec::encode(&msg).unwrap();
//! let decoded: Message = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, msg);
//! ```

use crate::error::Result;

/// MessagePack codec for structured data.
///
/// Uses `rmp_serde::to_vec_named` so structs are serialized as maps (with
/// field names) rather than positional arrays.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct TestStruct {
        id: u32,
        name: String,
        active: bool,
    }

    #[test]
    fn test_encode_decode_struct() {
        let original = TestStruct {
            id: 42,
            name: "test".to_string(),
            active: true,
        };

        let encoded = MsgPackCodec::encode(&original).unwrap();
        let decoded: TestStruct = MsgPackCodec::decode(&encoded).unwrap();

        assert_eq!(decoded, original);
    }

    #[test]
    fn test_encode_decode_primitives() {
        let s = "hello world";
        let encoded = MsgPackCodec::encode(&s).unwrap();
        let decoded: String = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, s);

        let n: i64 = 12345;
        let encoded = MsgPackCodec::encode(&n).unwrap();
        let decoded: i64 = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, n);
    }

    #[test]
    fn test_struct_serialized_as_map() {
        // Map format starts with 0x8X (fixmap); positional array format
        // would start with 0x9X (fixarray).
        let test = TestStruct {
            id: 1,
            name: "x".to_string(),
            active: false,
        };

        let encoded = MsgPackCodec::encode(&test).unwrap();
        assert_eq!(
            encoded[0] & 0xF0,
            0x80,
            "Expected map format (0x8X), got {:02X}",
            encoded[0]
        );
    }

    #[test]
    fn test_encode_decode_option() {
        let some_val: Option<i32> = Some(42);
        let encoded = MsgPackCodec::encode(&some_val).unwrap();
        let decoded: Option<i32> = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, some_val);

        let none_val: Option<i32> = None;
        let encoded = MsgPackCodec::encode(&none_val).unwrap();
        assert_eq!(encoded, vec![0xc0], "None should encode as msgpack nil");
        let decoded: Option<i32> = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, none_val);
    }

    #[test]
    fn test_decode_error_on_invalid_data() {
        let invalid = b"not valid msgpack";
        let result: Result<TestStruct> = MsgPackCodec::decode(invalid);
        assert!(result.is_err());
    }

    #[test]
    fn test_unit_payload() {
        // Commands with no arguments send `()` as their payload.
        let encoded = MsgPackCodec::encode(&()).unwrap();
        let result: Result<()> = MsgPackCodec::decode(&encoded);
        assert!(result.is_ok());
    }
}
