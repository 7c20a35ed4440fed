//! yajbe is a compact, self-describing binary encoding for JSON-shaped data:
//! null, booleans, integers, floats, byte blobs, UTF-8 strings, arrays, and
//! key-ordered objects.
//!
//! The format is built for documents whose object keys repeat a lot and whose
//! string values often come from small sets. Object keys run through a
//! per-document dictionary with prefix/suffix compression against the
//! previously written key, and an optional LRU table turns repeated string
//! values into one- or two-byte references once they have been seen often
//! enough.
//!
//! # Encoding and decoding values
//!
//! ```
//! use yajbe::{Value, encode_to_vec, decode_from_slice};
//!
//! let mut obj = yajbe::Object::new();
//! obj.insert("name".into(), Value::from("example"));
//! obj.insert("count".into(), Value::from(3));
//!
//! let bytes = encode_to_vec(&Value::Object(obj)).unwrap();
//! let back = decode_from_slice(&bytes).unwrap();
//! assert_eq!(back.as_object().unwrap()["count"].as_i64(), Some(3));
//! ```
//!
//! # Serde
//!
//! Any `Serialize` type maps onto the format through [`ser::to_vec`] /
//! [`ser::to_writer`], and back through [`de::from_slice`] /
//! [`de::from_reader`]. Struct fields go through the same field-name
//! dictionary as object keys.
//!
//! # Dictionaries and options
//!
//! Both sides can pre-seed the field-name dictionary with
//! [`EncoderOptions::initial_field_names`] /
//! [`DecoderOptions::initial_field_names`]; the lists must match exactly. The
//! string-enum table is enabled with [`EncoderOptions::enum_config`] and is
//! negotiated on the wire, so decoders pick it up automatically.

mod depth_tracking;
mod field_names;
mod integer;
mod marker;

pub mod de;
pub mod decode;
pub mod encode;
pub mod enum_lru;
pub mod error;
pub mod ser;
pub mod value;

pub use self::de::{from_reader, from_slice};
pub use self::decode::{Decoder, DecoderOptions};
pub use self::encode::{Encoder, EncoderOptions};
pub use self::enum_lru::EnumConfig;
pub use self::error::{Error, Result};
pub use self::integer::Integer;
pub use self::ser::{to_vec, to_writer};
pub use self::value::{Object, Value};

use std::io::{Read, Write};

/// Hard cap on field-name dictionary entries and on a single field name's
/// byte length, fixed by the three-range length sub-encoding.
pub const MAX_FIELD_NAMES: usize = 65_819;

/// Maximum container nesting depth accepted by encoder and decoder.
pub const MAX_DEPTH: usize = 100;

/// Encode one value as an in-memory document.
pub fn encode_to_vec(value: &Value) -> Result<Vec<u8>> {
    let mut enc = Encoder::new(Vec::new());
    enc.encode_value(value)?;
    Ok(enc.into_writer())
}

/// Encode one value to a byte sink.
pub fn encode_to_writer<W: Write>(writer: W, value: &Value) -> Result<()> {
    Encoder::new(writer).encode_value(value)
}

/// Decode one value from an in-memory document.
pub fn decode_from_slice(data: &[u8]) -> Result<Value> {
    decode_from_reader(data)
}

/// Decode one value from a byte source.
pub fn decode_from_reader<R: Read>(reader: R) -> Result<Value> {
    Decoder::new(reader).decode_value()
}
