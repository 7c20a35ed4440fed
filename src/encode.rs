//! Encoding.
//!
//! [`Encoder`] writes one document to any [`std::io::Write`] sink. It exposes a
//! typed entry point per value kind plus a streaming container API for when
//! the element count isn't known up front (the end-sentinel framing).

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::depth_tracking::DepthTracker;
use crate::enum_lru::{EnumConfig, EnumLruMapping};
use crate::error::{Error, Result};
use crate::field_names::FieldNameWriter;
use crate::integer::{get_int_internal, IntPriv, Integer};
use crate::marker::Marker;
use crate::value::Value;

const STR_HEAD: u8 = 0xc0;
const BYTES_HEAD: u8 = 0x80;
const ARRAY_HEAD: u8 = 0x20;
const OBJECT_HEAD: u8 = 0x30;

// Strings and bytes inline lengths up to 59 in the head; arrays and objects up
// to 10. Longer lengths append a little-endian delta of 1..=4 bytes, the width
// encoded in the remaining head codes below the end-sentinel code.
const STR_INLINE_MAX: usize = 59;
const CONTAINER_INLINE_MAX: usize = 10;
const MAX_LENGTH_WIDTH: usize = 4;

/// Per-document encoder settings.
#[derive(Clone, Debug, Default)]
pub struct EncoderOptions {
    pub(crate) initial_field_names: Vec<String>,
    pub(crate) enum_config: Option<EnumConfig>,
}

impl EncoderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed the field-name dictionary. The decoder must be seeded with the
    /// same names in the same order.
    pub fn initial_field_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.initial_field_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Turn on the string-enum dictionary. The config is negotiated on the
    /// wire, so the decoder needs no matching option.
    pub fn enum_config(mut self, config: EnumConfig) -> Self {
        self.enum_config = Some(config);
        self
    }
}

/// Streaming encoder over a byte sink. One instance encodes one document; the
/// field-name and enum dictionaries it builds up are never shared across
/// documents.
pub struct Encoder<W: Write> {
    writer: W,
    field_names: FieldNameWriter,
    enum_config: Option<EnumConfig>,
    enum_mapping: Option<EnumLruMapping>,
    depth: DepthTracker,
}

impl<W: Write> Encoder<W> {
    pub fn new(writer: W) -> Self {
        Self::with_options(writer, EncoderOptions::default())
    }

    pub fn with_options(writer: W, options: EncoderOptions) -> Self {
        Self {
            writer,
            field_names: FieldNameWriter::new(&options.initial_field_names),
            enum_config: options.enum_config,
            enum_mapping: None,
            depth: DepthTracker::new(),
        }
    }

    /// Recover the sink.
    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Encode a whole [`Value`] tree with known-length container framing.
    pub fn encode_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.encode_null(),
            Value::Bool(v) => self.encode_bool(*v),
            Value::Int(v) => self.encode_int(*v),
            Value::F64(v) => self.encode_f64(*v),
            Value::Str(v) => self.encode_str(v),
            Value::Bin(v) => self.encode_bytes(v),
            Value::Array(items) => {
                self.encode_array_start(Some(items.len()))?;
                for item in items {
                    self.encode_value(item)?;
                }
                Ok(())
            }
            Value::Object(entries) => {
                self.encode_object_start(Some(entries.len()))?;
                for (key, item) in entries {
                    self.encode_field_name(key)?;
                    self.encode_value(item)?;
                }
                Ok(())
            }
        }
    }

    pub fn encode_null(&mut self) -> Result<()> {
        self.depth.update_scalar();
        self.write_u8(Marker::Null.into())
    }

    pub fn encode_bool(&mut self, v: bool) -> Result<()> {
        self.depth.update_scalar();
        self.write_u8(if v { Marker::True } else { Marker::False }.into())
    }

    pub fn encode_i64(&mut self, v: i64) -> Result<()> {
        self.encode_int(Integer::from(v))
    }

    pub fn encode_u64(&mut self, v: u64) -> Result<()> {
        self.encode_int(Integer::from(v))
    }

    /// Zero shares the negative-integer head; positive values bias the
    /// multi-byte delta by 25 and negative ones by 24, so the smallest
    /// multi-byte magnitude always lands on delta zero.
    pub fn encode_int(&mut self, v: Integer) -> Result<()> {
        self.depth.update_scalar();
        match get_int_internal(&v) {
            IntPriv::PosInt(0) => self.write_u8(Marker::NegInt(0).into()),
            IntPriv::PosInt(v) if v <= 24 => self.write_u8(Marker::PosInt(v as u8 - 1).into()),
            IntPriv::PosInt(v) => {
                let delta = v - 25;
                let width = uint_width(delta);
                self.write_u8(Marker::PosInt(23 + width as u8).into())?;
                self.write_uint(delta, width)
            }
            IntPriv::NegInt(v) => {
                let magnitude = v.unsigned_abs();
                if magnitude <= 23 {
                    self.write_u8(Marker::NegInt(magnitude as u8).into())
                } else {
                    let delta = magnitude - 24;
                    let width = uint_width(delta);
                    self.write_u8(Marker::NegInt(23 + width as u8).into())?;
                    self.write_uint(delta, width)
                }
            }
        }
    }

    pub fn encode_f64(&mut self, v: f64) -> Result<()> {
        self.depth.update_scalar();
        self.write_u8(Marker::Float64.into())?;
        self.writer.write_f64::<LittleEndian>(v).map_err(Error::Io)
    }

    pub fn encode_str(&mut self, v: &str) -> Result<()> {
        self.depth.update_scalar();
        if let Some(config) = self.enum_config {
            if self.encode_enum(config, v)? {
                return Ok(());
            }
        }
        self.write_length(STR_HEAD, STR_INLINE_MAX, v.len())?;
        self.writer.write_all(v.as_bytes()).map_err(Error::Io)
    }

    pub fn encode_bytes(&mut self, v: &[u8]) -> Result<()> {
        self.depth.update_scalar();
        self.write_length(BYTES_HEAD, STR_INLINE_MAX, v.len())?;
        self.writer.write_all(v).map_err(Error::Io)
    }

    /// Open an array. `Some(len)` writes the count up front and the container
    /// closes itself after `len` values; `None` selects end-sentinel framing,
    /// closed by [`Encoder::encode_container_end`].
    pub fn encode_array_start(&mut self, len: Option<usize>) -> Result<()> {
        self.depth.update_array(len)?;
        match len {
            Some(len) => self.write_length(ARRAY_HEAD, CONTAINER_INLINE_MAX, len),
            None => self.write_u8(ARRAY_HEAD | 0x0f),
        }
    }

    /// Open an object; same framing choices as [`Encoder::encode_array_start`].
    /// Each entry is one [`Encoder::encode_field_name`] call followed by one
    /// value.
    pub fn encode_object_start(&mut self, len: Option<usize>) -> Result<()> {
        self.depth.update_object(len)?;
        match len {
            Some(len) => self.write_length(OBJECT_HEAD, CONTAINER_INLINE_MAX, len),
            None => self.write_u8(OBJECT_HEAD | 0x0f),
        }
    }

    /// Emit an object key through the field-name dictionary.
    pub fn encode_field_name(&mut self, key: &str) -> Result<()> {
        self.depth.update_scalar();
        self.field_names.encode(&mut self.writer, key)
    }

    /// Terminate the innermost end-sentinel container.
    pub fn encode_container_end(&mut self) -> Result<()> {
        self.depth.early_end();
        self.write_u8(Marker::EndOfContainer.into())
    }

    /// Try to emit `text` as an enum reference. The first call negotiates the
    /// table on the wire. Returns false when the string must go out literally.
    fn encode_enum(&mut self, config: EnumConfig, text: &str) -> Result<bool> {
        if self.enum_mapping.is_none() {
            self.write_u8(Marker::EnumConfig.into())?;
            self.write_u8(config.size_param())?;
            self.write_u8((config.min_freq() - 1) as u8)?;
            self.enum_mapping = Some(EnumLruMapping::new(config));
        }
        let index = match self.enum_mapping.as_mut().and_then(|m| m.add(text)) {
            Some(index) => index,
            None => return Ok(false),
        };
        if index <= 0xff {
            self.write_u8(Marker::EnumRef8.into())?;
            self.write_u8(index as u8)?;
        } else if index <= 0xffff {
            self.write_u8(Marker::EnumRef16.into())?;
            self.writer
                .write_u16::<LittleEndian>(index as u16)
                .map_err(Error::Io)?;
        } else {
            return Err(Error::LengthTooLong {
                max: 0xffff,
                actual: index,
            });
        }
        Ok(true)
    }

    /// The head+length scheme: lengths up to `inline_max` ride in the head
    /// byte, longer ones append the smallest little-endian delta that fits.
    fn write_length(&mut self, head: u8, inline_max: usize, length: usize) -> Result<()> {
        if length <= inline_max {
            return self.write_u8(head | length as u8);
        }
        let delta = (length - inline_max) as u64;
        let width = uint_width(delta);
        if width > MAX_LENGTH_WIDTH {
            return Err(Error::LengthTooLong {
                max: inline_max + u32::MAX as usize,
                actual: length,
            });
        }
        self.write_u8(head | (inline_max + width) as u8)?;
        self.write_uint(delta, width)
    }

    fn write_u8(&mut self, v: u8) -> Result<()> {
        self.writer.write_u8(v).map_err(Error::Io)
    }

    fn write_uint(&mut self, v: u64, width: usize) -> Result<()> {
        self.writer
            .write_uint::<LittleEndian>(v, width)
            .map_err(Error::Io)
    }
}

/// Smallest number of bytes that hold `v` little-endian, minimum one.
fn uint_width(v: u64) -> usize {
    let bits = 64 - v.leading_zeros() as usize;
    bits.div_ceil(8).max(1)
}

#[cfg(test)]
mod test {
    use super::*;

    fn encode(value: &Value) -> String {
        let mut enc = Encoder::new(Vec::new());
        enc.encode_value(value).unwrap();
        hex::encode(enc.into_writer())
    }

    #[test]
    fn width_selection() {
        assert_eq!(uint_width(0), 1);
        assert_eq!(uint_width(1), 1);
        assert_eq!(uint_width(0xff), 1);
        assert_eq!(uint_width(0x100), 2);
        assert_eq!(uint_width(0xffff_ffff), 4);
        assert_eq!(uint_width(u64::MAX), 8);
    }

    #[test]
    fn simple() {
        assert_eq!(encode(&Value::Null), "00");
        assert_eq!(encode(&Value::Bool(false)), "02");
        assert_eq!(encode(&Value::Bool(true)), "03");
    }

    #[test]
    fn positive_ints() {
        for (value, expected) in [
            (1i64, "40"),
            (7, "46"),
            (24, "57"),
            (25, "5800"),
            (0xff, "58e6"),
            (0xffff, "59e6ff"),
            (0xffffff, "5ae6ffff"),
            (0xffffffff, "5be6ffffff"),
            (0xffffffffff, "5ce6ffffffff"),
            (0xffffffffffff, "5de6ffffffffff"),
            (0x1fffffffffffff, "5ee6ffffffffff1f"),
            (0xffffffffffffff, "5ee6ffffffffffff"),
            (0xfffffffffffffff, "5fe6ffffffffffff0f"),
            (0x7fffffffffffffff, "5fe6ffffffffffff7f"),
            (100, "584b"),
            (1000, "59cf03"),
            (1000000, "5a27420f"),
            (1000000000000, "5ce70fa5d4e8"),
            (100000000000000, "5de73f7a10f35a"),
        ] {
            assert_eq!(encode(&Value::from(value)), expected, "value {}", value);
        }
        assert_eq!(encode(&Value::from(u64::MAX)), "5fe6ffffffffffffff");
    }

    #[test]
    fn negative_ints() {
        for (value, expected) in [
            (0i64, "60"),
            (-1, "61"),
            (-7, "67"),
            (-23, "77"),
            (-24, "7800"),
            (-25, "7801"),
            (-0xff, "78e7"),
            (-0xffff, "79e7ff"),
            (-0xffffff, "7ae7ffff"),
            (-0xffffffff, "7be7ffffff"),
            (-0xffffffffff, "7ce7ffffffff"),
            (-0xffffffffffff, "7de7ffffffffff"),
            (-0x1fffffffffffff, "7ee7ffffffffff1f"),
            (-0xffffffffffffff, "7ee7ffffffffffff"),
            (-0xfffffffffffffff, "7fe7ffffffffffff0f"),
            (-0x7fffffffffffffff, "7fe7ffffffffffff7f"),
            (-100, "784c"),
            (-1000, "79d003"),
            (-1000000, "7a28420f"),
            (-1000000000000, "7ce80fa5d4e8"),
            (-100000000000000, "7de83f7a10f35a"),
        ] {
            assert_eq!(encode(&Value::from(value)), expected, "value {}", value);
        }
        assert_eq!(encode(&Value::from(i64::MIN)), "7fe8ffffffffffff7f");
    }

    #[test]
    fn floats() {
        assert_eq!(encode(&Value::F64(1.5)), "06000000000000f83f");
        assert_eq!(encode(&Value::F64(-4.1)), "0666666666666610c0");
        assert_eq!(
            encode(&Value::F64(5.960464477539063e-8)),
            "06000000000000703e"
        );
        assert_eq!(encode(&Value::F64(1.0e300)), "069c7500883ce4377e");
        assert_eq!(encode(&Value::F64(-40.049149)), "06c8d0b1834a0644c0");
    }

    #[test]
    fn strings() {
        assert_eq!(encode(&Value::from("")), "c0");
        assert_eq!(encode(&Value::from("a")), "c161");
        assert_eq!(encode(&Value::from("abc")), "c3616263");
        assert_eq!(encode(&Value::from("x".repeat(59))), format!("fb{}", "78".repeat(59)));
        assert_eq!(
            encode(&Value::from("y".repeat(60))),
            format!("fc01{}", "79".repeat(60))
        );
        assert_eq!(
            encode(&Value::from("y".repeat(0xff))),
            format!("fcc4{}", "79".repeat(0xff))
        );
        assert_eq!(
            encode(&Value::from("z".repeat(314))),
            format!("fcff{}", "7a".repeat(314))
        );
        assert_eq!(
            encode(&Value::from("z".repeat(315))),
            format!("fd0001{}", "7a".repeat(315))
        );
        assert_eq!(
            encode(&Value::from("k".repeat(0xfffff))),
            format!("fec4ff0f{}", "6b".repeat(0xfffff))
        );
    }

    #[test]
    fn bytes() {
        assert_eq!(encode(&Value::Bin(vec![])), "80");
        assert_eq!(encode(&Value::Bin(vec![0])), "8100");
        assert_eq!(encode(&Value::Bin(vec![0; 59])), format!("bb{}", "00".repeat(59)));
        assert_eq!(
            encode(&Value::Bin(vec![0; 60])),
            format!("bc01{}", "00".repeat(60))
        );
        assert_eq!(
            encode(&Value::Bin(vec![0; 315])),
            format!("bd0001{}", "00".repeat(315))
        );
    }

    #[test]
    fn arrays() {
        assert_eq!(encode(&Value::Array(vec![])), "20");
        assert_eq!(encode(&[1].into_iter().collect()), "2140");
        assert_eq!(encode(&[1, 2, 3].into_iter().collect()), "23404142");
        assert_eq!(
            encode(&std::iter::repeat(0).take(10).collect()),
            "2a60606060606060606060"
        );
        assert_eq!(
            encode(&std::iter::repeat(0).take(11).collect()),
            "2b016060606060606060606060"
        );
        assert_eq!(
            encode(&std::iter::repeat(0).take(265).collect()),
            format!("2bff{}", "60".repeat(265))
        );
        assert_eq!(
            encode(&std::iter::repeat(0).take(0xffff).collect()),
            format!("2cf5ff{}", "60".repeat(0xffff))
        );
    }

    #[test]
    fn objects() {
        let mut obj = crate::value::Object::new();
        assert_eq!(encode(&Value::Object(obj.clone())), "30");
        obj.insert("a".into(), Value::from(1));
        assert_eq!(encode(&Value::Object(obj.clone())), "31816140");

        let mut obj = crate::value::Object::new();
        obj.insert("a".into(), Value::from("vA"));
        assert_eq!(encode(&Value::Object(obj)), "318161c27641");

        let mut obj = crate::value::Object::new();
        obj.insert("a".into(), [1, 2, 3].into_iter().collect());
        assert_eq!(encode(&Value::Object(obj)), "31816123404142");

        // nesting: {"a": {"l": [1, 2, 3]}}
        let mut inner = crate::value::Object::new();
        inner.insert("l".into(), [1, 2, 3].into_iter().collect());
        let mut obj = crate::value::Object::new();
        obj.insert("a".into(), Value::Object(inner));
        assert_eq!(encode(&Value::Object(obj)), "31816131816c23404142");
    }

    #[test]
    fn sentinel_framing() {
        let mut enc = Encoder::new(Vec::new());
        enc.encode_object_start(None).unwrap();
        enc.encode_field_name("a").unwrap();
        enc.encode_int(Integer::from(1)).unwrap();
        enc.encode_field_name("obj").unwrap();
        enc.encode_null().unwrap();
        enc.encode_container_end().unwrap();
        assert_eq!(hex::encode(enc.into_writer()), "3f816140836f626a0001");

        let mut enc = Encoder::new(Vec::new());
        enc.encode_array_start(None).unwrap();
        enc.encode_container_end().unwrap();
        assert_eq!(hex::encode(enc.into_writer()), "2f01");
    }

    #[test]
    fn initial_field_names() {
        let options =
            EncoderOptions::new().initial_field_names(["hello", "world"]);
        let mut enc = Encoder::with_options(Vec::new(), options);
        let mut obj = crate::value::Object::new();
        obj.insert("world".into(), Value::from(2));
        obj.insert("hello".into(), Value::from(1));
        enc.encode_value(&Value::Object(obj)).unwrap();
        assert_eq!(hex::encode(enc.into_writer()), "32a141a040");
    }

    #[test]
    fn depth_limit() {
        let mut value = Value::Array(vec![]);
        for _ in 0..crate::MAX_DEPTH + 1 {
            value = Value::Array(vec![value]);
        }
        let mut enc = Encoder::new(Vec::new());
        assert!(matches!(
            enc.encode_value(&value),
            Err(Error::ParseLimit(_))
        ));
    }
}
