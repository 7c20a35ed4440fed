//! Decoding.
//!
//! [`Decoder`] reads one document from any [`std::io::Read`] source, buffering a
//! single byte of lookahead for the end-sentinel check. The element-level API
//! drives both [`Decoder::decode_value`] and the serde adapter, so the
//! field-name and enum dictionaries are maintained in exactly one place.

use std::io::{self, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::depth_tracking::DepthTracker;
use crate::enum_lru::{EnumConfig, EnumLruMapping};
use crate::error::{Error, Result};
use crate::field_names::FieldNameReader;
use crate::integer::Integer;
use crate::marker::Marker;
use crate::value::{Object, Value};

const STR_INLINE_MAX: usize = 59;
const CONTAINER_INLINE_MAX: usize = 10;

/// Per-document decoder settings.
#[derive(Clone, Debug, Default)]
pub struct DecoderOptions {
    pub(crate) initial_field_names: Vec<String>,
}

impl DecoderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed the field-name dictionary. Must match the names the encoder
    /// was seeded with, in the same order.
    pub fn initial_field_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.initial_field_names = names.into_iter().map(Into::into).collect();
        self
    }
}

/// Byte source with one byte of lookahead.
struct Source<R: Read> {
    reader: R,
    peeked: Option<u8>,
}

impl<R: Read> Source<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            peeked: None,
        }
    }

    fn peek_u8(&mut self) -> io::Result<u8> {
        if let Some(b) = self.peeked {
            return Ok(b);
        }
        let b = self.reader.read_u8()?;
        self.peeked = Some(b);
        Ok(b)
    }
}

impl<R: Read> Read for Source<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if let Some(b) = self.peeked.take() {
            buf[0] = b;
            return Ok(1);
        }
        self.reader.read(buf)
    }
}

/// One decoded item from the stream. Containers carry their length, or `None`
/// for the end-sentinel framing.
#[derive(Clone, Debug)]
pub(crate) enum Element {
    Null,
    Bool(bool),
    Int(Integer),
    F64(f64),
    Str(String),
    Bin(Vec<u8>),
    Array(Option<usize>),
    Object(Option<usize>),
}

/// Streaming decoder over a byte source. One instance decodes one document;
/// the field-name and enum dictionaries it rebuilds are never shared across
/// documents.
pub struct Decoder<R: Read> {
    source: Source<R>,
    field_names: FieldNameReader,
    enum_mapping: Option<EnumLruMapping>,
    depth: DepthTracker,
}

impl<R: Read> Decoder<R> {
    pub fn new(reader: R) -> Self {
        Self::with_options(reader, DecoderOptions::default())
    }

    pub fn with_options(reader: R, options: DecoderOptions) -> Self {
        Self {
            source: Source::new(reader),
            field_names: FieldNameReader::new(&options.initial_field_names),
            enum_mapping: None,
            depth: DepthTracker::new(),
        }
    }

    /// Decode one complete value tree.
    pub fn decode_value(&mut self) -> Result<Value> {
        match self.next_element()? {
            Element::Null => Ok(Value::Null),
            Element::Bool(v) => Ok(Value::Bool(v)),
            Element::Int(v) => Ok(Value::Int(v)),
            Element::F64(v) => Ok(Value::F64(v)),
            Element::Str(v) => Ok(Value::Str(v)),
            Element::Bin(v) => Ok(Value::Bin(v)),
            Element::Array(len) => {
                let mut items = match len {
                    Some(len) => Vec::with_capacity(len.min(4096)),
                    None => Vec::new(),
                };
                match len {
                    Some(len) => {
                        for _ in 0..len {
                            items.push(self.decode_value()?);
                        }
                    }
                    None => {
                        while self.container_has_more()? {
                            items.push(self.decode_value()?);
                        }
                    }
                }
                Ok(Value::Array(items))
            }
            Element::Object(len) => {
                let mut entries = match len {
                    Some(len) => Object::with_capacity(len.min(4096)),
                    None => Object::new(),
                };
                match len {
                    Some(len) => {
                        for _ in 0..len {
                            let key = self.read_field_name()?;
                            let value = self.decode_value()?;
                            entries.insert(key, value);
                        }
                    }
                    None => {
                        while self.container_has_more()? {
                            let key = self.read_field_name()?;
                            let value = self.decode_value()?;
                            entries.insert(key, value);
                        }
                    }
                }
                Ok(Value::Object(entries))
            }
        }
    }

    /// Read the next element head and its immediate payload. Enum-config
    /// markers are consumed transparently.
    pub(crate) fn next_element(&mut self) -> Result<Element> {
        loop {
            let head = self.read_u8("decode head")?;
            let elem = match Marker::from_u8(head) {
                Marker::Null => Element::Null,
                Marker::EndOfContainer => {
                    return Err(Error::BadEncode(
                        "end-of-container marker in value position".to_string(),
                    ))
                }
                Marker::False => Element::Bool(false),
                Marker::True => Element::Bool(true),
                Marker::Float16 => return Err(Error::ReservedEncoding("float16/var-float")),
                Marker::Float32 => {
                    let v = self
                        .source
                        .read_f32::<LittleEndian>()
                        .map_err(|e| Error::from_read("decode Float32", e))?;
                    Element::F64(v as f64)
                }
                Marker::Float64 => {
                    let v = self
                        .source
                        .read_f64::<LittleEndian>()
                        .map_err(|e| Error::from_read("decode Float64", e))?;
                    Element::F64(v)
                }
                Marker::BigDecimal => return Err(Error::ReservedEncoding("bigdecimal")),
                Marker::EnumConfig => {
                    self.read_enum_config()?;
                    continue;
                }
                Marker::EnumRef8 => {
                    let index = self.read_u8("decode enum index")? as usize;
                    Element::Str(self.resolve_enum(index)?)
                }
                Marker::EnumRef16 => {
                    let index = self
                        .source
                        .read_u16::<LittleEndian>()
                        .map_err(|e| Error::from_read("decode enum index", e))?
                        as usize;
                    Element::Str(self.resolve_enum(index)?)
                }
                Marker::Reserved(n) => return Err(Error::UnknownHead(n)),
                Marker::Array(0x0f) => Element::Array(None),
                Marker::Array(code) => {
                    let len =
                        self.read_length(code, CONTAINER_INLINE_MAX, "decode array length")?;
                    Element::Array(Some(len))
                }
                Marker::Object(0x0f) => Element::Object(None),
                Marker::Object(code) => {
                    let len =
                        self.read_length(code, CONTAINER_INLINE_MAX, "decode object length")?;
                    Element::Object(Some(len))
                }
                Marker::PosInt(code) => Element::Int(self.decode_pos_int(code)?),
                Marker::NegInt(code) => Element::Int(self.decode_neg_int(code)?),
                Marker::Bytes(code) => {
                    let len = self.read_length(code, STR_INLINE_MAX, "decode bytes length")?;
                    Element::Bin(self.read_vec(len, "decode bytes")?)
                }
                Marker::String(code) => {
                    let len = self.read_length(code, STR_INLINE_MAX, "decode string length")?;
                    let utf8 = self.read_vec(len, "decode string")?;
                    let text = String::from_utf8(utf8)?;
                    // literal strings feed the enum table so both sides admit
                    // at the same point in the stream
                    if let Some(mapping) = self.enum_mapping.as_mut() {
                        mapping.add(&text);
                    }
                    Element::Str(text)
                }
            };
            match &elem {
                Element::Array(len) => self.depth.update_array(*len)?,
                Element::Object(len) => self.depth.update_object(*len)?,
                _ => self.depth.update_scalar(),
            }
            return Ok(elem);
        }
    }

    /// Check for the terminator of an end-sentinel container, consuming it
    /// when found.
    pub(crate) fn container_has_more(&mut self) -> Result<bool> {
        let b = self
            .source
            .peek_u8()
            .map_err(|e| Error::from_read("peek container end", e))?;
        if b != Marker::EndOfContainer.into_u8() {
            return Ok(true);
        }
        self.read_u8("consume container end")?;
        self.depth.early_end();
        Ok(false)
    }

    /// Decode one object key through the field-name dictionary.
    pub(crate) fn read_field_name(&mut self) -> Result<String> {
        self.depth.update_scalar();
        self.field_names.decode(&mut self.source)
    }

    /// Classify the next head byte without consuming it.
    pub(crate) fn peek_marker(&mut self) -> Result<Marker> {
        let b = self
            .source
            .peek_u8()
            .map_err(|e| Error::from_read("peek head", e))?;
        Ok(Marker::from_u8(b))
    }

    fn read_enum_config(&mut self) -> Result<()> {
        if self.enum_mapping.is_some() {
            return Err(Error::BadEncode(
                "second enum config marker in one document".to_string(),
            ));
        }
        let param = self.read_u8("decode enum config")?;
        let min_freq = self.read_u8("decode enum config")?;
        let config = EnumConfig::from_wire(param, min_freq)?;
        self.enum_mapping = Some(EnumLruMapping::new(config));
        Ok(())
    }

    fn resolve_enum(&mut self, index: usize) -> Result<String> {
        match self.enum_mapping.as_mut() {
            Some(mapping) => Ok(mapping.get(index)?.to_owned()),
            None => Err(Error::BadEncode(
                "enum reference before enum config".to_string(),
            )),
        }
    }

    fn decode_pos_int(&mut self, code: u8) -> Result<Integer> {
        if code < 24 {
            return Ok(Integer::from(code as u64 + 1));
        }
        let delta = self.read_uint((code - 23) as usize, "decode integer")?;
        let value = delta
            .checked_add(25)
            .ok_or_else(|| Error::BadEncode("integer overflows u64".to_string()))?;
        Ok(Integer::from(value))
    }

    fn decode_neg_int(&mut self, code: u8) -> Result<Integer> {
        if code < 24 {
            return Ok(Integer::from(-(code as i64)));
        }
        let delta = self.read_uint((code - 23) as usize, "decode integer")?;
        let magnitude = delta
            .checked_add(24)
            .filter(|m| *m <= i64::MIN.unsigned_abs())
            .ok_or_else(|| Error::BadEncode("integer overflows i64".to_string()))?;
        Ok(Integer::from(magnitude.wrapping_neg() as i64))
    }

    fn read_length(&mut self, code: u8, inline_max: usize, step: &'static str) -> Result<usize> {
        let code = code as usize;
        if code <= inline_max {
            return Ok(code);
        }
        let delta = self.read_uint(code - inline_max, step)?;
        let total = delta
            .checked_add(inline_max as u64)
            .and_then(|total| usize::try_from(total).ok())
            .ok_or_else(|| Error::BadEncode("length out of range".to_string()))?;
        Ok(total)
    }

    fn read_u8(&mut self, step: &'static str) -> Result<u8> {
        self.source
            .read_u8()
            .map_err(|e| Error::from_read(step, e))
    }

    fn read_uint(&mut self, width: usize, step: &'static str) -> Result<u64> {
        self.source
            .read_uint::<LittleEndian>(width)
            .map_err(|e| Error::from_read(step, e))
    }

    fn read_vec(&mut self, length: usize, step: &'static str) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let n = (&mut self.source)
            .take(length as u64)
            .read_to_end(&mut buf)
            .map_err(|e| Error::from_read(step, e))?;
        if n < length {
            return Err(Error::TruncatedInput { step });
        }
        Ok(buf)
    }
}
