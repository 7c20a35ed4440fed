//! Per-document field-name dictionary.
//!
//! Object keys are emitted through one of four strategies: full name, indexed
//! reference to an already-admitted name, prefix compression against the
//! previously emitted name, or prefix+suffix compression. Writer and reader
//! admit names under identical rules, so the reader rebuilds the writer's
//! dictionary from the stream alone.

use std::collections::HashMap;
use std::io::{Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};
use crate::marker::FieldMarker;
use crate::MAX_FIELD_NAMES;

// Three-range length sub-encoding carried in the low 5 bits of a field head:
// codes 0..=29 are the length itself, code 30 adds one byte (30..=284), code
// 31 adds two (285..=65_819).
const INLINE_LIMIT: usize = 30;
const ONE_BYTE_LIMIT: usize = 284;
const ONE_BYTE_BIAS: usize = 29;
const TWO_BYTE_BIAS: usize = 284;

pub(crate) struct FieldNameWriter {
    indexed: HashMap<String, usize>,
    last_key: Vec<u8>,
}

impl FieldNameWriter {
    pub fn new(initial_field_names: &[String]) -> Self {
        let mut indexed = HashMap::with_capacity(initial_field_names.len().min(MAX_FIELD_NAMES));
        for (i, name) in initial_field_names.iter().take(MAX_FIELD_NAMES).enumerate() {
            indexed.insert(name.clone(), i);
        }
        Self {
            indexed,
            last_key: Vec::new(),
        }
    }

    /// Emit one field name, choosing the cheapest of the four strategies.
    pub fn encode<W: Write>(&mut self, writer: &mut W, key: &str) -> Result<()> {
        let utf8 = key.as_bytes();

        if let Some(&index) = self.indexed.get(key) {
            write_head(writer, FieldMarker::Indexed, index)?;
            self.last_key.clear();
            self.last_key.extend_from_slice(utf8);
            return Ok(());
        }

        if !self.last_key.is_empty() && utf8.len() > 4 {
            let prefix = common_prefix(&self.last_key, utf8).min(0xff);
            let suffix = common_suffix(&self.last_key, utf8, prefix).min(0xff);
            if suffix > 2 {
                self.write_prefix_suffix(writer, utf8, prefix, suffix)?;
            } else if prefix > 2 {
                self.write_prefix(writer, utf8, prefix)?;
            } else {
                write_full(writer, utf8)?;
            }
        } else {
            write_full(writer, utf8)?;
        }

        if self.indexed.len() < MAX_FIELD_NAMES {
            self.indexed.insert(key.to_owned(), self.indexed.len());
        }
        self.last_key.clear();
        self.last_key.extend_from_slice(utf8);
        Ok(())
    }

    fn write_prefix<W: Write>(&self, writer: &mut W, utf8: &[u8], prefix: usize) -> Result<()> {
        write_head(writer, FieldMarker::Prefix, utf8.len() - prefix)?;
        writer.write_u8(prefix as u8).map_err(Error::Io)?;
        writer.write_all(&utf8[prefix..]).map_err(Error::Io)
    }

    fn write_prefix_suffix<W: Write>(
        &self,
        writer: &mut W,
        utf8: &[u8],
        prefix: usize,
        suffix: usize,
    ) -> Result<()> {
        let length = utf8.len() - prefix - suffix;
        write_head(writer, FieldMarker::PrefixSuffix, length)?;
        writer.write_u8(prefix as u8).map_err(Error::Io)?;
        writer.write_u8(suffix as u8).map_err(Error::Io)?;
        writer
            .write_all(&utf8[prefix..prefix + length])
            .map_err(Error::Io)
    }
}

fn write_full<W: Write>(writer: &mut W, utf8: &[u8]) -> Result<()> {
    write_head(writer, FieldMarker::Full, utf8.len())?;
    writer.write_all(utf8).map_err(Error::Io)
}

fn write_head<W: Write>(
    writer: &mut W,
    marker: fn(u8) -> FieldMarker,
    length: usize,
) -> Result<()> {
    if length < INLINE_LIMIT {
        writer.write_u8(marker(length as u8).into()).map_err(Error::Io)
    } else if length <= ONE_BYTE_LIMIT {
        writer.write_u8(marker(30).into()).map_err(Error::Io)?;
        writer
            .write_u8((length - ONE_BYTE_BIAS) as u8)
            .map_err(Error::Io)
    } else if length <= MAX_FIELD_NAMES {
        let delta = length - TWO_BYTE_BIAS;
        writer.write_u8(marker(31).into()).map_err(Error::Io)?;
        writer.write_u8((delta >> 8) as u8).map_err(Error::Io)?;
        writer.write_u8((delta & 0xff) as u8).map_err(Error::Io)
    } else {
        Err(Error::LengthTooLong {
            max: MAX_FIELD_NAMES,
            actual: length,
        })
    }
}

/// Length of the shared prefix of `last_key` and `key`.
fn common_prefix(last_key: &[u8], key: &[u8]) -> usize {
    last_key
        .iter()
        .zip(key.iter())
        .take_while(|(a, b)| a == b)
        .count()
}

/// Length of the shared suffix of `last_key` and `key` past its prefix.
fn common_suffix(last_key: &[u8], key: &[u8], key_prefix: usize) -> usize {
    let tail = &key[key_prefix..];
    last_key
        .iter()
        .rev()
        .zip(tail.iter().rev())
        .take_while(|(a, b)| a == b)
        .count()
}

pub(crate) struct FieldNameReader {
    names: Vec<String>,
    last_key: Vec<u8>,
}

impl FieldNameReader {
    pub fn new(initial_field_names: &[String]) -> Self {
        Self {
            names: initial_field_names
                .iter()
                .take(MAX_FIELD_NAMES)
                .cloned()
                .collect(),
            last_key: Vec::new(),
        }
    }

    /// Decode one field name and keep the dictionary in step with the writer.
    pub fn decode<R: Read>(&mut self, reader: &mut R) -> Result<String> {
        let head = reader
            .read_u8()
            .map_err(|e| Error::from_read("decode field name head", e))?;
        let marker = FieldMarker::from_u8(head).ok_or(Error::UnknownHead(head))?;
        match marker {
            FieldMarker::Full(code) => {
                let length = read_length(reader, code)?;
                let utf8 = read_exact_vec(reader, length, "decode field name")?;
                self.admit(utf8)
            }
            FieldMarker::Indexed(code) => {
                let index = read_length(reader, code)?;
                let name = self.names.get(index).ok_or_else(|| {
                    Error::BadEncode(format!("field name index {} not in dictionary", index))
                })?;
                let name = name.clone();
                self.last_key.clear();
                self.last_key.extend_from_slice(name.as_bytes());
                Ok(name)
            }
            FieldMarker::Prefix(code) => {
                let length = read_length(reader, code)?;
                let prefix = reader
                    .read_u8()
                    .map_err(|e| Error::from_read("decode field name prefix", e))?
                    as usize;
                if prefix > self.last_key.len() {
                    return Err(Error::BadEncode(format!(
                        "field name prefix {} longer than last key ({})",
                        prefix,
                        self.last_key.len()
                    )));
                }
                let mut utf8 = Vec::with_capacity(prefix + length);
                utf8.extend_from_slice(&self.last_key[..prefix]);
                let mid = read_exact_vec(reader, length, "decode field name")?;
                utf8.extend_from_slice(&mid);
                self.admit(utf8)
            }
            FieldMarker::PrefixSuffix(code) => {
                let length = read_length(reader, code)?;
                let prefix = reader
                    .read_u8()
                    .map_err(|e| Error::from_read("decode field name prefix", e))?
                    as usize;
                let suffix = reader
                    .read_u8()
                    .map_err(|e| Error::from_read("decode field name suffix", e))?
                    as usize;
                if prefix > self.last_key.len() || suffix > self.last_key.len() {
                    return Err(Error::BadEncode(format!(
                        "field name prefix/suffix ({}, {}) longer than last key ({})",
                        prefix,
                        suffix,
                        self.last_key.len()
                    )));
                }
                let mut utf8 = Vec::with_capacity(prefix + length + suffix);
                utf8.extend_from_slice(&self.last_key[..prefix]);
                let mid = read_exact_vec(reader, length, "decode field name")?;
                utf8.extend_from_slice(&mid);
                utf8.extend_from_slice(&self.last_key[self.last_key.len() - suffix..]);
                self.admit(utf8)
            }
        }
    }

    fn admit(&mut self, utf8: Vec<u8>) -> Result<String> {
        self.last_key.clear();
        self.last_key.extend_from_slice(&utf8);
        let name = String::from_utf8(utf8)?;
        if self.names.len() < MAX_FIELD_NAMES {
            self.names.push(name.clone());
        }
        Ok(name)
    }
}

fn read_length<R: Read>(reader: &mut R, code: u8) -> Result<usize> {
    match code {
        0..=29 => Ok(code as usize),
        30 => {
            let b = reader
                .read_u8()
                .map_err(|e| Error::from_read("decode field name length", e))?;
            Ok(ONE_BYTE_BIAS + b as usize)
        }
        _ => {
            let b1 = reader
                .read_u8()
                .map_err(|e| Error::from_read("decode field name length", e))?;
            let b2 = reader
                .read_u8()
                .map_err(|e| Error::from_read("decode field name length", e))?;
            Ok(TWO_BYTE_BIAS + 256 * b1 as usize + b2 as usize)
        }
    }
}

fn read_exact_vec<R: Read>(reader: &mut R, length: usize, step: &'static str) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; length];
    reader
        .read_exact(&mut buf)
        .map_err(|e| Error::from_read(step, e))?;
    Ok(buf)
}

#[cfg(test)]
mod test {
    use super::*;

    fn roundtrip(keys: &[&str]) -> Vec<u8> {
        let mut writer = FieldNameWriter::new(&[]);
        let mut buf = Vec::new();
        for key in keys {
            writer.encode(&mut buf, key).unwrap();
        }
        let mut reader = FieldNameReader::new(&[]);
        let mut src = buf.as_slice();
        for key in keys {
            assert_eq!(reader.decode(&mut src).unwrap(), *key);
        }
        assert!(src.is_empty());
        buf
    }

    #[test]
    fn full_and_indexed() {
        let buf = roundtrip(&["a", "b", "a", "b", "a"]);
        // "a" and "b" are emitted in full once, then by index
        assert_eq!(buf, hex::decode("81618162a0a1a0").unwrap());
    }

    #[test]
    fn prefix_compression() {
        let buf = roundtrip(&["hello_world", "hello_music"]);
        // second key shares "hello_" (6 bytes) and has no usable suffix
        assert_eq!(
            buf,
            hex::decode(concat!(
                "8b68656c6c6f5f776f726c64", // full "hello_world"
                "c506",                     // prefix form: 5 new bytes after a 6-byte prefix
                "6d75736963"                // "music"
            ))
            .unwrap()
        );
    }

    #[test]
    fn prefix_suffix_compression() {
        let buf = roundtrip(&["aaa_suffix", "bbbb_suffix"]);
        // no shared prefix, 7-byte shared suffix "_suffix"
        assert_eq!(
            buf,
            hex::decode(concat!(
                "8a6161615f737566666978", // full "aaa_suffix"
                "e40007",                 // prefix+suffix form: 4 bytes kept, prefix 0, suffix 7
                "62626262"                // "bbbb"
            ))
            .unwrap()
        );
    }

    #[test]
    fn short_keys_always_full() {
        // keys of 4 bytes or fewer never use prefix/suffix forms
        let buf = roundtrip(&["abcd", "abce"]);
        assert_eq!(buf, hex::decode("84616263648461626365").unwrap());
    }

    #[test]
    fn length_boundaries() {
        for len in [29usize, 30, 284, 285, 1000] {
            let key: String = "k".repeat(len);
            roundtrip(&[&key]);
        }

        // the head-byte shapes at each range boundary
        let mut writer = FieldNameWriter::new(&[]);
        let mut buf = Vec::new();
        writer.encode(&mut buf, &"x".repeat(29)).unwrap();
        assert_eq!(buf[0], 0x80 | 29);

        let mut writer = FieldNameWriter::new(&[]);
        let mut buf = Vec::new();
        writer.encode(&mut buf, &"x".repeat(30)).unwrap();
        assert_eq!(&buf[..2], &[0x80 | 30, 1]);

        let mut writer = FieldNameWriter::new(&[]);
        let mut buf = Vec::new();
        writer.encode(&mut buf, &"x".repeat(285)).unwrap();
        assert_eq!(&buf[..3], &[0x80 | 31, 0, 1]);
    }

    #[test]
    fn name_too_long() {
        let mut writer = FieldNameWriter::new(&[]);
        let mut buf = Vec::new();
        let key = "x".repeat(MAX_FIELD_NAMES + 1);
        assert!(matches!(
            writer.encode(&mut buf, &key),
            Err(Error::LengthTooLong { .. })
        ));
    }

    #[test]
    fn initial_names_are_indexed() {
        let initial = vec!["hello".to_owned(), "world".to_owned()];
        let mut writer = FieldNameWriter::new(&initial);
        let mut buf = Vec::new();
        writer.encode(&mut buf, "world").unwrap();
        writer.encode(&mut buf, "hello").unwrap();
        assert_eq!(buf, vec![0xa1, 0xa0]);

        let mut reader = FieldNameReader::new(&initial);
        let mut src = buf.as_slice();
        assert_eq!(reader.decode(&mut src).unwrap(), "world");
        assert_eq!(reader.decode(&mut src).unwrap(), "hello");
    }

    #[test]
    fn bad_index_rejected() {
        let mut reader = FieldNameReader::new(&[]);
        let mut src = [0xa5u8].as_slice();
        assert!(matches!(
            reader.decode(&mut src),
            Err(Error::BadEncode(_))
        ));
    }

    #[test]
    fn bad_prefix_rejected() {
        // prefix form referring back past the (empty) last key
        let mut reader = FieldNameReader::new(&[]);
        let mut src = [0xc2u8, 0x05, b'a', b'b'].as_slice();
        assert!(matches!(
            reader.decode(&mut src),
            Err(Error::BadEncode(_))
        ));
    }

    #[test]
    fn truncated_name() {
        let mut reader = FieldNameReader::new(&[]);
        let mut src = [0x85u8, b'a', b'b'].as_slice();
        assert!(matches!(
            reader.decode(&mut src),
            Err(Error::TruncatedInput { .. })
        ));
    }

    #[test]
    fn writer_reader_stay_in_sync() {
        let keys = [
            "timestamp",
            "timestamp_ms",
            "user_name",
            "user_email",
            "timestamp",
            "user_email",
            "id",
            "user_id",
            "timestamp_ms",
        ];
        roundtrip(&keys);
    }
}
