//! Serialization.
//!
//! A serde [`Serializer`] over any [`Encoder`], so arbitrary Rust types map
//! onto the wire format: struct fields and map keys go through the field-name
//! dictionary, and sequences or maps of unknown length fall back to the
//! end-sentinel container framing.
//!
//! Enum variants, when mapped, are:
//! - Unit - Just the variant name as a string
//! - Newtype - Map with one pair. Key is variant name, content is the value
//! - Tuple - Map with one pair. Key is variant name, content is the tuple as an array
//! - Struct - Map with one pair. Key is variant name, content is the struct

use std::io::Write;

use serde::ser::*;

use crate::encode::Encoder;
use crate::error::{Error, Result};

/// Serialize any `T: Serialize` to an in-memory document.
pub fn to_vec<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut ser = Serializer::new(Encoder::new(Vec::new()));
    value.serialize(&mut ser)?;
    Ok(ser.into_encoder().into_writer())
}

/// Serialize any `T: Serialize` to a byte sink.
pub fn to_writer<W: Write, T: Serialize + ?Sized>(writer: W, value: &T) -> Result<()> {
    let mut ser = Serializer::new(Encoder::new(writer));
    value.serialize(&mut ser)
}

/// A serde serializer writing through an [`Encoder`]. Build the encoder with
/// options to pre-seed field names or turn on the enum dictionary.
pub struct Serializer<W: Write> {
    enc: Encoder<W>,
}

impl<W: Write> Serializer<W> {
    pub fn new(enc: Encoder<W>) -> Self {
        Self { enc }
    }

    pub fn into_encoder(self) -> Encoder<W> {
        self.enc
    }
}

impl<'a, W: Write> serde::Serializer for &'a mut Serializer<W> {
    type Ok = ();
    type Error = Error;
    type SerializeSeq = SeqSerializer<'a, W>;
    type SerializeTuple = SeqSerializer<'a, W>;
    type SerializeTupleStruct = SeqSerializer<'a, W>;
    type SerializeTupleVariant = SeqSerializer<'a, W>;
    type SerializeMap = MapSerializer<'a, W>;
    type SerializeStruct = StructSerializer<'a, W>;
    type SerializeStructVariant = StructSerializer<'a, W>;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn serialize_bool(self, v: bool) -> Result<()> {
        self.enc.encode_bool(v)
    }

    fn serialize_i8(self, v: i8) -> Result<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        self.enc.encode_i64(v)
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        self.enc.encode_u64(v)
    }

    fn serialize_f32(self, v: f32) -> Result<()> {
        // the encoder only emits the 8-byte float form
        self.enc.encode_f64(v as f64)
    }

    fn serialize_f64(self, v: f64) -> Result<()> {
        self.enc.encode_f64(v)
    }

    fn serialize_char(self, v: char) -> Result<()> {
        self.enc.encode_str(v.encode_utf8(&mut [0u8; 4]))
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        self.enc.encode_str(v)
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<()> {
        self.enc.encode_bytes(v)
    }

    fn serialize_none(self) -> Result<()> {
        self.serialize_unit()
    }

    fn serialize_some<T: Serialize + ?Sized>(self, v: &T) -> Result<()> {
        v.serialize(self)
    }

    fn serialize_unit(self) -> Result<()> {
        self.enc.encode_null()
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        self.serialize_unit()
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<()> {
        self.serialize_str(variant)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        v: &T,
    ) -> Result<()> {
        v.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<()> {
        self.enc.encode_object_start(Some(1))?;
        self.enc.encode_field_name(variant)?;
        value.serialize(self)
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq> {
        self.enc.encode_array_start(len)?;
        Ok(SeqSerializer {
            needs_end: len.is_none(),
            ser: self,
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        // Tuple structs usually just discard the name
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        self.enc.encode_object_start(Some(1))?;
        self.enc.encode_field_name(variant)?;
        self.serialize_seq(Some(len))
    }

    fn serialize_map(self, len: Option<usize>) -> Result<Self::SerializeMap> {
        self.enc.encode_object_start(len)?;
        Ok(MapSerializer {
            needs_end: len.is_none(),
            ser: self,
        })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<Self::SerializeStruct> {
        self.enc.encode_object_start(Some(len))?;
        Ok(StructSerializer { ser: self })
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        self.enc.encode_object_start(Some(1))?;
        self.enc.encode_field_name(variant)?;
        self.enc.encode_object_start(Some(len))?;
        Ok(StructSerializer { ser: self })
    }
}

pub struct SeqSerializer<'a, W: Write> {
    ser: &'a mut Serializer<W>,
    needs_end: bool,
}

impl<'a, W: Write> SerializeSeq for SeqSerializer<'a, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<()> {
        if self.needs_end {
            self.ser.enc.encode_container_end()?;
        }
        Ok(())
    }
}

impl<'a, W: Write> SerializeTuple for SeqSerializer<'a, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<()> {
        SerializeSeq::end(self)
    }
}

impl<'a, W: Write> SerializeTupleStruct for SeqSerializer<'a, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<()> {
        SerializeSeq::end(self)
    }
}

impl<'a, W: Write> SerializeTupleVariant for SeqSerializer<'a, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<()> {
        SerializeSeq::end(self)
    }
}

pub struct MapSerializer<'a, W: Write> {
    ser: &'a mut Serializer<W>,
    needs_end: bool,
}

impl<'a, W: Write> SerializeMap for MapSerializer<'a, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<()> {
        key.serialize(FieldNameSerializer {
            enc: &mut self.ser.enc,
        })
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<()> {
        if self.needs_end {
            self.ser.enc.encode_container_end()?;
        }
        Ok(())
    }
}

pub struct StructSerializer<'a, W: Write> {
    ser: &'a mut Serializer<W>,
}

impl<'a, W: Write> SerializeStruct for StructSerializer<'a, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<()> {
        self.ser.enc.encode_field_name(key)?;
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl<'a, W: Write> SerializeStructVariant for StructSerializer<'a, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<()> {
        SerializeStruct::serialize_field(self, key, value)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

/// Object keys must be strings; anything else is refused here.
struct FieldNameSerializer<'a, W: Write> {
    enc: &'a mut Encoder<W>,
}

impl<'a, W: Write> FieldNameSerializer<'a, W> {
    fn bad_key<T>(&self) -> Result<T> {
        Err(Error::SerdeFail("object keys must be strings".to_string()))
    }
}

impl<'a, W: Write> serde::Serializer for FieldNameSerializer<'a, W> {
    type Ok = ();
    type Error = Error;
    type SerializeSeq = Impossible<(), Error>;
    type SerializeTuple = Impossible<(), Error>;
    type SerializeTupleStruct = Impossible<(), Error>;
    type SerializeTupleVariant = Impossible<(), Error>;
    type SerializeMap = Impossible<(), Error>;
    type SerializeStruct = Impossible<(), Error>;
    type SerializeStructVariant = Impossible<(), Error>;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        self.enc.encode_field_name(v)
    }

    fn serialize_char(self, v: char) -> Result<()> {
        self.enc.encode_field_name(v.encode_utf8(&mut [0u8; 4]))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<()> {
        self.enc.encode_field_name(variant)
    }

    fn serialize_bool(self, _v: bool) -> Result<()> {
        self.bad_key()
    }

    fn serialize_i8(self, _v: i8) -> Result<()> {
        self.bad_key()
    }

    fn serialize_i16(self, _v: i16) -> Result<()> {
        self.bad_key()
    }

    fn serialize_i32(self, _v: i32) -> Result<()> {
        self.bad_key()
    }

    fn serialize_i64(self, _v: i64) -> Result<()> {
        self.bad_key()
    }

    fn serialize_u8(self, _v: u8) -> Result<()> {
        self.bad_key()
    }

    fn serialize_u16(self, _v: u16) -> Result<()> {
        self.bad_key()
    }

    fn serialize_u32(self, _v: u32) -> Result<()> {
        self.bad_key()
    }

    fn serialize_u64(self, _v: u64) -> Result<()> {
        self.bad_key()
    }

    fn serialize_f32(self, _v: f32) -> Result<()> {
        self.bad_key()
    }

    fn serialize_f64(self, _v: f64) -> Result<()> {
        self.bad_key()
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<()> {
        self.bad_key()
    }

    fn serialize_none(self) -> Result<()> {
        self.bad_key()
    }

    fn serialize_some<T: Serialize + ?Sized>(self, _v: &T) -> Result<()> {
        self.bad_key()
    }

    fn serialize_unit(self) -> Result<()> {
        self.bad_key()
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        self.bad_key()
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        v: &T,
    ) -> Result<()> {
        v.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<()> {
        self.bad_key()
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        self.bad_key()
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        self.bad_key()
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        self.bad_key()
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        self.bad_key()
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        self.bad_key()
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct> {
        self.bad_key()
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        self.bad_key()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn structs_as_objects() {
        let data = to_vec(&Point { x: 1, y: -1 }).unwrap();
        assert_eq!(hex::encode(data), "32817840817961");
    }

    #[test]
    fn repeated_struct_fields_use_the_dictionary() {
        let points = vec![Point { x: 1, y: 2 }, Point { x: 3, y: 4 }];
        let data = to_vec(&points).unwrap();
        // second point's keys are indexed references
        assert_eq!(hex::encode(data), "223281784081794132a042a143");
    }

    #[test]
    fn scalars() {
        assert_eq!(hex::encode(to_vec(&()).unwrap()), "00");
        assert_eq!(hex::encode(to_vec(&true).unwrap()), "03");
        assert_eq!(hex::encode(to_vec(&1u8).unwrap()), "40");
        assert_eq!(hex::encode(to_vec(&-25i64).unwrap()), "7801");
        assert_eq!(hex::encode(to_vec(&1.5f64).unwrap()), "06000000000000f83f");
        assert_eq!(hex::encode(to_vec(&1.5f32).unwrap()), "06000000000000f83f");
        assert_eq!(hex::encode(to_vec("abc").unwrap()), "c3616263");
        assert_eq!(hex::encode(to_vec(&'a').unwrap()), "c161");
        assert_eq!(
            hex::encode(to_vec(serde_bytes::Bytes::new(&[0, 0, 0])).unwrap()),
            "83000000"
        );
    }

    #[test]
    fn options() {
        assert_eq!(hex::encode(to_vec(&None::<i32>).unwrap()), "00");
        assert_eq!(hex::encode(to_vec(&Some(7)).unwrap()), "46");
    }

    #[test]
    fn unknown_length_sequences_use_sentinel_framing() {
        struct Stream;
        impl Serialize for Stream {
            fn serialize<S: serde::Serializer>(
                &self,
                serializer: S,
            ) -> Result<S::Ok, S::Error> {
                use serde::ser::SerializeSeq;
                let mut seq = serializer.serialize_seq(None)?;
                seq.serialize_element(&1)?;
                seq.serialize_element(&2)?;
                seq.end()
            }
        }
        assert_eq!(hex::encode(to_vec(&Stream).unwrap()), "2f404101");
    }

    #[test]
    fn enum_variants() {
        #[derive(Serialize)]
        enum Shape {
            Empty,
            Circle(f64),
            Segment(i32, i32),
            Rect { w: i32, h: i32 },
        }

        assert_eq!(hex::encode(to_vec(&Shape::Empty).unwrap()), "c5456d707479");
        assert_eq!(
            hex::encode(to_vec(&Shape::Circle(1.5)).unwrap()),
            "3186436972636c6506000000000000f83f"
        );
        assert_eq!(
            hex::encode(to_vec(&Shape::Segment(1, -1)).unwrap()),
            "31875365676d656e74224061"
        );
        assert_eq!(
            hex::encode(to_vec(&Shape::Rect { w: 2, h: 3 }).unwrap()),
            "31845265637432817741816842"
        );
    }

    #[test]
    fn non_string_keys_are_refused() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(1, "one");
        assert!(matches!(to_vec(&map), Err(Error::SerdeFail(_))));
    }
}
