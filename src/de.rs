//! Deserialization.
//!
//! A serde [`Deserializer`] over any [`Decoder`]. The format is
//! self-describing, so almost everything routes through `deserialize_any`;
//! known-length and end-sentinel containers both map onto serde's seq/map
//! access with the element count as the size hint when present.

use std::io::Read;

use serde::de::*;
use serde::Deserializer as _;

use crate::decode::{Decoder, DecoderOptions, Element};
use crate::error::{Error, Result};
use crate::integer::{get_int_internal, IntPriv};
use crate::marker::Marker;

/// Deserialize any `T: DeserializeOwned` from an in-memory document.
pub fn from_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    from_reader(data)
}

/// Deserialize any `T: DeserializeOwned` from a byte source.
pub fn from_reader<R: Read, T: DeserializeOwned>(reader: R) -> Result<T> {
    let mut de = Deserializer::new(Decoder::new(reader));
    T::deserialize(&mut de)
}

/// A serde deserializer reading through a [`Decoder`]. Build the decoder with
/// [`DecoderOptions`] to pre-seed field names.
pub struct Deserializer<R: Read> {
    dec: Decoder<R>,
}

impl<R: Read> Deserializer<R> {
    pub fn new(dec: Decoder<R>) -> Self {
        Self { dec }
    }

    pub fn with_options(reader: R, options: DecoderOptions) -> Self {
        Self::new(Decoder::with_options(reader, options))
    }
}

impl<'de, 'a, R: Read> serde::Deserializer<'de> for &'a mut Deserializer<R> {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.dec.next_element()? {
            Element::Null => visitor.visit_unit(),
            Element::Bool(v) => visitor.visit_bool(v),
            Element::Int(ref v) => match get_int_internal(v) {
                IntPriv::PosInt(v) => visitor.visit_u64(v),
                IntPriv::NegInt(v) => visitor.visit_i64(v),
            },
            Element::F64(v) => visitor.visit_f64(v),
            Element::Str(v) => visitor.visit_string(v),
            Element::Bin(v) => visitor.visit_byte_buf(v),
            Element::Array(len) => visitor.visit_seq(SeqAccess::new(self, len)),
            Element::Object(len) => visitor.visit_map(MapAccess::new(self, len)),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        if self.dec.peek_marker()? == Marker::Null {
            self.dec.next_element()?;
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_enum(EnumAccess::new(self))
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 u8 u16 u32 u64 f32 f64 char str
        string bytes byte_buf unit unit_struct newtype_struct
        seq tuple tuple_struct map struct identifier ignored_any
    }
}

/// Deserializer for an already-decoded field name or variant name.
struct KeyDeserializer(String);

impl<'de> serde::Deserializer<'de> for KeyDeserializer {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_string(self.0)
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 u8 u16 u32 u64 f32 f64 char str
        string bytes byte_buf option unit unit_struct newtype_struct
        seq tuple tuple_struct map struct enum identifier ignored_any
    }
}

struct SeqAccess<'a, R: Read> {
    de: &'a mut Deserializer<R>,
    size_left: Option<usize>,
}

impl<'a, R: Read> SeqAccess<'a, R> {
    fn new(de: &'a mut Deserializer<R>, len: Option<usize>) -> Self {
        Self { de, size_left: len }
    }

    fn has_more(&mut self) -> Result<bool> {
        match self.size_left.as_mut() {
            Some(0) => Ok(false),
            Some(left) => {
                *left -= 1;
                Ok(true)
            }
            None => self.de.dec.container_has_more(),
        }
    }
}

impl<'a, 'de, R: Read> serde::de::SeqAccess<'de> for SeqAccess<'a, R> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: DeserializeSeed<'de>,
    {
        if self.has_more()? {
            Ok(Some(seed.deserialize(&mut *self.de)?))
        } else {
            Ok(None)
        }
    }

    fn size_hint(&self) -> Option<usize> {
        self.size_left
    }
}

struct MapAccess<'a, R: Read> {
    de: &'a mut Deserializer<R>,
    size_left: Option<usize>,
}

impl<'a, R: Read> MapAccess<'a, R> {
    fn new(de: &'a mut Deserializer<R>, len: Option<usize>) -> Self {
        Self { de, size_left: len }
    }

    fn has_more(&mut self) -> Result<bool> {
        match self.size_left.as_mut() {
            Some(0) => Ok(false),
            Some(left) => {
                *left -= 1;
                Ok(true)
            }
            None => self.de.dec.container_has_more(),
        }
    }
}

impl<'a, 'de, R: Read> serde::de::MapAccess<'de> for MapAccess<'a, R> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: DeserializeSeed<'de>,
    {
        if self.has_more()? {
            let key = self.de.dec.read_field_name()?;
            Ok(Some(seed.deserialize(KeyDeserializer(key))?))
        } else {
            Ok(None)
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
    where
        V: DeserializeSeed<'de>,
    {
        seed.deserialize(&mut *self.de)
    }

    fn size_hint(&self) -> Option<usize> {
        self.size_left
    }
}

struct EnumAccess<'a, R: Read> {
    de: &'a mut Deserializer<R>,
    has_value: bool,
}

impl<'a, R: Read> EnumAccess<'a, R> {
    fn new(de: &'a mut Deserializer<R>) -> Self {
        Self {
            de,
            has_value: false,
        }
    }
}

impl<'a, 'de, R: Read> serde::de::EnumAccess<'de> for EnumAccess<'a, R> {
    type Error = Error;
    type Variant = Self;

    fn variant_seed<V>(mut self, seed: V) -> Result<(V::Value, Self::Variant)>
    where
        V: DeserializeSeed<'de>,
    {
        let val = match self.de.dec.peek_marker()? {
            Marker::Object(_) => {
                match self.de.dec.next_element()? {
                    Element::Object(Some(1)) => (),
                    _ => {
                        return Err(Error::SerdeFail(
                            "expected a size-1 map or a string".to_string(),
                        ))
                    }
                }
                self.has_value = true;
                let variant = self.de.dec.read_field_name()?;
                seed.deserialize(KeyDeserializer(variant))?
            }
            Marker::String(_) | Marker::EnumRef8 | Marker::EnumRef16 | Marker::EnumConfig => {
                self.has_value = false;
                seed.deserialize(&mut *self.de)?
            }
            _ => {
                return Err(Error::SerdeFail(
                    "expected a size-1 map or a string".to_string(),
                ))
            }
        };
        Ok((val, self))
    }
}

impl<'a, 'de, R: Read> serde::de::VariantAccess<'de> for EnumAccess<'a, R> {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        if self.has_value {
            Err(Error::SerdeFail(
                "invalid type: non-unit variant, expected unit variant".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value>
    where
        T: DeserializeSeed<'de>,
    {
        if self.has_value {
            seed.deserialize(&mut *self.de)
        } else {
            Err(Error::SerdeFail(
                "invalid type: unit variant, expected newtype variant".to_string(),
            ))
        }
    }

    fn struct_variant<V>(self, _fields: &'static [&'static str], visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if self.has_value {
            self.de.deserialize_map(visitor)
        } else {
            Err(Error::SerdeFail(
                "invalid type: unit variant, expected struct variant".to_string(),
            ))
        }
    }

    fn tuple_variant<V>(self, len: usize, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if self.has_value {
            self.de.deserialize_tuple(len, visitor)
        } else {
            Err(Error::SerdeFail(
                "invalid type: unit variant, expected tuple variant".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ser::to_vec;
    use serde::{Deserialize, Serialize};

    fn roundtrip<T>(value: T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let data = to_vec(&value).unwrap();
        let back: T = from_slice(&data).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn scalars() {
        roundtrip(());
        roundtrip(true);
        roundtrip(false);
        roundtrip(0i64);
        roundtrip(24u8);
        roundtrip(-25i16);
        roundtrip(i64::MIN);
        roundtrip(u64::MAX);
        roundtrip(1.5f64);
        roundtrip(String::from("hello"));
        roundtrip(String::new());
        roundtrip('a');
    }

    #[test]
    fn options() {
        roundtrip(Some(42i32));
        roundtrip(None::<i32>);
        roundtrip(Some(String::from("x")));
        roundtrip(vec![Some(1i32), None, Some(3)]);
    }

    #[test]
    fn sequences_and_tuples() {
        roundtrip(Vec::<i32>::new());
        roundtrip(vec![1i32, 2, 3]);
        roundtrip((1u8, String::from("two"), 3.0f64));
        roundtrip(vec![vec![1u32], vec![], vec![2, 3]]);
    }

    #[test]
    fn maps() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(String::from("a"), 1i32);
        map.insert(String::from("b"), 2);
        roundtrip(map);
    }

    #[test]
    fn bytes() {
        roundtrip(serde_bytes::ByteBuf::from(vec![0u8, 1, 2, 0xff]));
        roundtrip(serde_bytes::ByteBuf::from(vec![0u8; 315]));
    }

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Record {
        id: u64,
        name: String,
        score: f64,
        active: bool,
        labels: Vec<String>,
        parent: Option<Box<Record>>,
    }

    #[test]
    fn structs() {
        roundtrip(Record {
            id: 17,
            name: "first".into(),
            score: 0.25,
            active: true,
            labels: vec!["a".into(), "b".into()],
            parent: Some(Box::new(Record {
                id: 18,
                name: "second".into(),
                score: -1.0,
                active: false,
                labels: vec![],
                parent: None,
            })),
        });
    }

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    enum Shape {
        Empty,
        Circle(f64),
        Segment(i32, i32),
        Rect { w: i32, h: i32 },
    }

    #[test]
    fn enums() {
        roundtrip(Shape::Empty);
        roundtrip(Shape::Circle(1.5));
        roundtrip(Shape::Segment(1, -1));
        roundtrip(Shape::Rect { w: 2, h: 3 });
        roundtrip(vec![Shape::Empty, Shape::Rect { w: 1, h: 1 }]);
    }

    #[test]
    fn sentinel_containers_deserialize() {
        // {"a": 1, "obj": null} in end-sentinel framing
        #[derive(Deserialize, PartialEq, Debug)]
        struct Doc {
            a: i32,
            obj: Option<i32>,
        }
        let data = hex::decode("3f816140836f626a0001").unwrap();
        let doc: Doc = from_slice(&data).unwrap();
        assert_eq!(doc, Doc { a: 1, obj: None });

        let data = hex::decode("2f4041420001").unwrap();
        let items: Vec<Option<i32>> = from_slice(&data).unwrap();
        assert_eq!(items, vec![Some(1), Some(2), Some(3), None]);
    }

    #[test]
    fn value_through_serde_matches_the_codec() {
        use crate::value::{Object, Value};

        let mut obj = Object::new();
        obj.insert("name".into(), Value::from("yajbe"));
        obj.insert("count".into(), Value::from(3));
        obj.insert("data".into(), Value::Bin(vec![1, 2, 3]));
        obj.insert(
            "nested".into(),
            [1, 2, 3].into_iter().collect::<Value>(),
        );
        let value = Value::Object(obj);

        let direct = crate::encode_to_vec(&value).unwrap();
        let through_serde = to_vec(&value).unwrap();
        assert_eq!(direct, through_serde);

        let back: Value = from_slice(&direct).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn trailing_state_is_not_required() {
        // unknown fields are skipped through ignored_any
        #[derive(Deserialize, PartialEq, Debug)]
        struct Thin {
            a: i32,
        }
        let data = hex::decode("3281614083626967c3616263").unwrap();
        let thin: Thin = from_slice(&data).unwrap();
        assert_eq!(thin, Thin { a: 1 });
    }
}
