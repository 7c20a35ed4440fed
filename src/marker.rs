/// Head byte markers for encoded values. For internal use only.
///
/// Variants carrying a `u8` hold the low "code" bits of the head: a 6-bit
/// length code for strings and bytes, a 5-bit integer code, and a 4-bit length
/// code for arrays and objects (`0b1111` selects the end-sentinel framing).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Marker {
    Null,
    EndOfContainer,
    False,
    True,
    Float16,
    Float32,
    Float64,
    BigDecimal,
    EnumConfig,
    EnumRef8,
    EnumRef16,
    Reserved(u8),
    Array(u8),
    Object(u8),
    PosInt(u8),
    NegInt(u8),
    Bytes(u8),
    String(u8),
}

impl Marker {
    /// Classify a single head byte.
    pub fn from_u8(n: u8) -> Marker {
        match n {
            0x00 => Marker::Null,
            0x01 => Marker::EndOfContainer,
            0x02 => Marker::False,
            0x03 => Marker::True,
            0x04 => Marker::Float16,
            0x05 => Marker::Float32,
            0x06 => Marker::Float64,
            0x07 => Marker::BigDecimal,
            0x08 => Marker::EnumConfig,
            0x09 => Marker::EnumRef8,
            0x0a => Marker::EnumRef16,
            0x0b..=0x1f => Marker::Reserved(n),
            0x20..=0x2f => Marker::Array(n & 0x0f),
            0x30..=0x3f => Marker::Object(n & 0x0f),
            0x40..=0x5f => Marker::PosInt(n & 0x1f),
            0x60..=0x7f => Marker::NegInt(n & 0x1f),
            0x80..=0xbf => Marker::Bytes(n & 0x3f),
            0xc0..=0xff => Marker::String(n & 0x3f),
        }
    }

    /// Converts a marker into its single-byte representation.
    /// Assumes the code bits are already masked appropriately.
    pub fn into_u8(self) -> u8 {
        match self {
            Marker::Null => 0x00,
            Marker::EndOfContainer => 0x01,
            Marker::False => 0x02,
            Marker::True => 0x03,
            Marker::Float16 => 0x04,
            Marker::Float32 => 0x05,
            Marker::Float64 => 0x06,
            Marker::BigDecimal => 0x07,
            Marker::EnumConfig => 0x08,
            Marker::EnumRef8 => 0x09,
            Marker::EnumRef16 => 0x0a,
            Marker::Reserved(n) => n,
            Marker::Array(code) => 0x20 | code,
            Marker::Object(code) => 0x30 | code,
            Marker::PosInt(code) => 0x40 | code,
            Marker::NegInt(code) => 0x60 | code,
            Marker::Bytes(code) => 0x80 | code,
            Marker::String(code) => 0xc0 | code,
        }
    }
}

impl From<u8> for Marker {
    fn from(val: u8) -> Marker {
        Marker::from_u8(val)
    }
}

impl From<Marker> for u8 {
    fn from(val: Marker) -> u8 {
        val.into_u8()
    }
}

/// Head byte markers for field names inside objects. Field-name heads use the
/// top three bits for the variant and the low five bits for the length code of
/// the three-range sub-encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldMarker {
    Full(u8),
    Indexed(u8),
    Prefix(u8),
    PrefixSuffix(u8),
}

impl FieldMarker {
    /// Classify a field-name head byte. Returns `None` for bytes that aren't
    /// field-name heads (top bit clear).
    pub fn from_u8(n: u8) -> Option<FieldMarker> {
        let code = n & 0b000_11111;
        match n >> 5 {
            0b100 => Some(FieldMarker::Full(code)),
            0b101 => Some(FieldMarker::Indexed(code)),
            0b110 => Some(FieldMarker::Prefix(code)),
            0b111 => Some(FieldMarker::PrefixSuffix(code)),
            _ => None,
        }
    }

    /// Converts a field marker into its single-byte representation.
    /// Assumes the length code is already masked appropriately.
    pub fn into_u8(self) -> u8 {
        match self {
            FieldMarker::Full(code) => 0b100_00000 | code,
            FieldMarker::Indexed(code) => 0b101_00000 | code,
            FieldMarker::Prefix(code) => 0b110_00000 | code,
            FieldMarker::PrefixSuffix(code) => 0b111_00000 | code,
        }
    }
}

impl From<FieldMarker> for u8 {
    fn from(val: FieldMarker) -> u8 {
        val.into_u8()
    }
}
