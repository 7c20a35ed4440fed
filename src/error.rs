//! Library error types.

use std::fmt;

use serde::{de, ser};

/// A yajbe Result, normally returning a yajbe [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A yajbe error. Encompasses any issue that can happen while encoding or
/// decoding a document.
#[derive(Debug)]
pub enum Error {
    /// A read ran past the end of the input source.
    TruncatedInput {
        /// What step of the decoding we were on when the input ran out.
        step: &'static str,
    },
    /// The underlying sink or source failed with something other than EOF.
    Io(std::io::Error),
    /// A head byte matched none of the known encodings.
    UnknownHead(u8),
    /// A head byte named an encoding that is reserved and not implemented
    /// (float16, var-float, bigdecimal).
    ReservedEncoding(&'static str),
    /// A dictionary index or length went past its hard maximum.
    LengthTooLong {
        /// The maximum allowed value
        max: usize,
        /// The actual value
        actual: usize,
    },
    /// Basic data encoding failure: a reference that doesn't resolve, a
    /// misplaced marker, or any other malformed stream.
    BadEncode(String),
    /// The enum-config marker carried an unrecognized parameter byte.
    InvalidEnumConfig(u8),
    /// A string or field name was not valid UTF-8.
    InvalidUtf8(std::string::FromUtf8Error),
    /// Nesting depth hit the parsing limit.
    ParseLimit(String),
    /// Occurs when serde serialization or deserialization fails.
    SerdeFail(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::TruncatedInput { step } => {
                write!(f, "Input ended too early on step [{}]", step)
            }
            Error::Io(ref err) => write!(f, "I/O failure: {}", err),
            Error::UnknownHead(head) => write!(f, "Unknown head byte 0x{:02x}", head),
            Error::ReservedEncoding(kind) => {
                write!(f, "Reserved encoding not supported: {}", kind)
            }
            Error::LengthTooLong { max, actual } => write!(
                f,
                "Length or index too large: was {}, maximum allowed is {}",
                actual, max
            ),
            Error::BadEncode(ref err) => write!(f, "Basic data encoding failure: {}", err),
            Error::InvalidEnumConfig(param) => {
                write!(f, "Unrecognized enum config parameter 0x{:02x}", param)
            }
            Error::InvalidUtf8(ref err) => write!(f, "Invalid UTF-8 in string data: {}", err),
            Error::ParseLimit(ref err) => write!(f, "Hit parsing limit: {}", err),
            Error::SerdeFail(ref msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            Error::InvalidUtf8(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(e: std::string::FromUtf8Error) -> Self {
        Self::InvalidUtf8(e)
    }
}

impl Error {
    /// Classify an I/O failure from a read, tagging EOF with the decode step
    /// that hit it.
    pub(crate) fn from_read(step: &'static str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::TruncatedInput { step }
        } else {
            Error::Io(err)
        }
    }
}

impl ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::SerdeFail(msg.to_string())
    }
}

impl de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::SerdeFail(msg.to_string())
    }
}
