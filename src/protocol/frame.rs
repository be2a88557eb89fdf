//! Wire envelope encoding and decoding.
//!
//! Every frame on the wire has the layout:
//!
//! ```text
//! offset 0                 2 bytes           header length (big-endian u16)
//! offset 2                 header length     JSON object, always UTF-8
//! offset 2 + header length content length    content bytes
//! ```
//!
//! The header is a JSON object with exactly three keys: `content_type`,
//! `content_encoding` and `content_length`. The content type selects how the
//! content bytes are interpreted, see [`Content`].
//!
//! # Example
//! ```rust
//! use kino::protocol::{Content, ContentType, frame};
//!
//! let bytes = frame::encode(&ContentType::Text, "utf-8", &Content::Text("actor, Uma Thurman".into())).unwrap();
//! let header_len = frame::decode_header_len(&bytes[..2]).unwrap() as usize;
//! let header = frame::decode_header(&bytes[2..2 + header_len]).unwrap();
//!
//! assert_eq!(header.content_length, 18);
//! let content = frame::decode_content(&header, &bytes[2 + header_len..]).unwrap();
//! assert_eq!(content, Content::Text("actor, Uma Thurman".into()));
//! ```
use std::{
    fmt,
    io::{self, Write},
    str::FromStr,
};

use bincode::config::{BigEndian, Configuration, Fixint};
use serde::{Deserialize, Serialize};
use serde_json::{Value, ser::Formatter};
use thiserror::Error;

/// Size of the header length prefix.
pub const HEADER_LEN_SIZE: usize = size_of::<u16>();

/// Upper bound for a declared content length (100 MiB).
pub const MAX_CONTENT_LENGTH: usize = 100 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("wrong encoding '{0}', available encodings: utf-8, ascii")]
    UnsupportedEncoding(String),

    #[error("content of kind '{content}' does not match content type '{content_type}'")]
    ContentMismatch {
        content_type: String,
        content: &'static str,
    },

    #[error("text content can not be encoded as ascii")]
    NotAscii,

    #[error("content is not valid {encoding}")]
    InvalidText { encoding: Encoding },

    #[error("header length must be greater than 0")]
    EmptyHeader,

    #[error("header of {0} bytes does not fit the length prefix")]
    HeaderTooLarge(usize),

    #[error("declared content length {0} exceeds maximum of {max} bytes", max = MAX_CONTENT_LENGTH)]
    ContentTooLarge(usize),

    #[error("malformed header: {0}")]
    MalformedHeader(#[source] serde_json::Error),

    #[error("malformed json content: {0}")]
    MalformedContent(#[source] serde_json::Error),

    #[error("failed to encode header length: {0}")]
    EncodeHeaderLength(#[from] bincode::error::EncodeError),

    #[error("failed to decode header length: {0}")]
    DecodeHeaderLength(#[from] bincode::error::DecodeError),

    #[error("unknown content type '{0}', expected one of: text, json, binary")]
    UnknownContentType(String),
}

/// Tag selecting how content bytes are interpreted.
///
/// Tags outside of the known set survive decoding as [`ContentType::Other`]
/// so that a well framed message with an unexpected tag can still be
/// represented instead of rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ContentType {
    Text,
    Json,
    Binary,
    Other(String),
}

impl ContentType {
    pub fn as_str(&self) -> &str {
        match self {
            ContentType::Text => "text",
            ContentType::Json => "json",
            ContentType::Binary => "binary",
            ContentType::Other(tag) => tag,
        }
    }
}

impl From<String> for ContentType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "text" => ContentType::Text,
            "json" => ContentType::Json,
            "binary" => ContentType::Binary,
            _ => ContentType::Other(value),
        }
    }
}

impl From<ContentType> for String {
    fn from(value: ContentType) -> Self {
        match value {
            ContentType::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

/// Strict parsing used for user supplied content types.
impl FromStr for ContentType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match ContentType::from(s.to_string()) {
            ContentType::Other(tag) => Err(ValidationError::UnknownContentType(tag)),
            known => Ok(known),
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Byte encodings accepted for `text` and `json` content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Ascii,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Ascii => "ascii",
        }
    }

    pub fn encode(&self, text: &str) -> Result<Vec<u8>, ValidationError> {
        if *self == Encoding::Ascii && !text.is_ascii() {
            return Err(ValidationError::NotAscii);
        }
        Ok(text.as_bytes().to_vec())
    }

    /// Serialize a JSON value. Under `ascii`, non-ASCII characters in strings
    /// are escaped as `\uXXXX` so any value can be sent.
    pub fn encode_json(&self, value: &Value) -> Result<Vec<u8>, ValidationError> {
        match self {
            Encoding::Utf8 => serde_json::to_vec(value).map_err(ValidationError::MalformedContent),
            Encoding::Ascii => {
                let mut bytes = Vec::new();
                let mut serializer = serde_json::Serializer::with_formatter(&mut bytes, AsciiFormatter);
                value
                    .serialize(&mut serializer)
                    .map_err(ValidationError::MalformedContent)?;
                Ok(bytes)
            }
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<String, ValidationError> {
        if *self == Encoding::Ascii && !bytes.is_ascii() {
            return Err(ValidationError::InvalidText { encoding: *self });
        }
        String::from_utf8(bytes.to_vec())
            .map_err(|_| ValidationError::InvalidText { encoding: *self })
    }
}

/// Compact JSON formatter that escapes every non-ASCII character, using
/// surrogate pairs outside of the basic multilingual plane.
struct AsciiFormatter;

impl Formatter for AsciiFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        let mut start = 0;
        for (i, c) in fragment.char_indices().filter(|(_, c)| !c.is_ascii()) {
            writer.write_all(&fragment.as_bytes()[start..i])?;
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units).iter() {
                write!(writer, "\\u{unit:04x}")?;
            }
            start = i + c.len_utf8();
        }
        writer.write_all(&fragment.as_bytes()[start..])
    }
}

impl FromStr for Encoding {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "utf-8" => Ok(Encoding::Utf8),
            "ascii" => Ok(Encoding::Ascii),
            other => Err(ValidationError::UnsupportedEncoding(other.to_string())),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata describing the content that follows it on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub content_type: ContentType,
    pub content_encoding: String,
    pub content_length: usize,
}

/// Decoded message content, one variant per content type.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Text(String),
    Json(Value),
    Binary(Vec<u8>),
    /// Content announced with a content type outside of the known set. Holds
    /// the announced tag; the bytes themselves are not interpreted.
    Unknown(String),
}

impl Content {
    /// Diagnostic message carried by [`Content::Unknown`].
    pub const UNKNOWN: &'static str = "Unknown received content type.";

    pub fn kind(&self) -> &'static str {
        match self {
            Content::Text(_) => "text",
            Content::Json(_) => "json",
            Content::Binary(_) => "binary",
            Content::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Content::Text(text) => f.write_str(text),
            Content::Json(value) => write!(f, "{value:#}"),
            Content::Binary(bytes) => write!(f, "<{} bytes>", bytes.len()),
            Content::Unknown(_) => f.write_str(Content::UNKNOWN),
        }
    }
}

fn wire_config() -> Configuration<BigEndian, Fixint> {
    bincode::config::standard()
        .with_big_endian()
        .with_fixed_int_encoding()
}

/// Serialize `content` into a complete frame.
///
/// Fails without producing any bytes when `encoding` is not supported or when
/// the shape of `content` does not match `content_type`.
pub fn encode(
    content_type: &ContentType,
    encoding: &str,
    content: &Content,
) -> Result<Vec<u8>, ValidationError> {
    let encoding: Encoding = encoding.parse()?;

    let body = match (content_type, content) {
        (ContentType::Text, Content::Text(text)) => encoding.encode(text)?,
        (ContentType::Json, Content::Json(value)) => encoding.encode_json(value)?,
        (ContentType::Binary, Content::Binary(bytes)) => bytes.clone(),
        _ => {
            return Err(ValidationError::ContentMismatch {
                content_type: content_type.to_string(),
                content: content.kind(),
            });
        }
    };

    let header = Header {
        content_type: content_type.clone(),
        content_encoding: encoding.to_string(),
        content_length: body.len(),
    };
    let header = serde_json::to_vec(&header).map_err(ValidationError::MalformedHeader)?;
    let header_len =
        u16::try_from(header.len()).map_err(|_| ValidationError::HeaderTooLarge(header.len()))?;

    let mut frame = encode_header_len(header_len)?;
    frame.reserve(header.len() + body.len());
    frame.extend_from_slice(&header);
    frame.extend_from_slice(&body);
    Ok(frame)
}

pub fn encode_header_len(len: u16) -> Result<Vec<u8>, ValidationError> {
    Ok(bincode::encode_to_vec(len, wire_config())?)
}

pub fn decode_header_len(bytes: &[u8]) -> Result<u16, ValidationError> {
    let (len, _) = bincode::decode_from_slice::<u16, _>(bytes, wire_config())?;
    Ok(len)
}

pub fn decode_header(bytes: &[u8]) -> Result<Header, ValidationError> {
    let header: Header =
        serde_json::from_slice(bytes).map_err(ValidationError::MalformedHeader)?;
    if header.content_length > MAX_CONTENT_LENGTH {
        return Err(ValidationError::ContentTooLarge(header.content_length));
    }
    Ok(header)
}

/// Interpret `bytes` according to the header's content type.
///
/// An unknown content type is not an error at this layer, it decodes to
/// [`Content::Unknown`].
pub fn decode_content(header: &Header, bytes: &[u8]) -> Result<Content, ValidationError> {
    match &header.content_type {
        ContentType::Text => {
            let encoding: Encoding = header.content_encoding.parse()?;
            Ok(Content::Text(encoding.decode(bytes)?))
        }
        ContentType::Json => {
            let encoding: Encoding = header.content_encoding.parse()?;
            let text = encoding.decode(bytes)?;
            let value = serde_json::from_str(&text).map_err(ValidationError::MalformedContent)?;
            Ok(Content::Json(value))
        }
        ContentType::Binary => Ok(Content::Binary(bytes.to_vec())),
        ContentType::Other(tag) => Ok(Content::Unknown(tag.clone())),
    }
}
