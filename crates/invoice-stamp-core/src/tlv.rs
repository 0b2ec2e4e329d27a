//! Tag-length-value encoding of the scanner payload.
//!
//! Wire format per field: `tag (1 byte) || length (1 byte) || value`. The
//! whole concatenation is then base64 encoded.
//!
//! The length field is a single byte, so values longer than
//! [`MAX_VALUE_LEN`] are truncated to their first 255 bytes and written with
//! length 255. This is lossy by construction; consumers only ever see the
//! truncated bytes.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Largest value a single field can carry.
pub const MAX_VALUE_LEN: usize = 255;

/// One tagged value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlvField {
    /// Tag in 1..=255. The encoder writes whatever it is given.
    pub tag: u8,
    pub value: Bytes,
}

impl TlvField {
    pub fn new(tag: u8, value: impl Into<Bytes>) -> Self {
        Self {
            tag,
            value: value.into(),
        }
    }

    /// The value as it will appear on the wire.
    pub fn encoded_value(&self) -> &[u8] {
        &self.value[..self.value.len().min(MAX_VALUE_LEN)]
    }

    /// True if encoding will drop bytes from this value.
    pub fn is_truncated(&self) -> bool {
        self.value.len() > MAX_VALUE_LEN
    }
}

/// An ordered list of fields. Insertion order is wire order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlvPayload {
    fields: Vec<TlvField>,
}

impl TlvPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field.
    pub fn push(&mut self, tag: u8, value: impl Into<Bytes>) -> &mut Self {
        self.fields.push(TlvField::new(tag, value));
        self
    }

    /// Builder-style append.
    pub fn with(mut self, tag: u8, value: impl Into<Bytes>) -> Self {
        self.push(tag, value);
        self
    }

    pub fn fields(&self) -> &[TlvField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// First field with `tag`.
    pub fn get(&self, tag: u8) -> Option<&Bytes> {
        self.fields.iter().find(|f| f.tag == tag).map(|f| &f.value)
    }

    /// First field with `tag`, as UTF-8 text.
    pub fn get_str(&self, tag: u8) -> Option<&str> {
        self.get(tag).and_then(|v| std::str::from_utf8(v).ok())
    }

    /// The binary wire form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let capacity = self
            .fields
            .iter()
            .map(|f| 2 + f.encoded_value().len())
            .sum();
        let mut buf = Vec::with_capacity(capacity);
        for field in &self.fields {
            let value = field.encoded_value();
            buf.push(field.tag);
            // `encoded_value` never exceeds MAX_VALUE_LEN.
            buf.push(value.len() as u8);
            buf.extend_from_slice(value);
        }
        buf
    }

    /// The base64 text form.
    pub fn encode(&self) -> String {
        B64.encode(self.to_bytes())
    }

    /// Parse the binary wire form.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        let mut fields = Vec::new();
        let mut offset = 0;

        while offset < buf.len() {
            let remaining = buf.len() - offset;
            if remaining < 2 {
                return Err(CoreError::TruncatedPayload {
                    offset,
                    needed: 2,
                    remaining,
                });
            }

            let tag = buf[offset];
            let len = buf[offset + 1] as usize;
            let start = offset + 2;
            if len > buf.len() - start {
                return Err(CoreError::TruncatedPayload {
                    offset,
                    needed: 2 + len,
                    remaining,
                });
            }

            fields.push(TlvField::new(tag, Bytes::copy_from_slice(&buf[start..start + len])));
            offset = start + len;
        }

        Ok(Self { fields })
    }

    /// Parse the base64 text form.
    pub fn decode(encoded: &str) -> Result<Self> {
        let buf = B64
            .decode(encoded.trim())
            .map_err(|e| CoreError::InvalidEncoding(e.to_string()))?;
        Self::from_bytes(&buf)
    }
}

impl FromIterator<TlvField> for TlvPayload {
    fn from_iter<I: IntoIterator<Item = TlvField>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Encode fields in order to base64.
pub fn encode(fields: &[TlvField]) -> String {
    fields.iter().cloned().collect::<TlvPayload>().encode()
}

/// Decode base64 into fields, in wire order.
pub fn decode(encoded: &str) -> Result<Vec<TlvField>> {
    TlvPayload::decode(encoded).map(|p| p.fields)
}
