//! CBOR encoder for dynamic values.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// Encode a value to CBOR bytes.
///
/// Integers use the shortest encoding, floats are always written as
/// doubles and map entries keep their order, so a record decoded with
/// [`from_cbor`](crate::from_cbor) re-encodes field-for-field.
///
/// # Errors
///
/// Returns an error if an integer lies outside the CBOR range.
pub fn to_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    let mut encoder = ValueEncoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

/// A CBOR encoder for [`Value`]s.
pub struct ValueEncoder {
    buffer: Vec<u8>,
}

impl ValueEncoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Encode a value.
    pub fn encode(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::Null => self.buffer.push(0xf6),
            Value::Bool(b) => self.buffer.push(if *b { 0xf5 } else { 0xf4 }),
            Value::Integer(n) => self.encode_integer(*n)?,
            Value::Float(x) => {
                self.buffer.push(0xfb);
                self.buffer.extend_from_slice(&x.to_be_bytes());
            }
            Value::Bytes(b) => {
                self.encode_head(2, b.len() as u64);
                self.buffer.extend_from_slice(b);
            }
            Value::Text(s) => {
                self.encode_head(3, s.len() as u64);
                self.buffer.extend_from_slice(s.as_bytes());
            }
            Value::Array(items) => {
                self.encode_head(4, items.len() as u64);
                for item in items {
                    self.encode(item)?;
                }
            }
            Value::Map(pairs) => {
                self.encode_head(5, pairs.len() as u64);
                for (key, value) in pairs {
                    self.encode(key)?;
                    self.encode(value)?;
                }
            }
        }
        Ok(())
    }

    /// Consume this encoder and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    fn encode_integer(&mut self, n: i128) -> CodecResult<()> {
        if n >= 0 {
            let arg = u64::try_from(n).map_err(|_| CodecError::IntegerOverflow)?;
            self.encode_head(0, arg);
        } else {
            // CBOR negative integers carry -(n + 1).
            let arg = u64::try_from(-(n + 1)).map_err(|_| CodecError::IntegerOverflow)?;
            self.encode_head(1, arg);
        }
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn encode_head(&mut self, major_type: u8, value: u64) {
        let mt = major_type << 5;

        if value < 24 {
            self.buffer.push(mt | (value as u8));
        } else if u8::try_from(value).is_ok() {
            self.buffer.push(mt | 24);
            self.buffer.push(value as u8);
        } else if u16::try_from(value).is_ok() {
            self.buffer.push(mt | 25);
            self.buffer.extend_from_slice(&(value as u16).to_be_bytes());
        } else if u32::try_from(value).is_ok() {
            self.buffer.push(mt | 26);
            self.buffer.extend_from_slice(&(value as u32).to_be_bytes());
        } else {
            self.buffer.push(mt | 27);
            self.buffer.extend_from_slice(&value.to_be_bytes());
        }
    }
}

impl Default for ValueEncoder {
    fn default() -> Self {
        Self::new()
    }
}
