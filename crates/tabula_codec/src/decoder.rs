//! Type-agnostic CBOR decoder.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// Decode a value from CBOR bytes.
///
/// The whole input must be consumed by a single top-level item.
///
/// # Errors
///
/// Returns an error if the bytes are not well-formed CBOR.
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Value> {
    let mut decoder = ValueDecoder::new(bytes);
    let value = decoder.decode()?;
    if !decoder.is_empty() {
        return Err(CodecError::TrailingBytes {
            count: decoder.remaining().len(),
        });
    }
    Ok(value)
}

/// A lenient CBOR decoder producing [`Value`]s.
///
/// Unlike a canonical decoder it accepts whatever a serde serializer may
/// emit: non-shortest integers, floats of every width, tags (which are
/// dropped) and indefinite-length strings, arrays and maps.
pub struct ValueDecoder<'a> {
    data: &'a [u8],
    pos: usize,
}

/// Maximum allowed element count for arrays and maps.
/// Guards against allocation blowups from corrupt length prefixes.
const MAX_CONTAINER_ELEMENTS: u64 = 16 * 1024 * 1024;

/// Maximum allowed byte/string length.
const MAX_BYTES_LENGTH: u64 = 256 * 1024 * 1024;

/// CBOR "break" stop code terminating indefinite-length items.
const BREAK: u8 = 0xff;

impl<'a> ValueDecoder<'a> {
    /// Create a new decoder for the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Decode the next value.
    pub fn decode(&mut self) -> CodecResult<Value> {
        let initial_byte = self.read_byte()?;
        let major_type = initial_byte >> 5;
        let additional_info = initial_byte & 0x1f;

        match major_type {
            0 => self
                .read_argument(additional_info)
                .map(|n| Value::Integer(i128::from(n))),
            1 => self
                .read_argument(additional_info)
                .map(|n| Value::Integer(-1 - i128::from(n))),
            2 => self.decode_bytes(additional_info),
            3 => self.decode_text(additional_info),
            4 => self.decode_array(additional_info),
            5 => self.decode_map(additional_info),
            6 => {
                let _tag = self.read_argument(additional_info)?;
                self.decode()
            }
            7 => self.decode_simple(additional_info),
            _ => Err(CodecError::invalid_structure("invalid major type")),
        }
    }

    /// Check if all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Get remaining bytes.
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.pos..]
    }

    #[inline]
    fn read_byte(&mut self) -> CodecResult<u8> {
        let byte = *self.data.get(self.pos).ok_or(CodecError::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    #[inline]
    fn peek_byte(&self) -> CodecResult<u8> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(CodecError::UnexpectedEof)
    }

    #[inline]
    fn read_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(CodecError::UnexpectedEof)?;
        let bytes = self
            .data
            .get(self.pos..end)
            .ok_or(CodecError::UnexpectedEof)?;
        self.pos = end;
        Ok(bytes)
    }

    fn read_be<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    fn read_argument(&mut self, additional_info: u8) -> CodecResult<u64> {
        match additional_info {
            0..=23 => Ok(u64::from(additional_info)),
            24 => Ok(u64::from(self.read_byte()?)),
            25 => Ok(u64::from(u16::from_be_bytes(self.read_be()?))),
            26 => Ok(u64::from(u32::from_be_bytes(self.read_be()?))),
            27 => Ok(u64::from_be_bytes(self.read_be()?)),
            28..=30 => Err(CodecError::invalid_structure("reserved additional info")),
            _ => Err(CodecError::invalid_structure(
                "indefinite length where a definite argument is required",
            )),
        }
    }

    fn checked_len(claimed: u64, max_allowed: u64) -> CodecResult<usize> {
        if claimed > max_allowed {
            return Err(CodecError::SizeLimitExceeded {
                claimed,
                max_allowed,
            });
        }
        usize::try_from(claimed).map_err(|_| CodecError::IntegerOverflow)
    }

    /// Reads a byte or text string payload, joining indefinite-length chunks.
    fn read_string_payload(&mut self, major_type: u8, additional_info: u8) -> CodecResult<Vec<u8>> {
        if additional_info != 31 {
            let len = Self::checked_len(self.read_argument(additional_info)?, MAX_BYTES_LENGTH)?;
            return Ok(self.read_bytes(len)?.to_vec());
        }

        let mut joined = Vec::new();
        loop {
            let byte = self.read_byte()?;
            if byte == BREAK {
                return Ok(joined);
            }
            if byte >> 5 != major_type || byte & 0x1f == 31 {
                return Err(CodecError::invalid_structure(
                    "indefinite string chunk of the wrong type",
                ));
            }
            let len = Self::checked_len(self.read_argument(byte & 0x1f)?, MAX_BYTES_LENGTH)?;
            joined.extend_from_slice(self.read_bytes(len)?);
            if joined.len() as u64 > MAX_BYTES_LENGTH {
                return Err(CodecError::SizeLimitExceeded {
                    claimed: joined.len() as u64,
                    max_allowed: MAX_BYTES_LENGTH,
                });
            }
        }
    }

    fn decode_bytes(&mut self, additional_info: u8) -> CodecResult<Value> {
        self.read_string_payload(2, additional_info).map(Value::Bytes)
    }

    fn decode_text(&mut self, additional_info: u8) -> CodecResult<Value> {
        let bytes = self.read_string_payload(3, additional_info)?;
        String::from_utf8(bytes)
            .map(Value::Text)
            .map_err(|_| CodecError::InvalidUtf8)
    }

    /// Returns true (and consumes it) if the next byte is a break code.
    fn at_break(&mut self) -> CodecResult<bool> {
        if self.peek_byte()? == BREAK {
            self.pos += 1;
            return Ok(true);
        }
        Ok(false)
    }

    fn decode_array(&mut self, additional_info: u8) -> CodecResult<Value> {
        let mut items = Vec::new();
        if additional_info == 31 {
            while !self.at_break()? {
                items.push(self.decode()?);
            }
        } else {
            let len = Self::checked_len(
                self.read_argument(additional_info)?,
                MAX_CONTAINER_ELEMENTS,
            )?;
            items.reserve(len.min(1024));
            for _ in 0..len {
                items.push(self.decode()?);
            }
        }
        Ok(Value::Array(items))
    }

    fn decode_map(&mut self, additional_info: u8) -> CodecResult<Value> {
        let mut pairs = Vec::new();
        if additional_info == 31 {
            while !self.at_break()? {
                let key = self.decode()?;
                let value = self.decode()?;
                pairs.push((key, value));
            }
        } else {
            let len = Self::checked_len(
                self.read_argument(additional_info)?,
                MAX_CONTAINER_ELEMENTS,
            )?;
            pairs.reserve(len.min(1024));
            for _ in 0..len {
                let key = self.decode()?;
                let value = self.decode()?;
                pairs.push((key, value));
            }
        }
        Ok(Value::Map(pairs))
    }

    fn decode_simple(&mut self, additional_info: u8) -> CodecResult<Value> {
        match additional_info {
            20 => Ok(Value::Bool(false)),
            21 => Ok(Value::Bool(true)),
            // null and undefined
            22 | 23 => Ok(Value::Null),
            24 => {
                let simple = self.read_byte()?;
                Err(CodecError::unsupported_type(format!("simple value {simple}")))
            }
            25 => {
                let half = u16::from_be_bytes(self.read_be()?);
                Ok(Value::Float(f64::from(half_to_f32(half))))
            }
            26 => Ok(Value::Float(f64::from(f32::from_be_bytes(self.read_be()?)))),
            27 => Ok(Value::Float(f64::from_be_bytes(self.read_be()?))),
            28..=30 => Err(CodecError::invalid_structure("reserved additional info")),
            31 => Err(CodecError::invalid_structure("break without indefinite")),
            _ => Err(CodecError::unsupported_type(format!(
                "simple value {additional_info}"
            ))),
        }
    }
}

/// Widens an IEEE 754 half-precision float.
fn half_to_f32(half: u16) -> f32 {
    let sign = if half & 0x8000 == 0 { 1.0 } else { -1.0 };
    let exponent = i32::from((half >> 10) & 0x1f);
    let mantissa = f32::from(half & 0x03ff);

    match exponent {
        0 => sign * mantissa * 2f32.powi(-24),
        31 if mantissa == 0.0 => sign * f32::INFINITY,
        31 => f32::NAN,
        _ => sign * (1.0 + mantissa / 1024.0) * 2f32.powi(exponent - 15),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_null_and_undefined() {
        assert_eq!(from_cbor(&[0xf6]).unwrap(), Value::Null);
        assert_eq!(from_cbor(&[0xf7]).unwrap(), Value::Null);
    }

    #[test]
    fn decode_bool() {
        assert_eq!(from_cbor(&[0xf4]).unwrap(), Value::Bool(false));
        assert_eq!(from_cbor(&[0xf5]).unwrap(), Value::Bool(true));
    }

    #[test]
    fn decode_integers() {
        assert_eq!(from_cbor(&[0x17]).unwrap(), Value::Integer(23));
        assert_eq!(from_cbor(&[0x18, 24]).unwrap(), Value::Integer(24));
        assert_eq!(from_cbor(&[0x19, 0x01, 0x00]).unwrap(), Value::Integer(256));
        assert_eq!(from_cbor(&[0x20]).unwrap(), Value::Integer(-1));
        assert_eq!(from_cbor(&[0x38, 99]).unwrap(), Value::Integer(-100));
    }

    #[test]
    fn accepts_non_shortest_integers() {
        assert_eq!(from_cbor(&[0x18, 23]).unwrap(), Value::Integer(23));
        assert_eq!(from_cbor(&[0x19, 0x00, 0xff]).unwrap(), Value::Integer(255));
    }

    #[test]
    fn full_range_integers() {
        let max = [0x1b, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff];
        assert_eq!(
            from_cbor(&max).unwrap(),
            Value::Integer(i128::from(u64::MAX))
        );
        let min = [0x3b, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff];
        assert_eq!(
            from_cbor(&min).unwrap(),
            Value::Integer(-1 - i128::from(u64::MAX))
        );
    }

    #[test]
    fn decode_floats() {
        // 1.5 as half, single and double
        assert_eq!(from_cbor(&[0xf9, 0x3e, 0x00]).unwrap(), Value::Float(1.5));
        assert_eq!(
            from_cbor(&[0xfa, 0x3f, 0xc0, 0x00, 0x00]).unwrap(),
            Value::Float(1.5)
        );
        assert_eq!(
            from_cbor(&[0xfb, 0x3f, 0xf8, 0, 0, 0, 0, 0, 0]).unwrap(),
            Value::Float(1.5)
        );
    }

    #[test]
    fn half_float_edge_cases() {
        assert_eq!(half_to_f32(0x0000), 0.0);
        assert_eq!(half_to_f32(0x7c00), f32::INFINITY);
        assert_eq!(half_to_f32(0xfc00), f32::NEG_INFINITY);
        assert!(half_to_f32(0x7e00).is_nan());
        assert_eq!(half_to_f32(0x0001), 2f32.powi(-24));
    }

    #[test]
    fn decode_text_and_bytes() {
        assert_eq!(
            from_cbor(&[0x65, b'h', b'e', b'l', b'l', b'o']).unwrap(),
            Value::Text("hello".to_string())
        );
        assert_eq!(
            from_cbor(&[0x43, 1, 2, 3]).unwrap(),
            Value::Bytes(vec![1, 2, 3])
        );
    }

    #[test]
    fn decode_map_keeps_encounter_order() {
        let value = from_cbor(&[0xa2, 0x61, b'b', 0x01, 0x61, b'a', 0x02]).unwrap();
        assert_eq!(
            value,
            Value::Map(vec![
                (Value::Text("b".to_string()), Value::Integer(1)),
                (Value::Text("a".to_string()), Value::Integer(2)),
            ])
        );
    }

    #[test]
    fn decode_indefinite_items() {
        assert_eq!(
            from_cbor(&[0x9f, 0x01, 0x02, 0xff]).unwrap(),
            Value::Array(vec![Value::Integer(1), Value::Integer(2)])
        );
        assert_eq!(
            from_cbor(&[0xbf, 0x61, b'a', 0x01, 0xff]).unwrap(),
            Value::Map(vec![(Value::Text("a".to_string()), Value::Integer(1))])
        );
        assert_eq!(
            from_cbor(&[0x7f, 0x61, b'a', 0x61, b'b', 0xff]).unwrap(),
            Value::Text("ab".to_string())
        );
    }

    #[test]
    fn tags_are_dropped() {
        // tag 1 (epoch time) around integer 10
        assert_eq!(from_cbor(&[0xc1, 0x0a]).unwrap(), Value::Integer(10));
    }

    #[test]
    fn unexpected_eof() {
        assert!(matches!(from_cbor(&[]), Err(CodecError::UnexpectedEof)));
        assert!(matches!(from_cbor(&[0x18]), Err(CodecError::UnexpectedEof)));
        assert!(matches!(
            from_cbor(&[0x9f, 0x01]),
            Err(CodecError::UnexpectedEof)
        ));
    }

    #[test]
    fn trailing_bytes_rejected() {
        assert!(matches!(
            from_cbor(&[0x01, 0x02]),
            Err(CodecError::TrailingBytes { count: 1 })
        ));
    }

    #[test]
    fn invalid_utf8_rejected() {
        assert!(matches!(
            from_cbor(&[0x62, 0xff, 0xfe]),
            Err(CodecError::InvalidUtf8)
        ));
    }

    #[test]
    fn oversized_length_rejected() {
        assert!(matches!(
            from_cbor(&[0x9b, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]),
            Err(CodecError::SizeLimitExceeded { .. })
        ));
    }
}
