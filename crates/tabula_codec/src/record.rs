//! Record envelopes: serde types to and from self-describing CBOR.
//!
//! A record is written as a CBOR map keyed by field name. Because names
//! travel with the data, a record stays readable after its type gains,
//! loses or renames fields: unchanged fields decode, new fields take
//! their zero value and vanished fields are ignored.

use crate::decoder::from_cbor;
use crate::encoder::to_cbor;
use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes a record into its CBOR envelope.
///
/// # Errors
///
/// Returns `EncodingFailed` if serde rejects the value.
pub fn encode_record<T: Serialize + ?Sized>(record: &T) -> CodecResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(record, &mut buf)
        .map_err(|e| CodecError::encoding_failed(format!("{e:?}")))?;
    Ok(buf)
}

/// Decodes a record envelope into `T`, tolerating schema drift.
///
/// A direct serde decode is tried first. If that fails, the stored map is
/// laid over the encoding of `T::default()`: fields the type still has are
/// taken from storage, the rest keep their defaults. This lets types
/// without `#[serde(default)]` read records written before a field was
/// added.
///
/// # Errors
///
/// Returns `DecodingFailed` (carrying the direct decode's message) when
/// neither strategy produces a `T`, or a structural error when the bytes
/// are not CBOR at all.
pub fn decode_record<T>(bytes: &[u8]) -> CodecResult<T>
where
    T: DeserializeOwned + Serialize + Default,
{
    let direct_err = match ciborium::de::from_reader::<T, _>(bytes) {
        Ok(record) => return Ok(record),
        Err(e) => CodecError::decoding_failed(format!("{e:?}")),
    };

    let Value::Map(stored) = from_cbor(bytes)? else {
        return Err(direct_err);
    };
    let Value::Map(mut fields) = to_value(&T::default())? else {
        return Err(direct_err);
    };

    for (name, slot) in &mut fields {
        if let Some((_, value)) = stored.iter().find(|(k, _)| k == name) {
            *slot = value.clone();
        }
    }

    from_value(&Value::Map(fields)).map_err(|_| direct_err)
}

/// Converts any serializable value into a dynamic [`Value`].
///
/// # Errors
///
/// Returns an error if the value cannot be encoded.
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> CodecResult<Value> {
    from_cbor(&encode_record(value)?)
}

/// Converts a dynamic [`Value`] into a deserializable type.
///
/// # Errors
///
/// Returns `DecodingFailed` if the value does not fit `T`.
pub fn from_value<T: DeserializeOwned>(value: &Value) -> CodecResult<T> {
    let bytes = to_cbor(value)?;
    ciborium::de::from_reader(bytes.as_slice())
        .map_err(|e| CodecError::decoding_failed(format!("{e:?}")))
}
