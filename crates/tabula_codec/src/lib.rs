//! # Tabula Codec
//!
//! Self-describing CBOR envelopes for tabula records.
//!
//! Records are serde types encoded as CBOR maps keyed by field name, so a
//! record written by one version of a type stays readable by the next.
//! Alongside the serde path, the crate exposes a dynamic [`Value`] with
//! its own lenient decoder and shortest-form encoder. The engine uses
//! `Value` for index keys and partial updates, and the command line viewer
//! uses it to print records without knowing their type.
//!
//! ## Usage
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use tabula_codec::{decode_record, encode_record, from_cbor, Value};
//!
//! #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
//! struct Note {
//!     title: String,
//!     stars: u8,
//! }
//!
//! let note = Note { title: "hi".into(), stars: 3 };
//! let bytes = encode_record(&note).unwrap();
//!
//! let dynamic = from_cbor(&bytes).unwrap();
//! assert_eq!(dynamic.get("stars"), Some(&Value::Integer(3)));
//!
//! let back: Note = decode_record(&bytes).unwrap();
//! assert_eq!(back, note);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod record;
mod value;

pub use decoder::{from_cbor, ValueDecoder};
pub use encoder::{to_cbor, ValueEncoder};
pub use error::{CodecError, CodecResult};
pub use record::{decode_record, encode_record, from_value, to_value};
pub use value::Value;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;

    #[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
    struct Profile {
        name: String,
        age: i64,
        active: bool,
        labels: BTreeMap<String, u32>,
    }

    fn profile_strategy() -> impl Strategy<Value = Profile> {
        (
            "[a-zA-Z ]{0,16}",
            any::<i64>(),
            any::<bool>(),
            prop::collection::btree_map("[a-z]{1,6}", any::<u32>(), 0..4),
        )
            .prop_map(|(name, age, active, labels)| Profile {
                name,
                age,
                active,
                labels,
            })
    }

    proptest! {
        #[test]
        fn value_encoder_agrees_with_serde(profile in profile_strategy()) {
            let serde_bytes = encode_record(&profile).unwrap();
            let value = from_cbor(&serde_bytes).unwrap();

            prop_assert_eq!(to_cbor(&value).unwrap(), serde_bytes);
        }

        #[test]
        fn zero_patch_leaves_record_untouched(profile in profile_strategy()) {
            let stored = to_value(&profile).unwrap();
            let patch = to_value(&Profile::default()).unwrap();

            let merged: Profile = from_value(&stored.merge_non_zero(&patch)).unwrap();
            prop_assert_eq!(merged, profile);
        }

        #[test]
        fn integer_keys_render_like_text(n in any::<i64>()) {
            prop_assert_eq!(Value::from(n).to_string(), Value::from(n.to_string()).to_string());
        }
    }
}
