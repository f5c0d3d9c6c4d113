//! The contract a type fulfils to be stored.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use tabula_codec::Value;

/// A typed record with an integer identity.
///
/// The model name doubles as the table directory. It defaults to the
/// fully qualified type name with `::` replaced by `.`, so two types with
/// the same name in different modules never share a table.
///
/// # Example
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use tabula_core::{Resource, Value};
///
/// #[derive(Debug, Default, Serialize, Deserialize)]
/// struct Todo {
///     id: i64,
///     title: String,
///     list_id: i64,
/// }
///
/// impl Resource for Todo {
///     fn model() -> String {
///         "Todo".into()
///     }
///     fn id(&self) -> i64 {
///         self.id
///     }
///     fn set_id(&mut self, id: i64) {
///         self.id = id;
///     }
///     fn indexed_fields(&self) -> Vec<(&'static str, Value)> {
///         vec![("Title", Value::from(&self.title))]
///     }
///     fn owner_ids(&self) -> Vec<(&'static str, i64)> {
///         vec![("TodoList", self.list_id)]
///     }
/// }
/// ```
pub trait Resource: Serialize + DeserializeOwned + Default + Debug {
    /// Table name of this type.
    fn model() -> String {
        std::any::type_name::<Self>().replace("::", ".")
    }

    /// The record's ID, 0 before it was created.
    fn id(&self) -> i64;

    /// Assigns the record's ID.
    fn set_id(&mut self, id: i64);

    /// Fields maintained in the secondary index, as `(field, value)`.
    fn indexed_fields(&self) -> Vec<(&'static str, Value)> {
        Vec::new()
    }

    /// Owner references, as `(owner type name, owner ID)`.
    fn owner_ids(&self) -> Vec<(&'static str, i64)> {
        Vec::new()
    }
}

/// Returns the last `.` separated segment of a model name.
pub(crate) fn short_name(model: &str) -> &str {
    model.rsplit('.').next().unwrap_or(model)
}
