//! Named remote data categories and their record codec.
//!
//! A category is a remote table holding one row per account. The typed
//! [`DataCategory`] pairs the table name with a default factory; records
//! cross the wire as JSON objects.

use std::fmt;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use super::RemoteError;

/// A record as stored remotely: a flat JSON object.
pub type Record = serde_json::Map<String, Value>;

/// Identifier of one row inside a category table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowId(String);

impl RowId {
    /// Wrap a remote row identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl AsRef<str> for RowId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// One fetched row.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRow {
    /// Row identifier used for updates.
    pub row_id: RowId,
    /// Stored fields.
    pub fields: Record,
}

/// Type-erased view of a category used where categories of different value
/// types are processed together.
pub trait CategoryDescriptor: Send + Sync {
    /// Remote table name.
    fn name(&self) -> &'static str;

    /// Encoded default value, written when the category has no row yet.
    fn default_record(&self) -> Result<Record, RemoteError>;

    /// Check that a fetched record decodes into the category's value type.
    fn validate(&self, record: &Record) -> Result<(), RemoteError>;
}

/// Typed data category.
///
/// # Examples
/// ```
/// use client::domain::DataCategory;
///
/// static COUNTER: DataCategory<u32> = DataCategory::new("counter", || 0);
/// assert_eq!(COUNTER.name(), "counter");
/// assert_eq!(COUNTER.default_value(), 0);
/// ```
pub struct DataCategory<T> {
    name: &'static str,
    default_factory: fn() -> T,
}

impl<T> DataCategory<T> {
    /// Declare a category.
    pub const fn new(name: &'static str, default_factory: fn() -> T) -> Self {
        Self {
            name,
            default_factory,
        }
    }

    /// Remote table name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Fresh default value.
    pub fn default_value(&self) -> T {
        (self.default_factory)()
    }
}

impl<T> Clone for DataCategory<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for DataCategory<T> {}

impl<T> fmt::Debug for DataCategory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataCategory")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<T: Serialize> DataCategory<T> {
    /// Encode a value as a remote record.
    pub fn encode(&self, value: &T) -> Result<Record, RemoteError> {
        match serde_json::to_value(value) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(RemoteError::unknown(format!(
                "category {} encoded to a non-object value: {other}",
                self.name
            ))),
            Err(err) => Err(RemoteError::unknown(format!(
                "failed to encode category {}: {err}",
                self.name
            ))),
        }
    }
}

impl<T: DeserializeOwned> DataCategory<T> {
    /// Decode a remote record.
    pub fn decode(&self, record: &Record) -> Result<T, RemoteError> {
        T::deserialize(Value::Object(record.clone())).map_err(|err| {
            RemoteError::unknown(format!("failed to decode category {}: {err}", self.name))
        })
    }
}

impl<T> CategoryDescriptor for DataCategory<T>
where
    T: Serialize + DeserializeOwned,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn default_record(&self) -> Result<Record, RemoteError> {
        self.encode(&self.default_value())
    }

    fn validate(&self, record: &Record) -> Result<(), RemoteError> {
        self.decode(record).map(drop)
    }
}
