//! Serializable data containers
//!
//! A [`SerializableData`] is an open, named set of typed values. Every entry
//! remembers the data type it was stored with, so the container can write
//! itself in the self-describing *indexed* format and be read back with
//! nothing but a [`DataTypeRegistry`].
//!
//! ## Indexed Format
//!
//! ```text
//! [entry_count: varint]
//! For each entry (ascending name order):
//!   [name: string]
//!   [type_id: string]
//!   [encoded_value: bytes defined by the type's codec]
//! ```
//!
//! Entry names are persisted so that decoding reproduces the container
//! exactly, names included.

use std::any::{type_name, Any};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use worldstore_core::{BinaryReader, BinaryWriter, DecodeError, DecodeResult, Error, Result};

use crate::codec::{DecodeContext, ErasedDataType};
use crate::registry::DataTypeRegistry;

/// A value that can live inside a [`SerializableData`].
///
/// Implemented automatically for every `Clone + PartialEq + Debug` type that
/// is `Send + Sync + 'static`. `clone_value` is a deep copy for owned types.
pub trait DataValue: Any + Send + Sync + fmt::Debug {
    /// Independent copy of this value
    fn clone_value(&self) -> Box<dyn DataValue>;

    /// Value equality across erased values of the same type
    fn eq_value(&self, other: &dyn DataValue) -> bool;

    /// Borrow as `Any` for downcasting
    fn as_any(&self) -> &dyn Any;

    /// Mutably borrow as `Any` for downcasting
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Convert into `Box<dyn Any>` for owned downcasting
    fn into_any(self: Box<Self>) -> Box<dyn Any>;

    /// Rust type name, for diagnostics
    fn value_type_name(&self) -> &'static str;
}

impl<T> DataValue for T
where
    T: Any + Clone + PartialEq + fmt::Debug + Send + Sync,
{
    fn clone_value(&self) -> Box<dyn DataValue> {
        Box::new(self.clone())
    }

    fn eq_value(&self, other: &dyn DataValue) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .map_or(false, |other| self == other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn value_type_name(&self) -> &'static str {
        type_name::<T>()
    }
}

/// A container shared between every holder of a cached key.
///
/// Mutations through one handle are visible through all others.
pub type SharedData = Arc<RwLock<SerializableData>>;

/// Collaborator that receives containers handed out by a storage location.
///
/// The storage layer only calls `set_data`; what the collaborator does with
/// the container afterwards is its own business.
pub trait DataContainer: Send + Sync {
    /// Replace the collaborator's data with `data`
    fn set_data(&self, data: SharedData);

    /// Current data, if any was set
    fn data(&self) -> Option<SharedData>;
}

/// One named entry: the value plus the codec it was stored with.
struct DataEntry {
    codec: Arc<dyn ErasedDataType>,
    value: Box<dyn DataValue>,
}

impl Clone for DataEntry {
    fn clone(&self) -> Self {
        DataEntry {
            codec: Arc::clone(&self.codec),
            value: self.value.clone_value(),
        }
    }
}

/// An open, named set of typed values.
///
/// Cloning produces a deep, independent copy: mutating the clone never
/// affects the original and vice versa.
#[derive(Clone)]
pub struct SerializableData {
    registry: Arc<DataTypeRegistry>,
    entries: BTreeMap<String, DataEntry>,
}

impl SerializableData {
    /// Create an empty container resolving types through `registry`
    pub fn new(registry: Arc<DataTypeRegistry>) -> Self {
        SerializableData {
            registry,
            entries: BTreeMap::new(),
        }
    }

    /// Registry this container resolves types through
    pub fn registry(&self) -> &Arc<DataTypeRegistry> {
        &self.registry
    }

    /// Get a typed value
    ///
    /// Returns `Ok(None)` when no entry named `name` exists and
    /// `Err(TypeMismatch)` when it exists with a different type.
    pub fn get<T: DataValue>(&self, name: &str) -> Result<Option<&T>> {
        match self.entries.get(name) {
            None => Ok(None),
            Some(entry) => entry
                .value
                .as_any()
                .downcast_ref::<T>()
                .map(Some)
                .ok_or_else(|| mismatch::<T>(entry)),
        }
    }

    /// Get a typed value for in-place mutation
    pub fn get_mut<T: DataValue>(&mut self, name: &str) -> Result<Option<&mut T>> {
        match self.entries.get_mut(name) {
            None => Ok(None),
            Some(entry) => {
                if entry.value.as_any().is::<T>() {
                    Ok(entry.value.as_any_mut().downcast_mut::<T>())
                } else {
                    Err(mismatch::<T>(entry))
                }
            }
        }
    }

    /// Get a typed value, falling back to `default` when absent
    pub fn get_or<T: DataValue + Clone>(&self, name: &str, default: T) -> Result<T> {
        Ok(self.get::<T>(name)?.cloned().unwrap_or(default))
    }

    /// Get the type-erased value of an entry
    pub fn get_raw(&self, name: &str) -> Option<&dyn DataValue> {
        self.entries.get(name).map(|entry| entry.value.as_ref())
    }

    /// Set a value, resolving its data type from the value's Rust type
    ///
    /// Fails with `UnregisteredType` when no data type is registered for `T`.
    pub fn set<T: DataValue>(&mut self, name: impl Into<String>, value: T) -> Result<()> {
        let codec = self.registry.lookup_type::<T>()?;
        self.entries.insert(
            name.into(),
            DataEntry {
                codec,
                value: Box::new(value),
            },
        );
        Ok(())
    }

    /// Set a value under an explicit type identifier
    ///
    /// Fails with `UnregisteredType` for unknown identifiers and with
    /// `TypeMismatch` when `value` is not the identifier's value type.
    pub fn set_with_type(
        &mut self,
        name: impl Into<String>,
        value: Box<dyn DataValue>,
        type_id: &str,
    ) -> Result<()> {
        let codec = self.registry.lookup(type_id)?;
        if value.as_any().type_id() != codec.value_type() {
            return Err(Error::TypeMismatch {
                expected: codec.value_type_name().to_string(),
                found: value.value_type_name().to_string(),
            });
        }
        self.entries.insert(name.into(), DataEntry { codec, value });
        Ok(())
    }

    /// Remove an entry, returning its value
    pub fn remove(&mut self, name: &str) -> Option<Box<dyn DataValue>> {
        self.entries.remove(name).map(|entry| entry.value)
    }

    /// Whether an entry named `name` exists
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Type identifier of an entry
    pub fn type_of(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|entry| entry.codec.identifier())
    }

    /// Entry names in encoding order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the container has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Encode the container in indexed format
    pub fn encode_indexed(&self) -> Result<Vec<u8>> {
        let mut writer = BinaryWriter::new();
        self.write_indexed(&mut writer)?;
        Ok(writer.into_bytes())
    }

    /// Write the indexed encoding onto an existing writer
    pub fn write_indexed(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_len(self.entries.len())?;
        for (name, entry) in &self.entries {
            writer.write_string(name)?;
            writer.write_string(entry.codec.identifier())?;
            entry.codec.encode_value(writer, entry.value.as_ref())?;
        }
        Ok(())
    }

    /// Decode a container from a complete indexed encoding
    ///
    /// Fails with a decode error on truncated input, unknown type
    /// identifiers, duplicate names, or bytes left over after the declared
    /// entries.
    pub fn decode_indexed(bytes: &[u8], registry: &Arc<DataTypeRegistry>) -> Result<Self> {
        let mut reader = BinaryReader::new(bytes);
        let data = Self::read_indexed(&mut reader, &DecodeContext::new(registry))?;
        if !reader.is_empty() {
            return Err(DecodeError::TrailingBytes(reader.remaining()).into());
        }
        Ok(data)
    }

    /// Read one indexed container from the reader's current position
    pub fn read_indexed(reader: &mut BinaryReader<'_>, ctx: &DecodeContext<'_>) -> DecodeResult<Self> {
        let count = reader.read_len()?;
        let registry = ctx.registry();
        let mut entries = BTreeMap::new();

        for _ in 0..count {
            let name = reader.read_string()?;
            let type_id = reader.read_string()?;
            let codec = registry
                .lookup(&type_id)
                .map_err(|_| DecodeError::UnknownType(type_id.clone()))?;
            let value = codec.decode_value(reader, ctx)?;
            if entries.contains_key(&name) {
                return Err(DecodeError::DuplicateEntry(name));
            }
            entries.insert(name, DataEntry { codec, value });
        }

        Ok(SerializableData {
            registry: Arc::clone(registry),
            entries,
        })
    }

    /// Wrap into a new shared handle
    pub fn into_shared(self) -> SharedData {
        Arc::new(RwLock::new(self))
    }
}

fn mismatch<T>(entry: &DataEntry) -> Error {
    Error::TypeMismatch {
        expected: type_name::<T>().to_string(),
        found: entry.codec.identifier().to_string(),
    }
}

impl PartialEq for SerializableData {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .zip(other.entries.iter())
                .all(|((name_a, a), (name_b, b))| {
                    name_a == name_b
                        && a.codec.identifier() == b.codec.identifier()
                        && a.value.eq_value(b.value.as_ref())
                })
    }
}

impl fmt::Debug for SerializableData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(name, entry)| (name, &entry.value)))
            .finish()
    }
}
