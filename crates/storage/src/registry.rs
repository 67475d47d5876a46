//! Data type registry for typed storage
//!
//! The registry maps a semantic value type to its encode/decode pair. It is
//! built once during startup and shared read-only afterwards (wrap it in an
//! `Arc` and hand it to every storage location).
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut registry = DataTypeRegistry::with_defaults();
//!
//! // Register a custom type
//! registry.register(PlayerStatsType);
//!
//! let registry = Arc::new(registry);
//!
//! // Look up by wire identifier (indexed decoding)
//! let codec = registry.lookup("i32")?;
//!
//! // Look up by Rust type (typed storage access)
//! let codec = registry.lookup_type::<i32>()?;
//! ```

use std::any::{type_name, TypeId};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::warn;
use worldstore_core::{BinaryReader, BinaryWriter, Error, Result};

use crate::codec::{
    BoolType, BytesType, DataType, DecodeContext, Erased, ErasedDataType, F32Type, F64Type,
    I16Type, I32Type, I64Type, IntListType, SerializableDataType, StringListType, StringType,
    U8Type, UuidType,
};
use crate::data::DataValue;

/// Registry of data types
///
/// Maintains mappings from:
/// - Wire identifier -> Data type
/// - Rust `TypeId` -> Data type
///
/// Reads take `&self` and need no locking, so any number of threads may look
/// up codecs concurrently once the registry is behind an `Arc`.
pub struct DataTypeRegistry {
    /// Data types by wire identifier
    by_identifier: FxHashMap<String, Arc<dyn ErasedDataType>>,
    /// Data types by value `TypeId`
    by_type: FxHashMap<TypeId, Arc<dyn ErasedDataType>>,
}

impl DataTypeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        DataTypeRegistry {
            by_identifier: FxHashMap::default(),
            by_type: FxHashMap::default(),
        }
    }

    /// Create a registry holding every built-in data type
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(BoolType);
        registry.register(U8Type);
        registry.register(I16Type);
        registry.register(I32Type);
        registry.register(I64Type);
        registry.register(F32Type);
        registry.register(F64Type);
        registry.register(StringType);
        registry.register(BytesType);
        registry.register(UuidType);
        registry.register(IntListType);
        registry.register(StringListType);
        registry.register(SerializableDataType);
        registry
    }

    /// Register a data type
    ///
    /// Registering the same identifier or value type again replaces the
    /// previous entry.
    pub fn register<D: DataType>(&mut self, data_type: D) {
        let erased: Arc<dyn ErasedDataType> = Arc::new(Erased::new(data_type));
        let identifier = erased.identifier().to_string();

        if let Some(previous) = self.by_identifier.get(&identifier) {
            warn!(
                identifier = %identifier,
                previous = previous.value_type_name(),
                "Replacing registered data type"
            );
            let previous_type = previous.value_type();
            self.by_type.remove(&previous_type);
        }
        if let Some(previous) = self.by_type.get(&erased.value_type()) {
            warn!(
                value_type = erased.value_type_name(),
                previous = previous.identifier(),
                "Value type re-registered under a new identifier"
            );
            let previous_id = previous.identifier().to_string();
            self.by_identifier.remove(&previous_id);
        }

        self.by_type.insert(erased.value_type(), Arc::clone(&erased));
        self.by_identifier.insert(identifier, erased);
    }

    /// Get data type by wire identifier
    pub fn lookup(&self, identifier: &str) -> Result<Arc<dyn ErasedDataType>> {
        self.by_identifier
            .get(identifier)
            .cloned()
            .ok_or_else(|| Error::UnregisteredType {
                type_name: identifier.to_string(),
            })
    }

    /// Get data type for a Rust value type
    pub fn lookup_type<T: DataValue>(&self) -> Result<Arc<dyn ErasedDataType>> {
        self.lookup_type_id(TypeId::of::<T>(), type_name::<T>())
    }

    pub(crate) fn lookup_type_id(
        &self,
        type_id: TypeId,
        name: &'static str,
    ) -> Result<Arc<dyn ErasedDataType>> {
        self.by_type
            .get(&type_id)
            .cloned()
            .ok_or_else(|| Error::UnregisteredType {
                type_name: name.to_string(),
            })
    }

    /// Check if a Rust value type is registered
    pub fn contains<T: DataValue>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>())
    }

    /// Check if a wire identifier is registered
    pub fn contains_identifier(&self, identifier: &str) -> bool {
        self.by_identifier.contains_key(identifier)
    }

    /// Wire identifier for a Rust value type
    pub fn identifier_of<T: DataValue>(&self) -> Option<&str> {
        self.by_type
            .get(&TypeId::of::<T>())
            .map(|codec| codec.identifier())
    }

    /// Encode a single typed value into a standalone byte buffer
    pub fn encode<T: DataValue>(&self, value: &T) -> Result<Vec<u8>> {
        let codec = self.lookup_type::<T>()?;
        let mut writer = BinaryWriter::new();
        codec.encode_value(&mut writer, value)?;
        Ok(writer.into_bytes())
    }

    /// Decode a single typed value from a standalone byte buffer
    ///
    /// The buffer must contain exactly one encoded value.
    pub fn decode<T: DataValue>(self: &Arc<Self>, bytes: &[u8]) -> Result<T> {
        let codec = self.lookup_type::<T>()?;
        let mut reader = BinaryReader::new(bytes);
        let value = codec.decode_value(&mut reader, &DecodeContext::new(self))?;
        if !reader.is_empty() {
            return Err(worldstore_core::DecodeError::TrailingBytes(reader.remaining()).into());
        }
        value
            .into_any()
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| Error::TypeMismatch {
                expected: type_name::<T>().to_string(),
                found: codec.value_type_name().to_string(),
            })
    }

    /// All registered identifiers, sorted
    pub fn identifiers(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.by_identifier.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Get the number of registered data types
    pub fn len(&self) -> usize {
        self.by_identifier.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.by_identifier.is_empty()
    }
}

impl Default for DataTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DataTypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataTypeRegistry")
            .field("data_type_count", &self.by_identifier.len())
            .field("identifiers", &self.identifiers())
            .finish()
    }
}
