//! Data type trait definitions.

use std::any::{type_name, TypeId};
use std::marker::PhantomData;
use std::sync::Arc;

use worldstore_core::{BinaryReader, BinaryWriter, DecodeError, DecodeResult, Error, Result};

use crate::data::DataValue;
use crate::registry::DataTypeRegistry;

/// Maximum nesting depth of containers inside containers.
///
/// Decoding deeper input fails instead of recursing without bound.
pub const MAX_NESTING_DEPTH: usize = 64;

/// An encode/decode pair for one semantic value type.
///
/// # Thread Safety
///
/// Data types must be `Send + Sync`: the registry holding them is shared by
/// every storage location and read concurrently.
///
/// # Identity
///
/// Each data type has a stable identifier. The identifier is written in front
/// of every value in the indexed container encoding, so changing it breaks
/// previously persisted data.
pub trait DataType: Send + Sync + 'static {
    /// Rust type this codec encodes.
    type Value: DataValue;

    /// Stable wire identifier (e.g. `"i32"`).
    fn identifier(&self) -> &str;

    /// Encode `value` onto the writer.
    ///
    /// The encoding must be self-delimiting: decoding reads exactly the bytes
    /// written here.
    fn encode(&self, writer: &mut BinaryWriter, value: &Self::Value) -> Result<()>;

    /// Decode a value, consuming exactly the bytes `encode` produced.
    fn decode(&self, reader: &mut BinaryReader<'_>, ctx: &DecodeContext<'_>)
        -> DecodeResult<Self::Value>;
}

/// State threaded through nested decodes.
#[derive(Clone, Copy)]
pub struct DecodeContext<'a> {
    registry: &'a Arc<DataTypeRegistry>,
    depth: usize,
}

impl<'a> DecodeContext<'a> {
    /// Top-level context for `registry`
    pub fn new(registry: &'a Arc<DataTypeRegistry>) -> Self {
        Self { registry, depth: 0 }
    }

    /// Registry used to resolve entry type identifiers
    pub fn registry(&self) -> &'a Arc<DataTypeRegistry> {
        self.registry
    }

    /// Current nesting depth
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Context one level deeper, failing past [`MAX_NESTING_DEPTH`]
    pub fn nested(&self) -> DecodeResult<Self> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(DecodeError::Invalid(format!(
                "container nesting exceeds {} levels",
                MAX_NESTING_DEPTH
            )));
        }
        Ok(Self {
            registry: self.registry,
            depth: self.depth + 1,
        })
    }
}

/// Type-erased view of a [`DataType`], as stored in the registry.
pub trait ErasedDataType: Send + Sync {
    /// Wire identifier
    fn identifier(&self) -> &str;

    /// `TypeId` of the value type
    fn value_type(&self) -> TypeId;

    /// Rust name of the value type, for diagnostics
    fn value_type_name(&self) -> &'static str;

    /// Encode a type-erased value
    ///
    /// Fails with `TypeMismatch` when `value` is not this codec's value type.
    fn encode_value(&self, writer: &mut BinaryWriter, value: &dyn DataValue) -> Result<()>;

    /// Decode into a type-erased value
    fn decode_value(
        &self,
        reader: &mut BinaryReader<'_>,
        ctx: &DecodeContext<'_>,
    ) -> DecodeResult<Box<dyn DataValue>>;
}

/// Adapter erasing a concrete [`DataType`].
pub(crate) struct Erased<D: DataType> {
    inner: D,
    _marker: PhantomData<fn() -> D::Value>,
}

impl<D: DataType> Erased<D> {
    pub(crate) fn new(inner: D) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }
}

impl<D: DataType> ErasedDataType for Erased<D> {
    fn identifier(&self) -> &str {
        self.inner.identifier()
    }

    fn value_type(&self) -> TypeId {
        TypeId::of::<D::Value>()
    }

    fn value_type_name(&self) -> &'static str {
        type_name::<D::Value>()
    }

    fn encode_value(&self, writer: &mut BinaryWriter, value: &dyn DataValue) -> Result<()> {
        let typed = value
            .as_any()
            .downcast_ref::<D::Value>()
            .ok_or_else(|| Error::TypeMismatch {
                expected: self.inner.identifier().to_string(),
                found: value.value_type_name().to_string(),
            })?;
        self.inner.encode(writer, typed)
    }

    fn decode_value(
        &self,
        reader: &mut BinaryReader<'_>,
        ctx: &DecodeContext<'_>,
    ) -> DecodeResult<Box<dyn DataValue>> {
        Ok(Box::new(self.inner.decode(reader, ctx)?))
    }
}

impl std::fmt::Debug for dyn ErasedDataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataType")
            .field("identifier", &self.identifier())
            .field("value_type", &self.value_type_name())
            .finish()
    }
}
