//! Data type (codec) abstraction.
//!
//! A data type turns one semantic value type into bytes and back. Every typed
//! value passing through a storage location or a serializable data container
//! goes through the data type registered for it.
//!
//! # Usage
//!
//! ```ignore
//! use worldstore_storage::codec::{DataType, I32Type};
//!
//! let mut writer = BinaryWriter::new();
//! I32Type.encode(&mut writer, &42)?;
//! ```

mod builtin;
mod traits;

pub use builtin::{
    BoolType, BytesType, F32Type, F64Type, I16Type, I32Type, I64Type, IntListType,
    SerializableDataType, StringListType, StringType, U8Type, UuidType,
};
pub(crate) use traits::Erased;
pub use traits::{DataType, DecodeContext, ErasedDataType, MAX_NESTING_DEPTH};
