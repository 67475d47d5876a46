//! Built-in data types.
//!
//! | Identifier | Value type | Encoding |
//! |------------|------------|----------|
//! | `bool` | `bool` | 1 byte |
//! | `u8` | `u8` | 1 byte |
//! | `i16` | `i16` | 2 bytes BE |
//! | `i32` | `i32` | 4 bytes BE |
//! | `i64` | `i64` | 8 bytes BE |
//! | `f32` | `f32` | 4 bytes BE |
//! | `f64` | `f64` | 8 bytes BE |
//! | `string` | `String` | varint length + UTF-8 |
//! | `bytes` | `Vec<u8>` | varint length + raw |
//! | `uuid` | `Uuid` | 16 bytes |
//! | `i32_list` | `Vec<i32>` | varint count + i32 each |
//! | `string_list` | `Vec<String>` | varint count + string each |
//! | `serializable_data` | `SerializableData` | nested indexed encoding |

use uuid::Uuid;
use worldstore_core::{BinaryReader, BinaryWriter, DecodeResult, Result};

use super::traits::{DataType, DecodeContext};
use crate::data::SerializableData;

macro_rules! scalar_data_type {
    ($(#[$doc:meta])* $name:ident, $value:ty, $id:literal, $write:ident, $read:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl DataType for $name {
            type Value = $value;

            fn identifier(&self) -> &str {
                $id
            }

            fn encode(&self, writer: &mut BinaryWriter, value: &$value) -> Result<()> {
                writer.$write(*value);
                Ok(())
            }

            fn decode(
                &self,
                reader: &mut BinaryReader<'_>,
                _ctx: &DecodeContext<'_>,
            ) -> DecodeResult<$value> {
                reader.$read()
            }
        }
    };
}

scalar_data_type!(
    /// `bool` as a single 0/1 byte
    BoolType, bool, "bool", write_bool, read_bool
);
scalar_data_type!(
    /// `u8`
    U8Type, u8, "u8", write_u8, read_u8
);
scalar_data_type!(
    /// Big-endian `i16`
    I16Type, i16, "i16", write_i16, read_i16
);
scalar_data_type!(
    /// Big-endian `i32`
    I32Type, i32, "i32", write_i32, read_i32
);
scalar_data_type!(
    /// Big-endian `i64`
    I64Type, i64, "i64", write_i64, read_i64
);
scalar_data_type!(
    /// Big-endian `f32`
    F32Type, f32, "f32", write_f32, read_f32
);
scalar_data_type!(
    /// Big-endian `f64`
    F64Type, f64, "f64", write_f64, read_f64
);

/// Length-prefixed UTF-8 string
#[derive(Debug, Clone, Copy, Default)]
pub struct StringType;

impl DataType for StringType {
    type Value = String;

    fn identifier(&self) -> &str {
        "string"
    }

    fn encode(&self, writer: &mut BinaryWriter, value: &String) -> Result<()> {
        writer.write_string(value)
    }

    fn decode(&self, reader: &mut BinaryReader<'_>, _ctx: &DecodeContext<'_>) -> DecodeResult<String> {
        reader.read_string()
    }
}

/// Length-prefixed byte array
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesType;

impl DataType for BytesType {
    type Value = Vec<u8>;

    fn identifier(&self) -> &str {
        "bytes"
    }

    fn encode(&self, writer: &mut BinaryWriter, value: &Vec<u8>) -> Result<()> {
        writer.write_bytes(value)
    }

    fn decode(&self, reader: &mut BinaryReader<'_>, _ctx: &DecodeContext<'_>) -> DecodeResult<Vec<u8>> {
        Ok(reader.read_bytes()?.to_vec())
    }
}

/// Raw 16-byte UUID
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidType;

impl DataType for UuidType {
    type Value = Uuid;

    fn identifier(&self) -> &str {
        "uuid"
    }

    fn encode(&self, writer: &mut BinaryWriter, value: &Uuid) -> Result<()> {
        writer.write_uuid(value);
        Ok(())
    }

    fn decode(&self, reader: &mut BinaryReader<'_>, _ctx: &DecodeContext<'_>) -> DecodeResult<Uuid> {
        reader.read_uuid()
    }
}

/// Count-prefixed list of `i32`
#[derive(Debug, Clone, Copy, Default)]
pub struct IntListType;

impl DataType for IntListType {
    type Value = Vec<i32>;

    fn identifier(&self) -> &str {
        "i32_list"
    }

    fn encode(&self, writer: &mut BinaryWriter, value: &Vec<i32>) -> Result<()> {
        writer.write_len(value.len())?;
        for v in value {
            writer.write_i32(*v);
        }
        Ok(())
    }

    fn decode(&self, reader: &mut BinaryReader<'_>, _ctx: &DecodeContext<'_>) -> DecodeResult<Vec<i32>> {
        let len = reader.read_len()?;
        // Each element is 4 bytes; reject counts the input cannot hold before allocating
        let mut out = Vec::with_capacity(len.min(reader.remaining() / 4));
        for _ in 0..len {
            out.push(reader.read_i32()?);
        }
        Ok(out)
    }
}

/// Count-prefixed list of strings
#[derive(Debug, Clone, Copy, Default)]
pub struct StringListType;

impl DataType for StringListType {
    type Value = Vec<String>;

    fn identifier(&self) -> &str {
        "string_list"
    }

    fn encode(&self, writer: &mut BinaryWriter, value: &Vec<String>) -> Result<()> {
        writer.write_len(value.len())?;
        for v in value {
            writer.write_string(v)?;
        }
        Ok(())
    }

    fn decode(
        &self,
        reader: &mut BinaryReader<'_>,
        _ctx: &DecodeContext<'_>,
    ) -> DecodeResult<Vec<String>> {
        let len = reader.read_len()?;
        let mut out = Vec::with_capacity(len.min(reader.remaining()));
        for _ in 0..len {
            out.push(reader.read_string()?);
        }
        Ok(out)
    }
}

/// A container nested inside another container
///
/// Written inline in indexed form, so a nested container is decoded with
/// the same registry as its parent.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerializableDataType;

impl DataType for SerializableDataType {
    type Value = SerializableData;

    fn identifier(&self) -> &str {
        "serializable_data"
    }

    fn encode(&self, writer: &mut BinaryWriter, value: &SerializableData) -> Result<()> {
        value.write_indexed(writer)
    }

    fn decode(
        &self,
        reader: &mut BinaryReader<'_>,
        ctx: &DecodeContext<'_>,
    ) -> DecodeResult<SerializableData> {
        SerializableData::read_indexed(reader, &ctx.nested()?)
    }
}
