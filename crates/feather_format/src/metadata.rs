//! Structured column records handed to the metadata serializer.
//!
//! Only the record structure lives here. Turning records into bytes is the
//! job of whatever implements `MetadataSerializer`.
use feather_error::{FeatherError, Result};
use serde::{Deserialize, Serialize};

use crate::datatype::{BaseType, LogicalColumnType, NominalType, TimeUnit};

/// Timezone recorded for every timestamp column. Values are always UTC.
pub const TIMESTAMP_TIMEZONE: &str = "GMT";

/// Location and shape of a primitive array in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimitiveArrayDescriptor {
    /// Type code the array is declared with.
    pub value_type: NominalType,
    /// Absolute offset of the array, null bitmap first if present.
    pub offset: u64,
    pub length: usize,
    pub null_count: usize,
    /// Bytes covered by the bitmap and values, including padding.
    pub total_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMetadata {
    /// The level strings, stored as a UTF-8 array.
    pub levels: PrimitiveArrayDescriptor,
    pub ordered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampMetadata {
    pub unit: TimeUnit,
    pub timezone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeMetadata {
    pub unit: TimeUnit,
}

/// Type specific metadata. A column carries at most one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnMetadata {
    None,
    Category(CategoryMetadata),
    Timestamp(TimestampMetadata),
    Time(TimeMetadata),
}

/// Everything the metadata serializer needs to know about one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRecord {
    pub name: String,
    pub values: PrimitiveArrayDescriptor,
    pub metadata: ColumnMetadata,
}

impl ColumnRecord {
    /// Recover the logical column type from the declared array type and
    /// metadata.
    ///
    /// Columns with nulls are read as nullable.
    pub fn logical_type(&self) -> Result<LogicalColumnType> {
        let base = match &self.metadata {
            ColumnMetadata::Category(_) => BaseType::Category,
            ColumnMetadata::Timestamp(meta) => BaseType::Timestamp(meta.unit),
            ColumnMetadata::Time(meta) => BaseType::Time(meta.unit),
            ColumnMetadata::None => match self.values.value_type {
                NominalType::Bool => BaseType::Bool,
                NominalType::Int8 => BaseType::Int8,
                NominalType::Int16 => BaseType::Int16,
                NominalType::Int32 => BaseType::Int32,
                NominalType::Int64 => BaseType::Int64,
                NominalType::UInt8 => BaseType::UInt8,
                NominalType::UInt16 => BaseType::UInt16,
                NominalType::UInt32 => BaseType::UInt32,
                NominalType::UInt64 => BaseType::UInt64,
                NominalType::Float => BaseType::Float,
                NominalType::Double => BaseType::Double,
                NominalType::Utf8 => BaseType::String,
                NominalType::Binary => BaseType::Binary,
                NominalType::Date => BaseType::Date,
                other @ (NominalType::Category | NominalType::Timestamp | NominalType::Time) => {
                    return Err(FeatherError::new(format!(
                        "Column '{}' declared as {other:?} is missing its metadata",
                        self.name
                    )))
                }
            },
        };

        Ok(LogicalColumnType::from_parts(
            base,
            self.values.null_count > 0,
        ))
    }
}

/// External serializer for column records.
pub trait MetadataSerializer {
    /// Serialize a record, returning the offset it was written at.
    fn serialize_column(&mut self, record: &ColumnRecord) -> Result<u64>;
}
