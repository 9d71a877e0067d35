use feather_error::{FeatherError, Result};
use std::fmt;
use std::sync::Arc;

use crate::category::EnumResolution;
use crate::compute::cast::cast;
use crate::datatype::{BaseType, LogicalColumnType, TimeUnit};
use crate::host::HostRepr;

/// A single decoded, non-null value.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Bool(bool),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(String),
    Binary(Vec<u8>),
    /// Days since epoch.
    Date(i32),
    /// Ticks since epoch.
    Timestamp { value: i64, unit: TimeUnit },
    /// Ticks since midnight.
    Time { value: i64, unit: TimeUnit },
    /// Index into the column's levels.
    Category { index: i32, levels: Arc<[String]> },
}

impl CellValue {
    /// Base column type this value belongs to.
    pub const fn base_type(&self) -> BaseType {
        match self {
            Self::Bool(_) => BaseType::Bool,
            Self::Int8(_) => BaseType::Int8,
            Self::UInt8(_) => BaseType::UInt8,
            Self::Int16(_) => BaseType::Int16,
            Self::UInt16(_) => BaseType::UInt16,
            Self::Int32(_) => BaseType::Int32,
            Self::UInt32(_) => BaseType::UInt32,
            Self::Int64(_) => BaseType::Int64,
            Self::UInt64(_) => BaseType::UInt64,
            Self::Float(_) => BaseType::Float,
            Self::Double(_) => BaseType::Double,
            Self::String(_) => BaseType::String,
            Self::Binary(_) => BaseType::Binary,
            Self::Date(_) => BaseType::Date,
            Self::Timestamp { unit, .. } => BaseType::Timestamp(*unit),
            Self::Time { unit, .. } => BaseType::Time(*unit),
            Self::Category { .. } => BaseType::Category,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int8(v) => write!(f, "{v}"),
            Self::UInt8(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::UInt16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::UInt32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::UInt64(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v}"),
            Self::Binary(v) => write!(f, "{v:?}"),
            Self::Date(v) => write!(f, "Date({v})"),
            Self::Timestamp { value, unit } => write!(f, "Timestamp({value}{unit})"),
            Self::Time { value, unit } => write!(f, "Time({value}{unit})"),
            Self::Category { index, levels } => match levels.get(*index as usize) {
                Some(level) => write!(f, "{level}"),
                None => write!(f, "Category({index})"),
            },
        }
    }
}

/// A decoded value from a column, possibly null.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    column_type: LogicalColumnType,
    value: Option<CellValue>,
}

impl Cell {
    /// Create a non-null cell, checking that the value belongs to the column
    /// type.
    pub fn try_new(column_type: LogicalColumnType, value: CellValue) -> Result<Self> {
        if value.base_type() != column_type.base() {
            return Err(FeatherError::new(format!(
                "Value of type {} cannot be stored in a {column_type} cell",
                value.base_type()
            )));
        }

        Ok(Cell {
            column_type,
            value: Some(value),
        })
    }

    /// Create a null cell for a nullable column type.
    pub fn try_null(column_type: LogicalColumnType) -> Result<Self> {
        if !column_type.is_nullable() {
            return Err(FeatherError::new(format!(
                "Cannot create a null cell for non-nullable {column_type}"
            )));
        }

        Ok(Cell {
            column_type,
            value: None,
        })
    }

    pub fn column_type(&self) -> LogicalColumnType {
        self.column_type
    }

    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    pub fn value(&self) -> Option<&CellValue> {
        self.value.as_ref()
    }

    pub fn into_value(self) -> Option<CellValue> {
        self.value
    }

    /// Category index for category cells.
    pub fn category_index(&self) -> Option<i32> {
        match &self.value {
            Some(CellValue::Category { index, .. }) => Some(*index),
            _ => None,
        }
    }

    /// Convert this cell into some other type.
    pub fn get<T: HostRepr>(&self, ctx: Option<&EnumResolution>) -> Result<T> {
        cast::<T>(self, ctx)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => write!(f, "{v}"),
            None => write!(f, "NULL"),
        }
    }
}
