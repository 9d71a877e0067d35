//! Column descriptors for reading and writing.
use feather_error::{FeatherError, FeatherResultExt, Result};
use hashbrown::HashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::trace;

use crate::catalog;
use crate::category::{resolve_mapping, CategoryEnumMapType, EnumResolution};
use crate::compute::cast::{cast, ConversionCache};
use crate::datatype::{BaseType, LogicalColumnType};
use crate::decode::{read_utf8_array, ColumnDecoder};
use crate::format::{padded_len, NULL_BITMASK_ALIGNMENT};
use crate::host::{EnumType, EnumTypeId, HostKind, HostRepr, HostType, HostValue};
use crate::io::source::ByteRangeSource;
use crate::metadata::{ColumnMetadata, ColumnRecord};

/// An on-disk column.
#[derive(Debug)]
pub struct ColumnSpec {
    name: String,
    length: usize,
    column_type: LogicalColumnType,
    null_count: usize,
    /// Offset of the null bitmap, only present for columns with nulls.
    null_offset: Option<u64>,
    data_offset: u64,
    /// Category levels, index == on-disk value.
    levels: Option<Arc<[String]>>,
    /// Resolved mappings per requested enum. Filled on first request, never
    /// invalidated.
    enum_mappings: RwLock<HashMap<EnumTypeId, CategoryEnumMapType>>,
}

impl ColumnSpec {
    pub fn new(
        name: impl Into<String>,
        length: usize,
        column_type: LogicalColumnType,
        data_offset: u64,
    ) -> Self {
        ColumnSpec {
            name: name.into(),
            length,
            column_type,
            null_count: 0,
            null_offset: None,
            data_offset,
            levels: None,
            enum_mappings: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_nulls(mut self, null_count: usize, null_offset: u64) -> Self {
        self.null_count = null_count;
        self.null_offset = Some(null_offset);
        self
    }

    pub fn with_levels(mut self, levels: impl Into<Arc<[String]>>) -> Self {
        self.levels = Some(levels.into());
        self
    }

    /// Build a column from its metadata record, reading category levels from
    /// `source`.
    pub fn from_record<R>(record: &ColumnRecord, source: &R) -> Result<Self>
    where
        R: ByteRangeSource + ?Sized,
    {
        let column_type = record.logical_type()?;
        let values = &record.values;

        let mut spec = if values.null_count > 0 {
            let bitmap_len = padded_len(values.length.div_ceil(8), NULL_BITMASK_ALIGNMENT);
            ColumnSpec::new(
                &record.name,
                values.length,
                column_type,
                values.offset + bitmap_len as u64,
            )
            .with_nulls(values.null_count, values.offset)
        } else {
            ColumnSpec::new(&record.name, values.length, column_type, values.offset)
        };

        if let ColumnMetadata::Category(meta) = &record.metadata {
            let levels = read_utf8_array(source, &meta.levels)
                .with_context(|| format!("Levels of column '{}'", record.name))?;
            spec = spec.with_levels(levels);
        }

        Ok(spec)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn column_type(&self) -> LogicalColumnType {
        self.column_type
    }

    pub fn null_count(&self) -> usize {
        self.null_count
    }

    pub fn null_offset(&self) -> Option<u64> {
        self.null_offset
    }

    pub fn data_offset(&self) -> u64 {
        self.data_offset
    }

    pub fn levels(&self) -> Option<&Arc<[String]>> {
        self.levels.as_ref()
    }

    /// Host type values are read as when no type is requested.
    pub fn default_host_type(&self) -> HostType {
        catalog::host_type_of(self.column_type)
    }

    /// Check if this column can be read as `host`.
    ///
    /// Enum targets go through the column's memoized mapping instead of
    /// resolving against the levels again.
    pub fn can_map_to(&self, host: &HostType) -> bool {
        match &host.kind {
            HostKind::Enum(enum_type) if self.column_type.base() == BaseType::Category => {
                (host.nullable || !self.column_type.is_nullable())
                    && self.enum_mapping(enum_type).is_ok()
            }
            _ => catalog::can_map_to(self.column_type, host, self.levels.as_deref()),
        }
    }

    pub fn check_mappable(&self, host: &HostType) -> Result<()> {
        if self.can_map_to(host) {
            return Ok(());
        }

        Err(FeatherError::unmappable_column(format!(
            "Column '{}' of type {} cannot be mapped to {host}",
            self.name, self.column_type
        )))
    }

    /// How this column's levels relate to `enum_type`.
    ///
    /// Errors if neither names nor ordinals line up.
    pub fn enum_mapping(&self, enum_type: &EnumType) -> Result<CategoryEnumMapType> {
        let cached = self.enum_mappings.read().get(&enum_type.id()).copied();
        let map_type = match cached {
            Some(map_type) => map_type,
            None => {
                let map_type = match &self.levels {
                    Some(levels) => resolve_mapping(enum_type, levels),
                    None => CategoryEnumMapType::None,
                };
                trace!(column = %self.name, %enum_type, ?map_type, "resolved enum mapping");
                *self
                    .enum_mappings
                    .write()
                    .entry(enum_type.id())
                    .or_insert(map_type)
            }
        };

        if map_type == CategoryEnumMapType::None {
            return Err(FeatherError::unresolvable_category_mapping(format!(
                "Levels of column '{}' match neither the names nor the values of {enum_type}",
                self.name
            )));
        }

        Ok(map_type)
    }

    pub fn enum_resolution(&self, enum_type: &EnumType) -> Result<EnumResolution> {
        Ok(EnumResolution {
            enum_type: enum_type.clone(),
            map_type: self.enum_mapping(enum_type)?,
        })
    }

    fn resolution_for(&self, host: &HostType) -> Result<Option<EnumResolution>> {
        match &host.kind {
            HostKind::Enum(typ) => self.enum_resolution(typ).map(Some),
            _ => Ok(None),
        }
    }

    /// Read a single row as `T`.
    pub fn get<T, R>(&self, source: &R, row: usize) -> Result<T>
    where
        T: HostRepr,
        R: ByteRangeSource + ?Sized,
    {
        let host = T::host_type();
        self.check_mappable(&host)?;
        let ctx = self.resolution_for(&host)?;
        let cell = ColumnDecoder::new(self, source).cell(row)?;
        cast::<T>(&cell, ctx.as_ref())
    }

    /// Read a single row as a boxed value of `host`.
    pub fn get_dyn<R>(&self, source: &R, row: usize, host: &HostType) -> Result<HostValue>
    where
        R: ByteRangeSource + ?Sized,
    {
        self.check_mappable(host)?;
        let ctx = self.resolution_for(host)?;
        let cell = ColumnDecoder::new(self, source).cell(row)?;
        ConversionCache::global().cast_dyn(&cell, host, ctx.as_ref())
    }

    /// Read every row as `T`.
    pub fn read_all<T, R>(&self, source: &R) -> Result<Vec<T>>
    where
        T: HostRepr,
        R: ByteRangeSource + ?Sized,
    {
        let host = T::host_type();
        self.check_mappable(&host)?;
        let ctx = self.resolution_for(&host)?;
        ColumnDecoder::new(self, source)
            .cells()?
            .map(|cell| cast::<T>(&cell?, ctx.as_ref()))
            .collect()
    }
}

/// Describes one column to write.
#[derive(Debug)]
pub struct WriteColumnConfig<I> {
    pub name: String,
    /// Declared type of the values.
    pub source_type: HostType,
    pub target_type: LogicalColumnType,
    pub length: usize,
    pub values: I,
    pub null_count: usize,
}

impl WriteColumnConfig<Vec<HostValue>> {
    /// Describe a column from materialized values, counting rows and nulls.
    pub fn from_values(
        name: impl Into<String>,
        source_type: HostType,
        target_type: LogicalColumnType,
        values: Vec<HostValue>,
    ) -> Self {
        let null_count = values.iter().filter(|v| v.is_null()).count();
        WriteColumnConfig {
            name: name.into(),
            source_type,
            target_type,
            length: values.len(),
            values,
            null_count,
        }
    }
}

/// Options applied to every written column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncodeConfig {
    /// Mark category columns as ordered.
    pub ordered_categories: bool,
}
