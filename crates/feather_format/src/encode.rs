//! Writing columns.
//!
//! A column is laid out as an optional null bitmap followed by its values,
//! each region starting on an 8 byte boundary. Variable width values store
//! `len + 1` int32 offsets followed by the value bytes. Category columns are
//! followed by their levels, written as a UTF-8 array.
use feather_error::{not_implemented, FeatherError, FeatherResultExt, Result};
use std::sync::Arc;
use tracing::debug;

use crate::bitmap::Bitmap;
use crate::catalog::{alignment_of, physical_type_of, write_host_type};
use crate::category::{category_index_for, levels_for};
use crate::column::{ColumnSpec, EncodeConfig, WriteColumnConfig};
use crate::compute::temporal::{datetime_to_timestamp, timedelta_to_time};
use crate::compute::widen::Widener;
use crate::datatype::{BaseType, LogicalColumnType, NominalType};
use crate::format::{NULL_BITMASK_ALIGNMENT, PADDING, VALUE_ALIGNMENT};
use crate::host::{HostKind, HostValue};
use crate::io::multiplex::ChildStream;
use crate::io::sink::PhysicalSink;
use crate::metadata::{
    CategoryMetadata,
    ColumnMetadata,
    ColumnRecord,
    PrimitiveArrayDescriptor,
    TimeMetadata,
    TimestampMetadata,
    TIMESTAMP_TIMEZONE,
};
use crate::physical::{extend_le, FixedWidthType};

/// Destination for encoded column bytes.
pub trait ColumnOutput {
    /// Absolute position of the next write.
    fn position(&self) -> u64;

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()>;
}

impl<S: PhysicalSink> ColumnOutput for ChildStream<S> {
    fn position(&self) -> u64 {
        ChildStream::position(self)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        ChildStream::write_bytes(self, bytes)
    }
}

impl ColumnOutput for Vec<u8> {
    fn position(&self) -> u64 {
        self.len() as u64
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

fn pad_to<O: ColumnOutput + ?Sized>(out: &mut O, align: usize) -> Result<()> {
    let rem = (out.position() % align as u64) as usize;
    if rem != 0 {
        out.write_bytes(&PADDING[..align - rem])?;
    }
    Ok(())
}

/// Result of writing a single column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenColumn {
    pub column_type: LogicalColumnType,
    pub null_offset: Option<u64>,
    pub data_offset: u64,
    pub levels: Option<Arc<[String]>>,
    /// Record to hand to the metadata serializer.
    pub record: ColumnRecord,
}

impl WrittenColumn {
    /// Describe the written column for reading it back.
    pub fn to_spec(&self) -> ColumnSpec {
        let values = &self.record.values;
        let mut spec = ColumnSpec::new(
            &self.record.name,
            values.length,
            self.column_type,
            self.data_offset,
        );
        if let Some(null_offset) = self.null_offset {
            spec = spec.with_nulls(values.null_count, null_offset);
        }
        if let Some(levels) = &self.levels {
            spec = spec.with_levels(levels.clone());
        }
        spec
    }
}

/// Encoded value bytes of a variable width array.
struct VarWidth {
    offsets: Vec<u8>,
    data: Vec<u8>,
}

fn encode_var_width<'a>(values: impl IntoIterator<Item = Option<&'a [u8]>>) -> Result<VarWidth> {
    let mut offsets = Vec::new();
    let mut data = Vec::new();
    extend_le(&mut offsets, [0_i32]);
    for value in values {
        if let Some(bytes) = value {
            data.extend_from_slice(bytes);
        }
        let offset = i32::try_from(data.len())
            .map_err(|_| FeatherError::new("Variable width data exceeds 2GB"))?;
        extend_le(&mut offsets, [offset]);
    }
    Ok(VarWidth { offsets, data })
}

fn write_var_width<O: ColumnOutput + ?Sized>(out: &mut O, encoded: &VarWidth) -> Result<()> {
    out.write_bytes(&encoded.offsets)?;
    pad_to(out, VALUE_ALIGNMENT)?;
    out.write_bytes(&encoded.data)
}

fn unexpected(value: &HostValue, typ: LogicalColumnType) -> FeatherError {
    FeatherError::new(format!(
        "Unexpected {} value while writing {typ}",
        value.type_name()
    ))
}

/// Little endian values extracted by `f`. Nulls are written as zero.
fn encode_fixed<T, F>(values: &[HostValue], typ: LogicalColumnType, f: F) -> Result<Vec<u8>>
where
    T: FixedWidthType + Default,
    F: Fn(&HostValue) -> Option<T>,
{
    let mut buf = Vec::with_capacity(values.len() * T::width());
    for value in values {
        let v = if value.is_null() {
            T::default()
        } else {
            f(value).ok_or_else(|| unexpected(value, typ))?
        };
        extend_le(&mut buf, [v]);
    }
    Ok(buf)
}

/// Write an array of strings without nulls, returning its descriptor.
pub fn write_utf8_array<O>(out: &mut O, strings: &[String]) -> Result<PrimitiveArrayDescriptor>
where
    O: ColumnOutput + ?Sized,
{
    pad_to(out, VALUE_ALIGNMENT)?;
    let offset = out.position();
    let encoded = encode_var_width(strings.iter().map(|s| Some(s.as_bytes())))?;
    write_var_width(out, &encoded)?;
    pad_to(out, VALUE_ALIGNMENT)?;

    Ok(PrimitiveArrayDescriptor {
        value_type: NominalType::Utf8,
        offset,
        length: strings.len(),
        null_count: 0,
        total_bytes: out.position() - offset,
    })
}

/// Writes columns.
#[derive(Debug, Default)]
pub struct ColumnEncoder {
    config: EncodeConfig,
}

impl ColumnEncoder {
    pub fn new(config: EncodeConfig) -> Self {
        ColumnEncoder { config }
    }

    /// Widen and write a column at the output's current position.
    pub fn encode<I, O>(&self, column: WriteColumnConfig<I>, out: &mut O) -> Result<WrittenColumn>
    where
        I: IntoIterator<Item = HostValue>,
        O: ColumnOutput + ?Sized,
    {
        let typ = column.target_type;
        alignment_of(typ)?;
        let host = write_host_type(typ, &column.source_type)?;

        if column.null_count > 0 && !typ.is_nullable() {
            return Err(FeatherError::unmappable_column(format!(
                "Column '{}' has {} nulls but {typ} is not nullable",
                column.name, column.null_count
            )));
        }

        let values = Widener::for_target(&host)
            .widen(column.values)
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("Column '{}'", column.name))?;

        if values.len() != column.length {
            return Err(FeatherError::new(format!(
                "Column '{}' declared {} values, got {}",
                column.name,
                column.length,
                values.len()
            )));
        }
        let null_count = values.iter().filter(|v| v.is_null()).count();
        if null_count != column.null_count {
            return Err(FeatherError::new(format!(
                "Column '{}' declared {} nulls, got {null_count}",
                column.name, column.null_count
            )));
        }

        pad_to(out, VALUE_ALIGNMENT)?;
        let start = out.position();

        let null_offset = if null_count > 0 {
            let validity = Bitmap::from_bool_iter(values.iter().map(|v| !v.is_null()));
            out.write_bytes(validity.as_bytes())?;
            pad_to(out, NULL_BITMASK_ALIGNMENT)?;
            Some(start)
        } else {
            None
        };

        let data_offset = out.position();
        let levels = self.write_values(&values, typ, &host.kind, out)?;
        pad_to(out, VALUE_ALIGNMENT)?;
        let total_bytes = out.position() - start;

        let metadata = match (typ.base(), &levels) {
            (BaseType::Category, Some(levels)) => ColumnMetadata::Category(CategoryMetadata {
                levels: write_utf8_array(out, levels)?,
                ordered: self.config.ordered_categories,
            }),
            (BaseType::Timestamp(unit), _) => ColumnMetadata::Timestamp(TimestampMetadata {
                unit,
                timezone: TIMESTAMP_TIMEZONE.to_string(),
            }),
            (BaseType::Time(unit), _) => ColumnMetadata::Time(TimeMetadata { unit }),
            _ => ColumnMetadata::None,
        };

        let record = ColumnRecord {
            name: column.name,
            values: PrimitiveArrayDescriptor {
                value_type: physical_type_of(typ)?.nominal(),
                offset: start,
                length: values.len(),
                null_count,
                total_bytes,
            },
            metadata,
        };

        debug!(
            column = %record.name,
            %typ,
            rows = values.len(),
            null_count,
            offset = start,
            total_bytes,
            "wrote column"
        );

        Ok(WrittenColumn {
            column_type: typ,
            null_offset,
            data_offset,
            levels,
            record,
        })
    }

    /// Write the value region. Returns the levels for category columns.
    fn write_values<O>(
        &self,
        values: &[HostValue],
        typ: LogicalColumnType,
        host: &HostKind,
        out: &mut O,
    ) -> Result<Option<Arc<[String]>>>
    where
        O: ColumnOutput + ?Sized,
    {
        use HostValue as V;

        let buf = match typ.base() {
            BaseType::Bool => {
                let bits = Bitmap::from_bool_iter(values.iter().map(|v| matches!(v, V::Bool(true))));
                bits.as_bytes().to_vec()
            }
            BaseType::Int8 => encode_fixed(values, typ, |v| match v {
                V::Int8(v) => Some(*v),
                _ => None,
            })?,
            BaseType::UInt8 => encode_fixed(values, typ, |v| match v {
                V::UInt8(v) => Some(*v),
                _ => None,
            })?,
            BaseType::Int16 => encode_fixed(values, typ, |v| match v {
                V::Int16(v) => Some(*v),
                _ => None,
            })?,
            BaseType::UInt16 => encode_fixed(values, typ, |v| match v {
                V::UInt16(v) => Some(*v),
                _ => None,
            })?,
            BaseType::Int32 => encode_fixed(values, typ, |v| match v {
                V::Int32(v) => Some(*v),
                _ => None,
            })?,
            BaseType::UInt32 => encode_fixed(values, typ, |v| match v {
                V::UInt32(v) => Some(*v),
                _ => None,
            })?,
            BaseType::Int64 => encode_fixed(values, typ, |v| match v {
                V::Int64(v) => Some(*v),
                _ => None,
            })?,
            BaseType::UInt64 => encode_fixed(values, typ, |v| match v {
                V::UInt64(v) => Some(*v),
                _ => None,
            })?,
            BaseType::Float => encode_fixed(values, typ, |v| match v {
                V::Float32(v) => Some(*v),
                _ => None,
            })?,
            BaseType::Double => encode_fixed(values, typ, |v| match v {
                V::Float64(v) => Some(*v),
                _ => None,
            })?,
            BaseType::String => {
                let strings = values
                    .iter()
                    .map(|v| match v {
                        V::Null => Ok(None),
                        V::String(s) => Ok(Some(s.as_bytes())),
                        other => Err(unexpected(other, typ)),
                    })
                    .collect::<Result<Vec<_>>>()?;
                write_var_width(out, &encode_var_width(strings)?)?;
                return Ok(None);
            }
            BaseType::Timestamp(unit) => encode_fixed(values, typ, |v| match v {
                V::DateTime(dt) => datetime_to_timestamp(dt, unit),
                _ => None,
            })?,
            BaseType::Time(unit) => encode_fixed(values, typ, |v| match v {
                V::TimeSpan(delta) => timedelta_to_time(delta, unit),
                _ => None,
            })?,
            BaseType::Category => {
                let (buf, levels) = match host {
                    HostKind::Enum(enum_type) => {
                        let buf = encode_fixed(values, typ, |v| match v {
                            V::Enum(v) => category_index_for(enum_type, v.value),
                            _ => None,
                        })?;
                        (buf, levels_for(enum_type))
                    }
                    HostKind::MergedEnum(universe) => {
                        let buf = encode_fixed(values, typ, |v| match v {
                            V::MergedEnum(v) => Some(v.ordinal - 1),
                            _ => None,
                        })?;
                        (buf, Arc::from(universe.levels()))
                    }
                    other => {
                        return Err(FeatherError::unmappable_column(format!(
                            "Cannot write {other} values as a category"
                        )))
                    }
                };
                out.write_bytes(&buf)?;
                return Ok(Some(levels));
            }
            BaseType::Date | BaseType::Binary => return Err(not_implemented!("writing {typ} columns")),
        };

        out.write_bytes(&buf)?;
        Ok(None)
    }
}
