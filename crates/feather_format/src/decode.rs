//! Reading cells back out of encoded columns.
use bytes::Bytes;
use feather_error::{FeatherError, OptionExt, Result};

use crate::bitmap::{bit_is_set, Bitmap};
use crate::column::ColumnSpec;
use crate::datatype::{BaseType, TimeUnit};
use crate::format::{padded_len, VALUE_ALIGNMENT};
use crate::io::source::{read_array, ByteRangeSource};
use crate::metadata::PrimitiveArrayDescriptor;
use crate::physical::{decode_le, FixedWidthType};
use crate::scalar::{Cell, CellValue};

/// Byte length of the offsets region of a variable width array, including
/// padding.
fn offsets_region_len(len: usize) -> usize {
    padded_len((len + 1) * 4, VALUE_ALIGNMENT)
}

fn invalid_offsets(start: i32, end: i32) -> FeatherError {
    FeatherError::new(format!("Invalid value offsets {start}..{end}"))
}

/// Read the raw bytes of one variable width value.
fn read_var_width<R>(source: &R, data_offset: u64, len: usize, row: usize) -> Result<Bytes>
where
    R: ByteRangeSource + ?Sized,
{
    let offsets = read_array::<i32, _>(source, data_offset + (row * 4) as u64, 2)?;
    let (start, end) = (offsets[0], offsets[1]);
    if start < 0 || end < start {
        return Err(invalid_offsets(start, end));
    }

    let values_start = data_offset + offsets_region_len(len) as u64;
    source.read_at(values_start + start as u64, (end - start) as usize)
}

fn read_fixed<T, R>(source: &R, data_offset: u64, row: usize) -> Result<T>
where
    T: FixedWidthType,
    R: ByteRangeSource + ?Sized,
{
    let bytes = source.read_at(data_offset + (row * T::width()) as u64, T::width())?;
    decode_le::<T>(&bytes)
        .pop()
        .required("Short read of fixed width value")
}

fn time_unit(spec: &ColumnSpec) -> Result<TimeUnit> {
    spec.column_type()
        .time_unit()
        .ok_or_else(|| FeatherError::new(format!("{} has no time unit", spec.column_type())))
}

/// Decode the value at `row`, ignoring validity.
fn read_value<R>(spec: &ColumnSpec, source: &R, data_offset: u64, row: usize) -> Result<CellValue>
where
    R: ByteRangeSource + ?Sized,
{
    Ok(match spec.column_type().base() {
        BaseType::Bool => {
            let byte = source.read_at(data_offset + (row / 8) as u64, 1)?;
            CellValue::Bool(bit_is_set(&byte, row % 8))
        }
        BaseType::Int8 => CellValue::Int8(read_fixed(source, data_offset, row)?),
        BaseType::UInt8 => CellValue::UInt8(read_fixed(source, data_offset, row)?),
        BaseType::Int16 => CellValue::Int16(read_fixed(source, data_offset, row)?),
        BaseType::UInt16 => CellValue::UInt16(read_fixed(source, data_offset, row)?),
        BaseType::Int32 => CellValue::Int32(read_fixed(source, data_offset, row)?),
        BaseType::UInt32 => CellValue::UInt32(read_fixed(source, data_offset, row)?),
        BaseType::Int64 => CellValue::Int64(read_fixed(source, data_offset, row)?),
        BaseType::UInt64 => CellValue::UInt64(read_fixed(source, data_offset, row)?),
        BaseType::Float => CellValue::Float(read_fixed(source, data_offset, row)?),
        BaseType::Double => CellValue::Double(read_fixed(source, data_offset, row)?),
        BaseType::String => {
            let bytes = read_var_width(source, data_offset, spec.len(), row)?;
            CellValue::String(std::str::from_utf8(&bytes)?.to_string())
        }
        BaseType::Binary => {
            let bytes = read_var_width(source, data_offset, spec.len(), row)?;
            CellValue::Binary(bytes.to_vec())
        }
        BaseType::Date => CellValue::Date(read_fixed(source, data_offset, row)?),
        BaseType::Timestamp(_) => CellValue::Timestamp {
            value: read_fixed(source, data_offset, row)?,
            unit: time_unit(spec)?,
        },
        BaseType::Time(_) => CellValue::Time {
            value: read_fixed(source, data_offset, row)?,
            unit: time_unit(spec)?,
        },
        BaseType::Category => {
            let levels = spec.levels().ok_or_else(|| {
                FeatherError::new(format!("Category column '{}' has no levels", spec.name()))
            })?;
            let index: i32 = read_fixed(source, data_offset, row)?;
            if index < 0 || index as usize >= levels.len() {
                return Err(FeatherError::new(format!(
                    "Category index {index} out of range for {} levels",
                    levels.len()
                )));
            }
            CellValue::Category {
                index,
                levels: levels.clone(),
            }
        }
    })
}

fn make_cell(spec: &ColumnSpec, value: Option<CellValue>) -> Result<Cell> {
    match value {
        Some(value) => Cell::try_new(spec.column_type(), value),
        None => Cell::try_null(spec.column_type()),
    }
}

/// Reads cells of a single column.
#[derive(Debug)]
pub struct ColumnDecoder<'a, R: ?Sized> {
    spec: &'a ColumnSpec,
    source: &'a R,
}

impl<'a, R> ColumnDecoder<'a, R>
where
    R: ByteRangeSource + ?Sized,
{
    pub fn new(spec: &'a ColumnSpec, source: &'a R) -> Self {
        ColumnDecoder { spec, source }
    }

    /// Decode a single row.
    pub fn cell(&self, row: usize) -> Result<Cell> {
        if row >= self.spec.len() {
            return Err(FeatherError::new(format!(
                "Row {row} out of range for column '{}' with {} rows",
                self.spec.name(),
                self.spec.len()
            )));
        }

        if let Some(null_offset) = self.spec.null_offset() {
            let byte = self.source.read_at(null_offset + (row / 8) as u64, 1)?;
            if !bit_is_set(&byte, row % 8) {
                return make_cell(self.spec, None);
            }
        }

        let value = read_value(self.spec, self.source, self.spec.data_offset(), row)?;
        make_cell(self.spec, Some(value))
    }

    /// Decode every row.
    ///
    /// The validity and value regions are each read with a single request
    /// up front.
    pub fn cells(&self) -> Result<Cells<'a>> {
        let len = self.spec.len();
        let validity = match self.spec.null_offset() {
            Some(offset) => {
                let bytes = self.source.read_at(offset, len.div_ceil(8))?;
                Some(Bitmap::try_from_bytes(&bytes, len)?)
            }
            None => None,
        };

        let data_offset = self.spec.data_offset();
        let data_len = match self.spec.column_type().base() {
            BaseType::Bool => len.div_ceil(8),
            BaseType::String | BaseType::Binary => {
                let last = read_array::<i32, _>(self.source, data_offset + (len * 4) as u64, 1)?;
                let last = usize::try_from(last[0]).map_err(|_| invalid_offsets(0, last[0]))?;
                offsets_region_len(len) + last
            }
            BaseType::Int8 | BaseType::UInt8 => len,
            BaseType::Int16 | BaseType::UInt16 => len * 2,
            BaseType::Int32
            | BaseType::UInt32
            | BaseType::Float
            | BaseType::Date
            | BaseType::Category => len * 4,
            BaseType::Int64
            | BaseType::UInt64
            | BaseType::Double
            | BaseType::Timestamp(_)
            | BaseType::Time(_) => len * 8,
        };
        let data = self.source.read_at(data_offset, data_len)?;

        Ok(Cells {
            spec: self.spec,
            validity,
            data,
            row: 0,
        })
    }
}

/// Iterator over the cells of a column read into memory.
#[derive(Debug)]
pub struct Cells<'a> {
    spec: &'a ColumnSpec,
    validity: Option<Bitmap>,
    data: Bytes,
    row: usize,
}

impl<'a> Iterator for Cells<'a> {
    type Item = Result<Cell>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.row >= self.spec.len() {
            return None;
        }
        let row = self.row;
        self.row += 1;

        if let Some(validity) = &self.validity {
            if !validity.value(row) {
                return Some(make_cell(self.spec, None));
            }
        }

        Some(read_value(self.spec, &self.data, 0, row).and_then(|v| make_cell(self.spec, Some(v))))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.spec.len() - self.row;
        (remaining, Some(remaining))
    }
}

impl<'a> ExactSizeIterator for Cells<'a> {}

/// Read a UTF-8 array without nulls, e.g. category levels.
pub fn read_utf8_array<R>(source: &R, desc: &PrimitiveArrayDescriptor) -> Result<Vec<String>>
where
    R: ByteRangeSource + ?Sized,
{
    let offsets = read_array::<i32, _>(source, desc.offset, desc.length + 1)?;
    let values_start = desc.offset + offsets_region_len(desc.length) as u64;

    offsets
        .windows(2)
        .map(|w| {
            let (start, end) = (w[0], w[1]);
            if start < 0 || end < start {
                return Err(invalid_offsets(start, end));
            }
            let bytes = source.read_at(values_start + start as u64, (end - start) as usize)?;
            Ok(String::from_utf8(bytes.to_vec())?)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::LogicalColumnType;
    use feather_error::ErrorKind;
    use std::sync::Arc;

    /// Int16 values 1, 2, 3 with the middle one null.
    fn nullable_int16() -> (ColumnSpec, Vec<u8>) {
        let mut buf = vec![0b0000_0101, 0, 0, 0, 0, 0, 0, 0];
        for v in [1_i16, 0, 3] {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        let spec = ColumnSpec::new("n", 3, LogicalColumnType::NullableInt16, 8).with_nulls(1, 0);
        (spec, buf)
    }

    #[test]
    fn single_cells() {
        let (spec, buf) = nullable_int16();
        let decoder = ColumnDecoder::new(&spec, &buf);

        assert_eq!(Some(&CellValue::Int16(1)), decoder.cell(0).unwrap().value());
        assert!(decoder.cell(1).unwrap().is_null());
        assert_eq!(Some(&CellValue::Int16(3)), decoder.cell(2).unwrap().value());
        assert!(decoder.cell(3).is_err());
    }

    #[test]
    fn all_cells_match_single_reads() {
        let (spec, buf) = nullable_int16();
        let decoder = ColumnDecoder::new(&spec, &buf);

        let cells = decoder.cells().unwrap();
        assert_eq!(3, cells.len());
        let cells: Vec<_> = cells.collect::<Result<_>>().unwrap();
        for (row, cell) in cells.iter().enumerate() {
            assert_eq!(&decoder.cell(row).unwrap(), cell);
        }
    }

    #[test]
    fn strings() {
        let mut buf = Vec::new();
        for offset in [0_i32, 3, 3, 8] {
            buf.extend_from_slice(&offset.to_le_bytes());
        }
        buf.extend_from_slice(b"foohello");
        let spec = ColumnSpec::new("s", 3, LogicalColumnType::String, 0);
        let decoder = ColumnDecoder::new(&spec, &buf);

        let got: Vec<_> = decoder
            .cells()
            .unwrap()
            .map(|c| c.unwrap().to_string())
            .collect();
        assert_eq!(vec!["foo", "", "hello"], got);
        assert_eq!(
            Some(&CellValue::String("hello".to_string())),
            decoder.cell(2).unwrap().value()
        );
    }

    #[test]
    fn bools() {
        let buf = vec![0b1000_0010, 0b0000_0001];
        let spec = ColumnSpec::new("b", 9, LogicalColumnType::Bool, 0);
        let got: Vec<_> = ColumnDecoder::new(&spec, &buf)
            .cells()
            .unwrap()
            .map(|c| c.unwrap().into_value())
            .collect();

        let expected: Vec<_> = [false, true, false, false, false, false, false, true, true]
            .into_iter()
            .map(|b| Some(CellValue::Bool(b)))
            .collect();
        assert_eq!(expected, got);
    }

    #[test]
    fn categories_check_indices() {
        let mut buf = Vec::new();
        for idx in [1_i32, 0, 2] {
            buf.extend_from_slice(&idx.to_le_bytes());
        }
        let levels: Arc<[String]> = vec!["a".to_string(), "b".to_string()].into();
        let spec = ColumnSpec::new("c", 3, LogicalColumnType::Category, 0).with_levels(levels);
        let decoder = ColumnDecoder::new(&spec, &buf);

        assert_eq!(Some(1), decoder.cell(0).unwrap().category_index());
        assert_eq!("a", decoder.cell(1).unwrap().to_string());
        let err = decoder.cell(2).unwrap_err();
        assert_eq!(ErrorKind::Internal, err.kind());
    }

    #[test]
    fn utf8_array() {
        let mut buf = vec![0xFF; 8];
        for offset in [0_i32, 2, 5] {
            buf.extend_from_slice(&offset.to_le_bytes());
        }
        buf.extend_from_slice(&[0; 4]);
        buf.extend_from_slice(b"hiyou");

        let desc = PrimitiveArrayDescriptor {
            value_type: crate::datatype::NominalType::Utf8,
            offset: 8,
            length: 2,
            null_count: 0,
            total_bytes: 24,
        };
        assert_eq!(
            vec!["hi".to_string(), "you".to_string()],
            read_utf8_array(&buf, &desc).unwrap()
        );
    }
}
