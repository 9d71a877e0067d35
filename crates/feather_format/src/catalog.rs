//! Static facts about logical column types.
//!
//! Everything in here is a pure lookup. The only derived state involved in
//! mapping decisions (enum/category resolution) lives in `category`.
use feather_error::{FeatherError, Result};

use crate::category::{resolve_mapping, CategoryEnumMapType};
use crate::compute::widen::Widener;
use crate::datatype::{BaseType, LogicalColumnType, NominalType, PrimitiveKind, TimeUnit};
use crate::host::{HostKind, HostType};

/// Byte alignment of a column's values.
///
/// Binary columns don't have a layout yet.
pub fn alignment_of(typ: LogicalColumnType) -> Result<usize> {
    Ok(match typ.base() {
        BaseType::Bool | BaseType::Int8 | BaseType::UInt8 => 1,
        BaseType::Int16 | BaseType::UInt16 => 2,
        BaseType::Int32
        | BaseType::UInt32
        | BaseType::Float
        | BaseType::Category
        | BaseType::Date
        | BaseType::String => 4,
        BaseType::Int64
        | BaseType::UInt64
        | BaseType::Double
        | BaseType::Timestamp(_)
        | BaseType::Time(_) => 8,
        BaseType::Binary => {
            return Err(FeatherError::unsupported_layout(format!(
                "No alignment defined for {typ}"
            )))
        }
    })
}

/// Physical primitive a column is stored as.
///
/// Categories are always stored as 4-byte indices and timestamps/times as
/// 8-byte integers, regardless of the nominal type the format defines for
/// them. Existing producers of the format expect exactly this.
pub fn physical_type_of(typ: LogicalColumnType) -> Result<PrimitiveKind> {
    Ok(match typ.base() {
        BaseType::Bool => PrimitiveKind::Bool,
        BaseType::Int8 => PrimitiveKind::Int8,
        BaseType::UInt8 => PrimitiveKind::UInt8,
        BaseType::Int16 => PrimitiveKind::Int16,
        BaseType::UInt16 => PrimitiveKind::UInt16,
        BaseType::Int32 => PrimitiveKind::Int32,
        BaseType::UInt32 => PrimitiveKind::UInt32,
        BaseType::Int64 => PrimitiveKind::Int64,
        BaseType::UInt64 => PrimitiveKind::UInt64,
        BaseType::Float => PrimitiveKind::Float,
        BaseType::Double => PrimitiveKind::Double,
        BaseType::String => PrimitiveKind::Utf8,
        BaseType::Binary => PrimitiveKind::Binary,
        BaseType::Category => PrimitiveKind::Int32,
        BaseType::Date => PrimitiveKind::Int32,
        BaseType::Timestamp(_) | BaseType::Time(_) => PrimitiveKind::Int64,
    })
}

/// Type the format nominally declares for a column.
pub const fn nominal_type_of(typ: LogicalColumnType) -> NominalType {
    match typ.base() {
        BaseType::Bool => NominalType::Bool,
        BaseType::Int8 => NominalType::Int8,
        BaseType::UInt8 => NominalType::UInt8,
        BaseType::Int16 => NominalType::Int16,
        BaseType::UInt16 => NominalType::UInt16,
        BaseType::Int32 => NominalType::Int32,
        BaseType::UInt32 => NominalType::UInt32,
        BaseType::Int64 => NominalType::Int64,
        BaseType::UInt64 => NominalType::UInt64,
        BaseType::Float => NominalType::Float,
        BaseType::Double => NominalType::Double,
        BaseType::String => NominalType::Utf8,
        BaseType::Binary => NominalType::Binary,
        BaseType::Category => NominalType::Category,
        BaseType::Date => NominalType::Date,
        BaseType::Timestamp(_) => NominalType::Timestamp,
        BaseType::Time(_) => NominalType::Time,
    }
}

/// Default host type used when the caller doesn't ask for a specific one.
pub fn host_type_of(typ: LogicalColumnType) -> HostType {
    let kind = match typ.base() {
        BaseType::Bool => HostKind::Bool,
        BaseType::Int8 => HostKind::Int8,
        BaseType::UInt8 => HostKind::UInt8,
        BaseType::Int16 => HostKind::Int16,
        BaseType::UInt16 => HostKind::UInt16,
        BaseType::Int32 => HostKind::Int32,
        BaseType::UInt32 => HostKind::UInt32,
        BaseType::Int64 => HostKind::Int64,
        BaseType::UInt64 => HostKind::UInt64,
        BaseType::Float => HostKind::Float32,
        BaseType::Double => HostKind::Float64,
        BaseType::String => HostKind::String,
        BaseType::Binary => HostKind::Binary,
        BaseType::Category => HostKind::AnyEnum,
        BaseType::Date | BaseType::Timestamp(_) => HostKind::DateTime,
        BaseType::Time(_) => HostKind::TimeSpan,
    };

    HostType {
        kind,
        nullable: typ.is_nullable(),
    }
}

/// Check if values of a column can be read as `host`.
///
/// Numeric columns may be read into wider types only (implicit promotion).
/// Nullable columns require a nullable host type. Category columns may be
/// read as strings or enums only when levels are known, and as a specific
/// enum only if its members can be related to the levels.
pub fn can_map_to(typ: LogicalColumnType, host: &HostType, levels: Option<&[String]>) -> bool {
    if host.kind == HostKind::Cell {
        return true;
    }

    if typ.is_nullable() && !host.nullable {
        return false;
    }

    base_maps_to(typ.base(), &host.kind, levels)
}

/// Mapping check ignoring nullability.
pub(crate) fn base_maps_to(base: BaseType, kind: &HostKind, levels: Option<&[String]>) -> bool {
    use HostKind as H;

    match base {
        BaseType::Bool => matches!(kind, H::Bool),
        BaseType::Int8 => matches!(
            kind,
            H::Int8 | H::Int16 | H::Int32 | H::Int64 | H::Float32 | H::Float64
        ),
        BaseType::UInt8 => matches!(
            kind,
            H::UInt8
                | H::Int16
                | H::UInt16
                | H::Int32
                | H::UInt32
                | H::Int64
                | H::UInt64
                | H::Float32
                | H::Float64
        ),
        BaseType::Int16 => matches!(
            kind,
            H::Int16 | H::Int32 | H::Int64 | H::Float32 | H::Float64
        ),
        BaseType::UInt16 => matches!(
            kind,
            H::UInt16 | H::Int32 | H::UInt32 | H::Int64 | H::UInt64 | H::Float32 | H::Float64
        ),
        BaseType::Int32 => matches!(kind, H::Int32 | H::Int64 | H::Float32 | H::Float64),
        BaseType::UInt32 => matches!(
            kind,
            H::UInt32 | H::Int64 | H::UInt64 | H::Float32 | H::Float64
        ),
        BaseType::Int64 => matches!(kind, H::Int64 | H::Float32 | H::Float64),
        BaseType::UInt64 => matches!(kind, H::UInt64 | H::Float32 | H::Float64),
        BaseType::Float => matches!(kind, H::Float32 | H::Float64),
        BaseType::Double => matches!(kind, H::Float64),
        BaseType::String => matches!(kind, H::String),
        BaseType::Binary => matches!(kind, H::Binary),
        BaseType::Category => match kind {
            H::AnyEnum => true,
            H::String => levels.is_some(),
            H::Enum(enum_type) => levels
                .is_some_and(|l| resolve_mapping(enum_type, l) != CategoryEnumMapType::None),
            H::MergedEnum(universe) => levels.is_some_and(|l| universe.contains_all(l)),
            _ => false,
        },
        BaseType::Date | BaseType::Timestamp(_) => matches!(kind, H::DateTime | H::DateTimeOffset),
        BaseType::Time(_) => matches!(kind, H::TimeSpan),
    }
}

/// Like `can_map_to`, but produces an error describing the mismatch.
pub fn check_mappable(
    name: &str,
    typ: LogicalColumnType,
    host: &HostType,
    levels: Option<&[String]>,
) -> Result<()> {
    if can_map_to(typ, host, levels) {
        return Ok(());
    }

    Err(FeatherError::unmappable_column(format!(
        "Column '{name}' of type {typ} cannot be mapped to {host}"
    )))
}

/// Logical column type a host type is written as by default.
///
/// Instants become timestamps and durations become times, both using `unit`.
/// Enumerations become categories.
pub fn logical_type_for_write(host: &HostType, unit: TimeUnit) -> Result<LogicalColumnType> {
    let base = match &host.kind {
        HostKind::Bool => BaseType::Bool,
        HostKind::Int8 => BaseType::Int8,
        HostKind::UInt8 => BaseType::UInt8,
        HostKind::Int16 => BaseType::Int16,
        HostKind::UInt16 => BaseType::UInt16,
        HostKind::Int32 => BaseType::Int32,
        HostKind::UInt32 => BaseType::UInt32,
        HostKind::Int64 => BaseType::Int64,
        HostKind::UInt64 => BaseType::UInt64,
        HostKind::Float32 => BaseType::Float,
        HostKind::Float64 => BaseType::Double,
        HostKind::String => BaseType::String,
        HostKind::Binary => BaseType::Binary,
        HostKind::DateTime | HostKind::DateTimeOffset => BaseType::Timestamp(unit),
        HostKind::TimeSpan => BaseType::Time(unit),
        HostKind::Enum(_) | HostKind::MergedEnum(_) => BaseType::Category,
        HostKind::AnyEnum | HostKind::Cell => {
            return Err(FeatherError::unmappable_column(format!(
                "Host type {host} has no column representation"
            )))
        }
    };

    Ok(LogicalColumnType::from_parts(base, host.nullable))
}

/// Host type values must be widened to before being written to a column of
/// type `target`.
///
/// `source` decides which enumeration a category column is written from, and
/// must otherwise widen to the column's default host type. Date columns can't be written since there's no host date type with a
/// sensible on-disk mapping.
pub fn write_host_type(target: LogicalColumnType, source: &HostType) -> Result<HostType> {
    let kind = match target.base() {
        BaseType::Date => {
            return Err(FeatherError::unmappable_column(format!(
                "Writing {target} columns is not supported"
            )))
        }
        BaseType::Category => match &source.kind {
            kind @ (HostKind::Enum(_) | HostKind::MergedEnum(_)) => kind.clone(),
            other => {
                return Err(FeatherError::unmappable_column(format!(
                    "Cannot write {other} values as a category"
                )))
            }
        },
        _ => host_type_of(target).kind,
    };

    if !Widener::accepts_kind(&kind, &source.kind) {
        return Err(FeatherError::unmappable_column(format!(
            "Cannot write {} values as {target}",
            source.kind
        )));
    }

    Ok(HostType {
        kind,
        nullable: target.is_nullable(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::merge_enum_universe;
    use crate::host::EnumType;
    use feather_error::ErrorKind;

    #[test]
    fn alignment_table() {
        use LogicalColumnType as L;
        let expected = [
            (L::Bool, 1),
            (L::Int8, 1),
            (L::UInt8, 1),
            (L::Int16, 2),
            (L::NullableUInt16, 2),
            (L::Int32, 4),
            (L::Float, 4),
            (L::Category, 4),
            (L::NullableCategory, 4),
            (L::Date, 4),
            (L::String, 4),
            (L::Int64, 8),
            (L::Double, 8),
            (L::TimestampSecond, 8),
            (L::NullableTimeNanosecond, 8),
        ];

        for (typ, align) in expected {
            assert_eq!(align, alignment_of(typ).unwrap(), "type: {typ}");
        }
    }

    #[test]
    fn alignment_same_for_nullable() {
        for typ in LogicalColumnType::ALL {
            match (alignment_of(typ), alignment_of(typ.to_nullable())) {
                (Ok(a), Ok(b)) => assert_eq!(a, b),
                (Err(_), Err(_)) => (),
                _ => panic!("nullability changed alignment for {typ}"),
            }
        }
    }

    #[test]
    fn binary_alignment_unsupported() {
        let err = alignment_of(LogicalColumnType::NullableBinary).unwrap_err();
        assert_eq!(ErrorKind::UnsupportedLayout, err.kind());
    }

    #[test]
    fn physical_quirks() {
        for typ in LogicalColumnType::ALL {
            let physical = physical_type_of(typ).unwrap();
            match typ.base() {
                BaseType::Category => assert_eq!(PrimitiveKind::Int32, physical),
                BaseType::Timestamp(_) | BaseType::Time(_) => {
                    assert_eq!(PrimitiveKind::Int64, physical)
                }
                _ => (),
            }
        }

        assert_eq!(
            NominalType::Timestamp,
            nominal_type_of(LogicalColumnType::TimestampNanosecond)
        );
    }

    #[test]
    fn aligned_types_match_physical_width() {
        for typ in LogicalColumnType::ALL {
            let physical = physical_type_of(typ).unwrap();
            if let (Some(width), Ok(align)) = (physical.fixed_width(), alignment_of(typ)) {
                assert_eq!(width, align, "type: {typ}");
            }
        }
    }

    #[test]
    fn default_host_type_maps() {
        let levels = vec!["a".to_string()];
        for typ in LogicalColumnType::ALL {
            let host = host_type_of(typ);
            assert!(can_map_to(typ, &host, Some(&levels)), "type: {typ}");
            assert!(can_map_to(typ, &host, None), "type: {typ}");
        }
    }

    #[test]
    fn widening_only() {
        let i16_col = LogicalColumnType::Int16;
        for kind in [
            HostKind::Int16,
            HostKind::Int32,
            HostKind::Int64,
            HostKind::Float32,
            HostKind::Float64,
        ] {
            assert!(can_map_to(i16_col, &HostType::new(kind), None));
        }

        assert!(!can_map_to(i16_col, &HostType::new(HostKind::Int8), None));
        assert!(!can_map_to(i16_col, &HostType::new(HostKind::UInt16), None));
        assert!(!can_map_to(
            LogicalColumnType::Int32,
            &HostType::new(HostKind::Int16),
            None
        ));
        assert!(!can_map_to(
            LogicalColumnType::Double,
            &HostType::new(HostKind::Float32),
            None
        ));
    }

    #[test]
    fn nullable_needs_nullable_host() {
        let host = HostType::new(HostKind::Int32);
        assert!(can_map_to(LogicalColumnType::Int32, &host, None));
        assert!(!can_map_to(LogicalColumnType::NullableInt32, &host, None));
        assert!(can_map_to(
            LogicalColumnType::NullableInt32,
            &host.to_nullable(),
            None
        ));
        // Non-nullable column read into a nullable host is fine.
        assert!(can_map_to(
            LogicalColumnType::Int32,
            &host.to_nullable(),
            None
        ));
    }

    #[test]
    fn cell_always_matches() {
        for typ in LogicalColumnType::ALL {
            assert!(can_map_to(typ, &HostType::new(HostKind::Cell), None));
        }
    }

    #[test]
    fn category_requires_levels() {
        let levels = vec!["x".to_string(), "y".to_string()];
        let by_ordinal = EnumType::new("Ord", [("P", 0), ("Q", 1)]);
        let unrelated = EnumType::new("Unrelated", [("P", 3)]);
        let cat = LogicalColumnType::Category;

        let string = HostType::new(HostKind::String);
        assert!(can_map_to(cat, &string, Some(&levels)));
        assert!(!can_map_to(cat, &string, None));

        let ord = HostType::enumeration(by_ordinal);
        assert!(can_map_to(cat, &ord, Some(&levels)));
        assert!(!can_map_to(cat, &ord, None));

        let unrelated = HostType::enumeration(unrelated);
        assert!(!can_map_to(cat, &unrelated, Some(&levels)));

        assert!(!can_map_to(cat, &HostType::new(HostKind::Int32), Some(&levels)));
    }

    #[test]
    fn category_to_merged_universe() {
        let a = EnumType::new("A", [("x", 0)]);
        let b = EnumType::new("B", [("y", 0)]);
        let universe = merge_enum_universe(&[a, b]).unwrap();
        let host = HostType::new(HostKind::MergedEnum(universe));

        let levels = vec!["Y".to_string(), "x".to_string()];
        assert!(can_map_to(LogicalColumnType::Category, &host, Some(&levels)));

        let levels = vec!["z".to_string()];
        assert!(!can_map_to(LogicalColumnType::Category, &host, Some(&levels)));
    }

    #[test]
    fn check_mappable_error() {
        let err = check_mappable(
            "col",
            LogicalColumnType::Int64,
            &HostType::new(HostKind::Int32),
            None,
        )
        .unwrap_err();
        assert_eq!(ErrorKind::UnmappableColumn, err.kind());
    }

    #[test]
    fn write_types() {
        let host = HostType::nullable(HostKind::DateTimeOffset);
        assert_eq!(
            LogicalColumnType::NullableTimestampMillisecond,
            logical_type_for_write(&host, TimeUnit::Millisecond).unwrap()
        );

        let host = HostType::enumeration(EnumType::new("E", [("A", 0)]));
        assert_eq!(
            LogicalColumnType::Category,
            logical_type_for_write(&host, TimeUnit::Second).unwrap()
        );

        let err = write_host_type(LogicalColumnType::NullableDate, &HostType::new(HostKind::DateTime))
            .unwrap_err();
        assert_eq!(ErrorKind::UnmappableColumn, err.kind());

        let err =
            write_host_type(LogicalColumnType::Category, &HostType::new(HostKind::String)).unwrap_err();
        assert_eq!(ErrorKind::UnmappableColumn, err.kind());

        assert_eq!(
            HostType::nullable(HostKind::Int64),
            write_host_type(LogicalColumnType::NullableInt64, &HostType::new(HostKind::Int8)).unwrap()
        );
    }

    #[test]
    fn write_source_must_widen() {
        for (target, source) in [
            (LogicalColumnType::Int64, HostKind::Bool),
            (LogicalColumnType::Int32, HostKind::Int64),
            (LogicalColumnType::NullableUInt32, HostKind::Int8),
            (LogicalColumnType::TimestampSecond, HostKind::TimeSpan),
            (LogicalColumnType::Bool, HostKind::String),
        ] {
            let err = write_host_type(target, &HostType::new(source.clone())).unwrap_err();
            assert_eq!(ErrorKind::UnmappableColumn, err.kind(), "{source} -> {target}");
        }

        assert_eq!(
            HostType::new(HostKind::String),
            write_host_type(LogicalColumnType::String, &HostType::new(HostKind::Float64)).unwrap()
        );
        assert_eq!(
            HostType::new(HostKind::DateTime),
            write_host_type(
                LogicalColumnType::TimestampMillisecond,
                &HostType::new(HostKind::DateTimeOffset)
            )
            .unwrap()
        );
    }
}
