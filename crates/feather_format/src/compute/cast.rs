//! Converting decoded cells into host values.
//!
//! Unlike widening, every target has exactly one conversion routine. The
//! routine for a target is picked once and cached for the life of the process.
use feather_error::{FeatherError, Result};
use num::NumCast;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

use crate::catalog::base_maps_to;
use crate::category::{resolve_mapping, CategoryEnumMapType, EnumResolution, MergedEnumUniverse};
use crate::compute::temporal::{date_to_datetime, time_to_timedelta, timestamp_to_datetime};
use crate::host::{EnumType, EnumValue, HostKind, HostRepr, HostType, HostValue, MergedEnumValue};
use crate::scalar::{Cell, CellValue};

/// Conversion routine for one target host type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CastPlan {
    /// Target is the cell itself.
    Identity,
    Bool,
    /// Any numeric cell whose column type promotes to the target kind.
    Numeric(HostKind),
    /// String cells, or the level of a category cell.
    String,
    Binary,
    /// Timestamp or date cells.
    DateTime { with_offset: bool },
    /// Time cells.
    TimeSpan,
    /// Category cells, mapped through an enum resolution.
    Enum(EnumType),
    /// Category cells, level looked up in a merged universe.
    MergedEnum(Arc<MergedEnumUniverse>),
    /// Category cells, producing the level string.
    AnyEnum,
}

impl CastPlan {
    fn for_kind(kind: &HostKind) -> Self {
        match kind {
            HostKind::Cell => Self::Identity,
            HostKind::Bool => Self::Bool,
            HostKind::Int8
            | HostKind::UInt8
            | HostKind::Int16
            | HostKind::UInt16
            | HostKind::Int32
            | HostKind::UInt32
            | HostKind::Int64
            | HostKind::UInt64
            | HostKind::Float32
            | HostKind::Float64 => Self::Numeric(kind.clone()),
            HostKind::String => Self::String,
            HostKind::Binary => Self::Binary,
            HostKind::DateTime => Self::DateTime { with_offset: false },
            HostKind::DateTimeOffset => Self::DateTime { with_offset: true },
            HostKind::TimeSpan => Self::TimeSpan,
            HostKind::Enum(typ) => Self::Enum(typ.clone()),
            HostKind::MergedEnum(universe) => Self::MergedEnum(universe.clone()),
            HostKind::AnyEnum => Self::AnyEnum,
        }
    }

    /// Apply to a non-null cell value.
    ///
    /// Returns None if the value isn't the shape this plan accepts.
    fn apply(&self, value: &CellValue, ctx: Option<&EnumResolution>) -> Result<Option<HostValue>> {
        Ok(match (self, value) {
            (Self::Bool, CellValue::Bool(v)) => Some(HostValue::Bool(*v)),
            (Self::Numeric(kind), value) => cast_numeric(kind, value),
            (Self::String, CellValue::String(v)) => Some(HostValue::String(v.clone())),
            (Self::String | Self::AnyEnum, CellValue::Category { index, levels }) => {
                level_of(*index, levels).map(|l| HostValue::String(l.to_string()))
            }
            (Self::Binary, CellValue::Binary(v)) => Some(HostValue::Binary(v.clone())),
            (Self::DateTime { with_offset }, value) => {
                let datetime = match value {
                    CellValue::Timestamp { value, unit } => timestamp_to_datetime(*value, *unit),
                    CellValue::Date(days) => date_to_datetime(*days),
                    _ => return Ok(None),
                };
                let datetime = datetime.ok_or_else(|| {
                    FeatherError::incompatible_cast(format!("{value} is out of range"))
                })?;
                Some(if *with_offset {
                    HostValue::DateTimeOffset(datetime.fixed_offset())
                } else {
                    HostValue::DateTime(datetime)
                })
            }
            (Self::TimeSpan, CellValue::Time { value, unit }) => {
                let delta = time_to_timedelta(*value, *unit).ok_or_else(|| {
                    FeatherError::incompatible_cast(format!("Time {value} is out of range"))
                })?;
                Some(HostValue::TimeSpan(delta))
            }
            (Self::Enum(typ), CellValue::Category { index, levels }) => {
                Some(HostValue::Enum(cast_enum(typ, *index, levels, ctx)?))
            }
            (Self::MergedEnum(universe), CellValue::Category { index, levels }) => {
                let ordinal = level_of(*index, levels).and_then(|l| universe.ordinal_of(l));
                ordinal.map(|ordinal| {
                    HostValue::MergedEnum(MergedEnumValue {
                        universe: universe.clone(),
                        ordinal,
                    })
                })
            }
            _ => None,
        })
    }
}

fn level_of(index: i32, levels: &[String]) -> Option<&str> {
    usize::try_from(index)
        .ok()
        .and_then(|idx| levels.get(idx))
        .map(|s| s.as_str())
}

fn numeric_as<T: NumCast>(value: &CellValue) -> Option<T> {
    match value {
        CellValue::Int8(v) => T::from(*v),
        CellValue::UInt8(v) => T::from(*v),
        CellValue::Int16(v) => T::from(*v),
        CellValue::UInt16(v) => T::from(*v),
        CellValue::Int32(v) => T::from(*v),
        CellValue::UInt32(v) => T::from(*v),
        CellValue::Int64(v) => T::from(*v),
        CellValue::UInt64(v) => T::from(*v),
        CellValue::Float(v) => T::from(*v),
        CellValue::Double(v) => T::from(*v),
        _ => None,
    }
}

fn cast_numeric(kind: &HostKind, value: &CellValue) -> Option<HostValue> {
    // Only promotions, same as what the catalog allows for the column.
    if !base_maps_to(value.base_type(), kind, None) {
        return None;
    }

    match kind {
        HostKind::Int8 => numeric_as(value).map(HostValue::Int8),
        HostKind::UInt8 => numeric_as(value).map(HostValue::UInt8),
        HostKind::Int16 => numeric_as(value).map(HostValue::Int16),
        HostKind::UInt16 => numeric_as(value).map(HostValue::UInt16),
        HostKind::Int32 => numeric_as(value).map(HostValue::Int32),
        HostKind::UInt32 => numeric_as(value).map(HostValue::UInt32),
        HostKind::Int64 => numeric_as(value).map(HostValue::Int64),
        HostKind::UInt64 => numeric_as(value).map(HostValue::UInt64),
        HostKind::Float32 => numeric_as(value).map(HostValue::Float32),
        HostKind::Float64 => numeric_as(value).map(HostValue::Float64),
        _ => None,
    }
}

/// Map a category index to a member of `typ`.
fn cast_enum(
    typ: &EnumType,
    index: i32,
    levels: &[String],
    ctx: Option<&EnumResolution>,
) -> Result<EnumValue> {
    let map_type = match ctx {
        Some(ctx) if ctx.enum_type == *typ => ctx.map_type,
        Some(ctx) => {
            return Err(FeatherError::incompatible_cast(format!(
                "Mapping resolved for {} cannot be used to produce {typ}",
                ctx.enum_type
            )))
        }
        None => resolve_mapping(typ, levels),
    };

    let value = match map_type {
        CategoryEnumMapType::ByName => level_of(index, levels)
            .and_then(|level| typ.member_by_name_ignore_case(level))
            .map(|member| member.value),
        CategoryEnumMapType::ByOrdinal => {
            let value = index as i64;
            typ.is_defined(value).then_some(value)
        }
        CategoryEnumMapType::None => {
            return Err(FeatherError::unresolvable_category_mapping(format!(
                "Levels cannot be mapped to {typ}"
            )))
        }
    };

    match value {
        Some(value) => Ok(EnumValue {
            typ: typ.clone(),
            value,
        }),
        None => Err(FeatherError::incompatible_cast(format!(
            "Category index {index} has no corresponding member in {typ}"
        ))),
    }
}

/// Process-wide cache of cast plans, keyed by target host type.
#[derive(Debug, Default)]
pub struct ConversionCache {
    plans: RwLock<HashMap<HostType, Arc<CastPlan>>>,
}

static CONVERSION_CACHE: Lazy<ConversionCache> = Lazy::new(ConversionCache::default);

impl ConversionCache {
    pub fn global() -> &'static ConversionCache {
        &CONVERSION_CACHE
    }

    /// Get the plan for a target, resolving it on first use.
    ///
    /// Resolution is pure, so concurrent first uses may both resolve and the
    /// last insert wins.
    pub fn plan_for(&self, target: &HostType) -> Arc<CastPlan> {
        if let Some(plan) = self.plans.read().get(target) {
            return plan.clone();
        }

        let plan = Arc::new(CastPlan::for_kind(&target.kind));
        trace!(%target, ?plan, "resolved cast plan");
        self.plans.write().insert(target.clone(), plan.clone());

        plan
    }

    /// Convert a cell into a boxed value of `target`.
    pub fn cast_dyn(
        &self,
        cell: &Cell,
        target: &HostType,
        ctx: Option<&EnumResolution>,
    ) -> Result<HostValue> {
        let plan = self.plan_for(target);
        if *plan == CastPlan::Identity {
            return Ok(HostValue::Cell(cell.clone()));
        }

        let value = match cell.value() {
            Some(value) => value,
            None if target.nullable => return Ok(HostValue::Null),
            None => {
                return Err(FeatherError::incompatible_cast(format!(
                    "Cannot cast a null {} cell to {target}",
                    cell.column_type()
                )))
            }
        };

        match plan.apply(value, ctx)? {
            Some(v) => Ok(v),
            None => Err(FeatherError::incompatible_cast(format!(
                "Cannot cast {} cell '{value}' to {target}",
                cell.column_type()
            ))),
        }
    }
}

/// Convert a cell into `T`.
pub fn cast<T: HostRepr>(cell: &Cell, ctx: Option<&EnumResolution>) -> Result<T> {
    let value = ConversionCache::global().cast_dyn(cell, &T::host_type(), ctx)?;
    T::from_host_value(value)
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
    use feather_error::ErrorKind;

    use super::*;
    use crate::category::merge_enum_universe;
    use crate::datatype::{LogicalColumnType, TimeUnit};
    use crate::host::HostEnum;
    use crate::testutil::{levels, Color};

    fn category(typ: LogicalColumnType, index: i32, levels: &Arc<[String]>) -> Cell {
        Cell::try_new(
            typ,
            CellValue::Category {
                index,
                levels: levels.clone(),
            },
        )
        .unwrap()
    }

    #[test]
    fn identity_for_cells() {
        let cell = Cell::try_new(LogicalColumnType::Int8, CellValue::Int8(3)).unwrap();
        let got: Cell = cast(&cell, None).unwrap();
        assert_eq!(cell, got);
    }

    #[test]
    fn numeric_promotions() {
        let cell = Cell::try_new(LogicalColumnType::Int16, CellValue::Int16(-300)).unwrap();
        assert_eq!(-300, cast::<i16>(&cell, None).unwrap());
        assert_eq!(-300, cast::<i32>(&cell, None).unwrap());
        assert_eq!(-300, cast::<i64>(&cell, None).unwrap());
        assert_eq!(-300.0, cast::<f64>(&cell, None).unwrap());

        let err = cast::<i8>(&cell, None).unwrap_err();
        assert_eq!(ErrorKind::IncompatibleCast, err.kind());
        let err = cast::<u16>(&cell, None).unwrap_err();
        assert_eq!(ErrorKind::IncompatibleCast, err.kind());

        let cell = Cell::try_new(LogicalColumnType::UInt8, CellValue::UInt8(200)).unwrap();
        assert_eq!(200, cast::<i16>(&cell, None).unwrap());
        assert_eq!(200, cast::<u64>(&cell, None).unwrap());
    }

    #[test]
    fn nulls() {
        let cell = Cell::try_null(LogicalColumnType::NullableInt32).unwrap();
        assert_eq!(None, cast::<Option<i32>>(&cell, None).unwrap());
        assert_eq!(None, cast::<Option<i64>>(&cell, None).unwrap());

        let err = cast::<i32>(&cell, None).unwrap_err();
        assert_eq!(ErrorKind::IncompatibleCast, err.kind());

        let cell = Cell::try_new(LogicalColumnType::NullableInt32, CellValue::Int32(4)).unwrap();
        assert_eq!(Some(4), cast::<Option<i32>>(&cell, None).unwrap());
    }

    #[test]
    fn strings_and_levels() {
        let cell =
            Cell::try_new(LogicalColumnType::String, CellValue::String("abc".to_string())).unwrap();
        assert_eq!("abc", cast::<String>(&cell, None).unwrap());
        assert!(cast::<i32>(&cell, None).is_err());

        let levels: Arc<[String]> = levels(&["lo", "hi"]).into();
        let cell = category(LogicalColumnType::Category, 1, &levels);
        assert_eq!("hi", cast::<String>(&cell, None).unwrap());

        let value = ConversionCache::global()
            .cast_dyn(&cell, &HostType::new(HostKind::AnyEnum), None)
            .unwrap();
        assert_eq!(HostValue::String("hi".to_string()), value);

        let cell = category(LogicalColumnType::Category, 5, &levels);
        assert!(cast::<String>(&cell, None).is_err());
    }

    #[test]
    fn temporal() {
        let cell = Cell::try_new(
            LogicalColumnType::TimestampMillisecond,
            CellValue::Timestamp {
                value: 1_500,
                unit: TimeUnit::Millisecond,
            },
        )
        .unwrap();
        let dt: DateTime<Utc> = cast(&cell, None).unwrap();
        assert_eq!(DateTime::from_timestamp(1, 500_000_000).unwrap(), dt);

        let offset: DateTime<FixedOffset> = cast(&cell, None).unwrap();
        assert_eq!(dt, offset.with_timezone(&Utc));

        let cell = Cell::try_new(LogicalColumnType::Date, CellValue::Date(2)).unwrap();
        let dt: DateTime<Utc> = cast(&cell, None).unwrap();
        assert_eq!(2 * 86400, dt.timestamp());

        let cell = Cell::try_new(
            LogicalColumnType::NullableTimeMicrosecond,
            CellValue::Time {
                value: 2_000_001,
                unit: TimeUnit::Microsecond,
            },
        )
        .unwrap();
        let delta: Option<TimeDelta> = cast(&cell, None).unwrap();
        assert_eq!(
            Some(TimeDelta::try_seconds(2).unwrap() + TimeDelta::microseconds(1)),
            delta
        );
        assert!(cast::<DateTime<Utc>>(&cell, None).is_err());
    }

    #[test]
    fn enum_by_ordinal_round_trips() {
        let levels: Arc<[String]> = levels(&["x", "y", "z"]).into();
        let ctx = EnumResolution {
            enum_type: Color::enum_type(),
            map_type: resolve_mapping(&Color::enum_type(), &levels),
        };
        assert_eq!(CategoryEnumMapType::ByOrdinal, ctx.map_type);

        for index in 0..levels.len() as i32 {
            let cell = category(LogicalColumnType::Category, index, &levels);
            let got: Color = cast(&cell, Some(&ctx)).unwrap();
            assert_eq!(Some(got), Color::from_value(index as i64));
        }
    }

    #[test]
    fn enum_by_name() {
        let levels: Arc<[String]> = levels(&["BLUE", "red"]).into();
        let ctx = EnumResolution {
            enum_type: Color::enum_type(),
            map_type: CategoryEnumMapType::ByName,
        };

        let cell = category(LogicalColumnType::NullableCategory, 0, &levels);
        assert_eq!(Some(Color::Blue), cast::<Option<Color>>(&cell, Some(&ctx)).unwrap());
        let cell = category(LogicalColumnType::NullableCategory, 1, &levels);
        assert_eq!(Some(Color::Red), cast::<Option<Color>>(&cell, Some(&ctx)).unwrap());

        // Resolved on the fly without a context.
        assert_eq!(Color::Red, cast::<Color>(&cell, None).unwrap());

        let null = Cell::try_null(LogicalColumnType::NullableCategory).unwrap();
        assert_eq!(None, cast::<Option<Color>>(&null, Some(&ctx)).unwrap());
    }

    #[test]
    fn enum_unresolvable() {
        let levels: Arc<[String]> = levels(&["a", "b", "c", "d"]).into();
        let cell = category(LogicalColumnType::Category, 0, &levels);

        let err = cast::<Color>(&cell, None).unwrap_err();
        assert_eq!(ErrorKind::UnresolvableCategoryMapping, err.kind());

        // Context for a different enum.
        let ctx = EnumResolution {
            enum_type: EnumType::new("Other", [("a", 0)]),
            map_type: CategoryEnumMapType::ByOrdinal,
        };
        let err = cast::<Color>(&cell, Some(&ctx)).unwrap_err();
        assert_eq!(ErrorKind::IncompatibleCast, err.kind());
    }

    #[test]
    fn merged_enum() {
        let a = EnumType::new("A", [("cat", 0)]);
        let b = EnumType::new("B", [("Dog", 0)]);
        let universe = merge_enum_universe(&[a, b]).unwrap();
        let target = HostType::new(HostKind::MergedEnum(universe.clone()));

        let levels: Arc<[String]> = levels(&["dog", "CAT"]).into();
        let cell = category(LogicalColumnType::Category, 0, &levels);
        let value = ConversionCache::global()
            .cast_dyn(&cell, &target, None)
            .unwrap();
        assert_eq!(
            HostValue::MergedEnum(MergedEnumValue {
                universe,
                ordinal: 2,
            }),
            value
        );
    }

    #[test]
    fn plans_are_memoized() {
        let cache = ConversionCache::default();
        let target = HostType::new(HostKind::UInt32);
        let a = cache.plan_for(&target);
        let b = cache.plan_for(&target);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(CastPlan::Numeric(HostKind::UInt32), *a);
    }
}
