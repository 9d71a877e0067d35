//! Widening heterogeneous host values into a single host type.
//!
//! Each target accepts a fixed set of source kinds (its own kind plus the
//! kinds that convert to it without loss, along with a few formatting and
//! parsing conversions). Anything else is rejected.
use chrono::Utc;
use feather_error::{FeatherError, Result};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

use crate::category::MergedEnumUniverse;
use crate::compute::format::{
    ConstantTimeSpanFormatter, Float32Formatter, Float64Formatter, Formatter, Int16Formatter,
    Int32Formatter, Int64Formatter, Int8Formatter, UInt16Formatter, UInt32Formatter,
    UInt64Formatter, UInt8Formatter, UniversalSortableFormatter, UniversalSortableOffsetFormatter,
};
use crate::compute::parse::{EnumMemberParser, MergedEnumParser, Parser};
use crate::host::{EnumValue, HostKind, HostRepr, HostType, HostValue, MergedEnumValue};

static WIDENERS: Lazy<RwLock<HashMap<HostType, Arc<Widener>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Converts values into one target host type.
///
/// Stateless once built, shared between all callers widening to the same
/// target.
#[derive(Debug)]
pub struct Widener {
    target: HostType,
    /// Name lookup for enum targets.
    enum_parser: Option<EnumMemberParser>,
}

impl Widener {
    /// Get the widener for a target, building it on first use.
    pub fn for_target(target: &HostType) -> Arc<Widener> {
        if let Some(widener) = WIDENERS.read().get(target) {
            return widener.clone();
        }

        let enum_parser = match &target.kind {
            HostKind::Enum(typ) => Some(EnumMemberParser::new(typ.clone())),
            _ => None,
        };
        let widener = Arc::new(Widener {
            target: target.clone(),
            enum_parser,
        });
        trace!(%target, "built widener");

        WIDENERS
            .write()
            .entry(target.clone())
            .or_insert(widener)
            .clone()
    }

    pub fn target(&self) -> &HostType {
        &self.target
    }

    /// Lazily widen every value produced by `values`.
    pub fn widen<I>(self: &Arc<Self>, values: I) -> WidenIter<I::IntoIter>
    where
        I: IntoIterator<Item = HostValue>,
    {
        WidenIter {
            widener: self.clone(),
            values: values.into_iter(),
            idx: 0,
        }
    }

    /// Widen a single value. `idx` is only used in error messages.
    pub fn widen_value(&self, idx: usize, value: HostValue) -> Result<HostValue> {
        if value.is_null() {
            if self.target.nullable {
                return Ok(HostValue::Null);
            }
            return Err(FeatherError::unwidenable_value(format!(
                "Value of type null at index {idx} cannot be widened to {}",
                self.target
            )));
        }

        match self.convert(value) {
            Ok(v) => Ok(v),
            Err(rejected) => Err(FeatherError::unwidenable_value(format!(
                "Value of type {} at index {idx} cannot be widened to {}",
                rejected.type_name(),
                self.target
            ))),
        }
    }

    /// Check if values of kind `source` may be widened to `target` at all.
    ///
    /// Mirrors the table in `convert`. Individual values can still be
    /// rejected, e.g. strings that don't name an enum member.
    pub fn accepts_kind(target: &HostKind, source: &HostKind) -> bool {
        use HostKind as K;

        const SIGNED: &[HostKind] = &[K::Int8, K::Int16, K::Int32, K::Int64];
        const UNSIGNED: &[HostKind] = &[K::UInt8, K::UInt16, K::UInt32, K::UInt64];

        let within = |kinds: &[HostKind], source: &HostKind, target: &HostKind| {
            match (
                kinds.iter().position(|k| k == source),
                kinds.iter().position(|k| k == target),
            ) {
                (Some(s), Some(t)) => s <= t,
                _ => false,
            }
        };
        let is_integer = |kind: &HostKind| SIGNED.contains(kind) || UNSIGNED.contains(kind);

        match (target, source) {
            (K::Int8 | K::Int16 | K::Int32 | K::Int64, s) => within(SIGNED, s, target),
            (K::UInt8 | K::UInt16 | K::UInt32 | K::UInt64, s) => within(UNSIGNED, s, target),
            (K::Float32, s) => *s == K::Float32 || is_integer(s),
            (K::Float64, s) => matches!(s, K::Float32 | K::Float64) || is_integer(s),
            (K::String, s) => {
                is_integer(s)
                    || matches!(
                        s,
                        K::String
                            | K::Float32
                            | K::Float64
                            | K::DateTime
                            | K::DateTimeOffset
                            | K::TimeSpan
                    )
            }
            (K::DateTime | K::DateTimeOffset, s) => matches!(s, K::DateTime | K::DateTimeOffset),
            (K::Enum(t), s) => match s {
                K::Enum(other) => other == t,
                K::String => true,
                _ => false,
            },
            (K::MergedEnum(u), s) => match s {
                K::MergedEnum(other) => other == u,
                K::Enum(_) | K::String => true,
                _ => false,
            },
            (K::AnyEnum, s) => matches!(s, K::Enum(_) | K::MergedEnum(_) | K::AnyEnum),
            (t, s) => t == s,
        }
    }

    /// Convert a non-null value, handing it back if not accepted.
    fn convert(&self, value: HostValue) -> std::result::Result<HostValue, HostValue> {
        use HostKind as K;
        use HostValue as V;

        Ok(match (&self.target.kind, value) {
            (K::Bool, v @ V::Bool(_)) => v,

            (K::Int8, v @ V::Int8(_)) => v,
            (K::Int16, v @ V::Int16(_)) => v,
            (K::Int16, V::Int8(v)) => V::Int16(v.into()),
            (K::Int32, v @ V::Int32(_)) => v,
            (K::Int32, V::Int16(v)) => V::Int32(v.into()),
            (K::Int32, V::Int8(v)) => V::Int32(v.into()),
            (K::Int64, v @ V::Int64(_)) => v,
            (K::Int64, V::Int32(v)) => V::Int64(v.into()),
            (K::Int64, V::Int16(v)) => V::Int64(v.into()),
            (K::Int64, V::Int8(v)) => V::Int64(v.into()),

            (K::UInt8, v @ V::UInt8(_)) => v,
            (K::UInt16, v @ V::UInt16(_)) => v,
            (K::UInt16, V::UInt8(v)) => V::UInt16(v.into()),
            (K::UInt32, v @ V::UInt32(_)) => v,
            (K::UInt32, V::UInt16(v)) => V::UInt32(v.into()),
            (K::UInt32, V::UInt8(v)) => V::UInt32(v.into()),
            (K::UInt64, v @ V::UInt64(_)) => v,
            (K::UInt64, V::UInt32(v)) => V::UInt64(v.into()),
            (K::UInt64, V::UInt16(v)) => V::UInt64(v.into()),
            (K::UInt64, V::UInt8(v)) => V::UInt64(v.into()),

            (K::Float32, v @ V::Float32(_)) => v,
            (K::Float32, V::Int8(v)) => V::Float32(v.into()),
            (K::Float32, V::UInt8(v)) => V::Float32(v.into()),
            (K::Float32, V::Int16(v)) => V::Float32(v.into()),
            (K::Float32, V::UInt16(v)) => V::Float32(v.into()),
            (K::Float32, V::Int32(v)) => V::Float32(v as f32),
            (K::Float32, V::UInt32(v)) => V::Float32(v as f32),
            (K::Float32, V::Int64(v)) => V::Float32(v as f32),
            (K::Float32, V::UInt64(v)) => V::Float32(v as f32),

            (K::Float64, v @ V::Float64(_)) => v,
            (K::Float64, V::Float32(v)) => V::Float64(v.into()),
            (K::Float64, V::Int8(v)) => V::Float64(v.into()),
            (K::Float64, V::UInt8(v)) => V::Float64(v.into()),
            (K::Float64, V::Int16(v)) => V::Float64(v.into()),
            (K::Float64, V::UInt16(v)) => V::Float64(v.into()),
            (K::Float64, V::Int32(v)) => V::Float64(v.into()),
            (K::Float64, V::UInt32(v)) => V::Float64(v.into()),
            (K::Float64, V::Int64(v)) => V::Float64(v as f64),
            (K::Float64, V::UInt64(v)) => V::Float64(v as f64),

            (K::String, v @ V::String(_)) => v,
            (K::String, v) => return format_as_string(v),

            (K::Binary, v @ V::Binary(_)) => v,

            (K::DateTime, v @ V::DateTime(_)) => v,
            (K::DateTime, V::DateTimeOffset(v)) => V::DateTime(v.with_timezone(&Utc)),
            (K::DateTimeOffset, v @ V::DateTimeOffset(_)) => v,
            (K::DateTimeOffset, V::DateTime(v)) => V::DateTimeOffset(v.fixed_offset()),
            (K::TimeSpan, v @ V::TimeSpan(_)) => v,

            (K::Enum(typ), V::Enum(v)) if v.typ == *typ => V::Enum(v),
            (K::Enum(typ), V::String(s)) => match &self.enum_parser {
                Some(parser) => match parser.lookup(&s) {
                    Some(value) => V::Enum(EnumValue {
                        typ: typ.clone(),
                        value,
                    }),
                    None => return Err(V::String(s)),
                },
                None => return Err(V::String(s)),
            },

            (K::MergedEnum(universe), v) => return widen_merged(universe, v),

            (K::AnyEnum, v @ (V::Enum(_) | V::MergedEnum(_))) => v,

            (K::Cell, v @ V::Cell(_)) => v,

            (_, other) => return Err(other),
        })
    }
}

fn format_with<F: Formatter>(mut formatter: F, val: &F::Type) -> Option<String> {
    formatter.format(val).ok()
}

/// Canonical text for numerics and temporal values.
fn format_as_string(value: HostValue) -> std::result::Result<HostValue, HostValue> {
    use HostValue as V;

    let formatted = match &value {
        V::Int8(v) => format_with(Int8Formatter::default(), v),
        V::UInt8(v) => format_with(UInt8Formatter::default(), v),
        V::Int16(v) => format_with(Int16Formatter::default(), v),
        V::UInt16(v) => format_with(UInt16Formatter::default(), v),
        V::Int32(v) => format_with(Int32Formatter::default(), v),
        V::UInt32(v) => format_with(UInt32Formatter::default(), v),
        V::Int64(v) => format_with(Int64Formatter::default(), v),
        V::UInt64(v) => format_with(UInt64Formatter::default(), v),
        V::Float32(v) => format_with(Float32Formatter::default(), v),
        V::Float64(v) => format_with(Float64Formatter::default(), v),
        V::DateTime(v) => format_with(UniversalSortableFormatter, v),
        V::DateTimeOffset(v) => format_with(UniversalSortableOffsetFormatter, v),
        V::TimeSpan(v) => format_with(ConstantTimeSpanFormatter, v),
        _ => None,
    };

    match formatted {
        Some(s) => Ok(V::String(s)),
        None => Err(value),
    }
}

fn widen_merged(
    universe: &Arc<MergedEnumUniverse>,
    value: HostValue,
) -> std::result::Result<HostValue, HostValue> {
    let ordinal = match &value {
        HostValue::MergedEnum(v) if v.universe == *universe => return Ok(value),
        HostValue::Enum(v) => v
            .typ
            .member_by_value(v.value)
            .and_then(|m| universe.ordinal_of(&m.name)),
        HostValue::String(s) => MergedEnumParser::new(universe).parse(s),
        _ => None,
    };

    match ordinal {
        Some(ordinal) => Ok(HostValue::MergedEnum(MergedEnumValue {
            universe: universe.clone(),
            ordinal,
        })),
        None => Err(value),
    }
}

/// Lazy, single pass iterator of widened values.
#[derive(Debug)]
pub struct WidenIter<I> {
    widener: Arc<Widener>,
    values: I,
    idx: usize,
}

impl<I> Iterator for WidenIter<I>
where
    I: Iterator<Item = HostValue>,
{
    type Item = Result<HostValue>;

    fn next(&mut self) -> Option<Self::Item> {
        let value = self.values.next()?;
        let idx = self.idx;
        self.idx += 1;
        Some(self.widener.widen_value(idx, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.values.size_hint()
    }
}

/// Widen `values` to `target`.
pub fn widen<I>(values: I, target: &HostType) -> WidenIter<I::IntoIter>
where
    I: IntoIterator<Item = HostValue>,
{
    Widener::for_target(target).widen(values)
}

/// Widen `values` and unwrap them into `T`.
pub fn widen_typed<T, I>(values: I) -> impl Iterator<Item = Result<T>>
where
    T: HostRepr,
    I: IntoIterator<Item = HostValue>,
{
    widen(values, &T::host_type()).map(|v| v.and_then(T::from_host_value))
}
