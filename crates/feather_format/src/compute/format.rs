//! Utilities for writing host values into strings.
//!
//! Used when widening non-string values into a string target.
use std::fmt::{self, Display};
use std::marker::PhantomData;

use chrono::{DateTime, FixedOffset, TimeDelta, Utc};

use crate::compute::temporal::SECONDS_IN_DAY;

/// Logic for formatting and writing a type to a buffer.
pub trait Formatter {
    /// Type we're formatting.
    type Type;

    /// Write the value to the buffer.
    fn write<W: fmt::Write>(&mut self, val: &Self::Type, buf: &mut W) -> fmt::Result;

    /// Format into a new string.
    fn format(&mut self, val: &Self::Type) -> Result<String, fmt::Error> {
        let mut buf = String::new();
        self.write(val, &mut buf)?;
        Ok(buf)
    }
}

/// Formatter that uses the type's `Display` implmentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayFormatter<T: Display> {
    _type: PhantomData<T>,
}

impl<T: Display> Formatter for DisplayFormatter<T> {
    type Type = T;
    fn write<W: fmt::Write>(&mut self, val: &Self::Type, buf: &mut W) -> fmt::Result {
        write!(buf, "{val}")
    }
}

pub type Int8Formatter = DisplayFormatter<i8>;
pub type Int16Formatter = DisplayFormatter<i16>;
pub type Int32Formatter = DisplayFormatter<i32>;
pub type Int64Formatter = DisplayFormatter<i64>;
pub type UInt8Formatter = DisplayFormatter<u8>;
pub type UInt16Formatter = DisplayFormatter<u16>;
pub type UInt32Formatter = DisplayFormatter<u32>;
pub type UInt64Formatter = DisplayFormatter<u64>;

/// Float formatting with spelled out non-finite values.
///
/// Finite values use the shortest representation that round-trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FloatFormatter<T> {
    _type: PhantomData<T>,
}

pub type Float32Formatter = FloatFormatter<f32>;
pub type Float64Formatter = FloatFormatter<f64>;

impl<T: num::Float + Display> Formatter for FloatFormatter<T> {
    type Type = T;
    fn write<W: fmt::Write>(&mut self, val: &Self::Type, buf: &mut W) -> fmt::Result {
        if val.is_nan() {
            write!(buf, "NaN")
        } else if val.is_infinite() {
            if val.is_sign_negative() {
                write!(buf, "-Infinity")
            } else {
                write!(buf, "Infinity")
            }
        } else {
            write!(buf, "{val}")
        }
    }
}

/// Universal sortable date/time pattern, `yyyy-MM-dd HH:mm:ssZ`.
///
/// Always written in UTC. Sub-second precision is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UniversalSortableFormatter;

impl Formatter for UniversalSortableFormatter {
    type Type = DateTime<Utc>;
    fn write<W: fmt::Write>(&mut self, val: &Self::Type, buf: &mut W) -> fmt::Result {
        write!(buf, "{}", val.format("%Y-%m-%d %H:%M:%SZ"))
    }
}

/// Same pattern as `UniversalSortableFormatter` after converting to UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UniversalSortableOffsetFormatter;

impl Formatter for UniversalSortableOffsetFormatter {
    type Type = DateTime<FixedOffset>;
    fn write<W: fmt::Write>(&mut self, val: &Self::Type, buf: &mut W) -> fmt::Result {
        UniversalSortableFormatter.write(&val.with_timezone(&Utc), buf)
    }
}

/// Constant duration pattern, `[-][d.]hh:mm:ss[.fffffff]`.
///
/// Fractional seconds are written as 7 digits (100ns ticks) and omitted
/// entirely when zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConstantTimeSpanFormatter;

impl Formatter for ConstantTimeSpanFormatter {
    type Type = TimeDelta;
    fn write<W: fmt::Write>(&mut self, val: &Self::Type, buf: &mut W) -> fmt::Result {
        if *val < TimeDelta::zero() {
            write!(buf, "-")?;
        }

        let abs = val.abs();
        let secs = abs.num_seconds();
        let ticks = abs.subsec_nanos() / 100;

        let days = secs / SECONDS_IN_DAY;
        let secs = secs % SECONDS_IN_DAY;

        if days > 0 {
            write!(buf, "{days}.")?;
        }
        write!(
            buf,
            "{:02}:{:02}:{:02}",
            secs / 3600,
            (secs % 3600) / 60,
            secs % 60
        )?;
        if ticks > 0 {
            write!(buf, ".{ticks:07}")?;
        }

        Ok(())
    }
}
