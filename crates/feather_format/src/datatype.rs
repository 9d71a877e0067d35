use serde::{Deserialize, Serialize};
use std::fmt;

/// Resolution of timestamp and time columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeUnit {
    Second,
    Millisecond,
    Microsecond,
    Nanosecond,
}

impl TimeUnit {
    pub const fn ticks_per_second(&self) -> i64 {
        match self {
            Self::Second => 1,
            Self::Millisecond => 1_000,
            Self::Microsecond => 1_000_000,
            Self::Nanosecond => 1_000_000_000,
        }
    }

    /// Nanoseconds covered by a single tick.
    pub const fn nanos_per_tick(&self) -> i64 {
        1_000_000_000 / self.ticks_per_second()
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Second => write!(f, "s"),
            Self::Millisecond => write!(f, "ms"),
            Self::Microsecond => write!(f, "μs"),
            Self::Nanosecond => write!(f, "ns"),
        }
    }
}

/// Physical primitive a column's values are stored as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float,
    Double,
    Utf8,
    Binary,
}

impl PrimitiveKind {
    /// Width in bytes of a single value.
    ///
    /// Booleans are bit-packed and variable length types store offsets, so
    /// neither has a fixed width.
    pub const fn fixed_width(&self) -> Option<usize> {
        match self {
            Self::Int8 | Self::UInt8 => Some(1),
            Self::Int16 | Self::UInt16 => Some(2),
            Self::Int32 | Self::UInt32 | Self::Float => Some(4),
            Self::Int64 | Self::UInt64 | Self::Double => Some(8),
            Self::Bool | Self::Utf8 | Self::Binary => None,
        }
    }

    /// The nominal type sharing this primitive's type code.
    pub const fn nominal(&self) -> NominalType {
        match self {
            Self::Bool => NominalType::Bool,
            Self::Int8 => NominalType::Int8,
            Self::Int16 => NominalType::Int16,
            Self::Int32 => NominalType::Int32,
            Self::Int64 => NominalType::Int64,
            Self::UInt8 => NominalType::UInt8,
            Self::UInt16 => NominalType::UInt16,
            Self::UInt32 => NominalType::UInt32,
            Self::UInt64 => NominalType::UInt64,
            Self::Float => NominalType::Float,
            Self::Double => NominalType::Double,
            Self::Utf8 => NominalType::Utf8,
            Self::Binary => NominalType::Binary,
        }
    }

    /// The type code the format uses for this primitive.
    pub const fn type_code(&self) -> u8 {
        self.nominal().type_code()
    }
}

/// Types as the format itself declares them.
///
/// The format defines dedicated codes for categories, timestamps, dates and
/// times, but columns written by this library never carry the category,
/// timestamp or time codes physically. See `catalog::physical_type_of`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NominalType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float,
    Double,
    Utf8,
    Binary,
    Category,
    Timestamp,
    Date,
    Time,
}

impl NominalType {
    pub const fn type_code(&self) -> u8 {
        match self {
            Self::Bool => 0,
            Self::Int8 => 1,
            Self::Int16 => 2,
            Self::Int32 => 3,
            Self::Int64 => 4,
            Self::UInt8 => 5,
            Self::UInt16 => 6,
            Self::UInt32 => 7,
            Self::UInt64 => 8,
            Self::Float => 9,
            Self::Double => 10,
            Self::Utf8 => 11,
            Self::Binary => 12,
            Self::Category => 13,
            Self::Timestamp => 14,
            Self::Date => 15,
            Self::Time => 16,
        }
    }
}

/// Logical column type without nullability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseType {
    Bool,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
    String,
    Binary,
    Category,
    /// Days since epoch.
    Date,
    Timestamp(TimeUnit),
    /// Time of day since midnight.
    Time(TimeUnit),
}

/// Declared semantic type of a column, one variant per base type and
/// nullability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalColumnType {
    Bool,
    NullableBool,
    Int8,
    NullableInt8,
    UInt8,
    NullableUInt8,
    Int16,
    NullableInt16,
    UInt16,
    NullableUInt16,
    Int32,
    NullableInt32,
    UInt32,
    NullableUInt32,
    Int64,
    NullableInt64,
    UInt64,
    NullableUInt64,
    Float,
    NullableFloat,
    Double,
    NullableDouble,
    String,
    NullableString,
    Binary,
    NullableBinary,
    Category,
    NullableCategory,
    Date,
    NullableDate,
    TimestampSecond,
    NullableTimestampSecond,
    TimestampMillisecond,
    NullableTimestampMillisecond,
    TimestampMicrosecond,
    NullableTimestampMicrosecond,
    TimestampNanosecond,
    NullableTimestampNanosecond,
    TimeSecond,
    NullableTimeSecond,
    TimeMillisecond,
    NullableTimeMillisecond,
    TimeMicrosecond,
    NullableTimeMicrosecond,
    TimeNanosecond,
    NullableTimeNanosecond,
}

impl LogicalColumnType {
    /// Every logical column type.
    pub const ALL: [LogicalColumnType; 46] = [
        Self::Bool,
        Self::NullableBool,
        Self::Int8,
        Self::NullableInt8,
        Self::UInt8,
        Self::NullableUInt8,
        Self::Int16,
        Self::NullableInt16,
        Self::UInt16,
        Self::NullableUInt16,
        Self::Int32,
        Self::NullableInt32,
        Self::UInt32,
        Self::NullableUInt32,
        Self::Int64,
        Self::NullableInt64,
        Self::UInt64,
        Self::NullableUInt64,
        Self::Float,
        Self::NullableFloat,
        Self::Double,
        Self::NullableDouble,
        Self::String,
        Self::NullableString,
        Self::Binary,
        Self::NullableBinary,
        Self::Category,
        Self::NullableCategory,
        Self::Date,
        Self::NullableDate,
        Self::TimestampSecond,
        Self::NullableTimestampSecond,
        Self::TimestampMillisecond,
        Self::NullableTimestampMillisecond,
        Self::TimestampMicrosecond,
        Self::NullableTimestampMicrosecond,
        Self::TimestampNanosecond,
        Self::NullableTimestampNanosecond,
        Self::TimeSecond,
        Self::NullableTimeSecond,
        Self::TimeMillisecond,
        Self::NullableTimeMillisecond,
        Self::TimeMicrosecond,
        Self::NullableTimeMicrosecond,
        Self::TimeNanosecond,
        Self::NullableTimeNanosecond,
    ];

    /// Split into base type and nullability.
    pub const fn parts(&self) -> (BaseType, bool) {
        use TimeUnit::*;
        match self {
            Self::Bool => (BaseType::Bool, false),
            Self::NullableBool => (BaseType::Bool, true),
            Self::Int8 => (BaseType::Int8, false),
            Self::NullableInt8 => (BaseType::Int8, true),
            Self::UInt8 => (BaseType::UInt8, false),
            Self::NullableUInt8 => (BaseType::UInt8, true),
            Self::Int16 => (BaseType::Int16, false),
            Self::NullableInt16 => (BaseType::Int16, true),
            Self::UInt16 => (BaseType::UInt16, false),
            Self::NullableUInt16 => (BaseType::UInt16, true),
            Self::Int32 => (BaseType::Int32, false),
            Self::NullableInt32 => (BaseType::Int32, true),
            Self::UInt32 => (BaseType::UInt32, false),
            Self::NullableUInt32 => (BaseType::UInt32, true),
            Self::Int64 => (BaseType::Int64, false),
            Self::NullableInt64 => (BaseType::Int64, true),
            Self::UInt64 => (BaseType::UInt64, false),
            Self::NullableUInt64 => (BaseType::UInt64, true),
            Self::Float => (BaseType::Float, false),
            Self::NullableFloat => (BaseType::Float, true),
            Self::Double => (BaseType::Double, false),
            Self::NullableDouble => (BaseType::Double, true),
            Self::String => (BaseType::String, false),
            Self::NullableString => (BaseType::String, true),
            Self::Binary => (BaseType::Binary, false),
            Self::NullableBinary => (BaseType::Binary, true),
            Self::Category => (BaseType::Category, false),
            Self::NullableCategory => (BaseType::Category, true),
            Self::Date => (BaseType::Date, false),
            Self::NullableDate => (BaseType::Date, true),
            Self::TimestampSecond => (BaseType::Timestamp(Second), false),
            Self::NullableTimestampSecond => (BaseType::Timestamp(Second), true),
            Self::TimestampMillisecond => (BaseType::Timestamp(Millisecond), false),
            Self::NullableTimestampMillisecond => (BaseType::Timestamp(Millisecond), true),
            Self::TimestampMicrosecond => (BaseType::Timestamp(Microsecond), false),
            Self::NullableTimestampMicrosecond => (BaseType::Timestamp(Microsecond), true),
            Self::TimestampNanosecond => (BaseType::Timestamp(Nanosecond), false),
            Self::NullableTimestampNanosecond => (BaseType::Timestamp(Nanosecond), true),
            Self::TimeSecond => (BaseType::Time(Second), false),
            Self::NullableTimeSecond => (BaseType::Time(Second), true),
            Self::TimeMillisecond => (BaseType::Time(Millisecond), false),
            Self::NullableTimeMillisecond => (BaseType::Time(Millisecond), true),
            Self::TimeMicrosecond => (BaseType::Time(Microsecond), false),
            Self::NullableTimeMicrosecond => (BaseType::Time(Microsecond), true),
            Self::TimeNanosecond => (BaseType::Time(Nanosecond), false),
            Self::NullableTimeNanosecond => (BaseType::Time(Nanosecond), true),
        }
    }

    pub const fn from_parts(base: BaseType, nullable: bool) -> Self {
        use TimeUnit::*;
        match (base, nullable) {
            (BaseType::Bool, false) => Self::Bool,
            (BaseType::Bool, true) => Self::NullableBool,
            (BaseType::Int8, false) => Self::Int8,
            (BaseType::Int8, true) => Self::NullableInt8,
            (BaseType::UInt8, false) => Self::UInt8,
            (BaseType::UInt8, true) => Self::NullableUInt8,
            (BaseType::Int16, false) => Self::Int16,
            (BaseType::Int16, true) => Self::NullableInt16,
            (BaseType::UInt16, false) => Self::UInt16,
            (BaseType::UInt16, true) => Self::NullableUInt16,
            (BaseType::Int32, false) => Self::Int32,
            (BaseType::Int32, true) => Self::NullableInt32,
            (BaseType::UInt32, false) => Self::UInt32,
            (BaseType::UInt32, true) => Self::NullableUInt32,
            (BaseType::Int64, false) => Self::Int64,
            (BaseType::Int64, true) => Self::NullableInt64,
            (BaseType::UInt64, false) => Self::UInt64,
            (BaseType::UInt64, true) => Self::NullableUInt64,
            (BaseType::Float, false) => Self::Float,
            (BaseType::Float, true) => Self::NullableFloat,
            (BaseType::Double, false) => Self::Double,
            (BaseType::Double, true) => Self::NullableDouble,
            (BaseType::String, false) => Self::String,
            (BaseType::String, true) => Self::NullableString,
            (BaseType::Binary, false) => Self::Binary,
            (BaseType::Binary, true) => Self::NullableBinary,
            (BaseType::Category, false) => Self::Category,
            (BaseType::Category, true) => Self::NullableCategory,
            (BaseType::Date, false) => Self::Date,
            (BaseType::Date, true) => Self::NullableDate,
            (BaseType::Timestamp(Second), false) => Self::TimestampSecond,
            (BaseType::Timestamp(Second), true) => Self::NullableTimestampSecond,
            (BaseType::Timestamp(Millisecond), false) => Self::TimestampMillisecond,
            (BaseType::Timestamp(Millisecond), true) => Self::NullableTimestampMillisecond,
            (BaseType::Timestamp(Microsecond), false) => Self::TimestampMicrosecond,
            (BaseType::Timestamp(Microsecond), true) => Self::NullableTimestampMicrosecond,
            (BaseType::Timestamp(Nanosecond), false) => Self::TimestampNanosecond,
            (BaseType::Timestamp(Nanosecond), true) => Self::NullableTimestampNanosecond,
            (BaseType::Time(Second), false) => Self::TimeSecond,
            (BaseType::Time(Second), true) => Self::NullableTimeSecond,
            (BaseType::Time(Millisecond), false) => Self::TimeMillisecond,
            (BaseType::Time(Millisecond), true) => Self::NullableTimeMillisecond,
            (BaseType::Time(Microsecond), false) => Self::TimeMicrosecond,
            (BaseType::Time(Microsecond), true) => Self::NullableTimeMicrosecond,
            (BaseType::Time(Nanosecond), false) => Self::TimeNanosecond,
            (BaseType::Time(Nanosecond), true) => Self::NullableTimeNanosecond,
        }
    }

    pub const fn base(&self) -> BaseType {
        self.parts().0
    }

    pub const fn is_nullable(&self) -> bool {
        self.parts().1
    }

    pub const fn to_nullable(&self) -> Self {
        Self::from_parts(self.base(), true)
    }

    pub const fn to_non_nullable(&self) -> Self {
        Self::from_parts(self.base(), false)
    }

    pub const fn is_category(&self) -> bool {
        matches!(self.base(), BaseType::Category)
    }

    /// Unit for timestamp and time columns.
    pub const fn time_unit(&self) -> Option<TimeUnit> {
        match self.base() {
            BaseType::Timestamp(unit) | BaseType::Time(unit) => Some(unit),
            _ => None,
        }
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "Bool"),
            Self::Int8 => write!(f, "Int8"),
            Self::UInt8 => write!(f, "UInt8"),
            Self::Int16 => write!(f, "Int16"),
            Self::UInt16 => write!(f, "UInt16"),
            Self::Int32 => write!(f, "Int32"),
            Self::UInt32 => write!(f, "UInt32"),
            Self::Int64 => write!(f, "Int64"),
            Self::UInt64 => write!(f, "UInt64"),
            Self::Float => write!(f, "Float"),
            Self::Double => write!(f, "Double"),
            Self::String => write!(f, "String"),
            Self::Binary => write!(f, "Binary"),
            Self::Category => write!(f, "Category"),
            Self::Date => write!(f, "Date"),
            Self::Timestamp(unit) => write!(f, "Timestamp({unit})"),
            Self::Time(unit) => write!(f, "Time({unit})"),
        }
    }
}

impl fmt::Display for LogicalColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (base, nullable) = self.parts();
        if nullable {
            write!(f, "Nullable{base}")
        } else {
            write!(f, "{base}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts_round_trip_for_all() {
        for typ in LogicalColumnType::ALL {
            let (base, nullable) = typ.parts();
            assert_eq!(typ, LogicalColumnType::from_parts(base, nullable));
        }
    }

    #[test]
    fn nullable_variants_alternate() {
        for pair in LogicalColumnType::ALL.chunks(2) {
            assert!(!pair[0].is_nullable());
            assert!(pair[1].is_nullable());
            assert_eq!(pair[1], pair[0].to_nullable());
            assert_eq!(pair[0], pair[1].to_non_nullable());
        }
    }

    #[test]
    fn display() {
        assert_eq!("NullableInt32", LogicalColumnType::NullableInt32.to_string());
        assert_eq!(
            "Timestamp(ms)",
            LogicalColumnType::TimestampMillisecond.to_string()
        );
    }

    #[test]
    fn time_unit_serializes_upper_case() {
        let s = serde_json::to_string(&TimeUnit::Microsecond).unwrap();
        assert_eq!("\"MICROSECOND\"", s);
    }
}
