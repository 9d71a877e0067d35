//! In-memory (host) types and values that columns are read into and written
//! from.
use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use feather_error::{FeatherError, Result};

use crate::category::MergedEnumUniverse;
use crate::scalar::Cell;

/// Case folding used for every case-insensitive name comparison.
pub(crate) fn fold_case(s: &str) -> String {
    s.to_lowercase()
}

static NEXT_ENUM_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an enumeration type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnumTypeId(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumMember {
    pub name: String,
    pub value: i64,
}

#[derive(Debug)]
struct EnumTypeInner {
    id: EnumTypeId,
    name: String,
    members: Vec<EnumMember>,
}

/// Runtime description of a host enumeration.
///
/// Two enum types are equal only if they're the same type (same id), even if
/// their members are identical.
#[derive(Debug, Clone)]
pub struct EnumType(Arc<EnumTypeInner>);

static ENUM_REGISTRY: Lazy<RwLock<HashMap<TypeId, EnumType>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

impl EnumType {
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        members: impl IntoIterator<Item = (S, i64)>,
    ) -> Self {
        let id = EnumTypeId(NEXT_ENUM_ID.fetch_add(1, Ordering::Relaxed));
        let members = members
            .into_iter()
            .map(|(name, value)| EnumMember {
                name: name.into(),
                value,
            })
            .collect();

        EnumType(Arc::new(EnumTypeInner {
            id,
            name: name.into(),
            members,
        }))
    }

    /// Get the enum type for a Rust enum declared with `host_enum!`.
    ///
    /// The same `EnumType` (same identity) is returned for every call with the
    /// same `E`.
    pub fn of<E: HostEnum>() -> EnumType {
        let key = TypeId::of::<E>();
        if let Some(typ) = ENUM_REGISTRY.read().get(&key) {
            return typ.clone();
        }

        ENUM_REGISTRY
            .write()
            .entry(key)
            .or_insert_with(|| EnumType::new(E::NAME, E::MEMBERS.iter().copied()))
            .clone()
    }

    pub fn id(&self) -> EnumTypeId {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn members(&self) -> &[EnumMember] {
        &self.0.members
    }

    pub fn member_by_value(&self, value: i64) -> Option<&EnumMember> {
        self.0.members.iter().find(|m| m.value == value)
    }

    pub fn member_by_name_ignore_case(&self, name: &str) -> Option<&EnumMember> {
        let folded = fold_case(name);
        self.0
            .members
            .iter()
            .find(|m| m.name == name || fold_case(&m.name) == folded)
    }

    pub fn is_defined(&self, value: i64) -> bool {
        self.member_by_value(value).is_some()
    }
}

impl PartialEq for EnumType {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for EnumType {}

impl Hash for EnumType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state)
    }
}

impl fmt::Display for EnumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.name)
    }
}

/// A Rust enum usable as a host enumeration.
///
/// Implemented through `host_enum!`. Member values are stored alongside the
/// variants rather than as discriminants so that several members may share a
/// value.
pub trait HostEnum: Copy + Send + Sync + 'static {
    const NAME: &'static str;
    const MEMBERS: &'static [(&'static str, i64)];

    fn to_value(self) -> i64;

    fn from_value(value: i64) -> Option<Self>;

    fn enum_type() -> EnumType {
        EnumType::of::<Self>()
    }

    fn to_enum_value(self) -> EnumValue {
        EnumValue {
            typ: Self::enum_type(),
            value: self.to_value(),
        }
    }
}

/// Declare a Rust enum that can be read from and written to category
/// columns.
///
/// ```
/// feather_format::host_enum! {
///     pub enum Fruit {
///         Apple = 1,
///         Banana = 2,
///     }
/// }
/// ```
#[macro_export]
macro_rules! host_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident = $value:expr),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant),+
        }

        impl $crate::host::HostEnum for $name {
            const NAME: &'static str = stringify!($name);
            const MEMBERS: &'static [(&'static str, i64)] = &[$((stringify!($variant), $value)),+];

            fn to_value(self) -> i64 {
                match self {
                    $(Self::$variant => $value),+
                }
            }

            fn from_value(value: i64) -> Option<Self> {
                $(
                    if value == $value {
                        return Some(Self::$variant);
                    }
                )+
                None
            }
        }

        impl $crate::host::HostRepr for $name {
            fn host_type() -> $crate::host::HostType {
                $crate::host::HostType::new($crate::host::HostKind::Enum(
                    <$name as $crate::host::HostEnum>::enum_type(),
                ))
            }

            fn from_host_value(value: $crate::host::HostValue) -> $crate::Result<Self> {
                $crate::host::enum_from_host_value::<Self>(value)
            }
        }

        impl $crate::host::HostRepr for Option<$name> {
            fn host_type() -> $crate::host::HostType {
                $crate::host::HostType::nullable($crate::host::HostKind::Enum(
                    <$name as $crate::host::HostEnum>::enum_type(),
                ))
            }

            fn from_host_value(value: $crate::host::HostValue) -> $crate::Result<Self> {
                match value {
                    $crate::host::HostValue::Null => Ok(None),
                    other => $crate::host::enum_from_host_value::<$name>(other).map(Some),
                }
            }
        }
    };
}

/// Kinds of host values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HostKind {
    Bool,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    String,
    Binary,
    /// An instant in UTC.
    DateTime,
    /// An instant with a fixed offset from UTC.
    DateTimeOffset,
    /// A signed duration.
    TimeSpan,
    Enum(EnumType),
    /// Name to ordinal table merged from several enums.
    MergedEnum(Arc<MergedEnumUniverse>),
    /// Placeholder for "some enumeration", the default host type of category
    /// columns.
    AnyEnum,
    /// The decoded cell itself. Matches every column.
    Cell,
}

impl fmt::Display for HostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Int8 => write!(f, "i8"),
            Self::UInt8 => write!(f, "u8"),
            Self::Int16 => write!(f, "i16"),
            Self::UInt16 => write!(f, "u16"),
            Self::Int32 => write!(f, "i32"),
            Self::UInt32 => write!(f, "u32"),
            Self::Int64 => write!(f, "i64"),
            Self::UInt64 => write!(f, "u64"),
            Self::Float32 => write!(f, "f32"),
            Self::Float64 => write!(f, "f64"),
            Self::String => write!(f, "String"),
            Self::Binary => write!(f, "Binary"),
            Self::DateTime => write!(f, "DateTime"),
            Self::DateTimeOffset => write!(f, "DateTimeOffset"),
            Self::TimeSpan => write!(f, "TimeSpan"),
            Self::Enum(typ) => write!(f, "Enum({typ})"),
            Self::MergedEnum(u) => write!(f, "MergedEnum({} levels)", u.len()),
            Self::AnyEnum => write!(f, "AnyEnum"),
            Self::Cell => write!(f, "Cell"),
        }
    }
}

/// A host type, optionally nullable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostType {
    pub kind: HostKind,
    pub nullable: bool,
}

impl HostType {
    pub fn new(kind: HostKind) -> Self {
        HostType {
            kind,
            nullable: false,
        }
    }

    pub fn nullable(kind: HostKind) -> Self {
        HostType {
            kind,
            nullable: true,
        }
    }

    pub fn to_nullable(&self) -> Self {
        Self::nullable(self.kind.clone())
    }

    pub fn enumeration(typ: EnumType) -> Self {
        Self::new(HostKind::Enum(typ))
    }
}

impl From<HostKind> for HostType {
    fn from(kind: HostKind) -> Self {
        HostType::new(kind)
    }
}

impl fmt::Display for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nullable {
            write!(f, "Option<{}>", self.kind)
        } else {
            write!(f, "{}", self.kind)
        }
    }
}

/// A member of a host enumeration, by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumValue {
    pub typ: EnumType,
    pub value: i64,
}

impl fmt::Display for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.typ.member_by_value(self.value) {
            Some(member) => write!(f, "{}", member.name),
            None => write!(f, "{}", self.value),
        }
    }
}

/// A member of a merged enum universe, by ordinal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MergedEnumValue {
    pub universe: Arc<MergedEnumUniverse>,
    pub ordinal: i32,
}

impl fmt::Display for MergedEnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.universe.name_of(self.ordinal) {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "{}", self.ordinal),
        }
    }
}

/// A boxed host value of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Null,
    Bool(bool),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    String(String),
    Binary(Vec<u8>),
    DateTime(DateTime<Utc>),
    DateTimeOffset(DateTime<FixedOffset>),
    TimeSpan(TimeDelta),
    Enum(EnumValue),
    MergedEnum(MergedEnumValue),
    Cell(Cell),
}

impl HostValue {
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Runtime kind of this value, None for nulls.
    pub fn host_kind(&self) -> Option<HostKind> {
        Some(match self {
            Self::Null => return None,
            Self::Bool(_) => HostKind::Bool,
            Self::Int8(_) => HostKind::Int8,
            Self::UInt8(_) => HostKind::UInt8,
            Self::Int16(_) => HostKind::Int16,
            Self::UInt16(_) => HostKind::UInt16,
            Self::Int32(_) => HostKind::Int32,
            Self::UInt32(_) => HostKind::UInt32,
            Self::Int64(_) => HostKind::Int64,
            Self::UInt64(_) => HostKind::UInt64,
            Self::Float32(_) => HostKind::Float32,
            Self::Float64(_) => HostKind::Float64,
            Self::String(_) => HostKind::String,
            Self::Binary(_) => HostKind::Binary,
            Self::DateTime(_) => HostKind::DateTime,
            Self::DateTimeOffset(_) => HostKind::DateTimeOffset,
            Self::TimeSpan(_) => HostKind::TimeSpan,
            Self::Enum(v) => HostKind::Enum(v.typ.clone()),
            Self::MergedEnum(v) => HostKind::MergedEnum(v.universe.clone()),
            Self::Cell(_) => HostKind::Cell,
        })
    }

    /// Name of the runtime type for error messages.
    pub fn type_name(&self) -> String {
        match self.host_kind() {
            Some(kind) => kind.to_string(),
            None => "null".to_string(),
        }
    }
}

macro_rules! impl_host_value_from {
    ($($t:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$t> for HostValue {
                fn from(value: $t) -> Self {
                    HostValue::$variant(value)
                }
            }
        )+
    };
}

impl_host_value_from! {
    bool => Bool,
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
    String => String,
    Vec<u8> => Binary,
    DateTime<Utc> => DateTime,
    DateTime<FixedOffset> => DateTimeOffset,
    TimeDelta => TimeSpan,
    EnumValue => Enum,
    MergedEnumValue => MergedEnum,
    Cell => Cell,
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::String(value.to_string())
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => HostValue::Null,
        }
    }
}

/// A Rust type with a fixed host type, usable as a typed conversion target.
pub trait HostRepr: Sized + 'static {
    fn host_type() -> HostType;

    /// Unwrap a boxed value that was produced for `host_type()`.
    fn from_host_value(value: HostValue) -> Result<Self>;
}

fn unexpected_host_value(value: &HostValue, expected: &HostType) -> FeatherError {
    FeatherError::incompatible_cast(format!(
        "Expected a value of type {expected}, got {}",
        value.type_name()
    ))
}

macro_rules! impl_host_repr {
    ($($t:ty => $kind:ident),+ $(,)?) => {
        $(
            impl HostRepr for $t {
                fn host_type() -> HostType {
                    HostType::new(HostKind::$kind)
                }

                fn from_host_value(value: HostValue) -> Result<Self> {
                    match value {
                        HostValue::$kind(v) => Ok(v),
                        other => Err(unexpected_host_value(&other, &Self::host_type())),
                    }
                }
            }

            impl HostRepr for Option<$t> {
                fn host_type() -> HostType {
                    HostType::nullable(HostKind::$kind)
                }

                fn from_host_value(value: HostValue) -> Result<Self> {
                    match value {
                        HostValue::Null => Ok(None),
                        HostValue::$kind(v) => Ok(Some(v)),
                        other => Err(unexpected_host_value(&other, &Self::host_type())),
                    }
                }
            }
        )+
    };
}

impl_host_repr! {
    bool => Bool,
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
    String => String,
    Vec<u8> => Binary,
    DateTime<Utc> => DateTime,
    DateTime<FixedOffset> => DateTimeOffset,
    TimeDelta => TimeSpan,
}

impl HostRepr for Cell {
    fn host_type() -> HostType {
        HostType::new(HostKind::Cell)
    }

    fn from_host_value(value: HostValue) -> Result<Self> {
        match value {
            HostValue::Cell(cell) => Ok(cell),
            other => Err(unexpected_host_value(&other, &Self::host_type())),
        }
    }
}

/// Unwrap a boxed enum value into the Rust enum `E`.
pub fn enum_from_host_value<E: HostEnum>(value: HostValue) -> Result<E> {
    let expected = E::enum_type();
    match value {
        HostValue::Enum(v) if v.typ == expected => E::from_value(v.value).ok_or_else(|| {
            FeatherError::incompatible_cast(format!(
                "Value {} is not a member of {expected}",
                v.value
            ))
        }),
        other => Err(unexpected_host_value(&other, &HostType::enumeration(expected))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::host_enum! {
        enum Shade {
            Light = 3,
            Dark = -1,
            Dim = 3,
        }
    }

    #[test]
    fn registry_returns_same_identity() {
        let a = EnumType::of::<Shade>();
        let b = Shade::enum_type();
        assert_eq!(a, b);
        assert_eq!("Shade", a.name());
        assert_eq!(3, a.members().len());
    }

    #[test]
    fn structurally_equal_enums_differ() {
        let a = EnumType::new("E", [("A", 0)]);
        let b = EnumType::new("E", [("A", 0)]);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn shared_values() {
        assert_eq!(3, Shade::Dim.to_value());
        // First declared member wins for a shared value.
        assert_eq!(Some(Shade::Light), Shade::from_value(3));
        assert_eq!(Some(Shade::Dark), Shade::from_value(-1));
        assert_eq!(None, Shade::from_value(0));
    }

    #[test]
    fn member_lookup_ignores_case() {
        let typ = Shade::enum_type();
        assert_eq!(-1, typ.member_by_name_ignore_case("DARK").unwrap().value);
        assert!(typ.member_by_name_ignore_case("darker").is_none());
    }

    #[test]
    fn host_value_kinds() {
        assert_eq!(Some(HostKind::Int16), HostValue::from(4_i16).host_kind());
        assert_eq!(None, HostValue::from(None::<i32>).host_kind());
        assert_eq!("null", HostValue::Null.type_name());
        assert_eq!("Dark", Shade::Dark.to_enum_value().to_string());
    }
}
