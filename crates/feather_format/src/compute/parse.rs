//! Parsing strings into enum members.
use std::collections::HashMap;
use std::marker::PhantomData;
use std::str::FromStr;

use crate::category::MergedEnumUniverse;
use crate::host::{fold_case, EnumType};

/// Logic for parsing a string into some type.
pub trait Parser {
    /// The type we'll be producing.
    type Type;

    /// Parse a string into `Type`, returning None if the parse cannot be done.
    fn parse(&mut self, s: &str) -> Option<Self::Type>;
}

/// Parser that uses the stdlib `FromStr` trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FromStrParser<T: FromStr> {
    _type: PhantomData<T>,
}

impl<T: FromStr> Parser for FromStrParser<T> {
    type Type = T;
    fn parse(&mut self, s: &str) -> Option<Self::Type> {
        T::from_str(s).ok()
    }
}

pub type Int64Parser = FromStrParser<i64>;
pub type Int32Parser = FromStrParser<i32>;

/// Parse an enum member from its name (case-insensitive) or from the decimal
/// text of a defined member value.
///
/// Produces the member's value.
#[derive(Debug, Clone)]
pub struct EnumMemberParser {
    enum_type: EnumType,
    by_name: HashMap<String, i64>,
}

impl EnumMemberParser {
    pub fn new(enum_type: EnumType) -> Self {
        let mut by_name = HashMap::with_capacity(enum_type.members().len());
        for member in enum_type.members() {
            // First declared spelling wins for names differing only in case.
            by_name.entry(fold_case(&member.name)).or_insert(member.value);
        }

        EnumMemberParser { enum_type, by_name }
    }

    pub fn enum_type(&self) -> &EnumType {
        &self.enum_type
    }

    /// Same as `parse`, usable through a shared reference.
    pub fn lookup(&self, s: &str) -> Option<i64> {
        let s = s.trim();
        if let Some(value) = self.by_name.get(&fold_case(s)) {
            return Some(*value);
        }

        let value = Int64Parser::default().parse(s)?;
        if self.enum_type.is_defined(value) {
            Some(value)
        } else {
            None
        }
    }
}

impl Parser for EnumMemberParser {
    type Type = i64;
    fn parse(&mut self, s: &str) -> Option<Self::Type> {
        self.lookup(s)
    }
}

/// Parse a name from a merged enum universe into its ordinal.
///
/// Decimal text is accepted if it names an ordinal in the universe.
#[derive(Debug, Clone)]
pub struct MergedEnumParser<'a> {
    universe: &'a MergedEnumUniverse,
}

impl<'a> MergedEnumParser<'a> {
    pub fn new(universe: &'a MergedEnumUniverse) -> Self {
        MergedEnumParser { universe }
    }
}

impl<'a> Parser for MergedEnumParser<'a> {
    type Type = i32;
    fn parse(&mut self, s: &str) -> Option<Self::Type> {
        let s = s.trim();
        if let Some(ordinal) = self.universe.ordinal_of(s) {
            return Some(ordinal);
        }

        let ordinal = Int32Parser::default().parse(s)?;
        self.universe.name_of(ordinal).map(|_| ordinal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::merge_enum_universe;

    #[test]
    fn enum_by_name_or_value() {
        let typ = EnumType::new("Size", [("Small", 1), ("Large", 10), ("LARGE", 11)]);
        let mut parser = EnumMemberParser::new(typ);

        assert_eq!(Some(1), parser.parse("small"));
        assert_eq!(Some(10), parser.parse(" large "));
        assert_eq!(Some(10), parser.parse("10"));
        assert_eq!(Some(11), parser.parse("11"));
        assert_eq!(None, parser.parse("2"));
        assert_eq!(None, parser.parse("medium"));
    }

    #[test]
    fn merged_by_name_or_ordinal() {
        let a = EnumType::new("A", [("north", 0), ("south", 1)]);
        let b = EnumType::new("B", [("East", 0)]);
        let universe = merge_enum_universe(&[a, b]).unwrap();
        let mut parser = MergedEnumParser::new(&universe);

        assert_eq!(Some(1), parser.parse("EAST"));
        assert_eq!(Some(3), parser.parse("South"));
        assert_eq!(Some(2), parser.parse("2"));
        assert_eq!(None, parser.parse("0"));
        assert_eq!(None, parser.parse("west"));
    }
}
