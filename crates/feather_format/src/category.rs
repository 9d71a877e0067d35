//! Relating category levels to host enumerations.
//!
//! Reading: a category column's levels are matched against an enum's members
//! either by name (case-insensitive) or by ordinal (level index == member
//! value). Writing: an enum's members are turned into a sorted level list.
use feather_error::{FeatherError, Result};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use tracing::trace;

use crate::host::{fold_case, EnumType, EnumTypeId};

/// How category levels map onto an enum's members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryEnumMapType {
    /// No mapping could be found. Treated as a rejection.
    None,
    /// Level strings match member names.
    ByName,
    /// Level indices match member values.
    ByOrdinal,
}

/// Enum resolution context used when converting category cells to enums.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumResolution {
    pub enum_type: EnumType,
    pub map_type: CategoryEnumMapType,
}

/// Decide how `levels` correspond to the members of `enum_type`.
///
/// Name matching is tried first and requires every level to match a distinct
/// member. Ordinal matching requires a member for every level index.
pub fn resolve_mapping(enum_type: &EnumType, levels: &[String]) -> CategoryEnumMapType {
    if matches_by_name(enum_type, levels) {
        return CategoryEnumMapType::ByName;
    }

    if (0..levels.len()).all(|idx| enum_type.is_defined(idx as i64)) {
        return CategoryEnumMapType::ByOrdinal;
    }

    CategoryEnumMapType::None
}

fn matches_by_name(enum_type: &EnumType, levels: &[String]) -> bool {
    let members: HashMap<String, usize> = enum_type
        .members()
        .iter()
        .enumerate()
        .map(|(idx, m)| (fold_case(&m.name), idx))
        .collect();

    let mut used = HashSet::with_capacity(levels.len());
    for level in levels {
        match members.get(&fold_case(level)) {
            Some(idx) if used.insert(*idx) => (),
            _ => return false,
        }
    }

    true
}

/// Level list and value lookup used when writing an enum as a category.
#[derive(Debug)]
pub struct CategoryLayout {
    levels: Arc<[String]>,
    index_by_value: HashMap<i64, i32>,
}

impl CategoryLayout {
    pub fn levels(&self) -> &Arc<[String]> {
        &self.levels
    }

    /// On-disk index for a member value.
    pub fn index_of(&self, value: i64) -> Option<i32> {
        self.index_by_value.get(&value).copied()
    }
}

static LAYOUT_CACHE: Lazy<RwLock<HashMap<EnumTypeId, Arc<CategoryLayout>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Get the category layout for an enum, computing it on first use.
pub fn category_layout(enum_type: &EnumType) -> Arc<CategoryLayout> {
    if let Some(layout) = LAYOUT_CACHE.read().get(&enum_type.id()) {
        return layout.clone();
    }

    let layout = Arc::new(compute_layout(enum_type));
    trace!(enum_type = %enum_type, levels = layout.levels.len(), "computed category layout");

    LAYOUT_CACHE
        .write()
        .entry(enum_type.id())
        .or_insert(layout)
        .clone()
}

fn compute_layout(enum_type: &EnumType) -> CategoryLayout {
    let mut members: Vec<_> = enum_type.members().iter().collect();
    // Ordinal (byte-wise) name order, value breaks ties. This ordering is part
    // of the file format.
    members.sort_by(|a, b| a.name.cmp(&b.name).then(a.value.cmp(&b.value)));

    let mut index_by_value = HashMap::with_capacity(members.len());
    for (idx, member) in members.iter().enumerate() {
        index_by_value.entry(member.value).or_insert(idx as i32);
    }

    let levels = members.into_iter().map(|m| m.name.clone()).collect();

    CategoryLayout {
        levels,
        index_by_value,
    }
}

/// Ordered level strings for writing `enum_type` as a new category.
pub fn levels_for(enum_type: &EnumType) -> Arc<[String]> {
    category_layout(enum_type).levels.clone()
}

/// On-disk category index for a member value of `enum_type`.
pub fn category_index_for(enum_type: &EnumType, value: i64) -> Option<i32> {
    category_layout(enum_type).index_of(value)
}

static NEXT_UNIVERSE_ID: AtomicU64 = AtomicU64::new(1);

/// Name to ordinal table unifying several enums.
///
/// Names are deduplicated case-insensitively and ordinals start at 1.
#[derive(Debug)]
pub struct MergedEnumUniverse {
    id: u64,
    sources: Vec<EnumTypeId>,
    names: Vec<String>,
    ordinals: HashMap<String, i32>,
}

impl MergedEnumUniverse {
    /// Build a universe from a list of names, deduplicating and sorting them.
    fn from_names<'a>(sources: Vec<EnumTypeId>, names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut seen = HashSet::new();
        let mut unique: Vec<&str> = Vec::new();
        for name in names {
            // First spelling wins.
            if seen.insert(fold_case(name)) {
                unique.push(name);
            }
        }

        unique.sort_by(|a, b| compare_ignore_case(a, b));

        let names: Vec<String> = unique.into_iter().map(|s| s.to_string()).collect();
        let ordinals = names
            .iter()
            .enumerate()
            .map(|(idx, name)| (fold_case(name), idx as i32 + 1))
            .collect();

        MergedEnumUniverse {
            id: NEXT_UNIVERSE_ID.fetch_add(1, AtomicOrdering::Relaxed),
            sources,
            names,
            ordinals,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names in ordinal order. Also the level list when written as a
    /// category, with level index = ordinal - 1.
    pub fn levels(&self) -> &[String] {
        &self.names
    }

    /// Enums this universe was merged from.
    pub fn sources(&self) -> &[EnumTypeId] {
        &self.sources
    }

    /// Case-insensitive ordinal lookup.
    pub fn ordinal_of(&self, name: &str) -> Option<i32> {
        self.ordinals.get(&fold_case(name)).copied()
    }

    pub fn name_of(&self, ordinal: i32) -> Option<&str> {
        if ordinal < 1 {
            return None;
        }
        self.names.get(ordinal as usize - 1).map(|s| s.as_str())
    }

    /// Check if every level is present in this universe.
    pub fn contains_all(&self, levels: &[String]) -> bool {
        levels.iter().all(|l| self.ordinal_of(l).is_some())
    }
}

impl PartialEq for MergedEnumUniverse {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MergedEnumUniverse {}

impl Hash for MergedEnumUniverse {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl fmt::Display for MergedEnumUniverse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.names.join(", "))
    }
}

fn compare_ignore_case(a: &str, b: &str) -> Ordering {
    fold_case(a).cmp(&fold_case(b)).then_with(|| a.cmp(b))
}

static UNIVERSE_CACHE: Lazy<RwLock<HashMap<Vec<EnumTypeId>, Arc<MergedEnumUniverse>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Merge the member names of several enums into one ordinal space.
///
/// Merging the same set of enums (in any order) returns the same universe.
pub fn merge_enum_universe(enum_types: &[EnumType]) -> Result<Arc<MergedEnumUniverse>> {
    if enum_types.is_empty() {
        return Err(FeatherError::new("Cannot merge an empty set of enums"));
    }

    let mut key: Vec<EnumTypeId> = enum_types.iter().map(|t| t.id()).collect();
    key.sort();
    key.dedup();

    if let Some(universe) = UNIVERSE_CACHE.read().get(&key) {
        return Ok(universe.clone());
    }

    // Deduplicate enum types while preserving the caller's order so that the
    // spelling kept for a name is deterministic.
    let mut seen = HashSet::new();
    let names = enum_types
        .iter()
        .filter(|t| seen.insert(t.id()))
        .flat_map(|t| t.members().iter().map(|m| m.name.as_str()));

    let universe = Arc::new(MergedEnumUniverse::from_names(key.clone(), names));
    trace!(%universe, "merged enum universe");

    Ok(UNIVERSE_CACHE
        .write()
        .entry(key)
        .or_insert(universe)
        .clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn resolve_by_name_ignoring_case_and_order() {
        let typ = EnumType::new("Abc", [("A", 5), ("B", 1), ("C", 9)]);
        assert_eq!(
            CategoryEnumMapType::ByName,
            resolve_mapping(&typ, &levels(&["a", "b", "c"]))
        );
        assert_eq!(
            CategoryEnumMapType::ByName,
            resolve_mapping(&typ, &levels(&["c", "A"]))
        );
    }

    #[test]
    fn resolve_by_ordinal() {
        let typ = EnumType::new("Xyz", [("X", 0), ("Y", 1), ("Z", 2)]);
        assert_eq!(
            CategoryEnumMapType::ByOrdinal,
            resolve_mapping(&typ, &levels(&["a", "b", "c"]))
        );
    }

    #[test]
    fn resolve_none() {
        let typ = EnumType::new("Q", [("Q", 0)]);
        assert_eq!(
            CategoryEnumMapType::None,
            resolve_mapping(&typ, &levels(&["a", "b"]))
        );
    }

    #[test]
    fn name_match_requires_distinct_members() {
        // Both levels fold to the same member, and ordinals 0 and 1 aren't
        // both defined.
        let typ = EnumType::new("A", [("A", 1), ("B", 2)]);
        assert_eq!(
            CategoryEnumMapType::None,
            resolve_mapping(&typ, &levels(&["a", "A"]))
        );
    }

    #[test]
    fn levels_for_sorts_ordinally() {
        let typ = EnumType::new("Greek", [("Beta", 10), ("Alpha", 1), ("alpha2", 1)]);
        let got = levels_for(&typ);
        assert_eq!(&["Alpha", "Beta", "alpha2"], got.as_ref());

        // Shared value maps to the first level carrying it.
        assert_eq!(Some(0), category_index_for(&typ, 1));
        assert_eq!(Some(1), category_index_for(&typ, 10));
        assert_eq!(None, category_index_for(&typ, 2));
    }

    #[test]
    fn levels_for_ties_broken_by_value() {
        let typ = EnumType::new("Dup", [("b", 7), ("a", 3), ("b", 2)]);
        let layout = category_layout(&typ);
        assert_eq!(&["a", "b", "b"], layout.levels().as_ref());
        assert_eq!(Some(1), layout.index_of(2));
        assert_eq!(Some(2), layout.index_of(7));
    }

    #[test]
    fn merge_universe_dedupes_and_sorts() {
        let a = EnumType::new("A", [("red", 0), ("Green", 1)]);
        let b = EnumType::new("B", [("RED", 4), ("blue", 5)]);

        let universe = merge_enum_universe(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(&["blue", "Green", "red"], universe.levels());
        assert_eq!(Some(1), universe.ordinal_of("BLUE"));
        assert_eq!(Some(3), universe.ordinal_of("Red"));
        assert_eq!(Some("Green"), universe.name_of(2));
        assert_eq!(None, universe.name_of(0));
        assert_eq!(None, universe.name_of(4));

        // Same set, different order, same identity.
        let again = merge_enum_universe(&[b, a]).unwrap();
        assert_eq!(universe, again);
    }

    #[test]
    fn merge_empty_errors() {
        assert!(merge_enum_universe(&[]).is_err());
    }
}
