//! The species parameter tag store.
//!
//! Species parameter files name every value with a tag such as `k-v-3`
//! (third development parameter) or `k-conc-n-leaf-1` (maximum nitrogen
//! concentration of leaf). This module knows the grammar of valid tags,
//! holds the assigned values and reports the three parameter error kinds.
//!
//! Assignment validates before it mutates: a rejected tag or literal leaves
//! the store exactly as it was.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ParamError;

/// Flag tags that hold booleans rather than numbers.
pub const FLAG_TAGS: [&str; 6] = ["grass", "legume", "annual", "isc4", "longday", "shortday"];

/// Numbered tag families: `(family, first index, last index)`.
const NUMBERED_FAMILIES: [(&str, u8, u8); 26] = [
    ("v", 1, 30),
    ("i", 1, 10),
    ("wu", 1, 6),
    ("ru", 1, 6),
    ("bt", 1, 2),
    ("t", 1, 2),
    ("w", 1, 1),
    ("wl", 1, 2),
    ("mr", 1, 1),
    ("tl", 1, 4),
    ("re", 1, 4),
    ("a", 1, 5),
    ("mo", 1, 1),
    ("r", 1, 10),
    ("d", 1, 9),
    ("dr", 1, 4),
    ("f2", 2, 4),
    ("br2", 2, 5),
    ("y", 1, 9),
    ("s", 1, 4),
    ("g", 1, 8),
    ("z", 1, 1),
    ("fix", 1, 5),
    ("aa", 1, 6),
    ("cp", 1, 12),
    ("dg", 1, 12),
];

const SHOOT_NAMES: [&str; 2] = ["leaf", "stem"];
const PART_NAMES: [&str; 4] = ["leaf", "stem", "root", "seed"];
const ELEMENT_NAMES: [&str; 3] = ["n", "p", "s"];
const NUTRIENT_NAMES: [&str; 4] = ["no3", "nh4", "pox", "so4"];
const SINGLE_TAGS: [&str; 3] = ["k-cpseed", "k-hr", "k-sf"];

/// The type of value a tag holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// A real number.
    Real,
    /// A boolean flag.
    Flag,
}

/// An assigned parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// A real-valued parameter.
    Real(f64),
    /// A boolean parameter.
    Flag(bool),
}

fn index_in(text: &str, first: u8, last: u8) -> bool {
    text.parse::<u8>().is_ok_and(|n| n >= first && n <= last)
}

/// Classify `tag`, or `None` if it is not part of the grammar.
pub fn tag_kind(tag: &str) -> Option<TagKind> {
    if FLAG_TAGS.contains(&tag) {
        return Some(TagKind::Flag);
    }
    if SINGLE_TAGS.contains(&tag) {
        return Some(TagKind::Real);
    }
    let rest = tag.strip_prefix("k-")?;
    let pieces: Vec<&str> = rest.split('-').collect();
    let known = match pieces.as_slice() {
        ["f1" | "br1", part] => SHOOT_NAMES.contains(part),
        ["s", "5", hardness] => matches!(*hardness, "soft" | "hard"),
        ["q", part, idx] => SHOOT_NAMES.contains(part) && index_in(idx, 1, 6),
        ["conc", element, part, idx] => {
            ELEMENT_NAMES.contains(element) && PART_NAMES.contains(part) && index_in(idx, 1, 5)
        }
        ["eff", nutrient] => NUTRIENT_NAMES.contains(nutrient),
        ["reloc", element] => ELEMENT_NAMES.contains(element),
        ["dmdseed", ripeness] => matches!(*ripeness, "unripe" | "ripe"),
        [family, idx] => NUMBERED_FAMILIES
            .iter()
            .any(|(name, first, last)| name == family && index_in(idx, *first, *last)),
        _ => false,
    };
    known.then_some(TagKind::Real)
}

fn parse_flag(literal: &str) -> Option<bool> {
    match literal.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// A species parameter set: tag to assigned value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamSet {
    /// Name of the species the set describes.
    pub name: String,
    values: BTreeMap<String, ParamValue>,
}

impl ParamSet {
    /// An empty set for the named species.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: BTreeMap::new(),
        }
    }

    fn kind_of(tag: &str) -> Result<TagKind, ParamError> {
        tag_kind(tag).ok_or_else(|| ParamError::InvalidReference {
            tag: tag.to_owned(),
        })
    }

    /// Assign a value parsed from text.
    pub fn set_text(&mut self, tag: &str, literal: &str) -> Result<(), ParamError> {
        let value = match Self::kind_of(tag)? {
            TagKind::Real => literal
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(ParamValue::Real),
            TagKind::Flag => parse_flag(literal).map(ParamValue::Flag),
        }
        .ok_or_else(|| ParamError::ParseFailure {
            tag: tag.to_owned(),
            literal: literal.to_owned(),
        })?;
        self.values.insert(tag.to_owned(), value);
        Ok(())
    }

    /// Assign a real value.
    pub fn set_real(&mut self, tag: &str, value: f64) -> Result<(), ParamError> {
        match Self::kind_of(tag)? {
            TagKind::Real if value.is_finite() => {
                self.values.insert(tag.to_owned(), ParamValue::Real(value));
                Ok(())
            }
            _ => Err(ParamError::ParseFailure {
                tag: tag.to_owned(),
                literal: value.to_string(),
            }),
        }
    }

    /// Assign a boolean flag.
    pub fn set_flag(&mut self, tag: &str, value: bool) -> Result<(), ParamError> {
        match Self::kind_of(tag)? {
            TagKind::Flag => {
                self.values.insert(tag.to_owned(), ParamValue::Flag(value));
                Ok(())
            }
            TagKind::Real => Err(ParamError::ParseFailure {
                tag: tag.to_owned(),
                literal: value.to_string(),
            }),
        }
    }

    /// Assign every `(tag, literal)` pair, or none of them if any fails.
    pub fn set_all<'a>(
        &mut self,
        entries: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<(), ParamError> {
        let mut staged = self.clone();
        for (tag, literal) in entries {
            staged.set_text(tag, literal)?;
        }
        *self = staged;
        Ok(())
    }

    /// Returns `true` if `tag` has an assigned value.
    pub fn is_defined(&self, tag: &str) -> bool {
        self.values.contains_key(tag)
    }

    /// The real value of `tag`.
    pub fn real(&self, tag: &str) -> Result<f64, ParamError> {
        match (Self::kind_of(tag)?, self.values.get(tag)) {
            (_, Some(ParamValue::Real(value))) => Ok(*value),
            (TagKind::Flag, Some(ParamValue::Flag(value))) => Ok(if *value { 1.0 } else { 0.0 }),
            _ => Err(ParamError::UndefinedValue {
                tag: tag.to_owned(),
            }),
        }
    }

    /// The real value of `tag`, or `default` if it is unassigned.
    pub fn real_or(&self, tag: &str, default: f64) -> Result<f64, ParamError> {
        match self.real(tag) {
            Err(ParamError::UndefinedValue { .. }) => Ok(default),
            other => other,
        }
    }

    /// The value of flag `tag`; unassigned flags read as `false`.
    pub fn flag(&self, tag: &str) -> Result<bool, ParamError> {
        match (Self::kind_of(tag)?, self.values.get(tag)) {
            (_, Some(ParamValue::Flag(value))) => Ok(*value),
            (TagKind::Flag, None) => Ok(false),
            (TagKind::Real, _) => Err(ParamError::UndefinedValue {
                tag: tag.to_owned(),
            }),
            (TagKind::Flag, Some(ParamValue::Real(value))) => Ok(*value != 0.0),
        }
    }

    /// Copy every assigned value of `other` into this set.
    pub fn merge_from(&mut self, other: &Self) {
        for (tag, value) in &other.values {
            self.values.insert(tag.clone(), *value);
        }
    }

    /// Iterate over the assigned tags and values in tag order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(tag, value)| (tag.as_str(), value))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn grammar_accepts_each_family_shape() {
        for tag in [
            "k-v-30",
            "k-f1-leaf",
            "k-f2-4",
            "k-br2-5",
            "k-q-stem-6",
            "k-s-5-hard",
            "k-conc-p-root-3",
            "k-eff-so4",
            "k-reloc-s",
            "k-dmdseed-ripe",
            "k-cp-12",
            "k-hr",
        ] {
            assert_eq!(tag_kind(tag), Some(TagKind::Real), "{tag}");
        }
        assert_eq!(tag_kind("annual"), Some(TagKind::Flag));
    }

    #[test]
    fn grammar_rejects_out_of_range_and_unknown_tags() {
        for tag in ["k-v-31", "k-v-0", "k-f2-1", "k-q-root-1", "k-conc-k-leaf-1", "k-zz-1", "v-3", ""] {
            assert_eq!(tag_kind(tag), None, "{tag}");
        }
    }

    #[test]
    fn unknown_tag_is_an_invalid_reference() {
        let mut set = ParamSet::new("test");
        let err = set.set_text("k-nope-1", "1.0").unwrap_err();
        assert_eq!(
            err,
            ParamError::InvalidReference {
                tag: String::from("k-nope-1")
            }
        );
        assert!(matches!(set.real("k-nope-1"), Err(ParamError::InvalidReference { .. })));
    }

    #[test]
    fn unassigned_tag_is_an_undefined_value() {
        let set = ParamSet::new("test");
        assert!(matches!(set.real("k-v-3"), Err(ParamError::UndefinedValue { .. })));
        assert!((set.real_or("k-v-3", 2.5).unwrap() - 2.5).abs() < f64::EPSILON);
        assert!(!set.flag("annual").unwrap());
    }

    #[test]
    fn malformed_literal_is_a_parse_failure_and_leaves_store_unchanged() {
        let mut set = ParamSet::new("test");
        set.set_text("k-v-3", "2.0").unwrap();
        let err = set.set_text("k-v-3", "two").unwrap_err();
        assert!(matches!(err, ParamError::ParseFailure { .. }));
        assert!((set.real("k-v-3").unwrap() - 2.0).abs() < f64::EPSILON);
        assert!(matches!(
            set.set_text("annual", "maybe"),
            Err(ParamError::ParseFailure { .. })
        ));
    }

    #[test]
    fn failed_batch_assignment_applies_nothing() {
        let mut set = ParamSet::new("test");
        let result = set.set_all([("k-v-3", "2"), ("k-v-5", "1000"), ("k-v-6", "oops")]);
        assert!(result.is_err());
        assert!(!set.is_defined("k-v-3"));
        assert!(!set.is_defined("k-v-5"));

        set.set_all([("k-v-3", "2"), ("annual", "true")]).unwrap();
        assert!(set.flag("annual").unwrap());
        assert_eq!(set.iter().count(), 2);
    }

    #[test]
    fn flags_and_reals_do_not_cross_assign() {
        let mut set = ParamSet::new("test");
        assert!(set.set_flag("k-v-3", true).is_err());
        assert!(set.set_real("annual", 1.0).is_err());
        assert!(set.set_real("k-v-3", f64::NAN).is_err());
    }
}
