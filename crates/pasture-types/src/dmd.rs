//! Digestibility (DMD) classes.
//!
//! Herbage is binned into twelve classes of dry-matter digestibility, each
//! 0.05 wide, running from 0.85-0.80 (class 1) down to 0.30-0.25 (class 12).
//! Tissue ages by moving from a class to the next lower-digestibility class.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tables::{EnumTable, TableKey};

/// Number of herbage digestibility classes.
pub const HERB_CLASS_COUNT: usize = 12;

/// Width of each digestibility class.
pub const CLASS_WIDTH: f64 = 0.05;

/// Mid-point DMD of each class, class 1 first.
pub const HERBAGE_DMD: [f64; HERB_CLASS_COUNT] = [
    0.825, 0.775, 0.725, 0.675, 0.625, 0.575, 0.525, 0.475, 0.425, 0.375, 0.325, 0.275,
];

/// Class boundaries: `DMD_LIMITS[0]` is the top of class 1 and
/// `DMD_LIMITS[d]` is the bottom of class `d`.
pub const DMD_LIMITS: [f64; HERB_CLASS_COUNT + 1] = [
    0.85, 0.80, 0.75, 0.70, 0.65, 0.60, 0.55, 0.50, 0.45, 0.40, 0.35, 0.30, 0.25,
];

/// A herbage digestibility class, numbered 1 (most digestible) to 12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DmdClass(u8);

impl DmdClass {
    /// The most digestible class.
    pub const HIGHEST: Self = Self(1);

    /// The least digestible class.
    pub const LOWEST: Self = Self(12);

    /// Every class, most digestible first.
    pub const ALL: [Self; HERB_CLASS_COUNT] = [
        Self(1),
        Self(2),
        Self(3),
        Self(4),
        Self(5),
        Self(6),
        Self(7),
        Self(8),
        Self(9),
        Self(10),
        Self(11),
        Self(12),
    ];

    /// The class numbered `number` (1-based), or `None` if out of range.
    pub const fn new(number: u8) -> Option<Self> {
        if matches!(number, 1..=12) {
            Some(Self(number))
        } else {
            None
        }
    }

    /// The 1-based class number.
    pub const fn number(self) -> u8 {
        self.0
    }

    /// Zero-based position of the class in [`DmdClass::ALL`].
    pub const fn index(self) -> usize {
        self.0.saturating_sub(1) as usize
    }

    /// The next less-digestible class, if any.
    pub const fn lower(self) -> Option<Self> {
        Self::new(self.0.saturating_add(1))
    }

    /// The next more-digestible class, if any.
    pub const fn higher(self) -> Option<Self> {
        Self::new(self.0.saturating_sub(1))
    }

    /// Mid-point digestibility of the class.
    pub fn dmd(self) -> f64 {
        HERBAGE_DMD.get(self.index()).copied().unwrap_or(0.0)
    }

    /// Top boundary of the class.
    pub fn upper_limit(self) -> f64 {
        DMD_LIMITS.get(self.index()).copied().unwrap_or(0.0)
    }

    /// Bottom boundary of the class.
    pub fn lower_limit(self) -> f64 {
        DMD_LIMITS.get(self.index().saturating_add(1)).copied().unwrap_or(0.0)
    }

    /// Classes from `from` to `to` inclusive, in increasing class number.
    pub fn range(from: Self, to: Self) -> impl DoubleEndedIterator<Item = Self> {
        Self::ALL
            .into_iter()
            .filter(move |class| *class >= from && *class <= to)
    }

    /// Convert a digestibility value into the class containing it.
    ///
    /// Values on a class boundary go to the more digestible class when
    /// `round_high` is set and to the less digestible class otherwise.
    /// Values outside the class range saturate at class 1 or 12.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_dmd(dmd: f64, round_high: bool) -> Self {
        let bias = if round_high { -1.0e-5 } else { 1.0e-5 };
        let offset = ((HERBAGE_DMD[0] - dmd) / CLASS_WIDTH + bias).round();
        let number = (1.0 + offset).clamp(1.0, 12.0);
        Self(number as u8)
    }
}

impl TryFrom<u8> for DmdClass {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("digestibility class {value} outside 1..=12"))
    }
}

impl From<DmdClass> for u8 {
    fn from(class: DmdClass) -> Self {
        class.0
    }
}

impl fmt::Display for DmdClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DMD class {}", self.0)
    }
}

impl TableKey for DmdClass {
    const ALL: &'static [Self] = &Self::ALL;

    fn index(self) -> usize {
        Self::index(self)
    }

    fn from_index(index: usize) -> Self {
        Self::ALL.get(index).copied().unwrap_or(Self::LOWEST)
    }
}

/// One value per digestibility class.
pub type ClassTable<T> = EnumTable<DmdClass, T, HERB_CLASS_COUNT>;
