//! Fixed-size lookup tables keyed by enumerations.
//!
//! An [`EnumTable`] stores exactly one value per variant of its key type and
//! is indexed by the variant itself. Aggregates ("totals") are never stored
//! in a reserved slot of these tables; the structures that need them keep an
//! explicit total field alongside.

use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::enums::{
    DevelopEvent, DevelopStage, Element, GrowthLimit, Hardness, Nutrient, Part, Ripeness,
    RootAge, ShootPart, Status,
};

/// An enumeration usable as the key of an [`EnumTable`].
pub trait TableKey: Copy + 'static {
    /// Every variant, in index order.
    const ALL: &'static [Self];

    /// Zero-based position of the variant within [`TableKey::ALL`].
    fn index(self) -> usize;

    /// The variant at `index`, saturating at the last variant.
    fn from_index(index: usize) -> Self;
}

/// A dense table with one value per variant of `K`.
///
/// `N` must equal `K::ALL.len()`; the type aliases in this module fix it for
/// each key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnumTable<K, T, const N: usize> {
    values: [T; N],
    key: PhantomData<fn() -> K>,
}

impl<K: TableKey, T: Copy, const N: usize> EnumTable<K, T, N> {
    /// A table with every entry set to `value`.
    pub const fn filled(value: T) -> Self {
        Self {
            values: [value; N],
            key: PhantomData,
        }
    }
}

impl<K: TableKey, T, const N: usize> EnumTable<K, T, N> {
    /// Build a table by evaluating `f` for every key.
    pub fn from_fn(mut f: impl FnMut(K) -> T) -> Self {
        Self {
            values: std::array::from_fn(|i| f(K::from_index(i))),
            key: PhantomData,
        }
    }

    /// Iterate over `(key, &value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (K, &T)> {
        K::ALL.iter().copied().zip(self.values.iter())
    }

    /// Iterate over `(key, &mut value)` pairs in key order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (K, &mut T)> {
        K::ALL.iter().copied().zip(self.values.iter_mut())
    }

    /// Iterate over the values in key order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.values.iter()
    }

    /// Iterate mutably over the values in key order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.values.iter_mut()
    }

    /// Apply `f` to every value, producing a new table.
    pub fn map<U>(&self, mut f: impl FnMut(K, &T) -> U) -> EnumTable<K, U, N> {
        EnumTable::from_fn(|key| f(key, &self[key]))
    }
}

impl<K: TableKey, const N: usize> EnumTable<K, f64, N> {
    /// Sum of all entries.
    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }
}

impl<K: TableKey, T: Default, const N: usize> Default for EnumTable<K, T, N> {
    fn default() -> Self {
        Self {
            values: std::array::from_fn(|_| T::default()),
            key: PhantomData,
        }
    }
}

impl<K: TableKey, T, const N: usize> Index<K> for EnumTable<K, T, N> {
    type Output = T;

    #[allow(clippy::indexing_slicing)]
    fn index(&self, key: K) -> &T {
        &self.values[key.index()]
    }
}

impl<K: TableKey, T, const N: usize> IndexMut<K> for EnumTable<K, T, N> {
    #[allow(clippy::indexing_slicing)]
    fn index_mut(&mut self, key: K) -> &mut T {
        &mut self.values[key.index()]
    }
}

impl<K: TableKey, T: Serialize, const N: usize> Serialize for EnumTable<K, T, N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.values.iter())
    }
}

impl<'de, K: TableKey, T: Deserialize<'de> + Default, const N: usize> Deserialize<'de>
    for EnumTable<K, T, N>
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = Vec::<T>::deserialize(deserializer)?;
        if items.len() != N {
            return Err(serde::de::Error::invalid_length(
                items.len(),
                &"one value per table key",
            ));
        }
        let mut table = Self::default();
        for (slot, item) in table.values.iter_mut().zip(items) {
            *slot = item;
        }
        Ok(table)
    }
}

// ---------------------------------------------------------------------------
// Key implementations
// ---------------------------------------------------------------------------

macro_rules! table_key {
    ($ty:ty) => {
        impl TableKey for $ty {
            const ALL: &'static [Self] = &<$ty>::ALL;

            fn index(self) -> usize {
                <$ty>::index(self)
            }

            fn from_index(index: usize) -> Self {
                let [.., last] = <$ty>::ALL;
                <$ty>::ALL.get(index).copied().unwrap_or(last)
            }
        }
    };
}

table_key!(Status);
table_key!(Part);
table_key!(ShootPart);
table_key!(Element);
table_key!(Nutrient);
table_key!(DevelopStage);
table_key!(DevelopEvent);
table_key!(GrowthLimit);
table_key!(RootAge);
table_key!(Hardness);
table_key!(Ripeness);

/// One value per cohort status.
pub type StatusTable<T> = EnumTable<Status, T, 6>;
/// One value per plant part.
pub type PartTable<T> = EnumTable<Part, T, 4>;
/// One value per shoot part.
pub type ShootTable<T> = EnumTable<ShootPart, T, 2>;
/// One value per nutrient element.
pub type ElementTable<T> = EnumTable<Element, T, 3>;
/// One value per soil nutrient form.
pub type NutrientTable<T> = EnumTable<Nutrient, T, 4>;
/// One value per developmental stage.
pub type StageTable<T> = EnumTable<DevelopStage, T, 7>;
/// One value per phenological event.
pub type EventTable<T> = EnumTable<DevelopEvent, T, 9>;
/// One factor per growth limit.
pub type LimitTable = EnumTable<GrowthLimit, f64, 8>;
/// One value per root age.
pub type AgeTable<T> = EnumTable<RootAge, T, 2>;
/// One value per seed hardness.
pub type HardnessTable<T> = EnumTable<Hardness, T, 2>;
/// One value per seed ripeness.
pub type RipenessTable<T> = EnumTable<Ripeness, T, 2>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn tables_index_by_variant() {
        let mut table: PartTable<f64> = PartTable::filled(0.0);
        table[Part::Root] = 2.5;
        table[Part::Seed] += 1.0;
        assert!((table[Part::Root] - 2.5).abs() < 1e-12);
        assert!((table.sum() - 3.5).abs() < 1e-12);
    }

    #[test]
    fn from_fn_visits_every_key_in_order() {
        let table = StatusTable::from_fn(Status::index);
        let collected: Vec<usize> = table.values().copied().collect();
        assert_eq!(collected, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn iter_pairs_keys_with_values() {
        let table = ShootTable::from_fn(|part| match part {
            ShootPart::Leaf => 1.0,
            ShootPart::Stem => 2.0,
        });
        let pairs: Vec<(ShootPart, f64)> = table.iter().map(|(k, v)| (k, *v)).collect();
        assert_eq!(pairs, vec![(ShootPart::Leaf, 1.0), (ShootPart::Stem, 2.0)]);
    }

    #[test]
    fn tables_serialize_as_sequences() {
        let table = ShootTable::from_fn(|part| part.index());
        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(json, "[0,1]");
        let back: ShootTable<usize> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
        assert!(serde_json::from_str::<ShootTable<usize>>("[0]").is_err());
    }

    #[test]
    fn limit_table_defaults_to_zero() {
        let limits = LimitTable::default();
        assert!(limits.values().all(|v| v.abs() < f64::EPSILON));
    }
}
