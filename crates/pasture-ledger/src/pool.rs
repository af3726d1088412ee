//! Conserved arithmetic on [`DmPool`]s.
//!
//! All operations carry nutrient and ash alkalinity in proportion to the
//! dry mass they move. Only the elements selected by the [`ElementSet`]
//! are touched; ash alkalinity is carried only when nitrogen is tracked.

use pasture_types::constants::{MASS_BALANCE_FLOOR, ROUND_OFF, TOLERANCE};
use pasture_types::{DmPool, Element, ElementSet};

use crate::LedgerError;
use crate::math::div0;

/// Pool operations bound to the set of tracked nutrient elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolOps {
    elements: ElementSet,
}

impl PoolOps {
    /// Operations tracking `elements`.
    pub const fn new(elements: ElementSet) -> Self {
        Self { elements }
    }

    /// The tracked element set.
    pub const fn elements(&self) -> ElementSet {
        self.elements
    }

    fn tracks_ash(self) -> bool {
        self.elements.contains(Element::N)
    }

    /// Add `src` into `dst` if `src` holds positive dry mass.
    pub fn add(&self, dst: &mut DmPool, src: &DmPool) {
        if src.dm > 0.0 {
            self.add_allowing_loss(dst, src);
        }
    }

    /// Add `src` into `dst` unconditionally, so a negative `src` is
    /// subtracted. Used for net growth, which may be a loss.
    pub fn add_allowing_loss(&self, dst: &mut DmPool, src: &DmPool) {
        dst.dm += src.dm;
        for &element in self.elements.elements() {
            dst.nu[element] += src.nu[element];
        }
        if self.tracks_ash() {
            dst.ash_alk += src.ash_alk;
        }
    }

    /// Subtract `src` from `dst` field by field. The caller is responsible
    /// for `src` being a part of `dst`.
    pub fn subtract(&self, dst: &mut DmPool, src: &DmPool) {
        dst.dm -= src.dm;
        for &element in self.elements.elements() {
            dst.nu[element] -= src.nu[element];
        }
        if self.tracks_ash() {
            dst.ash_alk -= src.ash_alk;
        }
    }

    /// Remove `dm` of dry mass (capped at what `src` holds) from `src`,
    /// returning the removed material with its share of nutrient and ash.
    ///
    /// If less than a round-off amount would be left behind, the whole of
    /// `src` is taken.
    pub fn split_off(&self, src: &mut DmPool, dm: f64) -> DmPool {
        let mut taken = DmPool::ZERO;
        if dm <= 0.0 || src.dm <= 0.0 {
            return taken;
        }
        if src.dm - dm < TOLERANCE {
            taken.dm = src.dm;
            for &element in self.elements.elements() {
                taken.nu[element] = src.nu[element];
            }
            if self.tracks_ash() {
                taken.ash_alk = src.ash_alk;
            }
            *src = DmPool::ZERO;
            return taken;
        }
        taken.dm = dm;
        for &element in self.elements.elements() {
            taken.nu[element] = dm * src.nu[element] / src.dm;
        }
        if self.tracks_ash() {
            taken.ash_alk = dm * src.ash_alk / src.dm;
        }

        src.dm -= taken.dm;
        for &element in self.elements.elements() {
            src.nu[element] -= taken.nu[element];
        }
        if self.tracks_ash() {
            src.ash_alk -= taken.ash_alk;
        }
        taken
    }

    /// Move `dm` of dry mass with its nutrient and ash from `src` to `dst`.
    /// Returns the dry mass actually moved.
    pub fn move_dm(&self, src: &mut DmPool, dst: &mut DmPool, dm: f64) -> f64 {
        let taken = self.split_off(src, dm);
        self.add_allowing_loss(dst, &taken);
        taken.dm
    }

    /// Move the fraction `propn` of `src` into `dst`.
    pub fn move_fraction(&self, src: &mut DmPool, dst: &mut DmPool, propn: f64) -> f64 {
        let dm = propn * src.dm;
        self.move_dm(src, dst, dm)
    }

    /// Change the dry mass of `pool` to `new_dm`, holding nutrient and ash
    /// concentrations constant.
    pub fn resize(&self, pool: &mut DmPool, new_dm: f64) {
        for &element in self.elements.elements() {
            pool.nu[element] = new_dm * div0(pool.nu[element], pool.dm);
        }
        if self.tracks_ash() {
            pool.ash_alk = new_dm * div0(pool.ash_alk, pool.dm);
        }
        pool.dm = new_dm;
    }

    /// Remove up to `amount` of `element` from `src` without moving any dry
    /// mass, returning the amount removed.
    pub fn take_nutrient(&self, src: &mut DmPool, element: Element, amount: f64) -> f64 {
        if amount <= 0.0 || !self.elements.contains(element) {
            return 0.0;
        }
        let amount = amount.min(src.nu[element]).max(0.0);
        src.nu[element] -= amount;
        amount
    }

    /// Move up to `amount` of `element` from `src` to `dst` without moving
    /// any dry mass. Returns the amount moved.
    pub fn move_nutrient(
        &self,
        src: &mut DmPool,
        dst: &mut DmPool,
        element: Element,
        amount: f64,
    ) -> f64 {
        let moved = self.take_nutrient(src, element, amount);
        dst.nu[element] += moved;
        moved
    }

    /// A copy of the fraction `propn` of `pool`, restricted to the tracked
    /// quantities.
    pub fn fraction(&self, pool: &DmPool, propn: f64) -> DmPool {
        let mut part = DmPool::with_dm(propn * pool.dm);
        for &element in self.elements.elements() {
            part.nu[element] = propn * pool.nu[element];
        }
        if self.tracks_ash() {
            part.ash_alk = propn * pool.ash_alk;
        }
        part
    }

    /// Zero a pool whose dry mass is a round-off residue.
    ///
    /// A pool with small non-zero mass is emptied; one driven below the
    /// mass-balance floor is an error.
    pub fn zero_round_off(&self, pool: &mut DmPool) -> Result<(), LedgerError> {
        if pool.dm != 0.0 && pool.dm < ROUND_OFF {
            if pool.dm > MASS_BALANCE_FLOOR {
                *pool = DmPool::ZERO;
            } else {
                tracing::error!(dm = pool.dm, "pool driven negative");
                return Err(LedgerError::MassBalance { dm: pool.dm });
            }
        }
        Ok(())
    }
}
