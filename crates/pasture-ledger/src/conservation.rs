//! Daily mass-balance audit.
//!
//! Material enters the plant population only through net growth (which
//! carries assimilated dry matter and the nutrient taken up or fixed) and
//! through sowing. It leaves only through respiration of dead tissue,
//! grazing, residue (shoot and root death, discarded seed), leaching and
//! gaseous loss. Every other movement is internal. For each conserved
//! quantity Q on day D the audit checks:
//!
//! ```text
//! opening(Q) + inflow(Q) - outflow(Q) == closing(Q)    (within tolerance)
//! ```
//!
//! A violation produces a [`MassAnomaly`].

use std::collections::BTreeMap;

use pasture_types::{DmPool, Element, ElementSet};

use crate::MassAnomaly;

/// Absolute slack (g/m^2) allowed for round-off zeroing of empty pools.
pub const ABSOLUTE_TOLERANCE: f64 = 1.0e-3;

/// Relative slack allowed against the gross quantity audited.
pub const RELATIVE_TOLERANCE: f64 = 1.0e-6;

/// A quantity conserved by pool arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Quantity {
    /// Dry mass.
    DryMatter,
    /// Mass of one nutrient element.
    Nutrient(Element),
    /// Ash alkalinity.
    AshAlkalinity,
}

impl Quantity {
    fn of(self, pool: &DmPool) -> f64 {
        match self {
            Self::DryMatter => pool.dm,
            Self::Nutrient(element) => pool.nu[element],
            Self::AshAlkalinity => pool.ash_alk,
        }
    }
}

/// The result of a mass-balance check for a single day.
#[derive(Debug, Clone, PartialEq)]
pub enum ConservationResult {
    /// Every tracked quantity balanced.
    Balanced,
    /// One or more quantities did not balance.
    Anomaly(MassAnomaly),
}

/// Accumulates one day's opening stock and boundary flows.
#[derive(Debug, Clone, PartialEq)]
pub struct MassAudit {
    elements: ElementSet,
    opening: DmPool,
    inflow: DmPool,
    outflow: DmPool,
}

impl MassAudit {
    /// Start an audit from the stock held at the start of the day.
    pub const fn open(elements: ElementSet, opening: DmPool) -> Self {
        Self {
            elements,
            opening,
            inflow: DmPool::ZERO,
            outflow: DmPool::ZERO,
        }
    }

    /// Record material entering the population. Negative net growth is a
    /// valid (negative) inflow.
    pub fn credit(&mut self, pool: &DmPool) {
        accumulate(&mut self.inflow, pool);
    }

    /// Record material leaving the population.
    pub fn debit(&mut self, pool: &DmPool) {
        accumulate(&mut self.outflow, pool);
    }

    /// Record dry mass lost to respiration.
    pub fn debit_dm(&mut self, dm: f64) {
        self.outflow.dm += dm;
    }

    /// Total recorded inflow.
    pub const fn inflow(&self) -> &DmPool {
        &self.inflow
    }

    /// Total recorded outflow.
    pub const fn outflow(&self) -> &DmPool {
        &self.outflow
    }

    fn quantities(&self) -> Vec<Quantity> {
        let mut quantities = vec![Quantity::DryMatter];
        quantities.extend(self.elements.elements().iter().map(|e| Quantity::Nutrient(*e)));
        if self.elements.contains(Element::N) {
            quantities.push(Quantity::AshAlkalinity);
        }
        quantities
    }

    /// Compare the closing stock against opening plus net boundary flow.
    pub fn verify(&self, day: u64, closing: &DmPool) -> ConservationResult {
        let mut imbalances = BTreeMap::new();
        for quantity in self.quantities() {
            let opening = quantity.of(&self.opening);
            let inflow = quantity.of(&self.inflow);
            let outflow = quantity.of(&self.outflow);
            let expected = opening + inflow - outflow;
            let actual = quantity.of(closing);
            let scale = opening.abs() + inflow.abs() + outflow.abs();
            let tolerance = ABSOLUTE_TOLERANCE + RELATIVE_TOLERANCE * scale;
            if (expected - actual).abs() > tolerance {
                imbalances.insert(quantity, (expected, actual));
            }
        }

        if imbalances.is_empty() {
            return ConservationResult::Balanced;
        }

        let summary: Vec<String> = imbalances
            .iter()
            .map(|(quantity, (expected, actual))| {
                format!("{quantity:?}: expected {expected:.6}, found {actual:.6}")
            })
            .collect();
        ConservationResult::Anomaly(MassAnomaly {
            day,
            message: format!("MASS_ANOMALY on day {day}: {}", summary.join("; ")),
            imbalances,
        })
    }
}

fn accumulate(total: &mut DmPool, pool: &DmPool) {
    total.dm += pool.dm;
    for element in Element::ALL {
        total.nu[element] += pool.nu[element];
    }
    total.ash_alk += pool.ash_alk;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::PoolOps;

    fn pool(dm: f64, n: f64) -> DmPool {
        let mut pool = DmPool::with_dm(dm);
        pool.nu[Element::N] = n;
        pool
    }

    #[test]
    fn untouched_stock_is_balanced() {
        let audit = MassAudit::open(ElementSet::N, pool(100.0, 3.0));
        assert_eq!(audit.verify(1, &pool(100.0, 3.0)), ConservationResult::Balanced);
    }

    #[test]
    fn grazing_from_mixed_classes_balances() {
        // 100 g/m^2 split 60/40 between two classes, 30% grazed evenly.
        let ops = PoolOps::new(ElementSet::N);
        let mut high = pool(60.0, 1.8);
        let mut low = pool(40.0, 0.8);
        let mut eaten = DmPool::ZERO;
        let mut audit = MassAudit::open(ElementSet::N, pool(100.0, 2.6));

        ops.move_fraction(&mut high, &mut eaten, 0.3);
        ops.move_fraction(&mut low, &mut eaten, 0.3);
        audit.debit(&eaten);

        assert!((eaten.dm - 30.0).abs() < 1e-9);
        assert!((high.dm - 42.0).abs() < 1e-9);
        assert!((low.dm - 28.0).abs() < 1e-9);

        let mut closing = high;
        ops.add(&mut closing, &low);
        assert_eq!(audit.verify(1, &closing), ConservationResult::Balanced);
    }

    #[test]
    fn growth_and_respiration_are_boundary_flows() {
        let mut audit = MassAudit::open(ElementSet::None, DmPool::with_dm(50.0));
        audit.credit(&DmPool::with_dm(4.0));
        audit.credit(&DmPool::with_dm(-1.0));
        audit.debit_dm(0.5);
        assert_eq!(
            audit.verify(3, &DmPool::with_dm(52.5)),
            ConservationResult::Balanced
        );
    }

    #[test]
    fn missing_mass_is_reported_per_quantity() {
        let audit = MassAudit::open(ElementSet::N, pool(100.0, 3.0));
        let ConservationResult::Anomaly(anomaly) = audit.verify(7, &pool(99.0, 3.0)) else {
            panic!("Expected an anomaly");
        };
        assert_eq!(anomaly.day, 7);
        assert!(anomaly.imbalances.contains_key(&Quantity::DryMatter));
        assert!(!anomaly.imbalances.contains_key(&Quantity::Nutrient(Element::N)));
        assert!(anomaly.to_string().contains("MASS_ANOMALY on day 7"));
    }

    #[test]
    fn untracked_elements_are_not_audited() {
        let audit = MassAudit::open(ElementSet::None, pool(10.0, 1.0));
        assert_eq!(audit.verify(1, &pool(10.0, 0.0)), ConservationResult::Balanced);
    }
}
