//! Herbage available for removal and the proportions a removal takes.
//!
//! Green herbage keeps an ungrazeable stubble whose mass shrinks as the
//! sward grows taller; standing dead and fresh litter are fully available;
//! old litter cannot be removed at all.

use pasture_ledger::math::div0;
use pasture_types::constants::UNGRAZEABLE;
use pasture_types::{
    ClassTable, DmdClass, RipenessTable, ShootTable, Status, StatusGroup, StatusTable,
};

use super::Population;
use crate::environment::RemovalRequest;

/// Number of digestibility classes a grazing animal's diet is reported in.
/// Each spans two herbage classes.
pub const DIET_CLASS_COUNT: usize = 6;

/// Fraction of each herbage pool removed today, per status.
pub(crate) type RemovalProportions = StatusTable<ShootTable<ClassTable<f64>>>;

impl Population {
    /// Fraction of the herbage of `status` that can be removed.
    pub fn avail_propn(&self, status: Status) -> f64 {
        match status {
            Status::Seedling | Status::Established | Status::Senescing => {
                let green = self.herbage(StatusGroup::Green).dm;
                let stubble = div0(UNGRAZEABLE, self.site.params.height_ratio);
                if green > stubble {
                    1.0 - stubble / green
                } else {
                    0.0
                }
            }
            Status::Dead | Status::Litter1 => 1.0,
            Status::Litter2 => 0.0,
        }
    }

    /// Herbage available for removal in each digestibility class (g/m^2).
    pub fn available_herbage(&self) -> ClassTable<f64> {
        let mut avail = ClassTable::filled(0.0);
        for status in Status::ALL {
            let propn = self.avail_propn(status);
            if propn <= 0.0 {
                continue;
            }
            for cohort in self.cohorts.iter().filter(|cohort| cohort.status == status) {
                for (class, total) in avail.iter_mut() {
                    *total += propn * cohort.class_total(class).dm;
                }
            }
        }
        avail
    }

    /// Removal request for a diet reported in the coarser animal classes.
    ///
    /// Diet class `i` covers herbage classes `2i - 1` and `2i` and is split
    /// between the two by the herbage available in each. A diet class with
    /// nothing available under it removes nothing.
    pub fn removal_from_diet(
        &self,
        diet: &[f64; DIET_CLASS_COUNT],
        seed: &RipenessTable<f64>,
    ) -> RemovalRequest {
        let avail = self.available_herbage();
        let mut herbage = ClassTable::filled(0.0);
        for (pair, &eaten) in DmdClass::ALL.chunks_exact(2).zip(diet) {
            let &[upper, lower] = pair else {
                continue;
            };
            let total = avail[upper] + avail[lower];
            let eaten = eaten.max(0.0);
            herbage[upper] = eaten * div0(avail[upper], total);
            herbage[lower] = eaten * div0(avail[lower], total);
        }
        RemovalRequest {
            herbage,
            seed: seed.map(|_, &dm| dm.max(0.0)),
        }
    }

    /// Spread a per-class removal over the statuses and parts holding
    /// available herbage of that class.
    ///
    /// A request beyond what is available takes all of it.
    pub(crate) fn removal_proportions(&self, requested: &ClassTable<f64>) -> RemovalProportions {
        let avail = self.available_herbage();
        let class_propn = ClassTable::from_fn(|class: DmdClass| {
            if avail[class] > 0.0 {
                div0(requested[class].max(0.0), avail[class]).min(1.0)
            } else {
                0.0
            }
        });
        StatusTable::from_fn(|status| {
            let propn = self.avail_propn(status);
            ShootTable::filled(class_propn.map(|_, value| propn * value))
        })
    }
}
