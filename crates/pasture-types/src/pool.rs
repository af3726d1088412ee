//! The conserved-quantity record moved by every mass flux.

use serde::{Deserialize, Serialize};

use crate::enums::Element;
use crate::tables::ElementTable;

/// Dry mass together with the nutrient mass and ash alkalinity it carries.
///
/// Units are g/m^2 for dry and nutrient mass and mol/m^2 for ash
/// alkalinity. Untracked elements stay at zero. The arithmetic that keeps
/// pools conserved lives in the ledger crate; this type is plain data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DmPool {
    /// Dry mass.
    pub dm: f64,
    /// Nutrient mass per element.
    #[serde(default)]
    pub nu: ElementTable<f64>,
    /// Ash alkalinity.
    #[serde(default)]
    pub ash_alk: f64,
}

impl DmPool {
    /// An empty pool.
    pub const ZERO: Self = Self {
        dm: 0.0,
        nu: ElementTable::filled(0.0),
        ash_alk: 0.0,
    };

    /// A pool holding dry mass only.
    pub const fn with_dm(dm: f64) -> Self {
        Self {
            dm,
            nu: ElementTable::filled(0.0),
            ash_alk: 0.0,
        }
    }

    /// Nutrient concentration (g/g) of `element`, zero for an empty pool.
    pub fn concentration(&self, element: Element) -> f64 {
        if self.dm > 0.0 {
            self.nu[element] / self.dm
        } else {
            0.0
        }
    }

    /// Returns `true` if the pool holds no dry mass and no nutrient.
    pub fn is_empty(&self) -> bool {
        self.dm <= 0.0 && self.nu.values().all(|nu| *nu <= 0.0)
    }
}
