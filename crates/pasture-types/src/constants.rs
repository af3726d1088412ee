//! Shared numeric tolerances and reference values.

/// Near-zero mass (g/m^2) below which a pool or cohort counts as empty.
pub const VERY_SMALL: f64 = 1.0e-4;

/// Stand-in for an unbounded rate.
pub const VERY_LARGE: f64 = 1.0e6;

/// A source pool is zeroed when a move leaves less than this much in it.
pub const TOLERANCE: f64 = 1.0e-8;

/// Round-off magnitude zeroed after a mass-balance step.
pub const ROUND_OFF: f64 = 1.0e-6;

/// Negative mass below this after a mass-balance step is an error.
pub const MASS_BALANCE_FLOOR: f64 = -1.0e-4;

/// Green herbage (g/m^2 scaled by height ratio) that grazing cannot reach.
pub const UNGRAZEABLE: f64 = 40.0;

/// Screen minimum temperature (oC) at or below which frost occurs.
pub const FROST_THRESHOLD: f64 = 2.2;

/// Reference radiation (MJ/m^2/d) for specific leaf area.
pub const REF_RADN: f64 = 20.0;

/// Reference day length (h).
pub const REF_DAY_LENGTH: f64 = 12.0;

/// Reference radiation flux (MJ/m^2/h) for radiation-use efficiency.
pub const REF_RADN_FLUX: f64 = REF_RADN / REF_DAY_LENGTH;

/// Reference CO2 concentration (ppm) at which CO2 responses equal one.
pub const REF_CO2: f64 = 350.0;

/// Reference temperature (oC) for the CO2 compensation point.
pub const REF_CO2_TEMP: f64 = 20.0;

/// Root depth (mm) beyond which a seedling cohort no longer absorbs new
/// seedlings.
pub const COHORT_ROOT_DIFF: f64 = 100.0;

/// Default P:N ratio used when phosphorus is not tracked.
pub const DEFAULT_P_TO_N: f64 = 0.10;

/// Default S:N ratio used when sulphur is not tracked.
pub const DEFAULT_S_TO_N: f64 = 0.08;

/// Crude protein to nitrogen conversion.
pub const N_TO_PROTEIN: f64 = 6.25;

/// Default soil pH.
pub const DEFAULT_PH: f64 = 7.0;
