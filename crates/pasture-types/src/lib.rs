//! Shared type definitions for the pasture population engine.
//!
//! This crate is the single source of truth for the vocabulary used across
//! the workspace: developmental statuses, plant parts, nutrient elements,
//! digestibility classes and the conserved-quantity record that every mass
//! flux moves around.
//!
//! # Modules
//!
//! - [`enums`] -- Enumeration types (status, part, element, phenology, seeds)
//! - [`tables`] -- Fixed-size lookup tables keyed by those enumerations
//! - [`dmd`] -- Digestibility classes and their DMD boundaries
//! - [`pool`] -- The [`DmPool`] conserved-quantity record
//! - [`constants`] -- Shared numeric tolerances and reference values

pub mod constants;
pub mod dmd;
pub mod enums;
pub mod pool;
pub mod tables;

// Re-export all public types at crate root for convenience.
pub use dmd::{ClassTable, DmdClass};
pub use enums::{
    DevelopEvent, DevelopStage, Element, ElementSet, GrowthLimit, Hardness, Nutrient, Part,
    ReproTrigger, Ripeness, RootAge, ShootPart, Status, StatusGroup,
};
pub use pool::DmPool;
pub use tables::{
    AgeTable, ElementTable, EnumTable, EventTable, HardnessTable, LimitTable, NutrientTable,
    PartTable, RipenessTable, ShootTable, StageTable, StatusTable, TableKey,
};
