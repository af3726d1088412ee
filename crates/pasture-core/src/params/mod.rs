//! Species parameters: the tag store and the typed set derived from it.
//!
//! - [`tags`] -- Tag grammar, [`ParamSet`] and parameter error reporting
//! - [`species`] -- [`SpeciesParams`]: flags, numbered families and
//!   maturation tables

pub mod species;
pub mod tags;

pub use species::{MaturationTables, REQUIRED_TAGS, SpeciesParams, StagePair};
pub use tags::{FLAG_TAGS, ParamSet, ParamValue, TagKind, tag_kind};
