//! Enumeration types for the pasture population engine.
//!
//! Every dimension along which pasture mass is partitioned is a closed
//! enumeration here, so lookup tables can be keyed by the enumeration itself
//! instead of by bare integers with a reserved "total" slot.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Developmental status of a cohort
// ---------------------------------------------------------------------------

/// Developmental status of a cohort.
///
/// The declaration order is significant: cohorts are kept sorted by status,
/// and mass flows "over" from a status to the next dry status in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Germinated plants that have not yet established.
    Seedling,
    /// Established live plants.
    Established,
    /// Live plants in the senescing phase of an annual cycle.
    Senescing,
    /// Standing dead herbage.
    Dead,
    /// Surface litter, first stage.
    Litter1,
    /// Surface litter, second stage (not available for grazing).
    Litter2,
}

impl Status {
    /// All statuses in processing order.
    pub const ALL: [Self; 6] = [
        Self::Seedling,
        Self::Established,
        Self::Senescing,
        Self::Dead,
        Self::Litter1,
        Self::Litter2,
    ];

    /// The live ("green") statuses.
    pub const GREEN: [Self; 3] = [Self::Seedling, Self::Established, Self::Senescing];

    /// Position of this status in [`Status::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Returns `true` for seedling, established and senescing cohorts.
    pub const fn is_green(self) -> bool {
        matches!(self, Self::Seedling | Self::Established | Self::Senescing)
    }

    /// Returns `true` for standing dead and both litter stages.
    pub const fn is_dry(self) -> bool {
        !self.is_green()
    }

    /// Returns `true` for both litter stages.
    pub const fn is_litter(self) -> bool {
        matches!(self, Self::Litter1 | Self::Litter2)
    }

    /// The status that receives this status's death, fall or comminution
    /// flux, or `None` when the flux leaves the pasture as residue.
    pub const fn overflow_destination(self) -> Option<Self> {
        match self {
            Self::Seedling | Self::Established | Self::Senescing => Some(Self::Dead),
            Self::Dead => Some(Self::Litter1),
            Self::Litter1 => Some(Self::Litter2),
            Self::Litter2 => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Seedling => "seedling",
            Self::Established => "established",
            Self::Senescing => "senescing",
            Self::Dead => "dead",
            Self::Litter1 => "litter1",
            Self::Litter2 => "litter2",
        };
        f.write_str(label)
    }
}

/// A named group of statuses used when aggregating over cohorts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusGroup {
    /// Seedling, established and senescing.
    Green,
    /// Established and senescing.
    EstSenc,
    /// Standing dead and both litter stages.
    Dry,
    /// Dry herbage available to grazing animals (standing dead and litter 1).
    AvailDry,
    /// Everything above the soil surface that is still standing.
    Standing,
    /// Both litter stages.
    Litter,
    /// Every status.
    All,
}

impl StatusGroup {
    /// The statuses belonging to this group.
    pub const fn members(self) -> &'static [Status] {
        match self {
            Self::Green => &[Status::Seedling, Status::Established, Status::Senescing],
            Self::EstSenc => &[Status::Established, Status::Senescing],
            Self::Dry => &[Status::Dead, Status::Litter1, Status::Litter2],
            Self::AvailDry => &[Status::Dead, Status::Litter1],
            Self::Standing => &[
                Status::Seedling,
                Status::Established,
                Status::Senescing,
                Status::Dead,
            ],
            Self::Litter => &[Status::Litter1, Status::Litter2],
            Self::All => &Status::ALL,
        }
    }

    /// Returns `true` if `status` belongs to this group.
    pub fn contains(self, status: Status) -> bool {
        self.members().contains(&status)
    }
}

// ---------------------------------------------------------------------------
// Plant parts
// ---------------------------------------------------------------------------

/// A plant part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Part {
    /// Leaf tissue.
    Leaf,
    /// Stem tissue (including the stem reserve).
    Stem,
    /// Root tissue.
    Root,
    /// Developing seed.
    Seed,
}

impl Part {
    /// All parts.
    pub const ALL: [Self; 4] = [Self::Leaf, Self::Stem, Self::Root, Self::Seed];

    /// Position of this part in [`Part::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The shoot part equivalent, if this is leaf or stem.
    pub const fn shoot(self) -> Option<ShootPart> {
        match self {
            Self::Leaf => Some(ShootPart::Leaf),
            Self::Stem => Some(ShootPart::Stem),
            Self::Root | Self::Seed => None,
        }
    }
}

/// An above-ground herbage part. Herbage pools exist only for these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShootPart {
    /// Leaf herbage.
    Leaf,
    /// Stem herbage.
    Stem,
}

impl ShootPart {
    /// Both shoot parts, leaf first.
    pub const ALL: [Self; 2] = [Self::Leaf, Self::Stem];

    /// Position of this part in [`ShootPart::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The general plant part.
    pub const fn part(self) -> Part {
        match self {
            Self::Leaf => Part::Leaf,
            Self::Stem => Part::Stem,
        }
    }
}

// ---------------------------------------------------------------------------
// Nutrients
// ---------------------------------------------------------------------------

/// A plant nutrient element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Element {
    /// Nitrogen.
    N,
    /// Phosphorus.
    P,
    /// Sulphur.
    S,
}

impl Element {
    /// All elements.
    pub const ALL: [Self; 3] = [Self::N, Self::P, Self::S];

    /// Position of this element in [`Element::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::N => "N",
            Self::P => "P",
            Self::S => "S",
        };
        f.write_str(label)
    }
}

/// Which nutrient elements a population tracks.
///
/// Untracked elements are held at zero in every pool; the pool arithmetic
/// only touches the tracked elements and, when nitrogen is tracked, the ash
/// alkalinity that travels with it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementSet {
    /// Dry matter only.
    #[default]
    None,
    /// Dry matter and nitrogen.
    N,
    /// Dry matter, nitrogen, phosphorus and sulphur.
    Nps,
}

impl ElementSet {
    /// The tracked elements.
    pub const fn elements(self) -> &'static [Element] {
        match self {
            Self::None => &[],
            Self::N => &[Element::N],
            Self::Nps => &Element::ALL,
        }
    }

    /// Returns `true` if `element` is tracked.
    pub fn contains(self, element: Element) -> bool {
        self.elements().contains(&element)
    }

    /// Returns `true` if no element is tracked.
    pub const fn is_empty(self) -> bool {
        matches!(self, Self::None)
    }
}

/// A soil nutrient form available for root uptake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Nutrient {
    /// Nitrate.
    No3,
    /// Ammonium.
    Nh4,
    /// Phosphate.
    Pox,
    /// Sulphate.
    So4,
}

impl Nutrient {
    /// All nutrient forms.
    pub const ALL: [Self; 4] = [Self::No3, Self::Nh4, Self::Pox, Self::So4];

    /// Position of this form in [`Nutrient::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The element supplied by this form.
    pub const fn element(self) -> Element {
        match self {
            Self::No3 | Self::Nh4 => Element::N,
            Self::Pox => Element::P,
            Self::So4 => Element::S,
        }
    }
}

// ---------------------------------------------------------------------------
// Phenology
// ---------------------------------------------------------------------------

/// Developmental stage of the population as a whole.
///
/// The declaration order defines the integer part of the packed phenology
/// code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevelopStage {
    /// Accumulating vernalisation.
    Vernalizing,
    /// Vegetative growth; accumulating degree-days to the reproductive trigger.
    Vegetative,
    /// Flowering and seed fill.
    Reproductive,
    /// Summer dormancy.
    Dormant,
    /// End of an annual cycle; live tissue is dying off.
    Senescent,
    /// Reproductive development halted by a herbicide spray-top.
    SprayTopped,
    /// Winter dormancy.
    DormantW,
}

impl DevelopStage {
    /// All stages in code order.
    pub const ALL: [Self; 7] = [
        Self::Vernalizing,
        Self::Vegetative,
        Self::Reproductive,
        Self::Dormant,
        Self::Senescent,
        Self::SprayTopped,
        Self::DormantW,
    ];

    /// Position of this stage in [`DevelopStage::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Returns `true` for summer or winter dormancy.
    pub const fn is_dormant(self) -> bool {
        matches!(self, Self::Dormant | Self::DormantW)
    }
}

impl fmt::Display for DevelopStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Vernalizing => "vernalizing",
            Self::Vegetative => "vegetative",
            Self::Reproductive => "reproductive",
            Self::Dormant => "dormant",
            Self::Senescent => "senescent",
            Self::SprayTopped => "spray_topped",
            Self::DormantW => "dormant_winter",
        };
        f.write_str(label)
    }
}

/// A discrete phenological event fired during a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevelopEvent {
    /// A new growth cycle started.
    StartCycle,
    /// Vernalisation requirement satisfied.
    EndVernalizing,
    /// Reproductive trigger reached.
    EndVegetative,
    /// Flowering began.
    StartFlowering,
    /// Reproductive development completed.
    EndReproductive,
    /// Established plants began senescing.
    StartSenescing,
    /// Summer dormancy broken.
    EndDormant,
    /// Senescent stage ended.
    EndSenescent,
    /// Winter dormancy broken.
    EndDormantW,
}

impl DevelopEvent {
    /// All events.
    pub const ALL: [Self; 9] = [
        Self::StartCycle,
        Self::EndVernalizing,
        Self::EndVegetative,
        Self::StartFlowering,
        Self::EndReproductive,
        Self::StartSenescing,
        Self::EndDormant,
        Self::EndSenescent,
        Self::EndDormantW,
    ];

    /// Position of this event in [`DevelopEvent::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// How the vegetative to reproductive transition is triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReproTrigger {
    /// Day length rising above a threshold.
    LongDay,
    /// Day length falling below a threshold.
    ShortDay,
    /// Accumulated degree-days.
    DegreeDays,
}

/// A factor limiting daily growth, reported per cohort as a value in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthLimit {
    /// Share of intercepted light.
    Gai,
    /// Transpiration-efficiency (vapour pressure deficit) limit.
    Vpd,
    /// Soil moisture limit.
    SoilMoisture,
    /// Low temperature limit.
    LowTemperature,
    /// Waterlogging limit.
    Waterlogging,
    /// Nitrogen limit.
    Nitrogen,
    /// Phosphorus limit.
    Phosphorus,
    /// Sulphur limit.
    Sulphur,
}

impl GrowthLimit {
    /// All limits.
    pub const ALL: [Self; 8] = [
        Self::Gai,
        Self::Vpd,
        Self::SoilMoisture,
        Self::LowTemperature,
        Self::Waterlogging,
        Self::Nitrogen,
        Self::Phosphorus,
        Self::Sulphur,
    ];

    /// Position of this limit in [`GrowthLimit::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The nutrient limit for `element`.
    pub const fn for_element(element: Element) -> Self {
        match element {
            Element::N => Self::Nitrogen,
            Element::P => Self::Phosphorus,
            Element::S => Self::Sulphur,
        }
    }
}

// ---------------------------------------------------------------------------
// Roots and seeds
// ---------------------------------------------------------------------------

/// Age class of root tissue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootAge {
    /// Young roots that take up water and nutrients.
    Effective,
    /// Older roots that no longer contribute to uptake.
    Old,
}

impl RootAge {
    /// Both ages, effective first.
    pub const ALL: [Self; 2] = [Self::Effective, Self::Old];

    /// Position of this age in [`RootAge::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Seed coat hardness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hardness {
    /// Soft seed, able to germinate once ripe.
    Soft,
    /// Hard (impermeable) seed.
    Hard,
}

impl Hardness {
    /// Both hardness classes, soft first.
    pub const ALL: [Self; 2] = [Self::Soft, Self::Hard];

    /// Position of this class in [`Hardness::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Seed ripeness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ripeness {
    /// Seed still within its innate dormancy period.
    Unripe,
    /// Seed able to germinate.
    Ripe,
}

impl Ripeness {
    /// Both ripeness classes, unripe first.
    pub const ALL: [Self; 2] = [Self::Unripe, Self::Ripe];

    /// Position of this class in [`Ripeness::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_order_matches_processing_order() {
        for pair in Status::ALL.windows(2) {
            if let [a, b] = pair {
                assert!(a < b);
            }
        }
    }

    #[test]
    fn overflow_chain_ends_at_second_litter() {
        assert_eq!(Status::Seedling.overflow_destination(), Some(Status::Dead));
        assert_eq!(Status::Senescing.overflow_destination(), Some(Status::Dead));
        assert_eq!(Status::Dead.overflow_destination(), Some(Status::Litter1));
        assert_eq!(Status::Litter1.overflow_destination(), Some(Status::Litter2));
        assert_eq!(Status::Litter2.overflow_destination(), None);
    }

    #[test]
    fn status_groups_partition_correctly() {
        assert!(StatusGroup::Green.contains(Status::Senescing));
        assert!(!StatusGroup::Green.contains(Status::Dead));
        assert!(StatusGroup::AvailDry.contains(Status::Litter1));
        assert!(!StatusGroup::AvailDry.contains(Status::Litter2));
        assert_eq!(StatusGroup::All.members().len(), 6);
    }

    #[test]
    fn element_sets_list_tracked_elements() {
        assert!(ElementSet::None.elements().is_empty());
        assert_eq!(ElementSet::N.elements(), &[Element::N]);
        assert!(ElementSet::Nps.contains(Element::S));
        assert!(!ElementSet::N.contains(Element::P));
    }

    #[test]
    fn nutrient_forms_map_to_elements() {
        assert_eq!(Nutrient::No3.element(), Element::N);
        assert_eq!(Nutrient::Nh4.element(), Element::N);
        assert_eq!(Nutrient::Pox.element(), Element::P);
        assert_eq!(Nutrient::So4.element(), Element::S);
    }

    #[test]
    fn element_set_deserializes_from_snake_case() {
        let set: ElementSet = serde_json::from_str("\"nps\"").unwrap();
        assert_eq!(set, ElementSet::Nps);
    }
}
