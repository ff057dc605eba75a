//! Economic sectors to which synthetic firms belong.
use indexmap::IndexMap;
use serde_string_enum::{DeserializeLabeledStringEnum, SerializeLabeledStringEnum};
use strum::EnumIter;

/// The sector of a firm.
///
/// The set of sectors is fixed. A model may give a sector zero weight, in which case no firms are
/// generated for it and it does not need entries in the per-sector parameter tables.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    SerializeLabeledStringEnum,
    DeserializeLabeledStringEnum,
    EnumIter,
)]
pub enum Sector {
    /// Hotels and other accommodation
    #[string = "lodging"]
    #[strum(serialize = "lodging")]
    Lodging,
    /// Restaurants and food service
    #[string = "restaurants"]
    #[strum(serialize = "restaurants")]
    Restaurants,
    /// Retail trade
    #[string = "retail"]
    #[strum(serialize = "retail")]
    Retail,
    /// Passenger transport
    #[string = "transport"]
    #[strum(serialize = "transport")]
    Transport,
    /// Manufacturing selling to other businesses
    #[string = "manufacturing_b2b"]
    #[strum(serialize = "manufacturing_b2b")]
    ManufacturingB2b,
}

/// A map with one entry per sector
pub type SectorMap<T> = IndexMap<Sector, T>;
