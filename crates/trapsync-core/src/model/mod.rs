//! Values of the four synchronized resources.
//!
//! These are plain serde types; the sync layer treats them as opaque
//! snapshots and only ever serializes them whole.

mod catalog;
mod metadata;
mod settings;

pub use catalog::{Location, Species, DEFAULT_SPECIES_ICON, UNSET_ELEVATION};
pub use metadata::{ImageDirectory, ImageEntry, MetadataTree, SpeciesCount};
pub use settings::{DateFormat, DistanceUnits, LocationFormat, Settings, TimeFormat};
