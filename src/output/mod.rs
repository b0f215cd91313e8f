//! Result presentation: console table, Clash config output and renaming

mod clash;
mod rename;
mod table;

pub use clash::{ClashConfigWriter, QualityThresholds};
pub use rename::{country_flag, node_name, CountryInfo, GeoLocator, NodeRenamer, UNKNOWN_FLAG};
pub use table::ResultTable;
