pub mod dates;
pub mod enrich;
pub mod events;
pub mod filter;
pub mod format;
pub mod table;

pub use table::EventTable;
