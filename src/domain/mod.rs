pub mod changes;
pub mod listing;
pub mod makes;

pub use changes::{ReconcileResult, ReconcileSummary};
pub use listing::Listing;
pub use makes::KnownMakes;
