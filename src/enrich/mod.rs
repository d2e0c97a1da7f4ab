pub mod client;
pub mod gate;

pub use client::{ChatNormalizer, Normalizer};
pub use gate::EnrichmentGate;
