//! Contract for the external stratified-selection algorithm.
//!
//! The algorithm itself is a separate service; this crate defines the seam
//! ([`Stratifier`]) and an HTTP client against it. The algorithm is pure:
//! given criteria, a roster, exclusions, and a target count it either
//! produces candidate panels or explains why none exist.

mod http;
mod stratifier;

pub use http::{StratifyClient, StratifyConfig};
pub use stratifier::{StratifyError, StratifyOutcome, StratifyRequest, Stratifier};
