//! Fusion of per-layer verdicts into one availability decision.
//!
//! The rule is configuration: deployments have validated different rules
//! against the same markup, so nothing here prefers one layer by name.

pub mod errors;
pub mod policy;
pub mod rule;

pub use errors::PolicyError;
pub use policy::FusionPolicy;
pub use rule::{AgreementField, FusionRule};
