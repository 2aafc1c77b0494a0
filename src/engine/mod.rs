//! Business logic: pricing, the estimate workflow and background upkeep.

pub mod estimates;
pub mod pricing;
mod session_sweeper;

pub use estimates::{EstimateError, EstimateResult, EstimateService};
pub use session_sweeper::*;
