//! # Landmark Indicators Crate
//!
//! The computational heart of the KPI engine: a static registry of metric
//! definitions and one pure calculator per metric code, both consumed by the
//! engine crate's scheduler and facade.
//!
//! ## Architectural Principles
//!
//! - **One metric, one implementation:** every KPI is computed in exactly one
//!   place, selected by `MetricCode`, never by which module was imported.
//! - **Pure over injected reads:** calculators own no state; they derive a
//!   `KpiValue` from the read-only `BusinessData` queries, so identical data
//!   always yields identical values.
//! - **Partial failure, never batch abort:** `compute_all` records a failed
//!   metric and keeps going.

pub mod engine;
pub mod error;
pub mod outcome;
pub mod registry;

// Re-export the core types to provide a clean public API.
pub use engine::IndicatorEngine;
pub use error::IndicatorError;
pub use outcome::{KpiValue, MetricOutcome};
pub use registry::{MetricDefinition, MetricRegistry};
