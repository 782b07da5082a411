pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{AlertSeverity, MetricCode, PropertyState, TradeInState, Unit};
pub use error::CoreError;
pub use structs::{Alert, ComparisonResult, KpiSnapshot, Period};
