//! # Landmark Database Crate
//!
//! The Postgres adapter of the KPI engine. It is the system's "permanent
//! archive" for computed snapshots and raised alerts, and its window onto
//! the back office's business tables.
//!
//! ## Architectural Principles
//!
//! - **Adapter, not owner:** business tables (`properties`, `trade_ins`)
//!   belong to the back office schema; this crate only SELECTs from them.
//!   The KPI tables (`kpi_snapshots`, `kpi_alerts`) are owned here and
//!   created by the embedded migrations.
//! - **Traits over globals:** the rest of the engine sees `PgBusinessData`
//!   and `PgKpiStore` only through the `BusinessData`, `SnapshotStore` and
//!   `AlertSink` contracts, constructed once at startup and injected.
//! - **Asynchronous & Pooled:** all operations are asynchronous over a
//!   shared `PgPool`.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod error;
pub mod repository;

// Re-export the key components to create a clean, public-facing API.
pub use connection::{connect, run_migrations};
pub use error::DbError;
pub use repository::{PgBusinessData, PgKpiStore};
