//! # Positioning Report Store
//!
//! This crate is the durable history of weekly positioning reports. Every
//! windowed calculation reads from it.
//!
//! ## Architectural Principles
//!
//! - **Adapter:** All SQL lives here, behind the `ReportStore` trait. The rest
//!   of the workspace never sees a query.
//! - **One report per date:** Appends are upserts keyed by
//!   `(currency, report_date)`; re-ingesting a date corrects it in place.
//! - **No silent shrinking:** `window(n)` either returns exactly `n` reports
//!   or fails with `InsufficientData`.
//!
//! ## Public API
//!
//! - `connect` / `run_migrations`: pool creation and schema setup.
//! - `ReportStore`: the store interface.
//! - `PgReportStore`: PostgreSQL implementation over `cot_reports`.
//! - `InMemoryReportStore`: process-local implementation.
//! - `DbError`: the specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod error;
pub mod memory;
pub mod repository;

// Re-export the key components to create a clean, public-facing API.
pub use connection::{connect, run_migrations};
pub use error::DbError;
pub use memory::InMemoryReportStore;
pub use repository::{AppendOutcome, PgReportStore, ReportStore};
