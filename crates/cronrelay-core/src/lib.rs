//! # CronRelay Core
//!
//! Concrete building blocks shared by the scheduler and the API layer:
//!
//! - [`HandlerRegistry`] - capability registry of job handlers keyed by `mdl.fn`
//! - [`MemoryStore`] - in-process [`RecordStore`](cronrelay_protocols::RecordStore)
//! - [`LocalLeaderGate`] - single-process leader gate with runtime enable/disable
//! - [`JobCatalog`] - validated job administration
//! - [`Stores`] - the three record collections bundled together

pub mod catalog;
pub mod cron_expr;
pub mod error;
pub mod leader;
pub mod memory_store;
pub mod registry;
pub mod stores;

pub use catalog::JobCatalog;
pub use cron_expr::{normalize_cron, parse_cron};
pub use error::{CatalogError, RegistryError};
pub use leader::LocalLeaderGate;
pub use memory_store::MemoryStore;
pub use registry::HandlerRegistry;
pub use stores::Stores;
