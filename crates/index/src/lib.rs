//! Index build pipeline and incremental updates
//!
//! - [`source`]: the catalog queries builders consume, [`memory`] an
//!   in-memory implementation
//! - [`builders`]: one document builder per index, with the shared
//!   side-entity helpers in [`side`] and store blobs in [`store`]
//! - [`orchestrator`]: chunked, parallel builds with a single writer per index
//! - [`finalize`]: background merge and row-count verification
//! - [`replication_state`]: the `_meta` singleton document
//! - [`updater`]: applying replication packets to built indexes
//! - [`config`]: `musearch.toml`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builders;
pub mod config;
pub mod finalize;
pub mod memory;
pub mod orchestrator;
pub mod replication_state;
pub mod side;
pub mod source;
pub mod store;
pub mod timing;
pub mod updater;

pub use builders::{documents_for, EntityBuilder};
pub use config::{BuildConfig, CONFIG_FILE_NAME};
pub use finalize::{FinalizeReport, FinalizeScheduler, TaskHandle};
pub use memory::{CatalogData, MemoryCatalog};
pub use orchestrator::{BuildReport, ChunkProgress, IndexOutcome, Orchestrator, RunSummary};
pub use source::CatalogSource;
pub use timing::{Phase, PhaseTimings, TimingReport};
pub use updater::{PacketOrigin, UpdateOutcome, UpdateReport, Updater};
