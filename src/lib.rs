//! photark - consolidate scattered photo archives into a dated catalog.
//!
//! Personal photo archives accumulate across drives with every layout their
//! owner ever tried: `2023/05/14/`, `2023_05_14_wedding/`, `IMG_20230514.jpg`
//! buried under `backup_of_backup/`. photark inventories those trees and
//! plans their consolidation into one canonical structure:
//!
//! ```text
//! 2023/
//! └── 2023_05/
//!     ├── 20230514-wedding/
//!     │   └── IMG_001.arw
//!     └── 20230601/
//! _mixed_dates/           folders whose dates disagree, structure preserved
//! _non_media/             folders with no images at all
//! ```
//!
//! Nothing is ever copied or moved here: the output is a deterministic plan
//! in a SQLite catalog, for a separate executor to apply.
//!
//! # Pipeline
//!
//! Four idempotent, independently resumable stages share the catalog:
//!
//! 1. [`scanner`] - walk a source root, record every file with stable
//!    relative paths; one transaction per directory makes interruption safe.
//! 2. [`pathdate`] - derive three independent date signals from each file's
//!    path (directory hierarchy, folder name, filename).
//! 3. [`extractor`] - run exiftool over supported media in batches and
//!    normalize the results, one outcome row per file.
//! 4. [`planner`] - resolve a date per folder by path evidence, statistical
//!    consensus, or inheritance, and assign every file a target path.

pub mod config;
pub mod db;
pub mod extractor;
pub mod logging;
pub mod pathdate;
pub mod planner;
pub mod scanner;

pub use config::Config;
pub use db::Database;
