//! Batch ISO remuxer
//!
//! Finds disc images, picks the main feature of each one with an external disc
//! tool, and remuxes those features into per-disc folders. The catalog of discs
//! is persisted as JSON so an interrupted batch can pick up where it stopped.

pub mod catalog;
pub mod checkpoint;
pub mod concurrency;
pub mod discovery;
pub mod inspect;
pub mod remux;
pub mod scan;
pub mod startup;
pub mod summary;
pub mod tool;

pub use iso_remux_config as config;
pub use iso_remux_config::Config;
pub use catalog::{Catalog, Disc, Title, UNSET};
pub use checkpoint::{load_catalog, save_catalog, CheckpointError};
pub use concurrency::{derive_plan, ConcurrencyPlan};
pub use discovery::{discover, DiscoveryError};
pub use inspect::{
    exceeds_size_cutoff, inspect_disc, select_main_features, InspectError, InspectSettings,
};
pub use remux::{RemuxError, RemuxOrchestrator, RemuxReport, RemuxSettings};
pub use scan::{discs_from_paths, is_disc_image, scan_disc_images, ScanError};
pub use startup::{check_makemkvcon_available, StartupError};
pub use summary::{summarize, CatalogSummary};
pub use tool::{DiscInfo, DiscTool, MakeMkv, TitleInfo, ToolError};
