//! # Engine Module
//!
//! Orchestrazione delle operazioni, separata in sottomoduli:
//! - `session`: esecuzione end-to-end di una richiesta
//! - `batch`: conversione di più file con isolamento dei fallimenti
//! - `progress_tracker`: frazione di completamento dall'output di ffmpeg
//! - `path_resolver`: path di output e dei file temporanei

pub mod batch;
pub mod path_resolver;
pub mod progress_tracker;
pub mod session;

pub use batch::{BatchEntry, BatchRunner, BatchSummary};
pub use path_resolver::{OutputPlan, PathResolver};
pub use progress_tracker::{ProgressTracker, TrackerState};
pub use session::Session;
