//! omix-core: state and data model for the omics result viewer.
//!
//! Everything here is synchronous and free of I/O apart from config loading.
//! The table, tab and details-panel types are plain state machines; the
//! `omix-client` crate drives them from network events.

pub mod analysis;
pub mod charts;
pub mod config;
pub mod error;
pub mod format;
pub mod modal;
pub mod models;
pub mod table;
pub mod tabs;

pub use config::ClientConfig;
pub use error::{OmixError, Result};
pub use modal::{DetailsModal, Panel, PanelData, PanelSource, PanelState, SelectedRow};
pub use models::{
    CorrelationMethod, CorrelationType, Experiment, ExperimentState, ExperimentType, Page,
    ResultRow,
};
pub use table::{ExperimentListQuery, FilterChange, SortOrder, TableAction, TableControl};
pub use tabs::{ActiveView, FetchOutcome, FetchTicket, TabRegistry};
