//! Kallows - KiCad panelization and part lookup tools
//!
//! This library builds manufacturing panels from KiCad `.kicad_pcb` boards
//! and looks up part numbers against the Mouser search API.
//!
//! # Quick Start
//!
//! ```no_run
//! use kallows::{PanelBuilder, PanelJob};
//! use std::path::PathBuf;
//!
//! let job = PanelJob::new(
//!     vec![PathBuf::from("a.kicad_pcb"), PathBuf::from("b.kicad_pcb")],
//!     "panel.kicad_pcb",
//! );
//! let summary = PanelBuilder::build(&job).unwrap();
//! println!("{} tabs, {} cuts", summary.tabs, summary.cuts);
//! ```
//!
//! # Features
//!
//! - **Panelization**: grid placement, rails and frames, tabs, mouse-bites
//!   and V-cuts, tooling holes, fiducials, text, copper fill
//! - **Presets**: JSON layers over built-in defaults
//! - **Part lookup**: one authenticated request per CSV row

/// Geometry diagnostics: `debug!` normally, `info!` when tracing is requested.
macro_rules! geometry_trace {
    ($trace:expr, $($arg:tt)+) => {
        if $trace {
            tracing::info!($($arg)+)
        } else {
            tracing::debug!($($arg)+)
        }
    };
}
pub(crate) use geometry_trace;

pub mod core;
pub mod geometry;
pub mod lookup;
pub mod panel;
pub mod parser;
pub mod units;

// Re-export main types
pub use crate::core::{PanelBuilder, PanelJob, PanelSummary, DEFAULT_SPACING_MM};
pub use lookup::{LookupError, LookupOutcome, LookupRunner, MouserClient, PartRecord, PartSearch};
pub use panel::preset::{Preset, PresetError};
pub use panel::{Panel, PanelError};
pub use parser::{Board, BoardError, SExp};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        Board, BoardError, LookupOutcome, LookupRunner, MouserClient, PanelBuilder, PanelError,
        PanelJob, PanelSummary, PartSearch, Preset, DEFAULT_SPACING_MM,
    };
}
