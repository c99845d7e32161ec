//! Synthetic lab report generator: reference catalog, value synthesis,
//! fixed-width report composition and PDF/QR export.
//!
//! Every value produced here is random specimen data, never a measurement.

pub mod catalog;
pub mod config;
pub mod export;
pub mod report;
pub mod shell;
pub mod synth;

use tracing_subscriber::EnvFilter;

pub use catalog::{Catalog, CatalogError, Doctor, Hospital, Parameter, TestPanel};
pub use export::{export_pdf, export_record, ExportError, ExportOptions, ExportOutcome, PreviewStatus};
pub use report::{compose, Gender, PatientForm, ReportRecord, RestDays, ValidationError};
pub use shell::FormShell;
pub use synth::{synthesize, RangeExpr, SynthesizedValue};

/// Installs the stderr tracing subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();
}
