//! dbcheck Core Library
//!
//! Reconciles the compilation outcomes of example sketches built for several
//! boards against a database of expected outcomes. CI fails only when the
//! database expected a sketch to compile and it did not.
//!
//! Pipeline: [`SourceLoader`] (reports and database) → [`Reconciler`] →
//! [`Reporter`].

pub mod check;
pub mod config;
pub mod error;
pub mod fakes;
pub mod loader;
pub mod obs;
pub mod post;
pub mod reconcile;
pub mod record;
pub mod report;
pub mod telemetry;

pub use check::{load_sources, run_check, LoadedSources};
pub use config::{
    CheckConfig, Credential, DEFAULT_DATABASE_REPORTS_SOURCE, DEFAULT_SKETCHES_REPORTS_SOURCE,
};
pub use error::{CheckError, RecordError, Result};
pub use loader::{load_database, load_reports, parse_report, SourceKind, SourceLoader};
pub use obs::CheckSpan;
pub use post::{PostError, SummaryPoster};
pub use reconcile::{
    classify, Classification, ClassificationCounts, ClassificationPolicy, Outcome, Reconciler,
    SkipPolicy, Verdict,
};
pub use record::{Metadata, Record, RecordKey, RecordSet, SizeMetric, Status};
pub use report::{
    write_summary_json, CommentState, ReportStatus, Reporter, Summary, SummaryEntry,
};
pub use telemetry::{init_tracing, level_for};

/// dbcheck version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
