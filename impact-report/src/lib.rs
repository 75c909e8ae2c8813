//! Stable interchange model for the documentation pipeline.
//!
//! The impact report is the contract between change detection, scoring,
//! artifact generation and drift analysis. Field order and serde names are
//! part of the `impact_report.json` format and must stay stable.

pub mod language;
pub mod model;
pub mod score;

pub use language::Language;
pub use model::{
    AnalysisSummary, ChangeKind, CommitContext, Endpoint, FileChange, FileFeatures, ImpactReport,
    ReportMeta, SchemaDecl, Severity, SymbolRef,
};
pub use score::{build_report, score_file, top_files};
