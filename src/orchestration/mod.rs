//! Orchestration layer
//!
//! Runs stages into a `ValidationReport`, renders it, and triggers analysis
//! requests against the deployed backend.

pub mod analysis;
pub mod pipeline_runner;
pub mod report_presenter;

pub use analysis::{ChatCompletionProcessor, RequestProcessor, report_query};
pub use pipeline_runner::PipelineRunner;
pub use report_presenter::ReportPresenter;
