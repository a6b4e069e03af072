//! Pipeline Runner - executes stages in order with dependency gating
//!
//! Features:
//! - Strict declared-order execution
//! - Named dependency lookup against results recorded so far
//! - Skipped results for stages whose dependency did not succeed
//! - Errors and panics inside a stage become `InternalError` results

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::core::traits::{ErrorKind, RunContext, Stage, StageResult, ValidationReport};

#[derive(Debug, Default, Clone, Copy)]
pub struct PipelineRunner;

impl PipelineRunner {
    pub fn new() -> Self {
        Self
    }

    /// Run every stage against `ctx` and collect the report
    pub async fn run(&self, stages: &[Box<dyn Stage>], ctx: &mut RunContext) -> ValidationReport {
        let mut report = ValidationReport::new();

        for stage in stages {
            let name = stage.name().to_string();

            if let Some(dependency) = stage.depends_on() {
                let satisfied = report.get(dependency).is_some_and(|r| r.success);
                if !satisfied {
                    info!(stage = %name, dependency, "skipping stage");
                    report.push(StageResult::skipped(&name, dependency));
                    continue;
                }
            }

            debug!(stage = %name, "starting stage");
            let started = Instant::now();

            let mut result = match AssertUnwindSafe(stage.run(ctx)).catch_unwind().await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    error!(stage = %name, "stage returned an error: {:#}", e);
                    StageResult::failed(&name, ErrorKind::InternalError, format!("{:#}", e))
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!(stage = %name, "stage panicked: {}", message);
                    StageResult::failed(
                        &name,
                        ErrorKind::InternalError,
                        format!("stage panicked: {}", message),
                    )
                }
            };
            // Dependency lookup is by stage name
            result.stage_name = name;

            info!(
                stage = %result.stage_name,
                success = result.success,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "stage finished"
            );
            report.push(result);
        }

        report
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
