//! Multi-service health check
//!
//! Probes every configured target independently and maps the results onto
//! logical components. Probes may run concurrently; results always come back
//! in the order the targets were declared.

use futures::FutureExt;
use serde::Serialize;
use serde_json::{Value, json};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::core::config::ComponentConfig;
use crate::core::traits::{ErrorKind, StageResult};
use crate::probe::{EndpointProbe, EndpointSpec};

/// Timeout of the chat-completion round trip
pub const CHAT_TIMEOUT_SECS: u64 = 30;

pub const CHAT_MODEL: &str = "sp-api-crewai";

const CHAT_PROBE_MESSAGE: &str = "Hello, can you help me with my Amazon orders?";

/// Request body of the chat-completion probe
pub fn chat_probe_payload() -> Value {
    json!({
        "messages": [{"role": "user", "content": CHAT_PROBE_MESSAGE}],
        "model": CHAT_MODEL,
    })
}

pub struct ServiceHealthStage {
    probe: EndpointProbe,
    max_concurrency: usize,
}

impl ServiceHealthStage {
    /// Sequential health stage
    pub fn new(probe: EndpointProbe) -> Self {
        Self {
            probe,
            max_concurrency: 1,
        }
    }

    /// Allow up to `max_concurrency` probes in flight (minimum 1)
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Probe every spec; one result per spec, in input order
    pub async fn check_all(&self, specs: &[EndpointSpec]) -> Vec<StageResult> {
        info!(
            targets = specs.len(),
            max_concurrency = self.max_concurrency,
            "running health checks"
        );

        if self.max_concurrency <= 1 {
            let mut results = Vec::with_capacity(specs.len());
            for spec in specs {
                let result = match AssertUnwindSafe(self.probe.probe(spec)).catch_unwind().await {
                    Ok(result) => result,
                    Err(_) => probe_task_failed(&spec.name, "probe panicked"),
                };
                results.push(result);
            }
            return results;
        }

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = Vec::with_capacity(specs.len());

        for spec in specs {
            let semaphore = Arc::clone(&semaphore);
            let probe = self.probe.clone();
            let spec_for_task = spec.clone();

            let task = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                probe.probe(&spec_for_task).await
            });

            tasks.push((spec.name.clone(), task));
        }

        // Awaited in spawn order, so output order matches input order
        let mut results = Vec::with_capacity(tasks.len());
        for (name, task) in tasks {
            match task.await {
                Ok(result) => results.push(result),
                Err(e) => results.push(probe_task_failed(&name, &e.to_string())),
            }
        }
        results
    }
}

/// Result recorded when a probe panics or its task is lost
fn probe_task_failed(name: &str, reason: &str) -> StageResult {
    error!(target_name = %name, "health probe failed: {}", reason);
    StageResult::failed(
        name,
        ErrorKind::InternalError,
        format!("probe task failed: {}", reason),
    )
}

/// Up/down state of one logical component
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentStatus {
    pub component: String,
    pub check: String,
    pub up: bool,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_hint: Option<String>,
}

/// Derive component states from health results
///
/// A component is up iff the result of its designated check succeeded. A
/// check with no recorded result counts as down.
pub fn component_status(components: &[ComponentConfig], results: &[StageResult]) -> Vec<ComponentStatus> {
    components
        .iter()
        .map(|component| ComponentStatus {
            component: component.name.clone(),
            check: component.check.clone(),
            up: results
                .iter()
                .any(|r| r.stage_name == component.check && r.success),
            required: component.required.unwrap_or(true),
            start_hint: component.start_hint.clone(),
        })
        .collect()
}

/// Core verdict: every required component is up
pub fn core_architecture_up(statuses: &[ComponentStatus]) -> bool {
    statuses.iter().filter(|s| s.required).all(|s| s.up)
}
