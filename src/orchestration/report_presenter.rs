//! Report Presenter - text and JSON rendering of validation reports
//!
//! Pure formatting; nothing here performs I/O.

use serde_json::Value;

use crate::core::traits::{StageResult, ValidationReport};
use crate::stages::service_health::{ComponentStatus, core_architecture_up};

/// Rendered detail values longer than this are cut
const MAX_DETAIL_CHARS: usize = 200;

pub struct ReportPresenter;

impl ReportPresenter {
    /// Human-readable report: one block per stage, then the verdict
    pub fn render(report: &ValidationReport) -> String {
        let mut lines = Vec::new();

        for result in &report.results {
            Self::render_result(result, &mut lines);
        }

        lines.push(String::new());
        lines.push(format!(
            "Summary: {} passed, {} failed, {} skipped",
            report.passed(),
            report.failed(),
            report.skipped()
        ));
        lines.push(if report.overall_success {
            "✅ All checks passed".to_string()
        } else {
            "❌ Validation failed".to_string()
        });

        lines.join("\n")
    }

    fn render_result(result: &StageResult, lines: &mut Vec<String>) {
        let marker = if result.success {
            "✅"
        } else if result.is_skipped() {
            "⏭️ "
        } else {
            "❌"
        };

        let mut header = format!("{} {}", marker, result.stage_name);
        if let Some(kind) = &result.error_kind {
            header.push_str(&format!(" [{}]", kind));
        }
        if let Some(message) = &result.error_message {
            header.push_str(&format!(": {}", truncate(message)));
        }
        lines.push(header);

        for (key, value) in &result.detail {
            match value {
                Value::Array(items) => {
                    lines.push(format!("   {}:", key));
                    for item in items {
                        lines.push(format!("     - {}", display_value(item)));
                    }
                }
                _ => lines.push(format!("   {}: {}", key, display_value(value))),
            }
        }

        for hint in &result.hints {
            lines.push(format!("   💡 {}", hint));
        }
    }

    /// Component up/down lines and the core architecture verdict
    pub fn render_components(statuses: &[ComponentStatus]) -> String {
        let mut lines = vec!["🏗️  Components".to_string()];

        for status in statuses {
            let marker = if status.up { "✅" } else { "❌" };
            let optional = if status.required { "" } else { " (optional)" };
            lines.push(format!("  {} {}{}", marker, status.component, optional));
            if !status.up
                && let Some(hint) = &status.start_hint
            {
                lines.push(format!("     Start with: {}", hint));
            }
        }

        lines.push(String::new());
        lines.push(if core_architecture_up(statuses) {
            "✅ Core architecture operational".to_string()
        } else {
            "❌ Core architecture incomplete".to_string()
        });

        lines.join("\n")
    }

    /// Pretty JSON for automation
    pub fn render_json(report: &ValidationReport) -> serde_json::Result<String> {
        serde_json::to_string_pretty(report)
    }

    /// Operator guidance printed after a credential run
    pub fn security_recommendations() -> String {
        [
            "🔒 Security recommendations",
            "  - Never share credentials or commit them to version control",
            "  - Store credentials in environment variables or a secrets vault",
            "  - Rotate the client secret and refresh token regularly",
            "  - Grant the IAM role only the permissions it needs",
            "  - Monitor API usage for unexpected activity",
        ]
        .join("\n")
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => truncate(s),
        other => truncate(&other.to_string()),
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_DETAIL_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(MAX_DETAIL_CHARS).collect();
    format!("{}...", cut)
}
