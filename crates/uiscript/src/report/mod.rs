//! Static HTML report for a single test result.
//!
//! The page is self-contained: a header with the script name, status and
//! timing, a summary table of step counts, and one block per executed step.

use crate::error::{EngineError, EngineResult};
use crate::model::{StepResult, StepStatus, TestResult, TestStatus};
use std::fs;
use std::path::Path;
use tracing::info;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f UTC";

/// Render `result` and write it to `output_path`.
pub fn write_report(result: &TestResult, output_path: &Path) -> EngineResult<()> {
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent).map_err(|err| EngineError::io("failed to create report dir", err))?;
    }
    fs::write(output_path, render_html(result))
        .map_err(|err| EngineError::io("failed to write report", err))?;
    info!(script = %result.script_name, path = %output_path.display(), "exported report");
    Ok(())
}

#[must_use]
pub fn render_html(result: &TestResult) -> String {
    let steps: String = result.step_results.iter().map(render_step).collect();
    let error = result
        .error_message
        .as_deref()
        .map(|message| format!("<p class=\"run-error\">{}</p>\n", html_escape(message)))
        .unwrap_or_default();
    let screenshots: String = result
        .screenshots
        .iter()
        .map(|path| format!("<li>{}</li>", html_escape(path)))
        .collect();
    let screenshots = if screenshots.is_empty() {
        String::new()
    } else {
        format!("<h2>Screenshots</h2>\n<ul class=\"screenshots\">{screenshots}</ul>\n")
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Test Report - {name}</title>
    <style>
{CSS}
    </style>
</head>
<body>
    <header>
        <h1>{name}</h1>
        <div class="run-info">
            <span class="{status_class}">{status:?}</span>
            <span class="duration">{duration_ms}ms</span>
        </div>
        <div class="timing">
            <span>Started: {start}</span>
            <span>Ended: {end}</span>
        </div>
    </header>
    <main>
{error}        <h2>Summary</h2>
        <table class="summary">
            <tr><th>Total</th><th>Passed</th><th>Failed</th><th>Skipped</th></tr>
            <tr><td>{total}</td><td>{passed}</td><td>{failed}</td><td>{skipped}</td></tr>
        </table>
        <h2>Steps</h2>
{steps}{screenshots}    </main>
</body>
</html>
"#,
        name = html_escape(&result.script_name),
        status_class = status_class(result.status),
        status = result.status,
        duration_ms = result.duration_ms(),
        start = result.start_time.format(TIME_FORMAT),
        end = result.end_time.format(TIME_FORMAT),
        total = result.total_steps,
        passed = result.passed_steps(),
        failed = result.failed_steps(),
        skipped = result.skipped_steps(),
    )
}

fn render_step(step: &StepResult) -> String {
    let mut block = format!(
        "        <div class=\"step {class}\">\n            <div class=\"step-head\"><span class=\"index\">#{index}</span> <span class=\"command\">{command}</span> <span class=\"status\">{status:?}</span> <span class=\"duration\">{duration}ms</span></div>\n",
        class = step_class(step.status),
        index = step.step_index + 1,
        command = html_escape(&step.step.command),
        status = step.status,
        duration = step.duration_ms(),
    );
    if let Some(description) = &step.step.description {
        block.push_str(&format!(
            "            <div class=\"description\">{}</div>\n",
            html_escape(description)
        ));
    }
    if let Some(error) = &step.error_message {
        block.push_str(&format!(
            "            <div class=\"error\">Error: {}</div>\n",
            html_escape(error)
        ));
    }
    if let Some(actual) = &step.actual_value {
        block.push_str(&format!(
            "            <div class=\"actual\">Actual: {}</div>\n",
            html_escape(actual)
        ));
    }
    block.push_str("        </div>\n");
    block
}

const fn status_class(status: TestStatus) -> &'static str {
    match status {
        TestStatus::Passed => "status-passed",
        TestStatus::Failed => "status-failed",
        TestStatus::PartiallyPassed => "status-partial",
        TestStatus::NotRun | TestStatus::Running => "status-other",
    }
}

const fn step_class(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Passed => "passed",
        StepStatus::Failed => "failed",
        StepStatus::Skipped => "skipped",
        StepStatus::Pending | StepStatus::Running => "pending",
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

const CSS: &str = r"
body {
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
    margin: 0;
    color: #222;
}

header {
    padding: 1rem 2rem;
    background: #f4f6f8;
    border-bottom: 1px solid #ddd;
}

header h1 { font-size: 1.4rem; margin: 0 0 0.5rem; }
.run-info, .timing { display: flex; gap: 1rem; color: #555; }
main { padding: 1rem 2rem; }

.status-passed { color: #2e7d32; font-weight: 600; }
.status-failed { color: #c62828; font-weight: 600; }
.status-partial { color: #ef6c00; font-weight: 600; }
.status-other { color: #757575; font-weight: 600; }
.run-error { color: #c62828; }

table.summary { border-collapse: collapse; }
table.summary th, table.summary td { border: 1px solid #ccc; padding: 0.3rem 1rem; }

.step { border-left: 4px solid #bbb; margin: 0.5rem 0; padding: 0.4rem 0.8rem; background: #fafafa; }
.step.passed { border-color: #2e7d32; }
.step.failed { border-color: #c62828; }
.step.skipped { border-color: #9e9e9e; }
.step .command { font-family: monospace; font-weight: 600; }
.step .error { color: #c62828; }
.step .actual, .step .description { color: #555; }
";

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::model::Step;

    #[test]
    fn escapes_markup_in_names_and_messages() {
        let mut result = TestResult::started("<login>", 1);
        let mut step = StepResult::running(0, Step::action("click_element"));
        step.status = StepStatus::Failed;
        step.error_message = Some("bad \"quote\" & more".to_string());
        result.step_results.push(step);
        result.status = TestStatus::Failed;

        let html = render_html(&result);
        assert!(html.contains("&lt;login&gt;"));
        assert!(html.contains("Error: bad &quot;quote&quot; &amp; more"));
        assert!(!html.contains("<login>"));
    }
}
