//! Script tests: an external command judges the subject and reports a
//! summary string on stderr or stdout.
//!
//! The report is either a JSON object `{"summary": "...", "feedback": ...}`
//! or plain text whose first line is the summary and whose remaining lines
//! are feedback. A summary must be non-empty and contain no whitespace.

use super::process::run_command;
use super::{RunSettings, TestRunResult};
use crate::status::Status;
use crate::testcase::{ScriptTest, TestCase};
use serde::Deserialize;

/// Summary and optional feedback parsed from a script's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptReport {
    pub summary: String,
    pub feedback: Option<String>,
}

#[derive(Deserialize)]
struct JsonReport {
    summary: Option<String>,
    #[serde(default)]
    feedback: Option<serde_json::Value>,
}

pub(super) fn run_script(
    subject: &str,
    case: &TestCase,
    test: &ScriptTest,
    settings: &RunSettings,
) -> TestRunResult {
    let command = test.command_for(subject);
    let mut result = TestRunResult::new(subject, case, Status::ScriptTestError);
    result.command = Some(command.clone());

    let argv = match shell_words::split(&command) {
        Ok(argv) if !argv.is_empty() => argv,
        Ok(_) => return result.with_error("empty script command"),
        Err(e) => return result.with_error(format!("invalid script command: {e}")),
    };

    let output = match run_command(&argv, None, settings.working_dir.as_deref(), &settings.limits()) {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!(command = %command, error = %e, "test script error");
            return result.with_error(format!("failed to execute {}: {}", argv[0], e));
        }
    };
    let mut result = result.with_output(&output);

    if output.timed_out {
        return result.with_status(Status::Timeout);
    }
    if output.exit_code != Some(0) {
        let code = output
            .exit_code
            .map_or_else(|| "signal".to_string(), |c| c.to_string());
        tracing::warn!(command = %command, exit_code = %code, "test script error");
        return result.with_error(format!("script exited with {code}"));
    }

    // stdout is only consulted when stderr carries nothing at all.
    let report = if output.stderr.trim().is_empty() {
        parse_script_report(&output.stdout)
    } else {
        parse_script_report(&output.stderr)
    };
    match report {
        Ok(report) => {
            let status = if report.summary.chars().all(|c| c == '.') {
                Status::Success
            } else {
                Status::Fail
            };
            result.status = status;
            result.summary = report.summary;
            result.feedback = report.feedback;
            result
        }
        Err(e) => {
            tracing::warn!(command = %command, error = %e, "test script error");
            result.with_error(e)
        }
    }
}

/// Parse a script's report.
///
/// Empty or whitespace-only text is an error, as is any summary containing
/// whitespace.
pub fn parse_script_report(text: &str) -> Result<ScriptReport, String> {
    if text.trim().is_empty() {
        return Err("script produced no summary".to_string());
    }

    let report = if text.trim_start().starts_with('{') {
        match serde_json::from_str::<JsonReport>(text) {
            Ok(JsonReport {
                summary: Some(summary),
                feedback,
            }) => ScriptReport {
                summary,
                feedback: feedback.and_then(feedback_text),
            },
            Ok(JsonReport { summary: None, .. }) => {
                return Err("json report has no summary".to_string());
            }
            Err(_) => parse_text_report(text),
        }
    } else {
        parse_text_report(text)
    };

    if report.summary.is_empty() || report.summary.chars().any(char::is_whitespace) {
        return Err(format!("invalid summary: {:?}", report.summary));
    }
    Ok(report)
}

fn parse_text_report(text: &str) -> ScriptReport {
    let (first, rest) = text.split_once('\n').unwrap_or((text, ""));
    let feedback = rest.trim();
    ScriptReport {
        summary: first.strip_suffix('\r').unwrap_or(first).to_string(),
        feedback: (!feedback.is_empty()).then(|| feedback.to_string()),
    }
}

fn feedback_text(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) if s.trim().is_empty() => None,
        serde_json::Value::String(s) => Some(s),
        other => serde_json::to_string_pretty(&other).ok(),
    }
}
