//! Input/output tests: feed stdin, judge stdout.

use super::process::run_command;
use super::{RunSettings, TestRunResult};
use crate::normalize::Normalizer;
use crate::status::Status;
use crate::testcase::{Expected, IoTest, TestCase};

pub(super) fn run_io(
    subject: &str,
    case: &TestCase,
    test: &IoTest,
    settings: &RunSettings,
) -> TestRunResult {
    let mut result = TestRunResult::new(subject, case, Status::Error);
    result.input = Some(test.input.clone());
    result.expected_output = test.expected.output().map(String::from);
    result.match_pattern = test.expected.pattern().map(String::from);

    let Some(command) = settings.interpreters.command_for(subject) else {
        return result
            .with_status(Status::NoInterpreterError)
            .with_error(format!("no interpreter configured for {subject}"));
    };
    result.command = Some(command.clone());

    let argv = match shell_words::split(&command) {
        Ok(argv) if !argv.is_empty() => argv,
        Ok(_) => return result.with_error("empty interpreter command"),
        Err(e) => return result.with_error(format!("invalid interpreter command: {e}")),
    };

    let output = match run_command(
        &argv,
        Some(test.input.as_bytes()),
        settings.working_dir.as_deref(),
        &settings.limits(),
    ) {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!(command = %command, error = %e, "failed to start subject");
            return result.with_error(format!("failed to execute {}: {}", argv[0], e));
        }
    };
    let result = result.with_output(&output);

    if output.timed_out {
        return result.with_status(Status::Timeout);
    }
    if output.exit_code != Some(0) {
        return result.with_status(Status::classify_stderr(&output.stderr));
    }
    let status = judge_output(&test.expected, &case.ignore, &output.stdout);
    result.with_status(status)
}

/// Judge the stdout of a cleanly exited subject.
///
/// Exact outputs are compared after normalizing `stdout` with `ignore`; the
/// expected side was normalized when the test was compiled. Patterns are
/// matched against the raw stdout.
pub fn judge_output(expected: &Expected, ignore: &Normalizer, stdout: &str) -> Status {
    let passed = match expected {
        Expected::Output { normalized, .. } => ignore.apply(stdout) == *normalized,
        Expected::Match(re) => re.is_match(stdout),
    };
    if passed { Status::Success } else { Status::Fail }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::runner::{run, InterpreterMap, RunSettings};
    use crate::testcase::{compile_spec, CompileDefaults, RawTestSpec, StringOrList, TestCaseId};
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn sh_settings(timeout_ms: u64) -> RunSettings {
        RunSettings {
            timeout: Duration::from_millis(timeout_ms),
            hard_timeout: Duration::from_millis(timeout_ms * 10),
            spawn_retries: 5,
            interpreters: InterpreterMap::new(
                BTreeMap::from([("sh".to_string(), "sh".to_string())]),
                None,
            ),
            working_dir: None,
        }
    }

    fn case(mut raw: RawTestSpec) -> TestCase {
        raw.fnmatch = Some(StringOrList::One("*.sh".into()));
        compile_spec(
            raw,
            TestCaseId {
                suite: "tests.yaml".into(),
                index: 1,
            },
            &CompileDefaults::default(),
        )
        .unwrap()
    }

    fn subject(dir: &tempfile::TempDir, body: &str) -> String {
        let path = dir.path().join("prog.sh");
        std::fs::write(&path, body).unwrap();
        path.display().to_string()
    }

    #[test]
    fn test_exact_output_success_and_fail() {
        let dir = tempfile::tempdir().unwrap();
        let prog = subject(&dir, "read a b\necho $((a + b))\n");
        let good = case(RawTestSpec {
            input: Some("3 4\n".into()),
            output: Some("7\n".into()),
            ..Default::default()
        });
        let bad = case(RawTestSpec {
            input: Some("3 4\n".into()),
            output: Some("8\n".into()),
            ..Default::default()
        });
        let settings = sh_settings(5000);

        let result = run(&prog, &good, &settings);
        assert_eq!(result.status, Status::Success, "{result:?}");
        assert_eq!(result.stdout.as_deref(), Some("7\n"));

        let result = run(&prog, &bad, &settings);
        assert_eq!(result.status, Status::Fail);
        assert_eq!(result.expected_output.as_deref(), Some("8\n"));
    }

    #[test]
    fn test_normalized_comparison() {
        let dir = tempfile::tempdir().unwrap();
        let prog = subject(&dir, "echo 'Olá,   MUNDO!'\n");
        let case = case(RawTestSpec {
            output: Some("ola mundo".into()),
            ignore: Some(StringOrList::One("accents case punctuation".into())),
            ..Default::default()
        });
        assert_eq!(run(&prog, &case, &sh_settings(5000)).status, Status::Success);
    }

    #[test]
    fn test_match_against_raw_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let prog = subject(&dir, "echo 'the answer is 42'\n");
        let case = case(RawTestSpec {
            tokens: Some(StringOrList::One("answer 42".into())),
            ..Default::default()
        });
        assert_eq!(run(&prog, &case, &sh_settings(5000)).status, Status::Success);
    }

    #[test]
    fn test_nonzero_exit_classified_from_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let prog = subject(
            &dir,
            "echo 'Traceback (most recent call last):' >&2\necho 'ZeroDivisionError: division by zero' >&2\nexit 1\n",
        );
        let case = case(RawTestSpec {
            output: Some("x".into()),
            ..Default::default()
        });
        let result = run(&prog, &case, &sh_settings(5000));
        assert_eq!(result.status, Status::ZeroDivisionError);
        assert_eq!(result.summary, "z");
        assert_eq!(result.exit_code, Some(1));
    }

    #[test]
    fn test_generic_error() {
        let dir = tempfile::tempdir().unwrap();
        let prog = subject(&dir, "echo boom >&2\nexit 2\n");
        let case = case(RawTestSpec {
            output: Some("x".into()),
            ..Default::default()
        });
        assert_eq!(run(&prog, &case, &sh_settings(5000)).status, Status::Error);
    }

    #[test]
    fn test_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let prog = subject(&dir, "sleep 30\n");
        let case = case(RawTestSpec {
            output: Some("x".into()),
            ..Default::default()
        });
        let start = std::time::Instant::now();
        let result = run(&prog, &case, &sh_settings(300));
        assert_eq!(result.status, Status::Timeout);
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn test_missing_interpreter_binary_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let prog = subject(&dir, "echo x\n");
        let case = case(RawTestSpec {
            output: Some("x\n".into()),
            ..Default::default()
        });
        let mut settings = sh_settings(1000);
        settings.interpreters = InterpreterMap::new(
            BTreeMap::from([("sh".to_string(), "/nonexistent/interp".to_string())]),
            None,
        );
        let result = run(&prog, &case, &settings);
        assert_eq!(result.status, Status::Error);
        assert!(result.error.is_some());
    }

    #[test]
    fn test_judge_output_match_is_anchored_at_start() {
        let re = regex::Regex::new(r"\A(?:b)").unwrap();
        let expected = Expected::Match(re);
        assert_eq!(judge_output(&expected, &Normalizer::default(), "abc"), Status::Fail);
        assert_eq!(judge_output(&expected, &Normalizer::default(), "bc"), Status::Success);
    }
}
