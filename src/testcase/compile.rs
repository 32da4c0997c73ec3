use super::raw::RawTestSpec;
use super::suite::TestSuite;
use super::{Expected, IoTest, ScriptTest, TestCase, TestCaseId, TestKind};
use crate::core::error::{Error, Result};
use crate::normalize::{NormalizeOp, Normalizer};
use regex::{Regex, RegexBuilder};

/// Defaults applied to test cases that leave a field unset.
#[derive(Debug, Clone)]
pub struct CompileDefaults {
    /// Applicability patterns.
    pub fnmatch: Vec<String>,
    /// Normalizer operator names.
    pub ignore: Vec<String>,
}

impl Default for CompileDefaults {
    fn default() -> Self {
        Self {
            fnmatch: vec!["*.py".to_string()],
            ignore: Vec::new(),
        }
    }
}

/// Output strategy before it is compiled.
enum Strategy {
    Output(String),
    Pattern(String),
}

/// Compile a suite's raw specs into canonical test cases.
///
/// Any invalid spec aborts the whole suite with an error naming the suite and
/// the 1-based index of the offending test.
pub fn compile(
    raw_specs: &[serde_yaml::Value],
    suite: &str,
    level: i64,
    defaults: &CompileDefaults,
) -> Result<TestSuite> {
    let mut cases = Vec::with_capacity(raw_specs.len());
    for (i, value) in raw_specs.iter().enumerate() {
        let id = TestCaseId {
            suite: suite.to_string(),
            index: i + 1,
        };
        let raw: RawTestSpec = serde_yaml::from_value(value.clone())
            .map_err(|e| Error::invalid_spec(suite, id.index, e.to_string()))?;
        cases.push(compile_spec(raw, id, defaults)?);
    }
    Ok(TestSuite::new(suite, level, cases))
}

/// Compile a single raw spec.
pub fn compile_spec(raw: RawTestSpec, id: TestCaseId, defaults: &CompileDefaults) -> Result<TestCase> {
    let suite = id.suite.clone();
    let index = id.index;
    build(raw, id, defaults).map_err(|msg| Error::invalid_spec(suite, index, msg))
}

fn build(raw: RawTestSpec, id: TestCaseId, defaults: &CompileDefaults) -> std::result::Result<TestCase, String> {
    let ignore_names = raw
        .ignore
        .clone()
        .map(|i| i.into_items())
        .unwrap_or_else(|| defaults.ignore.clone());
    let ignore = Normalizer::from_names(&ignore_names).map_err(|e| e.to_string())?;

    let fnmatch_src = raw
        .fnmatch
        .clone()
        .map(|f| f.into_items())
        .unwrap_or_else(|| defaults.fnmatch.clone());
    if fnmatch_src.is_empty() {
        return Err("fnmatch must not be empty".to_string());
    }
    let fnmatch = fnmatch_src
        .iter()
        .map(|p| glob::Pattern::new(p).map_err(|e| format!("invalid fnmatch pattern '{p}': {e}")))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let script = match (&raw.script, &raw.command) {
        (Some(_), Some(_)) => return Err("cannot be used together: script, command".to_string()),
        (script, command) => script.clone().or_else(|| command.clone()),
    };

    let is_script = match raw.kind.as_deref() {
        Some("io") => false,
        Some("script") => true,
        Some(other) => return Err(format!("unknown test type '{other}'")),
        None => script.is_some(),
    };

    let kind = if is_script {
        TestKind::Script(build_script(&raw, script)?)
    } else {
        if script.is_some() {
            return Err("io tests cannot have a script".to_string());
        }
        TestKind::Io(build_io(raw.clone(), &ignore)?)
    };

    Ok(TestCase {
        id,
        name: raw.name,
        kind,
        fnmatch,
        ignore,
    })
}

fn build_script(raw: &RawTestSpec, script: Option<String>) -> std::result::Result<ScriptTest, String> {
    let command = script.ok_or("script tests must have a script")?;
    if command.trim().is_empty() {
        return Err("script must not be empty".to_string());
    }

    let forbidden = [
        ("input", raw.input.is_some()),
        ("output", raw.output.is_some()),
        ("match", raw.match_.is_some()),
        ("tokens", raw.tokens.is_some()),
        ("tokens-regex", raw.tokens_regex.is_some()),
        ("session", raw.session.is_some()),
        ("parts", raw.parts.is_some()),
    ];
    let present: Vec<&str> = forbidden.iter().filter(|(_, p)| *p).map(|(n, _)| *n).collect();
    if !present.is_empty() {
        return Err(format!("script tests cannot have: {}", present.join(", ")));
    }

    Ok(ScriptTest {
        command: python_as_python3(&command)?,
    })
}

/// Expected outputs may highlight tokens as `{{token}}`; the braces are
/// markup, not part of the output.
fn strip_token_markup(output: &str) -> std::result::Result<String, String> {
    let markup = Regex::new(r"\{\{(.*?)\}\}").map_err(|e| e.to_string())?;
    Ok(markup.replace_all(output, "$1").into_owned())
}

/// Script commands written for a bare `python` run under `python3`.
fn python_as_python3(command: &str) -> std::result::Result<String, String> {
    let python = Regex::new(r"\bpython\b").map_err(|e| e.to_string())?;
    Ok(python.replace_all(command, "python3").into_owned())
}

fn build_io(raw: RawTestSpec, ignore: &Normalizer) -> std::result::Result<IoTest, String> {
    let strategies = [
        ("output", raw.output.is_some()),
        ("match", raw.match_.is_some()),
        ("tokens", raw.tokens.is_some()),
        ("tokens-regex", raw.tokens_regex.is_some()),
        ("session", raw.session.is_some()),
        ("parts", raw.parts.is_some()),
    ];
    let present: Vec<&str> = strategies.iter().filter(|(_, p)| *p).map(|(n, _)| *n).collect();
    match present.len() {
        0 => {
            return Err(
                "io tests need one of: output, match, tokens, tokens-regex, session, parts".to_string(),
            );
        }
        1 => {}
        _ => return Err(format!("cannot be used together: {}", present.join(", "))),
    }

    if raw.strict.is_some() && raw.session.is_none() {
        return Err("strict is only valid with session".to_string());
    }
    if raw.strict_output.is_some() && raw.parts.is_none() {
        return Err("strict-output is only valid with parts".to_string());
    }
    if raw.input.is_some() && (raw.session.is_some() || raw.parts.is_some()) {
        return Err("input cannot be used with session or parts".to_string());
    }

    let (input, strategy) = if let Some(output) = raw.output {
        (raw.input.unwrap_or_default(), Strategy::Output(strip_token_markup(&output)?))
    } else if let Some(pattern) = raw.match_ {
        (raw.input.unwrap_or_default(), Strategy::Pattern(pattern))
    } else if let Some(tokens) = raw.tokens {
        let tokens = tokens.into_items();
        let wrapped: Vec<String> = tokens
            .iter()
            .map(|t| format!(r"\b{}\b", regex::escape(t)))
            .collect();
        (raw.input.unwrap_or_default(), Strategy::Pattern(spread(&wrapped, "tokens")?))
    } else if let Some(tokens) = raw.tokens_regex {
        let tokens = tokens.into_items();
        (raw.input.unwrap_or_default(), Strategy::Pattern(spread(&tokens, "tokens-regex")?))
    } else if let Some(turns) = raw.session {
        session(&turns, raw.strict.unwrap_or(false))?
    } else if let Some(parts) = raw.parts {
        parts_spec(&parts, raw.strict_output.unwrap_or(false))?
    } else {
        unreachable!("exactly one output strategy is present")
    };

    let expected = match strategy {
        Strategy::Output(text) => Expected::Output {
            normalized: ignore.apply(&text),
            text,
        },
        Strategy::Pattern(pattern) => {
            let re = RegexBuilder::new(&format!(r"\A(?:{pattern})"))
                .multi_line(true)
                .dot_matches_new_line(true)
                .case_insensitive(ignore.contains(NormalizeOp::Case))
                .build()
                .map_err(|e| format!("invalid match regex: {e}"))?;
            Expected::Match(re)
        }
    };

    Ok(IoTest { input, expected })
}

/// `.*a.*b.*`
fn spread(fragments: &[String], field: &str) -> std::result::Result<String, String> {
    if fragments.is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    Ok(format!(".*{}.*", fragments.join(".*")))
}

fn with_newline(text: &str) -> String {
    if text.ends_with('\n') {
        text.to_string()
    } else {
        format!("{text}\n")
    }
}

/// Alternating input/output turns, starting with input.
fn session(turns: &[String], strict: bool) -> std::result::Result<(String, Strategy), String> {
    let mut input = String::new();
    let mut outputs = Vec::new();
    for (i, turn) in turns.iter().enumerate() {
        if i % 2 == 0 {
            input.push_str(&with_newline(turn));
        } else {
            outputs.push(turn.as_str());
        }
    }
    if outputs.is_empty() {
        return Err("session must contain at least one output turn".to_string());
    }

    let strategy = if strict {
        Strategy::Output(outputs.concat())
    } else {
        let escaped: Vec<String> = outputs.iter().map(|o| regex::escape(o)).collect();
        Strategy::Pattern(spread(&escaped, "session")?)
    };
    Ok((input, strategy))
}

fn parts_spec(
    parts: &[std::collections::BTreeMap<String, String>],
    strict_output: bool,
) -> std::result::Result<(String, Strategy), String> {
    let mut input = String::new();
    let mut fragments = Vec::new();
    let mut literal = String::new();
    let mut all_literal = true;

    for (i, part) in parts.iter().enumerate() {
        let mut entries = part.iter();
        let (key, value) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => return Err(format!("part {} must have exactly one key", i + 1)),
        };
        match key.as_str() {
            "in" => input.push_str(value),
            "lin" => input.push_str(&with_newline(value)),
            "out" => {
                fragments.push(regex::escape(value));
                literal.push_str(value);
            }
            "re" => {
                fragments.push(value.clone());
                all_literal = false;
            }
            "tok" => {
                fragments.push(format!(r"\b{}\b", regex::escape(value)));
                all_literal = false;
            }
            other => {
                return Err(format!(
                    "part {}: unknown key '{other}' (expected in, out, re, tok, lin)",
                    i + 1
                ));
            }
        }
    }

    if fragments.is_empty() {
        return Err("parts must contain at least one out, re or tok part".to_string());
    }

    let strategy = if !strict_output {
        Strategy::Pattern(spread(&fragments, "parts")?)
    } else if all_literal {
        Strategy::Output(literal)
    } else {
        Strategy::Pattern(format!(r"{}\z", fragments.concat()))
    };
    Ok((input, strategy))
}
