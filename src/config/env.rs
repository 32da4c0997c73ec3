//! Environment variable overrides.
//!
//! Env var prefix: `TST_`
//!
//! - `TST_TIMEOUT`: per-run timeout in seconds
//! - `TST_SPAWN_RETRIES`: cap on transient spawn retries
//! - `TST_OUTPUT_FORMAT`: summary/passed/failed/json
//! - `TST_DIFF`: show output diffs (1/true/yes)
//! - `TST_FALLBACK_INTERPRETER`: command for unmapped extensions
//! - `TST_VERBOSE`: enable verbose output (1/true/yes)

use super::{Config, OutputFormat};

const PREFIX: &str = "TST_";

/// Apply individual env var overrides to a config.
///
/// Each override is applied only if the env var is set and parses correctly.
/// Invalid values are silently ignored.
pub fn apply_env_overrides(config: &mut Config) {
    if let Some(val) = env_parse::<u64>("TIMEOUT") {
        config.run.timeout = val;
    }

    if let Some(val) = env_parse::<u32>("SPAWN_RETRIES") {
        config.run.spawn_retries = val;
    }

    if let Some(val) = env_parse::<OutputFormat>("OUTPUT_FORMAT") {
        config.report.format = val;
    }

    if let Some(val) = env_bool("DIFF") {
        config.report.diff = val;
    }

    if let Some(val) = env_str("FALLBACK_INTERPRETER") {
        config.fallback_interpreter = Some(val);
    }

    if let Some(val) = env_bool("VERBOSE") {
        config.verbose = val;
    }
}

/// Summarize which env var overrides are currently active.
pub fn detect_active_overrides() -> Vec<(String, String)> {
    let keys = [
        "TIMEOUT",
        "SPAWN_RETRIES",
        "OUTPUT_FORMAT",
        "DIFF",
        "FALLBACK_INTERPRETER",
        "VERBOSE",
    ];

    keys.iter()
        .filter_map(|key| {
            let full = format!("{PREFIX}{key}");
            std::env::var(&full)
                .ok()
                .filter(|v| !v.is_empty())
                .map(|v| (full, v))
        })
        .collect()
}

// --- helpers ---

fn env_str(suffix: &str) -> Option<String> {
    std::env::var(format!("{PREFIX}{suffix}"))
        .ok()
        .filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(suffix: &str) -> Option<T> {
    env_str(suffix).and_then(|s| s.parse().ok())
}

fn env_bool(suffix: &str) -> Option<bool> {
    env_str(suffix).map(|s| matches!(s.to_lowercase().as_str(), "1" | "true" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Env vars are process-global, so serialize tests that mutate them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Helper: run a closure with specific env vars set, then restore.
    fn with_env_vars<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
        let _guard = ENV_LOCK.lock().unwrap();
        let mut old: Vec<(&str, Option<String>)> = Vec::new();
        for &(k, v) in vars {
            old.push((k, std::env::var(k).ok()));
            // SAFETY: tests are serialized via ENV_LOCK
            unsafe { std::env::set_var(k, v) };
        }
        f();
        for (k, prev) in old {
            // SAFETY: tests are serialized via ENV_LOCK
            match prev {
                Some(v) => unsafe { std::env::set_var(k, v) },
                None => unsafe { std::env::remove_var(k) },
            }
        }
    }

    #[test]
    fn test_apply_env_overrides_run_fields() {
        with_env_vars(&[("TST_TIMEOUT", "9"), ("TST_SPAWN_RETRIES", "3")], || {
            let mut config = Config::default();
            apply_env_overrides(&mut config);
            assert_eq!(config.run.timeout, 9);
            assert_eq!(config.run.spawn_retries, 3);
        });
    }

    #[test]
    fn test_apply_env_overrides_report_fields() {
        with_env_vars(
            &[
                ("TST_OUTPUT_FORMAT", "json"),
                ("TST_DIFF", "yes"),
                ("TST_VERBOSE", "1"),
                ("TST_FALLBACK_INTERPRETER", "sh"),
            ],
            || {
                let mut config = Config::default();
                apply_env_overrides(&mut config);
                assert_eq!(config.report.format, OutputFormat::Json);
                assert!(config.report.diff);
                assert!(config.verbose);
                assert_eq!(config.fallback_interpreter.as_deref(), Some("sh"));
            },
        );
    }

    #[test]
    fn test_apply_env_overrides_invalid_values_ignored() {
        with_env_vars(
            &[("TST_TIMEOUT", "soon"), ("TST_OUTPUT_FORMAT", "xml")],
            || {
                let mut config = Config::default();
                apply_env_overrides(&mut config);
                assert_eq!(config.run.timeout, 5);
                assert_eq!(config.report.format, OutputFormat::Summary);
            },
        );
    }

    #[test]
    fn test_detect_active_overrides() {
        with_env_vars(&[("TST_DIFF", "0")], || {
            let active = detect_active_overrides();
            assert!(active.contains(&("TST_DIFF".to_string(), "0".to_string())));
        });
    }
}
