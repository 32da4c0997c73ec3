use super::Config;
use crate::core::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Name of the per-project configuration file.
pub const PROJECT_CONFIG_FILE: &str = "tst.toml";

/// Configuration loader that layers several TOML sources.
pub struct ConfigLoader {
    /// Directory searched for `tst.toml`.
    project_dir: Option<PathBuf>,
    /// Explicit configuration file (must exist).
    config_file: Option<PathBuf>,
    /// Whether to read `$HOME/.tst/config.toml`.
    use_user_config: bool,
    /// Whether to apply `TST_*` env var overrides.
    use_env: bool,
}

impl ConfigLoader {
    /// Create a new configuration loader.
    pub fn new() -> Self {
        Self {
            project_dir: None,
            config_file: None,
            use_user_config: true,
            use_env: true,
        }
    }

    /// Set the directory searched for `tst.toml` (defaults to the current directory).
    pub fn project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_dir = Some(dir.into());
        self
    }

    /// Set an explicit configuration file path.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Skip the per-user configuration file.
    pub fn no_user_config(mut self) -> Self {
        self.use_user_config = false;
        self
    }

    /// Skip `TST_*` environment overrides.
    pub fn no_env_overrides(mut self) -> Self {
        self.use_env = false;
        self
    }

    /// Load configuration from all enabled sources.
    ///
    /// Priority (later sources override earlier):
    /// 1. Default values
    /// 2. User file (`$HOME/.tst/config.toml`)
    /// 3. Project file (`tst.toml`)
    /// 4. Explicit config file
    /// 5. Individual env var overrides (`TST_*`)
    pub fn load(self) -> Result<Config> {
        let mut value = serde_json::to_value(Config::default())
            .map_err(|e| Error::config(format!("failed to serialize config: {}", e)))?;

        if self.use_user_config {
            if let Some(path) = user_config_path().filter(|p| p.is_file()) {
                tracing::debug!(path = %path.display(), "loading user config");
                deep_merge(&mut value, &load_toml_layer(&path)?);
            }
        }

        let project_dir = match self.project_dir {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };
        let project_file = project_dir.join(PROJECT_CONFIG_FILE);
        if project_file.is_file() {
            tracing::debug!(path = %project_file.display(), "loading project config");
            deep_merge(&mut value, &load_toml_layer(&project_file)?);
        }

        if let Some(ref path) = self.config_file {
            deep_merge(&mut value, &load_toml_layer(path)?);
        }

        let mut config: Config = serde_json::from_value(value)
            .map_err(|e| Error::config(format!("invalid configuration: {}", e)))?;

        if self.use_env {
            super::env::apply_env_overrides(&mut config);
        }

        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn user_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".tst").join("config.toml"))
}

/// Read a TOML file as a JSON value so it can be deep-merged.
fn load_toml_layer(path: &Path) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::config(format!("failed to read config file {}: {}", path.display(), e))
    })?;
    let layer: toml::Value = toml::from_str(&content).map_err(|e| {
        Error::config(format!("failed to parse TOML config {}: {}", path.display(), e))
    })?;
    serde_json::to_value(layer)
        .map_err(|e| Error::config(format!("failed to convert {}: {}", path.display(), e)))
}

/// Recursively deep-merge `overlay` into `base`.
///
/// - Objects: keys are merged recursively (overlay keys win for conflicts).
/// - Scalars and arrays: overlay replaces base entirely.
pub(crate) fn deep_merge(base: &mut serde_json::Value, overlay: &serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base_map), serde_json::Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let entry = base_map
                    .entry(key.clone())
                    .or_insert(serde_json::Value::Null);
                deep_merge(entry, overlay_val);
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;

    fn loader(dir: &Path) -> ConfigLoader {
        ConfigLoader::new()
            .no_user_config()
            .no_env_overrides()
            .project_dir(dir)
    }

    #[test]
    fn test_load_defaults_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = loader(dir.path()).load().unwrap();
        assert_eq!(config.run.timeout, 5);
        assert_eq!(config.interpreters.get("py").unwrap(), "python3");
    }

    #[test]
    fn test_project_file_layered_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(PROJECT_CONFIG_FILE),
            r#"
[run]
timeout = 2

[interpreters]
rb = "ruby"
"#,
        )
        .unwrap();

        let config = loader(dir.path()).load().unwrap();
        assert_eq!(config.run.timeout, 2);
        // untouched fields keep their defaults
        assert_eq!(config.run.hard_timeout_factor, 10);
        // maps merge per key
        assert_eq!(config.interpreters.get("py").unwrap(), "python3");
        assert_eq!(config.interpreters.get("rb").unwrap(), "ruby");
    }

    #[test]
    fn test_explicit_file_overrides_project_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(PROJECT_CONFIG_FILE),
            "[report]\nformat = \"failed\"\ndiff = true\n",
        )
        .unwrap();
        let explicit = dir.path().join("ci.toml");
        std::fs::write(&explicit, "[report]\nformat = \"json\"\n").unwrap();

        let config = loader(dir.path()).config_file(&explicit).load().unwrap();
        assert_eq!(config.report.format, OutputFormat::Json);
        assert!(config.report.diff);
    }

    #[test]
    fn test_missing_config_file_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = loader(dir.path())
            .config_file("/nonexistent/config.toml")
            .load();
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_toml_error() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("bad.toml");
        std::fs::write(&config_path, "this is not valid { toml [[[").unwrap();
        let result = loader(dir.path()).config_file(&config_path).load();
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_value_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PROJECT_CONFIG_FILE), "[run]\ntimeout = \"x\"\n").unwrap();
        let err = loader(dir.path()).load().unwrap_err();
        assert!(err.to_string().contains("invalid configuration"));
    }

    #[test]
    fn test_deep_merge_objects() {
        let mut base = serde_json::json!({
            "run": { "timeout": 5, "spawn-retries": 100 },
            "verbose": false
        });
        let overlay = serde_json::json!({ "run": { "timeout": 1 } });
        deep_merge(&mut base, &overlay);
        assert_eq!(base["run"]["timeout"], 1);
        assert_eq!(base["run"]["spawn-retries"], 100);
        assert_eq!(base["verbose"], false);
    }

    #[test]
    fn test_deep_merge_array_replaces() {
        let mut base = serde_json::json!({ "tests": { "files": ["*.yaml", "*.json"] } });
        let overlay = serde_json::json!({ "tests": { "files": ["tst.yaml"] } });
        deep_merge(&mut base, &overlay);
        assert_eq!(base["tests"]["files"], serde_json::json!(["tst.yaml"]));
    }
}
