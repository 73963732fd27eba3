//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory
//! (or an explicit path), then applies the `MODELSH_LOG_LEVEL` override.
//! A missing default file is not an error: built-in defaults apply.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::engine::EngineSettings;
use crate::error::AppError;
use crate::llm::providers;
use crate::logger;

pub const DEFAULT_PATH: &str = "config/default.toml";

/// LLM configuration (`[llm]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmConfig {
    /// Provider used by models that do not name one.
    /// Maps to `default` in `[llm]` TOML.
    pub provider: String,
}

/// Fully-resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub name: String,
    pub log_level: String,
    pub prompt: String,
    pub engine: EngineSettings,
    pub llm: LlmConfig,
    /// File the config was read from; `None` for built-in defaults.
    pub source: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let shell = RawShell::default();
        Self {
            name: shell.name,
            log_level: shell.log_level,
            prompt: shell.prompt,
            engine: EngineSettings::default(),
            llm: LlmConfig { provider: default_llm_provider() },
            source: None,
        }
    }
}

/// Raw TOML shape, the `serde` target before resolution.
#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    shell: RawShell,
    #[serde(default)]
    engine: EngineSettings,
    #[serde(default)]
    llm: RawLlm,
}

#[derive(Deserialize)]
#[serde(default)]
struct RawShell {
    name: String,
    log_level: String,
    prompt: String,
}

impl Default for RawShell {
    fn default() -> Self {
        Self {
            name: "modelsh".to_string(),
            log_level: "warn".to_string(),
            prompt: "modelsh> ".to_string(),
        }
    }
}

#[derive(Deserialize)]
struct RawLlm {
    /// Maps to `default = "..."` in `[llm]`.
    #[serde(rename = "default", default = "default_llm_provider")]
    provider: String,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self { provider: default_llm_provider() }
    }
}

fn default_llm_provider() -> String {
    "dummy".to_string()
}

/// Load config, then apply env-var overrides.
///
/// Path precedence: `explicit` (CLI `-f`), `MODELSH_CONFIG`, then
/// [`DEFAULT_PATH`]. Only the default path may be absent.
pub fn load(explicit: Option<&str>) -> Result<Config, AppError> {
    let log_level_override = env::var("MODELSH_LOG_LEVEL").ok();
    let requested = explicit
        .map(str::to_string)
        .or_else(|| env::var("MODELSH_CONFIG").ok())
        .filter(|p| !p.trim().is_empty());

    match requested {
        Some(path) => load_from(&expand_home(&path), log_level_override.as_deref()),
        None => {
            let path = Path::new(DEFAULT_PATH);
            if path.exists() {
                load_from(path, log_level_override.as_deref())
            } else {
                let mut config = Config::default();
                if let Some(level) = log_level_override {
                    config.log_level = level;
                }
                validate(&config)?;
                Ok(config)
            }
        }
    }
}

/// Internal loader: accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(path: &Path, log_level_override: Option<&str>) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let config = Config {
        name: parsed.shell.name,
        log_level: log_level_override.unwrap_or(&parsed.shell.log_level).to_string(),
        prompt: parsed.shell.prompt,
        engine: parsed.engine,
        llm: LlmConfig { provider: parsed.llm.provider },
        source: Some(path.to_path_buf()),
    };
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<(), AppError> {
    logger::parse_level(&config.log_level)
        .map_err(|e| AppError::Config(format!("shell.log_level: {e}")))?;
    if config.engine.max_interpolation_passes == 0 {
        return Err(AppError::Config(
            "engine.max_interpolation_passes must be at least 1".into(),
        ));
    }
    if config.engine.max_interpolated_len == 0 {
        return Err(AppError::Config("engine.max_interpolated_len must be at least 1".into()));
    }
    if config.engine.max_drain_steps == 0 {
        return Err(AppError::Config("engine.max_drain_steps must be at least 1".into()));
    }
    if let Err(e) = providers::build(&config.llm.provider) {
        return Err(AppError::Config(format!(
            "llm.default: {e} (known: {})",
            providers::KNOWN.join(", ")
        )));
    }
    Ok(())
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FULL_TOML: &str = r#"
[shell]
name = "test-shell"
log_level = "info"
prompt = "> "

[engine]
max_interpolation_passes = 4
max_interpolated_len = 2048
max_drain_steps = 100

[llm]
default = "dummy"
"#;

    fn write_toml(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parse_full_config() {
        let f = write_toml(FULL_TOML);
        let cfg = load_from(f.path(), None).unwrap();
        assert_eq!(cfg.name, "test-shell");
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.prompt, "> ");
        assert_eq!(cfg.engine.max_interpolation_passes, 4);
        assert_eq!(cfg.engine.max_interpolated_len, 2048);
        assert_eq!(cfg.engine.max_drain_steps, 100);
        assert_eq!(cfg.llm.provider, "dummy");
        assert_eq!(cfg.source.as_deref(), Some(f.path()));
    }

    #[test]
    fn empty_file_uses_defaults() {
        let f = write_toml("");
        let cfg = load_from(f.path(), None).unwrap();
        let defaults = Config::default();
        assert_eq!(cfg.name, defaults.name);
        assert_eq!(cfg.log_level, "warn");
        assert_eq!(cfg.engine, EngineSettings::default());
        assert_eq!(cfg.llm.provider, "dummy");
    }

    #[test]
    fn partial_engine_section_keeps_other_defaults() {
        let f = write_toml("[engine]\nmax_drain_steps = 5\n");
        let cfg = load_from(f.path(), None).unwrap();
        assert_eq!(cfg.engine.max_drain_steps, 5);
        assert_eq!(
            cfg.engine.max_interpolation_passes,
            EngineSettings::default().max_interpolation_passes
        );
    }

    #[test]
    fn zero_limits_rejected() {
        let f = write_toml("[engine]\nmax_drain_steps = 0\n");
        let msg = load_from(f.path(), None).unwrap_err().to_string();
        assert!(msg.contains("max_drain_steps"), "{msg}");
    }

    #[test]
    fn unknown_provider_rejected() {
        let f = write_toml("[llm]\ndefault = \"gpt-9\"\n");
        let msg = load_from(f.path(), None).unwrap_err().to_string();
        assert!(msg.contains("unknown provider: gpt-9"), "{msg}");
    }

    #[test]
    fn unknown_section_rejected() {
        let f = write_toml("[supervisor]\nbot_name = \"x\"\n");
        assert!(load_from(f.path(), None).is_err());
    }

    #[test]
    fn tilde_expands_to_home() {
        let home = dirs::home_dir().expect("home dir must exist in test env");
        let expanded = expand_home("~/.modelsh");
        assert!(expanded.starts_with(&home));
        assert!(expanded.ends_with(".modelsh"));
    }

    #[test]
    fn absolute_path_unchanged() {
        let p = expand_home("/absolute/path");
        assert_eq!(p, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn relative_path_unchanged() {
        let p = expand_home("relative/path");
        assert_eq!(p, PathBuf::from("relative/path"));
    }

    #[test]
    fn missing_file_errors() {
        let result = load_from(Path::new("/nonexistent/config.toml"), None);
        assert!(result.is_err());
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("config error"));
    }

    #[test]
    fn explicit_missing_path_errors() {
        assert!(load(Some("/nonexistent/modelsh.toml")).is_err());
    }

    #[test]
    fn invalid_log_level_rejected() {
        let f = write_toml("[shell]\nlog_level = \"loud\"\n");
        let msg = load_from(f.path(), None).unwrap_err().to_string();
        assert!(msg.contains("shell.log_level"), "{msg}");

        let f = write_toml(FULL_TOML);
        assert!(load_from(f.path(), Some("verbose")).is_err());
    }

    #[test]
    fn env_log_level_override() {
        let f = write_toml(FULL_TOML);
        let cfg = load_from(f.path(), Some("debug")).unwrap();
        assert_eq!(cfg.log_level, "debug");
    }
}
