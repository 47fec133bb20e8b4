use std::path::PathBuf;

pub const ENV_LOG_LEVEL: &str = "ATTENDANCED_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "ATTENDANCED_LOG_DIR";

/// Startup settings, read once from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub log_level: &'static str,
    /// Rotating file logs go here; stderr is used when unset.
    pub log_dir: Option<PathBuf>,
    /// Problems found while reading settings; logged once logging is up.
    pub warnings: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_dir: None,
            warnings: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Config::default();

        if let Some(raw) = lookup(ENV_LOG_LEVEL) {
            match normalize_level(&raw) {
                Some(level) => cfg.log_level = level,
                None => cfg.warnings.push(format!(
                    "{} has unsupported value `{}`; using `{}`",
                    ENV_LOG_LEVEL,
                    raw.trim(),
                    cfg.log_level
                )),
            }
        }

        if let Some(raw) = lookup(ENV_LOG_DIR) {
            let t = raw.trim();
            if PathBuf::from(t).is_absolute() {
                cfg.log_dir = Some(PathBuf::from(t));
            } else if !t.is_empty() {
                cfg.warnings.push(format!(
                    "{} must be an absolute path, got `{}`; logging to stderr",
                    ENV_LOG_DIR, t
                ));
            }
        }

        cfg
    }
}

/// `debug` for debug builds, `info` for release builds.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

pub fn normalize_level(level: &str) -> Option<&'static str> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" | "warning" => Some("warn"),
        "error" => Some("error"),
        _ => None,
    }
}
