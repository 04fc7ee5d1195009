//! Config module.
//! Layers built-in defaults, an optional `hintlens.toml` and `HINTLENS_*` environment variables.
//! API keys come from `api_keys` (comma-separated in `HINTLENS_API_KEYS`) or the legacy
//! `GEMINI_KEYS` variable. Variables may also live in a `.env` file in the working directory;
//! the process environment wins over it. Missing keys are not an error here; the first scan
//! reports them.

use anyhow::{Context, Result};
use config::{Config, Environment, File, Map};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use crate::gemini::DEFAULT_API_BASE;

const DEFAULT_FILE: &str = "hintlens";
const ENV_PREFIX: &str = "HINTLENS";
const LEGACY_KEYS_VAR: &str = "GEMINI_KEYS";
const DOTENV_FILE: &str = ".env";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_keys: Vec<String>,
    pub model: String,
    pub api_base: String,
    pub request_timeout_secs: u64,
    pub hotkeys: HotkeySettings,
    pub server: ServerSettings,
    /// Initialise logging at debug level.
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            model: "gemini-2.5-flash".to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout_secs: 60,
            hotkeys: HotkeySettings::default(),
            server: ServerSettings::default(),
            debug: false,
        }
    }
}

/// Global key combinations, e.g. `"F2"` or `"Alt+Z"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HotkeySettings {
    pub arm: String,
    pub scan: String,
    pub clear: String,
    pub recall: String,
    pub reset: String,
    pub visibility: String,
    pub quit: String,
}

impl Default for HotkeySettings {
    fn default() -> Self {
        Self {
            arm: "F2".to_string(),
            scan: "Alt+Z".to_string(),
            clear: "Alt+X".to_string(),
            recall: "Alt+S".to_string(),
            reset: "Alt+R".to_string(),
            visibility: "Alt+V".to_string(),
            quit: "F4".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl Settings {
    /// Loads settings from `path` (must exist) or the optional default file, then `.env`
    /// and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut env = dotenv_vars(Path::new(DOTENV_FILE));
        env.extend(
            std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
        );
        Self::resolve(path, env)
    }

    fn resolve(path: Option<&Path>, env: Map<String, String>) -> Result<Self> {
        let legacy = env.get(LEGACY_KEYS_VAR).cloned();
        let settings = Self::load_from(path, Some(env))?;
        Ok(settings.with_legacy_keys(legacy.as_deref()))
    }

    /// Same as [`Settings::load`] but reads environment variables from `env` when given.
    fn load_from(path: Option<&Path>, env: Option<Map<String, String>>) -> Result<Self> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_FILE).required(false),
        };

        let config = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("api_keys")
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .context("Failed to read settings")?;

        config
            .try_deserialize()
            .context("Invalid settings")
    }

    /// Falls back to a comma-separated key list when no keys were configured.
    fn with_legacy_keys(mut self, raw: Option<&str>) -> Self {
        if self.api_keys.iter().all(|k| k.trim().is_empty()) {
            if let Some(raw) = raw {
                self.api_keys = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string)
                    .collect();
            }
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Reads `KEY=VALUE` pairs from a dotenv file without touching the process environment.
/// A missing file yields no variables.
fn dotenv_vars(path: &Path) -> Map<String, String> {
    match dotenvy::from_path_iter(path) {
        Ok(iter) => iter
            .filter_map(|item| match item {
                Ok(pair) => Some(pair),
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", path.display(), e);
                    None
                }
            })
            .collect(),
        Err(e) if e.not_found() => {
            debug!("No {} file, using the process environment only", path.display());
            Map::new()
        }
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            Map::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn env(pairs: &[(&str, &str)]) -> Option<Map<String, String>> {
        Some(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    fn temp_settings_file(name: &str, body: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("hintlens-test-{}-{}.toml", std::process::id(), name));
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_defaults_without_sources() {
        let settings = Settings::load_from(None, env(&[])).unwrap();
        assert!(settings.api_keys.is_empty());
        assert_eq!(settings.model, "gemini-2.5-flash");
        assert_eq!(settings.server.port, 5000);
        assert_eq!(settings.hotkeys.scan, "Alt+Z");
        assert_eq!(settings.request_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_env_overrides_file() {
        let path = temp_settings_file(
            "env-over-file",
            "model = \"from-file\"\napi_keys = [\"f1\"]\n[server]\nport = 6000\n",
        );
        let settings = Settings::load_from(
            Some(path.as_path()),
            env(&[("HINTLENS_MODEL", "from-env"), ("HINTLENS_SERVER__PORT", "7000")]),
        )
        .unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(settings.model, "from-env");
        assert_eq!(settings.server.port, 7000);
        assert_eq!(settings.api_keys, vec!["f1"]);
    }

    #[test]
    fn test_env_key_list_is_comma_separated() {
        let settings = Settings::load_from(None, env(&[("HINTLENS_API_KEYS", "a,b,c")])).unwrap();
        assert_eq!(settings.api_keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let missing = std::env::temp_dir().join("hintlens-definitely-missing.toml");
        assert!(Settings::load_from(Some(missing.as_path()), env(&[])).is_err());
    }

    #[test]
    fn test_legacy_keys_used_only_when_unset() {
        let empty = Settings::default().with_legacy_keys(Some(" k1 , ,k2"));
        assert_eq!(empty.api_keys, vec!["k1", "k2"]);

        let configured = Settings {
            api_keys: vec!["mine".to_string()],
            ..Settings::default()
        }
        .with_legacy_keys(Some("k1"));
        assert_eq!(configured.api_keys, vec!["mine"]);
    }

    #[test]
    fn test_dotenv_file_supplies_legacy_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "# local keys\nGEMINI_KEYS=k1,k2\nHINTLENS_MODEL=from-dotenv\n").unwrap();

        let vars = dotenv_vars(&path);
        assert_eq!(vars.get("GEMINI_KEYS").map(String::as_str), Some("k1,k2"));

        let settings = Settings::resolve(None, vars).unwrap();
        assert_eq!(settings.api_keys, vec!["k1", "k2"]);
        assert_eq!(settings.model, "from-dotenv");
    }

    #[test]
    fn test_missing_dotenv_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(dotenv_vars(&dir.path().join(".env")).is_empty());
    }

    #[test]
    fn test_configured_keys_beat_legacy_dotenv_keys() {
        let settings = Settings::resolve(
            None,
            env(&[("GEMINI_KEYS", "legacy"), ("HINTLENS_API_KEYS", "a,b")]).unwrap(),
        )
        .unwrap();
        assert_eq!(settings.api_keys, vec!["a", "b"]);
    }
}
