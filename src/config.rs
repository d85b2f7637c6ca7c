use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::util::expand_tilde;

/// Environment variable that overrides `renderer.executable_path`.
pub const EXECUTABLE_ENV: &str = "WKHTMLTOPDF_PATH";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub renderer: Renderer,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// The conversion environment described by the `[renderer]` section.
    pub fn environment(&self) -> Environment {
        let r = &self.renderer;
        let temp_dir = if r.temp_dir.trim().is_empty() {
            std::env::temp_dir()
        } else {
            expand_tilde(&r.temp_dir)
        };
        Environment {
            temp_dir,
            executable_path: expand_tilde(&r.executable_path),
            timeout: Duration::from_millis(r.timeout_ms),
            debug: r.debug,
            page_size: r.page_size.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Renderer {
    pub executable_path: String,
    /// Empty means the system temp dir.
    pub temp_dir: String,
    pub timeout_ms: u64,
    pub debug: bool,
    pub page_size: String,
}
impl Default for Renderer {
    fn default() -> Self {
        Self {
            executable_path: DEFAULT_EXECUTABLE.into(),
            temp_dir: "".into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            debug: false,
            page_size: DEFAULT_PAGE_SIZE.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "wkconvert.log".into(),
        }
    }
}

const DEFAULT_EXECUTABLE: &str = "/usr/local/bin/wkhtmltopdf";
const DEFAULT_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_PAGE_SIZE: &str = "A4";

/// Everything a conversion needs to know about the host: where the renderer
/// lives, where temp artifacts go, and how long a render may take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Environment {
    pub temp_dir: PathBuf,
    pub executable_path: PathBuf,
    pub timeout: Duration,
    /// Echo renderer diagnostics to the log as they arrive.
    pub debug: bool,
    pub page_size: String,
}

impl Default for Environment {
    fn default() -> Self {
        Config::default().environment()
    }
}

impl Environment {
    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable_path = path.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Applies `WKHTMLTOPDF_PATH` when it is set and non-empty.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(raw) = std::env::var(EXECUTABLE_ENV) {
            if !raw.trim().is_empty() {
                self.executable_path = expand_tilde(raw.trim());
            }
        }
        self
    }
}
