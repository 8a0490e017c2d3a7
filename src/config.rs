//! Engine configuration loaded from `config.ini`.
//! Covers scroll convergence timing, layout overscan and where the session
//! is stored.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use tracing::{info, warn};

use crate::scroller::ScrollPolicy;
use crate::store::{default_store_path, StoreError};

const DEFAULT_CONFIG_INI: &str = include_str!("../config.ini");
const CONFIG_FILE_NAME: &str = "config.ini";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    // ============ SCROLL ============
    /// Delay between two scroll-to-index attempts (milliseconds)
    pub retry_delay_ms: u64,
    /// Attempts before a scroll-to-index request is given up
    pub max_scroll_attempts: u32,
    /// Extra ticks the target must stay at the top before the jump counts as done
    pub settle_ticks: u32,
    /// Delay between content load and the jump to the restored position (milliseconds)
    pub initial_scroll_delay_ms: u64,

    // ============ LAYOUT ============
    /// Rows rendered above and below the visible range
    pub overscan: usize,

    // ============ STORE ============
    /// Whether the session is written to disk at all
    pub persist_session: bool,
    /// Session database location; platform data directory when unset
    pub store_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            retry_delay_ms: 20,
            max_scroll_attempts: 50,
            settle_ticks: 2,
            initial_scroll_delay_ms: 100,
            overscan: 2,
            persist_session: true,
            store_path: None,
        }
    }
}

impl Config {
    pub fn scroll_policy(&self) -> ScrollPolicy {
        ScrollPolicy {
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            max_attempts: self.max_scroll_attempts,
            settle_ticks: self.settle_ticks,
        }
    }

    pub fn initial_scroll_delay(&self) -> Duration {
        Duration::from_millis(self.initial_scroll_delay_ms)
    }

    /// Configured session database path, or the platform default.
    pub fn resolved_store_path(&self) -> Result<PathBuf, StoreError> {
        match &self.store_path {
            Some(path) => Ok(path.clone()),
            None => default_store_path(),
        }
    }

    /// Platform configuration directory, created if missing.
    fn config_dir() -> Option<PathBuf> {
        let dirs = ProjectDirs::from("", "", "strip-viewer")?;
        let config_dir = dirs.config_dir().to_path_buf();
        let _ = fs::create_dir_all(&config_dir);
        Some(config_dir)
    }

    /// `config.ini` shipped next to the executable (copied there by the build script).
    fn bundled_config() -> Option<PathBuf> {
        let exe = std::env::current_exe().ok()?;
        let path = exe.parent()?.join(CONFIG_FILE_NAME);
        path.exists().then_some(path)
    }

    /// Get settings file path.
    ///
    /// Uses `config.ini` in the platform config directory, seeded from the
    /// bundled copy next to the executable on first run. Without a config
    /// directory the bundled copy is used directly.
    pub fn config_path() -> Option<PathBuf> {
        let Some(config_dir) = Self::config_dir() else {
            return Self::bundled_config();
        };
        let config = config_dir.join(CONFIG_FILE_NAME);
        if let Some(bundled) = Self::bundled_config() {
            adopt_bundled_config(&bundled, &config);
        }
        Some(config)
    }

    /// Load configuration from the INI file, writing the default template
    /// first if there is none.
    pub fn load() -> Self {
        let Some(config_path) = Self::config_path() else {
            warn!("No configuration directory available, using defaults");
            return Self::parse_ini(DEFAULT_CONFIG_INI);
        };

        if !config_path.exists() {
            match fs::write(&config_path, DEFAULT_CONFIG_INI) {
                Ok(()) => info!("Created {}", config_path.display()),
                Err(e) => warn!("Failed to write {}: {}", config_path.display(), e),
            }
        }

        match fs::read_to_string(&config_path) {
            Ok(content) => Self::parse_ini(&content),
            Err(e) => {
                warn!("Failed to read {}: {}", config_path.display(), e);
                Self::parse_ini(DEFAULT_CONFIG_INI)
            }
        }
    }

    /// Parse INI content. Unknown keys and unparsable values keep their defaults.
    pub fn parse_ini(content: &str) -> Self {
        let mut config = Config::default();

        let mut in_scroll_section = false;
        let mut in_layout_section = false;
        let mut in_store_section = false;

        for line in content.lines() {
            let line = line.trim();

            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                let section = &line[1..line.len() - 1];
                in_scroll_section = section.eq_ignore_ascii_case("scroll")
                    || section.eq_ignore_ascii_case("scrolling");
                in_layout_section = section.eq_ignore_ascii_case("layout");
                in_store_section = section.eq_ignore_ascii_case("store")
                    || section.eq_ignore_ascii_case("session");
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            if in_scroll_section {
                match key.as_str() {
                    "retry_delay_ms" | "retry_delay" => {
                        if let Ok(v) = value.parse::<u64>() {
                            config.retry_delay_ms = v.clamp(1, 1000);
                        }
                    }
                    "max_attempts" | "max_scroll_attempts" => {
                        if let Ok(v) = value.parse::<u32>() {
                            config.max_scroll_attempts = v.clamp(1, 10_000);
                        }
                    }
                    "settle_ticks" | "settle" => {
                        if let Ok(v) = value.parse::<u32>() {
                            config.settle_ticks = v.min(20);
                        }
                    }
                    "initial_delay_ms" | "initial_scroll_delay_ms" => {
                        if let Ok(v) = value.parse::<u64>() {
                            config.initial_scroll_delay_ms = v.min(5000);
                        }
                    }
                    _ => {}
                }
            } else if in_layout_section {
                if let "overscan" | "overscan_count" = key.as_str() {
                    if let Ok(v) = value.parse::<usize>() {
                        config.overscan = v.min(64);
                    }
                }
            } else if in_store_section {
                match key.as_str() {
                    "persist" | "persist_session" | "enabled" => {
                        if let Some(v) = parse_bool(value) {
                            config.persist_session = v;
                        }
                    }
                    "path" | "store_path" => {
                        config.store_path = if value.is_empty() {
                            None
                        } else {
                            Some(PathBuf::from(value))
                        };
                    }
                    _ => {}
                }
            }
        }

        // Settling needs attempts to happen in.
        config.max_scroll_attempts = config.max_scroll_attempts.max(config.settle_ticks + 1);
        config
    }

    /// Render the effective settings in `config.ini` form.
    pub fn to_ini(&self) -> String {
        let mut content = String::new();

        content.push_str("; Strip Viewer Configuration\n\n");

        content.push_str("[Scroll]\n");
        content.push_str("; Delay between two attempts to bring the target row to the top (ms)\n");
        content.push_str(&format!("retry_delay_ms = {}\n", self.retry_delay_ms));
        content.push_str("; Attempts before giving up on a jump\n");
        content.push_str(&format!("max_attempts = {}\n", self.max_scroll_attempts));
        content.push_str("; Extra ticks the target has to stay in place\n");
        content.push_str(&format!("settle_ticks = {}\n", self.settle_ticks));
        content.push_str("; Delay before jumping to the restored position after loading (ms)\n");
        content.push_str(&format!(
            "initial_delay_ms = {}\n\n",
            self.initial_scroll_delay_ms
        ));

        content.push_str("[Layout]\n");
        content.push_str("; Rows rendered above and below the viewport\n");
        content.push_str(&format!("overscan = {}\n\n", self.overscan));

        content.push_str("[Store]\n");
        content.push_str("; Remember heights and position between runs (true/false)\n");
        content.push_str(&format!(
            "persist = {}\n",
            if self.persist_session { "true" } else { "false" }
        ));
        content.push_str("; Session database file; empty uses the platform data directory\n");
        content.push_str(&format!(
            "path = {}\n",
            self.store_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        ));

        content
    }
}

/// Copy a bundled config to `target` unless one is already there.
fn adopt_bundled_config(bundled: &Path, target: &Path) -> bool {
    if target.exists() {
        return false;
    }
    match fs::copy(bundled, target) {
        Ok(_) => {
            info!("Copied {} to {}", bundled.display(), target.display());
            true
        }
        Err(e) => {
            warn!("Failed to copy {}: {}", bundled.display(), e);
            false
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}
