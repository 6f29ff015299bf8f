//! Configuration system for the goblin shell
//!
//! Loads configuration from JSON file at `~/.config/goblin/config.json`
//! Auto-generates default config file on first run if missing.
//!
//! Also owns theme resolution: the styles directory holds per-theme
//! stylesheets under `themes/` and a generated `current_theme.css` that
//! imports the selected one.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Theme substituted when the requested stylesheet does not exist.
pub const FALLBACK_THEME: &str = "gruvbox";

/// Per-user directories the daemon reads and writes.
///
/// Resolved once at startup and passed down explicitly so tests can point
/// everything at a temporary directory.
#[derive(Debug, Clone)]
pub struct Paths {
    pub config_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl Paths {
    /// Resolve against the user's XDG directories.
    pub fn resolve() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("goblin");
        let cache_dir = dirs::cache_dir()
            .context("Failed to get cache directory")?
            .join("goblin");
        Ok(Self {
            config_dir,
            cache_dir,
        })
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }

    pub fn styles_dir(&self) -> PathBuf {
        self.config_dir.join("styles")
    }

    pub fn themes_dir(&self) -> PathBuf {
        self.styles_dir().join("themes")
    }

    pub fn reminders_cache(&self) -> PathBuf {
        self.cache_dir.join("reminders.json")
    }

    pub fn todos_cache(&self) -> PathBuf {
        self.cache_dir.join("todos.txt")
    }
}

/// Which window manager the workspace widget talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspacesWm {
    Hyprland,
    Sway,
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub workspaces_wm: WorkspacesWm,
    pub theme: String,
    /// One label per workspace, ten workspaces.
    pub ws_icons: Vec<String>,
    pub font: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspaces_wm: WorkspacesWm::Hyprland,
            theme: FALLBACK_THEME.to_string(),
            ws_icons: (1..=10).map(|n| n.to_string()).collect(),
            font: "monospace".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file, or use defaults if file doesn't exist
    ///
    /// A missing config directory or file is created with defaults; an
    /// unreadable file degrades to defaults with a warning rather than
    /// refusing to start.
    pub fn load_or_generate(paths: &Paths) -> Self {
        let config_path = paths.config_file();

        if !config_path.is_file() {
            info!(
                "Config file not found at {:?}, creating defaults",
                config_path
            );
            if let Err(e) = Self::save_default(&config_path) {
                warn!("Failed to create default config file: {}", e);
            }
            return Self::default();
        }

        match Self::load(&config_path) {
            Ok(config) => {
                info!("Configuration loaded from {:?}", config_path);
                config
            }
            Err(e) => {
                warn!("Failed to load config, using defaults: {:#}", e);
                Self::default()
            }
        }
    }

    /// Load and parse the config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save default configuration to file
    fn save_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let default_config = Self::default();
        let json = serde_json::to_string_pretty(&default_config)
            .context("Failed to serialize default config")?;

        fs::write(path, json).context("Failed to write default config file")?;

        info!("Created default config file at {:?}", path);
        Ok(())
    }
}

/// Result of applying a theme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedTheme {
    /// Name actually written into the import.
    pub theme: String,
    /// True when the requested theme was missing and the fallback was used.
    pub fallback: bool,
}

/// Rewrite `current_theme.css` to import the configured theme.
///
/// When `styles/themes/<name>.css` does not exist the import references
/// [`FALLBACK_THEME`] instead of the requested name.
pub fn apply_theme(config: &Config, paths: &Paths) -> Result<AppliedTheme> {
    let styles_dir = paths.styles_dir();
    fs::create_dir_all(paths.themes_dir()).context("Failed to create styles directory")?;

    let requested = paths.themes_dir().join(format!("{}.css", config.theme));
    let (theme, fallback) = if requested.is_file() {
        (config.theme.clone(), false)
    } else {
        warn!("Theme '{}' not found, resorting to default", config.theme);
        (FALLBACK_THEME.to_string(), true)
    };

    let import = format!("@import url(\"./themes/{}.css\");", theme);
    fs::write(styles_dir.join("current_theme.css"), import)
        .context("Failed to write current_theme.css")?;

    Ok(AppliedTheme { theme, fallback })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_paths() -> (TempDir, Paths) {
        let dir = TempDir::new().unwrap();
        let paths = Paths {
            config_dir: dir.path().join("config"),
            cache_dir: dir.path().join("cache"),
        };
        (dir, paths)
    }

    #[test]
    fn generates_default_config_on_first_run() {
        let (_dir, paths) = temp_paths();
        let config = Config::load_or_generate(&paths);
        assert_eq!(config.theme, FALLBACK_THEME);
        assert_eq!(config.ws_icons.len(), 10);
        // And the file now exists with the same content.
        let reread = Config::load(&paths.config_file()).unwrap();
        assert_eq!(reread.theme, config.theme);
        assert_eq!(reread.workspaces_wm, WorkspacesWm::Hyprland);
    }

    #[test]
    fn unreadable_config_degrades_to_defaults() {
        let (_dir, paths) = temp_paths();
        fs::create_dir_all(&paths.config_dir).unwrap();
        fs::write(paths.config_file(), "{ not json").unwrap();
        let config = Config::load_or_generate(&paths);
        assert_eq!(config.font, "monospace");
    }

    #[test]
    fn missing_theme_falls_back() {
        let (_dir, paths) = temp_paths();
        let config = Config {
            theme: "does-not-exist".into(),
            ..Config::default()
        };

        let applied = apply_theme(&config, &paths).unwrap();
        assert!(applied.fallback);
        assert_eq!(applied.theme, FALLBACK_THEME);

        let written = fs::read_to_string(paths.styles_dir().join("current_theme.css")).unwrap();
        assert_eq!(written, "@import url(\"./themes/gruvbox.css\");");
    }

    #[test]
    fn existing_theme_is_imported_verbatim() {
        let (_dir, paths) = temp_paths();
        fs::create_dir_all(paths.themes_dir()).unwrap();
        fs::write(paths.themes_dir().join("nord.css"), "/* nord */").unwrap();

        let config = Config {
            theme: "nord".into(),
            ..Config::default()
        };
        let applied = apply_theme(&config, &paths).unwrap();
        assert!(!applied.fallback);

        let written = fs::read_to_string(paths.styles_dir().join("current_theme.css")).unwrap();
        assert_eq!(written, "@import url(\"./themes/nord.css\");");
    }

    #[test]
    fn workspaces_wm_serializes_lowercase() {
        let json = serde_json::to_string(&WorkspacesWm::Sway).unwrap();
        assert_eq!(json, "\"sway\"");
    }
}
