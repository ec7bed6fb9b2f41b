//! Configuration service for loading and generating config files.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::types::default_log_path_for_config_dir;
use super::Config;

/// Configuration service.
pub struct ConfigService;

impl ConfigService {
    /// Get the default configuration file path.
    /// Always uses ~/.config/portcullis/config.toml for cross-platform consistency.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("portcullis")
            .join("config.toml")
    }

    /// Load configuration from file.
    ///
    /// If `path` is `None`, uses the default path.
    /// If the file doesn't exist, creates default configuration file.
    /// Validates configuration after loading.
    /// Log path defaults to the same directory as config file.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let path = path.map(PathBuf::from).unwrap_or_else(Self::default_path);
        let config_dir = path.parent();

        if !path.exists() {
            // Create default config file
            Self::generate_at(&path)?;
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        // If log_path was not explicitly set in config, use config file directory
        // Check if log_path matches the general default (meaning it wasn't set in file)
        let general_default = default_log_path_for_config_dir(None);
        if config.log_path == general_default {
            config.log_path = default_log_path_for_config_dir(config_dir);
        }

        // Validate configuration
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;

        Ok(config)
    }

    /// Generate default configuration file at the default path.
    pub fn generate_default() -> Result<()> {
        Self::generate_at(&Self::default_path())
    }

    /// Generate default configuration file at the specified path.
    pub fn generate_at(path: &Path) -> Result<()> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = Self::default_config_content();
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Generate default configuration content with comments.
    fn default_config_content() -> String {
        r#"# portcullis configuration file

# Enable debug logging to file (default: false)
debug = false

# Path to log directory (default: same directory as config.toml/logs)
# If --config is specified, logs go to that directory/logs
# log_path = "~/.config/portcullis/logs"

[pipeline]
# Where route filters go: "standard" (globals, methods, paths, route)
# or "route_first" (route filters lead both lists)
ordering = "standard"
# Run after-filters on a response produced by a before-filter
after_on_short_circuit = true
# Alias always moved to the end of the after list ("" disables).
# "toolbar" is not a built-in: pinning only takes effect once an alias
# with this name is registered under [aliases], e.g.
# toolbar = "filters::PerformanceMetrics"
pin_last_after = "toolbar"

# Built-in aliases: csrf, honeypot, forcehttps, secureheaders,
# pagecache, performance, cors
# Before-only: csrf, forcehttps. After-only: secureheaders.
# [aliases]
# protect = ["honeypot", "csrf"]

[globals]
before = [
    "honeypot",
    # { alias = "csrf", except = ["api/*"] },
]
after = ["secureheaders"]

# Filters by HTTP method (before only)
# [methods]
# post = ["csrf"]

# Filters by path glob; "alias:arg1,arg2" passes arguments
# [[filters]]
# alias = "pagecache:120"
# before = ["catalog/*"]
# after = ["catalog/*"]

# Routes and the filters attached to them
# [[routes]]
# pattern = "admin/*"
# methods = ["GET", "POST"]
# before = ["forcehttps"]

# [settings.csrf]
# token_name = "csrf_test_name"
# redirect = false

# [settings.cors]
# allowed_origins = ["https://example.com"]
"#
        .to_string()
    }
}
