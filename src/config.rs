//! Application configuration.
//!
//! Settings resolve in layers: built-in defaults, then an optional config
//! file (TOML or JSON) found via `--config` or next to the data directory,
//! then environment variables, then CLI flags.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::repository::DbContext;
use crate::scrapers::{BrowserSettings, DEFAULT_USER_AGENT};

/// Default database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "blogharvest.db";

/// Default discovery index: a curated table of engineering blog posts.
pub const DEFAULT_INDEX_URL: &str = "https://www.educatum.com/engineering-blogs-in-ai-m";

/// Subdirectory of the data dir holding article text, images, and PDFs.
const STORAGE_SUBDIR: &str = "storage";

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename.
    pub database_filename: String,
    /// Database URL (overrides data_dir/database_filename if set).
    /// Supports sqlite: URLs. Set via DATABASE_URL env var or config.
    pub database_url: Option<String>,
    /// Directory for article text, images, PDFs, and diagnostics.
    pub storage_dir: PathBuf,
    /// User agent for HTTP requests.
    pub user_agent: String,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// Delay between requests in milliseconds.
    pub request_delay_ms: u64,
    /// Discovery index page URL.
    pub index_url: String,
    /// Default number of harvest workers.
    pub workers: usize,
    /// Headless browser settings for rendered extraction.
    pub browser: BrowserSettings,
}

impl Default for Settings {
    fn default() -> Self {
        // Default to ~/Documents/blogharvest/ for user data.
        // Falls back gracefully: Documents dir -> Home dir -> Current dir
        let data_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("blogharvest");

        Self {
            storage_dir: data_dir.join(STORAGE_SUBDIR),
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            database_url: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: 30,
            request_delay_ms: 500,
            index_url: DEFAULT_INDEX_URL.to_string(),
            workers: 4,
            browser: BrowserSettings::default(),
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            storage_dir: data_dir.join(STORAGE_SUBDIR),
            data_dir,
            ..Default::default()
        }
    }

    /// Get the database URL, constructing from path if not explicitly set.
    pub fn database_url(&self) -> String {
        if let Some(ref url) = self.database_url {
            url.clone()
        } else {
            format!("sqlite:{}", self.database_path().display())
        }
    }

    /// Check if using an explicit database URL (vs file path).
    pub fn has_database_url(&self) -> bool {
        self.database_url.is_some()
    }

    /// Get the full path to the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    /// Check if the database appears to be initialized.
    pub fn database_exists(&self) -> bool {
        if self.has_database_url() {
            // URL-configured databases are assumed reachable; connection
            // errors surface on first use.
            true
        } else {
            self.database_path().exists()
        }
    }

    /// Ensure the data and storage directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.data_dir).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create data directory '{}': {}",
                    self.data_dir.display(),
                    e
                ),
            )
        })?;
        fs::create_dir_all(&self.storage_dir).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create storage directory '{}': {}",
                    self.storage_dir.display(),
                    e
                ),
            )
        })
    }

    /// Open a database context for these settings.
    pub fn create_db_context(&self) -> DbContext {
        if let Some(ref url) = self.database_url {
            DbContext::from_url(url, &self.storage_dir)
        } else {
            DbContext::new(&self.database_path(), &self.storage_dir)
        }
    }
}

/// File-based configuration overlay. Every field is optional; unset fields
/// keep their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: Option<String>,
    pub database: Option<String>,
    pub database_url: Option<String>,
    pub user_agent: Option<String>,
    pub request_timeout: Option<u64>,
    pub request_delay_ms: Option<u64>,
    pub index_url: Option<String>,
    pub workers: Option<usize>,
    pub browser: Option<BrowserSettings>,

    /// Where this config was loaded from (not serialized).
    #[serde(skip)]
    source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a specific file path.
    /// The format is chosen by extension: TOML or JSON.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

        let mut config: Config = match ext {
            "json" => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
            _ => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Get the base directory for resolving relative paths.
    /// Returns the config file's parent directory if available.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    /// `base_dir` is used to resolve relative paths.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
            settings.storage_dir = settings.data_dir.join(STORAGE_SUBDIR);
        }
        if let Some(ref database) = self.database {
            settings.database_filename = database.clone();
        }
        if let Some(ref url) = self.database_url {
            settings.database_url = Some(url.clone());
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = user_agent.clone();
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(delay) = self.request_delay_ms {
            settings.request_delay_ms = delay;
        }
        if let Some(ref index_url) = self.index_url {
            settings.index_url = index_url.clone();
        }
        if let Some(workers) = self.workers {
            settings.workers = workers;
        }
        if let Some(ref browser) = self.browser {
            settings.browser = browser.clone();
        }
    }
}

/// Options for settings resolution, filled from the CLI's global flags.
#[derive(Debug, Default)]
pub struct LoadOptions {
    /// Explicit config file path.
    pub config_path: Option<PathBuf>,
    /// Target data directory or database file.
    pub target: Option<PathBuf>,
}

/// Resolved target path information.
#[derive(Debug, Clone)]
struct ResolvedTarget {
    database_filename: String,
    data_dir: PathBuf,
}

impl ResolvedTarget {
    /// Resolve a target path to a data dir and database filename.
    /// - A .db/.sqlite file selects its parent as the data dir
    /// - A directory looks for blogharvest.db inside
    fn from_path(path: &Path) -> Self {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(path)
        };

        let is_db_file = path
            .extension()
            .is_some_and(|ext| ext == "db" || ext == "sqlite" || ext == "sqlite3")
            || (path.exists() && path.is_file());

        if is_db_file {
            let database_filename = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(DEFAULT_DATABASE_FILENAME)
                .to_string();
            let data_dir = path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from("."));
            Self {
                database_filename,
                data_dir,
            }
        } else {
            Self {
                database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
                data_dir: path,
            }
        }
    }
}

/// Look for a config file next to the database.
fn find_config_next_to_db(data_dir: &Path) -> Option<PathBuf> {
    let extensions = ["toml", "json"];
    let basenames = ["blogharvest", "config"];

    for basename in basenames {
        for ext in extensions {
            let path = data_dir.join(format!("{}.{}", basename, ext));
            if path.exists() {
                return Some(path);
            }
        }
    }
    None
}

/// Load settings with explicit options.
pub async fn load_settings_with_options(options: LoadOptions) -> Settings {
    let resolved = options.target.as_ref().map(|t| ResolvedTarget::from_path(t));

    // Config file priority: explicit flag, then next to the target data
    // dir, then next to the default data dir.
    let config = if let Some(ref config_path) = options.config_path {
        match Config::load_from_path(config_path).await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("{}", e);
                Config::default()
            }
        }
    } else {
        let search_dir = resolved
            .as_ref()
            .map(|r| r.data_dir.clone())
            .unwrap_or_else(|| Settings::default().data_dir);
        match find_config_next_to_db(&search_dir) {
            Some(path) => {
                tracing::debug!("Found config at {}", path.display());
                Config::load_from_path(&path).await.unwrap_or_default()
            }
            None => Config::default(),
        }
    };

    let mut settings = Settings::default();

    let base_dir = config
        .base_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    config.apply_to_settings(&mut settings, &base_dir);

    // --target overrides the config file's data dir
    if let Some(resolved) = resolved {
        settings.storage_dir = resolved.data_dir.join(STORAGE_SUBDIR);
        settings.data_dir = resolved.data_dir;
        settings.database_filename = resolved.database_filename;
    }

    // DATABASE_URL environment variable takes highest precedence
    if let Some(url) = std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()) {
        tracing::debug!("Using DATABASE_URL from environment");
        settings.database_url = Some(url);
    }

    if let Some(ua) = std::env::var("BLOGHARVEST_USER_AGENT")
        .ok()
        .filter(|s| !s.is_empty())
    {
        settings.user_agent = ua;
    }

    settings
}
