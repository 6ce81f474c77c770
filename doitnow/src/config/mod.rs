//! Client settings.
//!
//! Each setting is taken from the first layer that provides it:
//! command-line flag, `DOITNOW_*` environment variable, the TOML file
//! (`~/.config/doitnow/config.toml` unless `--config` names another), and
//! finally the built-in default.
//!
//! The default file is optional. A file named with `--config` must exist.

use std::path::PathBuf;

use chrono::format::{Item, StrftimeItems};
use doitnow_proto::task::{Category, MAX_TASK_TITLE_LENGTH};

use crate::tasks::WeekStart;

/// Why the settings file could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file exists (or was named explicitly) but could not be read.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// File that was read.
        path: PathBuf,
        /// I/O failure.
        source: std::io::Error,
    },

    /// The file is not valid TOML for the settings schema.
    #[error("invalid config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// The platform reports no per-user config directory.
    #[error("no per-user config directory on this platform")]
    NoConfigDir,
}

// ---------------------------------------------------------------------------
// File schema (every field optional)
// ---------------------------------------------------------------------------

/// Settings file as written by the user.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    session: SessionFileConfig,
    sync: SyncFileConfig,
    tasks: TasksFileConfig,
    ui: UiFileConfig,
}

/// `[session]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SessionFileConfig {
    owner_id: Option<String>,
}

/// `[sync]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SyncFileConfig {
    channel_capacity: Option<usize>,
    event_buffer: Option<usize>,
    seed_file: Option<PathBuf>,
}

/// `[tasks]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct TasksFileConfig {
    max_title_len: Option<usize>,
    week_start: Option<WeekStart>,
    default_category: Option<Category>,
}

/// `[ui]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct UiFileConfig {
    date_format: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved settings
// ---------------------------------------------------------------------------

/// Settings after layering, every field populated.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -- Session --
    /// Owner to sign in as at startup.
    pub owner_id: Option<String>,

    // -- Sync --
    /// Capacity of each remote subscription channel.
    pub channel_capacity: usize,
    /// Capacity of the sync-event channel feeding the front end.
    pub event_buffer: usize,
    /// Snapshot file loaded into the in-memory remote at startup.
    pub seed_file: Option<PathBuf>,

    // -- Tasks --
    /// Maximum task title length in UTF-16 code units; configuration can
    /// lower it but never raise it above [`MAX_TASK_TITLE_LENGTH`].
    pub max_title_len: usize,
    /// First day of the calendar week.
    pub week_start: WeekStart,
    /// Category selected at startup.
    pub default_category: Category,

    // -- UI --
    /// Due-date display format (chrono format string) for dates other
    /// than yesterday, today and tomorrow. An invalid format is replaced
    /// by the default.
    pub date_format: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            owner_id: None,
            channel_capacity: 64,
            event_buffer: 64,
            seed_file: None,
            max_title_len: MAX_TASK_TITLE_LENGTH,
            week_start: WeekStart::Monday,
            default_category: Category::Work,
            date_format: "%d %b %Y".to_string(),
        }
    }
}

impl ClientConfig {
    /// Reads the settings file and layers `cli` over it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a file named with `--config` is missing
    /// or unreadable, or if whichever file is read is not valid TOML.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Layers `cli` over `file` over the defaults.
    #[must_use]
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            owner_id: cli
                .owner
                .clone()
                .or_else(|| file.session.owner_id.clone())
                .filter(|owner| !owner.trim().is_empty()),
            channel_capacity: file
                .sync
                .channel_capacity
                .unwrap_or(defaults.channel_capacity)
                .max(1),
            event_buffer: file
                .sync
                .event_buffer
                .unwrap_or(defaults.event_buffer)
                .max(1),
            seed_file: cli.seed.clone().or_else(|| file.sync.seed_file.clone()),
            max_title_len: file
                .tasks
                .max_title_len
                .unwrap_or(defaults.max_title_len)
                .clamp(1, MAX_TASK_TITLE_LENGTH),
            week_start: cli
                .week_start
                .or(file.tasks.week_start)
                .unwrap_or(defaults.week_start),
            default_category: file
                .tasks
                .default_category
                .unwrap_or(defaults.default_category),
            date_format: cli
                .date_format
                .clone()
                .or_else(|| file.ui.date_format.clone())
                .filter(|fmt| {
                    let valid = is_valid_date_format(fmt);
                    if !valid {
                        tracing::warn!(format = %fmt, "invalid date format, using default");
                    }
                    valid
                })
                .unwrap_or(defaults.date_format),
        }
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Personal task tracker with live sync")]
pub struct CliArgs {
    /// Owner to sign in as at startup.
    #[arg(long, env = "DOITNOW_OWNER")]
    pub owner: Option<String>,

    /// Path to config file (default: `~/.config/doitnow/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// JSON snapshot file to seed the in-memory remote with.
    #[arg(long)]
    pub seed: Option<PathBuf>,

    /// First day of the week (monday or sunday).
    #[arg(long)]
    pub week_start: Option<WeekStart>,

    /// Due-date display format (chrono format string).
    #[arg(long)]
    pub date_format: Option<String>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "DOITNOW_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/doitnow.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Whether `fmt` is a chrono format string that can render a date.
fn is_valid_date_format(fmt: &str) -> bool {
    StrftimeItems::new(fmt).all(|item| !matches!(item, Item::Error))
}

/// Reads `explicit` if given, otherwise the default file when present.
fn load_config_file(explicit: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let (path, required) = match explicit {
        Some(path) => (path.to_path_buf(), true),
        None => match default_config_path() {
            Ok(path) => (path, false),
            Err(_) => return Ok(ConfigFile::default()),
        },
    };

    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(ConfigFile::default());
        }
        Err(source) => return Err(ConfigError::ReadFile { path, source }),
    };
    let file = toml::from_str(&contents)?;
    tracing::debug!(path = %path.display(), "settings file loaded");
    Ok(file)
}

/// The default config file path, if a config directory exists.
///
/// # Errors
///
/// Returns [`ConfigError::NoConfigDir`] if the platform has no config
/// directory.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("doitnow").join("config.toml"))
        .ok_or(ConfigError::NoConfigDir)
}
