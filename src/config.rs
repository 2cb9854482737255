//! Configuration loading and resolution.
//!
//! Values come from three layers: command-line overrides, then the config
//! file, then built-in defaults. The file is a small TOML subset of
//! `key = value` lines with `#` comments, double-quoted strings, integers,
//! booleans and single-line arrays.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::api::{PlatformEndpoints, SessionCredentials};
use crate::download::HttpTimeouts;
use crate::model::{FormatSelection, VideoQuality};
use crate::video::default_concurrency;

const CONFIG_DIR_NAME: &str = "course-downloader";
const CONFIG_FILE_NAME: &str = "config.toml";

pub const DEFAULT_OUTPUT_DIR: &str = "downloads";
pub const DEFAULT_COLUMNS: u8 = 3;
pub const DEFAULT_INTERVAL_SECS: u64 = 1;
pub const DEFAULT_PRINT_WAIT_SECS: u64 = 15;
pub const DEFAULT_PRINT_TIMEOUT_SECS: u64 = 120;

/// Values read from the config file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// `GCID` session cookie value.
    pub gcid: Option<String>,
    /// `GCESS` session cookie value.
    pub gcess: Option<String>,
    /// Course identifiers processed by `batch`, in order.
    pub course_ids: Option<Vec<String>>,
    pub output_dir: Option<PathBuf>,
    /// Video worker pool size (1..=100).
    pub concurrency: Option<u8>,
    /// Output format bitmask: 1 = PDF, 2 = Markdown, 3 = both.
    pub columns: Option<u8>,
    /// Seconds between two articles (0..=60).
    pub interval: Option<u64>,
    /// Settle time before the PDF snapshot.
    pub print_wait_secs: Option<u64>,
    /// Hard limit for one PDF snapshot.
    pub print_timeout_secs: Option<u64>,
    pub quality: Option<VideoQuality>,
    /// Forces the enterprise session scope everywhere.
    pub enterprise: Option<bool>,
    pub connect_timeout_secs: Option<u64>,
    pub read_timeout_secs: Option<u64>,
    /// Replaces every platform origin with one base URL.
    pub api_base_url: Option<String>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first out-of-range field.
    pub fn validate(&self) -> Result<()> {
        if let Some(concurrency) = self.concurrency
            && !(1..=100).contains(&concurrency)
        {
            bail!("Invalid config value for `concurrency`: {concurrency}. Expected range: 1..=100");
        }

        if let Some(columns) = self.columns
            && FormatSelection::from_bits(columns).is_none()
        {
            bail!("Invalid config value for `columns`: {columns}. Expected range: 1..=3");
        }

        if let Some(interval) = self.interval
            && interval > 60
        {
            bail!("Invalid config value for `interval`: {interval}. Expected range: 0..=60");
        }

        validate_timeout_secs("print_wait_secs", self.print_wait_secs)?;
        validate_timeout_secs("print_timeout_secs", self.print_timeout_secs)?;
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;

        if let Some(base) = self.api_base_url.as_deref() {
            url::Url::parse(base)
                .with_context(|| format!("Invalid config value for `api_base_url`: '{base}'"))?;
        }

        Ok(())
    }

    /// Layers command-line values over this file config.
    #[must_use]
    pub fn overlay(mut self, overrides: &ConfigOverrides) -> Self {
        fn pick<T: Clone>(slot: &mut Option<T>, value: Option<&T>) {
            if let Some(value) = value {
                *slot = Some(value.clone());
            }
        }

        pick(&mut self.gcid, overrides.gcid.as_ref());
        pick(&mut self.gcess, overrides.gcess.as_ref());
        if !overrides.course_ids.is_empty() {
            self.course_ids = Some(overrides.course_ids.clone());
        }
        pick(&mut self.output_dir, overrides.output_dir.as_ref());
        pick(&mut self.concurrency, overrides.concurrency.as_ref());
        pick(&mut self.columns, overrides.columns.as_ref());
        pick(&mut self.interval, overrides.interval.as_ref());
        pick(&mut self.print_wait_secs, overrides.print_wait_secs.as_ref());
        pick(&mut self.print_timeout_secs, overrides.print_timeout_secs.as_ref());
        pick(&mut self.quality, overrides.quality.as_ref());
        if overrides.enterprise {
            self.enterprise = Some(true);
        }
        self
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Values given on the command line. `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub gcid: Option<String>,
    pub gcess: Option<String>,
    /// Replaces the configured course list when non-empty.
    pub course_ids: Vec<String>,
    pub output_dir: Option<PathBuf>,
    pub concurrency: Option<u8>,
    pub columns: Option<u8>,
    pub interval: Option<u64>,
    pub print_wait_secs: Option<u64>,
    pub print_timeout_secs: Option<u64>,
    pub quality: Option<VideoQuality>,
    /// A flag can only switch enterprise mode on.
    pub enterprise: bool,
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub credentials: SessionCredentials,
    pub course_ids: Vec<String>,
    pub output_dir: PathBuf,
    pub concurrency: usize,
    pub formats: FormatSelection,
    pub interval_secs: u64,
    pub print_wait: Duration,
    pub print_timeout: Duration,
    pub quality: VideoQuality,
    pub enterprise: bool,
    pub timeouts: HttpTimeouts,
    pub endpoints: PlatformEndpoints,
}

impl Settings {
    /// Merges overrides, file values and defaults, in that order.
    ///
    /// # Errors
    ///
    /// Fails when a merged value is out of range or the session
    /// credentials are missing.
    pub fn resolve(overrides: &ConfigOverrides, file: Option<&FileConfig>) -> Result<Self> {
        let merged = file.cloned().unwrap_or_default().overlay(overrides);
        merged.validate()?;

        let credentials = match (non_blank(merged.gcid), non_blank(merged.gcess)) {
            (Some(gcid), Some(gcess)) => SessionCredentials { gcid, gcess },
            _ => bail!(
                "Missing session credentials: set `gcid` and `gcess` in the config file \
                 or pass --gcid and --gcess"
            ),
        };

        let columns = merged.columns.unwrap_or(DEFAULT_COLUMNS);
        let Some(formats) = FormatSelection::from_bits(columns) else {
            bail!("Invalid config value for `columns`: {columns}. Expected range: 1..=3");
        };

        let defaults = HttpTimeouts::default();
        let endpoints = merged
            .api_base_url
            .as_deref()
            .map_or_else(PlatformEndpoints::default, PlatformEndpoints::single_origin);

        Ok(Self {
            credentials,
            course_ids: merged.course_ids.unwrap_or_default(),
            output_dir: merged
                .output_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            concurrency: merged
                .concurrency
                .map_or_else(default_concurrency, usize::from),
            formats,
            interval_secs: merged.interval.unwrap_or(DEFAULT_INTERVAL_SECS),
            print_wait: Duration::from_secs(
                merged.print_wait_secs.unwrap_or(DEFAULT_PRINT_WAIT_SECS),
            ),
            print_timeout: Duration::from_secs(
                merged.print_timeout_secs.unwrap_or(DEFAULT_PRINT_TIMEOUT_SECS),
            ),
            quality: merged.quality.unwrap_or_default(),
            enterprise: merged.enterprise.unwrap_or(false),
            timeouts: HttpTimeouts {
                connect_secs: merged.connect_timeout_secs.unwrap_or(defaults.connect_secs),
                read_secs: merged.read_timeout_secs.unwrap_or(defaults.read_secs),
            },
            endpoints,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
    /// Indicates whether configuration was loaded from disk.
    pub loaded_from_file: bool,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/course-downloader/config.toml`
/// 2. `$HOME/.config/course-downloader/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join(CONFIG_DIR_NAME)
                .join(CONFIG_FILE_NAME),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file.
///
/// An explicit path must exist; the default path is optional.
///
/// # Errors
///
/// Fails when the file cannot be read or does not parse.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: Some(config),
            loaded_from_file: true,
        });
    }

    let path = resolve_default_config_path();
    let Some(path_ref) = path.as_deref() else {
        return Ok(LoadedConfig {
            path,
            config: None,
            loaded_from_file: false,
        });
    };

    if !path_ref.exists() {
        return Ok(LoadedConfig {
            path,
            config: None,
            loaded_from_file: false,
        });
    }

    let config = load_file_config(path_ref)?;
    Ok(LoadedConfig {
        path,
        config: Some(config),
        loaded_from_file: true,
    })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

/// Parses config file contents.
///
/// # Errors
///
/// Fails on syntax errors, unknown keys and out-of-range values.
pub fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let line_no = line_index + 1;
        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "gcid" => cfg.gcid = Some(parse_string_literal(value).with_context(invalid)?),
            "gcess" => cfg.gcess = Some(parse_string_literal(value).with_context(invalid)?),
            "course_ids" => cfg.course_ids = Some(parse_id_array(value).with_context(invalid)?),
            "output_dir" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.output_dir = Some(PathBuf::from(parsed));
            }
            "concurrency" => cfg.concurrency = Some(parse_integer_u8(value).with_context(invalid)?),
            "columns" => cfg.columns = Some(parse_integer_u8(value).with_context(invalid)?),
            "interval" => cfg.interval = Some(parse_integer_u64(value).with_context(invalid)?),
            "print_wait_secs" => {
                cfg.print_wait_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "print_timeout_secs" => {
                cfg.print_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "quality" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                let quality = parsed
                    .parse::<VideoQuality>()
                    .map_err(anyhow::Error::msg)
                    .with_context(invalid)?;
                cfg.quality = Some(quality);
            }
            "enterprise" => cfg.enterprise = Some(parse_boolean(value).with_context(invalid)?),
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "read_timeout_secs" => {
                cfg.read_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "api_base_url" => {
                cfg.api_base_url = Some(parse_string_literal(value).with_context(invalid)?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

/// `[ "123", 456 ]`: quoted strings and integers, kept as strings.
fn parse_id_array(raw_value: &str) -> Result<Vec<String>> {
    let Some(inner) = raw_value
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    else {
        bail!("Expected array in square brackets");
    };

    let mut items = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    for ch in inner.chars() {
        match ch {
            '"' => {
                in_string = !in_string;
                current.push(ch);
            }
            ',' if !in_string => {
                items.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    if in_string {
        bail!("Unterminated string in array");
    }
    items.push(current);

    let mut ids = Vec::new();
    for (position, item) in items.iter().enumerate() {
        let token = item.trim();
        if token.is_empty() {
            // Trailing comma, or an empty array.
            if position + 1 == items.len() {
                continue;
            }
            bail!("Empty array element at position {}", position + 1);
        }
        if token.starts_with('"') {
            ids.push(parse_string_literal(token)?);
        } else {
            ids.push(parse_integer_u64(token)?.to_string());
        }
    }
    Ok(ids)
}

fn parse_integer_u8(raw_value: &str) -> Result<u8> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<u16>()?;
    u8::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u8"))
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}
