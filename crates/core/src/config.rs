use std::env;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TelesinkError};
use crate::model::StorageKind;
use crate::time::parse_duration_str;

/// Where new spreadsheet rows land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetInsert {
    /// Row 2, directly below the header; older rows move down.
    Top,
    /// After the last non-empty row.
    Append,
}

impl fmt::Display for SheetInsert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Top => "top",
            Self::Append => "append",
        })
    }
}

impl FromStr for SheetInsert {
    type Err = TelesinkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "top" | "insert" => Ok(Self::Top),
            "append" | "bottom" => Ok(Self::Append),
            other => Err(TelesinkError::Parse(format!(
                "unknown sheet insert mode: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub http_addr: String,
    pub machine_id: String,
    pub storage: StorageKind,
    pub data_file: PathBuf,
    pub database_url: String,
    pub sheet_name: String,
    pub sheet_id: Option<String>,
    pub sheet_insert: SheetInsert,
    pub sheet_buffered: bool,
    pub sheet_credentials: Option<String>,
    pub sheet_access_token: Option<String>,
    pub flush_interval: Duration,
    pub history_limit: usize,
    pub stream_keepalive: Duration,
    pub feed_backlog: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:10000".to_string(),
            machine_id: "machine-001".to_string(),
            storage: StorageKind::File,
            data_file: PathBuf::from("data_store.jsonl"),
            database_url: "telesink.duckdb".to_string(),
            sheet_name: "Telemetry".to_string(),
            sheet_id: None,
            sheet_insert: SheetInsert::Top,
            sheet_buffered: false,
            sheet_credentials: None,
            sheet_access_token: None,
            flush_interval: Duration::from_secs(10),
            history_limit: 100,
            stream_keepalive: Duration::from_secs(15),
            feed_backlog: 1024,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        let config_path = config_file_path();
        if let Some(file_overrides) = load_file_overrides(&config_path)? {
            apply_overrides(&mut cfg, file_overrides, "config file")?;
        }
        let env_overrides = load_env_overrides()?;
        apply_overrides(&mut cfg, env_overrides, "environment")?;
        Ok(cfg)
    }

    /// Replaces only the port of `http_addr`, keeping the host.
    pub fn set_port(&mut self, port: u16) {
        let host = self
            .http_addr
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        self.http_addr = format!("{host}:{port}");
    }

    pub fn validate(&self) -> Result<()> {
        if self.history_limit == 0 {
            return Err(TelesinkError::Config(
                "history_limit must be greater than zero".to_string(),
            ));
        }
        if self.flush_interval.is_zero() {
            return Err(TelesinkError::Config(
                "flush_interval must be greater than zero".to_string(),
            ));
        }
        if self.machine_id.trim().is_empty() {
            return Err(TelesinkError::Config("machine_id cannot be empty".to_string()));
        }
        if self.storage == StorageKind::Sheet
            && self.sheet_credentials.is_none()
            && self.sheet_access_token.is_none()
        {
            return Err(TelesinkError::Config(
                "sheet storage requires GOOGLE_CREDENTIALS or GOOGLE_ACCESS_TOKEN".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    http_addr: Option<String>,
    port: Option<u16>,
    machine_id: Option<String>,
    storage: Option<String>,
    data_file: Option<PathBuf>,
    database_url: Option<String>,
    sheet_name: Option<String>,
    sheet_id: Option<String>,
    sheet_insert: Option<String>,
    sheet_buffered: Option<bool>,
    sheet_credentials: Option<String>,
    sheet_access_token: Option<String>,
    flush_interval: Option<String>,
    history_limit: Option<usize>,
    stream_keepalive: Option<String>,
    feed_backlog: Option<usize>,
}

fn config_file_path() -> PathBuf {
    if let Ok(path) = env::var("TELESINK_CONFIG") {
        return PathBuf::from(path);
    }

    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(home).join(".config"));
    config_home.join("telesink/config.toml")
}

fn load_file_overrides(path: &PathBuf) -> Result<Option<ConfigOverrides>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| TelesinkError::Config(format!("failed reading {}: {e}", path.display())))?;
    let parsed: ConfigOverrides = toml::from_str(&raw)
        .map_err(|e| TelesinkError::Config(format!("failed parsing {}: {e}", path.display())))?;
    Ok(Some(parsed))
}

fn env_parsed<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| TelesinkError::Config(format!("bad {key} in environment: {e}"))),
        Err(_) => Ok(None),
    }
}

fn load_env_overrides() -> Result<ConfigOverrides> {
    let sheet_buffered = match env::var("TELESINK_SHEET_BUFFERED") {
        Ok(v) => Some(parse_flag(&v).ok_or_else(|| {
            TelesinkError::Config(format!(
                "bad TELESINK_SHEET_BUFFERED in environment: expected a boolean, got {v}"
            ))
        })?),
        Err(_) => None,
    };

    Ok(ConfigOverrides {
        http_addr: env::var("TELESINK_HTTP_ADDR").ok(),
        port: env_parsed("PORT")?,
        machine_id: env::var("MACHINE_ID").ok(),
        storage: env::var("TELESINK_STORAGE").ok(),
        data_file: env::var("TELESINK_DATA_FILE").ok().map(PathBuf::from),
        database_url: env::var("DATABASE_URL").ok(),
        sheet_name: env::var("SHEET_NAME").ok(),
        sheet_id: env::var("SHEET_ID").ok(),
        sheet_insert: env::var("TELESINK_SHEET_INSERT").ok(),
        sheet_buffered,
        sheet_credentials: env::var("GOOGLE_CREDENTIALS").ok(),
        sheet_access_token: env::var("GOOGLE_ACCESS_TOKEN").ok(),
        flush_interval: env::var("TELESINK_FLUSH_INTERVAL").ok(),
        history_limit: env_parsed("TELESINK_HISTORY_LIMIT")?,
        stream_keepalive: env::var("TELESINK_STREAM_KEEPALIVE").ok(),
        feed_backlog: env_parsed("TELESINK_FEED_BACKLOG")?,
    })
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

fn apply_overrides(cfg: &mut Config, overrides: ConfigOverrides, source: &str) -> Result<()> {
    if let Some(v) = overrides.http_addr {
        cfg.http_addr = v;
    }
    if let Some(v) = overrides.port {
        cfg.set_port(v);
    }
    if let Some(v) = overrides.machine_id {
        cfg.machine_id = v;
    }
    if let Some(v) = overrides.storage {
        cfg.storage = v.parse().map_err(|e| {
            TelesinkError::Config(format!("bad storage in {source}: {e} (value={v})"))
        })?;
    }
    if let Some(v) = overrides.data_file {
        cfg.data_file = v;
    }
    if let Some(v) = overrides.database_url {
        cfg.database_url = v;
    }
    if let Some(v) = overrides.sheet_name {
        cfg.sheet_name = v;
    }
    if let Some(v) = overrides.sheet_id {
        cfg.sheet_id = Some(v);
    }
    if let Some(v) = overrides.sheet_insert {
        cfg.sheet_insert = v.parse().map_err(|e| {
            TelesinkError::Config(format!("bad sheet_insert in {source}: {e} (value={v})"))
        })?;
    }
    if let Some(v) = overrides.sheet_buffered {
        cfg.sheet_buffered = v;
    }
    if let Some(v) = overrides.sheet_credentials {
        cfg.sheet_credentials = Some(v);
    }
    if let Some(v) = overrides.sheet_access_token {
        cfg.sheet_access_token = Some(v);
    }
    if let Some(v) = overrides.flush_interval {
        cfg.flush_interval = parse_duration_str(&v).map_err(|e| {
            TelesinkError::Config(format!("bad flush_interval in {source}: {e}"))
        })?;
    }
    if let Some(v) = overrides.history_limit {
        cfg.history_limit = v;
    }
    if let Some(v) = overrides.stream_keepalive {
        cfg.stream_keepalive = parse_duration_str(&v).map_err(|e| {
            TelesinkError::Config(format!("bad stream_keepalive in {source}: {e}"))
        })?;
    }
    if let Some(v) = overrides.feed_backlog {
        cfg.feed_backlog = v;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_listens_on_render_port() {
        let cfg = Config::default();
        assert_eq!(cfg.http_addr, "0.0.0.0:10000");
        assert_eq!(cfg.storage, StorageKind::File);
        assert_eq!(cfg.flush_interval, Duration::from_secs(10));
        assert_eq!(cfg.history_limit, 100);
    }

    #[test]
    fn port_override_keeps_host() {
        let mut cfg = Config {
            http_addr: "127.0.0.1:8080".to_string(),
            ..Config::default()
        };
        cfg.set_port(9999);
        assert_eq!(cfg.http_addr, "127.0.0.1:9999");
    }

    #[test]
    fn apply_file_overrides_updates_sheet_fields() {
        let mut cfg = Config::default();
        let file = ConfigOverrides {
            storage: Some("sheet".to_string()),
            sheet_name: Some("Line 4".to_string()),
            sheet_insert: Some("append".to_string()),
            sheet_buffered: Some(true),
            flush_interval: Some("3s".to_string()),
            port: Some(8081),
            ..ConfigOverrides::default()
        };

        apply_overrides(&mut cfg, file, "config file").unwrap();

        assert_eq!(cfg.storage, StorageKind::Sheet);
        assert_eq!(cfg.sheet_name, "Line 4");
        assert_eq!(cfg.sheet_insert, SheetInsert::Append);
        assert!(cfg.sheet_buffered);
        assert_eq!(cfg.flush_interval, Duration::from_secs(3));
        assert_eq!(cfg.http_addr, "0.0.0.0:8081");
    }

    #[test]
    fn bad_values_name_their_source() {
        let mut cfg = Config::default();
        let file = ConfigOverrides {
            flush_interval: Some("often".to_string()),
            ..ConfigOverrides::default()
        };
        let err = apply_overrides(&mut cfg, file, "config file").unwrap_err();
        assert!(err.to_string().contains("flush_interval in config file"));

        let env = ConfigOverrides {
            storage: Some("mongo".to_string()),
            ..ConfigOverrides::default()
        };
        let err = apply_overrides(&mut cfg, env, "environment").unwrap_err();
        assert!(err.to_string().contains("storage in environment"));
    }

    #[test]
    fn toml_overrides_parse() {
        let parsed: ConfigOverrides = toml::from_str(
            r#"
            machine_id = "press-7"
            storage = "database"
            database_url = "duckdb:///var/lib/telesink.duckdb"
            history_limit = 25
            "#,
        )
        .unwrap();
        let mut cfg = Config::default();
        apply_overrides(&mut cfg, parsed, "config file").unwrap();
        assert_eq!(cfg.machine_id, "press-7");
        assert_eq!(cfg.storage, StorageKind::Database);
        assert_eq!(cfg.history_limit, 25);
    }

    #[test]
    fn sheet_storage_requires_credentials() {
        let mut cfg = Config {
            storage: StorageKind::Sheet,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
        cfg.sheet_access_token = Some("ya29.token".to_string());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn flags_parse() {
        assert_eq!(parse_flag("Yes"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
