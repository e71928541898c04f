use std::{
    env, fmt, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use anyhow::{bail, Context};
use client_core::RestConfig;
use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_CONFIG_FILE: &str = "oficios.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Rest,
    Sqlite,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "rest" | "supabase" => Ok(Backend::Rest),
            "sqlite" | "local" => Ok(Backend::Sqlite),
            other => bail!("unknown backend '{other}', expected 'rest' or 'sqlite'"),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Backend::Rest => "rest",
            Backend::Sqlite => "sqlite",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub backend: Backend,
    pub api_url: String,
    pub api_key: String,
    pub database_url: String,
    pub request_timeout_seconds: u64,
    pub page_size: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: Backend::Rest,
            api_url: "http://localhost:54321".into(),
            api_key: String::new(),
            database_url: "sqlite://./data/oficios.db".into(),
            request_timeout_seconds: 60,
            page_size: 10,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    backend: Option<Backend>,
    api_url: Option<String>,
    api_key: Option<String>,
    database_url: Option<String>,
    request_timeout_seconds: Option<u64>,
    page_size: Option<u32>,
}

impl Settings {
    pub fn rest_config(&self) -> anyhow::Result<RestConfig> {
        if self.api_key.trim().is_empty() {
            bail!("the rest backend needs an api key (SUPABASE_ANON_KEY or api_key in {DEFAULT_CONFIG_FILE})");
        }
        let mut config = RestConfig::new(self.api_url.clone(), self.api_key.clone());
        config.timeout = Duration::from_secs(self.request_timeout_seconds.max(1));
        Ok(config)
    }

    fn apply_file(&mut self, file: FileSettings) {
        if let Some(v) = file.backend {
            self.backend = v;
        }
        if let Some(v) = file.api_url {
            self.api_url = v;
        }
        if let Some(v) = file.api_key {
            self.api_key = v;
        }
        if let Some(v) = file.database_url {
            self.database_url = v;
        }
        if let Some(v) = file.request_timeout_seconds {
            self.request_timeout_seconds = v;
        }
        if let Some(v) = file.page_size {
            self.page_size = v;
        }
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        for key in ["OFICIOS_BACKEND", "APP__BACKEND"] {
            if let Some(v) = var(key) {
                self.backend = v.parse().with_context(|| format!("invalid {key}"))?;
            }
        }

        if let Some(v) = var("SUPABASE_URL") {
            self.api_url = v;
        }
        if let Some(v) = var("APP__API_URL") {
            self.api_url = v;
        }

        if let Some(v) = var("SUPABASE_ANON_KEY") {
            self.api_key = v;
        }
        if let Some(v) = var("APP__API_KEY") {
            self.api_key = v;
        }

        if let Some(v) = var("DATABASE_URL") {
            self.database_url = v;
        }
        if let Some(v) = var("APP__DATABASE_URL") {
            self.database_url = v;
        }

        if let Some(v) = var("APP__REQUEST_TIMEOUT_SECONDS") {
            match v.parse::<u64>() {
                Ok(parsed) => self.request_timeout_seconds = parsed,
                Err(_) => warn!(value = %v, "ignoring invalid APP__REQUEST_TIMEOUT_SECONDS"),
            }
        }

        if let Some(v) = var("APP__PAGE_SIZE") {
            match v.parse::<u32>() {
                Ok(parsed) if parsed > 0 => self.page_size = parsed,
                _ => warn!(value = %v, "ignoring invalid APP__PAGE_SIZE"),
            }
        }

        Ok(())
    }
}

/// Defaults, then `oficios.toml` (or `config_path`, which must exist), then
/// the process environment.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    load_settings_with(config_path, |key| env::var(key).ok())
}

pub fn load_settings_with(
    config_path: Option<&Path>,
    var: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let (path, required) = match config_path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    match fs::read_to_string(&path) {
        Ok(raw) => {
            let file: FileSettings = toml::from_str(&raw)
                .with_context(|| format!("failed to parse config file '{}'", path.display()))?;
            settings.apply_file(file);
        }
        Err(err) if !required && err.kind() == ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read config file '{}'", path.display()))
        }
    }

    settings.apply_env(var)?;
    settings.database_url = normalize_database_url(&settings.database_url);
    Ok(settings)
}

pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:") {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite://") {
        return sqlite_url_for_path(path);
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        return sqlite_url_for_path(path);
    }

    if raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    sqlite_url_for_path(raw_database_url)
}

fn sqlite_url_for_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    if has_drive_letter(&path) {
        format!("sqlite:{path}")
    } else {
        format!("sqlite://{path}")
    }
}

fn has_drive_letter(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'/'
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
