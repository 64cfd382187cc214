use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path, path::PathBuf};

use crate::prediction::LabelMap;

pub const CONFIG_PATH_VAR: &str = "WATERGUARD_CONFIG";
pub const ENVIRONMENT_VAR: &str = "WATERGUARD_ENV";
const MODEL_PATH_VAR: &str = "WATERGUARD_MODEL_PATH";
const DB_PATH_VAR: &str = "WATERGUARD_DB_PATH";
const BIND_VAR: &str = "WATERGUARD_BIND";

const DEFAULT_CONFIG_FILE: &str = "waterguard.json";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => bail!("unknown environment '{other}'"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    Memory,
    Database,
}

/// Runtime configuration. One object for every environment; the environment
/// only changes the defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub environment: Environment,
    pub bind_addr: String,
    pub database_path: PathBuf,
    /// Overrides the conventional model locations.
    pub model_path: Option<PathBuf>,
    /// Overrides the class id to label table.
    pub label_map: Option<BTreeMap<i64, String>>,
    pub session_backend: SessionBackend,
    pub session_ttl_hours: i64,
    /// Browser origins allowed to call the API. Empty allows any origin.
    pub allowed_origins: Vec<String>,
}

/// Every field optional so a config file only has to name what it changes.
#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    environment: Option<Environment>,
    bind_addr: Option<String>,
    database_path: Option<PathBuf>,
    model_path: Option<PathBuf>,
    label_map: Option<BTreeMap<i64, String>>,
    session_backend: Option<SessionBackend>,
    session_ttl_hours: Option<i64>,
    allowed_origins: Option<Vec<String>>,
}

impl Settings {
    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Development => Self {
                environment,
                bind_addr: "127.0.0.1:8000".into(),
                database_path: PathBuf::from("waterguard.sqlite3"),
                model_path: None,
                label_map: None,
                session_backend: SessionBackend::Memory,
                session_ttl_hours: 24,
                allowed_origins: Vec::new(),
            },
            Environment::Production => Self {
                environment,
                bind_addr: "0.0.0.0:8000".into(),
                database_path: PathBuf::from("waterguard.sqlite3"),
                model_path: None,
                label_map: None,
                session_backend: SessionBackend::Database,
                session_ttl_hours: 24,
                allowed_origins: Vec::new(),
            },
        }
    }

    /// Load from the process environment: config file path and environment
    /// name from env vars, then per-field env overrides.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
        let environment = match std::env::var(ENVIRONMENT_VAR) {
            Ok(value) => Environment::parse(&value)?,
            Err(_) => Environment::Development,
        };

        let mut settings = Self::from_file(Path::new(&path), environment)?;
        settings.apply_overrides(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    /// Defaults for `environment`, overlaid with the file when it exists. An
    /// `environment` key inside the file switches the defaults it overlays.
    pub fn from_file(path: &Path, environment: Environment) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::for_environment(environment));
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        let file: SettingsFile = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))?;

        let mut settings = Self::for_environment(file.environment.unwrap_or(environment));
        if let Some(value) = file.bind_addr {
            settings.bind_addr = value;
        }
        if let Some(value) = file.database_path {
            settings.database_path = value;
        }
        if file.model_path.is_some() {
            settings.model_path = file.model_path;
        }
        if file.label_map.is_some() {
            settings.label_map = file.label_map;
        }
        if let Some(value) = file.session_backend {
            settings.session_backend = value;
        }
        if let Some(value) = file.session_ttl_hours {
            settings.session_ttl_hours = value;
        }
        if let Some(value) = file.allowed_origins {
            settings.allowed_origins = value;
        }
        Ok(settings)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup(MODEL_PATH_VAR).filter(|v| !v.trim().is_empty()) {
            self.model_path = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup(DB_PATH_VAR).filter(|v| !v.trim().is_empty()) {
            self.database_path = PathBuf::from(value);
        }
        if let Some(value) = lookup(BIND_VAR).filter(|v| !v.trim().is_empty()) {
            self.bind_addr = value;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.session_ttl_hours <= 0 {
            bail!("session_ttl_hours must be positive");
        }
        if self.environment == Environment::Production && self.allowed_origins.is_empty() {
            bail!("allowed_origins must be configured in production");
        }
        self.labels()?;
        Ok(())
    }

    pub fn labels(&self) -> Result<LabelMap> {
        match &self.label_map {
            Some(names) => LabelMap::from_names(names),
            None => Ok(LabelMap::default()),
        }
    }

    pub fn origin_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.is_empty()
            || self
                .allowed_origins
                .iter()
                .any(|allowed| allowed.trim_end_matches('/') == origin.trim_end_matches('/'))
    }
}
