use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::debug;

use crate::{
    model::Units,
    provider::{GeocoderId, ProviderId},
};

/// Default lifetime of a geocode cache entry.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60 * 60;
/// Default number of cities kept in the geocode cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;
/// Default per-call timeout for external lookups.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
/// Starting point for distance questions that name a single city.
pub const DEFAULT_ORIGIN: &str = "Malaga";

/// Configuration for a single provider (e.g., API key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,
}

/// Geocode cache sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Top-level configuration, stored on disk and overlaid by the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Optional weather provider id, e.g. "openweather" or "weatherapi".
    pub default_provider: Option<String>,

    /// Example TOML:
    /// [providers.openweather]
    /// api_key = "..."
    pub providers: HashMap<String, ProviderConfig>,

    /// Geocoding backend: "openweather", "openmeteo" or "builtin".
    pub geocoder: Option<String>,
    pub geocoder_api_key: Option<String>,

    /// Starting point for distance questions that name a single city.
    /// An empty string in the file disables it.
    pub default_origin: Option<String>,

    pub units: Units,
    pub request_timeout_secs: u64,
    pub cache: CacheConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_provider: None,
            providers: HashMap::new(),
            geocoder: None,
            geocoder_api_key: None,
            default_origin: Some(DEFAULT_ORIGIN.to_string()),
            units: Units::default(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            cache: CacheConfig::default(),
        }
    }
}

impl Config {
    /// Return the weather provider as a strongly-typed ProviderId.
    /// Falls back to OpenWeather when nothing is configured.
    pub fn default_provider_id(&self) -> Result<ProviderId> {
        match self.default_provider.as_deref() {
            Some(s) => ProviderId::try_from(s),
            None => Ok(ProviderId::OpenWeather),
        }
    }

    /// Store default provider as string.
    pub fn set_default_provider(&mut self, id: ProviderId) {
        self.default_provider = Some(id.as_str().to_string());
    }

    /// Load config from disk and overlay the process environment.
    pub fn load() -> Result<Self> {
        let mut cfg = Self::load_file(&Self::config_file_path()?)?;
        cfg.apply_env(|key| std::env::var(key).ok())?;
        debug!(
            provider = ?cfg.default_provider_id().ok(),
            geocoder = ?cfg.geocoder_id().ok(),
            cache_ttl_secs = cfg.cache.ttl_secs,
            cache_capacity = cfg.cache.capacity,
            "configuration loaded"
        );
        Ok(cfg)
    }

    /// Load config from a TOML file, or return defaults if it doesn't exist yet.
    pub fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "travel-assistant", "travel-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Overlay values from an environment-like lookup. Empty values count as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(provider) = get("WEATHER_PROVIDER") {
            let id = ProviderId::try_from(provider.as_str()).context("Invalid WEATHER_PROVIDER")?;
            self.set_default_provider(id);
        }

        if let Some(key) = get("OPENWEATHER_API_KEY") {
            self.providers.insert(
                ProviderId::OpenWeather.as_str().to_string(),
                ProviderConfig { api_key: key },
            );
        }

        if let Some(key) = get("WEATHER_API_KEY") {
            let id = self.default_provider_id()?;
            self.providers.insert(id.as_str().to_string(), ProviderConfig { api_key: key });
        }

        if let Some(geocoder) = get("GEOCODER") {
            GeocoderId::try_from(geocoder.as_str()).context("Invalid GEOCODER")?;
            self.geocoder = Some(geocoder);
        }

        if let Some(key) = get("GEOCODER_API_KEY") {
            self.geocoder_api_key = Some(key);
        }

        if let Some(origin) = get("DEFAULT_ORIGIN") {
            self.default_origin = Some(origin);
        }

        if let Some(units) = get("WEATHER_UNITS") {
            self.units = Units::try_from(units.as_str()).context("Invalid WEATHER_UNITS")?;
        }

        if let Some(secs) = get("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_positive(&secs, "REQUEST_TIMEOUT_SECS")?;
        }

        if let Some(secs) = get("GEOCODE_CACHE_TTL_SECS") {
            self.cache.ttl_secs = parse_positive(&secs, "GEOCODE_CACHE_TTL_SECS")?;
        }

        if let Some(capacity) = get("GEOCODE_CACHE_CAPACITY") {
            self.cache.capacity = parse_positive(&capacity, "GEOCODE_CACHE_CAPACITY")?;
        }

        Ok(())
    }

    /// Convenience helper: set/replace a provider API key and optionally set default provider.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        self.providers.insert(provider_id.as_str().to_string(), ProviderConfig { api_key });

        if self.default_provider.is_none() {
            self.default_provider = Some(provider_id.to_string());
        }
    }

    /// Returns API key for a provider, if present.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.providers.get(provider_id.as_str()).map(|cfg| cfg.api_key.as_str())
    }

    /// The selected weather provider and its key. Missing key is a startup error.
    pub fn weather_credentials(&self) -> Result<(ProviderId, &str)> {
        let id = self.default_provider_id()?;
        let key = self.provider_api_key(id).ok_or_else(|| {
            anyhow!(
                "No API key configured for weather provider '{id}'.\n\
                 Hint: set WEATHER_API_KEY (environment or .env file) \
                 or run `travel configure {id}`."
            )
        })?;
        Ok((id, key))
    }

    /// Geocoder backend: explicit choice, else OpenWeather when a geocoder key
    /// is present, else the key-less Open-Meteo service.
    pub fn geocoder_id(&self) -> Result<GeocoderId> {
        match self.geocoder.as_deref() {
            Some(s) => GeocoderId::try_from(s),
            None if self.geocoder_api_key.is_some() => Ok(GeocoderId::OpenWeather),
            None => Ok(GeocoderId::OpenMeteo),
        }
    }

    /// Key for the OpenWeather geocoder; reuses the OpenWeather weather key if needed.
    pub fn geocoder_key(&self) -> Option<&str> {
        self.geocoder_api_key
            .as_deref()
            .or_else(|| self.provider_api_key(ProviderId::OpenWeather))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }
}

/// Load a key=value file into the process environment.
///
/// An explicit path must exist; otherwise a `.env` in the working directory
/// is loaded if present. Variables already set in the environment win.
pub fn load_env_file(path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("Failed to load env file: {}", path.display()))?;
        }
        None => match dotenvy::dotenv() {
            Ok(_) => {}
            Err(err) if err.not_found() => {}
            Err(err) => return Err(err).context("Failed to load .env file"),
        },
    }
    Ok(())
}

fn parse_positive<T>(value: &str, name: &str) -> Result<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let parsed = value
        .parse::<T>()
        .map_err(|_| anyhow!("Invalid {name}: '{value}' is not a number"))?;
    if parsed <= T::default() {
        return Err(anyhow!("Invalid {name}: must be greater than zero"));
    }
    Ok(parsed)
}
