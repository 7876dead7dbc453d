use crate::{
    Config,
    error::AgentError,
    gazetteer::Gazetteer,
    model::{Coordinate, Observation},
    provider::{
        openmeteo::OpenMeteoGeocoder,
        openweather::{OpenWeatherGeocoder, OpenWeatherProvider},
        weatherapi::WeatherApiProvider,
    },
};
use async_trait::async_trait;
use std::{convert::TryFrom, fmt::Debug, sync::Arc};

pub mod openmeteo;
pub mod openweather;
pub mod weatherapi;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenWeather,
    WeatherApi,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenWeather => "openweather",
            ProviderId::WeatherApi => "weatherapi",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::OpenWeather, ProviderId::WeatherApi]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "openweather" => Ok(ProviderId::OpenWeather),
            "weatherapi" => Ok(ProviderId::WeatherApi),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: openweather, weatherapi."
            )),
        }
    }
}

/// Backend used to turn city names into coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeocoderId {
    OpenWeather,
    OpenMeteo,
    Builtin,
}

impl GeocoderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeocoderId::OpenWeather => "openweather",
            GeocoderId::OpenMeteo => "openmeteo",
            GeocoderId::Builtin => "builtin",
        }
    }
}

impl std::fmt::Display for GeocoderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for GeocoderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "openweather" => Ok(GeocoderId::OpenWeather),
            "openmeteo" | "open-meteo" => Ok(GeocoderId::OpenMeteo),
            "builtin" | "offline" => Ok(GeocoderId::Builtin),
            _ => Err(anyhow::anyhow!(
                "Unknown geocoder '{value}'. Supported geocoders: openweather, openmeteo, builtin."
            )),
        }
    }
}

/// Current-conditions lookup for a coordinate.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn current(&self, at: Coordinate) -> Result<Observation, AgentError>;
}

/// Forward geocoding. `Ok(None)` means the provider knows no such place.
#[async_trait]
pub trait GeocodingProvider: Send + Sync + Debug {
    async fn lookup(&self, name: &str) -> Result<Option<Coordinate>, AgentError>;
}

/// Construct a weather provider from config and explicit ProviderId.
pub fn provider_from_config(
    id: ProviderId,
    config: &Config,
) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let api_key = config.provider_api_key(id).ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured for provider '{id}'.\n\
                 Hint: set WEATHER_API_KEY or run `travel configure {id}` and enter your API key."
        )
    })?;

    let provider: Arc<dyn WeatherProvider> = match id {
        ProviderId::OpenWeather => Arc::new(OpenWeatherProvider::new(api_key.to_owned())),
        ProviderId::WeatherApi => Arc::new(WeatherApiProvider::new(api_key.to_owned())),
    };

    Ok(provider)
}

/// Construct the selected weather provider, failing if its key is missing.
pub fn default_provider_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let (id, _) = config.weather_credentials()?;
    provider_from_config(id, config)
}

/// Construct the geocoding backend selected by config.
pub fn geocoder_from_config(config: &Config) -> anyhow::Result<Arc<dyn GeocodingProvider>> {
    let provider: Arc<dyn GeocodingProvider> = match config.geocoder_id()? {
        GeocoderId::OpenWeather => {
            let key = config.geocoder_key().ok_or_else(|| {
                anyhow::anyhow!(
                    "The openweather geocoder needs an API key.\n\
                     Hint: set GEOCODER_API_KEY, or GEOCODER=openmeteo for the key-less service."
                )
            })?;
            Arc::new(OpenWeatherGeocoder::new(key.to_owned()))
        }
        GeocoderId::OpenMeteo => Arc::new(OpenMeteoGeocoder::new()),
        GeocoderId::Builtin => Arc::new(Gazetteer::builtin()),
    };
    Ok(provider)
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
