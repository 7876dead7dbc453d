use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::{
    error::{AgentError, ErrorKind},
    model::{Coordinate, Observation},
};

use super::{GeocodingProvider, WeatherProvider, truncate_body};

const CURRENT_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
const GEOCODE_URL: &str = "https://api.openweathermap.org/geo/1.0/direct";

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            http: Client::new(),
        }
    }

    async fn fetch_current(&self, at: Coordinate) -> Result<Observation, AgentError> {
        let lat = at.latitude.to_string();
        let lon = at.longitude.to_string();

        let res = self
            .http
            .get(CURRENT_URL)
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await
            .map_err(|e| AgentError::from_transport("OpenWeather", &e))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| AgentError::from_transport("OpenWeather", &e))?;

        decode_current(status, &body)
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
}

#[derive(Debug, Deserialize)]
struct OwPlace {
    lat: f64,
    lon: f64,
}

fn check_status(status: StatusCode, body: &str, what: &str) -> Result<(), AgentError> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::NOT_FOUND => Err(AgentError::new(
            ErrorKind::CityNotFound,
            format!("OpenWeather {what}: no matching location"),
        )),
        StatusCode::UNAUTHORIZED => Err(AgentError::provider(format!(
            "OpenWeather {what}: API key rejected"
        ))),
        s => Err(AgentError::provider(format!(
            "OpenWeather {what} request failed with status {s}: {}",
            truncate_body(body),
        ))),
    }
}

pub(crate) fn decode_current(status: StatusCode, body: &str) -> Result<Observation, AgentError> {
    check_status(status, body, "current weather")?;

    let parsed: OwCurrentResponse = serde_json::from_str(body).map_err(|e| {
        AgentError::provider(format!("Failed to parse OpenWeather current JSON: {e}"))
    })?;

    let observation_time = DateTime::<Utc>::from_timestamp(parsed.dt, 0).unwrap_or_else(Utc::now);

    let condition = parsed
        .weather
        .first()
        .map(|w| w.description.clone())
        .unwrap_or_else(|| "Unknown".to_string());

    Ok(Observation {
        provider: "openweather".to_string(),
        location_name: parsed.name,
        temperature_c: parsed.main.temp,
        feels_like_c: parsed.main.feels_like,
        condition,
        humidity_pct: parsed.main.humidity,
        wind_speed_mps: parsed.wind.speed,
        observation_time,
    })
}

pub(crate) fn decode_places(
    status: StatusCode,
    body: &str,
) -> Result<Option<Coordinate>, AgentError> {
    check_status(status, body, "geocoding")?;

    let places: Vec<OwPlace> = serde_json::from_str(body).map_err(|e| {
        AgentError::provider(format!("Failed to parse OpenWeather geocoding JSON: {e}"))
    })?;

    places
        .first()
        .map(|p| Coordinate::new(p.lat, p.lon))
        .transpose()
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn current(&self, at: Coordinate) -> Result<Observation, AgentError> {
        self.fetch_current(at).await
    }
}

/// OpenWeather direct geocoding (`/geo/1.0/direct`).
#[derive(Debug, Clone)]
pub struct OpenWeatherGeocoder {
    api_key: String,
    http: Client,
}

impl OpenWeatherGeocoder {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            http: Client::new(),
        }
    }
}

#[async_trait]
impl GeocodingProvider for OpenWeatherGeocoder {
    async fn lookup(&self, name: &str) -> Result<Option<Coordinate>, AgentError> {
        let res = self
            .http
            .get(GEOCODE_URL)
            .query(&[("q", name), ("limit", "1"), ("appid", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| AgentError::from_transport("OpenWeather geocoding", &e))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| AgentError::from_transport("OpenWeather geocoding", &e))?;

        match decode_places(status, &body) {
            Err(err) if err.kind == ErrorKind::CityNotFound => Ok(None),
            other => other,
        }
    }
}
