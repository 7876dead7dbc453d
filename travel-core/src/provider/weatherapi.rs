use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::{
    error::{AgentError, ErrorKind},
    model::{Coordinate, Observation},
};

use super::{WeatherProvider, truncate_body};

const CURRENT_URL: &str = "http://api.weatherapi.com/v1/current.json";

/// WeatherAPI.com code for "No matching location found".
const NO_MATCHING_LOCATION: u32 = 1006;

#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    api_key: String,
    http: Client,
}

impl WeatherApiProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            http: Client::new(),
        }
    }

    async fn fetch_current(&self, at: Coordinate) -> Result<Observation, AgentError> {
        let q = format!("{},{}", at.latitude, at.longitude);

        let res = self
            .http
            .get(CURRENT_URL)
            .query(&[("key", self.api_key.as_str()), ("q", q.as_str())])
            .send()
            .await
            .map_err(|e| AgentError::from_transport("WeatherAPI", &e))?;

        let status = res.status();
        let body = res.text().await.map_err(|e| AgentError::from_transport("WeatherAPI", &e))?;

        decode_current(status, &body)
    }
}

#[derive(Debug, Deserialize)]
struct WaLocation {
    name: String,
    country: String,
    localtime_epoch: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    temp_c: f64,
    feelslike_c: f64,
    humidity: u8,
    wind_kph: f64,
    condition: WaCondition,
    last_updated_epoch: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WaResponse {
    location: WaLocation,
    current: WaCurrent,
}

#[derive(Debug, Deserialize)]
struct WaErrorBody {
    error: WaErrorDetail,
}

#[derive(Debug, Deserialize)]
struct WaErrorDetail {
    code: u32,
    message: String,
}

pub(crate) fn decode_current(status: StatusCode, body: &str) -> Result<Observation, AgentError> {
    if !status.is_success() {
        return Err(match serde_json::from_str::<WaErrorBody>(body) {
            Ok(e) if e.error.code == NO_MATCHING_LOCATION => {
                AgentError::new(ErrorKind::CityNotFound, e.error.message)
            }
            Ok(e) => AgentError::provider(format!(
                "WeatherAPI request failed with status {status}: {} (code {})",
                e.error.message, e.error.code
            )),
            Err(_) => AgentError::provider(format!(
                "WeatherAPI request failed with status {status}: {}",
                truncate_body(body),
            )),
        });
    }

    let parsed: WaResponse = serde_json::from_str(body).map_err(|e| {
        AgentError::provider(format!("Failed to parse WeatherAPI current JSON: {e}"))
    })?;

    let ts = parsed.current.last_updated_epoch.or(parsed.location.localtime_epoch);
    let observation_time =
        ts.and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)).unwrap_or_else(Utc::now);

    let location_name = format!("{}, {}", parsed.location.name, parsed.location.country);
    let wind_speed_mps = parsed.current.wind_kph / 3.6;

    Ok(Observation {
        provider: "weatherapi".to_string(),
        location_name,
        temperature_c: parsed.current.temp_c,
        feels_like_c: parsed.current.feelslike_c,
        condition: parsed.current.condition.text,
        humidity_pct: parsed.current.humidity,
        wind_speed_mps,
        observation_time,
    })
}

#[async_trait]
impl WeatherProvider for WeatherApiProvider {
    async fn current(&self, at: Coordinate) -> Result<Observation, AgentError> {
        self.fetch_current(at).await
    }
}
