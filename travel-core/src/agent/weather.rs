use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::{
    config::DEFAULT_REQUEST_TIMEOUT_SECS,
    error::AgentError,
    geocoder::Geocoder,
    model::{CityReference, Observation, Units, WeatherReport},
    provider::WeatherProvider,
};

use super::{Handler, Outcome, Params};

/// Current weather for a named city.
pub struct WeatherAgent {
    geocoder: Arc<Geocoder>,
    provider: Arc<dyn WeatherProvider>,
    units: Units,
    timeout: Duration,
}

impl WeatherAgent {
    pub fn new(geocoder: Arc<Geocoder>, provider: Arc<dyn WeatherProvider>) -> Self {
        Self {
            geocoder,
            provider,
            units: Units::default(),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    #[must_use]
    pub fn with_units(mut self, units: Units) -> Self {
        self.units = units;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[instrument(name = "weather", skip(self))]
    pub async fn fetch(&self, city: &str) -> Result<WeatherReport, AgentError> {
        let coordinate = self.geocoder.resolve(city).await?;

        let observation = tokio::time::timeout(self.timeout, self.provider.current(coordinate))
            .await
            .map_err(|_| {
                AgentError::network(format!("weather lookup timed out after {:?}", self.timeout))
            })
            .and_then(|r| r)
            .map_err(|e| e.for_city(city))?;

        debug!(
            provider = %observation.provider,
            location = %observation.location_name,
            "weather fetched"
        );
        Ok(normalize(CityReference::resolved(city, coordinate), observation, self.units))
    }
}

fn normalize(city: CityReference, obs: Observation, units: Units) -> WeatherReport {
    WeatherReport {
        city,
        provider: obs.provider,
        temperature_c: obs.temperature_c,
        temperature_f: celsius_to_fahrenheit(obs.temperature_c),
        feels_like_c: obs.feels_like_c,
        condition: obs.condition.trim().to_string(),
        humidity_pct: obs.humidity_pct.min(100),
        wind_speed_mps: obs.wind_speed_mps.max(0.0),
        units,
        observed_at: obs.observation_time,
    }
}

/// °C → °F, rounded to one decimal.
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    ((celsius * 9.0 / 5.0 + 32.0) * 10.0).round() / 10.0
}

#[async_trait]
impl Handler for WeatherAgent {
    fn name(&self) -> &'static str {
        "weather"
    }

    async fn invoke(&self, params: Params) -> Result<Outcome, AgentError> {
        match params {
            Params::Weather { city } => self.fetch(&city).await.map(Outcome::Weather),
            other => Err(AgentError::internal(format!(
                "weather handler cannot serve {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ErrorKind, gazetteer::Gazetteer, model::Coordinate};
    use chrono::{TimeZone, Utc};

    #[derive(Debug)]
    struct FixedWeather {
        fail: Option<AgentError>,
        delay: Duration,
    }

    #[async_trait]
    impl WeatherProvider for FixedWeather {
        async fn current(&self, _at: Coordinate) -> Result<Observation, AgentError> {
            tokio::time::sleep(self.delay).await;
            if let Some(err) = &self.fail {
                return Err(err.clone());
            }
            Ok(Observation {
                provider: "fixed".into(),
                location_name: "London, GB".into(),
                temperature_c: 11.5,
                feels_like_c: 10.0,
                condition: " light rain ".into(),
                humidity_pct: 81,
                wind_speed_mps: 4.6,
                observation_time: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            })
        }
    }

    fn agent(fail: Option<AgentError>, delay: Duration) -> WeatherAgent {
        let geocoder = Arc::new(Geocoder::new(Arc::new(Gazetteer::builtin())));
        WeatherAgent::new(geocoder, Arc::new(FixedWeather { fail, delay }))
    }

    #[test]
    fn fahrenheit_conversion() {
        assert_eq!(celsius_to_fahrenheit(0.0), 32.0);
        assert_eq!(celsius_to_fahrenheit(100.0), 212.0);
        assert_eq!(celsius_to_fahrenheit(11.5), 52.7);
        assert_eq!(celsius_to_fahrenheit(-40.0), -40.0);
    }

    #[tokio::test]
    async fn fetch_normalizes_report() {
        let report = agent(None, Duration::ZERO)
            .with_units(Units::Imperial)
            .fetch("London")
            .await
            .unwrap();

        assert_eq!(report.city.name, "London");
        assert!(report.city.coordinate.is_some());
        assert_eq!(report.temperature_f, 52.7);
        assert_eq!(report.condition, "light rain");
        assert_eq!(report.units, Units::Imperial);
    }

    #[tokio::test]
    async fn unknown_city_never_reaches_provider() {
        let err = agent(Some(AgentError::internal("must not be called")), Duration::ZERO)
            .fetch("Atlantis")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::CityNotFound);
        assert_eq!(err.city.as_deref(), Some("Atlantis"));
    }

    #[tokio::test]
    async fn provider_errors_are_tagged_with_city() {
        let err = agent(Some(AgentError::provider("status 500")), Duration::ZERO)
            .fetch("Paris")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ProviderError);
        assert_eq!(err.city.as_deref(), Some("Paris"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out() {
        let err = agent(None, Duration::from_secs(30))
            .with_timeout(Duration::from_secs(2))
            .fetch("Paris")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NetworkError);
    }

    #[tokio::test]
    async fn rejects_foreign_params() {
        let err = agent(None, Duration::ZERO)
            .invoke(Params::Distance {
                from: "a".into(),
                to: "b".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InternalError);
    }
}
