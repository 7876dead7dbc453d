//! Open-Meteo geocoding. Needs no API key.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::{error::AgentError, model::Coordinate};

use super::{GeocodingProvider, truncate_body};

const SEARCH_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";

#[derive(Debug, Clone, Default)]
pub struct OpenMeteoGeocoder {
    http: Client,
}

impl OpenMeteoGeocoder {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Option<Vec<SearchResult>>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    latitude: f64,
    longitude: f64,
}

pub(crate) fn decode_search(
    status: StatusCode,
    body: &str,
) -> Result<Option<Coordinate>, AgentError> {
    if !status.is_success() {
        return Err(AgentError::provider(format!(
            "Open-Meteo geocoding failed with status {status}: {}",
            truncate_body(body)
        )));
    }

    let parsed: SearchResponse = serde_json::from_str(body).map_err(|e| {
        AgentError::provider(format!("Failed to parse Open-Meteo geocoding response: {e}"))
    })?;

    parsed
        .results
        .unwrap_or_default()
        .first()
        .map(|r| Coordinate::new(r.latitude, r.longitude))
        .transpose()
}

#[async_trait]
impl GeocodingProvider for OpenMeteoGeocoder {
    async fn lookup(&self, name: &str) -> Result<Option<Coordinate>, AgentError> {
        let res = self
            .http
            .get(SEARCH_URL)
            .query(&[("name", name), ("count", "1"), ("language", "en"), ("format", "json")])
            .send()
            .await
            .map_err(|e| AgentError::from_transport("Open-Meteo geocoding", &e))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| AgentError::from_transport("Open-Meteo geocoding", &e))?;

        decode_search(status, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn first_result_wins() {
        let body = r#"{"results":[
            {"name":"Barcelona","latitude":41.38879,"longitude":2.15899,"country":"Spain"},
            {"name":"Barcelona","latitude":10.13625,"longitude":-64.68618,"country":"Venezuela"}
        ]}"#;
        let coord = decode_search(StatusCode::OK, body).unwrap().unwrap();
        assert_eq!(coord.latitude, 41.38879);
    }

    #[test]
    fn missing_results_is_no_match() {
        assert_eq!(decode_search(StatusCode::OK, r#"{"generationtime_ms":0.3}"#).unwrap(), None);
        assert_eq!(decode_search(StatusCode::OK, r#"{"results":[]}"#).unwrap(), None);
    }

    #[test]
    fn non_success_is_provider_error() {
        let err = decode_search(StatusCode::INTERNAL_SERVER_ERROR, "oops").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ProviderError);
    }
}
