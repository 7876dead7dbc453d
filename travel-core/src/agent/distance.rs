use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::{
    error::AgentError,
    geocoder::Geocoder,
    model::{CityReference, Coordinate, DistanceResult},
};

use super::{Handler, Outcome, Params};

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;
pub const MILES_PER_KM: f64 = 0.621371;

/// Great-circle distance between two named cities.
pub struct DistanceAgent {
    geocoder: Arc<Geocoder>,
}

impl DistanceAgent {
    pub fn new(geocoder: Arc<Geocoder>) -> Self {
        Self { geocoder }
    }

    #[instrument(name = "distance", skip(self))]
    pub async fn compute(&self, city_a: &str, city_b: &str) -> Result<DistanceResult, AgentError> {
        let (a, b) = tokio::join!(self.geocoder.resolve(city_a), self.geocoder.resolve(city_b));
        let a = a.map_err(|e| e.for_city(city_a))?;
        let b = b.map_err(|e| e.for_city(city_b))?;

        let kilometers = haversine_km(a, b);
        debug!(kilometers, "distance computed");

        Ok(DistanceResult {
            from: CityReference::resolved(city_a, a),
            to: CityReference::resolved(city_b, b),
            kilometers,
            miles: kilometers * MILES_PER_KM,
        })
    }
}

/// Haversine great-circle distance in kilometres.
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // Rounding can push h just past 1 for antipodal points.
    2.0 * EARTH_RADIUS_KM * h.clamp(0.0, 1.0).sqrt().asin()
}

#[async_trait]
impl Handler for DistanceAgent {
    fn name(&self) -> &'static str {
        "distance"
    }

    async fn invoke(&self, params: Params) -> Result<Outcome, AgentError> {
        match params {
            Params::Distance { from, to } => self.compute(&from, &to).await.map(Outcome::Distance),
            other => Err(AgentError::internal(format!(
                "distance handler cannot serve {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ErrorKind, gazetteer::Gazetteer};
    use std::f64::consts::PI;

    fn coord(latitude: f64, longitude: f64) -> Coordinate {
        Coordinate {
            latitude,
            longitude,
        }
    }

    fn agent() -> DistanceAgent {
        DistanceAgent::new(Arc::new(Geocoder::new(Arc::new(Gazetteer::builtin()))))
    }

    #[test]
    fn identical_points_are_zero_apart() {
        for c in [coord(40.4168, -3.7038), coord(-90.0, 0.0), coord(0.0, 180.0)] {
            assert!(haversine_km(c, c).abs() < 1e-6);
        }
    }

    #[test]
    fn antipodal_points_are_half_the_circumference() {
        // asin is ill-conditioned near 1, so allow a metre of slack.
        let expected = PI * EARTH_RADIUS_KM;
        for (a, b) in [
            (coord(0.0, 0.0), coord(0.0, 180.0)),
            (coord(45.0, 10.0), coord(-45.0, -170.0)),
            (coord(90.0, 0.0), coord(-90.0, 0.0)),
        ] {
            let d = haversine_km(a, b);
            assert!(!d.is_nan());
            assert!((d - expected).abs() < 1e-3, "got {d}");
        }
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            (coord(40.4168, -3.7038), coord(41.3851, 2.1734)),
            (coord(35.6762, 139.6503), coord(40.7128, -74.0060)),
            (coord(-33.8688, 151.2093), coord(51.5074, -0.1278)),
        ];
        for (a, b) in pairs {
            assert!((haversine_km(a, b) - haversine_km(b, a)).abs() < 1e-9);
        }
    }

    #[tokio::test]
    async fn madrid_to_barcelona() {
        let result = agent().compute("Madrid", "Barcelona").await.unwrap();
        assert!((result.kilometers - 504.0).abs() <= 5.0, "got {}", result.kilometers);
        assert!((result.miles - result.kilometers * MILES_PER_KM).abs() < 1e-9);
        assert_eq!(result.from.name, "Madrid");
        assert_eq!(result.to.name, "Barcelona");
    }

    #[tokio::test]
    async fn same_city_is_zero() {
        let result = agent().compute("London", "london").await.unwrap();
        assert!(result.kilometers.abs() < 1e-6);
    }

    #[tokio::test]
    async fn failing_city_is_named() {
        let err = agent().compute("Madrid", "Atlantis").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::CityNotFound);
        assert_eq!(err.city.as_deref(), Some("Atlantis"));

        let err = agent().compute("Atlantis", "Madrid").await.unwrap_err();
        assert_eq!(err.city.as_deref(), Some("Atlantis"));
    }
}
