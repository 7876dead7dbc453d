//! A small built-in table of well-known cities.
//!
//! Serves as an offline geocoder and as the list of multi-word names the rule
//! classifier recognises regardless of capitalisation.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::{error::AgentError, model::Coordinate, provider::GeocodingProvider};

const CITIES: &[(&str, f64, f64)] = &[
    // Spain
    ("malaga", 36.7213, -4.4213),
    ("madrid", 40.4168, -3.7038),
    ("barcelona", 41.3851, 2.1734),
    ("valencia", 39.4699, -0.3763),
    ("seville", 37.3891, -5.9845),
    ("fuengirola", 36.5393, -4.6249),
    ("marbella", 36.5100, -4.8861),
    // Europe
    ("london", 51.5074, -0.1278),
    ("paris", 48.8566, 2.3522),
    ("berlin", 52.5200, 13.4050),
    ("rome", 41.9028, 12.4964),
    ("amsterdam", 52.3676, 4.9041),
    ("lisbon", 38.7223, -9.1393),
    // Americas
    ("new york", 40.7128, -74.0060),
    ("los angeles", 34.0522, -118.2437),
    ("chicago", 41.8781, -87.6298),
    ("toronto", 43.6532, -79.3832),
    ("mexico city", 19.4326, -99.1332),
    ("buenos aires", -34.6037, -58.3816),
    // Asia & Oceania
    ("tokyo", 35.6762, 139.6503),
    ("beijing", 39.9042, 116.4074),
    ("sydney", -33.8688, 151.2093),
    ("singapore", 1.3521, 103.8198),
    ("dubai", 25.2048, 55.2708),
];

/// Lower-cased city name → coordinate lookup table.
#[derive(Debug, Clone, Default)]
pub struct Gazetteer {
    entries: HashMap<String, Coordinate>,
}

impl Gazetteer {
    /// The built-in city table.
    pub fn builtin() -> Self {
        CITIES
            .iter()
            .map(|&(name, latitude, longitude)| {
                (
                    name,
                    Coordinate {
                        latitude,
                        longitude,
                    },
                )
            })
            .collect()
    }

    pub fn insert(&mut self, name: &str, coordinate: Coordinate) {
        self.entries.insert(name.trim().to_lowercase(), coordinate);
    }

    pub fn get(&self, name: &str) -> Option<Coordinate> {
        self.entries.get(&name.trim().to_lowercase()).copied()
    }

    /// Known names, lower-cased, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl<'a> FromIterator<(&'a str, Coordinate)> for Gazetteer {
    fn from_iter<I: IntoIterator<Item = (&'a str, Coordinate)>>(iter: I) -> Self {
        let mut gazetteer = Gazetteer::default();
        for (name, coordinate) in iter {
            gazetteer.insert(name, coordinate);
        }
        gazetteer
    }
}

#[async_trait]
impl GeocodingProvider for Gazetteer {
    async fn lookup(&self, name: &str) -> Result<Option<Coordinate>, AgentError> {
        Ok(self.get(name))
    }
}
