//! Error taxonomy shared by the geocoder, the agents and the coordinator.

use std::fmt;

use thiserror::Error;

/// Category of a branch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    CityNotFound,
    NetworkError,
    ProviderError,
    AmbiguousQuery,
    InternalError,
}

impl ErrorKind {
    /// Short human-readable label used in composed answers.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::CityNotFound => "city not found",
            ErrorKind::NetworkError => "network error",
            ErrorKind::ProviderError => "provider error",
            ErrorKind::AmbiguousQuery => "ambiguous query",
            ErrorKind::InternalError => "internal error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A typed failure of one branch of a query.
///
/// `Clone` because a single coalesced geocoding outcome is handed to every
/// caller waiting on the same city.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind}: {message}")]
pub struct AgentError {
    pub kind: ErrorKind,
    pub message: String,
    /// The city the failure relates to, if any.
    pub city: Option<String>,
}

impl AgentError {
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
            city: None,
        }
    }

    pub fn city_not_found<S: Into<String>>(city: S) -> Self {
        let city = city.into();
        Self {
            kind: ErrorKind::CityNotFound,
            message: format!("no match for '{city}'"),
            city: Some(city),
        }
    }

    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::NetworkError, message)
    }

    pub fn provider<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::ProviderError, message)
    }

    pub fn ambiguous<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::AmbiguousQuery, message)
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::InternalError, message)
    }

    /// Tag the error with the city it concerns, keeping an existing tag.
    #[must_use]
    pub fn for_city<S: Into<String>>(mut self, city: S) -> Self {
        if self.city.is_none() {
            self.city = Some(city.into());
        }
        self
    }

    /// Map a transport-level failure from `reqwest`.
    pub fn from_transport(provider: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network(format!("{provider} request timed out"))
        } else {
            Self::network(format!("{provider} request failed: {err}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn city_not_found_is_tagged_with_city() {
        let err = AgentError::city_not_found("Atlantis");
        assert_eq!(err.kind, ErrorKind::CityNotFound);
        assert_eq!(err.city.as_deref(), Some("Atlantis"));
        assert!(err.to_string().contains("city not found"));
    }

    #[test]
    fn for_city_does_not_overwrite_existing_tag() {
        let err = AgentError::city_not_found("Atlantis").for_city("Madrid");
        assert_eq!(err.city.as_deref(), Some("Atlantis"));

        let err = AgentError::network("timed out").for_city("Madrid");
        assert_eq!(err.city.as_deref(), Some("Madrid"));
    }
}
