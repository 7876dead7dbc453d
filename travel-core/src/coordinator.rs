//! Query routing: classify, dispatch to handlers, compose.
//!
//! Every branch a query needs is spawned as its own task before any is
//! awaited, so branches run concurrently and a failure or panic in one is
//! recorded without touching the other.

use std::{num::NonZeroUsize, sync::Arc};

use anyhow::Context;
use tracing::{error, info, instrument, warn};

use crate::{
    Config,
    agent::{Capability, DistanceAgent, HandlerRegistry, Outcome, Params, WeatherAgent},
    classifier::{Classification, QueryClassifier, RuleClassifier},
    composer::{self, CLARIFICATION},
    error::AgentError,
    geocoder::Geocoder,
    model::Intent,
    provider::{
        GeocodingProvider, WeatherProvider, default_provider_from_config, geocoder_from_config,
    },
};

/// The final answer to one query plus what it took to produce it.
#[derive(Debug, Clone)]
pub struct ComposedResponse {
    pub text: String,
    pub intent: Intent,
    /// Branches that produced a result.
    pub succeeded: usize,
    pub errors: Vec<AgentError>,
}

impl ComposedResponse {
    /// At least one requested branch produced a result.
    pub fn is_success(&self) -> bool {
        self.succeeded > 0
    }
}

pub struct CoordinatorAgent {
    classifier: Arc<dyn QueryClassifier>,
    handlers: HandlerRegistry,
}

impl CoordinatorAgent {
    pub fn new(classifier: Arc<dyn QueryClassifier>, handlers: HandlerRegistry) -> Self {
        Self {
            classifier,
            handlers,
        }
    }

    /// Wire the providers selected by `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let weather = default_provider_from_config(config)?;
        let geocoding = geocoder_from_config(config)?;
        Self::assemble(config, weather, geocoding)
    }

    /// Wire agents around explicit providers, sharing one geocoder cache.
    pub fn assemble(
        config: &Config,
        weather: Arc<dyn WeatherProvider>,
        geocoding: Arc<dyn GeocodingProvider>,
    ) -> anyhow::Result<Self> {
        let capacity = NonZeroUsize::new(config.cache.capacity)
            .context("Geocode cache capacity must be greater than zero")?;
        let geocoder = Arc::new(
            Geocoder::with_limits(geocoding, capacity, config.cache_ttl())
                .with_timeout(config.request_timeout()),
        );

        let weather_agent = WeatherAgent::new(geocoder.clone(), weather)
            .with_units(config.units)
            .with_timeout(config.request_timeout());
        let distance_agent = DistanceAgent::new(geocoder);

        let handlers = HandlerRegistry::new()
            .register(Capability::Weather, Arc::new(weather_agent))
            .register(Capability::Distance, Arc::new(distance_agent));

        let classifier =
            RuleClassifier::default().with_default_origin(config.default_origin.clone());

        Ok(Self::new(Arc::new(classifier), handlers))
    }

    #[instrument(name = "query", skip(self))]
    pub async fn handle(&self, query: &str) -> ComposedResponse {
        let classification = self.classifier.classify(query);
        let intent = classification.intent;
        info!(%intent, "dispatching query");

        if intent == Intent::Unknown {
            return ComposedResponse {
                text: CLARIFICATION.to_string(),
                intent,
                succeeded: 0,
                errors: vec![AgentError::ambiguous(
                    "could not determine a weather or distance request with its cities",
                )],
            };
        }

        let mut errors = Vec::new();
        let mut branches = Vec::new();

        for &capability in intent.capabilities() {
            let Some(params) = params_for(capability, &classification) else {
                errors.push(AgentError::ambiguous(format!(
                    "not enough cities for a {capability} request"
                )));
                continue;
            };
            let Some(handler) = self.handlers.get(capability) else {
                errors.push(AgentError::internal(format!(
                    "no handler registered for {capability}"
                )));
                continue;
            };
            let task = tokio::spawn(async move { handler.invoke(params).await });
            branches.push((capability, task));
        }

        let mut weather = None;
        let mut distance = None;

        for (capability, task) in branches {
            match task.await {
                Ok(Ok(Outcome::Weather(report))) => weather = Some(report),
                Ok(Ok(Outcome::Distance(result))) => distance = Some(result),
                Ok(Err(err)) => {
                    warn!(
                        %capability,
                        kind = %err.kind,
                        message = %err.message,
                        city = ?err.city,
                        "branch failed"
                    );
                    errors.push(err);
                }
                Err(join_err) => {
                    error!(%capability, error = %join_err, "branch aborted");
                    errors.push(AgentError::internal(format!("{capability} branch aborted")));
                }
            }
        }

        for city in classification.ignored {
            errors.push(
                AgentError::ambiguous("only one weather city and one city pair are answered")
                    .for_city(city.name),
            );
        }

        let succeeded = usize::from(weather.is_some()) + usize::from(distance.is_some());
        let text = composer::compose(weather.as_ref(), distance.as_ref(), &errors);

        ComposedResponse {
            text,
            intent,
            succeeded,
            errors,
        }
    }
}

fn params_for(capability: Capability, classification: &Classification) -> Option<Params> {
    match capability {
        Capability::Weather => classification.weather.as_ref().map(|city| Params::Weather {
            city: city.name.clone(),
        }),
        Capability::Distance => classification.route.as_ref().map(|(from, to)| {
            Params::Distance {
                from: from.name.clone(),
                to: to.name.clone(),
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        agent::Handler,
        error::ErrorKind,
        model::{CityReference, Coordinate, DistanceResult, Units, WeatherReport},
    };
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Handler stub that counts invocations.
    #[derive(Default)]
    struct Stub {
        calls: AtomicUsize,
        fail: bool,
        panic: bool,
    }

    impl Stub {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Handler for Stub {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn invoke(&self, params: Params) -> Result<Outcome, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.panic {
                panic!("stub exploded");
            }
            match params {
                Params::Weather { city } if self.fail => Err(AgentError::city_not_found(city)),
                Params::Weather { city } => Ok(Outcome::Weather(WeatherReport {
                    city: CityReference::named(city),
                    provider: "stub".into(),
                    temperature_c: 20.0,
                    temperature_f: 68.0,
                    feels_like_c: 20.0,
                    condition: "clear sky".into(),
                    humidity_pct: 40,
                    wind_speed_mps: 1.0,
                    units: Units::Metric,
                    observed_at: Utc::now(),
                })),
                Params::Distance { from, .. } if self.fail => Err(AgentError::city_not_found(from)),
                Params::Distance { from, to } => {
                    let c = Coordinate {
                        latitude: 0.0,
                        longitude: 0.0,
                    };
                    Ok(Outcome::Distance(DistanceResult {
                        from: CityReference::resolved(from, c),
                        to: CityReference::resolved(to, c),
                        kilometers: 100.0,
                        miles: 62.1371,
                    }))
                }
            }
        }
    }

    fn coordinator(weather: Arc<Stub>, distance: Arc<Stub>) -> CoordinatorAgent {
        let handlers = HandlerRegistry::new()
            .register(Capability::Weather, weather)
            .register(Capability::Distance, distance);
        CoordinatorAgent::new(Arc::new(RuleClassifier::default()), handlers)
    }

    #[tokio::test]
    async fn weather_query_never_invokes_distance() {
        let (w, d) = (Arc::new(Stub::default()), Arc::new(Stub::default()));
        let res = coordinator(w.clone(), d.clone())
            .handle("What's the weather in London?")
            .await;

        assert_eq!(res.intent, Intent::Weather);
        assert_eq!((w.calls(), d.calls()), (1, 0));
        assert!(res.is_success());
        assert!(res.text.starts_with("Weather in London"));
    }

    #[tokio::test]
    async fn distance_query_never_invokes_weather() {
        let (w, d) = (Arc::new(Stub::default()), Arc::new(Stub::default()));
        let res = coordinator(w.clone(), d.clone())
            .handle("How far is Barcelona from Madrid?")
            .await;

        assert_eq!(res.intent, Intent::Distance);
        assert_eq!((w.calls(), d.calls()), (0, 1));
        assert!(res.text.contains("Distance from Barcelona to Madrid"));
    }

    #[tokio::test]
    async fn both_branches_run_and_compose() {
        let (w, d) = (Arc::new(Stub::default()), Arc::new(Stub::default()));
        let res = coordinator(w.clone(), d.clone())
            .handle("Weather in Tokyo and how far to New York")
            .await;

        assert_eq!(res.intent, Intent::Both);
        assert_eq!(res.succeeded, 2);
        assert!(res.text.contains("clear sky"));
        assert!(res.text.contains("km"));
    }

    #[tokio::test]
    async fn one_failing_branch_keeps_the_other() {
        let w = Arc::new(Stub {
            fail: true,
            ..Stub::default()
        });
        let d = Arc::new(Stub::default());
        let res = coordinator(w, d).handle("Weather in Atlantis and how far to Paris").await;

        assert!(res.is_success());
        assert_eq!(res.succeeded, 1);
        assert_eq!(res.errors.len(), 1);
        assert_eq!(res.errors[0].kind, ErrorKind::CityNotFound);
        assert!(res.text.contains("Distance from Atlantis to Paris"));
        assert!(res.text.contains("Note: couldn't get results for Atlantis (city not found)."));
    }

    #[tokio::test]
    async fn panicking_branch_is_an_internal_error() {
        let w = Arc::new(Stub {
            panic: true,
            ..Stub::default()
        });
        let d = Arc::new(Stub::default());
        let res = coordinator(w, d).handle("Weather in Tokyo and how far to New York").await;

        assert_eq!(res.succeeded, 1);
        assert_eq!(res.errors[0].kind, ErrorKind::InternalError);
        assert!(!res.text.contains("stub exploded"));
    }

    #[tokio::test]
    async fn all_branches_failing_is_not_a_success() {
        let w = Arc::new(Stub {
            fail: true,
            ..Stub::default()
        });
        let d = Arc::new(Stub {
            fail: true,
            ..Stub::default()
        });
        let res = coordinator(w, d).handle("Weather in Tokyo and how far to New York").await;

        assert!(!res.is_success());
        assert!(res.text.starts_with("Sorry"));
    }

    #[tokio::test]
    async fn unknown_intent_asks_for_clarification() {
        let (w, d) = (Arc::new(Stub::default()), Arc::new(Stub::default()));
        let res = coordinator(w.clone(), d.clone()).handle("Tell me a joke").await;

        assert_eq!(res.intent, Intent::Unknown);
        assert_eq!((w.calls(), d.calls()), (0, 0));
        assert_eq!(res.text, CLARIFICATION);
        assert_eq!(res.errors[0].kind, ErrorKind::AmbiguousQuery);
        assert!(!res.is_success());
    }

    #[tokio::test]
    async fn missing_handler_is_reported() {
        let handlers =
            HandlerRegistry::new().register(Capability::Weather, Arc::new(Stub::default()));
        let agent = CoordinatorAgent::new(Arc::new(RuleClassifier::default()), handlers);
        let res = agent.handle("Weather in Tokyo and how far to New York").await;

        assert_eq!(res.succeeded, 1);
        assert_eq!(res.errors[0].kind, ErrorKind::InternalError);
    }

    #[tokio::test]
    async fn weather_goes_to_the_city_named_with_the_cue() {
        let (w, d) = (Arc::new(Stub::default()), Arc::new(Stub::default()));
        let res = coordinator(w, d)
            .handle("Distance from Madrid to Rome and weather in Berlin")
            .await;

        assert_eq!(res.intent, Intent::Both);
        assert_eq!(res.succeeded, 2);
        assert!(res.text.starts_with("Weather in Berlin"));
        assert!(res.text.contains("Distance from Madrid to Rome"));
        assert!(res.errors.is_empty());
    }

    #[tokio::test]
    async fn unanswered_second_city_gets_a_note() {
        let (w, d) = (Arc::new(Stub::default()), Arc::new(Stub::default()));
        let res = coordinator(w.clone(), d.clone()).handle("Weather in Paris and London").await;

        assert_eq!(res.intent, Intent::Weather);
        assert!(res.is_success());
        assert_eq!((w.calls(), d.calls()), (1, 0));
        assert_eq!(res.errors.len(), 1);
        assert_eq!(res.errors[0].kind, ErrorKind::AmbiguousQuery);
        assert_eq!(res.errors[0].city.as_deref(), Some("London"));
        assert!(res.text.contains("Weather in Paris"));
        assert!(res.text.contains("London was left out"));
    }

    #[test]
    fn params_follow_the_bound_cities() {
        let weather_only = Classification {
            intent: Intent::Weather,
            cities: vec![CityReference::named("Paris")],
            weather: Some(CityReference::named("Paris")),
            route: None,
            ignored: Vec::new(),
        };
        assert!(params_for(Capability::Weather, &weather_only).is_some());
        assert!(params_for(Capability::Distance, &weather_only).is_none());

        let route_only = Classification {
            weather: None,
            route: Some((CityReference::named("Madrid"), CityReference::named("Rome"))),
            ..weather_only
        };
        assert!(params_for(Capability::Weather, &route_only).is_none());
        match params_for(Capability::Distance, &route_only) {
            Some(Params::Distance { from, to }) => {
                assert_eq!((from.as_str(), to.as_str()), ("Madrid", "Rome"));
            }
            other => panic!("unexpected params: {other:?}"),
        }
    }
}
