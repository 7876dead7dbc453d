//! Core library for the `travel` weather & distance assistant.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Weather and geocoding provider adapters
//! - A cached, request-coalescing geocoder
//! - The weather and distance agents and the registry they are dispatched through
//! - Query classification, coordination and answer composition
//!
//! It is used by `travel-cli`, but can also be reused by other binaries or services.

pub mod agent;
pub mod classifier;
pub mod composer;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod gazetteer;
pub mod geocoder;
pub mod model;
pub mod provider;

pub use agent::{Capability, DistanceAgent, Handler, HandlerRegistry, WeatherAgent};
pub use classifier::{Classification, QueryClassifier, RuleClassifier};
pub use config::{Config, ProviderConfig, load_env_file};
pub use coordinator::{ComposedResponse, CoordinatorAgent};
pub use error::{AgentError, ErrorKind};
pub use gazetteer::Gazetteer;
pub use geocoder::Geocoder;
pub use model::{CityReference, Coordinate, DistanceResult, Intent, Units, WeatherReport};
pub use provider::{GeocoderId, GeocodingProvider, ProviderId, WeatherProvider};
