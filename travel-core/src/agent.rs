//! Specialised handlers and the registry the coordinator dispatches through.
//!
//! Each handler is registered under a [`Capability`]; an [`Intent`] maps to
//! the capabilities it needs via [`Intent::capabilities`].

use std::{collections::HashMap, fmt, sync::Arc};

use async_trait::async_trait;

use crate::{
    error::AgentError,
    model::{DistanceResult, Intent, WeatherReport},
};

pub mod distance;
pub mod weather;

pub use distance::DistanceAgent;
pub use weather::WeatherAgent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    Weather,
    Distance,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Weather => "weather",
            Capability::Distance => "distance",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Intent {
    /// Capabilities to run for this intent, in composition order.
    pub fn capabilities(self) -> &'static [Capability] {
        match self {
            Intent::Weather => &[Capability::Weather],
            Intent::Distance => &[Capability::Distance],
            Intent::Both => &[Capability::Weather, Capability::Distance],
            Intent::Unknown => &[],
        }
    }
}

/// Input to a handler invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    Weather { city: String },
    Distance { from: String, to: String },
}

/// Successful handler output.
#[derive(Debug, Clone)]
pub enum Outcome {
    Weather(WeatherReport),
    Distance(DistanceResult),
}

#[async_trait]
pub trait Handler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn invoke(&self, params: Params) -> Result<Outcome, AgentError>;
}

/// Explicit capability → handler mapping.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<Capability, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn register(mut self, capability: Capability, handler: Arc<dyn Handler>) -> Self {
        self.handlers.insert(capability, handler);
        self
    }

    pub fn get(&self, capability: Capability) -> Option<Arc<dyn Handler>> {
        self.handlers.get(&capability).cloned()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.handlers.iter().map(|(c, h)| (*c, h.name())).collect();
        names.sort();
        f.debug_struct("HandlerRegistry").field("handlers", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl Handler for Noop {
        fn name(&self) -> &'static str {
            "noop"
        }

        async fn invoke(&self, _params: Params) -> Result<Outcome, AgentError> {
            Err(AgentError::internal("noop"))
        }
    }

    #[test]
    fn intent_maps_to_capabilities() {
        assert_eq!(Intent::Weather.capabilities(), &[Capability::Weather]);
        assert_eq!(Intent::Distance.capabilities(), &[Capability::Distance]);
        assert_eq!(
            Intent::Both.capabilities(),
            &[Capability::Weather, Capability::Distance]
        );
        assert!(Intent::Unknown.capabilities().is_empty());
    }

    #[test]
    fn registry_lookup() {
        let registry = HandlerRegistry::new().register(Capability::Weather, Arc::new(Noop));
        assert_eq!(registry.get(Capability::Weather).unwrap().name(), "noop");
        assert!(registry.get(Capability::Distance).is_none());
        assert!(format!("{registry:?}").contains("noop"));
    }
}
