//! Construct stages from textual descriptions.
//!
//! Replaces build-by-name reflection with an explicit map from identifier
//! to constructor. Unknown descriptions are an error, not a panic.

use std::collections::BTreeMap;

use crate::stage::center::CenterStage;
use crate::stage::identity::IdentityStage;
use crate::stage::{Stage, StageError};

/// Constructor registered under a description string.
pub type StageConstructor = Box<dyn Fn() -> Box<dyn Stage> + Send + Sync>;

/// Explicit registry mapping stage descriptions to constructors.
pub struct StageFactory {
    constructors: BTreeMap<String, StageConstructor>,
}

impl StageFactory {
    /// Create an empty factory with no registered stages.
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Create a factory with the built-in stages registered.
    pub fn with_builtins() -> Self {
        let mut factory = Self::empty();
        factory.register("identity", || Box::new(IdentityStage));
        factory.register("center", || Box::new(CenterStage::new()));
        factory
    }

    /// Register `constructor` under `description`, replacing any existing
    /// registration.
    pub fn register(
        &mut self,
        description: impl Into<String>,
        constructor: impl Fn() -> Box<dyn Stage> + Send + Sync + 'static,
    ) {
        self.constructors
            .insert(description.into(), Box::new(constructor));
    }

    /// Construct a fresh stage for `description`.
    pub fn construct(&self, description: &str) -> Result<Box<dyn Stage>, StageError> {
        match self.constructors.get(description) {
            Some(constructor) => Ok(constructor()),
            None => Err(StageError::UnknownStage(description.to_string())),
        }
    }

    /// Registered descriptions in ascending order.
    pub fn descriptions(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }
}

impl Default for StageFactory {
    fn default() -> Self {
        Self::with_builtins()
    }
}
