use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use crate::error::MatchingError;
use crate::models::{HelpeeFilter, HelperFilter, MatchingWeights};
use crate::services::MatchCreator;

/// Pool sizes that must be reached before the automatic gate runs a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomaticTrigger {
    pub min_helpers: u64,
    pub min_helpees: u64,
}

/// Static pool configuration as read from the settings file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolDefinition {
    pub name: String,
    #[serde(default)]
    pub helpers: HelperFilter,
    #[serde(default)]
    pub helpees: HelpeeFilter,
    #[serde(default)]
    pub weights: MatchingWeights,
    /// Pools without a trigger only run on demand
    #[serde(default)]
    pub automatic: Option<AutomaticTrigger>,
}

impl PoolDefinition {
    fn validate(&self) -> Result<(), MatchingError> {
        if self.name.trim().is_empty() {
            return Err(MatchingError::Configuration("pool name must not be empty".to_string()));
        }

        for (factor, weight) in self.weights.iter() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(MatchingError::Configuration(format!(
                    "pool '{}' has invalid {} weight {}",
                    self.name, factor, weight
                )));
            }
        }

        Ok(())
    }
}

/// Registered pool: its definition plus the callback that persists pairings
#[derive(Clone)]
pub struct Pool {
    pub definition: PoolDefinition,
    pub creator: Arc<dyn MatchCreator>,
}

impl Pool {
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn weights(&self) -> &MatchingWeights {
        &self.definition.weights
    }

    pub fn automatic(&self) -> Option<&AutomaticTrigger> {
        self.definition.automatic.as_ref()
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

/// Named pool definitions, built once at startup and read-only afterwards
#[derive(Debug, Clone, Default)]
pub struct PoolRegistry {
    pools: Vec<Pool>,
}

impl PoolRegistry {
    /// Build a registry where every pool commits through the same creator
    pub fn from_definitions(
        definitions: Vec<PoolDefinition>,
        creator: Arc<dyn MatchCreator>,
    ) -> Result<Self, MatchingError> {
        let mut registry = Self::default();
        let mut seen = HashSet::new();

        for definition in definitions {
            if !seen.insert(definition.name.clone()) {
                return Err(MatchingError::Configuration(format!(
                    "pool '{}' is registered twice",
                    definition.name
                )));
            }
            registry.register(definition, Arc::clone(&creator))?;
        }

        Ok(registry)
    }

    /// Add a pool; names must be unique
    pub fn register(
        &mut self,
        definition: PoolDefinition,
        creator: Arc<dyn MatchCreator>,
    ) -> Result<(), MatchingError> {
        definition.validate()?;

        if self.pools.iter().any(|p| p.name() == definition.name) {
            return Err(MatchingError::Configuration(format!(
                "pool '{}' is registered twice",
                definition.name
            )));
        }

        tracing::info!(
            "Registered pool '{}' (automatic: {})",
            definition.name,
            definition.automatic.is_some()
        );
        self.pools.push(Pool { definition, creator });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&Pool, MatchingError> {
        self.pools
            .iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| MatchingError::PoolNotFound(name.to_string()))
    }

    /// Pools in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Pool> {
        self.pools.iter()
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}
