//! Registry of model definitions by name.

use std::collections::BTreeMap;

use relations_core::ModelDefinition;

/// Model definitions known to a source, keyed by model name.
///
/// Parent relations are resolved through the registry when a free-text
/// search narrows by parent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registry {
    models: BTreeMap<String, ModelDefinition>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            models: BTreeMap::new(),
        }
    }

    /// Registers a model, replacing any model of the same name.
    #[must_use]
    pub fn model(mut self, model: ModelDefinition) -> Self {
        self.register(model);
        self
    }

    /// Registers a model in place.
    pub fn register(&mut self, model: ModelDefinition) {
        self.models.insert(model.name.clone(), model);
    }

    /// Gets a model by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ModelDefinition> {
        self.models.get(name)
    }

    /// Iterates over the models, sorted by name.
    pub fn models(&self) -> impl Iterator<Item = &ModelDefinition> {
        self.models.values()
    }

    /// Returns the number of registered models.
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Returns `true` if no model is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl FromIterator<ModelDefinition> for Registry {
    fn from_iter<I: IntoIterator<Item = ModelDefinition>>(iter: I) -> Self {
        let mut registry = Self::new();
        for model in iter {
            registry.register(model);
        }
        registry
    }
}
