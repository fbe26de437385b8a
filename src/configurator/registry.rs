//! Process-wide lookup of configurators by root name and by type.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use super::Configurator;
use crate::error::RegistryError;

/// Collects configurators at startup. Consumed by [`RegistryBuilder::build`].
#[derive(Default)]
pub struct RegistryBuilder {
    roots: Vec<Arc<dyn Configurator>>,
    types: Vec<(TypeId, &'static str, Arc<dyn Configurator>)>,
}

impl RegistryBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a root configurator, addressed by its name.
    pub fn root(mut self, configurator: impl Configurator + 'static) -> Self {
        self.roots.push(Arc::new(configurator));
        self
    }

    /// Registers a root configurator that is also the configurator for `T`.
    pub fn root_for<T: ?Sized + 'static>(
        mut self,
        configurator: impl Configurator + 'static,
    ) -> Self {
        let configurator: Arc<dyn Configurator> = Arc::new(configurator);
        self.roots.push(Arc::clone(&configurator));
        self.types
            .push((TypeId::of::<T>(), type_name::<T>(), configurator));
        self
    }

    /// Registers the configurator for `T`, reachable only through attributes.
    pub fn nested<T: ?Sized + 'static>(self, configurator: impl Configurator + 'static) -> Self {
        self.nested_arc::<T>(Arc::new(configurator))
    }

    /// Registers an already shared configurator for `T`.
    pub fn nested_arc<T: ?Sized + 'static>(mut self, configurator: Arc<dyn Configurator>) -> Self {
        self.types
            .push((TypeId::of::<T>(), type_name::<T>(), configurator));
        self
    }

    /// Freezes the registry. Fails on duplicate root names or types.
    pub fn build(self) -> Result<ConfiguratorRegistry, RegistryError> {
        let mut root_index = HashMap::with_capacity(self.roots.len());
        for (idx, root) in self.roots.iter().enumerate() {
            if root_index.insert(root.name().to_string(), idx).is_some() {
                return Err(RegistryError::DuplicateRootElement {
                    name: root.name().to_string(),
                });
            }
        }

        let mut by_type = HashMap::with_capacity(self.types.len());
        for (type_id, type_name, configurator) in self.types {
            if by_type.insert(type_id, configurator).is_some() {
                return Err(RegistryError::DuplicateType { type_name });
            }
        }

        Ok(ConfiguratorRegistry {
            roots: self.roots,
            root_index,
            by_type,
        })
    }
}

/// Read-only configurator lookup, populated once at startup.
pub struct ConfiguratorRegistry {
    roots: Vec<Arc<dyn Configurator>>,
    root_index: HashMap<String, usize>,
    by_type: HashMap<TypeId, Arc<dyn Configurator>>,
}

impl ConfiguratorRegistry {
    /// Starts a new registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Looks up the root configurator for a top-level document key.
    pub fn lookup_root(&self, name: &str) -> Option<&Arc<dyn Configurator>> {
        self.root_index.get(name).map(|&idx| &self.roots[idx])
    }

    /// Looks up the configurator registered for a type.
    pub fn lookup(&self, type_id: TypeId) -> Option<&Arc<dyn Configurator>> {
        self.by_type.get(&type_id)
    }

    /// Looks up the configurator registered for `T`.
    pub fn lookup_type<T: ?Sized + 'static>(&self) -> Option<&Arc<dyn Configurator>> {
        self.lookup(TypeId::of::<T>())
    }

    /// All root configurators, in registration order.
    pub fn roots(&self) -> &[Arc<dyn Configurator>] {
        &self.roots
    }

    /// Names of all root configurators, in registration order.
    pub fn root_names(&self) -> impl Iterator<Item = &str> {
        self.roots.iter().map(|r| r.name())
    }

    /// Returns the registered root name closest to `name`, if any is close enough
    /// to be a plausible typo.
    pub fn suggest_root(&self, name: &str) -> Option<&str> {
        self.root_names()
            .map(|candidate| (candidate, strsim::levenshtein(name, candidate)))
            .filter(|&(_, distance)| distance <= 3)
            .min_by_key(|&(_, distance)| distance)
            .map(|(candidate, _)| candidate)
    }
}

impl std::fmt::Debug for ConfiguratorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfiguratorRegistry")
            .field("roots", &self.root_names().collect::<Vec<_>>())
            .field("types", &self.by_type.len())
            .finish()
    }
}
