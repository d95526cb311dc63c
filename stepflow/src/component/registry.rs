//! Registry of component types, and the per-run set of instances.
//!
//! The registry is populated once before any run starts and is read-only
//! afterwards; the engine holds it behind an `Arc`.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use super::{Component, ComponentCategory};
use crate::core::Record;
use crate::errors::{FlowError, Result};
use crate::flow::FlowProgram;

/// Builds a component instance from its id and static config.
pub type ComponentFactory = Box<dyn Fn(&str, &Record) -> Result<Arc<dyn Component>> + Send + Sync>;

struct RegisteredType {
    category: ComponentCategory,
    factory: ComponentFactory,
}

/// Maps declared type strings to component factories.
#[derive(Default)]
pub struct ComponentRegistry {
    types: BTreeMap<String, RegisteredType>,
}

impl ComponentRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a component type.
    ///
    /// Fails if the type name is already registered.
    pub fn register<F>(
        &mut self,
        type_name: impl Into<String>,
        category: ComponentCategory,
        factory: F,
    ) -> Result<()>
    where
        F: Fn(&str, &Record) -> Result<Arc<dyn Component>> + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        if self.types.contains_key(&type_name) {
            return Err(FlowError::DuplicateComponentType(type_name));
        }
        self.types.insert(
            type_name,
            RegisteredType {
                category,
                factory: Box::new(factory),
            },
        );
        Ok(())
    }

    /// Returns true if the type is registered.
    #[must_use]
    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    /// Lists registered type names, sorted.
    #[must_use]
    pub fn list_types(&self) -> Vec<String> {
        self.types.keys().cloned().collect()
    }

    /// Lists registered type names in a category, sorted.
    #[must_use]
    pub fn list_by_category(&self, category: ComponentCategory) -> Vec<String> {
        self.types
            .iter()
            .filter(|(_, registered)| registered.category == category)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Creates one instance of a registered type.
    pub fn create(&self, type_name: &str, id: &str, config: &Record) -> Result<Arc<dyn Component>> {
        let registered =
            self.types
                .get(type_name)
                .ok_or_else(|| FlowError::UnknownComponentType {
                    component_id: id.to_string(),
                    type_name: type_name.to_string(),
                })?;
        (registered.factory)(id, config)
    }

    /// Creates one instance per component declared by a flow.
    pub fn instantiate(&self, program: &FlowProgram) -> Result<ComponentSet> {
        let mut set = ComponentSet::new();
        for (id, decl) in &program.components {
            set.insert(id.clone(), self.create(&decl.type_name, id, &decl.config)?);
        }
        tracing::debug!(
            flow = %program.name,
            components = set.len(),
            "Instantiated components"
        );
        Ok(set)
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("types", &self.list_types())
            .finish()
    }
}

/// The component instances of one run, keyed by component id.
#[derive(Debug, Clone, Default)]
pub struct ComponentSet {
    instances: HashMap<String, Arc<dyn Component>>,
}

impl ComponentSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an instance, builder style.
    #[must_use]
    pub fn with(mut self, id: impl Into<String>, component: Arc<dyn Component>) -> Self {
        self.insert(id, component);
        self
    }

    /// Adds an instance.
    pub fn insert(&mut self, id: impl Into<String>, component: Arc<dyn Component>) {
        self.instances.insert(id.into(), component);
    }

    /// Returns the instance for an id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Component>> {
        self.instances.get(id)
    }

    /// Returns true if an instance exists for the id.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.instances.contains_key(id)
    }

    /// Iterates over `(id, instance)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Component>)> {
        self.instances.iter().map(|(id, c)| (id.as_str(), c))
    }

    /// Returns the number of instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Returns true if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
