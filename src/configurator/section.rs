//! Serde-backed configurator for strongly typed sections.

use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde_yaml::Value;

use super::{Attribute, Configurator};

type ApplyFn<T> = Box<dyn Fn(T) -> anyhow::Result<()> + Send + Sync>;

/// Deserializes a section into `T` and hands it to an apply callback.
///
/// Without a callback the configurator only checks that the value binds to
/// `T`, which is what nested configurators need.
pub struct SectionConfigurator<T> {
    name: String,
    attributes: Vec<Attribute>,
    nested: Vec<Arc<dyn Configurator>>,
    apply: Option<ApplyFn<T>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SectionConfigurator<T>
where
    T: DeserializeOwned + 'static,
{
    /// Creates a configurator without attributes or apply callback.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            nested: Vec::new(),
            apply: None,
            _marker: PhantomData,
        }
    }

    /// Declares an attribute.
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Adds a configurator this one stands for.
    pub fn with_nested(mut self, configurator: Arc<dyn Configurator>) -> Self {
        self.nested.push(configurator);
        self
    }

    /// Sets the callback receiving the bound section.
    pub fn on_apply<F>(mut self, apply: F) -> Self
    where
        F: Fn(T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.apply = Some(Box::new(apply));
        self
    }

    /// Binds a value to `T`.
    pub fn bind(&self, value: &Value) -> anyhow::Result<T> {
        serde_yaml::from_value(value.clone())
            .with_context(|| format!("invalid value for '{}'", self.name))
    }
}

impl<T> Configurator for SectionConfigurator<T>
where
    T: DeserializeOwned + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&self, value: &Value) -> anyhow::Result<()> {
        let section = self.bind(value)?;
        match &self.apply {
            Some(apply) => apply(section),
            None => Ok(()),
        }
    }

    fn describe(&self) -> Vec<Attribute> {
        self.attributes.clone()
    }

    fn nested(&self) -> Vec<Arc<dyn Configurator>> {
        self.nested.clone()
    }
}
