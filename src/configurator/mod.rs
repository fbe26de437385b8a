//! Configurators: the handlers that bind document sections to live state.
//!
//! A configurator plays one of two roles. *Root* configurators are addressed by
//! a top-level document key. *Nested* configurators are only reachable by type,
//! through the attributes another configurator declares.

pub mod registry;
pub mod section;

use std::any::{type_name, TypeId};
use std::fmt;
use std::sync::Arc;

use serde_yaml::Value;

pub use registry::{ConfiguratorRegistry, RegistryBuilder};
pub use section::SectionConfigurator;

/// A unit able to apply a document fragment and describe its own shape.
pub trait Configurator: Send + Sync {
    /// Name of the configurator. For roots this is the top-level key.
    fn name(&self) -> &str;

    /// Applies a document fragment to live state.
    fn configure(&self, value: &Value) -> anyhow::Result<()>;

    /// Describes the attributes this configurator accepts.
    fn describe(&self) -> Vec<Attribute>;

    /// Additional configurators this one stands for, such as the concrete
    /// implementations of an abstract type.
    fn nested(&self) -> Vec<Arc<dyn Configurator>> {
        Vec::new()
    }
}

impl fmt::Debug for dyn Configurator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configurator")
            .field("name", &self.name())
            .finish()
    }
}

/// One named, typed slot exposed by a configurator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute name as it appears in the document.
    pub name: String,
    /// Identity of the declared type, used to find its configurator.
    pub type_id: TypeId,
    /// Human-readable name of the declared type.
    pub type_name: &'static str,
    /// Whether the attribute holds a list of values.
    pub multiple: bool,
}

impl Attribute {
    /// Declares an attribute of type `T`.
    pub fn of<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_id: TypeId::of::<T>(),
            type_name: short_type_name(type_name::<T>()),
            multiple: false,
        }
    }

    /// Marks the attribute as holding a list.
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }
}

/// Strips module paths: `alloc::string::String` becomes `String`.
fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    match base.rfind("::") {
        Some(idx) if base.len() == full.len() => &full[idx + 2..],
        _ => full,
    }
}

/// Identity of a configurator instance, independent of its content.
pub(crate) fn identity(configurator: &Arc<dyn Configurator>) -> *const () {
    Arc::as_ptr(configurator).cast::<()>()
}
