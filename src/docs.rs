//! Documentation view of the configurator graph.

use std::sync::Arc;

use serde::Serialize;

use crate::configurator::Configurator;
use crate::engine::ConfigurationEngine;

/// Description of one configurator, as shown on the management page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfiguratorDoc {
    pub name: String,
    /// Whether the configurator is addressable by a top-level key.
    pub root: bool,
    pub attributes: Vec<AttributeDoc>,
}

/// Description of one attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeDoc {
    pub name: String,
    pub type_name: String,
    pub multiple: bool,
    /// Whether the attribute type has a configurator of its own.
    pub configurable: bool,
}

/// Documents every configurator reachable from the roots.
pub fn describe(engine: &ConfigurationEngine) -> Vec<ConfiguratorDoc> {
    document_all(engine, &engine.configurators())
}

/// Documents the root configurators only.
pub fn describe_roots(engine: &ConfigurationEngine) -> Vec<ConfiguratorDoc> {
    document_all(engine, &engine.root_configurators())
}

fn document_all(
    engine: &ConfigurationEngine,
    configurators: &[Arc<dyn Configurator>],
) -> Vec<ConfiguratorDoc> {
    let registry = engine.registry();

    configurators
        .iter()
        .map(|configurator| ConfiguratorDoc {
            name: configurator.name().to_string(),
            root: registry
                .lookup_root(configurator.name())
                .is_some_and(|root| Arc::ptr_eq(root, configurator)),
            attributes: configurator
                .describe()
                .into_iter()
                .map(|attribute| AttributeDoc {
                    configurable: registry.lookup(attribute.type_id).is_some(),
                    name: attribute.name,
                    type_name: attribute.type_name.to_string(),
                    multiple: attribute.multiple,
                })
                .collect(),
        })
        .collect()
}

/// Formats configurator documentation for the terminal.
pub fn format_text(docs: &[ConfiguratorDoc]) -> String {
    if docs.is_empty() {
        return "No configurators registered.".to_string();
    }

    let mut output = String::new();

    for doc in docs {
        let role = if doc.root { "root" } else { "nested" };
        output.push_str(&format!("{} ({})\n", doc.name, role));

        for attribute in &doc.attributes {
            let type_name = if attribute.multiple {
                format!("[{}]", attribute.type_name)
            } else {
                attribute.type_name.clone()
            };
            let marker = if attribute.configurable { " *" } else { "" };
            output.push_str(&format!("  └─ {}: {}{}\n", attribute.name, type_name, marker));
        }
        output.push('\n');
    }

    output.push_str(&format!(
        "---\n{} configurator(s), * marks configurable types\n",
        docs.len()
    ));

    output
}
