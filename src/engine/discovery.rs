//! Recursive configurator discovery for the documentation view.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::configurator::{identity, Configurator, ConfiguratorRegistry};

/// Enumerates every configurator reachable from the registered roots.
///
/// Roots come first in registration order, each followed depth-first by the
/// configurators reachable through its attributes. Every configurator appears
/// once, compared by identity; attribute types without a configurator are
/// skipped. Terminates on any finite graph, cycles included.
pub fn discover_all(registry: &ConfiguratorRegistry) -> Vec<Arc<dyn Configurator>> {
    let mut visited = HashSet::new();
    let mut found = Vec::new();

    for root in registry.roots() {
        expand(registry, root, &mut visited, &mut found);
    }

    debug!(count = found.len(), "Discovered configurators");
    found
}

fn expand(
    registry: &ConfiguratorRegistry,
    start: &Arc<dyn Configurator>,
    visited: &mut HashSet<*const ()>,
    found: &mut Vec<Arc<dyn Configurator>>,
) {
    let mut pending = vec![Arc::clone(start)];

    while let Some(configurator) = pending.pop() {
        if !visited.insert(identity(&configurator)) {
            continue;
        }
        found.push(Arc::clone(&configurator));

        let mut next = Vec::new();
        for attribute in configurator.describe() {
            let Some(target) = registry.lookup(attribute.type_id) else {
                continue;
            };
            next.push(Arc::clone(target));
            next.extend(target.nested());
        }

        // Reversed so the first attribute is expanded first.
        pending.extend(next.into_iter().rev());
    }
}
