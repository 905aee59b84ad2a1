//! Graph build: construct a vehicle's components in dependency order.
//!
//! The build runs in three steps, all before any component becomes visible:
//!
//! 1. **Plan** -- build the dependency graph over configured components and
//!    compute a topological order. A cycle fails here, before any `make`.
//! 2. **Bind** -- look up every factory, so an unknown binding also fails
//!    before construction starts.
//! 3. **Construct** -- walk the order, resolve each component's sources from
//!    a staging pool, call `make`, and insert the result into staging.
//!
//! Only a fully successful build returns the staging pool; on any error it is
//! dropped, so no partially-built component leaks into later resolution.
//!
//! A component whose `from` names its own key reads the *base* component of
//! that name (typically provided by the simulator) and replaces it.

use crate::component::ComponentError;
use crate::dependency::ComponentConf;
use crate::graph::{DependencyGraph, GraphError};
use crate::registry::{ComponentRegistry, RegistryError};
use crate::resolver::{ComponentPool, ResolveError, resolve_with};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur while building a component graph.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("failed to build component '{name}': {error}")]
    Component {
        name: String,
        #[source]
        error: ComponentError,
    },
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Compute the construction order of `components` (keys in build order).
///
/// Only edges between configured components constrain the order; names that
/// refer to the base pool, and self-references, impose none.
pub fn build_order(components: &BTreeMap<String, ComponentConf>) -> Result<Vec<String>, BuildError> {
    let mut graph = DependencyGraph::new();
    for key in components.keys() {
        graph.add_node(key)?;
    }

    for (key, conf) in components {
        let Some(to) = graph.node_id(key) else {
            continue;
        };
        for source in conf.from.sources() {
            if source == key {
                continue;
            }
            if let Some(from) = graph.node_id(source) {
                graph.connect(from, to)?;
            }
        }
    }

    let order = graph.topological_order()?;
    Ok(order
        .into_iter()
        .filter_map(|n| graph.get_node(n).map(|d| d.name.clone()))
        .collect())
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// Build every configured component on top of `base`.
///
/// Returns a new pool containing `base` plus each constructed component under
/// its key (a key that exists in `base` is replaced). `base` itself is never
/// modified.
pub fn build_components(
    components: &BTreeMap<String, ComponentConf>,
    registry: &ComponentRegistry,
    base: &ComponentPool,
) -> Result<ComponentPool, BuildError> {
    let order = build_order(components)?;

    let mut bound = Vec::with_capacity(order.len());
    for key in &order {
        let Some(conf) = components.get(key) else {
            continue;
        };
        let factory = Arc::clone(registry.lookup(&conf.binding)?);
        bound.push((key.as_str(), conf, factory));
    }

    debug!(order = ?order, "building components");

    let mut staging = base.clone();
    for (key, conf, factory) in bound {
        let sources = resolve_with(key, &conf.from, |name| {
            if name == key {
                base.get(name).cloned()
            } else {
                staging.get(name).cloned()
            }
        })?;
        let name = conf.instance_name(key);
        let component =
            factory
                .make(name, &conf.args, &sources)
                .map_err(|error| BuildError::Component {
                    name: key.to_string(),
                    error,
                })?;
        debug!(key, binding = %conf.binding, kind = %component.kind(), "constructed component");
        staging.insert(key, component);
    }

    Ok(staging)
}
