//! Simwire Core -- component wiring for simulated vehicles.
//!
//! This crate turns declarative component configuration into a graph of
//! constructed, shared runtime components. It knows nothing about file
//! formats or configuration layering; `simwire-stack` feeds it already
//! validated [`dependency::ComponentConf`] entries.
//!
//! # Wiring Pipeline
//!
//! 1. **Register** -- factories are registered by binding name into a
//!    [`registry::ComponentRegistryBuilder`] and frozen into an immutable
//!    [`registry::ComponentRegistry`].
//! 2. **Validate** -- each factory validates and canonicalizes its own `args`
//!    at import time via [`factory::ComponentFactory::validate_args`].
//! 3. **Order** -- [`builder::build_order`] sorts a vehicle's components by
//!    their `from` references and rejects cycles.
//! 4. **Build** -- [`builder::build_components`] resolves each component's
//!    sources and calls its factory, publishing the result only when every
//!    component succeeded.
//!
//! ```rust,ignore
//! let pool = build_components(&vehicle.components, &registry, &simulator_pool)?;
//! let fusion = downcast::<FusionSensor>(pool.get("fusion").unwrap())?;
//! ```
//!
//! # Key Types
//!
//! - [`component::Component`] -- A named runtime object of a closed
//!   [`component::ComponentKind`].
//! - [`dependency::DependencyDescriptor`] -- The `from` clause: a single
//!   source or a role-keyed mapping of ordered sources.
//! - [`resolver::ResolvedSources`] -- What a factory receives: role name to
//!   ordered shared instances.
//! - [`graph::DependencyGraph`] -- SlotMap-backed graph with Kahn ordering.

pub mod builder;
pub mod component;
pub mod dependency;
pub mod factory;
pub mod graph;
pub mod id;
pub mod registry;
pub mod resolver;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use builder::{BuildError, build_components, build_order};
pub use component::{Component, ComponentError, ComponentKind, SharedComponent, downcast, expect_kind};
pub use dependency::{ComponentConf, DependencyDescriptor, IMPLICIT_ROLE};
pub use factory::{ComponentFactory, canonical_args, parse_args};
pub use registry::{ComponentRegistry, ComponentRegistryBuilder, RegistryError, SharedFactory};
pub use resolver::{ComponentPool, ResolveError, ResolvedSources, resolve, resolve_with};
