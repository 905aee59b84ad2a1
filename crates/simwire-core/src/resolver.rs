//! Dependency resolution: turn source names into shared component handles.
//!
//! Resolution works against a [`ComponentPool`] of already-constructed
//! components. It fails closed: a name that is not available, or a name
//! listed twice for the same role, is an error rather than a silent skip.

use crate::component::{ComponentError, SharedComponent};
use crate::dependency::{DependencyDescriptor, IMPLICIT_ROLE};
use std::collections::BTreeMap;
use std::collections::btree_map;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur while resolving a dependency descriptor.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("component '{component}': source '{source_name}' for role '{role}' is not available")]
    UnresolvedSource {
        component: String,
        role: String,
        source_name: String,
    },
    #[error("component '{component}': source '{source_name}' listed twice for role '{role}'")]
    DuplicateSource {
        component: String,
        role: String,
        source_name: String,
    },
}

// ---------------------------------------------------------------------------
// Component pool
// ---------------------------------------------------------------------------

/// Named, constructed components visible to resolution.
#[derive(Debug, Clone, Default)]
pub struct ComponentPool {
    components: BTreeMap<String, SharedComponent>,
}

impl ComponentPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a component, returning the handle it replaced, if any.
    pub fn insert(&mut self, name: &str, component: SharedComponent) -> Option<SharedComponent> {
        self.components.insert(name.to_string(), component)
    }

    pub fn get(&self, name: &str) -> Option<&SharedComponent> {
        self.components.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, SharedComponent> {
        self.components.iter()
    }
}

impl FromIterator<(String, SharedComponent)> for ComponentPool {
    fn from_iter<I: IntoIterator<Item = (String, SharedComponent)>>(iter: I) -> Self {
        Self {
            components: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolved sources
// ---------------------------------------------------------------------------

/// The role -> ordered instances mapping a factory consumes.
///
/// Cardinality is the factory's business; the helpers here only make the
/// common checks uniform.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSources {
    roles: BTreeMap<String, Vec<SharedComponent>>,
}

impl ResolvedSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source to a role, creating the role if needed.
    pub fn push(&mut self, role: &str, component: SharedComponent) {
        self.roles.entry(role.to_string()).or_default().push(component);
    }

    /// Whether the role was declared at all (possibly with zero sources).
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains_key(role)
    }

    pub fn role_names(&self) -> impl Iterator<Item = &str> {
        self.roles.keys().map(String::as_str)
    }

    /// Sources for a role; a missing role is an error naming the role.
    pub fn role(&self, component: &str, role: &str) -> Result<&[SharedComponent], ComponentError> {
        self.roles
            .get(role)
            .map(Vec::as_slice)
            .ok_or_else(|| ComponentError::MissingRole {
                component: component.to_string(),
                role: role.to_string(),
            })
    }

    /// Sources of the implicit role used by the single-name `from` shorthand.
    pub fn implicit(&self, component: &str) -> Result<&[SharedComponent], ComponentError> {
        self.role(component, IMPLICIT_ROLE)
    }

    /// Check that every listed role is present.
    pub fn require_roles(&self, component: &str, roles: &[&str]) -> Result<(), ComponentError> {
        for role in roles {
            self.role(component, role)?;
        }
        Ok(())
    }

    /// The single source of a role, or `None` when the role lists nothing.
    /// A second source is a configuration error.
    pub fn at_most_one(
        &self,
        component: &str,
        role: &str,
    ) -> Result<Option<&SharedComponent>, ComponentError> {
        match self.role(component, role)? {
            [] => Ok(None),
            [only] => Ok(Some(only)),
            _ => Err(ComponentError::Configuration {
                component: component.to_string(),
                reason: format!("only one source expected for role '{role}'"),
            }),
        }
    }

    /// Total number of resolved instances across all roles.
    pub fn instance_count(&self) -> usize {
        self.roles.values().map(Vec::len).sum()
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resolve a descriptor against a pool.
pub fn resolve(
    component: &str,
    descriptor: &DependencyDescriptor,
    pool: &ComponentPool,
) -> Result<ResolvedSources, ResolveError> {
    resolve_with(component, descriptor, |name| pool.get(name).cloned())
}

/// Resolve a descriptor with a caller-supplied lookup.
///
/// Both descriptor shapes produce the same mapping; each role keeps its
/// declared source order.
pub fn resolve_with<F>(
    component: &str,
    descriptor: &DependencyDescriptor,
    mut lookup: F,
) -> Result<ResolvedSources, ResolveError>
where
    F: FnMut(&str) -> Option<SharedComponent>,
{
    let mut resolved = ResolvedSources::new();

    for (role, sources) in descriptor.normalized() {
        resolved.roles.entry(role.to_string()).or_default();
        for (i, &source_name) in sources.iter().enumerate() {
            if sources[..i].contains(&source_name) {
                return Err(ResolveError::DuplicateSource {
                    component: component.to_string(),
                    role: role.to_string(),
                    source_name: source_name.to_string(),
                });
            }
            let instance = lookup(source_name).ok_or_else(|| ResolveError::UnresolvedSource {
                component: component.to_string(),
                role: role.to_string(),
                source_name: source_name.to_string(),
            })?;
            resolved.push(role, instance);
        }
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentKind;
    use crate::test_utils::nop;

    fn pool() -> ComponentPool {
        let mut p = ComponentPool::new();
        p.insert("left", nop("left", ComponentKind::ObjectSensor));
        p.insert("right", nop("right", ComponentKind::ObjectSensor));
        p.insert("ego", nop("ego", ComponentKind::EgoSensor));
        p
    }

    #[test]
    fn single_source_resolves_to_implicit_role() {
        let r = resolve("cam", &DependencyDescriptor::single("left"), &pool()).unwrap();
        let sources = r.implicit("cam").unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name(), "left");
    }

    #[test]
    fn single_source_missing_is_unresolved() {
        let result = resolve("cam", &DependencyDescriptor::single("rear"), &pool());
        match result {
            Err(ResolveError::UnresolvedSource {
                component,
                role,
                source_name,
            }) => {
                assert_eq!(component, "cam");
                assert_eq!(role, IMPLICIT_ROLE);
                assert_eq!(source_name, "rear");
            }
            other => panic!("expected UnresolvedSource, got: {other:?}"),
        }
    }

    #[test]
    fn fan_in_preserves_order_per_role() {
        let d = DependencyDescriptor::roles([
            ("object_sensors", vec!["right", "left"]),
            ("ego_sensors", vec!["ego"]),
        ]);
        let r = resolve("fusion", &d, &pool()).unwrap();
        let objects: Vec<&str> = r
            .role("fusion", "object_sensors")
            .unwrap()
            .iter()
            .map(|c| c.name())
            .collect();
        assert_eq!(objects, vec!["right", "left"]);
        assert_eq!(r.instance_count(), 3);
    }

    #[test]
    fn duplicate_source_in_role_fails() {
        let d = DependencyDescriptor::roles([("object_sensors", vec!["left", "left"])]);
        let result = resolve("fusion", &d, &pool());
        assert!(matches!(
            result,
            Err(ResolveError::DuplicateSource { ref source_name, .. }) if source_name == "left"
        ));
    }

    #[test]
    fn same_source_in_two_roles_is_allowed() {
        let d = DependencyDescriptor::roles([("a", vec!["left"]), ("b", vec!["left"])]);
        let r = resolve("x", &d, &pool()).unwrap();
        assert_eq!(r.instance_count(), 2);
    }

    #[test]
    fn empty_role_is_declared_but_empty() {
        let d = DependencyDescriptor::roles([("ego_sensors", vec![])]);
        let r = resolve("x", &d, &pool()).unwrap();
        assert!(r.has_role("ego_sensors"));
        assert!(r.at_most_one("x", "ego_sensors").unwrap().is_none());
    }

    #[test]
    fn missing_role_names_the_role() {
        let r = ResolvedSources::new();
        let err = r.role("fusion", "ego_sensors").unwrap_err();
        assert!(matches!(
            err,
            ComponentError::MissingRole { ref role, .. } if role == "ego_sensors"
        ));
        assert!(r.require_roles("fusion", &["ego_sensors"]).is_err());
    }

    #[test]
    fn at_most_one_rejects_second_source() {
        let d = DependencyDescriptor::roles([("ego_sensors", vec!["ego", "left"])]);
        let r = resolve("fusion", &d, &pool()).unwrap();
        let err = r.at_most_one("fusion", "ego_sensors").unwrap_err();
        assert!(matches!(err, ComponentError::Configuration { .. }));
        assert!(err.to_string().contains("only one source expected"));
    }

    #[test]
    fn resolved_handles_share_the_pool_instance() {
        let p = pool();
        let r = resolve("cam", &DependencyDescriptor::single("ego"), &p).unwrap();
        let from_pool = p.get("ego").unwrap();
        assert!(std::sync::Arc::ptr_eq(from_pool, &r.implicit("cam").unwrap()[0]));
    }

    #[test]
    fn pool_collects_from_iterator() {
        let p: ComponentPool = [("a".to_string(), nop("a", ComponentKind::Actuator))]
            .into_iter()
            .collect();
        assert!(p.contains("a"));
        assert_eq!(p.names().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(p.iter().count(), 1);
    }
}
