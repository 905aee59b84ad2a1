//! Component configuration and its dependency descriptor.
//!
//! A [`ComponentConf`] is pure configuration data: the binding that selects a
//! factory, the instance name, the `from` clause naming upstream sources, and
//! an args payload that only the bound factory interprets. It holds no live
//! references until the builder resolves it.

use crate::component::ComponentError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Role name used when `from` is a single source name.
pub const IMPLICIT_ROLE: &str = "default";

// ---------------------------------------------------------------------------
// Dependency descriptor
// ---------------------------------------------------------------------------

/// The `from` clause of a component.
///
/// Either a single source name (shorthand for one implicit role) or a mapping
/// from role name to an ordered list of source names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyDescriptor {
    /// `"from": "name"`
    Single(String),
    /// `"from": {"role": ["a", "b"]}`
    Roles(BTreeMap<String, Vec<String>>),
}

impl Default for DependencyDescriptor {
    fn default() -> Self {
        DependencyDescriptor::Roles(BTreeMap::new())
    }
}

impl DependencyDescriptor {
    /// Shorthand descriptor with a single implicit source.
    pub fn single(name: &str) -> Self {
        DependencyDescriptor::Single(name.to_string())
    }

    /// Role-keyed descriptor from `(role, sources)` pairs.
    pub fn roles<'a, I>(roles: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Vec<&'a str>)>,
    {
        DependencyDescriptor::Roles(
            roles
                .into_iter()
                .map(|(role, sources)| {
                    (
                        role.to_string(),
                        sources.into_iter().map(str::to_string).collect(),
                    )
                })
                .collect(),
        )
    }

    /// Normalize both shapes into one role -> sources mapping.
    pub fn normalized(&self) -> BTreeMap<&str, Vec<&str>> {
        match self {
            DependencyDescriptor::Single(name) => {
                BTreeMap::from([(IMPLICIT_ROLE, vec![name.as_str()])])
            }
            DependencyDescriptor::Roles(roles) => roles
                .iter()
                .map(|(role, sources)| {
                    (role.as_str(), sources.iter().map(String::as_str).collect())
                })
                .collect(),
        }
    }

    /// Every source name referenced, in role order then declared order.
    pub fn sources(&self) -> Vec<&str> {
        match self {
            DependencyDescriptor::Single(name) => vec![name.as_str()],
            DependencyDescriptor::Roles(roles) => roles
                .values()
                .flat_map(|sources| sources.iter().map(String::as_str))
                .collect(),
        }
    }

    /// True when no source is referenced.
    pub fn is_empty(&self) -> bool {
        self.sources().is_empty()
    }

    /// Reject empty role or source names.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            DependencyDescriptor::Single(name) if name.is_empty() => {
                Err("source name must not be empty".to_string())
            }
            DependencyDescriptor::Single(_) => Ok(()),
            DependencyDescriptor::Roles(roles) => {
                for (role, sources) in roles {
                    if role.is_empty() {
                        return Err("role name must not be empty".to_string());
                    }
                    if sources.iter().any(String::is_empty) {
                        return Err(format!("role '{role}' lists an empty source name"));
                    }
                }
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Component configuration
// ---------------------------------------------------------------------------

/// One named component entry of a vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentConf {
    /// Key into the component factory registry.
    pub binding: String,
    /// Instance name handed to the factory. Empty means "use the entry key".
    #[serde(default)]
    pub name: String,
    /// Upstream sources.
    #[serde(default)]
    pub from: DependencyDescriptor,
    /// Factory-specific payload.
    #[serde(default)]
    pub args: Value,
}

impl ComponentConf {
    pub fn new(binding: &str, name: &str, from: DependencyDescriptor, args: Value) -> Self {
        Self {
            binding: binding.to_string(),
            name: name.to_string(),
            from,
            args,
        }
    }

    /// Check the `from` clause of the entry stored under `key`.
    pub fn validate_from(&self, key: &str) -> Result<(), ComponentError> {
        self.from
            .validate()
            .map_err(|detail| ComponentError::InvalidDescriptor {
                component: self.instance_name(key).to_string(),
                detail,
            })
    }

    /// The instance name, falling back to `key` when unset.
    pub fn instance_name<'a>(&'a self, key: &'a str) -> &'a str {
        if self.name.is_empty() { key } else { &self.name }
    }
}
