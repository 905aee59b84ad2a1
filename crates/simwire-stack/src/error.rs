use crate::loader::LoadError;
use simwire_core::builder::BuildError;
use simwire_core::component::ComponentError;
use simwire_core::graph::GraphError;
use simwire_core::registry::RegistryError;
use simwire_core::resolver::ResolveError;

/// Coarse classification of a [`StackError`], stable for callers that branch
/// on the failure category rather than on the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Version,
    Security,
    Schema,
    NotFound,
    UnresolvedSource,
    Configuration,
    Graph,
    Load,
}

/// Errors surfaced by stack import, validation and vehicle builds.
///
/// Every variant carries the path, origin or name that caused it.
#[derive(Debug, thiserror::Error)]
pub enum StackError {
    /// A layer declared an unsupported `version`, or none at all.
    #[error("{origin}: unsupported stack version '{found}', expected '{expected}'")]
    Version {
        origin: String,
        found: String,
        expected: &'static str,
    },

    /// A gated feature was used while the security policy disabled it.
    #[error("{origin}: {detail}")]
    Security { origin: String, detail: String },

    /// A field failed type, range or required-ness validation.
    #[error("schema error at {path}: {detail}")]
    Schema { path: String, detail: String },

    /// A component binding is not in the registry.
    #[error("unknown component binding '{binding}' at {path}")]
    NotFound { path: String, binding: String },

    /// A named dependency was not available when a component was built.
    #[error("vehicle '{vehicle}': {source}")]
    UnresolvedSource {
        vehicle: String,
        #[source]
        source: ResolveError,
    },

    /// A semantic rule was violated by a factory or a cross-reference.
    #[error("{name}: {detail}")]
    Configuration { name: String, detail: String },

    /// The component dependency graph contains a cycle.
    #[error("vehicle '{vehicle}': {source}")]
    Graph {
        vehicle: String,
        #[source]
        source: GraphError,
    },

    /// An included file could not be read or parsed.
    #[error(transparent)]
    Load(#[from] LoadError),
}

impl StackError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StackError::Version { .. } => ErrorKind::Version,
            StackError::Security { .. } => ErrorKind::Security,
            StackError::Schema { .. } => ErrorKind::Schema,
            StackError::NotFound { .. } => ErrorKind::NotFound,
            StackError::UnresolvedSource { .. } => ErrorKind::UnresolvedSource,
            StackError::Configuration { .. } => ErrorKind::Configuration,
            StackError::Graph { .. } => ErrorKind::Graph,
            StackError::Load(_) => ErrorKind::Load,
        }
    }

    pub(crate) fn schema(path: impl Into<String>, detail: impl ToString) -> Self {
        StackError::Schema {
            path: path.into(),
            detail: detail.to_string(),
        }
    }

    pub(crate) fn security(origin: impl Into<String>, detail: impl Into<String>) -> Self {
        StackError::Security {
            origin: origin.into(),
            detail: detail.into(),
        }
    }

    pub(crate) fn configuration(name: impl Into<String>, detail: impl Into<String>) -> Self {
        StackError::Configuration {
            name: name.into(),
            detail: detail.into(),
        }
    }

    /// Classify a component error raised for the component at `path`.
    pub(crate) fn from_component(path: &str, error: ComponentError) -> Self {
        match error {
            ComponentError::InvalidArgs { .. } | ComponentError::InvalidDescriptor { .. } => {
                StackError::schema(path, error)
            }
            other => StackError::configuration(path, other.to_string()),
        }
    }

    /// Classify a graph build failure of `vehicle`.
    pub(crate) fn from_build(vehicle: &str, error: BuildError) -> Self {
        match error {
            BuildError::Registry(RegistryError::NotFound(binding)) => StackError::NotFound {
                path: format!("vehicle '{vehicle}'"),
                binding,
            },
            BuildError::Registry(other) => StackError::configuration(vehicle, other.to_string()),
            BuildError::Graph(source) => StackError::Graph {
                vehicle: vehicle.to_string(),
                source,
            },
            BuildError::Resolve(source @ ResolveError::UnresolvedSource { .. }) => {
                StackError::UnresolvedSource {
                    vehicle: vehicle.to_string(),
                    source,
                }
            }
            BuildError::Resolve(other) => StackError::configuration(vehicle, other.to_string()),
            BuildError::Component { name, error } => {
                StackError::from_component(&format!("vehicle '{vehicle}' component '{name}'"), error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_errors_map_to_taxonomy() {
        let e = StackError::from_build(
            "ego",
            BuildError::Graph(GraphError::CycleDetected {
                members: vec!["a".into(), "b".into()],
            }),
        );
        assert_eq!(e.kind(), ErrorKind::Graph);
        assert!(e.to_string().contains("a, b"));

        let e = StackError::from_build(
            "ego",
            BuildError::Resolve(ResolveError::UnresolvedSource {
                component: "cam".into(),
                role: "default".into(),
                source_name: "rear".into(),
            }),
        );
        assert_eq!(e.kind(), ErrorKind::UnresolvedSource);
        assert!(e.to_string().contains("rear"));

        let e = StackError::from_build(
            "ego",
            BuildError::Resolve(ResolveError::DuplicateSource {
                component: "cam".into(),
                role: "default".into(),
                source_name: "rear".into(),
            }),
        );
        assert_eq!(e.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn component_errors_split_schema_and_configuration() {
        let e = StackError::from_component(
            "/vehicles/0/components/cam/args",
            ComponentError::InvalidArgs {
                binding: "cam".into(),
                detail: "bad".into(),
            },
        );
        assert_eq!(e.kind(), ErrorKind::Schema);

        let e = StackError::from_build(
            "ego",
            BuildError::Component {
                name: "fusion".into(),
                error: ComponentError::Configuration {
                    component: "fusion".into(),
                    reason: "only one source expected for role 'ego_sensors'".into(),
                },
            },
        );
        assert_eq!(e.kind(), ErrorKind::Configuration);
        assert!(e.to_string().contains("only one source expected"));
    }
}
