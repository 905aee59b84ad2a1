//! Constructed runtime components and their kinds.
//!
//! A component is produced once by its factory and then shared between the
//! vehicle's component pool and every downstream component that reads from
//! it. Components are immutable after construction, so handles are plain
//! `Arc<dyn Component>`.
//!
//! Recovering a concrete type goes through [`downcast`] or [`expect_kind`],
//! both of which return a typed [`ComponentError`] on mismatch.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Component kinds
// ---------------------------------------------------------------------------

/// The closed set of component kinds a vehicle can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    ObjectSensor,
    EgoSensor,
    LaneSensor,
    WorldSensor,
    DriverRequest,
    Actuator,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentKind::ObjectSensor => write!(f, "object_sensor"),
            ComponentKind::EgoSensor => write!(f, "ego_sensor"),
            ComponentKind::LaneSensor => write!(f, "lane_sensor"),
            ComponentKind::WorldSensor => write!(f, "world_sensor"),
            ComponentKind::DriverRequest => write!(f, "driver_request"),
            ComponentKind::Actuator => write!(f, "actuator"),
        }
    }
}

// ---------------------------------------------------------------------------
// Component trait
// ---------------------------------------------------------------------------

/// A named, constructed runtime object such as a sensor or actuator.
pub trait Component: Any + Send + Sync + fmt::Debug {
    /// The instance name given at construction.
    fn name(&self) -> &str;

    /// The kind of this component.
    fn kind(&self) -> ComponentKind;

    /// Borrow as `&dyn Any` for type-safe access to the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Convert a shared handle into a shared `Any` for typed recovery.
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Shared handle to a constructed component.
pub type SharedComponent = Arc<dyn Component>;

/// Recover the concrete component type behind a shared handle.
pub fn downcast<T: Component>(component: &SharedComponent) -> Result<Arc<T>, ComponentError> {
    let name = component.name().to_string();
    Arc::clone(component)
        .into_any()
        .downcast::<T>()
        .map_err(|_| ComponentError::WrongType {
            name,
            expected: std::any::type_name::<T>(),
        })
}

/// Check that a component is of the given kind, returning a clone of the handle.
pub fn expect_kind(
    component: &SharedComponent,
    expected: ComponentKind,
) -> Result<SharedComponent, ComponentError> {
    let found = component.kind();
    if found == expected {
        Ok(Arc::clone(component))
    } else {
        Err(ComponentError::WrongKind {
            name: component.name().to_string(),
            expected,
            found,
        })
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised by factories and component accessors.
#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    /// The factory expected a role that the dependency descriptor did not provide.
    #[error("component '{component}': source role '{role}' not found")]
    MissingRole { component: String, role: String },

    /// A factory-specific semantic rule was violated.
    #[error("component '{component}': {reason}")]
    Configuration { component: String, reason: String },

    /// The args payload failed the factory's own schema.
    #[error("invalid args for binding '{binding}': {detail}")]
    InvalidArgs { binding: String, detail: String },

    /// The `from` clause is malformed.
    #[error("component '{component}': invalid dependency descriptor: {detail}")]
    InvalidDescriptor { component: String, detail: String },

    /// A source had a different kind than the factory requires.
    #[error("component '{name}' is a {found}, expected {expected}")]
    WrongKind {
        name: String,
        expected: ComponentKind,
        found: ComponentKind,
    },

    /// A downcast to a concrete type failed.
    #[error("component '{name}' is not a {expected}")]
    WrongType { name: String, expected: &'static str },
}
