//! Shared test helpers for unit tests, integration tests, and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so downstream
//! crates can enable them through the `test-utils` feature.

use crate::component::{Component, ComponentError, ComponentKind, SharedComponent, expect_kind};
use crate::dependency::{ComponentConf, DependencyDescriptor};
use crate::factory::{ComponentFactory, canonical_args, parse_args};
use crate::registry::{ComponentRegistry, ComponentRegistryBuilder};
use crate::resolver::{ComponentPool, ResolvedSources};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

// ===========================================================================
// Well-known base component names
// ===========================================================================

pub const WORLD_SENSOR: &str = "sim::default_world_sensor";
pub const EGO_SENSOR: &str = "sim::default_ego_sensor";

// ===========================================================================
// No-op component
// ===========================================================================

/// A component with a name and a kind and nothing else.
#[derive(Debug)]
pub struct NopComponent {
    name: String,
    kind: ComponentKind,
}

impl NopComponent {
    pub fn new(name: &str, kind: ComponentKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }
}

impl Component for NopComponent {
    fn name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> ComponentKind {
        self.kind
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

pub fn nop(name: &str, kind: ComponentKind) -> SharedComponent {
    Arc::new(NopComponent::new(name, kind))
}

/// Pool standing in for what a simulator binding provides to one vehicle.
pub fn base_pool() -> ComponentPool {
    let mut pool = ComponentPool::new();
    pool.insert(WORLD_SENSOR, nop(WORLD_SENSOR, ComponentKind::WorldSensor));
    pool.insert(EGO_SENSOR, nop(EGO_SENSOR, ComponentKind::EgoSensor));
    pool
}

// ===========================================================================
// Dummy sensor: wraps a single implicit source
// ===========================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DummySensorConf {
    pub freq: u64,
}

#[derive(Debug)]
pub struct DummySensor {
    name: String,
    freq: u64,
    sources: Vec<SharedComponent>,
}

impl DummySensor {
    pub fn freq(&self) -> u64 {
        self.freq
    }

    pub fn sources(&self) -> &[SharedComponent] {
        &self.sources
    }
}

impl Component for DummySensor {
    fn name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> ComponentKind {
        ComponentKind::ObjectSensor
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[derive(Debug)]
pub struct DummySensorFactory;

impl ComponentFactory for DummySensorFactory {
    fn description(&self) -> &str {
        "object sensor wrapping a single upstream source"
    }

    fn validate_args(&self, binding: &str, args: &Value) -> Result<Value, ComponentError> {
        canonical_args::<DummySensorConf>(binding, args)
    }

    fn make(
        &self,
        name: &str,
        args: &Value,
        sources: &ResolvedSources,
    ) -> Result<SharedComponent, ComponentError> {
        let conf: DummySensorConf = parse_args("dummy_sensor", args)?;
        let sources = sources.implicit(name)?.to_vec();
        Ok(Arc::new(DummySensor {
            name: name.to_string(),
            freq: conf.freq,
            sources,
        }))
    }
}

// ===========================================================================
// Fusion sensor: object sensors fan-in plus at most one ego sensor
// ===========================================================================

#[derive(Debug)]
pub struct FusionSensor {
    name: String,
    freq: u64,
    object_sensors: Vec<SharedComponent>,
    ego_sensor: Option<SharedComponent>,
}

impl FusionSensor {
    pub fn freq(&self) -> u64 {
        self.freq
    }

    pub fn object_sensors(&self) -> &[SharedComponent] {
        &self.object_sensors
    }

    pub fn ego_sensor(&self) -> Option<&SharedComponent> {
        self.ego_sensor.as_ref()
    }
}

impl Component for FusionSensor {
    fn name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> ComponentKind {
        ComponentKind::ObjectSensor
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[derive(Debug)]
pub struct FusionSensorFactory;

impl ComponentFactory for FusionSensorFactory {
    fn description(&self) -> &str {
        "fuse several object sensors with an optional ego sensor"
    }

    fn validate_args(&self, binding: &str, args: &Value) -> Result<Value, ComponentError> {
        canonical_args::<DummySensorConf>(binding, args)
    }

    fn make(
        &self,
        name: &str,
        args: &Value,
        sources: &ResolvedSources,
    ) -> Result<SharedComponent, ComponentError> {
        let conf: DummySensorConf = parse_args("fusion_sensor", args)?;
        sources.require_roles(name, &["object_sensors", "ego_sensors"])?;
        let object_sensors = sources
            .role(name, "object_sensors")?
            .iter()
            .map(|s| expect_kind(s, ComponentKind::ObjectSensor))
            .collect::<Result<Vec<_>, _>>()?;
        let ego_sensor = sources
            .at_most_one(name, "ego_sensors")?
            .map(|s| expect_kind(s, ComponentKind::EgoSensor))
            .transpose()?;
        Ok(Arc::new(FusionSensor {
            name: name.to_string(),
            freq: conf.freq,
            object_sensors,
            ego_sensor,
        }))
    }
}

// ===========================================================================
// Counting factory: records how often `make` ran
// ===========================================================================

#[derive(Debug)]
pub struct CountingFactory {
    inner: Arc<dyn ComponentFactory>,
    calls: Arc<AtomicUsize>,
}

impl ComponentFactory for CountingFactory {
    fn description(&self) -> &str {
        self.inner.description()
    }

    fn validate_args(&self, binding: &str, args: &Value) -> Result<Value, ComponentError> {
        self.inner.validate_args(binding, args)
    }

    fn make(
        &self,
        name: &str,
        args: &Value,
        sources: &ResolvedSources,
    ) -> Result<SharedComponent, ComponentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.make(name, args, sources)
    }
}

// ===========================================================================
// Registries and configs
// ===========================================================================

/// Registry with `dummy_sensor` and `fusion_sensor`.
pub fn sample_registry() -> ComponentRegistry {
    let mut builder = ComponentRegistryBuilder::new();
    builder
        .register("dummy_sensor", Arc::new(DummySensorFactory))
        .unwrap()
        .register("fusion_sensor", Arc::new(FusionSensorFactory))
        .unwrap();
    builder.build()
}

/// Same bindings as [`sample_registry`], plus a shared `make` call counter.
pub fn counting_registry() -> (ComponentRegistry, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut builder = ComponentRegistryBuilder::new();
    builder
        .register(
            "dummy_sensor",
            Arc::new(CountingFactory {
                inner: Arc::new(DummySensorFactory),
                calls: Arc::clone(&calls),
            }),
        )
        .unwrap()
        .register(
            "fusion_sensor",
            Arc::new(CountingFactory {
                inner: Arc::new(FusionSensorFactory),
                calls: Arc::clone(&calls),
            }),
        )
        .unwrap();
    (builder.build(), calls)
}

pub fn make_calls(calls: &AtomicUsize) -> usize {
    calls.load(Ordering::SeqCst)
}

pub fn dummy_conf(from: &str, freq: u64) -> ComponentConf {
    ComponentConf::new(
        "dummy_sensor",
        "",
        DependencyDescriptor::single(from),
        json!({ "freq": freq }),
    )
}

pub fn fusion_conf(objects: &[&str], egos: &[&str]) -> ComponentConf {
    ComponentConf::new(
        "fusion_sensor",
        "",
        DependencyDescriptor::roles([
            ("object_sensors", objects.to_vec()),
            ("ego_sensors", egos.to_vec()),
        ]),
        Value::Null,
    )
}
