//! Vehicle configuration: a simulator-provided vehicle plus the components
//! configured on top of it.

use crate::error::StackError;
use crate::schema::{DefaultConf, apply_defaults};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use simwire_core::builder::build_components;
use simwire_core::dependency::ComponentConf;
use simwire_core::registry::ComponentRegistry;
use simwire_core::resolver::ComponentPool;
use std::collections::BTreeMap;
use tracing::debug;

/// Which simulator vehicle this configuration builds on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VehicleSource {
    /// Simulator name.
    pub simulator: String,
    /// Zero-based index into that simulator's vehicle list.
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VehicleConf {
    pub name: String,
    pub from: VehicleSource,
    /// Components keyed by name. Keys are the names other components use in
    /// their `from` clauses.
    #[serde(default)]
    pub components: BTreeMap<String, ComponentConf>,
}

impl VehicleConf {
    /// Parse a vehicle entry, checking every component binding against
    /// `registry` and validating its args with the bound factory.
    ///
    /// Sources are not resolved here; see [`VehicleConf::build`].
    pub fn import(raw: &Value, registry: &ComponentRegistry) -> Result<Self, StackError> {
        Self::import_at(raw, registry, &[], "")
    }

    pub(crate) fn import_at(
        raw: &Value,
        registry: &ComponentRegistry,
        defaults: &[DefaultConf],
        path: &str,
    ) -> Result<Self, StackError> {
        let root = if path.is_empty() { "/" } else { path };
        let mut vehicle = VehicleConf::deserialize(raw).map_err(|e| StackError::schema(root, e))?;

        for (key, conf) in vehicle.components.iter_mut() {
            let at = format!("{path}/components/{key}");
            if conf.name.is_empty() {
                conf.name = key.clone();
            }
            conf.validate_from(key)
                .map_err(|e| StackError::from_component(&format!("{at}/from"), e))?;

            let factory = registry
                .lookup(&conf.binding)
                .map_err(|_| StackError::NotFound {
                    path: format!("{at}/binding"),
                    binding: conf.binding.clone(),
                })?;
            let args = apply_defaults(defaults, &conf.binding, &conf.name, &conf.args);
            conf.args = factory
                .validate_args(&conf.binding, &args)
                .map_err(|e| StackError::from_component(&format!("{at}/args"), e))?;
        }

        debug!(
            vehicle = %vehicle.name,
            components = vehicle.components.len(),
            "imported vehicle"
        );
        Ok(vehicle)
    }

    /// Construct this vehicle's components on top of `base`, the components
    /// its simulator provides.
    pub fn build(
        &self,
        registry: &ComponentRegistry,
        base: &ComponentPool,
    ) -> Result<ComponentPool, StackError> {
        build_components(&self.components, registry, base)
            .map_err(|e| StackError::from_build(&self.name, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;
    use simwire_core::component::{Component, downcast};
    use simwire_core::test_utils::*;

    fn raw_vehicle() -> Value {
        json!({
            "name": "default_vehicle",
            "from": {"simulator": "test", "index": 0},
            "components": {
                WORLD_SENSOR: {
                    "binding": "dummy_sensor",
                    "name": "my_dummy_sensor",
                    "from": WORLD_SENSOR,
                    "args": {"freq": 10}
                }
            }
        })
    }

    #[test]
    fn import_parses_components() {
        let v = VehicleConf::import(&raw_vehicle(), &sample_registry()).unwrap();
        assert_eq!(v.from.simulator, "test");
        assert_eq!(v.from.index, 0);
        let c = &v.components[WORLD_SENSOR];
        assert_eq!(c.name, "my_dummy_sensor");
        assert_eq!(c.args, json!({"freq": 10}));
    }

    #[test]
    fn import_then_build_wraps_base_sensor() {
        let registry = sample_registry();
        let v = VehicleConf::import(&raw_vehicle(), &registry).unwrap();
        let pool = v.build(&registry, &base_pool()).unwrap();
        let sensor = downcast::<DummySensor>(pool.get(WORLD_SENSOR).unwrap()).unwrap();
        assert_eq!(sensor.freq(), 10);
        assert_eq!(sensor.name(), "my_dummy_sensor");
    }

    #[test]
    fn component_name_defaults_to_key() {
        let raw = json!({
            "name": "ego",
            "from": {"simulator": "sim", "index": 1},
            "components": {"front": {"binding": "dummy_sensor", "from": WORLD_SENSOR}}
        });
        let v = VehicleConf::import(&raw, &sample_registry()).unwrap();
        assert_eq!(v.components["front"].name, "front");
        // Args canonicalized by the factory.
        assert_eq!(v.components["front"].args, json!({"freq": 0}));
    }

    #[test]
    fn unknown_binding_fails_at_import() {
        let raw = json!({
            "name": "ego",
            "from": {"simulator": "sim", "index": 0},
            "components": {"front": {"binding": "lidar"}}
        });
        let err = VehicleConf::import(&raw, &sample_registry()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("/components/front/binding"), "got: {err}");
    }

    #[test]
    fn invalid_args_are_schema_errors() {
        let raw = json!({
            "name": "ego",
            "from": {"simulator": "sim", "index": 0},
            "components": {"front": {"binding": "dummy_sensor", "args": {"freq": "fast"}}}
        });
        let err = VehicleConf::import(&raw, &sample_registry()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(err.to_string().contains("/components/front/args"), "got: {err}");
    }

    #[test]
    fn empty_source_name_is_schema_error() {
        let raw = json!({
            "name": "ego",
            "from": {"simulator": "sim", "index": 0},
            "components": {"front": {"binding": "dummy_sensor", "from": ""}}
        });
        let err = VehicleConf::import(&raw, &sample_registry()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        let text = err.to_string();
        assert!(text.contains("/components/front/from"), "got: {text}");
        assert!(text.contains("invalid dependency descriptor"), "got: {text}");
    }

    #[test]
    fn negative_index_rejected() {
        let raw = json!({"name": "ego", "from": {"simulator": "sim", "index": -1}});
        let err = VehicleConf::import(&raw, &sample_registry()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn component_defaults_apply_before_validation() {
        let defaults: Vec<DefaultConf> =
            serde_json::from_value(json!([{"binding": "dummy_sensor", "args": {"freq": 25}}]))
                .unwrap();
        let raw = json!({
            "name": "ego",
            "from": {"simulator": "sim", "index": 0},
            "components": {
                "a": {"binding": "dummy_sensor", "from": WORLD_SENSOR},
                "b": {"binding": "dummy_sensor", "from": WORLD_SENSOR, "args": {"freq": 5}}
            }
        });
        let v = VehicleConf::import_at(&raw, &sample_registry(), &defaults, "/vehicles/0").unwrap();
        assert_eq!(v.components["a"].args, json!({"freq": 25}));
        assert_eq!(v.components["b"].args, json!({"freq": 5}));
    }

    #[test]
    fn build_failure_names_vehicle() {
        let raw = json!({
            "name": "ego",
            "from": {"simulator": "sim", "index": 0},
            "components": {"front": {"binding": "dummy_sensor", "from": "rear"}}
        });
        let registry = sample_registry();
        let v = VehicleConf::import(&raw, &registry).unwrap();
        let err = v.build(&registry, &base_pool()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedSource);
        assert!(err.to_string().contains("'ego'"), "got: {err}");
    }
}
