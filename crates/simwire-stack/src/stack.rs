//! The configuration stack.
//!
//! Import runs in two phases:
//!
//! 1. **Layering** -- the root layer and its includes (depth-first, in list
//!    order, before the including layer's own fields) are checked against the
//!    security policy and merged as untyped values. `engine.ignore` pointers
//!    collected so far are removed from each layer before it is merged.
//! 2. **Finalizing** -- the merged value is deserialized section by section
//!    into typed entities, defaults are applied to simulators, controllers and
//!    components, and vehicle components are checked against the registry.
//!
//! Export is `serde_json` serialization of the typed tree. Object keys come
//! out sorted, so exporting an unchanged stack is byte-identical every time.

use crate::error::StackError;
use crate::loader::{FsIncludeResolver, IncludeResolver, read_value};
use crate::merge::{declares_hooks, find_command_trigger, merge_layer, remove_pointer};
use crate::policy::{SecurityConf, SecurityGate, SecurityPatch};
use crate::schema::{
    ControllerConf, DefaultsConf, EngineConf, LoggingConf, PluginConf, ServerConf,
    SimulationConf, SimulatorConf, TriggerConf, apply_defaults,
};
use crate::vehicle::VehicleConf;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use simwire_core::registry::ComponentRegistry;
use simwire_core::resolver::ComponentPool;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// The only stack schema version this crate reads.
pub const STACK_VERSION: &str = "4";

/// Origin reported for a layer that was passed in as a value.
const INPUT_ORIGIN: &str = "<input>";

// ===========================================================================
// Import options
// ===========================================================================

/// How a stack is imported.
#[derive(Debug, Clone, Copy)]
pub struct ImportOptions<'a> {
    /// Upper bound on the security policy. Layers may tighten it, never
    /// loosen past it.
    pub security: SecurityConf,
    /// Where `include` entries are loaded from.
    pub resolver: &'a dyn IncludeResolver,
}

impl Default for ImportOptions<'static> {
    fn default() -> Self {
        Self {
            security: SecurityConf::unrestricted(),
            resolver: &FsIncludeResolver,
        }
    }
}

// ===========================================================================
// Stack
// ===========================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stack {
    pub version: String,
    pub engine: EngineConf,
    pub server: ServerConf,
    pub simulation: SimulationConf,
    pub defaults: DefaultsConf,
    pub simulators: Vec<SimulatorConf>,
    pub vehicles: Vec<VehicleConf>,
    pub controllers: Vec<ControllerConf>,
    pub triggers: Vec<TriggerConf>,
    pub logging: Vec<LoggingConf>,
    pub plugins: Vec<PluginConf>,
}

impl Default for Stack {
    fn default() -> Self {
        Self {
            version: STACK_VERSION.to_string(),
            engine: EngineConf::default(),
            server: ServerConf::default(),
            simulation: SimulationConf::default(),
            defaults: DefaultsConf::default(),
            simulators: Vec::new(),
            vehicles: Vec::new(),
            controllers: Vec::new(),
            triggers: Vec::new(),
            logging: Vec::new(),
            plugins: Vec::new(),
        }
    }
}

impl Stack {
    /// Import a stack from an untyped value, following includes on the
    /// filesystem relative to the working directory.
    pub fn import(raw: Value, registry: &ComponentRegistry) -> Result<Self, StackError> {
        Self::import_with(raw, registry, &ImportOptions::default())
    }

    pub fn import_with(
        raw: Value,
        registry: &ComponentRegistry,
        options: &ImportOptions<'_>,
    ) -> Result<Self, StackError> {
        Self::import_from(raw, Path::new(INPUT_ORIGIN), registry, options)
    }

    /// Load and import a stack file (JSON, TOML or RON by extension).
    /// Relative includes resolve against the including file's directory.
    pub fn from_file(path: &Path, registry: &ComponentRegistry) -> Result<Self, StackError> {
        let raw = read_value(path)?;
        Self::import_from(raw, path, registry, &ImportOptions::default())
    }

    fn import_from(
        raw: Value,
        origin: &Path,
        registry: &ComponentRegistry,
        options: &ImportOptions<'_>,
    ) -> Result<Self, StackError> {
        let mut layers = Layers {
            resolver: options.resolver,
            security: SecurityGate::new(options.security),
            ignore: Vec::new(),
            merged: Value::Object(Map::new()),
        };
        layers.import(raw, origin, 0)?;
        let stack = Self::finalize(layers.finish(origin)?, registry)?;
        info!(
            origin = %origin.display(),
            simulators = stack.simulators.len(),
            vehicles = stack.vehicles.len(),
            controllers = stack.controllers.len(),
            triggers = stack.triggers.len(),
            "imported stack"
        );
        Ok(stack)
    }

    /// Deserialize a merged value into the typed tree.
    fn finalize(merged: Value, registry: &ComponentRegistry) -> Result<Self, StackError> {
        let Value::Object(mut root) = merged else {
            return Err(StackError::schema("/", "stack must be an object"));
        };

        let version: String = take(&mut root, "version")?;
        let engine: EngineConf = take(&mut root, "engine")?;
        engine
            .watchdog
            .validate()
            .map_err(|detail| StackError::schema("/engine/watchdog/state_timeouts", detail))?;
        let server: ServerConf = take(&mut root, "server")?;
        server
            .validate()
            .map_err(|(field, detail)| StackError::schema(format!("/server/{field}"), detail))?;
        let simulation: SimulationConf = take(&mut root, "simulation")?;
        let defaults: DefaultsConf = take(&mut root, "defaults")?;

        let mut simulators: Vec<SimulatorConf> = take(&mut root, "simulators")?;
        for sim in &mut simulators {
            if sim.name.is_empty() {
                sim.name = sim.binding.clone();
            }
            sim.args = apply_defaults(&defaults.simulators, &sim.binding, &sim.name, &sim.args);
        }

        let mut controllers: Vec<ControllerConf> = take(&mut root, "controllers")?;
        for ctl in &mut controllers {
            if ctl.name.is_empty() {
                ctl.name = ctl.binding.clone();
            }
            ctl.args = apply_defaults(&defaults.controllers, &ctl.binding, &ctl.name, &ctl.args);
        }

        let raw_vehicles: Vec<Value> = take(&mut root, "vehicles")?;
        let vehicles = raw_vehicles
            .iter()
            .enumerate()
            .map(|(i, raw)| {
                VehicleConf::import_at(raw, registry, &defaults.components, &format!("/vehicles/{i}"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let triggers: Vec<TriggerConf> = take(&mut root, "triggers")?;
        let logging: Vec<LoggingConf> = take(&mut root, "logging")?;
        let plugins: Vec<PluginConf> = take(&mut root, "plugins")?;

        if let Some(key) = root.keys().next() {
            return Err(StackError::schema(format!("/{key}"), "unknown field"));
        }

        debug!(
            simulator_defaults = defaults.simulators.len(),
            controller_defaults = defaults.controllers.len(),
            component_defaults = defaults.components.len(),
            "applied defaults"
        );

        Ok(Stack {
            version,
            engine,
            server,
            simulation,
            defaults,
            simulators,
            vehicles,
            controllers,
            triggers,
            logging,
            plugins,
        })
    }

    // -----------------------------------------------------------------------
    // Export
    // -----------------------------------------------------------------------

    /// The canonical, fully-defaulted form.
    pub fn to_json(&self) -> Result<Value, StackError> {
        serde_json::to_value(self).map_err(|e| StackError::schema("/", e))
    }

    /// The canonical form as pretty-printed JSON with sorted keys.
    pub fn to_canonical_string(&self) -> Result<String, StackError> {
        serde_json::to_string_pretty(&self.to_json()?).map_err(|e| StackError::schema("/", e))
    }

    // -----------------------------------------------------------------------
    // Cross-reference checks and lookups
    // -----------------------------------------------------------------------

    /// Check references between entities of a complete stack: names are unique
    /// per category, vehicles name configured simulators, controllers name
    /// configured vehicles.
    pub fn validate(&self) -> Result<(), StackError> {
        let simulators = unique_names("simulators", self.simulators.iter().map(|s| s.name.as_str()))?;
        let vehicles = unique_names("vehicles", self.vehicles.iter().map(|v| v.name.as_str()))?;
        unique_names("controllers", self.controllers.iter().map(|c| c.name.as_str()))?;

        for v in &self.vehicles {
            if !simulators.contains(v.from.simulator.as_str()) {
                return Err(StackError::configuration(
                    format!("vehicle '{}'", v.name),
                    format!("references unknown simulator '{}'", v.from.simulator),
                ));
            }
        }
        for c in &self.controllers {
            if !vehicles.contains(c.vehicle.as_str()) {
                return Err(StackError::configuration(
                    format!("controller '{}'", c.name),
                    format!("references unknown vehicle '{}'", c.vehicle),
                ));
            }
        }
        Ok(())
    }

    pub fn simulator(&self, name: &str) -> Option<&SimulatorConf> {
        self.simulators.iter().find(|s| s.name == name)
    }

    pub fn vehicle(&self, name: &str) -> Option<&VehicleConf> {
        self.vehicles.iter().find(|v| v.name == name)
    }

    pub fn controller(&self, name: &str) -> Option<&ControllerConf> {
        self.controllers.iter().find(|c| c.name == name)
    }

    /// Build the named vehicle's components on top of its simulator's `base`.
    pub fn build_vehicle(
        &self,
        name: &str,
        registry: &ComponentRegistry,
        base: &ComponentPool,
    ) -> Result<ComponentPool, StackError> {
        let vehicle = self.vehicle(name).ok_or_else(|| {
            StackError::configuration(format!("vehicle '{name}'"), "not configured")
        })?;
        vehicle.build(registry, base)
    }
}

/// Remove and deserialize a top-level section; absent sections default.
fn take<T: DeserializeOwned + Default>(root: &mut Map<String, Value>, key: &str) -> Result<T, StackError> {
    match root.remove(key) {
        Some(value) => serde_json::from_value(value).map_err(|e| StackError::schema(format!("/{key}"), e)),
        None => Ok(T::default()),
    }
}

fn unique_names<'a>(
    category: &str,
    names: impl Iterator<Item = &'a str>,
) -> Result<BTreeSet<&'a str>, StackError> {
    let mut seen = BTreeSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(StackError::configuration(
                format!("/{category}"),
                format!("duplicate name '{name}'"),
            ));
        }
    }
    Ok(seen)
}

fn check_version(layer: &Value, origin: &str) -> Result<(), StackError> {
    match layer.get("version") {
        Some(Value::String(v)) if v == STACK_VERSION => Ok(()),
        found => Err(StackError::Version {
            origin: origin.to_string(),
            found: match found {
                Some(Value::String(v)) => v.clone(),
                Some(other) => other.to_string(),
                None => "none".to_string(),
            },
            expected: STACK_VERSION,
        }),
    }
}

/// Reject hooks and command actions in `content` that `policy` disables.
fn check_gated_content(content: &Value, policy: &SecurityConf, origin: &str) -> Result<(), StackError> {
    if !policy.enable_hooks_section && content.pointer("/engine/hooks").is_some_and(declares_hooks) {
        warn!(origin, "rejected hooks section");
        return Err(StackError::security(
            origin,
            "hooks section is disabled by security policy",
        ));
    }
    if !policy.enable_command_action {
        if let Some(i) = content.get("triggers").and_then(find_command_trigger) {
            warn!(origin, trigger = i, "rejected command action");
            return Err(StackError::security(
                origin,
                format!("command action in /triggers/{i} is disabled by security policy"),
            ));
        }
    }
    Ok(())
}

// ===========================================================================
// Layering
// ===========================================================================

struct Layers<'a> {
    resolver: &'a dyn IncludeResolver,
    security: SecurityGate,
    /// Pointers removed from every layer merged from now on.
    ignore: Vec<String>,
    merged: Value,
}

impl Layers<'_> {
    fn import(&mut self, mut layer: Value, origin: &Path, depth: usize) -> Result<(), StackError> {
        let origin_name = origin.display().to_string();
        debug!(origin = %origin_name, depth, "importing stack layer");

        if !layer.is_object() {
            return Err(StackError::schema(origin_name, "stack layer must be an object"));
        }
        check_version(&layer, &origin_name)?;
        self.apply_ignore(&mut layer, &origin_name);

        if let Some(section) = layer.pointer("/engine/security") {
            let patch: SecurityPatch = serde_json::from_value(section.clone())
                .map_err(|e| StackError::schema("/engine/security", e))?;
            if patch.max_include_depth == Some(0) {
                return Err(StackError::schema(
                    "/engine/security/max_include_depth",
                    "must be at least 1",
                ));
            }
            self.security.apply(&patch);
        }
        let policy = *self.security.current();
        check_gated_content(&layer, &policy, &origin_name)?;

        let includes = layer.as_object_mut().and_then(|obj| obj.remove("include"));
        if let Some(includes) = includes {
            let targets: Vec<String> =
                serde_json::from_value(includes).map_err(|e| StackError::schema("/include", e))?;
            if !targets.is_empty() {
                if !policy.enable_include_section {
                    warn!(origin = %origin_name, "rejected include section");
                    return Err(StackError::security(
                        origin_name,
                        "include section is disabled by security policy",
                    ));
                }
                if depth >= policy.max_include_depth {
                    warn!(origin = %origin_name, depth, "rejected include beyond maximum depth");
                    return Err(StackError::security(
                        origin_name,
                        format!(
                            "include depth exceeds maximum of {}",
                            policy.max_include_depth
                        ),
                    ));
                }
                for target in &targets {
                    let (path, value) = self.resolver.resolve(target, origin)?;
                    debug!(origin = %origin_name, include = %path.display(), "resolved include");
                    self.import(value, &path, depth + 1)?;
                }
                // Includes may have added pointers that apply to this layer.
                self.apply_ignore(&mut layer, &origin_name);
            }
        }

        let own_ignore: Vec<String> = match layer.pointer("/engine/ignore") {
            Some(v) => serde_json::from_value(v.clone())
                .map_err(|e| StackError::schema("/engine/ignore", e))?,
            None => Vec::new(),
        };
        merge_layer(&mut self.merged, layer);
        self.ignore.extend(own_ignore);
        Ok(())
    }

    fn apply_ignore(&self, layer: &mut Value, origin: &str) {
        for pointer in &self.ignore {
            if remove_pointer(layer, pointer) {
                debug!(origin, pointer = %pointer, "ignored section");
            }
        }
    }

    /// The merged value, with `engine.security` set to the effective policy.
    ///
    /// A layer merged late may disable a gate after earlier layers already
    /// used it, so the merged content is checked again under the final policy.
    fn finish(self, origin: &Path) -> Result<Value, StackError> {
        let policy = *self.security.current();
        check_gated_content(&self.merged, &policy, &origin.display().to_string())?;

        let mut merged = self.merged;
        let security = serde_json::to_value(policy)
            .map_err(|e| StackError::schema("/engine/security", e))?;
        if let Some(root) = merged.as_object_mut() {
            let engine = root
                .entry("engine")
                .or_insert_with(|| Value::Object(Map::new()));
            if let Some(engine) = engine.as_object_mut() {
                engine.insert("security".to_string(), security);
            }
        }
        Ok(merged)
    }
}
