//! Typed configuration entities of a stack.
//!
//! Every struct here deserializes from a (possibly partial) JSON-shaped value
//! and fills the rest from its `Default`. Serializing yields the total,
//! canonical form. Entities whose `args` belong to a plugin keep them as an
//! untyped `Value`.

use crate::policy::{SecurityConf, WatchdogConf};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ===========================================================================
// Engine
// ===========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConf {
    pub keep_alive: bool,
    pub hooks: HooksConf,
    /// JSON pointers removed from every later layer before it is merged.
    pub ignore: Vec<String>,
    pub output: OutputConf,
    /// Template; placeholders are expanded by the caller.
    pub registry_path: String,
    pub plugin_path: Vec<String>,
    pub plugins: PluginPolicy,
    /// Milliseconds.
    pub polling_interval: u64,
    pub security: SecurityConf,
    pub triggers: TriggerPolicy,
    pub watchdog: WatchdogConf,
}

impl Default for EngineConf {
    fn default() -> Self {
        Self {
            keep_alive: false,
            hooks: HooksConf::default(),
            ignore: Vec::new(),
            output: OutputConf::default(),
            registry_path: "${XDG_DATA_HOME-${HOME}/.local/share}/simwire/registry".to_string(),
            plugin_path: Vec::new(),
            plugins: PluginPolicy::default(),
            polling_interval: 100,
            security: SecurityConf::default(),
            triggers: TriggerPolicy::default(),
            watchdog: WatchdogConf::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HooksConf {
    pub pre_connect: Vec<HookConf>,
    pub post_disconnect: Vec<HookConf>,
}

impl HooksConf {
    pub fn is_empty(&self) -> bool {
        self.pre_connect.is_empty() && self.post_disconnect.is_empty()
    }
}

/// A lifecycle hook: a shell command line or an explicit executable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HookConf {
    Shell(String),
    Exec(ExecHook),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecHook {
    pub path: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub mode: HookMode,
    #[serde(default)]
    pub ignore_failure: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookMode {
    #[default]
    Sync,
    Async,
    Detach,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConf {
    pub clobber: bool,
    /// Template; placeholders are expanded by the caller.
    pub path: String,
    pub files: OutputFiles,
}

impl Default for OutputConf {
    fn default() -> Self {
        Self {
            clobber: true,
            path: "${SIMWIRE_SIMULATION_UUID}".to_string(),
            files: OutputFiles::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputFiles {
    pub config: String,
    pub result: String,
    pub triggers: String,
}

impl Default for OutputFiles {
    fn default() -> Self {
        Self {
            config: "config.json".to_string(),
            result: "result.json".to_string(),
            triggers: "triggers.json".to_string(),
        }
    }
}

/// Engine-wide plugin loading policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PluginPolicy {
    pub allow_clobber: bool,
    pub ignore_failure: bool,
    pub ignore_missing: bool,
}

impl Default for PluginPolicy {
    fn default() -> Self {
        Self {
            allow_clobber: true,
            ignore_failure: false,
            ignore_missing: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TriggerPolicy {
    pub ignore_source: bool,
}

// ===========================================================================
// Server and simulation
// ===========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConf {
    pub listen: bool,
    pub listen_address: String,
    pub listen_port: u16,
    pub listen_threads: u32,
    pub api_prefix: String,
    pub static_prefix: String,
}

impl Default for ServerConf {
    fn default() -> Self {
        Self {
            listen: true,
            listen_address: "127.0.0.1".to_string(),
            listen_port: 8080,
            listen_threads: 10,
            api_prefix: "/api".to_string(),
            static_prefix: String::new(),
        }
    }
}

impl ServerConf {
    /// Returns the offending field and reason.
    pub fn validate(&self) -> Result<(), (&'static str, String)> {
        if self.listen_threads == 0 {
            return Err(("listen_threads", "must be at least 1".to_string()));
        }
        for (field, prefix) in [
            ("api_prefix", &self.api_prefix),
            ("static_prefix", &self.static_prefix),
        ] {
            if prefix.is_empty() {
                continue;
            }
            if !prefix.starts_with('/') || prefix.ends_with('/') {
                return Err((
                    field,
                    format!("'{prefix}' must start with '/' and not end with '/'"),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConf {
    /// Nanoseconds.
    pub model_step_width: u64,
    pub abort_on_controller_failure: bool,
    pub controller_retry_limit: u64,
    /// Milliseconds.
    pub controller_retry_sleep: u64,
}

impl Default for SimulationConf {
    fn default() -> Self {
        Self {
            model_step_width: 20_000_000,
            abort_on_controller_failure: true,
            controller_retry_limit: 1000,
            controller_retry_sleep: 1,
        }
    }
}

// ===========================================================================
// Defaults
// ===========================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefaultsConf {
    pub simulators: Vec<DefaultConf>,
    pub controllers: Vec<DefaultConf>,
    pub components: Vec<DefaultConf>,
}

/// Args applied to every entity matching all present selectors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultConf {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub args: Value,
}

impl DefaultConf {
    pub fn matches(&self, binding: &str, name: &str) -> bool {
        self.binding.as_deref().is_none_or(|b| b == binding)
            && self.name.as_deref().is_none_or(|n| n == name)
    }
}

/// Merge `over` onto `base`: objects merge recursively, anything else in
/// `over` replaces what is in `base`.
pub fn deep_merge(base: &mut Value, over: Value) {
    match (base, over) {
        (Value::Object(base), Value::Object(over)) => {
            for (key, value) in over {
                match base.get_mut(&key) {
                    Some(slot) => deep_merge(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, over) => *base = over,
    }
}

/// Args of an entity after applying every matching default in list order,
/// then its explicit args. Missing args become an empty object.
pub fn apply_defaults(defaults: &[DefaultConf], binding: &str, name: &str, explicit: &Value) -> Value {
    let mut args = Value::Object(Map::new());
    for d in defaults.iter().filter(|d| d.matches(binding, name)) {
        if !d.args.is_null() {
            deep_merge(&mut args, d.args.clone());
        }
    }
    if !explicit.is_null() {
        deep_merge(&mut args, explicit.clone());
    }
    args
}

// ===========================================================================
// Simulators and controllers
// ===========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulatorConf {
    pub binding: String,
    /// Defaults to `binding`.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControllerConf {
    pub binding: String,
    /// Defaults to `binding`.
    #[serde(default)]
    pub name: String,
    /// Name of the vehicle this controller drives.
    pub vehicle: String,
    #[serde(default)]
    pub args: Value,
}

// ===========================================================================
// Triggers, logging, plugins
// ===========================================================================

fn default_trigger_source() -> String {
    "filesystem".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TriggerConf {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default = "default_trigger_source")]
    pub source: String,
    /// Event name or `{name, ...}` object.
    pub event: Value,
    /// Action name, `name=arg` shorthand, or `{name, ...}` object.
    pub action: Value,
    #[serde(default)]
    pub sticky: bool,
    #[serde(default)]
    pub conceal: bool,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Critical,
    Off,
}

/// One logger filter. Filters are matched in list order, first match wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConf {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<LogLevel>,
}

/// A plugin to load; unset policy fields fall back to `engine.plugins`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginConf {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_clobber: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_failure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_missing: Option<bool>,
}

impl PluginConf {
    /// This plugin's policy with engine-wide defaults filled in.
    pub fn policy(&self, engine: &PluginPolicy) -> PluginPolicy {
        PluginPolicy {
            allow_clobber: self.allow_clobber.unwrap_or(engine.allow_clobber),
            ignore_failure: self.ignore_failure.unwrap_or(engine.ignore_failure),
            ignore_missing: self.ignore_missing.unwrap_or(engine.ignore_missing),
        }
    }
}
