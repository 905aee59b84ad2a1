//! Security and watchdog policies.
//!
//! The security policy gates structural features of the stack (includes,
//! hooks, command actions) and is enforced by the importer at parse time. The
//! watchdog policy is only data: a timeout table consulted by whatever
//! supervises the simulation lifecycle.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use tracing::debug;

// ===========================================================================
// Security
// ===========================================================================

/// Gates on what a stack layer may contain.
///
/// Command actions are off unless explicitly enabled; includes and hooks are
/// on unless explicitly disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SecurityConf {
    pub enable_command_action: bool,
    pub enable_include_section: bool,
    pub enable_hooks_section: bool,
    pub max_include_depth: usize,
}

impl Default for SecurityConf {
    fn default() -> Self {
        Self {
            enable_command_action: false,
            enable_include_section: true,
            enable_hooks_section: true,
            max_include_depth: 64,
        }
    }
}

impl SecurityConf {
    /// Ceiling that permits everything a layer may ask for.
    pub fn unrestricted() -> Self {
        Self {
            enable_command_action: true,
            enable_include_section: true,
            enable_hooks_section: true,
            max_include_depth: 64,
        }
    }

    /// Ceiling for untrusted input: no includes, hooks or commands.
    pub fn secure() -> Self {
        Self {
            enable_command_action: false,
            enable_include_section: false,
            enable_hooks_section: false,
            max_include_depth: 1,
        }
    }

    /// The stricter of `self` and `ceiling`, field by field.
    pub fn clamp(&self, ceiling: &SecurityConf) -> SecurityConf {
        SecurityConf {
            enable_command_action: self.enable_command_action && ceiling.enable_command_action,
            enable_include_section: self.enable_include_section && ceiling.enable_include_section,
            enable_hooks_section: self.enable_hooks_section && ceiling.enable_hooks_section,
            max_include_depth: self.max_include_depth.min(ceiling.max_include_depth),
        }
    }
}

/// The `engine.security` section of a single layer. Absent fields inherit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecurityPatch {
    pub enable_command_action: Option<bool>,
    pub enable_include_section: Option<bool>,
    pub enable_hooks_section: Option<bool>,
    pub max_include_depth: Option<usize>,
}

/// Security policy as it evolves across layers.
///
/// `current` is the policy in effect. `ceiling` bounds every later change:
/// disabling a gate lowers the ceiling too, so it cannot be re-enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityGate {
    ceiling: SecurityConf,
    current: SecurityConf,
}

impl SecurityGate {
    pub fn new(ceiling: SecurityConf) -> Self {
        Self {
            ceiling,
            current: SecurityConf::default().clamp(&ceiling),
        }
    }

    pub fn current(&self) -> &SecurityConf {
        &self.current
    }

    /// Apply one layer's patch.
    pub fn apply(&mut self, patch: &SecurityPatch) {
        fn gate(current: &mut bool, ceiling: &mut bool, value: Option<bool>) {
            match value {
                Some(false) => {
                    *current = false;
                    *ceiling = false;
                }
                Some(true) => *current = *ceiling,
                None => {}
            }
        }

        let (c, l) = (&mut self.current, &mut self.ceiling);
        gate(
            &mut c.enable_command_action,
            &mut l.enable_command_action,
            patch.enable_command_action,
        );
        gate(
            &mut c.enable_include_section,
            &mut l.enable_include_section,
            patch.enable_include_section,
        );
        gate(
            &mut c.enable_hooks_section,
            &mut l.enable_hooks_section,
            patch.enable_hooks_section,
        );
        if let Some(depth) = patch.max_include_depth {
            if depth < l.max_include_depth {
                l.max_include_depth = depth;
            }
            c.max_include_depth = depth.min(l.max_include_depth);
        }
        debug!(policy = ?self.current, "applied security section");
    }
}

// ===========================================================================
// Watchdog
// ===========================================================================

/// Lifecycle states a watchdog timeout can be attached to.
pub const LIFECYCLE_STATES: &[&str] = &[
    "CONNECT",
    "START",
    "STEP_BEGIN",
    "STEP_SIMULATORS",
    "STEP_CONTROLLERS",
    "STEP_END",
    "PAUSE",
    "RESUME",
    "SUCCESS",
    "FAIL",
    "ABORT",
    "STOP",
    "RESET",
    "KEEP_ALIVE",
    "DISCONNECT",
];

/// What the supervisor does when a state exceeds its timeout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchdogMode {
    #[default]
    Off,
    Log,
    Abort,
    Kill,
}

/// Per-state timeouts in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchdogConf {
    pub mode: WatchdogMode,
    pub default_timeout: u64,
    #[serde(
        deserialize_with = "overlay_state_timeouts",
        serialize_with = "export_state_timeouts"
    )]
    pub state_timeouts: BTreeMap<String, u64>,
}

const DEFAULT_STATE_TIMEOUTS: &[(&str, u64)] = &[
    ("CONNECT", 300_000),
    ("ABORT", 90_000),
    ("STOP", 300_000),
    ("DISCONNECT", 600_000),
];

fn default_state_timeouts() -> BTreeMap<String, u64> {
    DEFAULT_STATE_TIMEOUTS
        .iter()
        .map(|&(state, timeout)| (state.to_string(), timeout))
        .collect()
}

/// Entries overlay the default table; `null` removes a default entry.
fn overlay_state_timeouts<'de, D>(deserializer: D) -> Result<BTreeMap<String, u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = BTreeMap::<String, Option<u64>>::deserialize(deserializer)?;
    let mut table = default_state_timeouts();
    for (state, timeout) in overrides {
        match timeout {
            Some(t) => {
                table.insert(state, t);
            }
            None => {
                table.remove(&state);
            }
        }
    }
    Ok(table)
}

/// Default entries missing from the table export as `null`, so importing the
/// export removes them again.
fn export_state_timeouts<S>(table: &BTreeMap<String, u64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut out: BTreeMap<&str, Option<u64>> = table
        .iter()
        .map(|(state, &timeout)| (state.as_str(), Some(timeout)))
        .collect();
    for &(state, _) in DEFAULT_STATE_TIMEOUTS {
        out.entry(state).or_insert(None);
    }
    out.serialize(serializer)
}

impl Default for WatchdogConf {
    fn default() -> Self {
        Self {
            mode: WatchdogMode::Off,
            default_timeout: 90_000,
            state_timeouts: default_state_timeouts(),
        }
    }
}

impl WatchdogConf {
    /// Timeout for `state`: its table entry, else the default timeout.
    pub fn timeout_for(&self, state: &str) -> u64 {
        self.state_timeouts
            .get(state)
            .copied()
            .unwrap_or(self.default_timeout)
    }

    /// Reject table entries for states that do not exist.
    pub fn validate(&self) -> Result<(), String> {
        for state in self.state_timeouts.keys() {
            if !LIFECYCLE_STATES.contains(&state.as_str()) {
                return Err(format!("unknown lifecycle state '{state}'"));
            }
        }
        Ok(())
    }
}
