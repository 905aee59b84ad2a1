//! Property-based tests for stack layering and canonical export.
//!
//! Generates random partial stacks and include chains (with watchdog tables,
//! security sections and hooks), then checks that export is a fixed point of
//! import and that layers merge in order.

use proptest::prelude::*;
use serde_json::{Map, Value, json};
use simwire_core::test_utils::*;
use simwire_stack::{ErrorKind, ImportOptions, MemoryIncludes, SecurityConf, Stack};

// ===========================================================================
// Generators
// ===========================================================================

fn arb_engine() -> impl Strategy<Value = Value> {
    (
        proptest::option::of(any::<bool>()),
        proptest::option::of(1..10_000u64),
        proptest::option::of(prop::sample::select(vec!["off", "log", "abort", "kill"])),
        proptest::collection::vec("/[a-z]{1,6}", 0..3),
    )
        .prop_map(|(keep_alive, polling, mode, plugin_path)| {
            let mut engine = Map::new();
            if let Some(k) = keep_alive {
                engine.insert("keep_alive".into(), json!(k));
            }
            if let Some(p) = polling {
                engine.insert("polling_interval".into(), json!(p));
            }
            if let Some(m) = mode {
                engine.insert("watchdog".into(), json!({"mode": m}));
            }
            engine.insert("plugin_path".into(), json!(plugin_path));
            Value::Object(engine)
        })
}

const STATES: &[&str] = &["CONNECT", "START", "PAUSE", "ABORT", "STOP", "DISCONNECT"];

/// Watchdog state table entries; `None` removes the state's default.
fn arb_state_timeouts() -> impl Strategy<Value = Value> {
    proptest::collection::btree_map(
        prop::sample::select(STATES),
        proptest::option::of(0..1_000_000u64),
        0..4,
    )
    .prop_map(|table| json!(table))
}

fn arb_security() -> impl Strategy<Value = Value> {
    (
        proptest::option::of(any::<bool>()),
        proptest::option::of(any::<bool>()),
        proptest::option::of(2..16usize),
    )
        .prop_map(|(hooks, command, depth)| {
            let mut security = Map::new();
            if let Some(h) = hooks {
                security.insert("enable_hooks_section".into(), json!(h));
            }
            if let Some(c) = command {
                security.insert("enable_command_action".into(), json!(c));
            }
            if let Some(d) = depth {
                security.insert("max_include_depth".into(), json!(d));
            }
            Value::Object(security)
        })
}

/// An engine section touching every field import treats specially.
fn arb_engine_full() -> impl Strategy<Value = Value> {
    (
        arb_engine(),
        proptest::option::of(arb_state_timeouts()),
        proptest::option::of(arb_security()),
        proptest::collection::vec("echo [a-z]{1,6}", 0..2),
    )
        .prop_map(|(mut engine, timeouts, security, hooks)| {
            if let Some(t) = timeouts {
                let watchdog = engine
                    .as_object_mut()
                    .map(|e| e.entry("watchdog").or_insert_with(|| json!({})));
                if let Some(Value::Object(w)) = watchdog {
                    w.insert("state_timeouts".into(), t);
                }
            }
            if let Some(sec) = security {
                engine["security"] = sec;
            }
            if !hooks.is_empty() {
                engine["hooks"] = json!({"pre_connect": hooks});
            }
            engine
        })
}

fn arb_stack() -> impl Strategy<Value = Value> {
    (
        arb_engine_full(),
        proptest::option::of(1..64u32),
        proptest::collection::vec("[a-z]{1,8}", 0..4),
        0..20u64,
        any::<bool>(),
    )
        .prop_map(|(engine, threads, simulators, freq, command)| {
            let simulators: Vec<Value> = simulators
                .iter()
                .map(|b| json!({"binding": b, "args": {"seed": b.len()}}))
                .collect();
            let mut server = Map::new();
            if let Some(t) = threads {
                server.insert("listen_threads".into(), json!(t));
            }
            let mut triggers = vec![json!({"event": "time=60", "action": "stop"})];
            if command {
                triggers.push(json!({"event": "stop", "action": {"name": "command", "command": "ls"}}));
            }
            json!({
                "version": "4",
                "engine": engine,
                "server": server,
                "simulators": simulators,
                "defaults": {"components": [{"binding": "dummy_sensor", "args": {"freq": freq}}]},
                "vehicles": [{
                    "name": "ego",
                    "from": {"simulator": "minimator", "index": 0},
                    "components": {
                        "front": {"binding": "dummy_sensor", "from": WORLD_SENSOR},
                        "fusion": {
                            "binding": "fusion_sensor",
                            "from": {"object_sensors": ["front"], "ego_sensors": [EGO_SENSOR]}
                        }
                    }
                }],
                "triggers": triggers
            })
        })
}

/// Check that `stack` exports to a value that imports back to itself with
/// identical bytes.
fn assert_fixed_point(stack: &Stack) -> Result<(), TestCaseError> {
    let registry = sample_registry();
    let text = stack.to_canonical_string().unwrap();
    let again = Stack::import(stack.to_json().unwrap(), &registry).unwrap();
    prop_assert_eq!(&again, stack);
    prop_assert_eq!(again.to_canonical_string().unwrap(), text);
    Ok(())
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Importing an exported stack yields the same stack and the same bytes.
    /// Stacks whose own gates reject their content fail as Security and are
    /// otherwise skipped.
    #[test]
    fn export_is_import_fixed_point(raw in arb_stack()) {
        match Stack::import(raw, &sample_registry()) {
            Ok(stack) => assert_fixed_point(&stack)?,
            Err(e) => prop_assert_eq!(e.kind(), ErrorKind::Security),
        }
    }

    /// The same holds when the stack is assembled from an include chain,
    /// where any layer may tighten the policy for the whole stack.
    #[test]
    fn layered_export_is_import_fixed_point(
        root in arb_stack(),
        engines in proptest::collection::vec(arb_engine_full(), 1..4),
    ) {
        let mut includes = MemoryIncludes::new();
        let n = engines.len();
        for (i, engine) in engines.iter().enumerate() {
            let include = if i + 1 < n { json!([format!("l{}.json", i + 1)]) } else { json!([]) };
            includes.insert(
                format!("l{i}.json"),
                json!({"version": "4", "include": include, "engine": engine}),
            );
        }
        let mut root = root;
        root["include"] = json!(["l0.json"]);
        let options = ImportOptions {
            security: SecurityConf::unrestricted(),
            resolver: &includes,
        };
        match Stack::import_with(root, &sample_registry(), &options) {
            Ok(stack) => assert_fixed_point(&stack)?,
            Err(e) => prop_assert_eq!(e.kind(), ErrorKind::Security),
        }
    }

    /// Along an include chain the including layer wins for scalars, and
    /// additive lists accumulate innermost first.
    #[test]
    fn include_chain_merges_in_order(engines in proptest::collection::vec(arb_engine(), 1..6)) {
        let mut includes = MemoryIncludes::new();
        let n = engines.len();
        for (i, engine) in engines.iter().enumerate() {
            let include = if i + 1 < n { json!([format!("l{}.json", i + 1)]) } else { json!([]) };
            includes.insert(
                format!("l{i}.json"),
                json!({"version": "4", "include": include, "engine": engine}),
            );
        }
        let options = ImportOptions {
            security: SecurityConf::unrestricted(),
            resolver: &includes,
        };
        let stack = Stack::import_with(
            json!({"version": "4", "include": ["l0.json"]}),
            &sample_registry(),
            &options,
        )
        .unwrap();

        // l0 is merged last, so the first layer that sets a field wins.
        let first_set = |field: &str| engines.iter().find_map(|e| e.get(field).cloned());
        let keep_alive = first_set("keep_alive").and_then(|v| v.as_bool()).unwrap_or(false);
        prop_assert_eq!(stack.engine.keep_alive, keep_alive);
        let polling = first_set("polling_interval").and_then(|v| v.as_u64()).unwrap_or(100);
        prop_assert_eq!(stack.engine.polling_interval, polling);

        let expected_paths: Vec<String> = engines
            .iter()
            .rev()
            .flat_map(|e| e["plugin_path"].as_array().cloned().unwrap_or_default())
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        prop_assert_eq!(&stack.engine.plugin_path, &expected_paths);
    }
}
