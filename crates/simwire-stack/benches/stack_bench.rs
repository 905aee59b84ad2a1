//! Criterion benchmarks for stack import and vehicle builds.

use criterion::{Criterion, criterion_group, criterion_main};
use serde_json::{Map, Value, json};
use simwire_core::test_utils::*;
use simwire_stack::{ImportOptions, MemoryIncludes, SecurityConf, Stack};

/// A vehicle with `n` chained dummy sensors fused into one component.
fn chained_vehicle(n: usize) -> Value {
    let mut components = Map::new();
    for i in 0..n {
        let from = if i == 0 {
            WORLD_SENSOR.to_string()
        } else {
            format!("s{}", i - 1)
        };
        components.insert(
            format!("s{i}"),
            json!({"binding": "dummy_sensor", "from": from, "args": {"freq": i}}),
        );
    }
    let objects: Vec<String> = (0..n).map(|i| format!("s{i}")).collect();
    components.insert(
        "fusion".to_string(),
        json!({
            "binding": "fusion_sensor",
            "from": {"object_sensors": objects, "ego_sensors": [EGO_SENSOR]}
        }),
    );
    json!({
        "name": "ego",
        "from": {"simulator": "minimator", "index": 0},
        "components": components
    })
}

fn bench_stack(c: &mut Criterion) {
    let mut group = c.benchmark_group("stack");
    group.sample_size(50);
    let registry = sample_registry();

    // Benchmark: import a stack of 10 layers chained by includes.
    let mut includes = MemoryIncludes::new();
    for i in 0..10 {
        let include = if i + 1 < 10 {
            json!([format!("layer{}.json", i + 1)])
        } else {
            json!([])
        };
        includes.insert(
            format!("layer{i}.json"),
            json!({
                "version": "4",
                "include": include,
                "engine": {"polling_interval": 100 + i, "plugin_path": [format!("/opt/p{i}")]},
                "defaults": {"simulators": [{"binding": "minimator", "args": {"rate": i}}]}
            }),
        );
    }
    let options = ImportOptions {
        security: SecurityConf::unrestricted(),
        resolver: &includes,
    };
    group.bench_function("import_10_layers", |b| {
        b.iter(|| {
            Stack::import_with(
                json!({"version": "4", "include": ["layer0.json"]}),
                &registry,
                &options,
            )
            .unwrap()
        });
    });

    // Benchmark: import and build a 50-component vehicle.
    let raw = json!({
        "version": "4",
        "simulators": [{"binding": "minimator"}],
        "vehicles": [chained_vehicle(50)]
    });
    group.bench_function("import_vehicle_50_components", |b| {
        b.iter(|| Stack::import(raw.clone(), &registry).unwrap());
    });

    let stack = Stack::import(raw, &registry).unwrap();
    let base = base_pool();
    group.bench_function("build_vehicle_50_components", |b| {
        b.iter(|| stack.build_vehicle("ego", &registry, &base).unwrap());
    });

    group.bench_function("export_canonical", |b| {
        b.iter(|| stack.to_canonical_string().unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_stack);
criterion_main!(benches);
