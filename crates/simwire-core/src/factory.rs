//! Component factories: own-schema validation plus construction.

use crate::component::{ComponentError, SharedComponent};
use crate::resolver::ResolvedSources;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Builds components of one binding.
///
/// A factory owns the schema of its `args` payload. `validate_args` runs at
/// configuration import time so bad args fail before any graph is built;
/// `make` runs at graph-build time with the already-resolved sources.
pub trait ComponentFactory: fmt::Debug + Send + Sync {
    /// Human-readable description shown in listings.
    fn description(&self) -> &str;

    /// Validate `args` against this factory's schema and return its canonical,
    /// fully-defaulted form.
    fn validate_args(&self, binding: &str, args: &Value) -> Result<Value, ComponentError>;

    /// Construct an instance named `name`.
    ///
    /// Implementations must check that each role they read is present in
    /// `sources` and enforce their own per-role cardinality.
    fn make(
        &self,
        name: &str,
        args: &Value,
        sources: &ResolvedSources,
    ) -> Result<SharedComponent, ComponentError>;
}

/// Parse an args payload into a typed config. `null` yields the default.
pub fn parse_args<C>(binding: &str, args: &Value) -> Result<C, ComponentError>
where
    C: DeserializeOwned + Default,
{
    if args.is_null() {
        return Ok(C::default());
    }
    C::deserialize(args).map_err(|e| ComponentError::InvalidArgs {
        binding: binding.to_string(),
        detail: e.to_string(),
    })
}

/// Parse then re-serialize, producing the canonical args for a typed config.
pub fn canonical_args<C>(binding: &str, args: &Value) -> Result<Value, ComponentError>
where
    C: DeserializeOwned + Serialize + Default,
{
    let conf: C = parse_args(binding, args)?;
    serde_json::to_value(&conf).map_err(|e| ComponentError::InvalidArgs {
        binding: binding.to_string(),
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default, deny_unknown_fields)]
    struct CameraConf {
        fov: u32,
        label: String,
    }

    #[test]
    fn null_args_yield_default() {
        let c: CameraConf = parse_args("camera", &Value::Null).unwrap();
        assert_eq!(c, CameraConf::default());
    }

    #[test]
    fn canonical_args_fill_defaults() {
        let v = canonical_args::<CameraConf>("camera", &json!({"fov": 90})).unwrap();
        assert_eq!(v, json!({"fov": 90, "label": ""}));
    }

    #[test]
    fn invalid_args_name_the_binding() {
        let err = parse_args::<CameraConf>("camera", &json!({"fov": "wide"})).unwrap_err();
        match err {
            ComponentError::InvalidArgs { binding, .. } => assert_eq!(binding, "camera"),
            other => panic!("expected InvalidArgs, got: {other:?}"),
        }
    }

    #[test]
    fn unknown_args_rejected() {
        assert!(parse_args::<CameraConf>("camera", &json!({"zoom": 2})).is_err());
    }
}
