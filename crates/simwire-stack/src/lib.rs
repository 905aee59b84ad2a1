//! Simwire Stack -- layered simulation configuration.
//!
//! A stack is the complete configuration of one simulation run: engine
//! behavior, server and simulation parameters, and the simulators, vehicles,
//! controllers, triggers, logging filters and plugins taking part.
//!
//! # Import Pipeline
//!
//! 1. **Load** -- [`loader`] parses JSON, TOML or RON into an untyped value.
//! 2. **Layer** -- includes are followed depth-first and layers are merged
//!    ([`merge`]) under the security policy ([`policy::SecurityGate`]).
//! 3. **Finalize** -- the merged value becomes a typed [`stack::Stack`];
//!    defaults are applied and component bindings are checked against a
//!    [`simwire_core::ComponentRegistry`].
//! 4. **Build** -- [`stack::Stack::build_vehicle`] wires a vehicle's
//!    components on top of what its simulator provides.
//!
//! ```rust,ignore
//! let stack = Stack::from_file(Path::new("stack.json"), &registry)?;
//! stack.validate()?;
//! let pool = stack.build_vehicle("ego", &registry, &simulator_pool)?;
//! println!("{}", stack.to_canonical_string()?);
//! ```

pub mod error;
pub mod loader;
pub mod merge;
pub mod policy;
pub mod schema;
pub mod stack;
pub mod vehicle;

pub use error::{ErrorKind, StackError};
pub use loader::{FsIncludeResolver, IncludeResolver, LoadError, MemoryIncludes, read_value};
pub use policy::{SecurityConf, WatchdogConf, WatchdogMode};
pub use stack::{ImportOptions, STACK_VERSION, Stack};
pub use vehicle::{VehicleConf, VehicleSource};
