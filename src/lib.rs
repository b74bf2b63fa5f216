// src/lib.rs - plexor: configuration compiler and name resolver for a
// protocol-agnostic router
//
// The crate turns a YAML or JSON configuration document into a validated
// `Linker`: a set of conflict-free routers, a composed namer stack and an
// admin endpoint. Compilation is all-or-nothing; a rejected document
// reports every error found, in document order.

pub mod builtin_plugins;
pub mod config;
pub mod error;
pub mod linker;
pub mod naming;
pub mod plugin;
pub mod reader;
pub mod sockets;
pub mod validation;

pub use config::{LinkerDefaults, Params};
pub use error::{ConfigError, ErrorCategory};
pub use linker::{Linker, NamerHandle, RouterHandle};
pub use naming::{BoundName, Dtab, NameInterpreter, Namer, Path, Resolution};
pub use plugin::{NamerPlugin, NamerRegistry, ProtocolPlugin, ProtocolRegistry, RouterService};
pub use reader::compile;
pub use validation::Validation;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
