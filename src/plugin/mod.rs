// src/plugin/mod.rs - Protocol and namer plugin interfaces
//
// Protocol and naming modules extend the configuration schema without the
// core knowing their concrete types: each plugin declares the closed set of
// extra keys it recognizes, supplies defaults, and owns a factory that
// turns validated config into a serviceable runtime object. The core stores
// plugin parameters as an opaque bag and only ever hands them back to the
// owning plugin.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt::Debug;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::{NamerDefaults, Params, RouterDefaults};
use crate::error::ConfigError;
use crate::naming::{Namer, Path};
use crate::validation::Validation;

pub mod registry;

pub use registry::{NamerRegistry, ProtocolRegistry, Registry};

/// Check a parameter object against a plugin's declared key set. Every
/// undeclared key is reported; declared keys pass through untyped.
pub fn parse_declared(
    allowed: &[&str],
    fields: &Map<String, Value>,
) -> Validation<ConfigError, Params> {
    let unknown: Vec<ConfigError> = fields
        .keys()
        .filter(|key| !allowed.contains(&key.as_str()))
        .map(|key| ConfigError::UnknownParameter { name: key.clone() })
        .collect();
    if unknown.is_empty() {
        Validation::valid(Params::new(fields.clone()))
    } else {
        Validation::invalid_all(unknown)
    }
}

/// A serviceable router produced by a protocol plugin's factory. Serving
/// traffic on it belongs to the runtime layer, not to configuration
/// compilation.
pub trait RouterService: Send + Sync + Debug {
    fn label(&self) -> &str;
    fn addrs(&self) -> Vec<SocketAddr>;
}

/// A protocol module (`http`, `thrift`, ...), registered once per process
/// under its protocol name.
#[async_trait]
pub trait ProtocolPlugin: Send + Sync + Debug {
    /// Registry key and `protocol` discriminator in the document schema.
    fn name(&self) -> &'static str;

    /// Default bind port for servers of this protocol, if it has one.
    fn default_server_port(&self) -> Option<u16> {
        None
    }

    /// Extra router-level keys this protocol recognizes.
    fn router_keys(&self) -> &'static [&'static str] {
        &[]
    }

    /// Extra server-level keys this protocol recognizes.
    fn server_keys(&self) -> &'static [&'static str] {
        &[]
    }

    /// Extra client-level keys this protocol recognizes.
    fn client_keys(&self) -> &'static [&'static str] {
        &[]
    }

    fn parse_router_params(&self, fields: &Map<String, Value>) -> Validation<ConfigError, Params> {
        parse_declared(self.router_keys(), fields)
    }

    fn parse_server_params(&self, fields: &Map<String, Value>) -> Validation<ConfigError, Params> {
        parse_declared(self.server_keys(), fields)
    }

    fn parse_client_params(&self, fields: &Map<String, Value>) -> Validation<ConfigError, Params> {
        parse_declared(self.client_keys(), fields)
    }

    /// Turn a fully resolved router into a serviceable instance. Invoked by
    /// downstream runtime assembly once compilation has succeeded.
    async fn build(&self, router: &RouterDefaults) -> anyhow::Result<Box<dyn RouterService>>;
}

/// A naming module, registered once per process under its `kind`.
pub trait NamerPlugin: Send + Sync + Debug {
    /// Registry key and `kind` discriminator in the document schema.
    fn kind(&self) -> &'static str;

    /// Prefix served when the declaration does not set one, derived from
    /// the kind. A kind that does not form a well-formed path segment has
    /// no derivable prefix.
    fn default_prefix(&self) -> Option<Path> {
        Path::read(&format!("/{}", self.kind())).ok()
    }

    /// Extra keys this namer recognizes.
    fn keys(&self) -> &'static [&'static str] {
        &[]
    }

    fn parse_params(&self, fields: &Map<String, Value>) -> Validation<ConfigError, Params> {
        parse_declared(self.keys(), fields)
    }

    /// Instantiate the namer from its resolved configuration.
    fn make_namer(&self, config: &NamerDefaults) -> anyhow::Result<Arc<dyn Namer>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_parse_declared_accepts_known_keys() {
        let fields = fields(&[("timeoutMs", Value::from(250))]);
        let params = parse_declared(&["timeoutMs"], &fields).into_result().unwrap();
        assert_eq!(params.get_i64("timeoutMs"), Some(250));
    }

    #[test]
    fn test_parse_declared_reports_every_unknown_key() {
        let fields = fields(&[
            ("timeoutMs", Value::from(250)),
            ("bogus", Value::from(true)),
            ("alsoBogus", Value::from("x")),
        ]);
        let errors = parse_declared(&["timeoutMs"], &fields).errors();
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .all(|e| matches!(e, ConfigError::UnknownParameter { .. })));
    }

    #[test]
    fn test_parse_declared_empty_fields() {
        let params = parse_declared(&[], &Map::new()).into_result().unwrap();
        assert!(params.is_empty());
    }
}
