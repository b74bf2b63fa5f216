// src/builtin_plugins/thrift.rs - Thrift protocol plugin
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::net::SocketAddr;
use tracing::info;

use crate::config::{Params, RouterDefaults};
use crate::error::ConfigError;
use crate::plugin::{parse_declared, ProtocolPlugin, RouterService};
use crate::validation::Validation;

pub const DEFAULT_THRIFT_PORT: u16 = 4114;

const SUPPORTED_WIRE_PROTOCOLS: &[&str] = &["binary", "compact"];

/// The `thrift` protocol.
#[derive(Debug, Clone, Copy)]
pub struct ThriftProtocol;

#[async_trait]
impl ProtocolPlugin for ThriftProtocol {
    fn name(&self) -> &'static str {
        "thrift"
    }

    fn default_server_port(&self) -> Option<u16> {
        Some(DEFAULT_THRIFT_PORT)
    }

    fn router_keys(&self) -> &'static [&'static str] {
        &["thriftProtocol", "thriftFramed"]
    }

    fn client_keys(&self) -> &'static [&'static str] {
        &["thriftFramed"]
    }

    fn parse_router_params(&self, fields: &Map<String, Value>) -> Validation<ConfigError, Params> {
        parse_declared(self.router_keys(), fields).and_then(|params| {
            if let Some(wire) = params.get("thriftProtocol") {
                let supported = wire
                    .as_str()
                    .map(|s| SUPPORTED_WIRE_PROTOCOLS.contains(&s))
                    .unwrap_or(false);
                if !supported {
                    return Validation::invalid(ConfigError::ParseError {
                        message: format!(
                            "thriftProtocol must be one of {:?}, got {}",
                            SUPPORTED_WIRE_PROTOCOLS, wire
                        ),
                        line: 0,
                        column: 0,
                    });
                }
            }
            Validation::valid(params)
        })
    }

    async fn build(&self, router: &RouterDefaults) -> anyhow::Result<Box<dyn RouterService>> {
        let service = ThriftRouter {
            label: router.label.clone(),
            addrs: router.addrs(),
            framed: router.params.get_bool("thriftFramed").unwrap_or(true),
        };
        info!(label = %service.label, framed = service.framed, "thrift router initialized");
        Ok(Box::new(service))
    }
}

/// A serviceable Thrift router instance.
#[derive(Debug)]
pub struct ThriftRouter {
    label: String,
    addrs: Vec<SocketAddr>,
    #[allow(dead_code)]
    framed: bool,
}

impl RouterService for ThriftRouter {
    fn label(&self) -> &str {
        &self.label
    }

    fn addrs(&self) -> Vec<SocketAddr> {
        self.addrs.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_protocol_validation() {
        let mut fields = Map::new();
        fields.insert("thriftProtocol".to_string(), Value::from("compact"));
        assert!(ThriftProtocol.parse_router_params(&fields).is_valid());

        let mut fields = Map::new();
        fields.insert("thriftProtocol".to_string(), Value::from("avro"));
        let errors = ThriftProtocol.parse_router_params(&fields).errors();
        assert!(matches!(errors[0], ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_default_port_differs_from_http() {
        assert_eq!(ThriftProtocol.default_server_port(), Some(DEFAULT_THRIFT_PORT));
        assert_ne!(
            ThriftProtocol.default_server_port(),
            super::super::http::HttpProtocol.default_server_port()
        );
    }
}
